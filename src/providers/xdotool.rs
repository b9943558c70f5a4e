//! X11 desktop provider built on `xdotool` and `xclip`
//!
//! Input synthesis, active window lookup and clipboard access shell out to
//! the `xdotool` and `xclip` binaries. Every invocation is bounded by
//! [`COMMAND_TIMEOUT_MS`]; a missing binary or missing `DISPLAY` surfaces as
//! [`ProviderError::InputUnavailable`].

use std::{path::PathBuf, process::Stdio, time::Duration};

use async_trait::async_trait;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    process::Command,
};

use super::{Clipboard, InputSynthesizer, MouseButton, WindowInfo, WindowInspector, keys};
use crate::error::{ProviderError, ProviderResult};

/// Upper bound for a single `xdotool`/`xclip` invocation
pub const COMMAND_TIMEOUT_MS: u64 = 10_000;

/// Milliseconds between keystrokes when typing text
const TYPE_DELAY_MS: u32 = 12;

/// X11 button numbers for scroll directions
const SCROLL_UP: u8 = 4;
const SCROLL_DOWN: u8 = 5;
const SCROLL_LEFT: u8 = 6;
const SCROLL_RIGHT: u8 = 7;

/// Input, clipboard and window provider for X11 sessions
#[derive(Debug, Clone)]
pub struct XdotoolDesktop {
    xdotool: PathBuf,
    xclip: PathBuf,
}

impl Default for XdotoolDesktop {
    fn default() -> Self {
        Self::new()
    }
}

impl XdotoolDesktop {
    /// Uses `xdotool` and `xclip` from `PATH`
    pub fn new() -> Self {
        Self {
            xdotool: PathBuf::from("xdotool"),
            xclip: PathBuf::from("xclip"),
        }
    }

    /// Overrides the binary locations
    pub fn with_binaries(xdotool: impl Into<PathBuf>, xclip: impl Into<PathBuf>) -> Self {
        Self {
            xdotool: xdotool.into(),
            xclip: xclip.into(),
        }
    }

    async fn with_timeout<F, T>(operation: &str, future: F) -> ProviderResult<T>
    where
        F: std::future::Future<Output = ProviderResult<T>>,
    {
        tokio::time::timeout(Duration::from_millis(COMMAND_TIMEOUT_MS), future)
            .await
            .map_err(|_| {
                tracing::warn!("{} timed out after {}ms", operation, COMMAND_TIMEOUT_MS);
                ProviderError::failed(operation, format!("timed out after {}ms", COMMAND_TIMEOUT_MS))
            })?
    }

    /// Runs xdotool and returns its stdout
    async fn xdotool(&self, operation: &str, args: Vec<String>) -> ProviderResult<String> {
        tracing::debug!("xdotool {}", args.join(" "));
        let mut cmd = Command::new(&self.xdotool);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        Self::with_timeout(operation, async {
            let output = cmd
                .output()
                .await
                .map_err(|e| spawn_error(&self.xdotool, e, |reason| {
                    ProviderError::InputUnavailable { reason }
                }))?;
            if !output.status.success() {
                return Err(classify_failure(
                    operation,
                    &String::from_utf8_lossy(&output.stderr),
                ));
            }
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        })
        .await
    }
}

fn spawn_error<F>(binary: &std::path::Path, error: std::io::Error, unavailable: F) -> ProviderError
where
    F: FnOnce(String) -> ProviderError,
{
    if error.kind() == std::io::ErrorKind::NotFound {
        unavailable(format!("'{}' is not installed or not on PATH", binary.display()))
    } else {
        ProviderError::failed(binary.display().to_string(), error.to_string())
    }
}

fn classify_failure(operation: &str, stderr: &str) -> ProviderError {
    let stderr = stderr.trim();
    if stderr.contains("Can't open display") || stderr.contains("cannot open display") {
        ProviderError::InputUnavailable {
            reason: "no X11 display available (is DISPLAY set?)".to_string(),
        }
    } else {
        ProviderError::failed(operation, stderr)
    }
}

/// X11 button number for a mouse button
pub fn button_number(button: MouseButton) -> u8 {
    match button {
        MouseButton::Left => 1,
        MouseButton::Middle => 2,
        MouseButton::Right => 3,
    }
}

/// Button clicks that produce a scroll; positive `dy` is up, positive `dx`
/// is right
pub fn scroll_clicks(dx: i32, dy: i32) -> Vec<(u8, u32)> {
    let mut clicks = Vec::new();
    if dy != 0 {
        let button = if dy > 0 { SCROLL_UP } else { SCROLL_DOWN };
        clicks.push((button, dy.unsigned_abs()));
    }
    if dx != 0 {
        let button = if dx > 0 { SCROLL_RIGHT } else { SCROLL_LEFT };
        clicks.push((button, dx.unsigned_abs()));
    }
    clicks
}

/// Parses `xdotool getdisplaygeometry` output ("1920 1080")
pub fn parse_geometry(output: &str) -> Option<(u32, u32)> {
    let mut parts = output.split_whitespace();
    let width = parts.next()?.parse().ok()?;
    let height = parts.next()?.parse().ok()?;
    Some((width, height))
}

/// Parses `xdotool getmouselocation --shell` output
pub fn parse_mouse_location(output: &str) -> Option<(i32, i32)> {
    let mut x = None;
    let mut y = None;
    for line in output.lines() {
        if let Some(value) = line.strip_prefix("X=") {
            x = value.trim().parse().ok();
        } else if let Some(value) = line.strip_prefix("Y=") {
            y = value.trim().parse().ok();
        }
    }
    Some((x?, y?))
}

#[async_trait]
impl InputSynthesizer for XdotoolDesktop {
    async fn screen_size(&self) -> ProviderResult<(u32, u32)> {
        let output = self
            .xdotool("screen_size", vec!["getdisplaygeometry".into()])
            .await?;
        parse_geometry(&output).ok_or_else(|| {
            ProviderError::failed("screen_size", format!("unexpected output {:?}", output))
        })
    }

    async fn cursor_position(&self) -> ProviderResult<(i32, i32)> {
        let output = self
            .xdotool(
                "cursor_position",
                vec!["getmouselocation".into(), "--shell".into()],
            )
            .await?;
        parse_mouse_location(&output).ok_or_else(|| {
            ProviderError::failed("cursor_position", format!("unexpected output {:?}", output))
        })
    }

    async fn move_cursor(&self, x: i32, y: i32) -> ProviderResult<()> {
        self.xdotool(
            "move_cursor",
            vec!["mousemove".into(), x.to_string(), y.to_string()],
        )
        .await
        .map(|_| ())
    }

    async fn click(&self, x: i32, y: i32, button: MouseButton, count: u32) -> ProviderResult<()> {
        let args = vec![
            "mousemove".into(),
            x.to_string(),
            y.to_string(),
            "click".into(),
            "--repeat".into(),
            count.max(1).to_string(),
            button_number(button).to_string(),
        ];
        self.xdotool("click", args).await.map(|_| ())
    }

    async fn scroll(&self, x: i32, y: i32, dx: i32, dy: i32) -> ProviderResult<()> {
        let mut args: Vec<String> = vec!["mousemove".into(), x.to_string(), y.to_string()];
        for (button, repeat) in scroll_clicks(dx, dy) {
            args.extend([
                "click".into(),
                "--repeat".into(),
                repeat.to_string(),
                button.to_string(),
            ]);
        }
        self.xdotool("scroll", args).await.map(|_| ())
    }

    async fn drag(
        &self,
        from: (i32, i32),
        to: (i32, i32),
        button: MouseButton,
    ) -> ProviderResult<()> {
        let button = button_number(button).to_string();
        let args = vec![
            "mousemove".into(),
            from.0.to_string(),
            from.1.to_string(),
            "mousedown".into(),
            button.clone(),
            "mousemove".into(),
            to.0.to_string(),
            to.1.to_string(),
            "mouseup".into(),
            button,
        ];
        self.xdotool("drag", args).await.map(|_| ())
    }

    async fn type_text(&self, text: &str) -> ProviderResult<()> {
        let args = vec![
            "type".into(),
            "--delay".into(),
            TYPE_DELAY_MS.to_string(),
            "--".into(),
            text.to_string(),
        ];
        self.xdotool("type_text", args).await.map(|_| ())
    }

    async fn press_key(&self, key: &str) -> ProviderResult<()> {
        let keysym = keys::to_keysym(key)?;
        self.xdotool("press_key", vec!["key".into(), keysym])
            .await
            .map(|_| ())
    }

    async fn hotkey(&self, keys: &[String]) -> ProviderResult<()> {
        let chord = keys::chord_to_keysyms(keys)?.join("+");
        self.xdotool("hotkey", vec!["key".into(), chord])
            .await
            .map(|_| ())
    }

    async fn key_down(&self, key: &str) -> ProviderResult<()> {
        let keysym = keys::to_keysym(key)?;
        self.xdotool("key_down", vec!["keydown".into(), keysym])
            .await
            .map(|_| ())
    }

    async fn key_up(&self, key: &str) -> ProviderResult<()> {
        let keysym = keys::to_keysym(key)?;
        self.xdotool("key_up", vec!["keyup".into(), keysym])
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl WindowInspector for XdotoolDesktop {
    async fn active_window(&self) -> ProviderResult<WindowInfo> {
        let unavailable = |e: ProviderError| ProviderError::WindowInfoUnavailable {
            reason: e.to_string(),
        };

        let title = self
            .xdotool(
                "active_window",
                vec!["getactivewindow".into(), "getwindowname".into()],
            )
            .await
            .map_err(unavailable)?;
        let pid = self
            .xdotool(
                "active_window",
                vec!["getactivewindow".into(), "getwindowpid".into()],
            )
            .await
            .map_err(unavailable)?;

        // Apps without _NET_WM_PID report no pid; the title is still useful.
        let app_name = match pid.trim().parse::<u32>() {
            Ok(pid) => tokio::fs::read_to_string(format!("/proc/{}/comm", pid))
                .await
                .map(|comm| comm.trim().to_string())
                .unwrap_or_default(),
            Err(_) => String::new(),
        };

        Ok(WindowInfo {
            app_name,
            window_title: title.trim_end_matches('\n').to_string(),
        })
    }
}

#[async_trait]
impl Clipboard for XdotoolDesktop {
    async fn get_text(&self) -> ProviderResult<String> {
        let mut cmd = Command::new(&self.xclip);
        cmd.args(["-selection", "clipboard", "-o"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        Self::with_timeout("clipboard_get", async {
            let output = cmd.output().await.map_err(|e| {
                spawn_error(&self.xclip, e, |reason| ProviderError::ClipboardUnavailable {
                    reason,
                })
            })?;
            // An empty clipboard makes xclip exit non-zero; treat it as "".
            if !output.status.success() {
                return Ok(String::new());
            }
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        })
        .await
    }

    async fn set_text(&self, text: &str) -> ProviderResult<()> {
        let mut cmd = Command::new(&self.xclip);
        cmd.args(["-selection", "clipboard", "-i"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        Self::with_timeout("clipboard_set", async {
            let mut child = cmd.spawn().map_err(|e| {
                spawn_error(&self.xclip, e, |reason| ProviderError::ClipboardUnavailable {
                    reason,
                })
            })?;
            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(text.as_bytes())
                    .await
                    .map_err(|e| ProviderError::failed("clipboard_set", e.to_string()))?;
            }
            // xclip forks a child that owns the selection and inherits stderr,
            // so stderr only reaches EOF once the selection changes hands.
            // Wait for the parent alone and read stderr only on failure.
            let stderr = child.stderr.take();
            let status = child
                .wait()
                .await
                .map_err(|e| ProviderError::failed("clipboard_set", e.to_string()))?;
            if !status.success() {
                let mut reason = String::new();
                if let Some(mut stderr) = stderr {
                    let _ = stderr.read_to_string(&mut reason).await;
                }
                return Err(ProviderError::ClipboardUnavailable {
                    reason: reason.trim().to_string(),
                });
            }
            Ok(())
        })
        .await
    }
}
