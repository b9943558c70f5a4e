//! Capability providers
//!
//! Tools never touch the operating system directly. Everything with a side
//! effect goes through one of the capability traits defined here:
//!
//! - [`ScreenCapture`]: raw pixel capture of the primary display
//! - [`InputSynthesizer`]: pointer and keyboard event synthesis
//! - [`Clipboard`]: plain-text clipboard access
//! - [`ShellRunner`]: shell command execution with a timeout
//! - [`WindowInspector`]: frontmost application/window lookup
//!
//! [`Providers`] bundles one implementation of each and is shared by every
//! tool handler. Implementations:
//!
//! - [`mock::MockDesktop`]: in-memory desktop that records calls (tests and
//!   `CU_MCP_BACKEND=mock`)
//! - [`shell::SystemShell`]: `sh -c` through `tokio::process`
//! - [`xdotool::XdotoolDesktop`]: X11 input, clipboard and window info via
//!   the `xdotool` and `xclip` binaries
//! - `xcap_capture::XcapCapture`: real screen capture (feature
//!   `xcap-capture`)
//! - [`Unsupported`]: reports every capability as unavailable

use std::{fmt, str::FromStr, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, ProviderResult};

pub mod keys;
pub mod mock;
pub mod shell;
pub mod xdotool;

#[cfg(feature = "xcap-capture")]
pub mod xcap_capture;

pub use mock::{MockCall, MockDesktop};
pub use shell::SystemShell;
#[cfg(feature = "xcap-capture")]
pub use xcap_capture::XcapCapture;
pub use xdotool::XdotoolDesktop;

/// Byte order of a raw capture buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelLayout {
    /// R, G, B, A
    Rgba8,
    /// B, G, R, A (native order of most OS capture APIs)
    Bgra8,
}

/// Raw pixels as captured, before normalization
#[derive(Clone, PartialEq, Eq)]
pub struct RawCapture {
    /// Tightly packed 4-byte pixels, row-major
    pub pixels: Vec<u8>,
    /// Width in physical pixels
    pub width: u32,
    /// Height in physical pixels
    pub height: u32,
    /// Channel order of `pixels`
    pub layout: PixelLayout,
}

impl RawCapture {
    /// Wraps an RGBA buffer
    pub fn rgba(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            pixels,
            width,
            height,
            layout: PixelLayout::Rgba8,
        }
    }

    /// Wraps a BGRA buffer
    pub fn bgra(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            pixels,
            width,
            height,
            layout: PixelLayout::Bgra8,
        }
    }

    /// Generates a deterministic gradient capture for tests and the mock
    /// backend
    pub fn test_pattern(width: u32, height: u32) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height {
            for x in 0..width {
                let r = ((x * 255) / width.max(1)) as u8;
                let g = ((y * 255) / height.max(1)) as u8;
                let b = (((x + y) * 127) / (width + height).max(1)) as u8;
                pixels.extend_from_slice(&[r, g, b, 255]);
            }
        }
        Self::rgba(width, height, pixels)
    }
}

impl fmt::Debug for RawCapture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawCapture")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("layout", &self.layout)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Mouse button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    /// Primary button
    Left,
    /// Secondary button
    Right,
    /// Wheel button
    Middle,
}

impl MouseButton {
    /// Every button name accepted by the tools
    pub const NAMES: &'static [&'static str] = &["left", "right", "middle"];

    /// Returns the button name
    pub fn as_str(&self) -> &'static str {
        match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
            MouseButton::Middle => "middle",
        }
    }
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MouseButton {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(MouseButton::Left),
            "right" => Ok(MouseButton::Right),
            "middle" => Ok(MouseButton::Middle),
            other => Err(format!("unknown mouse button '{}'", other)),
        }
    }
}

/// Captured output of a finished shell command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Standard output, lossily decoded as UTF-8
    pub stdout: String,
    /// Standard error, lossily decoded as UTF-8
    pub stderr: String,
    /// Exit code, -1 if the process was killed by a signal
    pub exit_code: i32,
}

/// Frontmost application and window
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    /// Application (process) name
    pub app_name: String,
    /// Window title
    pub window_title: String,
}

/// Raw screen capture
#[async_trait]
pub trait ScreenCapture: Send + Sync {
    /// Captures the primary display at physical resolution
    async fn capture_screen(&self) -> ProviderResult<RawCapture>;
}

/// Pointer and keyboard event synthesis
///
/// Coordinates are logical screen coordinates, the same space that
/// [`InputSynthesizer::screen_size`] reports.
#[async_trait]
pub trait InputSynthesizer: Send + Sync {
    /// Logical screen size
    async fn screen_size(&self) -> ProviderResult<(u32, u32)>;

    /// Current pointer position
    async fn cursor_position(&self) -> ProviderResult<(i32, i32)>;

    /// Moves the pointer
    async fn move_cursor(&self, x: i32, y: i32) -> ProviderResult<()>;

    /// Moves to `(x, y)` and clicks `count` times
    async fn click(&self, x: i32, y: i32, button: MouseButton, count: u32) -> ProviderResult<()>;

    /// Moves to `(x, y)` and scrolls; positive `dy` is up, positive `dx` is
    /// right
    async fn scroll(&self, x: i32, y: i32, dx: i32, dy: i32) -> ProviderResult<()>;

    /// Presses at the start point, moves, releases at the end point
    async fn drag(
        &self,
        from: (i32, i32),
        to: (i32, i32),
        button: MouseButton,
    ) -> ProviderResult<()>;

    /// Types text key by key
    async fn type_text(&self, text: &str) -> ProviderResult<()>;

    /// Presses and releases one key
    async fn press_key(&self, key: &str) -> ProviderResult<()>;

    /// Presses keys in order, then releases them in reverse
    async fn hotkey(&self, keys: &[String]) -> ProviderResult<()>;

    /// Holds a key down
    async fn key_down(&self, key: &str) -> ProviderResult<()>;

    /// Releases a held key
    async fn key_up(&self, key: &str) -> ProviderResult<()>;
}

/// Plain-text clipboard
#[async_trait]
pub trait Clipboard: Send + Sync {
    /// Reads the clipboard text
    async fn get_text(&self) -> ProviderResult<String>;

    /// Replaces the clipboard text
    async fn set_text(&self, text: &str) -> ProviderResult<()>;
}

/// Shell command execution
#[async_trait]
pub trait ShellRunner: Send + Sync {
    /// Runs `command` through the shell, killing it after `timeout`
    async fn run_command(&self, command: &str, timeout: Duration) -> ProviderResult<CommandOutput>;
}

/// Frontmost window lookup
#[async_trait]
pub trait WindowInspector: Send + Sync {
    /// Frontmost application and window title
    async fn active_window(&self) -> ProviderResult<WindowInfo>;
}

/// One implementation of each capability, shared by all tools
#[derive(Clone)]
pub struct Providers {
    /// Screen capture
    pub capture: Arc<dyn ScreenCapture>,
    /// Input synthesis
    pub input: Arc<dyn InputSynthesizer>,
    /// Clipboard
    pub clipboard: Arc<dyn Clipboard>,
    /// Shell
    pub shell: Arc<dyn ShellRunner>,
    /// Window inspection
    pub windows: Arc<dyn WindowInspector>,
}

impl Providers {
    /// Routes every capability to one mock desktop
    pub fn mock(desktop: Arc<MockDesktop>) -> Self {
        Self {
            capture: desktop.clone(),
            input: desktop.clone(),
            clipboard: desktop.clone(),
            shell: desktop.clone(),
            windows: desktop,
        }
    }

    /// Real providers for the host platform
    ///
    /// Linux uses xdotool/xclip for input, clipboard and window info. Screen
    /// capture needs the `xcap-capture` feature; without it capture reports
    /// [`ProviderError::CaptureUnavailable`]. The shell works everywhere.
    pub fn system() -> Self {
        #[cfg(feature = "xcap-capture")]
        let capture: Arc<dyn ScreenCapture> = Arc::new(XcapCapture::new());
        #[cfg(not(feature = "xcap-capture"))]
        let capture: Arc<dyn ScreenCapture> = Arc::new(Unsupported::new(
            "built without the 'xcap-capture' feature",
        ));

        #[cfg(target_os = "linux")]
        let (input, clipboard, windows): (
            Arc<dyn InputSynthesizer>,
            Arc<dyn Clipboard>,
            Arc<dyn WindowInspector>,
        ) = {
            let desktop = Arc::new(XdotoolDesktop::new());
            (desktop.clone(), desktop.clone(), desktop)
        };
        #[cfg(not(target_os = "linux"))]
        let (input, clipboard, windows): (
            Arc<dyn InputSynthesizer>,
            Arc<dyn Clipboard>,
            Arc<dyn WindowInspector>,
        ) = {
            let unsupported = Arc::new(Unsupported::new("no input backend for this platform"));
            (unsupported.clone(), unsupported.clone(), unsupported)
        };

        Self {
            capture,
            input,
            clipboard,
            shell: Arc::new(SystemShell::new()),
            windows,
        }
    }
}

impl fmt::Debug for Providers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Providers").finish_non_exhaustive()
    }
}

/// Provider that reports every capability as unavailable
#[derive(Debug, Clone)]
pub struct Unsupported {
    reason: String,
}

impl Unsupported {
    /// Creates a provider that fails with `reason`
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn input<T>(&self) -> ProviderResult<T> {
        Err(ProviderError::InputUnavailable {
            reason: self.reason.clone(),
        })
    }
}

#[async_trait]
impl ScreenCapture for Unsupported {
    async fn capture_screen(&self) -> ProviderResult<RawCapture> {
        Err(ProviderError::CaptureUnavailable {
            reason: self.reason.clone(),
        })
    }
}

#[async_trait]
impl InputSynthesizer for Unsupported {
    async fn screen_size(&self) -> ProviderResult<(u32, u32)> {
        self.input()
    }

    async fn cursor_position(&self) -> ProviderResult<(i32, i32)> {
        self.input()
    }

    async fn move_cursor(&self, _x: i32, _y: i32) -> ProviderResult<()> {
        self.input()
    }

    async fn click(&self, _x: i32, _y: i32, _button: MouseButton, _count: u32) -> ProviderResult<()> {
        self.input()
    }

    async fn scroll(&self, _x: i32, _y: i32, _dx: i32, _dy: i32) -> ProviderResult<()> {
        self.input()
    }

    async fn drag(
        &self,
        _from: (i32, i32),
        _to: (i32, i32),
        _button: MouseButton,
    ) -> ProviderResult<()> {
        self.input()
    }

    async fn type_text(&self, _text: &str) -> ProviderResult<()> {
        self.input()
    }

    async fn press_key(&self, _key: &str) -> ProviderResult<()> {
        self.input()
    }

    async fn hotkey(&self, _keys: &[String]) -> ProviderResult<()> {
        self.input()
    }

    async fn key_down(&self, _key: &str) -> ProviderResult<()> {
        self.input()
    }

    async fn key_up(&self, _key: &str) -> ProviderResult<()> {
        self.input()
    }
}

#[async_trait]
impl Clipboard for Unsupported {
    async fn get_text(&self) -> ProviderResult<String> {
        Err(ProviderError::ClipboardUnavailable {
            reason: self.reason.clone(),
        })
    }

    async fn set_text(&self, _text: &str) -> ProviderResult<()> {
        Err(ProviderError::ClipboardUnavailable {
            reason: self.reason.clone(),
        })
    }
}

#[async_trait]
impl WindowInspector for Unsupported {
    async fn active_window(&self) -> ProviderResult<WindowInfo> {
        Err(ProviderError::WindowInfoUnavailable {
            reason: self.reason.clone(),
        })
    }
}
