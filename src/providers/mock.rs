//! In-memory desktop for testing
//!
//! [`MockDesktop`] implements every capability trait without touching the
//! host. Each call is recorded as a [`MockCall`] so tests can assert exactly
//! which side effects a request produced, or that none were produced at all.
//!
//! # Examples
//!
//! ```
//! use computer_use_mcp::providers::{InputSynthesizer, MockCall, MockDesktop, MouseButton};
//!
//! #[tokio::main]
//! async fn main() {
//!     let desktop = MockDesktop::new();
//!     desktop.click(100, 200, MouseButton::Left, 1).await.unwrap();
//!
//!     assert_eq!(
//!         desktop.calls(),
//!         vec![MockCall::Click { x: 100, y: 200, button: MouseButton::Left, count: 1 }]
//!     );
//! }
//! ```
//!
//! Builders inject latency ([`MockDesktop::with_delay`]), failures
//! ([`MockDesktop::with_error`]) and panics ([`MockDesktop::with_panic`]) to
//! exercise the dispatcher's timeout and fault handling.

use std::{
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use tokio::time::sleep;

use super::{
    Clipboard, CommandOutput, InputSynthesizer, MouseButton, RawCapture, ScreenCapture,
    ShellRunner, WindowInfo, WindowInspector, keys,
};
use crate::error::{ProviderError, ProviderResult};

/// One recorded provider call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// `capture_screen`
    CaptureScreen,
    /// `screen_size`
    ScreenSize,
    /// `cursor_position`
    CursorPosition,
    /// `move_cursor`
    MoveCursor { x: i32, y: i32 },
    /// `click`
    Click {
        x: i32,
        y: i32,
        button: MouseButton,
        count: u32,
    },
    /// `scroll`
    Scroll { x: i32, y: i32, dx: i32, dy: i32 },
    /// `drag`
    Drag {
        from: (i32, i32),
        to: (i32, i32),
        button: MouseButton,
    },
    /// `type_text`
    TypeText(String),
    /// `press_key`
    PressKey(String),
    /// `hotkey`
    Hotkey(Vec<String>),
    /// `key_down`
    KeyDown(String),
    /// `key_up`
    KeyUp(String),
    /// `get_text`
    GetClipboard,
    /// `set_text`
    SetClipboard(String),
    /// `run_command`
    RunCommand { command: String, timeout: Duration },
    /// `active_window`
    ActiveWindow,
}

#[derive(Debug)]
struct MockState {
    calls: Vec<MockCall>,
    cursor: (i32, i32),
    clipboard: String,
}

/// Mock desktop implementing every capability trait
#[derive(Debug)]
pub struct MockDesktop {
    state: Mutex<MockState>,
    screen_size: (u32, u32),
    capture_size: (u32, u32),
    delay: Option<Duration>,
    error_injection: Option<ProviderError>,
    panic_message: Option<String>,
    command_output: CommandOutput,
    window: WindowInfo,
}

impl Default for MockDesktop {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDesktop {
    /// Creates a 1920x1080 desktop with a matching capture
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                calls: Vec::new(),
                cursor: (0, 0),
                clipboard: String::new(),
            }),
            screen_size: (1920, 1080),
            capture_size: (1920, 1080),
            delay: None,
            error_injection: None,
            panic_message: None,
            command_output: CommandOutput::default(),
            window: WindowInfo {
                app_name: "MockApp".to_string(),
                window_title: "Mock Window".to_string(),
            },
        }
    }

    /// Sets the logical screen size
    pub fn with_screen_size(mut self, width: u32, height: u32) -> Self {
        self.screen_size = (width, height);
        self
    }

    /// Sets the physical capture size (e.g. 2x the screen for HiDPI)
    pub fn with_capture_size(mut self, width: u32, height: u32) -> Self {
        self.capture_size = (width, height);
        self
    }

    /// Delays every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fails every call with `error` (calls are still recorded)
    pub fn with_error(mut self, error: ProviderError) -> Self {
        self.error_injection = Some(error);
        self
    }

    /// Panics in every call
    pub fn with_panic(mut self, message: impl Into<String>) -> Self {
        self.panic_message = Some(message.into());
        self
    }

    /// Output returned by `run_command`
    pub fn with_command_output(mut self, output: CommandOutput) -> Self {
        self.command_output = output;
        self
    }

    /// Window returned by `active_window`
    pub fn with_window(mut self, app_name: &str, window_title: &str) -> Self {
        self.window = WindowInfo {
            app_name: app_name.to_string(),
            window_title: window_title.to_string(),
        };
        self
    }

    /// Every call recorded so far, in order
    pub fn calls(&self) -> Vec<MockCall> {
        self.state().calls.clone()
    }

    /// Number of calls recorded so far
    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    /// Forgets recorded calls
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Current clipboard text
    pub fn clipboard_text(&self) -> String {
        self.state().clipboard.clone()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn record(&self, call: MockCall) -> ProviderResult<()> {
        self.state().calls.push(call);

        if let Some(delay) = self.delay {
            sleep(delay).await;
        }
        if let Some(message) = &self.panic_message {
            panic!("{}", message);
        }
        match &self.error_injection {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ScreenCapture for MockDesktop {
    async fn capture_screen(&self) -> ProviderResult<RawCapture> {
        self.record(MockCall::CaptureScreen).await?;
        let (width, height) = self.capture_size;
        Ok(RawCapture::test_pattern(width, height))
    }
}

#[async_trait]
impl InputSynthesizer for MockDesktop {
    async fn screen_size(&self) -> ProviderResult<(u32, u32)> {
        self.record(MockCall::ScreenSize).await?;
        Ok(self.screen_size)
    }

    async fn cursor_position(&self) -> ProviderResult<(i32, i32)> {
        self.record(MockCall::CursorPosition).await?;
        Ok(self.state().cursor)
    }

    async fn move_cursor(&self, x: i32, y: i32) -> ProviderResult<()> {
        self.record(MockCall::MoveCursor { x, y }).await?;
        self.state().cursor = (x, y);
        Ok(())
    }

    async fn click(&self, x: i32, y: i32, button: MouseButton, count: u32) -> ProviderResult<()> {
        self.record(MockCall::Click {
            x,
            y,
            button,
            count,
        })
        .await?;
        self.state().cursor = (x, y);
        Ok(())
    }

    async fn scroll(&self, x: i32, y: i32, dx: i32, dy: i32) -> ProviderResult<()> {
        self.record(MockCall::Scroll { x, y, dx, dy }).await?;
        self.state().cursor = (x, y);
        Ok(())
    }

    async fn drag(
        &self,
        from: (i32, i32),
        to: (i32, i32),
        button: MouseButton,
    ) -> ProviderResult<()> {
        self.record(MockCall::Drag { from, to, button }).await?;
        self.state().cursor = to;
        Ok(())
    }

    async fn type_text(&self, text: &str) -> ProviderResult<()> {
        self.record(MockCall::TypeText(text.to_string())).await
    }

    async fn press_key(&self, key: &str) -> ProviderResult<()> {
        self.record(MockCall::PressKey(key.to_string())).await?;
        keys::to_keysym(key).map(|_| ())
    }

    async fn hotkey(&self, keys: &[String]) -> ProviderResult<()> {
        self.record(MockCall::Hotkey(keys.to_vec())).await?;
        keys::chord_to_keysyms(keys).map(|_| ())
    }

    async fn key_down(&self, key: &str) -> ProviderResult<()> {
        self.record(MockCall::KeyDown(key.to_string())).await?;
        keys::to_keysym(key).map(|_| ())
    }

    async fn key_up(&self, key: &str) -> ProviderResult<()> {
        self.record(MockCall::KeyUp(key.to_string())).await?;
        keys::to_keysym(key).map(|_| ())
    }
}

#[async_trait]
impl Clipboard for MockDesktop {
    async fn get_text(&self) -> ProviderResult<String> {
        self.record(MockCall::GetClipboard).await?;
        Ok(self.clipboard_text())
    }

    async fn set_text(&self, text: &str) -> ProviderResult<()> {
        self.record(MockCall::SetClipboard(text.to_string())).await?;
        self.state().clipboard = text.to_string();
        Ok(())
    }
}

#[async_trait]
impl ShellRunner for MockDesktop {
    async fn run_command(&self, command: &str, timeout: Duration) -> ProviderResult<CommandOutput> {
        self.record(MockCall::RunCommand {
            command: command.to_string(),
            timeout,
        })
        .await?;
        Ok(self.command_output.clone())
    }
}

#[async_trait]
impl WindowInspector for MockDesktop {
    async fn active_window(&self) -> ProviderResult<WindowInfo> {
        self.record(MockCall::ActiveWindow).await?;
        Ok(self.window.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_records_calls_in_order() {
        let desktop = MockDesktop::new();
        desktop.move_cursor(1, 2).await.unwrap();
        desktop.scroll(3, 4, 0, -5).await.unwrap();
        desktop.type_text("hi").await.unwrap();

        assert_eq!(
            desktop.calls(),
            vec![
                MockCall::MoveCursor { x: 1, y: 2 },
                MockCall::Scroll {
                    x: 3,
                    y: 4,
                    dx: 0,
                    dy: -5
                },
                MockCall::TypeText("hi".to_string()),
            ]
        );
        assert_eq!(desktop.cursor_position().await.unwrap(), (3, 4));

        desktop.clear_calls();
        assert_eq!(desktop.call_count(), 0);
    }

    #[tokio::test]
    async fn test_capture_uses_capture_size() {
        let desktop = MockDesktop::new()
            .with_screen_size(100, 50)
            .with_capture_size(200, 100);
        let capture = desktop.capture_screen().await.unwrap();
        assert_eq!((capture.width, capture.height), (200, 100));
        assert_eq!(desktop.screen_size().await.unwrap(), (100, 50));
    }

    #[tokio::test]
    async fn test_error_injection() {
        let desktop = MockDesktop::new().with_error(ProviderError::InputUnavailable {
            reason: "no accessibility permission".to_string(),
        });
        let err = desktop.click(1, 1, MouseButton::Left, 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputUnavailable);
        assert_eq!(desktop.call_count(), 1);
    }

    #[tokio::test]
    async fn test_with_delay() {
        let desktop = MockDesktop::new().with_delay(Duration::from_millis(50));
        let start = Instant::now();
        desktop.screen_size().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_unknown_keys_are_rejected() {
        let desktop = MockDesktop::new();
        let err = desktop.press_key("hyper").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownKeyName);

        let chord = vec!["ctrl".to_string(), "c".to_string()];
        desktop.hotkey(&chord).await.unwrap();
    }

    #[tokio::test]
    async fn test_clipboard_round_trip() {
        let desktop = MockDesktop::new();
        desktop.set_text("copied").await.unwrap();
        assert_eq!(desktop.get_text().await.unwrap(), "copied");
        assert_eq!(desktop.clipboard_text(), "copied");
    }

    #[tokio::test]
    async fn test_command_output_and_window() {
        let desktop = MockDesktop::new()
            .with_command_output(CommandOutput {
                stdout: "ok\n".to_string(),
                stderr: String::new(),
                exit_code: 0,
            })
            .with_window("Terminal", "~/src");

        let output = desktop
            .run_command("echo ok", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(output.stdout, "ok\n");

        let window = desktop.active_window().await.unwrap();
        assert_eq!(window.app_name, "Terminal");
        assert_eq!(window.window_title, "~/src");
    }
}
