//! Real screen capture through the `xcap` crate
//!
//! Captures the primary monitor at physical resolution. `xcap` is blocking,
//! so capture runs on tokio's blocking pool.

use async_trait::async_trait;

use super::{RawCapture, ScreenCapture};
use crate::error::{ProviderError, ProviderResult};

/// [`ScreenCapture`] for the primary monitor
#[derive(Debug, Clone, Default)]
pub struct XcapCapture;

impl XcapCapture {
    /// Creates the capture provider
    pub fn new() -> Self {
        Self
    }
}

fn unavailable(error: impl std::fmt::Display) -> ProviderError {
    ProviderError::CaptureUnavailable {
        reason: error.to_string(),
    }
}

fn capture_primary() -> ProviderResult<RawCapture> {
    let mut monitors = xcap::Monitor::all().map_err(unavailable)?;
    if monitors.is_empty() {
        return Err(unavailable("no monitors found"));
    }
    let index = monitors
        .iter()
        .position(|m| m.is_primary().unwrap_or(false))
        .unwrap_or(0);
    let monitor = monitors.swap_remove(index);

    let image = monitor.capture_image().map_err(unavailable)?;
    let (width, height) = (image.width(), image.height());
    tracing::debug!("Captured primary monitor at {}x{}", width, height);
    Ok(RawCapture::rgba(width, height, image.into_raw()))
}

#[async_trait]
impl ScreenCapture for XcapCapture {
    async fn capture_screen(&self) -> ProviderResult<RawCapture> {
        tokio::task::spawn_blocking(capture_primary)
            .await
            .map_err(|e| ProviderError::failed("capture_screen", e.to_string()))?
    }
}
