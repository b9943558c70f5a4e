//! Screen observation tools

use serde_json::json;

use super::{ToolContext, handler_fn};
use crate::{
    error::{ToolError, ToolResult},
    model::{Arguments, ToolOutput},
    normalize,
    registry::{SideEffect, ToolSpec},
};

pub(super) fn specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new(
            "take_screenshot",
            "Capture the current screen as a PNG image. Always call this first to see the \
             desktop before acting. The accompanying metadata gives scale_x/scale_y: multiply \
             image coordinates by them to get screen coordinates for mouse tools.",
            SideEffect::ReadOnly,
            handler_fn(take_screenshot),
        ),
        ToolSpec::new(
            "get_screen_info",
            "Return the logical screen size and the current cursor position.",
            SideEffect::ReadOnly,
            handler_fn(get_screen_info),
        ),
        ToolSpec::new(
            "get_cursor_position",
            "Return the current (x, y) position of the mouse cursor.",
            SideEffect::ReadOnly,
            handler_fn(get_cursor_position),
        ),
        ToolSpec::new(
            "get_active_window_info",
            "Return the name of the frontmost application and the title of its window.",
            SideEffect::ReadOnly,
            handler_fn(get_active_window_info),
        ),
    ]
}

/// Captures the screen and normalizes it for transmission
pub async fn take_screenshot(ctx: ToolContext, _args: Arguments) -> ToolResult<ToolOutput> {
    // Without a logical size the capture size is used as-is.
    let (screen_width, screen_height) = match ctx.providers.input.screen_size().await {
        Ok(size) => size,
        Err(e) => {
            tracing::debug!("Screen size unavailable, using capture size: {}", e);
            (0, 0)
        }
    };
    let raw = ctx.providers.capture.capture_screen().await?;

    let max_edge = ctx.config.max_screenshot_edge;
    let level = ctx.config.png_compress_level;
    let shot = tokio::task::spawn_blocking(move || {
        normalize::normalize(&raw, screen_width, screen_height, max_edge, level)
    })
    .await
    .map_err(|e| ToolError::execution(format!("Screenshot encoding task failed: {}", e)))??;

    Ok(ToolOutput::Screenshot(shot))
}

async fn get_screen_info(ctx: ToolContext, _args: Arguments) -> ToolResult<ToolOutput> {
    let (width, height) = ctx.providers.input.screen_size().await?;
    let (x, y) = ctx.providers.input.cursor_position().await?;
    Ok(ToolOutput::Json(json!({
        "success": true,
        "screen_width": width,
        "screen_height": height,
        "cursor_x": x,
        "cursor_y": y,
    })))
}

async fn get_cursor_position(ctx: ToolContext, _args: Arguments) -> ToolResult<ToolOutput> {
    let (x, y) = ctx.providers.input.cursor_position().await?;
    Ok(ToolOutput::Json(json!({ "success": true, "x": x, "y": y })))
}

async fn get_active_window_info(ctx: ToolContext, _args: Arguments) -> ToolResult<ToolOutput> {
    let window = ctx.providers.windows.active_window().await?;
    Ok(ToolOutput::Json(json!({
        "success": true,
        "app_name": window.app_name,
        "window_title": window.window_title,
    })))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::ServerConfig,
        error::{ErrorKind, ProviderError},
        providers::{MockCall, MockDesktop, Providers},
    };

    fn context(desktop: MockDesktop, config: ServerConfig) -> (Arc<MockDesktop>, ToolContext) {
        let desktop = Arc::new(desktop);
        let ctx = ToolContext::new(Providers::mock(desktop.clone()), config);
        (desktop, ctx)
    }

    #[tokio::test]
    async fn test_take_screenshot_downscales() {
        let (desktop, ctx) = context(
            MockDesktop::new()
                .with_screen_size(400, 200)
                .with_capture_size(400, 200),
            ServerConfig::builder().max_screenshot_edge(100).build(),
        );

        let output = take_screenshot(ctx, Arguments::new()).await.unwrap();
        let ToolOutput::Screenshot(shot) = output else {
            panic!("expected a screenshot");
        };
        assert_eq!((shot.image_width, shot.image_height), (100, 50));
        assert_eq!((shot.scale_x, shot.scale_y), (4.0, 4.0));
        assert_eq!(
            desktop.calls(),
            vec![MockCall::ScreenSize, MockCall::CaptureScreen]
        );
    }

    #[tokio::test]
    async fn test_take_screenshot_hidpi() {
        let (_, ctx) = context(
            MockDesktop::new()
                .with_screen_size(100, 50)
                .with_capture_size(200, 100),
            ServerConfig::default(),
        );

        let ToolOutput::Screenshot(shot) = take_screenshot(ctx, Arguments::new()).await.unwrap()
        else {
            panic!("expected a screenshot");
        };
        assert_eq!((shot.image_width, shot.image_height), (100, 50));
        assert_eq!(shot.scale_x, 1.0);
    }

    #[tokio::test]
    async fn test_take_screenshot_empty_capture() {
        let (_, ctx) = context(
            MockDesktop::new().with_capture_size(0, 0),
            ServerConfig::default(),
        );
        let err = take_screenshot(ctx, Arguments::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyCaptureError);
    }

    #[tokio::test]
    async fn test_capture_unavailable() {
        let (_, ctx) = context(
            MockDesktop::new().with_error(ProviderError::CaptureUnavailable {
                reason: "screen recording permission denied".to_string(),
            }),
            ServerConfig::default(),
        );
        let err = take_screenshot(ctx, Arguments::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CaptureUnavailable);
    }

    #[tokio::test]
    async fn test_screen_info_and_cursor() {
        let (desktop, ctx) = context(
            MockDesktop::new().with_screen_size(1440, 900),
            ServerConfig::default(),
        );
        ctx.providers.input.move_cursor(10, 20).await.unwrap();

        let ToolOutput::Json(info) = get_screen_info(ctx.clone(), Arguments::new()).await.unwrap()
        else {
            panic!("expected JSON");
        };
        assert_eq!(info["screen_width"], 1440);
        assert_eq!(info["cursor_x"], 10);

        let ToolOutput::Json(pos) = get_cursor_position(ctx, Arguments::new()).await.unwrap()
        else {
            panic!("expected JSON");
        };
        assert_eq!(pos, json!({"success": true, "x": 10, "y": 20}));
        assert_eq!(desktop.call_count(), 4);
    }

    #[tokio::test]
    async fn test_active_window_info() {
        let (_, ctx) = context(
            MockDesktop::new().with_window("Firefox", "Docs"),
            ServerConfig::default(),
        );
        let ToolOutput::Json(info) = get_active_window_info(ctx, Arguments::new())
            .await
            .unwrap()
        else {
            panic!("expected JSON");
        };
        assert_eq!(info["app_name"], "Firefox");
        assert_eq!(info["window_title"], "Docs");
    }
}
