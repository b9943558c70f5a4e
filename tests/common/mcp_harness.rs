//! MCP server test harness
//!
//! Wraps a [`ComputerUseServer`] over a [`MockDesktop`] and validates the
//! content blocks of tool results.
//!
//! ```rust,ignore
//! let ctx = McpTestContext::new_with_mock();
//! let result = ctx.call("take_screenshot", json!({})).await;
//! let parts = ContentValidator::validate_screenshot_result(&result).unwrap();
//! assert!(ContentValidator::is_valid_png(&parts.image_bytes));
//! ```

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use computer_use_mcp::{
    ComputerUseServer, Dispatcher, ServerConfig,
    providers::{MockDesktop, Providers},
    tools::{ToolContext, builtin_registry},
};
use rmcp::model::CallToolResult;
use serde_json::Value;

/// Test fixture for MCP server integration tests
pub struct McpTestContext {
    /// The MCP server instance
    pub server: ComputerUseServer,
    /// Desktop behind every provider, for call inspection
    pub desktop: Arc<MockDesktop>,
}

impl McpTestContext {
    /// Server over a default mock desktop with logging off
    pub fn new_with_mock() -> Self {
        Self::new_with_configured_mock(
            MockDesktop::new()
                .with_screen_size(320, 200)
                .with_capture_size(320, 200),
            ServerConfig::builder().log_enabled(false).build(),
        )
    }

    /// Server over a configured mock, for error, delay and HiDPI scenarios
    pub fn new_with_configured_mock(mock: MockDesktop, config: ServerConfig) -> Self {
        let desktop = Arc::new(mock);
        let context = ToolContext::new(Providers::mock(Arc::clone(&desktop)), config.clone());
        let registry = builtin_registry().expect("built-in tools have unique names");
        let dispatcher = Dispatcher::new(registry, context, &config);
        Self {
            server: ComputerUseServer::new(Arc::new(dispatcher)),
            desktop,
        }
    }

    /// Calls a tool with a JSON object literal (or `null` for no arguments)
    pub async fn call(&self, tool: &str, arguments: Value) -> CallToolResult {
        let arguments = match arguments {
            Value::Object(map) => Some(map),
            _ => None,
        };
        self.server.call(tool, arguments).await
    }
}

/// Parsed components of a screenshot result
#[derive(Debug)]
pub struct ScreenshotParts {
    /// Decoded PNG bytes
    pub image_bytes: Vec<u8>,
    /// Parsed coordinate metadata
    pub metadata: Value,
}

/// Validation utilities for MCP tool responses
pub struct ContentValidator;

impl ContentValidator {
    /// Decodes the base64 image in the first content block
    pub fn validate_base64_image(
        result: &CallToolResult,
        expected_mime: &str,
    ) -> Result<Vec<u8>, String> {
        let image_content = result.content.first().ok_or("Missing image content")?;
        let image = image_content
            .as_image()
            .ok_or("First content is not an image")?;

        if image.mime_type != expected_mime {
            return Err(format!(
                "Expected MIME type '{}', got '{}'",
                expected_mime, image.mime_type
            ));
        }

        STANDARD
            .decode(&image.data)
            .map_err(|e| format!("Invalid base64: {}", e))
    }

    /// Parses the text block at `index` as JSON
    pub fn json_block(result: &CallToolResult, index: usize) -> Result<Value, String> {
        let content = result
            .content
            .get(index)
            .ok_or_else(|| format!("Missing content block {}", index))?;
        let text = content
            .as_text()
            .ok_or_else(|| format!("Content block {} is not text", index))?;
        serde_json::from_str(&text.text).map_err(|e| format!("Invalid JSON: {}", e))
    }

    /// Validates a successful JSON result and returns its payload
    pub fn validate_json_result(result: &CallToolResult) -> Result<Value, String> {
        if result.is_error.unwrap_or(false) {
            return Err(format!("Result is marked as error: {:?}", result.content));
        }
        let payload = Self::json_block(result, 0)?;
        if payload["success"] != true {
            return Err(format!("Payload does not report success: {}", payload));
        }
        Ok(payload)
    }

    /// Validates an error result and returns its `{kind, message, hint}` body
    pub fn validate_error_result(result: &CallToolResult) -> Result<Value, String> {
        if !result.is_error.unwrap_or(false) {
            return Err("Result is not marked as error".to_string());
        }
        let detail = Self::json_block(result, 0)?;
        for field in ["kind", "message", "hint"] {
            if !detail[field].is_string() {
                return Err(format!("Error detail missing '{}': {}", field, detail));
            }
        }
        Ok(detail)
    }

    /// Validates a screenshot result: image block, then metadata block
    pub fn validate_screenshot_result(result: &CallToolResult) -> Result<ScreenshotParts, String> {
        if result.content.len() != 2 {
            return Err(format!("Expected 2 content items, got {}", result.content.len()));
        }
        if result.is_error.unwrap_or(false) {
            return Err("Result is marked as error".to_string());
        }

        let image_bytes = Self::validate_base64_image(result, "image/png")?;
        let metadata = Self::json_block(result, 1)?;
        for field in ["screen_width", "screen_height", "image_width", "image_height", "scale_x", "scale_y"] {
            if !metadata[field].is_number() {
                return Err(format!("Metadata missing '{}': {}", field, metadata));
            }
        }
        Ok(ScreenshotParts {
            image_bytes,
            metadata,
        })
    }

    /// Checks the PNG signature
    pub fn is_valid_png(bytes: &[u8]) -> bool {
        bytes.len() >= 8 && bytes.starts_with(&[0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a])
    }
}
