//! Built-in tools
//!
//! Each submodule defines the [`ToolSpec`]s for one capability group and the
//! async handlers behind them:
//!
//! - [`screen`]: screenshot, screen size, cursor position, active window
//! - [`mouse`]: move, click, double click, scroll, drag
//! - [`keyboard`]: type, press, hotkey, key down/up
//! - [`shell`]: run a shell command
//!
//! Handlers receive a [`ToolContext`] (providers plus configuration) and
//! [`Arguments`] that already passed schema validation.

use std::{future::Future, sync::Arc};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::{
    config::ServerConfig,
    error::{RegistryError, ToolResult},
    model::{Arguments, ToolOutput},
    providers::Providers,
    registry::ToolRegistry,
};

pub mod keyboard;
pub mod mouse;
pub mod screen;
pub mod shell;

/// Everything a handler may use
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Capability providers
    pub providers: Providers,
    /// Server configuration
    pub config: Arc<ServerConfig>,
}

impl ToolContext {
    /// Creates a context
    pub fn new(providers: Providers, config: ServerConfig) -> Self {
        Self {
            providers,
            config: Arc::new(config),
        }
    }
}

/// Executes one tool with validated arguments
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Runs the tool
    async fn call(&self, ctx: &ToolContext, args: &Arguments) -> ToolResult<ToolOutput>;
}

/// Adapts an async function or closure into a [`ToolHandler`]
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(ToolContext, Arguments) -> Fut + Send + Sync,
    Fut: Future<Output = ToolResult<ToolOutput>> + Send + 'static,
{
    async fn call(&self, ctx: &ToolContext, args: &Arguments) -> ToolResult<ToolOutput> {
        (self.0)(ctx.clone(), args.clone()).await
    }
}

/// Wraps `f` as a shareable handler
///
/// ```
/// use computer_use_mcp::{model::ToolOutput, tools::handler_fn};
///
/// let handler = handler_fn(|_ctx, _args| async { Ok(ToolOutput::Json(serde_json::json!({}))) });
/// # let _ = handler;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn ToolHandler>
where
    F: Fn(ToolContext, Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ToolResult<ToolOutput>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Registry holding every built-in tool in advertised order
///
/// # Errors
///
/// Returns [`RegistryError::DuplicateTool`] if two built-ins share a name.
pub fn builtin_registry() -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    for spec in screen::specs()
        .into_iter()
        .chain(mouse::specs())
        .chain(keyboard::specs())
        .chain(shell::specs())
    {
        registry.register(spec)?;
    }
    Ok(registry)
}

/// Standard payload of input tools: `{"success": true, "action": .., ..fields}`
pub(crate) fn action_ok(action: &str, fields: Value) -> ToolOutput {
    let mut payload = json!({
        "success": true,
        "action": action,
    });
    if let (Value::Object(out), Value::Object(fields)) = (&mut payload, fields) {
        out.extend(fields);
    }
    ToolOutput::Json(payload)
}
