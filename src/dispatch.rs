//! Request dispatch
//!
//! [`Dispatcher::handle`] turns one [`Request`] into exactly one
//! [`Response`]:
//!
//! 1. resolve the tool (`UnknownTool`)
//! 2. validate arguments against its schema (`InvalidArgument`), before any
//!    side effect
//! 3. run the handler under the configured timeout (`TimedOut`), converting
//!    panics into `ToolExecutionError`
//!
//! Requests are executed one at a time, in the order they reach the
//! dispatcher. Desktop input is a shared resource: interleaving two clicks
//! or two typed strings would corrupt both.

use std::{panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures::FutureExt;
use tokio::sync::Mutex;

use crate::{
    config::ServerConfig,
    error::{ToolError, ToolResult},
    logger::ExecutionLogger,
    model::{Request, Response, ToolOutput},
    registry::ToolRegistry,
    tools::ToolContext,
};

/// Executes requests against a tool registry
#[derive(Debug)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    context: ToolContext,
    logger: ExecutionLogger,
    timeout: Duration,
    // FIFO: tokio's mutex queues waiters in arrival order.
    gate: Mutex<()>,
}

impl Dispatcher {
    /// Creates a dispatcher with the timeout and logging settings of `config`
    pub fn new(registry: ToolRegistry, context: ToolContext, config: &ServerConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            context,
            logger: ExecutionLogger::from_config(config),
            timeout: config.tool_timeout,
            gate: Mutex::new(()),
        }
    }

    /// Replaces the execution logger
    pub fn with_logger(mut self, logger: ExecutionLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Overrides the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Registered tools
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Handler context
    pub fn context(&self) -> &ToolContext {
        &self.context
    }

    /// Per-call timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Decodes a raw envelope and handles it
    ///
    /// A malformed envelope yields a `ProtocolError` response carrying
    /// whatever request id could be recovered.
    pub async fn handle_raw(&self, raw: &str) -> Response {
        match Request::decode(raw) {
            Ok(request) => self.handle(request).await,
            Err((request_id, error)) => {
                tracing::debug!("Rejected malformed request: {}", error);
                Response::failure(request_id, &error)
            }
        }
    }

    /// Handles one request
    ///
    /// Never fails: every error becomes a Failure response with the request
    /// id echoed back.
    pub async fn handle(&self, request: Request) -> Response {
        let _turn = self.gate.lock().await;
        match self.execute(&request).await {
            Ok(output) => Response::success(request.request_id, output),
            Err(error) => Response::failure(request.request_id, &error),
        }
    }

    async fn execute(&self, request: &Request) -> ToolResult<ToolOutput> {
        let spec = match self.registry.resolve(&request.tool_name) {
            Ok(spec) => spec,
            Err(e) => {
                let error = ToolError::from(e);
                self.logger.rejected(&request.tool_name, &error);
                return Err(error);
            }
        };

        let args = match spec.validate(&request.arguments) {
            Ok(args) => args,
            Err(error) => {
                self.logger.rejected(spec.name, &error);
                return Err(error);
            }
        };

        let scope = self.logger.begin(spec.name, &request.arguments);
        let call = AssertUnwindSafe(spec.handler.call(&self.context, &args)).catch_unwind();
        let result = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(ToolError::execution(format!(
                "Tool '{}' panicked: {}",
                spec.name,
                panic_message(panic.as_ref())
            ))),
            Err(_) => Err(ToolError::timed_out(spec.name, self.timeout)),
        };
        scope.finish(&result);
        result
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
