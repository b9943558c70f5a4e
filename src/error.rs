//! Error types for tool dispatch and capability providers
//!
//! Errors are layered the same way the runtime is:
//!
//! - [`ProviderError`] - raised by a capability provider (capture, input,
//!   clipboard, shell, window inspection)
//! - [`CaptureError`] - raised by the screenshot normalizer
//! - [`RegistryError`] - raised by the tool registry
//! - [`ToolError`] - the dispatch-level error that ends up in a Failure
//!   response; every lower error converts into it
//!
//! Every [`ToolError`] carries a machine-matchable [`ErrorKind`], a
//! human-readable message, optional structured detail and a remediation hint.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result type alias for provider calls
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Result type alias for normalizer operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Result type alias for dispatch-level operations
pub type ToolResult<T> = Result<T, ToolError>;

/// Machine-matchable error taxonomy carried by every Failure response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ErrorKind {
    /// Malformed request envelope
    ProtocolError,
    /// No tool registered under the requested name
    UnknownTool,
    /// Arguments violate the tool's schema; nothing was executed
    InvalidArgument,
    /// The handler or its provider failed
    ToolExecutionError,
    /// Screen capture denied or not available in this environment
    CaptureUnavailable,
    /// Input synthesis denied or not available in this environment
    InputUnavailable,
    /// Key name not recognized by the input backend
    UnknownKeyName,
    /// The call did not finish within its timeout
    TimedOut,
    /// The capture had no pixels or an inconsistent pixel buffer
    EmptyCaptureError,
}

impl ErrorKind {
    /// Returns the kind as it appears on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ProtocolError => "ProtocolError",
            ErrorKind::UnknownTool => "UnknownTool",
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::ToolExecutionError => "ToolExecutionError",
            ErrorKind::CaptureUnavailable => "CaptureUnavailable",
            ErrorKind::InputUnavailable => "InputUnavailable",
            ErrorKind::UnknownKeyName => "UnknownKeyName",
            ErrorKind::TimedOut => "TimedOut",
            ErrorKind::EmptyCaptureError => "EmptyCaptureError",
        }
    }

    /// Whether retrying the identical request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorKind::TimedOut | ErrorKind::ToolExecutionError)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure reported by a capability provider
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Screen capture is denied or no capture backend is available
    #[error("Screen capture unavailable: {reason}")]
    CaptureUnavailable {
        /// Why capture is unavailable
        reason: String,
    },

    /// Input synthesis is denied or no input backend is available
    #[error("Input synthesis unavailable: {reason}")]
    InputUnavailable {
        /// Why input synthesis is unavailable
        reason: String,
    },

    /// The input backend does not know this key
    #[error("Unknown key name '{name}'")]
    UnknownKeyName {
        /// The rejected key name
        name: String,
    },

    /// Clipboard could not be read or written
    #[error("Clipboard unavailable: {reason}")]
    ClipboardUnavailable {
        /// Why the clipboard is unavailable
        reason: String,
    },

    /// Active window information is not available (e.g. no desktop session)
    #[error("Active window information unavailable: {reason}")]
    WindowInfoUnavailable {
        /// Why window information is unavailable
        reason: String,
    },

    /// A shell command exceeded its own timeout and was killed
    #[error("Command timed out after {seconds}s")]
    CommandTimedOut {
        /// The timeout that was exceeded
        seconds: u64,
    },

    /// Any other provider failure
    #[error("{operation} failed: {reason}")]
    Failed {
        /// Provider operation that failed
        operation: String,
        /// Provider message
        reason: String,
    },
}

impl ProviderError {
    /// Shorthand for [`ProviderError::Failed`]
    pub fn failed(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        ProviderError::Failed {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Error kind this provider failure surfaces as
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::CaptureUnavailable { .. } => ErrorKind::CaptureUnavailable,
            ProviderError::InputUnavailable { .. } => ErrorKind::InputUnavailable,
            ProviderError::ClipboardUnavailable { .. } => ErrorKind::InputUnavailable,
            ProviderError::UnknownKeyName { .. } => ErrorKind::UnknownKeyName,
            ProviderError::CommandTimedOut { .. } => ErrorKind::TimedOut,
            ProviderError::WindowInfoUnavailable { .. } | ProviderError::Failed { .. } => {
                ErrorKind::ToolExecutionError
            }
        }
    }
}

/// Failure raised while normalizing a raw capture
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    /// The capture has zero width or height
    #[error("Capture is empty ({width}x{height})")]
    EmptyCapture {
        /// Raw capture width
        width: u32,
        /// Raw capture height
        height: u32,
    },

    /// The pixel buffer does not match the declared dimensions
    #[error(
        "Capture pixel buffer holds {actual} bytes but {width}x{height} needs {expected}"
    )]
    MalformedCapture {
        /// Raw capture width
        width: u32,
        /// Raw capture height
        height: u32,
        /// Byte length implied by the dimensions
        expected: usize,
        /// Byte length actually provided
        actual: usize,
    },

    /// PNG encoding failed
    #[error("Failed to encode screenshot as PNG: {reason}")]
    EncodingFailed {
        /// Encoder message
        reason: String,
    },
}

impl CaptureError {
    /// Error kind this normalizer failure surfaces as
    pub fn kind(&self) -> ErrorKind {
        match self {
            CaptureError::EmptyCapture { .. } | CaptureError::MalformedCapture { .. } => {
                ErrorKind::EmptyCaptureError
            }
            CaptureError::EncodingFailed { .. } => ErrorKind::ToolExecutionError,
        }
    }
}

/// Failure raised by the tool registry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A tool with the same name is already registered
    #[error("Tool '{name}' is already registered")]
    DuplicateTool {
        /// Conflicting tool name
        name: String,
    },

    /// No tool is registered under this name
    #[error("Unknown tool '{name}'")]
    UnknownTool {
        /// Requested tool name
        name: String,
    },
}

/// Dispatch-level error carried by a Failure response
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ToolError {
    kind: ErrorKind,
    message: String,
    detail: Option<Value>,
}

impl ToolError {
    /// Creates an error of the given kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    /// Attaches structured detail
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Malformed envelope
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProtocolError, message)
    }

    /// Argument `parameter` violates the schema
    pub fn invalid_argument(parameter: &str, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(
            ErrorKind::InvalidArgument,
            format!("Invalid argument '{}': {}", parameter, reason),
        )
        .with_detail(serde_json::json!({
            "parameter": parameter,
            "reason": reason,
        }))
    }

    /// Handler failure that is not attributable to a provider
    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ToolExecutionError, message)
    }

    /// Handler exceeded the per-request timeout
    pub fn timed_out(tool: &str, timeout: std::time::Duration) -> Self {
        Self::new(
            ErrorKind::TimedOut,
            format!("Tool '{}' did not finish within {}s", tool, timeout.as_secs_f64()),
        )
        .with_detail(serde_json::json!({
            "tool": tool,
            "timeout_ms": u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }))
    }

    /// Machine-matchable kind
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human-readable message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Structured detail, if any
    pub fn detail(&self) -> Option<&Value> {
        self.detail.as_ref()
    }

    /// Suggests what the remote client can do about this failure
    pub fn remediation_hint(&self) -> &'static str {
        match self.kind {
            ErrorKind::ProtocolError => {
                "Send one JSON object per request with 'tool_name', 'arguments' and 'request_id'."
            }
            ErrorKind::UnknownTool => "List the available tools and retry with one of their names.",
            ErrorKind::InvalidArgument => {
                "Check the argument names, types and ranges against the tool's input schema."
            }
            ErrorKind::ToolExecutionError => {
                "The tool failed while running. Inspect the message, take a screenshot to check \
                 the current screen state, then retry."
            }
            ErrorKind::CaptureUnavailable => {
                "Grant screen recording permission to the process running this server (macOS: \
                 Privacy & Security > Screen Recording) or run it inside a desktop session."
            }
            ErrorKind::InputUnavailable => {
                "Grant accessibility permission to the process running this server (macOS: \
                 Privacy & Security > Accessibility). On Linux/X11 install xdotool and xclip."
            }
            ErrorKind::UnknownKeyName => {
                "Use key names such as 'enter', 'tab', 'esc', 'up', 'f5', 'ctrl', 'shift', 'alt', \
                 'cmd' or single characters."
            }
            ErrorKind::TimedOut => {
                "The call took too long. Retry, or raise the timeout for long-running commands."
            }
            ErrorKind::EmptyCaptureError => {
                "The screen capture returned no pixels. Check that a display is attached and \
                 awake, then retry."
            }
        }
    }
}

impl From<ProviderError> for ToolError {
    fn from(error: ProviderError) -> Self {
        let detail = match &error {
            ProviderError::UnknownKeyName { name } => Some(serde_json::json!({ "key": name })),
            ProviderError::CommandTimedOut { seconds } => {
                Some(serde_json::json!({ "timeout_secs": seconds }))
            }
            ProviderError::Failed { operation, .. } => {
                Some(serde_json::json!({ "operation": operation }))
            }
            _ => None,
        };
        Self {
            kind: error.kind(),
            message: error.to_string(),
            detail,
        }
    }
}

impl From<CaptureError> for ToolError {
    fn from(error: CaptureError) -> Self {
        let detail = match &error {
            CaptureError::EmptyCapture { width, height } => {
                Some(serde_json::json!({ "width": width, "height": height }))
            }
            CaptureError::MalformedCapture {
                expected, actual, ..
            } => Some(serde_json::json!({ "expected_bytes": expected, "actual_bytes": actual })),
            CaptureError::EncodingFailed { .. } => None,
        };
        Self {
            kind: error.kind(),
            message: error.to_string(),
            detail,
        }
    }
}

impl From<RegistryError> for ToolError {
    fn from(error: RegistryError) -> Self {
        match &error {
            RegistryError::UnknownTool { name } => {
                Self::new(ErrorKind::UnknownTool, error.to_string())
                    .with_detail(serde_json::json!({ "tool": name }))
            }
            RegistryError::DuplicateTool { .. } => Self::execution(error.to_string()),
        }
    }
}
