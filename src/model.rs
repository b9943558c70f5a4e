//! Core data types for requests, responses and screenshots
//!
//! A [`Request`] names a tool and carries raw JSON arguments. After schema
//! validation the arguments become [`Arguments`], a typed map of
//! [`ArgValue`]s with defaults filled in. Handlers return a [`ToolOutput`]
//! which the dispatcher wraps into a [`Response`] correlated by request id.

use std::collections::BTreeMap;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ErrorKind, ToolError, ToolResult};

/// Scalar or array argument value after validation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ArgValue {
    /// Integer value (integral floats are accepted as integers)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    Str(String),
    /// Boolean value
    Bool(bool),
    /// Homogeneous array
    Array(Vec<ArgValue>),
}

impl ArgValue {
    /// JSON type name used in validation messages
    pub fn type_name(&self) -> &'static str {
        match self {
            ArgValue::Int(_) => "integer",
            ArgValue::Float(_) => "number",
            ArgValue::Str(_) => "string",
            ArgValue::Bool(_) => "boolean",
            ArgValue::Array(_) => "array",
        }
    }

    /// Converts back to JSON
    pub fn to_json(&self) -> Value {
        match self {
            ArgValue::Int(i) => Value::from(*i),
            ArgValue::Float(f) => Value::from(*f),
            ArgValue::Str(s) => Value::from(s.as_str()),
            ArgValue::Bool(b) => Value::from(*b),
            ArgValue::Array(items) => Value::Array(items.iter().map(ArgValue::to_json).collect()),
        }
    }
}

/// Validated tool arguments with defaults applied
///
/// Accessors return [`ErrorKind::InvalidArgument`] errors, but handlers only
/// see arguments that already passed schema validation, so a failure here
/// indicates a mismatch between a tool's schema and its handler.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Arguments(BTreeMap<String, ArgValue>);

impl Arguments {
    /// Creates an empty argument map
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value
    pub fn insert(&mut self, name: impl Into<String>, value: ArgValue) {
        self.0.insert(name.into(), value);
    }

    /// Returns the raw value for `name`
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.0.get(name)
    }

    /// Number of arguments present
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no arguments are present
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn require(&self, name: &str) -> ToolResult<&ArgValue> {
        self.0
            .get(name)
            .ok_or_else(|| ToolError::invalid_argument(name, "missing required argument"))
    }

    /// Integer argument
    pub fn int(&self, name: &str) -> ToolResult<i64> {
        match self.require(name)? {
            ArgValue::Int(i) => Ok(*i),
            other => Err(ToolError::invalid_argument(
                name,
                format!("expected integer, got {}", other.type_name()),
            )),
        }
    }

    /// Integer argument narrowed to `i32`
    pub fn i32(&self, name: &str) -> ToolResult<i32> {
        let value = self.int(name)?;
        i32::try_from(value)
            .map_err(|_| ToolError::invalid_argument(name, format!("{} is out of range", value)))
    }

    /// String argument
    pub fn str(&self, name: &str) -> ToolResult<&str> {
        match self.require(name)? {
            ArgValue::Str(s) => Ok(s),
            other => Err(ToolError::invalid_argument(
                name,
                format!("expected string, got {}", other.type_name()),
            )),
        }
    }

    /// Boolean argument
    pub fn bool(&self, name: &str) -> ToolResult<bool> {
        match self.require(name)? {
            ArgValue::Bool(b) => Ok(*b),
            other => Err(ToolError::invalid_argument(
                name,
                format!("expected boolean, got {}", other.type_name()),
            )),
        }
    }

    /// String array argument
    pub fn str_list(&self, name: &str) -> ToolResult<Vec<String>> {
        match self.require(name)? {
            ArgValue::Array(items) => items
                .iter()
                .map(|item| match item {
                    ArgValue::Str(s) => Ok(s.clone()),
                    other => Err(ToolError::invalid_argument(
                        name,
                        format!("expected array of strings, found {}", other.type_name()),
                    )),
                })
                .collect(),
            other => Err(ToolError::invalid_argument(
                name,
                format!("expected array, got {}", other.type_name()),
            )),
        }
    }

    /// Converts back to a JSON object
    pub fn to_json(&self) -> Map<String, Value> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect()
    }
}

/// Decoded request envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Opaque correlation id echoed back in the response
    #[serde(default)]
    pub request_id: Value,
    /// Name of the tool to invoke
    pub tool_name: String,
    /// Raw arguments, validated against the tool's schema before execution
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl Request {
    /// Creates a request
    pub fn new(request_id: impl Into<Value>, tool_name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            request_id: request_id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }

    /// Decodes one envelope
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ProtocolError`] if the text is not JSON, is not an
    /// object, lacks `tool_name`, or carries non-object `arguments`. The
    /// request id, when it could be recovered, is returned alongside so the
    /// Failure response stays correlated.
    pub fn decode(raw: &str) -> Result<Self, (Value, ToolError)> {
        let mut value: Value = serde_json::from_str(raw.trim()).map_err(|e| {
            (
                Value::Null,
                ToolError::protocol(format!("Request is not valid JSON: {}", e)),
            )
        })?;

        let request_id = value.get("request_id").cloned().unwrap_or(Value::Null);
        if !value.is_object() {
            return Err((
                request_id,
                ToolError::protocol("Request must be a JSON object"),
            ));
        }
        let null_arguments = match value.get("arguments") {
            None | Some(Value::Object(_)) => false,
            Some(Value::Null) => true,
            Some(_) => {
                return Err((
                    request_id,
                    ToolError::protocol("'arguments' must be an object"),
                ));
            }
        };
        if null_arguments {
            if let Some(map) = value.as_object_mut() {
                map.remove("arguments");
            }
        }

        serde_json::from_value(value).map_err(|e| {
            (
                request_id,
                ToolError::protocol(format!("Malformed request envelope: {}", e)),
            )
        })
    }
}

/// Error payload of a Failure response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ErrorDetail {
    /// Machine-matchable kind
    pub kind: ErrorKind,
    /// Human-readable message
    pub message: String,
    /// Structured detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
    /// Suggested remediation
    pub hint: String,
}

impl From<&ToolError> for ErrorDetail {
    fn from(error: &ToolError) -> Self {
        Self {
            kind: error.kind(),
            message: error.message().to_string(),
            detail: error.detail().cloned(),
            hint: error.remediation_hint().to_string(),
        }
    }
}

/// Normalized screenshot ready for transmission
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenshotResult {
    /// Lossless PNG bytes
    pub encoded_image: Vec<u8>,
    /// Logical screen width in input coordinates
    pub logical_width: u32,
    /// Logical screen height in input coordinates
    pub logical_height: u32,
    /// Encoded image width
    pub image_width: u32,
    /// Encoded image height
    pub image_height: u32,
    /// Logical pixels per image pixel, horizontally
    pub scale_x: f64,
    /// Logical pixels per image pixel, vertically
    pub scale_y: f64,
}

impl ScreenshotResult {
    /// Maps image-space coordinates to logical screen coordinates
    pub fn to_screen(&self, image_x: f64, image_y: f64) -> (f64, f64) {
        (image_x * self.scale_x, image_y * self.scale_y)
    }

    /// Metadata sent alongside the image
    pub fn metadata(&self) -> ScreenshotMetadata {
        ScreenshotMetadata {
            width: self.logical_width,
            height: self.logical_height,
            screen_width: self.logical_width,
            screen_height: self.logical_height,
            image_width: self.image_width,
            image_height: self.image_height,
            scale_x: self.scale_x,
            scale_y: self.scale_y,
        }
    }
}

/// Coordinate mapping metadata for a screenshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScreenshotMetadata {
    /// Logical screen width, the space mouse coordinates live in
    pub width: u32,
    /// Logical screen height
    pub height: u32,
    /// Logical screen width
    pub screen_width: u32,
    /// Logical screen height
    pub screen_height: u32,
    /// Encoded image width
    pub image_width: u32,
    /// Encoded image height
    pub image_height: u32,
    /// Multiply image x by this to get screen x
    pub scale_x: f64,
    /// Multiply image y by this to get screen y
    pub scale_y: f64,
}

/// Successful handler output
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// Structured result
    Json(Value),
    /// Screenshot image plus coordinate metadata
    Screenshot(ScreenshotResult),
}

impl ToolOutput {
    /// JSON payload for the line transport; images are base64 encoded
    pub fn to_payload(&self) -> Value {
        match self {
            ToolOutput::Json(value) => value.clone(),
            ToolOutput::Screenshot(shot) => {
                let mut payload = serde_json::to_value(shot.metadata()).unwrap_or_default();
                if let Value::Object(map) = &mut payload {
                    map.insert(
                        "image".to_string(),
                        serde_json::json!({
                            "mime_type": crate::normalize::PNG_MIME_TYPE,
                            "data": STANDARD.encode(&shot.encoded_image),
                        }),
                    );
                }
                payload
            }
        }
    }

    /// Summary used by the execution logger; never contains image bytes
    pub fn log_summary(&self) -> Value {
        match self {
            ToolOutput::Json(value) => value.clone(),
            ToolOutput::Screenshot(shot) => serde_json::json!({
                "type": "image",
                "format": "png",
                "bytes": shot.encoded_image.len(),
                "metadata": shot.metadata(),
            }),
        }
    }
}

/// Outcome of one request
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Handler finished and produced output
    Success(ToolOutput),
    /// Request was rejected or the handler failed
    Failure(ErrorDetail),
}

/// Response correlated to exactly one request
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Echo of the request id
    pub request_id: Value,
    /// Success or failure
    pub outcome: Outcome,
}

impl Response {
    /// Successful response
    pub fn success(request_id: Value, output: ToolOutput) -> Self {
        Self {
            request_id,
            outcome: Outcome::Success(output),
        }
    }

    /// Failure response
    pub fn failure(request_id: Value, error: &ToolError) -> Self {
        Self {
            request_id,
            outcome: Outcome::Failure(ErrorDetail::from(error)),
        }
    }

    /// Whether the request succeeded
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success(_))
    }

    /// Failure kind, if any
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match &self.outcome {
            Outcome::Failure(detail) => Some(detail.kind),
            Outcome::Success(_) => None,
        }
    }

    /// Wire form of this response
    pub fn to_envelope(&self) -> ResponseEnvelope {
        match &self.outcome {
            Outcome::Success(output) => ResponseEnvelope {
                request_id: self.request_id.clone(),
                status: ResponseStatus::Success,
                payload: Some(output.to_payload()),
                error_detail: None,
            },
            Outcome::Failure(detail) => ResponseEnvelope {
                request_id: self.request_id.clone(),
                status: ResponseStatus::Error,
                payload: None,
                error_detail: Some(detail.clone()),
            },
        }
    }
}

/// Response status on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    /// Handler produced output
    Success,
    /// Request failed
    Error,
}

/// Serialized response envelope written to the protocol stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResponseEnvelope {
    /// Echo of the request id (null if it could not be decoded)
    pub request_id: Value,
    /// Success or failure
    pub status: ResponseStatus,
    /// Success payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Failure detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<ErrorDetail>,
}
