//! Execution logging
//!
//! Every tool invocation produces a `start` entry before the handler runs and
//! exactly one `end` entry afterwards, correlated by a per-process call id.
//! Entries are single-line JSON emitted as `tracing` events on the
//! [`EXEC_LOG_TARGET`] target, prefixed with [`LOG_PREFIX`], so they land on
//! stderr next to the rest of the server's diagnostics.
//!
//! Arguments and results are passed through [`sanitize`] before they are
//! logged: long strings are truncated, collections are capped, nesting is
//! bounded and image payloads are reduced to their size.
//!
//! When the logger is disabled it does no work at all: no formatting, no
//! sanitization and no writes.

use std::{
    borrow::Cow,
    sync::atomic::{AtomicU64, Ordering},
    time::Instant,
};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{config::ServerConfig, error::ToolError, model::ToolOutput};

/// `tracing` target of execution log events
pub const EXEC_LOG_TARGET: &str = "computer_use_mcp::exec";

/// Prefix of every execution log line
pub const LOG_PREFIX: &str = "[cu-mcp]";

/// Maximum items kept from a list
const MAX_LIST_ITEMS: usize = 10;
/// Maximum keys kept from an object
const MAX_OBJECT_KEYS: usize = 20;
/// Maximum nesting depth before values are elided
const MAX_DEPTH: usize = 3;

/// Phase of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Handler about to run
    Start,
    /// Handler finished or was abandoned
    End,
    /// Request rejected before the handler ran
    Rejected,
}

/// How a call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Handler returned output
    Ok,
    /// Handler returned an error, panicked or timed out
    Error,
    /// The call was dropped before it finished
    Cancelled,
}

/// One execution log record
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry<'a> {
    /// RFC 3339 timestamp with milliseconds
    pub ts: String,
    /// Entry phase
    pub event: Phase,
    /// Tool name, truncated like any other string
    pub tool: Cow<'a, str>,
    /// Per-process call id
    pub call_id: u64,
    /// Outcome (end entries only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    /// Wall time in milliseconds, one decimal (end entries only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<f64>,
    /// Sanitized arguments (start entries only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
    /// Sanitized result summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl<'a> LogEntry<'a> {
    fn new(event: Phase, tool: &'a str, call_id: u64, max_string: usize) -> Self {
        // Unknown tool names come straight from the caller.
        let tool = if tool.chars().count() > max_string {
            Cow::Owned(truncate(tool, max_string))
        } else {
            Cow::Borrowed(tool)
        };
        Self {
            ts: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            event,
            tool,
            call_id,
            status: None,
            elapsed_ms: None,
            args: None,
            result: None,
            error: None,
        }
    }
}

/// Truncates `value` to `limit` characters with a marker naming the cut
///
/// ```
/// use computer_use_mcp::logger::truncate;
///
/// assert_eq!(truncate("abcdef", 4), "abcd...<truncated 2 chars>");
/// assert_eq!(truncate("abc", 4), "abc");
/// ```
pub fn truncate(value: &str, limit: usize) -> String {
    let total = value.chars().count();
    if total <= limit {
        return value.to_string();
    }
    let kept: String = value.chars().take(limit).collect();
    format!("{}...<truncated {} chars>", kept, total - limit)
}

/// Bounds a JSON value for logging
///
/// Strings are truncated to `max_string` characters, lists keep their first
/// 10 items, objects their first 20 keys, and anything nested deeper than 3
/// levels becomes `"<max-depth>"`. Objects shaped like image content
/// (`{"type": "image", "data": ...}`) keep only their size.
pub fn sanitize(value: &Value, max_string: usize) -> Value {
    sanitize_at(value, max_string, 0)
}

fn sanitize_at(value: &Value, max_string: usize, depth: usize) -> Value {
    if depth > MAX_DEPTH {
        return Value::from("<max-depth>");
    }
    match value {
        Value::String(s) => Value::from(truncate(s, max_string)),
        Value::Array(items) => {
            let mut out: Vec<Value> = items
                .iter()
                .take(MAX_LIST_ITEMS)
                .map(|item| sanitize_at(item, max_string, depth + 1))
                .collect();
            if items.len() > MAX_LIST_ITEMS {
                out.push(Value::from(format!("...<{} more>", items.len() - MAX_LIST_ITEMS)));
            }
            Value::Array(out)
        }
        Value::Object(map) => {
            if let Some(summary) = image_summary(map) {
                return summary;
            }
            let mut out = Map::new();
            for (key, item) in map.iter().take(MAX_OBJECT_KEYS) {
                out.insert(key.clone(), sanitize_at(item, max_string, depth + 1));
            }
            if map.len() > MAX_OBJECT_KEYS {
                out.insert(
                    "...".to_string(),
                    Value::from(format!("<{} more keys>", map.len() - MAX_OBJECT_KEYS)),
                );
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

fn image_summary(map: &Map<String, Value>) -> Option<Value> {
    if map.get("type").and_then(Value::as_str) != Some("image") {
        return None;
    }
    let data = map.get("data")?.as_str()?;
    Some(serde_json::json!({
        "type": "image",
        "mime_type": map.get("mime_type").cloned().unwrap_or(Value::Null),
        "bytes": data.len(),
    }))
}

/// Writes start/end entries around tool calls
#[derive(Debug)]
pub struct ExecutionLogger {
    enabled: bool,
    max_string: usize,
    next_call_id: AtomicU64,
}

impl ExecutionLogger {
    /// Creates a logger
    pub fn new(enabled: bool, max_string: usize) -> Self {
        Self {
            enabled,
            max_string,
            next_call_id: AtomicU64::new(1),
        }
    }

    /// Creates a logger from server configuration
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.log_enabled, config.log_max_string)
    }

    /// A logger that never writes
    pub fn disabled() -> Self {
        Self::new(false, 0)
    }

    /// Whether entries are written
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Writes the start entry and returns the scope that writes the end
    /// entry
    ///
    /// If the scope is dropped without [`CallScope::finish`], it writes a
    /// `cancelled` end entry.
    pub fn begin<'a>(&'a self, tool: &'a str, args: &Map<String, Value>) -> CallScope<'a> {
        let call_id = self.next_call_id.fetch_add(1, Ordering::Relaxed);
        if self.enabled {
            let mut entry = LogEntry::new(Phase::Start, tool, call_id, self.max_string);
            entry.args = Some(sanitize(&Value::Object(args.clone()), self.max_string));
            self.emit(&entry);
        }
        CallScope {
            logger: self,
            tool,
            call_id,
            started: Instant::now(),
            finished: false,
        }
    }

    /// Records a request that was rejected before any handler ran
    pub fn rejected(&self, tool: &str, error: &ToolError) {
        if !self.enabled {
            return;
        }
        let call_id = self.next_call_id.fetch_add(1, Ordering::Relaxed);
        let mut entry = LogEntry::new(Phase::Rejected, tool, call_id, self.max_string);
        entry.status = Some(Status::Error);
        entry.error = Some(self.error_summary(error));
        self.emit(&entry);
    }

    fn error_summary(&self, error: &ToolError) -> Value {
        serde_json::json!({
            "kind": error.kind(),
            "message": truncate(error.message(), self.max_string),
        })
    }

    /// Serializes and writes one entry; failures are swallowed
    ///
    /// Successful entries go out at INFO, failed and cancelled ones at WARN.
    fn emit(&self, entry: &LogEntry<'_>) {
        let line = match serde_json::to_string(entry) {
            Ok(line) => line,
            Err(e) => format!(
                r#"{{"event":"log_error","tool":{:?},"call_id":{},"error":{:?}}}"#,
                entry.tool,
                entry.call_id,
                e.to_string()
            ),
        };
        match entry.status {
            Some(Status::Error) | Some(Status::Cancelled) => {
                tracing::warn!(target: EXEC_LOG_TARGET, "{} {}", LOG_PREFIX, line)
            }
            _ => tracing::info!(target: EXEC_LOG_TARGET, "{} {}", LOG_PREFIX, line),
        }
    }
}

/// Guard for one in-flight call
///
/// Exactly one end entry is written per scope: by [`CallScope::finish`], or
/// by `Drop` if the call was abandoned.
#[must_use = "dropping a CallScope immediately logs the call as cancelled"]
#[derive(Debug)]
pub struct CallScope<'a> {
    logger: &'a ExecutionLogger,
    tool: &'a str,
    call_id: u64,
    started: Instant,
    finished: bool,
}

impl CallScope<'_> {
    /// Call id shared by the start and end entries
    pub fn call_id(&self) -> u64 {
        self.call_id
    }

    /// Writes the end entry for a finished call
    pub fn finish(mut self, result: &Result<ToolOutput, ToolError>) {
        self.finished = true;
        if !self.logger.enabled {
            return;
        }
        let mut entry = self.end_entry();
        match result {
            Ok(output) => {
                entry.status = Some(Status::Ok);
                entry.result = Some(sanitize(&output.log_summary(), self.logger.max_string));
            }
            Err(error) => {
                entry.status = Some(Status::Error);
                entry.error = Some(self.logger.error_summary(error));
            }
        }
        self.logger.emit(&entry);
    }

    fn end_entry(&self) -> LogEntry<'_> {
        let mut entry = LogEntry::new(Phase::End, self.tool, self.call_id, self.logger.max_string);
        let elapsed = self.started.elapsed().as_secs_f64() * 1000.0;
        entry.elapsed_ms = Some((elapsed * 10.0).round() / 10.0);
        entry
    }
}

impl Drop for CallScope<'_> {
    fn drop(&mut self) {
        if self.finished || !self.logger.enabled {
            return;
        }
        let mut entry = self.end_entry();
        entry.status = Some(Status::Cancelled);
        self.logger.emit(&entry);
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::Write,
        sync::{Arc, Mutex},
    };

    use serde_json::json;
    use tracing_subscriber::fmt::MakeWriter;

    use super::*;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        fn lines(&self) -> Vec<String> {
            let bytes = self.0.lock().unwrap().clone();
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }

        fn entries(&self) -> Vec<Value> {
            self.lines()
                .iter()
                .map(|line| {
                    let json = line.split_once(LOG_PREFIX).unwrap().1.trim();
                    serde_json::from_str(json).unwrap()
                })
                .collect()
        }
    }

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Capture {
        type Writer = Capture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn with_capture<F: FnOnce()>(f: F) -> Capture {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(capture.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        capture
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_truncate_marker() {
        assert_eq!(truncate("hello world", 5), "hello...<truncated 6 chars>");
        assert_eq!(truncate("héllo", 2), "hé...<truncated 3 chars>");
        assert_eq!(truncate("", 5), "");
    }

    #[test]
    fn test_sanitize_bounds_collections() {
        let list: Vec<u32> = (0..15).collect();
        let out = sanitize(&json!(list), 100);
        let items = out.as_array().unwrap();
        assert_eq!(items.len(), 11);
        assert_eq!(items[10], "...<5 more>");

        let mut map = Map::new();
        for i in 0..25 {
            map.insert(format!("k{:02}", i), json!(i));
        }
        let out = sanitize(&Value::Object(map), 100);
        let out = out.as_object().unwrap();
        assert_eq!(out.len(), 21);
        assert_eq!(out["..."], "<5 more keys>");
    }

    #[test]
    fn test_sanitize_depth_limit() {
        let deep = json!({"a": {"b": {"c": {"d": {"e": 1}}}}});
        let out = sanitize(&deep, 100);
        assert_eq!(out["a"]["b"]["c"]["d"], "<max-depth>");
    }

    #[test]
    fn test_sanitize_image_content() {
        let image = json!({"type": "image", "mime_type": "image/png", "data": "QUJD".repeat(100)});
        let out = sanitize(&image, 20);
        assert_eq!(out, json!({"type": "image", "mime_type": "image/png", "bytes": 400}));
    }

    #[test]
    fn test_start_and_end_entries() {
        let logger = ExecutionLogger::new(true, 300);
        let capture = with_capture(|| {
            let scope = logger.begin("mouse_move", &args(json!({"x": 1, "y": 2})));
            scope.finish(&Ok(ToolOutput::Json(json!({"success": true}))));
        });

        let entries = capture.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["event"], "start");
        assert_eq!(entries[0]["tool"], "mouse_move");
        assert_eq!(entries[0]["args"]["x"], 1);
        assert_eq!(entries[1]["event"], "end");
        assert_eq!(entries[1]["status"], "ok");
        assert_eq!(entries[1]["result"]["success"], true);
        assert_eq!(entries[0]["call_id"], entries[1]["call_id"]);
        assert!(entries[1]["elapsed_ms"].as_f64().unwrap() >= 0.0);
    }

    #[test]
    fn test_error_end_entry() {
        let logger = ExecutionLogger::new(true, 300);
        let capture = with_capture(|| {
            let scope = logger.begin("keyboard_press", &Map::new());
            scope.finish(&Err(ToolError::execution("boom")));
        });

        let lines = capture.lines();
        assert!(lines[0].contains("INFO"));
        assert!(lines[1].contains("WARN"));

        let entries = capture.entries();
        assert_eq!(entries[1]["status"], "error");
        assert_eq!(entries[1]["error"]["kind"], "ToolExecutionError");
        assert_eq!(entries[1]["error"]["message"], "boom");
    }

    #[test]
    fn test_dropped_scope_logs_cancelled() {
        let logger = ExecutionLogger::new(true, 300);
        let capture = with_capture(|| {
            let _scope = logger.begin("take_screenshot", &Map::new());
        });

        let entries = capture.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1]["event"], "end");
        assert_eq!(entries[1]["status"], "cancelled");
    }

    #[test]
    fn test_long_arguments_are_truncated() {
        let logger = ExecutionLogger::new(true, 32);
        let text = "x".repeat(500);
        let capture = with_capture(|| {
            let scope = logger.begin("keyboard_type", &args(json!({"text": text})));
            scope.finish(&Ok(ToolOutput::Json(json!({"success": true}))));
        });

        let lines = capture.lines();
        assert!(lines[0].contains("...<truncated 468 chars>"));
        assert!(!lines[0].contains(&"x".repeat(33)));
    }

    #[test]
    fn test_disabled_logger_writes_nothing() {
        let logger = ExecutionLogger::disabled();
        let capture = with_capture(|| {
            let scope = logger.begin("mouse_move", &args(json!({"x": 1})));
            scope.finish(&Err(ToolError::execution("boom")));
            let _dropped = logger.begin("mouse_move", &Map::new());
            logger.rejected("nope", &ToolError::protocol("bad"));
        });
        assert!(capture.lines().is_empty());
    }

    #[test]
    fn test_rejected_entry() {
        let logger = ExecutionLogger::new(true, 300);
        let capture = with_capture(|| {
            logger.rejected("teleport", &ToolError::execution("unknown"));
        });
        let entries = capture.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["event"], "rejected");
    }

    #[test]
    fn test_tool_name_is_truncated() {
        let logger = ExecutionLogger::new(true, 40);
        let name = "t".repeat(5000);
        let capture = with_capture(|| {
            logger.rejected(&name, &ToolError::execution("unknown"));
            let scope = logger.begin(&name, &Map::new());
            scope.finish(&Ok(ToolOutput::Json(Value::Null)));
        });

        let lines = capture.lines();
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|line| line.len() < 400), "{:?}", lines);
        for entry in capture.entries() {
            assert_eq!(
                entry["tool"],
                format!("{}...<truncated 4960 chars>", "t".repeat(40))
            );
        }
    }

    #[test]
    fn test_call_ids_increase() {
        let logger = ExecutionLogger::disabled();
        let first = logger.begin("a", &Map::new());
        let first_id = first.call_id();
        drop(first);
        let second = logger.begin("b", &Map::new());
        assert!(second.call_id() > first_id);
        second.finish(&Ok(ToolOutput::Json(Value::Null)));
    }
}
