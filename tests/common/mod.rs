//! Shared test utilities for integration tests
//!
//! - [`TestServer`]: dispatcher wired to a [`MockDesktop`]
//! - [`LogCapture`]: `tracing` writer that records every write
//! - [`RecordingSink`]: `AsyncWrite` that records every write call
//! - [`mcp_harness`]: MCP server fixture and content validation

#![allow(dead_code)]

pub mod mcp_harness;

use std::{
    io,
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll},
};

use computer_use_mcp::{
    Dispatcher, ServerConfig,
    logger::LOG_PREFIX,
    model::Request,
    providers::{MockDesktop, Providers},
    tools::{ToolContext, builtin_registry},
};
use serde_json::Value;
use tokio::io::AsyncWrite;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

/// Dispatcher over a mock desktop
pub struct TestServer {
    pub desktop: Arc<MockDesktop>,
    pub dispatcher: Arc<Dispatcher>,
}

impl TestServer {
    /// Builds a server with the built-in tools
    pub fn new(desktop: MockDesktop, config: ServerConfig) -> Self {
        let desktop = Arc::new(desktop);
        let context = ToolContext::new(Providers::mock(desktop.clone()), config.clone());
        let registry = builtin_registry().expect("built-in tools have unique names");
        Self {
            desktop,
            dispatcher: Arc::new(Dispatcher::new(registry, context, &config)),
        }
    }

    /// Server with execution logging off and a small screen
    pub fn quiet() -> Self {
        Self::new(small_desktop(), quiet_config())
    }
}

/// Mock desktop with a small screen so screenshots stay cheap
pub fn small_desktop() -> MockDesktop {
    MockDesktop::new()
        .with_screen_size(64, 48)
        .with_capture_size(64, 48)
}

/// Default configuration with the execution log disabled
pub fn quiet_config() -> ServerConfig {
    ServerConfig::builder().log_enabled(false).build()
}

/// Request with a JSON object literal for arguments
pub fn request(id: impl Into<Value>, tool: &str, arguments: Value) -> Request {
    Request::new(id, tool, arguments)
}

/// Records everything written through a `tracing` fmt subscriber
#[derive(Clone, Default)]
pub struct LogCapture {
    bytes: Arc<Mutex<Vec<u8>>>,
    writes: Arc<Mutex<usize>>,
}

impl LogCapture {
    /// Installs an INFO-level subscriber writing here for the current thread
    pub fn install(&self) -> DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// Number of write calls received
    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap()
    }

    /// Captured output split into lines
    pub fn lines(&self) -> Vec<String> {
        let bytes = self.bytes.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Execution log entries, parsed from the JSON after [`LOG_PREFIX`]
    pub fn entries(&self) -> Vec<Value> {
        self.lines()
            .iter()
            .filter_map(|line| line.split_once(LOG_PREFIX))
            .map(|(_, json)| serde_json::from_str(json.trim()).unwrap())
            .collect()
    }

    /// Entries whose `event` field equals `event`
    pub fn events(&self, event: &str) -> Vec<Value> {
        self.entries()
            .into_iter()
            .filter(|entry| entry["event"] == event)
            .collect()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        *self.writes.lock().unwrap() += 1;
        self.bytes.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// `AsyncWrite` that keeps each `poll_write` buffer as a separate chunk
///
/// With `max_write` set, each call accepts at most that many bytes, forcing
/// callers through partial writes.
#[derive(Clone, Default)]
pub struct RecordingSink {
    chunks: Arc<Mutex<Vec<Vec<u8>>>>,
    max_write: Option<usize>,
}

impl RecordingSink {
    /// Sink accepting at most `max_write` bytes per call
    pub fn with_max_write(max_write: usize) -> Self {
        Self {
            chunks: Arc::default(),
            max_write: Some(max_write),
        }
    }

    /// Chunks in the order they were written
    pub fn chunks(&self) -> Vec<Vec<u8>> {
        self.chunks.lock().unwrap().clone()
    }

    /// All bytes written, concatenated
    pub fn contents(&self) -> String {
        String::from_utf8(self.chunks().concat()).unwrap()
    }

    /// Written output parsed as one JSON value per line
    pub fn json_lines(&self) -> Vec<Value> {
        self.contents()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

impl AsyncWrite for RecordingSink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let len = self.max_write.map_or(buf.len(), |max| buf.len().min(max));
        self.chunks.lock().unwrap().push(buf[..len].to_vec());
        Poll::Ready(Ok(len))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
