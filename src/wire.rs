//! Line-delimited JSON transport
//!
//! One request envelope per input line, one response envelope per output
//! line. The output stream carries protocol data only; diagnostics go to
//! stderr through `tracing`.
//!
//! Requests are read and answered strictly in sequence, so responses leave
//! in the order their requests arrived. [`ProtocolWriter`] serializes each
//! envelope to a single buffer and writes it in one locked call, which keeps
//! lines whole even when several tasks share a writer.

use std::io;

use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    sync::Mutex,
};

use serde_json::Value;

use crate::{dispatch::Dispatcher, error::ToolError, model::Response};

/// Counters for one transport session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Requests answered
    pub requests: u64,
    /// Requests answered with a Failure
    pub failures: u64,
}

/// Serializes whole response lines onto a shared output stream
#[derive(Debug)]
pub struct ProtocolWriter<W> {
    inner: Mutex<W>,
}

impl<W: AsyncWrite + Unpin> ProtocolWriter<W> {
    /// Wraps `writer`
    pub fn new(writer: W) -> Self {
        Self {
            inner: Mutex::new(writer),
        }
    }

    /// Writes one response as a single newline-terminated line
    ///
    /// # Errors
    ///
    /// Returns any I/O error from the underlying stream.
    pub async fn write_response(&self, response: &Response) -> io::Result<()> {
        let mut line = serde_json::to_vec(&response.to_envelope())?;
        line.push(b'\n');

        let mut writer = self.inner.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await
    }

    /// Returns the wrapped writer
    pub fn into_inner(self) -> W {
        self.inner.into_inner()
    }
}

/// Serves requests from `reader` until end of input
///
/// Blank lines are skipped. A line that is not valid UTF-8 gets a
/// `ProtocolError` response with a null request id. Each response is written
/// before the next line is read.
///
/// # Errors
///
/// Returns an I/O error if reading a line or writing a response fails.
pub async fn serve_lines<R, W>(
    dispatcher: &Dispatcher,
    mut reader: R,
    writer: &ProtocolWriter<W>,
) -> io::Result<SessionStats>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut stats = SessionStats::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        // Framing survives bad bytes; only this request is rejected.
        let response = match std::str::from_utf8(&buf) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => dispatcher.handle_raw(line).await,
            Err(e) => {
                tracing::debug!("Rejected non-UTF-8 request line: {}", e);
                Response::failure(
                    Value::Null,
                    &ToolError::protocol(format!("Request is not valid UTF-8: {}", e)),
                )
            }
        };
        stats.requests += 1;
        if !response.is_success() {
            stats.failures += 1;
        }
        writer.write_response(&response).await?;
    }

    tracing::debug!(
        "Input closed after {} requests ({} failed)",
        stats.requests,
        stats.failures
    );
    Ok(stats)
}
