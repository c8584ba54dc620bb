//! Stdio transport for JSON-RPC messages
//!
//! Reads framed JSON-RPC messages from a byte stream and writes responses
//! back. Two framings are supported: one JSON document per line, or
//! `Content-Length` headers followed by the payload.

use super::{JsonRpcRequest, JsonRpcResponse};
use crate::error::{McpError, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{
    self, AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// How messages are delimited on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Framing {
    /// One JSON document per line
    #[default]
    Lines,
    /// `Content-Length: N` header block followed by N bytes
    ContentLength,
}

impl std::str::FromStr for Framing {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "lines" => Ok(Framing::Lines),
            "content-length" => Ok(Framing::ContentLength),
            other => Err(format!(
                "unknown framing '{}', expected 'lines' or 'content-length'",
                other
            )),
        }
    }
}

/// Largest message accepted unless configured otherwise
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

/// Transport over the process's stdin/stdout
pub type StdioTransport = Transport<BufReader<io::Stdin>, io::Stdout>;

impl StdioTransport {
    /// Create a transport on this process's standard streams
    pub fn stdio(framing: Framing, cancel: CancellationToken) -> Self {
        Transport::new(BufReader::new(io::stdin()), io::stdout(), framing, cancel)
    }
}

/// Duplex message channel to a single peer
///
/// Each call to [`Transport::receive`] yields exactly one complete message;
/// partial reads stay buffered in the reader until the message is whole.
pub struct Transport<R, W> {
    reader: R,
    writer: W,
    framing: Framing,
    cancel: CancellationToken,
    max_message_bytes: usize,
}

impl<R, W> Transport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Create a transport over an arbitrary reader/writer pair
    pub fn new(reader: R, writer: W, framing: Framing, cancel: CancellationToken) -> Self {
        Self {
            reader,
            writer,
            framing,
            cancel,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }

    /// Cap on the size of one incoming message or header line
    pub fn set_max_message_bytes(&mut self, limit: usize) {
        self.max_message_bytes = limit;
    }

    /// Read the next request
    ///
    /// Returns `Ok(None)` at end of stream or once the transport has been
    /// cancelled. Undecodable input is a [`McpError::Framing`] error.
    pub async fn receive(&mut self) -> Result<Option<JsonRpcRequest>> {
        let cancel = self.cancel.clone();
        if cancel.is_cancelled() {
            return Ok(None);
        }

        let payload = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Transport cancelled while waiting for input");
                return Ok(None);
            }
            payload = self.read_frame() => payload?,
        };

        let Some(payload) = payload else {
            return Ok(None);
        };

        match serde_json::from_str::<JsonRpcRequest>(&payload) {
            Ok(request) => {
                debug!(request = ?request, "Received JSON-RPC request");
                Ok(Some(request))
            }
            Err(e) => {
                error!(error = %e, payload = %payload, "Failed to parse JSON-RPC request");
                Err(McpError::Framing(format!("Invalid JSON: {}", e)))
            }
        }
    }

    /// Write a JSON-RPC response
    pub async fn send(&mut self, response: &JsonRpcResponse) -> Result<()> {
        let json = serde_json::to_string(response)?;

        debug!(response = ?response, "Sending JSON-RPC response");

        match self.framing {
            Framing::Lines => {
                self.writer.write_all(json.as_bytes()).await?;
                self.writer.write_all(b"\n").await?;
            }
            Framing::ContentLength => {
                let header = format!("Content-Length: {}\r\n\r\n", json.len());
                self.writer.write_all(header.as_bytes()).await?;
                self.writer.write_all(json.as_bytes()).await?;
            }
        }
        self.writer.flush().await?;

        Ok(())
    }

    /// Flush and shut down the write half
    pub async fn close(&mut self) -> Result<()> {
        self.cancel.cancel();
        self.writer.flush().await?;
        self.writer.shutdown().await?;
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Option<String>> {
        match self.framing {
            Framing::Lines => self.read_line_frame().await,
            Framing::ContentLength => self.read_content_length_frame().await,
        }
    }

    async fn read_line_frame(&mut self) -> Result<Option<String>> {
        loop {
            let Some(line) = self.read_limited_line().await? else {
                return Ok(None);
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            return Ok(Some(trimmed.to_string()));
        }
    }

    /// Read up to and including the next `\n` without buffering more than
    /// `max_message_bytes`
    async fn read_limited_line(&mut self) -> Result<Option<String>> {
        let limit = self.max_message_bytes;
        let mut line = Vec::new();

        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                if line.is_empty() {
                    return Ok(None);
                }
                break;
            }

            let (used, done) = match available.iter().position(|&b| b == b'\n') {
                Some(idx) => (idx + 1, true),
                None => (available.len(), false),
            };
            if line.len() + used > limit {
                return Err(McpError::Framing(format!(
                    "message exceeds the {} byte limit",
                    limit
                )));
            }
            line.extend_from_slice(&available[..used]);
            self.reader.consume(used);

            if done {
                break;
            }
        }

        String::from_utf8(line)
            .map(Some)
            .map_err(|e| McpError::Framing(format!("message was not valid UTF-8: {}", e)))
    }

    async fn read_content_length_frame(&mut self) -> Result<Option<String>> {
        let mut content_length: Option<usize> = None;
        let mut saw_header = false;

        loop {
            let Some(line) = self.read_limited_line().await? else {
                if saw_header {
                    return Err(McpError::Framing(
                        "unexpected end of stream while reading headers".to_string(),
                    ));
                }
                return Ok(None);
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                if saw_header {
                    break;
                }
                continue;
            }
            saw_header = true;

            if let Some((name, value)) = trimmed.split_once(':') {
                if name.trim().eq_ignore_ascii_case("content-length") {
                    let value = value.trim();
                    content_length = Some(value.parse().map_err(|e| {
                        McpError::Framing(format!("invalid Content-Length '{}': {}", value, e))
                    })?);
                }
            }
        }

        let length = content_length.ok_or_else(|| {
            McpError::Framing("message missing Content-Length header".to_string())
        })?;
        if length > self.max_message_bytes {
            return Err(McpError::Framing(format!(
                "Content-Length {} exceeds the {} byte limit",
                length, self.max_message_bytes
            )));
        }

        let mut body = vec![0_u8; length];
        self.reader.read_exact(&mut body).await.map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                McpError::Framing("stream ended inside a message body".to_string())
            } else {
                McpError::Io(e)
            }
        })?;

        String::from_utf8(body)
            .map(Some)
            .map_err(|e| McpError::Framing(format!("message was not valid UTF-8: {}", e)))
    }
}
