//! MCP server implementation
//!
//! Connection loop that reads framed messages, feeds them through the
//! [`Session`] state machine and writes the responses back.

pub mod session;
pub mod tools;

use crate::context::ServerContext;
use crate::error::{McpError, Result};
use crate::protocol::transport::DEFAULT_MAX_MESSAGE_BYTES;
use crate::protocol::{Framing, Implementation, JsonRpcResponse, StdioTransport, Transport};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub use session::{Session, SessionAction, SessionState};
pub use tools::{builtin_registry, builtin_tools};

/// Default time a client has to complete the handshake
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 10;

/// MCP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server name
    pub name: String,

    /// Server version
    pub version: String,

    /// Seconds allowed between connect and a completed handshake
    pub handshake_timeout_secs: u64,

    /// Message framing on stdio
    pub framing: Framing,

    /// Largest incoming message; bigger ones end the connection
    pub max_message_bytes: usize,

    /// Workspace root for the editor and file tools
    pub workspace: Option<PathBuf>,

    /// Free-form usage hints returned from `initialize`
    pub instructions: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "edithost".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            handshake_timeout_secs: DEFAULT_HANDSHAKE_TIMEOUT_SECS,
            framing: Framing::default(),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            workspace: None,
            instructions: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file
    ///
    /// Keys missing from the file keep their defaults.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| McpError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&contents)
            .map_err(|e| McpError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Server identity reported during the handshake
    pub fn implementation(&self) -> Implementation {
        Implementation {
            name: self.name.clone(),
            version: self.version.clone(),
        }
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

/// MCP server
pub struct McpServer {
    context: Arc<ServerContext>,
    config: ServerConfig,
}

impl McpServer {
    /// Create a new MCP server
    pub fn new(context: Arc<ServerContext>, config: ServerConfig) -> Self {
        info!(
            server = %config.name,
            version = %config.version,
            tools = context.registry.len(),
            framing = ?config.framing,
            "MCP server initialized"
        );

        Self { context, config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Serve one client over stdio until it disconnects
    pub async fn serve_stdio(&self) -> Result<()> {
        let transport = StdioTransport::stdio(self.config.framing, CancellationToken::new());

        info!("MCP server listening on stdio");

        self.serve(transport).await
    }

    /// Serve one client over an arbitrary transport
    ///
    /// Returns `Ok(())` when the peer disconnects cleanly. Framing errors,
    /// protocol violations and a missed handshake deadline end the
    /// connection and are returned as errors after the peer has been told.
    pub async fn serve<R, W>(&self, mut transport: Transport<R, W>) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        transport.set_max_message_bytes(self.config.max_message_bytes);

        let mut session = Session::new(
            self.context.clone(),
            self.config.implementation(),
            self.config.instructions.clone(),
        );
        let deadline = tokio::time::Instant::now() + self.config.handshake_timeout();

        let outcome = loop {
            let received = if session.state() == SessionState::AwaitingHandshake {
                match tokio::time::timeout_at(deadline, transport.receive()).await {
                    Ok(received) => received,
                    Err(_) => {
                        let err = McpError::Timeout(self.config.handshake_timeout_secs);
                        warn!(error = %err, "Client did not complete the handshake");
                        break Err(err);
                    }
                }
            } else {
                transport.receive().await
            };

            let request = match received {
                Ok(Some(request)) => request,
                Ok(None) => {
                    info!("Client disconnected");
                    break Ok(());
                }
                Err(e) => {
                    error!(error = %e, "Failed to read request");
                    break Err(e);
                }
            };

            match session.handle(request).await {
                SessionAction::Respond(response) => {
                    if let Err(e) = transport.send(&response).await {
                        error!(error = %e, "Failed to write response");
                        break Err(e);
                    }
                }
                SessionAction::Ignore => {}
                SessionAction::Close { response, error } => {
                    if let Some(response) = response {
                        if let Err(e) = transport.send(&response).await {
                            debug!(error = %e, "Could not deliver closing response");
                        }
                    }
                    break Err(error);
                }
            }
        };

        // Fatal errors are reported to the peer before the stream goes away
        if let Err(err) = &outcome {
            if err.is_connection_fatal() && session.state() != SessionState::Closed {
                let response = JsonRpcResponse::error(None, err.to_jsonrpc());
                if let Err(e) = transport.send(&response).await {
                    debug!(error = %e, "Could not deliver closing error");
                }
            }
        }

        session.close();
        if let Err(e) = transport.close().await {
            debug!(error = %e, "Transport did not close cleanly");
        }

        outcome
    }
}
