//! Error types for the MCP server

use crate::protocol::JsonRpcError;
use thiserror::Error;

/// Result type for MCP operations
pub type Result<T> = std::result::Result<T, McpError>;

/// MCP server errors
#[derive(Debug, Error)]
pub enum McpError {
    /// Malformed or undecodable message
    #[error("Framing error: {0}")]
    Framing(String),

    /// Message not allowed in the current session state
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Handshake not completed in time
    #[error("Handshake not completed within {0}s")]
    Timeout(u64),

    /// Well-formed JSON that is not a valid JSON-RPC 2.0 request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// JSON-RPC method not handled by this server
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Tool name not present in the registry
    #[error("unknown tool {0}")]
    ToolNotFound(String),

    /// Tool registered twice under the same name
    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    /// Missing or mistyped argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Tool handler failed
    #[error("Handler error: {0}")]
    Handler(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl McpError {
    /// Convert to JSON-RPC error
    pub fn to_jsonrpc(&self) -> JsonRpcError {
        match self {
            McpError::Framing(msg) => JsonRpcError::parse_error(msg),
            McpError::ProtocolViolation(msg) => JsonRpcError::protocol_violation(msg),
            McpError::Timeout(secs) => JsonRpcError::handshake_timeout(*secs),
            McpError::InvalidRequest(msg) => JsonRpcError::invalid_request(msg),
            McpError::MethodNotFound(method) => JsonRpcError::method_not_found(method),
            McpError::ToolNotFound(name) => JsonRpcError::tool_not_found(name),
            McpError::InvalidArgument(msg) => JsonRpcError::invalid_params(msg),
            McpError::Json(e) => JsonRpcError::invalid_params(e.to_string()),
            McpError::Handler(msg) => JsonRpcError::internal_error(msg),
            McpError::DuplicateTool(name) => {
                JsonRpcError::internal_error(format!("duplicate tool {}", name))
            }
            McpError::Config(msg) => JsonRpcError::internal_error(msg),
            McpError::Io(e) => JsonRpcError::internal_error(e.to_string()),
            McpError::Internal(msg) => JsonRpcError::internal_error(msg),
        }
    }

    /// Whether this error ends the connection
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            McpError::Framing(_) | McpError::ProtocolViolation(_) | McpError::Timeout(_)
        )
    }
}
