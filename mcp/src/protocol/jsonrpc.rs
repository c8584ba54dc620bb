//! JSON-RPC 2.0 protocol types
//!
//! Envelope types shared by every MCP message, plus the error codes this
//! server emits.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC protocol version string
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC 2.0 request or notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version (must be "2.0")
    pub jsonrpc: String,

    /// Request ID (absent for notifications)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,

    /// Method name
    pub method: String,

    /// Method parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC request
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            method: method.into(),
            params,
        }
    }

    /// Create a notification (request without ID)
    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
            method: method.into(),
            params,
        }
    }

    /// Check if this is a notification
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC 2.0 response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version (must be "2.0")
    pub jsonrpc: String,

    /// Request ID (same as request, or null when the request could not be read)
    pub id: Option<RequestId>,

    /// Result (if successful)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error (if failed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Create a successful response
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: Option<RequestId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Whether this response carries an error object
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// JSON-RPC 2.0 error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code
    pub code: i32,

    /// Error message
    pub message: String,

    /// Additional error data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Create a new error
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create an error with additional data
    pub fn with_data(code: i32, message: impl Into<String>, data: Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    // Standard JSON-RPC 2.0 errors

    /// Parse error (-32700): Invalid JSON
    pub fn parse_error(details: impl Into<String>) -> Self {
        Self::with_data(
            -32700,
            "Parse error",
            serde_json::json!({"details": details.into()}),
        )
    }

    /// Invalid request (-32600): Not a valid request object
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::new(-32600, format!("Invalid request: {}", msg.into()))
    }

    /// Method not found (-32601): Method does not exist
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::new(-32601, format!("Method not found: {}", method.into()))
    }

    /// Invalid params (-32602): Invalid method parameters
    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::new(-32602, format!("Invalid params: {}", msg.into()))
    }

    /// Internal error (-32603): Internal JSON-RPC error
    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::new(-32603, format!("Internal error: {}", msg.into()))
    }

    // Server errors (-32000 to -32099)

    /// Tool not found (-32001)
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        let tool = tool.into();
        Self::with_data(
            -32001,
            format!("unknown tool {}", tool),
            serde_json::json!({"tool": tool}),
        )
    }

    /// Protocol violation (-32002): message not allowed in the current session state
    pub fn protocol_violation(reason: impl Into<String>) -> Self {
        Self::with_data(
            -32002,
            "Protocol violation",
            serde_json::json!({"reason": reason.into()}),
        )
    }

    /// Handshake timeout (-32003)
    pub fn handshake_timeout(seconds: u64) -> Self {
        Self::with_data(
            -32003,
            "Handshake timed out",
            serde_json::json!({"timeoutSecs": seconds}),
        )
    }
}

/// Request/Response ID (can be string or number)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// String ID
    String(String),
    /// Numeric ID
    Number(i64),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::String(s) => write!(f, "{}", s),
            RequestId::Number(n) => write!(f, "{}", n),
        }
    }
}
