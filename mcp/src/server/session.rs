//! Connection session and handshake
//!
//! A session moves `AwaitingHandshake -> Ready -> Closed` and never back.
//! The first message must be `initialize`; anything else, a malformed
//! handshake, or a second `initialize` is a protocol violation that ends the
//! connection.

use crate::context::ServerContext;
use crate::dispatcher::Dispatcher;
use crate::error::McpError;
use crate::protocol::jsonrpc::JSONRPC_VERSION;
use crate::protocol::messages::{negotiate_version, server_capabilities};
use crate::protocol::{
    CallToolParams, Implementation, InitializeParams, InitializeResult, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, RequestId,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    AwaitingHandshake,
    Ready,
    Closed,
}

/// What the connection loop should do after a message
#[derive(Debug)]
pub enum SessionAction {
    /// Write this response and keep going
    Respond(JsonRpcResponse),
    /// Nothing to write (notification)
    Ignore,
    /// Write the response, if any, then close with `error`
    Close {
        response: Option<JsonRpcResponse>,
        error: McpError,
    },
}

/// State of one connected peer
pub struct Session {
    state: SessionState,
    client_info: Option<Implementation>,
    protocol_version: Option<String>,
    negotiated_at: Option<DateTime<Utc>>,
    server_info: Implementation,
    instructions: Option<String>,
    context: Arc<ServerContext>,
    dispatcher: Dispatcher,
}

impl Session {
    pub fn new(
        context: Arc<ServerContext>,
        server_info: Implementation,
        instructions: Option<String>,
    ) -> Self {
        Self {
            state: SessionState::AwaitingHandshake,
            client_info: None,
            protocol_version: None,
            negotiated_at: None,
            server_info,
            instructions,
            dispatcher: Dispatcher::new(context.clone()),
            context,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn client_info(&self) -> Option<&Implementation> {
        self.client_info.as_ref()
    }

    pub fn protocol_version(&self) -> Option<&str> {
        self.protocol_version.as_deref()
    }

    pub fn negotiated_at(&self) -> Option<DateTime<Utc>> {
        self.negotiated_at
    }

    /// Mark the session closed; terminal
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            info!(client = ?self.client_info.as_ref().map(|c| &c.name), "Session closed");
        }
        self.state = SessionState::Closed;
    }

    /// Handle one incoming message
    ///
    /// A message carrying the wrong `jsonrpc` version is rejected on its own
    /// and leaves the session state untouched.
    pub async fn handle(&mut self, request: JsonRpcRequest) -> SessionAction {
        if request.jsonrpc != JSONRPC_VERSION && self.state != SessionState::Closed {
            let error = McpError::InvalidRequest(format!(
                "unsupported jsonrpc version '{}'",
                request.jsonrpc
            ));
            return match request.id {
                Some(id) => error_response(id, error),
                None => {
                    debug!(error = %error, "Dropping invalid notification");
                    SessionAction::Ignore
                }
            };
        }

        match self.state {
            SessionState::AwaitingHandshake => self.handle_handshake(request),
            SessionState::Ready => self.handle_ready(request).await,
            SessionState::Closed => SessionAction::Close {
                response: None,
                error: McpError::ProtocolViolation("session is closed".to_string()),
            },
        }
    }

    fn handle_handshake(&mut self, request: JsonRpcRequest) -> SessionAction {
        if request.method != "initialize" {
            return self.violation(
                request.id,
                format!(
                    "expected 'initialize' before any other message, got '{}'",
                    request.method
                ),
            );
        }

        let Some(id) = request.id else {
            return self.violation(None, "'initialize' must be a request with an id");
        };

        let params: InitializeParams =
            match serde_json::from_value(request.params.unwrap_or(Value::Null)) {
                Ok(params) => params,
                Err(e) => {
                    return self.violation(Some(id), format!("malformed 'initialize': {}", e));
                }
            };

        let version = negotiate_version(&params.protocol_version);
        if version != params.protocol_version {
            warn!(
                requested = %params.protocol_version,
                offered = version,
                "Client requested an unsupported protocol version"
            );
        }

        info!(
            client = %params.client_info.name,
            client_version = %params.client_info.version,
            protocol_version = version,
            "Handshake completed"
        );

        let result = InitializeResult {
            protocol_version: version.to_string(),
            server_info: self.server_info.clone(),
            capabilities: server_capabilities(),
            tools: self.context.registry.infos(),
            instructions: self.instructions.clone(),
        };

        self.client_info = Some(params.client_info);
        self.protocol_version = Some(version.to_string());
        self.negotiated_at = Some(Utc::now());
        self.state = SessionState::Ready;

        respond(id, &result)
    }

    async fn handle_ready(&mut self, request: JsonRpcRequest) -> SessionAction {
        if request.method == "initialize" {
            return self.violation(request.id, "session is already initialized");
        }

        let Some(id) = request.id else {
            debug!(method = %request.method, "Notification received");
            return SessionAction::Ignore;
        };

        match request.method.as_str() {
            "ping" => SessionAction::Respond(JsonRpcResponse::success(id, json!({}))),
            "tools/list" => {
                let result = ListToolsResult {
                    tools: self.context.registry.infos(),
                };
                respond(id, &result)
            }
            "tools/call" => {
                let params: CallToolParams =
                    match serde_json::from_value(request.params.unwrap_or(Value::Null)) {
                        Ok(params) => params,
                        Err(e) => {
                            return error_response(id, McpError::InvalidArgument(e.to_string()));
                        }
                    };

                match self.dispatcher.call(params).await {
                    Ok(result) => respond(id, &result),
                    Err(e) => error_response(id, e),
                }
            }
            other => error_response(id, McpError::MethodNotFound(other.to_string())),
        }
    }

    fn violation(&mut self, id: Option<RequestId>, reason: impl Into<String>) -> SessionAction {
        let error = McpError::ProtocolViolation(reason.into());
        warn!(error = %error, state = ?self.state, "Closing session");
        self.close();
        SessionAction::Close {
            response: Some(JsonRpcResponse::error(id, error.to_jsonrpc())),
            error,
        }
    }
}

fn respond<T: Serialize>(id: RequestId, result: &T) -> SessionAction {
    match serde_json::to_value(result) {
        Ok(value) => SessionAction::Respond(JsonRpcResponse::success(id, value)),
        Err(e) => error_response(id, McpError::Json(e)),
    }
}

fn error_response(id: RequestId, error: McpError) -> SessionAction {
    warn!(error = %error, request = %id, "Request failed");
    SessionAction::Respond(JsonRpcResponse::error(Some(id), error.to_jsonrpc()))
}
