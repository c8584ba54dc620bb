//! MCP protocol implementation
//!
//! Core protocol types and the transport layer for Model Context Protocol
//! communication using JSON-RPC 2.0.

pub mod jsonrpc;
pub mod messages;
pub mod transport;

pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId};
pub use messages::{
    CallToolParams, CallToolResult, Content, Implementation, InitializeParams, InitializeResult,
    ListToolsResult, ToolInfo,
};
pub use transport::{Framing, StdioTransport, Transport};
