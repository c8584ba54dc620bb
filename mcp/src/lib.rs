//! # Edithost MCP Server
//!
//! Tool-invocation server speaking the Model Context Protocol (MCP) over
//! stdio. Clients complete a handshake, list the registered tools and call
//! them by name with JSON arguments.
//!
//! ## Architecture
//!
//! - **Protocol Layer**: JSON-RPC 2.0 types, MCP messages and the framed transport
//! - **Session Layer**: handshake state machine and request routing
//! - **Dispatch Layer**: tool lookup, argument binding and invocation
//! - **Handler Layer**: built-in tools, some of them pinned to the host thread
//!
//! ## Usage
//!
//! ```rust,no_run
//! use edithost_mcp::{builtin_registry, McpServer, ServerConfig, ServerContext, WorkspaceBackend};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let context = Arc::new(ServerContext::new(
//!         builtin_registry()?,
//!         Arc::new(WorkspaceBackend::new(".")),
//!     )?);
//!
//!     let server = McpServer::new(context.clone(), ServerConfig::default());
//!     server.serve_stdio().await?;
//!
//!     context.shutdown();
//!     Ok(())
//! }
//! ```

pub mod affinity;
pub mod backend;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod tool;

// Re-export main types
pub use affinity::AffinityExecutor;
pub use backend::{ToolBackend, WorkspaceBackend};
pub use context::ServerContext;
pub use dispatcher::{Dispatcher, FailureKind, InvocationRequest, InvocationResult};
pub use error::{McpError, Result};
pub use protocol::{Framing, JsonRpcRequest, JsonRpcResponse, StdioTransport, Transport};
pub use registry::{ToolRegistry, ToolRegistryBuilder};
pub use server::{builtin_registry, builtin_tools, McpServer, ServerConfig};
pub use tool::{ParamType, ParameterSpec, ToolArguments, ToolDescriptor, ToolHandler, ToolOutput};
