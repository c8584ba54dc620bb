//! MCP server context
//!
//! Process-scoped state shared by the session loop and the tool handlers:
//! the frozen tool registry, the host backend and the affinity executor
//! that serializes host work.
//!
//! Construction order is registry, then executor, then transport and
//! session. Shutdown runs the other way: the session closes, the transport
//! is released, and [`ServerContext::shutdown`] stops the executor.

use crate::affinity::AffinityExecutor;
use crate::backend::ToolBackend;
use crate::error::Result;
use crate::registry::ToolRegistry;
use std::sync::Arc;
use tracing::info;

/// Name of the thread that owns host work
pub const HOST_THREAD_NAME: &str = "edithost-host";

/// Shared server state
pub struct ServerContext {
    /// Tool catalogue, immutable after start-up
    pub registry: Arc<ToolRegistry>,

    /// Host capability reached by the editor and file tools
    pub backend: Arc<dyn ToolBackend>,

    /// Serializes every handler that touches host-owned state
    pub affinity: AffinityExecutor,
}

impl ServerContext {
    /// Create a context and start its affinity executor
    pub fn new(registry: ToolRegistry, backend: Arc<dyn ToolBackend>) -> Result<Self> {
        let affinity = AffinityExecutor::start(HOST_THREAD_NAME)?;

        info!(tools = registry.len(), "Server context initialized");

        Ok(Self {
            registry: Arc::new(registry),
            backend,
            affinity,
        })
    }

    /// Stop the affinity executor; pending host jobs finish first
    pub fn shutdown(&self) {
        self.affinity.shutdown();
    }
}
