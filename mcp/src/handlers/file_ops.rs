//! File tools
//!
//! These go through the backend but need no host affinity; they run on the
//! dispatch loop. Concurrent writers to the same path are not coordinated.

use crate::backend::ToolBackend;
use crate::tool::{ToolArguments, ToolOutput};
use anyhow::Result;
use tracing::info;

/// Handle GetFileContent tool
pub fn handle_get_file_content(
    backend: &dyn ToolBackend,
    args: &ToolArguments,
) -> Result<ToolOutput> {
    let path = args.str("path")?;
    info!(path = path, "Reading file");
    Ok(backend.file_content(path).into())
}

/// Handle WriteFileContent tool
pub fn handle_write_file_content(
    backend: &dyn ToolBackend,
    args: &ToolArguments,
) -> Result<ToolOutput> {
    let path = args.str("path")?;
    let content = args.str("content")?;
    info!(path = path, bytes = content.len(), "Writing file");

    let message = if backend.write_file_content(path, content) {
        "File written successfully"
    } else {
        "Failed to write file"
    };
    Ok(message.into())
}
