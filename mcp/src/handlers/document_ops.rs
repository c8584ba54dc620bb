//! Editor document tools
//!
//! Every handler here touches host-owned state and is registered with host
//! affinity, so it only ever runs on the affinity executor's thread.

use crate::backend::ToolBackend;
use crate::tool::{ToolArguments, ToolOutput};
use anyhow::Result;
use tracing::info;

/// Handle GetActiveDocumentText tool
pub fn handle_get_active_text(
    backend: &dyn ToolBackend,
    _args: &ToolArguments,
) -> Result<ToolOutput> {
    Ok(backend.active_document_text().into())
}

/// Handle SetActiveDocumentText tool
pub fn handle_set_active_text(
    backend: &dyn ToolBackend,
    args: &ToolArguments,
) -> Result<ToolOutput> {
    let text = args.str("text")?;
    info!(bytes = text.len(), "Replacing active document text");

    let message = if backend.set_active_document_text(text) {
        "Document updated successfully"
    } else {
        "Failed to update document"
    };
    Ok(message.into())
}

/// Handle GetOpenDocuments tool
pub fn handle_open_documents(
    backend: &dyn ToolBackend,
    _args: &ToolArguments,
) -> Result<ToolOutput> {
    Ok(backend.open_documents().into())
}

/// Handle GetSolutionInfo tool
pub fn handle_solution_info(
    backend: &dyn ToolBackend,
    _args: &ToolArguments,
) -> Result<ToolOutput> {
    Ok(backend.solution_info().into())
}

/// Handle OpenDocument tool
pub fn handle_open_document(backend: &dyn ToolBackend, args: &ToolArguments) -> Result<ToolOutput> {
    let path = args.str("path")?;
    info!(path = path, "Opening document");

    let message = if backend.open_document(path) {
        "Document opened successfully"
    } else {
        "Failed to open document"
    };
    Ok(message.into())
}

/// Handle GetProjectItems tool
pub fn handle_project_items(
    backend: &dyn ToolBackend,
    _args: &ToolArguments,
) -> Result<ToolOutput> {
    Ok(backend.project_items().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::WorkspaceBackend;
    use crate::tool::ArgValue;
    use tempfile::TempDir;

    fn path_args(path: &str) -> ToolArguments {
        let mut args = ToolArguments::new();
        args.insert("path", ArgValue::String(path.to_string()));
        args
    }

    #[test]
    fn test_open_then_edit_reports_outcomes() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        let backend = WorkspaceBackend::new(dir.path());

        let mut text = ToolArguments::new();
        text.insert("text", ArgValue::String("beta".to_string()));

        assert_eq!(
            handle_set_active_text(&backend, &text).unwrap(),
            ToolOutput::Text("Failed to update document".to_string())
        );
        assert_eq!(
            handle_open_document(&backend, &path_args("missing.txt")).unwrap(),
            ToolOutput::Text("Failed to open document".to_string())
        );
        assert_eq!(
            handle_open_document(&backend, &path_args("a.txt")).unwrap(),
            ToolOutput::Text("Document opened successfully".to_string())
        );
        assert_eq!(
            handle_set_active_text(&backend, &text).unwrap(),
            ToolOutput::Text("Document updated successfully".to_string())
        );
        assert_eq!(
            handle_get_active_text(&backend, &ToolArguments::new()).unwrap(),
            ToolOutput::Text("beta".to_string())
        );

        match handle_open_documents(&backend, &ToolArguments::new()).unwrap() {
            ToolOutput::List(docs) => assert_eq!(docs.len(), 1),
            other => panic!("expected a list, got {:?}", other),
        }
    }
}
