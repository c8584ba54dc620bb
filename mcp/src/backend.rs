//! Host capability used by the editor and file tools
//!
//! [`ToolBackend`] is the seam between the server and whatever owns the
//! documents. Methods report ordinary failures in their return value
//! (a message string or `false`) instead of erroring.
//!
//! [`WorkspaceBackend`] is a headless implementation rooted at a directory:
//! the directory is the solution, its immediate subdirectories are projects,
//! and open documents are in-memory buffers.

use ignore::WalkBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Access to editor and file-system state
pub trait ToolBackend: Send + Sync {
    /// Text of the active document, or a message if there is none
    fn active_document_text(&self) -> String;

    /// Replace the text of the active document
    fn set_active_document_text(&self, text: &str) -> bool;

    /// Open documents as `"name (full path)"`
    fn open_documents(&self) -> Vec<String>;

    /// Human-readable summary of the solution
    fn solution_info(&self) -> String;

    /// Open a document by path and make it active
    fn open_document(&self, path: &str) -> bool;

    /// Every item of every project
    fn project_items(&self) -> Vec<String>;

    /// File content, or a message if the file can't be read
    fn file_content(&self, path: &str) -> String;

    /// Write a file, replacing any existing content
    fn write_file_content(&self, path: &str, content: &str) -> bool;
}

#[derive(Debug)]
struct OpenDocument {
    path: PathBuf,
    text: String,
}

#[derive(Debug, Default)]
struct EditorState {
    documents: Vec<OpenDocument>,
    active: Option<usize>,
}

/// Headless editor over a workspace directory
#[derive(Debug)]
pub struct WorkspaceBackend {
    root: PathBuf,
    state: Mutex<EditorState>,
}

impl WorkspaceBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = fs::canonicalize(&root).unwrap_or(root);
        Self {
            root,
            state: Mutex::new(EditorState::default()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }

    fn state(&self) -> MutexGuard<'_, EditorState> {
        // A poisoned lock only means a previous caller panicked mid-update;
        // the state itself is still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn solution_name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string())
    }

    /// Immediate, non-hidden subdirectories of the root, sorted by name
    fn projects(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut projects: Vec<PathBuf> = fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
            .map(|entry| entry.path())
            .collect();
        projects.sort();
        Ok(projects)
    }

    fn collect_items(project: &Path, name: &str, items: &mut Vec<String>) {
        let walker = WalkBuilder::new(project).sort_by_file_name(|a, b| a.cmp(b)).build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(error = %e, "Skipping unreadable project item");
                    continue;
                }
            };
            if entry.depth() == 0 {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(project) else {
                continue;
            };
            items.push(format!(
                "{}/{} ({})",
                name,
                relative.display(),
                entry.path().display()
            ));
        }
    }
}

impl ToolBackend for WorkspaceBackend {
    fn active_document_text(&self) -> String {
        let state = self.state();
        match state.active.and_then(|idx| state.documents.get(idx)) {
            Some(doc) => doc.text.clone(),
            None => "No active document.".to_string(),
        }
    }

    fn set_active_document_text(&self, text: &str) -> bool {
        let mut state = self.state();
        let Some(idx) = state.active else {
            warn!("No active document.");
            return false;
        };
        match state.documents.get_mut(idx) {
            Some(doc) => {
                doc.text = text.to_string();
                true
            }
            None => false,
        }
    }

    fn open_documents(&self) -> Vec<String> {
        self.state()
            .documents
            .iter()
            .map(|doc| {
                let name = doc
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                format!("{} ({})", name, doc.path.display())
            })
            .collect()
    }

    fn solution_info(&self) -> String {
        let projects = match self.projects() {
            Ok(projects) => projects,
            Err(e) => return format!("Error getting solution info: {}", e),
        };

        let lines: Vec<String> = projects
            .iter()
            .map(|project| {
                let name = project
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let items = fs::read_dir(project).map(|d| d.count()).unwrap_or(0);
                format!("Project: {}, Items: {}", name, items)
            })
            .collect();

        let mut info = format!(
            "Solution: {}\nPath: {}\nProjects: {}",
            self.solution_name(),
            self.root.display(),
            lines.len()
        );
        for line in lines {
            info.push('\n');
            info.push_str(&line);
        }
        info
    }

    fn open_document(&self, path: &str) -> bool {
        let full = self.resolve(path);
        if !full.is_file() {
            warn!(path = %full.display(), "File not found");
            return false;
        }
        let full = fs::canonicalize(&full).unwrap_or(full);

        let mut state = self.state();
        if let Some(idx) = state.documents.iter().position(|d| d.path == full) {
            state.active = Some(idx);
            return true;
        }

        match fs::read_to_string(&full) {
            Ok(text) => {
                state.documents.push(OpenDocument { path: full, text });
                state.active = Some(state.documents.len() - 1);
                true
            }
            Err(e) => {
                warn!(path = %full.display(), error = %e, "Error opening document");
                false
            }
        }
    }

    fn project_items(&self) -> Vec<String> {
        let projects = match self.projects() {
            Ok(projects) => projects,
            Err(e) => return vec![format!("Error getting project items: {}", e)],
        };

        let mut items = Vec::new();
        for project in &projects {
            let name = project
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Self::collect_items(project, &name, &mut items);
        }
        items
    }

    fn file_content(&self, path: &str) -> String {
        let full = self.resolve(path);
        if !full.is_file() {
            return format!("File not found: {}", path);
        }
        match fs::read_to_string(&full) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %full.display(), error = %e, "Error reading file");
                format!("Error reading file: {}", e)
            }
        }
    }

    fn write_file_content(&self, path: &str, content: &str) -> bool {
        let full = self.resolve(path);
        match fs::write(&full, content) {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %full.display(), error = %e, "Error writing file");
                false
            }
        }
    }
}
