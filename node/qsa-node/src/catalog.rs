use std::path::PathBuf;

use qsa_interface::{WorkflowError, WorkflowResult};
use qsa_workflow::{AwaitingModule, ModuleCatalog};

/// Catalog adapter reading the host's JSON export of modules awaiting
/// engraving. The file is re-read on every request so the host can
/// refresh it without restarting the node; a missing file just means an
/// empty queue.
pub struct FileCatalog {
    path: Option<PathBuf>,
}

impl FileCatalog {
    /// Creates the adapter; `None` disables the catalog entirely.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl ModuleCatalog for FileCatalog {
    fn modules_awaiting(&self) -> WorkflowResult<Vec<AwaitingModule>> {
        let path = match &self.path {
            Some(path) => path,
            None => return Ok(Vec::new()),
        };
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "catalog export unreadable");
                return Ok(Vec::new());
            }
        };
        serde_json::from_str(&contents).map_err(|e| {
            WorkflowError::internal(format!(
                "catalog export {} is malformed: {}",
                path.display(),
                e
            ))
        })
    }
}
