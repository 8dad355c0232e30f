use std::fs;
use std::path::{Path, PathBuf};

use qsa_interface::{ErrorCode, WorkflowError, WorkflowResult};

/// Owns the SVG output directory: writes carrier artwork under
/// deterministic names (overwriting on collision) and best-effort cleans
/// a batch's files away once it completes.
#[derive(Debug, Clone)]
pub struct SvgFileManager {
    output_dir: PathBuf,
    keep_files: bool,
}

impl SvgFileManager {
    /// Creates the manager, ensuring the output directory exists.
    pub fn new(output_dir: impl Into<PathBuf>, keep_files: bool) -> WorkflowResult<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir).map_err(|e| {
            WorkflowError::new(
                ErrorCode::InvalidPath,
                format!("cannot create output dir {}: {}", output_dir.display(), e),
            )
        })?;
        Ok(Self {
            output_dir,
            keep_files,
        })
    }

    /// Writes one document, returning its absolute path.
    pub fn write(&self, file_name: &str, contents: &str) -> WorkflowResult<PathBuf> {
        let path = self.output_dir.join(file_name);
        fs::write(&path, contents).map_err(|e| {
            WorkflowError::new(
                ErrorCode::InsertFailed,
                format!("cannot write {}: {}", path.display(), e),
            )
        })?;
        Ok(path)
    }

    /// The path a previously generated file would live at.
    pub fn path_of(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }

    /// Whether a previously generated file is on disk.
    pub fn exists(&self, file_name: &str) -> bool {
        self.output_dir.join(file_name).is_file()
    }

    /// Removes every file of a completed batch, unless configured to
    /// keep them. Failures are logged and swallowed; orphans are
    /// tolerated.
    pub fn cleanup_batch(&self, batch_id: i64) {
        if self.keep_files {
            return;
        }
        let prefix = format!("{}-", batch_id);
        let entries = match fs::read_dir(&self.output_dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %self.output_dir.display(), error = %e, "cleanup skipped");
                return;
            }
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(&prefix) && name.ends_with(".svg") {
                if let Err(e) = fs::remove_file(entry.path()) {
                    tracing::warn!(file = %name, error = %e, "cleanup failed");
                }
            }
        }
    }

    /// The output directory.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_overwrites_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SvgFileManager::new(dir.path().join("svg"), false).unwrap();

        manager.write("1-1.svg", "first").unwrap();
        let path = manager.write("1-1.svg", "second").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "second");
    }

    #[test]
    fn cleanup_removes_only_the_batch_files() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SvgFileManager::new(dir.path(), false).unwrap();
        manager.write("7-1.svg", "a").unwrap();
        manager.write("7-2.svg", "b").unwrap();
        manager.write("8-1.svg", "c").unwrap();

        manager.cleanup_batch(7);
        assert!(!manager.exists("7-1.svg"));
        assert!(!manager.exists("7-2.svg"));
        assert!(manager.exists("8-1.svg"));
    }

    #[test]
    fn keep_files_disables_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SvgFileManager::new(dir.path(), true).unwrap();
        manager.write("7-1.svg", "a").unwrap();
        manager.cleanup_batch(7);
        assert!(manager.exists("7-1.svg"));
    }
}
