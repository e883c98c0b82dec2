//! Workspace allocation and forced directory removal.
//!
//! A `Workspace` is one freshly created, uniquely named directory under the
//! temp root. It is owned by exactly one invocation; the orchestrator hands it
//! to the reclaimer on every exit path. If a workspace is dropped without
//! having been released (a panic between allocation and reclamation), `Drop`
//! makes a final best-effort removal.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::paths::new_workspace_name;
use crate::error::LifecycleError;

/// Attempts made when a generated name already exists on disk.
const MAX_NAME_ATTEMPTS: usize = 3;

/// An isolated, uniquely named directory scoped to one tool invocation.
#[derive(Debug)]
pub struct Workspace {
    id: String,
    path: PathBuf,
    released: bool,
}

impl Workspace {
    /// Creates a new workspace directory under `temp_root`.
    pub fn allocate(temp_root: &Path) -> Result<Self, LifecycleError> {
        fs::create_dir_all(temp_root).map_err(|e| LifecycleError::io(temp_root, e))?;

        let mut last_err = None;
        for _ in 0..MAX_NAME_ATTEMPTS {
            let id = new_workspace_name();
            let path = temp_root.join(&id);

            match fs::create_dir(&path) {
                Ok(()) => {
                    info!("Allocated workspace {}", path.display());
                    return Ok(Self {
                        id,
                        path,
                        released: false,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!("Workspace name collision at {}, retrying", path.display());
                    last_err = Some(LifecycleError::io(&path, e));
                }
                Err(e) => return Err(LifecycleError::io(&path, e)),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            LifecycleError::io(temp_root, "could not generate a unique workspace name")
        }))
    }

    /// The UUID that names this workspace.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recursively removes the workspace. Succeeds if it is already gone.
    pub fn destroy(&self) -> io::Result<()> {
        force_remove_dir(&self.path)
    }

    /// Marks the workspace as handed off so `Drop` leaves it alone.
    pub(crate) fn release(mut self) -> PathBuf {
        self.released = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.destroy() {
            warn!(
                "Workspace {} dropped without reclamation and could not be removed: {}",
                self.path.display(),
                e
            );
        }
    }
}

// ============================================================================
// Forced Removal
// ============================================================================

/// Removes a directory tree, clearing read-only flags and retrying once if the
/// first attempt fails. A missing directory counts as success.
pub fn force_remove_dir(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => return Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => debug!(
            "First removal of {} failed ({}), clearing read-only flags",
            path.display(),
            e
        ),
    }

    clear_readonly(path);

    match fs::remove_dir_all(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[allow(clippy::permissions_set_readonly_false)]
fn clear_readonly(path: &Path) {
    for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let mut permissions = metadata.permissions();
        if permissions.readonly() {
            permissions.set_readonly(false);
            if let Err(e) = fs::set_permissions(entry.path(), permissions) {
                debug!("Could not clear read-only on {}: {}", entry.path().display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::paths::is_workspace_dir_name;
    use tempfile::TempDir;

    #[test]
    fn test_allocate_creates_named_dir() {
        let root = TempDir::new().unwrap();
        let ws = Workspace::allocate(root.path()).unwrap();

        assert!(ws.path().is_dir());
        assert!(ws.path().starts_with(root.path()));
        assert!(is_workspace_dir_name(ws.path()));
        assert_eq!(ws.path().file_name().unwrap().to_str(), Some(ws.id()));
    }

    #[test]
    fn test_allocate_creates_missing_root() {
        let root = TempDir::new().unwrap();
        let nested = root.path().join("a/b");
        let ws = Workspace::allocate(&nested).unwrap();
        assert!(ws.path().starts_with(&nested));
    }

    #[test]
    fn test_allocate_fails_when_root_is_a_file() {
        let root = TempDir::new().unwrap();
        let file = root.path().join("file");
        fs::write(&file, b"x").unwrap();

        let err = Workspace::allocate(&file).unwrap_err();
        assert!(matches!(err, LifecycleError::Io { .. }));
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let root = TempDir::new().unwrap();
        let ws = Workspace::allocate(root.path()).unwrap();
        fs::create_dir_all(ws.path().join("nested/deeper")).unwrap();
        fs::write(ws.path().join("nested/deeper/file.bin"), b"data").unwrap();

        ws.destroy().unwrap();
        assert!(!ws.path().exists());
        ws.destroy().unwrap();
    }

    #[test]
    fn test_drop_removes_unreleased_workspace() {
        let root = TempDir::new().unwrap();
        let path = {
            let ws = Workspace::allocate(root.path()).unwrap();
            fs::write(ws.path().join("leftover.txt"), b"x").unwrap();
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_release_keeps_directory() {
        let root = TempDir::new().unwrap();
        let ws = Workspace::allocate(root.path()).unwrap();
        let path = ws.release();
        assert!(path.is_dir());
    }

    #[test]
    fn test_force_remove_clears_readonly_files() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("tree");
        fs::create_dir_all(dir.join("sub")).unwrap();
        let file = dir.join("sub/locked.txt");
        fs::write(&file, b"x").unwrap();

        let mut perms = fs::metadata(&file).unwrap().permissions();
        perms.set_readonly(true);
        fs::set_permissions(&file, perms).unwrap();

        force_remove_dir(&dir).unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn test_force_remove_missing_dir_is_ok() {
        let root = TempDir::new().unwrap();
        force_remove_dir(&root.path().join("never-existed")).unwrap();
    }
}
