//! Finds the executable to launch inside an extracted tree.
//!
//! Traversal is depth-first pre-order with siblings sorted by file name, so
//! the result does not depend on the order the filesystem returns entries.
//! A directory's own files and subdirectories are interleaved by name; the
//! first file whose base name matches (ASCII case-insensitive) wins.

use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::LifecycleError;

fn walk(root: &Path) -> impl Iterator<Item = walkdir::DirEntry> {
    WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
}

/// Searches `root` recursively for a file named `executable`.
///
/// Returns [`LifecycleError::NotFound`] listing every entry under `root` when
/// nothing matches.
pub fn locate(root: &Path, executable: &str) -> Result<PathBuf, LifecycleError> {
    let found = walk(root).find(|entry| {
        entry.file_type().is_file()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.eq_ignore_ascii_case(executable))
    });

    match found {
        Some(entry) => {
            debug!("Located {} at {}", executable, entry.path().display());
            Ok(entry.into_path())
        }
        None => Err(LifecycleError::NotFound {
            executable: executable.to_string(),
            available: list_entries(root),
        }),
    }
}

/// Lists every entry under `root` as a `/`-separated path relative to it, in
/// traversal order. Directories carry a trailing `/`.
pub fn list_entries(root: &Path) -> Vec<String> {
    walk(root)
        .filter_map(|entry| {
            let rel = entry.path().strip_prefix(root).ok()?;
            let mut name = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if entry.file_type().is_dir() {
                name.push('/');
            }
            Some(name)
        })
        .collect()
}
