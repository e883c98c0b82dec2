//! Bulk reclamation of workspaces left behind by earlier runs.
//!
//! Every top-level directory under the temp root whose name looks like a
//! workspace is a candidate. A candidate is not necessarily ours: other
//! software uses the same naming scheme. Each one therefore passes two
//! guards before it is removed:
//!
//! 1. Foreign content: any file whose name is in the protected set marks the
//!    directory as owned by something else.
//! 2. In use: any loadable binary that cannot be opened exclusively is taken
//!    to belong to a live process. On Windows this is a share-mode open, which
//!    fails while the image is mapped. Unix has no such check, so the guard
//!    there only sees holders of an advisory `flock` and not a binary that is
//!    merely being executed.
//!
//! Directories that fail the name pattern are never opened.

use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::paths::is_workspace_dir_name;
use super::workspace::force_remove_dir;
use crate::config::NameSet;

// ============================================================================
// Report Types
// ============================================================================

/// Why a candidate was left alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Contains a file from the protected-name set.
    Protected { file: PathBuf },
    /// Contains a binary another process holds open.
    InUse { file: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SweepOutcome {
    Cleaned,
    Skipped(SkipReason),
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepEntry {
    pub path: PathBuf,
    pub outcome: SweepOutcome,
}

/// Tally of one sweep, with the per-candidate detail behind it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub cleaned: usize,
    pub skipped: usize,
    pub failed: usize,
    pub entries: Vec<SweepEntry>,
}

impl SweepReport {
    fn record(mut self, path: PathBuf, outcome: SweepOutcome) -> Self {
        match outcome {
            SweepOutcome::Cleaned => self.cleaned += 1,
            SweepOutcome::Skipped(_) => self.skipped += 1,
            SweepOutcome::Failed { .. } => self.failed += 1,
        }
        self.entries.push(SweepEntry { path, outcome });
        self
    }

    pub fn total(&self) -> usize {
        self.entries.len()
    }

    /// Looks up the outcome recorded for `path`.
    pub fn outcome_for(&self, path: &Path) -> Option<&SweepOutcome> {
        self.entries
            .iter()
            .find(|e| e.path == path)
            .map(|e| &e.outcome)
    }
}

// ============================================================================
// Sweep
// ============================================================================

/// Classifies and, where safe, removes every workspace-named directory
/// directly under `temp_root`. Never fails; faults are recorded per candidate.
pub fn sweep_all(temp_root: &Path, protected: &NameSet, binary_extensions: &NameSet) -> SweepReport {
    sweep_with(temp_root, protected, binary_extensions, &force_remove_dir)
}

fn sweep_with(
    temp_root: &Path,
    protected: &NameSet,
    binary_extensions: &NameSet,
    remove: &dyn Fn(&Path) -> io::Result<()>,
) -> SweepReport {
    info!("Sweeping workspaces under {}", temp_root.display());

    let report = candidates(temp_root)
        .into_iter()
        .fold(SweepReport::default(), |report, candidate| {
            let outcome = classify_and_remove(&candidate, protected, binary_extensions, remove);
            report.record(candidate, outcome)
        });

    info!(
        "Sweep complete: {} cleaned, {} skipped, {} failed",
        report.cleaned, report.skipped, report.failed
    );
    report
}

/// Top-level directories under `temp_root` with a workspace name, sorted.
/// Symlinks are not candidates.
fn candidates(temp_root: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(temp_root) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot read temp root {}: {}", temp_root.display(), e);
            return Vec::new();
        }
    };

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
        .map(|e| e.path())
        .filter(|p| is_workspace_dir_name(p))
        .collect();
    dirs.sort();
    dirs
}

fn classify_and_remove(
    dir: &Path,
    protected: &NameSet,
    binary_extensions: &NameSet,
    remove: &dyn Fn(&Path) -> io::Result<()>,
) -> SweepOutcome {
    let files = match list_files(dir) {
        Ok(files) => files,
        Err(e) => {
            warn!("Cannot inspect {}: {}", dir.display(), e);
            return SweepOutcome::Failed {
                error: format!("could not inspect contents: {}", e),
            };
        }
    };

    if let Some(file) = files.iter().find(|f| protected.matches_file_name(f)) {
        debug!("Skipping {}: protected file {}", dir.display(), file.display());
        return SweepOutcome::Skipped(SkipReason::Protected { file: file.clone() });
    }

    if let Some(file) = files
        .iter()
        .filter(|f| binary_extensions.matches_extension(f))
        .find(|f| !can_open_exclusive(f))
    {
        debug!("Skipping {}: {} is in use", dir.display(), file.display());
        return SweepOutcome::Skipped(SkipReason::InUse { file: file.clone() });
    }

    match remove(dir) {
        Ok(()) => {
            debug!("Removed {}", dir.display());
            SweepOutcome::Cleaned
        }
        Err(e) => {
            warn!("Failed to remove {}: {}", dir.display(), e);
            SweepOutcome::Failed {
                error: e.to_string(),
            }
        }
    }
}

fn list_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_dir() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

// ============================================================================
// In-Use Probe
// ============================================================================

/// True if nothing else holds `path` open in a way that blocks exclusive
/// access.
#[cfg(windows)]
fn can_open_exclusive(path: &Path) -> bool {
    use std::os::windows::fs::OpenOptionsExt;

    fs::OpenOptions::new()
        .read(true)
        .share_mode(0)
        .open(path)
        .is_ok()
}

/// True if `path` can be opened and an exclusive advisory lock taken on it.
#[cfg(not(windows))]
fn can_open_exclusive(path: &Path) -> bool {
    let Ok(file) = fs::File::open(path) else {
        return false;
    };
    let locked = fs2::FileExt::try_lock_exclusive(&file).is_ok();
    if locked {
        let _ = fs2::FileExt::unlock(&file);
    }
    locked
}
