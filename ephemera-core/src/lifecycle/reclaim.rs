//! Single-workspace reclamation at the end of an invocation.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::workspace::Workspace;

/// What happened to a workspace at the end of its invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReclaimOutcome {
    Removed { path: PathBuf },
    /// Removal failed; the directory (or part of it) is left for manual cleanup.
    Residual { path: PathBuf, error: String },
}

impl ReclaimOutcome {
    pub fn path(&self) -> &Path {
        match self {
            Self::Removed { path } | Self::Residual { path, .. } => path,
        }
    }

    pub fn is_residual(&self) -> bool {
        matches!(self, Self::Residual { .. })
    }

    /// User-facing warning for a residual workspace.
    pub fn warning(&self) -> Option<String> {
        match self {
            Self::Removed { .. } => None,
            Self::Residual { path, error } => Some(format!(
                "Workspace {} could not be removed ({}); delete it manually",
                path.display(),
                error
            )),
        }
    }
}

/// Waits `grace` for the exited tool to release its handles, then removes
/// the workspace. Failures are downgraded to [`ReclaimOutcome::Residual`].
pub async fn reclaim(workspace: Workspace, grace: Duration) -> ReclaimOutcome {
    if !grace.is_zero() {
        tokio::time::sleep(grace).await;
    }

    let result = workspace.destroy();
    let path = workspace.release();

    match result {
        Ok(()) => {
            info!("Reclaimed workspace {}", path.display());
            ReclaimOutcome::Removed { path }
        }
        Err(e) => {
            warn!("Residual workspace left at {}: {}", path.display(), e);
            ReclaimOutcome::Residual {
                path,
                error: e.to_string(),
            }
        }
    }
}
