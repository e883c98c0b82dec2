//! Error taxonomy for a single tool invocation.
//!
//! Every variant terminates the forward progress of one invocation but never
//! the process: the orchestrator records it in the invocation report and still
//! runs reclamation.

use std::path::PathBuf;
use thiserror::Error;

use crate::lifecycle::LifecycleState;

/// Errors that can end an invocation early.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Filesystem error at {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("Download from {url} failed: {reason}")]
    Download { url: String, reason: String },

    #[error("Could not expand archive {archive}: {reason}")]
    Extract { archive: PathBuf, reason: String },

    #[error("Executable '{executable}' not found ({} entries extracted)", available.len())]
    NotFound {
        executable: String,
        available: Vec<String>,
    },

    #[error("Failed to launch {path}: {reason}")]
    Launch { path: PathBuf, reason: String },
}

impl LifecycleError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::Io {
            path: path.into(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn download(url: &str, err: &anyhow::Error) -> Self {
        Self::Download {
            url: url.to_string(),
            reason: format!("{:#}", err),
        }
    }

    pub(crate) fn extract(archive: impl Into<PathBuf>, err: &anyhow::Error) -> Self {
        Self::Extract {
            archive: archive.into(),
            reason: format!("{:#}", err),
        }
    }

    /// The lifecycle state in which this error is raised.
    pub fn step(&self) -> LifecycleState {
        match self {
            Self::Io { .. } => LifecycleState::Allocating,
            Self::Download { .. } | Self::Extract { .. } => LifecycleState::Acquiring,
            Self::NotFound { .. } => LifecycleState::Locating,
            Self::Launch { .. } => LifecycleState::Running,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_mapping() {
        let err = LifecycleError::Download {
            url: "https://example.com/a.zip".into(),
            reason: "404".into(),
        };
        assert_eq!(err.step(), LifecycleState::Acquiring);

        let err = LifecycleError::NotFound {
            executable: "tool.exe".into(),
            available: vec!["readme.txt".into()],
        };
        assert_eq!(err.step(), LifecycleState::Locating);
        assert!(err.to_string().contains("tool.exe"));
        assert!(err.to_string().contains("1 entries"));
    }

    #[test]
    fn test_download_keeps_context_chain() {
        let inner = anyhow::anyhow!("connection reset").context("Failed to read chunk");
        let err = LifecycleError::download("https://example.com/x", &inner);
        let msg = err.to_string();
        assert!(msg.contains("Failed to read chunk"));
        assert!(msg.contains("connection reset"));
    }
}
