//! Ephemera Core Library
//!
//! Runs downloaded third-party tools from throwaway workspaces and leaves
//! nothing behind. It includes:
//!
//! - Workspace allocation under the temp root
//! - Artifact download and archive expansion
//! - Executable lookup and launch
//! - Reclamation of single workspaces and a guarded sweep of leftovers
//! - Configuration and the error taxonomy shared by all of the above

pub mod config;
pub mod error;
pub mod lifecycle;

// Re-exports for convenience
pub use config::{LifecycleConfig, NameSet};
pub use error::LifecycleError;

// Re-export lifecycle
pub use lifecycle::{
    ArtifactDescriptor, ArtifactKind, DownloadProgress, ExtractionPolicy, Fetcher, HttpFetcher,
    InvocationReport, Launcher, LifecycleObserver, LifecycleOrchestrator, LifecycleState,
    ProcessLauncher, ReclaimOutcome, SkipReason, SweepEntry, SweepOutcome, SweepReport,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn default_user_agent_carries_version() {
        let config = LifecycleConfig::default();
        assert!(config.user_agent.ends_with(VERSION));
    }
}
