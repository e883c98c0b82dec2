//! Ephemeral tool lifecycle: allocate a workspace, acquire the artifact,
//! locate and run the executable, reclaim the workspace.
//!
//! # Architecture
//!
//! - `types`: descriptors, archive formats and lifecycle states
//! - `paths`: workspace naming scheme
//! - `workspace`: allocation and forced removal
//! - `downloader`: `Fetcher` interface and the HTTP implementation
//! - `extractor`: zip / tar.gz / tar.xz expansion
//! - `acquirer`: download (and expand) into a workspace
//! - `locator`: find the executable in an extracted tree
//! - `runner`: `Launcher` interface and the process implementation
//! - `reclaim`: end-of-invocation removal with a grace period
//! - `sweep`: guarded bulk removal of leftover workspaces
//! - `orchestrator`: the state machine tying it together

pub mod acquirer;
pub mod downloader;
pub mod extractor;
pub mod locator;
pub mod orchestrator;
pub mod paths;
pub mod reclaim;
pub mod runner;
pub mod sweep;
pub mod types;
pub mod workspace;

pub use acquirer::{fetch_and_expand_archive, fetch_executable};
pub use downloader::{validate_url, DownloadProgress, Fetcher, HttpFetcher, ProgressCallback};
pub use locator::{list_entries, locate};
pub use orchestrator::{InvocationReport, LifecycleObserver, LifecycleOrchestrator, NoopObserver};
pub use paths::{is_workspace_dir_name, is_workspace_name, new_workspace_name};
pub use reclaim::{reclaim, ReclaimOutcome};
pub use runner::{Launcher, ProcessLauncher};
pub use sweep::{sweep_all, SkipReason, SweepEntry, SweepOutcome, SweepReport};
pub use types::{ArchiveFormat, ArtifactDescriptor, ArtifactKind, ExtractionPolicy, LifecycleState};
pub use workspace::{force_remove_dir, Workspace};
