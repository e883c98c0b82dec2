//! The per-invocation state machine.
//!
//! ```text
//! Allocating -> Acquiring -> Locating -> Running -> Reclaiming -> Done
//!                   |            |
//!                   +------------+--> Reclaiming (on failure)
//! ```
//!
//! The workspace is owned by `run` and only borrowed by the steps in between,
//! so every path out of acquisition, location or execution falls through to
//! reclamation. Allocation failure is the one path with nothing to reclaim.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use super::acquirer::{fetch_and_expand_archive, fetch_executable};
use super::downloader::{Fetcher, HttpFetcher};
use super::locator::locate;
use super::reclaim::{reclaim, ReclaimOutcome};
use super::runner::{Launcher, ProcessLauncher};
use super::sweep::{sweep_all, SweepReport};
use super::types::{ArtifactDescriptor, ArtifactKind, LifecycleState};
use super::workspace::Workspace;
use crate::config::LifecycleConfig;
use crate::error::LifecycleError;

// ============================================================================
// Observer
// ============================================================================

/// Hook called on every state transition, before the new state's work
/// starts. Callers use it for progress output or to pause between steps.
pub trait LifecycleObserver: Send + Sync {
    fn on_transition(&self, tool: &str, from: Option<LifecycleState>, to: LifecycleState) {
        let _ = (tool, from, to);
    }
}

/// Observer that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl LifecycleObserver for NoopObserver {}

// ============================================================================
// Invocation Report
// ============================================================================

/// Everything the caller needs to render the outcome of one invocation.
#[derive(Debug)]
pub struct InvocationReport {
    pub tool_name: String,
    /// The workspace that was allocated, if allocation succeeded.
    pub workspace: Option<PathBuf>,
    /// States visited, in order. Always ends with `Done`.
    pub trace: Vec<LifecycleState>,
    /// Exit code of the tool, when it ran and the platform reported one.
    pub exit_code: Option<i32>,
    pub failure: Option<LifecycleError>,
    pub reclamation: Option<ReclaimOutcome>,
}

impl InvocationReport {
    /// True if the tool ran to completion, whatever its exit code.
    pub fn ran(&self) -> bool {
        self.failure.is_none() && self.trace.contains(&LifecycleState::Running)
    }

    /// The state in which the invocation failed.
    pub fn failed_step(&self) -> Option<LifecycleState> {
        self.failure.as_ref().map(LifecycleError::step)
    }

    /// Non-fatal problems, currently only a residual workspace.
    pub fn warnings(&self) -> Vec<String> {
        self.reclamation
            .iter()
            .filter_map(ReclaimOutcome::warning)
            .collect()
    }
}

/// Records visited states and forwards transitions to the observer.
struct Transitions<'a> {
    tool: &'a str,
    observer: &'a dyn LifecycleObserver,
    trace: Vec<LifecycleState>,
}

impl<'a> Transitions<'a> {
    fn new(tool: &'a str, observer: &'a dyn LifecycleObserver) -> Self {
        Self {
            tool,
            observer,
            trace: Vec::with_capacity(6),
        }
    }

    fn enter(&mut self, to: LifecycleState) {
        let from = self.trace.last().copied();
        info!(tool = self.tool, "{} -> {}", from.map_or("start", |s| s.as_str()), to);
        self.observer.on_transition(self.tool, from, to);
        self.trace.push(to);
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Sequences allocation, acquisition, location, execution and reclamation.
pub struct LifecycleOrchestrator {
    config: LifecycleConfig,
    fetcher: Arc<dyn Fetcher>,
    launcher: Arc<dyn Launcher>,
    observer: Arc<dyn LifecycleObserver>,
}

impl LifecycleOrchestrator {
    pub fn new(
        config: LifecycleConfig,
        fetcher: Arc<dyn Fetcher>,
        launcher: Arc<dyn Launcher>,
    ) -> Self {
        Self {
            config,
            fetcher,
            launcher,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Orchestrator that downloads over HTTP and launches real processes.
    pub fn from_config(config: LifecycleConfig) -> anyhow::Result<Self> {
        let fetcher = HttpFetcher::new(&config)?;
        Ok(Self::new(config, Arc::new(fetcher), Arc::new(ProcessLauncher)))
    }

    pub fn with_observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Runs one tool through the full lifecycle. Never fails: errors are
    /// carried in the report.
    pub async fn run(&self, descriptor: &ArtifactDescriptor) -> InvocationReport {
        let tool = descriptor.tool_name.as_str();
        let mut transitions = Transitions::new(tool, self.observer.as_ref());

        transitions.enter(LifecycleState::Allocating);
        let workspace = match Workspace::allocate(&self.config.temp_root()) {
            Ok(workspace) => workspace,
            Err(e) => {
                warn!(tool, "Allocation failed: {}", e);
                transitions.enter(LifecycleState::Done);
                return InvocationReport {
                    tool_name: descriptor.tool_name.clone(),
                    workspace: None,
                    trace: transitions.trace,
                    exit_code: None,
                    failure: Some(e),
                    reclamation: None,
                };
            }
        };
        let workspace_path = workspace.path().to_path_buf();

        let outcome = self.drive(&workspace, descriptor, &mut transitions).await;
        if let Err(e) = &outcome {
            warn!(tool, "Failed while {}: {}", e.step(), e);
        }

        transitions.enter(LifecycleState::Reclaiming);
        let reclamation = reclaim(workspace, self.config.grace_period()).await;
        transitions.enter(LifecycleState::Done);

        let (exit_code, failure) = match outcome {
            Ok(code) => (code, None),
            Err(e) => (None, Some(e)),
        };

        InvocationReport {
            tool_name: descriptor.tool_name.clone(),
            workspace: Some(workspace_path),
            trace: transitions.trace,
            exit_code,
            failure,
            reclamation: Some(reclamation),
        }
    }

    /// Acquiring through Running. Returns the tool's exit code.
    async fn drive(
        &self,
        workspace: &Workspace,
        descriptor: &ArtifactDescriptor,
        transitions: &mut Transitions<'_>,
    ) -> Result<Option<i32>, LifecycleError> {
        transitions.enter(LifecycleState::Acquiring);
        let search_root = match descriptor.kind {
            ArtifactKind::SingleExecutable => {
                fetch_executable(
                    workspace,
                    self.fetcher.as_ref(),
                    &descriptor.url,
                    &descriptor.executable,
                )
                .await?;
                workspace.path().to_path_buf()
            }
            ArtifactKind::Archive => {
                fetch_and_expand_archive(
                    workspace,
                    self.fetcher.as_ref(),
                    &descriptor.url,
                    &descriptor.extraction,
                )
                .await?
            }
        };

        transitions.enter(LifecycleState::Locating);
        let executable = locate(&search_root, &descriptor.executable)?;

        transitions.enter(LifecycleState::Running);
        self.launcher.run_and_wait(&executable).await
    }

    /// Runs each descriptor in turn. Each workspace is reclaimed before the
    /// next one is allocated.
    pub async fn run_all(&self, descriptors: &[ArtifactDescriptor]) -> Vec<InvocationReport> {
        let mut reports = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            reports.push(self.run(descriptor).await);
        }
        reports
    }

    /// Bulk sweep of the configured temp root.
    pub fn sweep(&self) -> SweepReport {
        sweep_all(
            &self.config.temp_root(),
            &self.config.protected_names,
            &self.config.binary_extensions,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::paths::is_workspace_dir_name;
    use crate::lifecycle::types::ExtractionPolicy;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::io::Write;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serves payloads by URL; unknown URLs fail like an HTTP 404.
    #[derive(Default)]
    struct MapFetcher {
        payloads: HashMap<String, Vec<u8>>,
    }

    impl MapFetcher {
        fn serve(mut self, url: &str, body: Vec<u8>) -> Self {
            self.payloads.insert(url.to_string(), body);
            self
        }
    }

    #[async_trait]
    impl Fetcher for MapFetcher {
        async fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
            match self.payloads.get(url) {
                Some(body) => {
                    std::fs::write(dest, body)?;
                    Ok(body.len() as u64)
                }
                None => anyhow::bail!("Download failed with status 404: Not Found"),
            }
        }
    }

    /// Records launches instead of spawning, and counts the workspaces that
    /// exist under the temp root at launch time.
    struct RecordingLauncher {
        temp_root: PathBuf,
        launched: Mutex<Vec<(PathBuf, usize)>>,
        exit_code: Option<i32>,
    }

    impl RecordingLauncher {
        fn new(temp_root: &Path) -> Self {
            Self {
                temp_root: temp_root.to_path_buf(),
                launched: Mutex::new(Vec::new()),
                exit_code: Some(0),
            }
        }

        fn launches(&self) -> Vec<(PathBuf, usize)> {
            self.launched.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Launcher for RecordingLauncher {
        async fn run_and_wait(&self, executable: &Path) -> Result<Option<i32>, LifecycleError> {
            let live = workspace_dirs(&self.temp_root).len();
            self.launched
                .lock()
                .unwrap()
                .push((executable.to_path_buf(), live));
            Ok(self.exit_code)
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        seen: Mutex<Vec<(Option<LifecycleState>, LifecycleState)>>,
    }

    impl LifecycleObserver for RecordingObserver {
        fn on_transition(&self, _tool: &str, from: Option<LifecycleState>, to: LifecycleState) {
            self.seen.lock().unwrap().push((from, to));
        }
    }

    fn workspace_dirs(root: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(root)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| is_workspace_dir_name(p))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn config_for(root: &Path) -> LifecycleConfig {
        LifecycleConfig {
            temp_root: Some(root.to_path_buf()),
            grace_period_ms: 0,
            ..Default::default()
        }
    }

    fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        for (name, data) in files {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn orchestrator(
        root: &Path,
        fetcher: MapFetcher,
    ) -> (LifecycleOrchestrator, Arc<RecordingLauncher>) {
        let launcher = Arc::new(RecordingLauncher::new(root));
        let orch = LifecycleOrchestrator::new(config_for(root), Arc::new(fetcher), launcher.clone());
        (orch, launcher)
    }

    use LifecycleState::*;

    #[tokio::test]
    async fn test_single_executable_happy_path() {
        let root = TempDir::new().unwrap();
        let url = "https://example.com/Autoruns64.exe";
        let (orch, launcher) = orchestrator(root.path(), MapFetcher::default().serve(url, b"MZ".to_vec()));

        let report = orch
            .run(&ArtifactDescriptor::executable("Autoruns", url, "Autoruns64.exe"))
            .await;

        assert!(report.ran());
        assert!(report.failure.is_none());
        assert_eq!(report.exit_code, Some(0));
        assert_eq!(
            report.trace,
            vec![Allocating, Acquiring, Locating, Running, Reclaiming, Done]
        );
        assert!(report.warnings().is_empty());

        let workspace = report.workspace.unwrap();
        assert!(!workspace.exists());

        let launches = launcher.launches();
        assert_eq!(launches.len(), 1);
        assert!(launches[0].0.starts_with(&workspace));
        assert!(launches[0].0.ends_with("Autoruns64.exe"));
        assert!(workspace_dirs(root.path()).is_empty());
    }

    #[tokio::test]
    async fn test_archive_download_error_skips_locate_and_run() {
        let root = TempDir::new().unwrap();
        let (orch, launcher) = orchestrator(root.path(), MapFetcher::default());

        let report = orch
            .run(&ArtifactDescriptor::archive(
                "TCPView",
                "https://example.com/TCPView.zip",
                "tcpview64.exe",
                ExtractionPolicy::Subfolder("TCPView".into()),
            ))
            .await;

        assert!(matches!(report.failure, Some(LifecycleError::Download { .. })));
        assert_eq!(report.failed_step(), Some(Acquiring));
        assert_eq!(report.trace, vec![Allocating, Acquiring, Reclaiming, Done]);
        assert!(launcher.launches().is_empty());
        assert!(!report.workspace.unwrap().exists());
    }

    #[tokio::test]
    async fn test_archive_without_executable_reports_entries() {
        let root = TempDir::new().unwrap();
        let url = "https://example.com/tool.zip";
        let fetcher = MapFetcher::default().serve(
            url,
            zip_bytes(&[("Eula.txt", b"terms"), ("bin/other.exe", b"MZ")]),
        );
        let (orch, launcher) = orchestrator(root.path(), fetcher);

        let report = orch
            .run(&ArtifactDescriptor::archive("Tool", url, "tool.exe", ExtractionPolicy::Direct))
            .await;

        match &report.failure {
            Some(LifecycleError::NotFound {
                executable,
                available,
            }) => {
                assert_eq!(executable, "tool.exe");
                assert!(available.contains(&"Eula.txt".to_string()));
                assert!(available.contains(&"bin/other.exe".to_string()));
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
        assert_eq!(
            report.trace,
            vec![Allocating, Acquiring, Locating, Reclaiming, Done]
        );
        assert!(launcher.launches().is_empty());
        assert!(!report.workspace.unwrap().exists());
    }

    #[tokio::test]
    async fn test_archive_nested_executable_is_launched() {
        let root = TempDir::new().unwrap();
        let url = "https://example.com/ProcessExplorer.zip";
        let fetcher = MapFetcher::default().serve(
            url,
            zip_bytes(&[("procexp.exe", b"MZ"), ("x64/PROCEXP64.EXE", b"MZ")]),
        );
        let (orch, launcher) = orchestrator(root.path(), fetcher);

        let report = orch
            .run(&ArtifactDescriptor::archive(
                "Process Explorer",
                url,
                "procexp64.exe",
                ExtractionPolicy::Subfolder("ProcessExplorer".into()),
            ))
            .await;

        assert!(report.ran());
        let launches = launcher.launches();
        assert_eq!(launches.len(), 1);
        assert!(launches[0]
            .0
            .ends_with(Path::new("ProcessExplorer").join("x64").join("PROCEXP64.EXE")));
    }

    struct FailingLauncher;

    #[async_trait]
    impl Launcher for FailingLauncher {
        async fn run_and_wait(&self, executable: &Path) -> Result<Option<i32>, LifecycleError> {
            Err(LifecycleError::Launch {
                path: executable.to_path_buf(),
                reason: "Permission denied (os error 13)".into(),
            })
        }
    }

    #[tokio::test]
    async fn test_launch_failure_still_reclaims() {
        let root = TempDir::new().unwrap();
        let url = "https://example.com/tool.exe";
        let orch = LifecycleOrchestrator::new(
            config_for(root.path()),
            Arc::new(MapFetcher::default().serve(url, b"MZ".to_vec())),
            Arc::new(FailingLauncher),
        );

        let report = orch
            .run(&ArtifactDescriptor::executable("Broken", url, "tool.exe"))
            .await;

        assert!(!report.ran());
        assert_eq!(report.failed_step(), Some(Running));
        assert_eq!(
            report.trace,
            vec![Allocating, Acquiring, Locating, Running, Reclaiming, Done]
        );
        assert!(!report.workspace.unwrap().exists());
    }

    /// Replaces the workspace directory with a plain file while "running",
    /// so reclamation cannot remove it.
    struct SquattingLauncher;

    #[async_trait]
    impl Launcher for SquattingLauncher {
        async fn run_and_wait(&self, executable: &Path) -> Result<Option<i32>, LifecycleError> {
            let workspace = executable.parent().unwrap();
            std::fs::remove_dir_all(workspace).unwrap();
            std::fs::write(workspace, b"held").unwrap();
            Ok(Some(0))
        }
    }

    #[tokio::test]
    async fn test_residual_workspace_is_reported_as_warning() {
        let root = TempDir::new().unwrap();
        let url = "https://example.com/tool.exe";
        let orch = LifecycleOrchestrator::new(
            config_for(root.path()),
            Arc::new(MapFetcher::default().serve(url, b"MZ".to_vec())),
            Arc::new(SquattingLauncher),
        );

        let report = orch
            .run(&ArtifactDescriptor::executable("Tool", url, "tool.exe"))
            .await;

        assert!(report.ran());
        assert!(report.failure.is_none());
        assert_eq!(report.trace.last(), Some(&Done));

        let workspace = report.workspace.clone().unwrap();
        let reclamation = report.reclamation.as_ref().unwrap();
        assert!(reclamation.is_residual());
        assert_eq!(reclamation.path(), workspace);
        assert!(workspace.exists());

        let warnings = report.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains(&workspace.display().to_string()));
    }

    #[tokio::test]
    async fn test_allocation_failure_has_no_workspace() {
        let root = TempDir::new().unwrap();
        let not_a_dir = root.path().join("file");
        std::fs::write(&not_a_dir, b"x").unwrap();
        let (orch, launcher) = orchestrator(&not_a_dir, MapFetcher::default());

        let report = orch
            .run(&ArtifactDescriptor::executable("Tool", "https://example.com/t.exe", "t.exe"))
            .await;

        assert!(matches!(report.failure, Some(LifecycleError::Io { .. })));
        assert_eq!(report.trace, vec![Allocating, Done]);
        assert!(report.workspace.is_none());
        assert!(report.reclamation.is_none());
        assert!(launcher.launches().is_empty());
    }

    #[tokio::test]
    async fn test_run_all_is_sequential() {
        let root = TempDir::new().unwrap();
        let fetcher = MapFetcher::default()
            .serve("https://example.com/a.exe", b"MZ".to_vec())
            .serve("https://example.com/c.exe", b"MZ".to_vec());
        let (orch, launcher) = orchestrator(root.path(), fetcher);

        let reports = orch
            .run_all(&[
                ArtifactDescriptor::executable("A", "https://example.com/a.exe", "a.exe"),
                ArtifactDescriptor::executable("B", "https://example.com/missing.exe", "b.exe"),
                ArtifactDescriptor::executable("C", "https://example.com/c.exe", "c.exe"),
            ])
            .await;

        assert_eq!(reports.len(), 3);
        assert!(reports[0].ran());
        assert!(reports[1].failure.is_some());
        assert!(reports[2].ran());

        let launches = launcher.launches();
        assert_eq!(launches.len(), 2);
        assert!(launches.iter().all(|(_, live)| *live == 1));
        assert!(workspace_dirs(root.path()).is_empty());

        let workspaces: Vec<_> = reports.iter().filter_map(|r| r.workspace.clone()).collect();
        assert_eq!(workspaces.len(), 3);
        assert_ne!(workspaces[0], workspaces[2]);
    }

    #[tokio::test]
    async fn test_observer_sees_every_transition() {
        let root = TempDir::new().unwrap();
        let observer = Arc::new(RecordingObserver::default());
        let (orch, _launcher) = orchestrator(root.path(), MapFetcher::default());
        let orch = orch.with_observer(observer.clone());

        orch.run(&ArtifactDescriptor::executable("Tool", "https://example.com/t.exe", "t.exe"))
            .await;

        let seen = observer.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                (None, Allocating),
                (Some(Allocating), Acquiring),
                (Some(Acquiring), Reclaiming),
                (Some(Reclaiming), Done),
            ]
        );
    }

    #[tokio::test]
    async fn test_sweep_uses_configured_root() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir(root.path().join("0a1b2c3d-0000-4000-8000-000000000001")).unwrap();
        std::fs::create_dir(root.path().join("unrelated")).unwrap();
        let (orch, _launcher) = orchestrator(root.path(), MapFetcher::default());

        let report = orch.sweep();

        assert_eq!(report.cleaned, 1);
        assert!(root.path().join("unrelated").exists());
    }
}
