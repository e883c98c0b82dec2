//! Launching the located executable and waiting for it to exit.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::info;

use super::extractor::make_executable;
use crate::error::LifecycleError;

/// Spawns a process and blocks the invocation until it terminates.
///
/// The exit code is reported but never interpreted: a tool that exits with a
/// failure status still counts as having run to completion.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn run_and_wait(&self, executable: &Path) -> Result<Option<i32>, LifecycleError>;
}

/// Launches tools as child processes sharing this terminal.
#[derive(Debug, Default, Clone)]
pub struct ProcessLauncher;

#[async_trait]
impl Launcher for ProcessLauncher {
    async fn run_and_wait(&self, executable: &Path) -> Result<Option<i32>, LifecycleError> {
        let launch_err = |reason: String| LifecycleError::Launch {
            path: executable.to_path_buf(),
            reason,
        };

        make_executable(executable).map_err(|e| launch_err(format!("{:#}", e)))?;

        let mut cmd = Command::new(executable);
        if let Some(dir) = executable.parent() {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let mut child = cmd
            .spawn()
            .map_err(|e| launch_err(format!("Failed to spawn: {}", e)))?;

        info!("Launched {} (pid {:?}), waiting for exit", executable.display(), child.id());

        let status = child
            .wait()
            .await
            .map_err(|e| launch_err(format!("Failed to wait for process: {}", e)))?;

        info!("{} exited with {}", executable.display(), status);
        Ok(status.code())
    }
}
