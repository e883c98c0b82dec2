//! Artifact acquisition: download into a workspace and, for archives, expand.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::downloader::Fetcher;
use super::extractor::extract_archive;
use super::paths::new_workspace_name;
use super::types::{ArchiveFormat, ExtractionPolicy};
use super::workspace::Workspace;
use crate::error::LifecycleError;

/// Where an archive is downloaded before expansion. The name is generated
/// per download so no entry of a directly expanded archive can overwrite it
/// while it is being read.
fn archive_download_path(workspace: &Workspace) -> PathBuf {
    workspace
        .path()
        .join(format!(".{}.download", new_workspace_name()))
}

/// Downloads a single executable into the workspace root as `executable`.
pub async fn fetch_executable(
    workspace: &Workspace,
    fetcher: &dyn Fetcher,
    url: &str,
    executable: &str,
) -> Result<PathBuf, LifecycleError> {
    let file_name = Path::new(executable)
        .file_name()
        .ok_or_else(|| LifecycleError::Download {
            url: url.to_string(),
            reason: format!("invalid executable name '{}'", executable),
        })?;
    let dest = workspace.path().join(file_name);

    let bytes = fetcher
        .fetch(url, &dest)
        .await
        .map_err(|e| LifecycleError::download(url, &e))?;

    info!("Fetched {} ({} bytes)", dest.display(), bytes);
    Ok(dest)
}

/// Downloads an archive into the workspace and expands it according to
/// `policy`. Returns the directory the archive was expanded into.
pub async fn fetch_and_expand_archive(
    workspace: &Workspace,
    fetcher: &dyn Fetcher,
    url: &str,
    policy: &ExtractionPolicy,
) -> Result<PathBuf, LifecycleError> {
    let archive_path = archive_download_path(workspace);

    let bytes = fetcher
        .fetch(url, &archive_path)
        .await
        .map_err(|e| LifecycleError::download(url, &e))?;
    debug!("Archive downloaded ({} bytes)", bytes);

    let format = detect_format(url, &archive_path)?;

    let root = match policy {
        ExtractionPolicy::Direct => workspace.path().to_path_buf(),
        ExtractionPolicy::Subfolder(name) => subfolder(workspace.path(), name, &archive_path)?,
    };

    extract_archive(&archive_path, &root, format)
        .map_err(|e| LifecycleError::extract(&archive_path, &e))?;

    if let Err(e) = fs::remove_file(&archive_path) {
        warn!(
            "Could not delete archive {} after expansion: {}",
            archive_path.display(),
            e
        );
    }

    info!("Expanded archive into {}", root.display());
    Ok(root)
}

fn detect_format(url: &str, archive_path: &Path) -> Result<ArchiveFormat, LifecycleError> {
    if let Some(format) = ArchiveFormat::from_url(url) {
        return Ok(format);
    }

    match ArchiveFormat::sniff_file(archive_path) {
        Ok(Some(format)) => {
            debug!("Sniffed archive format {:?} for {}", format, url);
            Ok(format)
        }
        Ok(None) => Err(LifecycleError::Extract {
            archive: archive_path.to_path_buf(),
            reason: "unsupported archive format".to_string(),
        }),
        Err(e) => Err(LifecycleError::Extract {
            archive: archive_path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

/// Resolves a subfolder name to a single plain component under the workspace.
fn subfolder(workspace: &Path, name: &str, archive_path: &Path) -> Result<PathBuf, LifecycleError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(std::path::Component::Normal(part)), None) => Ok(workspace.join(part)),
        _ => Err(LifecycleError::Extract {
            archive: archive_path.to_path_buf(),
            reason: format!("invalid extraction subfolder '{}'", name),
        }),
    }
}
