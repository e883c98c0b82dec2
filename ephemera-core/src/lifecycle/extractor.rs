//! Archive extraction for downloaded tool packages.
//!
//! Handles zip, tar.gz and tar.xz, refuses entries that would land outside
//! the destination, and keeps Unix executable bits.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Component, Path};
use tracing::{debug, info, warn};

use super::types::ArchiveFormat;

// ============================================================================
// Archive Extraction
// ============================================================================

/// Extracts `archive_path` into `dest_dir`, creating it if needed.
pub fn extract_archive(archive_path: &Path, dest_dir: &Path, format: ArchiveFormat) -> Result<()> {
    info!(
        "Extracting {:?} archive {} to {}",
        format,
        archive_path.display(),
        dest_dir.display()
    );

    fs::create_dir_all(dest_dir)
        .with_context(|| format!("Failed to create directory: {}", dest_dir.display()))?;

    match format {
        ArchiveFormat::Zip => extract_zip(archive_path, dest_dir),
        ArchiveFormat::TarGz => extract_tar_gz(archive_path, dest_dir),
        ArchiveFormat::TarXz => extract_tar_xz(archive_path, dest_dir),
    }
}

// ============================================================================
// ZIP Extraction
// ============================================================================

fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open zip: {}", archive_path.display()))?;

    let mut archive = zip::ZipArchive::new(BufReader::new(file))
        .with_context(|| format!("Failed to read zip: {}", archive_path.display()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to read zip entry #{}", i))?;
        let Some(entry_path) = entry.enclosed_name() else {
            warn!("Skipping unsafe path in zip: {}", entry.name());
            continue;
        };

        let dest_path = dest_dir.join(entry_path);

        if entry.is_dir() {
            fs::create_dir_all(&dest_path)?;
            continue;
        }

        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut outfile = File::create(&dest_path)
            .with_context(|| format!("Failed to create: {}", dest_path.display()))?;
        io::copy(&mut entry, &mut outfile)
            .with_context(|| format!("Failed to inflate: {}", dest_path.display()))?;

        #[cfg(unix)]
        set_unix_permissions(&dest_path, entry.unix_mode())?;
    }

    debug!("ZIP extraction complete");
    Ok(())
}

// ============================================================================
// TAR Extraction
// ============================================================================

fn extract_tar_gz(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open tar.gz: {}", archive_path.display()))?;

    let decoder = flate2::read::GzDecoder::new(BufReader::new(file));
    extract_tar(decoder, dest_dir)
}

fn extract_tar_xz(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open tar.xz: {}", archive_path.display()))?;

    let decoder = xz2::read::XzDecoder::new(BufReader::new(file));
    extract_tar(decoder, dest_dir)
}

fn extract_tar<R: Read>(reader: R, dest_dir: &Path) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    let mut written = 0usize;

    for entry_result in archive.entries().context("Failed to read tar entries")? {
        let mut entry = entry_result.context("Failed to read tar entry")?;
        let entry_type = entry.header().entry_type();

        if entry_type.is_symlink() || entry_type.is_hard_link() {
            warn!("Skipping link entry in tar archive");
            continue;
        }

        let path = entry.path().context("Invalid tar entry path")?.into_owned();
        if path.is_absolute()
            || path
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            warn!("Skipping unsafe path in tar: {}", path.display());
            continue;
        }

        let dest_path = dest_dir.join(&path);

        if entry_type.is_dir() {
            fs::create_dir_all(&dest_path)?;
        } else if entry_type.is_file() {
            if let Some(parent) = dest_path.parent() {
                fs::create_dir_all(parent)?;
            }

            let mut outfile = File::create(&dest_path)
                .with_context(|| format!("Failed to create: {}", dest_path.display()))?;
            io::copy(&mut entry, &mut outfile)
                .with_context(|| format!("Failed to unpack: {}", dest_path.display()))?;
            outfile.flush()?;
            written += 1;

            #[cfg(unix)]
            {
                if let Ok(mode) = entry.header().mode() {
                    set_unix_permissions(&dest_path, Some(mode))?;
                }
            }
        }
    }

    debug!("TAR extraction complete ({} files)", written);
    Ok(())
}

// ============================================================================
// Unix Permissions
// ============================================================================

#[cfg(unix)]
fn set_unix_permissions(path: &Path, mode: Option<u32>) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if let Some(mode) = mode {
        if mode & 0o111 != 0 {
            let permissions = fs::Permissions::from_mode(mode | 0o755);
            fs::set_permissions(path, permissions)
                .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
        }
    }

    Ok(())
}

/// Sets executable permission on a file (Unix only).
///
/// On Windows, this is a no-op.
#[allow(unused_variables)]
pub fn make_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path)
            .with_context(|| format!("Failed to get metadata for {}", path.display()))?;

        let mut permissions = metadata.permissions();
        if permissions.mode() & 0o111 == 0o111 {
            return Ok(());
        }
        permissions.set_mode(permissions.mode() | 0o755);

        fs::set_permissions(path, permissions).with_context(|| {
            format!("Failed to set executable permission on {}", path.display())
        })?;

        debug!("Set executable permission on {}", path.display());
    }

    Ok(())
}
