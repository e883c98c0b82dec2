//! Core types for the tool lifecycle.
//!
//! Descriptors come from the caller (usually a catalog entry) and are never
//! persisted. The archive format and lifecycle state enums are shared by the
//! acquirer, the orchestrator and the reports they produce.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

// ============================================================================
// Artifact Descriptor
// ============================================================================

/// What the source URL points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// A ready-to-run executable.
    SingleExecutable,
    /// A compressed archive that contains the executable somewhere inside.
    Archive,
}

/// Where an archive is expanded inside the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionPolicy {
    /// Expand straight into the workspace root.
    #[default]
    Direct,
    /// Expand into a named folder under the workspace, for archives that have
    /// no top-level folder of their own.
    Subfolder(String),
}

/// Everything needed to acquire and launch one tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    /// Human-readable name used in logs and reports.
    pub tool_name: String,
    /// Where to download the artifact from.
    pub url: String,
    pub kind: ArtifactKind,
    /// Base name of the file to launch (matched case-insensitively).
    pub executable: String,
    #[serde(default)]
    pub extraction: ExtractionPolicy,
}

impl ArtifactDescriptor {
    /// Descriptor for a URL that serves the executable itself.
    pub fn executable(
        tool_name: impl Into<String>,
        url: impl Into<String>,
        executable: impl Into<String>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            url: url.into(),
            kind: ArtifactKind::SingleExecutable,
            executable: executable.into(),
            extraction: ExtractionPolicy::Direct,
        }
    }

    /// Descriptor for a URL that serves an archive.
    pub fn archive(
        tool_name: impl Into<String>,
        url: impl Into<String>,
        executable: impl Into<String>,
        extraction: ExtractionPolicy,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            url: url.into(),
            kind: ArtifactKind::Archive,
            executable: executable.into(),
            extraction,
        }
    }
}

// ============================================================================
// Archive Format
// ============================================================================

/// Archive formats the acquirer can expand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchiveFormat {
    /// Gzip-compressed tar archive (.tar.gz, .tgz)
    TarGz,
    /// XZ-compressed tar archive (.tar.xz, .txz)
    TarXz,
    /// ZIP archive (.zip)
    Zip,
}

impl ArchiveFormat {
    /// Infers the archive format from a URL or filename.
    pub fn from_url(url: &str) -> Option<Self> {
        let lower = url
            .split(['?', '#'])
            .next()
            .unwrap_or(url)
            .to_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if lower.ends_with(".tar.xz") || lower.ends_with(".txz") {
            Some(Self::TarXz)
        } else if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }

    /// Identifies the format from the leading bytes of a file.
    pub fn sniff(header: &[u8]) -> Option<Self> {
        if header.starts_with(b"PK\x03\x04") || header.starts_with(b"PK\x05\x06") {
            Some(Self::Zip)
        } else if header.starts_with(&[0x1f, 0x8b]) {
            Some(Self::TarGz)
        } else if header.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
            Some(Self::TarXz)
        } else {
            None
        }
    }

    /// Sniffs the format of a file on disk.
    pub fn sniff_file(path: &Path) -> std::io::Result<Option<Self>> {
        use std::io::Read;

        let mut header = [0u8; 6];
        let mut file = std::fs::File::open(path)?;
        let n = file.read(&mut header)?;
        Ok(Self::sniff(&header[..n]))
    }
}

// ============================================================================
// Lifecycle State
// ============================================================================

/// States of one invocation, in the order they are normally visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    Allocating,
    Acquiring,
    Locating,
    Running,
    Reclaiming,
    Done,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allocating => "allocating",
            Self::Acquiring => "acquiring",
            Self::Locating => "locating",
            Self::Running => "running",
            Self::Reclaiming => "reclaiming",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_format_from_url() {
        assert_eq!(
            ArchiveFormat::from_url("https://example.com/tool.tar.gz"),
            Some(ArchiveFormat::TarGz)
        );
        assert_eq!(
            ArchiveFormat::from_url("https://example.com/tool.tgz"),
            Some(ArchiveFormat::TarGz)
        );
        assert_eq!(
            ArchiveFormat::from_url("https://example.com/tool.tar.xz"),
            Some(ArchiveFormat::TarXz)
        );
        assert_eq!(
            ArchiveFormat::from_url("https://example.com/Tool.ZIP?raw=1"),
            Some(ArchiveFormat::Zip)
        );
        assert_eq!(ArchiveFormat::from_url("https://example.com/tool.exe"), None);
    }

    #[test]
    fn test_archive_format_sniff() {
        assert_eq!(ArchiveFormat::sniff(b"PK\x03\x04rest"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::sniff(&[0x1f, 0x8b, 8, 0]), Some(ArchiveFormat::TarGz));
        assert_eq!(
            ArchiveFormat::sniff(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]),
            Some(ArchiveFormat::TarXz)
        );
        assert_eq!(ArchiveFormat::sniff(b"MZ\x90\x00"), None);
        assert_eq!(ArchiveFormat::sniff(b""), None);
    }

    #[test]
    fn test_descriptor_constructors() {
        let single = ArtifactDescriptor::executable("Autoruns", "https://x/a.exe", "a.exe");
        assert_eq!(single.kind, ArtifactKind::SingleExecutable);
        assert_eq!(single.extraction, ExtractionPolicy::Direct);

        let archive = ArtifactDescriptor::archive(
            "TCPView",
            "https://x/t.zip",
            "tcpview64.exe",
            ExtractionPolicy::Subfolder("tcpview".into()),
        );
        assert_eq!(archive.kind, ArtifactKind::Archive);
    }

    #[test]
    fn test_descriptor_json_defaults_extraction() {
        let json = r#"{
            "tool_name": "Demo",
            "url": "https://example.com/demo.zip",
            "kind": "archive",
            "executable": "demo.exe"
        }"#;
        let desc: ArtifactDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(desc.extraction, ExtractionPolicy::Direct);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(LifecycleState::Reclaiming.to_string(), "reclaiming");
    }
}
