//! Tool catalog with hardcoded definitions.
//!
//! Each entry carries one download per architecture. The architecture probe
//! picks the variant; the core never sees anything but the resulting
//! [`ArtifactDescriptor`].

use ephemera_core::{ArtifactDescriptor, ExtractionPolicy};
use std::fmt;

// ============================================================================
// Architecture Probe
// ============================================================================

/// Host architecture, as far as picking a download is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    X64,
    X86,
}

impl Architecture {
    /// Detects the host architecture.
    ///
    /// A 64-bit build is always `X64`. A 32-bit build on Windows checks
    /// whether it is running under WOW64 on a 64-bit OS.
    pub fn detect() -> Self {
        if cfg!(windows) {
            Self::from_parts(
                cfg!(target_pointer_width = "64"),
                std::env::var("PROCESSOR_ARCHITECTURE").ok().as_deref(),
                std::env::var("PROCESSOR_ARCHITEW6432").ok().as_deref(),
            )
        } else {
            Self::from_parts(cfg!(target_pointer_width = "64"), None, None)
        }
    }

    fn from_parts(pointer_width_64: bool, arch: Option<&str>, wow64_arch: Option<&str>) -> Self {
        fn is_64(name: &str) -> bool {
            ["AMD64", "ARM64", "IA64"]
                .iter()
                .any(|a| a.eq_ignore_ascii_case(name.trim()))
        }

        if pointer_width_64 || wow64_arch.is_some_and(is_64) || arch.is_some_and(is_64) {
            Self::X64
        } else {
            Self::X86
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::X64 => "64-bit",
            Self::X86 => "32-bit",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Catalog Types
// ============================================================================

/// One downloadable variant of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolDownload {
    pub url: &'static str,
    pub executable: &'static str,
    /// `None` for a bare executable; `Some(folder)` for an archive, where an
    /// empty folder means "expand into the workspace root".
    pub archive_folder: Option<&'static str>,
}

impl ToolDownload {
    const fn executable(url: &'static str, executable: &'static str) -> Self {
        Self {
            url,
            executable,
            archive_folder: None,
        }
    }

    const fn archive(url: &'static str, executable: &'static str, folder: &'static str) -> Self {
        Self {
            url,
            executable,
            archive_folder: Some(folder),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Stable id used on the command line.
    pub id: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub x64: ToolDownload,
    pub x86: ToolDownload,
}

impl CatalogEntry {
    pub fn download(&self, arch: Architecture) -> &ToolDownload {
        match arch {
            Architecture::X64 => &self.x64,
            Architecture::X86 => &self.x86,
        }
    }

    /// Builds the descriptor the lifecycle runs for `arch`.
    pub fn descriptor(&self, arch: Architecture) -> ArtifactDescriptor {
        let download = self.download(arch);
        match download.archive_folder {
            None => ArtifactDescriptor::executable(
                self.display_name,
                download.url,
                download.executable,
            ),
            Some(folder) => {
                let policy = if folder.is_empty() {
                    ExtractionPolicy::Direct
                } else {
                    ExtractionPolicy::Subfolder(folder.to_string())
                };
                ArtifactDescriptor::archive(
                    self.display_name,
                    download.url,
                    download.executable,
                    policy,
                )
            }
        }
    }
}

// ============================================================================
// Sysinternals Definitions
// ============================================================================

const PROCESS_EXPLORER: CatalogEntry = CatalogEntry {
    id: "procexp",
    display_name: "Process Explorer",
    description: "Task manager with handle and DLL views",
    x64: ToolDownload::archive(
        "https://download.sysinternals.com/files/ProcessExplorer.zip",
        "procexp64.exe",
        "ProcessExplorer",
    ),
    x86: ToolDownload::archive(
        "https://download.sysinternals.com/files/ProcessExplorer.zip",
        "procexp.exe",
        "ProcessExplorer",
    ),
};

const PROCESS_MONITOR: CatalogEntry = CatalogEntry {
    id: "procmon",
    display_name: "Process Monitor",
    description: "Real-time file system, registry and process activity",
    x64: ToolDownload::archive(
        "https://download.sysinternals.com/files/ProcessMonitor.zip",
        "Procmon64.exe",
        "ProcessMonitor",
    ),
    x86: ToolDownload::archive(
        "https://download.sysinternals.com/files/ProcessMonitor.zip",
        "Procmon.exe",
        "ProcessMonitor",
    ),
};

const AUTORUNS: CatalogEntry = CatalogEntry {
    id: "autoruns",
    display_name: "Autoruns",
    description: "Everything configured to start automatically",
    x64: ToolDownload::archive(
        "https://download.sysinternals.com/files/Autoruns.zip",
        "Autoruns64.exe",
        "Autoruns",
    ),
    x86: ToolDownload::archive(
        "https://download.sysinternals.com/files/Autoruns.zip",
        "Autoruns.exe",
        "Autoruns",
    ),
};

const TCPVIEW: CatalogEntry = CatalogEntry {
    id: "tcpview",
    display_name: "TCPView",
    description: "Open TCP and UDP endpoints per process",
    x64: ToolDownload::archive(
        "https://download.sysinternals.com/files/TCPView.zip",
        "tcpview64.exe",
        "",
    ),
    x86: ToolDownload::archive(
        "https://download.sysinternals.com/files/TCPView.zip",
        "tcpview.exe",
        "",
    ),
};

const RAMMAP: CatalogEntry = CatalogEntry {
    id: "rammap",
    display_name: "RAMMap",
    description: "Physical memory usage analysis",
    x64: ToolDownload::executable("https://live.sysinternals.com/RAMMap64.exe", "RAMMap64.exe"),
    x86: ToolDownload::executable("https://live.sysinternals.com/RAMMap.exe", "RAMMap.exe"),
};

const CATALOG: &[CatalogEntry] = &[PROCESS_EXPLORER, PROCESS_MONITOR, AUTORUNS, TCPVIEW, RAMMAP];

// ============================================================================
// Catalog Access
// ============================================================================

/// Returns all catalog entries in menu order.
pub fn all_entries() -> &'static [CatalogEntry] {
    CATALOG
}

/// Finds an entry by id (case-insensitive).
pub fn find_entry(id: &str) -> Option<&'static CatalogEntry> {
    CATALOG.iter().find(|e| e.id.eq_ignore_ascii_case(id.trim()))
}

/// Descriptors for every entry, resolved for `arch`.
pub fn descriptors(arch: Architecture) -> Vec<ArtifactDescriptor> {
    CATALOG.iter().map(|e| e.descriptor(arch)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ephemera_core::ArtifactKind;
    use std::collections::HashSet;

    #[test]
    fn test_native_64_bit() {
        assert_eq!(Architecture::from_parts(true, None, None), Architecture::X64);
    }

    #[test]
    fn test_wow64_reports_64_bit() {
        assert_eq!(
            Architecture::from_parts(false, Some("x86"), Some("AMD64")),
            Architecture::X64
        );
        assert_eq!(
            Architecture::from_parts(false, Some("x86"), None),
            Architecture::X86
        );
        assert_eq!(Architecture::from_parts(false, None, None), Architecture::X86);
    }

    #[test]
    fn test_ids_are_unique() {
        let ids: HashSet<_> = all_entries().iter().map(|e| e.id).collect();
        assert_eq!(ids.len(), all_entries().len());
    }

    #[test]
    fn test_find_entry_case_insensitive() {
        assert_eq!(find_entry("ProcExp").map(|e| e.id), Some("procexp"));
        assert!(find_entry("notepad").is_none());
    }

    #[test]
    fn test_descriptor_per_architecture() {
        let entry = find_entry("procexp").unwrap();

        let x64 = entry.descriptor(Architecture::X64);
        assert_eq!(x64.kind, ArtifactKind::Archive);
        assert_eq!(x64.executable, "procexp64.exe");
        assert_eq!(
            x64.extraction,
            ExtractionPolicy::Subfolder("ProcessExplorer".into())
        );

        assert_eq!(entry.descriptor(Architecture::X86).executable, "procexp.exe");
    }

    #[test]
    fn test_direct_and_single_executable_entries() {
        let tcpview = find_entry("tcpview").unwrap().descriptor(Architecture::X64);
        assert_eq!(tcpview.extraction, ExtractionPolicy::Direct);

        let rammap = find_entry("rammap").unwrap().descriptor(Architecture::X86);
        assert_eq!(rammap.kind, ArtifactKind::SingleExecutable);
        assert!(rammap.url.ends_with("RAMMap.exe"));
    }

    #[test]
    fn test_all_urls_are_https() {
        for d in descriptors(Architecture::X64)
            .into_iter()
            .chain(descriptors(Architecture::X86))
        {
            assert!(d.url.starts_with("https://"), "{}", d.url);
        }
    }
}
