//! Lifecycle settings.
//!
//! Settings are optional: every field has a default and a JSON file may
//! override any subset of them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// Defaults
// =============================================================================

/// Pause before deleting a workspace so the exited process can drop its handles.
pub const DEFAULT_GRACE_PERIOD_MS: u64 = 1_000;

/// Upper bound accepted for the grace period.
const MAX_GRACE_PERIOD_MS: u64 = 60_000;

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Longest silence tolerated while waiting for response headers or the next
/// body chunk.
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 60;

const MAX_READ_TIMEOUT_SECS: u64 = 3_600;

/// Files that mark a GUID-named temp directory as belonging to the OS or to
/// other installers. Their presence anywhere in a candidate blocks deletion.
pub const DEFAULT_PROTECTED_NAMES: &[&str] = &[
    "DismHost.exe",
    "DismCore.dll",
    "DismProv.dll",
    "LogProvider.dll",
    "MpSigStub.exe",
    "mpengine.dll",
    "msedgewebview2.exe",
    "setup.lock",
];

/// Extensions of loadable binaries probed by the in-use guard.
pub const DEFAULT_BINARY_EXTENSIONS: &[&str] = &["exe", "dll", "sys", "ocx", "scr", "so", "dylib"];

// =============================================================================
// Name Sets
// =============================================================================

/// A case-insensitive set of file names or extensions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct NameSet {
    names: BTreeSet<String>,
}

impl NameSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| n.as_ref().trim_start_matches('.').to_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&name.to_lowercase())
    }

    pub fn insert(&mut self, name: &str) {
        self.names.insert(name.trim_start_matches('.').to_lowercase());
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True if the final component of `path` is in the set.
    pub fn matches_file_name(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| self.contains(n))
    }

    /// True if the extension of `path` is in the set.
    pub fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.contains(e))
    }
}

impl From<Vec<String>> for NameSet {
    fn from(names: Vec<String>) -> Self {
        Self::new(names)
    }
}

impl From<NameSet> for Vec<String> {
    fn from(set: NameSet) -> Self {
        set.names.into_iter().collect()
    }
}

// =============================================================================
// Lifecycle Config
// =============================================================================

/// Tunables for allocation, acquisition and reclamation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Directory that holds workspaces. `None` means the OS temp directory.
    pub temp_root: Option<PathBuf>,

    /// Delay before a workspace is deleted after its process exits.
    pub grace_period_ms: u64,

    /// File names that mark a sweep candidate as foreign.
    pub protected_names: NameSet,

    /// Extensions checked by the sweep's in-use guard.
    pub binary_extensions: NameSet,

    /// TCP connect timeout for downloads.
    pub connect_timeout_secs: u64,

    /// Stall timeout for downloads, applied to each read rather than the
    /// whole transfer.
    pub read_timeout_secs: u64,

    /// User-Agent header sent with downloads.
    pub user_agent: String,

    /// URL schemes the downloader accepts.
    pub allowed_schemes: Vec<String>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            temp_root: None,
            grace_period_ms: DEFAULT_GRACE_PERIOD_MS,
            protected_names: NameSet::new(DEFAULT_PROTECTED_NAMES),
            binary_extensions: NameSet::new(DEFAULT_BINARY_EXTENSIONS),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
            user_agent: format!("ephemera/{}", crate::VERSION),
            allowed_schemes: vec!["https".to_string(), "http".to_string()],
        }
    }
}

impl LifecycleConfig {
    /// Load settings from a JSON file, using defaults for missing fields.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise return defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.allowed_schemes.is_empty() {
            anyhow::bail!("allowed_schemes must list at least one URL scheme");
        }
        if self.grace_period_ms > MAX_GRACE_PERIOD_MS {
            anyhow::bail!(
                "grace_period_ms cannot exceed {} (got {})",
                MAX_GRACE_PERIOD_MS,
                self.grace_period_ms
            );
        }
        if self.read_timeout_secs == 0 || self.read_timeout_secs > MAX_READ_TIMEOUT_SECS {
            anyhow::bail!(
                "read_timeout_secs must be between 1 and {} (got {})",
                MAX_READ_TIMEOUT_SECS,
                self.read_timeout_secs
            );
        }
        Ok(())
    }

    /// The directory workspaces are created in and swept from.
    pub fn temp_root(&self) -> PathBuf {
        self.temp_root.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}
