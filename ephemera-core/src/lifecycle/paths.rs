//! Temp-root path handling and the workspace naming scheme.
//!
//! Workspaces live directly under the temp root and are named with a
//! hyphenated UUID:
//!
//! - Linux: `/tmp/3f2b8c1e-9d4a-4c47-8f5e-2b1d7a9c0e11/`
//! - Windows: `C:\Users\<User>\AppData\Local\Temp\3f2b8c1e-...\`
//!
//! That name is the only signal the sweep uses to decide a directory might
//! belong to us, so the pattern here and the generator in `workspace` must
//! stay in step.

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use uuid::Uuid;

fn workspace_name_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
        )
        .expect("workspace name pattern is a valid regex")
    })
}

/// Generates a fresh workspace directory name.
pub fn new_workspace_name() -> String {
    Uuid::new_v4().hyphenated().to_string()
}

/// True if `name` has the canonical 8-4-4-4-12 hex form.
pub fn is_workspace_name(name: &str) -> bool {
    workspace_name_regex().is_match(name)
}

/// True if the final component of `path` is a workspace name.
pub fn is_workspace_dir_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(is_workspace_name)
}
