//! Configuration module for Ephemera.
//!
//! Holds the lifecycle tunables and the predicate sets used by the sweep.

mod settings;

pub use settings::{
    LifecycleConfig, NameSet, DEFAULT_BINARY_EXTENSIONS, DEFAULT_GRACE_PERIOD_MS,
    DEFAULT_PROTECTED_NAMES, DEFAULT_READ_TIMEOUT_SECS,
};
