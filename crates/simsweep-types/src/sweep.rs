//! Sweep layout and system identity types.
//!
//! Both are derived once at startup (from the manifest and one sample run)
//! and stay immutable for the duration of a sweep execution.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration derived from the sweep manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepLayout {
    /// Destination folder name as written in the manifest (relative).
    pub dest_folder: String,
    /// Absolute path of the destination folder.
    pub dest_path: PathBuf,
    /// Basenames of the per-body input files present in every run directory.
    pub body_files: Vec<String>,
}

impl SweepLayout {
    /// Checkpoint file name for this sweep (a dotfile in the invocation
    /// directory, one per sweep).
    #[must_use]
    pub fn checkpoint_file_name(&self) -> String {
        format!(".{}", self.dest_folder)
    }

    /// Archive file name for this sweep.
    #[must_use]
    pub fn archive_file_name(&self) -> String {
        format!("{}.bpa", self.dest_folder)
    }
}

/// Names derived from one sample run directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemIdentity {
    /// Basename (without extension) of the primary input file.
    pub system_name: String,
    /// Body names, read from the `sName` directive of each body input file.
    pub body_names: Vec<String>,
}

impl SystemIdentity {
    /// Name of the simulator's own log file inside a run directory.
    #[must_use]
    pub fn log_file_name(&self) -> String {
        format!("{}.log", self.system_name)
    }
}

/// Opaque descriptor of the simulator binary, captured once per sweep by
/// invoking its help/introspection mode before any worker starts. Shared
/// read-only with every worker; never re-acquired per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolMetadata(String);

impl ToolMetadata {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the raw captured text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
