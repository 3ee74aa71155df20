//! Checkpoint store error types.

use std::path::PathBuf;

/// Errors produced by [`CheckpointStore`](crate::CheckpointStore) operations.
///
/// Inside a worker these are fatal to that worker only; during startup they
/// are fatal to the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// File-system I/O failure while reading or rewriting the checkpoint.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The checkpoint file exists but its header is unreadable.
    #[error("corrupt checkpoint {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// Internal mutex was poisoned by a panicked worker.
    #[error("checkpoint lock poisoned")]
    LockPoisoned,
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, StateError>;
