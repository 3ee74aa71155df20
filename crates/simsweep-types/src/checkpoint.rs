//! Checkpoint model types shared by the store, engine, and CLI.

use serde::{Deserialize, Serialize};

/// Snapshot of per-status entry counts in a checkpoint.
///
/// Taken without the checkpoint lock for reporting; a torn read yields a
/// stale summary, never corruption.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointCounts {
    pub completed: usize,
    pub in_progress: usize,
    pub pending: usize,
}

impl CheckpointCounts {
    /// Total number of tracked runs.
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed + self.in_progress + self.pending
    }

    /// Every run has reached the terminal `Complete` state.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.in_progress == 0 && self.pending == 0
    }

    /// Runs left over after a scheduler join (not yet `Complete`).
    #[must_use]
    pub fn residual(&self) -> usize {
        self.in_progress + self.pending
    }
}

/// Result of initializing or restoring a checkpoint file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// No checkpoint existed; a fresh one was written.
    Fresh,
    /// An existing checkpoint was repaired (in-flight entries re-pended)
    /// and rewritten.
    Restored,
    /// Every entry is already complete and `force` was not requested.
    AlreadyDone,
    /// Every entry was complete and `force` was requested: the run
    /// directories and the checkpoint were deleted. The caller re-invokes
    /// without `force`.
    ForceReset,
}
