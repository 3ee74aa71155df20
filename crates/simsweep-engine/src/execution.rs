//! Execution options and result types for sweep runs.

use std::path::PathBuf;

use simsweep_types::checkpoint::CheckpointCounts;

use crate::runner::DEFAULT_SIMULATOR;
use crate::scheduler::WorkerTotals;

/// Runtime options for one sweep execution (not read from the manifest).
#[derive(Debug, Clone)]
pub struct SweepOptions {
    /// Worker-pool size; clamped to at least 1.
    pub cores: u32,
    /// Report per-run progress.
    pub verbose: bool,
    /// Build the shared run archive alongside the sweep.
    pub bigplanet: bool,
    /// Wipe and re-run even if the checkpoint reports completion.
    pub force: bool,
    /// Simulator binary name or path.
    pub simulator: String,
    /// Operator notification address (reserved surface; see
    /// [`crate::notify`]).
    pub notify: Option<String>,
    /// Directory holding the checkpoint and archive files. Defaults to the
    /// process working directory, which the engine never mutates.
    pub work_dir: Option<PathBuf>,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            cores: default_cores(),
            verbose: false,
            bigplanet: false,
            force: false,
            simulator: DEFAULT_SIMULATOR.to_string(),
            notify: None,
            work_dir: None,
        }
    }
}

/// Host CPU count, the default worker-pool size.
#[must_use]
pub fn default_cores() -> u32 {
    let cores = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1);
    u32::try_from(cores).unwrap_or(u32::MAX)
}

/// Final report of a sweep execution.
#[derive(Debug, Clone, Copy)]
pub struct SweepResult {
    /// Checkpoint counts after the pool joined.
    pub counts: CheckpointCounts,
    /// Per-attempt totals aggregated across workers.
    pub totals: WorkerTotals,
    /// Wall-clock duration of the execution.
    pub duration_secs: f64,
    /// Worker-pool size actually used.
    pub workers: u32,
}

/// Either a full run or an early already-done return.
#[derive(Debug, Clone, Copy)]
pub enum SweepOutcome {
    Run(SweepResult),
    /// Every run was already complete and `force` was not requested.
    AlreadyDone,
}
