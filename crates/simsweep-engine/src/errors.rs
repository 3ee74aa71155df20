//! Engine error model.

use simsweep_state::StateError;
use simsweep_types::ConfigError;

use crate::archive::ArchiveError;

// ---------------------------------------------------------------------------
// SweepError — categorised errors for propagation decisions
// ---------------------------------------------------------------------------

/// Categorized sweep error.
///
/// `Config` covers startup failures (manifest, layout, sample run) and is
/// always fatal to the orchestrator. `State` is a checkpoint I/O failure:
/// fatal during setup, fatal to a single worker inside the pool. `Archive`
/// failures never escape a worker (the run is re-pended instead); the
/// variant exists for callers composing the archive writer directly.
/// `Infrastructure` wraps opaque host-side errors (runtime, filesystem,
/// joined-task panics).
#[derive(Debug)]
pub enum SweepError {
    /// Manifest or layout problem discovered during startup.
    Config(ConfigError),
    /// Checkpoint store failure.
    State(StateError),
    /// Shared-archive open or write failure.
    Archive(ArchiveError),
    /// Infrastructure error (working directory, task join, spawn setup).
    Infrastructure(anyhow::Error),
}

impl std::fmt::Display for SweepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(e) => write!(f, "{e}"),
            Self::State(e) => write!(f, "{e}"),
            Self::Archive(e) => write!(f, "{e}"),
            Self::Infrastructure(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SweepError {}

impl From<ConfigError> for SweepError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<StateError> for SweepError {
    fn from(e: StateError) -> Self {
        Self::State(e)
    }
}

impl From<ArchiveError> for SweepError {
    fn from(e: ArchiveError) -> Self {
        Self::Archive(e)
    }
}

impl From<anyhow::Error> for SweepError {
    fn from(e: anyhow::Error) -> Self {
        Self::Infrastructure(e)
    }
}
