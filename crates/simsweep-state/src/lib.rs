//! Checkpoint persistence for the simsweep sweep executor.
//!
//! Provides the [`CheckpointStore`] trait and the line-oriented text file
//! implementation [`TextCheckpoint`], the single source of truth for per-run
//! status across workers and across process restarts.

#![warn(clippy::pedantic)]

pub mod error;
pub mod store;
pub mod text;

pub use error::StateError;
pub use store::CheckpointStore;
pub use text::TextCheckpoint;

/// Common imports for typical usage.
pub mod prelude {
    pub use simsweep_types::checkpoint::{CheckpointCounts, RestoreOutcome};
    pub use simsweep_types::status::RunStatus;

    pub use crate::error::{Result, StateError};
    pub use crate::store::CheckpointStore;
    pub use crate::text::TextCheckpoint;
}
