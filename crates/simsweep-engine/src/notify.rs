//! Operator notification seam.
//!
//! The CLI accepts a notification address (`-m <addr>`) but no delivery
//! mechanism is part of the engine. The address is surfaced to a pluggable
//! [`Notifier`]; the shipped [`LogNotifier`] records the final summary as a
//! structured log event and carries no mail transport.

use crate::execution::SweepResult;

/// Receives the final sweep summary for an operator address.
pub trait Notifier: Send + Sync {
    fn notify(&self, address: &str, result: &SweepResult);
}

/// Default notifier: a structured log event, nothing else.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, address: &str, result: &SweepResult) {
        tracing::info!(
            address,
            completed = result.counts.completed,
            pending = result.counts.pending,
            duration_secs = result.duration_secs,
            "sweep summary ready for notification"
        );
    }
}
