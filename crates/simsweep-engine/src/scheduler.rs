//! Worker-pool scheduler: claim → execute → archive? → mark, until drained.

use std::sync::Arc;

use tokio::task::JoinSet;

use simsweep_state::CheckpointStore;
use simsweep_types::{SweepLayout, SystemIdentity, ToolMetadata};

use crate::archive::{ArchiveWriter, RunGatherer};
use crate::errors::SweepError;
use crate::runner::SimulationRunner;

/// Archive collaboration shared by every worker, present iff the archive
/// was requested.
///
/// `metadata` is captured once by the orchestrator before any worker starts;
/// workers never invoke the simulator's introspection mode themselves.
pub struct ArchiveContext {
    pub writer: Arc<ArchiveWriter>,
    pub gatherer: Arc<dyn RunGatherer>,
    pub metadata: ToolMetadata,
}

/// Aggregate outcome of one pool execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerTotals {
    /// Simulations started (attempts, not unique runs).
    pub executed: u64,
    /// Runs marked complete.
    pub completed: u64,
    /// Attempts that ended with the run re-pended.
    pub failed_attempts: u64,
    /// Workers that terminated on a checkpoint I/O error.
    pub workers_lost: u32,
}

/// Per-worker tally, folded into [`WorkerTotals`] at join.
#[derive(Debug, Default, Clone, Copy)]
struct WorkerStats {
    executed: u64,
    completed: u64,
    failed_attempts: u64,
}

/// Everything a worker needs, shared immutably across the pool. Workers are
/// peers: they coordinate only through the checkpoint store and the archive
/// writer lock, which are disjoint and never nested.
struct WorkerContext {
    checkpoint: Arc<dyn CheckpointStore>,
    runner: Arc<dyn SimulationRunner>,
    archive: Option<ArchiveContext>,
    layout: SweepLayout,
    system: SystemIdentity,
    verbose: bool,
}

/// Fixed-size pool of blocking workers draining the checkpoint queue.
pub struct Scheduler {
    inner: Arc<WorkerContext>,
}

impl Scheduler {
    #[must_use]
    pub fn new(
        checkpoint: Arc<dyn CheckpointStore>,
        runner: Arc<dyn SimulationRunner>,
        archive: Option<ArchiveContext>,
        layout: SweepLayout,
        system: SystemIdentity,
        verbose: bool,
    ) -> Self {
        Self {
            inner: Arc::new(WorkerContext {
                checkpoint,
                runner,
                archive,
                layout,
                system,
                verbose,
            }),
        }
    }

    /// Spawn `cores` workers and wait for all of them to terminate.
    ///
    /// Each worker loops until `claim_next` returns no work. A worker that
    /// hits a checkpoint I/O error terminates alone; its siblings keep
    /// draining and the loss is counted in the totals. There is no per-run
    /// timeout and no retry bound: a failed run returns to pending and is
    /// re-claimable, so a deterministically failing run alternates
    /// pending ↔ in-progress until the operator interrupts.
    ///
    /// # Errors
    ///
    /// Returns [`SweepError::Infrastructure`] only if a worker task panics.
    pub async fn run(&self, cores: u32) -> Result<WorkerTotals, SweepError> {
        let cores = cores.max(1);
        tracing::info!(cores, "starting worker pool");

        let mut join_set: JoinSet<Result<WorkerStats, SweepError>> = JoinSet::new();
        for worker in 0..cores {
            let ctx = Arc::clone(&self.inner);
            join_set.spawn_blocking(move || worker_loop(worker, &ctx));
        }

        let mut totals = WorkerTotals::default();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(stats)) => {
                    totals.executed += stats.executed;
                    totals.completed += stats.completed;
                    totals.failed_attempts += stats.failed_attempts;
                }
                Ok(Err(error)) => {
                    tracing::error!(%error, "worker terminated; remaining workers continue");
                    totals.workers_lost += 1;
                }
                Err(join_error) => {
                    return Err(SweepError::Infrastructure(anyhow::anyhow!(
                        "worker task panicked: {join_error}"
                    )));
                }
            }
        }

        tracing::info!(
            executed = totals.executed,
            completed = totals.completed,
            failed_attempts = totals.failed_attempts,
            workers_lost = totals.workers_lost,
            "worker pool drained"
        );
        Ok(totals)
    }
}

fn worker_loop(worker: u32, ctx: &WorkerContext) -> Result<WorkerStats, SweepError> {
    let mut stats = WorkerStats::default();
    loop {
        let Some(run_dir) = ctx.checkpoint.claim_next()? else {
            return Ok(stats);
        };
        if ctx.verbose {
            tracing::info!(worker, run = %run_dir.display(), "starting run");
        }
        stats.executed += 1;

        let class = ctx.runner.execute(&run_dir);
        if class.is_success() {
            if let Some(archive) = &ctx.archive {
                // Gather outside the writer lock; only open/write/close
                // happen inside it.
                let appended = archive
                    .gatherer
                    .gather(&run_dir, &ctx.system, &ctx.layout, &archive.metadata)
                    .and_then(|data| {
                        archive.writer.append_run(
                            &run_dir,
                            &data,
                            &archive.metadata,
                            &ctx.system.system_name,
                        )
                    });
                if let Err(error) = appended {
                    tracing::error!(
                        worker,
                        run = %run_dir.display(),
                        %error,
                        "archive append failed; run re-pended"
                    );
                    ctx.checkpoint.mark_failed(&run_dir)?;
                    stats.failed_attempts += 1;
                    continue;
                }
            }
            ctx.checkpoint.mark_complete(&run_dir)?;
            stats.completed += 1;
            if ctx.verbose {
                tracing::info!(worker, run = %run_dir.display(), "finished run");
            }
        } else {
            ctx.checkpoint.mark_failed(&run_dir)?;
            stats.failed_attempts += 1;
            if ctx.verbose {
                tracing::error!(worker, run = %run_dir.display(), "run failed; re-pended");
            }
        }
    }
}
