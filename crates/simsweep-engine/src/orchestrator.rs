//! Top-level sweep orchestration: layout, checkpoint, pool, cleanup.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use simsweep_state::{CheckpointStore, TextCheckpoint};
use simsweep_types::checkpoint::RestoreOutcome;
use simsweep_types::ConfigError;

use crate::archive::{ArchiveSink, ArchiveWriter, OutputGatherer, RecordSink, RunGatherer};
use crate::errors::SweepError;
use crate::execution::{SweepOptions, SweepOutcome, SweepResult};
use crate::manifest;
use crate::notify::{LogNotifier, Notifier};
use crate::runner::{describe_simulator, ProcessRunner, SimulationRunner};
use crate::scheduler::{ArchiveContext, Scheduler};

/// Injected collaborators for one sweep execution.
///
/// Production wiring is [`SweepDeps::process`]; tests substitute stub
/// runners and archive capabilities.
pub struct SweepDeps {
    pub runner: Arc<dyn SimulationRunner>,
    pub gatherer: Arc<dyn RunGatherer>,
    pub sink: Arc<dyn ArchiveSink>,
}

impl SweepDeps {
    /// Real child-process runner plus the default archive capabilities.
    #[must_use]
    pub fn process(simulator: &str) -> Self {
        Self {
            runner: Arc::new(ProcessRunner::new(simulator)),
            gatherer: Arc::new(OutputGatherer),
            sink: Arc::new(RecordSink),
        }
    }
}

/// Run a sweep to completion with the production collaborators.
///
/// # Errors
///
/// Returns [`SweepError`] on any startup failure (manifest, layout,
/// checkpoint, metadata capture). Per-run failures never surface here; they
/// re-pend the run and show up in the final counts.
pub async fn run_sweep(
    manifest_path: &Path,
    options: &SweepOptions,
) -> Result<SweepOutcome, SweepError> {
    execute_sweep(manifest_path, options, SweepDeps::process(&options.simulator)).await
}

/// Run a sweep with injected collaborators.
///
/// # Errors
///
/// See [`run_sweep`].
pub async fn execute_sweep(
    manifest_path: &Path,
    options: &SweepOptions,
    deps: SweepDeps,
) -> Result<SweepOutcome, SweepError> {
    let start = Instant::now();

    let layout = manifest::read_layout(manifest_path)?;
    let runs = manifest::enumerate_runs(&layout.dest_path)?;
    let sample = runs.first().ok_or_else(|| ConfigError::NoRuns {
        path: layout.dest_path.clone(),
    })?;
    let system = manifest::derive_system(sample, &layout.body_files)?;

    let work_dir = match &options.work_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().map_err(|e| SweepError::Infrastructure(e.into()))?,
    };
    let ckpt_path = work_dir.join(layout.checkpoint_file_name());
    let archive_path = work_dir.join(layout.archive_file_name());
    let manifest_abs = manifest_path
        .canonicalize()
        .map_err(|e| SweepError::Infrastructure(e.into()))?;

    tracing::info!(
        manifest = %manifest_abs.display(),
        dest = %layout.dest_path.display(),
        runs = runs.len(),
        system = system.system_name,
        "sweep layout resolved"
    );

    let (store, outcome) =
        TextCheckpoint::init_or_restore(&ckpt_path, &manifest_abs, &runs, options.force)?;
    let store = match outcome {
        RestoreOutcome::AlreadyDone => {
            tracing::info!("all simulations already complete; pass --force to wipe and re-run");
            return Ok(SweepOutcome::AlreadyDone);
        }
        RestoreOutcome::ForceReset => {
            tracing::info!("force requested: run directories and checkpoint removed");
            let (store, _) =
                TextCheckpoint::init_or_restore(&ckpt_path, &manifest_abs, &runs, false)?;
            store
        }
        RestoreOutcome::Fresh | RestoreOutcome::Restored => store,
    };
    let store: Arc<dyn CheckpointStore> = Arc::new(store);

    // One-shot metadata capture, strictly before any worker starts and never
    // while an archive handle is open.
    let archive = if options.bigplanet {
        let metadata = describe_simulator(&options.simulator).map_err(SweepError::Infrastructure)?;
        Some(ArchiveContext {
            writer: Arc::new(ArchiveWriter::new(&archive_path, deps.sink)),
            gatherer: deps.gatherer,
            metadata,
        })
    } else {
        None
    };

    let workers = options.cores.max(1);
    let scheduler = Scheduler::new(
        Arc::clone(&store),
        deps.runner,
        archive,
        layout.clone(),
        system.clone(),
        options.verbose,
    );
    let totals = scheduler.run(workers).await?;

    let counts = store.counts()?;
    if counts.residual() > 0 {
        tracing::warn!(
            pending = counts.pending,
            in_progress = counts.in_progress,
            "sweep joined with unfinished runs"
        );
    }

    // A stale archive from an earlier archived execution is removed when the
    // current one did not ask for it.
    if !options.bigplanet && archive_path.exists() {
        fs::remove_file(&archive_path).map_err(|e| SweepError::Infrastructure(e.into()))?;
    }

    let result = SweepResult {
        counts,
        totals,
        duration_secs: start.elapsed().as_secs_f64(),
        workers,
    };
    if let Some(address) = &options.notify {
        LogNotifier.notify(address, &result);
    }
    tracing::info!(
        completed = counts.completed,
        pending = counts.pending,
        duration_secs = result.duration_secs,
        "sweep finished"
    );
    Ok(SweepOutcome::Run(result))
}
