use std::path::Path;

use anyhow::Result;

use simsweep_engine::{run_sweep, SweepOptions, SweepOutcome};

/// Execute the `run` command: resolve the sweep and drive it to completion.
pub async fn execute(manifest: &Path, options: SweepOptions) -> Result<()> {
    tracing::info!(
        manifest = %manifest.display(),
        cores = options.cores,
        bigplanet = options.bigplanet,
        "starting sweep"
    );

    let outcome = run_sweep(manifest, &options).await?;
    let result = match outcome {
        SweepOutcome::AlreadyDone => {
            println!("All simulations have already completed. Use --force to wipe and re-run.");
            return Ok(());
        }
        SweepOutcome::Run(result) => result,
    };

    println!("Sweep finished.");
    println!("  Completed:       {}", result.counts.completed);
    println!("  Remaining:       {}", result.counts.pending);
    println!("  Attempts:        {}", result.totals.executed);
    println!("  Failed attempts: {}", result.totals.failed_attempts);
    println!("  Workers:         {}", result.workers);
    if result.totals.workers_lost > 0 {
        println!("  Workers lost:    {}", result.totals.workers_lost);
    }
    println!("  Duration:        {:.2}s", result.duration_secs);

    // Machine-readable summary for wrapping tools
    let json = serde_json::json!({
        "completed": result.counts.completed,
        "in_progress": result.counts.in_progress,
        "pending": result.counts.pending,
        "attempts": result.totals.executed,
        "failed_attempts": result.totals.failed_attempts,
        "workers": result.workers,
        "workers_lost": result.totals.workers_lost,
        "duration_secs": result.duration_secs,
    });
    println!("@@SWEEP_JSON@@{json}");

    Ok(())
}
