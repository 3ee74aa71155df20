use std::path::Path;

use anyhow::{Context, Result};

use simsweep_engine::manifest;
use simsweep_state::{CheckpointStore, TextCheckpoint};

/// Execute the `status` command: report checkpoint progress for a sweep.
///
/// Reads the checkpoint without the store lock; a read concurrent with a
/// running sweep may be one mutation stale, which is fine for reporting.
pub fn execute(manifest_path: &Path) -> Result<()> {
    let layout = manifest::read_layout(manifest_path)?;
    let ckpt_path = std::env::current_dir()?.join(layout.checkpoint_file_name());
    let store = TextCheckpoint::open(&ckpt_path).with_context(|| {
        format!(
            "no checkpoint at {}; has this sweep been started?",
            ckpt_path.display()
        )
    })?;
    let counts = store.counts()?;

    println!("Number of Simulations completed: {}", counts.completed);
    println!("Number of Simulations in progress: {}", counts.in_progress);
    println!("Number of Simulations remaining: {}", counts.pending);
    println!("@@STATUS_JSON@@{}", serde_json::to_string(&counts)?);

    Ok(())
}
