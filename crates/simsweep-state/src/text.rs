//! Line-oriented text-file implementation of [`CheckpointStore`].
//!
//! Format:
//!
//! ```text
//! Vspace File: <absolute manifest path>
//! Total Number of Simulations: <N>
//! <absolute run directory> <status>     (repeated N times, enumeration order)
//! THE END
//! ```
//!
//! `<status>` is `-1` (pending), `0` (in progress), or `1` (complete). The
//! file is rewritten in full on every mutation and flushed before the store
//! lock is released; partial writes are acceptable only because that lock
//! serializes writers. Readers outside the lock (status reporting) may
//! observe an intermediate count.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use simsweep_types::checkpoint::{CheckpointCounts, RestoreOutcome};
use simsweep_types::status::RunStatus;

use crate::error::{Result, StateError};
use crate::store::CheckpointStore;

const MANIFEST_HEADER: &str = "Vspace File:";
const TOTAL_HEADER: &str = "Total Number of Simulations:";
const END_SENTINEL: &str = "THE END";

/// One tracked run.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    run_dir: PathBuf,
    status: RunStatus,
}

/// Parsed checkpoint contents.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Document {
    manifest: String,
    entries: Vec<Entry>,
}

impl Document {
    fn fresh(manifest: &Path, runs: &[PathBuf]) -> Self {
        Self {
            manifest: manifest.display().to_string(),
            entries: runs
                .iter()
                .map(|run| Entry {
                    run_dir: run.clone(),
                    status: RunStatus::Pending,
                })
                .collect(),
        }
    }

    fn parse(path: &Path, text: &str) -> Result<Self> {
        let corrupt = |reason: &str| StateError::Corrupt {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        let mut lines = text.lines();
        let manifest = lines
            .next()
            .and_then(|line| line.strip_prefix(MANIFEST_HEADER))
            .ok_or_else(|| corrupt("missing manifest header"))?
            .trim()
            .to_string();
        lines
            .next()
            .and_then(|line| line.strip_prefix(TOTAL_HEADER))
            .ok_or_else(|| corrupt("missing total line"))?;

        let mut entries: Vec<Entry> = Vec::new();
        for line in lines {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == END_SENTINEL {
                break;
            }
            let Some((dir, token)) = line.rsplit_once(' ') else {
                continue;
            };
            let run_dir = PathBuf::from(dir.trim_end());
            // Duplicate rows never come from us; if observed, first wins.
            if entries.iter().any(|entry| entry.run_dir == run_dir) {
                continue;
            }
            // Unknown status tokens restore as pending.
            let status = RunStatus::from_token(token).unwrap_or(RunStatus::Pending);
            entries.push(Entry { run_dir, status });
        }

        Ok(Self { manifest, entries })
    }

    fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("{MANIFEST_HEADER} {}\n", self.manifest));
        out.push_str(&format!("{TOTAL_HEADER} {}\n", self.entries.len()));
        for entry in &self.entries {
            out.push_str(&format!(
                "{} {}\n",
                entry.run_dir.display(),
                entry.status.as_token()
            ));
        }
        out.push_str(END_SENTINEL);
        out.push('\n');
        out
    }

    /// Restart repair: any run left in flight by a crashed execution becomes
    /// re-dispatchable, and runs missing from a truncated file are appended.
    fn repair(&mut self, runs: &[PathBuf]) {
        for entry in &mut self.entries {
            if entry.status == RunStatus::InProgress {
                entry.status = RunStatus::Pending;
            }
        }
        for run in runs {
            if !self.entries.iter().any(|entry| &entry.run_dir == run) {
                self.entries.push(Entry {
                    run_dir: run.clone(),
                    status: RunStatus::Pending,
                });
            }
        }
    }

    fn counts(&self) -> CheckpointCounts {
        let mut counts = CheckpointCounts::default();
        for entry in &self.entries {
            match entry.status {
                RunStatus::Complete => counts.completed += 1,
                RunStatus::InProgress => counts.in_progress += 1,
                RunStatus::Pending => counts.pending += 1,
            }
        }
        counts
    }
}

/// Text-file checkpoint store.
///
/// Thread safety comes from an internal mutex held across the full
/// read-modify-rewrite of every mutation; [`CheckpointStore::counts`]
/// deliberately reads without it.
#[derive(Debug)]
pub struct TextCheckpoint {
    path: PathBuf,
    lock: Mutex<()>,
}

impl TextCheckpoint {
    /// Open an existing checkpoint, validating that it parses.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Io`] if the file cannot be read or
    /// [`StateError::Corrupt`] if its header is malformed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let _ = read_document(&path)?;
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    /// Create a fresh checkpoint or restore an existing one.
    ///
    /// Fresh: every run starts `Pending`. Restore: in-flight entries are
    /// re-pended and the repaired file is rewritten. If every entry is
    /// already complete, returns [`RestoreOutcome::AlreadyDone`] without
    /// touching the file, or, when `force` is set, deletes the run
    /// directories and the checkpoint and returns
    /// [`RestoreOutcome::ForceReset`] so the caller can re-invoke.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] on any read, parse, or rewrite failure.
    pub fn init_or_restore(
        ckpt_path: &Path,
        manifest_path: &Path,
        runs: &[PathBuf],
        force: bool,
    ) -> Result<(Self, RestoreOutcome)> {
        if !ckpt_path.exists() {
            let doc = Document::fresh(manifest_path, runs);
            write_document(ckpt_path, &doc)?;
            return Ok((Self::new(ckpt_path), RestoreOutcome::Fresh));
        }

        let mut doc = read_document(ckpt_path)?;
        doc.repair(runs);

        if doc.counts().is_complete() {
            if force {
                for run in runs {
                    if run.is_dir() {
                        fs::remove_dir_all(run)?;
                    }
                }
                fs::remove_file(ckpt_path)?;
                return Ok((Self::new(ckpt_path), RestoreOutcome::ForceReset));
            }
            return Ok((Self::new(ckpt_path), RestoreOutcome::AlreadyDone));
        }

        write_document(ckpt_path, &doc)?;
        Ok((Self::new(ckpt_path), RestoreOutcome::Restored))
    }

    /// Path of the underlying checkpoint file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.lock.lock().map_err(|_| StateError::LockPoisoned)
    }

    fn set_status(&self, run_dir: &Path, status: RunStatus) -> Result<()> {
        let _guard = self.guard()?;
        let mut doc = read_document(&self.path)?;
        let Some(entry) = doc
            .entries
            .iter_mut()
            .find(|entry| entry.run_dir == run_dir)
        else {
            return Ok(());
        };
        // Complete is terminal: a late failure report never regresses it.
        if entry.status == RunStatus::Complete && status != RunStatus::Complete {
            return Ok(());
        }
        entry.status = status;
        write_document(&self.path, &doc)
    }
}

impl CheckpointStore for TextCheckpoint {
    fn claim_next(&self) -> Result<Option<PathBuf>> {
        let _guard = self.guard()?;
        let mut doc = read_document(&self.path)?;
        let Some(entry) = doc
            .entries
            .iter_mut()
            .find(|entry| entry.status == RunStatus::Pending)
        else {
            return Ok(None);
        };
        entry.status = RunStatus::InProgress;
        let run_dir = entry.run_dir.clone();
        write_document(&self.path, &doc)?;
        Ok(Some(run_dir))
    }

    fn mark_complete(&self, run_dir: &Path) -> Result<()> {
        self.set_status(run_dir, RunStatus::Complete)
    }

    fn mark_failed(&self, run_dir: &Path) -> Result<()> {
        self.set_status(run_dir, RunStatus::Pending)
    }

    fn counts(&self) -> Result<CheckpointCounts> {
        Ok(read_document(&self.path)?.counts())
    }
}

fn read_document(path: &Path) -> Result<Document> {
    let text = fs::read_to_string(path)?;
    Document::parse(path, &text)
}

fn write_document(path: &Path, doc: &Document) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(doc.render().as_bytes())?;
    writer.flush()?;
    Ok(())
}
