//! Shared run archive: single-writer wrapper and injected capabilities.
//!
//! Many workers produce archive entries, but the archive library is not
//! concurrent-write-safe, so all mutation is serialized through one
//! exclusive writer lock: within the critical section the file is opened,
//! one run's group is written, and the handle is closed again. Gathering a
//! run's outputs into memory happens outside the lock.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use simsweep_types::{SweepLayout, SystemIdentity, ToolMetadata};

/// Errors raised while gathering or archiving one run's outputs.
///
/// Never fatal to a worker: the run is re-pended and the worker moves on.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// The shared archive file could not be opened.
    #[error("cannot open archive {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing one run's group failed.
    #[error("cannot write archive group {group}: {source}")]
    Write {
        group: String,
        #[source]
        source: io::Error,
    },

    /// Reading a run's output files failed.
    #[error("cannot gather outputs from {run_dir}: {source}")]
    Gather {
        run_dir: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The writer lock was poisoned by a panicked worker.
    #[error("archive lock poisoned")]
    LockPoisoned,
}

/// In-memory payload for one run, produced by gathering and consumed by the
/// sink. Opaque to the scheduler and the checkpoint: named datasets of raw
/// bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunData {
    pub datasets: BTreeMap<String, Vec<u8>>,
}

/// Builds a [`RunData`] from a completed run directory.
///
/// Pure and lock-free; called outside the writer lock on every iteration
/// (no per-worker accumulator survives between runs).
pub trait RunGatherer: Send + Sync {
    /// Read the run's outputs into memory.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Gather`] if an output file cannot be read.
    fn gather(
        &self,
        run_dir: &Path,
        system: &SystemIdentity,
        layout: &SweepLayout,
        metadata: &ToolMetadata,
    ) -> Result<RunData, ArchiveError>;
}

/// Writes one run's group into the shared archive.
///
/// Called only under the writer lock, with an open handle the caller closes
/// on every exit path.
pub trait ArchiveSink: Send + Sync {
    /// Append the group named `group` containing `data`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Write`] on I/O failure.
    fn write_run(
        &self,
        archive: &mut File,
        data: &RunData,
        metadata: &ToolMetadata,
        system_name: &str,
        group: &str,
    ) -> Result<(), ArchiveError>;
}

/// Serialized writer for the shared archive file.
///
/// Invariant: at most one worker holds the archive file open at a time.
pub struct ArchiveWriter {
    path: PathBuf,
    lock: Mutex<()>,
    sink: Arc<dyn ArchiveSink>,
}

impl ArchiveWriter {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, sink: Arc<dyn ArchiveSink>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            sink,
        }
    }

    /// Path of the shared archive file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one run's gathered data under the writer lock.
    ///
    /// The group name is the run directory's basename. The archive is opened
    /// in append mode (created if absent) and the handle is closed on every
    /// exit path before the lock is released.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError`] on open or write failure; the caller then
    /// marks the run failed so it stays eligible for retry.
    pub fn append_run(
        &self,
        run_dir: &Path,
        data: &RunData,
        metadata: &ToolMetadata,
        system_name: &str,
    ) -> Result<(), ArchiveError> {
        let _guard = self.lock.lock().map_err(|_| ArchiveError::LockPoisoned)?;
        let mut archive = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| ArchiveError::Open {
                path: self.path.clone(),
                source,
            })?;
        let group = run_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.sink
            .write_run(&mut archive, data, metadata, system_name, &group)
    }
}

// ---------------------------------------------------------------------------
// Default capabilities
// ---------------------------------------------------------------------------

/// Default gatherer: snapshots the simulator's own log and each body's
/// forward-evolution file as raw datasets. Outputs a run did not produce are
/// skipped rather than treated as errors.
pub struct OutputGatherer;

impl RunGatherer for OutputGatherer {
    fn gather(
        &self,
        run_dir: &Path,
        system: &SystemIdentity,
        _layout: &SweepLayout,
        _metadata: &ToolMetadata,
    ) -> Result<RunData, ArchiveError> {
        let mut names = vec![system.log_file_name()];
        for body in &system.body_names {
            names.push(format!("{}.{body}.forward", system.system_name));
        }

        let mut data = RunData::default();
        for name in names {
            let path = run_dir.join(&name);
            if !path.is_file() {
                continue;
            }
            let bytes = std::fs::read(&path).map_err(|source| ArchiveError::Gather {
                run_dir: run_dir.to_path_buf(),
                source,
            })?;
            data.datasets.insert(name, bytes);
        }
        Ok(data)
    }
}

/// Default sink: one length-prefixed binary record per run group.
///
/// Record layout (all integers little-endian):
///
/// ```text
/// u32 group-name length, group-name bytes
/// u32 system-name length, system-name bytes
/// u32 dataset count
///   u32 name length, name bytes
///   u64 payload length, payload bytes     (per dataset)
/// ```
///
/// The whole record is staged in memory and appended with a single write.
pub struct RecordSink;

impl ArchiveSink for RecordSink {
    fn write_run(
        &self,
        archive: &mut File,
        data: &RunData,
        _metadata: &ToolMetadata,
        system_name: &str,
        group: &str,
    ) -> Result<(), ArchiveError> {
        let mut record = Vec::new();
        put_str(&mut record, group);
        put_str(&mut record, system_name);
        record.extend_from_slice(&u32_len(data.datasets.len()).to_le_bytes());
        for (name, payload) in &data.datasets {
            put_str(&mut record, name);
            record.extend_from_slice(&(payload.len() as u64).to_le_bytes());
            record.extend_from_slice(payload);
        }
        archive
            .write_all(&record)
            .map_err(|source| ArchiveError::Write {
                group: group.to_string(),
                source,
            })
    }
}

/// List the group names present in a [`RecordSink`]-format archive, in
/// append order.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read or a record is truncated.
pub fn read_group_names(path: &Path) -> io::Result<Vec<String>> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut groups = Vec::new();
    loop {
        let Some(group) = try_read_str(&mut reader)? else {
            break;
        };
        groups.push(group);
        let _system = read_str(&mut reader)?;
        let count = read_u32(&mut reader)?;
        for _ in 0..count {
            let _name = read_str(&mut reader)?;
            let len = read_u64(&mut reader)?;
            skip(&mut reader, len)?;
        }
    }
    Ok(groups)
}

fn u32_len(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

fn put_str(buf: &mut Vec<u8>, value: &str) {
    buf.extend_from_slice(&u32_len(value.len()).to_le_bytes());
    buf.extend_from_slice(value.as_bytes());
}

/// Read a length-prefixed string, or `None` on clean end-of-file.
fn try_read_str(reader: &mut impl Read) -> io::Result<Option<String>> {
    let mut len_bytes = [0u8; 4];
    match reader.read_exact(&mut len_bytes) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err),
    }
    let mut bytes = vec![0u8; u32::from_le_bytes(len_bytes) as usize];
    reader.read_exact(&mut bytes)?;
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}

fn read_str(reader: &mut impl Read) -> io::Result<String> {
    try_read_str(reader)?
        .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "truncated archive record"))
}

fn read_u32(reader: &mut impl Read) -> io::Result<u32> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_u64(reader: &mut impl Read) -> io::Result<u64> {
    let mut bytes = [0u8; 8];
    reader.read_exact(&mut bytes)?;
    Ok(u64::from_le_bytes(bytes))
}

fn skip(reader: &mut impl Read, len: u64) -> io::Result<()> {
    let copied = io::copy(&mut reader.take(len), &mut io::sink())?;
    if copied < len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "truncated archive payload",
        ));
    }
    Ok(())
}
