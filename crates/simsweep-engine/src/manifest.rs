//! Sweep manifest parsing and run-directory enumeration.
//!
//! The manifest is a token-per-line text file produced by the upstream sweep
//! generator. The engine reads two directives and ignores everything else:
//! `destfolder <name>` (required) and `file <basename>` (zero or more
//! per-body input files). The generator's older spellings `sDestFolder`,
//! `sBodyFile`, and `sPrimaryFile` are accepted as aliases; the primary file
//! is re-derived from disk rather than trusted from the manifest, so renames
//! between generation and execution are tolerated.

use std::fs;
use std::path::{Path, PathBuf};

use simsweep_types::{ConfigError, SweepLayout, SystemIdentity};

/// Extension shared by every simulator input file.
const INPUT_EXTENSION: &str = "in";

/// Body-name directive inside a per-body input file.
const BODY_NAME_DIRECTIVE: &str = "sName";

/// Read the sweep manifest and resolve the destination folder.
///
/// The relative `destfolder` resolves against the manifest's parent
/// directory, so a sweep can be executed from any invocation directory.
///
/// # Errors
///
/// Returns [`ConfigError`] if the manifest cannot be read, names no
/// destination folder, or names one that does not exist.
pub fn read_layout(manifest_path: &Path) -> Result<SweepLayout, ConfigError> {
    let text = fs::read_to_string(manifest_path).map_err(|source| ConfigError::ManifestRead {
        path: manifest_path.to_path_buf(),
        source,
    })?;

    let mut dest_folder = None;
    let mut body_files = Vec::new();
    for line in text.lines() {
        let mut tokens = line.split_whitespace();
        let (Some(directive), Some(value)) = (tokens.next(), tokens.next()) else {
            continue;
        };
        match directive {
            "destfolder" | "sDestFolder" => dest_folder = Some(value.to_string()),
            "file" | "sBodyFile" => body_files.push(value.to_string()),
            // The primary is located on disk (`derive_system`), not recorded.
            "sPrimaryFile" => {}
            _ => {}
        }
    }

    let dest_folder = dest_folder.ok_or_else(|| ConfigError::MissingDestFolder {
        path: manifest_path.to_path_buf(),
    })?;

    let base = match manifest_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let dest_path = base.join(&dest_folder);
    if !dest_path.is_dir() {
        return Err(ConfigError::DestFolderMissing { path: dest_path });
    }
    let dest_path = dest_path
        .canonicalize()
        .map_err(|source| ConfigError::RunInputRead {
            path: dest_path.clone(),
            source,
        })?;

    Ok(SweepLayout {
        dest_folder,
        dest_path,
        body_files,
    })
}

/// Enumerate the run directories under the destination folder.
///
/// Every immediate child directory counts as one run; ordering is
/// lexicographic by basename so dispatch is deterministic.
///
/// # Errors
///
/// Returns [`ConfigError`] if the folder does not exist, cannot be read, or
/// contains no run directories (nothing to do is a hard error).
pub fn enumerate_runs(dest_path: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    if !dest_path.is_dir() {
        return Err(ConfigError::DestFolderMissing {
            path: dest_path.to_path_buf(),
        });
    }

    let read_err = |source| ConfigError::RunInputRead {
        path: dest_path.to_path_buf(),
        source,
    };

    let mut runs = Vec::new();
    for entry in fs::read_dir(dest_path).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        if entry.file_type().map_err(read_err)?.is_dir() {
            runs.push(entry.path());
        }
    }
    if runs.is_empty() {
        return Err(ConfigError::NoRuns {
            path: dest_path.to_path_buf(),
        });
    }
    runs.sort_by_key(|run| run.file_name().map(std::ffi::OsStr::to_os_string));
    Ok(runs)
}

/// Derive the system name and body names from one sample run.
///
/// The primary input file is the one `*.in` file whose basename is not in
/// `body_files`; the system name is its basename without extension. Each
/// body file contributes its first `sName <value>` directive.
///
/// # Errors
///
/// Returns [`ConfigError`] if the sample run is unreadable, no primary can
/// be located, or a body file carries no `sName` directive.
pub fn derive_system(sample_run: &Path, body_files: &[String]) -> Result<SystemIdentity, ConfigError> {
    let read_err = |path: &Path, source| ConfigError::RunInputRead {
        path: path.to_path_buf(),
        source,
    };

    let mut input_files = Vec::new();
    for entry in fs::read_dir(sample_run).map_err(|e| read_err(sample_run, e))? {
        let entry = entry.map_err(|e| read_err(sample_run, e))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some(INPUT_EXTENSION) {
            input_files.push(path);
        }
    }
    input_files.sort();

    let primary = input_files
        .iter()
        .find(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| !body_files.iter().any(|body| body == name))
        })
        .ok_or_else(|| ConfigError::MissingPrimary {
            path: sample_run.to_path_buf(),
        })?;
    let system_name = primary
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .ok_or_else(|| ConfigError::MissingPrimary {
            path: sample_run.to_path_buf(),
        })?;

    let mut body_names = Vec::with_capacity(body_files.len());
    for body_file in body_files {
        let path = sample_run.join(body_file);
        let text = fs::read_to_string(&path).map_err(|e| read_err(&path, e))?;
        let name = text
            .lines()
            .filter_map(|line| {
                let mut tokens = line.split_whitespace();
                match (tokens.next(), tokens.next()) {
                    (Some(BODY_NAME_DIRECTIVE), Some(value)) => Some(value.to_string()),
                    _ => None,
                }
            })
            .next()
            .ok_or(ConfigError::MissingBodyName { path })?;
        body_names.push(name);
    }

    Ok(SystemIdentity {
        system_name,
        body_names,
    })
}
