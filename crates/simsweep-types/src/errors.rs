//! Typed startup errors.

use std::path::PathBuf;

/// Errors raised while reading the manifest or deriving the sweep layout.
///
/// All are fatal to the orchestrator and none are retried; each carries the
/// offending path.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The manifest file could not be read.
    #[error("cannot read manifest {path}: {source}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The manifest names no destination folder.
    #[error("manifest {path} names no destination folder (use `destfolder <name>`)")]
    MissingDestFolder { path: PathBuf },

    /// The destination folder named by the manifest does not exist.
    #[error("destination folder {path} does not exist")]
    DestFolderMissing { path: PathBuf },

    /// The destination folder contains no run directories.
    #[error("destination folder {path} contains no run directories")]
    NoRuns { path: PathBuf },

    /// A file inside the sample run could not be read.
    #[error("cannot read run input {path}: {source}")]
    RunInputRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No primary input file could be located in the sample run.
    #[error("no primary input file found in sample run {path}")]
    MissingPrimary { path: PathBuf },

    /// A body input file carries no `sName` directive.
    #[error("body file {path} has no `sName` directive")]
    MissingBodyName { path: PathBuf },
}
