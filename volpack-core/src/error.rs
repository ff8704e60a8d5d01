//! Error types for volpack-core.
//!
//! Every pipeline stage returns one of these variants; the orchestrator pairs
//! it with the [`Stage`](crate::pipeline::Stage) that produced it.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for volpack-core operations
pub type Result<T> = std::result::Result<T, PackError>;

#[derive(Debug, Error)]
pub enum PackError {
    /// Compressor binary missing and could not be fetched
    #[error("compressor unavailable: {0}")]
    ToolUnavailable(String),

    /// Filesystem error while removing stale volumes from a previous run
    #[error("cleanup failed for {path}: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// External compressor could not be started or exited non-zero
    #[error("compression failed: {0}")]
    Compression(String),

    /// A native volume could not be moved to its canonical name
    #[error("rename failed for {path}: {source}")]
    Rename {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A volume could not be read while computing its digest
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Template malformed, destination unwritable, or nothing to generate against
    #[error("script generation failed: {0}")]
    Generation(String),

    /// Volumes on disk do not match their recorded digests
    #[error("integrity check failed: {0}")]
    Integrity(String),

    /// Manifest could not be written or parsed
    #[error("manifest error at {path}: {message}")]
    Manifest { path: PathBuf, message: String },
}

impl PackError {
    pub(crate) fn generation(msg: impl Into<String>) -> Self {
        PackError::Generation(msg.into())
    }

    /// Path the error refers to, when it is about a single file.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            PackError::Cleanup { path, .. }
            | PackError::Rename { path, .. }
            | PackError::Read { path, .. }
            | PackError::Manifest { path, .. } => Some(path),
            _ => None,
        }
    }
}
