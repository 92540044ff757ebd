//! Meridian error types.
//!
//! All failures crossing the public surface are typed. Per-file problems
//! (unreadable file, parse failure) are recovered inside the pipeline and
//! surfaced as diagnostics, never as errors; only configuration and store
//! problems abort an indexing run.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Meridian operations.
#[derive(Error, Debug)]
pub enum MeridianError {
    /// Configuration rejected before any I/O (malformed glob, unknown
    /// log level, unknown language tag).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error during file operations.
    #[error("I/O error for path {path}: {source}")]
    Io {
        /// The path that caused the I/O error.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Graph store error (open, schema, bulk upsert). Fatal: partial
    /// writes are left in place and the caller may `clean`.
    #[error("graph store error: {0:#}")]
    Store(anyhow::Error),

    /// Tree-sitter parsing error surfaced outside the per-file recovery
    /// path (e.g. a query that fails to compile against its grammar).
    #[error("parse error in {file}: {message}")]
    Parse {
        /// The file that failed to parse.
        file: PathBuf,
        /// The parse error message.
        message: String,
    },
}

impl MeridianError {
    /// Wrap an I/O error with the path that produced it.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MeridianError::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap any store-layer failure.
    pub fn store(err: impl Into<anyhow::Error>) -> Self {
        MeridianError::Store(err.into())
    }
}

/// Crate-wide result alias for the public surface.
pub type Result<T> = std::result::Result<T, MeridianError>;
