//! Error types for env file access.
//!
//! Responsibilities:
//! - Define error variants for every fallible store operation.
//!
//! Invariants:
//! - Every variant carries the backing file path and the underlying
//!   `std::io::Error` for debugging.
//! - Mutations surface these as returned values, never as panics.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by [`EnvStore`](crate::EnvStore) operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to create env file at {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read env file at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write env file at {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to remove env file at {path}: {source}")]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },
}
