//! Error types for version management.

use std::path::PathBuf;

use envstamp_store::StoreError;
use thiserror::Error;

/// Errors returned by [`VersionManager`](crate::VersionManager) operations.
#[derive(Debug, Error)]
pub enum VersionError {
    /// The underlying env store failed to read or persist a counter.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to list directory {path}: {source}")]
    ListDir {
        path: PathBuf,
        source: std::io::Error,
    },
}
