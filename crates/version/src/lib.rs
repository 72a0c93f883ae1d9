//! Filename version stamping for cache-busting build artifacts.
//!
//! This crate manages per-identifier version counters persisted as
//! `<ID>_VERSION` entries in an [`envstamp_store::EnvStore`], embeds
//! `.v<n>` tokens into filenames, and retires stale versioned files
//! beyond a retention count.

mod error;
mod filename;
mod manager;

pub use error::VersionError;
pub use filename::{TokenPlacement, inject_version, split_version};
pub use manager::{DEFAULT_KEEP, StampOptions, VersionManager};
