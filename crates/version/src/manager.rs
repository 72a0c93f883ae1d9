//! Version counters, stamped names, and retention.
//!
//! Responsibilities:
//! - Persist per-identifier counters as `<ID>_VERSION` entries in the
//!   backing env store.
//! - Produce stamped filenames, both read-only and incrementing.
//! - Prune stale versioned files beyond a retention count (best-effort).
//! - Guard the composite stamping workflow against duplicate invocation
//!   within a single run.
//!
//! Does NOT handle:
//! - `.env` syntax or persistence (see the `envstamp-store` crate).
//! - Filename string mechanics (see `filename.rs`).
//!
//! Invariants:
//! - Counters only move through `bump`; nothing deletes them.
//! - A canonical name is bumped and pruned at most once per manager run.
//! - `stamp` fails open: errors yield the unmodified input name.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use envstamp_store::EnvStore;

use crate::error::VersionError;
use crate::filename::{TokenPlacement, inject_version, split_version};

/// Key suffix under which counters live in the env file.
const VERSION_KEY_SUFFIX: &str = "_VERSION";

/// Default number of existing versioned files [`VersionManager::stamp`]
/// retains when pruning.
pub const DEFAULT_KEEP: usize = 3;

/// Options for [`VersionManager::stamp`].
#[derive(Debug, Clone)]
pub struct StampOptions {
    /// Counter identifier; defaults to the filename's extension.
    pub identifier: Option<String>,
    /// Bump the counter (write path) or reuse its current value.
    pub increment: bool,
    /// How many existing versioned files to retain when pruning. The
    /// incrementing path prunes with one fewer so the version about to
    /// be written still fits within this count.
    pub keep: usize,
    /// Where the token lands in the stamped name.
    pub placement: TokenPlacement,
}

impl Default for StampOptions {
    fn default() -> Self {
        Self {
            identifier: None,
            increment: true,
            keep: DEFAULT_KEEP,
            placement: TokenPlacement::default(),
        }
    }
}

/// Stamps filenames with monotonically increasing version numbers backed
/// by an [`EnvStore`], and retires stale versioned files.
///
/// The manager is an explicit, host-constructed object; the duplicate-
/// invocation guard it carries is scoped to the manager's lifetime, which
/// for a long-lived host is the process run.
#[derive(Debug)]
pub struct VersionManager {
    store: EnvStore,
    stamped: HashSet<String>,
}

impl VersionManager {
    /// Build a manager on top of an already-opened store.
    pub fn new(store: EnvStore) -> Self {
        Self {
            store,
            stamped: HashSet::new(),
        }
    }

    /// The backing store, for direct entry access.
    pub fn store(&self) -> &EnvStore {
        &self.store
    }

    /// Current counter value for `identifier`, or `None` when the counter
    /// is unset or unparsable. Callers must check before doing arithmetic.
    pub fn version(&self, identifier: &str) -> Option<u64> {
        self.store.get(&counter_key(identifier))?.parse().ok()
    }

    /// Advance the counter for `identifier` and persist it.
    ///
    /// `forced` pins the counter to an explicit value; otherwise the
    /// current value (0 when unset) is incremented. Only forced updates
    /// are idempotent; repeated unforced calls always increment.
    pub fn bump(&mut self, identifier: &str, forced: Option<u64>) -> Result<u64, VersionError> {
        let next = forced.unwrap_or_else(|| self.version(identifier).unwrap_or(0) + 1);
        self.store.set(&counter_key(identifier), &next.to_string())?;
        Ok(next)
    }

    /// Stamp `filename` with the current counter value, without mutating
    /// anything. The identifier defaults to the filename's extension; an
    /// unset counter leaves the name untouched.
    pub fn versioned_name(
        &self,
        filename: &str,
        identifier: Option<&str>,
        placement: TokenPlacement,
    ) -> String {
        let identifier = identifier.unwrap_or_else(|| default_identifier(filename));
        inject_version(filename, self.version(identifier), placement)
    }

    /// Bump the counter and stamp `filename` with the fresh value.
    pub fn bump_versioned_name(
        &mut self,
        filename: &str,
        identifier: Option<&str>,
        placement: TokenPlacement,
    ) -> Result<String, VersionError> {
        let identifier = identifier
            .unwrap_or_else(|| default_identifier(filename))
            .to_string();
        let version = self.bump(&identifier, None)?;
        Ok(inject_version(filename, Some(version), placement))
    }

    /// Delete stale versions of `canonical_name` in `directory`, retaining
    /// the `keep` most recent versioned files present on disk.
    ///
    /// Deletion is best-effort: individual failures are logged and do not
    /// abort the batch, and the returned list reports every path selected
    /// for deletion regardless of outcome. Only a failed directory listing
    /// is an error.
    pub fn prune(
        &self,
        directory: &Path,
        canonical_name: &str,
        keep: usize,
    ) -> Result<Vec<PathBuf>, VersionError> {
        let read_dir = std::fs::read_dir(directory).map_err(|e| VersionError::ListDir {
            path: directory.to_path_buf(),
            source: e,
        })?;

        let mut versions: Vec<(u64, PathBuf)> = Vec::new();
        for entry in read_dir {
            let Ok(entry) = entry else { continue };
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some((clean, version)) = split_version(name)
                && clean == canonical_name
            {
                versions.push((version, entry.path()));
            }
        }

        versions.sort_by_key(|(version, _)| *version);
        let stale = versions.len().saturating_sub(keep);
        let doomed: Vec<PathBuf> = versions
            .drain(..stale)
            .map(|(_, path)| path)
            .collect();

        for path in &doomed {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::debug!(path = %path.display(), "deleted stale versioned file"),
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "failed to delete stale versioned file");
                }
            }
        }

        Ok(doomed)
    }

    /// Produce the versioned name for `canonical_name`, bumping the
    /// counter and pruning stale files on the first call per name, and
    /// only echoing the current stamped name on repeats.
    ///
    /// Callers such as file watchers may invoke this several times per
    /// logical build step; repeat calls must not advance the counter or
    /// prune again. Fails open: any error on the first-call path is
    /// logged and the original filename is returned unchanged.
    pub fn stamp(
        &mut self,
        directory: &Path,
        canonical_name: &str,
        options: &StampOptions,
    ) -> String {
        if self.stamped.contains(canonical_name) {
            return self.versioned_name(
                canonical_name,
                options.identifier.as_deref(),
                options.placement,
            );
        }

        match self.stamp_first(directory, canonical_name, options) {
            Ok(stamped) => {
                self.stamped.insert(canonical_name.to_string());
                stamped
            }
            Err(error) => {
                tracing::warn!(
                    name = canonical_name,
                    %error,
                    "version stamping failed, using unversioned name"
                );
                canonical_name.to_string()
            }
        }
    }

    fn stamp_first(
        &mut self,
        directory: &Path,
        canonical_name: &str,
        options: &StampOptions,
    ) -> Result<String, VersionError> {
        let identifier = options.identifier.as_deref();
        let (stamped, keep) = if options.increment {
            let name = self.bump_versioned_name(canonical_name, identifier, options.placement)?;
            // One slot is reserved for the version the caller is about to
            // write, which is not on disk yet.
            (name, options.keep.saturating_sub(1))
        } else {
            (
                self.versioned_name(canonical_name, identifier, options.placement),
                options.keep,
            )
        };

        self.prune(directory, canonical_name, keep)?;
        Ok(stamped)
    }
}

fn counter_key(identifier: &str) -> String {
    format!("{}{}", identifier.to_uppercase(), VERSION_KEY_SUFFIX)
}

fn default_identifier(filename: &str) -> &str {
    filename
        .rsplit_once('.')
        .map(|(_, extension)| extension)
        .unwrap_or(filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use envstamp_store::StoreOptions;
    use tempfile::TempDir;

    fn manager_in(dir: &TempDir) -> VersionManager {
        let options = StoreOptions {
            export_env: false,
            ..StoreOptions::default()
        };
        VersionManager::new(EnvStore::open(dir.path().join(".env"), options).unwrap())
    }

    fn touch(dir: &TempDir, name: &str) {
        std::fs::write(dir.path().join(name), "x").unwrap();
    }

    #[test]
    fn test_version_unset_is_none() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);

        assert_eq!(manager.version("build"), None);
    }

    #[test]
    fn test_version_unparsable_is_none() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager_in(&dir);
        manager.store.set("BUILD_VERSION", "not-a-number").unwrap();

        assert_eq!(manager.version("build"), None);
    }

    #[test]
    fn test_bump_increments_from_unset() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager_in(&dir);

        assert_eq!(manager.bump("build", None).unwrap(), 1);
        assert_eq!(manager.bump("build", None).unwrap(), 2);
        assert_eq!(manager.bump("build", None).unwrap(), 3);
        assert_eq!(manager.store().get("BUILD_VERSION"), Some("3"));
    }

    #[test]
    fn test_bump_forced_then_continues_from_there() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager_in(&dir);

        assert_eq!(manager.bump("build", Some(10)).unwrap(), 10);
        assert_eq!(manager.bump("build", None).unwrap(), 11);
    }

    #[test]
    fn test_counters_are_independent_per_identifier() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager_in(&dir);

        manager.bump("js", None).unwrap();
        manager.bump("js", None).unwrap();
        manager.bump("css", None).unwrap();

        assert_eq!(manager.version("js"), Some(2));
        assert_eq!(manager.version("css"), Some(1));
    }

    #[test]
    fn test_versioned_name_defaults_identifier_to_extension() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager_in(&dir);
        manager.bump("js", Some(4)).unwrap();

        let name = manager.versioned_name("app.js", None, TokenPlacement::default());
        assert_eq!(name, "app.v4.js");

        // Unset counter for .css leaves the name untouched.
        let name = manager.versioned_name("style.css", None, TokenPlacement::default());
        assert_eq!(name, "style.css");
    }

    #[test]
    fn test_bump_versioned_name_writes_through() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager_in(&dir);

        let name = manager
            .bump_versioned_name("app.js", None, TokenPlacement::default())
            .unwrap();

        assert_eq!(name, "app.v1.js");
        assert_eq!(manager.version("js"), Some(1));
    }

    #[test]
    fn test_prune_retains_most_recent_keep() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);
        touch(&dir, "app.v1.js");
        touch(&dir, "app.v2.js");
        touch(&dir, "app.v3.js");

        let deleted = manager.prune(dir.path(), "app.js", 2).unwrap();

        assert_eq!(deleted, vec![dir.path().join("app.v1.js")]);
        assert!(!dir.path().join("app.v1.js").exists());
        assert!(dir.path().join("app.v2.js").exists());
        assert!(dir.path().join("app.v3.js").exists());
    }

    #[test]
    fn test_prune_ignores_other_groups() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);
        touch(&dir, "app.v1.js");
        touch(&dir, "other.v1.js");
        touch(&dir, "app.js");

        let deleted = manager.prune(dir.path(), "app.js", 0).unwrap();

        assert_eq!(deleted, vec![dir.path().join("app.v1.js")]);
        assert!(dir.path().join("other.v1.js").exists());
        assert!(dir.path().join("app.js").exists());
    }

    #[test]
    fn test_prune_with_enough_room_deletes_nothing() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);
        touch(&dir, "app.v1.js");
        touch(&dir, "app.v2.js");

        let deleted = manager.prune(dir.path(), "app.js", 5).unwrap();
        assert!(deleted.is_empty());
    }

    #[test]
    fn test_prune_missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);

        let result = manager.prune(&dir.path().join("missing"), "app.js", 2);
        assert!(matches!(result, Err(VersionError::ListDir { .. })));
    }

    #[test]
    fn test_stamp_bumps_and_prunes_once_per_name() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager_in(&dir);
        manager.bump("js", Some(3)).unwrap();
        touch(&dir, "app.v1.js");
        touch(&dir, "app.v2.js");
        touch(&dir, "app.v3.js");

        let options = StampOptions::default();
        let first = manager.stamp(dir.path(), "app.js", &options);
        assert_eq!(first, "app.v4.js");
        // keep = 3 with one slot reserved for v4: v2 and v3 survive.
        assert!(!dir.path().join("app.v1.js").exists());
        assert!(dir.path().join("app.v2.js").exists());
        assert!(dir.path().join("app.v3.js").exists());

        touch(&dir, "app.v4.js");
        let second = manager.stamp(dir.path(), "app.js", &options);
        assert_eq!(second, "app.v4.js");
        assert_eq!(manager.version("js"), Some(4));
        assert!(dir.path().join("app.v2.js").exists());
    }

    #[test]
    fn test_stamp_read_only_path_does_not_bump() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager_in(&dir);
        manager.bump("js", Some(2)).unwrap();

        let options = StampOptions {
            increment: false,
            ..StampOptions::default()
        };
        let name = manager.stamp(dir.path(), "app.js", &options);

        assert_eq!(name, "app.v2.js");
        assert_eq!(manager.version("js"), Some(2));
    }

    #[test]
    fn test_stamp_fails_open_on_missing_directory() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager_in(&dir);

        let options = StampOptions::default();
        let name = manager.stamp(&dir.path().join("missing"), "app.js", &options);

        assert_eq!(name, "app.js");
    }

    #[test]
    fn test_stamp_explicit_identifier_and_placement() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager_in(&dir);

        let options = StampOptions {
            identifier: Some("bundle".to_string()),
            placement: TokenPlacement::BeforeExtension,
            ..StampOptions::default()
        };
        let name = manager.stamp(dir.path(), "app.min.js", &options);

        assert_eq!(name, "app.min.v1.js");
        assert_eq!(manager.store().get("BUNDLE_VERSION"), Some("1"));
    }
}
