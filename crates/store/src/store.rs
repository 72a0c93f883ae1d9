//! In-memory `.env` store kept byte-consistent with its backing file.
//!
//! Responsibilities:
//! - Load (and auto-create) the backing file, caching its text and parsed
//!   entries for the lifetime of the store.
//! - Serve case-insensitive lookups from the parsed mapping.
//! - Apply mutations as structured line edits and persist the full text.
//! - Offer parsed keys to the process environment on open
//!   (first-writer-wins).
//!
//! Does NOT handle:
//! - Line-level syntax (see `parser.rs`).
//! - Version counters or filename stamping (see the `envstamp-version`
//!   crate).
//!
//! Invariants:
//! - After every successful mutation, re-parsing `raw()` reproduces the
//!   entry mapping (with `clear_entry_on_delete` enabled).
//! - Unrecognized lines (comments, blanks, malformed) are preserved
//!   verbatim across mutations.
//! - A mutation that fails to persist returns an error and leaves the
//!   in-memory state ahead of disk; the caller retries or treats the
//!   store as dirty.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::parser::{format_line, parse_line, parse_str};

/// Behavioral switches for [`EnvStore`].
///
/// There is a single canonical store implementation; behaviors its
/// predecessors disagreed on are explicit flags here rather than
/// divergent copies.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Offer parsed keys to the process environment on open. Variables
    /// already present in the environment always win.
    pub export_env: bool,
    /// Drop deleted keys from the parsed mapping as well as the text.
    /// Disabling this lets `get` keep serving a value whose line is gone,
    /// at the cost of the raw/parsed consistency invariant.
    pub clear_entry_on_delete: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            export_env: true,
            clear_entry_on_delete: true,
        }
    }
}

/// A `.env` file held in memory alongside its parsed entries.
///
/// The store is an explicit object: hosts construct one per backing file
/// and pass it by reference. There is no process-global instance; a host
/// that keeps the store alive for the process lifetime gets caching, and
/// [`reload`](EnvStore::reload) picks up out-of-band file changes.
#[derive(Debug)]
pub struct EnvStore {
    path: PathBuf,
    lines: Vec<String>,
    entries: BTreeMap<String, String>,
    options: StoreOptions,
}

impl EnvStore {
    /// Open the store backed by `path`, creating an empty file when none
    /// exists. Relative paths resolve against the working directory; an
    /// empty path means `.env`.
    pub fn open(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self, StoreError> {
        let path = resolve(path.as_ref());

        if !path.exists() {
            std::fs::write(&path, "").map_err(|e| StoreError::Create {
                path: path.clone(),
                source: e,
            })?;
            tracing::debug!(path = %path.display(), "created empty env file");
        }

        let text = std::fs::read_to_string(&path).map_err(|e| StoreError::Read {
            path: path.clone(),
            source: e,
        })?;

        let store = Self {
            path,
            lines: split_lines(&text),
            entries: parse_str(&text),
            options,
        };

        if store.options.export_env {
            store.export_env();
        }

        tracing::debug!(
            path = %store.path.display(),
            entries = store.entries.len(),
            "env file loaded"
        );
        Ok(store)
    }

    /// Open `./.env` with default options.
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(".env", StoreOptions::default())
    }

    /// Re-read the backing file, replacing the cached text and entries.
    ///
    /// Out-of-band edits are invisible until this is called. A missing
    /// file reads as empty. Does not re-export to the environment.
    pub fn reload(&mut self) -> Result<(), StoreError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source: e,
                });
            }
        };
        self.lines = split_lines(&text);
        self.entries = parse_str(&text);
        Ok(())
    }

    /// Look up a value, trying the upper-cased key first and the key
    /// exactly as given second. Absence is `None`, never an error.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&key.to_uppercase())
            .or_else(|| self.entries.get(key))
            .map(String::as_str)
    }

    /// Whether `key` resolves to an entry, under the same lookup rules as
    /// [`get`](Self::get).
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert or update an entry and persist the file.
    ///
    /// The key is canonicalized to upper case. When a line already owns
    /// the key (case-insensitive match on the parsed key), the last such
    /// line is regenerated as `KEY="value"` in place; new keys append a
    /// line. On a failed write the in-memory state is already updated.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let canonical = key.to_uppercase();
        let line = format_line(&canonical, value);

        match self.find_owning_line(&canonical) {
            Some((index, previous_key)) => {
                self.lines[index] = line;
                if previous_key != canonical {
                    self.entries.remove(&previous_key);
                }
            }
            None => self.append_line(line),
        }

        self.entries.insert(canonical, value.to_string());
        self.persist()
    }

    /// Remove the entry's owning line and persist.
    ///
    /// The last line owning the key is removed (later duplicates win,
    /// matching parse semantics). When nothing but whitespace remains,
    /// the backing file is deleted instead of being rewritten empty.
    /// Returns `Ok(false)` when no line owned the key.
    pub fn delete(&mut self, key: &str) -> Result<bool, StoreError> {
        let canonical = key.to_uppercase();
        let Some((index, _)) = self.find_owning_line(&canonical) else {
            return Ok(false);
        };

        self.lines.remove(index);
        if self.options.clear_entry_on_delete {
            // Recompute from the remaining lines so an earlier duplicate
            // of the key resurfaces in the mapping.
            self.entries = parse_str(&self.raw());
        }

        self.persist()?;
        Ok(true)
    }

    /// Convenience toggle: `true` sets the entry to the literal `"true"`,
    /// `false` deletes it.
    pub fn toggle(&mut self, key: &str, flag: bool) -> Result<(), StoreError> {
        if flag {
            self.set(key, "true")
        } else {
            self.delete(key).map(|_| ())
        }
    }

    /// The exact text of the backing file, including untouched comments
    /// and blank lines.
    pub fn raw(&self) -> String {
        self.lines.join("\n")
    }

    /// The parsed key/value mapping, keyed as written in the file.
    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    /// Resolved location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Locate the last line owning `canonical`, comparing parsed keys
    /// case-insensitively. Returns the line index and the key as written.
    fn find_owning_line(&self, canonical: &str) -> Option<(usize, String)> {
        self.lines.iter().enumerate().rev().find_map(|(index, line)| {
            let (key, _) = parse_line(line)?;
            (key.to_uppercase() == canonical).then_some((index, key))
        })
    }

    /// Append an entry line, keeping the trailing newline where one
    /// exists rather than opening a blank line mid-file.
    fn append_line(&mut self, line: String) {
        match self.lines.last().map(String::as_str) {
            Some("") => {
                let last = self.lines.len() - 1;
                self.lines.insert(last, line);
            }
            _ => self.lines.push(line),
        }
    }

    /// Write the cached text back to the backing file, or remove the file
    /// when nothing but whitespace remains.
    fn persist(&self) -> Result<(), StoreError> {
        let raw = self.raw();

        if raw.trim().is_empty() {
            match std::fs::remove_file(&self.path) {
                Ok(()) => {
                    tracing::debug!(path = %self.path.display(), "env file emptied, removed");
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(StoreError::Remove {
                        path: self.path.clone(),
                        source: e,
                    });
                }
            }
            return Ok(());
        }

        std::fs::write(&self.path, &raw).map_err(|e| StoreError::Write {
            path: self.path.clone(),
            source: e,
        })?;
        tracing::debug!(path = %self.path.display(), bytes = raw.len(), "env file written");
        Ok(())
    }

    /// Offer every parsed key to the process environment. Variables the
    /// environment already defines are left untouched.
    fn export_env(&self) {
        for (key, value) in &self.entries {
            if std::env::var_os(key).is_none() {
                // SAFETY: the store contract is single-threaded,
                // synchronous use; callers must not race environment
                // access on other threads.
                unsafe { std::env::set_var(key, value) };
            }
        }
    }
}

fn resolve(path: &Path) -> PathBuf {
    let path = if path.as_os_str().is_empty() {
        Path::new(".env")
    } else {
        path
    };
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.split('\n').map(str::to_string).collect()
}
