//! Pure filename transforms for version tokens.
//!
//! Responsibilities:
//! - Insert `.v<n>` tokens into filenames (two placement modes).
//! - Split a versioned filename back into its clean name and version.
//!
//! Does NOT handle:
//! - I/O or counter state (see `manager.rs`).
//!
//! Invariants:
//! - Stripping the inserted `.v<digits>` token recovers the input name.

/// Where the version token lands inside a filename.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TokenPlacement {
    /// Right after the first dot-free segment:
    /// `main.min.js` → `main.v7.min.js`.
    #[default]
    AfterBase,
    /// Right before the last extension:
    /// `main.min.js` → `main.min.v7.js`.
    BeforeExtension,
}

/// Insert a `.v<version>` token into `filename`.
///
/// A name without any dot gets the token appended in either mode, and a
/// `None` version leaves the name untouched.
pub fn inject_version(filename: &str, version: Option<u64>, placement: TokenPlacement) -> String {
    let Some(version) = version else {
        return filename.to_string();
    };
    let token = format!(".v{version}");

    let split = match placement {
        TokenPlacement::AfterBase => filename.find('.'),
        TokenPlacement::BeforeExtension => filename.rfind('.'),
    };
    match split {
        Some(index) => format!("{}{}{}", &filename[..index], token, &filename[index..]),
        None => format!("{filename}{token}"),
    }
}

/// Split a filename carrying a `.v<digits>.` token into the clean name
/// (token stripped) and the version number.
///
/// Returns `None` when no such token is present.
pub fn split_version(filename: &str) -> Option<(String, u64)> {
    let mut search = 0;
    while let Some(found) = filename[search..].find(".v") {
        let start = search + found;
        let digits_start = start + 2;
        let digits_len = filename[digits_start..]
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(filename.len() - digits_start);
        let digits_end = digits_start + digits_len;

        if digits_len > 0 && filename[digits_end..].starts_with('.') {
            if let Ok(version) = filename[digits_start..digits_end].parse() {
                let clean = format!("{}{}", &filename[..start], &filename[digits_end..]);
                return Some((clean, version));
            }
        }
        search = digits_start;
    }
    None
}
