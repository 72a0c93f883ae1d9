//! Line-level parsing for `.env` content.
//!
//! Responsibilities:
//! - Match `KEY=VALUE` lines and extract normalized values.
//! - Render the canonical `KEY="value"` form used for every write.
//!
//! Does NOT handle:
//! - File I/O or the cached text/entries pairing (see `store.rs`).
//!
//! Invariants:
//! - Keys are one or more `[A-Za-z0-9_.-]` characters.
//! - Lines that do not match are skipped, never errors.
//! - Later duplicate keys overwrite earlier ones in the parsed mapping.

use std::collections::BTreeMap;

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-'
}

/// Parse a single line as a `KEY=VALUE` entry.
///
/// Returns `None` for comments, blank lines, and anything else that does
/// not match the entry pattern. The key is returned exactly as written.
pub fn parse_line(line: &str) -> Option<(String, String)> {
    let rest = line.trim_start();
    let key_end = rest.find(|c: char| !is_key_char(c)).unwrap_or(rest.len());
    if key_end == 0 {
        return None;
    }
    let (key, tail) = rest.split_at(key_end);
    let value = tail.trim_start().strip_prefix('=')?;
    Some((key.to_string(), normalize_value(value.trim_start())))
}

/// Normalize a raw value: expand `\n` escapes inside a fully double-quoted
/// value, strip one leading and one trailing quote character (each
/// independently), then trim surrounding whitespace.
fn normalize_value(raw: &str) -> String {
    let expanded;
    let mut value = raw;

    if value.starts_with('"') && value.ends_with('"') {
        expanded = value.replace("\\n", "\n");
        value = &expanded;
    }

    let value = value.strip_prefix(['\'', '"']).unwrap_or(value);
    let value = value.strip_suffix(['\'', '"']).unwrap_or(value);
    value.trim().to_string()
}

/// Parse full `.env` text into a key/value mapping.
///
/// Unrecognized lines are ignored; later duplicate keys win.
pub fn parse_str(text: &str) -> BTreeMap<String, String> {
    let mut entries = BTreeMap::new();
    for line in text.split('\n') {
        if let Some((key, value)) = parse_line(line) {
            entries.insert(key, value);
        }
    }
    entries
}

/// Render the canonical on-disk form of an entry.
///
/// Values are always written double-quoted regardless of how they were
/// quoted when read; embedded newlines are escaped back to `\n` so the
/// entry stays on one line.
pub(crate) fn format_line(key: &str, value: &str) -> String {
    format!("{key}=\"{}\"", value.replace('\n', "\\n"))
}
