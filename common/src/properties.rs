//! Minimal reader for Java-style `.properties` files.
//!
//! Module archives carry their identity in `module.properties` and an
//! optional install-time layout in `file-mapping.properties`. Only the subset
//! of the format those files use is supported: `key=value` / `key: value`
//! pairs, `#` and `!` comments, and backslash line continuations.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

/// Parses properties text into an ordered map. Later keys override earlier
/// ones.
///
/// # Examples
///
/// ```
/// use ampkit_common::properties::parse_properties;
///
/// let props = parse_properties("# comment\nmodule.id=records\nmodule.version : 1.0\n");
/// assert_eq!(props.get("module.id").map(String::as_str), Some("records"));
/// assert_eq!(props.get("module.version").map(String::as_str), Some("1.0"));
/// ```
#[must_use]
pub fn parse_properties(text: &str) -> BTreeMap<String, String> {
    let mut properties = BTreeMap::new();
    let mut pending = String::new();

    for raw_line in text.lines() {
        let line = raw_line.trim_start();
        if pending.is_empty() && (line.is_empty() || line.starts_with('#') || line.starts_with('!'))
        {
            continue;
        }

        if let Some(continued) = line.strip_suffix('\\') {
            pending.push_str(continued);
            continue;
        }
        pending.push_str(line);

        if let Some((key, value)) = split_pair(&pending) {
            properties.insert(key, value);
        }
        pending.clear();
    }

    if let Some((key, value)) = split_pair(&pending) {
        properties.insert(key, value);
    }
    properties
}

/// Reads and parses a properties file.
///
/// # Errors
///
/// Returns the I/O error raised while reading `path`.
pub fn read_properties(path: &Path) -> io::Result<BTreeMap<String, String>> {
    let text = fs::read_to_string(path)?;
    Ok(parse_properties(&text))
}

fn split_pair(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let separator = line.find(['=', ':']);
    let whitespace = line.find(char::is_whitespace);
    let split_at = match (separator, whitespace) {
        (Some(sep), Some(ws)) if ws < sep && line.get(ws..sep)?.trim().is_empty() => sep,
        (Some(sep), Some(ws)) => sep.min(ws),
        (Some(sep), None) => sep,
        (None, Some(ws)) => ws,
        (None, None) => return Some((line.to_owned(), String::new())),
    };
    let key = line.get(..split_at)?.trim_end();
    let mut value = line.get(split_at..)?.trim_start();
    if let Some(stripped) = value.strip_prefix(['=', ':']) {
        value = stripped.trim_start();
    }
    Some((key.to_owned(), value.to_owned()))
}
