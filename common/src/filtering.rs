//! Property-style text substitution for filtered resources.
//!
//! A [`SubstitutionTable`] replaces `${key}` and `@key@` tokens whose key is
//! present in the table. Unknown keys are left verbatim so that files which
//! happen to contain `${...}` runtime placeholders survive filtering.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

/// Key/value table applied to filtered resources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstitutionTable {
    values: BTreeMap<String, String>,
}

impl SubstitutionTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Inserts a value only when `key` is not already present.
    pub fn insert_default(&mut self, key: &str, value: impl Into<String>) {
        self.values
            .entry(key.to_owned())
            .or_insert_with(|| value.into());
    }

    /// Looks up a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns true when the table holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Substitutes every known token in a single line.
    ///
    /// # Examples
    ///
    /// ```
    /// use ampkit_common::filtering::SubstitutionTable;
    ///
    /// let mut table = SubstitutionTable::new();
    /// table.insert("project.version", "1.2.0");
    /// assert_eq!(
    ///     table.substitute_line("module.version=${project.version}"),
    ///     "module.version=1.2.0"
    /// );
    /// assert_eq!(table.substitute_line("v=@project.version@"), "v=1.2.0");
    /// assert_eq!(table.substitute_line("${unknown}"), "${unknown}");
    /// ```
    #[must_use]
    pub fn substitute_line<'a>(&self, line: &'a str) -> Cow<'a, str> {
        if self.values.is_empty() || !(line.contains("${") || line.contains('@')) {
            return Cow::Borrowed(line);
        }

        let mut output = String::with_capacity(line.len());
        let mut rest = line;
        while let Some(start) = rest.find(['$', '@']) {
            let (before, candidate) = rest.split_at(start);
            output.push_str(before);
            match self.expand_token(candidate) {
                Some((value, consumed)) => {
                    output.push_str(value);
                    rest = candidate.get(consumed..).unwrap_or_default();
                }
                None => {
                    let marker_len = candidate.chars().next().map_or(1, char::len_utf8);
                    output.push_str(candidate.get(..marker_len).unwrap_or_default());
                    rest = candidate.get(marker_len..).unwrap_or_default();
                }
            }
        }
        output.push_str(rest);
        Cow::Owned(output)
    }

    /// Tries to expand a token at the start of `candidate`, returning the
    /// replacement and the number of bytes consumed.
    fn expand_token(&self, candidate: &str) -> Option<(&str, usize)> {
        if let Some(body) = candidate.strip_prefix("${") {
            let end = body.find('}')?;
            let key = body.get(..end)?;
            let value = self.get(key)?;
            return Some((value, end + 3));
        }

        let body = candidate.strip_prefix('@')?;
        let end = body.find('@')?;
        let key = body.get(..end)?;
        if key.is_empty() || key.chars().any(char::is_whitespace) {
            return None;
        }
        let value = self.get(key)?;
        Some((value, end + 2))
    }

    /// Substitutes tokens across a whole text, preserving line endings.
    #[must_use]
    pub fn substitute_text(&self, text: &str) -> String {
        text.split_inclusive('\n')
            .map(|line| self.substitute_line(line))
            .collect()
    }
}

impl<K, V> FromIterator<(K, V)> for SubstitutionTable
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

/// Copies `source` to `destination`, substituting tokens when the content is
/// UTF-8 text. Non-text content is copied byte for byte.
///
/// # Errors
///
/// Returns an I/O error when the source cannot be read or the destination
/// cannot be written.
pub fn filter_file(source: &Path, destination: &Path, table: &SubstitutionTable) -> io::Result<()> {
    let bytes = fs::read(source)?;
    match String::from_utf8(bytes) {
        Ok(text) => fs::write(destination, table.substitute_text(&text)),
        Err(raw) => {
            log::debug!("{} is not UTF-8 text; copying unfiltered", source.display());
            fs::write(destination, raw.into_bytes())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn table() -> SubstitutionTable {
        [
            ("project.artifactId", "records-module"),
            ("project.version", "2.1.0-SNAPSHOT"),
        ]
        .into_iter()
        .collect()
    }

    #[rstest]
    #[case::dollar("id=${project.artifactId}", "id=records-module")]
    #[case::at("id=@project.artifactId@", "id=records-module")]
    #[case::two_tokens(
        "${project.artifactId}:${project.version}",
        "records-module:2.1.0-SNAPSHOT"
    )]
    #[case::unknown_dollar("x=${other}", "x=${other}")]
    #[case::email("mail admin@example.com", "mail admin@example.com")]
    #[case::unterminated("x=${project.version", "x=${project.version")]
    #[case::lone_dollar("cost $5", "cost $5")]
    fn substitutes_known_tokens(
        table: SubstitutionTable,
        #[case] line: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(table.substitute_line(line), expected);
    }

    #[test]
    fn empty_table_round_trips_content() {
        let text = "a=${b}\r\nc=@d@\n\nno newline at end";
        assert_eq!(SubstitutionTable::new().substitute_text(text), text);
    }

    #[rstest]
    fn substitute_text_preserves_line_endings(table: SubstitutionTable) {
        let text = "v=${project.version}\r\nplain\n";
        assert_eq!(table.substitute_text(text), "v=2.1.0-SNAPSHOT\r\nplain\n");
    }

    #[test]
    fn insert_default_keeps_existing_value() {
        let mut table = SubstitutionTable::new();
        table.insert("project.name", "Custom");
        table.insert_default("project.name", "Fallback");
        assert_eq!(table.get("project.name"), Some("Custom"));
    }

    #[rstest]
    fn filter_file_copies_binary_content_verbatim(table: SubstitutionTable) {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = dir.path().join("logo.png");
        let destination = dir.path().join("out.png");
        let bytes = [0x89_u8, b'P', b'N', b'G', 0xff, b'$', b'{'];
        fs::write(&source, bytes).expect("write source");

        filter_file(&source, &destination, &table).expect("filter succeeds");

        assert_eq!(fs::read(&destination).expect("read"), bytes);
    }

    #[rstest]
    fn filter_file_fails_for_missing_source(table: SubstitutionTable) {
        let dir = tempfile::tempdir().expect("temp dir");
        let result = filter_file(
            &dir.path().join("missing.properties"),
            &dir.path().join("out.properties"),
            &table,
        );
        assert!(result.is_err());
    }
}
