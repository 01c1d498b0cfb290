//! Mapping from module-archive areas onto deployment-target paths.
//!
//! Each entry maps an archive path prefix onto a target prefix. The longest
//! matching prefix wins, and only whole path segments match, so `/web/css`
//! never captures `web/cssx/a.css`.

use std::collections::BTreeMap;

/// Property that disables the default entries when set to `false`.
pub const INCLUDE_DEFAULT_KEY: &str = "include.default";

/// Entries applied unless an archive opts out.
pub const DEFAULT_MAPPING: &[(&str, &str)] = &[
    ("/config", "/WEB-INF/classes"),
    ("/lib", "/WEB-INF/lib"),
    ("/licenses", "/WEB-INF/licenses"),
    ("/web/jsp", "/jsp"),
    ("/web/css", "/css"),
    ("/web/images", "/images"),
    ("/web/scripts", "/scripts"),
    ("/web/php", "/php"),
];

/// A resolved archive-to-target mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMapping {
    entries: BTreeMap<String, String>,
}

impl Default for FileMapping {
    fn default() -> Self {
        Self {
            entries: DEFAULT_MAPPING
                .iter()
                .map(|(from, to)| (trim_slashes(from), trim_slashes(to)))
                .collect(),
        }
    }
}

impl FileMapping {
    /// Builds the mapping for an archive carrying `properties` from its own
    /// `file-mapping.properties`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::collections::BTreeMap;
    /// use ampkit_installer::overlay::mapping::FileMapping;
    ///
    /// let mut props = BTreeMap::new();
    /// props.insert("/web".to_owned(), "/".to_owned());
    /// let mapping = FileMapping::from_properties(&props);
    ///
    /// assert_eq!(mapping.map("web/index.html").as_deref(), Some("index.html"));
    /// assert_eq!(mapping.map("web/css/site.css").as_deref(), Some("css/site.css"));
    /// ```
    #[must_use]
    pub fn from_properties(properties: &BTreeMap<String, String>) -> Self {
        let keep_defaults = properties
            .get(INCLUDE_DEFAULT_KEY)
            .is_none_or(|value| !value.trim().eq_ignore_ascii_case("false"));
        let mut mapping = if keep_defaults {
            Self::default()
        } else {
            Self {
                entries: BTreeMap::new(),
            }
        };
        for (from, to) in properties {
            if from == INCLUDE_DEFAULT_KEY {
                continue;
            }
            mapping.entries.insert(trim_slashes(from), trim_slashes(to));
        }
        mapping
    }

    /// Maps an archive path onto a target path, or `None` when no entry
    /// covers it.
    #[must_use]
    pub fn map(&self, archive_path: &str) -> Option<String> {
        let (prefix, destination) = self
            .entries
            .iter()
            .filter(|(prefix, _)| covers(prefix, archive_path))
            .max_by_key(|(prefix, _)| prefix.len())?;
        let rest = archive_path
            .get(prefix.len()..)
            .unwrap_or_default()
            .trim_start_matches('/');
        Some(match (destination.is_empty(), rest.is_empty()) {
            (true, _) => rest.to_owned(),
            (false, true) => destination.clone(),
            (false, false) => format!("{destination}/{rest}"),
        })
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the mapping has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn covers(prefix: &str, path: &str) -> bool {
    prefix.is_empty()
        || path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn trim_slashes(raw: &str) -> String {
    raw.trim().replace('\\', "/").trim_matches('/').to_owned()
}
