//! Ant-style include/exclude pattern sets.
//!
//! Patterns arrive as comma-separated tokens (`"**/*.xml, alfresco/extension/"`)
//! and are matched against `/`-separated paths relative to a source
//! directory. `*` and `?` never cross a `/`; `**` spans any number of path
//! segments, including none. A token ending in `/` selects everything below
//! that directory.

use glob::{MatchOptions, Pattern};
use thiserror::Error;

/// Version-control and editor leftovers excluded unless a rule opts out.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "**/*~",
    "**/#*#",
    "**/.#*",
    "**/%*%",
    "**/._*",
    "**/CVS",
    "**/CVS/**",
    "**/.cvsignore",
    "**/.svn",
    "**/.svn/**",
    "**/.git",
    "**/.git/**",
    "**/.gitignore",
    "**/.gitattributes",
    "**/.hg",
    "**/.hg/**",
    "**/.DS_Store",
];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A glob token could not be compiled.
#[derive(Debug, Error)]
#[error("invalid pattern {token:?}: {source}")]
pub struct PatternError {
    /// The offending token after normalisation.
    pub token: String,
    /// Underlying glob compilation error.
    #[source]
    pub source: glob::PatternError,
}

/// Splits a comma-separated pattern list into trimmed, non-empty tokens.
///
/// # Examples
///
/// ```
/// use ampkit_common::patterns::split_tokens;
///
/// assert_eq!(split_tokens(" *.xml,, web/ "), vec!["*.xml", "web/"]);
/// assert!(split_tokens("").is_empty());
/// ```
#[must_use]
pub fn split_tokens(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Rewrites a token into the form the glob matcher understands.
fn normalise(token: &str) -> String {
    let mut normalised = token.replace('\\', "/");
    while let Some(stripped) = normalised.strip_prefix("./") {
        normalised = stripped.to_owned();
    }
    let mut normalised = normalised.trim_start_matches('/').to_owned();
    if normalised.ends_with('/') {
        normalised.push_str("**");
    }
    normalised
}

/// An ordered set of compiled glob patterns.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    tokens: Vec<String>,
    patterns: Vec<Pattern>,
}

impl PatternSet {
    /// Compiles every token into the set.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] for the first token that is not a valid glob.
    pub fn new<I, S>(tokens: I) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for token in tokens {
            set.push(token.as_ref())?;
        }
        Ok(set)
    }

    /// Parses a comma-separated list of tokens.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] when a token is not a valid glob.
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        Self::new(split_tokens(raw))
    }

    /// Returns the set of [`DEFAULT_EXCLUDES`].
    #[must_use]
    pub fn default_excludes() -> Self {
        let patterns = DEFAULT_EXCLUDES
            .iter()
            .filter_map(|token| Pattern::new(token).ok())
            .collect();
        Self {
            tokens: DEFAULT_EXCLUDES.iter().map(|token| (*token).to_owned()).collect(),
            patterns,
        }
    }

    /// Adds one token, skipping duplicates.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] when the token is not a valid glob.
    pub fn push(&mut self, token: &str) -> Result<(), PatternError> {
        let normalised = normalise(token.trim());
        if normalised.is_empty() || self.tokens.contains(&normalised) {
            return Ok(());
        }
        let pattern = Pattern::new(&normalised).map_err(|source| PatternError {
            token: normalised.clone(),
            source,
        })?;
        self.tokens.push(normalised);
        self.patterns.push(pattern);
        Ok(())
    }

    /// Appends every pattern of `other` not already present.
    pub fn extend_from(&mut self, other: &Self) {
        for (token, pattern) in other.tokens.iter().zip(&other.patterns) {
            if !self.tokens.contains(token) {
                self.tokens.push(token.clone());
                self.patterns.push(pattern.clone());
            }
        }
    }

    /// Returns true when the set holds no patterns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Returns the normalised tokens in insertion order.
    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Returns true when any pattern matches `relative_path`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ampkit_common::patterns::PatternSet;
    ///
    /// let set = PatternSet::parse("**/*.xml,alfresco/extension/").unwrap();
    /// assert!(set.matches("context.xml"));
    /// assert!(set.matches("alfresco/extension/a/b.txt"));
    /// assert!(!set.matches("alfresco/other.txt"));
    /// ```
    #[must_use]
    pub fn matches(&self, relative_path: &str) -> bool {
        let candidate = relative_path.replace('\\', "/");
        self.patterns
            .iter()
            .any(|pattern| pattern.matches_with(&candidate, MATCH_OPTIONS))
    }
}
