//! Archive naming policy.
//!
//! Module archives are named `<final_name>[-<classifier>].amp`; the module
//! jar packed from compiled classes follows the same pattern with a `.jar`
//! extension.

use std::fmt;

/// Extension used for module archives.
pub const MODULE_ARCHIVE_EXTENSION: &str = "amp";

/// Extension used for the module jar.
pub const MODULE_JAR_EXTENSION: &str = "jar";

/// A deterministic archive file name.
///
/// # Examples
///
/// ```
/// use ampkit_installer::archive::naming::ArchiveName;
///
/// let plain = ArchiveName::module("records-2.1.0", None);
/// assert_eq!(plain.to_string(), "records-2.1.0.amp");
///
/// let classified = ArchiveName::module("records-2.1.0", Some("community"));
/// assert_eq!(classified.to_string(), "records-2.1.0-community.amp");
///
/// let dashed = ArchiveName::module_jar("records-2.1.0", Some("-community"));
/// assert_eq!(dashed.to_string(), "records-2.1.0-community.jar");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveName {
    base: String,
    classifier: Option<String>,
    extension: &'static str,
}

impl ArchiveName {
    /// Name of the module archive.
    #[must_use]
    pub fn module(final_name: &str, classifier: Option<&str>) -> Self {
        Self::new(final_name, classifier, MODULE_ARCHIVE_EXTENSION)
    }

    /// Name of the jar packed from compiled classes.
    #[must_use]
    pub fn module_jar(final_name: &str, classifier: Option<&str>) -> Self {
        Self::new(final_name, classifier, MODULE_JAR_EXTENSION)
    }

    fn new(final_name: &str, classifier: Option<&str>, extension: &'static str) -> Self {
        let classifier = classifier
            .map(str::trim)
            .map(|value| value.strip_prefix('-').unwrap_or(value))
            .filter(|value| !value.is_empty())
            .map(str::to_owned);
        Self {
            base: final_name.to_owned(),
            classifier,
            extension,
        }
    }

    /// Returns the classifier without its leading dash.
    #[must_use]
    pub fn classifier(&self) -> Option<&str> {
        self.classifier.as_deref()
    }

    /// Return the filename as a string without consuming the value.
    #[must_use]
    pub fn filename(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ArchiveName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.classifier {
            Some(classifier) => write!(f, "{}-{classifier}.{}", self.base, self.extension),
            None => write!(f, "{}.{}", self.base, self.extension),
        }
    }
}
