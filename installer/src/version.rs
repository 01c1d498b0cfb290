//! Version normalisation and metadata patching.
//!
//! Development versions such as `2.1.0-SNAPSHOT` are not accepted by the
//! target runtime, so the marker is cut off and an optional qualifier is
//! appended. The normalised version then replaces the raw version inside the
//! staged module metadata before packaging.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use ampkit_common::{Clock, ProjectConfig, VersionConfig};

/// Normalises a development version.
///
/// The raw version is truncated at the first occurrence of
/// `snapshot_marker` (an empty marker truncates nothing). A non-empty
/// `custom_suffix` is then appended as `.<suffix>`; otherwise, when
/// `use_timestamp` is set, `.<epoch millis>` from `clock` is appended.
///
/// # Examples
///
/// ```
/// use ampkit_common::FixedClock;
/// use ampkit_installer::version::normalize;
///
/// let clock = FixedClock::new(1_700_000_000_000);
/// assert_eq!(normalize("2.1.0-SNAPSHOT", "-SNAPSHOT", "", false, &clock), "2.1.0");
/// assert_eq!(normalize("2.1.0-SNAPSHOT", "-SNAPSHOT", "7", false, &clock), "2.1.0.7");
/// assert_eq!(
///     normalize("2.1.0-SNAPSHOT", "-SNAPSHOT", "", true, &clock),
///     "2.1.0.1700000000000"
/// );
/// ```
#[must_use]
pub fn normalize(
    raw_version: &str,
    snapshot_marker: &str,
    custom_suffix: &str,
    use_timestamp: bool,
    clock: &dyn Clock,
) -> String {
    let truncated = if snapshot_marker.is_empty() {
        raw_version
    } else {
        raw_version
            .find(snapshot_marker)
            .and_then(|index| raw_version.get(..index))
            .unwrap_or(raw_version)
    };

    if !custom_suffix.is_empty() {
        format!("{truncated}.{custom_suffix}")
    } else if use_timestamp {
        format!("{truncated}.{}", clock.now_millis())
    } else {
        truncated.to_owned()
    }
}

/// Normalises `raw_version` using the settings of a [`VersionConfig`].
#[must_use]
pub fn normalize_with(raw_version: &str, config: &VersionConfig, clock: &dyn Clock) -> String {
    normalize(
        raw_version,
        &config.snapshot_marker,
        &config.custom_suffix,
        config.use_timestamp,
        clock,
    )
}

/// The identity of the module being assembled.
///
/// The normalised version is derived once at construction and never
/// recomputed, so every consumer sees the same timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleIdentity {
    artifact_id: String,
    raw_version: String,
    normalized_version: String,
}

impl ModuleIdentity {
    /// Builds an identity from explicit parts.
    #[must_use]
    pub fn new(
        artifact_id: impl Into<String>,
        raw_version: impl Into<String>,
        normalized_version: impl Into<String>,
    ) -> Self {
        Self {
            artifact_id: artifact_id.into(),
            raw_version: raw_version.into(),
            normalized_version: normalized_version.into(),
        }
    }

    /// Resolves the identity of the configured module.
    #[must_use]
    pub fn resolve(config: &ProjectConfig, clock: &dyn Clock) -> Self {
        let raw = config.module.version.trim();
        Self::new(
            config.module.artifact_id.trim(),
            raw,
            normalize_with(raw, &config.version, clock),
        )
    }

    /// Module artifact identifier.
    #[must_use]
    pub fn artifact_id(&self) -> &str {
        &self.artifact_id
    }

    /// Version as declared by the project.
    #[must_use]
    pub fn raw_version(&self) -> &str {
        &self.raw_version
    }

    /// Deployment-safe version.
    #[must_use]
    pub fn normalized_version(&self) -> &str {
        &self.normalized_version
    }
}

/// Replaces every occurrence of `raw_version` in the file at `path` with
/// `normalized_version`, returning whether the file changed.
///
/// The file is streamed line by line into a temporary sibling that is then
/// renamed over the original, so a failure leaves the original untouched.
/// Nothing is rewritten when the versions are equal or no line matches.
///
/// # Errors
///
/// Returns the I/O error raised while reading, writing or renaming.
pub fn patch_metadata_version(
    path: &Path,
    raw_version: &str,
    normalized_version: &str,
) -> io::Result<bool> {
    if raw_version.is_empty() || raw_version == normalized_version {
        return Ok(false);
    }

    let parent = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut reader = BufReader::new(File::open(path)?);
    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    let mut changed = false;
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        if line.contains(raw_version) {
            changed = true;
            temp.write_all(line.replace(raw_version, normalized_version).as_bytes())?;
        } else {
            temp.write_all(line.as_bytes())?;
        }
    }

    if !changed {
        return Ok(false);
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|err| err.error)?;
    log::debug!(
        "patched {} from {raw_version} to {normalized_version}",
        path.display()
    );
    Ok(true)
}
