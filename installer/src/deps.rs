//! Dependency selection for bundling and install.
//!
//! The host build tool resolves dependencies and hands over a JSON manifest
//! of [`DependencyDescriptor`]s. Assembly bundles the runtime-reachable
//! library dependencies into the archive's `lib/` area; install picks the
//! runtime dependencies that are themselves module archives.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use ampkit_common::CollisionPolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Dependency scope as reported by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Needed to compile and run.
    Compile,
    /// Needed only at run time.
    Runtime,
    /// Supplied by the container.
    Provided,
    /// Needed only by tests.
    Test,
    /// Supplied from an explicit local path.
    System,
    /// Imported dependency management.
    Import,
}

impl Scope {
    /// Returns true when the dependency is on the deployed runtime classpath.
    #[must_use]
    pub fn is_runtime_reachable(self) -> bool {
        matches!(self, Self::Compile | Self::Runtime)
    }
}

/// A resolved dependency, read-only input from the host build tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyDescriptor {
    /// Coordinates or other stable identifier.
    pub id: String,
    /// Location of the resolved artifact file.
    pub file: PathBuf,
    /// Resolution scope.
    pub scope: Scope,
    /// Declared artifact type, e.g. `jar` or `amp`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Optional dependencies are never bundled.
    #[serde(default)]
    pub optional: bool,
}

impl DependencyDescriptor {
    /// File name used for the bundled copy.
    #[must_use]
    pub fn file_name(&self) -> Option<String> {
        self.file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }
}

/// Errors raised while reading the manifest or planning `lib/`.
#[derive(Debug, Error)]
pub enum DependencyError {
    /// The manifest could not be read.
    #[error("cannot read dependency manifest {path}: {source}")]
    ReadManifest {
        /// Manifest path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The manifest is not a JSON array of descriptors.
    #[error("invalid dependency manifest {path}: {source}")]
    ParseManifest {
        /// Manifest path.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A dependency path has no file name component.
    #[error("dependency {id} has no file name: {}", .path.display())]
    MissingFileName {
        /// Dependency identifier.
        id: String,
        /// Offending path.
        path: PathBuf,
    },

    /// Two selected dependencies share a file name under the `fail` policy.
    #[error("dependencies {first} and {second} both bundle lib/{file_name}")]
    Collision {
        /// Shared file name.
        file_name: String,
        /// Dependency resolved first.
        first: String,
        /// Dependency resolved second.
        second: String,
    },
}

/// Result type alias using [`DependencyError`].
pub type Result<T> = std::result::Result<T, DependencyError>;

/// Loads a dependency manifest.
///
/// Relative artifact paths resolve against the manifest's directory.
///
/// # Errors
///
/// Returns [`DependencyError::ReadManifest`] or
/// [`DependencyError::ParseManifest`].
pub fn load_manifest(path: &Path) -> Result<Vec<DependencyDescriptor>> {
    let text = fs::read_to_string(path).map_err(|source| DependencyError::ReadManifest {
        path: path.to_path_buf(),
        source,
    })?;
    let mut descriptors: Vec<DependencyDescriptor> =
        serde_json::from_str(&text).map_err(|source| DependencyError::ParseManifest {
            path: path.to_path_buf(),
            source,
        })?;

    if let Some(base) = path.parent() {
        for descriptor in &mut descriptors {
            if descriptor.file.is_relative() {
                descriptor.file = base.join(&descriptor.file);
            }
        }
    }
    Ok(descriptors)
}

/// Selects the dependencies to bundle, preserving resolver order.
///
/// Optional dependencies are always excluded. When `runtime_scope_only` is
/// set, only runtime-reachable scopes survive. The artifact type must be one
/// of `allowed_types`.
///
/// # Examples
///
/// ```
/// use ampkit_installer::deps::{DependencyDescriptor, Scope, select};
///
/// let dep = |id: &str, scope, kind: &str, optional| DependencyDescriptor {
///     id: id.to_owned(),
///     file: format!("/repo/{id}.{kind}").into(),
///     scope,
///     kind: kind.to_owned(),
///     optional,
/// };
/// let deps = vec![
///     dep("core", Scope::Compile, "jar", false),
///     dep("servlet", Scope::Provided, "jar", false),
///     dep("extra", Scope::Runtime, "jar", true),
///     dep("share", Scope::Runtime, "amp", false),
/// ];
///
/// let allowed = vec!["jar".to_owned()];
/// let selected = select(&deps, &allowed, true);
/// let ids: Vec<_> = selected.iter().map(|d| d.id.as_str()).collect();
/// assert_eq!(ids, ["core"]);
/// ```
#[must_use]
pub fn select<'a>(
    dependencies: &'a [DependencyDescriptor],
    allowed_types: &[String],
    runtime_scope_only: bool,
) -> Vec<&'a DependencyDescriptor> {
    dependencies
        .iter()
        .filter(|dep| !dep.optional)
        .filter(|dep| !runtime_scope_only || dep.scope.is_runtime_reachable())
        .filter(|dep| allowed_types.iter().any(|kind| *kind == dep.kind))
        .collect()
}

/// Returns the runtime dependencies whose type marks a module archive.
#[must_use]
pub fn module_archives<'a>(
    dependencies: &'a [DependencyDescriptor],
    archive_type: &str,
) -> Vec<&'a DependencyDescriptor> {
    dependencies
        .iter()
        .filter(|dep| dep.scope.is_runtime_reachable() && dep.kind == archive_type)
        .collect()
}

/// A dependency placed into `lib/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryEntry {
    /// File name inside `lib/`.
    pub file_name: String,
    /// Artifact file to copy.
    pub source: PathBuf,
    /// Dependency identifier.
    pub id: String,
}

/// Maps selected dependencies onto `lib/` file names, applying `policy` to
/// name collisions. The result is sorted by file name.
///
/// # Errors
///
/// Returns [`DependencyError::MissingFileName`] for a path without a file
/// name and [`DependencyError::Collision`] under [`CollisionPolicy::Fail`].
pub fn plan_libraries(
    selected: &[&DependencyDescriptor],
    policy: CollisionPolicy,
) -> Result<Vec<LibraryEntry>> {
    let mut by_name: BTreeMap<String, LibraryEntry> = BTreeMap::new();

    for dep in selected {
        let file_name = dep
            .file_name()
            .ok_or_else(|| DependencyError::MissingFileName {
                id: dep.id.clone(),
                path: dep.file.clone(),
            })?;

        if let Some(previous) = by_name.get(&file_name) {
            match policy {
                CollisionPolicy::Fail => {
                    return Err(DependencyError::Collision {
                        file_name,
                        first: previous.id.clone(),
                        second: dep.id.clone(),
                    });
                }
                CollisionPolicy::LastWins => {
                    log::warn!(
                        "lib/{file_name} from {} replaces the copy from {}",
                        dep.id,
                        previous.id
                    );
                }
            }
        }

        by_name.insert(
            file_name.clone(),
            LibraryEntry {
                file_name,
                source: dep.file.clone(),
                id: dep.id.clone(),
            },
        );
    }

    Ok(by_name.into_values().collect())
}

#[cfg(test)]
#[path = "deps_tests.rs"]
mod tests;
