//! Project configuration loaded from `ampkit.toml`.
//!
//! A single TOML file describes the module identity, the source layout,
//! version normalisation, dependency bundling, and overlay-install defaults.
//! Every section falls back to conventional defaults, so a minimal file only
//! needs the module identity:
//!
//! ```toml
//! [module]
//! artifact_id = "records-module"
//! version = "2.1.0-SNAPSHOT"
//! ```
//!
//! The loaded value is treated as an immutable snapshot: command-line
//! overrides are applied once, then the struct is passed explicitly to each
//! component.

use std::collections::BTreeMap;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use thiserror::Error;

/// Default file name looked up in the project base directory.
pub const DEFAULT_CONFIG_FILE: &str = "ampkit.toml";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read configuration file {path}: {source}")]
    Read {
        /// Path of the unreadable file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for this schema.
    #[error("invalid configuration in {origin}: {source}")]
    Parse {
        /// File path, or `<inline>` for in-memory text.
        origin: String,
        /// Underlying TOML error.
        #[source]
        source: Box<toml::de::Error>,
    },

    /// A required field is missing or blank.
    #[error("missing required configuration field `{field}`")]
    MissingField {
        /// Dotted field name, e.g. `module.artifact_id`.
        field: &'static str,
    },
}

/// Root of the project configuration.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Module identity.
    pub module: ModuleConfig,
    /// Version normalisation settings.
    pub version: VersionConfig,
    /// Source directory layout and conventional resource rules.
    pub layout: LayoutConfig,
    /// Additional resource rules evaluated after the conventional ones.
    pub resources: Vec<RuleConfig>,
    /// Substitution table for filtered resources.
    pub properties: BTreeMap<String, String>,
    /// Dependency bundling settings.
    pub dependencies: DependencyConfig,
    /// Overlay-install settings.
    pub install: InstallConfig,
}

impl ProjectConfig {
    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the text does not match the schema.
    ///
    /// # Examples
    ///
    /// ```
    /// use ampkit_common::config::ProjectConfig;
    ///
    /// let config = ProjectConfig::from_toml_str(
    ///     "[module]\nartifact_id = \"records\"\nversion = \"1.0-SNAPSHOT\"\n",
    /// )
    /// .unwrap();
    /// assert_eq!(config.final_name(), "records-1.0-SNAPSHOT");
    /// assert_eq!(config.version.snapshot_marker, "-SNAPSHOT");
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Self::parse_with_origin(text, "<inline>")
    }

    /// Reads and parses the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read and
    /// [`ConfigError::Parse`] when it is malformed.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::parse_with_origin(&text, path.as_str())
    }

    fn parse_with_origin(text: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            origin: origin.to_owned(),
            source: Box::new(source),
        })
    }

    /// Checks the fields that assembly cannot proceed without.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] naming the first blank field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.module.artifact_id.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "module.artifact_id",
            });
        }
        if self.module.version.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "module.version",
            });
        }
        Ok(())
    }

    /// Returns the archive base name, defaulting to `<artifact_id>-<version>`.
    #[must_use]
    pub fn final_name(&self) -> String {
        self.module
            .final_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("{}-{}", self.module.artifact_id, self.module.version))
    }

    /// Resolves a layout path against the base directory.
    #[must_use]
    pub fn resolve(&self, path: &Utf8Path) -> Utf8PathBuf {
        if path.is_absolute() {
            path.to_owned()
        } else {
            self.layout.base_dir.join(path)
        }
    }

    /// Returns the absolute build directory.
    #[must_use]
    pub fn build_dir(&self) -> Utf8PathBuf {
        self.resolve(&self.layout.build_dir)
    }

    /// Returns the directory receiving the finished archive.
    #[must_use]
    pub fn output_dir(&self) -> Utf8PathBuf {
        self.layout
            .output_dir
            .as_deref()
            .map_or_else(|| self.build_dir(), |dir| self.resolve(dir))
    }
}

/// Module identity fields.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ModuleConfig {
    /// Module artifact identifier; also the module-scoped config segment.
    pub artifact_id: String,
    /// Raw development version.
    pub version: String,
    /// Human-readable module name.
    pub name: Option<String>,
    /// Module description.
    pub description: Option<String>,
    /// Archive base name override.
    pub final_name: Option<String>,
    /// Optional classifier appended to archive names.
    pub classifier: Option<String>,
}

/// Version normalisation settings.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct VersionConfig {
    /// Literal marker truncated from development versions.
    pub snapshot_marker: String,
    /// Suffix appended as `.<suffix>`; wins over the timestamp.
    pub custom_suffix: String,
    /// Append `.<epoch millis>` when no custom suffix is set.
    pub use_timestamp: bool,
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            snapshot_marker: "-SNAPSHOT".to_owned(),
            custom_suffix: String::new(),
            use_timestamp: false,
        }
    }
}

/// Source layout and conventional rule settings.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    /// Project base directory; relative layout paths resolve against it.
    pub base_dir: Utf8PathBuf,
    /// Build directory holding staging.
    pub build_dir: Utf8PathBuf,
    /// Archive output directory; defaults to the build directory.
    pub output_dir: Option<Utf8PathBuf>,
    /// Compiled classes packed into the module jar, when present.
    pub classes_directory: Option<Utf8PathBuf>,
    /// Directory holding `module.properties` and `file-mapping.properties`.
    pub metadata_dir: Utf8PathBuf,
    /// Module configuration directory.
    pub config_dir: Utf8PathBuf,
    /// Comma-separated includes for the configuration directory.
    pub config_includes: Option<String>,
    /// Comma-separated excludes for the configuration directory.
    pub config_excludes: Option<String>,
    /// Configuration files that receive property substitution.
    pub config_filtered_includes: String,
    /// Splice `<artifact_id>` into the configuration target path.
    pub module_scoped_config: bool,
    /// Well-known classpath resources directory.
    pub resources_dir: Utf8PathBuf,
    /// Comma-separated includes for the resources directory.
    pub resource_includes: Option<String>,
    /// Comma-separated excludes for the resources directory.
    pub resource_excludes: Option<String>,
    /// Web assets directory.
    pub webapp_dir: Utf8PathBuf,
    /// Comma-separated includes for the web assets directory.
    pub webapp_includes: Option<String>,
    /// Comma-separated excludes for the web assets directory.
    pub webapp_excludes: Option<String>,
    /// Apply the SCM/editor default excludes to conventional rules.
    pub default_excludes: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            base_dir: Utf8PathBuf::from("."),
            build_dir: Utf8PathBuf::from("target"),
            output_dir: None,
            classes_directory: None,
            metadata_dir: Utf8PathBuf::from("."),
            config_dir: Utf8PathBuf::from("src/main/config"),
            config_includes: None,
            config_excludes: None,
            config_filtered_includes: "**/*.properties,**/*.xml,**/*.txt,**/*.ftl,**/*.json"
                .to_owned(),
            module_scoped_config: true,
            resources_dir: Utf8PathBuf::from("src/main/resources"),
            resource_includes: Some("alfresco/extension/**,alfresco/web-extension/**".to_owned()),
            resource_excludes: None,
            webapp_dir: Utf8PathBuf::from("src/main/webapp"),
            webapp_includes: None,
            webapp_excludes: None,
            default_excludes: true,
        }
    }
}

/// A free-form resource rule.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RuleConfig {
    /// Source directory, relative to the base directory.
    pub directory: Utf8PathBuf,
    /// Comma-separated includes; absent means everything.
    pub includes: Option<String>,
    /// Comma-separated excludes; absent means nothing.
    pub excludes: Option<String>,
    /// Apply property substitution while copying.
    pub filtered: bool,
    /// Target path inside staging.
    pub target_path: String,
    /// Splice `<artifact_id>` after the target path.
    pub module_scoped: bool,
    /// Apply the SCM/editor default excludes.
    pub default_excludes: bool,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            directory: Utf8PathBuf::from("."),
            includes: None,
            excludes: None,
            filtered: false,
            target_path: String::new(),
            module_scoped: false,
            default_excludes: true,
        }
    }
}

/// What to do when two bundled dependencies share a file name.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CollisionPolicy {
    /// Keep the dependency resolved last and warn.
    #[default]
    LastWins,
    /// Abort assembly.
    Fail,
}

/// Dependency bundling settings.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DependencyConfig {
    /// Bundle runtime dependencies into `lib/`.
    pub include: bool,
    /// Artifact types eligible for bundling.
    pub allowed_types: Vec<String>,
    /// File-name collision handling.
    pub on_collision: CollisionPolicy,
    /// Resolved-dependency manifest supplied by the host build tool.
    pub manifest: Option<Utf8PathBuf>,
}

impl Default for DependencyConfig {
    fn default() -> Self {
        Self {
            include: true,
            allowed_types: ["jar", "ejb", "ejb-client", "test-jar"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            on_collision: CollisionPolicy::LastWins,
            manifest: None,
        }
    }
}

/// Overlay-install settings.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct InstallConfig {
    /// Deployment target: an exploded directory or a packed archive.
    pub target: Option<Utf8PathBuf>,
    /// One extra archive to install alongside the dependency archives.
    pub single_archive: Option<Utf8PathBuf>,
    /// Overwrite files the engine did not install.
    pub force: bool,
    /// Keep a copy of each overwritten file.
    pub backup: bool,
    /// Suffix appended to backup copies.
    pub backup_suffix: String,
    /// Plan without touching the target.
    pub preview: bool,
    /// Dependency type that marks a module archive.
    pub archive_type: String,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            target: None,
            single_archive: None,
            force: true,
            backup: false,
            backup_suffix: ".bak".to_owned(),
            preview: false,
            archive_type: "amp".to_owned(),
        }
    }
}
