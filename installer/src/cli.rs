//! CLI argument definitions for the `ampkit` binary.
//!
//! This module defines the command-line interface using clap and the rules
//! for folding flags over the project configuration. It is separated from the
//! main entrypoint to keep the binary small and focused on orchestration.

use std::path::PathBuf;

use ampkit_common::{ConfigError, DEFAULT_CONFIG_FILE, ProjectConfig};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};

use crate::deps::{DependencyDescriptor, DependencyError, load_manifest};

/// Assemble module archives and overlay them onto deployments.
#[derive(Parser, Debug)]
#[command(name = "ampkit")]
#[command(version, about)]
#[command(long_about = concat!(
    "Assemble module archives and overlay them onto deployments.\n\n",
    "`ampkit assemble` packs a module's configuration, web assets, compiled ",
    "classes and runtime libraries into a versioned .amp archive. ",
    "`ampkit install` merges one or more archives onto an exploded or packed ",
    "web application, tracking what it wrote so repeated installs are safe.\n\n",
    "Settings are read from ampkit.toml in the current directory unless ",
    "--config names another file; flags override file values.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Assemble using ampkit.toml:\n",
    "    $ ampkit assemble\n\n",
    "  Assemble a release build with a build-number qualifier:\n",
    "    $ ampkit assemble --custom-suffix 42\n\n",
    "  Preview an install without touching the target:\n",
    "    $ ampkit install --target webapps/share --preview\n\n",
    "  Install, keeping backups of replaced files:\n",
    "    $ ampkit install --target share.war --archive target/records-1.0.amp --backup\n\n",
    "  Show what is installed:\n",
    "    $ ampkit list --target webapps/share\n",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Increase log verbosity (repeatable: -v, -vv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        global = true,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Build the module archive.
    Assemble(AssembleArgs),

    /// Overlay module archives onto a deployment target.
    Install(InstallArgs),

    /// Show the modules recorded for a deployment target.
    List(ListArgs),
}

/// Arguments for the assemble command.
#[derive(Args, Debug, Clone, Default)]
pub struct AssembleArgs {
    /// Project configuration file [default: ./ampkit.toml].
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Override `module.version`.
    #[arg(long = "version", value_name = "VERSION")]
    pub module_version: Option<String>,

    /// Append `.<SUFFIX>` to the normalised version.
    #[arg(long, value_name = "SUFFIX")]
    pub custom_suffix: Option<String>,

    /// Append the build timestamp to the normalised version.
    #[arg(long)]
    pub timestamp: bool,

    /// Archive classifier.
    #[arg(long, value_name = "CLASSIFIER")]
    pub classifier: Option<String>,

    /// Resolved-dependency manifest (JSON).
    #[arg(long, value_name = "FILE")]
    pub dependencies: Option<Utf8PathBuf>,

    /// Directory receiving the archive [default: build directory].
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<Utf8PathBuf>,

    /// Do not bundle dependencies into `lib/`.
    #[arg(long)]
    pub no_dependencies: bool,
}

impl AssembleArgs {
    /// Folds the flags over `config`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ampkit_common::ProjectConfig;
    /// use ampkit_installer::cli::AssembleArgs;
    ///
    /// let args = AssembleArgs {
    ///     custom_suffix: Some("42".to_owned()),
    ///     no_dependencies: true,
    ///     ..AssembleArgs::default()
    /// };
    /// let mut config = ProjectConfig::default();
    /// args.apply(&mut config);
    ///
    /// assert_eq!(config.version.custom_suffix, "42");
    /// assert!(!config.dependencies.include);
    /// ```
    pub fn apply(&self, config: &mut ProjectConfig) {
        if let Some(version) = &self.module_version {
            config.module.version.clone_from(version);
        }
        if let Some(suffix) = &self.custom_suffix {
            config.version.custom_suffix.clone_from(suffix);
        }
        if self.timestamp {
            config.version.use_timestamp = true;
        }
        if let Some(classifier) = &self.classifier {
            config.module.classifier = Some(classifier.clone());
        }
        if let Some(manifest) = &self.dependencies {
            config.dependencies.manifest = Some(manifest.clone());
        }
        if let Some(output_dir) = &self.output_dir {
            config.layout.output_dir = Some(output_dir.clone());
        }
        if self.no_dependencies {
            config.dependencies.include = false;
        }
    }
}

/// Arguments for the install command.
#[derive(Args, Debug, Clone, Default)]
pub struct InstallArgs {
    /// Project configuration file [default: ./ampkit.toml].
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Deployment target: an exploded directory or a packed archive.
    #[arg(short, long, value_name = "PATH")]
    pub target: Option<Utf8PathBuf>,

    /// Install this archive in addition to dependency archives.
    #[arg(short, long, value_name = "FILE")]
    pub archive: Option<Utf8PathBuf>,

    /// Resolved-dependency manifest (JSON).
    #[arg(long, value_name = "FILE")]
    pub dependencies: Option<Utf8PathBuf>,

    /// Overwrite files that ampkit did not install.
    #[arg(long, overrides_with = "no_force")]
    pub force: bool,

    /// Leave files that ampkit did not install untouched.
    #[arg(long, overrides_with = "force")]
    pub no_force: bool,

    /// Keep a copy of each overwritten file. An existing backup is never
    /// replaced, so it always holds the content from before the first
    /// overwrite.
    #[arg(long)]
    pub backup: bool,

    /// Report the plan without touching the target.
    #[arg(long)]
    pub preview: bool,

    /// Print the outcome as JSON on stdout.
    #[arg(long)]
    pub json: bool,
}

impl InstallArgs {
    /// Folds the flags over `config`.
    pub fn apply(&self, config: &mut ProjectConfig) {
        if let Some(target) = &self.target {
            config.install.target = Some(target.clone());
        }
        if let Some(archive) = &self.archive {
            config.install.single_archive = Some(archive.clone());
        }
        if let Some(manifest) = &self.dependencies {
            config.dependencies.manifest = Some(manifest.clone());
        }
        if self.force {
            config.install.force = true;
        } else if self.no_force {
            config.install.force = false;
        }
        if self.backup {
            config.install.backup = true;
        }
        if self.preview {
            config.install.preview = true;
        }
    }
}

/// Arguments for the list command.
#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Deployment target whose records are listed.
    #[arg(short, long, value_name = "PATH")]
    pub target: Utf8PathBuf,

    /// Output in JSON format for scripting.
    #[arg(long)]
    pub json: bool,
}

/// Loads the project configuration.
///
/// An explicit path must exist. Otherwise `ampkit.toml` in `cwd` is used
/// when present, falling back to the built-in defaults. A relative
/// `layout.base_dir` is resolved against the directory holding the file.
///
/// # Errors
///
/// Returns [`ConfigError`] when the chosen file cannot be read or parsed.
pub fn load_project_config(
    explicit: Option<&Utf8Path>,
    cwd: &Utf8Path,
) -> Result<ProjectConfig, ConfigError> {
    let (mut config, origin_dir) = match explicit {
        Some(path) => {
            let path = if path.is_absolute() {
                path.to_owned()
            } else {
                cwd.join(path)
            };
            let config = ProjectConfig::load(&path)?;
            let dir = path.parent().map_or_else(|| cwd.to_owned(), Utf8Path::to_owned);
            (config, dir)
        }
        None => {
            let candidate = cwd.join(DEFAULT_CONFIG_FILE);
            let config = if candidate.is_file() {
                ProjectConfig::load(&candidate)?
            } else {
                ProjectConfig::default()
            };
            (config, cwd.to_owned())
        }
    };

    if config.layout.base_dir == Utf8Path::new(".") {
        config.layout.base_dir = origin_dir;
    } else if config.layout.base_dir.is_relative() {
        config.layout.base_dir = origin_dir.join(&config.layout.base_dir);
    }
    Ok(config)
}

/// Loads the dependency manifest named in `config`, or an empty list when
/// none is configured.
///
/// # Errors
///
/// Returns [`DependencyError`] when the manifest cannot be read or parsed.
pub fn load_dependencies(config: &ProjectConfig) -> Result<Vec<DependencyDescriptor>, DependencyError> {
    match &config.dependencies.manifest {
        Some(manifest) => load_manifest(config.resolve(manifest).as_std_path()),
        None => Ok(Vec::new()),
    }
}

/// Resolves the deployment target and single archive against the base
/// directory.
#[must_use]
pub fn resolve_install_paths(config: &ProjectConfig) -> (Option<PathBuf>, Option<PathBuf>) {
    let resolve = |path: &Utf8PathBuf| config.resolve(path).into_std_path_buf();
    (
        config.install.target.as_ref().map(resolve),
        config.install.single_archive.as_ref().map(resolve),
    )
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
