//! ampkit assembles module archives from a project layout and overlays them
//! onto deployed web applications.
//!
//! This crate re-exports the public surface of the workspace so callers can
//! depend on a single crate:
//!
//! - [`ProjectConfig`] loads and validates `ampkit.toml`.
//! - [`run_assembly`] builds a versioned `.amp` archive.
//! - [`install`] merges archives onto an exploded or packed target.
//!
//! ```no_run
//! use ampkit::{ProjectConfig, SystemClock, run_assembly};
//! use camino::Utf8Path;
//!
//! let config = ProjectConfig::load(Utf8Path::new("ampkit.toml"))?;
//! let report = run_assembly(&config, &[], &SystemClock)?;
//! assert!(report.archive.ends_with("records-1.0.amp"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use ampkit_common::{
    Clock, CollisionPolicy, ConfigError, DEFAULT_CONFIG_FILE, FixedClock, InstallConfig,
    PatternSet, ProjectConfig, SubstitutionTable, SystemClock,
};
pub use ampkit_installer::assembler::{AssemblyReport, run_assembly};
pub use ampkit_installer::deps::{DependencyDescriptor, Scope, load_manifest};
pub use ampkit_installer::error::{AmpkitError, AssemblyError, OverlayError};
pub use ampkit_installer::overlay::{
    InstallOptions, InstallOutcome, InstallRequest, InstallStatus, collect_archives, install,
};
pub use ampkit_installer::version::{ModuleIdentity, normalize};
