//! Shared infrastructure for ampkit: project configuration, Ant-style
//! pattern sets, property substitution, `.properties` parsing, and an
//! injectable clock.

pub mod clock;
pub mod config;
pub mod filtering;
pub mod patterns;
pub mod properties;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{
    CollisionPolicy, ConfigError, DEFAULT_CONFIG_FILE, DependencyConfig, InstallConfig,
    LayoutConfig, ModuleConfig, ProjectConfig, RuleConfig, VersionConfig,
};
pub use filtering::{SubstitutionTable, filter_file};
pub use patterns::{DEFAULT_EXCLUDES, PatternError, PatternSet, split_tokens};
pub use properties::{parse_properties, read_properties};
