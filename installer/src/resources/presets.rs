//! The conventional module layout expressed as resource rules.
//!
//! | Source                     | Filtered               | Staging target                            |
//! |----------------------------|------------------------|-------------------------------------------|
//! | `module.properties`, `file-mapping.properties` | yes | archive root                         |
//! | configuration directory    | text files only        | `config/alfresco/module/<artifact_id>/`   |
//! | well-known resources       | yes                    | `config/`                                 |
//! | web assets                 | no                     | `web/`                                    |
//!
//! Free-form `[[resources]]` rules follow the presets.

use ampkit_common::{PatternError, PatternSet, ProjectConfig};
use camino::Utf8Path;

use super::ResourceRule;

/// Module metadata files staged at the archive root.
pub const METADATA_FILES: &[&str] = &["module.properties", "file-mapping.properties"];

const CONFIG_TARGET: &str = "config";
const MODULE_CONFIG_TARGET: &str = "config/alfresco/module";
const WEB_TARGET: &str = "web";

/// Builds the conventional rules followed by the configured custom rules.
///
/// # Errors
///
/// Returns [`PatternError`] when a configured pattern is invalid.
pub fn conventional_rules(config: &ProjectConfig) -> Result<Vec<ResourceRule>, PatternError> {
    let layout = &config.layout;
    let artifact_id = config.module.artifact_id.trim();
    let source = |dir: &Utf8Path| config.resolve(dir).into_std_path_buf();

    let metadata = ResourceRule::new(source(layout.metadata_dir.as_path()), "")
        .with_includes(PatternSet::new(METADATA_FILES)?)
        .with_filtering(true)
        .with_default_excludes(layout.default_excludes);

    let config_includes = optional(layout.config_includes.as_deref())?;
    let config_excludes = optional(layout.config_excludes.as_deref())?;
    let config_target = if layout.module_scoped_config {
        MODULE_CONFIG_TARGET
    } else {
        CONFIG_TARGET
    };
    let mut config_filtered = ResourceRule::new(source(layout.config_dir.as_path()), config_target)
        .with_includes(PatternSet::parse(&layout.config_filtered_includes)?)
        .with_scope(config_includes.clone())
        .with_excludes(config_excludes.clone())
        .with_filtering(true)
        .with_default_excludes(layout.default_excludes);
    let mut config_plain = ResourceRule::new(source(layout.config_dir.as_path()), config_target)
        .with_includes(config_includes)
        .with_excludes(config_excludes)
        .with_default_excludes(layout.default_excludes);
    if layout.module_scoped_config {
        config_filtered = config_filtered.module_scoped(artifact_id);
        config_plain = config_plain.module_scoped(artifact_id);
    }

    let resources = ResourceRule::new(source(layout.resources_dir.as_path()), CONFIG_TARGET)
        .with_includes(optional(layout.resource_includes.as_deref())?)
        .with_excludes(optional(layout.resource_excludes.as_deref())?)
        .with_filtering(true)
        .with_default_excludes(layout.default_excludes);

    let web = ResourceRule::new(source(layout.webapp_dir.as_path()), WEB_TARGET)
        .with_includes(optional(layout.webapp_includes.as_deref())?)
        .with_excludes(optional(layout.webapp_excludes.as_deref())?)
        .with_default_excludes(layout.default_excludes);

    let mut rules = vec![metadata, config_filtered, config_plain, resources, web];
    for custom in &config.resources {
        rules.push(ResourceRule::from_config(custom, config)?);
    }
    Ok(rules)
}

fn optional(raw: Option<&str>) -> Result<PatternSet, PatternError> {
    raw.map_or_else(|| Ok(PatternSet::default()), PatternSet::parse)
}
