//! Rule-driven resource collection.
//!
//! A [`ResourceRule`] names a source directory, include and exclude pattern
//! sets, whether matched files are filtered, and where they land inside the
//! staging layout. [`evaluate`] walks every rule against the filesystem and
//! flattens the result into a [`StagingPlan`] keyed by target path.
//!
//! Evaluation order matters in two ways:
//!
//! - Filtered rules run before the unfiltered rules that share their source
//!   directory, and every file a filtered rule matched is withheld from those
//!   unfiltered siblings. A file is therefore never staged twice with two
//!   different substitution outcomes.
//! - When two rules target the same staging path, the rule evaluated later
//!   wins.

pub mod presets;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use ampkit_common::{PatternError, PatternSet, ProjectConfig, RuleConfig};
use log::{debug, warn};
use thiserror::Error;
use walkdir::WalkDir;

use crate::archive::packaging::entry_name;

/// Errors raised while building or evaluating rules.
#[derive(Debug, Error)]
pub enum RuleError {
    /// A configured pattern is not a valid glob.
    #[error(transparent)]
    Pattern(#[from] PatternError),

    /// An existing source directory could not be walked.
    #[error("cannot read source directory {}: {source}", .directory.display())]
    Walk {
        /// Rule source directory.
        directory: PathBuf,
        /// Underlying walk error.
        #[source]
        source: walkdir::Error,
    },
}

/// A single resource-collection rule.
///
/// Rules are immutable once built; the builder methods consume and return
/// the rule.
///
/// # Examples
///
/// ```
/// use ampkit_common::PatternSet;
/// use ampkit_installer::resources::ResourceRule;
///
/// let rule = ResourceRule::new("src/main/config", "config/alfresco/module")
///     .module_scoped("records")
///     .with_includes(PatternSet::parse("**/*.xml").unwrap())
///     .with_filtering(true);
///
/// assert_eq!(rule.target_path(), "config/alfresco/module/records");
/// assert_eq!(rule.target_for("context.xml"), "config/alfresco/module/records/context.xml");
/// assert!(rule.is_filtered());
/// ```
#[derive(Debug, Clone)]
pub struct ResourceRule {
    source_directory: PathBuf,
    includes: PatternSet,
    excludes: PatternSet,
    scope: PatternSet,
    filtered: bool,
    target_path: String,
    default_excludes: bool,
}

impl ResourceRule {
    /// Creates a rule selecting every file under `source_directory`.
    #[must_use]
    pub fn new(source_directory: impl Into<PathBuf>, target_path: &str) -> Self {
        Self {
            source_directory: source_directory.into(),
            includes: PatternSet::default(),
            excludes: PatternSet::default(),
            scope: PatternSet::default(),
            filtered: false,
            target_path: normalise_target(target_path),
            default_excludes: true,
        }
    }

    /// Builds a rule from a `[[resources]]` table.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] when an include or exclude token is invalid.
    pub fn from_config(rule: &RuleConfig, project: &ProjectConfig) -> Result<Self, PatternError> {
        let mut built = Self::new(
            project.resolve(&rule.directory).into_std_path_buf(),
            &rule.target_path,
        )
        .with_includes(parse_optional(rule.includes.as_deref())?)
        .with_excludes(parse_optional(rule.excludes.as_deref())?)
        .with_filtering(rule.filtered)
        .with_default_excludes(rule.default_excludes);
        if rule.module_scoped {
            built = built.module_scoped(&project.module.artifact_id);
        }
        Ok(built)
    }

    /// Replaces the include set; an empty set selects everything.
    #[must_use]
    pub fn with_includes(mut self, includes: PatternSet) -> Self {
        self.includes = includes;
        self
    }

    /// Replaces the exclude set. Excludes always beat includes.
    #[must_use]
    pub fn with_excludes(mut self, excludes: PatternSet) -> Self {
        self.excludes = excludes;
        self
    }

    /// Additionally requires a match against `scope` when it is non-empty.
    #[must_use]
    pub fn with_scope(mut self, scope: PatternSet) -> Self {
        self.scope = scope;
        self
    }

    /// Enables or disables property substitution.
    #[must_use]
    pub const fn with_filtering(mut self, filtered: bool) -> Self {
        self.filtered = filtered;
        self
    }

    /// Enables or disables the SCM/editor default excludes.
    #[must_use]
    pub const fn with_default_excludes(mut self, enabled: bool) -> Self {
        self.default_excludes = enabled;
        self
    }

    /// Appends the module's artifact id to the target path.
    #[must_use]
    pub fn module_scoped(mut self, artifact_id: &str) -> Self {
        self.target_path = join_target(&self.target_path, &normalise_target(artifact_id));
        self
    }

    /// Source directory walked by the rule.
    #[must_use]
    pub fn source_directory(&self) -> &Path {
        &self.source_directory
    }

    /// Target path inside staging, without leading or trailing slashes.
    #[must_use]
    pub fn target_path(&self) -> &str {
        &self.target_path
    }

    /// Whether matched files are filtered.
    #[must_use]
    pub const fn is_filtered(&self) -> bool {
        self.filtered
    }

    /// Include patterns.
    #[must_use]
    pub fn includes(&self) -> &PatternSet {
        &self.includes
    }

    /// Exclude patterns.
    #[must_use]
    pub fn excludes(&self) -> &PatternSet {
        &self.excludes
    }

    /// Staging path for a file at `relative` below the source directory.
    #[must_use]
    pub fn target_for(&self, relative: &str) -> String {
        join_target(&self.target_path, relative)
    }

    fn selects(&self, relative: &str, defaults: &PatternSet) -> bool {
        (self.includes.is_empty() || self.includes.matches(relative))
            && (self.scope.is_empty() || self.scope.matches(relative))
            && !self.excludes.matches(relative)
            && !(self.default_excludes && defaults.matches(relative))
    }
}

/// One file to stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    /// Absolute source file.
    pub source: PathBuf,
    /// `/`-separated path inside staging.
    pub target: String,
    /// Apply property substitution while copying.
    pub filtered: bool,
}

/// What happened to one rule during evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    /// The source directory existed and was walked.
    Matched {
        /// Rule source directory.
        directory: PathBuf,
        /// Rule target path.
        target_path: String,
        /// Number of files the rule selected.
        files: usize,
    },
    /// The source directory does not exist; the rule selected nothing.
    Missing {
        /// Rule source directory.
        directory: PathBuf,
    },
}

/// Flattened result of evaluating every rule.
///
/// Entries are unique by target path and iterate in target-path order.
#[derive(Debug, Clone, Default)]
pub struct StagingPlan {
    entries: BTreeMap<String, PlanEntry>,
    outcomes: Vec<RuleOutcome>,
}

impl StagingPlan {
    /// Entries in target-path order.
    pub fn entries(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries.values()
    }

    /// Looks up the entry staged at `target`.
    #[must_use]
    pub fn get(&self, target: &str) -> Option<&PlanEntry> {
        self.entries.get(target)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no file was selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Per-rule outcomes in evaluation order.
    #[must_use]
    pub fn outcomes(&self) -> &[RuleOutcome] {
        &self.outcomes
    }

    /// Source directories of rules whose directory was absent.
    pub fn missing_directories(&self) -> impl Iterator<Item = &Path> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            RuleOutcome::Missing { directory } => Some(directory.as_path()),
            RuleOutcome::Matched { .. } => None,
        })
    }
}

/// Evaluates `rules` against the filesystem.
///
/// # Errors
///
/// Returns [`RuleError::Walk`] when an existing directory cannot be read.
/// A missing directory is not an error; it is logged and reported as
/// [`RuleOutcome::Missing`].
pub fn evaluate(rules: &[ResourceRule]) -> Result<StagingPlan, RuleError> {
    let groups: Vec<PathBuf> = rules
        .iter()
        .map(|rule| group_key(&rule.source_directory))
        .collect();
    let defaults = PatternSet::default_excludes();
    let mut claimed: HashMap<&Path, BTreeSet<String>> = HashMap::new();
    let mut plan = StagingPlan::default();

    for index in evaluation_order(rules, &groups) {
        let (Some(rule), Some(group)) = (rules.get(index), groups.get(index)) else {
            continue;
        };
        let directory = &rule.source_directory;
        if !directory.is_dir() {
            warn!(
                "resource directory {} does not exist; skipping",
                directory.display()
            );
            plan.outcomes.push(RuleOutcome::Missing {
                directory: directory.clone(),
            });
            continue;
        }

        let claimed_here = claimed.entry(group.as_path()).or_default();
        let mut files = 0;
        for item in WalkDir::new(directory).min_depth(1).sort_by_file_name() {
            let item = item.map_err(|source| RuleError::Walk {
                directory: directory.clone(),
                source,
            })?;
            if item.file_type().is_dir() || !item.path().is_file() {
                continue;
            }

            let relative = entry_name(directory, item.path());
            if !rule.selects(&relative, &defaults) {
                continue;
            }
            if rule.filtered {
                claimed_here.insert(relative.clone());
            } else if claimed_here.contains(&relative) {
                debug!("{relative} is staged by a filtered rule; skipping unfiltered copy");
                continue;
            }

            let target = rule.target_for(&relative);
            let entry = PlanEntry {
                source: item.into_path(),
                target: target.clone(),
                filtered: rule.filtered,
            };
            if let Some(previous) = plan.entries.insert(target.clone(), entry) {
                debug!(
                    "{target}: {} replaces {}",
                    directory.join(&relative).display(),
                    previous.source.display()
                );
            }
            files += 1;
        }

        debug!(
            "rule {} -> {}/ selected {files} file(s)",
            directory.display(),
            rule.target_path
        );
        plan.outcomes.push(RuleOutcome::Matched {
            directory: directory.clone(),
            target_path: rule.target_path.clone(),
            files,
        });
    }

    Ok(plan)
}

/// Orders rules so every filtered rule runs immediately before its first
/// unfiltered sibling; unrelated rules keep their configured order.
fn evaluation_order(rules: &[ResourceRule], groups: &[PathBuf]) -> Vec<usize> {
    let first_unfiltered = |group: &PathBuf| {
        rules
            .iter()
            .zip(groups)
            .position(|(rule, key)| !rule.filtered && key == group)
    };

    let mut order: Vec<(usize, bool, usize)> = rules
        .iter()
        .zip(groups)
        .enumerate()
        .map(|(index, (rule, group))| {
            let slot = if rule.filtered {
                first_unfiltered(group).map_or(index, |sibling| sibling.min(index))
            } else {
                index
            };
            (slot, !rule.filtered, index)
        })
        .collect();
    order.sort_unstable();
    order.into_iter().map(|(_, _, index)| index).collect()
}

fn group_key(directory: &Path) -> PathBuf {
    fs::canonicalize(directory).unwrap_or_else(|_| directory.to_path_buf())
}

fn parse_optional(raw: Option<&str>) -> Result<PatternSet, PatternError> {
    raw.map_or_else(|| Ok(PatternSet::default()), PatternSet::parse)
}

fn normalise_target(raw: &str) -> String {
    raw.replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

fn join_target(base: &str, relative: &str) -> String {
    match (base.is_empty(), relative.is_empty()) {
        (true, _) => relative.to_owned(),
        (false, true) => base.to_owned(),
        (false, false) => format!("{base}/{relative}"),
    }
}
