//! Overlay planning: deciding what happens to every file of every module.
//!
//! Planning never touches the deployment target. It compares each mapped
//! file against the files already present and the overlay records, then
//! emits one [`PlannedAction`] per archive file.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::Serialize;

use super::mapping::FileMapping;
use super::records::OverlayRecord;
use crate::archive::extraction::validate_entry_path;
use crate::archive::packaging::compute_sha256;
use crate::resources::presets::METADATA_FILES;

/// Target directory receiving a module's metadata files.
const MODULE_METADATA_DIR: &str = "WEB-INF/classes/alfresco/module";

/// Overlay policy flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanPolicy {
    /// Overwrite files the engine did not install.
    pub force: bool,
    /// Copy each overwritten file aside first.
    pub backup: bool,
    /// Suffix appended to backup copies.
    pub backup_suffix: String,
}

/// An expanded module archive ready for planning.
#[derive(Debug, Clone)]
pub struct ModuleContent {
    /// Module id.
    pub id: String,
    /// Module version.
    pub version: String,
    /// Archive the module was expanded from.
    pub archive: PathBuf,
    /// Directory holding the expanded files.
    pub root: PathBuf,
    /// Expanded files as sorted `/`-separated paths.
    pub files: Vec<String>,
    /// Archive-to-target mapping.
    pub mapping: FileMapping,
}

impl ModuleContent {
    /// Target path for `archive_path`, or `None` when it is unmapped or the
    /// mapped path would leave the deployment root.
    #[must_use]
    pub fn target_for(&self, archive_path: &str) -> Option<String> {
        let target = if METADATA_FILES.contains(&archive_path) {
            format!("{MODULE_METADATA_DIR}/{}/{archive_path}", self.id)
        } else {
            self.mapping.map(archive_path)?
        };
        match validate_entry_path(&target) {
            Ok(path) if !path.as_os_str().is_empty() => Some(target),
            _ => {
                warn!(
                    "{}: {archive_path} maps to {target:?} outside the deployment target; skipping",
                    self.id
                );
                None
            }
        }
    }
}

/// What an action does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    /// Write a file that does not exist yet.
    Copy,
    /// Replace an existing or earlier-planned file.
    Overwrite,
    /// Leave an untracked target file alone.
    SkipConflict,
    /// The archive file has no target mapping.
    SkipUnmapped,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Copy => "copy",
            Self::Overwrite => "overwrite",
            Self::SkipConflict => "skip (conflict)",
            Self::SkipUnmapped => "skip (unmapped)",
        })
    }
}

/// One planned step of an install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedAction {
    /// Module the file comes from.
    pub module: String,
    /// Path inside the module archive.
    pub archive_path: String,
    /// Target-relative path; absent for unmapped files.
    pub target: Option<String>,
    /// What happens to the file.
    pub kind: ActionKind,
    /// Target-relative backup path written before overwriting.
    pub backup: Option<String>,
    #[serde(skip)]
    pub(crate) source: PathBuf,
}

/// Why a file was not installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "reason", content = "detail")]
pub enum ConflictReason {
    /// The target file exists, is untracked and force is disabled.
    Untracked,
    /// Copying the file failed.
    CopyFailed(String),
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Untracked => f.write_str("existing file not installed by ampkit"),
            Self::CopyFailed(detail) => write!(f, "copy failed: {detail}"),
        }
    }
}

/// A file that was left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    /// Module the file comes from.
    pub module: String,
    /// Target-relative path.
    pub target: String,
    /// Why the file was not installed.
    pub reason: ConflictReason,
}

/// Plans every file of `module` against the target rooted at `target_root`.
///
/// `planned` holds the target paths claimed earlier in the same run; it is
/// extended with the paths this module claims. A path claimed earlier counts
/// as tracked, so a later module may replace it without force.
pub fn plan_module(
    module: &ModuleContent,
    target_root: &Path,
    records: &OverlayRecord,
    planned: &mut BTreeSet<String>,
    policy: &PlanPolicy,
) -> Vec<PlannedAction> {
    module
        .files
        .iter()
        .map(|archive_path| {
            let source = module.root.join(archive_path);
            let Some(target) = module.target_for(archive_path) else {
                debug!("{}: {archive_path} has no target mapping", module.id);
                return PlannedAction {
                    module: module.id.clone(),
                    archive_path: archive_path.clone(),
                    target: None,
                    kind: ActionKind::SkipUnmapped,
                    backup: None,
                    source,
                };
            };

            let exists = target_root.join(&target).is_file();
            let claimed_earlier = planned.contains(&target);
            let tracked = claimed_earlier || records.is_tracked(&target);

            let kind = if !exists && !claimed_earlier {
                ActionKind::Copy
            } else if policy.force || tracked {
                ActionKind::Overwrite
            } else {
                warn!(
                    "{target} exists and was not installed by ampkit; skipping (use --force to overwrite)"
                );
                ActionKind::SkipConflict
            };

            let backup = (kind == ActionKind::Overwrite
                && policy.backup
                && exists
                && !claimed_earlier
                && !same_content(&source, &target_root.join(&target)))
                .then(|| format!("{target}{}", policy.backup_suffix));

            if kind != ActionKind::SkipConflict {
                planned.insert(target.clone());
            }
            debug!("{}: {archive_path} -> {target} ({kind})", module.id);

            PlannedAction {
                module: module.id.clone(),
                archive_path: archive_path.clone(),
                target: Some(target),
                kind,
                backup,
                source,
            }
        })
        .collect()
}

/// True when `source` and `existing` hash the same, so overwriting loses
/// nothing.
fn same_content(source: &Path, existing: &Path) -> bool {
    match (compute_sha256(source), compute_sha256(existing)) {
        (Ok(incoming), Ok(present)) => incoming == present,
        _ => false,
    }
}
