//! Overlay installation of module archives onto a deployment target.
//!
//! An install moves through four phases:
//!
//! 1. **Collecting** expands every module archive into a scratch directory
//!    and reads its identity and file mapping.
//! 2. **Planning** maps each archive file onto the target and decides
//!    whether it is copied, overwritten or skipped.
//! 3. **Preview** reports the plan and stops, or **Applying** takes the
//!    target lock, writes the files and updates the overlay records.
//! 4. **Done**.
//!
//! Nothing to install, or no deployment target on disk, completes as a
//! no-op rather than an error.

pub mod apply;
pub mod mapping;
pub mod plan;
pub mod records;
pub mod target;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use ampkit_common::{Clock, InstallConfig, read_properties};
use fs2::FileExt;
use log::{info, warn};
use serde::Serialize;
use tempfile::TempDir;

use crate::archive::ArchiveExtractor;
use crate::deps::{self, DependencyDescriptor};
use crate::error::OverlayError;

use apply::apply_actions;
use mapping::FileMapping;
use plan::{ActionKind, Conflict, ConflictReason, ModuleContent, PlanPolicy, PlannedAction, plan_module};
use records::{ModuleRecord, RecordStore, lock_path};
use target::DeploymentTarget;

const MODULE_PROPERTIES: &str = "module.properties";
const FILE_MAPPING_PROPERTIES: &str = "file-mapping.properties";

/// Flags controlling an install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOptions {
    /// Overwrite files the engine did not install.
    pub force: bool,
    /// Copy each overwritten file aside first.
    pub backup: bool,
    /// Suffix appended to backup copies.
    pub backup_suffix: String,
    /// Plan without touching the target.
    pub preview: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self::from(&InstallConfig::default())
    }
}

impl From<&InstallConfig> for InstallOptions {
    fn from(config: &InstallConfig) -> Self {
        Self {
            force: config.force,
            backup: config.backup,
            backup_suffix: config.backup_suffix.clone(),
            preview: config.preview,
        }
    }
}

/// One install run.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    /// Deployment target: a directory or a packed archive.
    pub target: PathBuf,
    /// Module archives in install order.
    pub archives: Vec<PathBuf>,
    /// Policy flags.
    pub options: InstallOptions,
}

/// Phase of an install, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallPhase {
    /// Expanding archives.
    Collecting,
    /// Comparing archive contents against the target.
    Planning,
    /// Reporting the plan without applying it.
    Preview,
    /// Writing files and records.
    Applying,
    /// Finished.
    Done,
}

impl fmt::Display for InstallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Collecting => "collecting",
            Self::Planning => "planning",
            Self::Preview => "preview",
            Self::Applying => "applying",
            Self::Done => "done",
        })
    }
}

/// Why an install did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoOpReason {
    /// No module archives were collected.
    NoArchives,
    /// The deployment target does not exist.
    MissingTarget,
}

impl fmt::Display for NoOpReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoArchives => "no module archives to install",
            Self::MissingTarget => "deployment target does not exist",
        })
    }
}

/// How an install finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "status", content = "reason")]
pub enum InstallStatus {
    /// Nothing was done.
    NoOp(NoOpReason),
    /// The plan was reported without applying it.
    Previewed,
    /// The plan was applied.
    Applied,
}

/// One module handled by an install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledModule {
    /// Module id.
    pub id: String,
    /// Module version.
    pub version: String,
    /// Source archive.
    pub archive: PathBuf,
    /// Files written, or planned to be written in preview.
    pub files: usize,
}

/// Structured result of an install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallOutcome {
    /// Final status.
    #[serde(flatten)]
    pub status: InstallStatus,
    /// Deployment target.
    pub target: PathBuf,
    /// Every planned action, in module then archive-path order.
    pub actions: Vec<PlannedAction>,
    /// Files left untouched because of a conflict or a failed copy.
    pub conflicts: Vec<Conflict>,
    /// Modules handled.
    pub modules: Vec<InstalledModule>,
    /// Target-relative backups created.
    pub backups: Vec<String>,
}

impl InstallOutcome {
    fn no_op(target: &Path, reason: NoOpReason) -> Self {
        info!("overlay install: {reason}; nothing to do");
        Self {
            status: InstallStatus::NoOp(reason),
            target: target.to_path_buf(),
            actions: Vec::new(),
            conflicts: Vec::new(),
            modules: Vec::new(),
            backups: Vec::new(),
        }
    }

    /// Number of actions of `kind`.
    #[must_use]
    pub fn count(&self, kind: ActionKind) -> usize {
        self.actions.iter().filter(|action| action.kind == kind).count()
    }
}

/// Gathers the archives to install: every runtime dependency whose type is
/// `archive_type`, then `single` when given. Duplicates are dropped.
#[must_use]
pub fn collect_archives(
    dependencies: &[DependencyDescriptor],
    archive_type: &str,
    single: Option<&Path>,
) -> Vec<PathBuf> {
    let mut archives: Vec<PathBuf> = Vec::new();
    let candidates = deps::module_archives(dependencies, archive_type)
        .into_iter()
        .map(|dep| dep.file.clone())
        .chain(single.map(Path::to_path_buf));
    for archive in candidates {
        if !archives.contains(&archive) {
            archives.push(archive);
        }
    }
    archives
}

/// Runs an overlay install.
///
/// # Errors
///
/// Returns an [`OverlayError`] when an archive cannot be expanded, the
/// target exists but is unreachable, the lock cannot be taken or the records
/// cannot be written. Per-file failures are reported as conflicts.
pub fn install(
    request: &InstallRequest,
    extractor: &dyn ArchiveExtractor,
    clock: &dyn Clock,
) -> Result<InstallOutcome, OverlayError> {
    let archives = existing_archives(&request.archives);
    let mut phase = InstallPhase::Collecting;
    info!("overlay install: {phase} {} archive(s)", archives.len());

    if archives.is_empty() {
        return Ok(InstallOutcome::no_op(&request.target, NoOpReason::NoArchives));
    }
    let Some(target) = DeploymentTarget::open(&request.target, extractor)? else {
        return Ok(InstallOutcome::no_op(&request.target, NoOpReason::MissingTarget));
    };

    let scratch = TempDir::new().map_err(|source| OverlayError::Scratch { source })?;
    let modules = archives
        .iter()
        .enumerate()
        .map(|(index, archive)| expand(archive, &scratch.path().join(index.to_string()), extractor))
        .collect::<Result<Vec<_>, _>>()?;

    transition(&mut phase, InstallPhase::Planning);
    let store = RecordStore::for_target(target.path());
    let mut records = store.load()?;
    let policy = PlanPolicy {
        force: request.options.force,
        backup: request.options.backup,
        backup_suffix: request.options.backup_suffix.clone(),
    };
    let mut planned = BTreeSet::new();
    let plans: Vec<Vec<PlannedAction>> = modules
        .iter()
        .map(|module| plan_module(module, target.root(), &records, &mut planned, &policy))
        .collect();
    let mut conflicts: Vec<Conflict> = plans
        .iter()
        .flatten()
        .filter(|action| action.kind == ActionKind::SkipConflict)
        .filter_map(|action| {
            action.target.as_ref().map(|path| Conflict {
                module: action.module.clone(),
                target: path.clone(),
                reason: ConflictReason::Untracked,
            })
        })
        .collect();

    if request.options.preview {
        transition(&mut phase, InstallPhase::Preview);
        let summaries = modules
            .iter()
            .zip(&plans)
            .map(|(module, actions)| summary(module, planned_writes(actions)))
            .collect();
        transition(&mut phase, InstallPhase::Done);
        return Ok(InstallOutcome {
            status: InstallStatus::Previewed,
            target: request.target.clone(),
            actions: plans.into_iter().flatten().collect(),
            conflicts,
            modules: summaries,
            backups: Vec::new(),
        });
    }

    transition(&mut phase, InstallPhase::Applying);
    let lock = acquire_lock(target.path())?;
    let installed_at = u64::try_from(clock.now_millis()).unwrap_or(u64::MAX);
    let mut summaries = Vec::with_capacity(modules.len());
    let mut backups = Vec::new();
    for (module, actions) in modules.iter().zip(&plans) {
        let report = apply_actions(actions, target.root(), &mut records, installed_at);
        info!(
            "installed {} {} ({} file(s))",
            module.id,
            module.version,
            report.written.len()
        );
        records.record_module(
            module.id.clone(),
            ModuleRecord {
                version: module.version.clone(),
                archive: file_name(&module.archive),
                installed_at,
                files: report.written.len(),
            },
        );
        summaries.push(summary(module, report.written.len()));
        backups.extend(report.backups);
        conflicts.extend(report.conflicts);
    }

    target.commit()?;
    store.save(&records)?;
    drop(lock);
    transition(&mut phase, InstallPhase::Done);

    if !conflicts.is_empty() {
        warn!("{} file(s) were not installed", conflicts.len());
    }
    Ok(InstallOutcome {
        status: InstallStatus::Applied,
        target: request.target.clone(),
        actions: plans.into_iter().flatten().collect(),
        conflicts,
        modules: summaries,
        backups,
    })
}

/// Drops archives that are not on disk; an absent artifact is not an error.
fn existing_archives(archives: &[PathBuf]) -> Vec<&Path> {
    archives
        .iter()
        .filter(|archive| {
            let present = archive.is_file();
            if !present {
                warn!("module archive {} does not exist; skipping", archive.display());
            }
            present
        })
        .map(PathBuf::as_path)
        .collect()
}

fn transition(phase: &mut InstallPhase, next: InstallPhase) {
    info!("overlay install: {phase} -> {next}");
    *phase = next;
}

/// Expands `archive` into `dest` and reads its identity and mapping.
fn expand(
    archive: &Path,
    dest: &Path,
    extractor: &dyn ArchiveExtractor,
) -> Result<ModuleContent, OverlayError> {
    let files = extractor
        .extract(archive, dest)
        .map_err(|source| OverlayError::Extract {
            archive: archive.to_path_buf(),
            source,
        })?;

    let identity = optional_properties(archive, dest, MODULE_PROPERTIES)?;
    let stem = archive
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let id = identity
        .get("module.id")
        .filter(|id| !id.trim().is_empty())
        .map_or(stem, |id| id.trim().to_owned());
    let version = identity
        .get("module.version")
        .map(|version| version.trim().to_owned())
        .unwrap_or_default();

    let mapping = FileMapping::from_properties(&optional_properties(
        archive,
        dest,
        FILE_MAPPING_PROPERTIES,
    )?);
    info!(
        "collected {id} {version} from {} ({} file(s))",
        archive.display(),
        files.len()
    );

    Ok(ModuleContent {
        id,
        version,
        archive: archive.to_path_buf(),
        root: dest.to_path_buf(),
        files,
        mapping,
    })
}

fn optional_properties(
    archive: &Path,
    root: &Path,
    file: &'static str,
) -> Result<BTreeMap<String, String>, OverlayError> {
    let path = root.join(file);
    if !path.is_file() {
        return Ok(BTreeMap::new());
    }
    read_properties(&path).map_err(|source| OverlayError::Metadata {
        archive: archive.to_path_buf(),
        file,
        source,
    })
}

fn acquire_lock(target: &Path) -> Result<fs::File, OverlayError> {
    let path = lock_path(target);
    let lock_error = |source| OverlayError::Lock {
        path: path.clone(),
        source,
    };
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&path)
        .map_err(lock_error)?;
    file.lock_exclusive().map_err(lock_error)?;
    Ok(file)
}

fn planned_writes(actions: &[PlannedAction]) -> usize {
    actions
        .iter()
        .filter(|action| matches!(action.kind, ActionKind::Copy | ActionKind::Overwrite))
        .count()
}

fn summary(module: &ModuleContent, files: usize) -> InstalledModule {
    InstalledModule {
        id: module.id.clone(),
        version: module.version.clone(),
        archive: module.archive.clone(),
        files,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests;
