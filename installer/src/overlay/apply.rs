//! Executes planned actions against a deployment root.

use std::fs;
use std::io;
use std::path::Path;

use log::{debug, warn};

use super::plan::{ActionKind, Conflict, ConflictReason, PlannedAction};
use super::records::{FileRecord, OverlayRecord};
use crate::archive::packaging::compute_sha256;

/// Result of applying one module's actions.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    /// Target paths written.
    pub written: Vec<String>,
    /// Target-relative backups created.
    pub backups: Vec<String>,
    /// Files that failed to copy.
    pub conflicts: Vec<Conflict>,
}

/// Applies `actions` under `root`, recording each written file in `records`.
///
/// A failed copy is reported as a [`Conflict`] and the remaining actions
/// still run.
pub fn apply_actions(
    actions: &[PlannedAction],
    root: &Path,
    records: &mut OverlayRecord,
    installed_at: u64,
) -> ApplyReport {
    let mut report = ApplyReport::default();

    for action in actions {
        let Some(target) = action.target.as_deref() else {
            continue;
        };
        if !matches!(action.kind, ActionKind::Copy | ActionKind::Overwrite) {
            continue;
        }

        match apply_one(action, target, root) {
            Ok((sha256, backup)) => {
                records.record_file(
                    target,
                    FileRecord {
                        module: action.module.clone(),
                        installed_at,
                        sha256,
                    },
                );
                report.written.push(target.to_owned());
                report.backups.extend(backup);
            }
            Err(err) => {
                warn!("{}: cannot install {target}: {err}", action.module);
                report.conflicts.push(Conflict {
                    module: action.module.clone(),
                    target: target.to_owned(),
                    reason: ConflictReason::CopyFailed(err.to_string()),
                });
            }
        }
    }

    report
}

fn apply_one(
    action: &PlannedAction,
    target: &str,
    root: &Path,
) -> io::Result<(String, Option<String>)> {
    let destination = root.join(target);
    let backup = match action.backup.as_deref() {
        Some(backup) => back_up(&destination, &root.join(backup))?.then(|| backup.to_owned()),
        None => None,
    };

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(&action.source, &destination)?;
    debug!("{}: {} -> {target}", action.module, action.archive_path);
    Ok((compute_sha256(&destination)?, backup))
}

/// Copies `original` to `backup` unless a backup already exists. The first
/// backup is kept; the content being replaced now is not saved again.
fn back_up(original: &Path, backup: &Path) -> io::Result<bool> {
    if backup.exists() {
        warn!(
            "keeping existing backup {}; current content of {} is not backed up",
            backup.display(),
            original.display()
        );
        return Ok(false);
    }
    if !original.is_file() {
        return Ok(false);
    }
    fs::copy(original, backup)?;
    debug!("backed up {} to {}", original.display(), backup.display());
    Ok(true)
}
