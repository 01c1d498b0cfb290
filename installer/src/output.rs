//! Output formatting for the `ampkit` CLI.
//!
//! Run summaries are written to stderr once a command finishes; the install
//! outcome can also be rendered as JSON for scripting.

use crate::assembler::AssemblyReport;
use crate::overlay::plan::ActionKind;
use crate::overlay::{InstallOutcome, InstallStatus};

/// Format the summary printed after a successful assembly.
///
/// # Example
///
/// ```
/// use std::path::PathBuf;
/// use ampkit_installer::assembler::AssemblyReport;
/// use ampkit_installer::output::assembly_summary;
/// use ampkit_installer::version::ModuleIdentity;
///
/// let report = AssemblyReport {
///     archive: PathBuf::from("target/records-1.0-SNAPSHOT.amp"),
///     identity: ModuleIdentity::new("records", "1.0-SNAPSHOT", "1.0"),
///     staged_files: 3,
///     archived_files: 3,
///     bundled: Vec::new(),
///     missing_directories: Vec::new(),
///     module_jar: None,
///     warnings: Vec::new(),
/// };
///
/// let summary = assembly_summary(&report);
/// assert!(summary.starts_with("Built target/records-1.0-SNAPSHOT.amp"));
/// assert!(summary.contains("records 1.0"));
/// ```
#[must_use]
pub fn assembly_summary(report: &AssemblyReport) -> String {
    let mut lines = vec![
        format!(
            "Built {} ({} {})",
            report.archive.display(),
            report.archived_files,
            files(report.archived_files)
        ),
        format!(
            "  module: {} {}",
            report.identity.artifact_id(),
            report.identity.normalized_version()
        ),
        format!("  resources staged: {}", report.staged_files),
        format!("  libraries bundled: {}", report.bundled.len()),
    ];
    if let Some(jar) = &report.module_jar {
        lines.push(format!("  module jar: {}", jar.display()));
    }
    if !report.warnings.is_empty() {
        lines.push(format!("  warnings: {}", report.warnings.len()));
        lines.extend(report.warnings.iter().map(|warning| format!("    - {warning}")));
    }
    lines.join("\n")
}

/// Format the human-readable summary of an install.
#[must_use]
pub fn install_summary(outcome: &InstallOutcome) -> String {
    let target = outcome.target.display();
    let mut lines = Vec::new();

    match outcome.status {
        InstallStatus::NoOp(reason) => {
            return format!("Nothing installed into {target}: {reason}.");
        }
        InstallStatus::Previewed => {
            lines.push(format!("Preview of install into {target} (nothing written):"));
            lines.extend(outcome.actions.iter().map(|action| {
                let destination = action.target.as_deref().unwrap_or("-");
                let backup = action
                    .backup
                    .as_deref()
                    .map(|backup| format!(" (backup {backup})"))
                    .unwrap_or_default();
                format!(
                    "  {:<13} {}: {} -> {destination}{backup}",
                    action.kind.to_string(),
                    action.module,
                    action.archive_path
                )
            }));
            lines.push(format!(
                "  {} to copy, {} to overwrite, {} conflicting, {} unmapped",
                outcome.count(ActionKind::Copy),
                outcome.count(ActionKind::Overwrite),
                outcome.count(ActionKind::SkipConflict),
                outcome.count(ActionKind::SkipUnmapped)
            ));
        }
        InstallStatus::Applied => {
            lines.push(format!(
                "Installed {} module(s) into {target}:",
                outcome.modules.len()
            ));
            lines.extend(outcome.modules.iter().map(|module| {
                format!(
                    "  {} {}: {} {}",
                    module.id,
                    module.version,
                    module.files,
                    files(module.files)
                )
            }));
            if !outcome.backups.is_empty() {
                lines.push(format!("  backups created: {}", outcome.backups.len()));
            }
        }
    }

    if !outcome.conflicts.is_empty() {
        lines.push(format!("  conflicts: {}", outcome.conflicts.len()));
        lines.extend(outcome.conflicts.iter().map(|conflict| {
            format!(
                "    - {} ({}): {}",
                conflict.target, conflict.module, conflict.reason
            )
        }));
    }
    lines.join("\n")
}

/// Format an install outcome as JSON.
#[must_use]
pub fn install_json(outcome: &InstallOutcome) -> String {
    serde_json::to_string_pretty(outcome).unwrap_or_else(|_| "{}".to_owned())
}

const fn files(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}
