//! Output formatting for the module listing.
//!
//! This module formats the overlay records of a deployment target for
//! human-readable or JSON output.

use std::path::Path;

use serde::Serialize;

use crate::overlay::records::OverlayRecord;

/// Format recorded modules for human-readable output.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use ampkit_installer::list_output::format_human;
/// use ampkit_installer::overlay::records::OverlayRecord;
///
/// let output = format_human(&OverlayRecord::default(), Path::new("webapps/share"));
/// assert!(output.contains("No modules recorded"));
/// ```
#[must_use]
pub fn format_human(records: &OverlayRecord, target: &Path) -> String {
    let target = target.display();
    if records.modules().next().is_none() {
        return format!(
            "No modules recorded for {target}.\n\nRun `ampkit install --target {target}` to install module archives."
        );
    }

    let mut output = format!("Modules installed in {target}:\n");

    for (id, module) in records.modules() {
        let files: Vec<&str> = records.files_for_module(id).collect();
        output.push('\n');
        output.push_str(&format!("  {id} {}\n", display_version(&module.version)));
        output.push_str(&format!("    archive: {}\n", module.archive));
        output.push_str(&format!("    files: {}\n", files.len()));
        for file in files {
            output.push_str(&format!("      - {file}\n"));
        }
    }

    output
}

fn display_version(version: &str) -> &str {
    if version.is_empty() { "(unversioned)" } else { version }
}

/// Format recorded modules as JSON.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use ampkit_installer::list_output::format_json;
/// use ampkit_installer::overlay::records::OverlayRecord;
///
/// let json = format_json(&OverlayRecord::default(), Path::new("webapps/share"));
/// assert!(json.contains("\"modules\": []"));
/// ```
#[must_use]
pub fn format_json(records: &OverlayRecord, target: &Path) -> String {
    let listing = ListingJson::from_records(records, target);
    serde_json::to_string_pretty(&listing).unwrap_or_else(|_| "{}".to_owned())
}

/// JSON-serializable listing of one deployment target.
#[derive(Debug, Serialize)]
pub struct ListingJson {
    /// Deployment target the records belong to.
    pub target: String,
    /// Recorded modules, ordered by id.
    pub modules: Vec<ModuleEntry>,
}

impl ListingJson {
    fn from_records(records: &OverlayRecord, target: &Path) -> Self {
        let modules = records
            .modules()
            .map(|(id, module)| ModuleEntry {
                id: id.to_owned(),
                version: module.version.clone(),
                archive: module.archive.clone(),
                installed_at: module.installed_at,
                files: records
                    .files_for_module(id)
                    .map(str::to_owned)
                    .collect(),
            })
            .collect();

        Self {
            target: target.display().to_string(),
            modules,
        }
    }
}

/// JSON entry for a module.
#[derive(Debug, Serialize)]
pub struct ModuleEntry {
    /// Module id.
    pub id: String,
    /// Module version.
    pub version: String,
    /// Archive file name.
    pub archive: String,
    /// Install time in epoch milliseconds.
    pub installed_at: u64,
    /// Target-relative files currently owned by the module.
    pub files: Vec<String>,
}
