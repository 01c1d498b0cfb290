//! Persistent record of the files an overlay install wrote.
//!
//! Records live next to the deployment target in `<target>.overlay.json`:
//!
//! ```json
//! {
//!   "schema": 1,
//!   "files": {
//!     "WEB-INF/lib/records.jar": {
//!       "module": "records",
//!       "installed_at": 1700000000000,
//!       "sha256": "9f86d08..."
//!     }
//!   },
//!   "modules": {
//!     "records": {
//!       "version": "1.0",
//!       "archive": "records-1.0.amp",
//!       "installed_at": 1700000000000,
//!       "files": 1
//!     }
//!   }
//! }
//! ```
//!
//! Entries are keyed by target-relative path and replaced on every install,
//! never accumulated. A file that cannot be parsed is treated as empty and
//! rewritten on the next successful install.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const RECORDS_SUFFIX: &str = ".overlay.json";
const LOCK_SUFFIX: &str = ".overlay.lock";
const SCHEMA_VERSION: u32 = 1;

/// Errors raised while reading or writing the record store.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The record file exists but could not be read.
    #[error("failed to read overlay records {path}: {source}")]
    Read {
        /// Record file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Serialising the records failed.
    #[error("failed to serialise overlay records: {source}")]
    Serialize {
        /// Underlying serialisation error.
        #[source]
        source: serde_json::Error,
    },

    /// The record file could not be written.
    #[error("failed to write overlay records {path}: {source}")]
    Write {
        /// Record file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Returns `<target>.overlay.json`.
#[must_use]
pub fn records_path(target: &Path) -> PathBuf {
    sibling_with_suffix(target, RECORDS_SUFFIX)
}

/// Returns `<target>.overlay.lock`.
#[must_use]
pub fn lock_path(target: &Path) -> PathBuf {
    sibling_with_suffix(target, LOCK_SUFFIX)
}

fn sibling_with_suffix(target: &Path, suffix: &str) -> PathBuf {
    let mut name = target
        .file_name()
        .map_or_else(|| OsString::from("target"), ToOwned::to_owned);
    name.push(suffix);
    target.with_file_name(name)
}

/// One installed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Module id that installed the file.
    pub module: String,
    /// Install time in epoch milliseconds.
    pub installed_at: u64,
    /// Lowercase hex SHA-256 of the installed content.
    pub sha256: String,
}

/// Summary of one installed module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    /// Module version from the archive metadata.
    pub version: String,
    /// Archive file name the module came from.
    pub archive: String,
    /// Install time in epoch milliseconds.
    pub installed_at: u64,
    /// Number of files installed by the last run of this module.
    pub files: usize,
}

/// Every file and module recorded for one deployment target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayRecord {
    schema: u32,
    #[serde(default)]
    files: BTreeMap<String, FileRecord>,
    #[serde(default)]
    modules: BTreeMap<String, ModuleRecord>,
}

impl Default for OverlayRecord {
    fn default() -> Self {
        Self {
            schema: SCHEMA_VERSION,
            files: BTreeMap::new(),
            modules: BTreeMap::new(),
        }
    }
}

impl OverlayRecord {
    /// Returns true when `path` was installed by an earlier run.
    #[must_use]
    pub fn is_tracked(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Looks up the record for a target-relative path.
    #[must_use]
    pub fn file(&self, path: &str) -> Option<&FileRecord> {
        self.files.get(path)
    }

    /// Looks up a module summary by id.
    #[must_use]
    pub fn module(&self, id: &str) -> Option<&ModuleRecord> {
        self.modules.get(id)
    }

    /// Every recorded file in path order.
    pub fn files(&self) -> impl Iterator<Item = (&str, &FileRecord)> {
        self.files.iter().map(|(path, record)| (path.as_str(), record))
    }

    /// Every recorded module in id order.
    pub fn modules(&self) -> impl Iterator<Item = (&str, &ModuleRecord)> {
        self.modules.iter().map(|(id, record)| (id.as_str(), record))
    }

    /// Paths currently attributed to module `id`.
    pub fn files_for_module<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a str> {
        self.files
            .iter()
            .filter(move |(_, record)| record.module == id)
            .map(|(path, _)| path.as_str())
    }

    /// Records or replaces the entry for `path`.
    pub fn record_file(&mut self, path: impl Into<String>, record: FileRecord) {
        self.files.insert(path.into(), record);
    }

    /// Records or replaces the summary for module `id`.
    pub fn record_module(&mut self, id: impl Into<String>, record: ModuleRecord) {
        self.modules.insert(id.into(), record);
    }

    /// Returns true when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.modules.is_empty()
    }
}

/// Reads and writes the record file of one deployment target.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    /// Store for the deployment target at `target`.
    #[must_use]
    pub fn for_target(target: &Path) -> Self {
        Self {
            path: records_path(target),
        }
    }

    /// Location of the record file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the records, returning an empty set when none exist yet.
    ///
    /// A malformed file is logged and treated as empty.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Read`] when an existing file cannot be read.
    pub fn load(&self) -> Result<OverlayRecord, RecordError> {
        if !self.path.exists() {
            return Ok(OverlayRecord::default());
        }

        let content = fs::read_to_string(&self.path).map_err(|source| RecordError::Read {
            path: self.path.clone(),
            source,
        })?;

        match serde_json::from_str::<OverlayRecord>(&content) {
            Ok(record) => Ok(record),
            Err(err) => {
                warn!(
                    "ignoring malformed overlay records {}: {err}",
                    self.path.display()
                );
                Ok(OverlayRecord::default())
            }
        }
    }

    /// Atomically replaces the record file with `record`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Serialize`] or [`RecordError::Write`].
    pub fn save(&self, record: &OverlayRecord) -> Result<(), RecordError> {
        let write_error = |source| RecordError::Write {
            path: self.path.clone(),
            source,
        };
        let json = serde_json::to_string_pretty(record)
            .map_err(|source| RecordError::Serialize { source })?;

        let parent = self
            .path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(write_error)?;
        temp.write_all(json.as_bytes()).map_err(write_error)?;
        temp.write_all(b"\n").map_err(write_error)?;
        temp.persist(&self.path)
            .map_err(|err| write_error(err.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn file(module: &str) -> FileRecord {
        FileRecord {
            module: module.to_owned(),
            installed_at: 1_700_000_000_000,
            sha256: "ab".repeat(32),
        }
    }

    #[rstest]
    #[case::directory("/srv/app/webapp", "/srv/app/webapp.overlay.json")]
    #[case::packed("/srv/app/share.war", "/srv/app/share.war.overlay.json")]
    fn records_sit_next_to_the_target(#[case] target: &str, #[case] expected: &str) {
        assert_eq!(records_path(Path::new(target)), PathBuf::from(expected));
    }

    #[test]
    fn lock_sits_next_to_the_target() {
        assert_eq!(
            lock_path(Path::new("/srv/app/webapp")),
            PathBuf::from("/srv/app/webapp.overlay.lock")
        );
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = TempDir::new().expect("temp dir");
        let store = RecordStore::for_target(&dir.path().join("webapp"));
        assert!(store.load().expect("load").is_empty());
    }

    #[test]
    fn save_then_load_preserves_lookups() {
        let dir = TempDir::new().expect("temp dir");
        let store = RecordStore::for_target(&dir.path().join("webapp"));
        let mut record = OverlayRecord::default();
        record.record_file("WEB-INF/lib/a.jar", file("records"));
        record.record_file("css/site.css", file("theme"));
        record.record_module(
            "records",
            ModuleRecord {
                version: "1.0".to_owned(),
                archive: "records-1.0.amp".to_owned(),
                installed_at: 1_700_000_000_000,
                files: 1,
            },
        );

        store.save(&record).expect("save");
        let loaded = store.load().expect("load");

        assert_eq!(loaded, record);
        assert!(loaded.is_tracked("css/site.css"));
        assert_eq!(loaded.module("records").map(|m| m.files), Some(1));
        let owned: Vec<_> = loaded.files_for_module("records").collect();
        assert_eq!(owned, ["WEB-INF/lib/a.jar"]);
    }

    #[test]
    fn replacing_a_path_does_not_accumulate() {
        let mut record = OverlayRecord::default();
        record.record_file("a.txt", file("first"));
        record.record_file("a.txt", file("second"));
        assert_eq!(record.files().count(), 1);
        assert_eq!(record.file("a.txt").map(|f| f.module.as_str()), Some("second"));
    }

    #[test]
    fn malformed_file_is_treated_as_empty() {
        let dir = TempDir::new().expect("temp dir");
        let store = RecordStore::for_target(&dir.path().join("webapp"));
        fs::write(store.path(), "{not json").expect("write corrupt records");

        assert!(store.load().expect("load").is_empty());
    }

    #[test]
    fn save_leaves_no_temporary_files() {
        let dir = TempDir::new().expect("temp dir");
        let store = RecordStore::for_target(&dir.path().join("webapp"));
        store.save(&OverlayRecord::default()).expect("save");

        let names: Vec<_> = fs::read_dir(dir.path())
            .expect("list")
            .map(|entry| entry.expect("entry").file_name())
            .collect();
        assert_eq!(names, [OsString::from("webapp.overlay.json")]);
    }
}
