//! Deterministic zip packaging.
//!
//! Entries are written in sorted order with a fixed timestamp and fixed
//! permissions, so packing an unchanged tree twice yields byte-identical
//! output. Archives are written to a temporary file beside the destination
//! and renamed into place only once complete.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};

use ampkit_common::PatternSet;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use super::error::{ArchiveError, Result};

/// Staging areas packed into a module archive.
pub const ARCHIVE_AREAS: &[&str] = &["lib/**", "config/**", "web/**", "licenses/**", "*.properties"];

const FILE_PERMISSIONS: u32 = 0o644;
const DIRECTORY_PERMISSIONS: u32 = 0o755;

/// One entry to be written into an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// File on disk supplying the content; unused for directories.
    pub source: PathBuf,
    /// `/`-separated entry name without a trailing slash.
    pub name: String,
    /// True for directory entries.
    pub is_dir: bool,
}

/// Returns the pattern set selecting [`ARCHIVE_AREAS`].
///
/// # Errors
///
/// Never fails for the built-in patterns; the error type is shared with
/// user-supplied pattern sets.
pub fn archive_areas() -> std::result::Result<PatternSet, ampkit_common::PatternError> {
    PatternSet::new(ARCHIVE_AREAS)
}

/// Lists the entries under `root`, sorted by entry name.
///
/// When `filter` is given only matching files are listed, together with the
/// directories that contain them. Without a filter every file and directory
/// is listed. A missing `root` yields no entries.
///
/// # Errors
///
/// Returns [`ArchiveError::Io`] when the tree cannot be walked.
pub fn collect_entries(root: &Path, filter: Option<&PatternSet>) -> Result<Vec<ArchiveEntry>> {
    let mut entries = BTreeMap::new();
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    for item in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let item = item.map_err(io::Error::from)?;
        let name = entry_name(root, item.path());
        if item.file_type().is_dir() {
            if filter.is_none() {
                entries.insert(name.clone(), directory_entry(name));
            }
            continue;
        }
        if !item.file_type().is_file() {
            log::debug!("skipping non-regular file {}", item.path().display());
            continue;
        }
        if filter.is_some_and(|set| !set.matches(&name)) {
            continue;
        }
        for ancestor in ancestors(&name) {
            entries
                .entry(ancestor.to_owned())
                .or_insert_with(|| directory_entry(ancestor.to_owned()));
        }
        entries.insert(
            name.clone(),
            ArchiveEntry {
                source: item.into_path(),
                name,
                is_dir: false,
            },
        );
    }

    Ok(entries.into_values().collect())
}

/// Writes `entries` into a zip container at `output_path`.
///
/// The container is assembled in a temporary file inside the destination
/// directory and renamed over `output_path` on success; on failure nothing
/// is left at `output_path`.
///
/// # Errors
///
/// Returns [`ArchiveError::OutputDirectory`] when the destination directory
/// cannot be created or written, [`ArchiveError::Io`] / [`ArchiveError::Zip`]
/// while writing, and [`ArchiveError::Publish`] when the final rename fails.
pub fn create_archive(output_path: &Path, entries: &[ArchiveEntry]) -> Result<()> {
    let parent = output_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|source| ArchiveError::OutputDirectory {
        path: parent.to_path_buf(),
        source,
    })?;

    let mut temp = tempfile::Builder::new()
        .prefix(".ampkit-")
        .suffix(".part")
        .tempfile_in(parent)
        .map_err(|source| ArchiveError::OutputDirectory {
            path: parent.to_path_buf(),
            source,
        })?;

    write_entries(temp.as_file_mut(), entries)?;

    temp.persist(output_path)
        .map_err(|err| ArchiveError::Publish {
            path: output_path.to_path_buf(),
            source: err.error,
        })?;
    Ok(())
}

/// Packs the tree under `root` into `output_path`, returning the number of
/// files written.
///
/// # Errors
///
/// See [`collect_entries`] and [`create_archive`].
pub fn pack_directory(
    root: &Path,
    output_path: &Path,
    filter: Option<&PatternSet>,
) -> Result<usize> {
    let entries = collect_entries(root, filter)?;
    create_archive(output_path, &entries)?;
    Ok(entries.iter().filter(|entry| !entry.is_dir).count())
}

/// Compute the SHA-256 digest of a file as lowercase hex.
///
/// # Errors
///
/// Returns the I/O error raised while reading `path`.
pub fn compute_sha256(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(buffer.get(..bytes_read).unwrap_or_default());
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn write_entries<W: Write + Seek>(writer: W, entries: &[ArchiveEntry]) -> Result<()> {
    let mut zip = ZipWriter::new(writer);
    for entry in entries {
        if entry.is_dir {
            zip.add_directory(entry.name.as_str(), entry_options(DIRECTORY_PERMISSIONS))?;
            continue;
        }
        zip.start_file(entry.name.as_str(), entry_options(FILE_PERMISSIONS))?;
        let mut source = File::open(&entry.source)?;
        io::copy(&mut source, &mut zip)?;
    }
    zip.finish()?;
    Ok(())
}

fn entry_options(permissions: u32) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(permissions)
}

fn directory_entry(name: String) -> ArchiveEntry {
    ArchiveEntry {
        source: PathBuf::new(),
        name,
        is_dir: true,
    }
}

/// Joins the components of `path` below `root` with `/`.
pub(crate) fn entry_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn ancestors(name: &str) -> impl Iterator<Item = &str> {
    name.match_indices('/')
        .filter_map(move |(index, _)| name.get(..index))
}

#[cfg(test)]
#[path = "packaging_tests.rs"]
mod tests;
