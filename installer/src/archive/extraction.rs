//! Archive extraction for module archives and packed deployment targets.
//!
//! Extracts zip containers to a target directory with path traversal
//! protection to prevent zip-slip attacks.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Component, Path, PathBuf};

use zip::ZipArchive;

use super::error::{ArchiveError, Result};

/// Trait for extracting archives, enabling test mocking.
///
/// # Examples
///
/// ```
/// use ampkit_installer::archive::extraction::ZipExtractor;
///
/// let extractor = ZipExtractor;
/// // Use extractor.extract(archive_path, dest_dir) in production
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveExtractor {
    /// Extract the archive at `archive_path` into `dest_dir`.
    ///
    /// Returns the `/`-separated relative paths of the extracted files,
    /// sorted.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::PathTraversal`] if any entry attempts to
    /// escape the destination directory, [`ArchiveError::Zip`] for a
    /// malformed container and [`ArchiveError::Io`] on I/O failures.
    fn extract(&self, archive_path: &Path, dest_dir: &Path) -> Result<Vec<String>>;
}

/// Default extractor backed by the `zip` crate.
///
/// Every entry name is validated before the first file is written, so a
/// rejected archive leaves nothing behind in the destination.
pub struct ZipExtractor;

impl ArchiveExtractor for ZipExtractor {
    fn extract(&self, archive_path: &Path, dest_dir: &Path) -> Result<Vec<String>> {
        let file = File::open(archive_path)?;
        let mut archive = ZipArchive::new(BufReader::new(file))?;
        for name in archive.file_names() {
            validate_entry_path(name)?;
        }

        let mut extracted = Vec::new();
        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            let relative = validate_entry_path(entry.name())?;
            if relative.as_os_str().is_empty() {
                continue;
            }

            let dest_path = dest_dir.join(&relative);
            if entry.is_dir() {
                fs::create_dir_all(&dest_path)?;
                continue;
            }
            if let Some(parent) = dest_path.parent() {
                fs::create_dir_all(parent)?;
            }

            let mut output = File::create(&dest_path)?;
            io::copy(&mut entry, &mut output)?;
            extracted.push(slash_path(&relative));
        }

        extracted.sort();
        Ok(extracted)
    }
}

/// Validate that an entry name does not escape the destination directory
/// via `..` components, drive prefixes or absolute paths.
pub(crate) fn validate_entry_path(name: &str) -> Result<PathBuf> {
    let normalised = name.replace('\\', "/");
    let path = Path::new(&normalised);
    if path.is_absolute() || normalised.starts_with('/') {
        return Err(ArchiveError::PathTraversal {
            path: name.to_owned(),
        });
    }

    let mut relative = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ArchiveError::PathTraversal {
                    path: name.to_owned(),
                });
            }
        }
    }
    Ok(relative)
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
