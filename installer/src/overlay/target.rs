//! Deployment targets: exploded directories and packed archives.
//!
//! Planning and applying always work against a directory. A packed target
//! is expanded into a scratch directory on open and repacked over the
//! original on [`DeploymentTarget::commit`]; until then the original archive
//! is untouched.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use tempfile::TempDir;

use crate::archive::{ArchiveError, ArchiveExtractor};
use crate::archive::packaging::pack_directory;
use crate::error::OverlayError;

/// A deployment target opened for planning or applying.
#[derive(Debug)]
pub enum DeploymentTarget {
    /// An exploded directory modified in place.
    Directory(PathBuf),
    /// A zip archive expanded into a scratch directory.
    Packed {
        /// The archive on disk.
        archive: PathBuf,
        /// Scratch directory holding the expanded contents.
        scratch: TempDir,
    },
}

impl DeploymentTarget {
    /// Opens the target at `path`, or returns `None` when nothing exists
    /// there.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::TargetUnreachable`] when the target exists but
    /// cannot be read and [`OverlayError::Repack`] when a packed target
    /// cannot be expanded.
    pub fn open(path: &Path, extractor: &dyn ArchiveExtractor) -> Result<Option<Self>, OverlayError> {
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(OverlayError::TargetUnreachable {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        if metadata.is_dir() {
            fs::read_dir(path).map_err(|source| OverlayError::TargetUnreachable {
                path: path.to_path_buf(),
                source,
            })?;
            return Ok(Some(Self::Directory(path.to_path_buf())));
        }

        let scratch = TempDir::new().map_err(|source| OverlayError::Scratch { source })?;
        let files = extractor
            .extract(path, scratch.path())
            .map_err(|source| OverlayError::Repack {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(
            "expanded packed target {} ({} file(s))",
            path.display(),
            files.len()
        );
        Ok(Some(Self::Packed {
            archive: path.to_path_buf(),
            scratch,
        }))
    }

    /// Path of the target as given by the caller.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Directory(path) => path,
            Self::Packed { archive, .. } => archive,
        }
    }

    /// Directory that planning and applying operate on.
    #[must_use]
    pub fn root(&self) -> &Path {
        match self {
            Self::Directory(path) => path,
            Self::Packed { scratch, .. } => scratch.path(),
        }
    }

    /// Returns true for a packed target.
    #[must_use]
    pub fn is_packed(&self) -> bool {
        matches!(self, Self::Packed { .. })
    }

    /// Publishes the applied changes.
    ///
    /// A directory needs nothing further. A packed target is repacked over
    /// the original archive, keeping its permissions.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::Repack`] when the archive cannot be rewritten.
    pub fn commit(self) -> Result<(), OverlayError> {
        let Self::Packed { archive, scratch } = self else {
            return Ok(());
        };
        let repack_error = |source: ArchiveError| OverlayError::Repack {
            path: archive.clone(),
            source,
        };

        let permissions = fs::metadata(&archive)
            .map_err(|err| repack_error(err.into()))?
            .permissions();
        let files = pack_directory(scratch.path(), &archive, None).map_err(repack_error)?;
        fs::set_permissions(&archive, permissions).map_err(|err| repack_error(err.into()))?;
        info!("repacked {} ({files} file(s))", archive.display());
        Ok(())
    }
}
