//! Error types for the zip archive codec.
//!
//! Covers reading, writing and publishing module archives and packed
//! deployment targets.

use std::path::PathBuf;

use thiserror::Error;

/// Errors arising while packing or expanding archives.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// An I/O operation failed while reading sources or writing entries.
    #[error("archive I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The zip container is malformed or could not be written.
    #[error("zip format error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// An entry name attempts to escape the extraction directory.
    #[error("path traversal detected in archive entry: {path}")]
    PathTraversal {
        /// The offending entry name.
        path: String,
    },

    /// The directory that should receive the archive could not be created.
    #[error("cannot create output directory {path}: {source}")]
    OutputDirectory {
        /// Directory that could not be created or written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The finished archive could not be renamed onto its final path.
    #[error("cannot publish archive to {path}: {source}")]
    Publish {
        /// Final archive path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias using [`ArchiveError`].
pub type Result<T> = std::result::Result<T, ArchiveError>;
