//! Error types for assembly, overlay install and the `ampkit` binary.
//!
//! Each variant names the path or field at fault so the message printed by
//! the binary is actionable on its own. Non-fatal conditions such as missing
//! resource directories or install conflicts are not errors; they are
//! reported in the run summaries instead.

use std::path::PathBuf;

use ampkit_common::{ConfigError, PatternError};
use thiserror::Error;

use crate::archive::ArchiveError;
use crate::deps::DependencyError;
use crate::overlay::records::RecordError;
use crate::resources::RuleError;

/// Errors that abort an assembly run.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// The project configuration is incomplete.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A resource pattern is invalid.
    #[error(transparent)]
    Pattern(#[from] PatternError),

    /// A resource directory could not be walked.
    #[error(transparent)]
    Rules(#[from] RuleError),

    /// Dependency bundling failed.
    #[error(transparent)]
    Dependencies(#[from] DependencyError),

    /// The archive could not be written or published.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// The staging directory cannot be created or written.
    #[error("staging directory {} is not writable: {source}", .path.display())]
    StagingNotWritable {
        /// Staging directory.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A file could not be copied into staging.
    #[error("cannot stage {} as {}: {source}", .from.display(), .to.display())]
    Stage {
        /// Source file.
        from: PathBuf,
        /// Destination inside staging.
        to: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A filtered resource could not be read or written.
    #[error("cannot filter {}: {source}", .path.display())]
    Filter {
        /// Source file of the filtered copy.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The staged module metadata could not be patched.
    #[error("cannot patch module version in {}: {source}", .path.display())]
    MetadataPatch {
        /// Staged metadata file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors that abort an overlay install.
///
/// Per-file copy failures are not errors; they are reported as conflicts.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// The deployment target exists but cannot be read or written.
    #[error("deployment target {} is unreachable: {source}", .path.display())]
    TargetUnreachable {
        /// Deployment target.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A module archive could not be expanded.
    #[error("cannot expand module archive {}: {source}", .archive.display())]
    Extract {
        /// Module archive.
        archive: PathBuf,
        /// Underlying codec error.
        #[source]
        source: ArchiveError,
    },

    /// A packed deployment target could not be expanded or repacked.
    #[error("cannot rewrite packed target {}: {source}", .path.display())]
    Repack {
        /// Packed deployment target.
        path: PathBuf,
        /// Underlying codec error.
        #[source]
        source: ArchiveError,
    },

    /// Module metadata inside an archive could not be read.
    #[error("cannot read {} from {}: {source}", .file, .archive.display())]
    Metadata {
        /// Module archive.
        archive: PathBuf,
        /// Metadata file name.
        file: &'static str,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The install lock could not be acquired.
    #[error("cannot lock deployment target via {}: {source}", .path.display())]
    Lock {
        /// Lock file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A scratch directory could not be created.
    #[error("cannot create scratch directory: {source}")]
    Scratch {
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The record store could not be read or written.
    #[error(transparent)]
    Records(#[from] RecordError),
}

/// Errors surfaced by the `ampkit` binary.
#[derive(Debug, Error)]
pub enum AmpkitError {
    /// Configuration could not be loaded or is incomplete.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Assembly failed.
    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    /// Overlay install failed.
    #[error(transparent)]
    Overlay(#[from] OverlayError),

    /// The dependency manifest could not be loaded.
    #[error(transparent)]
    Dependencies(#[from] DependencyError),

    /// The record store could not be read.
    #[error(transparent)]
    Records(#[from] RecordError),

    /// Install was requested without a deployment target.
    #[error("no deployment target configured; pass --target or set install.target")]
    MissingTarget,

    /// The current directory could not be determined.
    #[error("cannot determine the current directory: {source}")]
    CurrentDir {
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write output.
    #[error("failed to write output")]
    WriteFailed {
        /// The underlying error that caused the write to fail.
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias using [`AmpkitError`].
pub type Result<T> = std::result::Result<T, AmpkitError>;
