//! Zip codec adapter for module archives.
//!
//! # Sub-modules
//!
//! - [`error`] - Error types for packing and expansion.
//! - [`extraction`] - Archive extraction with path traversal protection.
//! - [`naming`] - Archive file naming policy (`ArchiveName`).
//! - [`packaging`] - Deterministic, atomically published archive creation.

pub mod error;
pub mod extraction;
pub mod naming;
pub mod packaging;

pub use error::ArchiveError;
pub use extraction::{ArchiveExtractor, ZipExtractor};
pub use naming::ArchiveName;
pub use packaging::{ArchiveEntry, collect_entries, create_archive, pack_directory};
