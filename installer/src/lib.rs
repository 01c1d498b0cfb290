//! ampkit assembly and overlay-install engine.
//!
//! This crate turns a project layout into a versioned module archive and
//! merges module archives onto deployed web applications. It is used by the
//! `ampkit` CLI binary and can be driven programmatically for testing or
//! custom build integrations.
//!
//! # Modules
//!
//! - [`archive`] - Zip codec adapter: deterministic packing, safe expansion
//! - [`assembler`] - Assembly orchestration from configuration to archive
//! - [`cli`] - Command-line argument definitions and configuration loading
//! - [`deps`] - Dependency manifest loading and bundling selection
//! - [`error`] - Error types with the failing path or field named
//! - [`list`] - The `list` command
//! - [`list_output`] - Output formatting for module listings
//! - [`output`] - Run summaries for assembly and install
//! - [`overlay`] - Overlay installation onto deployment targets
//! - [`resources`] - Resource rule evaluation into a staging plan
//! - [`stager`] - Staging directory population and metadata patching
//! - [`version`] - Version normalisation and module identity

pub mod archive;
pub mod assembler;
pub mod cli;
pub mod deps;
pub mod error;
pub mod list;
pub mod list_output;
pub mod output;
pub mod overlay;
pub mod resources;
pub mod stager;
pub mod version;
