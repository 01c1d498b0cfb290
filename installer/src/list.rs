//! List command implementation.
//!
//! Reads the overlay records kept beside a deployment target and prints the
//! modules they name.

use std::io::Write;

use crate::cli::ListArgs;
use crate::error::{AmpkitError, Result};
use crate::list_output::{format_human, format_json};
use crate::overlay::records::RecordStore;

/// Lists the modules recorded for the target named in `args`.
///
/// A target that was never installed to lists as empty. Output is written
/// to `stdout` (human-readable by default, JSON with `--json`).
///
/// # Errors
///
/// Returns an error if:
/// - The record file exists but cannot be read
/// - Writing to stdout fails
pub fn run_list(args: &ListArgs, stdout: &mut dyn Write) -> Result<()> {
    let target = args.target.as_std_path();
    let records = RecordStore::for_target(target).load()?;

    let output = if args.json {
        format_json(&records, target)
    } else {
        format_human(&records, target)
    };

    writeln!(stdout, "{output}").map_err(|e| AmpkitError::WriteFailed { source: e })?;

    Ok(())
}
