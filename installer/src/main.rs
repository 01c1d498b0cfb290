//! ampkit CLI entrypoint.
//!
//! This binary assembles module archives from a project layout and overlays
//! them onto exploded or packed web applications. Logs and run summaries go
//! to stderr; `--json` output and listings go to stdout.

use std::io::Write;

use ampkit_common::{ProjectConfig, SystemClock};
use ampkit_installer::archive::ZipExtractor;
use ampkit_installer::assembler::run_assembly;
use ampkit_installer::cli::{
    AssembleArgs, Cli, Command, InstallArgs, load_dependencies, load_project_config,
    resolve_install_paths,
};
use ampkit_installer::error::{AmpkitError, Result};
use ampkit_installer::list::run_list;
use ampkit_installer::output::{assembly_summary, install_json, install_summary};
use ampkit_installer::overlay::{InstallOptions, InstallRequest, collect_archives, install};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

/// Routes `log` records to stderr. `RUST_LOG` wins over `-v`/`-q`.
fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_level(cli)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn default_log_level(cli: &Cli) -> &'static str {
    if cli.quiet {
        return "warn";
    }
    match cli.verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn run(cli: &Cli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<()> {
    match &cli.command {
        Command::Assemble(args) => run_assemble(args, cli.quiet, stderr),
        Command::Install(args) => run_install(args, cli.quiet, stdout, stderr),
        Command::List(args) => run_list(args, stdout),
    }
}

fn current_dir() -> Result<Utf8PathBuf> {
    let cwd = std::env::current_dir().map_err(|source| AmpkitError::CurrentDir { source })?;
    Utf8PathBuf::try_from(cwd).map_err(|err| AmpkitError::CurrentDir {
        source: err.into_io_error(),
    })
}

fn project_config(explicit: Option<&Utf8Path>) -> Result<ProjectConfig> {
    Ok(load_project_config(explicit, &current_dir()?)?)
}

/// Builds the module archive and prints the run summary.
fn run_assemble(args: &AssembleArgs, quiet: bool, stderr: &mut dyn Write) -> Result<()> {
    let mut config = project_config(args.config.as_deref())?;
    args.apply(&mut config);

    let dependencies = if config.dependencies.include {
        load_dependencies(&config)?
    } else {
        Vec::new()
    };
    let report = run_assembly(&config, &dependencies, &SystemClock)?;

    if !quiet {
        write_stderr_line(stderr, assembly_summary(&report));
    }
    Ok(())
}

/// Overlays the collected archives onto the deployment target.
fn run_install(
    args: &InstallArgs,
    quiet: bool,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<()> {
    let mut config = project_config(args.config.as_deref())?;
    args.apply(&mut config);

    let (target, single_archive) = resolve_install_paths(&config);
    let target = target.ok_or(AmpkitError::MissingTarget)?;
    let dependencies = load_dependencies(&config)?;
    let request = InstallRequest {
        target,
        archives: collect_archives(
            &dependencies,
            &config.install.archive_type,
            single_archive.as_deref(),
        ),
        options: InstallOptions::from(&config.install),
    };

    let outcome = install(&request, &ZipExtractor, &SystemClock)?;

    if args.json {
        writeln!(stdout, "{}", install_json(&outcome))
            .map_err(|source| AmpkitError::WriteFailed { source })?;
    } else if !quiet {
        write_stderr_line(stderr, install_summary(&outcome));
    }
    Ok(())
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            1
        }
    }
}

fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}
