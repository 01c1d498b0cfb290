//! Behaviour tests for overlay installation.
//!
//! Each scenario installs a small module archive onto an exploded target in
//! a temporary directory.

use std::fs;
use std::path::{Path, PathBuf};

use ampkit_common::FixedClock;
use ampkit_installer::archive::{ZipExtractor, pack_directory};
use ampkit_installer::overlay::records::records_path;
use ampkit_installer::overlay::{
    InstallOptions, InstallOutcome, InstallRequest, InstallStatus, NoOpReason, install,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;
use walkdir::WalkDir;

const ORIGINAL: &str = "original content";
const MODULE: &str = "module content";

struct OverlayWorld {
    dir: TempDir,
    archive: Option<PathBuf>,
    options: InstallOptions,
    outcomes: Vec<InstallOutcome>,
    listings: Vec<Vec<(String, String)>>,
}

#[fixture]
fn world() -> OverlayWorld {
    OverlayWorld {
        dir: TempDir::new().expect("temp dir"),
        archive: None,
        options: InstallOptions::default(),
        outcomes: Vec::new(),
        listings: Vec::new(),
    }
}

fn target(world: &OverlayWorld) -> PathBuf {
    world.dir.path().join("webapp")
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().expect("parent")).expect("create parent");
    fs::write(path, content).expect("write file");
}

/// Every file below `root` with its content, sorted by path.
fn listing(root: &Path) -> Vec<(String, String)> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .map(|entry| entry.expect("walk entry"))
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let relative = entry
                .path()
                .strip_prefix(root)
                .expect("below root")
                .to_string_lossy()
                .replace('\\', "/");
            let content = fs::read_to_string(entry.path()).expect("read file");
            (relative, content)
        })
        .collect()
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(parent, _)| parent)
}

#[given("an exploded deployment target containing \"{file}\"")]
fn given_target_with_file(world: &mut OverlayWorld, file: String) {
    write(&target(world).join(file), ORIGINAL);
}

#[given("an empty exploded deployment target")]
fn given_empty_target(world: &mut OverlayWorld) {
    fs::create_dir_all(target(world)).expect("create target");
}

#[given("a module archive that maps \"{source}\" onto \"{destination}\"")]
fn given_module_archive(world: &mut OverlayWorld, source: String, destination: String) {
    let tree = world.dir.path().join("module");
    write(&tree.join(&source), MODULE);
    write(
        &tree.join("file-mapping.properties"),
        &format!("/{}=/{}\n", parent_dir(&source), parent_dir(&destination)),
    );
    let archive = world.dir.path().join("records.amp");
    pack_directory(&tree, &archive, None).expect("pack module archive");
    world.archive = Some(archive);
}

#[given("a module archive that does not exist")]
fn given_absent_archive(world: &mut OverlayWorld) {
    world.archive = Some(world.dir.path().join("target/records-1.0.amp"));
}

#[given("force is disabled")]
fn given_force_disabled(world: &mut OverlayWorld) {
    world.options.force = false;
}

#[given("backups are enabled")]
fn given_backups_enabled(world: &mut OverlayWorld) {
    world.options.backup = true;
}

#[given("preview is enabled")]
fn given_preview_enabled(world: &mut OverlayWorld) {
    world.options.preview = true;
}

#[when("the module archive is installed")]
fn when_installed(world: &mut OverlayWorld) {
    let request = InstallRequest {
        target: target(world),
        archives: world.archive.iter().cloned().collect(),
        options: world.options.clone(),
    };
    let outcome = install(&request, &ZipExtractor, &FixedClock::new(1_700_000_000_000))
        .expect("install succeeds");
    world.outcomes.push(outcome);
    world.listings.push(listing(&target(world)));
}

#[then("the target file \"{file}\" still holds its original content")]
fn then_original_kept(world: &mut OverlayWorld, file: String) {
    let content = fs::read_to_string(target(world).join(file)).expect("read target file");
    assert_eq!(content, ORIGINAL);
}

#[then("the target file \"{file}\" holds the module content")]
fn then_module_content(world: &mut OverlayWorld, file: String) {
    let content = fs::read_to_string(target(world).join(file)).expect("read target file");
    assert_eq!(content, MODULE);
}

#[then("{count:usize} conflict is reported")]
fn then_one_conflict(world: &mut OverlayWorld, count: usize) {
    then_conflicts(world, count);
}

#[then("{count:usize} conflicts are reported")]
fn then_conflicts(world: &mut OverlayWorld, count: usize) {
    let outcome = world.outcomes.last().expect("install ran");
    assert_eq!(outcome.conflicts.len(), count, "{:?}", outcome.conflicts);
}

#[then("exactly {count:usize} backup exists in the target")]
fn then_backup_count(world: &mut OverlayWorld, count: usize) {
    let backups = listing(&target(world))
        .into_iter()
        .filter(|(path, _)| path.ends_with(".bak"))
        .count();
    assert_eq!(backups, count);
}

#[then("the backup holds the original content")]
fn then_backup_original(world: &mut OverlayWorld) {
    let content = fs::read_to_string(target(world).join("a.txt.bak")).expect("read backup");
    assert_eq!(content, ORIGINAL);
}

#[then("the target holds the same files as after the first install")]
fn then_idempotent(world: &mut OverlayWorld) {
    assert_eq!(world.listings.len(), 2);
    assert_eq!(world.listings[0], world.listings[1]);
    assert!(!world.listings[0].is_empty());
}

#[then("the target is still empty")]
fn then_target_empty(world: &mut OverlayWorld) {
    assert!(listing(&target(world)).is_empty());
}

#[then("no overlay records were written")]
fn then_no_records(world: &mut OverlayWorld) {
    assert!(!records_path(&target(world)).exists());
}

#[then("the install reports that there were no archives")]
fn then_no_archives(world: &mut OverlayWorld) {
    let outcome = world.outcomes.last().expect("install ran");
    assert_eq!(outcome.status, InstallStatus::NoOp(NoOpReason::NoArchives));
}

#[then("nothing was written outside the target")]
fn then_nothing_outside(world: &mut OverlayWorld) {
    assert!(!world.dir.path().join("outside").exists());
    let outcome = world.outcomes.last().expect("install ran");
    assert!(
        outcome
            .actions
            .iter()
            .all(|action| action.target.as_deref() != Some("../outside/x.txt"))
    );
}

#[scenario(
    path = "tests/features/overlay.feature",
    name = "An untracked file is kept when force is disabled"
)]
fn scenario_untracked_kept(world: OverlayWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/overlay.feature",
    name = "An untracked file is replaced when force is enabled"
)]
fn scenario_untracked_replaced(world: OverlayWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/overlay.feature",
    name = "Backups are written exactly once"
)]
fn scenario_backup_once(world: OverlayWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/overlay.feature",
    name = "Installing twice changes nothing the second time"
)]
fn scenario_idempotent(world: OverlayWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/overlay.feature",
    name = "Preview leaves the target untouched"
)]
fn scenario_preview(world: OverlayWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/overlay.feature",
    name = "Installing twice with backups enabled changes nothing the second time"
)]
fn scenario_idempotent_with_backups(world: OverlayWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/overlay.feature",
    name = "An absent module archive installs nothing"
)]
fn scenario_absent_archive(world: OverlayWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/overlay.feature",
    name = "A mapping that leaves the target is skipped"
)]
fn scenario_escaping_mapping(world: OverlayWorld) {
    let _ = world;
}
