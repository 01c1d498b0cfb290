//! Tests for the overlay install flow.

use super::*;
use crate::archive::ZipExtractor;
use crate::archive::extraction::MockArchiveExtractor;
use crate::archive::packaging::pack_directory;
use crate::deps::Scope;
use ampkit_common::FixedClock;
use ampkit_common::clock::MockClock;
use rstest::{fixture, rstest};
use tempfile::TempDir;
use walkdir::WalkDir;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path(relative);
        fs::create_dir_all(path.parent().expect("parent")).expect("create parent");
        fs::write(&path, content).expect("write file");
        path
    }

    /// Packs a module archive named `<name>.amp` from `(path, content)` pairs.
    fn module(&self, name: &str, files: &[(&str, &str)]) -> PathBuf {
        let tree = format!("trees/{name}");
        for (path, content) in files {
            self.write(&format!("{tree}/{path}"), content);
        }
        let archive = self.path(&format!("archives/{name}.amp"));
        pack_directory(&self.path(&tree), &archive, None).expect("pack module");
        archive
    }

    fn target(&self) -> PathBuf {
        let target = self.path("webapp");
        fs::create_dir_all(&target).expect("create target");
        target
    }

    fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.path(relative)).expect("read file")
    }
}

#[fixture]
fn workspace() -> Workspace {
    Workspace {
        dir: TempDir::new().expect("temp dir"),
    }
}

fn request(target: PathBuf, archives: Vec<PathBuf>, force: bool, backup: bool) -> InstallRequest {
    InstallRequest {
        target,
        archives,
        options: InstallOptions {
            force,
            backup,
            ..InstallOptions::default()
        },
    }
}

fn relative_files(root: &Path) -> Vec<String> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .map(|entry| entry.expect("walk entry"))
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .expect("below root")
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect()
}

const ROOT_MAPPING: (&str, &str) = ("file-mapping.properties", "/web=/\n");
const METADATA: (&str, &str) = ("module.properties", "module.id=records\nmodule.version=1.0\n");

#[test]
fn nothing_to_install_is_a_no_op() {
    let outcome = install(
        &request(PathBuf::from("/nowhere"), Vec::new(), true, false),
        &MockArchiveExtractor::new(),
        &FixedClock::new(0),
    )
    .expect("install");

    assert_eq!(outcome.status, InstallStatus::NoOp(NoOpReason::NoArchives));
}

#[rstest]
fn missing_target_is_a_no_op(workspace: Workspace) {
    let archive = workspace.module("records", &[METADATA]);
    let target = workspace.path("absent");

    let outcome = install(
        &request(target.clone(), vec![archive], true, false),
        &MockArchiveExtractor::new(),
        &FixedClock::new(0),
    )
    .expect("install");

    assert_eq!(outcome.status, InstallStatus::NoOp(NoOpReason::MissingTarget));
    assert!(!records::records_path(&target).exists());
}

#[rstest]
fn untracked_file_is_kept_without_force(workspace: Workspace) {
    let target = workspace.target();
    workspace.write("webapp/a.txt", "original");
    let archive = workspace.module("records", &[METADATA, ROOT_MAPPING, ("web/a.txt", "module")]);

    let outcome = install(
        &request(target.clone(), vec![archive], false, false),
        &ZipExtractor,
        &FixedClock::new(0),
    )
    .expect("install");

    assert_eq!(outcome.status, InstallStatus::Applied);
    assert_eq!(workspace.read("webapp/a.txt"), "original");
    assert_eq!(outcome.conflicts.len(), 1);
    assert_eq!(outcome.conflicts[0].target, "a.txt");
    assert_eq!(outcome.conflicts[0].reason, ConflictReason::Untracked);
    let records = RecordStore::for_target(&target).load().expect("records");
    assert!(!records.is_tracked("a.txt"));
}

#[rstest]
fn untracked_file_is_replaced_with_force(workspace: Workspace) {
    let target = workspace.target();
    workspace.write("webapp/a.txt", "original");
    let archive = workspace.module("records", &[METADATA, ROOT_MAPPING, ("web/a.txt", "module")]);

    let outcome = install(
        &request(target.clone(), vec![archive], true, false),
        &ZipExtractor,
        &FixedClock::new(0),
    )
    .expect("install");

    assert!(outcome.conflicts.is_empty());
    assert_eq!(workspace.read("webapp/a.txt"), "module");
    let records = RecordStore::for_target(&target).load().expect("records");
    assert_eq!(
        records.file("a.txt").map(|record| record.module.as_str()),
        Some("records")
    );
}

#[rstest]
fn overwriting_a_tracked_file_backs_it_up_once(workspace: Workspace) {
    let target = workspace.target();
    let first = workspace.module("records", &[("web/css/site.css", "v1")]);
    install(
        &request(target.clone(), vec![first], true, true),
        &ZipExtractor,
        &FixedClock::new(0),
    )
    .expect("first install");

    let second = workspace.module("records-2", &[("web/css/site.css", "v2")]);
    let outcome = install(
        &request(target.clone(), vec![second], true, true),
        &ZipExtractor,
        &FixedClock::new(0),
    )
    .expect("second install");

    let backups: Vec<_> = relative_files(&target)
        .into_iter()
        .filter(|path| path.ends_with(".bak"))
        .collect();
    assert_eq!(backups, ["css/site.css.bak"]);
    assert_eq!(workspace.read("webapp/css/site.css.bak"), "v1");
    assert_eq!(workspace.read("webapp/css/site.css"), "v2");
    assert_eq!(outcome.backups, ["css/site.css.bak"]);
}

#[rstest]
fn repeated_install_is_idempotent(workspace: Workspace) {
    let target = workspace.target();
    let archive = workspace.module(
        "records",
        &[
            METADATA,
            ("lib/records.jar", "jar"),
            ("config/alfresco/module/records/context.xml", "<beans/>"),
            ("web/css/site.css", "body {}"),
        ],
    );

    install(
        &request(target.clone(), vec![archive.clone()], true, false),
        &ZipExtractor,
        &FixedClock::new(1),
    )
    .expect("first install");
    let once = relative_files(&target);
    let records_once = RecordStore::for_target(&target).load().expect("records");

    install(
        &request(target.clone(), vec![archive], true, false),
        &ZipExtractor,
        &FixedClock::new(2),
    )
    .expect("second install");
    let twice = relative_files(&target);
    let records_twice = RecordStore::for_target(&target).load().expect("records");

    assert_eq!(once, twice);
    assert_eq!(
        once,
        [
            "WEB-INF/classes/alfresco/module/records/context.xml",
            "WEB-INF/classes/alfresco/module/records/module.properties",
            "WEB-INF/lib/records.jar",
            "css/site.css",
        ]
    );
    assert_eq!(records_once.files().count(), records_twice.files().count());
}

#[rstest]
fn absent_single_archive_is_a_no_op(workspace: Workspace) {
    let target = workspace.target();
    let missing = workspace.path("target/records-1.0.amp");

    let outcome = install(
        &request(
            target.clone(),
            collect_archives(&[], "amp", Some(missing.as_path())),
            true,
            false,
        ),
        &ZipExtractor,
        &FixedClock::new(0),
    )
    .expect("install");

    assert_eq!(outcome.status, InstallStatus::NoOp(NoOpReason::NoArchives));
    assert!(!records::records_path(&target).exists());
}

#[rstest]
fn absent_archives_are_skipped_alongside_present_ones(workspace: Workspace) {
    let target = workspace.target();
    let present = workspace.module("records", &[METADATA, ("lib/records.jar", "jar")]);
    let missing = workspace.path("archives/gone.amp");

    let outcome = install(
        &request(target, vec![missing, present], true, false),
        &ZipExtractor,
        &FixedClock::new(0),
    )
    .expect("install");

    assert_eq!(outcome.status, InstallStatus::Applied);
    assert_eq!(outcome.modules.len(), 1);
    assert_eq!(workspace.read("webapp/WEB-INF/lib/records.jar"), "jar");
}

#[rstest]
#[case::mapping(&[("file-mapping.properties", "/web=/../outside\n"), ("web/x.txt", "escaped")])]
#[case::module_id(&[("module.properties", "module.id=../../../../../outside\n"), ("web/x.txt", "escaped")])]
fn archive_metadata_cannot_write_outside_the_target(
    workspace: Workspace,
    #[case] files: &[(&str, &str)],
) {
    let target = workspace.target();
    let archive = workspace.module("escape", files);

    let outcome = install(
        &request(target.clone(), vec![archive], true, false),
        &ZipExtractor,
        &FixedClock::new(0),
    )
    .expect("install");

    assert!(!workspace.path("outside").exists());
    assert!(outcome.count(ActionKind::SkipUnmapped) >= 1);
    for path in relative_files(workspace.dir.path()) {
        assert!(
            !path.starts_with("outside"),
            "{path} was written outside the target"
        );
    }
}

#[rstest]
fn repeated_install_with_backups_changes_nothing(workspace: Workspace) {
    let target = workspace.target();
    workspace.write("webapp/a.txt", "original");
    let archive = workspace.module(
        "records",
        &[METADATA, ROOT_MAPPING, ("web/a.txt", "module")],
    );

    let first = install(
        &request(target.clone(), vec![archive.clone()], true, true),
        &ZipExtractor,
        &FixedClock::new(1),
    )
    .expect("first install");
    let once = relative_files(&target);

    let second = install(
        &request(target.clone(), vec![archive], true, true),
        &ZipExtractor,
        &FixedClock::new(2),
    )
    .expect("second install");

    assert_eq!(first.backups, ["a.txt.bak"]);
    assert!(second.backups.is_empty());
    assert_eq!(relative_files(&target), once);
    assert_eq!(workspace.read("webapp/a.txt.bak"), "original");
}

#[rstest]
fn preview_leaves_the_target_untouched(workspace: Workspace) {
    let target = workspace.target();
    let archive = workspace.module("records", &[METADATA, ("lib/records.jar", "jar"), ("notes.txt", "x")]);
    let mut req = request(target.clone(), vec![archive], true, true);
    req.options.preview = true;

    let outcome = install(&req, &ZipExtractor, &FixedClock::new(0)).expect("preview");

    assert_eq!(outcome.status, InstallStatus::Previewed);
    assert_eq!(outcome.count(ActionKind::Copy), 2);
    assert_eq!(outcome.count(ActionKind::SkipUnmapped), 1);
    assert_eq!(outcome.modules[0].files, 2);
    assert!(relative_files(&target).is_empty());
    assert!(!records::records_path(&target).exists());
    assert!(!records::lock_path(&target).exists());
}

#[rstest]
fn packed_target_is_rewritten(workspace: Workspace) {
    workspace.write("war/WEB-INF/web.xml", "<web-app/>");
    let war = workspace.path("share.war");
    pack_directory(&workspace.path("war"), &war, None).expect("pack war");
    let archive = workspace.module("records", &[METADATA, ("lib/records.jar", "jar")]);

    let outcome = install(
        &request(war.clone(), vec![archive], true, false),
        &ZipExtractor,
        &FixedClock::new(0),
    )
    .expect("install");

    assert_eq!(outcome.status, InstallStatus::Applied);
    let check = TempDir::new().expect("temp dir");
    let files = ZipExtractor.extract(&war, check.path()).expect("extract war");
    assert!(files.contains(&"WEB-INF/lib/records.jar".to_owned()));
    assert!(files.contains(&"WEB-INF/web.xml".to_owned()));
    assert!(records::records_path(&war).exists());
}

#[rstest]
fn install_time_comes_from_the_clock(workspace: Workspace) {
    let target = workspace.target();
    let archive = workspace.module("records", &[METADATA, ("lib/records.jar", "jar")]);
    let mut clock = MockClock::new();
    clock
        .expect_now_millis()
        .times(1)
        .return_const(1_700_000_000_000_u128);

    install(
        &request(target.clone(), vec![archive], true, false),
        &ZipExtractor,
        &clock,
    )
    .expect("install");

    let records = RecordStore::for_target(&target).load().expect("records");
    assert_eq!(
        records.module("records").map(|module| module.installed_at),
        Some(1_700_000_000_000)
    );
    assert_eq!(
        records
            .file("WEB-INF/lib/records.jar")
            .map(|file| file.installed_at),
        Some(1_700_000_000_000)
    );
}

#[rstest]
fn module_id_falls_back_to_archive_stem(workspace: Workspace) {
    let target = workspace.target();
    let archive = workspace.module("anonymous-1.0", &[("lib/a.jar", "jar")]);

    let outcome = install(
        &request(target, vec![archive], true, false),
        &ZipExtractor,
        &FixedClock::new(0),
    )
    .expect("install");

    assert_eq!(outcome.modules[0].id, "anonymous-1.0");
    assert_eq!(outcome.modules[0].version, "");
}

#[rstest]
fn unreadable_archive_is_fatal(workspace: Workspace) {
    let target = workspace.target();
    let archive = workspace.write("archives/broken.amp", "not a zip");

    let err = install(
        &request(target, vec![archive], true, false),
        &ZipExtractor,
        &FixedClock::new(0),
    )
    .expect_err("broken archive");

    assert!(matches!(err, OverlayError::Extract { .. }));
}

#[test]
fn collect_archives_takes_runtime_module_archives_then_single() {
    let dep = |id: &str, scope: Scope, kind: &str| DependencyDescriptor {
        id: id.to_owned(),
        file: PathBuf::from(format!("/repo/{id}.{kind}")),
        scope,
        kind: kind.to_owned(),
        optional: false,
    };
    let deps = vec![
        dep("share", Scope::Runtime, "amp"),
        dep("core", Scope::Compile, "jar"),
        dep("tests", Scope::Test, "amp"),
    ];

    let archives = collect_archives(
        &deps,
        "amp",
        Some(Path::new("/work/target/records-1.0.amp")),
    );

    assert_eq!(
        archives,
        [
            PathBuf::from("/repo/share.amp"),
            PathBuf::from("/work/target/records-1.0.amp"),
        ]
    );
}

#[test]
fn collect_archives_drops_duplicates() {
    let archives = collect_archives(&[], "amp", Some(Path::new("/a.amp")));
    assert_eq!(archives.len(), 1);
}

#[test]
fn outcome_serialises_status_inline() {
    let outcome = InstallOutcome::no_op(Path::new("/srv/webapp"), NoOpReason::MissingTarget);
    let json = serde_json::to_value(&outcome).expect("serialise");
    assert_eq!(json["status"], "no-op");
    assert_eq!(json["reason"], "missing-target");
}
