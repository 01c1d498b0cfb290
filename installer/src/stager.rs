//! Staging directory management.
//!
//! The stager owns the on-disk layout that is later packed into the module
//! archive. Staging is recreated from scratch on every run so stale files
//! from an earlier build never leak into the archive.

use std::fs;
use std::path::{Path, PathBuf};

use ampkit_common::{SubstitutionTable, filter_file};
use log::{debug, warn};

use crate::archive::packaging::pack_directory;
use crate::deps::LibraryEntry;
use crate::error::AssemblyError;
use crate::resources::StagingPlan;
use crate::resources::presets::METADATA_FILES;
use crate::version::{ModuleIdentity, patch_metadata_version};

/// Directory inside staging receiving bundled libraries and the module jar.
pub const LIB_DIR: &str = "lib";

/// Handles writing files into the staging directory.
pub struct Stager {
    staging_dir: PathBuf,
}

impl Stager {
    /// Create a new stager rooted at `staging_dir`.
    #[must_use]
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
        }
    }

    /// Return the staging directory.
    #[must_use]
    pub fn staging_path(&self) -> &Path {
        &self.staging_dir
    }

    /// Recreate an empty staging directory and verify it is writable.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::StagingNotWritable`] if the directory cannot
    /// be cleared, created or written.
    pub fn prepare(&self) -> Result<(), AssemblyError> {
        let not_writable = |source| AssemblyError::StagingNotWritable {
            path: self.staging_dir.clone(),
            source,
        };

        if self.staging_dir.exists() {
            fs::remove_dir_all(&self.staging_dir).map_err(not_writable)?;
        }
        fs::create_dir_all(&self.staging_dir).map_err(not_writable)?;

        // Verify writability by attempting to create a temp file
        tempfile::tempfile_in(&self.staging_dir).map_err(not_writable)?;
        Ok(())
    }

    /// Copy every plan entry into staging, filtering where requested.
    ///
    /// Returns the number of staged files.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::Filter`] when a filtered source cannot be
    /// read or written and [`AssemblyError::Stage`] for a failed plain copy.
    pub fn stage_plan(
        &self,
        plan: &StagingPlan,
        table: &SubstitutionTable,
    ) -> Result<usize, AssemblyError> {
        for entry in plan.entries() {
            let destination = self.destination(&entry.target);
            self.ensure_parent(&entry.source, &destination)?;
            if entry.filtered {
                filter_file(&entry.source, &destination, table).map_err(|source| {
                    AssemblyError::Filter {
                        path: entry.source.clone(),
                        source,
                    }
                })?;
            } else {
                copy(&entry.source, &destination)?;
            }
            debug!(
                "staged {} -> {}{}",
                entry.source.display(),
                entry.target,
                if entry.filtered { " (filtered)" } else { "" }
            );
        }
        Ok(plan.len())
    }

    /// Copy bundled libraries into `lib/`.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::Stage`] if a library cannot be copied.
    pub fn stage_libraries(&self, libraries: &[LibraryEntry]) -> Result<Vec<PathBuf>, AssemblyError> {
        libraries
            .iter()
            .map(|library| {
                let destination = self.staging_dir.join(LIB_DIR).join(&library.file_name);
                self.ensure_parent(&library.source, &destination)?;
                copy(&library.source, &destination)?;
                debug!("bundled {} as lib/{}", library.id, library.file_name);
                Ok(destination)
            })
            .collect()
    }

    /// Pack `classes_dir` into `lib/<jar_name>` when it exists.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::Archive`] if the jar cannot be written.
    pub fn stage_module_jar(
        &self,
        classes_dir: &Path,
        jar_name: &str,
    ) -> Result<Option<PathBuf>, AssemblyError> {
        if !classes_dir.is_dir() {
            debug!(
                "classes directory {} not found; no module jar",
                classes_dir.display()
            );
            return Ok(None);
        }
        let destination = self.staging_dir.join(LIB_DIR).join(jar_name);
        let files = pack_directory(classes_dir, &destination, None)?;
        if files == 0 {
            warn!("module jar {jar_name} is empty");
        }
        Ok(Some(destination))
    }

    /// Replace the raw version with the normalised one in staged metadata.
    ///
    /// Returns the metadata files that changed.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::MetadataPatch`] if a file cannot be rewritten.
    pub fn patch_metadata(&self, identity: &ModuleIdentity) -> Result<Vec<PathBuf>, AssemblyError> {
        let mut patched = Vec::new();
        for name in METADATA_FILES {
            let path = self.staging_dir.join(name);
            if !path.is_file() {
                continue;
            }
            let changed = patch_metadata_version(
                &path,
                identity.raw_version(),
                identity.normalized_version(),
            )
            .map_err(|source| AssemblyError::MetadataPatch {
                path: path.clone(),
                source,
            })?;
            if changed {
                patched.push(path);
            }
        }
        Ok(patched)
    }

    fn destination(&self, target: &str) -> PathBuf {
        target
            .split('/')
            .fold(self.staging_dir.clone(), |path, segment| path.join(segment))
    }

    fn ensure_parent(&self, source: &Path, destination: &Path) -> Result<(), AssemblyError> {
        let Some(parent) = destination.parent() else {
            return Ok(());
        };
        fs::create_dir_all(parent).map_err(|err| AssemblyError::Stage {
            from: source.to_path_buf(),
            to: destination.to_path_buf(),
            source: err,
        })
    }
}

fn copy(source: &Path, destination: &Path) -> Result<(), AssemblyError> {
    fs::copy(source, destination)
        .map(|_| ())
        .map_err(|err| AssemblyError::Stage {
            from: source.to_path_buf(),
            to: destination.to_path_buf(),
            source: err,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{ResourceRule, evaluate};
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    struct Workspace {
        dir: TempDir,
        stager: Stager,
    }

    impl Workspace {
        fn write(&self, relative: &str, content: &str) -> PathBuf {
            let path = self.dir.path().join(relative);
            fs::create_dir_all(path.parent().expect("parent")).expect("create parent");
            fs::write(&path, content).expect("write");
            path
        }

        fn staged(&self, relative: &str) -> String {
            fs::read_to_string(self.stager.staging_path().join(relative)).expect("staged file")
        }
    }

    #[fixture]
    fn workspace() -> Workspace {
        let dir = TempDir::new().expect("temp dir");
        let stager = Stager::new(dir.path().join("target/amp"));
        Workspace { dir, stager }
    }

    #[rstest]
    fn prepare_clears_previous_staging(workspace: Workspace) {
        let stale = workspace.write("target/amp/stale.txt", "old");

        workspace.stager.prepare().expect("prepare");

        assert!(!stale.exists());
        assert!(workspace.stager.staging_path().is_dir());
        assert_eq!(
            fs::read_dir(workspace.stager.staging_path())
                .expect("list")
                .count(),
            0
        );
    }

    #[rstest]
    fn stage_plan_filters_only_flagged_entries(workspace: Workspace) {
        workspace.write("src/a.properties", "id=${project.artifactId}\n");
        workspace.write("web/b.js", "var id = '${project.artifactId}';\n");
        let rules = [
            ResourceRule::new(workspace.dir.path().join("src"), "").with_filtering(true),
            ResourceRule::new(workspace.dir.path().join("web"), "web"),
        ];
        let plan = evaluate(&rules).expect("evaluate");
        let table: SubstitutionTable = [("project.artifactId", "records")].into_iter().collect();
        workspace.stager.prepare().expect("prepare");

        let staged = workspace.stager.stage_plan(&plan, &table).expect("stage");

        assert_eq!(staged, 2);
        assert_eq!(workspace.staged("a.properties"), "id=records\n");
        assert_eq!(
            workspace.staged("web/b.js"),
            "var id = '${project.artifactId}';\n"
        );
    }

    #[rstest]
    fn stage_libraries_copies_by_file_name(workspace: Workspace) {
        let jar = workspace.write("repo/core-1.0.jar", "jar");
        workspace.stager.prepare().expect("prepare");

        let staged = workspace
            .stager
            .stage_libraries(&[LibraryEntry {
                file_name: "core-1.0.jar".to_owned(),
                source: jar,
                id: "org.example:core:1.0".to_owned(),
            }])
            .expect("stage libraries");

        assert_eq!(staged.len(), 1);
        assert_eq!(workspace.staged("lib/core-1.0.jar"), "jar");
    }

    #[rstest]
    fn stage_libraries_reports_missing_artifact(workspace: Workspace) {
        workspace.stager.prepare().expect("prepare");

        let err = workspace
            .stager
            .stage_libraries(&[LibraryEntry {
                file_name: "gone.jar".to_owned(),
                source: workspace.dir.path().join("repo/gone.jar"),
                id: "gone".to_owned(),
            }])
            .expect_err("missing artifact");

        assert!(matches!(err, AssemblyError::Stage { .. }));
    }

    #[rstest]
    fn module_jar_is_skipped_without_classes(workspace: Workspace) {
        workspace.stager.prepare().expect("prepare");
        let jar = workspace
            .stager
            .stage_module_jar(&workspace.dir.path().join("classes"), "records.jar")
            .expect("stage jar");
        assert!(jar.is_none());
    }

    #[rstest]
    fn module_jar_packs_classes(workspace: Workspace) {
        workspace.write("classes/org/example/Records.class", "bytecode");
        workspace.stager.prepare().expect("prepare");

        let jar = workspace
            .stager
            .stage_module_jar(&workspace.dir.path().join("classes"), "records.jar")
            .expect("stage jar")
            .expect("jar written");

        assert!(jar.ends_with("lib/records.jar"));
        assert!(jar.is_file());
    }

    #[rstest]
    fn patch_metadata_rewrites_staged_module_properties(workspace: Workspace) {
        workspace.stager.prepare().expect("prepare");
        workspace.write("target/amp/module.properties", "module.version=1.0-SNAPSHOT\n");
        let identity = ModuleIdentity::new("records", "1.0-SNAPSHOT", "1.0");

        let patched = workspace.stager.patch_metadata(&identity).expect("patch");

        assert_eq!(patched.len(), 1);
        assert_eq!(workspace.staged("module.properties"), "module.version=1.0\n");
    }

    #[cfg(unix)]
    #[rstest]
    fn prepare_rejects_read_only_parent(workspace: Workspace) {
        use std::os::unix::fs::PermissionsExt;

        // Root bypasses directory permissions.
        if unsafe { libc::geteuid() } == 0 {
            return;
        }
        let parent = workspace.dir.path().join("target");
        fs::create_dir_all(&parent).expect("create parent");
        fs::set_permissions(&parent, fs::Permissions::from_mode(0o555)).expect("chmod");

        let result = workspace.stager.prepare();

        fs::set_permissions(&parent, fs::Permissions::from_mode(0o755)).expect("restore");
        assert!(
            matches!(result, Err(AssemblyError::StagingNotWritable { .. })),
            "expected StagingNotWritable, got {result:?}"
        );
    }
}
