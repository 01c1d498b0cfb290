//! Module archive assembly.
//!
//! Assembly runs in a fixed sequence: resolve the module identity, evaluate
//! the resource rules, select bundled libraries, stage everything, patch the
//! module metadata with the normalised version and finally pack staging into
//! `<output_dir>/<final_name>[-classifier].amp`.
//!
//! The archive is written to a temporary sibling and renamed into place, so
//! a failed run never leaves a partial archive at the output path.

use std::path::{Path, PathBuf};

use ampkit_common::{Clock, ProjectConfig, SubstitutionTable};
use log::{info, warn};

use crate::archive::ArchiveName;
use crate::archive::packaging::{archive_areas, pack_directory};
use crate::deps::{self, DependencyDescriptor, LibraryEntry};
use crate::error::AssemblyError;
use crate::resources::presets::conventional_rules;
use crate::resources::{StagingPlan, evaluate};
use crate::stager::Stager;
use crate::version::ModuleIdentity;

/// Name of the staging directory below the build directory.
pub const STAGING_DIR: &str = "amp";

/// Summary of a completed assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyReport {
    /// Published module archive.
    pub archive: PathBuf,
    /// Identity the archive was built for.
    pub identity: ModuleIdentity,
    /// Number of resource files staged from the plan.
    pub staged_files: usize,
    /// Files written into the archive.
    pub archived_files: usize,
    /// Bundled libraries, by file name.
    pub bundled: Vec<LibraryEntry>,
    /// Rule source directories that did not exist.
    pub missing_directories: Vec<PathBuf>,
    /// Module jar packed from compiled classes, when present.
    pub module_jar: Option<PathBuf>,
    /// Non-fatal conditions worth surfacing in the run summary.
    pub warnings: Vec<String>,
}

/// Builds the substitution table used for filtered resources.
///
/// Configured `[properties]` win over the built-in `project.*` keys.
#[must_use]
pub fn substitution_table(config: &ProjectConfig, identity: &ModuleIdentity) -> SubstitutionTable {
    let mut table = SubstitutionTable::new();
    for (key, value) in &config.properties {
        table.insert(key.as_str(), value.as_str());
    }
    table.insert_default("project.artifactId", identity.artifact_id());
    table.insert_default("project.version", identity.raw_version());
    table.insert_default(
        "project.name",
        config
            .module
            .name
            .clone()
            .unwrap_or_else(|| identity.artifact_id().to_owned()),
    );
    table.insert_default(
        "project.description",
        config.module.description.clone().unwrap_or_default(),
    );
    table
}

/// Stages a plan and its libraries, then packs the result.
pub struct Assembler {
    stager: Stager,
    table: SubstitutionTable,
    module_jar: Option<(PathBuf, String)>,
}

impl Assembler {
    /// Creates an assembler staging under `staging_dir`.
    #[must_use]
    pub fn new(staging_dir: impl Into<PathBuf>, table: SubstitutionTable) -> Self {
        Self {
            stager: Stager::new(staging_dir),
            table,
            module_jar: None,
        }
    }

    /// Packs `classes_dir` into `lib/<jar_name>` during assembly.
    #[must_use]
    pub fn with_module_jar(mut self, classes_dir: impl Into<PathBuf>, jar_name: String) -> Self {
        self.module_jar = Some((classes_dir.into(), jar_name));
        self
    }

    /// Staging directory used by this assembler.
    #[must_use]
    pub fn staging_path(&self) -> &Path {
        self.stager.staging_path()
    }

    /// Writes the module archive for `plan` and `libraries` to `output_path`.
    ///
    /// # Errors
    ///
    /// Returns an [`AssemblyError`] when staging cannot be written, a
    /// filtered source cannot be read, or the archive cannot be published.
    pub fn assemble(
        &self,
        plan: &StagingPlan,
        identity: &ModuleIdentity,
        libraries: &[LibraryEntry],
        output_path: &Path,
    ) -> Result<AssemblyReport, AssemblyError> {
        let mut warnings = Vec::new();

        self.stager.prepare()?;
        let staged_files = self.stager.stage_plan(plan, &self.table)?;
        self.stager.stage_libraries(libraries)?;

        let module_jar = match &self.module_jar {
            Some((classes_dir, jar_name)) => self.stager.stage_module_jar(classes_dir, jar_name)?,
            None => None,
        };

        for path in self.stager.patch_metadata(identity)? {
            info!(
                "patched {} to version {}",
                path.display(),
                identity.normalized_version()
            );
        }

        if staged_files == 0 && libraries.is_empty() && module_jar.is_none() {
            let message = "no resources, libraries or classes were staged; the archive is empty";
            warn!("{message}");
            warnings.push(message.to_owned());
        }

        let areas = archive_areas()?;
        let archived_files = pack_directory(self.stager.staging_path(), output_path, Some(&areas))?;
        info!(
            "wrote {} ({archived_files} file(s))",
            output_path.display()
        );

        let missing_directories: Vec<PathBuf> =
            plan.missing_directories().map(Path::to_path_buf).collect();
        for directory in &missing_directories {
            warnings.push(format!(
                "resource directory {} does not exist",
                directory.display()
            ));
        }

        Ok(AssemblyReport {
            archive: output_path.to_path_buf(),
            identity: identity.clone(),
            staged_files,
            archived_files,
            bundled: libraries.to_vec(),
            missing_directories,
            module_jar,
            warnings,
        })
    }
}

/// Runs a complete assembly for `config`.
///
/// `dependencies` is the resolved dependency list; it is ignored when
/// bundling is disabled.
///
/// # Errors
///
/// Returns [`AssemblyError::Config`] before any output is written when a
/// required identity field is blank, and any staging or packing error after.
pub fn run_assembly(
    config: &ProjectConfig,
    dependencies: &[DependencyDescriptor],
    clock: &dyn Clock,
) -> Result<AssemblyReport, AssemblyError> {
    config.validate()?;
    let identity = ModuleIdentity::resolve(config, clock);
    info!(
        "assembling {} {} (normalised {})",
        identity.artifact_id(),
        identity.raw_version(),
        identity.normalized_version()
    );

    let rules = conventional_rules(config)?;
    let plan = evaluate(&rules)?;

    let libraries = if config.dependencies.include {
        let selected = deps::select(dependencies, &config.dependencies.allowed_types, true);
        deps::plan_libraries(&selected, config.dependencies.on_collision)?
    } else {
        Vec::new()
    };

    let final_name = config.final_name();
    let classifier = config.module.classifier.as_deref();
    let mut assembler = Assembler::new(
        config.build_dir().join(STAGING_DIR).into_std_path_buf(),
        substitution_table(config, &identity),
    );
    if let Some(classes) = &config.layout.classes_directory {
        let jar = ArchiveName::module_jar(&final_name, classifier);
        assembler = assembler.with_module_jar(config.resolve(classes).into_std_path_buf(), jar.filename());
    }

    let output_path = config
        .output_dir()
        .join(ArchiveName::module(&final_name, classifier).filename())
        .into_std_path_buf();
    assembler.assemble(&plan, &identity, &libraries, &output_path)
}

#[cfg(test)]
#[path = "assembler_tests.rs"]
mod tests;
