//! Behaviour-driven tests for project configuration loading.

use std::cell::RefCell;
use std::convert::Infallible;
use std::str::FromStr;

use ampkit::ProjectConfig;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

#[fixture]
fn config_source() -> RefCell<String> {
    RefCell::new(String::new())
}

#[fixture]
fn load_result() -> RefCell<Option<Result<ProjectConfig, String>>> {
    RefCell::new(None)
}

#[derive(Debug)]
struct ErrorSnippet(String);

impl FromStr for ErrorSnippet {
    type Err = Infallible;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input
            .trim()
            .trim_matches(|candidate| matches!(candidate, '"' | '\''));

        Ok(Self(trimmed.to_owned()))
    }
}

fn loaded(load_result: &RefCell<Option<Result<ProjectConfig, String>>>) -> ProjectConfig {
    match load_result.borrow().as_ref() {
        Some(Ok(config)) => config.clone(),
        Some(Err(error)) => panic!("expected configuration loading to succeed: {error}"),
        None => panic!("configuration should be loaded"),
    }
}

#[given("a configuration declaring module {artifact} at version {version}")]
fn module_section(config_source: &RefCell<String>, artifact: String, version: String) {
    config_source.replace(format!(
        "[module]\nartifact_id = \"{artifact}\"\nversion = \"{version}\"\n"
    ));
}

#[given("a configuration without a module version")]
fn module_without_version(config_source: &RefCell<String>) {
    config_source.replace("[module]\nartifact_id = \"records\"\n".to_owned());
}

#[given("the install section disables force and enables backups")]
fn install_section(config_source: &RefCell<String>) {
    config_source
        .borrow_mut()
        .push_str("\n[install]\nforce = false\nbackup = true\n");
}

#[given("the configuration includes unknown fields")]
fn unknown_fields(config_source: &RefCell<String>) {
    config_source.borrow_mut().push_str("unexpected = true\n");
}

#[when("the project configuration is loaded")]
fn load_config(
    config_source: &RefCell<String>,
    load_result: &RefCell<Option<Result<ProjectConfig, String>>>,
) {
    let outcome = ProjectConfig::from_toml_str(&config_source.borrow())
        .and_then(|config| config.validate().map(|()| config))
        .map_err(|error| error.to_string());
    load_result.replace(Some(outcome));
}

#[then("the final name is {expected}")]
fn assert_final_name(
    load_result: &RefCell<Option<Result<ProjectConfig, String>>>,
    expected: String,
) {
    assert_eq!(loaded(load_result).final_name(), expected);
}

#[then("installs overwrite untracked files by default")]
fn assert_install_defaults(load_result: &RefCell<Option<Result<ProjectConfig, String>>>) {
    let config = loaded(load_result);
    assert!(config.install.force);
    assert!(!config.install.backup);
    assert_eq!(config.install.backup_suffix, ".bak");
}

#[then("force is disabled and backups are enabled")]
fn assert_install_overrides(load_result: &RefCell<Option<Result<ProjectConfig, String>>>) {
    let config = loaded(load_result);
    assert!(!config.install.force);
    assert!(config.install.backup);
}

#[then("a configuration error mentioning {snippet} is reported")]
fn assert_error_with_snippet(
    load_result: &RefCell<Option<Result<ProjectConfig, String>>>,
    snippet: ErrorSnippet,
) {
    match load_result.borrow().as_ref() {
        Some(Err(error)) => assert!(
            error.contains(snippet.0.as_str()),
            "expected error '{error}' to mention '{}'",
            snippet.0
        ),
        Some(Ok(config)) => {
            panic!("expected configuration loading to fail but succeeded with {config:?}")
        }
        None => panic!("configuration should be loaded"),
    }
}

#[scenario("tests/features/config_loading.feature", index = 0)]
fn scenario_defaults(
    config_source: RefCell<String>,
    load_result: RefCell<Option<Result<ProjectConfig, String>>>,
) {
    let _ = (config_source, load_result);
}

#[scenario("tests/features/config_loading.feature", index = 1)]
fn scenario_install_overrides(
    config_source: RefCell<String>,
    load_result: RefCell<Option<Result<ProjectConfig, String>>>,
) {
    let _ = (config_source, load_result);
}

#[scenario("tests/features/config_loading.feature", index = 2)]
fn scenario_unknown_fields(
    config_source: RefCell<String>,
    load_result: RefCell<Option<Result<ProjectConfig, String>>>,
) {
    let _ = (config_source, load_result);
}

#[scenario("tests/features/config_loading.feature", index = 3)]
fn scenario_blank_version(
    config_source: RefCell<String>,
    load_result: RefCell<Option<Result<ProjectConfig, String>>>,
) {
    let _ = (config_source, load_result);
}
