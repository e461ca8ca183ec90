// tests/config_loading.rs

mod common;
use crate::common::init_tracing;

use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use proptest::prelude::*;
use tempfile::NamedTempFile;

use buildlane::config::loader::default_config_path;
use buildlane::config::{
    SettingsFile, load_and_validate, load_from_str, split_parameters, validate_settings,
};
use buildlane::engine::SettingsProvider;
use buildlane::errors::BuildlaneError;
use buildlane::process::parse_duration;
use buildlane_test_utils::builders::SettingsBuilder;

type TestResult = Result<(), Box<dyn Error>>;

fn settings_from(toml: &str) -> Result<SettingsFile, BuildlaneError> {
    SettingsFile::try_from(load_from_str(toml)?)
}

fn demo(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos").join(name)
}

#[test]
fn demo_settings_run_the_shell_stand_in() -> TestResult {
    init_tracing();
    let settings = load_and_validate(demo("Buildlane.toml"))?;

    assert_eq!(settings.resolved_interpreter_command(), "sh");
    assert_eq!(
        settings.resolved_launcher_artifact_path(),
        PathBuf::from("fake-build-tool.sh")
    );
    assert_eq!(settings.resolved_launcher_flag(), None);
    assert!(settings.resolved_extra_parameters().is_empty());

    let protocol = settings.command_protocol();
    assert_eq!(protocol.startup_timeout(), Duration::from_secs(10));
    assert_eq!(protocol.command_timeout(), Some(Duration::from_secs(300)));
    assert!(protocol.is_prompt(">"));
    assert!(protocol.is_error("[error] compile failed"));
    assert_eq!(settings.output.buffer_lines, 256);
    Ok(())
}

#[test]
fn project_values_override_application_values() -> TestResult {
    let settings = load_and_validate(demo("sbt.toml"))?;

    assert_eq!(settings.resolved_interpreter_command(), "java");
    assert_eq!(
        settings.resolved_launcher_artifact_path(),
        PathBuf::from("/opt/sbt/bin/sbt-launch.jar")
    );
    assert_eq!(
        settings.resolved_extra_parameters(),
        vec!["-Xmx2G", "-Dsbt.log.noformat=true"]
    );
    assert_eq!(settings.resolved_launcher_flag().as_deref(), Some("-jar"));
    assert_eq!(
        settings.command_protocol().startup_timeout(),
        Duration::from_secs(180)
    );
    Ok(())
}

#[test]
fn minimal_file_gets_defaults() -> TestResult {
    let settings = settings_from(
        r#"
[application]
launcher_jar = "sbt-launch.jar"
"#,
    )?;

    assert_eq!(settings.resolved_interpreter_command(), "java");
    assert_eq!(settings.resolved_launcher_flag().as_deref(), Some("-jar"));
    assert!(settings.resolved_extra_parameters().is_empty());
    assert_eq!(settings.output.buffer_lines, 1024);
    assert!(!settings.output.debug_mirror);

    let protocol = settings.command_protocol();
    assert_eq!(protocol.prompt_pattern(), r"^>\s*$");
    assert_eq!(protocol.error_pattern(), r"^\[error\]");
    assert_eq!(protocol.startup_timeout(), Duration::from_secs(120));
    assert_eq!(protocol.command_timeout(), None);
    Ok(())
}

#[test]
fn launcher_in_project_section_is_enough() -> TestResult {
    let settings = settings_from(
        r#"
[project]
launcher_jar = "project/sbt-launch.jar"
java_command = "/usr/lib/jvm/java-17/bin/java"
"#,
    )?;

    assert_eq!(
        settings.resolved_interpreter_command(),
        "/usr/lib/jvm/java-17/bin/java"
    );
    assert_eq!(
        settings.resolved_launcher_artifact_path(),
        PathBuf::from("project/sbt-launch.jar")
    );
    Ok(())
}

#[test]
fn missing_launcher_is_a_config_error() {
    let result = settings_from("[application]\njava_command = \"java\"\n");
    match result {
        Err(BuildlaneError::ConfigError(msg)) => assert!(msg.contains("launcher_jar")),
        other => panic!("Expected ConfigError, got: {other:?}"),
    }
}

#[test]
fn blank_java_command_is_a_config_error() {
    let raw = SettingsBuilder::new("sbt-launch.jar")
        .java_command("   ")
        .build_raw();
    match validate_settings(&raw) {
        Err(BuildlaneError::ConfigError(msg)) => assert!(msg.contains("java_command")),
        other => panic!("Expected ConfigError, got: {other:?}"),
    }
}

#[test]
fn invalid_prompt_regex_is_a_config_error() {
    let raw = SettingsBuilder::new("sbt-launch.jar").prompt("([").build_raw();
    match SettingsFile::try_from(raw) {
        Err(BuildlaneError::ConfigError(msg)) => assert!(msg.contains("prompt")),
        other => panic!("Expected ConfigError, got: {other:?}"),
    }
}

#[test]
fn invalid_timeouts_are_config_errors() {
    let raw = SettingsBuilder::new("sbt-launch.jar")
        .startup_timeout("soon")
        .build_raw();
    match SettingsFile::try_from(raw) {
        Err(BuildlaneError::ConfigError(msg)) => assert!(msg.contains("startup_timeout")),
        other => panic!("Expected ConfigError, got: {other:?}"),
    }

    let raw = SettingsBuilder::new("sbt-launch.jar")
        .command_timeout("10 fortnights")
        .build_raw();
    match SettingsFile::try_from(raw) {
        Err(BuildlaneError::ConfigError(msg)) => assert!(msg.contains("command_timeout")),
        other => panic!("Expected ConfigError, got: {other:?}"),
    }
}

#[test]
fn zero_buffer_is_a_config_error() {
    let raw = SettingsBuilder::new("sbt-launch.jar").buffer_lines(0).build_raw();
    assert!(matches!(
        SettingsFile::try_from(raw),
        Err(BuildlaneError::ConfigError(_))
    ));
}

#[test]
fn malformed_toml_is_a_toml_error() -> TestResult {
    let mut file = NamedTempFile::new()?;
    write!(file, "[application\nlauncher_jar = ")?;

    let result = load_and_validate(file.path());
    assert!(matches!(result, Err(BuildlaneError::TomlError(_))), "got {result:?}");
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    let result = load_and_validate("/definitely/not/Buildlane.toml");
    assert!(matches!(result, Err(BuildlaneError::IoError(_))), "got {result:?}");
}

#[test]
fn default_path_is_in_the_working_directory() {
    assert_eq!(default_config_path(), PathBuf::from("Buildlane.toml"));
}

#[test]
fn empty_launcher_flag_passes_the_launcher_bare() {
    let settings = SettingsBuilder::new("tool.sh").launcher_flag("").build();
    assert_eq!(settings.resolved_launcher_flag(), None);
}

#[test]
fn vm_parameters_split_on_whitespace() {
    let settings = SettingsBuilder::new("sbt-launch.jar")
        .vm_parameters("  -Xmx1G\t-Dfile.encoding=UTF-8\n ")
        .build();
    assert_eq!(
        settings.resolved_extra_parameters(),
        vec!["-Xmx1G", "-Dfile.encoding=UTF-8"]
    );

    let settings = SettingsBuilder::new("sbt-launch.jar")
        .vm_parameters("-Xmx1G")
        .project_vm_parameters("")
        .build();
    assert!(settings.resolved_extra_parameters().is_empty());
}

#[test]
fn durations_parse_with_units() {
    assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
    assert_eq!(parse_duration("3s"), Ok(Duration::from_secs(3)));
    assert_eq!(parse_duration(" 2m "), Ok(Duration::from_secs(120)));
    assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    assert!(parse_duration("").is_err());
    assert!(parse_duration("10").is_err());
    assert!(parse_duration("5d").is_err());
}

#[test]
fn oversized_durations_are_rejected() {
    let max = u64::MAX;
    assert_eq!(parse_duration(&format!("{max}s")), Ok(Duration::from_secs(max)));
    assert!(parse_duration(&format!("{max}m")).is_err());
    assert!(parse_duration(&format!("{}h", max / 60)).is_err());

    let raw = SettingsBuilder::new("sbt-launch.jar")
        .startup_timeout(&format!("{max}h"))
        .build_raw();
    match SettingsFile::try_from(raw) {
        Err(BuildlaneError::ConfigError(msg)) => assert!(msg.contains("startup_timeout")),
        other => panic!("Expected ConfigError, got: {other:?}"),
    }
}

proptest! {
    #[test]
    fn split_parameters_never_yields_empty_parts(input in "[ \\ta-zA-Z0-9=:.-]{0,40}") {
        let parts = split_parameters(&input);

        prop_assert!(parts.iter().all(|p| !p.is_empty()));
        prop_assert!(parts.iter().all(|p| !p.chars().any(char::is_whitespace)));
        prop_assert_eq!(parts.join(" "), input.split_whitespace().collect::<Vec<_>>().join(" "));
    }
}
