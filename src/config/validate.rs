// src/config/validate.rs

use crate::config::model::{RawSettingsFile, SettingsFile};
use crate::errors::{BuildlaneError, Result};
use crate::process::{CommandProtocol, parse_duration};

impl TryFrom<RawSettingsFile> for SettingsFile {
    type Error = crate::errors::BuildlaneError;

    fn try_from(raw: RawSettingsFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_settings(&raw)?;
        let protocol = build_protocol(&raw)?;
        Ok(SettingsFile::new_unchecked(raw, protocol))
    }
}

/// Validate raw settings without building a `SettingsFile`.
pub fn validate_settings(raw: &RawSettingsFile) -> Result<()> {
    validate_raw_settings(raw)?;
    build_protocol(raw).map(|_| ())
}

fn validate_raw_settings(raw: &RawSettingsFile) -> Result<()> {
    ensure_interpreter(raw)?;
    ensure_launcher(raw)?;
    validate_output(raw)?;
    Ok(())
}

fn ensure_interpreter(raw: &RawSettingsFile) -> Result<()> {
    let effective = raw
        .project
        .java_command
        .as_deref()
        .unwrap_or(&raw.application.java_command);
    if effective.trim().is_empty() {
        return Err(BuildlaneError::ConfigError(
            "java_command must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn ensure_launcher(raw: &RawSettingsFile) -> Result<()> {
    let effective = raw
        .project
        .launcher_jar
        .as_deref()
        .unwrap_or(&raw.application.launcher_jar);
    if effective.trim().is_empty() {
        return Err(BuildlaneError::ConfigError(
            "launcher_jar must be set in [application] or [project]".to_string(),
        ));
    }
    Ok(())
}

fn validate_output(raw: &RawSettingsFile) -> Result<()> {
    if raw.output.buffer_lines == 0 {
        return Err(BuildlaneError::ConfigError(
            "[output].buffer_lines must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn build_protocol(raw: &RawSettingsFile) -> Result<CommandProtocol> {
    let section = &raw.protocol;

    let startup_timeout = parse_duration(&section.startup_timeout).map_err(|e| {
        BuildlaneError::ConfigError(format!(
            "[protocol].startup_timeout '{}': {e}",
            section.startup_timeout
        ))
    })?;

    let command_timeout = section
        .command_timeout
        .as_deref()
        .map(|s| {
            parse_duration(s).map_err(|e| {
                BuildlaneError::ConfigError(format!("[protocol].command_timeout '{s}': {e}"))
            })
        })
        .transpose()?;

    Ok(CommandProtocol::new(&section.prompt, &section.error)?
        .with_startup_timeout(startup_timeout)
        .with_command_timeout(command_timeout))
}
