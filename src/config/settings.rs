// src/config/settings.rs

//! Effective-value resolution: a `[project]` value overrides the matching
//! `[application]` value.

use std::path::PathBuf;

use crate::config::model::SettingsFile;
use crate::engine::SettingsProvider;
use crate::process::CommandProtocol;

/// Split interpreter parameters on whitespace.
///
/// An empty or all-blank string yields no parameters at all, never a single
/// empty one.
pub fn split_parameters(parameters: &str) -> Vec<String> {
    parameters.split_whitespace().map(str::to_string).collect()
}

impl SettingsFile {
    pub fn effective_java_command(&self) -> &str {
        self.project
            .java_command
            .as_deref()
            .unwrap_or(&self.application.java_command)
    }

    pub fn effective_launcher_jar(&self) -> &str {
        self.project
            .launcher_jar
            .as_deref()
            .unwrap_or(&self.application.launcher_jar)
    }

    pub fn effective_vm_parameters(&self) -> &str {
        self.project
            .vm_parameters
            .as_deref()
            .unwrap_or(&self.application.vm_parameters)
    }

    pub fn effective_launcher_flag(&self) -> Option<&str> {
        let flag = self
            .project
            .launcher_flag
            .as_deref()
            .unwrap_or(&self.application.launcher_flag)
            .trim();
        (!flag.is_empty()).then_some(flag)
    }
}

impl SettingsProvider for SettingsFile {
    fn resolved_interpreter_command(&self) -> String {
        self.effective_java_command().trim().to_string()
    }

    fn resolved_launcher_artifact_path(&self) -> PathBuf {
        PathBuf::from(self.effective_launcher_jar().trim())
    }

    fn resolved_extra_parameters(&self) -> Vec<String> {
        split_parameters(self.effective_vm_parameters())
    }

    fn resolved_launcher_flag(&self) -> Option<String> {
        self.effective_launcher_flag().map(str::to_string)
    }

    fn command_protocol(&self) -> CommandProtocol {
        self.command_protocol.clone()
    }
}
