#![allow(dead_code)]

use buildlane::config::{RawSettingsFile, SettingsFile};

/// Builder for `SettingsFile` to simplify test setup.
pub struct SettingsBuilder {
    settings: RawSettingsFile,
}

impl SettingsBuilder {
    pub fn new(launcher_jar: &str) -> Self {
        let mut settings = RawSettingsFile::default();
        settings.application.launcher_jar = launcher_jar.to_string();
        Self { settings }
    }

    /// Settings that run `script` with `sh` instead of a JVM.
    pub fn shell_script(script: &str) -> Self {
        Self::new(script).java_command("sh").launcher_flag("")
    }

    pub fn java_command(mut self, cmd: &str) -> Self {
        self.settings.application.java_command = cmd.to_string();
        self
    }

    pub fn vm_parameters(mut self, params: &str) -> Self {
        self.settings.application.vm_parameters = params.to_string();
        self
    }

    pub fn launcher_flag(mut self, flag: &str) -> Self {
        self.settings.application.launcher_flag = flag.to_string();
        self
    }

    pub fn project_java_command(mut self, cmd: &str) -> Self {
        self.settings.project.java_command = Some(cmd.to_string());
        self
    }

    pub fn project_launcher_jar(mut self, jar: &str) -> Self {
        self.settings.project.launcher_jar = Some(jar.to_string());
        self
    }

    pub fn project_vm_parameters(mut self, params: &str) -> Self {
        self.settings.project.vm_parameters = Some(params.to_string());
        self
    }

    pub fn prompt(mut self, pattern: &str) -> Self {
        self.settings.protocol.prompt = pattern.to_string();
        self
    }

    pub fn error(mut self, pattern: &str) -> Self {
        self.settings.protocol.error = pattern.to_string();
        self
    }

    pub fn startup_timeout(mut self, duration: &str) -> Self {
        self.settings.protocol.startup_timeout = duration.to_string();
        self
    }

    pub fn command_timeout(mut self, duration: &str) -> Self {
        self.settings.protocol.command_timeout = Some(duration.to_string());
        self
    }

    pub fn buffer_lines(mut self, lines: usize) -> Self {
        self.settings.output.buffer_lines = lines;
        self
    }

    pub fn build_raw(self) -> RawSettingsFile {
        self.settings
    }

    pub fn build(self) -> SettingsFile {
        SettingsFile::try_from(self.settings).expect("Failed to build valid settings from builder")
    }
}
