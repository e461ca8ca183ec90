// src/process/launch.rs

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::errors::{BuildlaneError, Result};

use super::protocol::CommandProtocol;

/// Immutable description of how to start the build-tool subprocess.
///
/// The command line is `interpreter [extra params...] [launcher flag] launcher`,
/// run with `working_dir` as its current directory, e.g.
/// `java -Xmx512M -jar /opt/sbt/sbt-launch.jar`.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    interpreter: PathBuf,
    working_dir: PathBuf,
    launcher: PathBuf,
    launcher_flag: Option<String>,
    extra_params: Vec<String>,
    protocol: CommandProtocol,
}

impl LaunchConfig {
    /// Build a launch configuration.
    ///
    /// Fails with a configuration error if `working_dir` is not an existing
    /// directory. A relative `launcher` is resolved against `working_dir`.
    pub fn new(
        interpreter: impl Into<PathBuf>,
        working_dir: impl AsRef<Path>,
        launcher: impl AsRef<Path>,
        extra_params: Vec<String>,
    ) -> Result<Self> {
        let working_dir = resolve_working_dir(working_dir.as_ref())?;
        let interpreter = interpreter.into();
        if interpreter.as_os_str().is_empty() {
            return Err(BuildlaneError::ConfigError(
                "interpreter command must not be empty".to_string(),
            ));
        }

        let launcher = launcher.as_ref();
        let launcher = if launcher.is_relative() {
            working_dir.join(launcher)
        } else {
            launcher.to_path_buf()
        };

        Ok(Self {
            interpreter,
            working_dir,
            launcher,
            launcher_flag: None,
            extra_params,
            protocol: CommandProtocol::default(),
        })
    }

    pub fn with_launcher_flag(mut self, flag: Option<String>) -> Self {
        self.launcher_flag = flag.filter(|f| !f.trim().is_empty());
        self
    }

    pub fn with_protocol(mut self, protocol: CommandProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn interpreter(&self) -> &Path {
        &self.interpreter
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn launcher(&self) -> &Path {
        &self.launcher
    }

    pub fn launcher_flag(&self) -> Option<&str> {
        self.launcher_flag.as_deref()
    }

    pub fn extra_params(&self) -> &[String] {
        &self.extra_params
    }

    pub fn protocol(&self) -> &CommandProtocol {
        &self.protocol
    }

    /// Full command line, interpreter first.
    pub fn command_line(&self) -> Vec<OsString> {
        let mut line = vec![self.interpreter.clone().into_os_string()];
        line.extend(self.extra_params.iter().map(OsString::from));
        if let Some(flag) = &self.launcher_flag {
            line.push(OsString::from(flag));
        }
        line.push(self.launcher.clone().into_os_string());
        line
    }

    /// Human-readable command line for logs and `--dry-run`.
    pub fn display_command_line(&self) -> String {
        self.command_line()
            .iter()
            .map(|part| part.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Check what can be checked before spawning.
    ///
    /// The launcher artifact must be an existing file. An interpreter given as
    /// a path (rather than a bare command looked up on `PATH`) must exist too.
    pub(crate) fn check_launchable(&self) -> Result<()> {
        if !self.launcher.is_file() {
            return Err(BuildlaneError::LaunchError(format!(
                "launcher artifact not found: {}",
                self.launcher.display()
            )));
        }

        let looks_like_path = self.interpreter.components().count() > 1;
        if looks_like_path && !self.interpreter.is_file() {
            return Err(BuildlaneError::LaunchError(format!(
                "interpreter not found: {}",
                self.interpreter.display()
            )));
        }

        Ok(())
    }

    pub(crate) fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.interpreter);
        cmd.args(&self.extra_params);
        if let Some(flag) = &self.launcher_flag {
            cmd.arg(flag);
        }
        cmd.arg(&self.launcher)
            .current_dir(&self.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

fn resolve_working_dir(dir: &Path) -> Result<PathBuf> {
    if dir.as_os_str().is_empty() {
        return Err(BuildlaneError::ConfigError(
            "working directory must not be empty".to_string(),
        ));
    }
    let resolved = dir.canonicalize().map_err(|e| {
        BuildlaneError::ConfigError(format!(
            "cannot resolve working directory {}: {e}",
            dir.display()
        ))
    })?;
    if !resolved.is_dir() {
        return Err(BuildlaneError::ConfigError(format!(
            "working directory is not a directory: {}",
            resolved.display()
        )));
    }
    Ok(resolved)
}
