// src/config/model.rs

use serde::Deserialize;

use crate::output::DEFAULT_OUTPUT_CAPACITY;
use crate::process::CommandProtocol;
use crate::process::protocol::{DEFAULT_ERROR_PATTERN, DEFAULT_PROMPT_PATTERN};

/// Settings file as read from TOML, before validation.
///
/// ```toml
/// [application]
/// java_command = "java"
/// launcher_jar = "/opt/sbt/sbt-launch.jar"
/// vm_parameters = "-Xmx512M"
///
/// [project]
/// vm_parameters = "-Xmx2G"
///
/// [protocol]
/// prompt = "^>\\s*$"
/// error = "^\\[error\\]"
/// startup_timeout = "120s"
///
/// [output]
/// buffer_lines = 1024
/// ```
///
/// All sections are optional and have reasonable defaults, except that some
/// launcher path must be given in `[application]` or `[project]`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawSettingsFile {
    #[serde(default)]
    pub application: ApplicationSection,

    #[serde(default)]
    pub project: ProjectSection,

    #[serde(default)]
    pub protocol: ProtocolSection,

    #[serde(default)]
    pub output: OutputSection,
}

/// Validated settings. Build one with `SettingsFile::try_from(raw)` or
/// [`load_and_validate`](super::load_and_validate).
#[derive(Debug, Clone)]
pub struct SettingsFile {
    pub application: ApplicationSection,
    pub project: ProjectSection,
    pub protocol: ProtocolSection,
    pub output: OutputSection,
    pub(crate) command_protocol: CommandProtocol,
}

impl SettingsFile {
    pub(crate) fn new_unchecked(
        raw: RawSettingsFile,
        command_protocol: CommandProtocol,
    ) -> Self {
        Self {
            application: raw.application,
            project: raw.project,
            protocol: raw.protocol,
            output: raw.output,
            command_protocol,
        }
    }
}

/// `[application]` section: machine-wide defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSection {
    /// Interpreter used to run the launcher.
    #[serde(default = "default_java_command")]
    pub java_command: String,

    /// Launcher artifact (e.g. `sbt-launch.jar`).
    #[serde(default)]
    pub launcher_jar: String,

    /// Whitespace-separated interpreter parameters.
    #[serde(default)]
    pub vm_parameters: String,

    /// Flag placed before the launcher path; empty to pass it bare.
    #[serde(default = "default_launcher_flag")]
    pub launcher_flag: String,
}

fn default_java_command() -> String {
    "java".to_string()
}

fn default_launcher_flag() -> String {
    "-jar".to_string()
}

impl Default for ApplicationSection {
    fn default() -> Self {
        Self {
            java_command: default_java_command(),
            launcher_jar: String::new(),
            vm_parameters: String::new(),
            launcher_flag: default_launcher_flag(),
        }
    }
}

/// `[project]` section: per-project overrides. `None` falls back to
/// `[application]`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProjectSection {
    #[serde(default)]
    pub java_command: Option<String>,

    /// Relative paths are resolved against the project directory.
    #[serde(default)]
    pub launcher_jar: Option<String>,

    #[serde(default)]
    pub vm_parameters: Option<String>,

    #[serde(default)]
    pub launcher_flag: Option<String>,
}

/// `[protocol]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolSection {
    /// Regex matching the ready / end-of-command prompt line.
    #[serde(default = "default_prompt")]
    pub prompt: String,

    /// Regex matching lines that mark the current command as failed.
    #[serde(default = "default_error")]
    pub error: String,

    /// How long `start(wait = true)` waits for the first prompt.
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout: String,

    /// Upper bound for a single action; unbounded if absent.
    #[serde(default)]
    pub command_timeout: Option<String>,
}

fn default_prompt() -> String {
    DEFAULT_PROMPT_PATTERN.to_string()
}

fn default_error() -> String {
    DEFAULT_ERROR_PATTERN.to_string()
}

fn default_startup_timeout() -> String {
    "120s".to_string()
}

impl Default for ProtocolSection {
    fn default() -> Self {
        Self {
            prompt: default_prompt(),
            error: default_error(),
            startup_timeout: default_startup_timeout(),
            command_timeout: None,
        }
    }
}

/// `[output]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputSection {
    /// Lines buffered for lagging subscribers.
    #[serde(default = "default_buffer_lines")]
    pub buffer_lines: usize,

    /// Mirror subprocess output into the log.
    #[serde(default)]
    pub debug_mirror: bool,
}

fn default_buffer_lines() -> usize {
    DEFAULT_OUTPUT_CAPACITY
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            buffer_lines: default_buffer_lines(),
            debug_mirror: false,
        }
    }
}
