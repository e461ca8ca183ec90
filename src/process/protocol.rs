// src/process/protocol.rs

//! How the supervisor recognises the end of a command in the subprocess's
//! output.
//!
//! The action string itself stays opaque. The only things the supervisor
//! looks at are:
//! - a *prompt* line, printed once when the tool is ready and again after every
//!   command;
//! - *error* lines, any of which marks the current command as failed.

use std::time::Duration;

use regex::Regex;

use crate::errors::{BuildlaneError, Result};

pub const DEFAULT_PROMPT_PATTERN: &str = r"^>\s*$";
pub const DEFAULT_ERROR_PATTERN: &str = r"^\[error\]";
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct CommandProtocol {
    prompt: Regex,
    error: Regex,
    startup_timeout: Duration,
    command_timeout: Option<Duration>,
}

impl Default for CommandProtocol {
    fn default() -> Self {
        Self {
            prompt: Regex::new(DEFAULT_PROMPT_PATTERN).expect("default prompt pattern is valid"),
            error: Regex::new(DEFAULT_ERROR_PATTERN).expect("default error pattern is valid"),
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            command_timeout: None,
        }
    }
}

impl CommandProtocol {
    pub fn new(prompt: &str, error: &str) -> Result<Self> {
        Ok(Self {
            prompt: compile("prompt", prompt)?,
            error: compile("error", error)?,
            ..Self::default()
        })
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn is_prompt(&self, line: &str) -> bool {
        self.prompt.is_match(line)
    }

    pub fn is_error(&self, line: &str) -> bool {
        self.error.is_match(line)
    }

    pub fn startup_timeout(&self) -> Duration {
        self.startup_timeout
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout
    }

    pub fn prompt_pattern(&self) -> &str {
        self.prompt.as_str()
    }

    pub fn error_pattern(&self) -> &str {
        self.error.as_str()
    }
}

fn compile(kind: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| {
        BuildlaneError::ConfigError(format!("invalid {kind} pattern '{pattern}': {e}"))
    })
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let seconds_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };
    value
        .checked_mul(seconds_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}
