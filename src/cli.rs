// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `buildlane`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "buildlane",
    version,
    about = "Drive one long-lived build-tool process and run actions through it, one at a time.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the settings file (TOML).
    ///
    /// Default: `Buildlane.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Buildlane.toml")]
    pub config: String,

    /// Project directory; the build tool runs with this as its working directory.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub project_dir: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BUILDLANE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Mirror build-tool output into the log (overrides `[output].debug_mirror`).
    #[arg(long)]
    pub debug_output: bool,

    /// Parse + validate, print the launch command line, but don't start anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Actions to run, in order. Without any, actions are read from stdin.
    #[arg(value_name = "ACTION")]
    pub actions: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
