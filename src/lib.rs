// src/lib.rs

pub mod cli;
pub mod config;
pub mod console;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod output;
pub mod process;
pub mod signal;
pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, anyhow};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::SettingsFile;
use crate::console::StdoutConsole;
use crate::engine::{
    Collaborators, CoordinatorOptions, CoordinatorRegistry, ExecutionCoordinator,
    SettingsProvider, SupervisorFactory,
};
use crate::process::{LaunchConfig, ProcessSupervisor, Supervisor};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - settings loading
/// - the execution coordinator and its stdout console
/// - either the actions given on the command line, or an interactive loop
///   reading actions from stdin
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let settings = load_and_validate(&config_path)?;
    let project_dir = PathBuf::from(&args.project_dir);

    if args.dry_run {
        print_dry_run(&settings, &project_dir)?;
        return Ok(());
    }

    let mut options = CoordinatorOptions::new(&project_dir);
    options.debug_output_mirror = args.debug_output || settings.output.debug_mirror;

    let capacity = settings.output.buffer_lines;
    let supervisor_factory: SupervisorFactory = Arc::new(move || {
        Arc::new(ProcessSupervisor::with_output_capacity(capacity)) as Arc<dyn Supervisor>
    });

    let collaborators = Collaborators::new(Arc::new(settings), StdoutConsole::factory());
    let coordinator =
        ExecutionCoordinator::with_supervisor_factory(options, collaborators, supervisor_factory)?;

    let registry = CoordinatorRegistry::new();
    let project = coordinator.project_dir().display().to_string();
    // Interactive sessions warm the build tool up while the user types.
    registry.open_project(project, coordinator.clone(), args.actions.is_empty())?;

    let outcome = if args.actions.is_empty() {
        run_interactive(&coordinator).await
    } else {
        run_actions(&coordinator, &args.actions).await
    };

    registry.dispose_all();
    outcome
}

/// Queue every action up front, then wait for them in order.
async fn run_actions(coordinator: &ExecutionCoordinator, actions: &[String]) -> Result<()> {
    let signals: Vec<_> = actions
        .iter()
        .map(|action| (action.clone(), coordinator.execute_in_background(action.clone())))
        .collect();

    let mut failed = Vec::new();
    for (action, signal) in signals {
        let succeeded = tokio::select! {
            succeeded = signal.wait() => succeeded,
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    warn!(error = %e, "failed to listen for Ctrl+C");
                }
                info!("Ctrl-C received; destroying build tool");
                coordinator.destroy();
                return Err(anyhow!("interrupted while running '{action}'"));
            }
        };
        if !succeeded {
            failed.push(action);
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(anyhow!(
            "{} of {} action(s) failed: {}",
            failed.len(),
            actions.len(),
            failed.join(", ")
        ))
    }
}

/// Read one action per stdin line until EOF or Ctrl-C.
async fn run_interactive(coordinator: &ExecutionCoordinator) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!("reading actions from stdin; Ctrl-D to quit");

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received; shutting down");
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        let action = line.trim();
        if action.is_empty() {
            continue;
        }

        tokio::select! {
            result = coordinator.execute_and_wait(action) => match result {
                Ok(true) => info!(%action, "action succeeded"),
                Ok(false) => warn!(%action, "action reported errors"),
                Err(e) => error!(%action, error = %e, "action failed"),
            },
            _ = tokio::signal::ctrl_c() => {
                info!(%action, "Ctrl-C received; destroying build tool");
                coordinator.destroy();
                break;
            }
        }
    }

    Ok(())
}

/// Simple dry-run output: effective settings and the launch command line.
fn print_dry_run(settings: &SettingsFile, project_dir: &Path) -> Result<()> {
    let launch = LaunchConfig::new(
        settings.resolved_interpreter_command(),
        project_dir,
        settings.resolved_launcher_artifact_path(),
        settings.resolved_extra_parameters(),
    )?
    .with_launcher_flag(settings.resolved_launcher_flag())
    .with_protocol(settings.command_protocol());

    println!("buildlane dry-run");
    println!("  project_dir = {}", launch.working_dir().display());
    println!("  command     = {}", launch.display_command_line());
    println!();
    println!("protocol:");
    println!("  prompt          = {}", launch.protocol().prompt_pattern());
    println!("  error           = {}", launch.protocol().error_pattern());
    println!(
        "  startup_timeout = {:?}",
        launch.protocol().startup_timeout()
    );
    match launch.protocol().command_timeout() {
        Some(timeout) => println!("  command_timeout = {timeout:?}"),
        None => println!("  command_timeout = none"),
    }
    println!();
    println!("output:");
    println!("  buffer_lines = {}", settings.output.buffer_lines);
    println!("  debug_mirror = {}", settings.output.debug_mirror);

    Ok(())
}
