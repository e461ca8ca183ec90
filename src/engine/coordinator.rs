// src/engine/coordinator.rs

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::errors::{BuildlaneError, Result};
use crate::logging::OUTPUT_MIRROR_TARGET;
use crate::process::{LaunchConfig, ProcessSupervisor, ProcessToken, Supervisor};
use crate::signal::CompletionSignal;
use crate::types::{Delivery, LifecycleState};

use super::collaborators::{Collaborators, ConsoleSink};
use super::lane::ExecutionLane;

/// Builds the supervisor when the coordinator first becomes ready.
pub type SupervisorFactory = Arc<dyn Fn() -> Arc<dyn Supervisor> + Send + Sync>;

/// One request submitted through [`ExecutionCoordinator::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub action: String,
    /// Informational: the only way to cancel a running action is `destroy()`.
    pub cancellable: bool,
}

impl ExecutionRequest {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            cancellable: false,
        }
    }
}

/// Construction options for an [`ExecutionCoordinator`].
#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// Project directory; becomes the subprocess working directory.
    pub project_dir: PathBuf,
    /// Mirror every output line into the log on a background task.
    pub debug_output_mirror: bool,
}

impl CoordinatorOptions {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            debug_output_mirror: false,
        }
    }
}

enum Lifecycle {
    Uninitialized,
    Ready(Arc<dyn Supervisor>),
    Disposed,
}

struct Inner {
    project_dir: PathBuf,
    debug_output_mirror: bool,
    collaborators: Collaborators,
    supervisor_factory: SupervisorFactory,
    lifecycle: Mutex<Lifecycle>,
    console: Mutex<Arc<dyn ConsoleSink>>,
    /// Held for the whole flush → start → execute → refresh sequence.
    gate: tokio::sync::Mutex<()>,
    lane: ExecutionLane,
    runtime: Handle,
}

/// Façade that serializes build-tool actions for one project.
///
/// Cheap to clone; every clone drives the same lane and subprocess.
#[derive(Clone)]
pub struct ExecutionCoordinator {
    inner: Arc<Inner>,
}

impl fmt::Debug for ExecutionCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionCoordinator")
            .field("project_dir", &self.inner.project_dir)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ExecutionCoordinator {
    /// Create a coordinator backed by a real [`ProcessSupervisor`].
    ///
    /// Must be called from within a Tokio runtime; the lane worker and the
    /// debug mirror run on that runtime.
    pub fn new(options: CoordinatorOptions, collaborators: Collaborators) -> Result<Self> {
        Self::with_supervisor_factory(
            options,
            collaborators,
            Arc::new(|| Arc::new(ProcessSupervisor::new()) as Arc<dyn Supervisor>),
        )
    }

    pub fn with_supervisor_factory(
        options: CoordinatorOptions,
        collaborators: Collaborators,
        supervisor_factory: SupervisorFactory,
    ) -> Result<Self> {
        let project_dir = validate_project_dir(&options.project_dir)?;
        let runtime = Handle::try_current().map_err(|e| {
            BuildlaneError::ConfigError(format!(
                "execution coordinator needs a Tokio runtime: {e}"
            ))
        })?;

        let console = collaborators.consoles.create_console();
        let lane = ExecutionLane::spawn(&runtime);

        info!(project_dir = %project_dir.display(), "execution coordinator created");

        Ok(Self {
            inner: Arc::new(Inner {
                project_dir,
                debug_output_mirror: options.debug_output_mirror,
                collaborators,
                supervisor_factory,
                lifecycle: Mutex::new(Lifecycle::Uninitialized),
                console: Mutex::new(console),
                gate: tokio::sync::Mutex::new(()),
                lane,
                runtime,
            }),
        })
    }

    pub fn project_dir(&self) -> &Path {
        &self.inner.project_dir
    }

    pub fn state(&self) -> LifecycleState {
        match *self.lock_lifecycle() {
            Lifecycle::Uninitialized => LifecycleState::Uninitialized,
            Lifecycle::Ready(_) => LifecycleState::Ready,
            Lifecycle::Disposed => LifecycleState::Disposed,
        }
    }

    /// Queue `action` on the lane and return its signal, already begun.
    ///
    /// Never blocks and never returns an error: failures are logged and show
    /// up as a finished signal without success.
    pub fn execute_in_background(&self, action: impl Into<String>) -> CompletionSignal {
        self.submit(ExecutionRequest::new(action))
    }

    pub fn submit(&self, request: ExecutionRequest) -> CompletionSignal {
        let signal = CompletionSignal::new();
        // A fresh signal cannot have begun yet.
        let _ = signal.begin();

        // Dropping the guard finishes the signal, whether the job completes,
        // fails, panics, or is never run at all.
        let finish = signal.finish_guard();
        let this = self.clone();
        let ExecutionRequest {
            action,
            cancellable,
        } = request;

        let job = Box::pin(async move {
            info!(%action, cancellable, "begin executing");
            match this.execute_and_wait(&action).await {
                Ok(true) => {
                    let _ = finish.signal().success();
                    info!(%action, "done executing");
                }
                Ok(false) => info!(%action, "error executing"),
                Err(e) => error!(
                    %action,
                    error = %e,
                    "failed to execute action; maybe the build tool failed to start?"
                ),
            }
        });

        if let Err(e) = self.inner.lane.run_serialized(job) {
            warn!(error = %e, "execution lane refused the request");
        }

        signal
    }

    /// Run `action` now, waiting behind any action already in flight.
    ///
    /// Flushes pending edits, starts the build tool if needed, executes the
    /// action and refreshes file-system observers. A communication failure
    /// destroys the subprocess and is returned to the caller.
    pub async fn execute_and_wait(&self, action: &str) -> Result<bool> {
        let supervisor = self.ensure_ready()?;
        let _gate = self.inner.gate.lock().await;

        self.inner.collaborators.editor.flush_all_pending_edits();
        self.start_locked(&supervisor, true).await?;

        let success = match supervisor.execute(action).await {
            Ok(success) => success,
            Err(e) => {
                supervisor.destroy();
                return Err(e);
            }
        };

        self.inner.collaborators.refresh.refresh_after_external_change();
        Ok(success)
    }

    /// Start the build tool unless it is already running.
    pub async fn start_if_not_started(&self, wait: bool) -> Result<()> {
        let supervisor = self.ensure_ready()?;
        let _gate = self.inner.gate.lock().await;
        self.start_locked(&supervisor, wait).await
    }

    /// Start the build tool on the coordinator's runtime without waiting for
    /// it. A failure is only logged.
    pub fn start_in_background(&self) {
        let this = self.clone();
        self.inner.runtime.spawn(async move {
            if let Err(e) = this.start_if_not_started(false).await {
                warn!(error = %e, "background start of build tool failed");
            }
        });
    }

    pub fn is_alive(&self) -> bool {
        self.current_supervisor()
            .is_some_and(|supervisor| supervisor.is_alive())
    }

    /// Identity of the running subprocess, if any.
    pub fn current_process(&self) -> Option<ProcessToken> {
        self.current_supervisor()
            .and_then(|supervisor| supervisor.current_process())
    }

    /// Tear down the subprocess. Safe to call at any time, any number of times;
    /// an action in flight fails with a communication error.
    pub fn destroy(&self) {
        if let Some(supervisor) = self.current_supervisor() {
            supervisor.destroy();
        }
    }

    /// Console currently attached to new subprocesses.
    pub fn output_consumer(&self) -> Arc<dyn ConsoleSink> {
        Arc::clone(&self.lock_console())
    }

    /// Dispose the console and the subprocess, then build a fresh console.
    ///
    /// The next start attaches its output to the new console.
    pub fn recreate(&self) {
        if self.state() == LifecycleState::Disposed {
            warn!("recreate requested on a disposed coordinator; ignoring");
            return;
        }
        let fresh = self.inner.collaborators.consoles.create_console();
        let previous = std::mem::replace(&mut *self.lock_console(), fresh);
        previous.dispose();
        self.destroy();
        info!("console recreated");
    }

    /// Destroy the subprocess, detach the console and refuse further requests.
    ///
    /// Requests already queued on the lane still complete (with failure).
    pub fn dispose(&self) {
        let previous = std::mem::replace(&mut *self.lock_lifecycle(), Lifecycle::Disposed);
        if let Lifecycle::Ready(supervisor) = &previous {
            supervisor.destroy();
        }
        if !matches!(previous, Lifecycle::Disposed) {
            self.lock_console().dispose();
            self.inner.lane.close();
            info!(project_dir = %self.inner.project_dir.display(), "execution coordinator disposed");
        }
    }

    fn lock_lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.inner
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_console(&self) -> MutexGuard<'_, Arc<dyn ConsoleSink>> {
        self.inner
            .console
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn current_supervisor(&self) -> Option<Arc<dyn Supervisor>> {
        match &*self.lock_lifecycle() {
            Lifecycle::Ready(supervisor) => Some(Arc::clone(supervisor)),
            Lifecycle::Uninitialized | Lifecycle::Disposed => None,
        }
    }

    fn ensure_ready(&self) -> Result<Arc<dyn Supervisor>> {
        let mut lifecycle = self.lock_lifecycle();
        match &*lifecycle {
            Lifecycle::Ready(supervisor) => Ok(Arc::clone(supervisor)),
            Lifecycle::Disposed => Err(BuildlaneError::Disposed),
            Lifecycle::Uninitialized => {
                let supervisor = (self.inner.supervisor_factory)();
                *lifecycle = Lifecycle::Ready(Arc::clone(&supervisor));
                debug!("execution coordinator ready");
                Ok(supervisor)
            }
        }
    }

    /// Fails once `dispose()` has run, also for callers that got past
    /// `ensure_ready` before it.
    fn check_not_disposed(&self) -> Result<()> {
        match *self.lock_lifecycle() {
            Lifecycle::Disposed => Err(BuildlaneError::Disposed),
            Lifecycle::Uninitialized | Lifecycle::Ready(_) => Ok(()),
        }
    }

    /// Caller holds the gate.
    async fn start_locked(&self, supervisor: &Arc<dyn Supervisor>, wait: bool) -> Result<()> {
        self.check_not_disposed()?;
        if supervisor.is_alive() {
            return Ok(());
        }

        let config = self.launch_config()?;
        let process = supervisor.launch(&config)?;
        // A dispose racing the launch may have missed this process.
        if let Err(e) = self.check_not_disposed() {
            supervisor.destroy();
            return Err(e);
        }

        self.print_to_console(supervisor, process);
        if self.inner.debug_output_mirror {
            self.mirror_to_log(supervisor, process);
        }

        supervisor.finish_start(wait).await
    }

    fn launch_config(&self) -> Result<LaunchConfig> {
        let settings = &self.inner.collaborators.settings;
        Ok(LaunchConfig::new(
            settings.resolved_interpreter_command(),
            &self.inner.project_dir,
            settings.resolved_launcher_artifact_path(),
            settings.resolved_extra_parameters(),
        )?
        .with_launcher_flag(settings.resolved_launcher_flag())
        .with_protocol(settings.command_protocol()))
    }

    fn print_to_console(&self, supervisor: &Arc<dyn Supervisor>, process: ProcessToken) {
        match supervisor.subscribe_to_output(Delivery::Primary) {
            Some(output) => self.output_consumer().attach_to_process(output, process),
            None => warn!(process = %process, "no output to attach to the console"),
        }
    }

    fn mirror_to_log(&self, supervisor: &Arc<dyn Supervisor>, process: ProcessToken) {
        let Some(mut output) = supervisor.subscribe_to_output(Delivery::BestEffort) else {
            return;
        };
        self.inner.runtime.spawn(async move {
            while let Some(line) = output.next_line().await {
                info!(target: OUTPUT_MIRROR_TARGET, process = %process, "{line}");
            }
            debug!(process = %process, "output mirror ended");
        });
    }
}

fn validate_project_dir(dir: &Path) -> Result<PathBuf> {
    let resolved = dir.canonicalize().map_err(|e| {
        BuildlaneError::ConfigError(format!(
            "cannot resolve project directory {}: {e}",
            dir.display()
        ))
    })?;
    if !resolved.is_dir() {
        return Err(BuildlaneError::ConfigError(format!(
            "project directory is not a directory: {}",
            resolved.display()
        )));
    }
    Ok(resolved)
}
