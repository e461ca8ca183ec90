// src/process/supervisor.rs

//! The production [`Supervisor`]: one build-tool subprocess driven over its
//! stdin, with stdout and stderr merged into a single output broadcaster.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::errors::{BuildlaneError, Result};
use crate::output::{DEFAULT_OUTPUT_CAPACITY, LineObserver, OutputBroadcaster, OutputSubscription};
use crate::types::Delivery;

use super::backend::{BoxFuture, ProcessToken, Supervisor};
use super::launch::LaunchConfig;
use super::protocol::CommandProtocol;
use super::tracker::{PromptProgress, PromptTracker, wait_for_prompt};

/// Everything that belongs to one live subprocess.
///
/// Only ever touched under `ProcessSupervisor::slot`.
struct ProcessHandle {
    token: ProcessToken,
    child: Child,
    stdin: Arc<tokio::sync::Mutex<ChildStdin>>,
    output: OutputBroadcaster,
    protocol: CommandProtocol,
    tracker: Arc<PromptTracker>,
    /// Set until somebody has waited for the ready prompt.
    handshake_pending: bool,
}

impl ProcessHandle {
    /// Release the output and take what a waiter needs.
    fn begin_wait(&mut self) -> Waiter {
        self.output.release();
        Waiter {
            token: self.token,
            handshake_pending: std::mem::take(&mut self.handshake_pending),
            protocol: self.protocol.clone(),
            progress: self.tracker.subscribe(),
            closed: self.output.closed_watch(),
        }
    }
}

struct Waiter {
    token: ProcessToken,
    handshake_pending: bool,
    protocol: CommandProtocol,
    progress: tokio::sync::watch::Receiver<PromptProgress>,
    closed: tokio::sync::watch::Receiver<bool>,
}

impl Waiter {
    /// Wait for the first prompt the process ever prints.
    async fn ready(&mut self) -> Result<bool> {
        wait_for_prompt(
            &mut self.progress,
            &mut self.closed,
            PromptProgress::default(),
        )
        .await
    }
}

pub struct ProcessSupervisor {
    slot: Mutex<Option<ProcessHandle>>,
    exec_gate: tokio::sync::Mutex<()>,
    generation: AtomicU64,
    output_capacity: usize,
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSupervisor {
    pub fn new() -> Self {
        Self::with_output_capacity(DEFAULT_OUTPUT_CAPACITY)
    }

    pub fn with_output_capacity(output_capacity: usize) -> Self {
        Self {
            slot: Mutex::new(None),
            exec_gate: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
            output_capacity: output_capacity.max(1),
        }
    }

    fn lock_slot(&self) -> MutexGuard<'_, Option<ProcessHandle>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Destroy the subprocess only if it is still the instance named by
    /// `token`; a newer process started in the meantime is left alone.
    fn discard(&self, token: ProcessToken) {
        let stale = {
            let mut slot = self.lock_slot();
            match slot.as_ref() {
                Some(handle) if handle.token == token => slot.take(),
                _ => None,
            }
        };
        if let Some(handle) = stale {
            terminate(handle);
        }
    }

    /// Re-arm a handshake that timed out, so the first `execute` still waits
    /// for the ready prompt.
    fn restore_handshake(&self, token: ProcessToken) {
        let mut slot = self.lock_slot();
        if let Some(handle) = slot.as_mut().filter(|h| h.token == token) {
            handle.handshake_pending = true;
        }
    }

    async fn run_action(&self, action: &str) -> Result<bool> {
        let _gate = self.exec_gate.lock().await;

        let mut waiter = {
            let mut slot = self.lock_slot();
            let handle = slot.as_mut().ok_or_else(|| {
                BuildlaneError::communication("no live build tool process to execute against")
            })?;
            handle.begin_wait()
        };
        let token = waiter.token;
        let protocol = waiter.protocol.clone();

        if waiter.handshake_pending {
            debug!(process = %token, "waiting for build tool to become ready before first action");
            let ready = timeout(protocol.startup_timeout(), waiter.ready()).await;
            match ready {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    self.discard(token);
                    return Err(e);
                }
                Err(_) => {
                    self.discard(token);
                    return Err(BuildlaneError::communication(format!(
                        "build tool did not become ready within {:?}",
                        protocol.startup_timeout()
                    )));
                }
            }
        }

        let stdin = {
            let slot = self.lock_slot();
            match slot.as_ref() {
                Some(handle) if handle.token == token => Arc::clone(&handle.stdin),
                _ => {
                    return Err(BuildlaneError::communication(
                        "build tool process was destroyed before the action was sent",
                    ));
                }
            }
        };

        info!(process = %token, %action, "executing action");
        let started = Instant::now();
        let baseline = *waiter.progress.borrow_and_update();

        let sent = async {
            let mut stdin = stdin.lock().await;
            stdin.write_all(action.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        }
        .await;
        if let Err(e) = sent {
            self.discard(token);
            return Err(BuildlaneError::communication_io(
                format!("failed to send action '{action}' to build tool"),
                e,
            ));
        }

        let finished = wait_for_prompt(&mut waiter.progress, &mut waiter.closed, baseline);
        let finished = match protocol.command_timeout() {
            Some(limit) => timeout(limit, finished).await.unwrap_or_else(|_| {
                Err(BuildlaneError::communication(format!(
                    "action '{action}' did not finish within {limit:?}"
                )))
            }),
            None => finished.await,
        };

        match finished {
            Ok(saw_error) => {
                let success = !saw_error;
                info!(
                    process = %token,
                    %action,
                    success,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "action finished"
                );
                Ok(success)
            }
            Err(e) => {
                warn!(process = %token, %action, error = %e, "action failed; destroying build tool process");
                self.discard(token);
                Err(e)
            }
        }
    }

    async fn release_and_wait(&self, wait: bool) -> Result<()> {
        let mut waiter = {
            let mut slot = self.lock_slot();
            let handle = slot.as_mut().ok_or_else(|| {
                BuildlaneError::communication("no build tool process has been launched")
            })?;
            if !wait {
                handle.output.release();
                return Ok(());
            }
            handle.begin_wait()
        };
        if !waiter.handshake_pending {
            return Ok(());
        }

        let token = waiter.token;
        let startup_timeout = waiter.protocol.startup_timeout();
        let ready = timeout(startup_timeout, waiter.ready()).await;

        match ready {
            Ok(Ok(_)) => {
                info!(process = %token, "build tool ready");
                Ok(())
            }
            Ok(Err(e)) => {
                self.discard(token);
                Err(BuildlaneError::communication(format!(
                    "build tool exited during startup: {e}"
                )))
            }
            Err(_) => {
                warn!(
                    process = %token,
                    timeout = ?startup_timeout,
                    "build tool did not report ready in time; continuing without handshake"
                );
                self.restore_handshake(token);
                Ok(())
            }
        }
    }
}

impl Supervisor for ProcessSupervisor {
    fn launch(&self, config: &LaunchConfig) -> Result<ProcessToken> {
        config.check_launchable()?;

        let mut slot = self.lock_slot();
        if let Some(previous) = slot.take() {
            warn!(process = %previous.token, "launch requested while a process exists; destroying it first");
            terminate(previous);
        }

        let command_line = config.display_command_line();
        let mut child = config.to_command().spawn().map_err(|e| {
            BuildlaneError::LaunchError(format!("failed to start '{command_line}': {e}"))
        })?;

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            let _ = child.start_kill();
            return Err(BuildlaneError::LaunchError(format!(
                "'{command_line}' started without stdio pipes"
            )));
        };

        let tracker = Arc::new(PromptTracker::new(config.protocol().clone()));
        let output = OutputBroadcaster::held_with_observer(
            self.output_capacity,
            Arc::clone(&tracker) as Arc<dyn LineObserver>,
        );
        output.attach_reader(stdout, "stdout");
        output.attach_reader(stderr, "stderr");

        let token = ProcessToken {
            generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
            pid: child.id(),
        };

        info!(
            process = %token,
            cmd = %command_line,
            cwd = %config.working_dir().display(),
            "launched build tool"
        );

        *slot = Some(ProcessHandle {
            token,
            child,
            stdin: Arc::new(tokio::sync::Mutex::new(stdin)),
            output,
            protocol: config.protocol().clone(),
            tracker,
            handshake_pending: true,
        });

        Ok(token)
    }

    fn finish_start(&self, wait: bool) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.release_and_wait(wait))
    }

    fn execute<'a>(&'a self, action: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(self.run_action(action))
    }

    fn is_alive(&self) -> bool {
        let mut slot = self.lock_slot();
        let Some(handle) = slot.as_mut() else {
            return false;
        };

        match handle.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                info!(
                    process = %handle.token,
                    exit_code = status.code().unwrap_or(-1),
                    "build tool process has exited"
                );
                // Readers keep draining the pipes; subscribers see the tail.
                handle.output.release();
                *slot = None;
                false
            }
            Err(e) => {
                warn!(process = %handle.token, error = %e, "cannot query build tool process; discarding it");
                if let Some(handle) = slot.take() {
                    terminate(handle);
                }
                false
            }
        }
    }

    fn destroy(&self) {
        let current = self.lock_slot().take();
        match current {
            Some(handle) => terminate(handle),
            None => debug!("destroy requested with no live build tool process"),
        }
    }

    fn subscribe_to_output(&self, delivery: Delivery) -> Option<OutputSubscription> {
        self.lock_slot()
            .as_ref()
            .map(|handle| handle.output.subscribe(delivery))
    }

    fn current_process(&self) -> Option<ProcessToken> {
        self.lock_slot().as_ref().map(|handle| handle.token)
    }
}

fn terminate(mut handle: ProcessHandle) {
    handle.output.close();
    match handle.child.start_kill() {
        Ok(()) => info!(process = %handle.token, "destroyed build tool process"),
        Err(e) => debug!(
            process = %handle.token,
            error = %e,
            "kill failed; process had probably exited already"
        ),
    }
}
