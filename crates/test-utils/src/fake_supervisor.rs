use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use buildlane::errors::{BuildlaneError, Result};
use buildlane::output::{OutputBroadcaster, OutputSubscription};
use buildlane::process::{BoxFuture, LaunchConfig, ProcessToken, Supervisor};
use buildlane::types::Delivery;

/// Shared, ordered log of calls made on fakes and hooks.
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn new_event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// What the fake does when a given action is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeOutcome {
    Success,
    /// The action ran but printed errors.
    ErrorReported,
    /// The pipe "broke": the fake destroys itself and returns an error.
    CommunicationFailure,
    Panic,
}

/// One call to `execute`, with its entry and exit times.
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    pub action: String,
    pub process: ProcessToken,
    pub started: Instant,
    pub finished: Instant,
    /// `None` when `execute` returned an error.
    pub result: Option<bool>,
}

#[derive(Default)]
struct FakeState {
    generation: u64,
    alive: bool,
    output: Option<OutputBroadcaster>,
    launches: Vec<LaunchConfig>,
    executions: Vec<ExecutionRecord>,
    outcomes: HashMap<String, FakeOutcome>,
    launch_failure: Option<String>,
    destroy_count: usize,
}

/// A fake supervisor that:
/// - "launches" without spawning anything, bumping the generation each time
/// - records every launch and every execute interval
/// - returns scripted outcomes per action (default: success)
/// - echoes each executed action on its output, like a build tool would.
///
/// It does not serialize `execute` itself, so overlapping calls show up in
/// [`FakeSupervisor::max_concurrent_executions`].
pub struct FakeSupervisor {
    state: Mutex<FakeState>,
    delay: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
    log: EventLog,
}

impl Default for FakeSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSupervisor {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
            delay: Duration::ZERO,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            log: new_event_log(),
        }
    }

    /// Every execute takes at least `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = log;
        self
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    fn record(&self, event: String) {
        self.log.lock().unwrap().push(event);
    }

    pub fn script(&self, action: &str, outcome: FakeOutcome) {
        self.lock().outcomes.insert(action.to_string(), outcome);
    }

    /// Make every following launch fail with `message`.
    pub fn fail_launches(&self, message: &str) {
        self.lock().launch_failure = Some(message.to_string());
    }

    pub fn allow_launches(&self) {
        self.lock().launch_failure = None;
    }

    pub fn launch_count(&self) -> usize {
        self.lock().launches.len()
    }

    pub fn launches(&self) -> Vec<LaunchConfig> {
        self.lock().launches.clone()
    }

    pub fn executions(&self) -> Vec<ExecutionRecord> {
        self.lock().executions.clone()
    }

    pub fn executed_actions(&self) -> Vec<String> {
        self.lock()
            .executions
            .iter()
            .map(|r| r.action.clone())
            .collect()
    }

    pub fn destroy_count(&self) -> usize {
        self.lock().destroy_count
    }

    pub fn max_concurrent_executions(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Publish a line on the current process's output, as if the tool printed it.
    pub fn publish(&self, line: &str) -> usize {
        match &self.lock().output {
            Some(output) => output.publish(line),
            None => 0,
        }
    }

    fn terminate(state: &mut FakeState) {
        if let Some(output) = state.output.take() {
            output.close();
        }
        state.alive = false;
    }
}

impl Supervisor for FakeSupervisor {
    fn launch(&self, config: &LaunchConfig) -> Result<ProcessToken> {
        let mut state = self.lock();
        if let Some(message) = state.launch_failure.clone() {
            drop(state);
            self.record("launch-failed".to_string());
            return Err(BuildlaneError::LaunchError(message));
        }

        Self::terminate(&mut state);
        state.generation += 1;
        state.alive = true;
        state.output = Some(OutputBroadcaster::new(64));
        state.launches.push(config.clone());
        let token = ProcessToken {
            generation: state.generation,
            pid: None,
        };
        drop(state);

        self.record("launch".to_string());
        Ok(token)
    }

    fn finish_start(&self, _wait: bool) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if let Some(output) = &self.lock().output {
                output.publish(">");
            }
            Ok(())
        })
    }

    fn execute<'a>(&'a self, action: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            let started = Instant::now();
            let (process, outcome) = {
                let state = self.lock();
                if !state.alive {
                    return Err(BuildlaneError::communication(
                        "fake build tool is not running",
                    ));
                }
                if let Some(output) = &state.output {
                    output.publish(action);
                }
                let process = ProcessToken {
                    generation: state.generation,
                    pid: None,
                };
                let outcome = state
                    .outcomes
                    .get(action)
                    .copied()
                    .unwrap_or(FakeOutcome::Success);
                (process, outcome)
            };

            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(active, Ordering::SeqCst);
            self.record(format!("execute:{action}"));

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.active.fetch_sub(1, Ordering::SeqCst);

            let still_current = {
                let state = self.lock();
                state.alive && state.generation == process.generation
            };

            let result = if !still_current {
                Err(BuildlaneError::communication(
                    "fake build tool was destroyed mid-action",
                ))
            } else {
                match outcome {
                    FakeOutcome::Success => Ok(true),
                    FakeOutcome::ErrorReported => Ok(false),
                    FakeOutcome::CommunicationFailure => {
                        self.destroy();
                        Err(BuildlaneError::communication("scripted broken pipe"))
                    }
                    FakeOutcome::Panic => panic!("scripted panic executing '{action}'"),
                }
            };

            self.lock().executions.push(ExecutionRecord {
                action: action.to_string(),
                process,
                started,
                finished: Instant::now(),
                result: result.as_ref().ok().copied(),
            });

            result
        })
    }

    fn is_alive(&self) -> bool {
        self.lock().alive
    }

    fn destroy(&self) {
        {
            let mut state = self.lock();
            state.destroy_count += 1;
            Self::terminate(&mut state);
        }
        self.record("destroy".to_string());
    }

    fn subscribe_to_output(&self, delivery: Delivery) -> Option<OutputSubscription> {
        self.lock()
            .output
            .as_ref()
            .map(|output| output.subscribe(delivery))
    }

    fn current_process(&self) -> Option<ProcessToken> {
        let state = self.lock();
        state.alive.then_some(ProcessToken {
            generation: state.generation,
            pid: None,
        })
    }
}
