// src/signal/mod.rs

//! One-shot completion signal.
//!
//! A `CompletionSignal` moves through `Created -> Begun -> Finished`, with an
//! optional `success()` mark while begun. Waiters can block an OS thread
//! ([`CompletionSignal::wait_blocking`]) or await it from async code
//! ([`CompletionSignal::wait`]); both are woken by `finished()` without any
//! polling.
//!
//! Handles are cheap clones of the same shared state: the producer keeps one
//! to drive the transitions, the caller keeps another to observe them.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::Notify;

/// Coarse state of a signal. Ordered: a signal only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SignalState {
    Created,
    Begun,
    Finished,
}

/// Misuse of the signal state machine.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalError {
    #[error("signal already begun")]
    AlreadyBegun,
    #[error("signal has not begun")]
    NotBegun,
    #[error("success already recorded")]
    AlreadySucceeded,
    #[error("signal already finished")]
    AlreadyFinished,
}

#[derive(Debug, Clone, Copy)]
struct Snapshot {
    state: SignalState,
    succeeded: bool,
}

struct Shared {
    snapshot: Mutex<Snapshot>,
    cond: Condvar,
    notify: Notify,
}

#[derive(Clone)]
pub struct CompletionSignal {
    shared: Arc<Shared>,
}

impl fmt::Debug for CompletionSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = *self.lock();
        f.debug_struct("CompletionSignal")
            .field("state", &snapshot.state)
            .field("succeeded", &snapshot.succeeded)
            .finish()
    }
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionSignal {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                snapshot: Mutex::new(Snapshot {
                    state: SignalState::Created,
                    succeeded: false,
                }),
                cond: Condvar::new(),
                notify: Notify::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Snapshot> {
        self.shared
            .snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn begin(&self) -> Result<(), SignalError> {
        let mut snapshot = self.lock();
        match snapshot.state {
            SignalState::Created => {
                snapshot.state = SignalState::Begun;
                Ok(())
            }
            SignalState::Begun | SignalState::Finished => Err(SignalError::AlreadyBegun),
        }
    }

    /// Mark the eventual outcome as successful.
    pub fn success(&self) -> Result<(), SignalError> {
        let mut snapshot = self.lock();
        match snapshot.state {
            SignalState::Created => Err(SignalError::NotBegun),
            SignalState::Finished => Err(SignalError::AlreadyFinished),
            SignalState::Begun if snapshot.succeeded => Err(SignalError::AlreadySucceeded),
            SignalState::Begun => {
                snapshot.succeeded = true;
                Ok(())
            }
        }
    }

    /// Terminal transition. Wakes every blocked and async waiter.
    pub fn finished(&self) -> Result<(), SignalError> {
        {
            let mut snapshot = self.lock();
            match snapshot.state {
                SignalState::Created => return Err(SignalError::NotBegun),
                SignalState::Finished => return Err(SignalError::AlreadyFinished),
                SignalState::Begun => snapshot.state = SignalState::Finished,
            }
        }
        self.shared.cond.notify_all();
        self.shared.notify.notify_waiters();
        Ok(())
    }

    pub fn state(&self) -> SignalState {
        self.lock().state
    }

    pub fn is_begun(&self) -> bool {
        self.state() != SignalState::Created
    }

    pub fn is_finished(&self) -> bool {
        self.state() == SignalState::Finished
    }

    /// `Some(success)` once finished, `None` before.
    pub fn outcome(&self) -> Option<bool> {
        let snapshot = *self.lock();
        (snapshot.state == SignalState::Finished).then_some(snapshot.succeeded)
    }

    /// Block the current thread until finished and return the outcome.
    ///
    /// Must not be called from inside an async task; use [`Self::wait`] there.
    pub fn wait_blocking(&self) -> bool {
        let mut snapshot = self.lock();
        while snapshot.state != SignalState::Finished {
            snapshot = self
                .shared
                .cond
                .wait(snapshot)
                .unwrap_or_else(PoisonError::into_inner);
        }
        snapshot.succeeded
    }

    /// Wait asynchronously until finished and return the outcome.
    pub async fn wait(&self) -> bool {
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent finished() cannot slip
            // between the check and the await.
            notified.as_mut().enable();

            if let Some(succeeded) = self.outcome() {
                return succeeded;
            }
            notified.await;
        }
    }

    /// Guard that calls `finished()` when dropped, including on early return,
    /// error, panic unwind, or when the owning future is dropped unpolled.
    pub fn finish_guard(&self) -> FinishGuard {
        FinishGuard {
            signal: self.clone(),
        }
    }
}

#[derive(Debug)]
pub struct FinishGuard {
    signal: CompletionSignal,
}

impl FinishGuard {
    pub fn signal(&self) -> &CompletionSignal {
        &self.signal
    }
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        let _ = self.signal.finished();
    }
}
