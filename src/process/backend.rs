// src/process/backend.rs

//! Pluggable supervisor abstraction.
//!
//! The coordinator talks to a `Supervisor` instead of a concrete process
//! owner. Production code uses [`ProcessSupervisor`](super::ProcessSupervisor);
//! tests swap in a fake that records calls and scripts outcomes without
//! spawning anything.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::errors::Result;
use crate::output::OutputSubscription;
use crate::types::Delivery;

use super::launch::LaunchConfig;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Identity of one launched subprocess.
///
/// `generation` increases with every launch by the same supervisor, so two
/// tokens compare equal only if they name the same process instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessToken {
    pub generation: u64,
    pub pid: Option<u32>,
}

impl fmt::Display for ProcessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pid {
            Some(pid) => write!(f, "#{} (pid {})", self.generation, pid),
            None => write!(f, "#{}", self.generation),
        }
    }
}

/// Owner of at most one live build-tool subprocess.
pub trait Supervisor: Send + Sync {
    /// Spawn the subprocess. Its output is held until
    /// [`finish_start`](Self::finish_start), so subscriptions taken in between
    /// see every line.
    ///
    /// Any previously live subprocess is destroyed first.
    fn launch(&self, config: &LaunchConfig) -> Result<ProcessToken>;

    /// Release the output of a freshly launched subprocess and, if `wait`,
    /// block until it reports ready.
    fn finish_start(&self, wait: bool) -> BoxFuture<'_, Result<()>>;

    /// `launch` followed by `finish_start`.
    fn start<'a>(&'a self, config: &'a LaunchConfig, wait: bool) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.launch(config)?;
            self.finish_start(wait).await
        })
    }

    /// Run one action to completion and report whether it succeeded.
    ///
    /// On a communication failure the implementation destroys its subprocess
    /// before returning the error.
    fn execute<'a>(&'a self, action: &'a str) -> BoxFuture<'a, Result<bool>>;

    fn is_alive(&self) -> bool;

    /// Forcibly end the subprocess, if any. Never fails.
    fn destroy(&self);

    /// Subscribe to the combined output of the current subprocess.
    fn subscribe_to_output(&self, delivery: Delivery) -> Option<OutputSubscription>;

    fn current_process(&self) -> Option<ProcessToken>;
}
