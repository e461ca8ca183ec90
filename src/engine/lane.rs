// src/engine/lane.rs

//! The serialized execution lane.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::errors::{BuildlaneError, Result};

/// A unit of work queued on the lane.
pub type LaneJob = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

static NEXT_LANE_ID: AtomicU64 = AtomicU64::new(1);

tokio::task_local! {
    static CURRENT_LANE: u64;
}

/// Single worker that runs queued jobs one at a time, in submission order.
///
/// Each job runs in its own Tokio task, awaited by the worker before the next
/// job is taken, so a panicking job is logged and the lane keeps going.
#[derive(Debug)]
pub struct ExecutionLane {
    id: u64,
    tx: Mutex<Option<mpsc::UnboundedSender<LaneJob>>>,
}

impl ExecutionLane {
    /// Spawn the lane worker on `runtime`.
    pub fn spawn(runtime: &Handle) -> Self {
        let id = NEXT_LANE_ID.fetch_add(1, Ordering::Relaxed);
        let (tx, mut rx) = mpsc::unbounded_channel::<LaneJob>();

        runtime.spawn(async move {
            info!(lane = id, "execution lane started");

            while let Some(job) = rx.recv().await {
                let handle = tokio::spawn(CURRENT_LANE.scope(id, job));
                if let Err(e) = handle.await {
                    error!(lane = id, error = %e, "lane job aborted");
                }
            }

            info!(lane = id, "execution lane finished (channel closed)");
        });

        Self {
            id,
            tx: Mutex::new(Some(tx)),
        }
    }

    /// True when called from a job running on this lane.
    pub fn is_current(&self) -> bool {
        CURRENT_LANE.try_with(|id| *id == self.id).unwrap_or(false)
    }

    /// Queue `job` behind everything already submitted and return once it is
    /// queued, not once it has run.
    ///
    /// From inside the lane the job is appended directly; it runs after the
    /// current job returns, never nested inside it.
    pub fn run_serialized(&self, job: LaneJob) -> Result<()> {
        if self.is_current() {
            debug!(lane = self.id, "enqueueing from inside the lane");
        }

        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        match tx.as_ref() {
            Some(tx) => tx.send(job).map_err(|_| BuildlaneError::Disposed),
            None => Err(BuildlaneError::Disposed),
        }
    }

    /// Stop accepting jobs. Jobs already queued still run.
    pub fn close(&self) {
        if self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
        {
            debug!(lane = self.id, "execution lane closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}
