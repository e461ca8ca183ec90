// src/output/subscription.rs

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::types::Delivery;

/// Item yielded by [`OutputSubscription::recv`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    /// One line of subprocess output, without the trailing newline.
    Line(String),
    /// The subscriber fell behind and this many lines were overwritten.
    Dropped(u64),
}

/// Independent cursor into an [`OutputBroadcaster`](super::OutputBroadcaster).
///
/// The sequence is finite: it ends once every reader pump has stopped, or once
/// the broadcaster is closed and the lines already buffered for this cursor
/// have been consumed.
#[derive(Debug)]
pub struct OutputSubscription {
    lines: broadcast::Receiver<String>,
    closed: watch::Receiver<bool>,
    delivery: Delivery,
    closable: bool,
    draining: bool,
    done: bool,
    dropped: u64,
}

impl OutputSubscription {
    pub(crate) fn new(
        lines: broadcast::Receiver<String>,
        closed: watch::Receiver<bool>,
        delivery: Delivery,
    ) -> Self {
        Self {
            lines,
            closed,
            delivery,
            closable: true,
            draining: false,
            done: false,
            dropped: 0,
        }
    }

    pub fn delivery(&self) -> Delivery {
        self.delivery
    }

    /// Total number of lines this cursor has lost by lagging.
    pub fn dropped_total(&self) -> u64 {
        self.dropped
    }

    /// Next event, or `None` once the stream has ended.
    ///
    /// Best-effort subscribers never see `OutputEvent::Dropped`; their lag is
    /// only logged.
    pub async fn recv(&mut self) -> Option<OutputEvent> {
        loop {
            if self.done {
                return None;
            }

            let received = if self.draining {
                match self.lines.try_recv() {
                    Ok(line) => Ok(line),
                    Err(TryRecvError::Lagged(n)) => Err(RecvError::Lagged(n)),
                    Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => Err(RecvError::Closed),
                }
            } else if self.closable {
                tokio::select! {
                    biased;
                    received = self.lines.recv() => received,
                    res = self.closed.wait_for(|c| *c) => {
                        if res.is_ok() {
                            self.draining = true;
                        } else {
                            self.closable = false;
                        }
                        continue;
                    }
                }
            } else {
                self.lines.recv().await
            };

            match received {
                Ok(line) => return Some(OutputEvent::Line(line)),
                Err(RecvError::Closed) => {
                    self.done = true;
                    return None;
                }
                Err(RecvError::Lagged(n)) => {
                    self.dropped += n;
                    match self.delivery {
                        Delivery::Primary => {
                            warn!(dropped = n, "output subscriber fell behind; lines were dropped");
                            return Some(OutputEvent::Dropped(n));
                        }
                        Delivery::BestEffort => {
                            debug!(dropped = n, "best-effort output subscriber skipped lines");
                        }
                    }
                }
            }
        }
    }

    /// Next line of output, skipping drop notices.
    pub async fn next_line(&mut self) -> Option<String> {
        loop {
            match self.recv().await? {
                OutputEvent::Line(line) => return Some(line),
                OutputEvent::Dropped(_) => continue,
            }
        }
    }
}
