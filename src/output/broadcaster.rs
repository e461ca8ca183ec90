// src/output/broadcaster.rs

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::debug;

use crate::types::Delivery;

use super::subscription::OutputSubscription;

/// Lines kept for lagging subscribers before the oldest are overwritten.
pub const DEFAULT_OUTPUT_CAPACITY: usize = 1024;

/// How long an unterminated tail must stay quiet before an observer may claim
/// it as a complete line.
pub const UNTERMINATED_LINE_GRACE: Duration = Duration::from_millis(50);

const READ_CHUNK: usize = 8 * 1024;

/// Sees every line before it enters the ring, so it never misses one to lag.
pub trait LineObserver: Send + Sync {
    fn observe(&self, line: &str);

    /// Whether an unterminated tail that has gone quiet should be emitted as
    /// a line of its own. Interactive prompts are often printed this way.
    fn accepts_unterminated(&self, _partial: &str) -> bool {
        false
    }
}

struct Inner {
    lines: broadcast::Sender<String>,
    released: watch::Sender<bool>,
    closed: watch::Sender<bool>,
    /// Reader pumps still running.
    pumps: AtomicUsize,
    observer: Option<Arc<dyn LineObserver>>,
}

impl Inner {
    fn emit(&self, line: String) {
        if let Some(observer) = &self.observer {
            observer.observe(&line);
        }
        // No subscribers is not an error; the line simply has no audience.
        let _ = self.lines.send(line);
    }

    fn accepts_unterminated(&self, partial: &[u8]) -> bool {
        match &self.observer {
            Some(observer) if !partial.is_empty() => {
                observer.accepts_unterminated(&decode_line(partial))
            }
            _ => false,
        }
    }
}

/// Fan-out source for one subprocess's output.
///
/// Reader pumps attached with [`attach_reader`](Self::attach_reader) do not
/// start reading until the broadcaster is released. This lets the owner
/// subscribe its consumers between spawning the process and letting the first
/// line through.
#[derive(Clone)]
pub struct OutputBroadcaster {
    inner: Arc<Inner>,
}

impl fmt::Debug for OutputBroadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputBroadcaster")
            .field("subscribers", &self.inner.lines.receiver_count())
            .field("released", &*self.inner.released.borrow())
            .field("closed", &*self.inner.closed.borrow())
            .finish()
    }
}

impl OutputBroadcaster {
    /// Create a broadcaster whose reader pumps are held until `release()`.
    pub fn held(capacity: usize) -> Self {
        Self::build(capacity, None)
    }

    /// Like [`held`](Self::held), with `observer` called for every line.
    pub fn held_with_observer(capacity: usize, observer: Arc<dyn LineObserver>) -> Self {
        Self::build(capacity, Some(observer))
    }

    fn build(capacity: usize, observer: Option<Arc<dyn LineObserver>>) -> Self {
        let (lines, _) = broadcast::channel(capacity.max(1));
        let (released, _) = watch::channel(false);
        let (closed, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                lines,
                released,
                closed,
                pumps: AtomicUsize::new(0),
                observer,
            }),
        }
    }

    /// Create a broadcaster that is released from the start.
    pub fn new(capacity: usize) -> Self {
        let broadcaster = Self::held(capacity);
        broadcaster.release();
        broadcaster
    }

    /// Subscribe from the current position onwards.
    pub fn subscribe(&self, delivery: Delivery) -> OutputSubscription {
        OutputSubscription::new(
            self.inner.lines.subscribe(),
            self.inner.closed.subscribe(),
            delivery,
        )
    }

    /// Publish a single line to the observer and every current subscriber.
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, line: impl Into<String>) -> usize {
        let line = line.into();
        if let Some(observer) = &self.inner.observer {
            observer.observe(&line);
        }
        self.inner.lines.send(line).unwrap_or(0)
    }

    /// Let held reader pumps start reading.
    pub fn release(&self) {
        self.inner.released.send_replace(true);
    }

    /// End every subscription once its already-buffered lines are consumed.
    ///
    /// Used when the process is destroyed, so readers do not wait on pipes
    /// that a stray grandchild might keep open.
    pub fn close(&self) {
        self.inner.released.send_replace(true);
        self.inner.closed.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.inner.closed.borrow()
    }

    /// Watch that flips to `true` once the broadcaster is closed.
    pub fn closed_watch(&self) -> watch::Receiver<bool> {
        self.inner.closed.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lines.receiver_count()
    }

    /// Spawn a pump that forwards every line of `reader` to the subscribers.
    ///
    /// Lines end at `\n` (a trailing `\r` is stripped too). An unterminated
    /// tail is emitted at EOF, or earlier if the observer accepts it after
    /// [`UNTERMINATED_LINE_GRACE`] without further output.
    ///
    /// The pump ends at EOF, on a read error, or when the broadcaster is closed.
    /// When the last attached pump ends the broadcaster closes itself, so
    /// every subscription finishes after the tail of the output.
    pub fn attach_reader<R>(&self, mut reader: R, stream: &'static str) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        inner.pumps.fetch_add(1, Ordering::SeqCst);
        let mut released = inner.released.subscribe();
        let mut closed = inner.closed.subscribe();

        tokio::spawn(async move {
            // `inner` keeps both senders alive, so these waits cannot fail.
            let _ = released.wait_for(|r| *r).await;

            let mut pending: Vec<u8> = Vec::new();
            let mut chunk = vec![0u8; READ_CHUNK];
            loop {
                let quiet_tail = inner.accepts_unterminated(&pending);
                let read = tokio::select! {
                    read = reader.read(&mut chunk) => read,
                    _ = sleep(UNTERMINATED_LINE_GRACE), if quiet_tail => {
                        inner.emit(decode_line(&pending));
                        pending.clear();
                        continue;
                    }
                    _ = closed.wait_for(|c| *c) => break,
                };

                match read {
                    Ok(0) => {
                        if !pending.is_empty() {
                            inner.emit(decode_line(&pending));
                        }
                        break;
                    }
                    Ok(n) => {
                        pending.extend_from_slice(&chunk[..n]);
                        while let Some(end) = pending.iter().position(|b| *b == b'\n') {
                            let rest = pending.split_off(end + 1);
                            let line = std::mem::replace(&mut pending, rest);
                            inner.emit(decode_line(&line[..end]));
                        }
                    }
                    Err(e) => {
                        debug!(stream, error = %e, "output read error; stopping pump");
                        break;
                    }
                }
            }

            debug!(stream, "output pump ended");
            if inner.pumps.fetch_sub(1, Ordering::SeqCst) == 1 {
                inner.closed.send_replace(true);
            }
        })
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
