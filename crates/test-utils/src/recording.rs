use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use buildlane::engine::{ConsoleFactory, ConsoleSink, EditorStateHook, RefreshHook};
use buildlane::output::OutputSubscription;
use buildlane::process::ProcessToken;

use crate::fake_supervisor::{EventLog, new_event_log};

/// Console that collects every line it is given.
#[derive(Default)]
pub struct RecordingConsole {
    attached: Mutex<Vec<ProcessToken>>,
    lines: Arc<Mutex<Vec<String>>>,
    disposed: AtomicBool,
}

impl RecordingConsole {
    pub fn attached(&self) -> Vec<ProcessToken> {
        self.attached.lock().unwrap().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl ConsoleSink for RecordingConsole {
    fn attach_to_process(&self, mut output: OutputSubscription, process: ProcessToken) {
        self.attached.lock().unwrap().push(process);
        let lines = Arc::clone(&self.lines);
        tokio::spawn(async move {
            while let Some(line) = output.next_line().await {
                lines.lock().unwrap().push(line);
            }
        });
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }
}

/// Console factory that keeps every console it created, in order.
#[derive(Default)]
pub struct RecordingConsoles {
    created: Mutex<Vec<Arc<RecordingConsole>>>,
}

impl RecordingConsoles {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn created(&self) -> Vec<Arc<RecordingConsole>> {
        self.created.lock().unwrap().clone()
    }

    pub fn latest(&self) -> Option<Arc<RecordingConsole>> {
        self.created.lock().unwrap().last().cloned()
    }
}

impl ConsoleFactory for RecordingConsoles {
    fn create_console(&self) -> Arc<dyn ConsoleSink> {
        let console = Arc::new(RecordingConsole::default());
        self.created.lock().unwrap().push(Arc::clone(&console));
        console
    }
}

/// Editor and refresh hooks that count their calls and log them.
pub struct RecordingHooks {
    flushes: AtomicUsize,
    refreshes: AtomicUsize,
    log: EventLog,
}

impl RecordingHooks {
    pub fn new() -> Arc<Self> {
        Self::with_log(new_event_log())
    }

    pub fn with_log(log: EventLog) -> Arc<Self> {
        Arc::new(Self {
            flushes: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
            log,
        })
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

impl EditorStateHook for RecordingHooks {
    fn flush_all_pending_edits(&self) {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push("flush".to_string());
    }
}

impl RefreshHook for RecordingHooks {
    fn refresh_after_external_change(&self) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push("refresh".to_string());
    }
}
