// src/console.rs

//! Terminal console: prints build-tool output on stdout.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tracing::debug;

use crate::engine::{ConsoleFactory, ConsoleSink};
use crate::output::{OutputEvent, OutputSubscription};
use crate::process::ProcessToken;

/// Prints every line of the attached process to stdout.
///
/// Lost lines are reported on stderr so they never mix with tool output.
#[derive(Debug, Default)]
pub struct StdoutConsole {
    printers: Mutex<Vec<JoinHandle<()>>>,
}

impl StdoutConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory suitable for [`Collaborators::new`](crate::engine::Collaborators::new).
    pub fn factory() -> Arc<dyn ConsoleFactory> {
        Arc::new(|| Arc::new(StdoutConsole::new()) as Arc<dyn ConsoleSink>)
    }
}

impl ConsoleSink for StdoutConsole {
    fn attach_to_process(&self, mut output: OutputSubscription, process: ProcessToken) {
        let printer = tokio::spawn(async move {
            while let Some(event) = output.recv().await {
                match event {
                    OutputEvent::Line(line) => println!("{line}"),
                    OutputEvent::Dropped(n) => eprintln!("[buildlane] {n} output line(s) dropped"),
                }
            }
            debug!(process = %process, "console detached from process output");
        });

        let mut printers = self.printers.lock().unwrap_or_else(PoisonError::into_inner);
        printers.retain(|p| !p.is_finished());
        printers.push(printer);
    }

    fn dispose(&self) {
        let mut printers = self.printers.lock().unwrap_or_else(PoisonError::into_inner);
        for printer in printers.drain(..) {
            printer.abort();
        }
    }
}
