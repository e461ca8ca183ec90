// src/process/tracker.rs

//! Prompt and error bookkeeping done inside the output reader pumps.
//!
//! The verdict of a command is counted as lines are read, before they enter
//! the bounded output ring, so it does not depend on how far any subscriber
//! has fallen behind.

use tokio::sync::watch;

use crate::errors::{BuildlaneError, Result};
use crate::output::LineObserver;

use super::protocol::CommandProtocol;

/// Running totals since the process was launched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromptProgress {
    pub prompts: u64,
    pub errors: u64,
    /// Value of `errors` when the latest prompt was seen.
    pub errors_at_prompt: u64,
}

pub struct PromptTracker {
    protocol: CommandProtocol,
    progress: watch::Sender<PromptProgress>,
}

impl PromptTracker {
    pub fn new(protocol: CommandProtocol) -> Self {
        let (progress, _) = watch::channel(PromptProgress::default());
        Self { protocol, progress }
    }

    pub fn subscribe(&self) -> watch::Receiver<PromptProgress> {
        self.progress.subscribe()
    }

    pub fn current(&self) -> PromptProgress {
        *self.progress.borrow()
    }
}

impl LineObserver for PromptTracker {
    fn observe(&self, line: &str) {
        let error = self.protocol.is_error(line);
        let prompt = self.protocol.is_prompt(line);
        if !error && !prompt {
            return;
        }
        self.progress.send_modify(|p| {
            if error {
                p.errors += 1;
            }
            if prompt {
                p.prompts += 1;
                p.errors_at_prompt = p.errors;
            }
        });
    }

    fn accepts_unterminated(&self, partial: &str) -> bool {
        self.protocol.is_prompt(partial)
    }
}

/// Wait for the first prompt after `baseline`. Returns whether an error line
/// was seen in between.
///
/// If several prompts arrive before the waiter wakes up, errors printed after
/// the first of them also count against the command.
pub async fn wait_for_prompt(
    progress: &mut watch::Receiver<PromptProgress>,
    closed: &mut watch::Receiver<bool>,
    baseline: PromptProgress,
) -> Result<bool> {
    tokio::select! {
        biased;
        seen = progress.wait_for(|p| p.prompts > baseline.prompts) => {
            if let Ok(p) = seen {
                return Ok(p.errors_at_prompt > baseline.errors);
            }
        }
        _ = closed.wait_for(|c| *c) => {}
    }

    // The last lines may have been counted just before the output closed.
    let last = *progress.borrow();
    if last.prompts > baseline.prompts {
        return Ok(last.errors_at_prompt > baseline.errors);
    }
    Err(BuildlaneError::communication(
        "build tool output closed before the end of the command",
    ))
}
