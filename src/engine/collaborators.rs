// src/engine/collaborators.rs

//! Narrow interfaces to everything the coordinator does not own: settings,
//! editor state, file-system refresh and the console.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::output::OutputSubscription;
use crate::process::{CommandProtocol, ProcessToken};

/// Source of the values needed to launch the build tool.
///
/// Called on every start, so changed settings take effect on the next
/// subprocess without recreating the coordinator.
pub trait SettingsProvider: Send + Sync {
    fn resolved_interpreter_command(&self) -> String;

    /// Absolute, or relative to the project directory.
    fn resolved_launcher_artifact_path(&self) -> PathBuf;

    /// Extra interpreter parameters, in order.
    fn resolved_extra_parameters(&self) -> Vec<String>;

    /// Flag placed before the launcher path (e.g. `-jar`); `None` passes the
    /// path as a bare argument.
    fn resolved_launcher_flag(&self) -> Option<String> {
        Some("-jar".to_string())
    }

    fn command_protocol(&self) -> CommandProtocol {
        CommandProtocol::default()
    }
}

/// Persists editor buffers before the build tool reads the files.
pub trait EditorStateHook: Send + Sync {
    fn flush_all_pending_edits(&self);
}

/// Tells file-system observers that the build tool may have written files.
pub trait RefreshHook: Send + Sync {
    fn refresh_after_external_change(&self);
}

/// Renders subprocess output.
pub trait ConsoleSink: Send + Sync {
    /// Start rendering `output`, which belongs to the process named by `process`.
    fn attach_to_process(&self, output: OutputSubscription, process: ProcessToken);

    /// Stop rendering and release any UI resources.
    fn dispose(&self) {}
}

/// Builds a fresh console; used at construction and on `recreate()`.
pub trait ConsoleFactory: Send + Sync {
    fn create_console(&self) -> Arc<dyn ConsoleSink>;
}

impl<F> ConsoleFactory for F
where
    F: Fn() -> Arc<dyn ConsoleSink> + Send + Sync,
{
    fn create_console(&self) -> Arc<dyn ConsoleSink> {
        self()
    }
}

/// Hooks for hosts without editor buffers or file watchers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl EditorStateHook for NoopHooks {
    fn flush_all_pending_edits(&self) {
        debug!("no pending edits to flush");
    }
}

impl RefreshHook for NoopHooks {
    fn refresh_after_external_change(&self) {
        debug!("no file-system observers to refresh");
    }
}

/// Everything an `ExecutionCoordinator` consumes from its host.
#[derive(Clone)]
pub struct Collaborators {
    pub settings: Arc<dyn SettingsProvider>,
    pub editor: Arc<dyn EditorStateHook>,
    pub refresh: Arc<dyn RefreshHook>,
    pub consoles: Arc<dyn ConsoleFactory>,
}

impl Collaborators {
    /// Collaborators with no-op editor and refresh hooks.
    pub fn new(settings: Arc<dyn SettingsProvider>, consoles: Arc<dyn ConsoleFactory>) -> Self {
        Self {
            settings,
            editor: Arc::new(NoopHooks),
            refresh: Arc::new(NoopHooks),
            consoles,
        }
    }

    pub fn with_editor(mut self, editor: Arc<dyn EditorStateHook>) -> Self {
        self.editor = editor;
        self
    }

    pub fn with_refresh(mut self, refresh: Arc<dyn RefreshHook>) -> Self {
        self.refresh = refresh;
        self
    }
}
