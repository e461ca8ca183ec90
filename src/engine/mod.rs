// src/engine/mod.rs

//! Request serialization and lifecycle.
//!
//! - [`lane`] is the single worker that runs queued actions one at a time.
//! - [`coordinator`] is the per-project façade: it queues actions on the lane,
//!   drives the supervisor, and wires a `CompletionSignal` per request.
//! - [`collaborators`] are the host-provided hooks (settings, editor flush,
//!   file-system refresh, console).
//! - [`registry`] maps project ids to their coordinators.

pub mod collaborators;
pub mod coordinator;
pub mod lane;
pub mod registry;

pub use collaborators::{
    Collaborators, ConsoleFactory, ConsoleSink, EditorStateHook, NoopHooks, RefreshHook,
    SettingsProvider,
};
pub use coordinator::{
    CoordinatorOptions, ExecutionCoordinator, ExecutionRequest, SupervisorFactory,
};
pub use lane::{ExecutionLane, LaneJob};
pub use registry::CoordinatorRegistry;
pub use crate::types::LifecycleState;
