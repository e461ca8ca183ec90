// src/process/mod.rs

//! Build-tool subprocess management.
//!
//! - [`launch`] describes how to start the subprocess (`LaunchConfig`).
//! - [`protocol`] recognises the ready/end-of-command prompt and error lines.
//! - [`tracker`] counts prompts and error lines as output is read, which
//!   is how the supervisor decides that a command has finished and whether it
//!   failed.
//! - [`backend`] defines the `Supervisor` trait the coordinator drives, so
//!   tests can replace the real process with a fake.
//! - [`supervisor`] is the production `ProcessSupervisor`, built on
//!   `tokio::process`.

pub mod backend;
pub mod launch;
pub mod protocol;
pub mod supervisor;
pub mod tracker;

pub use backend::{BoxFuture, ProcessToken, Supervisor};
pub use launch::LaunchConfig;
pub use protocol::{CommandProtocol, parse_duration};
pub use supervisor::ProcessSupervisor;
