// src/types.rs

use std::fmt;

/// Identifier of the project (or session) an `ExecutionCoordinator` serves.
pub type ProjectId = String;

/// Lifecycle of an `ExecutionCoordinator`.
///
/// - `Uninitialized`: no supervisor exists yet; one is created lazily on the
///   first execution or start request.
/// - `Ready`: a supervisor exists (its subprocess may or may not be alive).
/// - `Disposed`: the subprocess has been torn down and further requests are
///   refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Uninitialized,
    Ready,
    Disposed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Ready => "ready",
            LifecycleState::Disposed => "disposed",
        };
        f.write_str(s)
    }
}

/// How an output subscriber is treated when it falls behind the producer.
///
/// - `Primary`: the console. Lines are never dropped silently: a subscriber
///   that lags receives an explicit `OutputEvent::Dropped(n)` and a warning is
///   logged.
/// - `BestEffort`: diagnostic mirrors. Lag is logged at debug and skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Primary,
    BestEffort,
}
