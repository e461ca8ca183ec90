// src/output/mod.rs

//! Subprocess output fan-out.
//!
//! - [`broadcaster`] reads line-oriented output from one or more pipes and
//!   publishes every line to a bounded broadcast ring.
//! - [`subscription`] is the per-consumer cursor into that ring.
//!
//! A [`LineObserver`] sees each line before it enters the ring.
//!
//! Consumers never block the reader tasks or each other: a consumer that falls
//! more than the ring capacity behind loses the oldest lines, and is told so
//! (see [`crate::types::Delivery`]).

pub mod broadcaster;
pub mod subscription;

pub use broadcaster::{
    DEFAULT_OUTPUT_CAPACITY, LineObserver, OutputBroadcaster, UNTERMINATED_LINE_GRACE,
};
pub use subscription::{OutputEvent, OutputSubscription};
