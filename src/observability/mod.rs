// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability for the conductor: tracing setup, structured log messages,
//! and the lifecycle event sinks.
//!
//! Two channels exist side by side:
//!
//! * `messages` - diagnostic log lines, one struct per message, emitted
//!   through `tracing`.
//! * `events` - lifecycle events (`dag_start`, `task_ok`, ...) written to an
//!   [`EventSink`]. Sinks are write-only and never influence control flow.

pub mod events;
mod logging;
pub mod messages;

pub use events::{
    Event, EventKind, EventSink, JsonlEventSink, MemoryEventSink, NullEventSink,
    TracingEventSink,
};
pub use logging::init_tracing;
