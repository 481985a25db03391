// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display` for the human-readable line and
//! [`StructuredLog`] to emit the same event with structured fields at the
//! level that fits it.
//!
//! # Organization
//!
//! * `engine` - DAG run and task lifecycle
//! * `queue` - job claims, acks and lease expiry
//! * `scheduler` - ticks and enqueued schedules
//! * `pool` - worker lifecycle and scaling
//! * `autoscaler` - scale decisions
//! * `validation` - DAG validation failures
//!
//! # Usage Pattern
//!
//! ```rust
//! use the_conductor::observability::messages::StructuredLog;
//! use the_conductor::observability::messages::scheduler::ScheduleEnqueued;
//!
//! let msg = ScheduleEnqueued {
//!     schedule_id: "nightly",
//!     dag_path: "nightly.yaml",
//!     job_id: "3f2c",
//! };
//!
//! msg.log();
//! ```

use tracing::Span;

pub mod autoscaler;
pub mod engine;
pub mod pool;
pub mod queue;
pub mod scheduler;
pub mod validation;

/// A log message that knows its own level and structured fields.
pub trait StructuredLog {
    /// Emit the message as a tracing event.
    fn log(&self);

    /// Open a span carrying the message's fields.
    fn span(&self, name: &str) -> Span;
}
