// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for scheduler tick events.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A due schedule produced a job.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use the_conductor::observability::messages::scheduler::ScheduleEnqueued;
///
/// let msg = ScheduleEnqueued {
///     schedule_id: "nightly",
///     dag_path: "nightly.yaml",
///     job_id: "0d8e",
/// };
///
/// assert_eq!(msg.to_string(), "Schedule 'nightly' enqueued job 0d8e for DAG 'nightly.yaml'");
/// ```
pub struct ScheduleEnqueued<'a> {
    pub schedule_id: &'a str,
    pub dag_path: &'a str,
    pub job_id: &'a str,
}

impl Display for ScheduleEnqueued<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Schedule '{}' enqueued job {} for DAG '{}'",
            self.schedule_id, self.job_id, self.dag_path
        )
    }
}

impl StructuredLog for ScheduleEnqueued<'_> {
    fn log(&self) {
        tracing::info!(
            schedule_id = self.schedule_id,
            dag_path = self.dag_path,
            job_id = self.job_id,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "schedule_enqueued",
            span_name = name,
            schedule_id = self.schedule_id,
        )
    }
}

/// A schedule was due but its de-dup key for this minute was already recorded.
///
/// # Log Level
/// `debug!`
pub struct ScheduleAlreadyEnqueued<'a> {
    pub schedule_id: &'a str,
    pub minute: &'a str,
}

impl Display for ScheduleAlreadyEnqueued<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Schedule '{}' already enqueued for minute {}",
            self.schedule_id, self.minute
        )
    }
}

impl StructuredLog for ScheduleAlreadyEnqueued<'_> {
    fn log(&self) {
        tracing::debug!(schedule_id = self.schedule_id, minute = self.minute, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("schedule_dedup", span_name = name, schedule_id = self.schedule_id)
    }
}

/// One scheduler tick finished.
///
/// # Log Level
/// `debug!`
pub struct TickCompleted<'a> {
    pub minute: &'a str,
    pub enabled_schedules: usize,
    pub enqueued: usize,
}

impl Display for TickCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Tick for {} checked {} schedules, enqueued {}",
            self.minute, self.enabled_schedules, self.enqueued
        )
    }
}

impl StructuredLog for TickCompleted<'_> {
    fn log(&self) {
        tracing::debug!(
            minute = self.minute,
            enabled_schedules = self.enabled_schedules,
            enqueued = self.enqueued,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("tick", span_name = name, minute = self.minute)
    }
}

/// De-dup keys were rebuilt from the state log.
///
/// # Log Level
/// `info!`
pub struct DedupKeysRestored {
    pub restored: usize,
}

impl Display for DedupKeysRestored {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Restored {} schedule de-dup keys from state log", self.restored)
    }
}

impl StructuredLog for DedupKeysRestored {
    fn log(&self) {
        tracing::info!(restored = self.restored, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("dedup_restore", span_name = name, restored = self.restored)
    }
}
