// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for DAG run and task lifecycle events.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// A DAG run is starting.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use the_conductor::observability::messages::engine::DagRunStarted;
///
/// let msg = DagRunStarted {
///     dag_name: "nightly",
///     tenant_id: "acme",
///     task_count: 3,
///     max_concurrency: 4,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct DagRunStarted<'a> {
    pub dag_name: &'a str,
    pub tenant_id: &'a str,
    pub task_count: usize,
    pub max_concurrency: usize,
}

impl Display for DagRunStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Starting DAG '{}' for tenant '{}': {} tasks, max_concurrency={}",
            self.dag_name, self.tenant_id, self.task_count, self.max_concurrency
        )
    }
}

impl StructuredLog for DagRunStarted<'_> {
    fn log(&self) {
        tracing::info!(
            dag_name = self.dag_name,
            tenant_id = self.tenant_id,
            task_count = self.task_count,
            max_concurrency = self.max_concurrency,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "dag_run",
            span_name = name,
            dag_name = self.dag_name,
            tenant_id = self.tenant_id,
            task_count = self.task_count,
        )
    }
}

/// One attempt of a task is about to call its workflow.
///
/// # Log Level
/// `debug!`
pub struct TaskAttemptStarted<'a> {
    pub dag_name: &'a str,
    pub task_id: &'a str,
    pub workflow_ref: &'a str,
    pub attempt: u32,
}

impl Display for TaskAttemptStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Task '{}' attempt {} calling workflow '{}'",
            self.task_id, self.attempt, self.workflow_ref
        )
    }
}

impl StructuredLog for TaskAttemptStarted<'_> {
    fn log(&self) {
        tracing::debug!(
            dag_name = self.dag_name,
            task_id = self.task_id,
            workflow_ref = self.workflow_ref,
            attempt = self.attempt,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "task",
            span_name = name,
            task_id = self.task_id,
            workflow_ref = self.workflow_ref,
            attempt = self.attempt,
        )
    }
}

/// A DAG run finished. `tasks_failed > 0` means the run failed overall.
///
/// # Log Level
/// `info!` on success, `warn!` when any task failed
pub struct DagRunCompleted<'a> {
    pub dag_name: &'a str,
    pub tasks_succeeded: usize,
    pub tasks_failed: usize,
    pub duration: Duration,
}

impl Display for DagRunCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "DAG '{}' finished in {:?}: {} succeeded, {} failed",
            self.dag_name, self.duration, self.tasks_succeeded, self.tasks_failed
        )
    }
}

impl StructuredLog for DagRunCompleted<'_> {
    fn log(&self) {
        if self.tasks_failed > 0 {
            tracing::warn!(
                dag_name = self.dag_name,
                tasks_succeeded = self.tasks_succeeded,
                tasks_failed = self.tasks_failed,
                duration_ms = self.duration.as_millis() as u64,
                "{}", self
            );
        } else {
            tracing::info!(
                dag_name = self.dag_name,
                tasks_succeeded = self.tasks_succeeded,
                tasks_failed = self.tasks_failed,
                duration_ms = self.duration.as_millis() as u64,
                "{}", self
            );
        }
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "dag_run_completed",
            span_name = name,
            dag_name = self.dag_name,
            tasks_failed = self.tasks_failed,
            duration = ?self.duration,
        )
    }
}

/// One attempt of a task failed.
///
/// # Log Level
/// `warn!` - the runner may still retry
pub struct TaskAttemptFailed<'a> {
    pub dag_name: &'a str,
    pub task_id: &'a str,
    pub attempt: u32,
    pub error: &'a str,
}

impl Display for TaskAttemptFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Task '{}' in DAG '{}' failed on attempt {}: {}",
            self.task_id, self.dag_name, self.attempt, self.error
        )
    }
}

impl StructuredLog for TaskAttemptFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            dag_name = self.dag_name,
            task_id = self.task_id,
            attempt = self.attempt,
            error = self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "task_attempt_failed",
            span_name = name,
            dag_name = self.dag_name,
            task_id = self.task_id,
            attempt = self.attempt,
        )
    }
}

/// A task will be retried after a backoff delay.
///
/// # Log Level
/// `debug!` - the failure itself is already logged
pub struct TaskRetryScheduled<'a> {
    pub task_id: &'a str,
    pub next_attempt: u32,
    pub delay: Duration,
}

impl Display for TaskRetryScheduled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Retrying task '{}' (attempt {}) in {:?}",
            self.task_id, self.next_attempt, self.delay
        )
    }
}

impl StructuredLog for TaskRetryScheduled<'_> {
    fn log(&self) {
        tracing::debug!(
            task_id = self.task_id,
            next_attempt = self.next_attempt,
            delay_ms = self.delay.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "task_retry",
            span_name = name,
            task_id = self.task_id,
            next_attempt = self.next_attempt,
        )
    }
}

/// A task was not executed because an upstream task failed or the run was cancelled.
///
/// # Log Level
/// `warn!`
pub struct TaskSkipped<'a> {
    pub task_id: &'a str,
    pub reason: &'a str,
}

impl Display for TaskSkipped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Task '{}' not executed: {}", self.task_id, self.reason)
    }
}

impl StructuredLog for TaskSkipped<'_> {
    fn log(&self) {
        tracing::warn!(task_id = self.task_id, reason = self.reason, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("task_skipped", span_name = name, task_id = self.task_id)
    }
}
