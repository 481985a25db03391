// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for worker pool lifecycle events.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// A worker task was spawned.
///
/// # Log Level
/// `debug!`
pub struct WorkerStarted<'a> {
    pub region: &'a str,
    pub worker_id: &'a str,
}

impl Display for WorkerStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Worker '{}' started in region '{}'", self.worker_id, self.region)
    }
}

impl StructuredLog for WorkerStarted<'_> {
    fn log(&self) {
        tracing::debug!(region = self.region, worker_id = self.worker_id, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "worker",
            span_name = name,
            region = self.region,
            worker_id = self.worker_id,
        )
    }
}

/// A worker received a poison pill and exited after its current job.
///
/// # Log Level
/// `debug!`
pub struct WorkerDrained<'a> {
    pub region: &'a str,
    pub worker_id: &'a str,
}

impl Display for WorkerDrained<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Worker '{}' drained in region '{}'", self.worker_id, self.region)
    }
}

impl StructuredLog for WorkerDrained<'_> {
    fn log(&self) {
        tracing::debug!(region = self.region, worker_id = self.worker_id, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("worker_drained", span_name = name, worker_id = self.worker_id)
    }
}

/// The pool is changing its worker count.
///
/// # Log Level
/// `info!`
pub struct PoolScaling<'a> {
    pub region: &'a str,
    pub from: usize,
    pub to: usize,
}

impl Display for PoolScaling<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Scaling worker pool '{}' from {} to {} workers",
            self.region, self.from, self.to
        )
    }
}

impl StructuredLog for PoolScaling<'_> {
    fn log(&self) {
        tracing::info!(region = self.region, from = self.from, to = self.to, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "pool_scaling",
            span_name = name,
            region = self.region,
            from = self.from,
            to = self.to,
        )
    }
}

/// Drained workers did not exit before the shutdown timeout.
///
/// This is a degraded success, not an error: the pool carries on.
///
/// # Log Level
/// `warn!`
pub struct DrainTimedOut<'a> {
    pub region: &'a str,
    pub still_running: usize,
    pub timeout: Duration,
}

impl Display for DrainTimedOut<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Worker pool '{}': {} worker(s) still running after {:?}, proceeding",
            self.region, self.still_running, self.timeout
        )
    }
}

impl StructuredLog for DrainTimedOut<'_> {
    fn log(&self) {
        tracing::warn!(
            region = self.region,
            still_running = self.still_running,
            timeout_ms = self.timeout.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("drain_timeout", span_name = name, region = self.region)
    }
}

/// The execution gate refused a job.
///
/// # Log Level
/// `warn!`
pub struct JobDenied<'a> {
    pub job_id: &'a str,
    pub tenant_id: &'a str,
    pub reason: &'a str,
}

impl Display for JobDenied<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Job {} for tenant '{}' denied: {}",
            self.job_id, self.tenant_id, self.reason
        )
    }
}

impl StructuredLog for JobDenied<'_> {
    fn log(&self) {
        tracing::warn!(
            job_id = self.job_id,
            tenant_id = self.tenant_id,
            reason = self.reason,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("job_denied", span_name = name, job_id = self.job_id)
    }
}

/// A worker could not talk to the queue.
///
/// # Log Level
/// `error!` - the worker backs off and keeps polling
pub struct QueueUnavailable<'a> {
    pub region: &'a str,
    pub operation: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for QueueUnavailable<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Queue {} failed for pool '{}': {}",
            self.operation, self.region, self.error
        )
    }
}

impl StructuredLog for QueueUnavailable<'_> {
    fn log(&self) {
        tracing::error!(
            region = self.region,
            operation = self.operation,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("queue_unavailable", span_name = name, operation = self.operation)
    }
}

/// A worker finished a job and acknowledged it.
///
/// # Log Level
/// `info!`
pub struct JobFinished<'a> {
    pub worker_id: &'a str,
    pub job_id: &'a str,
    pub status: &'a str,
    pub duration: Duration,
}

impl Display for JobFinished<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Worker '{}' finished job {} as {} in {:?}",
            self.worker_id, self.job_id, self.status, self.duration
        )
    }
}

impl StructuredLog for JobFinished<'_> {
    fn log(&self) {
        tracing::info!(
            worker_id = self.worker_id,
            job_id = self.job_id,
            status = self.status,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("job", span_name = name, job_id = self.job_id)
    }
}

/// A worker finished a job after its lease ran out; the queue refused the ack.
///
/// # Log Level
/// `warn!` - the job is retried or already owned by another worker
pub struct AckRefused<'a> {
    pub worker_id: &'a str,
    pub job_id: &'a str,
    pub duration: Duration,
}

impl Display for AckRefused<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Worker '{}' lost the lease on job {} after {:?}; result discarded",
            self.worker_id, self.job_id, self.duration
        )
    }
}

impl StructuredLog for AckRefused<'_> {
    fn log(&self) {
        tracing::warn!(
            worker_id = self.worker_id,
            job_id = self.job_id,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("ack_refused", span_name = name, job_id = self.job_id)
    }
}
