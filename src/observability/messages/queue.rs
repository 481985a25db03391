// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for persistent queue events.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A job was accepted by a queue backend.
///
/// # Log Level
/// `debug!`
pub struct JobEnqueued<'a> {
    pub backend: &'a str,
    pub job_id: &'a str,
    pub dag_path: &'a str,
}

impl Display for JobEnqueued<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Enqueued job {} for DAG '{}' on {} queue",
            self.job_id, self.dag_path, self.backend
        )
    }
}

impl StructuredLog for JobEnqueued<'_> {
    fn log(&self) {
        tracing::debug!(
            backend = self.backend,
            job_id = self.job_id,
            dag_path = self.dag_path,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("job_enqueued", span_name = name, job_id = self.job_id)
    }
}

/// A worker claimed a job.
///
/// # Log Level
/// `debug!`
pub struct JobClaimed<'a> {
    pub job_id: &'a str,
    pub worker_id: &'a str,
    pub attempt: u32,
}

impl Display for JobClaimed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Worker '{}' claimed job {} (attempt {})",
            self.worker_id, self.job_id, self.attempt
        )
    }
}

impl StructuredLog for JobClaimed<'_> {
    fn log(&self) {
        tracing::debug!(
            job_id = self.job_id,
            worker_id = self.worker_id,
            attempt = self.attempt,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "job",
            span_name = name,
            job_id = self.job_id,
            worker_id = self.worker_id,
        )
    }
}

/// A job was acknowledged and moved to a new status.
///
/// # Log Level
/// `info!` for terminal statuses, `warn!` for retries
pub struct JobAcked<'a> {
    pub job_id: &'a str,
    pub status: &'a str,
    pub attempt: u32,
    pub reason: Option<&'a str>,
}

impl Display for JobAcked<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Job {} is now {}", self.job_id, self.status)?;
        if let Some(reason) = self.reason {
            write!(f, " after attempt {}: {}", self.attempt, reason)?;
        }
        Ok(())
    }
}

impl StructuredLog for JobAcked<'_> {
    fn log(&self) {
        if self.status == "RETRY" {
            tracing::warn!(
                job_id = self.job_id,
                status = self.status,
                attempt = self.attempt,
                reason = self.reason,
                "{}", self
            );
        } else {
            tracing::info!(
                job_id = self.job_id,
                status = self.status,
                attempt = self.attempt,
                reason = self.reason,
                "{}", self
            );
        }
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "job_acked",
            span_name = name,
            job_id = self.job_id,
            status = self.status,
        )
    }
}

/// A RUNNING job outlived its visibility timeout and was reclaimed.
///
/// # Log Level
/// `warn!` - the worker that held it probably crashed
pub struct LeaseExpired<'a> {
    pub job_id: &'a str,
    pub worker_id: Option<&'a str>,
    pub next_status: &'a str,
}

impl Display for LeaseExpired<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Lease on job {} held by '{}' expired, job moved to {}",
            self.job_id,
            self.worker_id.unwrap_or("unknown"),
            self.next_status
        )
    }
}

impl StructuredLog for LeaseExpired<'_> {
    fn log(&self) {
        tracing::warn!(
            job_id = self.job_id,
            worker_id = self.worker_id,
            next_status = self.next_status,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("lease_expired", span_name = name, job_id = self.job_id)
    }
}
