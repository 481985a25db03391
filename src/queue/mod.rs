// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Persistent job queue.
//!
//! [`JobQueue`] is the single source of truth for job state. Workers only
//! change a job through [`JobQueue::ack`]. Two backends implement it:
//!
//! * [`MemoryQueue`] - one mutex over the queue order and the job map; not
//!   durable, for development and tests.
//! * [`PostgresQueue`] - durable and shared across processes; claims use
//!   `FOR UPDATE SKIP LOCKED` so two workers never receive the same job.
//!
//! Delivery is at-least-once. A claimed job carries a lease; when the lease
//! expires without an ack the job counts as a failed attempt and becomes
//! claimable again (or terminally FAILED once retries are exhausted).

use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use crate::config::consts::{DEFAULT_POLL_INTERVAL_MS, DEFAULT_VISIBILITY_TIMEOUT_S};
use crate::config::Settings;
use crate::errors::QueueError;
use crate::utils::RetryPolicy;

mod job;
mod memory;
mod postgres;

pub use job::{Job, JobOutcome, JobStatus, LEASE_EXPIRED_REASON};
pub use memory::MemoryQueue;
pub use postgres::PostgresQueue;

/// Job counts by status. RETRY jobs are counted as pending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: usize,
    pub running: usize,
    pub success: usize,
    pub failed: usize,
}

impl QueueStats {
    /// Nothing waiting and nothing in flight.
    pub fn is_drained(&self) -> bool {
        self.pending == 0 && self.running == 0
    }
}

/// Behaviour shared by all queue backends.
#[derive(Debug, Clone, Copy)]
pub struct QueueOptions {
    /// How long a claimed job stays leased to its worker without an ack.
    pub visibility_timeout: Duration,
    /// Backoff applied when a failed job is scheduled for retry.
    pub retry: RetryPolicy,
    /// Poll interval used by the default [`JobQueue::dequeue_timeout`].
    pub poll_interval: Duration,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            visibility_timeout: Duration::from_secs(DEFAULT_VISIBILITY_TIMEOUT_S),
            retry: RetryPolicy::default(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl From<&Settings> for QueueOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            visibility_timeout: settings.visibility_timeout(),
            retry: settings.retry_policy(),
            poll_interval: settings.poll_interval(),
        }
    }
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Store a new job. Its status is forced to PENDING.
    async fn enqueue(&self, job: Job) -> Result<Uuid, QueueError>;

    /// Atomically claim the next claimable job for `worker_id`, if any.
    ///
    /// Never blocks waiting for work.
    async fn dequeue(&self, worker_id: &str) -> Result<Option<Job>, QueueError>;

    /// Like [`dequeue`](Self::dequeue) but waits up to `timeout` for a job to appear.
    async fn dequeue_timeout(
        &self,
        worker_id: &str,
        timeout: Duration,
    ) -> Result<Option<Job>, QueueError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(job) = self.dequeue(worker_id).await? {
                return Ok(Some(job));
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let wait = self.options().poll_interval.min(deadline - now);
            tokio::time::sleep(wait).await;
        }
    }

    /// Report how a RUNNING job finished. Returns the job's new status.
    ///
    /// Only the worker currently holding the job's lease may ack it. An ack
    /// from a worker whose lease expired (and whose job may since have been
    /// claimed by another worker) fails with [`QueueError::LeaseLost`] and
    /// leaves the job untouched.
    async fn ack(
        &self,
        job_id: Uuid,
        worker_id: &str,
        outcome: JobOutcome,
    ) -> Result<JobStatus, QueueError>;

    async fn stats(&self) -> Result<QueueStats, QueueError>;

    /// Look up a job in any status, including terminal ones.
    async fn get(&self, job_id: Uuid) -> Result<Option<Job>, QueueError>;

    fn options(&self) -> &QueueOptions;

    fn backend_name(&self) -> &'static str;
}
