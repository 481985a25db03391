// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Job, JobOutcome, JobQueue, JobStatus, QueueOptions, QueueStats};
use crate::errors::QueueError;
use crate::observability::messages::queue::{JobAcked, JobClaimed, JobEnqueued, LeaseExpired};
use crate::observability::messages::StructuredLog;

/// Single-process queue. Not durable.
///
/// The arrival order and the job map sit behind one mutex, so a dequeue
/// observes and claims a job in a single critical section.
pub struct MemoryQueue {
    inner: Mutex<Inner>,
    options: QueueOptions,
}

#[derive(Default)]
struct Inner {
    /// Non-terminal job ids in arrival order.
    order: VecDeque<Uuid>,
    jobs: HashMap<Uuid, Job>,
}

impl Inner {
    fn sweep_expired_leases(&mut self, now: chrono::DateTime<Utc>) {
        let expired: Vec<Uuid> = self
            .order
            .iter()
            .filter(|id| self.jobs.get(*id).map(|j| j.lease_expired_at(now)).unwrap_or(false))
            .copied()
            .collect();

        for id in expired {
            if let Some(job) = self.jobs.get_mut(&id) {
                let worker = job.worker_id.clone();
                let status = job.expire_lease(now);
                LeaseExpired {
                    job_id: &id.to_string(),
                    worker_id: worker.as_deref(),
                    next_status: status.as_str(),
                }
                .log();
                if status.is_terminal() {
                    self.order.retain(|o| *o != id);
                }
            }
        }
    }
}

impl MemoryQueue {
    pub fn new(options: QueueOptions) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            options,
        }
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new(QueueOptions::default())
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn enqueue(&self, mut job: Job) -> Result<Uuid, QueueError> {
        let mut inner = self.inner.lock().await;
        if inner.jobs.contains_key(&job.id) {
            return Err(QueueError::Duplicate(job.id));
        }

        job.status = JobStatus::Pending;
        let id = job.id;
        JobEnqueued {
            backend: self.backend_name(),
            job_id: &id.to_string(),
            dag_path: &job.dag_path,
        }
        .log();
        inner.order.push_back(id);
        inner.jobs.insert(id, job);
        Ok(id)
    }

    async fn dequeue(&self, worker_id: &str) -> Result<Option<Job>, QueueError> {
        let now = Utc::now();
        let mut inner = self.inner.lock().await;
        inner.sweep_expired_leases(now);

        // Earliest available first; arrival order breaks ties.
        let next = inner
            .order
            .iter()
            .enumerate()
            .filter_map(|(position, id)| {
                inner
                    .jobs
                    .get(id)
                    .filter(|job| job.is_claimable_at(now))
                    .map(|job| (job.available_at, position, *id))
            })
            .min()
            .map(|(_, _, id)| id);

        let Some(id) = next else {
            return Ok(None);
        };
        let Some(job) = inner.jobs.get_mut(&id) else {
            return Ok(None);
        };

        job.claim(worker_id, now, self.options.visibility_timeout);
        JobClaimed {
            job_id: &id.to_string(),
            worker_id,
            attempt: job.attempt,
        }
        .log();
        Ok(Some(job.clone()))
    }

    async fn ack(
        &self,
        job_id: Uuid,
        worker_id: &str,
        outcome: JobOutcome,
    ) -> Result<JobStatus, QueueError> {
        let now = Utc::now();
        let mut inner = self.inner.lock().await;
        let job = inner
            .jobs
            .get_mut(&job_id)
            .ok_or(QueueError::NotFound(job_id))?;

        if job.status != JobStatus::Running {
            return Err(QueueError::NotRunning {
                job_id,
                status: job.status.to_string(),
            });
        }
        if !job.holds_lease(worker_id, now) {
            return Err(QueueError::LeaseLost {
                job_id,
                worker_id: worker_id.to_string(),
            });
        }

        let status = job.complete(outcome, now, &self.options.retry);
        JobAcked {
            job_id: &job_id.to_string(),
            status: status.as_str(),
            attempt: job.attempt,
            reason: job.last_error.as_deref(),
        }
        .log();

        if status.is_terminal() {
            inner.order.retain(|id| *id != job_id);
        }
        Ok(status)
    }

    async fn stats(&self) -> Result<QueueStats, QueueError> {
        let inner = self.inner.lock().await;
        let mut stats = QueueStats::default();
        for job in inner.jobs.values() {
            match job.status {
                JobStatus::Pending | JobStatus::Retry => stats.pending += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Success => stats.success += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>, QueueError> {
        Ok(self.inner.lock().await.jobs.get(&job_id).cloned())
    }

    fn options(&self) -> &QueueOptions {
        &self.options
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::RetryPolicy;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    fn options(visibility_ms: u64) -> QueueOptions {
        QueueOptions {
            visibility_timeout: Duration::from_millis(visibility_ms),
            retry: RetryPolicy::fixed(10, 100),
            poll_interval: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_fifo_claim_and_ack() {
        let queue = MemoryQueue::new(options(60_000));
        let first = queue.enqueue(Job::new("a.yaml", "acme", 0)).await.unwrap();
        let second = queue.enqueue(Job::new("b.yaml", "acme", 0)).await.unwrap();

        let job = queue.dequeue("w-1").await.unwrap().unwrap();
        assert_eq!(job.id, first);
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.worker_id.as_deref(), Some("w-1"));

        assert_eq!(queue.ack(first, "w-1", JobOutcome::Success).await.unwrap(), JobStatus::Success);
        assert_eq!(queue.dequeue("w-1").await.unwrap().unwrap().id, second);
        assert!(queue.dequeue("w-1").await.unwrap().is_none());

        let stats = queue.stats().await.unwrap();
        assert_eq!(stats, QueueStats { pending: 0, running: 1, success: 1, failed: 0 });
    }

    #[tokio::test]
    async fn test_failed_job_retries_after_backoff_then_fails() {
        let queue = MemoryQueue::new(options(60_000));
        let id = queue.enqueue(Job::new("a.yaml", "acme", 1)).await.unwrap();

        queue.dequeue("w-1").await.unwrap().unwrap();
        assert_eq!(queue.ack(id, "w-1", JobOutcome::failed("boom")).await.unwrap(), JobStatus::Retry);

        // Backoff of 10ms keeps it invisible for a moment.
        assert!(queue.dequeue("w-1").await.unwrap().is_none());
        let retried = queue
            .dequeue_timeout("w-1", Duration::from_millis(500))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(retried.attempt, 1);

        assert_eq!(queue.ack(id, "w-1", JobOutcome::failed("boom again")).await.unwrap(), JobStatus::Failed);
        let job = queue.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.last_error.as_deref(), Some("boom again"));
        assert_eq!(queue.stats().await.unwrap().failed, 1);
    }

    #[tokio::test]
    async fn test_unacked_job_is_reclaimable_after_visibility_timeout() {
        let queue = MemoryQueue::new(options(50));
        let id = queue.enqueue(Job::new("a.yaml", "acme", 3)).await.unwrap();

        let crashed = queue.dequeue("w-crash").await.unwrap().unwrap();
        assert_eq!(crashed.id, id);
        assert!(queue.dequeue("w-2").await.unwrap().is_none());

        tokio::time::sleep(Duration::from_millis(80)).await;

        let reclaimed = queue.dequeue("w-2").await.unwrap().unwrap();
        assert_eq!(reclaimed.id, id);
        assert_eq!(reclaimed.worker_id.as_deref(), Some("w-2"));
        assert_eq!(reclaimed.attempt, 1);
    }

    #[tokio::test]
    async fn test_ack_requires_running_job() {
        let queue = MemoryQueue::default();
        let id = queue.enqueue(Job::new("a.yaml", "acme", 0)).await.unwrap();

        assert!(matches!(
            queue.ack(id, "w-1", JobOutcome::Success).await,
            Err(QueueError::NotRunning { .. })
        ));
        assert!(matches!(
            queue.ack(Uuid::new_v4(), "w-1", JobOutcome::Success).await,
            Err(QueueError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_ack_after_lease_expiry_is_refused() {
        let queue = MemoryQueue::new(options(30));
        let id = queue.enqueue(Job::new("a.yaml", "acme", 3)).await.unwrap();
        queue.dequeue("w-slow").await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;

        // Expired but not yet reclaimed: the slow worker already lost it.
        assert!(matches!(
            queue.ack(id, "w-slow", JobOutcome::Success).await,
            Err(QueueError::LeaseLost { .. })
        ));

        let reclaimed = queue.dequeue("w-2").await.unwrap().unwrap();
        assert_eq!(reclaimed.id, id);

        match queue.ack(id, "w-slow", JobOutcome::Success).await {
            Err(QueueError::LeaseLost { worker_id, .. }) => assert_eq!(worker_id, "w-slow"),
            other => panic!("expected lost lease, got {other:?}"),
        }
        assert_eq!(queue.get(id).await.unwrap().unwrap().status, JobStatus::Running);

        assert_eq!(
            queue.ack(id, "w-2", JobOutcome::failed("real failure")).await.unwrap(),
            JobStatus::Retry
        );
        let job = queue.get(id).await.unwrap().unwrap();
        assert_eq!(job.last_error.as_deref(), Some("real failure"));
        assert_eq!(job.attempt, 2);
    }

    #[tokio::test]
    async fn test_duplicate_enqueue_rejected() {
        let queue = MemoryQueue::default();
        let job = Job::new("a.yaml", "acme", 0);
        queue.enqueue(job.clone()).await.unwrap();
        assert!(matches!(queue.enqueue(job).await, Err(QueueError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_concurrent_dequeue_never_hands_out_a_job_twice() {
        let queue = Arc::new(MemoryQueue::new(options(60_000)));
        for i in 0..200 {
            queue.enqueue(Job::new(format!("{i}.yaml"), "acme", 0)).await.unwrap();
        }

        let mut handles = Vec::new();
        for w in 0..8 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                let mut claimed = Vec::new();
                while let Some(job) = queue.dequeue(&format!("w-{w}")).await.unwrap() {
                    claimed.push(job.id);
                    tokio::task::yield_now().await;
                }
                claimed
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        let unique: HashSet<_> = all.iter().collect();
        assert_eq!(all.len(), 200);
        assert_eq!(unique.len(), 200);
    }
}
