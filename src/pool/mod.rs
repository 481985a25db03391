// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Region-bound pool of job workers.
//!
//! Idle workers take turns on the local dispatch path: the worker holding it
//! reads any pending [`WorkerMessage::Stop`] first and otherwise claims the
//! next job from the queue as [`WorkerMessage::Work`] for itself. Scaling
//! down pushes one pill per worker to retire. Busy workers never read the
//! dispatch path, so a worker always finishes its current job before it
//! exits, and a job is never claimed on behalf of a worker that is retiring.
//!
//! Every pool is bound to one region at construction. Choosing the pool for
//! a job is the caller's business: [`WorkerPool::submit_job`] rejects jobs
//! tagged with a different region.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::errors::{PoolError, QueueError};
use crate::observability::messages::pool::{DrainTimedOut, PoolScaling};
use crate::observability::messages::StructuredLog;
use crate::queue::{Job, JobQueue};

mod executor;
mod stats;
mod worker;

#[cfg(test)]
mod integration_tests;

pub use crate::traits::{AllowAll, DenyReason, ExecutionGate, GateDecision};
pub use executor::JobExecutor;
pub use stats::WorkerPoolStats;
pub use worker::{WorkerMessage, WorkerState};

use worker::{run_worker, PoolShared};

pub struct WorkerPool {
    shared: Arc<PoolShared>,
    outbox: mpsc::UnboundedSender<WorkerMessage>,
    target: AtomicUsize,
    next_worker: AtomicUsize,
    scaling: tokio::sync::Mutex<()>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    cancel: CancellationToken,
    shutdown_timeout: Duration,
    closed: AtomicBool,
}

impl WorkerPool {
    /// Create an empty pool. Use [`scale_to`](Self::scale_to) to add workers;
    /// that must happen within a tokio runtime.
    pub fn new(
        region: impl Into<String>,
        queue: Arc<dyn JobQueue>,
        executor: Arc<JobExecutor>,
        shutdown_timeout: Duration,
    ) -> Self {
        let region = region.into();
        let pool_id = format!("{}-{}", region, Uuid::new_v4().simple());
        let (outbox, inbox) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let shared = Arc::new(PoolShared::new(
            region,
            pool_id,
            queue,
            executor,
            inbox,
            cancel.clone(),
        ));

        Self {
            shared,
            outbox,
            target: AtomicUsize::new(0),
            next_worker: AtomicUsize::new(0),
            scaling: tokio::sync::Mutex::new(()),
            handles: Mutex::new(Vec::new()),
            cancel,
            shutdown_timeout,
            closed: AtomicBool::new(false),
        }
    }

    pub fn region(&self) -> &str {
        &self.shared.region
    }

    /// Target number of workers.
    pub fn size(&self) -> usize {
        self.target.load(Ordering::SeqCst)
    }

    /// Enqueue a job for this pool's region.
    ///
    /// Untagged jobs are tagged with the pool's region.
    pub async fn submit_job(&self, mut job: Job) -> Result<Uuid, PoolError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PoolError::ShutDown);
        }
        match &job.region {
            Some(region) if region != &self.shared.region => {
                return Err(PoolError::RegionMismatch {
                    job_region: region.clone(),
                    pool_region: self.shared.region.clone(),
                });
            }
            Some(_) => {}
            None => job.region = Some(self.shared.region.clone()),
        }

        let job_id = self.shared.queue.enqueue(job).await?;
        self.shared.wake.notify_one();
        Ok(job_id)
    }

    /// Grow or shrink the pool to `desired` workers.
    ///
    /// Growing spawns workers that start taking jobs immediately and returns
    /// `true`. Shrinking sends one poison pill per surplus worker and waits up
    /// to the shutdown timeout for them to exit; `false` means some are still
    /// finishing their job and the pool proceeds without them.
    pub async fn scale_to(&self, desired: usize) -> bool {
        let _scaling = self.scaling.lock().await;
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        self.resize(desired).await
    }

    /// Drain every worker. Workers still busy after the shutdown timeout are
    /// aborted; their jobs become claimable again once the lease expires.
    pub async fn shutdown(&self) -> bool {
        let _scaling = self.scaling.lock().await;
        if self.closed.swap(true, Ordering::SeqCst) {
            return true;
        }

        let drained = self.resize(0).await;
        self.cancel.cancel();
        if !drained {
            let handles = std::mem::take(&mut *self.lock_handles());
            for handle in handles {
                handle.abort();
            }
        }
        drained
    }

    pub async fn get_stats(&self) -> Result<WorkerPoolStats, QueueError> {
        let queue = self.shared.queue.stats().await?;
        Ok(WorkerPoolStats {
            total_workers: self.size(),
            active_workers: self.shared.count_in(WorkerState::Running),
            idle_workers: self.shared.count_in(WorkerState::Idle),
            queue_depth: queue.pending,
            jobs_completed: self.shared.jobs_completed.load(Ordering::Relaxed),
            jobs_failed: self.shared.jobs_failed.load(Ordering::Relaxed),
            p95_latency_ms: self.shared.p95_latency_ms(),
            drained_workers: self.shared.drained.load(Ordering::Relaxed),
        })
    }

    /// Current state of every worker this pool has started.
    pub fn worker_states(&self) -> Vec<(String, WorkerState)> {
        let states = self.shared.states.lock().unwrap_or_else(|e| e.into_inner());
        states.iter().map(|(id, s)| (id.clone(), *s)).collect()
    }

    async fn resize(&self, desired: usize) -> bool {
        let current = self.target.load(Ordering::SeqCst);
        if desired == current {
            return true;
        }

        PoolScaling {
            region: &self.shared.region,
            from: current,
            to: desired,
        }
        .log();

        if desired > current {
            self.shared.forget_terminated();
            for _ in current..desired {
                self.spawn_worker();
            }
            self.target.store(desired, Ordering::SeqCst);
            return true;
        }

        for _ in desired..current {
            if self.outbox.send(WorkerMessage::Stop).is_err() {
                break;
            }
        }
        self.target.store(desired, Ordering::SeqCst);
        self.await_drain(desired).await
    }

    fn spawn_worker(&self) {
        let n = self.next_worker.fetch_add(1, Ordering::SeqCst);
        let worker_id = format!("{}-worker-{}", self.shared.pool_id, n);
        self.shared.set_state(&worker_id, WorkerState::Idle);
        self.shared.live.send_modify(|live| *live += 1);

        let handle = tokio::spawn(run_worker(self.shared.clone(), worker_id));
        let mut handles = self.lock_handles();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    async fn await_drain(&self, desired: usize) -> bool {
        let mut live = self.shared.live.subscribe();
        let drained = tokio::time::timeout(
            self.shutdown_timeout,
            live.wait_for(|count| *count <= desired),
        )
        .await
        .map(|waited| waited.is_ok())
        .unwrap_or(false);

        if !drained {
            let still_running = self.shared.live.borrow().saturating_sub(desired);
            DrainTimedOut {
                region: &self.shared.region,
                still_running,
                timeout: self.shutdown_timeout,
            }
            .log();
        }
        drained
    }

    fn lock_handles(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.handles.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
