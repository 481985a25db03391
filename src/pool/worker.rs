// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, watch, Notify};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::consts::LATENCY_WINDOW;
use crate::errors::QueueError;
use crate::observability::messages::pool::{
    AckRefused, JobFinished, QueueUnavailable, WorkerDrained, WorkerStarted,
};
use crate::observability::messages::queue::JobClaimed;
use crate::observability::messages::StructuredLog;
use crate::pool::executor::JobExecutor;
use crate::pool::stats::LatencyWindow;
use crate::queue::{Job, JobQueue, JobStatus};

/// Message on the pool's local dispatch path.
#[derive(Debug)]
pub enum WorkerMessage {
    Work(Job),
    /// Poison pill: the receiving worker exits. Pills are only read by an
    /// idle worker, so no in-flight job is ever abandoned.
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Running,
    Draining,
    Terminated,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Idle => "idle",
            WorkerState::Running => "running",
            WorkerState::Draining => "draining",
            WorkerState::Terminated => "terminated",
        }
    }
}

/// State shared by every worker of one pool.
pub(crate) struct PoolShared {
    pub(crate) region: String,
    pub(crate) pool_id: String,
    pub(crate) queue: Arc<dyn JobQueue>,
    pub(crate) executor: Arc<JobExecutor>,
    pub(crate) poll_interval: Duration,
    /// Poison pills. The idle worker holding this lock is the only one
    /// claiming from the queue.
    pub(crate) inbox: tokio::sync::Mutex<mpsc::UnboundedReceiver<WorkerMessage>>,
    pub(crate) wake: Notify,
    pub(crate) cancel: CancellationToken,
    pub(crate) live: watch::Sender<usize>,
    pub(crate) states: Mutex<BTreeMap<String, WorkerState>>,
    pub(crate) latencies: Mutex<LatencyWindow>,
    pub(crate) jobs_completed: AtomicU64,
    pub(crate) jobs_failed: AtomicU64,
    pub(crate) drained: AtomicU64,
}

impl PoolShared {
    pub(crate) fn new(
        region: String,
        pool_id: String,
        queue: Arc<dyn JobQueue>,
        executor: Arc<JobExecutor>,
        inbox: mpsc::UnboundedReceiver<WorkerMessage>,
        cancel: CancellationToken,
    ) -> Self {
        let poll_interval = queue.options().poll_interval;
        let (live, _) = watch::channel(0);
        Self {
            region,
            pool_id,
            queue,
            executor,
            poll_interval,
            inbox: tokio::sync::Mutex::new(inbox),
            wake: Notify::new(),
            cancel,
            live,
            states: Mutex::new(BTreeMap::new()),
            latencies: Mutex::new(LatencyWindow::new(LATENCY_WINDOW)),
            jobs_completed: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),
            drained: AtomicU64::new(0),
        }
    }

    pub(crate) fn set_state(&self, worker_id: &str, state: WorkerState) {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        states.insert(worker_id.to_string(), state);
    }

    pub(crate) fn count_in(&self, state: WorkerState) -> usize {
        let states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        states.values().filter(|s| **s == state).count()
    }

    pub(crate) fn forget_terminated(&self) {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        states.retain(|_, s| *s != WorkerState::Terminated);
    }

    pub(crate) fn p95_latency_ms(&self) -> u64 {
        self.latencies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .p95()
    }

    /// Wait for the next thing to do: a pending poison pill, or else a job
    /// claimed from the queue for `worker_id`.
    ///
    /// Pills are checked before every claim. A job is only claimed by the
    /// worker that will run it, so a worker retiring on a pill never leaves a
    /// claimed job behind.
    async fn next_message(&self, worker_id: &str) -> Option<WorkerMessage> {
        let mut inbox = self.inbox.lock().await;
        loop {
            match inbox.try_recv() {
                Ok(message) => return Some(message),
                Err(TryRecvError::Disconnected) => return None,
                Err(TryRecvError::Empty) => {}
            }
            if self.cancel.is_cancelled() {
                return None;
            }

            match self.queue.dequeue(worker_id).await {
                Ok(Some(job)) => return Some(WorkerMessage::Work(job)),
                Ok(None) => {}
                Err(e) => QueueUnavailable {
                    region: &self.region,
                    operation: "dequeue",
                    error: &e,
                }
                .log(),
            }

            tokio::select! {
                message = inbox.recv() => return message,
                _ = self.cancel.cancelled() => return None,
                _ = self.wake.notified() => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    async fn process(&self, worker_id: &str, job: Job) {
        self.set_state(worker_id, WorkerState::Running);
        let job_label = job.id.to_string();
        let span = JobClaimed {
            job_id: &job_label,
            worker_id,
            attempt: job.attempt,
        }
        .span("job");

        let elapsed = self.execute_and_ack(worker_id, &job_label, job).instrument(span).await;

        self.latencies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .record(elapsed);
    }

    async fn execute_and_ack(&self, worker_id: &str, job_label: &str, job: Job) -> Duration {
        let started = Instant::now();
        let outcome = self.executor.execute(&job).await;
        let elapsed = started.elapsed();

        match self.queue.ack(job.id, worker_id, outcome).await {
            Ok(status) => {
                if status == JobStatus::Success {
                    self.jobs_completed.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.jobs_failed.fetch_add(1, Ordering::Relaxed);
                }
                JobFinished {
                    worker_id,
                    job_id: job_label,
                    status: status.as_str(),
                    duration: elapsed,
                }
                .log();
            }
            // The queue charges the expired lease as a failed attempt itself.
            Err(QueueError::LeaseLost { .. }) => AckRefused {
                worker_id,
                job_id: job_label,
                duration: elapsed,
            }
            .log(),
            Err(e) => {
                self.jobs_failed.fetch_add(1, Ordering::Relaxed);
                QueueUnavailable {
                    region: &self.region,
                    operation: "ack",
                    error: &e,
                }
                .log();
            }
        }
        elapsed
    }
}

/// Worker loop: idle → running → idle until a poison pill arrives, then
/// idle → draining → terminated.
pub(crate) async fn run_worker(shared: Arc<PoolShared>, worker_id: String) {
    let started = WorkerStarted {
        region: &shared.region,
        worker_id: &worker_id,
    };
    let span = started.span("worker");
    span.in_scope(|| started.log());

    worker_loop(&shared, &worker_id).instrument(span).await;

    shared.set_state(&worker_id, WorkerState::Terminated);
    shared.drained.fetch_add(1, Ordering::Relaxed);
    shared.live.send_modify(|live| *live = live.saturating_sub(1));
    WorkerDrained {
        region: &shared.region,
        worker_id: &worker_id,
    }
    .log();
}

async fn worker_loop(shared: &PoolShared, worker_id: &str) {
    loop {
        shared.set_state(worker_id, WorkerState::Idle);

        match shared.next_message(worker_id).await {
            Some(WorkerMessage::Work(job)) => shared.process(worker_id, job).await,
            Some(WorkerMessage::Stop) | None => {
                shared.set_state(worker_id, WorkerState::Draining);
                return;
            }
        }
    }
}
