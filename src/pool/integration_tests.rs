// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;
use std::time::Duration;

use crate::backends::stub::{call_log, FlakyWorkflow, RecordingWorkflow, StubWorkflow};
use crate::config::{MemoryDagCatalog, WorkflowRegistry};
use crate::dag::{Dag, Task};
use crate::engine::DagRunner;
use crate::errors::PoolError;
use crate::observability::NullEventSink;
use crate::pool::{
    DenyReason, ExecutionGate, GateDecision, JobExecutor, WorkerPool, WorkerState,
};
use crate::queue::{Job, JobQueue, JobStatus, MemoryQueue, QueueOptions};
use crate::state::{MemoryStateStore, StateRecordKind, StateStore};
use crate::utils::RetryPolicy;
use async_trait::async_trait;

fn fast_queue() -> Arc<MemoryQueue> {
    Arc::new(MemoryQueue::new(QueueOptions {
        visibility_timeout: Duration::from_secs(30),
        retry: RetryPolicy::fixed(1, 1),
        poll_interval: Duration::from_millis(10),
    }))
}

fn executor(registry: WorkflowRegistry, dag: Dag, state: Arc<MemoryStateStore>) -> JobExecutor {
    let catalog = Arc::new(MemoryDagCatalog::new().with_dag("job.yaml", dag));
    let runner = Arc::new(DagRunner::new(
        registry,
        Arc::new(NullEventSink),
        RetryPolicy::fixed(1, 1),
    ));
    JobExecutor::new(catalog, runner, Arc::new(NullEventSink), state)
}

fn stub_executor() -> (JobExecutor, Arc<MemoryStateStore>) {
    let mut registry = WorkflowRegistry::new();
    registry.register("ok", Arc::new(StubWorkflow::new("ok")));
    let dag = Dag::new("job", "acme", vec![Task::new("only", "ok")]);
    let state = Arc::new(MemoryStateStore::new());
    (executor(registry, dag, state.clone()), state)
}

macro_rules! eventually {
    ($cond:expr) => {{
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !($cond) {
            assert!(
                tokio::time::Instant::now() < deadline,
                "not met within 5s: {}",
                stringify!($cond)
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }};
}

#[tokio::test]
async fn test_pool_executes_submitted_jobs() {
    let queue = fast_queue();
    let (executor, state) = stub_executor();
    let pool = WorkerPool::new("us-east", queue.clone(), Arc::new(executor), Duration::from_secs(5));
    assert!(pool.scale_to(3).await);

    for _ in 0..5 {
        pool.submit_job(Job::new("job.yaml", "acme", 0)).await.unwrap();
    }

    eventually!(queue.stats().await.unwrap().success == 5);

    let stats = pool.get_stats().await.unwrap();
    assert_eq!(stats.total_workers, 3);
    assert_eq!(stats.jobs_completed, 5);
    assert_eq!(stats.jobs_failed, 0);
    assert_eq!(stats.queue_depth, 0);
    assert_eq!(
        state.records_of(StateRecordKind::RunFinished).unwrap().len(),
        5
    );

    assert!(pool.shutdown().await);
}

#[tokio::test]
async fn test_scale_down_from_ten_to_six_drains_four_workers() {
    let (executor, _) = stub_executor();
    let pool = WorkerPool::new("us-east", fast_queue(), Arc::new(executor), Duration::from_secs(5));

    assert!(pool.scale_to(10).await);
    assert!(pool.scale_to(6).await);

    let stats = pool.get_stats().await.unwrap();
    assert_eq!(stats.total_workers, 6);
    assert_eq!(stats.drained_workers, 4);

    let states = pool.worker_states();
    let terminated = states
        .iter()
        .filter(|(_, s)| *s == WorkerState::Terminated)
        .count();
    assert_eq!(terminated, 4);
    assert_eq!(states.len() - terminated, 6);

    assert!(pool.shutdown().await);
}

#[tokio::test]
async fn test_scale_down_never_abandons_in_flight_jobs() {
    let queue = fast_queue();
    let log = call_log();
    let mut registry = WorkflowRegistry::new();
    registry.register(
        "slow",
        Arc::new(RecordingWorkflow::new("slow", log.clone()).with_delay(Duration::from_millis(400))),
    );
    let dag = Dag::new("slow", "acme", vec![Task::new("only", "slow")]);
    let executor = executor(registry, dag, Arc::new(MemoryStateStore::new()));
    let pool = WorkerPool::new("us-east", queue.clone(), Arc::new(executor), Duration::from_millis(50));

    assert!(pool.scale_to(2).await);
    pool.submit_job(Job::new("job.yaml", "acme", 0)).await.unwrap();
    pool.submit_job(Job::new("job.yaml", "acme", 0)).await.unwrap();
    eventually!(pool.get_stats().await.unwrap().active_workers == 2);

    // Both workers are busy longer than the shutdown timeout.
    assert!(!pool.scale_to(0).await);
    assert_eq!(pool.size(), 0);

    eventually!(queue.stats().await.unwrap().success == 2);
    eventually!(pool.get_stats().await.unwrap().drained_workers == 2);
    assert_eq!(log.lock().unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pool_scaled_to_zero_claims_nothing() {
    let queue = fast_queue();
    let mut registry = WorkflowRegistry::new();
    registry.register(
        "slow",
        Arc::new(RecordingWorkflow::new("slow", call_log()).with_delay(Duration::from_millis(100))),
    );
    let dag = Dag::new("slow", "acme", vec![Task::new("only", "slow")]);
    let executor = executor(registry, dag, Arc::new(MemoryStateStore::new()));
    let pool = WorkerPool::new("us-east", queue.clone(), Arc::new(executor), Duration::from_secs(5));

    for _ in 0..3 {
        assert!(pool.scale_to(1).await);
        pool.submit_job(Job::new("job.yaml", "acme", 0)).await.unwrap();
        eventually!(pool.get_stats().await.unwrap().active_workers == 1);

        // The only worker retires once its job is done.
        assert!(pool.scale_to(0).await);
    }

    let left = queue.enqueue(Job::new("job.yaml", "acme", 0)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let job = queue.get(left).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert!(job.worker_id.is_none());
    let stats = queue.stats().await.unwrap();
    assert_eq!(stats.running, 0);
    assert_eq!(stats.success, 3);
    assert_eq!(pool.get_stats().await.unwrap().drained_workers, 3);
}

#[tokio::test]
async fn test_failed_job_is_retried_through_the_queue() {
    let queue = fast_queue();
    let flaky = Arc::new(FlakyWorkflow::new("flaky", 1));
    let mut registry = WorkflowRegistry::new();
    registry.register("flaky", flaky.clone());
    let dag = Dag::new("flaky", "acme", vec![Task::new("only", "flaky")]);
    let executor = executor(registry, dag, Arc::new(MemoryStateStore::new()));
    let pool = WorkerPool::new("us-east", queue.clone(), Arc::new(executor), Duration::from_secs(5));
    assert!(pool.scale_to(1).await);

    let job_id = pool
        .submit_job(Job::new("job.yaml", "acme", 2))
        .await
        .unwrap();

    eventually!(queue.get(job_id).await.unwrap().map(|j| j.status) == Some(JobStatus::Success));

    let job = queue.get(job_id).await.unwrap().unwrap();
    assert_eq!(job.attempt, 1);
    assert_eq!(flaky.calls(), 2);

    let stats = pool.get_stats().await.unwrap();
    assert_eq!(stats.jobs_failed, 1);
    assert_eq!(stats.jobs_completed, 1);
    assert!(pool.shutdown().await);
}

struct DenyTenant(&'static str);

#[async_trait]
impl ExecutionGate for DenyTenant {
    async fn check(&self, job: &Job) -> GateDecision {
        if job.tenant_id == self.0 {
            GateDecision::Deny(DenyReason::RbacDenied)
        } else {
            GateDecision::Allow
        }
    }
}

#[tokio::test]
async fn test_denied_job_fails_without_retry() {
    let queue = fast_queue();
    let (executor, state) = stub_executor();
    let executor = executor.with_gate(Arc::new(DenyTenant("mallory")));
    let pool = WorkerPool::new("us-east", queue.clone(), Arc::new(executor), Duration::from_secs(5));
    assert!(pool.scale_to(1).await);

    let denied = pool
        .submit_job(Job::new("job.yaml", "mallory", 3))
        .await
        .unwrap();
    let allowed = pool.submit_job(Job::new("job.yaml", "acme", 3)).await.unwrap();

    eventually!(queue.stats().await.unwrap().is_drained());

    let denied = queue.get(denied).await.unwrap().unwrap();
    assert_eq!(denied.status, JobStatus::Failed);
    assert_eq!(denied.attempt, 0);
    assert_eq!(denied.last_error.as_deref(), Some("rbac_denied"));

    let allowed = queue.get(allowed).await.unwrap().unwrap();
    assert_eq!(allowed.status, JobStatus::Success);

    // Only the allowed job reached the runner.
    assert_eq!(state.records_of(StateRecordKind::RunStarted).unwrap().len(), 1);
    assert!(pool.shutdown().await);
}

#[tokio::test]
async fn test_submit_respects_region_binding() {
    let queue = fast_queue();
    let (executor, _) = stub_executor();
    let pool = WorkerPool::new("eu-west", queue.clone(), Arc::new(executor), Duration::from_secs(1));

    let err = pool
        .submit_job(Job::new("job.yaml", "acme", 0).with_region("us-east"))
        .await
        .unwrap_err();
    assert!(matches!(err, PoolError::RegionMismatch { .. }));

    let job_id = pool.submit_job(Job::new("job.yaml", "acme", 0)).await.unwrap();
    let job = queue.get(job_id).await.unwrap().unwrap();
    assert_eq!(job.region.as_deref(), Some("eu-west"));
}

#[tokio::test]
async fn test_shutdown_drains_and_closes_pool() {
    let (executor, _) = stub_executor();
    let pool = WorkerPool::new("us-east", fast_queue(), Arc::new(executor), Duration::from_secs(5));
    assert!(pool.scale_to(4).await);

    assert!(pool.shutdown().await);
    assert_eq!(pool.get_stats().await.unwrap().drained_workers, 4);

    let err = pool
        .submit_job(Job::new("job.yaml", "acme", 0))
        .await
        .unwrap_err();
    assert!(matches!(err, PoolError::ShutDown));
    assert!(!pool.scale_to(2).await);
}
