// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use chrono::Utc;
use std::sync::Arc;

use crate::config::DagCatalog;
use crate::dag::Params;
use crate::engine::DagRunner;
use crate::observability::messages::pool::JobDenied;
use crate::observability::messages::StructuredLog;
use crate::observability::{Event, EventKind, EventSink};
use crate::queue::{Job, JobOutcome, JobStatus};
use crate::state::{StateRecord, StateRecordKind, StateStore};
use crate::traits::{AllowAll, ExecutionGate, GateDecision};

/// Turns one claimed job into a DAG run and reports the outcome.
///
/// The gate is consulted first. A denied job is rejected without loading its
/// DAG, so no workflow is ever resolved for it.
pub struct JobExecutor {
    catalog: Arc<dyn DagCatalog>,
    runner: Arc<DagRunner>,
    gate: Arc<dyn ExecutionGate>,
    events: Arc<dyn EventSink>,
    state: Arc<dyn StateStore>,
}

impl JobExecutor {
    pub fn new(
        catalog: Arc<dyn DagCatalog>,
        runner: Arc<DagRunner>,
        events: Arc<dyn EventSink>,
        state: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            catalog,
            runner,
            gate: Arc::new(AllowAll),
            events,
            state,
        }
    }

    pub fn with_gate(mut self, gate: Arc<dyn ExecutionGate>) -> Self {
        self.gate = gate;
        self
    }

    pub async fn execute(&self, job: &Job) -> JobOutcome {
        if let GateDecision::Deny(reason) = self.gate.check(job).await {
            let job_label = job.id.to_string();
            JobDenied {
                job_id: &job_label,
                tenant_id: &job.tenant_id,
                reason: reason.as_str(),
            }
            .log();
            self.events.emit(
                Event::new(EventKind::JobDenied)
                    .job(job.id)
                    .field("tenant_id", job.tenant_id.as_str())
                    .field("reason", reason.as_str()),
            );
            return JobOutcome::rejected(reason.as_str());
        }

        let dag = match self.catalog.load(&job.dag_path) {
            Ok(dag) => dag,
            Err(e) => return JobOutcome::failed(e.to_string()),
        };

        self.record(
            StateRecord::new(StateRecordKind::RunStarted, Utc::now())
                .with("job_id", job.id.to_string())
                .with("dag_name", dag.name.as_str())
                .with("dag_path", job.dag_path.as_str())
                .with("tenant_id", job.tenant_id.as_str())
                .with("attempt", job.attempt),
        );

        let (status, outcome, record) = match self.runner.run(&dag, Params::new()).await {
            Ok(result) => {
                let record = StateRecord::new(StateRecordKind::RunFinished, Utc::now())
                    .with("tasks_succeeded", result.tasks_succeeded)
                    .with("tasks_failed", result.tasks_failed);
                match result.failure_summary() {
                    None => (JobStatus::Success, JobOutcome::Success, record),
                    Some(summary) => (
                        JobStatus::Failed,
                        JobOutcome::failed(summary.clone()),
                        record.with("error", summary),
                    ),
                }
            }
            Err(e) => (
                JobStatus::Failed,
                JobOutcome::failed(e.to_string()),
                StateRecord::new(StateRecordKind::RunFinished, Utc::now())
                    .with("error", e.to_string()),
            ),
        };

        self.record(
            record
                .with("job_id", job.id.to_string())
                .with("dag_name", dag.name.as_str())
                .with("status", status.as_str()),
        );
        outcome
    }

    fn record(&self, record: StateRecord) {
        if let Err(e) = self.state.append(record) {
            tracing::warn!(error = %e, "Failed to append run record to state log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::stub::{call_log, FailingWorkflow, RecordingWorkflow, StubWorkflow};
    use crate::config::{MemoryDagCatalog, WorkflowRegistry};
    use crate::dag::{Dag, Task};
    use crate::observability::{MemoryEventSink, NullEventSink};
    use crate::state::MemoryStateStore;
    use crate::traits::DenyReason;
    use crate::utils::RetryPolicy;
    use async_trait::async_trait;

    struct DenyAll(DenyReason);

    #[async_trait]
    impl ExecutionGate for DenyAll {
        async fn check(&self, _job: &Job) -> GateDecision {
            GateDecision::Deny(self.0)
        }
    }

    fn executor_for(
        registry: WorkflowRegistry,
        dag: Dag,
    ) -> (JobExecutor, Arc<MemoryStateStore>) {
        let catalog = Arc::new(MemoryDagCatalog::new().with_dag("d.yaml", dag));
        let runner = Arc::new(DagRunner::new(
            registry,
            Arc::new(NullEventSink),
            RetryPolicy::fixed(1, 1),
        ));
        let state = Arc::new(MemoryStateStore::new());
        let executor = JobExecutor::new(catalog, runner, Arc::new(NullEventSink), state.clone());
        (executor, state)
    }

    #[tokio::test]
    async fn test_successful_run_records_start_and_finish() {
        let mut registry = WorkflowRegistry::new();
        registry.register("ok", Arc::new(StubWorkflow::new("ok")));
        let dag = Dag::new("demo", "acme", vec![Task::new("a", "ok")]);
        let (executor, state) = executor_for(registry, dag);

        let job = Job::new("d.yaml", "acme", 0);
        assert_eq!(executor.execute(&job).await, JobOutcome::Success);

        let kinds: Vec<_> = state.records().unwrap().iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![StateRecordKind::RunStarted, StateRecordKind::RunFinished]);

        let finished = state.records_of(StateRecordKind::RunFinished).unwrap();
        assert_eq!(finished[0].field_str("status"), Some("SUCCESS"));
        assert_eq!(finished[0].field_str("job_id"), Some(job.id.to_string().as_str()));
    }

    #[tokio::test]
    async fn test_failed_run_carries_summary() {
        let mut registry = WorkflowRegistry::new();
        registry.register("boom", Arc::new(FailingWorkflow::new("boom")));
        let dag = Dag::new("demo", "acme", vec![Task::new("a", "boom")]);
        let (executor, state) = executor_for(registry, dag);

        let outcome = executor.execute(&Job::new("d.yaml", "acme", 0)).await;
        match outcome {
            JobOutcome::Failed { reason } => assert!(reason.contains("a: boom failed on call 1")),
            other => panic!("unexpected outcome {:?}", other),
        }

        let finished = state.records_of(StateRecordKind::RunFinished).unwrap();
        assert_eq!(finished[0].field_str("status"), Some("FAILED"));
    }

    #[tokio::test]
    async fn test_unknown_dag_fails_without_running() {
        let (executor, state) = executor_for(WorkflowRegistry::new(), Dag::new("empty", "acme", vec![]));

        let outcome = executor.execute(&Job::new("missing.yaml", "acme", 0)).await;
        assert!(matches!(outcome, JobOutcome::Failed { .. }));
        assert!(state.records().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_denied_job_never_resolves_workflow() {
        let log = call_log();
        let mut registry = WorkflowRegistry::new();
        registry.register("rec", Arc::new(RecordingWorkflow::new("rec", log.clone())));
        let dag = Dag::new("demo", "acme", vec![Task::new("a", "rec")]);

        let catalog = Arc::new(MemoryDagCatalog::new().with_dag("d.yaml", dag));
        let runner = Arc::new(DagRunner::new(
            registry,
            Arc::new(NullEventSink),
            RetryPolicy::default(),
        ));
        let events = Arc::new(MemoryEventSink::new());
        let executor = JobExecutor::new(
            catalog,
            runner,
            events.clone(),
            Arc::new(MemoryStateStore::new()),
        )
        .with_gate(Arc::new(DenyAll(DenyReason::BudgetExceeded)));

        let outcome = executor.execute(&Job::new("d.yaml", "acme", 3)).await;

        assert_eq!(outcome, JobOutcome::rejected("budget_exceeded"));
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(events.kinds(), vec![EventKind::JobDenied]);
        assert_eq!(
            events.events()[0].fields.get("reason"),
            Some(&serde_json::json!("budget_exceeded"))
        );
    }
}
