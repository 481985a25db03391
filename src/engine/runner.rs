// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! DAG runner: executes one run of a DAG.
//!
//! The runner combines **dependency counting** with a ready set ordered by
//! topological rank:
//!
//! * every task starts with a counter equal to its number of dependencies;
//! * a task enters the ready set when its counter reaches zero, which only
//!   happens when every dependency *succeeded*;
//! * the ready set hands out tasks lowest rank first, so start order always
//!   respects the topological order (ties broken by declaration order);
//! * at most `max_concurrency` tasks are in flight at once.
//!
//! A task that fails after its retries never decrements its dependents'
//! counters, so everything downstream of it stays `pending` and is reported
//! as failed by propagation. Independent branches keep running.
//!
//! Each run owns all of its state. Concurrent runs of the same DAG share
//! nothing but the (immutable) registry.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::consts::DEFAULT_MAX_TASK_CONCURRENCY;
use crate::config::{validate_dag, WorkflowRegistry};
use crate::dag::{Dag, DependencyGraph, Params, Task};
use crate::engine::run_state::{DagRunResult, TaskRun, TaskState};
use crate::errors::{RunError, ValidationError};
use crate::observability::messages::engine::{
    DagRunCompleted, DagRunStarted, TaskAttemptFailed, TaskAttemptStarted, TaskRetryScheduled,
    TaskSkipped,
};
use crate::observability::messages::StructuredLog;
use crate::observability::{Event, EventKind, EventSink};
use crate::traits::Workflow;
use crate::utils::{merge_params_with_prefixes, RetryPolicy};

/// Error recorded on tasks left unexecuted by a cancelled run.
pub const RUN_CANCELLED: &str = "run cancelled";

pub struct DagRunner {
    registry: WorkflowRegistry,
    events: Arc<dyn EventSink>,
    retry: RetryPolicy,
    max_concurrency: usize,
}

/// Final state of one task after its attempts.
enum TaskOutcome {
    Succeeded { output: Params, attempts: u32 },
    Failed { error: String, attempts: u32 },
}

/// Reported by an in-flight task between attempts.
enum TaskProgress {
    Retrying {
        index: usize,
        attempts: u32,
        next_retry_at: DateTime<Utc>,
        error: String,
    },
    Resumed {
        index: usize,
        attempt: u32,
    },
}

impl DagRunner {
    pub fn new(registry: WorkflowRegistry, events: Arc<dyn EventSink>, retry: RetryPolicy) -> Self {
        Self {
            registry,
            events,
            retry,
            max_concurrency: DEFAULT_MAX_TASK_CONCURRENCY,
        }
    }

    /// Limit how many independent tasks of one run execute at the same time.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn registry(&self) -> &WorkflowRegistry {
        &self.registry
    }

    /// Validate and execute `dag`.
    ///
    /// Returns `Err` only when the DAG is invalid, before any task runs.
    /// Task failures are reported inside the [`DagRunResult`].
    pub async fn run(&self, dag: &Dag, initial_params: Params) -> Result<DagRunResult, RunError> {
        self.run_with_cancel(dag, initial_params, CancellationToken::new())
            .await
    }

    /// Like [`run`](Self::run), but stops starting new tasks once `cancel` fires.
    ///
    /// Tasks already in flight (including their retries) are allowed to finish.
    pub async fn run_with_cancel(
        &self,
        dag: &Dag,
        initial_params: Params,
        cancel: CancellationToken,
    ) -> Result<DagRunResult, RunError> {
        let (progress, _) = watch::channel(Vec::new());
        self.run_observed(dag, initial_params, cancel, &progress)
            .await
    }

    /// Like [`run_with_cancel`](Self::run_with_cancel), publishing every
    /// [`TaskRun`] to `progress` whenever one of them changes state.
    pub async fn run_observed(
        &self,
        dag: &Dag,
        initial_params: Params,
        cancel: CancellationToken,
        progress: &watch::Sender<Vec<TaskRun>>,
    ) -> Result<DagRunResult, RunError> {
        validate_dag(dag, &self.registry).map_err(|errors| RunError::InvalidDag {
            dag_name: dag.name.clone(),
            errors,
        })?;

        let graph = DependencyGraph::from_dag(dag);
        let order = graph.topological_order().ok_or_else(|| RunError::InvalidDag {
            dag_name: dag.name.clone(),
            errors: vec![ValidationError::CyclicDependency {
                dag_name: dag.name.clone(),
                cycle: Vec::new(),
            }],
        })?;

        let started = DagRunStarted {
            dag_name: &dag.name,
            tenant_id: &dag.tenant_id,
            task_count: dag.len(),
            max_concurrency: self.max_concurrency,
        };
        let span = started.span("dag_run");
        span.in_scope(|| started.log());

        let result = self
            .drive(dag, &graph, &order, &initial_params, &cancel, progress)
            .instrument(span)
            .await;
        Ok(result)
    }

    async fn drive(
        &self,
        dag: &Dag,
        graph: &DependencyGraph,
        order: &[usize],
        initial_params: &Params,
        cancel: &CancellationToken,
        progress: &watch::Sender<Vec<TaskRun>>,
    ) -> DagRunResult {
        let mut rank = vec![0usize; graph.len()];
        for (position, &index) in order.iter().enumerate() {
            rank[index] = position;
        }

        let started_at = Utc::now();
        let clock = Instant::now();
        self.events.emit(
            Event::new(EventKind::DagStart)
                .dag(&dag.name)
                .field("tenant_id", dag.tenant_id.as_str())
                .field("task_count", dag.len()),
        );

        let mut runs: Vec<TaskRun> = dag.tasks.iter().map(|t| TaskRun::pending(&t.id)).collect();
        progress.send_replace(runs.clone());
        let mut remaining: Vec<usize> = (0..graph.len())
            .map(|i| graph.dependencies(i).len())
            .collect();
        let mut ready: BTreeSet<(usize, usize)> = (0..graph.len())
            .filter(|&i| remaining[i] == 0)
            .map(|i| (rank[i], i))
            .collect();
        let mut in_flight: JoinSet<(usize, TaskOutcome)> = JoinSet::new();
        let (updates_tx, mut updates) = mpsc::unbounded_channel();

        loop {
            let mut started_any = false;
            while in_flight.len() < self.max_concurrency && !cancel.is_cancelled() {
                let Some((_, index)) = ready.pop_first() else {
                    break;
                };
                let task = &dag.tasks[index];
                let Some(workflow) = self.registry.resolve(&task.workflow_ref) else {
                    // Validation guarantees resolution; treat a race with a
                    // mutated registry as a task failure rather than a panic.
                    self.fail_task(
                        dag,
                        graph,
                        &mut runs,
                        index,
                        format!("unknown workflow '{}'", task.workflow_ref),
                        0,
                    );
                    started_any = true;
                    continue;
                };

                let params = merged_params(initial_params, task, graph, index, &runs);
                runs[index].state = TaskState::Running;
                runs[index].attempt = 1;
                started_any = true;
                in_flight.spawn(
                    run_task(
                        index,
                        workflow,
                        params,
                        task.clone(),
                        dag.name.clone(),
                        self.retry,
                        self.events.clone(),
                        updates_tx.clone(),
                    )
                    .in_current_span(),
                );
            }
            if started_any {
                progress.send_replace(runs.clone());
            }

            // Progress first: an update is always sent before its task returns.
            let joined = tokio::select! {
                biased;
                Some(update) = updates.recv() => {
                    apply_progress(&mut runs, update);
                    progress.send_replace(runs.clone());
                    continue;
                }
                joined = in_flight.join_next() => joined,
            };
            let Some(joined) = joined else {
                break;
            };
            let (index, outcome) = match joined {
                Ok(result) => result,
                // run_task contains workflow panics itself; a JoinError here
                // means the runtime is shutting down.
                Err(error) => {
                    tracing::error!(%error, dag_name = %dag.name, "task supervisor aborted");
                    continue;
                }
            };

            match outcome {
                TaskOutcome::Succeeded { output, attempts } => {
                    let run = &mut runs[index];
                    run.state = TaskState::Succeeded;
                    run.attempt = attempts;
                    run.output = Some(output);
                    run.error = None;
                    run.next_retry_at = None;

                    for &dependent in graph.dependents(index) {
                        remaining[dependent] -= 1;
                        if remaining[dependent] == 0 {
                            ready.insert((rank[dependent], dependent));
                        }
                    }
                }
                TaskOutcome::Failed { error, attempts } => {
                    self.fail_task(dag, graph, &mut runs, index, error, attempts);
                }
            }
            progress.send_replace(runs.clone());
        }

        for run in runs.iter_mut() {
            if matches!(run.state, TaskState::Pending | TaskState::Running) && run.error.is_none() {
                run.state = TaskState::Pending;
                run.error = Some(RUN_CANCELLED.to_string());
                TaskSkipped {
                    task_id: &run.task_id,
                    reason: RUN_CANCELLED,
                }
                .log();
            }
        }
        progress.send_replace(runs.clone());

        let tasks_succeeded = runs.iter().filter(|r| r.state == TaskState::Succeeded).count();
        let tasks_failed = runs.iter().filter(|r| r.counts_as_failed()).count();
        let duration = clock.elapsed();

        DagRunCompleted {
            dag_name: &dag.name,
            tasks_succeeded,
            tasks_failed,
            duration,
        }
        .log();
        self.events.emit(
            Event::new(EventKind::DagDone)
                .dag(&dag.name)
                .field("tasks_succeeded", tasks_succeeded)
                .field("tasks_failed", tasks_failed)
                .field("duration_ms", duration.as_millis() as u64),
        );

        DagRunResult {
            dag_name: dag.name.clone(),
            tenant_id: dag.tenant_id.clone(),
            started_at,
            finished_at: Utc::now(),
            tasks_succeeded,
            tasks_failed,
            per_task: runs.into_iter().map(|r| (r.task_id.clone(), r)).collect(),
        }
    }

    /// Mark `index` failed and everything downstream of it as blocked.
    fn fail_task(
        &self,
        dag: &Dag,
        graph: &DependencyGraph,
        runs: &mut [TaskRun],
        index: usize,
        error: String,
        attempts: u32,
    ) {
        let run = &mut runs[index];
        run.state = TaskState::Failed;
        run.attempt = attempts;
        run.error = Some(error);
        run.next_retry_at = None;

        let reason = format!("upstream task '{}' failed", dag.tasks[index].id);
        for downstream in graph.downstream_of(index) {
            let blocked = &mut runs[downstream];
            if blocked.state == TaskState::Pending && blocked.error.is_none() {
                blocked.error = Some(reason.clone());
                TaskSkipped {
                    task_id: &blocked.task_id,
                    reason: &reason,
                }
                .log();
            }
        }
    }
}

fn apply_progress(runs: &mut [TaskRun], update: TaskProgress) {
    match update {
        TaskProgress::Retrying {
            index,
            attempts,
            next_retry_at,
            error,
        } => {
            let run = &mut runs[index];
            run.state = TaskState::Retrying;
            run.attempt = attempts;
            run.next_retry_at = Some(next_retry_at);
            run.error = Some(error);
        }
        TaskProgress::Resumed { index, attempt } => {
            let run = &mut runs[index];
            run.state = TaskState::Running;
            run.attempt = attempt;
            run.next_retry_at = None;
        }
    }
}

fn retry_time(delay: std::time::Duration) -> DateTime<Utc> {
    let now = Utc::now();
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|delay| now.checked_add_signed(delay))
        .unwrap_or(now)
}

/// Layer params for a task: initial run params, then the task's own params,
/// then each succeeded dependency's output under `"{dep}__{field}"`.
fn merged_params(
    initial: &Params,
    task: &Task,
    graph: &DependencyGraph,
    index: usize,
    runs: &[TaskRun],
) -> Params {
    let mut base = initial.clone();
    for (key, value) in &task.params {
        base.insert(key.clone(), value.clone());
    }

    let dependency_outputs = graph.dependencies(index).iter().filter_map(|&dep| {
        runs[dep]
            .output
            .as_ref()
            .map(|output| (graph.id(dep), output))
    });
    merge_params_with_prefixes(base, dependency_outputs)
}

/// Run all attempts of one task.
///
/// Each attempt runs in its own tokio task so that a panicking workflow is
/// reported as a failed attempt instead of tearing down the run.
async fn run_task(
    index: usize,
    workflow: Arc<dyn Workflow>,
    params: Params,
    task: Task,
    dag_name: String,
    retry: RetryPolicy,
    events: Arc<dyn EventSink>,
    progress: mpsc::UnboundedSender<TaskProgress>,
) -> (usize, TaskOutcome) {
    let mut attempt: u32 = 0;
    loop {
        if attempt > 0 {
            let _ = progress.send(TaskProgress::Resumed {
                index,
                attempt: attempt + 1,
            });
        }
        let started = TaskAttemptStarted {
            dag_name: &dag_name,
            task_id: &task.id,
            workflow_ref: &task.workflow_ref,
            attempt: attempt + 1,
        };
        let span = started.span("task_attempt");
        span.in_scope(|| started.log());
        events.emit(
            Event::new(EventKind::TaskStart)
                .dag(&dag_name)
                .task(&task.id)
                .field("attempt", attempt + 1),
        );

        let call = {
            let workflow = workflow.clone();
            let params = params.clone();
            tokio::spawn(async move { workflow.run(params).await }.instrument(span))
        };
        let result = match call.await {
            Ok(result) => result.map_err(|e| format!("{e:#}")),
            Err(join_error) if join_error.is_panic() => Err(format!(
                "workflow '{}' panicked",
                task.workflow_ref
            )),
            Err(join_error) => Err(join_error.to_string()),
        };

        match result {
            Ok(output) => {
                events.emit(
                    Event::new(EventKind::TaskOk)
                        .dag(&dag_name)
                        .task(&task.id)
                        .field("attempt", attempt + 1),
                );
                return (
                    index,
                    TaskOutcome::Succeeded {
                        output,
                        attempts: attempt + 1,
                    },
                );
            }
            Err(error) => {
                TaskAttemptFailed {
                    dag_name: &dag_name,
                    task_id: &task.id,
                    attempt: attempt + 1,
                    error: &error,
                }
                .log();

                if attempt < task.retries {
                    let delay = retry.delay_for(attempt);
                    attempt += 1;
                    TaskRetryScheduled {
                        task_id: &task.id,
                        next_attempt: attempt + 1,
                        delay,
                    }
                    .log();
                    events.emit(
                        Event::new(EventKind::TaskRetry)
                            .dag(&dag_name)
                            .task(&task.id)
                            .field("attempt", attempt)
                            .field("delay_ms", delay.as_millis() as u64)
                            .field("error", error.as_str()),
                    );
                    let _ = progress.send(TaskProgress::Retrying {
                        index,
                        attempts: attempt,
                        next_retry_at: retry_time(delay),
                        error,
                    });
                    tokio::time::sleep(delay).await;
                    continue;
                }

                events.emit(
                    Event::new(EventKind::TaskFail)
                        .dag(&dag_name)
                        .task(&task.id)
                        .field("attempt", attempt + 1)
                        .field("error", error.as_str()),
                );
                return (
                    index,
                    TaskOutcome::Failed {
                        error,
                        attempts: attempt + 1,
                    },
                );
            }
        }
    }
}
