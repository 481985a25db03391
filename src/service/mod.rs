// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Run modes wiring scheduler, worker pool and autoscaler together.
//!
//! * [`run_once`] - one scheduler tick, drain the queue, shut down. Meant for
//!   CI or an external cron.
//! * [`serve`] - tick at the configured interval and autoscale the pool until
//!   cancelled.

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::autoscaler::{make_scale_decision, EngineState, ScaleDecision, ScalePolicy};
use crate::config::Runtime;
use crate::errors::QueueError;
use crate::observability::messages::pool::QueueUnavailable;
use crate::observability::messages::StructuredLog;
use crate::pool::WorkerPool;
use crate::queue::QueueStats;

/// Applies autoscaler decisions to one pool and remembers when it last scaled.
pub struct AutoscaleController {
    policy: ScalePolicy,
    last_scale_time: Option<DateTime<Utc>>,
}

impl AutoscaleController {
    pub fn new(policy: ScalePolicy) -> Self {
        Self {
            policy,
            last_scale_time: None,
        }
    }

    pub fn last_scale_time(&self) -> Option<DateTime<Utc>> {
        self.last_scale_time
    }

    /// Decide on a snapshot of `pool` and resize it when the decision says so.
    pub async fn step(
        &mut self,
        pool: &WorkerPool,
        now: DateTime<Utc>,
    ) -> Result<ScaleDecision, QueueError> {
        let stats = pool.get_stats().await?;
        let state = EngineState::from_stats(&stats, self.last_scale_time, now);
        let decision = make_scale_decision(&state, &self.policy);
        decision.log();

        if decision.changes_pool() {
            // A `false` drain is degraded success; the pool already logged it.
            pool.scale_to(decision.desired_workers).await;
            self.last_scale_time = Some(now);
        }
        Ok(decision)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnceReport {
    pub enqueued: usize,
    pub queue: QueueStats,
    /// Whether every worker exited within the shutdown timeout.
    pub clean_shutdown: bool,
}

/// Run one scheduler tick at `now`, process every queued job, then stop.
pub async fn run_once(runtime: &Runtime, now: DateTime<Utc>) -> anyhow::Result<OnceReport> {
    let mut scheduler = runtime.scheduler()?;
    scheduler.restore_from(runtime.state.as_ref(), now)?;
    let enqueued = scheduler.tick(now).await?;

    let pool = runtime.worker_pool();
    pool.scale_to(runtime.settings.min_workers.max(1)).await;
    let mut autoscaler = AutoscaleController::new(runtime.settings.scale_policy());

    let poll = runtime.settings.poll_interval();
    let queue = loop {
        let stats = runtime.queue.stats().await?;
        if stats.is_drained() {
            break stats;
        }
        autoscaler.step(&pool, Utc::now()).await?;
        tokio::time::sleep(poll).await;
    };

    let clean_shutdown = pool.shutdown().await;
    Ok(OnceReport {
        enqueued: enqueued.len(),
        queue,
        clean_shutdown,
    })
}

/// Tick and autoscale until `cancel` fires, then drain the pool.
///
/// Queue failures during a tick are logged and retried on the next tick;
/// they never stop the service. Returns whether the final drain was clean.
pub async fn serve(runtime: &Runtime, cancel: CancellationToken) -> anyhow::Result<bool> {
    let mut scheduler = runtime.scheduler()?;
    scheduler.restore_from(runtime.state.as_ref(), Utc::now())?;

    let pool = runtime.worker_pool();
    pool.scale_to(runtime.settings.min_workers.max(1)).await;
    let mut autoscaler = AutoscaleController::new(runtime.settings.scale_policy());

    let mut ticks = tokio::time::interval(runtime.settings.tick_interval());
    ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticks.tick() => {
                if let Err(e) = scheduler.tick(Utc::now()).await {
                    QueueUnavailable { region: &runtime.region, operation: "enqueue", error: &e }.log();
                }
                if let Err(e) = autoscaler.step(&pool, Utc::now()).await {
                    QueueUnavailable { region: &runtime.region, operation: "stats", error: &e }.log();
                }
            }
        }
    }

    Ok(pool.shutdown().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autoscaler::ScaleDirection;
    use crate::config::{ConductorConfig, MemoryDagCatalog, RuntimeBuilder};
    use crate::dag::{Dag, Task};
    use crate::queue::{Job, JobQueue};
    use crate::scheduler::ScheduleEntry;
    use crate::state::{StateRecordKind, StateStore};
    use chrono::TimeZone;
    use std::sync::Arc;
    use std::time::Duration;

    async fn memory_runtime() -> Runtime {
        let config: ConductorConfig = toml::from_str(
            r#"
            region = "test"

            [settings]
            min_workers = 2
            max_workers = 4
            poll_interval_ms = 10
            tick_interval_s = 1
            retry_base_ms = 1
            retry_cap_ms = 1
            "#,
        )
        .unwrap();
        let mut runtime = RuntimeBuilder::new().build(&config).await.unwrap();

        let dag = Dag::new(
            "hello",
            "acme",
            vec![
                Task::new("greet", "echo").with_param("text", serde_json::json!("hi")),
                Task::new("count", "word_count").depends_on(["greet"]),
            ],
        );
        runtime.catalog = Arc::new(MemoryDagCatalog::new().with_dag("hello.yaml", dag));
        runtime.schedules = vec![
            ScheduleEntry::new("every-minute", "* * * * *", "hello.yaml", "acme"),
            ScheduleEntry::new("never-today", "0 0 1 1 *", "hello.yaml", "acme"),
        ];
        runtime
    }

    #[tokio::test]
    async fn test_run_once_ticks_and_drains() {
        let runtime = memory_runtime().await;
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap();

        let report = run_once(&runtime, now).await.unwrap();

        assert_eq!(report.enqueued, 1);
        assert_eq!(report.queue.success, 1);
        assert!(report.queue.is_drained());
        assert!(report.clean_shutdown);

        let finished = runtime
            .state
            .records_of(StateRecordKind::RunFinished)
            .unwrap();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].field_str("status"), Some("SUCCESS"));
    }

    #[tokio::test]
    async fn test_run_once_twice_in_same_minute_enqueues_once() {
        let runtime = memory_runtime().await;
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap();

        run_once(&runtime, now).await.unwrap();
        let second = run_once(&runtime, now + chrono::Duration::seconds(20))
            .await
            .unwrap();

        assert_eq!(second.enqueued, 0);
        assert_eq!(runtime.queue.stats().await.unwrap().success, 1);
    }

    #[tokio::test]
    async fn test_serve_stops_on_cancel() {
        let runtime = memory_runtime().await;
        let cancel = CancellationToken::new();

        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            stopper.cancel();
        });

        let clean = tokio::time::timeout(Duration::from_secs(5), serve(&runtime, cancel))
            .await
            .expect("serve did not stop")
            .unwrap();
        assert!(clean);
    }

    #[tokio::test]
    async fn test_autoscaler_grows_pool_under_backlog() {
        let runtime = memory_runtime().await;
        let pool = runtime.worker_pool();
        assert!(pool.scale_to(1).await);

        let mut policy = runtime.settings.scale_policy();
        policy.target_queue_depth = 2;
        let mut controller = AutoscaleController::new(policy);

        // Not claimable for an hour, so the backlog stays put.
        let later = Utc::now() + chrono::Duration::hours(1);
        for _ in 0..10 {
            let job = Job::new("hello.yaml", "acme", 0).enqueued_at(later);
            runtime.queue.enqueue(job).await.unwrap();
        }

        let decision = controller.step(&pool, Utc::now()).await.unwrap();
        assert_eq!(decision.direction, ScaleDirection::Up);
        assert_eq!(pool.size(), 3);
        assert!(controller.last_scale_time().is_some());

        let held = controller.step(&pool, Utc::now()).await.unwrap();
        assert_eq!(held.direction, ScaleDirection::Hold);
        assert!(pool.shutdown().await);
    }
}
