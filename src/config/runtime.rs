// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::Context;
use std::sync::Arc;

use crate::backends::local::LocalWorkflowFactory;
use crate::config::catalog::{DagCatalog, FileDagCatalog};
use crate::config::loader::{load_schedules, ConductorConfig, QueueBackend};
use crate::config::registry::WorkflowRegistry;
use crate::config::settings::Settings;
use crate::engine::DagRunner;
use crate::errors::ConfigError;
use crate::observability::{EventSink, JsonlEventSink, TracingEventSink};
use crate::pool::{AllowAll, ExecutionGate, JobExecutor, WorkerPool};
use crate::queue::{JobQueue, MemoryQueue, PostgresQueue, QueueOptions};
use crate::scheduler::{ScheduleEntry, Scheduler};
use crate::state::{JsonlStateStore, MemoryStateStore, StateStore};
use crate::traits::Workflow;

/// Everything a conductor process needs, wired from one [`ConductorConfig`].
pub struct Runtime {
    pub region: String,
    pub settings: Settings,
    pub registry: WorkflowRegistry,
    pub catalog: Arc<dyn DagCatalog>,
    pub queue: Arc<dyn JobQueue>,
    pub events: Arc<dyn EventSink>,
    pub state: Arc<dyn StateStore>,
    pub gate: Arc<dyn ExecutionGate>,
    pub schedules: Vec<ScheduleEntry>,
}

impl Runtime {
    pub fn runner(&self) -> DagRunner {
        DagRunner::new(
            self.registry.clone(),
            self.events.clone(),
            self.settings.retry_policy(),
        )
        .with_max_concurrency(self.settings.max_task_concurrency)
    }

    pub fn executor(&self) -> JobExecutor {
        JobExecutor::new(
            self.catalog.clone(),
            Arc::new(self.runner()),
            self.events.clone(),
            self.state.clone(),
        )
        .with_gate(self.gate.clone())
    }

    /// Empty pool for this runtime's region. Must be called inside a tokio runtime.
    pub fn worker_pool(&self) -> WorkerPool {
        WorkerPool::new(
            self.region.clone(),
            self.queue.clone(),
            Arc::new(self.executor()),
            self.settings.worker_shutdown_timeout(),
        )
    }

    pub fn scheduler(&self) -> Result<Scheduler, ConfigError> {
        Ok(Scheduler::new(
            self.schedules.clone(),
            self.queue.clone(),
            self.state.clone(),
            self.settings.max_retries,
        )?
        .with_region(self.region.clone()))
    }
}

/// Builds a [`Runtime`] from configuration.
///
/// The built-in local workflows are registered by default; embedders add
/// their own with [`with_workflow`](Self::with_workflow).
///
/// # Examples
/// ```
/// use the_conductor::config::RuntimeBuilder;
///
/// let builder = RuntimeBuilder::new();
/// assert!(builder.registry().contains("echo"));
/// ```
pub struct RuntimeBuilder {
    registry: WorkflowRegistry,
    gate: Arc<dyn ExecutionGate>,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            registry: LocalWorkflowFactory::builtin_registry(),
            gate: Arc::new(AllowAll),
        }
    }

    pub fn with_registry(mut self, registry: WorkflowRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_workflow(mut self, workflow_ref: impl Into<String>, workflow: Arc<dyn Workflow>) -> Self {
        self.registry.register(workflow_ref, workflow);
        self
    }

    pub fn with_gate(mut self, gate: Arc<dyn ExecutionGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn registry(&self) -> &WorkflowRegistry {
        &self.registry
    }

    /// Open the queue, sinks and stores named by `config` and load its schedules.
    ///
    /// The postgres backend is only used when configured; a connection
    /// failure is returned, never replaced by the in-memory queue.
    pub async fn build(self, config: &ConductorConfig) -> anyhow::Result<Runtime> {
        let settings = config.settings.clone();
        let options = QueueOptions::from(&settings);

        let queue: Arc<dyn JobQueue> = match config.queue.backend {
            QueueBackend::Memory => Arc::new(MemoryQueue::new(options)),
            QueueBackend::Postgres => {
                let url = config
                    .queue
                    .url
                    .as_deref()
                    .ok_or_else(|| ConfigError::InvalidSetting {
                        name: "queue.url".to_string(),
                        value: String::new(),
                        reason: "required when queue.backend = \"postgres\"".to_string(),
                    })?;
                Arc::new(
                    PostgresQueue::connect(url, options)
                        .await
                        .context("connecting to postgres job queue")?,
                )
            }
        };

        let events: Arc<dyn EventSink> = match config.event_log_path() {
            Some(path) => Arc::new(
                JsonlEventSink::open(&path)
                    .with_context(|| format!("opening event log {}", path.display()))?,
            ),
            None => Arc::new(TracingEventSink),
        };

        let state: Arc<dyn StateStore> = match config.state_log_path() {
            Some(path) => Arc::new(JsonlStateStore::new(path)),
            None => Arc::new(MemoryStateStore::new()),
        };

        let schedules = match config.schedules_path() {
            Some(path) => load_schedules(&path)?,
            None => Vec::new(),
        };

        let catalog: Arc<dyn DagCatalog> =
            Arc::new(FileDagCatalog::new(config.dag_dir(), self.registry.clone()));

        Ok(Runtime {
            region: config.region.clone(),
            settings,
            registry: self.registry,
            catalog,
            queue,
            events,
            state,
            gate: self.gate,
            schedules,
        })
    }
}
