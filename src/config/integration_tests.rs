// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use crate::backends::local::LocalWorkflowFactory;
use crate::config::{
    load_and_validate_dag, load_conductor_config_file, load_schedules, DagCatalog,
    FileDagCatalog, QueueBackend, RuntimeBuilder,
};
use crate::engine::DagRunner;
use crate::errors::ConfigError;
use crate::observability::MemoryEventSink;
use crate::utils::RetryPolicy;

/// The development config loads with its relative paths resolved.
#[test]
fn test_conductor_toml_loading() {
    let config = load_conductor_config_file("configs/conductor.toml").unwrap();

    assert_eq!(config.region, "local");
    assert_eq!(config.queue.backend, QueueBackend::Memory);
    assert_eq!(config.settings.max_workers, 4);
    assert_eq!(config.settings.max_retries, 2);
    // Untouched settings keep their defaults.
    assert_eq!(config.settings.scale_down_step, 1);
    assert!(config.dag_dir().ends_with("configs/dags"));
    assert!(config
        .schedules_path()
        .unwrap()
        .ends_with("configs/schedules.yaml"));
}

#[test]
fn test_postgres_config_loading() {
    let config = load_conductor_config_file("configs/conductor-postgres.toml").unwrap();

    assert_eq!(config.queue.backend, QueueBackend::Postgres);
    assert!(config.queue.url.as_deref().unwrap().starts_with("postgres://"));
    assert_eq!(config.settings.visibility_timeout_s, 120);
    assert!(config.event_log.is_none());
}

#[test]
fn test_schedule_file_loading() {
    let schedules = load_schedules("configs/schedules.yaml").unwrap();

    assert_eq!(schedules.len(), 3);
    assert_eq!(schedules[0].id, "nightly-brief");
    assert_eq!(schedules[0].cron_expr, "0 2 * * *");
    assert!(schedules[0].enabled);
    assert!(!schedules[2].enabled);
}

#[test]
fn test_cyclic_dag_is_rejected_at_load() {
    let registry = LocalWorkflowFactory::builtin_registry();
    let err = load_and_validate_dag("configs/dags/cyclic.yaml", &registry).unwrap_err();

    match err {
        ConfigError::InvalidDag { errors, .. } => {
            assert!(errors.iter().any(|e| e.is_cycle()));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_research_brief_runs_end_to_end() {
    let registry = LocalWorkflowFactory::builtin_registry();
    let catalog = FileDagCatalog::new("configs/dags", registry.clone());
    let dag = catalog.load("research-brief.yaml").unwrap();

    let events = Arc::new(MemoryEventSink::new());
    let runner = DagRunner::new(registry, events.clone(), RetryPolicy::fixed(1, 1));
    let result = runner.run(&dag, Default::default()).await.unwrap();

    assert!(result.is_success());
    let report = result.task("report").unwrap().output.clone().unwrap();
    // sweep__summary is injected from the upstream echo output.
    assert_eq!(report.get("sweep__summary_words"), Some(&serde_json::json!(6)));
    assert_eq!(events.for_task("brief").len(), 2);
}

#[tokio::test]
async fn test_runtime_builds_from_development_config() {
    let config = load_conductor_config_file("configs/conductor.toml").unwrap();
    let mut config = config;
    // Keep test runs from writing into the repository.
    config.event_log = None;
    config.state_log = None;

    let runtime = RuntimeBuilder::new().build(&config).await.unwrap();

    assert_eq!(runtime.region, "local");
    assert_eq!(runtime.schedules.len(), 3);
    assert_eq!(runtime.queue.backend_name(), "memory");
    assert!(runtime.catalog.load("heartbeat.yaml").is_ok());

    let scheduler = runtime.scheduler().unwrap();
    assert_eq!(scheduler.entries().count(), 3);
}
