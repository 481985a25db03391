// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod catalog;
mod loader;
mod registry;
mod runtime;
mod settings;
mod validation;

#[cfg(test)]
mod integration_tests;
pub mod consts;

pub use catalog::{DagCatalog, FileDagCatalog, MemoryDagCatalog};
pub use loader::{
    load_and_validate_dag, load_conductor_config, load_conductor_config_file, load_dag,
    load_schedules, ConductorConfig, QueueBackend, QueueConfig,
};
pub use registry::WorkflowRegistry;
pub use runtime::{Runtime, RuntimeBuilder};
pub use settings::Settings;
pub use validation::{validate_dag, validate_dag_structure};
