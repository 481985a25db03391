// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;
use std::path::PathBuf;

/// Errors that can occur during DAG validation.
///
/// These are construction errors: they are reported before any task of the DAG
/// executes and are never retried.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A circular dependency was detected in the task graph
    CyclicDependency {
        /// Name of the DAG containing the cycle
        dag_name: String,
        /// The cycle path showing the circular dependency
        cycle: Vec<String>,
    },
    /// A task references a dependency that doesn't exist
    UnresolvedDependency {
        /// The task that has the unresolved dependency
        task_id: String,
        /// The dependency that couldn't be resolved
        missing_dependency: String,
    },
    /// A task has a duplicate ID
    DuplicateTaskId {
        /// The duplicate task ID
        task_id: String,
    },
    /// A task names a workflow the registry cannot resolve
    UnknownWorkflow {
        /// The task holding the reference
        task_id: String,
        /// The unresolved workflow reference
        workflow_ref: String,
    },
}

impl ValidationError {
    /// True for the variants that make a DAG unrunnable because of its shape.
    pub fn is_cycle(&self) -> bool {
        matches!(self, ValidationError::CyclicDependency { .. })
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::CyclicDependency { dag_name, cycle } => {
                write!(
                    f,
                    "Cyclic dependency detected in DAG '{}': {}",
                    dag_name,
                    cycle.join(" -> ")
                )
            }
            ValidationError::UnresolvedDependency {
                task_id,
                missing_dependency,
            } => {
                write!(
                    f,
                    "Task '{}' depends on '{}' which does not exist",
                    task_id, missing_dependency
                )
            }
            ValidationError::DuplicateTaskId { task_id } => {
                write!(f, "Duplicate task ID: '{}'", task_id)
            }
            ValidationError::UnknownWorkflow {
                task_id,
                workflow_ref,
            } => {
                write!(
                    f,
                    "Task '{}' references unknown workflow '{}'",
                    task_id, workflow_ref
                )
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Errors raised while loading DAG, schedule or settings files.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML '{path}': {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to parse TOML '{path}': {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value '{value}' for {name}: {reason}")]
    InvalidSetting {
        name: String,
        value: String,
        reason: String,
    },

    #[error("invalid cron expression '{expr}' for schedule '{schedule_id}': {reason}")]
    InvalidCron {
        schedule_id: String,
        expr: String,
        reason: String,
    },

    #[error("duplicate schedule id '{0}'")]
    DuplicateSchedule(String),

    #[error("DAG '{dag_path}' failed validation:\n{}", join_errors(.errors))]
    InvalidDag {
        dag_path: String,
        errors: Vec<ValidationError>,
    },

    #[error("DAG '{0}' is not known to the catalog")]
    UnknownDag(String),
}

pub(crate) fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
