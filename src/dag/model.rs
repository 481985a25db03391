// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};

/// Free-form parameters and outputs exchanged with workflows.
pub type Params = serde_json::Map<String, serde_json::Value>;

/// Task identifiers are plain strings, unique within a DAG.
pub type TaskId = String;

/// A single node of a DAG.
///
/// Tasks are immutable once a run starts: the runner only ever reads them.
///
/// # Example
/// ```yaml
/// id: report
/// workflow: build_report
/// params:
///   format: markdown
/// depends_on: [sweep]
/// retries: 2
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Name of the workflow in the registry that performs this task.
    #[serde(rename = "workflow")]
    pub workflow_ref: String,
    #[serde(default)]
    pub params: Params,
    #[serde(default)]
    pub depends_on: Vec<TaskId>,
    #[serde(default)]
    pub retries: u32,
}

impl Task {
    pub fn new(id: impl Into<String>, workflow_ref: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            workflow_ref: workflow_ref.into(),
            params: Params::new(),
            depends_on: Vec::new(),
            retries: 0,
        }
    }

    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

/// A named, tenant-scoped task graph.
///
/// Task order in `tasks` matters: it breaks ties in the topological order so
/// execution order is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dag {
    pub name: String,
    pub tenant_id: String,
    pub tasks: Vec<Task>,
}

impl Dag {
    pub fn new(name: impl Into<String>, tenant_id: impl Into<String>, tasks: Vec<Task>) -> Self {
        Self {
            name: name.into(),
            tenant_id: tenant_id.into(),
            tasks,
        }
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
