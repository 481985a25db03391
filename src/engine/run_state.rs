// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::dag::{Params, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    Failed,
    /// Waiting out the backoff before the next attempt.
    Retrying,
}

/// Execution record of one task within one DAG run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRun {
    pub task_id: TaskId,
    pub state: TaskState,
    /// Attempts made so far, the first one included.
    pub attempt: u32,
    pub output: Option<Params>,
    /// Last error seen. Kept while retrying, cleared on success.
    pub error: Option<String>,
    /// When the next attempt starts, while [`TaskState::Retrying`].
    pub next_retry_at: Option<DateTime<Utc>>,
}

impl TaskRun {
    pub(crate) fn pending(task_id: impl Into<TaskId>) -> Self {
        Self {
            task_id: task_id.into(),
            state: TaskState::Pending,
            attempt: 0,
            output: None,
            error: None,
            next_retry_at: None,
        }
    }

    /// Pending tasks left behind by a failure upstream count as failed.
    pub fn counts_as_failed(&self) -> bool {
        matches!(self.state, TaskState::Failed | TaskState::Pending)
    }
}

/// Summary of a finished DAG run.
#[derive(Debug, Clone, Serialize)]
pub struct DagRunResult {
    pub dag_name: String,
    pub tenant_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub tasks_succeeded: usize,
    pub tasks_failed: usize,
    pub per_task: HashMap<TaskId, TaskRun>,
}

impl DagRunResult {
    pub fn is_success(&self) -> bool {
        self.tasks_failed == 0
    }

    pub fn task(&self, task_id: &str) -> Option<&TaskRun> {
        self.per_task.get(task_id)
    }

    /// One-line reason for a failed run, naming the first failed tasks.
    pub fn failure_summary(&self) -> Option<String> {
        if self.is_success() {
            return None;
        }
        let mut failed: Vec<&TaskRun> = self
            .per_task
            .values()
            .filter(|run| run.counts_as_failed())
            .collect();
        failed.sort_by(|a, b| a.task_id.cmp(&b.task_id));

        let detail = failed
            .iter()
            .map(|run| {
                format!(
                    "{}: {}",
                    run.task_id,
                    run.error.as_deref().unwrap_or("unknown error")
                )
            })
            .collect::<Vec<_>>()
            .join("; ");

        Some(format!(
            "DAG '{}' had {} failed task(s): {}",
            self.dag_name, self.tasks_failed, detail
        ))
    }
}
