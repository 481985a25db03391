// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::sync::Arc;

use crate::traits::Workflow;

/// Registry mapping workflow references to their implementations.
///
/// DAG tasks name their workflow with a string; the registry turns that
/// string into a typed `Arc<dyn Workflow>`. References are checked against
/// the registry during DAG validation, so a run never discovers a missing
/// workflow half way through.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use the_conductor::config::WorkflowRegistry;
/// use the_conductor::backends::stub::StubWorkflow;
///
/// let mut registry = WorkflowRegistry::new();
/// registry.register("sweep", Arc::new(StubWorkflow::new("sweep")));
///
/// assert!(registry.contains("sweep"));
/// assert!(registry.resolve("missing").is_none());
/// ```
#[derive(Clone, Default)]
pub struct WorkflowRegistry(HashMap<String, Arc<dyn Workflow>>);

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Register a workflow under `workflow_ref`, replacing any previous one.
    pub fn register(&mut self, workflow_ref: impl Into<String>, workflow: Arc<dyn Workflow>) {
        self.0.insert(workflow_ref.into(), workflow);
    }

    pub fn resolve(&self, workflow_ref: &str) -> Option<Arc<dyn Workflow>> {
        self.0.get(workflow_ref).cloned()
    }

    pub fn contains(&self, workflow_ref: &str) -> bool {
        self.0.contains_key(workflow_ref)
    }

    pub fn refs(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for WorkflowRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut refs: Vec<_> = self.0.keys().collect();
        refs.sort();
        f.debug_struct("WorkflowRegistry")
            .field("workflow_count", &self.0.len())
            .field("workflow_refs", &refs)
            .finish()
    }
}

impl From<HashMap<String, Arc<dyn Workflow>>> for WorkflowRegistry {
    fn from(map: HashMap<String, Arc<dyn Workflow>>) -> Self {
        Self(map)
    }
}
