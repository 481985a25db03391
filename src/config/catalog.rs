// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::config::loader::load_and_validate_dag;
use crate::config::registry::WorkflowRegistry;
use crate::dag::Dag;
use crate::errors::ConfigError;

/// Resolves the `dag_path` carried by a job to a validated DAG.
pub trait DagCatalog: Send + Sync {
    fn load(&self, dag_path: &str) -> Result<Arc<Dag>, ConfigError>;
}

/// Reads DAG YAML files below a root directory.
///
/// Each file is parsed and validated once; later lookups are served from a
/// cache. Files that fail validation are not cached, so fixing the file on
/// disk is picked up by the next job.
pub struct FileDagCatalog {
    root: PathBuf,
    registry: WorkflowRegistry,
    cache: Mutex<HashMap<String, Arc<Dag>>>,
}

impl FileDagCatalog {
    pub fn new(root: impl Into<PathBuf>, registry: WorkflowRegistry) -> Self {
        Self {
            root: root.into(),
            registry,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, dag_path: &str) -> Option<Arc<Dag>> {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.get(dag_path).cloned()
    }
}

impl DagCatalog for FileDagCatalog {
    fn load(&self, dag_path: &str) -> Result<Arc<Dag>, ConfigError> {
        if let Some(dag) = self.cached(dag_path) {
            return Ok(dag);
        }

        let dag = Arc::new(load_and_validate_dag(
            self.root.join(dag_path),
            &self.registry,
        )?);

        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.insert(dag_path.to_string(), dag.clone());
        Ok(dag)
    }
}

/// Catalog backed by DAGs registered in code.
#[derive(Default)]
pub struct MemoryDagCatalog {
    dags: HashMap<String, Arc<Dag>>,
}

impl MemoryDagCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, dag_path: impl Into<String>, dag: Dag) {
        self.dags.insert(dag_path.into(), Arc::new(dag));
    }

    pub fn with_dag(mut self, dag_path: impl Into<String>, dag: Dag) -> Self {
        self.insert(dag_path, dag);
        self
    }
}

impl DagCatalog for MemoryDagCatalog {
    fn load(&self, dag_path: &str) -> Result<Arc<Dag>, ConfigError> {
        self.dags
            .get(dag_path)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownDag(dag_path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::stub::StubWorkflow;
    use crate::dag::Task;

    fn registry() -> WorkflowRegistry {
        let mut registry = WorkflowRegistry::new();
        registry.register("stub", Arc::new(StubWorkflow::new("stub")));
        registry
    }

    #[test]
    fn test_file_catalog_caches_valid_dags() {
        let dir = tempfile::tempdir().unwrap();
        let dag_file = dir.path().join("nightly.yaml");
        std::fs::write(
            &dag_file,
            "name: nightly\ntenant_id: acme\ntasks:\n  - id: a\n    workflow: stub\n",
        )
        .unwrap();

        let catalog = FileDagCatalog::new(dir.path(), registry());
        let first = catalog.load("nightly.yaml").unwrap();

        std::fs::remove_file(&dag_file).unwrap();
        let second = catalog.load("nightly.yaml").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.name, "nightly");
    }

    #[test]
    fn test_file_catalog_rejects_invalid_dag() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("bad.yaml"),
            "name: bad\ntenant_id: acme\ntasks:\n  - id: a\n    workflow: missing\n",
        )
        .unwrap();

        let catalog = FileDagCatalog::new(dir.path(), registry());
        let err = catalog.load("bad.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDag { .. }));
    }

    #[test]
    fn test_memory_catalog_unknown_path() {
        let catalog = MemoryDagCatalog::new().with_dag(
            "known.yaml",
            Dag::new("known", "acme", vec![Task::new("a", "stub")]),
        );

        assert!(catalog.load("known.yaml").is_ok());
        assert!(matches!(
            catalog.load("other.yaml"),
            Err(ConfigError::UnknownDag(path)) if path == "other.yaml"
        ));
    }
}
