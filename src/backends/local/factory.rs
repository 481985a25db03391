// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use super::workflows::*;
use crate::config::WorkflowRegistry;
use crate::traits::Workflow;

/// Factory for the built-in local workflows.
pub struct LocalWorkflowFactory;

impl LocalWorkflowFactory {
    /// Create a built-in workflow by name.
    ///
    /// - "echo" -> [`EchoWorkflow`]
    /// - "sleep" -> [`SleepWorkflow`]
    /// - "fail" -> [`FailWorkflow`]
    /// - "word_count" -> [`WordCountWorkflow`]
    pub fn create_workflow(name: &str) -> Result<Arc<dyn Workflow>, String> {
        match name {
            "echo" => Ok(Arc::new(EchoWorkflow)),
            "sleep" => Ok(Arc::new(SleepWorkflow)),
            "fail" => Ok(Arc::new(FailWorkflow)),
            "word_count" => Ok(Arc::new(WordCountWorkflow)),
            _ => Err(format!("Unknown local workflow: '{}'", name)),
        }
    }

    pub fn list_available_implementations() -> Vec<&'static str> {
        vec!["echo", "sleep", "fail", "word_count"]
    }

    /// A registry holding every built-in workflow under its own name.
    pub fn builtin_registry() -> WorkflowRegistry {
        let mut registry = WorkflowRegistry::new();
        Self::register_builtins(&mut registry);
        registry
    }

    pub fn register_builtins(registry: &mut WorkflowRegistry) {
        for name in Self::list_available_implementations() {
            if let Ok(workflow) = Self::create_workflow(name) {
                registry.register(name, workflow);
            }
        }
    }
}
