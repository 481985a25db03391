// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! DAG validation run before any execution.
//!
//! The validation pipeline performs its checks in a fixed order:
//!
//! 1. **Uniqueness**: every task ID appears once
//! 2. **References**: every `depends_on` entry names an existing task
//! 3. **Workflows**: every `workflow_ref` resolves in the [`WorkflowRegistry`]
//! 4. **Cycle detection**: iterative three-color DFS over the dependency graph
//!
//! Cycle detection needs a structurally valid graph, so it only runs when the
//! uniqueness and reference checks passed. All other problems are accumulated
//! so a DAG author sees every issue at once.
//!
//! ## Cycle Detection Algorithm
//! Uses **iterative DFS with white/gray/black markers**:
//! - **Time Complexity**: O(V + E)
//! - **Space Complexity**: O(V) for colors, the explicit stack and the path
//! - An edge into a gray node closes a cycle; the path segment from that node
//!   to the current one is reported.
//!
//! The DFS keeps its own stack instead of recursing so deep chains cannot
//! overflow the thread stack.

use std::collections::HashSet;

use crate::config::WorkflowRegistry;
use crate::dag::{Dag, DependencyGraph};
use crate::errors::ValidationError;
use crate::observability::messages::validation::{CyclicDependencyDetected, DagValidationFailed};
use crate::observability::messages::StructuredLog;

/// Validates a DAG's structure and its workflow references.
///
/// # Returns
///
/// * `Ok(())` - DAG is valid and ready for execution
/// * `Err(Vec<ValidationError>)` - every validation error found
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use the_conductor::backends::stub::StubWorkflow;
/// use the_conductor::config::{validate_dag, WorkflowRegistry};
/// use the_conductor::dag::{Dag, Task};
///
/// let mut registry = WorkflowRegistry::new();
/// registry.register("noop", Arc::new(StubWorkflow::new("noop")));
///
/// let dag = Dag::new("nightly", "acme", vec![
///     Task::new("a", "noop"),
///     Task::new("b", "noop").depends_on(["a"]),
/// ]);
///
/// assert!(validate_dag(&dag, &registry).is_ok());
/// ```
pub fn validate_dag(dag: &Dag, registry: &WorkflowRegistry) -> Result<(), Vec<ValidationError>> {
    let mut errors = match validate_dag_structure(dag) {
        Ok(()) => Vec::new(),
        Err(errors) => errors,
    };

    if let Err(unknown) = validate_workflow_refs(dag, registry) {
        errors.extend(unknown);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        DagValidationFailed {
            dag_name: &dag.name,
            error_count: errors.len(),
        }
        .log();
        Err(errors)
    }
}

/// Structural checks only: uniqueness, references and cycles.
pub fn validate_dag_structure(dag: &Dag) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(duplicate_errors) = validate_unique_task_ids(dag) {
        errors.extend(duplicate_errors);
    }

    if let Err(unresolved_errors) = validate_dependency_references(dag) {
        errors.extend(unresolved_errors);
    }

    if errors.is_empty() {
        if let Err(cycle_error) = validate_acyclic_graph(dag) {
            errors.push(cycle_error);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_unique_task_ids(dag: &Dag) -> Result<(), Vec<ValidationError>> {
    let mut seen_ids = HashSet::new();
    let mut errors = Vec::new();

    for task in &dag.tasks {
        if !seen_ids.insert(&task.id) {
            errors.push(ValidationError::DuplicateTaskId {
                task_id: task.id.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_dependency_references(dag: &Dag) -> Result<(), Vec<ValidationError>> {
    let task_ids: HashSet<&String> = dag.tasks.iter().map(|t| &t.id).collect();
    let mut errors = Vec::new();

    for task in &dag.tasks {
        for dependency in &task.depends_on {
            if !task_ids.contains(dependency) {
                errors.push(ValidationError::UnresolvedDependency {
                    task_id: task.id.clone(),
                    missing_dependency: dependency.clone(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_workflow_refs(dag: &Dag, registry: &WorkflowRegistry) -> Result<(), Vec<ValidationError>> {
    let errors: Vec<ValidationError> = dag
        .tasks
        .iter()
        .filter(|task| !registry.contains(&task.workflow_ref))
        .map(|task| ValidationError::UnknownWorkflow {
            task_id: task.id.clone(),
            workflow_ref: task.workflow_ref.clone(),
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Iterative three-color DFS over dependency -> dependent edges.
///
/// ## Example Execution
/// For graph A → B → C → A:
/// 1. Start at A: path = [A], A is gray
/// 2. Visit B: path = [A, B]
/// 3. Visit C: path = [A, B, C]
/// 4. Edge C → A hits a gray node: cycle = [A, B, C, A]
fn validate_acyclic_graph(dag: &Dag) -> Result<(), ValidationError> {
    let graph = DependencyGraph::from_dag(dag);
    let mut color = vec![Color::White; graph.len()];

    for start in 0..graph.len() {
        if color[start] != Color::White {
            continue;
        }

        // (node, index of the next dependent to visit)
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        let mut path: Vec<usize> = vec![start];
        color[start] = Color::Gray;

        while let Some(top) = stack.last_mut() {
            let (node, next) = *top;
            let dependents = graph.dependents(node);

            if next < dependents.len() {
                top.1 += 1;
                let child = dependents[next];
                match color[child] {
                    Color::White => {
                        color[child] = Color::Gray;
                        stack.push((child, 0));
                        path.push(child);
                    }
                    Color::Gray => {
                        let cycle_start = path.iter().position(|&n| n == child).unwrap_or(0);
                        let mut cycle: Vec<String> = path[cycle_start..]
                            .iter()
                            .map(|&n| graph.id(n).to_string())
                            .collect();
                        cycle.push(graph.id(child).to_string());

                        let cycle_refs: Vec<&str> = cycle.iter().map(String::as_str).collect();
                        CyclicDependencyDetected {
                            dag_name: &dag.name,
                            cycle: &cycle_refs,
                        }
                        .log();

                        return Err(ValidationError::CyclicDependency {
                            dag_name: dag.name.clone(),
                            cycle,
                        });
                    }
                    Color::Black => {}
                }
            } else {
                color[node] = Color::Black;
                stack.pop();
                path.pop();
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::stub::StubWorkflow;
    use crate::dag::Task;
    use std::sync::Arc;

    fn registry() -> WorkflowRegistry {
        let mut registry = WorkflowRegistry::new();
        registry.register("noop", Arc::new(StubWorkflow::new("noop")));
        registry
    }

    fn dag(tasks: Vec<Task>) -> Dag {
        Dag::new("test_dag", "tenant", tasks)
    }

    #[test]
    fn test_valid_empty_dag() {
        assert!(validate_dag(&dag(vec![]), &registry()).is_ok());
    }

    #[test]
    fn test_valid_diamond_dependency() {
        let dag = dag(vec![
            Task::new("a", "noop"),
            Task::new("b", "noop").depends_on(["a"]),
            Task::new("c", "noop").depends_on(["a"]),
            Task::new("d", "noop").depends_on(["b", "c"]),
        ]);

        assert!(validate_dag(&dag, &registry()).is_ok());
    }

    #[test]
    fn test_duplicate_task_ids() {
        let dag = dag(vec![Task::new("a", "noop"), Task::new("a", "noop")]);

        let errors = validate_dag(&dag, &registry()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ValidationError::DuplicateTaskId { .. }));
    }

    #[test]
    fn test_unresolved_dependency() {
        let dag = dag(vec![
            Task::new("a", "noop"),
            Task::new("b", "noop").depends_on(["nonexistent"]),
        ]);

        let errors = validate_dag(&dag, &registry()).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::UnresolvedDependency {
                task_id: "b".to_string(),
                missing_dependency: "nonexistent".to_string(),
            }]
        );
    }

    #[test]
    fn test_unknown_workflow() {
        let dag = dag(vec![Task::new("a", "noop"), Task::new("b", "missing_workflow")]);

        let errors = validate_dag(&dag, &registry()).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::UnknownWorkflow {
                task_id: "b".to_string(),
                workflow_ref: "missing_workflow".to_string(),
            }]
        );
    }

    #[test]
    fn test_simple_cycle_reports_dag_name() {
        let dag = dag(vec![
            Task::new("a", "noop").depends_on(["b"]),
            Task::new("b", "noop").depends_on(["a"]),
        ]);

        let errors = validate_dag(&dag, &registry()).unwrap_err();
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            ValidationError::CyclicDependency { dag_name, cycle } => {
                assert_eq!(dag_name, "test_dag");
                assert_eq!(cycle.first(), cycle.last());
                assert_eq!(cycle.len(), 3);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
        assert!(errors[0].to_string().contains("test_dag"));
    }

    #[test]
    fn test_self_dependency_cycle() {
        let dag = dag(vec![Task::new("a", "noop").depends_on(["a"])]);

        let errors = validate_dag(&dag, &registry()).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::CyclicDependency {
                dag_name: "test_dag".to_string(),
                cycle: vec!["a".to_string(), "a".to_string()],
            }]
        );
    }

    #[test]
    fn test_complex_cycle_path() {
        // b -> c -> d -> b, with a hanging off b
        let dag = dag(vec![
            Task::new("a", "noop").depends_on(["b"]),
            Task::new("b", "noop").depends_on(["d"]),
            Task::new("c", "noop").depends_on(["b"]),
            Task::new("d", "noop").depends_on(["c"]),
        ]);

        let errors = validate_dag_structure(&dag).unwrap_err();
        match &errors[0] {
            ValidationError::CyclicDependency { cycle, .. } => {
                assert_eq!(cycle, &vec!["b", "c", "d", "b"]);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_long_chain_does_not_overflow() {
        let mut tasks = vec![Task::new("t0", "noop")];
        for i in 1..20_000 {
            tasks.push(Task::new(format!("t{}", i), "noop").depends_on([format!("t{}", i - 1)]));
        }

        assert!(validate_dag_structure(&dag(tasks)).is_ok());
    }

    #[test]
    fn test_multiple_errors_accumulate() {
        let dag = dag(vec![
            Task::new("a", "noop").depends_on(["nonexistent"]),
            Task::new("a", "noop"),
            Task::new("b", "unknown").depends_on(["missing"]),
        ]);

        let errors = validate_dag(&dag, &registry()).unwrap_err();
        assert_eq!(errors.len(), 4);
    }
}
