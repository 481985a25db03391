// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::{BTreeSet, HashMap};

use super::model::Dag;

/// Index-based view of a DAG's dependency relation.
///
/// Tasks are referred to by their position in `Dag::tasks`. Edges run from a
/// dependency to its dependents. Unknown dependency ids are ignored here;
/// they are reported by validation.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    ids: Vec<String>,
    dependents: Vec<Vec<usize>>,
    dependencies: Vec<Vec<usize>>,
}

impl DependencyGraph {
    pub fn from_dag(dag: &Dag) -> Self {
        let index: HashMap<&str, usize> = dag
            .tasks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.as_str(), i))
            .collect();

        let mut dependents = vec![Vec::new(); dag.tasks.len()];
        let mut dependencies = vec![Vec::new(); dag.tasks.len()];

        for (i, task) in dag.tasks.iter().enumerate() {
            for dep in &task.depends_on {
                if let Some(&d) = index.get(dep.as_str()) {
                    if !dependencies[i].contains(&d) {
                        dependencies[i].push(d);
                        dependents[d].push(i);
                    }
                }
            }
        }

        Self {
            ids: dag.tasks.iter().map(|t| t.id.clone()).collect(),
            dependents,
            dependencies,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn id(&self, index: usize) -> &str {
        &self.ids[index]
    }

    /// Tasks that depend directly on `index`.
    pub fn dependents(&self, index: usize) -> &[usize] {
        &self.dependents[index]
    }

    /// Direct dependencies of `index`.
    pub fn dependencies(&self, index: usize) -> &[usize] {
        &self.dependencies[index]
    }

    /// Topological order using Kahn's algorithm.
    ///
    /// Among tasks that are ready at the same time, the one declared earlier
    /// in the DAG comes first, which makes the order deterministic.
    /// Returns `None` if the graph contains a cycle.
    pub fn topological_order(&self) -> Option<Vec<usize>> {
        let mut in_degree: Vec<usize> = self.dependencies.iter().map(Vec::len).collect();
        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &d)| d == 0)
            .map(|(i, _)| i)
            .collect();
        let mut order = Vec::with_capacity(self.len());

        while let Some(node) = ready.pop_first() {
            order.push(node);
            for &dependent in &self.dependents[node] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() == self.len() {
            Some(order)
        } else {
            None
        }
    }

    /// Every task reachable downstream of `index`, excluding `index` itself.
    pub fn downstream_of(&self, index: usize) -> Vec<usize> {
        let mut seen = vec![false; self.len()];
        let mut stack = self.dependents[index].clone();
        let mut out = Vec::new();
        while let Some(node) = stack.pop() {
            if seen[node] {
                continue;
            }
            seen[node] = true;
            out.push(node);
            stack.extend_from_slice(&self.dependents[node]);
        }
        out.sort_unstable();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::Task;

    fn dag(tasks: Vec<Task>) -> Dag {
        Dag::new("test", "tenant", tasks)
    }

    fn ids(graph: &DependencyGraph, order: &[usize]) -> Vec<String> {
        order.iter().map(|&i| graph.id(i).to_string()).collect()
    }

    #[test]
    fn test_linear_chain_order() {
        let graph = DependencyGraph::from_dag(&dag(vec![
            Task::new("brief", "noop").depends_on(["report"]),
            Task::new("sweep", "noop"),
            Task::new("report", "noop").depends_on(["sweep"]),
        ]));

        let order = graph.topological_order().unwrap();
        assert_eq!(ids(&graph, &order), vec!["sweep", "report", "brief"]);
    }

    #[test]
    fn test_ties_broken_by_declaration_order() {
        let graph = DependencyGraph::from_dag(&dag(vec![
            Task::new("c", "noop"),
            Task::new("a", "noop"),
            Task::new("b", "noop"),
            Task::new("d", "noop").depends_on(["a", "b", "c"]),
        ]));

        let order = graph.topological_order().unwrap();
        assert_eq!(ids(&graph, &order), vec!["c", "a", "b", "d"]);
    }

    #[test]
    fn test_cycle_has_no_order() {
        let graph = DependencyGraph::from_dag(&dag(vec![
            Task::new("a", "noop").depends_on(["b"]),
            Task::new("b", "noop").depends_on(["a"]),
        ]));

        assert!(graph.topological_order().is_none());
    }

    #[test]
    fn test_downstream_of() {
        let graph = DependencyGraph::from_dag(&dag(vec![
            Task::new("a", "noop"),
            Task::new("b", "noop").depends_on(["a"]),
            Task::new("c", "noop").depends_on(["b"]),
            Task::new("d", "noop"),
        ]));

        assert_eq!(graph.downstream_of(0), vec![1, 2]);
        assert!(graph.downstream_of(3).is_empty());
    }

    #[test]
    fn test_duplicate_dependency_entries_counted_once() {
        let graph = DependencyGraph::from_dag(&dag(vec![
            Task::new("a", "noop"),
            Task::new("b", "noop").depends_on(["a", "a"]),
        ]));

        assert_eq!(graph.dependencies(1), &[0]);
        assert_eq!(graph.topological_order().unwrap(), vec![0, 1]);
    }
}
