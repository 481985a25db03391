// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! DAG model: tasks, their dependencies, and the graph view used for ordering.

mod graph;
mod model;

pub use graph::DependencyGraph;
pub use model::{Dag, Params, Task, TaskId};
