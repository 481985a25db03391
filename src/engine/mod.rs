// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod run_state;
pub mod runner;

pub use run_state::{DagRunResult, TaskRun, TaskState};
pub use runner::{DagRunner, RUN_CANCELLED};
