// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod autoscaler;    // pure scaling decisions
pub mod backends;      // built-in workflows
pub mod config;        // files, settings, registry, runtime wiring
pub mod dag;           // DAG model and dependency graph
pub mod engine;        // DAG runner
pub mod errors;        // error handling
pub mod observability;
pub mod pool;          // region-bound worker pool
pub mod queue;         // persistent job queue
pub mod scheduler;     // cron ticks with de-dup
pub mod service;       // once / serve run modes
pub mod state;         // append-only state log
pub mod traits;        // workflow and gate abstractions
pub mod utils;
