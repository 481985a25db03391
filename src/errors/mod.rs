// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod execution;
mod pool;
mod queue;
mod state;

pub use config::{ConfigError, ValidationError};
pub use execution::RunError;
pub use pool::PoolError;
pub use queue::QueueError;
pub use state::StateError;
