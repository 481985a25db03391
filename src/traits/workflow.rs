// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::dag::Params;

/// Business logic invoked for one task attempt.
///
/// Implementations live outside the core (connectors, model calls, ...).
/// The runner calls `run` once per attempt with the task's merged params and
/// treats any `Err` as a failed attempt. Idempotency across retries and
/// redeliveries is the workflow's responsibility.
#[async_trait]
pub trait Workflow: Send + Sync {
    async fn run(&self, params: Params) -> anyhow::Result<Params>;

    fn name(&self) -> &str;
}
