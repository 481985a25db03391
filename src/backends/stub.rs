// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Test-only workflows for exercising the runner, pool and validator.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::dag::Params;
use crate::traits::Workflow;

/// Succeeds with a fixed output.
pub struct StubWorkflow {
    name: String,
    output: Params,
}

impl StubWorkflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            output: Params::new(),
        }
    }

    pub fn with_output(mut self, output: Params) -> Self {
        self.output = output;
        self
    }
}

#[async_trait]
impl Workflow for StubWorkflow {
    async fn run(&self, _params: Params) -> anyhow::Result<Params> {
        Ok(self.output.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Always fails, counting how often it was invoked.
pub struct FailingWorkflow {
    name: String,
    calls: AtomicU32,
}

impl FailingWorkflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Workflow for FailingWorkflow {
    async fn run(&self, _params: Params) -> anyhow::Result<Params> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        anyhow::bail!("{} failed on call {}", self.name, call)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Fails a fixed number of times, then succeeds.
pub struct FlakyWorkflow {
    name: String,
    failures: u32,
    calls: AtomicU32,
}

impl FlakyWorkflow {
    pub fn new(name: impl Into<String>, failures: u32) -> Self {
        Self {
            name: name.into(),
            failures,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Workflow for FlakyWorkflow {
    async fn run(&self, _params: Params) -> anyhow::Result<Params> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            anyhow::bail!("transient failure {}", call + 1);
        }
        let mut output = Params::new();
        output.insert("calls".into(), (call + 1).into());
        Ok(output)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Panics inside the workflow body.
pub struct PanickingWorkflow;

#[async_trait]
impl Workflow for PanickingWorkflow {
    async fn run(&self, _params: Params) -> anyhow::Result<Params> {
        panic!("workflow exploded")
    }

    fn name(&self) -> &str {
        "panicking"
    }
}

/// A call observed by a [`RecordingWorkflow`].
#[derive(Debug, Clone)]
pub struct Call {
    pub workflow: String,
    pub params: Params,
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Records every invocation into a shared log, optionally sleeping first.
///
/// Several recording workflows can share one log to assert on execution order.
pub struct RecordingWorkflow {
    name: String,
    output: Params,
    delay: Duration,
    log: CallLog,
}

impl RecordingWorkflow {
    pub fn new(name: impl Into<String>, log: CallLog) -> Self {
        Self {
            name: name.into(),
            output: Params::new(),
            delay: Duration::ZERO,
            log,
        }
    }

    pub fn with_output(mut self, output: Params) -> Self {
        self.output = output;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Workflow for RecordingWorkflow {
    async fn run(&self, params: Params) -> anyhow::Result<Params> {
        self.log.lock().unwrap().push(Call {
            workflow: self.name.clone(),
            params,
        });
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.output.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
