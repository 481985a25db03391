// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::fmt;

use crate::queue::Job;

/// Why a job was refused before execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    BudgetExceeded,
    RbacDenied,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::BudgetExceeded => "budget_exceeded",
            DenyReason::RbacDenied => "rbac_denied",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Deny(DenyReason),
}

/// Pre-execution hook for budget and access checks.
///
/// Consulted by a worker before the job's DAG is loaded; a denial fails the
/// job without ever resolving a workflow.
#[async_trait]
pub trait ExecutionGate: Send + Sync {
    async fn check(&self, job: &Job) -> GateDecision;
}

/// Gate that admits every job.
pub struct AllowAll;

#[async_trait]
impl ExecutionGate for AllowAll {
    async fn check(&self, _job: &Job) -> GateDecision {
        GateDecision::Allow
    }
}
