// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod gate;
pub mod workflow;

pub use gate::{AllowAll, DenyReason, ExecutionGate, GateDecision};
pub use workflow::Workflow;
