// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod factory;
pub mod workflows;

pub use factory::LocalWorkflowFactory;
pub use workflows::*;
