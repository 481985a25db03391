// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Workflow backends for the conductor.
//!
//! # Available Backends
//!
//! ## Local Backend
//! In-process workflows useful for demos and plumbing:
//! - **echo**: returns its params
//! - **sleep**: waits `ms` milliseconds
//! - **fail**: always fails with `message`
//! - **word_count**: counts words in string params
//!
//! ## Stub Backend (Test-Only)
//! Workflows with controlled behaviour for engine, pool and validator tests:
//! - **StubWorkflow**: fixed output
//! - **FailingWorkflow**: always fails, counts calls
//! - **FlakyWorkflow**: fails N times, then succeeds
//! - **RecordingWorkflow**: records params and call order, optional delay
//! - **PanickingWorkflow**: panics inside `run`
//!
//! # Examples
//!
//! ```rust
//! use the_conductor::backends::local::LocalWorkflowFactory;
//!
//! let registry = LocalWorkflowFactory::builtin_registry();
//! assert!(registry.contains("echo"));
//! ```

pub mod local;
#[cfg(test)]
pub mod stub;
