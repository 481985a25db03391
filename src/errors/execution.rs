// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use super::config::{join_errors, ValidationError};

/// Errors that abort a DAG run before any task executes.
///
/// Task failures are *not* represented here: they are recorded in the
/// run result so that independent branches keep executing.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("DAG '{dag_name}' is invalid:\n{}", join_errors(.errors))]
    InvalidDag {
        dag_name: String,
        errors: Vec<ValidationError>,
    },
}

impl RunError {
    /// True when the run was refused because the DAG contains a cycle.
    pub fn is_cycle(&self) -> bool {
        match self {
            RunError::InvalidDag { errors, .. } => errors.iter().any(ValidationError::is_cycle),
        }
    }
}
