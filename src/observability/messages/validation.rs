// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for DAG validation warnings and errors.
//!
//! This module contains message types for logging events related to:
//! * Cyclic dependency detection
//! * Overall validation failure of a DAG

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Cyclic dependency detected in a DAG.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use the_conductor::observability::messages::validation::CyclicDependencyDetected;
///
/// let cycle = vec!["sweep", "report", "sweep"];
/// let msg = CyclicDependencyDetected {
///     dag_name: "nightly",
///     cycle: &cycle,
/// };
///
/// tracing::error!("{}", msg);
/// ```
pub struct CyclicDependencyDetected<'a> {
    pub dag_name: &'a str,
    pub cycle: &'a [&'a str],
}

impl Display for CyclicDependencyDetected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Cyclic dependency detected in DAG '{}': {}",
            self.dag_name,
            self.cycle.join(" -> ")
        )
    }
}

impl StructuredLog for CyclicDependencyDetected<'_> {
    fn log(&self) {
        tracing::error!(
            dag_name = self.dag_name,
            cycle = self.cycle.join(" -> "),
            cycle_length = self.cycle.len(),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "cyclic_dependency",
            span_name = name,
            dag_name = self.dag_name,
            cycle_length = self.cycle.len(),
        )
    }
}

/// DAG validation failed with one or more errors.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct DagValidationFailed<'a> {
    pub dag_name: &'a str,
    pub error_count: usize,
}

impl Display for DagValidationFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "DAG '{}' failed validation with {} error(s)",
            self.dag_name, self.error_count
        )
    }
}

impl StructuredLog for DagValidationFailed<'_> {
    fn log(&self) {
        tracing::error!(
            dag_name = self.dag_name,
            error_count = self.error_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "validation_failed",
            span_name = name,
            dag_name = self.dag_name,
            error_count = self.error_count,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_names_dag_and_path() {
        let cycle = ["a", "b", "a"];
        let msg = CyclicDependencyDetected {
            dag_name: "loop",
            cycle: &cycle,
        };
        assert_eq!(
            msg.to_string(),
            "Cyclic dependency detected in DAG 'loop': a -> b -> a"
        );
    }

    #[test]
    fn test_validation_failed_message() {
        let msg = DagValidationFailed {
            dag_name: "nightly",
            error_count: 3,
        };
        assert_eq!(msg.to_string(), "DAG 'nightly' failed validation with 3 error(s)");
    }
}
