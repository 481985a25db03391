// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for autoscaling decisions.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// The autoscaler produced a decision.
///
/// # Log Level
/// `info!` when the worker count changes or the ceiling is hit, `debug!` on HOLD
///
/// # Example
/// ```
/// use the_conductor::observability::messages::autoscaler::ScaleDecisionMade;
///
/// let msg = ScaleDecisionMade {
///     direction: "UP",
///     current_workers: 4,
///     desired_workers: 6,
///     reason: "queue_depth=100 > target 50",
/// };
///
/// assert_eq!(msg.to_string(), "Scale UP 4 -> 6: queue_depth=100 > target 50");
/// ```
pub struct ScaleDecisionMade<'a> {
    pub direction: &'a str,
    pub current_workers: usize,
    pub desired_workers: usize,
    pub reason: &'a str,
}

impl Display for ScaleDecisionMade<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Scale {} {} -> {}: {}",
            self.direction, self.current_workers, self.desired_workers, self.reason
        )
    }
}

impl StructuredLog for ScaleDecisionMade<'_> {
    fn log(&self) {
        if self.direction == "HOLD" {
            tracing::debug!(
                direction = self.direction,
                current_workers = self.current_workers,
                desired_workers = self.desired_workers,
                reason = self.reason,
                "{}", self
            );
        } else {
            tracing::info!(
                direction = self.direction,
                current_workers = self.current_workers,
                desired_workers = self.desired_workers,
                reason = self.reason,
                "{}", self
            );
        }
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "scale_decision",
            span_name = name,
            direction = self.direction,
            desired_workers = self.desired_workers,
        )
    }
}
