// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Pure scaling policy for the worker pool.
//!
//! [`make_scale_decision`] performs no I/O and reads no clock: the current
//! time travels inside [`EngineState`], so the same input always yields the
//! same [`ScaleDecision`]. Rules are evaluated in order:
//!
//! 1. cooldown since the last applied decision → HOLD
//! 2. any pressure signal (queue depth, p95 latency, saturation) → UP
//! 3. every calm signal (shallow queue, low latency, low utilization) → DOWN
//! 4. otherwise → HOLD
//!
//! `desired_workers` is always clamped to `[min_workers, max_workers]`.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::fmt;

use crate::config::consts::{
    DEFAULT_MAX_WORKERS, DEFAULT_MIN_WORKERS, DEFAULT_SCALE_DECISION_INTERVAL_MS,
    DEFAULT_SCALE_DOWN_STEP, DEFAULT_SCALE_UP_STEP, DEFAULT_TARGET_P95_LATENCY_MS,
    DEFAULT_TARGET_QUEUE_DEPTH, SCALE_DOWN_LATENCY_FRACTION, SCALE_DOWN_QUEUE_FRACTION,
    SCALE_DOWN_UTILIZATION,
};
use crate::observability::messages::autoscaler::ScaleDecisionMade;
use crate::observability::messages::StructuredLog;
use crate::pool::WorkerPoolStats;

/// Thresholds and bounds that drive scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalePolicy {
    pub min_workers: usize,
    pub max_workers: usize,
    pub target_p95_latency_ms: u64,
    pub target_queue_depth: usize,
    pub scale_up_step: usize,
    pub scale_down_step: usize,
    pub scale_decision_interval_ms: u64,
}

impl Default for ScalePolicy {
    fn default() -> Self {
        Self {
            min_workers: DEFAULT_MIN_WORKERS,
            max_workers: DEFAULT_MAX_WORKERS,
            target_p95_latency_ms: DEFAULT_TARGET_P95_LATENCY_MS,
            target_queue_depth: DEFAULT_TARGET_QUEUE_DEPTH,
            scale_up_step: DEFAULT_SCALE_UP_STEP,
            scale_down_step: DEFAULT_SCALE_DOWN_STEP,
            scale_decision_interval_ms: DEFAULT_SCALE_DECISION_INTERVAL_MS,
        }
    }
}

impl ScalePolicy {
    fn clamp(&self, workers: usize) -> usize {
        workers.clamp(self.min_workers, self.max_workers.max(self.min_workers))
    }
}

/// Snapshot of the engine the autoscaler decides on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineState {
    pub current_workers: usize,
    pub queue_depth: usize,
    pub p95_latency_ms: u64,
    pub in_flight_jobs: usize,
    /// When the last UP or DOWN decision was applied, if ever.
    pub last_scale_time: Option<DateTime<Utc>>,
    pub now: DateTime<Utc>,
}

impl EngineState {
    pub fn from_stats(
        stats: &WorkerPoolStats,
        last_scale_time: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            current_workers: stats.total_workers,
            queue_depth: stats.queue_depth,
            p95_latency_ms: stats.p95_latency_ms,
            in_flight_jobs: stats.active_workers,
            last_scale_time,
            now,
        }
    }

    fn utilization(&self) -> f64 {
        self.in_flight_jobs as f64 / self.current_workers.max(1) as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDirection {
    Up,
    Down,
    Hold,
}

impl ScaleDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScaleDirection::Up => "UP",
            ScaleDirection::Down => "DOWN",
            ScaleDirection::Hold => "HOLD",
        }
    }
}

impl fmt::Display for ScaleDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleDecision {
    pub direction: ScaleDirection,
    pub current_workers: usize,
    pub desired_workers: usize,
    /// Operator-facing explanation naming the triggering metric and its value.
    pub reason: String,
}

impl ScaleDecision {
    fn hold(state: &EngineState, policy: &ScalePolicy, reason: String) -> Self {
        Self {
            direction: ScaleDirection::Hold,
            current_workers: state.current_workers,
            desired_workers: policy.clamp(state.current_workers),
            reason,
        }
    }

    /// The pool is outside `[min_workers, max_workers]`, e.g. after the
    /// bounds were lowered: move it back inside whatever the metrics say.
    fn out_of_bounds(state: &EngineState, policy: &ScalePolicy, metrics: String) -> Self {
        let desired = policy.clamp(state.current_workers);
        let (direction, bound) = if desired < state.current_workers {
            (ScaleDirection::Down, format!("above max_workers={}", policy.max_workers))
        } else {
            (ScaleDirection::Up, format!("below min_workers={}", policy.min_workers))
        };
        Self {
            direction,
            current_workers: state.current_workers,
            desired_workers: desired,
            reason: format!(
                "current_workers={} {}, clamping to {}; {}",
                state.current_workers, bound, desired, metrics
            ),
        }
    }

    /// True when applying the decision changes the pool size.
    pub fn changes_pool(&self) -> bool {
        self.direction != ScaleDirection::Hold && self.desired_workers != self.current_workers
    }

    pub fn log(&self) {
        ScaleDecisionMade {
            direction: self.direction.as_str(),
            current_workers: self.current_workers,
            desired_workers: self.desired_workers,
            reason: &self.reason,
        }
        .log();
    }
}

pub fn make_scale_decision(state: &EngineState, policy: &ScalePolicy) -> ScaleDecision {
    if let Some(last) = state.last_scale_time {
        let elapsed = state.now - last;
        let cooldown = ChronoDuration::milliseconds(
            i64::try_from(policy.scale_decision_interval_ms).unwrap_or(i64::MAX),
        );
        if elapsed < cooldown {
            return ScaleDecision::hold(
                state,
                policy,
                format!(
                    "cooldown active: {}ms since last scale < {}ms",
                    elapsed.num_milliseconds(),
                    policy.scale_decision_interval_ms
                ),
            );
        }
    }

    let mut pressure = Vec::new();
    if state.queue_depth > policy.target_queue_depth {
        pressure.push(format!(
            "queue_depth={} > target {}",
            state.queue_depth, policy.target_queue_depth
        ));
    }
    if state.p95_latency_ms > policy.target_p95_latency_ms {
        pressure.push(format!(
            "p95_latency_ms={} > target {}",
            state.p95_latency_ms, policy.target_p95_latency_ms
        ));
    }
    if state.in_flight_jobs >= state.current_workers && state.queue_depth > 0 {
        pressure.push(format!(
            "in_flight_jobs={} >= workers {} with queue_depth={}",
            state.in_flight_jobs, state.current_workers, state.queue_depth
        ));
    }

    if !pressure.is_empty() {
        let desired = policy.clamp(
            state
                .current_workers
                .saturating_add(policy.scale_up_step)
                .min(policy.max_workers),
        );
        let mut reason = pressure.join("; ");
        if desired < state.current_workers {
            return ScaleDecision::out_of_bounds(state, policy, reason);
        }
        if desired == state.current_workers {
            reason.push_str(&format!("; at ceiling max_workers={}", policy.max_workers));
        }
        return ScaleDecision {
            direction: ScaleDirection::Up,
            current_workers: state.current_workers,
            desired_workers: desired,
            reason,
        };
    }

    let queue_limit = policy.target_queue_depth as f64 * SCALE_DOWN_QUEUE_FRACTION;
    let latency_limit = policy.target_p95_latency_ms as f64 * SCALE_DOWN_LATENCY_FRACTION;
    let utilization = state.utilization();

    let calm = state.queue_depth as f64 <= queue_limit
        && state.p95_latency_ms as f64 <= latency_limit
        && utilization < SCALE_DOWN_UTILIZATION;

    if calm {
        let calm_reason = format!(
            "queue_depth={} <= {:.0}, p95_latency_ms={} <= {:.0}, utilization={:.2} < {}",
            state.queue_depth,
            queue_limit,
            state.p95_latency_ms,
            latency_limit,
            utilization,
            SCALE_DOWN_UTILIZATION
        );
        let desired = policy.clamp(
            state
                .current_workers
                .saturating_sub(policy.scale_down_step)
                .max(policy.min_workers),
        );
        if desired > state.current_workers {
            return ScaleDecision::out_of_bounds(state, policy, calm_reason);
        }
        if desired == state.current_workers {
            return ScaleDecision::hold(
                state,
                policy,
                format!(
                    "already at minimum min_workers={}: {}",
                    policy.min_workers, calm_reason
                ),
            );
        }
        return ScaleDecision {
            direction: ScaleDirection::Down,
            current_workers: state.current_workers,
            desired_workers: desired,
            reason: calm_reason,
        };
    }

    let stable = format!(
        "stable: queue_depth={}, p95_latency_ms={}, utilization={:.2}",
        state.queue_depth, state.p95_latency_ms, utilization
    );
    if policy.clamp(state.current_workers) != state.current_workers {
        return ScaleDecision::out_of_bounds(state, policy, stable);
    }
    ScaleDecision::hold(state, policy, stable)
}
