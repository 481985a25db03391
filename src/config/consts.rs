// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Lower bound on pool size the autoscaler will ever request
pub const DEFAULT_MIN_WORKERS: usize = 1;
/// Upper bound on pool size the autoscaler will ever request
pub const DEFAULT_MAX_WORKERS: usize = 16;
/// p95 job latency above which the pool scales up
pub const DEFAULT_TARGET_P95_LATENCY_MS: u64 = 2_000;
/// Queue depth above which the pool scales up
pub const DEFAULT_TARGET_QUEUE_DEPTH: usize = 50;
pub const DEFAULT_SCALE_UP_STEP: usize = 2;
pub const DEFAULT_SCALE_DOWN_STEP: usize = 1;
/// Cooldown between two applied scaling decisions
pub const DEFAULT_SCALE_DECISION_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_WORKER_SHUTDOWN_TIMEOUT_S: u64 = 30;
/// Job-level retries before a job is terminally FAILED
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BASE_MS: u64 = 500;
pub const DEFAULT_RETRY_CAP_MS: u64 = 60_000;
pub const DEFAULT_RETRY_JITTER_PCT: f64 = 0.2;
/// Lease on a RUNNING job before it becomes reclaimable
pub const DEFAULT_VISIBILITY_TIMEOUT_S: u64 = 300;
pub const DEFAULT_TICK_INTERVAL_S: u64 = 15;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;
pub const DEFAULT_MAX_TASK_CONCURRENCY: usize = 4;

/// Scale-down requires queue depth at or below this share of the target
pub const SCALE_DOWN_QUEUE_FRACTION: f64 = 0.3;
/// Scale-down requires p95 latency at or below this share of the target
pub const SCALE_DOWN_LATENCY_FRACTION: f64 = 0.5;
/// Scale-down requires in-flight jobs per worker below this utilization
pub const SCALE_DOWN_UTILIZATION: f64 = 0.7;

/// Number of recent job durations kept for the p95 estimate
pub const LATENCY_WINDOW: usize = 256;
