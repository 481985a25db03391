// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

use crate::autoscaler::ScalePolicy;
use crate::config::consts::*;
use crate::errors::ConfigError;
use crate::utils::RetryPolicy;

/// Engine tunables.
///
/// Values come from built-in defaults, then the `[settings]` table of the
/// conductor TOML file, then environment variables with the upper-case
/// field name (`MAX_WORKERS=8`). Every field is optional in the file.
///
/// # Example
/// ```toml
/// [settings]
/// min_workers = 2
/// max_workers = 12
/// target_queue_depth = 50
/// retry_base_ms = 250
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub min_workers: usize,
    pub max_workers: usize,
    pub target_p95_latency_ms: u64,
    pub target_queue_depth: usize,
    pub scale_up_step: usize,
    pub scale_down_step: usize,
    pub scale_decision_interval_ms: u64,
    pub worker_shutdown_timeout_s: u64,
    pub max_retries: u32,
    pub retry_base_ms: u64,
    pub retry_cap_ms: u64,
    pub retry_jitter_pct: f64,
    pub visibility_timeout_s: u64,
    pub tick_interval_s: u64,
    pub poll_interval_ms: u64,
    pub max_task_concurrency: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            min_workers: DEFAULT_MIN_WORKERS,
            max_workers: DEFAULT_MAX_WORKERS,
            target_p95_latency_ms: DEFAULT_TARGET_P95_LATENCY_MS,
            target_queue_depth: DEFAULT_TARGET_QUEUE_DEPTH,
            scale_up_step: DEFAULT_SCALE_UP_STEP,
            scale_down_step: DEFAULT_SCALE_DOWN_STEP,
            scale_decision_interval_ms: DEFAULT_SCALE_DECISION_INTERVAL_MS,
            worker_shutdown_timeout_s: DEFAULT_WORKER_SHUTDOWN_TIMEOUT_S,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_ms: DEFAULT_RETRY_BASE_MS,
            retry_cap_ms: DEFAULT_RETRY_CAP_MS,
            retry_jitter_pct: DEFAULT_RETRY_JITTER_PCT,
            visibility_timeout_s: DEFAULT_VISIBILITY_TIMEOUT_S,
            tick_interval_s: DEFAULT_TICK_INTERVAL_S,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_task_concurrency: DEFAULT_MAX_TASK_CONCURRENCY,
        }
    }
}

impl Settings {
    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from any name -> value lookup.
    ///
    /// Split out from [`with_env_overrides`](Self::with_env_overrides) so tests
    /// do not have to mutate the process environment.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        override_value(&lookup, "MIN_WORKERS", &mut self.min_workers)?;
        override_value(&lookup, "MAX_WORKERS", &mut self.max_workers)?;
        override_value(&lookup, "TARGET_P95_LATENCY_MS", &mut self.target_p95_latency_ms)?;
        override_value(&lookup, "TARGET_QUEUE_DEPTH", &mut self.target_queue_depth)?;
        override_value(&lookup, "SCALE_UP_STEP", &mut self.scale_up_step)?;
        override_value(&lookup, "SCALE_DOWN_STEP", &mut self.scale_down_step)?;
        override_value(&lookup, "SCALE_DECISION_INTERVAL_MS", &mut self.scale_decision_interval_ms)?;
        override_value(&lookup, "WORKER_SHUTDOWN_TIMEOUT_S", &mut self.worker_shutdown_timeout_s)?;
        override_value(&lookup, "MAX_RETRIES", &mut self.max_retries)?;
        override_value(&lookup, "RETRY_BASE_MS", &mut self.retry_base_ms)?;
        override_value(&lookup, "RETRY_CAP_MS", &mut self.retry_cap_ms)?;
        override_value(&lookup, "RETRY_JITTER_PCT", &mut self.retry_jitter_pct)?;
        override_value(&lookup, "VISIBILITY_TIMEOUT_S", &mut self.visibility_timeout_s)?;
        override_value(&lookup, "TICK_INTERVAL_S", &mut self.tick_interval_s)?;
        override_value(&lookup, "POLL_INTERVAL_MS", &mut self.poll_interval_ms)?;
        override_value(&lookup, "MAX_TASK_CONCURRENCY", &mut self.max_task_concurrency)?;
        self.check()?;
        Ok(self)
    }

    /// Reject combinations the engine cannot honour.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.min_workers > self.max_workers {
            return Err(ConfigError::InvalidSetting {
                name: "MIN_WORKERS".to_string(),
                value: self.min_workers.to_string(),
                reason: format!("must not exceed MAX_WORKERS ({})", self.max_workers),
            });
        }
        if !(0.0..=1.0).contains(&self.retry_jitter_pct) {
            return Err(ConfigError::InvalidSetting {
                name: "RETRY_JITTER_PCT".to_string(),
                value: self.retry_jitter_pct.to_string(),
                reason: "must be a fraction between 0 and 1".to_string(),
            });
        }
        if self.scale_up_step == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "SCALE_UP_STEP".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_base_ms, self.retry_cap_ms, self.retry_jitter_pct)
    }

    pub fn scale_policy(&self) -> ScalePolicy {
        ScalePolicy {
            min_workers: self.min_workers,
            max_workers: self.max_workers,
            target_p95_latency_ms: self.target_p95_latency_ms,
            target_queue_depth: self.target_queue_depth,
            scale_up_step: self.scale_up_step,
            scale_down_step: self.scale_down_step,
            scale_decision_interval_ms: self.scale_decision_interval_ms,
        }
    }

    pub fn worker_shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.worker_shutdown_timeout_s)
    }

    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_s)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_s.max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

fn override_value<T, F>(lookup: &F, name: &str, slot: &mut T) -> Result<(), ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidSetting {
            name: name.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}
