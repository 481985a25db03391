// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Exponential backoff with jitter shared by task retries and job retries.
//!
//! The delay before retry number `attempt` (0-based) is
//!
//! ```text
//! delay = min(base_ms * 2^attempt * (1 ± jitter_pct), cap_ms)
//! ```
//!
//! Task retries in the DAG runner and job retries in the persistent queue use
//! the same policy so that operators only have one formula to reason about.

use rand::Rng;
use std::time::Duration;

use crate::config::consts::{DEFAULT_RETRY_BASE_MS, DEFAULT_RETRY_CAP_MS, DEFAULT_RETRY_JITTER_PCT};

/// Backoff policy parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub base_ms: u64,
    pub cap_ms: u64,
    /// Fraction in `[0, 1]`; `0.2` means ±20%.
    pub jitter_pct: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_ms: DEFAULT_RETRY_BASE_MS,
            cap_ms: DEFAULT_RETRY_CAP_MS,
            jitter_pct: DEFAULT_RETRY_JITTER_PCT,
        }
    }
}

impl RetryPolicy {
    pub fn new(base_ms: u64, cap_ms: u64, jitter_pct: f64) -> Self {
        Self {
            base_ms,
            cap_ms,
            jitter_pct: jitter_pct.clamp(0.0, 1.0),
        }
    }

    /// A policy without jitter, handy when exact delays matter.
    pub fn fixed(base_ms: u64, cap_ms: u64) -> Self {
        Self::new(base_ms, cap_ms, 0.0)
    }

    /// Delay before retry `attempt` with a freshly sampled jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let sample = if self.jitter_pct > 0.0 {
            rand::thread_rng().gen_range(-1.0..=1.0)
        } else {
            0.0
        };
        self.delay_with_sample(attempt, sample)
    }

    /// Deterministic core of [`delay_for`](Self::delay_for).
    ///
    /// `sample` is the jitter direction in `[-1, 1]`.
    pub fn delay_with_sample(&self, attempt: u32, sample: f64) -> Duration {
        let exponent = attempt.min(32);
        let raw = self.base_ms.saturating_mul(1u64 << exponent) as f64;
        let jittered = raw * (1.0 + self.jitter_pct * sample.clamp(-1.0, 1.0));
        let capped = jittered.max(0.0).min(self.cap_ms as f64);
        Duration::from_millis(capped.round() as u64)
    }
}
