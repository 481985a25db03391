// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::VecDeque;
use std::time::Duration;

/// Point-in-time view of a worker pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerPoolStats {
    /// Target pool size: spawned workers minus those told to drain.
    pub total_workers: usize,
    /// Workers currently executing a job.
    pub active_workers: usize,
    pub idle_workers: usize,
    /// Jobs waiting in the queue (PENDING and RETRY).
    pub queue_depth: usize,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub p95_latency_ms: u64,
    /// Workers that exited after a poison pill.
    pub drained_workers: u64,
}

/// Rolling window of recent job durations.
#[derive(Debug)]
pub(crate) struct LatencyWindow {
    capacity: usize,
    samples: VecDeque<u64>,
}

impl LatencyWindow {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            samples: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    pub(crate) fn record(&mut self, duration: Duration) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples
            .push_back(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX));
    }

    /// Nearest-rank 95th percentile, 0 with no samples.
    pub(crate) fn p95(&self) -> u64 {
        if self.samples.is_empty() {
            return 0;
        }
        let mut sorted: Vec<u64> = self.samples.iter().copied().collect();
        sorted.sort_unstable();
        let rank = ((sorted.len() as f64) * 0.95).ceil() as usize;
        sorted[rank.clamp(1, sorted.len()) - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_p95_nearest_rank() {
        let mut window = LatencyWindow::new(100);
        assert_eq!(window.p95(), 0);

        for ms in 1..=100 {
            window.record(Duration::from_millis(ms));
        }
        assert_eq!(window.p95(), 95);
    }

    #[test]
    fn test_window_forgets_oldest() {
        let mut window = LatencyWindow::new(3);
        window.record(Duration::from_millis(10_000));
        for _ in 0..3 {
            window.record(Duration::from_millis(5));
        }
        assert_eq!(window.p95(), 5);
    }
}
