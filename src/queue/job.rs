// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::utils::RetryPolicy;

/// Reason recorded when a lease runs out before the worker acks.
pub const LEASE_EXPIRED_REASON: &str = "visibility timeout expired";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Success,
    Failed,
    Retry,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Success => "SUCCESS",
            JobStatus::Failed => "FAILED",
            JobStatus::Retry => "RETRY",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failed)
    }

    /// PENDING and RETRY jobs may be handed to a worker once `available_at` passes.
    pub fn is_claimable(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Retry)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(JobStatus::Pending),
            "RUNNING" => Ok(JobStatus::Running),
            "SUCCESS" => Ok(JobStatus::Success),
            "FAILED" => Ok(JobStatus::Failed),
            "RETRY" => Ok(JobStatus::Retry),
            other => Err(format!("unknown job status '{other}'")),
        }
    }
}

/// How a worker finished with a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    /// The run failed; the job is retried while attempts remain.
    Failed { reason: String },
    /// The job must not run at all (budget or RBAC denial). Never retried.
    Rejected { reason: String },
}

impl JobOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        JobOutcome::Failed {
            reason: reason.into(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        JobOutcome::Rejected {
            reason: reason.into(),
        }
    }
}

/// Durable unit of scheduled work.
///
/// The queue owns a job from enqueue until it reaches a terminal status.
/// While RUNNING it is leased to exactly one worker until `lease_expires_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub dag_path: String,
    pub tenant_id: String,
    pub schedule_id: Option<String>,
    /// Routing tag used to pick a worker pool.
    pub region: Option<String>,
    pub status: JobStatus,
    pub enqueued_at: DateTime<Utc>,
    /// Earliest time the job may be claimed. Pushed forward by retry backoff.
    pub available_at: DateTime<Utc>,
    pub attempt: u32,
    pub max_retries: u32,
    pub worker_id: Option<String>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(dag_path: impl Into<String>, tenant_id: impl Into<String>, max_retries: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            dag_path: dag_path.into(),
            tenant_id: tenant_id.into(),
            schedule_id: None,
            region: None,
            status: JobStatus::Pending,
            enqueued_at: now,
            available_at: now,
            attempt: 0,
            max_retries,
            worker_id: None,
            lease_expires_at: None,
            last_error: None,
            finished_at: None,
        }
    }

    pub fn with_schedule(mut self, schedule_id: impl Into<String>) -> Self {
        self.schedule_id = Some(schedule_id.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn enqueued_at(mut self, at: DateTime<Utc>) -> Self {
        self.enqueued_at = at;
        self.available_at = at;
        self
    }

    pub fn is_claimable_at(&self, now: DateTime<Utc>) -> bool {
        self.status.is_claimable() && self.available_at <= now
    }

    pub fn lease_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Running
            && self.lease_expires_at.map(|at| at <= now).unwrap_or(false)
    }

    /// True while `worker_id` owns this RUNNING job and its lease has not run out.
    pub fn holds_lease(&self, worker_id: &str, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Running
            && self.worker_id.as_deref() == Some(worker_id)
            && !self.lease_expired_at(now)
    }

    /// Lease the job to `worker_id` until `now + visibility_timeout`.
    pub fn claim(&mut self, worker_id: &str, now: DateTime<Utc>, visibility_timeout: Duration) {
        self.status = JobStatus::Running;
        self.worker_id = Some(worker_id.to_string());
        self.lease_expires_at = Some(now + to_chrono(visibility_timeout));
    }

    /// Apply a worker's outcome and return the resulting status.
    ///
    /// A failed attempt moves the job to RETRY with `available_at` pushed out
    /// by the backoff policy, or to FAILED once `attempt` reaches `max_retries`.
    pub fn complete(&mut self, outcome: JobOutcome, now: DateTime<Utc>, policy: &RetryPolicy) -> JobStatus {
        self.worker_id = None;
        self.lease_expires_at = None;

        match outcome {
            JobOutcome::Success => {
                self.status = JobStatus::Success;
                self.last_error = None;
                self.finished_at = Some(now);
            }
            JobOutcome::Rejected { reason } => {
                self.status = JobStatus::Failed;
                self.last_error = Some(reason);
                self.finished_at = Some(now);
            }
            JobOutcome::Failed { reason } => {
                self.last_error = Some(reason);
                if self.attempt < self.max_retries {
                    let delay = policy.delay_for(self.attempt);
                    self.attempt += 1;
                    self.status = JobStatus::Retry;
                    self.available_at = now + to_chrono(delay);
                } else {
                    self.status = JobStatus::Failed;
                    self.finished_at = Some(now);
                }
            }
        }
        self.status
    }

    /// Treat an expired lease as a failed attempt.
    ///
    /// The job becomes claimable immediately: the timeout itself already
    /// served as the delay.
    pub fn expire_lease(&mut self, now: DateTime<Utc>) -> JobStatus {
        self.worker_id = None;
        self.lease_expires_at = None;
        self.last_error = Some(LEASE_EXPIRED_REASON.to_string());

        if self.attempt < self.max_retries {
            self.attempt += 1;
            self.status = JobStatus::Retry;
            self.available_at = now;
        } else {
            self.status = JobStatus::Failed;
            self.finished_at = Some(now);
        }
        self.status
    }
}

pub(crate) fn to_chrono(duration: Duration) -> ChronoDuration {
    ChronoDuration::from_std(duration).unwrap_or(ChronoDuration::MAX)
}
