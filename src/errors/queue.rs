// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use uuid::Uuid;

/// Errors surfaced by job queue backends.
///
/// Infrastructure failures are returned to the caller as-is; a backend never
/// falls back to another backend on its own.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("job {0} not found")]
    NotFound(Uuid),

    #[error("job {job_id} cannot be acknowledged in state {status}")]
    NotRunning { job_id: Uuid, status: String },

    #[error("worker {worker_id} no longer holds the lease on job {job_id}")]
    LeaseLost { job_id: Uuid, worker_id: String },

    #[error("job {0} already exists")]
    Duplicate(Uuid),

    #[error("queue backend unavailable: {0}")]
    Backend(#[from] sqlx::Error),

    #[error("corrupt job row {job_id}: {reason}")]
    Corrupt { job_id: Uuid, reason: String },
}
