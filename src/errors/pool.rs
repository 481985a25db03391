// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::QueueError;

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("job region '{job_region}' does not match pool region '{pool_region}'")]
    RegionMismatch {
        job_region: String,
        pool_region: String,
    },

    #[error("worker pool is shut down")]
    ShutDown,

    #[error(transparent)]
    Queue(#[from] QueueError),
}
