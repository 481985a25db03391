// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod backoff;
pub mod params;

pub use backoff::RetryPolicy;
pub use params::{dependency_key, merge_params_with_prefixes};
