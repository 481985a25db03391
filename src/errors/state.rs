// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

/// Errors raised by state store implementations.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("state log '{path}' I/O failure: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state log '{path}' line {line} is not a valid record: {source}")]
    Decode {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode state record: {0}")]
    Encode(#[from] serde_json::Error),
}
