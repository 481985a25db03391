// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Mutex;

use super::{StateRecord, StateStore};
use crate::errors::StateError;

/// Process-local state store.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    records: Mutex<Vec<StateRecord>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn append(&self, record: StateRecord) -> Result<(), StateError> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
        Ok(())
    }

    fn records(&self) -> Result<Vec<StateRecord>, StateError> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }
}
