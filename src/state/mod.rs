// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Append-only state log of scheduler and run activity.
//!
//! Records are never updated or removed. Dashboards query them by field and
//! the scheduler replays `schedule_enqueued` records to rebuild its de-dup
//! keys after a restart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dag::Params;
use crate::errors::StateError;

mod jsonl;
mod memory;

pub use jsonl::JsonlStateStore;
pub use memory::MemoryStateStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateRecordKind {
    ScheduleEnqueued,
    RunStarted,
    RunFinished,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub kind: StateRecordKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub fields: Params,
}

impl StateRecord {
    pub fn new(kind: StateRecordKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind,
            timestamp,
            fields: Params::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

/// Append-only record store with an index-by-field accessor.
pub trait StateStore: Send + Sync {
    fn append(&self, record: StateRecord) -> Result<(), StateError>;

    /// All records in append order.
    fn records(&self) -> Result<Vec<StateRecord>, StateError>;

    /// Records whose `fields[field]` equals `value`.
    fn find_by(&self, field: &str, value: &Value) -> Result<Vec<StateRecord>, StateError> {
        Ok(self
            .records()?
            .into_iter()
            .filter(|r| r.fields.get(field) == Some(value))
            .collect())
    }

    fn records_of(&self, kind: StateRecordKind) -> Result<Vec<StateRecord>, StateError> {
        Ok(self
            .records()?
            .into_iter()
            .filter(|r| r.kind == kind)
            .collect())
    }
}
