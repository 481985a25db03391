// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Cron-driven job producer.
//!
//! A [`Scheduler`] owns its schedule entries and its de-dup keys; nothing is
//! shared at module level, so several schedulers can coexist in one process.
//! Each [`tick`](Scheduler::tick) runs to completion before the next one
//! starts. A de-dup key is `(schedule_id, minute)`: a schedule that matches
//! the same minute on two ticks is enqueued once.

use chrono::{DateTime, SecondsFormat, Utc};
use cron::Schedule;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::{ConfigError, QueueError, StateError};
use crate::observability::messages::scheduler::{
    DedupKeysRestored, ScheduleAlreadyEnqueued, ScheduleEnqueued, TickCompleted,
};
use crate::observability::messages::StructuredLog;
use crate::queue::{Job, JobQueue};
use crate::state::{StateRecord, StateRecordKind, StateStore};

mod matching;
mod entry;

pub use matching::{floor_to_minute, matches_minute, parse_cron};
pub use entry::ScheduleEntry;

type DedupKey = (String, DateTime<Utc>);

struct CompiledEntry {
    entry: ScheduleEntry,
    schedule: Schedule,
}

pub struct Scheduler {
    entries: Vec<CompiledEntry>,
    queue: Arc<dyn JobQueue>,
    state: Arc<dyn StateStore>,
    seen: HashSet<DedupKey>,
    max_retries: u32,
    region: Option<String>,
}

impl Scheduler {
    /// Compile every entry's cron expression. Fails on the first invalid one.
    pub fn new(
        entries: Vec<ScheduleEntry>,
        queue: Arc<dyn JobQueue>,
        state: Arc<dyn StateStore>,
        max_retries: u32,
    ) -> Result<Self, ConfigError> {
        let entries = entries
            .into_iter()
            .map(|entry| {
                let schedule =
                    parse_cron(&entry.cron_expr).map_err(|e| ConfigError::InvalidCron {
                        schedule_id: entry.id.clone(),
                        expr: entry.cron_expr.clone(),
                        reason: e.to_string(),
                    })?;
                Ok(CompiledEntry { entry, schedule })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self {
            entries,
            queue,
            state,
            seen: HashSet::new(),
            max_retries,
            region: None,
        })
    }

    /// Tag every produced job with a routing region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn entries(&self) -> impl Iterator<Item = &ScheduleEntry> {
        self.entries.iter().map(|c| &c.entry)
    }

    pub fn dedup_key_count(&self) -> usize {
        self.seen.len()
    }

    /// Enqueue a job for every enabled schedule due in the minute of `now`.
    ///
    /// Returns the ids of the jobs enqueued by this tick. A queue failure
    /// aborts the tick; schedules already enqueued keep their de-dup keys.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<Vec<Uuid>, QueueError> {
        let minute = floor_to_minute(now);
        let minute_label = minute.to_rfc3339_opts(SecondsFormat::Secs, true);
        self.seen.retain(|(_, key_minute)| *key_minute >= minute);

        let mut enqueued = Vec::new();
        let mut enabled = 0;

        for compiled in &self.entries {
            let entry = &compiled.entry;
            if !entry.enabled {
                continue;
            }
            enabled += 1;
            if !matches_minute(&compiled.schedule, minute) {
                continue;
            }

            let key = (entry.id.clone(), minute);
            if self.seen.contains(&key) {
                ScheduleAlreadyEnqueued {
                    schedule_id: &entry.id,
                    minute: &minute_label,
                }
                .log();
                continue;
            }

            let mut job = Job::new(&entry.dag_path, &entry.tenant_id, self.max_retries)
                .with_schedule(&entry.id)
                .enqueued_at(now);
            if let Some(region) = &self.region {
                job = job.with_region(region);
            }

            let job_id = self.queue.enqueue(job).await?;
            self.seen.insert(key);
            enqueued.push(job_id);

            let job_label = job_id.to_string();
            ScheduleEnqueued {
                schedule_id: &entry.id,
                dag_path: &entry.dag_path,
                job_id: &job_label,
            }
            .log();

            let record = StateRecord::new(StateRecordKind::ScheduleEnqueued, now)
                .with("schedule_id", entry.id.as_str())
                .with("minute", minute_label.as_str())
                .with("job_id", job_label.as_str())
                .with("dag_path", entry.dag_path.as_str())
                .with("tenant_id", entry.tenant_id.as_str());
            if let Err(e) = self.state.append(record) {
                tracing::warn!(
                    schedule_id = entry.id.as_str(),
                    error = %e,
                    "Failed to record schedule_enqueued in state log"
                );
            }
        }

        TickCompleted {
            minute: &minute_label,
            enabled_schedules: enabled,
            enqueued: enqueued.len(),
        }
        .log();

        Ok(enqueued)
    }

    /// Rebuild de-dup keys from `schedule_enqueued` records.
    ///
    /// Only keys for the minute of `now` or later are kept; older ones could
    /// never match again. Returns the number of keys restored.
    pub fn restore_from(
        &mut self,
        store: &dyn StateStore,
        now: DateTime<Utc>,
    ) -> Result<usize, StateError> {
        let current = floor_to_minute(now);
        let mut restored = 0;

        for record in store.records_of(StateRecordKind::ScheduleEnqueued)? {
            let (Some(schedule_id), Some(minute)) =
                (record.field_str("schedule_id"), record.field_str("minute"))
            else {
                continue;
            };
            let Ok(minute) = DateTime::parse_from_rfc3339(minute) else {
                continue;
            };
            let minute = minute.with_timezone(&Utc);
            if minute >= current && self.seen.insert((schedule_id.to_string(), minute)) {
                restored += 1;
            }
        }

        DedupKeysRestored { restored }.log();
        Ok(restored)
    }
}
