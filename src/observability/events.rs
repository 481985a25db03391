// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Lifecycle events and the sinks that record them.
//!
//! Sinks are append-only and write-only: the engine never reads events back,
//! and a sink that fails to write logs the problem and drops the event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::dag::Params;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    DagStart,
    TaskStart,
    TaskOk,
    TaskFail,
    TaskRetry,
    DagDone,
    JobDenied,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::DagStart => "dag_start",
            EventKind::TaskStart => "task_start",
            EventKind::TaskOk => "task_ok",
            EventKind::TaskFail => "task_fail",
            EventKind::TaskRetry => "task_retry",
            EventKind::DagDone => "dag_done",
            EventKind::JobDenied => "job_denied",
        }
    }
}

/// One lifecycle event.
///
/// Serialized as a flat JSON object:
/// `{"timestamp": "...", "event": "task_retry", "dag_name": "nightly", "task_id": "sweep", "attempt": 1, "delay_ms": 512}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub event: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dag_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(flatten)]
    pub fields: Params,
}

impl Event {
    pub fn new(event: EventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
            dag_name: None,
            task_id: None,
            job_id: None,
            fields: Params::new(),
        }
    }

    pub fn dag(mut self, dag_name: impl Into<String>) -> Self {
        self.dag_name = Some(dag_name.into());
        self
    }

    pub fn task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn job(mut self, job_id: impl ToString) -> Self {
        self.job_id = Some(job_id.to_string());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// Write-only destination for lifecycle events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: Event) {}
}

/// Forwards events to `tracing` at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: Event) {
        let fields = Value::Object(event.fields.clone()).to_string();
        tracing::info!(
            event = event.event.as_str(),
            dag_name = event.dag_name.as_deref(),
            task_id = event.task_id.as_deref(),
            job_id = event.job_id.as_deref(),
            fields = %fields,
            "{}", event.event.as_str()
        );
    }
}

/// Keeps events in memory. Used by tests to assert on the event stream.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<Event>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events().into_iter().map(|e| e.event).collect()
    }

    /// Events concerning a single task, in emission order.
    pub fn for_task(&self, task_id: &str) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.task_id.as_deref() == Some(task_id))
            .collect()
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, event: Event) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}

/// Appends one JSON object per line to a file.
pub struct JsonlEventSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonlEventSink {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    fn write_line(&self, event: &Event) -> std::io::Result<()> {
        let line = serde_json::to_string(event)?;
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(writer, "{line}")?;
        writer.flush()
    }
}

impl EventSink for JsonlEventSink {
    fn emit(&self, event: Event) {
        if let Err(error) = self.write_line(&event) {
            tracing::warn!(
                path = %self.path.display(),
                event = event.event.as_str(),
                %error,
                "failed to write lifecycle event"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_serializes_flat() {
        let event = Event::new(EventKind::TaskRetry)
            .dag("nightly")
            .task("sweep")
            .field("attempt", 1)
            .field("delay_ms", 512);

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "task_retry");
        assert_eq!(value["dag_name"], "nightly");
        assert_eq!(value["attempt"], 1);
        assert_eq!(value["delay_ms"], 512);
        assert!(value.get("job_id").is_none());
    }

    #[test]
    fn test_jsonl_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("events.jsonl");

        let sink = JsonlEventSink::open(&path).unwrap();
        sink.emit(Event::new(EventKind::DagStart).dag("a"));
        sink.emit(Event::new(EventKind::DagDone).dag("a").field("tasks_failed", 0));
        drop(sink);

        let reopened = JsonlEventSink::open(&path).unwrap();
        reopened.emit(Event::new(EventKind::DagStart).dag("b"));
        drop(reopened);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Event> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1].event, EventKind::DagDone);
        assert_eq!(lines[1].fields["tasks_failed"], json!(0));
        assert_eq!(lines[2].dag_name.as_deref(), Some("b"));
    }

    #[test]
    fn test_memory_sink_filters_by_task() {
        let sink = MemoryEventSink::new();
        sink.emit(Event::new(EventKind::TaskStart).task("a"));
        sink.emit(Event::new(EventKind::TaskStart).task("b"));
        sink.emit(Event::new(EventKind::TaskOk).task("a"));

        let a = sink.for_task("a");
        assert_eq!(a.len(), 2);
        assert_eq!(a[1].event, EventKind::TaskOk);
        assert_eq!(sink.kinds().len(), 3);
    }
}
