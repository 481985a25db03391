// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{StateRecord, StateStore};
use crate::errors::StateError;

/// State store persisted as JSON lines, one record per line.
///
/// The file is opened in append mode for every write so several processes
/// may share it. Reads load the whole file.
///
/// A crash in the middle of an append leaves a final line without its
/// newline. Reads skip such a torn line, and the next append cuts it off
/// before writing. Undecodable lines anywhere else are reported as errors.
pub struct JsonlStateStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StateError {
        StateError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl JsonlStateStore {
    /// Truncate a final line left without its newline by an interrupted append.
    fn cut_torn_tail(&self, file: &mut File) -> std::io::Result<()> {
        let len = file.metadata()?.len();
        if len == 0 {
            return Ok(());
        }
        let mut last = [0u8; 1];
        file.seek(SeekFrom::Start(len - 1))?;
        file.read_exact(&mut last)?;
        if last[0] == b'\n' {
            return Ok(());
        }

        let mut content = Vec::new();
        file.seek(SeekFrom::Start(0))?;
        file.read_to_end(&mut content)?;
        let keep = content
            .iter()
            .rposition(|byte| *byte == b'\n')
            .map(|pos| pos as u64 + 1)
            .unwrap_or(0);
        tracing::warn!(
            path = %self.path.display(),
            dropped_bytes = len - keep,
            "dropping incomplete last state record"
        );
        file.set_len(keep)
    }
}

impl StateStore for JsonlStateStore {
    fn append(&self, record: StateRecord) -> Result<(), StateError> {
        let line = serde_json::to_string(&record)?;
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        self.cut_torn_tail(&mut file).map_err(|e| self.io_error(e))?;
        writeln!(file, "{line}").map_err(|e| self.io_error(e))
    }

    fn records(&self) -> Result<Vec<StateRecord>, StateError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        let torn_tail = !content.is_empty() && !content.ends_with('\n');
        let line_count = content.lines().count();

        let mut records = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(record) => records.push(record),
                Err(error) if torn_tail && index + 1 == line_count => {
                    tracing::warn!(
                        path = %self.path.display(),
                        line = index + 1,
                        %error,
                        "skipping incomplete last state record"
                    );
                }
                Err(source) => {
                    return Err(StateError::Decode {
                        path: self.path.clone(),
                        line: index + 1,
                        source,
                    })
                }
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateRecordKind;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStateStore::new(dir.path().join("state.jsonl"));
        assert!(store.records().unwrap().is_empty());
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.jsonl");
        let minute = Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap();

        let store = JsonlStateStore::new(&path);
        store
            .append(
                StateRecord::new(StateRecordKind::ScheduleEnqueued, minute)
                    .with("schedule_id", "nightly")
                    .with("minute", minute.to_rfc3339()),
            )
            .unwrap();
        drop(store);

        let reopened = JsonlStateStore::new(&path);
        let records = reopened.find_by("schedule_id", &json!("nightly")).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].timestamp, minute);
        assert_eq!(records[0].field_str("minute"), Some(minute.to_rfc3339().as_str()));
    }

    #[test]
    fn test_torn_last_line_is_skipped_and_cut_on_next_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.jsonl");
        let minute = Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap();
        let store = JsonlStateStore::new(&path);
        store
            .append(StateRecord::new(StateRecordKind::ScheduleEnqueued, minute).with("schedule_id", "a"))
            .unwrap();

        // Crash halfway through writing the second record.
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        write!(file, "{{\"kind\":\"schedule_enq").unwrap();
        drop(file);

        let records = store.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].field_str("schedule_id"), Some("a"));

        store
            .append(StateRecord::new(StateRecordKind::ScheduleEnqueued, minute).with("schedule_id", "b"))
            .unwrap();
        let records = store.records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].field_str("schedule_id"), Some("b"));
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 2);
    }

    #[test]
    fn test_corrupt_line_reports_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.jsonl");
        let store = JsonlStateStore::new(&path);
        store
            .append(StateRecord::new(StateRecordKind::RunStarted, Utc::now()))
            .unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{not json").unwrap();

        match store.records() {
            Err(StateError::Decode { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected decode error, got {other:?}"),
        }
    }
}
