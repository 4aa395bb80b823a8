//! Crossing journal - appends every applied crossing to a JSONL file
//!
//! One JSON object per line:
//! `{"ts":1718000000000,"track_id":7,"direction":"entering","source":"live","current_count":12}`
//!
//! The journal is an audit trail only. Write failures are logged and never
//! affect the counts.

use crate::domain::types::{epoch_ms, CrossingDirection, CrossingEvent, CrossingSource, TrackId};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::{debug, error, info};

/// One journal line
#[derive(Debug, Serialize)]
struct CrossingRecord {
    ts: u64,
    track_id: TrackId,
    direction: CrossingDirection,
    source: CrossingSource,
    current_count: i64,
}

/// Append-only writer for crossing events
pub struct CrossingEgress {
    file_path: String,
}

impl CrossingEgress {
    pub fn new(file_path: &str) -> Self {
        info!(file_path = %file_path, "crossing_journal_initialized");
        Self { file_path: file_path.to_string() }
    }

    /// Append a crossing with the count it produced
    /// Returns true if successful, false otherwise
    pub fn write_crossing(&self, event: &CrossingEvent, current_count: i64) -> bool {
        let record = CrossingRecord {
            ts: epoch_ms(),
            track_id: event.track_id,
            direction: event.direction,
            source: event.source,
            current_count,
        };

        let result = serde_json::to_string(&record)
            .map_err(std::io::Error::from)
            .and_then(|json| self.append_line(&json));

        match result {
            Ok(()) => true,
            Err(e) => {
                error!(
                    track_id = %event.track_id,
                    direction = %event.direction.as_str(),
                    error = %e,
                    "crossing_journal_failed"
                );
                false
            }
        }
    }

    fn append_line(&self, line: &str) -> std::io::Result<()> {
        let path = Path::new(&self.file_path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;

        writeln!(file, "{}", line)?;
        debug!(file = %self.file_path, bytes = %line.len(), "crossing_journal_written");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn event(id: i64, direction: CrossingDirection, source: CrossingSource) -> CrossingEvent {
        CrossingEvent { track_id: TrackId(id), direction, source }
    }

    #[test]
    fn test_write_crossing() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("crossings.jsonl");
        let egress = CrossingEgress::new(file_path.to_str().unwrap());

        assert!(egress.write_crossing(
            &event(7, CrossingDirection::Entering, CrossingSource::Live),
            12
        ));

        let content = fs::read_to_string(&file_path).unwrap();
        assert!(content.ends_with('\n'));

        let parsed: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(parsed["track_id"], 7);
        assert_eq!(parsed["direction"], "entering");
        assert_eq!(parsed["source"], "live");
        assert_eq!(parsed["current_count"], 12);
        assert!(parsed["ts"].as_u64().unwrap() > 0);
    }

    #[test]
    fn test_append_mode_and_reconciled_source() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("crossings.jsonl");
        fs::write(&file_path, "{\"existing\":\"data\"}\n").unwrap();

        let egress = CrossingEgress::new(file_path.to_str().unwrap());
        egress.write_crossing(&event(3, CrossingDirection::Exiting, CrossingSource::Reconciled), -1);

        let content = fs::read_to_string(&file_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("existing"));

        let parsed: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed["direction"], "exiting");
        assert_eq!(parsed["source"], "reconciled");
        assert_eq!(parsed["current_count"], -1);
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let nested_path = dir.path().join("nested").join("dir").join("crossings.jsonl");
        let egress = CrossingEgress::new(nested_path.to_str().unwrap());

        assert!(egress.write_crossing(
            &event(1, CrossingDirection::Entering, CrossingSource::Live),
            1
        ));
        assert!(nested_path.exists());
    }

    #[test]
    fn test_unwritable_path_reports_failure() {
        let dir = tempdir().unwrap();
        // A directory cannot be opened for append
        let egress = CrossingEgress::new(dir.path().to_str().unwrap());
        assert!(!egress.write_crossing(
            &event(1, CrossingDirection::Entering, CrossingSource::Live),
            1
        ));
    }
}
