//! Periodic occupancy snapshots into the venue store
//!
//! Polled once per frame. Until the interval has elapsed a poll is a single
//! timestamp comparison. When due, the whole store is read, one entry is
//! appended to the target venue and the whole store is written back.
//!
//! The gate only advances on a successful write, so a failed cycle is
//! retried on the next poll.

use crate::domain::venue::{append_log_entry, find_venue_mut, OccupancyLogEntry};
use crate::io::venue_store::{StoreError, VenueStore};
use chrono::Local;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default interval between occupancy snapshots
pub const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(120);

/// Result of a logging poll
#[derive(Debug)]
pub enum LogOutcome {
    /// Entry was appended and the store written
    Logged(OccupancyLogEntry),
    /// Nothing was persisted this poll
    Skipped(SkipReason),
}

#[derive(Debug)]
pub enum SkipReason {
    /// Interval has not elapsed yet
    NotDue,
    /// Store could not be read or written, or the venue is missing or malformed
    Store(StoreError),
}

impl LogOutcome {
    pub fn is_logged(&self) -> bool {
        matches!(self, LogOutcome::Logged(_))
    }
}

/// Time-gated read-modify-write of the target venue's occupancy log
pub struct OccupancyLogger {
    store: VenueStore,
    venue_name: String,
    interval: Duration,
    last_log_time: Instant,
    consecutive_failures: u32,
}

impl OccupancyLogger {
    /// Create a logger whose first snapshot is due one `interval` after `started_at`
    pub fn new(
        store: VenueStore,
        venue_name: impl Into<String>,
        interval: Duration,
        started_at: Instant,
    ) -> Self {
        let venue_name = venue_name.into();
        info!(
            store = %store.path().display(),
            venue = %venue_name,
            interval_secs = %interval.as_secs(),
            "occupancy_logger_initialized"
        );
        Self { store, venue_name, interval, last_log_time: started_at, consecutive_failures: 0 }
    }

    /// Persist a snapshot if the interval has elapsed since the last successful one
    pub fn maybe_log(&mut self, now: Instant, current_count: i64, max_capacity: i64) -> LogOutcome {
        if now.saturating_duration_since(self.last_log_time) < self.interval {
            return LogOutcome::Skipped(SkipReason::NotDue);
        }

        match self.append_entry(current_count, max_capacity) {
            Ok(entry) => {
                self.last_log_time = now;
                if self.consecutive_failures > 0 {
                    info!(failures = %self.consecutive_failures, "occupancy_log_recovered");
                }
                self.consecutive_failures = 0;
                info!(
                    venue = %self.venue_name,
                    date = %entry.date,
                    time = %entry.time,
                    visitor_count = %entry.visitor_count,
                    occupancy_rate = %entry.occupancy_rate,
                    "occupancy_logged"
                );
                LogOutcome::Logged(entry)
            }
            Err(e) => {
                self.consecutive_failures += 1;
                // Retries happen every frame until the store recovers; only
                // the first failure of a streak is worth a warning
                if self.consecutive_failures == 1 {
                    warn!(venue = %self.venue_name, kind = %e.kind(), error = %e, "occupancy_log_failed");
                } else {
                    debug!(
                        venue = %self.venue_name,
                        kind = %e.kind(),
                        failures = %self.consecutive_failures,
                        "occupancy_log_retry_failed"
                    );
                }
                LogOutcome::Skipped(SkipReason::Store(e))
            }
        }
    }

    fn append_entry(&self, current_count: i64, max_capacity: i64) -> Result<OccupancyLogEntry, StoreError> {
        let mut records = self.store.read_all()?;

        let venue = find_venue_mut(&mut records, &self.venue_name)
            .ok_or_else(|| StoreError::VenueNotFound(self.venue_name.clone()))?;

        let entry = OccupancyLogEntry::new(&Local::now(), current_count, max_capacity);
        append_log_entry(venue, &entry).map_err(|reason| StoreError::Malformed {
            venue: self.venue_name.clone(),
            reason,
        })?;

        self.store.write_all(&records)?;
        Ok(entry)
    }

    /// Whole seconds until the next snapshot is due
    pub fn seconds_until_next_log(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.last_log_time);
        self.interval.saturating_sub(elapsed).as_secs()
    }

    /// Number of failed attempts since the last successful snapshot
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn venue_name(&self) -> &str {
        &self.venue_name
    }
}
