//! Venue record store - JSON file shared with the venue dashboard
//!
//! The store is a single JSON array of venue records. It is always read and
//! written as a whole; there is no locking, so another process writing the
//! same file between our read and write will lose its update.
//!
//! Records stay untyped so fields and key order this service does not know
//! about survive a rewrite.

use crate::domain::venue::{self, find_venue};
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Errors reading or writing the venue store
#[derive(Debug)]
pub enum StoreError {
    /// File could not be read
    Read(std::io::Error),
    /// File content is not a JSON array
    Parse(serde_json::Error),
    /// Records could not be encoded
    Serialize(serde_json::Error),
    /// File could not be written
    Write(std::io::Error),
    /// Target venue is not present in the store
    VenueNotFound(String),
    /// Target venue exists but cannot take a log entry
    Malformed { venue: String, reason: &'static str },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Read(e) => write!(f, "failed to read venue store: {}", e),
            StoreError::Parse(e) => write!(f, "failed to parse venue store: {}", e),
            StoreError::Serialize(e) => write!(f, "failed to encode venue store: {}", e),
            StoreError::Write(e) => write!(f, "failed to write venue store: {}", e),
            StoreError::VenueNotFound(name) => write!(f, "venue '{}' not found in store", name),
            StoreError::Malformed { venue, reason } => {
                write!(f, "venue '{}' is malformed: {}", venue, reason)
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Read(e) | StoreError::Write(e) => Some(e),
            StoreError::Parse(e) | StoreError::Serialize(e) => Some(e),
            StoreError::VenueNotFound(_) | StoreError::Malformed { .. } => None,
        }
    }
}

impl StoreError {
    /// Short label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Read(_) => "read",
            StoreError::Parse(_) => "parse",
            StoreError::Serialize(_) => "serialize",
            StoreError::Write(_) => "write",
            StoreError::VenueNotFound(_) => "venue_not_found",
            StoreError::Malformed { .. } => "malformed",
        }
    }
}

/// File-backed venue record store
#[derive(Debug, Clone)]
pub struct VenueStore {
    path: PathBuf,
}

impl VenueStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record in the store
    pub fn read_all(&self) -> Result<Vec<Value>, StoreError> {
        let content = fs::read_to_string(&self.path).map_err(StoreError::Read)?;
        let records: Vec<Value> = serde_json::from_str(&content).map_err(StoreError::Parse)?;
        debug!(path = %self.path.display(), venues = %records.len(), "venue_store_read");
        Ok(records)
    }

    /// Replace the whole store with `records`
    ///
    /// Written to a temp file in the same directory and persisted over the
    /// store, so an interrupted write never leaves a truncated store behind.
    /// The temp file is removed if any step fails.
    pub fn write_all(&self, records: &[Value]) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(records).map_err(StoreError::Serialize)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(dir).map_err(StoreError::Write)?;
        // Temp files are created owner-only; keep the existing store's mode
        if let Ok(meta) = fs::metadata(&self.path) {
            file.as_file().set_permissions(meta.permissions()).map_err(StoreError::Write)?;
        }
        file.write_all(json.as_bytes()).map_err(StoreError::Write)?;
        file.as_file().sync_all().map_err(StoreError::Write)?;
        file.persist(&self.path).map_err(|e| StoreError::Write(e.error))?;

        debug!(path = %self.path.display(), bytes = %json.len(), "venue_store_written");
        Ok(())
    }

    /// Look up the capacity of a venue
    pub fn max_capacity(&self, venue_name: &str) -> Result<i64, StoreError> {
        let records = self.read_all()?;
        find_venue(&records, venue_name)
            .map(venue::max_capacity)
            .ok_or_else(|| StoreError::VenueNotFound(venue_name.to_string()))
    }
}
