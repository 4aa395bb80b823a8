//! Venue records as stored in the shared venue data file
//!
//! The file belongs to other consumers as well, so records are kept as raw
//! JSON values. Only the target venue is interpreted, and the only change
//! ever made to it is appending to `occupancy_logs`. Every other record, and
//! every prior log entry, is written back exactly as it was read.

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Capacity assumed when a record has no usable `max_capacity`
pub const DEFAULT_MAX_CAPACITY: i64 = 80;

/// Timestamped occupancy snapshot appended to a venue's log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyLogEntry {
    /// Local date, `DD.MM.YYYY`
    pub date: String,
    /// Local time, `HH:MM`
    pub time: String,
    pub visitor_count: i64,
    /// Percent of max capacity, rounded
    pub occupancy_rate: i64,
}

impl OccupancyLogEntry {
    pub fn new<Tz: TimeZone>(at: &DateTime<Tz>, visitor_count: i64, max_capacity: i64) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            date: at.format("%d.%m.%Y").to_string(),
            time: at.format("%H:%M").to_string(),
            visitor_count,
            occupancy_rate: occupancy_rate(visitor_count, max_capacity),
        }
    }
}

/// Occupancy as a rounded percentage of capacity
///
/// A non-positive capacity yields 0.
pub fn occupancy_rate(visitor_count: i64, max_capacity: i64) -> i64 {
    if max_capacity <= 0 {
        return 0;
    }
    (visitor_count as f64 * 100.0 / max_capacity as f64).round() as i64
}

/// `venue_name` of a record, if it has a string one
pub fn venue_name(record: &Value) -> Option<&str> {
    record.get("venue_name").and_then(Value::as_str)
}

/// Find a venue by exact name
pub fn find_venue<'a>(records: &'a [Value], name: &str) -> Option<&'a Value> {
    records.iter().find(|v| venue_name(v) == Some(name))
}

/// Find a venue by exact name for mutation
pub fn find_venue_mut<'a>(records: &'a mut [Value], name: &str) -> Option<&'a mut Value> {
    records.iter_mut().find(|v| venue_name(v) == Some(name))
}

/// Capacity of a venue record
///
/// Integers are taken as is and other numbers are rounded. A missing,
/// null or non-numeric value yields `DEFAULT_MAX_CAPACITY`.
pub fn max_capacity(record: &Value) -> i64 {
    match record.get("max_capacity") {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .unwrap_or(DEFAULT_MAX_CAPACITY),
        _ => DEFAULT_MAX_CAPACITY,
    }
}

/// Append an entry to a record's `occupancy_logs`, creating the array if absent
///
/// Fails without touching the record when it is not an object or its
/// `occupancy_logs` is not an array.
pub fn append_log_entry(record: &mut Value, entry: &OccupancyLogEntry) -> Result<(), &'static str> {
    let Value::Object(fields) = record else {
        return Err("venue record is not an object");
    };

    let logs = fields.entry("occupancy_logs").or_insert_with(|| Value::Array(Vec::new()));
    let Value::Array(logs) = logs else {
        return Err("occupancy_logs is not an array");
    };

    logs.push(serde_json::json!({
        "date": entry.date,
        "time": entry.time,
        "visitor_count": entry.visitor_count,
        "occupancy_rate": entry.occupancy_rate,
    }));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use serde_json::json;

    fn entry(visitor_count: i64) -> OccupancyLogEntry {
        OccupancyLogEntry {
            date: "02.01.2025".to_string(),
            time: "11:30".to_string(),
            visitor_count,
            occupancy_rate: 6,
        }
    }

    #[test]
    fn test_occupancy_rate_rounds() {
        assert_eq!(occupancy_rate(40, 80), 50);
        assert_eq!(occupancy_rate(1, 3), 33);
        assert_eq!(occupancy_rate(2, 3), 67);
        assert_eq!(occupancy_rate(100, 80), 125);
    }

    #[test]
    fn test_occupancy_rate_zero_capacity() {
        assert_eq!(occupancy_rate(47, 0), 0);
        assert_eq!(occupancy_rate(47, -5), 0);
    }

    #[test]
    fn test_occupancy_rate_negative_count() {
        assert_eq!(occupancy_rate(-4, 80), -5);
    }

    #[test]
    fn test_log_entry_formats() {
        let tz = FixedOffset::east_opt(3 * 3600).unwrap();
        let at = tz.with_ymd_and_hms(2025, 3, 7, 9, 5, 42).unwrap();
        let entry = OccupancyLogEntry::new(&at, 20, 80);
        assert_eq!(entry.date, "07.03.2025");
        assert_eq!(entry.time, "09:05");
        assert_eq!(entry.visitor_count, 20);
        assert_eq!(entry.occupancy_rate, 25);
    }

    #[test]
    fn test_max_capacity_tolerates_loose_types() {
        assert_eq!(max_capacity(&json!({"venue_name": "A", "max_capacity": 50})), 50);
        assert_eq!(max_capacity(&json!({"venue_name": "A", "max_capacity": 50.0})), 50);
        assert_eq!(max_capacity(&json!({"venue_name": "A", "max_capacity": 49.6})), 50);
        assert_eq!(max_capacity(&json!({"venue_name": "A", "max_capacity": null})), 80);
        assert_eq!(max_capacity(&json!({"venue_name": "A", "max_capacity": "60"})), 80);
        assert_eq!(max_capacity(&json!({"venue_name": "A"})), 80);
    }

    #[test]
    fn test_find_venue_exact_match() {
        let records = vec![
            json!("not a record"),
            json!({"venue_name": 7}),
            json!({"venue_name": "Kafe", "max_capacity": 50}),
            json!({"venue_name": "Kafe 2", "max_capacity": 60}),
        ];
        assert_eq!(find_venue(&records, "Kafe 2").map(max_capacity), Some(60));
        assert!(find_venue(&records, "kafe").is_none());
    }

    #[test]
    fn test_append_creates_logs_only_on_target() {
        let mut record = json!({"venue_name": "Kafe", "district": "Merkez"});
        append_log_entry(&mut record, &entry(5)).unwrap();

        assert_eq!(record["district"], "Merkez");
        assert!(record.get("max_capacity").is_none());
        assert_eq!(record["occupancy_logs"].as_array().unwrap().len(), 1);
        assert_eq!(record["occupancy_logs"][0]["visitor_count"], 5);
    }

    #[test]
    fn test_append_keeps_prior_entries_verbatim() {
        let prior = json!({"date": "01.01.2025", "time": "10:00", "visitor_count": 30,
                           "occupancy_rate": 38, "source": "manual"});
        let mut record = json!({"venue_name": "Kafe", "occupancy_logs": [prior.clone()]});
        append_log_entry(&mut record, &entry(6)).unwrap();

        assert_eq!(record["occupancy_logs"][0], prior);
        assert_eq!(record["occupancy_logs"][1]["time"], "11:30");
    }

    #[test]
    fn test_append_rejects_odd_shapes() {
        let mut record = json!({"venue_name": "Kafe", "occupancy_logs": {"oops": true}});
        let before = record.clone();
        assert!(append_log_entry(&mut record, &entry(1)).is_err());
        assert_eq!(record, before);

        assert!(append_log_entry(&mut json!("Kafe"), &entry(1)).is_err());
    }
}
