//! Domain models - core counting types and venue records
//!
//! This module contains the canonical data types used throughout the system:
//! - `Detection` / `DetectionFrame` - per-frame tracker output
//! - `DoorLine`, `Side`, `Orientation` - line geometry and classification
//! - `CrossingEvent`, `CountState` - counting results
//! - `OccupancyLogEntry` and venue record helpers - persisted venue data

pub mod types;
pub mod venue;
