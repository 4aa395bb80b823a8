//! Services - counting logic and state management
//!
//! This module contains the core counting services:
//! - `calibrator` - Infers the door line from warm-up motion
//! - `crossing_engine` - Per-track side state and crossing detection
//! - `occupancy_logger` - Interval-gated occupancy snapshots
//! - `counter` - Engine context driving calibration and live counting

pub mod calibrator;
pub mod counter;
pub mod crossing_engine;
pub mod occupancy_logger;

// Re-export commonly used types
pub use counter::{Counter, FrameReport};
