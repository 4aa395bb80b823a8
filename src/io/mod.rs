//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `detection_feed` - JSON Lines detection feed from a file or stdin
//! - `venue_store` - JSON venue record store (read-full / write-full)
//! - `egress` - Crossing journal output to file (JSONL format)

pub mod detection_feed;
pub mod egress;
pub mod venue_store;

// Re-export commonly used types
pub use detection_feed::{open_source, run_feed_reader};
pub use venue_store::{StoreError, VenueStore};
