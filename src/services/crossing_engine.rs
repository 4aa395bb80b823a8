//! Per-track side state machine
//!
//! Each track moves through `Unseen -> Known(side)`. A crossing is emitted
//! only on a `Known(a) -> Known(b)` transition where `a` and `b` are opposite
//! sides of the same line; the first sighting of a track only establishes
//! its baseline.
//!
//! Tracks that have not been seen for `stale_after_frames` frames are
//! forgotten so long-running streams do not grow the side map without bound.

use crate::domain::types::{
    CrossingEvent, CrossingSource, DoorLine, Point, Side, TrackId,
};
use crate::services::calibrator::CalibrationSamples;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

/// Default number of frames after which an unseen track is evicted
pub const DEFAULT_STALE_AFTER_FRAMES: u64 = 300;

#[derive(Debug, Clone, Copy)]
struct SideRecord {
    side: Side,
    last_seen_frame: u64,
}

/// Owns the last known side of every live track
pub struct CrossingEngine {
    sides: FxHashMap<TrackId, SideRecord>,
    /// 0 disables eviction
    stale_after_frames: u64,
}

impl CrossingEngine {
    pub fn new(stale_after_frames: u64) -> Self {
        Self { sides: FxHashMap::default(), stale_after_frames }
    }

    /// Classify a position against the door line
    #[inline]
    pub fn classify(position: Point, line: &DoorLine) -> Side {
        line.classify(position)
    }

    /// Feed a track's current side and return a crossing if one occurred
    pub fn update(&mut self, track_id: TrackId, side: Side, frame: u64) -> Option<CrossingEvent> {
        let Some(record) = self.sides.get_mut(&track_id) else {
            debug!(track_id = %track_id, side = %side.as_str(), "track_side_initialized");
            self.sides.insert(track_id, SideRecord { side, last_seen_frame: frame });
            return None;
        };

        record.last_seen_frame = frame;

        if record.side == side {
            return None;
        }

        // Mixed orientations never transition; keep the stored side as is
        let direction = record.side.transition_to(side)?;
        let from = record.side;
        record.side = side;

        debug!(
            track_id = %track_id,
            from = %from.as_str(),
            to = %side.as_str(),
            direction = %direction.as_str(),
            "track_side_changed"
        );

        Some(CrossingEvent { track_id, direction, source: CrossingSource::Live })
    }

    /// Apply net crossings for tracks observed during calibration
    ///
    /// Each track's side is seeded from its last sample. A single event is
    /// returned when the first and last samples fall on opposite sides;
    /// oscillation in between is ignored.
    pub fn reconcile(
        &mut self,
        samples: &CalibrationSamples,
        line: &DoorLine,
        frame: u64,
    ) -> Vec<CrossingEvent> {
        let mut events = Vec::new();

        // Deterministic order so reconciled events are reproducible
        let mut track_ids: Vec<TrackId> = samples.keys().copied().collect();
        track_ids.sort_unstable();

        for track_id in track_ids {
            let points = &samples[&track_id];
            let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
                continue;
            };

            let start_side = line.classify(first);
            let end_side = line.classify(last);

            self.sides.insert(track_id, SideRecord { side: end_side, last_seen_frame: frame });

            if let Some(direction) = start_side.transition_to(end_side) {
                events.push(CrossingEvent {
                    track_id,
                    direction,
                    source: CrossingSource::Reconciled,
                });
            }
        }

        info!(
            tracks = %samples.len(),
            crossings = %events.len(),
            line = %line,
            "retroactive_reconciliation_complete"
        );

        events
    }

    /// Forget tracks not seen for more than the staleness window
    ///
    /// Returns the number of evicted tracks.
    pub fn evict_stale(&mut self, current_frame: u64) -> usize {
        if self.stale_after_frames == 0 {
            return 0;
        }

        let before = self.sides.len();
        let window = self.stale_after_frames;
        self.sides
            .retain(|_, record| current_frame.saturating_sub(record.last_seen_frame) <= window);

        let evicted = before - self.sides.len();
        if evicted > 0 {
            debug!(evicted = %evicted, remaining = %self.sides.len(), "stale_tracks_evicted");
        }
        evicted
    }

    /// Last known side of a track
    pub fn side_of(&self, track_id: TrackId) -> Option<Side> {
        self.sides.get(&track_id).map(|r| r.side)
    }

    /// Number of tracks with a known side
    pub fn tracked_count(&self) -> usize {
        self.sides.len()
    }
}
