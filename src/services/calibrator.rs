//! Unsupervised door-line calibration
//!
//! Collects centroid samples during the warm-up window and infers where the
//! doorway is:
//! - Orientation: the line runs perpendicular to the axis with the greatest
//!   aggregate motion (people move across a doorway, not along it)
//! - Position: mean coordinate of the moving samples on that axis
//!
//! Ties in aggregate motion resolve to a horizontal line.

use crate::domain::types::{DoorLine, Orientation, Point, TrackId};
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

/// Default number of frames in the calibration window
pub const DEFAULT_FRAME_THRESHOLD: u64 = 60;

/// Per-track centroid samples observed during calibration
pub type CalibrationSamples = FxHashMap<TrackId, Vec<Point>>;

/// Result of a completed calibration
#[derive(Debug)]
pub struct Calibration {
    pub line: DoorLine,
    /// True when no samples existed on the chosen axis and the frame
    /// midpoint was used instead
    pub degenerate: bool,
    /// Samples handed over for retroactive reconciliation
    pub samples: CalibrationSamples,
}

/// Accumulates motion statistics for the calibration window
#[derive(Debug, Default)]
pub struct Calibrator {
    samples: CalibrationSamples,
    accumulated_dx: u64,
    accumulated_dy: u64,
    xs: Vec<i32>,
    ys: Vec<i32>,
}

impl Calibrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one detection
    ///
    /// Only a track's second and later samples feed the motion accumulators
    /// and coordinate collections; the first sample just anchors the track.
    pub fn observe(&mut self, track_id: TrackId, position: Point) {
        let track = self.samples.entry(track_id).or_default();

        if let Some(prev) = track.last() {
            self.accumulated_dx += position.x.abs_diff(prev.x) as u64;
            self.accumulated_dy += position.y.abs_diff(prev.y) as u64;
            self.xs.push(position.x);
            self.ys.push(position.y);
        }

        track.push(position);
    }

    /// Number of distinct tracks seen so far
    pub fn track_count(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn accumulated_motion(&self) -> (u64, u64) {
        (self.accumulated_dx, self.accumulated_dy)
    }

    /// Derive the door line, consuming the collected statistics
    ///
    /// `frame_width`/`frame_height` are only used for the midpoint fallback.
    pub fn finalize(self, frame_width: u32, frame_height: u32) -> Calibration {
        let (orientation, coords, extent) = if self.accumulated_dx > self.accumulated_dy {
            (Orientation::Vertical, &self.xs, frame_width)
        } else {
            (Orientation::Horizontal, &self.ys, frame_height)
        };

        let degenerate = coords.is_empty();
        let position = if degenerate {
            (extent / 2) as i32
        } else {
            mean_truncated(coords)
        };

        let line = DoorLine::new(orientation, position);

        if degenerate {
            warn!(
                orientation = %orientation.as_str(),
                position = %position,
                tracks = %self.samples.len(),
                "calibration_degenerate_midpoint_fallback"
            );
        }

        info!(
            orientation = %orientation.as_str(),
            position = %position,
            accumulated_dx = %self.accumulated_dx,
            accumulated_dy = %self.accumulated_dy,
            tracks = %self.samples.len(),
            "calibration_complete"
        );

        Calibration { line, degenerate, samples: self.samples }
    }
}

/// Integer mean, truncated toward zero
fn mean_truncated(values: &[i32]) -> i32 {
    let sum: i64 = values.iter().map(|&v| v as i64).sum();
    let mean = sum / values.len() as i64;
    debug!(samples = %values.len(), mean = %mean, "calibration_mean");
    mean as i32
}
