//! Shared types for the occupancy counter

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Get current epoch milliseconds
#[inline]
pub fn epoch_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Newtype wrapper for detector-assigned track IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct TrackId(pub i64);

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Integer pixel coordinate of a track centroid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A single tracked detection as delivered by the detector
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Detection {
    pub track_id: TrackId,
    /// Bounding box as [x1, y1, x2, y2] in pixels
    pub bbox: [f64; 4],
}

impl Detection {
    /// Centroid of the bounding box, rounded to the nearest pixel
    pub fn centroid(&self) -> Point {
        let [x1, y1, x2, y2] = self.bbox;
        Point::new(((x1 + x2) / 2.0).round() as i32, ((y1 + y2) / 2.0).round() as i32)
    }
}

/// All detections for one video frame
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectionFrame {
    /// Frame number as reported by the producer (informational only)
    #[serde(default)]
    pub frame: Option<u64>,
    #[serde(default)]
    pub detections: Vec<Detection>,
}

/// Orientation of the door line in image space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Line runs left to right; people cross it moving vertically
    Horizontal,
    /// Line runs top to bottom; people cross it moving horizontally
    Vertical,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Horizontal => "horizontal",
            Orientation::Vertical => "vertical",
        }
    }
}

/// Which side of the door line a position lies on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Up,
    Down,
    Left,
    Right,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Up => "up",
            Side::Down => "down",
            Side::Left => "left",
            Side::Right => "right",
        }
    }

    /// Direction of a transition from `self` to `to`, if the two sides are
    /// opposite sides of the same line orientation.
    pub fn transition_to(self, to: Side) -> Option<CrossingDirection> {
        match (self, to) {
            (Side::Up, Side::Down) | (Side::Left, Side::Right) => Some(CrossingDirection::Entering),
            (Side::Down, Side::Up) | (Side::Right, Side::Left) => Some(CrossingDirection::Exiting),
            _ => None,
        }
    }
}

/// Calibrated door line. Immutable once calibration completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DoorLine {
    pub orientation: Orientation,
    /// Pixel coordinate on the axis perpendicular to the line
    pub position: i32,
}

impl DoorLine {
    pub const fn new(orientation: Orientation, position: i32) -> Self {
        Self { orientation, position }
    }

    /// Classify a position against this line
    ///
    /// Coordinates strictly below the line position map to Up/Left,
    /// everything else to Down/Right.
    #[inline]
    pub fn classify(&self, p: Point) -> Side {
        match self.orientation {
            Orientation::Horizontal if p.y < self.position => Side::Up,
            Orientation::Horizontal => Side::Down,
            Orientation::Vertical if p.x < self.position => Side::Left,
            Orientation::Vertical => Side::Right,
        }
    }
}

impl std::fmt::Display for DoorLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.orientation.as_str(), self.position)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CrossingDirection {
    Entering,
    Exiting,
}

impl CrossingDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrossingDirection::Entering => "entering",
            CrossingDirection::Exiting => "exiting",
        }
    }
}

/// Where a crossing was detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CrossingSource {
    /// Observed transition between two consecutive live sightings
    Live,
    /// Net transition across the calibration window
    Reconciled,
}

impl CrossingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrossingSource::Live => "live",
            CrossingSource::Reconciled => "reconciled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossingEvent {
    pub track_id: TrackId,
    pub direction: CrossingDirection,
    pub source: CrossingSource,
}

/// Running in/out counters
///
/// `current_count` starts from an external baseline and is allowed to go
/// negative when more exits than entries are observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CountState {
    pub count_in: u64,
    pub count_out: u64,
    pub current_count: i64,
}

impl CountState {
    pub fn with_baseline(current_count: i64) -> Self {
        Self { count_in: 0, count_out: 0, current_count }
    }

    #[inline]
    pub fn apply(&mut self, direction: CrossingDirection) {
        match direction {
            CrossingDirection::Entering => {
                self.count_in += 1;
                self.current_count += 1;
            }
            CrossingDirection::Exiting => {
                self.count_out += 1;
                self.current_count -= 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centroid_rounds_to_nearest_pixel() {
        let det = Detection { track_id: TrackId(1), bbox: [10.0, 20.0, 21.0, 31.0] };
        // (10 + 21) / 2 = 15.5 -> 16, (20 + 31) / 2 = 25.5 -> 26
        assert_eq!(det.centroid(), Point::new(16, 26));

        let det = Detection { track_id: TrackId(1), bbox: [0.0, 0.0, 10.4, 10.6] };
        assert_eq!(det.centroid(), Point::new(5, 5));
    }

    #[test]
    fn test_classify_horizontal() {
        let line = DoorLine::new(Orientation::Horizontal, 100);
        assert_eq!(line.classify(Point::new(500, 99)), Side::Up);
        assert_eq!(line.classify(Point::new(500, 100)), Side::Down);
        assert_eq!(line.classify(Point::new(0, 300)), Side::Down);
    }

    #[test]
    fn test_classify_vertical() {
        let line = DoorLine::new(Orientation::Vertical, 320);
        assert_eq!(line.classify(Point::new(319, 0)), Side::Left);
        assert_eq!(line.classify(Point::new(320, 0)), Side::Right);
    }

    #[test]
    fn test_transition_directions() {
        assert_eq!(Side::Up.transition_to(Side::Down), Some(CrossingDirection::Entering));
        assert_eq!(Side::Left.transition_to(Side::Right), Some(CrossingDirection::Entering));
        assert_eq!(Side::Down.transition_to(Side::Up), Some(CrossingDirection::Exiting));
        assert_eq!(Side::Right.transition_to(Side::Left), Some(CrossingDirection::Exiting));
        assert_eq!(Side::Up.transition_to(Side::Up), None);
        assert_eq!(Side::Up.transition_to(Side::Left), None);
        assert_eq!(Side::Right.transition_to(Side::Down), None);
    }

    #[test]
    fn test_count_state_may_go_negative() {
        let mut counts = CountState::with_baseline(0);
        counts.apply(CrossingDirection::Exiting);
        assert_eq!(counts.current_count, -1);
        assert_eq!(counts.count_out, 1);
        assert_eq!(counts.count_in, 0);
    }

    #[test]
    fn test_detection_frame_defaults() {
        let frame: DetectionFrame = serde_json::from_str("{}").unwrap();
        assert!(frame.frame.is_none());
        assert!(frame.detections.is_empty());
    }
}
