//! Occupancy counting engine
//!
//! The Counter is the single consumer of the detection stream. It owns:
//! - the calibration window and the one-shot handoff to live counting
//! - per-track side state (CrossingEngine)
//! - the in/out counters
//! - the periodic occupancy snapshot (OccupancyLogger)
//!
//! `process_frame` is synchronous; the async `run` loop only moves frames
//! from the channel into it.


use crate::domain::types::{
    CountState, CrossingDirection, CrossingEvent, CrossingSource, DetectionFrame, DoorLine,
};
use crate::domain::venue::OccupancyLogEntry;
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::egress::CrossingEgress;
use crate::io::venue_store::VenueStore;
use crate::services::calibrator::Calibrator;
use crate::services::crossing_engine::CrossingEngine;
use crate::services::occupancy_logger::{LogOutcome, OccupancyLogger, SkipReason};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Engine mode; the transition happens exactly once
enum Phase {
    Calibrating(Calibrator),
    Live { line: DoorLine, engine: CrossingEngine },
}

/// Outcome of one processed frame
#[derive(Debug, Clone)]
pub struct FrameReport {
    /// 1-based index of the frame in this run
    pub frame_index: u64,
    /// None while calibrating
    pub door_line: Option<DoorLine>,
    pub counts: CountState,
    /// Crossings applied during this frame (reconciled ones on the handoff frame)
    pub crossings: Vec<CrossingEvent>,
    /// Snapshot persisted during this frame, if any
    pub log_entry: Option<OccupancyLogEntry>,
    /// Seconds until the next snapshot is due; None while calibrating
    pub next_log_in_secs: Option<u64>,
}

/// Explicit engine context for one counting run
pub struct Counter {
    phase: Phase,
    frame_index: u64,
    counts: CountState,
    max_capacity: i64,
    calibration_frames: u64,
    frame_width: u32,
    frame_height: u32,
    stale_after_frames: u64,
    logger: OccupancyLogger,
    egress: Option<CrossingEgress>,
    metrics: Arc<Metrics>,
}

impl Counter {
    /// Create a counter in calibration mode
    ///
    /// `started_at` anchors the logging interval; `max_capacity` is fixed for
    /// the whole run.
    pub fn new(config: &Config, max_capacity: i64, metrics: Arc<Metrics>, started_at: Instant) -> Self {
        let store = VenueStore::new(config.store_path());
        let logger = OccupancyLogger::new(
            store,
            config.venue_name(),
            Duration::from_secs(config.log_interval_secs()),
            started_at,
        );
        let egress = config.crossings_file().map(CrossingEgress::new);
        let counts = CountState::with_baseline(config.initial_occupancy());
        metrics.set_current_count(counts.current_count);

        info!(
            venue = %config.venue_name(),
            max_capacity = %max_capacity,
            initial_occupancy = %counts.current_count,
            calibration_frames = %config.calibration_frame_threshold(),
            "counter_initialized"
        );

        Self {
            phase: Phase::Calibrating(Calibrator::new()),
            frame_index: 0,
            counts,
            max_capacity,
            calibration_frames: config.calibration_frame_threshold(),
            frame_width: config.frame_width(),
            frame_height: config.frame_height(),
            stale_after_frames: config.stale_after_frames(),
            logger,
            egress,
            metrics,
        }
    }

    /// Resolve the venue capacity once at startup
    ///
    /// Any store problem, including a missing venue, falls back to the
    /// configured default.
    pub fn startup_capacity(config: &Config) -> i64 {
        let store = VenueStore::new(config.store_path());
        match store.max_capacity(config.venue_name()) {
            Ok(capacity) => {
                info!(venue = %config.venue_name(), max_capacity = %capacity, "venue_capacity_loaded");
                capacity
            }
            Err(e) => {
                warn!(
                    venue = %config.venue_name(),
                    kind = %e.kind(),
                    error = %e,
                    fallback = %config.default_max_capacity(),
                    "venue_capacity_unavailable_using_default"
                );
                config.default_max_capacity()
            }
        }
    }

    /// Consume frames until the channel closes or shutdown is signalled
    ///
    /// Returns the final counts.
    pub async fn run(
        &mut self,
        mut frame_rx: mpsc::Receiver<DetectionFrame>,
        mut shutdown: watch::Receiver<bool>,
    ) -> CountState {
        loop {
            tokio::select! {
                frame = frame_rx.recv() => {
                    match frame {
                        Some(frame) => {
                            self.process_frame(&frame, Instant::now());
                        }
                        None => {
                            info!(frames = %self.frame_index, "detection_stream_ended");
                            break;
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(frames = %self.frame_index, "counter_shutdown");
                        break;
                    }
                }
            }
        }
        self.counts
    }

    /// Process one frame of detections
    pub fn process_frame(&mut self, frame: &DetectionFrame, now: Instant) -> FrameReport {
        let process_start = Instant::now();
        self.frame_index += 1;
        let frame_index = self.frame_index;

        let mut crossings = Vec::new();
        let mut log_entry = None;

        match &mut self.phase {
            Phase::Calibrating(calibrator) => {
                for detection in &frame.detections {
                    calibrator.observe(detection.track_id, detection.centroid());
                }
                if frame_index >= self.calibration_frames {
                    let calibrator = std::mem::take(calibrator);
                    crossings = self.complete_calibration(calibrator);
                }
            }
            Phase::Live { line, engine } => {
                for detection in &frame.detections {
                    let side = CrossingEngine::classify(detection.centroid(), line);
                    if let Some(event) = engine.update(detection.track_id, side, frame_index) {
                        crossings.push(event);
                    }
                }

                let evicted = engine.evict_stale(frame_index);
                if evicted > 0 {
                    self.metrics.record_tracks_evicted(evicted);
                }
                self.metrics.set_active_tracks(engine.tracked_count());

                for event in &crossings {
                    self.apply(event);
                }

                log_entry = self.poll_logger(now);
            }
        }

        let latency_us = process_start.elapsed().as_micros() as u64;
        self.metrics.record_frame_processed(frame.detections.len(), latency_us);

        FrameReport {
            frame_index,
            door_line: self.door_line(),
            counts: self.counts,
            crossings,
            log_entry,
            next_log_in_secs: self.door_line().map(|_| self.logger.seconds_until_next_log(now)),
        }
    }

    /// Finalize calibration, reconcile its samples and switch to live counting
    fn complete_calibration(&mut self, calibrator: Calibrator) -> Vec<CrossingEvent> {
        let calibration = calibrator.finalize(self.frame_width, self.frame_height);
        let line = calibration.line;

        let mut engine = CrossingEngine::new(self.stale_after_frames);
        let events = engine.reconcile(&calibration.samples, &line, self.frame_index);
        // Samples are dropped here; calibration never runs again
        drop(calibration);

        for event in &events {
            self.apply(event);
        }

        self.metrics.set_active_tracks(engine.tracked_count());
        self.phase = Phase::Live { line, engine };

        info!(
            line = %line,
            frame = %self.frame_index,
            reconciled = %events.len(),
            current_count = %self.counts.current_count,
            "live_counting_started"
        );

        events
    }

    fn apply(&mut self, event: &CrossingEvent) {
        self.counts.apply(event.direction);
        let reconciled = event.source == CrossingSource::Reconciled;
        match event.direction {
            CrossingDirection::Entering => self.metrics.record_entry(reconciled),
            CrossingDirection::Exiting => self.metrics.record_exit(reconciled),
        }
        self.metrics.set_current_count(self.counts.current_count);

        info!(
            track_id = %event.track_id,
            direction = %event.direction.as_str(),
            source = %event.source.as_str(),
            count_in = %self.counts.count_in,
            count_out = %self.counts.count_out,
            current_count = %self.counts.current_count,
            "crossing_detected"
        );

        if let Some(ref egress) = self.egress {
            egress.write_crossing(event, self.counts.current_count);
        }
    }

    fn poll_logger(&mut self, now: Instant) -> Option<OccupancyLogEntry> {
        match self.logger.maybe_log(now, self.counts.current_count, self.max_capacity) {
            LogOutcome::Logged(entry) => {
                self.metrics.record_log_written();
                Some(entry)
            }
            LogOutcome::Skipped(SkipReason::NotDue) => None,
            LogOutcome::Skipped(SkipReason::Store(e)) => {
                self.metrics.record_log_failure();
                debug!(kind = %e.kind(), "occupancy_log_skipped");
                None
            }
        }
    }

    /// Calibrated door line, None while calibrating
    pub fn door_line(&self) -> Option<DoorLine> {
        match &self.phase {
            Phase::Calibrating(_) => None,
            Phase::Live { line, .. } => Some(*line),
        }
    }

    pub fn counts(&self) -> CountState {
        self.counts
    }

    pub fn is_calibrating(&self) -> bool {
        matches!(self.phase, Phase::Calibrating(_))
    }

    /// Frames processed so far
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn max_capacity(&self) -> i64 {
        self.max_capacity
    }
}
