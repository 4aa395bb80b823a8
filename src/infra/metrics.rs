//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path operations so the counting loop never waits on
//! the reporter. Reporting is the only operation that resets anything (via
//! atomic swap).
//!
//! NOTE: All atomics use Relaxed ordering intentionally. These are statistical
//! counters only; the authoritative counts live in the Counter.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Exponential bucket boundaries for frame processing latency (microseconds)
/// Buckets: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200
const BUCKET_BOUNDS: [u64; 10] = [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200];
const NUM_BUCKETS: usize = 11;

#[inline]
fn bucket_index(latency_us: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_us)
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

fn swap_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.swap(0, Ordering::Relaxed);
    }
    result
}

/// Upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = (total as f64 * percentile) as u64;
    let mut cumulative = 0u64;

    // Last bucket uses 2x the previous bound
    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] =
        [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200, 102400];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Lock-free metrics collector
pub struct Metrics {
    /// Total frames processed (monotonic)
    frames_total: AtomicU64,
    /// Frames since last report (reset on report)
    frames_since_report: AtomicU64,
    /// Total detections seen (monotonic)
    detections_total: AtomicU64,
    /// Sum of frame latencies in microseconds (reset on report)
    latency_sum_us: AtomicU64,
    /// Max frame latency in microseconds (reset on report)
    latency_max_us: AtomicU64,
    latency_buckets: [AtomicU64; NUM_BUCKETS],
    entries_total: AtomicU64,
    exits_total: AtomicU64,
    /// Crossings applied by retroactive reconciliation (subset of the above)
    reconciled_total: AtomicU64,
    logs_written_total: AtomicU64,
    log_failures_total: AtomicU64,
    tracks_evicted_total: AtomicU64,
    malformed_lines_total: AtomicU64,
    /// Current occupancy (gauge)
    current_count: AtomicI64,
    /// Tracks with a known side (gauge)
    active_tracks: AtomicU64,
    /// Last report time (only accessed from reporter)
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            frames_total: AtomicU64::new(0),
            frames_since_report: AtomicU64::new(0),
            detections_total: AtomicU64::new(0),
            latency_sum_us: AtomicU64::new(0),
            latency_max_us: AtomicU64::new(0),
            latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            entries_total: AtomicU64::new(0),
            exits_total: AtomicU64::new(0),
            reconciled_total: AtomicU64::new(0),
            logs_written_total: AtomicU64::new(0),
            log_failures_total: AtomicU64::new(0),
            tracks_evicted_total: AtomicU64::new(0),
            malformed_lines_total: AtomicU64::new(0),
            current_count: AtomicI64::new(0),
            active_tracks: AtomicU64::new(0),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    /// Record a processed frame with its detection count and latency
    #[inline]
    pub fn record_frame_processed(&self, detections: usize, latency_us: u64) {
        self.frames_total.fetch_add(1, Ordering::Relaxed);
        self.frames_since_report.fetch_add(1, Ordering::Relaxed);
        self.detections_total.fetch_add(detections as u64, Ordering::Relaxed);
        self.latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        self.latency_buckets[bucket_index(latency_us)].fetch_add(1, Ordering::Relaxed);
        update_atomic_max(&self.latency_max_us, latency_us);
    }

    #[inline]
    pub fn record_entry(&self, reconciled: bool) {
        self.entries_total.fetch_add(1, Ordering::Relaxed);
        if reconciled {
            self.reconciled_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_exit(&self, reconciled: bool) {
        self.exits_total.fetch_add(1, Ordering::Relaxed);
        if reconciled {
            self.reconciled_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_log_written(&self) {
        self.logs_written_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_log_failure(&self) {
        self.log_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_tracks_evicted(&self, count: usize) {
        self.tracks_evicted_total.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Record a feed line that could not be parsed
    #[inline]
    pub fn record_malformed_line(&self) {
        self.malformed_lines_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn set_current_count(&self, count: i64) {
        self.current_count.store(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn set_active_tracks(&self, tracks: usize) {
        self.active_tracks.store(tracks as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn frames_total(&self) -> u64 {
        self.frames_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn logs_written_total(&self) -> u64 {
        self.logs_written_total.load(Ordering::Relaxed)
    }

    /// Calculate and return metrics summary, then reset periodic counters
    pub fn report(&self) -> MetricsSummary {
        let frames_count = self.frames_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.latency_sum_us.swap(0, Ordering::Relaxed);
        let max_latency = self.latency_max_us.swap(0, Ordering::Relaxed);
        let lat_buckets = swap_buckets(&self.latency_buckets);

        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        let frames_per_sec = if elapsed.as_secs_f64() > 0.0 {
            frames_count as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };
        let avg_latency = if frames_count > 0 { latency_sum / frames_count } else { 0 };

        MetricsSummary {
            frames_total: self.frames_total.load(Ordering::Relaxed),
            frames_per_sec,
            detections_total: self.detections_total.load(Ordering::Relaxed),
            avg_frame_latency_us: avg_latency,
            max_frame_latency_us: max_latency,
            lat_p50_us: percentile_from_buckets(&lat_buckets, 0.50),
            lat_p99_us: percentile_from_buckets(&lat_buckets, 0.99),
            entries_total: self.entries_total.load(Ordering::Relaxed),
            exits_total: self.exits_total.load(Ordering::Relaxed),
            reconciled_total: self.reconciled_total.load(Ordering::Relaxed),
            current_count: self.current_count.load(Ordering::Relaxed),
            active_tracks: self.active_tracks.load(Ordering::Relaxed),
            logs_written_total: self.logs_written_total.load(Ordering::Relaxed),
            log_failures_total: self.log_failures_total.load(Ordering::Relaxed),
            tracks_evicted_total: self.tracks_evicted_total.load(Ordering::Relaxed),
            malformed_lines_total: self.malformed_lines_total.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct MetricsSummary {
    pub frames_total: u64,
    pub frames_per_sec: f64,
    pub detections_total: u64,
    pub avg_frame_latency_us: u64,
    pub max_frame_latency_us: u64,
    pub lat_p50_us: u64,
    pub lat_p99_us: u64,
    pub entries_total: u64,
    pub exits_total: u64,
    pub reconciled_total: u64,
    pub current_count: i64,
    pub active_tracks: u64,
    pub logs_written_total: u64,
    pub log_failures_total: u64,
    pub tracks_evicted_total: u64,
    pub malformed_lines_total: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            frames_total = %self.frames_total,
            frames_per_sec = format!("{:.1}", self.frames_per_sec),
            detections_total = %self.detections_total,
            avg_latency_us = %self.avg_frame_latency_us,
            max_latency_us = %self.max_frame_latency_us,
            p50_us = %self.lat_p50_us,
            p99_us = %self.lat_p99_us,
            entries = %self.entries_total,
            exits = %self.exits_total,
            reconciled = %self.reconciled_total,
            current_count = %self.current_count,
            active_tracks = %self.active_tracks,
            logs_written = %self.logs_written_total,
            log_failures = %self.log_failures_total,
            evicted = %self.tracks_evicted_total,
            malformed_lines = %self.malformed_lines_total,
            "metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_frame() {
        let metrics = Metrics::new();
        metrics.record_frame_processed(3, 100);
        metrics.record_frame_processed(0, 200);

        assert_eq!(metrics.frames_total(), 2);
        assert_eq!(metrics.detections_total.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.latency_sum_us.load(Ordering::Relaxed), 300);
    }

    #[test]
    fn test_report_resets_periodic_counters() {
        let metrics = Metrics::new();
        metrics.record_frame_processed(1, 100);
        metrics.record_frame_processed(1, 200);
        metrics.record_frame_processed(1, 300);
        metrics.record_entry(false);
        metrics.record_entry(true);
        metrics.record_exit(false);

        let summary = metrics.report();
        assert_eq!(summary.frames_total, 3);
        assert_eq!(summary.avg_frame_latency_us, 200);
        assert_eq!(summary.max_frame_latency_us, 300);
        assert_eq!(summary.entries_total, 2);
        assert_eq!(summary.exits_total, 1);
        assert_eq!(summary.reconciled_total, 1);

        assert_eq!(metrics.frames_since_report.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.latency_sum_us.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.latency_max_us.load(Ordering::Relaxed), 0);

        // Monotonic counters survive the report
        let summary = metrics.report();
        assert_eq!(summary.frames_total, 3);
        assert_eq!(summary.avg_frame_latency_us, 0);
    }

    #[test]
    fn test_bucket_index() {
        assert_eq!(bucket_index(0), 0);
        assert_eq!(bucket_index(100), 0);
        assert_eq!(bucket_index(101), 1);
        assert_eq!(bucket_index(51200), 9);
        assert_eq!(bucket_index(60000), 10);
    }

    #[test]
    fn test_percentiles() {
        let mut buckets = [0u64; NUM_BUCKETS];
        buckets[0] = 90;
        buckets[5] = 10;
        assert_eq!(percentile_from_buckets(&buckets, 0.50), 100);
        assert_eq!(percentile_from_buckets(&buckets, 0.99), 3200);
        assert_eq!(percentile_from_buckets(&[0; NUM_BUCKETS], 0.5), 0);
    }

    #[test]
    fn test_gauges() {
        let metrics = Metrics::new();
        metrics.set_current_count(-2);
        metrics.set_active_tracks(7);
        let summary = metrics.report();
        assert_eq!(summary.current_count, -2);
        assert_eq!(summary.active_tracks, 7);
    }
}
