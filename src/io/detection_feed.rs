//! Detection feed reader - JSON Lines from a file or stdin
//!
//! One frame per line:
//! `{"frame": 12, "detections": [{"track_id": 3, "bbox": [x1, y1, x2, y2]}]}`
//!
//! Frames are forwarded to the counter in order with `send().await`, so a
//! slow consumer applies backpressure to the reader instead of dropping
//! frames. Malformed lines are skipped and counted.

use crate::domain::types::DetectionFrame;
use crate::infra::metrics::Metrics;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Source path that selects stdin
pub const STDIN_SOURCE: &str = "-";

/// Parse a single feed line
///
/// Returns `Ok(None)` for blank lines.
pub fn parse_frame_line(line: &str) -> Result<Option<DetectionFrame>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}

/// Open the configured source for reading
pub async fn open_source(source: &str) -> std::io::Result<Box<dyn AsyncRead + Unpin + Send>> {
    if source == STDIN_SOURCE {
        return Ok(Box::new(tokio::io::stdin()));
    }
    let file = tokio::fs::File::open(source).await?;
    Ok(Box::new(file))
}

/// Read frames from `reader` until EOF or shutdown, forwarding them to `frame_tx`
///
/// Dropping `frame_tx` on return closes the channel, which ends the counter loop.
pub async fn run_feed_reader<R>(
    reader: R,
    frame_tx: mpsc::Sender<DetectionFrame>,
    metrics: Arc<Metrics>,
    mut shutdown: watch::Receiver<bool>,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut line_no: u64 = 0;
    let mut frames_sent: u64 = 0;

    loop {
        let next = tokio::select! {
            changed = shutdown.changed() => {
                // A dropped sender means nobody can signal shutdown any more
                if changed.is_err() || *shutdown.borrow() {
                    info!(frames_sent = %frames_sent, "feed_reader_shutdown");
                    return;
                }
                continue;
            }
            next = lines.next_line() => next,
        };

        let line = match next {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!(lines = %line_no, frames_sent = %frames_sent, "feed_reader_eof");
                return;
            }
            Err(e) => {
                warn!(error = %e, line = %line_no, "feed_read_failed");
                return;
            }
        };
        line_no += 1;

        let frame = match parse_frame_line(&line) {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(e) => {
                metrics.record_malformed_line();
                warn!(line = %line_no, error = %e, "feed_line_malformed");
                continue;
            }
        };

        if frame_tx.send(frame).await.is_err() {
            debug!("feed_channel_closed");
            return;
        }
        frames_sent += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Point, TrackId};

    #[test]
    fn test_parse_frame_line() {
        let frame = parse_frame_line(
            r#"{"frame": 4, "detections": [{"track_id": 9, "bbox": [100.0, 50.0, 140.0, 151.0]}]}"#,
        )
        .unwrap()
        .unwrap();

        assert_eq!(frame.frame, Some(4));
        assert_eq!(frame.detections.len(), 1);
        assert_eq!(frame.detections[0].track_id, TrackId(9));
        // (50 + 151) / 2 = 100.5 rounds away from zero
        assert_eq!(frame.detections[0].centroid(), Point::new(120, 101));
    }

    #[test]
    fn test_parse_blank_and_empty() {
        assert!(parse_frame_line("   ").unwrap().is_none());

        let frame = parse_frame_line(r#"{"detections": []}"#).unwrap().unwrap();
        assert!(frame.detections.is_empty());
        assert!(frame.frame.is_none());
    }

    #[test]
    fn test_parse_malformed() {
        assert!(parse_frame_line("not json").is_err());
        assert!(parse_frame_line(r#"{"detections": [{"track_id": 1}]}"#).is_err());
        assert!(parse_frame_line(r#"{"detections": [{"track_id": 1, "bbox": [1, 2]}]}"#).is_err());
    }

    #[tokio::test]
    async fn test_reader_forwards_valid_frames_in_order() {
        let input = concat!(
            "{\"frame\": 1, \"detections\": []}\n",
            "\n",
            "garbage\n",
            "{\"frame\": 2, \"detections\": [{\"track_id\": 1, \"bbox\": [0, 0, 10, 10]}]}\n",
            "{\"frame\": 3}\n",
        );

        let (tx, mut rx) = mpsc::channel(16);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let metrics = Arc::new(Metrics::new());

        run_feed_reader(input.as_bytes(), tx, metrics.clone(), shutdown_rx).await;

        let mut frames = Vec::new();
        while let Some(frame) = rx.recv().await {
            frames.push(frame.frame);
        }
        assert_eq!(frames, vec![Some(1), Some(2), Some(3)]);
        assert_eq!(metrics.report().malformed_lines_total, 1);
    }

    #[tokio::test]
    async fn test_open_missing_source_fails() {
        assert!(open_source("/nonexistent/detections.jsonl").await.is_err());
    }
}
