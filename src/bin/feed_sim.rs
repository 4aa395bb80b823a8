//! Detection feed simulator
//!
//! Writes a scripted, deterministic detection feed as JSON Lines for local
//! end-to-end runs of the occupancy counter.
//!
//! Usage:
//!   cargo run --bin feed-sim -- --scenario steady_flow > detections.jsonl
//!   cargo run --bin feed-sim -- --scenario hesitation --orientation vertical -o feed.jsonl
//!   cargo run --bin feed-sim -- --list

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use serde_json::json;
use std::fs::File;
use std::io::{self, BufWriter, Write};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
enum Doorway {
    /// People walk up and down the frame (horizontal door line)
    Horizontal,
    /// People walk left and right across the frame (vertical door line)
    Vertical,
}

#[derive(Parser, Debug)]
#[command(name = "feed-sim")]
#[command(about = "Synthetic detection feed generator for the occupancy counter")]
struct Args {
    /// Scenario to generate
    #[arg(short, long, default_value = "steady_flow")]
    scenario: String,

    /// Door line orientation to simulate
    #[arg(long, value_enum, default_value = "horizontal")]
    orientation: Doorway,

    /// Output file, `-` for stdout
    #[arg(short, long, default_value = "-")]
    output: String,

    #[arg(long, default_value = "1280")]
    width: u32,

    #[arg(long, default_value = "720")]
    height: u32,

    /// List scenarios and exit
    #[arg(long)]
    list: bool,
}

// ============================================================================
// Scenarios
// ============================================================================

/// One straight walk of a track along the crossing axis
///
/// `from` and `to` are fractions of the frame extent; the doorway is
/// expected around 0.5.
#[derive(Debug, Clone, Copy)]
struct Walk {
    track_id: i64,
    from: f64,
    to: f64,
    start_frame: u64,
    frames: u64,
}

const fn walk(track_id: i64, from: f64, to: f64, start_frame: u64, frames: u64) -> Walk {
    Walk { track_id, from, to, start_frame, frames }
}

#[derive(Debug)]
struct Scenario {
    name: &'static str,
    description: &'static str,
    walks: &'static [Walk],
    total_frames: u64,
}

const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "steady_flow",
        description: "Six people enter and two leave after calibration",
        walks: &[
            walk(1, 0.2, 0.8, 0, 55),
            walk(2, 0.15, 0.85, 70, 30),
            walk(3, 0.2, 0.8, 110, 30),
            walk(4, 0.25, 0.75, 150, 30),
            walk(5, 0.85, 0.15, 190, 30),
            walk(6, 0.2, 0.8, 230, 30),
            walk(7, 0.2, 0.8, 270, 30),
            walk(8, 0.8, 0.2, 310, 30),
            walk(9, 0.2, 0.8, 350, 30),
        ],
        total_frames: 400,
    },
    Scenario {
        name: "warmup_crossing",
        description: "Two people cross while the door line is still being calibrated",
        walks: &[
            walk(1, 0.2, 0.8, 0, 50),
            walk(2, 0.85, 0.2, 10, 45),
            walk(3, 0.2, 0.8, 90, 30),
        ],
        total_frames: 150,
    },
    Scenario {
        name: "hesitation",
        description: "One person steps through the doorway and turns back",
        walks: &[
            walk(1, 0.2, 0.8, 0, 55),
            walk(2, 0.2, 0.65, 80, 25),
            walk(2, 0.65, 0.25, 105, 25),
            walk(3, 0.3, 0.45, 140, 20),
        ],
        total_frames: 180,
    },
    Scenario {
        name: "empty",
        description: "Nobody in view (degenerate calibration)",
        walks: &[],
        total_frames: 120,
    },
];

fn get_scenario(name: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|s| s.name == name)
}

// ============================================================================
// Frame generation
// ============================================================================

/// Person-sized box around a centroid
const BOX_WIDTH: f64 = 40.0;
const BOX_HEIGHT: f64 = 80.0;

/// Position of `walk` along its axis at `frame`, or None when it is not in view
fn along_axis(walk: &Walk, frame: u64) -> Option<f64> {
    if frame < walk.start_frame || frame >= walk.start_frame + walk.frames {
        return None;
    }
    let steps = walk.frames.saturating_sub(1).max(1) as f64;
    let t = (frame - walk.start_frame) as f64 / steps;
    Some(walk.from + (walk.to - walk.from) * t)
}

/// Lateral lane of a track, with a small deterministic sway
fn lateral(track_id: i64, frame: u64) -> f64 {
    let lane = 0.2 + 0.15 * (track_id.rem_euclid(5) as f64);
    lane + (frame as f64 * 0.7).sin() * 0.003
}

fn build_frame(scenario: &Scenario, frame: u64, doorway: Doorway, width: f64, height: f64) -> serde_json::Value {
    let detections: Vec<serde_json::Value> = scenario
        .walks
        .iter()
        .filter_map(|w| {
            let along = along_axis(w, frame)?;
            let across = lateral(w.track_id, frame);
            let (cx, cy) = match doorway {
                Doorway::Horizontal => (across * width, along * height),
                Doorway::Vertical => (along * width, across * height),
            };
            Some(json!({
                "track_id": w.track_id,
                "bbox": [
                    cx - BOX_WIDTH / 2.0,
                    cy - BOX_HEIGHT / 2.0,
                    cx + BOX_WIDTH / 2.0,
                    cy + BOX_HEIGHT / 2.0,
                ],
            }))
        })
        .collect();

    json!({ "frame": frame, "detections": detections })
}

fn open_output(path: &str) -> anyhow::Result<Box<dyn Write>> {
    if path == "-" {
        return Ok(Box::new(BufWriter::new(io::stdout().lock())));
    }
    let file = File::create(path).with_context(|| format!("Failed to create output file {}", path))?;
    Ok(Box::new(BufWriter::new(file)))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.list {
        for s in SCENARIOS {
            println!("{:<18} {:>4} frames  {}", s.name, s.total_frames, s.description);
        }
        return Ok(());
    }

    let Some(scenario) = get_scenario(&args.scenario) else {
        let names: Vec<&str> = SCENARIOS.iter().map(|s| s.name).collect();
        bail!("unknown scenario '{}' (available: {})", args.scenario, names.join(", "));
    };

    let mut out = open_output(&args.output)?;
    let (width, height) = (args.width as f64, args.height as f64);

    for frame in 0..scenario.total_frames {
        let line = build_frame(scenario, frame, args.orientation, width, height);
        writeln!(out, "{}", line).context("Failed to write frame")?;
    }
    out.flush().context("Failed to flush output")?;

    eprintln!(
        "feed-sim: wrote {} frames for scenario '{}' ({:?} doorway)",
        scenario.total_frames, scenario.name, args.orientation
    );
    Ok(())
}
