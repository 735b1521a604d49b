//! tilt_replay - evaluate a recorded session without pacing
//!
//! Reads a JSON Lines recording, runs every frame through the detector and
//! reports when the cue would have fired.

use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use tilt_sentinel::detect::{DEFAULT_HOLD, DEFAULT_THRESHOLD};
use tilt_sentinel::{
    CountingSink, FrameSource, LandmarkPair, Session, SessionStats, TiltConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON Lines recording to replay.
    recording: PathBuf,
    /// Tilt threshold in output pixels.
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: f64,
    /// Hold duration in milliseconds before firing.
    #[arg(long, default_value_t = DEFAULT_HOLD.as_millis() as u64)]
    hold_ms: u64,
    /// Landmark index of the lower point (chin).
    #[arg(long)]
    lower: Option<usize>,
    /// Landmark index of the upper point (nose tip).
    #[arg(long)]
    upper: Option<usize>,
    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct ReplayReport {
    recording: String,
    threshold: f64,
    hold_ms: u64,
    fired_at_ms: Vec<u64>,
    stats: SessionStats,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let defaults = LandmarkPair::default();
    let pair = LandmarkPair {
        lower: args.lower.unwrap_or(defaults.lower),
        upper: args.upper.unwrap_or(defaults.upper),
    };
    let config = TiltConfig {
        threshold: args.threshold,
        hold: Duration::from_millis(args.hold_ms),
    };

    config.validate()?;
    pair.validate()?;

    let mut source = FrameSource::recording(&args.recording.display().to_string())?;
    source.connect()?;

    let mut session = Session::new(config, pair, Box::new(CountingSink::new()));
    session.start();
    let mut fired_at_ms = Vec::new();
    while let Some(sample) = source.next_frame()? {
        if session.step(&sample).should_fire() {
            fired_at_ms.push(sample.timestamp_ms());
        }
    }
    session.stop();

    let report = ReplayReport {
        recording: args.recording.display().to_string(),
        threshold: config.threshold,
        hold_ms: args.hold_ms,
        fired_at_ms,
        stats: session.stats().clone(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for ts in &report.fired_at_ms {
            println!("fired at {}ms", ts);
        }
        println!(
            "{}: {} frames, {} skipped, {} episodes, {} fires (threshold={}, hold={}ms)",
            report.recording,
            report.stats.frames,
            report.stats.skipped_frames,
            report.stats.episodes,
            report.stats.fires,
            report.threshold,
            report.hold_ms
        );
    }
    Ok(())
}
