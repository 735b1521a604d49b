//! tiltd - head-tilt cue daemon
//!
//! This daemon:
//! 1. Loads configuration (file named by TILT_CONFIG or --config, env overrides)
//! 2. Opens the configured frame source (stub:// scene or recorded session)
//! 3. Runs the paced detection loop, firing the action sink once per episode
//! 4. Stops cleanly on Ctrl-C and logs a session summary

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tilt_sentinel::{FrameSource, RunOptions, SentinelConfig, Session, SinkKind};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Frame source: stub://<scene> or a JSON Lines recording.
    #[arg(long)]
    source: Option<String>,
    /// Tilt threshold in output pixels.
    #[arg(long)]
    threshold: Option<f64>,
    /// Hold duration in milliseconds before firing.
    #[arg(long)]
    hold_ms: Option<u64>,
    /// Action sink (log|bell|command).
    #[arg(long, value_name = "KIND")]
    sink: Option<String>,
    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,
    /// Process frames as fast as the source delivers them.
    #[arg(long)]
    no_pace: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = match &args.config {
        Some(path) => SentinelConfig::from_path(path)?,
        None => SentinelConfig::load()?,
    };
    if let Some(source) = args.source {
        cfg.source.url = source;
    }
    if let Some(threshold) = args.threshold {
        cfg.detector.threshold = threshold;
    }
    if let Some(hold_ms) = args.hold_ms {
        cfg.detector.hold = Duration::from_millis(hold_ms);
    }
    if let Some(kind) = args.sink.as_deref() {
        cfg.sink.kind = SinkKind::parse(kind)?;
    }
    cfg.validate()?;

    let mut source = FrameSource::new(cfg.source_config())?;
    source.connect()?;
    let sink = cfg.sink.build()?;
    let mut session = Session::new(cfg.detector, cfg.landmarks, sink);

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .expect("error setting Ctrl-C handler");

    log::info!("tiltd running. source={}", cfg.source.url);
    let options = RunOptions {
        pace_fps: (!args.no_pace).then_some(cfg.source.target_fps),
        max_frames: args.max_frames,
    };
    let result = session.run(&mut source, &shutdown, &options);

    let stats = session.stats();
    let source_stats = source.stats();
    log::info!(
        "session summary: frames={} skipped={} episodes={} fires={} sink_failures={}",
        stats.frames,
        stats.skipped_frames,
        stats.episodes,
        stats.fires,
        stats.sink_failures
    );
    log::info!(
        "source {} delivered {} frames (healthy={}), deadline misses={}, worst step={}us",
        source_stats.source,
        source_stats.frames_delivered,
        source.is_healthy(),
        stats.deadline_misses,
        stats.worst_step.as_micros()
    );
    result
}
