//! Detection session: the frame loop around the detector.
//!
//! The session owns one detector, one action sink and the landmark pair used
//! to derive the signal. Each frame goes through [`Session::step`]:
//! 1. Frames without a usable signal are skipped; detector state stays frozen.
//! 2. The signal is evaluated synchronously.
//! 3. `Fired` invokes the sink exactly once. Sink errors are logged and
//!    counted, never propagated.
//!
//! Stopping a session makes `step` a no-op. Starting it again resets the
//! detector so no episode spans a stop/start boundary.

use anyhow::Result;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::detect::{TiltConfig, TiltDetector, TriggerDecision};
use crate::frame::{FrameSample, LandmarkPair};
use crate::ingest::FrameSource;
use crate::sink::ActionSink;

/// Counters for one session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Frames evaluated by the detector.
    pub frames: u64,
    /// Frames without a usable signal (no face, missing landmark).
    pub skipped_frames: u64,
    /// Tilt episodes opened.
    pub episodes: u64,
    /// Episodes that reached the hold duration.
    pub fires: u64,
    pub sink_failures: u64,
    /// Paced cycles that overran the frame budget.
    pub deadline_misses: u64,
    #[serde(serialize_with = "serialize_micros")]
    pub worst_step: Duration,
}

fn serialize_micros<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_micros() as u64)
}

/// Options for [`Session::run`].
#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    /// Sleep out the remainder of each frame budget (`1000 / fps` ms).
    pub pace_fps: Option<u32>,
    /// Stop after this many frames from the source.
    pub max_frames: Option<u64>,
}

pub struct Session {
    detector: TiltDetector,
    pair: LandmarkPair,
    sink: Box<dyn ActionSink>,
    running: bool,
    stats: SessionStats,
}

impl Session {
    pub fn new(config: TiltConfig, pair: LandmarkPair, sink: Box<dyn ActionSink>) -> Self {
        Self {
            detector: TiltDetector::new(config),
            pair,
            sink,
            running: false,
            stats: SessionStats::default(),
        }
    }

    /// Begin detection from a clean detector state.
    pub fn start(&mut self) {
        self.detector.reset();
        self.running = true;
        log::info!(
            "detection started (threshold={}, hold={}ms, sink={})",
            self.detector.config().threshold,
            self.detector.config().hold.as_millis(),
            self.sink.name()
        );
    }

    pub fn stop(&mut self) {
        if self.running {
            self.running = false;
            log::info!("detection stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn detector(&self) -> &TiltDetector {
        &self.detector
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Process one frame.
    pub fn step(&mut self, sample: &FrameSample) -> TriggerDecision {
        if !self.running {
            return TriggerDecision::None;
        }
        let Some(signal) = sample.signal(&self.pair) else {
            self.stats.skipped_frames += 1;
            log::trace!("frame {}ms: no signal", sample.timestamp_ms());
            return TriggerDecision::None;
        };

        let was_tilted = self.detector.is_tilted();
        let decision = self.detector.evaluate(signal.value, signal.timestamp_ms);
        self.stats.frames += 1;
        if !was_tilted && self.detector.is_tilted() {
            self.stats.episodes += 1;
            log::debug!(
                "tilt episode opened at {}ms (signal={:.1})",
                signal.timestamp_ms,
                signal.value
            );
        }

        if decision.should_fire() {
            self.stats.fires += 1;
            log::info!(
                "tilt held at {}ms (signal={:.1}), firing {}",
                signal.timestamp_ms,
                signal.value,
                self.sink.name()
            );
            if let Err(e) = self.sink.fire() {
                self.stats.sink_failures += 1;
                log::warn!("{} sink failed: {}", self.sink.name(), e);
            }
        }
        decision
    }

    /// Drive the session from a source until it ends, `max_frames` is reached,
    /// or `shutdown` is set. Starts the session if needed and stops it on
    /// return.
    pub fn run(
        &mut self,
        source: &mut FrameSource,
        shutdown: &AtomicBool,
        options: &RunOptions,
    ) -> Result<()> {
        let budget = options
            .pace_fps
            .filter(|fps| *fps > 0)
            .map(|fps| Duration::from_millis(1000 / u64::from(fps)));
        if !self.running {
            self.start();
        }

        let mut consumed = 0u64;
        let result = loop {
            if shutdown.load(Ordering::SeqCst) {
                log::info!("shutdown requested");
                break Ok(());
            }
            if options.max_frames.is_some_and(|max| consumed >= max) {
                break Ok(());
            }

            let cycle_start = Instant::now();
            let sample = match source.next_frame() {
                Ok(Some(sample)) => sample,
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            };
            consumed += 1;

            let step_start = Instant::now();
            self.step(&sample);
            let step_time = step_start.elapsed();
            if step_time > self.stats.worst_step {
                self.stats.worst_step = step_time;
            }

            if let Some(budget) = budget {
                let elapsed = cycle_start.elapsed();
                if elapsed > budget {
                    self.stats.deadline_misses += 1;
                } else {
                    std::thread::sleep(budget - elapsed);
                }
            }
        };

        self.stop();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameSignal, LandmarkFrame};
    use crate::sink::CountingSink;
    use anyhow::anyhow;

    struct FailingSink;

    impl ActionSink for FailingSink {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn fire(&mut self) -> Result<()> {
            Err(anyhow!("speaker unplugged"))
        }
    }

    fn sig(timestamp_ms: u64, value: f64) -> FrameSample {
        FrameSignal {
            timestamp_ms,
            value,
        }
        .into()
    }

    fn session(sink: Box<dyn ActionSink>) -> Session {
        Session::new(TiltConfig::default(), LandmarkPair::default(), sink)
    }

    #[test]
    fn stopped_session_ignores_frames() {
        let counter = CountingSink::new();
        let mut session = session(Box::new(counter.clone()));
        assert_eq!(session.step(&sig(0, 10.0)), TriggerDecision::None);
        assert!(session.detector().state().is_idle());
        assert_eq!(session.stats().frames, 0);
    }

    #[test]
    fn faceless_frame_leaves_state_frozen() {
        let mut session = session(Box::new(CountingSink::new()));
        session.start();
        session.step(&sig(0, 10.0));
        let before = *session.detector().state();

        let empty = FrameSample::Landmarks(LandmarkFrame {
            timestamp_ms: 500,
            width: 640,
            height: 480,
            landmarks: vec![],
        });
        assert_eq!(session.step(&empty), TriggerDecision::None);
        assert_eq!(*session.detector().state(), before);
        assert_eq!(session.stats().skipped_frames, 1);
    }

    #[test]
    fn sink_failure_is_counted_not_propagated() {
        let mut session = session(Box::new(FailingSink));
        session.start();
        session.step(&sig(0, 10.0));
        assert_eq!(session.step(&sig(1000, 10.0)), TriggerDecision::Fired);
        assert_eq!(session.stats().fires, 1);
        assert_eq!(session.stats().sink_failures, 1);
    }

    #[test]
    fn run_honours_shutdown_flag() {
        let counter = CountingSink::new();
        let mut session = session(Box::new(counter.clone()));
        let mut source = FrameSource::scripted(vec![sig(0, 10.0), sig(2000, 10.0)]);
        let shutdown = AtomicBool::new(true);
        session
            .run(&mut source, &shutdown, &RunOptions::default())
            .unwrap();
        assert_eq!(session.stats().frames, 0);
        assert!(!session.is_running());
    }
}
