//! Tilt Sentinel
//!
//! This crate implements a head-tilt cue: it watches the vertical distance
//! between two facial landmarks (chin and nose tip by default) and fires a
//! one-shot action when the head stays tilted for a sustained duration.
//!
//! # Architecture
//!
//! Landmark inference is external. The crate consumes landmark coordinates per
//! frame and keeps three concerns apart:
//!
//! 1. **Detection** is pure: [`detect::evaluate`] is a total function of
//!    `(state, signal, now)` with at-most-once-per-episode firing.
//! 2. **Sources** feed frames with non-decreasing timestamps.
//! 3. **Sinks** perform the action; the detector never does.
//!
//! # Module Structure
//!
//! - `detect`: debounce detector and its lock-guarded variant
//! - `frame`: landmarks, signal derivation, per-frame samples
//! - `ingest`: frame sources (synthetic, recorded, scripted)
//! - `sink`: action sinks (log, bell, command, counting)
//! - `session`: the frame loop tying source, detector and sink together
//! - `config`: file + environment configuration for `tiltd`

pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod session;
pub mod sink;

pub use config::SentinelConfig;
pub use detect::{
    DetectorState, SharedTiltDetector, TiltConfig, TiltDetector, TriggerDecision,
};
pub use frame::{FrameSample, FrameSignal, Landmark, LandmarkFrame, LandmarkPair};
pub use ingest::{FrameSource, SourceConfig, SourceStats};
pub use session::{RunOptions, Session, SessionStats};
pub use sink::{ActionSink, BellSink, CommandSink, CountingSink, LogSink, SinkConfig, SinkKind};
