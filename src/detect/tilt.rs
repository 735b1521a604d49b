//! Head-tilt debounce detector.
//!
//! Consumes one scalar per processed frame (the chin-to-nose vertical distance)
//! and decides when a below-threshold condition has held long enough to fire a
//! one-shot action. The detector performs no I/O; callers map
//! [`TriggerDecision::Fired`] to exactly one action invocation.
//!
//! An *episode* is a maximal run of frames with `signal < threshold`. Each
//! episode fires at most once. Any frame at or above the threshold closes the
//! episode; there is no smoothing window, so a single noisy frame restarts the
//! hold clock.

use anyhow::{bail, Result};
use serde::Serialize;
use std::time::Duration;

/// Default tilt threshold, in output pixels.
pub const DEFAULT_THRESHOLD: f64 = 75.0;

/// Default hold duration before an episode fires.
pub const DEFAULT_HOLD: Duration = Duration::from_millis(1000);

/// Detector configuration, fixed per instance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TiltConfig {
    /// Signal value below which the head counts as tilted.
    pub threshold: f64,
    /// Minimum time inside one episode before firing.
    pub hold: Duration,
}

impl TiltConfig {
    /// A NaN threshold would never count as tilted; infinities are rejected too.
    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() {
            bail!("detector threshold must be a finite number");
        }
        Ok(())
    }
}

impl Default for TiltConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            hold: DEFAULT_HOLD,
        }
    }
}

/// Outcome of evaluating one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerDecision {
    /// Not tilted, or tilted for less than the hold duration.
    None,
    /// The hold duration just elapsed in this episode. Perform the action.
    Fired,
    /// Still tilted after firing. The action must not repeat.
    AlreadyFired,
}

impl TriggerDecision {
    pub fn should_fire(self) -> bool {
        matches!(self, TriggerDecision::Fired)
    }
}

/// State carried across frames.
///
/// `has_fired` is only ever true while an episode is open; both fields are
/// cleared together when the signal leaves the tilted region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DetectorState {
    episode_start: Option<u64>,
    has_fired: bool,
}

impl DetectorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timestamp (ms) at which the current episode opened.
    pub fn episode_start(&self) -> Option<u64> {
        self.episode_start
    }

    pub fn has_fired(&self) -> bool {
        self.has_fired
    }

    /// True when no episode is open.
    pub fn is_idle(&self) -> bool {
        self.episode_start.is_none()
    }

    fn clear(&mut self) {
        self.episode_start = None;
        self.has_fired = false;
    }
}

/// Evaluate one frame against an explicit state.
///
/// `now_ms` must be non-decreasing across calls for the same state. If it goes
/// backwards the elapsed time saturates at zero, so the detector never fires
/// early.
///
/// A NaN signal compares false against the threshold and therefore takes the
/// not-tilted branch: the episode is closed and `None` is returned. The
/// boundary `signal == threshold` is likewise not tilted.
pub fn evaluate(
    config: &TiltConfig,
    state: &mut DetectorState,
    signal: f64,
    now_ms: u64,
) -> TriggerDecision {
    let tilted = signal < config.threshold;
    if !tilted {
        state.clear();
        return TriggerDecision::None;
    }

    let start = match state.episode_start {
        Some(start) => start,
        None => {
            state.episode_start = Some(now_ms);
            state.has_fired = false;
            now_ms
        }
    };

    let elapsed = Duration::from_millis(now_ms.saturating_sub(start));
    if elapsed < config.hold {
        return TriggerDecision::None;
    }
    if state.has_fired {
        TriggerDecision::AlreadyFired
    } else {
        state.has_fired = true;
        TriggerDecision::Fired
    }
}

/// Detector instance owning its configuration and state.
#[derive(Clone, Debug, Default)]
pub struct TiltDetector {
    config: TiltConfig,
    state: DetectorState,
}

impl TiltDetector {
    pub fn new(config: TiltConfig) -> Self {
        Self {
            config,
            state: DetectorState::new(),
        }
    }

    /// See [`evaluate`].
    pub fn evaluate(&mut self, signal: f64, now_ms: u64) -> TriggerDecision {
        evaluate(&self.config, &mut self.state, signal, now_ms)
    }

    /// Drop any open episode. Called when detection restarts.
    pub fn reset(&mut self) {
        self.state = DetectorState::new();
    }

    pub fn config(&self) -> &TiltConfig {
        &self.config
    }

    pub fn state(&self) -> &DetectorState {
        &self.state
    }

    /// True while an episode is open.
    pub fn is_tilted(&self) -> bool {
        !self.state.is_idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(detector: &mut TiltDetector, frames: &[(u64, f64)]) -> Vec<TriggerDecision> {
        frames
            .iter()
            .map(|&(t, signal)| detector.evaluate(signal, t))
            .collect()
    }

    #[test]
    fn fires_once_after_hold_then_reports_already_fired() {
        let mut detector = TiltDetector::default();
        let decisions = run(
            &mut detector,
            &[(0, 70.0), (500, 70.0), (1000, 70.0), (1200, 70.0)],
        );
        assert_eq!(
            decisions,
            vec![
                TriggerDecision::None,
                TriggerDecision::None,
                TriggerDecision::Fired,
                TriggerDecision::AlreadyFired,
            ]
        );
    }

    #[test]
    fn upright_frame_restarts_episode_clock() {
        let mut detector = TiltDetector::default();
        assert_eq!(detector.evaluate(70.0, 0), TriggerDecision::None);
        assert_eq!(detector.evaluate(80.0, 300), TriggerDecision::None);
        assert!(detector.state().is_idle());
        assert_eq!(detector.evaluate(60.0, 2000), TriggerDecision::None);
        assert_eq!(detector.state().episode_start(), Some(2000));
        assert_eq!(detector.evaluate(60.0, 3000), TriggerDecision::Fired);
    }

    #[test]
    fn threshold_value_is_not_tilted() {
        let mut detector = TiltDetector::default();
        assert_eq!(detector.evaluate(75.0, 0), TriggerDecision::None);
        assert_eq!(*detector.state(), DetectorState::new());
    }

    #[test]
    fn fires_exactly_at_hold_boundary() {
        let mut detector = TiltDetector::default();
        assert_eq!(detector.evaluate(50.0, 0), TriggerDecision::None);
        assert_eq!(detector.evaluate(50.0, 999), TriggerDecision::None);
        assert_eq!(detector.evaluate(50.0, 1000), TriggerDecision::Fired);
    }

    #[test]
    fn nan_signal_closes_episode() {
        let mut detector = TiltDetector::default();
        detector.evaluate(10.0, 0);
        detector.evaluate(10.0, 1000);
        assert!(detector.state().has_fired());

        assert_eq!(detector.evaluate(f64::NAN, 1100), TriggerDecision::None);
        assert!(detector.state().is_idle());
        assert!(!detector.state().has_fired());
    }

    #[test]
    fn backwards_clock_does_not_fire() {
        let mut detector = TiltDetector::default();
        detector.evaluate(10.0, 5000);
        assert_eq!(detector.evaluate(10.0, 100), TriggerDecision::None);
        assert_eq!(detector.evaluate(10.0, 6000), TriggerDecision::Fired);
    }

    #[test]
    fn zero_hold_fires_on_first_tilted_frame() {
        let mut detector = TiltDetector::new(TiltConfig {
            threshold: 75.0,
            hold: Duration::ZERO,
        });
        assert_eq!(detector.evaluate(10.0, 42), TriggerDecision::Fired);
        assert_eq!(detector.evaluate(10.0, 42), TriggerDecision::AlreadyFired);
    }

    #[test]
    fn reset_drops_open_episode() {
        let mut detector = TiltDetector::default();
        detector.evaluate(10.0, 0);
        assert!(detector.is_tilted());
        detector.reset();
        assert!(!detector.is_tilted());
        assert_eq!(detector.evaluate(10.0, 900), TriggerDecision::None);
        assert_eq!(detector.evaluate(10.0, 1500), TriggerDecision::None);
        assert_eq!(detector.evaluate(10.0, 1900), TriggerDecision::Fired);
    }

    #[test]
    fn config_rejects_non_finite_threshold() {
        assert!(TiltConfig::default().validate().is_ok());
        for threshold in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let config = TiltConfig {
                threshold,
                ..TiltConfig::default()
            };
            assert!(config.validate().is_err(), "{threshold} accepted");
        }
    }

    #[test]
    fn free_function_matches_detector() {
        let config = TiltConfig::default();
        let mut state = DetectorState::new();
        assert_eq!(evaluate(&config, &mut state, 1.0, 0), TriggerDecision::None);
        assert_eq!(
            evaluate(&config, &mut state, 1.0, 1000),
            TriggerDecision::Fired
        );
        assert!(state.has_fired());
        assert_eq!(state.episode_start(), Some(0));
    }
}
