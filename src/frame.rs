//! Per-frame data handed from a source to the detector.
//!
//! - `Landmark` / `LandmarkFrame`: tracked points as delivered by the external
//!   landmark library, normalized to the frame.
//! - `LandmarkPair`: which two points form the tilt signal.
//! - `FrameSignal`: the derived scalar with its frame timestamp.
//! - `FrameSample`: what a source yields; either raw landmarks or a signal
//!   that was already derived upstream.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Face-mesh index of the chin.
pub const CHIN_LANDMARK: usize = 152;

/// Face-mesh index of the nose tip.
pub const NOSE_TIP_LANDMARK: usize = 1;

/// Highest landmark index accepted. Face mesh with iris refinement has 478
/// points.
pub const MAX_LANDMARK_INDEX: usize = 477;

/// A tracked point. `x` and `y` are normalized to `0..1` of the frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }
}

/// Landmarks produced for one video frame.
///
/// An empty landmark list means no face was found.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    pub timestamp_ms: u64,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub landmarks: Vec<Landmark>,
}

/// The two landmarks whose vertical separation is the tilt signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandmarkPair {
    /// Lower point on screen (chin by default).
    pub lower: usize,
    /// Upper point on screen (nose tip by default).
    pub upper: usize,
}

impl Default for LandmarkPair {
    fn default() -> Self {
        Self {
            lower: CHIN_LANDMARK,
            upper: NOSE_TIP_LANDMARK,
        }
    }
}

impl LandmarkPair {
    /// Both indices within the mesh and distinct.
    pub fn validate(&self) -> Result<()> {
        for (name, index) in [("lower", self.lower), ("upper", self.upper)] {
            if index > MAX_LANDMARK_INDEX {
                bail!(
                    "landmarks.{} index {} exceeds maximum {}",
                    name,
                    index,
                    MAX_LANDMARK_INDEX
                );
            }
        }
        if self.lower == self.upper {
            bail!("landmarks.lower and landmarks.upper must differ");
        }
        Ok(())
    }

    /// Vertical distance `lower.y - upper.y`, scaled to output pixels.
    ///
    /// Returns `None` when either landmark is missing from the frame. Noisy
    /// coordinates (including NaN) pass through unfiltered.
    pub fn signal(&self, frame: &LandmarkFrame) -> Option<FrameSignal> {
        let lower = frame.landmarks.get(self.lower)?;
        let upper = frame.landmarks.get(self.upper)?;
        Some(FrameSignal {
            timestamp_ms: frame.timestamp_ms,
            value: (lower.y - upper.y) * f64::from(frame.height),
        })
    }
}

/// Scalar tilt signal for one frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameSignal {
    pub timestamp_ms: u64,
    #[serde(rename = "signal")]
    pub value: f64,
}

/// One frame as yielded by a source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FrameSample {
    Signal(FrameSignal),
    Landmarks(LandmarkFrame),
}

impl FrameSample {
    pub fn timestamp_ms(&self) -> u64 {
        match self {
            FrameSample::Signal(signal) => signal.timestamp_ms,
            FrameSample::Landmarks(frame) => frame.timestamp_ms,
        }
    }

    /// Resolve the tilt signal, deriving it from landmarks when needed.
    pub fn signal(&self, pair: &LandmarkPair) -> Option<FrameSignal> {
        match self {
            FrameSample::Signal(signal) => Some(*signal),
            FrameSample::Landmarks(frame) => pair.signal(frame),
        }
    }
}

impl From<FrameSignal> for FrameSample {
    fn from(signal: FrameSignal) -> Self {
        FrameSample::Signal(signal)
    }
}

impl From<LandmarkFrame> for FrameSample {
    fn from(frame: LandmarkFrame) -> Self {
        FrameSample::Landmarks(frame)
    }
}
