mod shared;
mod tilt;

pub use shared::SharedTiltDetector;
pub use tilt::{
    evaluate, DetectorState, TiltConfig, TiltDetector, TriggerDecision, DEFAULT_HOLD,
    DEFAULT_THRESHOLD,
};
