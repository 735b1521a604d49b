use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use super::tilt::{DetectorState, TiltConfig, TiltDetector, TriggerDecision};

/// Thread-safe handle to a single detector.
///
/// Every evaluation runs under one writer lock so the episode invariant holds
/// when frames arrive from more than one thread. Clones share the same state.
#[derive(Clone, Debug, Default)]
pub struct SharedTiltDetector {
    inner: Arc<Mutex<TiltDetector>>,
}

impl SharedTiltDetector {
    pub fn new(config: TiltConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TiltDetector::new(config))),
        }
    }

    pub fn evaluate(&self, signal: f64, now_ms: u64) -> Result<TriggerDecision> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| anyhow!("detector lock poisoned"))?;
        Ok(guard.evaluate(signal, now_ms))
    }

    pub fn reset(&self) -> Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| anyhow!("detector lock poisoned"))?;
        guard.reset();
        Ok(())
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> Result<DetectorState> {
        let guard = self
            .inner
            .lock()
            .map_err(|_| anyhow!("detector lock poisoned"))?;
        Ok(*guard.state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn concurrent_writers_fire_once_per_episode() {
        let detector = SharedTiltDetector::default();
        detector.evaluate(10.0, 0).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let detector = detector.clone();
                thread::spawn(move || detector.evaluate(10.0, 2000).unwrap())
            })
            .collect();

        let fired = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|d| d.should_fire())
            .count();
        assert_eq!(fired, 1);
    }

    #[test]
    fn reset_is_visible_to_clones() {
        let detector = SharedTiltDetector::default();
        let other = detector.clone();
        detector.evaluate(10.0, 0).unwrap();
        assert!(!other.state().unwrap().is_idle());
        other.reset().unwrap();
        assert!(detector.state().unwrap().is_idle());
    }
}
