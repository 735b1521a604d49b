//! Frame sources.
//!
//! This module provides the collaborators that feed the detector:
//! - Synthetic landmark streams (`stub://` URLs) with a simulated frame clock
//! - Recorded sessions stored as JSON Lines (local files only)
//! - Scripted in-memory samples (tests, embedding hosts)
//!
//! Every source guarantees non-decreasing timestamps; a sample that goes back
//! in time is reported as an error instead of being handed to the detector.
//!
//! Landmark inference itself happens upstream. Sources only carry the points.

pub mod file;
pub mod stub;

use anyhow::{bail, Result};
use std::collections::VecDeque;

use crate::frame::{FrameSample, LandmarkPair};

pub use file::RecordingSource;
pub use stub::{Scene, SyntheticSource};

/// Configuration for a frame source.
#[derive(Clone, Debug)]
pub struct SourceConfig {
    /// `stub://<scene>` or a local path to a JSON Lines recording.
    pub url: String,
    /// Frame rate of the simulated clock (synthetic sources) and pacing target.
    pub target_fps: u32,
    /// Output frame width for synthetic frames.
    pub width: u32,
    /// Output frame height for synthetic frames.
    pub height: u32,
    /// Landmarks the synthetic face moves when it nods.
    pub landmarks: LandmarkPair,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "stub://nod".to_string(),
            target_fps: 30,
            width: 640,
            height: 480,
            landmarks: LandmarkPair::default(),
        }
    }
}

/// Frame source.
#[derive(Debug)]
pub struct FrameSource {
    backend: SourceBackend,
    last_timestamp: Option<u64>,
    frames_delivered: u64,
}

#[derive(Debug)]
enum SourceBackend {
    Synthetic(SyntheticSource),
    Recording(RecordingSource),
    Scripted(ScriptedSource),
}

impl FrameSource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        let backend = if config.url.starts_with("stub://") {
            SourceBackend::Synthetic(SyntheticSource::new(config)?)
        } else if is_local_file_path(&config.url) {
            SourceBackend::Recording(RecordingSource::new(&config.url))
        } else {
            bail!(
                "unsupported source {:?}: expected stub://<scene> or a local file path",
                config.url
            );
        };
        Ok(Self::with_backend(backend))
    }

    /// Open a finite JSON Lines recording. Synthetic `stub://` streams are
    /// endless and are rejected here.
    pub fn recording(path: &str) -> Result<Self> {
        if path.starts_with("stub://") {
            bail!(
                "{:?} is a synthetic stream, not a recording; pass a JSON Lines file",
                path
            );
        }
        if !is_local_file_path(path) {
            bail!("unsupported recording {:?}: expected a local file path", path);
        }
        Ok(Self::with_backend(SourceBackend::Recording(
            RecordingSource::new(path),
        )))
    }

    /// Replay in-memory samples in order.
    pub fn scripted(samples: impl IntoIterator<Item = FrameSample>) -> Self {
        Self::with_backend(SourceBackend::Scripted(ScriptedSource {
            samples: samples.into_iter().collect(),
        }))
    }

    fn with_backend(backend: SourceBackend) -> Self {
        Self {
            backend,
            last_timestamp: None,
            frames_delivered: 0,
        }
    }

    /// Connect to the source.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            SourceBackend::Synthetic(source) => source.connect(),
            SourceBackend::Recording(source) => source.connect(),
            SourceBackend::Scripted(_) => Ok(()),
        }
    }

    /// Next frame, or `None` once the stream has ended.
    pub fn next_frame(&mut self) -> Result<Option<FrameSample>> {
        let sample = match &mut self.backend {
            SourceBackend::Synthetic(source) => Some(source.next_frame()),
            SourceBackend::Recording(source) => source.next_frame()?,
            SourceBackend::Scripted(source) => source.samples.pop_front(),
        };
        let Some(sample) = sample else {
            return Ok(None);
        };

        let ts = sample.timestamp_ms();
        if let Some(last) = self.last_timestamp {
            if ts < last {
                let location = match &self.backend {
                    SourceBackend::Recording(source) => {
                        format!("{}:{}", source.path().display(), source.line_no())
                    }
                    _ => format!("{}: frame {}", self.describe(), self.frames_delivered + 1),
                };
                bail!(
                    "{}: timestamp {}ms is earlier than previous {}ms",
                    location,
                    ts,
                    last
                );
            }
        }
        self.last_timestamp = Some(ts);
        self.frames_delivered += 1;
        Ok(Some(sample))
    }

    /// Check if the source is healthy.
    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            SourceBackend::Synthetic(source) => source.is_healthy(),
            SourceBackend::Recording(source) => source.is_healthy(),
            SourceBackend::Scripted(_) => true,
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_delivered: self.frames_delivered,
            source: self.describe(),
        }
    }

    fn describe(&self) -> String {
        match &self.backend {
            SourceBackend::Synthetic(source) => source.url(),
            SourceBackend::Recording(source) => source.path().display().to_string(),
            SourceBackend::Scripted(_) => "scripted".to_string(),
        }
    }
}

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_delivered: u64,
    pub source: String,
}

#[derive(Debug)]
struct ScriptedSource {
    samples: VecDeque<FrameSample>,
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    !path.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameSignal;

    fn sig(timestamp_ms: u64, value: f64) -> FrameSample {
        FrameSignal {
            timestamp_ms,
            value,
        }
        .into()
    }

    #[test]
    fn rejects_remote_urls() {
        let config = SourceConfig {
            url: "rtsp://camera/stream".to_string(),
            ..SourceConfig::default()
        };
        assert!(FrameSource::new(config).is_err());

        let config = SourceConfig {
            url: "   ".to_string(),
            ..SourceConfig::default()
        };
        assert!(FrameSource::new(config).is_err());
    }

    #[test]
    fn scripted_source_rejects_backward_timestamps() {
        let mut source = FrameSource::scripted(vec![sig(100, 1.0), sig(100, 1.0), sig(50, 1.0)]);
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_some());
        let err = source.next_frame().unwrap_err().to_string();
        assert!(err.contains("frame 3"), "{err}");
        assert_eq!(source.stats().frames_delivered, 2);
    }

    #[test]
    fn recording_constructor_rejects_synthetic_streams() {
        let err = FrameSource::recording("stub://nod").unwrap_err().to_string();
        assert!(err.contains("not a recording"), "{err}");
        assert!(FrameSource::recording("http://host/session.jsonl").is_err());
        assert!(FrameSource::recording("").is_err());
        assert!(FrameSource::recording("session.jsonl").is_ok());
    }

    #[test]
    fn recording_backward_timestamp_names_file_line() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().expect("temp recording");
        write!(
            file,
            "# header\n\n{{\"timestamp_ms\": 500, \"signal\": 40}}\n# note\n{{\"timestamp_ms\": 400, \"signal\": 40}}\n"
        )
        .expect("write recording");

        let path = file.path().display().to_string();
        let mut source = FrameSource::recording(&path).unwrap();
        source.connect().unwrap();
        assert!(source.next_frame().unwrap().is_some());
        let err = source.next_frame().unwrap_err().to_string();
        assert!(err.contains(&format!("{path}:5:")), "{err}");
    }

    #[test]
    fn scripted_source_ends() {
        let mut source = FrameSource::scripted(vec![sig(0, 1.0)]);
        source.connect().unwrap();
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());
        assert!(source.is_healthy());
        assert_eq!(source.stats().source, "scripted");
    }
}
