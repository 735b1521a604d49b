use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::detect::{TiltConfig, DEFAULT_HOLD, DEFAULT_THRESHOLD};
use crate::frame::LandmarkPair;
use crate::ingest::SourceConfig;
use crate::sink::{SinkConfig, SinkKind};

const DEFAULT_SOURCE_URL: &str = "stub://nod";
const DEFAULT_TARGET_FPS: u32 = 30;
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const MAX_TARGET_FPS: u32 = 240;

#[derive(Debug, Deserialize, Default)]
struct SentinelConfigFile {
    detector: Option<DetectorConfigFile>,
    landmarks: Option<LandmarksConfigFile>,
    source: Option<SourceConfigFile>,
    sink: Option<SinkConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    threshold: Option<f64>,
    hold_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct LandmarksConfigFile {
    lower: Option<usize>,
    upper: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct SinkConfigFile {
    kind: Option<SinkKind>,
    command: Option<Vec<String>>,
}

/// Settings for `tiltd`.
#[derive(Debug, Clone)]
pub struct SentinelConfig {
    pub detector: TiltConfig,
    pub landmarks: LandmarkPair,
    pub source: SourceSettings,
    pub sink: SinkConfig,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub url: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self::from_file(SentinelConfigFile::default())
    }
}

impl SentinelConfig {
    /// Defaults, then the file named by `TILT_CONFIG`, then env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("TILT_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        Self::finish(file_cfg.unwrap_or_default())
    }

    /// Load an explicit config file. Env overrides still apply.
    pub fn from_path(path: &Path) -> Result<Self> {
        Self::finish(read_config_file(path)?)
    }

    fn finish(file: SentinelConfigFile) -> Result<Self> {
        let mut cfg = Self::from_file(file);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SentinelConfigFile) -> Self {
        let detector = TiltConfig {
            threshold: file
                .detector
                .as_ref()
                .and_then(|d| d.threshold)
                .unwrap_or(DEFAULT_THRESHOLD),
            hold: file
                .detector
                .as_ref()
                .and_then(|d| d.hold_ms)
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_HOLD),
        };
        let defaults = LandmarkPair::default();
        let landmarks = LandmarkPair {
            lower: file
                .landmarks
                .as_ref()
                .and_then(|l| l.lower)
                .unwrap_or(defaults.lower),
            upper: file
                .landmarks
                .as_ref()
                .and_then(|l| l.upper)
                .unwrap_or(defaults.upper),
        };
        let source = file.source.unwrap_or_default();
        let source = SourceSettings {
            url: source
                .url
                .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
            target_fps: source.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
            width: source.width.unwrap_or(DEFAULT_WIDTH),
            height: source.height.unwrap_or(DEFAULT_HEIGHT),
        };
        let sink = file.sink.unwrap_or_default();
        let sink = SinkConfig {
            kind: sink.kind.unwrap_or_default(),
            command: sink.command.unwrap_or_default(),
        };
        Self {
            detector,
            landmarks,
            source,
            sink,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(threshold) = std::env::var("TILT_THRESHOLD") {
            self.detector.threshold = threshold
                .trim()
                .parse()
                .map_err(|_| anyhow!("TILT_THRESHOLD must be a number"))?;
        }
        if let Ok(hold) = std::env::var("TILT_HOLD_MS") {
            let ms: u64 = hold.trim().parse().map_err(|_| {
                anyhow!("TILT_HOLD_MS must be an integer number of milliseconds")
            })?;
            self.detector.hold = Duration::from_millis(ms);
        }
        if let Ok(url) = std::env::var("TILT_SOURCE") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(fps) = std::env::var("TILT_FPS") {
            self.source.target_fps = fps
                .trim()
                .parse()
                .map_err(|_| anyhow!("TILT_FPS must be an integer"))?;
        }
        if let Ok(kind) = std::env::var("TILT_SINK") {
            if !kind.trim().is_empty() {
                self.sink.kind =
                    SinkKind::parse(&kind).map_err(|e| anyhow!("TILT_SINK: {}", e))?;
            }
        }
        if let Ok(command) = std::env::var("TILT_SINK_COMMAND") {
            let argv = split_argv(&command);
            if !argv.is_empty() {
                self.sink.command = argv;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.detector.validate()?;
        if self.source.target_fps == 0 || self.source.target_fps > MAX_TARGET_FPS {
            return Err(anyhow!(
                "target_fps must be between 1 and {}",
                MAX_TARGET_FPS
            ));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("frame width and height must be greater than zero"));
        }
        self.landmarks.validate()?;
        self.sink.validate()
    }

    pub fn source_config(&self) -> SourceConfig {
        SourceConfig {
            url: self.source.url.clone(),
            target_fps: self.source.target_fps,
            width: self.source.width,
            height: self.source.height,
            landmarks: self.landmarks,
        }
    }
}

fn read_config_file(path: &Path) -> Result<SentinelConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg: SentinelConfigFile = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn split_argv(value: &str) -> Vec<String> {
    value.split_whitespace().map(|arg| arg.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_detector_defaults() {
        let cfg = SentinelConfig::default();
        assert_eq!(cfg.detector, TiltConfig::default());
        assert_eq!(cfg.landmarks, LandmarkPair::default());
        assert_eq!(cfg.source.url, "stub://nod");
        assert_eq!(cfg.sink.kind, SinkKind::Log);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut cfg = SentinelConfig::default();
        cfg.detector.threshold = f64::NAN;
        assert!(cfg.validate().is_err());

        let mut cfg = SentinelConfig::default();
        cfg.source.target_fps = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = SentinelConfig::default();
        cfg.landmarks.upper = cfg.landmarks.lower;
        assert!(cfg.validate().is_err());

        let mut cfg = SentinelConfig::default();
        cfg.landmarks.lower = usize::MAX;
        assert!(cfg.validate().is_err());

        let mut cfg = SentinelConfig::default();
        cfg.landmarks.upper = crate::frame::MAX_LANDMARK_INDEX + 1;
        assert!(cfg.validate().is_err());

        let mut cfg = SentinelConfig::default();
        cfg.sink.kind = SinkKind::Command;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn splits_command_on_whitespace() {
        assert_eq!(
            split_argv("  aplay  -q cue.wav "),
            vec!["aplay", "-q", "cue.wav"]
        );
    }
}
