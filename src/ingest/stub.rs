//! Synthetic landmark source (`stub://<scene>`).
//!
//! Produces a deterministic face that nods on a fixed schedule. Timestamps come
//! from a simulated frame clock (`frame_index * 1000 / fps`), never wall time,
//! so runs are reproducible.

use anyhow::{anyhow, bail, Result};

use super::SourceConfig;
use crate::frame::{FrameSample, Landmark, LandmarkFrame, LandmarkPair};

/// Face-mesh landmark count.
const MESH_POINTS: usize = 468;

const UPRIGHT_MS: u64 = 2000;
const TILTED_MS: u64 = 1500;
const CYCLE_MS: u64 = UPRIGHT_MS + TILTED_MS;

/// Chin-to-nose distance in output pixels.
const UPRIGHT_PX: f64 = 110.0;
const TILTED_PX: f64 = 50.0;

const NOSE_Y: f64 = 0.45;
const DROPOUT_EVERY: u64 = 10;

/// Motion pattern of the synthetic face.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scene {
    /// 2 s upright, 1.5 s tilted, repeat.
    Nod,
    /// Never tilts.
    Upright,
    /// Like `Nod`, with one upright frame in the middle of every tilt.
    Glitch,
    /// Like `Nod`, with every tenth frame missing the face.
    Dropout,
}

impl Scene {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "nod" => Ok(Scene::Nod),
            "upright" => Ok(Scene::Upright),
            "glitch" => Ok(Scene::Glitch),
            "dropout" => Ok(Scene::Dropout),
            other => Err(anyhow!(
                "unknown synthetic scene {:?} (expected nod, upright, glitch or dropout)",
                other
            )),
        }
    }
}

#[derive(Debug)]
pub struct SyntheticSource {
    config: SourceConfig,
    scene: Scene,
    frame_index: u64,
    last_glitch_cycle: Option<u64>,
}

impl SyntheticSource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        let name = config
            .url
            .strip_prefix("stub://")
            .ok_or_else(|| anyhow!("synthetic source requires a stub:// url"))?;
        let scene = Scene::parse(name)?;
        if config.target_fps == 0 {
            bail!("synthetic source requires target_fps >= 1");
        }
        if config.height == 0 {
            bail!("synthetic source requires a non-zero frame height");
        }
        config.landmarks.validate()?;
        Ok(Self {
            config,
            scene,
            frame_index: 0,
            last_glitch_cycle: None,
        })
    }

    pub fn connect(&mut self) -> Result<()> {
        log::info!(
            "SyntheticSource: connected to {} ({} fps)",
            self.config.url,
            self.config.target_fps
        );
        Ok(())
    }

    pub fn next_frame(&mut self) -> FrameSample {
        let index = self.frame_index;
        self.frame_index += 1;
        let timestamp_ms = index * 1000 / u64::from(self.config.target_fps);

        let landmarks = if self.scene == Scene::Dropout && index % DROPOUT_EVERY == DROPOUT_EVERY - 1
        {
            Vec::new()
        } else {
            let distance = if self.tilted_at(timestamp_ms) {
                TILTED_PX
            } else {
                UPRIGHT_PX
            };
            self.face(distance)
        };

        FrameSample::Landmarks(LandmarkFrame {
            timestamp_ms,
            width: self.config.width,
            height: self.config.height,
            landmarks,
        })
    }

    pub fn is_healthy(&self) -> bool {
        true
    }

    pub fn url(&self) -> String {
        self.config.url.clone()
    }

    fn tilted_at(&mut self, timestamp_ms: u64) -> bool {
        if self.scene == Scene::Upright {
            return false;
        }
        let phase = timestamp_ms % CYCLE_MS;
        if phase < UPRIGHT_MS {
            return false;
        }
        if self.scene == Scene::Glitch && phase >= UPRIGHT_MS + TILTED_MS / 2 {
            let cycle = timestamp_ms / CYCLE_MS;
            if self.last_glitch_cycle != Some(cycle) {
                self.last_glitch_cycle = Some(cycle);
                return false;
            }
        }
        true
    }

    fn face(&self, distance_px: f64) -> Vec<Landmark> {
        let LandmarkPair { lower, upper } = self.config.landmarks;
        let len = MESH_POINTS.max(lower + 1).max(upper + 1);
        let mut points = vec![Landmark::new(0.5, NOSE_Y); len];
        points[upper] = Landmark::new(0.5, NOSE_Y);
        points[lower] = Landmark::new(0.5, NOSE_Y + distance_px / f64::from(self.config.height));
        points
    }
}
