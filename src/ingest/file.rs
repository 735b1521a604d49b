//! Recorded session source.
//!
//! Reads frames from a local JSON Lines file, one sample per line:
//!
//! ```text
//! # comments and blank lines are skipped
//! {"timestamp_ms": 0, "signal": 82.5}
//! {"timestamp_ms": 33, "width": 640, "height": 480, "landmarks": [{"x": 0.5, "y": 0.4}, ...]}
//! ```
//!
//! The file is streamed; nothing beyond the current line is held in memory.

use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use crate::frame::FrameSample;

#[derive(Debug)]
pub struct RecordingSource {
    path: PathBuf,
    lines: Option<Lines<BufReader<File>>>,
    line_no: usize,
    exhausted: bool,
}

impl RecordingSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lines: None,
            line_no: 0,
            exhausted: false,
        }
    }

    /// Open the recording.
    pub fn connect(&mut self) -> Result<()> {
        let file = File::open(&self.path)
            .with_context(|| format!("failed to open recording {}", self.path.display()))?;
        self.lines = Some(BufReader::new(file).lines());
        self.line_no = 0;
        self.exhausted = false;
        log::info!("RecordingSource: opened {}", self.path.display());
        Ok(())
    }

    pub fn next_frame(&mut self) -> Result<Option<FrameSample>> {
        let lines = self
            .lines
            .as_mut()
            .ok_or_else(|| anyhow!("recording {} is not connected", self.path.display()))?;

        for line in lines.by_ref() {
            self.line_no += 1;
            let line = line.with_context(|| {
                format!("{}:{}: read failed", self.path.display(), self.line_no)
            })?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let sample = serde_json::from_str(trimmed).map_err(|e| {
                anyhow!(
                    "{}:{}: invalid frame record: {}",
                    self.path.display(),
                    self.line_no,
                    e
                )
            })?;
            return Ok(Some(sample));
        }

        if !self.exhausted {
            self.exhausted = true;
            log::info!(
                "RecordingSource: reached end of {} after {} lines",
                self.path.display(),
                self.line_no
            );
        }
        Ok(None)
    }

    pub fn is_healthy(&self) -> bool {
        self.lines.is_some() && !self.exhausted
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Line number of the most recently read line (1-based, 0 before reading).
    pub fn line_no(&self) -> usize {
        self.line_no
    }
}
