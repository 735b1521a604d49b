//! Action sinks.
//!
//! A sink performs the one-shot action for a fired episode (an audible cue in
//! the usual setup). The session calls [`ActionSink::fire`] exactly once per
//! `Fired` decision, from inside the frame loop, so implementations must
//! return promptly and never wait on the action to finish.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::io::Write;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub trait ActionSink: Send {
    /// Sink identifier for logs.
    fn name(&self) -> &'static str;

    /// Perform the action. Must not block the caller.
    fn fire(&mut self) -> Result<()>;
}

/// Logs the cue.
#[derive(Debug, Default)]
pub struct LogSink;

impl ActionSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    fn fire(&mut self) -> Result<()> {
        log::warn!("head tilt held: cue");
        Ok(())
    }
}

/// Rings the terminal bell on a writer.
pub struct BellSink<W: Write + Send> {
    out: W,
}

impl BellSink<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self {
            out: std::io::stderr(),
        }
    }
}

impl<W: Write + Send> BellSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> ActionSink for BellSink<W> {
    fn name(&self) -> &'static str {
        "bell"
    }

    fn fire(&mut self) -> Result<()> {
        self.out.write_all(b"\x07")?;
        self.out.flush()?;
        Ok(())
    }
}

/// Spawns an external program per cue, e.g. `aplay cue.wav`.
///
/// The child is not awaited. A previous child still running is left alone;
/// finished children are reaped on the next fire.
pub struct CommandSink {
    program: String,
    args: Vec<String>,
    running: Vec<Child>,
}

impl CommandSink {
    pub fn new(argv: &[String]) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| anyhow!("command sink requires a program to run"))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            running: Vec::new(),
        })
    }

    fn reap(&mut self) {
        self.running.retain_mut(|child| match child.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    log::debug!("cue command exited with {}", status);
                }
                false
            }
            Ok(None) => true,
            Err(e) => {
                log::debug!("cue command wait failed: {}", e);
                false
            }
        });
    }
}

impl ActionSink for CommandSink {
    fn name(&self) -> &'static str {
        "command"
    }

    fn fire(&mut self) -> Result<()> {
        self.reap();
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to spawn cue command {}", self.program))?;
        self.running.push(child);
        Ok(())
    }
}

/// Counts invocations. Clones share the counter.
#[derive(Clone, Debug, Default)]
pub struct CountingSink {
    count: Arc<AtomicU64>,
}

impl CountingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }
}

impl ActionSink for CountingSink {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn fire(&mut self) -> Result<()> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Log,
    Bell,
    Command,
}

impl SinkKind {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(SinkKind::Log),
            "bell" => Ok(SinkKind::Bell),
            "command" => Ok(SinkKind::Command),
            other => Err(anyhow!(
                "unknown sink kind {:?} (expected log, bell or command)",
                other
            )),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SinkConfig {
    pub kind: SinkKind,
    /// Program and arguments for `SinkKind::Command`.
    pub command: Vec<String>,
}

impl SinkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.kind == SinkKind::Command && self.command.is_empty() {
            bail!("command sink requires a non-empty command");
        }
        Ok(())
    }

    pub fn build(&self) -> Result<Box<dyn ActionSink>> {
        self.validate()?;
        Ok(match self.kind {
            SinkKind::Log => Box::new(LogSink),
            SinkKind::Bell => Box::new(BellSink::stderr()),
            SinkKind::Command => Box::new(CommandSink::new(&self.command)?),
        })
    }
}
