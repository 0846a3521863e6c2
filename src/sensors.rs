//! Sensor and absolute-fix collaborators.
//!
//! The core only needs something that yields `MotionSample`s and something
//! that yields one anchor fix at session start. Real device bindings live
//! outside this crate; the sources here cover replaying recorded logs and a
//! deterministic synthetic walk.

use std::collections::VecDeque;
use std::f64::consts::PI;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrajectoryError};
use crate::types::{AnchorFix, MotionSample, Orientation};

pub trait SensorSource {
    /// Next sample, or `None` once the source is exhausted.
    fn next_sample(&mut self) -> Result<Option<MotionSample>>;

    fn set_interval(&mut self, interval: Duration);

    fn interval(&self) -> Duration;
}

pub trait FixSource {
    fn current_fix(&mut self) -> Result<AnchorFix>;
}

// ─── Static fix ──────────────────────────────────────────────────────────────

/// A fix known up front (CLI flags, tests).
#[derive(Clone, Debug)]
pub struct StaticFix(Option<AnchorFix>);

impl StaticFix {
    pub fn new(anchor: AnchorFix) -> Self {
        Self(Some(anchor))
    }

    pub fn unavailable() -> Self {
        Self(None)
    }
}

impl FixSource for StaticFix {
    fn current_fix(&mut self) -> Result<AnchorFix> {
        self.0
            .ok_or_else(|| TrajectoryError::FixUnavailable("no position fix configured".to_string()))
    }
}

// ─── Replay ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SampleLog {
    pub samples: Vec<MotionSample>,
}

fn is_gzip(path: &Path) -> bool {
    path.extension().map(|e| e == "gz").unwrap_or(false)
}

/// Load a `{"samples": [...]}` log, gzip-compressed if the name ends in `.gz`.
pub fn load_log(path: &Path) -> Result<SampleLog> {
    let file = File::open(path)?;
    if is_gzip(path) {
        let reader = BufReader::new(GzDecoder::new(file));
        Ok(serde_json::from_reader(reader)?)
    } else {
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

pub fn save_log(path: &Path, log: &SampleLog) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    let mut writer = if is_gzip(path) {
        let mut encoder = GzEncoder::new(writer, Compression::default());
        serde_json::to_writer(&mut encoder, log)?;
        encoder.finish()?
    } else {
        let mut writer = writer;
        serde_json::to_writer(&mut writer, log)?;
        writer
    };
    writer.flush()?;
    Ok(())
}

/// Plays back recorded samples with their original timestamps.
pub struct ReplaySource {
    samples: VecDeque<MotionSample>,
    interval: Duration,
}

impl ReplaySource {
    pub fn from_samples(samples: Vec<MotionSample>, interval: Duration) -> Self {
        Self {
            samples: samples.into(),
            interval,
        }
    }

    pub fn open(path: &Path, interval: Duration) -> Result<Self> {
        let log = load_log(path)?;
        Ok(Self::from_samples(log.samples, interval))
    }

    pub fn remaining(&self) -> usize {
        self.samples.len()
    }
}

impl SensorSource for ReplaySource {
    fn next_sample(&mut self) -> Result<Option<MotionSample>> {
        Ok(self.samples.pop_front())
    }

    fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    fn interval(&self) -> Duration {
        self.interval
    }
}

// ─── Synthetic ───────────────────────────────────────────────────────────────

/// Deterministic walk: device held flat, pushed back and forth along its x
/// axis while slowly turning, with a spin burst every `spin_every` seconds.
pub struct SyntheticSource {
    start_timestamp: f64,
    interval: Duration,
    tick: u64,
    limit: Option<u64>,
    amplitude: f64,
    period: f64,
    spin_every: f64,
}

impl SyntheticSource {
    pub fn new(start_timestamp: f64, interval: Duration) -> Self {
        Self {
            start_timestamp,
            interval,
            tick: 0,
            limit: None,
            amplitude: 1.2,
            period: 4.0,
            spin_every: 10.0,
        }
    }

    /// Stop after `samples` ticks.
    pub fn with_limit(mut self, samples: u64) -> Self {
        self.limit = Some(samples);
        self
    }

    fn sample_at(&self, elapsed: f64) -> MotionSample {
        let push = self.amplitude * (2.0 * PI * elapsed / self.period).sin();
        let spinning = (elapsed % self.spin_every) < 0.5;
        let yaw_rate = if spinning { 2.5 } else { 0.05 };

        MotionSample::new(
            self.start_timestamp + elapsed,
            Vector3::new(push, 0.0, crate::GRAVITY),
            Vector3::new(0.0, 0.0, yaw_rate),
            Orientation::new(0.05 * elapsed, 0.0, 0.0),
        )
    }
}

impl SensorSource for SyntheticSource {
    fn next_sample(&mut self) -> Result<Option<MotionSample>> {
        if self.limit.is_some_and(|limit| self.tick >= limit) {
            return Ok(None);
        }
        let elapsed = self.tick as f64 * self.interval.as_secs_f64();
        self.tick += 1;
        Ok(Some(self.sample_at(elapsed)))
    }

    fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    fn interval(&self) -> Duration {
        self.interval
    }
}
