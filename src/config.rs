use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrajectoryError};
use crate::integrator::IntegrationScheme;
use crate::rotation::AxisOrder;

// ─── Pipeline ────────────────────────────────────────────────────────────────

/// Every tunable of the motion pipeline in one place.
///
/// A JSON file only needs the fields it overrides; the rest keep the
/// defaults below.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Composition order of the body-to-world rotation (default Z, X, Y)
    pub axis_order: AxisOrder,
    /// Gravity low-pass weight on the previous estimate (default 0.98)
    pub low_pass_alpha: f64,
    /// Rotation rate above which a tick is treated as pure rotation, rad/s (default 1.2)
    pub rotation_rate_threshold: f64,
    /// Linear acceleration magnitude below which the signal is zeroed, m/s² (default 0.35)
    pub deadband: f64,
    /// Per-axis clamp on raw accelerometer input, m/s² (default 30)
    pub accel_clamp: f64,
    /// Largest inter-sample gap that is still integrated, seconds (default 0.5)
    pub max_dt: f64,
    /// Rectangular (Euler) or trapezoidal integration (default rectangular)
    pub integration_scheme: IntegrationScheme,
    /// Trajectory buffer capacity in points (default 100, a live preview)
    pub buffer_capacity: usize,
    /// Nominal sensor interval requested from the source, ms (default 50)
    pub sample_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            axis_order: AxisOrder::Zxy,
            low_pass_alpha: 0.98,
            rotation_rate_threshold: 1.2,
            deadband: 0.35,
            accel_clamp: 30.0,
            max_dt: 0.5,
            integration_scheme: IntegrationScheme::Rectangular,
            buffer_capacity: 100,
            sample_interval_ms: 50,
        }
    }
}

impl PipelineConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.low_pass_alpha) {
            return Err(invalid(format!(
                "low_pass_alpha must be in [0, 1), got {}",
                self.low_pass_alpha
            )));
        }
        for (name, value) in [
            ("rotation_rate_threshold", self.rotation_rate_threshold),
            ("deadband", self.deadband),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(format!("{name} must be finite and >= 0, got {value}")));
            }
        }
        for (name, value) in [("accel_clamp", self.accel_clamp), ("max_dt", self.max_dt)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid(format!("{name} must be finite and > 0, got {value}")));
            }
        }
        if self.buffer_capacity == 0 {
            return Err(invalid("buffer_capacity must be > 0".to_string()));
        }
        if self.sample_interval_ms == 0 {
            return Err(invalid("sample_interval_ms must be > 0".to_string()));
        }
        Ok(())
    }
}

// ─── Recorder ────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub pipeline: PipelineConfig,
    /// Pending persisted writes before the producer blocks (default 1024)
    pub persist_queue_depth: usize,
    /// Pending live updates before new ones are dropped (default 256)
    pub live_queue_depth: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            persist_queue_depth: 1024,
            live_queue_depth: 256,
        }
    }
}

impl RecorderConfig {
    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;
        if self.persist_queue_depth == 0 || self.live_queue_depth == 0 {
            return Err(invalid("queue depths must be > 0".to_string()));
        }
        Ok(())
    }
}

fn invalid(message: String) -> TrajectoryError {
    TrajectoryError::InvalidConfig(message)
}
