//! Gravity separation and noise gating on raw accelerometer samples.
//!
//! The filter itself only holds parameters; the gravity estimate lives in a
//! [`GravityState`] owned by the caller so each tick can be replayed in
//! isolation.

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::types::{clamp_components, sanitize, Accel, RotationRate};

/// Why a tick's linear acceleration was forced to zero, if it was.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gate {
    #[default]
    Open,
    /// Rotation rate above threshold; rotation is not translation
    Rotation,
    /// Residual below the deadband; treated as sensor noise
    Deadband,
    /// Raw sample had a non-finite axis; the gravity estimate was left alone
    NonFinite,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GravityState {
    /// Body-frame gravity estimate; `None` until the first sample
    pub estimate: Option<Accel>,
}

impl GravityState {
    /// Start from a known gravity vector instead of the first sample.
    pub fn seeded(gravity: Accel) -> Self {
        Self {
            estimate: Some(gravity),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GravityFilter {
    alpha: f64,
    rotation_rate_threshold: f64,
    deadband: f64,
    accel_clamp: f64,
}

impl GravityFilter {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            alpha: config.low_pass_alpha,
            rotation_rate_threshold: config.rotation_rate_threshold,
            deadband: config.deadband,
            accel_clamp: config.accel_clamp,
        }
    }

    /// Split one raw sample into gravity and linear acceleration.
    ///
    /// Returns the gated body-frame linear acceleration. Never fails: out of
    /// range axes are clamped, and a sample with any non-finite axis yields
    /// zero without feeding the low-pass.
    pub fn update(
        &self,
        state: &mut GravityState,
        raw_including_gravity: &Accel,
        rotation_rate: &RotationRate,
    ) -> (Accel, Gate) {
        if raw_including_gravity.iter().any(|c| !c.is_finite()) {
            return (Accel::zeros(), Gate::NonFinite);
        }
        let raw = clamp_components(*raw_including_gravity, self.accel_clamp);

        let gravity = match state.estimate {
            None => raw,
            Some(prev) => prev * self.alpha + raw * (1.0 - self.alpha),
        };
        state.estimate = Some(gravity);

        let linear = raw - gravity;

        if sanitize(*rotation_rate).norm() > self.rotation_rate_threshold {
            return (Accel::zeros(), Gate::Rotation);
        }
        if linear.norm() < self.deadband {
            return (Accel::zeros(), Gate::Deadband);
        }
        (linear, Gate::Open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn g() -> Accel {
        Vector3::new(0.0, 0.0, 9.81)
    }

    fn filter() -> GravityFilter {
        GravityFilter::new(&PipelineConfig::default())
    }

    #[test]
    fn test_first_sample_initialises_gravity() {
        let mut state = GravityState::default();
        let raw = Vector3::new(0.4, -0.2, 9.7);
        let (linear, gate) = filter().update(&mut state, &raw, &Vector3::zeros());

        assert_eq!(state.estimate, Some(raw));
        assert_eq!(linear, Vector3::zeros());
        assert_eq!(gate, Gate::Deadband);
    }

    #[test]
    fn test_low_pass_update() {
        let mut state = GravityState::seeded(g());
        let raw = Vector3::new(2.0, 0.0, 9.81);
        let (linear, gate) = filter().update(&mut state, &raw, &Vector3::zeros());

        // gravity moves 2% of the way toward the sample
        assert_relative_eq!(state.estimate.unwrap().x, 0.04, epsilon = 1e-12);
        assert_relative_eq!(linear.x, 1.96, epsilon = 1e-12);
        assert_eq!(gate, Gate::Open);
    }

    #[test]
    fn test_clamps_glitches() {
        let mut state = GravityState::seeded(Vector3::zeros());
        let raw = Vector3::new(500.0, 0.0, -80.0);
        let (linear, _) = filter().update(&mut state, &raw, &Vector3::zeros());

        assert_relative_eq!(linear, Vector3::new(29.4, 0.0, -29.4), epsilon = 1e-9);
    }

    #[test]
    fn test_non_finite_axis_yields_zero_and_keeps_estimate() {
        let f = filter();
        let tilted = Vector3::new(9.81, 0.0, 0.0);
        let mut state = GravityState::seeded(tilted);

        for raw in [
            Vector3::new(f64::NAN, 0.0, 0.0),
            Vector3::new(9.81, f64::INFINITY, 0.0),
        ] {
            let (linear, gate) = f.update(&mut state, &raw, &Vector3::zeros());
            assert_eq!(linear, Vector3::zeros());
            assert_eq!(gate, Gate::NonFinite);
            assert_eq!(state.estimate, Some(tilted));
        }

        // a bad first sample does not seed the estimate either
        let mut fresh = GravityState::default();
        f.update(&mut fresh, &Vector3::new(f64::NAN, 0.0, 9.81), &Vector3::zeros());
        assert_eq!(fresh.estimate, None);
    }

    #[test]
    fn test_rotation_gate_then_recovery() {
        let f = filter();
        let mut state = GravityState::seeded(g());
        let raw = Vector3::new(3.0, 0.0, 9.81);

        let (linear, gate) = f.update(&mut state, &raw, &Vector3::new(0.0, 0.0, 1.5));
        assert_eq!(linear, Vector3::zeros());
        assert_eq!(gate, Gate::Rotation);

        // gravity kept tracking during the gated tick
        let gravity = state.estimate.unwrap();
        let (linear, gate) = f.update(&mut state, &raw, &Vector3::new(0.0, 0.0, 0.1));
        let expected = (raw - gravity) * 0.98;
        assert_eq!(gate, Gate::Open);
        assert_relative_eq!(linear, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_deadband_boundary() {
        let f = filter();
        let eps = 1e-6;

        // linear = 0.98 * (raw - gravity) for a seeded estimate
        let below = Vector3::new((0.35 - eps) / 0.98, 0.0, 0.0) + g();
        let mut state = GravityState::seeded(g());
        let (linear, gate) = f.update(&mut state, &below, &Vector3::zeros());
        assert_eq!(linear, Vector3::zeros());
        assert_eq!(gate, Gate::Deadband);

        let above = Vector3::new((0.35 + eps) / 0.98, 0.0, 0.0) + g();
        let mut state = GravityState::seeded(g());
        let (linear, gate) = f.update(&mut state, &above, &Vector3::zeros());
        assert_eq!(gate, Gate::Open);
        assert_relative_eq!(linear, (above - g()) * 0.98, epsilon = 1e-12);
        assert!(linear.norm() > 0.35);
    }
}
