//! Double integration of world-frame linear acceleration.
//!
//! Each tick uses the measured gap to the previous sample, not the nominal
//! sensor period. A gap that is non-finite, non-positive or longer than
//! `max_dt` is a stall, not motion: the tick is dropped, state carries
//! forward and only the timestamp baseline moves. A sample whose own
//! timestamp is non-finite is dropped without touching the baseline.
//!
//! There is no zero-velocity update. Velocity only changes through
//! subsequent accelerations, so residual velocity after a stop is drift.

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::types::{Accel, Displacement, Velocity};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationScheme {
    /// `v += a·dt; p += v·dt`
    #[default]
    Rectangular,
    /// Averages consecutive accelerations and velocities
    Trapezoidal,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum DropReason {
    NonFinite,
    NonPositive { dt: f64 },
    Stale { dt: f64 },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegratorState {
    pub velocity: Velocity,
    pub displacement: Displacement,
    /// Acceleration used on the last integrated tick (trapezoidal scheme)
    pub last_accel: Accel,
    /// Timestamp of the last sample seen, integrated or dropped
    pub last_timestamp: Option<f64>,
}

impl IntegratorState {
    /// Zero velocity and displacement; keep the timestamp baseline.
    pub fn reset_motion(&mut self) {
        self.velocity = Velocity::zeros();
        self.displacement = Displacement::zeros();
        self.last_accel = Accel::zeros();
    }
}

/// Result of feeding one sample to the integrator
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Advance {
    /// First sample: establishes the time baseline at the current position
    Baseline,
    Integrated { dt: f64 },
    Dropped(DropReason),
}

/// One rectangular (Euler) step.
pub fn step(
    acceleration: &Accel,
    dt: f64,
    prev_velocity: &Velocity,
    prev_displacement: &Displacement,
) -> (Velocity, Displacement) {
    let velocity = prev_velocity + acceleration * dt;
    let displacement = prev_displacement + velocity * dt;
    (velocity, displacement)
}

/// One trapezoidal step.
pub fn step_trapezoidal(
    prev_acceleration: &Accel,
    acceleration: &Accel,
    dt: f64,
    prev_velocity: &Velocity,
    prev_displacement: &Displacement,
) -> (Velocity, Displacement) {
    let velocity = prev_velocity + (prev_acceleration + acceleration) * (0.5 * dt);
    let displacement = prev_displacement + (prev_velocity + velocity) * (0.5 * dt);
    (velocity, displacement)
}

#[derive(Clone, Debug)]
pub struct Integrator {
    scheme: IntegrationScheme,
    max_dt: f64,
}

impl Integrator {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            scheme: config.integration_scheme,
            max_dt: config.max_dt,
        }
    }

    pub fn check_dt(&self, dt: f64) -> Result<f64, DropReason> {
        if !dt.is_finite() {
            Err(DropReason::NonFinite)
        } else if dt <= 0.0 {
            Err(DropReason::NonPositive { dt })
        } else if dt > self.max_dt {
            Err(DropReason::Stale { dt })
        } else {
            Ok(dt)
        }
    }

    pub fn advance(&self, state: &mut IntegratorState, acceleration: &Accel, timestamp: f64) -> Advance {
        // A non-finite timestamp can never be a baseline
        if !timestamp.is_finite() {
            return Advance::Dropped(DropReason::NonFinite);
        }
        let Some(prev_ts) = state.last_timestamp else {
            state.last_timestamp = Some(timestamp);
            state.last_accel = *acceleration;
            return Advance::Baseline;
        };
        state.last_timestamp = Some(timestamp);

        let dt = match self.check_dt(timestamp - prev_ts) {
            Ok(dt) => dt,
            Err(reason) => return Advance::Dropped(reason),
        };

        let (velocity, displacement) = match self.scheme {
            IntegrationScheme::Rectangular => {
                step(acceleration, dt, &state.velocity, &state.displacement)
            }
            IntegrationScheme::Trapezoidal => step_trapezoidal(
                &state.last_accel,
                acceleration,
                dt,
                &state.velocity,
                &state.displacement,
            ),
        };
        state.velocity = velocity;
        state.displacement = displacement;
        state.last_accel = *acceleration;

        Advance::Integrated { dt }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn integrator(scheme: IntegrationScheme) -> Integrator {
        Integrator::new(&PipelineConfig {
            integration_scheme: scheme,
            ..Default::default()
        })
    }

    #[test]
    fn test_zero_input_stays_at_origin() {
        let integ = integrator(IntegrationScheme::Rectangular);
        let mut state = IntegratorState::default();
        for i in 0..200 {
            integ.advance(&mut state, &Vector3::zeros(), i as f64 * 0.05);
        }
        assert_eq!(state.velocity, Vector3::zeros());
        assert_eq!(state.displacement, Vector3::zeros());
    }

    #[test]
    fn test_constant_acceleration_rectangular() {
        let integ = integrator(IntegrationScheme::Rectangular);
        let mut state = IntegratorState::default();
        let a = Vector3::new(0.8, -0.3, 0.0);
        let dt = 0.05;
        let n = 40;

        assert_eq!(integ.advance(&mut state, &a, 0.0), Advance::Baseline);
        let mut expected_p = Vector3::zeros();
        for i in 1..=n {
            integ.advance(&mut state, &a, i as f64 * dt);
            // v_i = a·i·dt, summed into p
            expected_p += a * (i as f64 * dt) * dt;
        }

        assert_relative_eq!(state.velocity, a * (n as f64 * dt), epsilon = 1e-9);
        assert_relative_eq!(state.displacement, expected_p, epsilon = 1e-9);
    }

    #[test]
    fn test_trapezoidal_exact_for_constant_acceleration() {
        let integ = integrator(IntegrationScheme::Trapezoidal);
        let mut state = IntegratorState::default();
        let a = Vector3::new(1.0, 0.0, 0.0);

        integ.advance(&mut state, &a, 0.0);
        for i in 1..=10 {
            integ.advance(&mut state, &a, i as f64 * 0.1);
        }
        // p = a·t²/2 at t = 1 s
        assert_relative_eq!(state.velocity.x, 1.0, epsilon = 1e-9);
        assert_relative_eq!(state.displacement.x, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_stale_tick_dropped() {
        let integ = integrator(IntegrationScheme::Rectangular);
        let mut state = IntegratorState::default();
        let a = Vector3::new(1.0, 1.0, 0.0);
        integ.advance(&mut state, &a, 0.0);
        integ.advance(&mut state, &a, 0.1);
        let before = state;

        let outcome = integ.advance(&mut state, &a, 0.7);
        assert!(matches!(outcome, Advance::Dropped(DropReason::Stale { .. })));
        assert_eq!(state.velocity, before.velocity);
        assert_eq!(state.displacement, before.displacement);
        assert_eq!(state.last_timestamp, Some(0.7));

        // the next tick integrates against the new baseline
        assert_eq!(integ.advance(&mut state, &a, 0.75), Advance::Integrated { dt: 0.75 - 0.7 });
    }

    #[test]
    fn test_non_positive_and_non_finite_dropped() {
        let integ = integrator(IntegrationScheme::Rectangular);
        let mut state = IntegratorState::default();
        let a = Vector3::new(1.0, 0.0, 0.0);
        integ.advance(&mut state, &a, 5.0);

        assert!(matches!(
            integ.advance(&mut state, &a, 5.0),
            Advance::Dropped(DropReason::NonPositive { .. })
        ));
        assert!(matches!(
            integ.advance(&mut state, &a, f64::NAN),
            Advance::Dropped(DropReason::NonFinite)
        ));
        assert_eq!(state.velocity, Vector3::zeros());
        assert_eq!(state.last_timestamp, Some(5.0));

        // the next good sample integrates against the last finite baseline
        assert_eq!(integ.advance(&mut state, &a, 5.05), Advance::Integrated { dt: 5.05 - 5.0 });
    }

    #[test]
    fn test_non_finite_first_timestamp_is_not_a_baseline() {
        let integ = integrator(IntegrationScheme::Rectangular);
        let mut state = IntegratorState::default();
        let a = Vector3::new(1.0, 0.0, 0.0);

        assert_eq!(
            integ.advance(&mut state, &a, f64::NAN),
            Advance::Dropped(DropReason::NonFinite)
        );
        assert_eq!(
            integ.advance(&mut state, &a, f64::NEG_INFINITY),
            Advance::Dropped(DropReason::NonFinite)
        );
        assert_eq!(state.last_timestamp, None);
        assert_eq!(integ.advance(&mut state, &a, 0.05), Advance::Baseline);
    }

    #[test]
    fn test_reset_motion_keeps_baseline() {
        let integ = integrator(IntegrationScheme::Rectangular);
        let mut state = IntegratorState::default();
        let a = Vector3::new(2.0, 0.0, 0.0);
        integ.advance(&mut state, &a, 0.0);
        integ.advance(&mut state, &a, 0.1);

        state.reset_motion();
        assert_eq!(state.displacement, Vector3::zeros());
        assert_eq!(state.last_timestamp, Some(0.1));
    }
}
