// pipeline.rs: pure computation layer
//
// Takes one MotionSample at a time and produces a TrajectoryPoint. No I/O,
// no threads, no clocks: the recorder and the replay path both drive this
// same code, so a recorded session replays to the same trajectory it showed
// live.
//
// Per tick:
//   raw body accel ── clamp ── gravity low-pass ── subtract ── gate
//                  ── rotate to world (fixed axis order) ── integrate
//
// Gravity is removed in the body frame, before rotation, where the device's
// own gravity vector is directly observable.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::filters::{Gate, GravityFilter, GravityState};
use crate::integrator::{Advance, DropReason, Integrator, IntegratorState};
use crate::rotation::rotate_to_world;
use crate::types::{Displacement, MotionSample, TrajectoryPoint, Velocity};

// ─── State ───────────────────────────────────────────────────────────────────

/// Everything that changes from tick to tick, in one owned value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub gravity: GravityState,
    pub integrator: IntegratorState,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub ticks: u64,
    pub integrated: u64,
    pub dropped: u64,
    pub rotation_gated: u64,
    pub deadband_gated: u64,
    pub non_finite_gated: u64,
}

// ─── Outcome ─────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub enum TickOutcome {
    /// The tick produced a new trajectory point
    Advanced { point: TrajectoryPoint, gate: Gate },
    /// Time step rejected; position and velocity carried forward
    Dropped(DropReason),
}

impl TickOutcome {
    pub fn point(&self) -> Option<&TrajectoryPoint> {
        match self {
            TickOutcome::Advanced { point, .. } => Some(point),
            TickOutcome::Dropped(_) => None,
        }
    }
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

pub struct MotionPipeline {
    config: PipelineConfig,
    filter: GravityFilter,
    integrator: Integrator,
    state: PipelineState,
    stats: PipelineStats,
}

impl MotionPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            filter: GravityFilter::new(&config),
            integrator: Integrator::new(&config),
            state: PipelineState::default(),
            stats: PipelineStats::default(),
            config,
        })
    }

    /// Resume from a previously captured state.
    pub fn with_state(config: PipelineConfig, state: PipelineState) -> Result<Self> {
        let mut pipeline = Self::new(config)?;
        pipeline.state = state;
        Ok(pipeline)
    }

    pub fn process(&mut self, sample: &MotionSample) -> TickOutcome {
        self.stats.ticks += 1;

        let (linear_body, gate) =
            self.filter
                .update(&mut self.state.gravity, &sample.acceleration, &sample.rotation_rate);
        match gate {
            Gate::Rotation => self.stats.rotation_gated += 1,
            Gate::Deadband => self.stats.deadband_gated += 1,
            Gate::NonFinite => self.stats.non_finite_gated += 1,
            Gate::Open => {}
        }

        let linear_world = rotate_to_world(
            &linear_body,
            &sample.orientation.sanitized(),
            self.config.axis_order,
        );

        match self
            .integrator
            .advance(&mut self.state.integrator, &linear_world, sample.timestamp)
        {
            Advance::Baseline | Advance::Integrated { .. } => {
                self.stats.integrated += 1;
                TickOutcome::Advanced {
                    point: TrajectoryPoint::new(
                        sample.timestamp,
                        linear_world,
                        self.state.integrator.displacement,
                    ),
                    gate,
                }
            }
            Advance::Dropped(reason) => {
                self.stats.dropped += 1;
                debug!("Dropped tick at t={:.3}: {:?}", sample.timestamp, reason);
                TickOutcome::Dropped(reason)
            }
        }
    }

    /// Run recorded samples through a fresh pipeline with the same config.
    pub fn replay(config: PipelineConfig, samples: &[MotionSample]) -> Result<Vec<TrajectoryPoint>> {
        let mut pipeline = Self::new(config)?;
        Ok(samples
            .iter()
            .filter_map(|s| pipeline.process(s).point().cloned())
            .collect())
    }

    /// Restart the path at the origin; gravity and time baseline survive.
    pub fn reset_motion(&mut self) {
        self.state.integrator.reset_motion();
    }

    /// Forget everything, as for a new session.
    pub fn reset(&mut self) {
        self.state = PipelineState::default();
        self.stats = PipelineStats::default();
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn velocity(&self) -> Velocity {
        self.state.integrator.velocity
    }

    pub fn displacement(&self) -> Displacement {
        self.state.integrator.displacement
    }
}
