pub mod linalg;

pub use linalg::*;

use chrono::{DateTime, Utc};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrajectoryError};

fn zero_vector() -> RotationRate {
    Vector3::zeros()
}

/// Primary key of a recording session in the session store
pub type SessionId = i64;

/// Instantaneous device attitude in radians.
///
/// `alpha` turns about the Z axis, `beta` about X, `gamma` about Y.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl Orientation {
    pub fn new(alpha: f64, beta: f64, gamma: f64) -> Self {
        Self { alpha, beta, gamma }
    }

    pub fn identity() -> Self {
        Self::default()
    }

    /// Non-finite angles collapse to zero so a bad tick rotates by identity.
    pub fn sanitized(self) -> Self {
        let fix = |a: f64| if a.is_finite() { a } else { 0.0 };
        Self::new(fix(self.alpha), fix(self.beta), fix(self.gamma))
    }
}

/// One sensor tick, body frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    /// Seconds since the UNIX epoch
    pub timestamp: f64,
    /// Raw accelerometer reading including gravity
    pub acceleration: Accel,
    #[serde(default = "zero_vector")]
    pub rotation_rate: RotationRate,
    #[serde(default)]
    pub orientation: Orientation,
}

impl MotionSample {
    pub fn new(
        timestamp: f64,
        acceleration: Accel,
        rotation_rate: RotationRate,
        orientation: Orientation,
    ) -> Self {
        Self {
            timestamp,
            acceleration,
            rotation_rate,
            orientation,
        }
    }

    /// Device lying still and flat: gravity on +Z, no rotation.
    pub fn at_rest(timestamp: f64) -> Self {
        Self::new(
            timestamp,
            Vector3::new(0.0, 0.0, crate::GRAVITY),
            Vector3::zeros(),
            Orientation::identity(),
        )
    }
}

/// Integrated position at one tick, world frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub timestamp: f64,
    /// Cleaned linear acceleration that drove this tick
    pub acceleration: Accel,
    pub displacement: Displacement,
}

impl TrajectoryPoint {
    pub fn new(timestamp: f64, acceleration: Accel, displacement: Displacement) -> Self {
        Self {
            timestamp,
            acceleration,
            displacement,
        }
    }

    /// Horizontal (x, y) part of the displacement
    pub fn planar(&self) -> (f64, f64) {
        (self.displacement.x, self.displacement.y)
    }
}

/// The single absolute position every displacement is projected around.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnchorFix {
    pub latitude: f64,
    pub longitude: f64,
}

impl AnchorFix {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        if !valid {
            return Err(TrajectoryError::InvalidAnchor {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

impl From<AnchorFix> for LatLng {
    fn from(anchor: AnchorFix) -> Self {
        Self {
            latitude: anchor.latitude,
            longitude: anchor.longitude,
        }
    }
}

/// A recording session as held by the session store
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub anchor: Option<AnchorFix>,
}

impl Session {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds() as f64 / 1000.0)
    }
}
