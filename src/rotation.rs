//! Body-frame to world-frame rotation.
//!
//! Orientation angles map to fixed axes: `alpha` about Z, `beta` about X,
//! `gamma` about Y. The elementary rotations are composed in the order given
//! by [`AxisOrder`]; the default applies Z first, then X, then Y:
//!
//! ```text
//! world = Ry(gamma) · Rx(beta) · Rz(alpha) · body
//! ```
//!
//! Rotations do not commute, so a recording and its replay must use the same
//! order. The order lives in `PipelineConfig` and is fixed for a session.

use nalgebra::{Rotation3, Vector3};
use serde::{Deserialize, Serialize};

use crate::types::{Accel, Orientation, RotationMatrix};

/// Order in which the elementary rotations are applied to a body vector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisOrder {
    /// Z, then X, then Y: `Ry · Rx · Rz`
    #[default]
    Zxy,
    /// X, then Y, then Z: `Rz · Ry · Rx`
    Xyz,
    /// Z, then Y, then X: `Rx · Ry · Rz`
    Zyx,
}

pub fn rotation_x(radians: f64) -> RotationMatrix {
    Rotation3::from_axis_angle(&Vector3::x_axis(), radians).into_inner()
}

pub fn rotation_y(radians: f64) -> RotationMatrix {
    Rotation3::from_axis_angle(&Vector3::y_axis(), radians).into_inner()
}

pub fn rotation_z(radians: f64) -> RotationMatrix {
    Rotation3::from_axis_angle(&Vector3::z_axis(), radians).into_inner()
}

/// Composite body-to-world matrix for one orientation.
pub fn world_rotation(orientation: &Orientation, order: AxisOrder) -> RotationMatrix {
    let rx = rotation_x(orientation.beta);
    let ry = rotation_y(orientation.gamma);
    let rz = rotation_z(orientation.alpha);

    match order {
        AxisOrder::Zxy => ry * rx * rz,
        AxisOrder::Xyz => rz * ry * rx,
        AxisOrder::Zyx => rx * ry * rz,
    }
}

/// Rotate a body-frame acceleration into the world frame.
///
/// An all-zero orientation is the identity transform.
pub fn rotate_to_world(acceleration_body: &Accel, orientation: &Orientation, order: AxisOrder) -> Accel {
    world_rotation(orientation, order) * acceleration_body
}
