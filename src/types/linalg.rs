//! Linear algebra type aliases for the motion pipeline
//!
//! Every quantity is a plain `Vector3<f64>`; the alias names carry the unit.
//! Nothing stops an `Accel` from being added to a `Displacement`, so keep the
//! alias on every binding that crosses a module boundary.

use nalgebra::{Matrix3, Vector3};

/// Acceleration in m/s² (body or world frame, see the binding name)
pub type Accel = Vector3<f64>;

/// Velocity in m/s, world frame
pub type Velocity = Vector3<f64>;

/// Displacement in meters from the session origin, world frame
pub type Displacement = Vector3<f64>;

/// Angular rate in rad/s, body frame
pub type RotationRate = Vector3<f64>;

/// Proper 3×3 rotation matrix
pub type RotationMatrix = Matrix3<f64>;

/// Replace non-finite components with zero.
pub fn sanitize(v: Vector3<f64>) -> Vector3<f64> {
    v.map(|c| if c.is_finite() { c } else { 0.0 })
}

/// Clamp every component into `[-limit, limit]`.
pub fn clamp_components(v: Vector3<f64>, limit: f64) -> Vector3<f64> {
    v.map(|c| c.clamp(-limit, limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_non_finite() {
        let v = sanitize(Vector3::new(f64::NAN, 1.5, f64::NEG_INFINITY));
        assert_eq!(v, Vector3::new(0.0, 1.5, 0.0));
    }

    #[test]
    fn test_clamp_components() {
        let v = clamp_components(Vector3::new(45.0, -31.0, 2.0), 30.0);
        assert_eq!(v, Vector3::new(30.0, -30.0, 2.0));
    }
}
