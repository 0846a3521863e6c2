//! Local displacement to latitude/longitude around a single anchor fix.
//!
//! Equirectangular small-area approximation: one degree of latitude is
//! 111 320 m, one degree of longitude shrinks with cos(latitude). Error grows
//! with distance from the anchor and toward the poles, so this is only good
//! for session-scale paths.

use crate::types::{AnchorFix, Displacement, LatLng, TrajectoryPoint};

/// Meters per degree of latitude
pub const METERS_PER_DEGREE: f64 = 111_320.0;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Below this |cos(latitude)| the anchor is treated as a pole.
const MIN_COS_LATITUDE: f64 = 1e-9;

/// Meters per degree of longitude at the anchor, `None` at the poles
fn meters_per_degree_lon(anchor: &AnchorFix) -> Option<f64> {
    let cos_lat = anchor.latitude.to_radians().cos();
    if cos_lat.abs() < MIN_COS_LATITUDE {
        None
    } else {
        Some(METERS_PER_DEGREE * cos_lat)
    }
}

/// Project a planar displacement (x east, y north, meters) onto the globe.
///
/// At the poles every longitude is the same point, so the east offset is
/// ignored there instead of dividing by zero.
pub fn project(anchor: &AnchorFix, displacement: &Displacement) -> LatLng {
    let d_lat = displacement.y / METERS_PER_DEGREE;
    let d_lon = meters_per_degree_lon(anchor).map_or(0.0, |m| displacement.x / m);
    LatLng {
        latitude: anchor.latitude + d_lat,
        longitude: anchor.longitude + d_lon,
    }
}

/// Inverse of [`project`]: planar offset of `position` from the anchor.
pub fn unproject(anchor: &AnchorFix, position: &LatLng) -> Displacement {
    let y = (position.latitude - anchor.latitude) * METERS_PER_DEGREE;
    let x = meters_per_degree_lon(anchor)
        .map_or(0.0, |m| (position.longitude - anchor.longitude) * m);
    Displacement::new(x, y, 0.0)
}

pub fn project_path(anchor: &AnchorFix, points: &[TrajectoryPoint]) -> Vec<LatLng> {
    points
        .iter()
        .map(|p| project(anchor, &p.displacement))
        .collect()
}

/// Great-circle distance in meters
pub fn haversine_distance(a: &LatLng, b: &LatLng) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).max(0.0).sqrt());
    EARTH_RADIUS_M * c
}

/// Total length of a projected path in meters
pub fn path_length(path: &[LatLng]) -> f64 {
    path.windows(2)
        .map(|pair| haversine_distance(&pair[0], &pair[1]))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn berlin() -> AnchorFix {
        AnchorFix::new(52.0, 13.0).unwrap()
    }

    #[test]
    fn test_origin_projects_to_anchor() {
        let p = project(&berlin(), &Vector3::zeros());
        assert_eq!(p, LatLng::from(berlin()));
    }

    #[test]
    fn test_east_offset() {
        let p = project(&berlin(), &Vector3::new(111.32, 0.0, 0.0));
        let expected = 13.0 + 0.001 / (52.0_f64 * std::f64::consts::PI / 180.0).cos();
        assert_relative_eq!(p.longitude, expected, epsilon = 1e-12);
        assert_relative_eq!(p.latitude, 52.0, epsilon = 1e-12);
    }

    #[test]
    fn test_north_offset() {
        let p = project(&berlin(), &Vector3::new(0.0, 111.32, 0.0));
        assert_relative_eq!(p.latitude, 52.001, epsilon = 1e-12);
        assert_relative_eq!(p.longitude, 13.0, epsilon = 1e-12);
    }

    #[test]
    fn test_z_ignored() {
        let p = project(&berlin(), &Vector3::new(0.0, 0.0, 50.0));
        assert_eq!(p, LatLng::from(berlin()));
    }

    #[test]
    fn test_pole_guard() {
        let pole = AnchorFix::new(90.0, 0.0).unwrap();
        let p = project(&pole, &Vector3::new(1000.0, -111.32, 0.0));
        assert!(p.longitude.is_finite());
        assert_eq!(p.longitude, 0.0);
        assert_relative_eq!(p.latitude, 89.999, epsilon = 1e-9);
    }

    #[test]
    fn test_unproject_inverts_project() {
        let d = Vector3::new(-42.5, 17.25, 0.0);
        let back = unproject(&berlin(), &project(&berlin(), &d));
        assert_relative_eq!(back, d, epsilon = 1e-6);
    }

    #[test]
    fn test_path_length_close_to_planar() {
        let anchor = berlin();
        let path: Vec<LatLng> = [(0.0, 0.0), (30.0, 0.0), (30.0, 40.0)]
            .iter()
            .map(|&(x, y)| project(&anchor, &Vector3::new(x, y, 0.0)))
            .collect();
        // 111 320 m/deg vs a 6 371 km sphere differ by ~0.2%
        assert_relative_eq!(path_length(&path), 70.0, max_relative = 0.01);
    }
}
