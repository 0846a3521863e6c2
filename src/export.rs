use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::projection::{path_length, project_path};
use crate::storage::SessionStore;
use crate::types::{LatLng, Session, SessionId, TrajectoryPoint};

/// Complete session export (JSON-serializable)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionExport {
    pub session: Session,
    pub stats: SessionStats,
    pub points: Vec<TrajectoryPoint>,
    /// Points projected around the session anchor; empty without one
    pub path: Vec<LatLng>,
}

impl SessionExport {
    pub fn load(store: &dyn SessionStore, id: SessionId) -> Result<Self> {
        let session = store.get_session(id)?;
        let points = store.list_motion(id)?;
        Ok(Self::new(session, points))
    }

    pub fn new(session: Session, points: Vec<TrajectoryPoint>) -> Self {
        let path = match session.anchor {
            Some(anchor) => project_path(&anchor, &points),
            None => Vec::new(),
        };
        let stats = SessionStats::compute(&session, &points, &path);
        Self {
            session,
            stats,
            points,
            path,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_gpx(&self) -> GpxTrack {
        create_gpx_track(&self.session, &self.points, &self.path)
    }
}

/// Session statistics for display
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    /// `None` while the session is open
    pub duration_seconds: Option<f64>,
    pub point_count: usize,
    pub path_length_meters: f64,
    /// Largest horizontal distance from the start point
    pub max_excursion_meters: f64,
}

impl SessionStats {
    pub fn compute(session: &Session, points: &[TrajectoryPoint], path: &[LatLng]) -> Self {
        let max_excursion_meters = points
            .iter()
            .map(|p| {
                let (x, y) = p.planar();
                x.hypot(y)
            })
            .fold(0.0, f64::max);

        SessionStats {
            duration_seconds: session.duration_seconds(),
            point_count: points.len(),
            path_length_meters: path_length(path),
            max_excursion_meters,
        }
    }
}

/// GPX track format for mapping applications
#[derive(Debug, Serialize)]
pub struct GpxTrack {
    pub name: String,
    pub description: String,
    pub track_points: Vec<GpxPoint>,
}

#[derive(Debug, Serialize)]
pub struct GpxPoint {
    pub lat: f64,
    pub lon: f64,
    pub time: Option<String>,
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn timestamp_to_rfc3339(timestamp: f64) -> Option<String> {
    if !timestamp.is_finite() {
        return None;
    }
    DateTime::<Utc>::from_timestamp_millis((timestamp * 1000.0).round() as i64)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
}

impl GpxTrack {
    /// Generate GPX document XML string
    pub fn to_gpx_xml(&self) -> String {
        let name = escape_xml(&self.name);
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str("<gpx version=\"1.1\" creator=\"Trajectium\">\n");
        xml.push_str("  <metadata>\n");
        xml.push_str(&format!("    <name>{}</name>\n", name));
        xml.push_str(&format!("    <desc>{}</desc>\n", escape_xml(&self.description)));
        xml.push_str("  </metadata>\n");
        xml.push_str("  <trk>\n");
        xml.push_str(&format!("    <name>{}</name>\n", name));
        xml.push_str("    <trkseg>\n");

        for point in &self.track_points {
            xml.push_str(&format!(
                "      <trkpt lat=\"{:.8}\" lon=\"{:.8}\">\n",
                point.lat, point.lon
            ));
            if let Some(time) = &point.time {
                xml.push_str(&format!("        <time>{}</time>\n", time));
            }
            xml.push_str("      </trkpt>\n");
        }

        xml.push_str("    </trkseg>\n");
        xml.push_str("  </trk>\n");
        xml.push_str("</gpx>\n");

        xml
    }
}

/// Build a GPX track from stored points and their projected positions.
pub fn create_gpx_track(session: &Session, points: &[TrajectoryPoint], path: &[LatLng]) -> GpxTrack {
    let track_points = points
        .iter()
        .zip(path)
        .map(|(point, position)| GpxPoint {
            lat: position.latitude,
            lon: position.longitude,
            time: timestamp_to_rfc3339(point.timestamp),
        })
        .collect();

    GpxTrack {
        name: format!("Trajectium session {}", session.id),
        description: format!(
            "Recorded from {}",
            session.start_time.to_rfc3339_opts(SecondsFormat::Secs, true)
        ),
        track_points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AnchorFix;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn session(anchor: Option<AnchorFix>) -> Session {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        Session {
            id: 7,
            start_time: start,
            end_time: Some(start + chrono::Duration::seconds(90)),
            anchor,
        }
    }

    fn walk() -> Vec<TrajectoryPoint> {
        [0.0, 3.0, 4.0]
            .iter()
            .enumerate()
            .map(|(i, &x)| {
                TrajectoryPoint::new(
                    1_700_000_000.0 + i as f64,
                    Vector3::zeros(),
                    Vector3::new(x, 0.0, 0.0),
                )
            })
            .collect()
    }

    #[test]
    fn test_export_stats() {
        let anchor = AnchorFix::new(52.0, 13.0).unwrap();
        let export = SessionExport::new(session(Some(anchor)), walk());

        assert_eq!(export.stats.point_count, 3);
        assert_eq!(export.stats.duration_seconds, Some(90.0));
        assert_eq!(export.stats.max_excursion_meters, 4.0);
        assert_relative_eq!(export.stats.path_length_meters, 4.0, epsilon = 0.05);
        assert_eq!(export.path.len(), 3);
    }

    #[test]
    fn test_export_without_anchor_has_no_path() {
        let export = SessionExport::new(session(None), walk());
        assert!(export.path.is_empty());
        assert_eq!(export.stats.path_length_meters, 0.0);
        assert!(export.to_gpx().track_points.is_empty());
    }

    #[test]
    fn test_export_json_serialization() {
        let anchor = AnchorFix::new(52.0, 13.0).unwrap();
        let export = SessionExport::new(session(Some(anchor)), walk());
        let json = export.to_json().unwrap();
        assert!(json.contains("\"point_count\": 3"));

        let back: SessionExport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.session, export.session);
    }

    #[test]
    fn test_gpx_generation() {
        let anchor = AnchorFix::new(52.0, 13.0).unwrap();
        let xml = SessionExport::new(session(Some(anchor)), walk()).to_gpx().to_gpx_xml();

        assert!(xml.starts_with("<?xml"));
        assert_eq!(xml.matches("<trkpt").count(), 3);
        assert!(xml.contains("lat=\"52.00000000\" lon=\"13.00000000\""));
        assert!(xml.contains("<time>2023-11-14T22:13:20.000Z</time>"));
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
    }
}
