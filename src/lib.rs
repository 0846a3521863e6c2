//! Trajectium: dead-reckoning motion recorder.
//!
//! Turns a stream of body-frame accelerometer, gyroscope and attitude
//! samples into a world-frame displacement path, keeps a short live
//! window of it, projects it onto latitude/longitude around one anchor fix
//! and logs every point of a session to SQLite.

pub mod config;
pub mod error;
pub mod export;
pub mod filters;
pub mod integrator;
pub mod pipeline;
pub mod projection;
pub mod recorder;
pub mod rotation;
pub mod sensors;
pub mod storage;
pub mod trajectory;
pub mod types;

/// Standard gravity, m/s²
pub const GRAVITY: f64 = 9.81;

pub use config::{PipelineConfig, RecorderConfig};
pub use error::{Result, TrajectoryError};
pub use pipeline::{MotionPipeline, TickOutcome};
pub use recorder::{LiveUpdate, Recorder, RecorderStats};
pub use storage::{SessionStore, SqliteSessionStore};
pub use types::{AnchorFix, LatLng, MotionSample, Orientation, Session, SessionId, TrajectoryPoint};
