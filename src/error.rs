use thiserror::Error;

use crate::types::SessionId;

/// Trajectium error types
///
/// Degenerate sensor input is not represented here: it is absorbed by the
/// pipeline (clamped, zeroed or dropped) and never stops a recording.
#[derive(Error, Debug)]
pub enum TrajectoryError {
    #[error("Session already recording")]
    AlreadyRecording,

    #[error("Session not recording")]
    NotRecording,

    #[error("Unknown session: {0}")]
    UnknownSession(SessionId),

    #[error("Session {0} is already closed")]
    SessionClosed(SessionId),

    #[error("Session {0} is still open")]
    SessionAlreadyOpen(SessionId),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid anchor fix: lat={latitude}, lon={longitude}")]
    InvalidAnchor { latitude: f64, longitude: f64 },

    #[error("Sensor failed: {0}")]
    SensorFailed(String),

    #[error("Absolute fix unavailable: {0}")]
    FixUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion { db_version: u32, latest_supported: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TrajectoryError {
    /// Lifecycle violations: the caller drove the recorder or store out of order.
    pub fn is_invalid_state(&self) -> bool {
        matches!(
            self,
            TrajectoryError::AlreadyRecording
                | TrajectoryError::NotRecording
                | TrajectoryError::UnknownSession(_)
                | TrajectoryError::SessionClosed(_)
                | TrajectoryError::SessionAlreadyOpen(_)
        )
    }
}

/// Result type for trajectium operations
pub type Result<T> = std::result::Result<T, TrajectoryError>;
