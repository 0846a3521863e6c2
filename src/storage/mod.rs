//! Durable session log.
//!
//! # Invariants
//! - At most one session is open (no end time) at any moment.
//! - Motion rows only reference existing sessions and are only appended
//!   while that session is open.
//! - `list_motion` returns rows in insertion order.
//! - Deleting a session deletes its motion rows.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{AnchorFix, Session, SessionId, TrajectoryPoint};

pub mod migrations;
mod sqlite;

pub use sqlite::SqliteSessionStore;

pub trait SessionStore {
    /// Open a new session. Fails while another session is still open.
    fn create_session(
        &mut self,
        start_time: DateTime<Utc>,
        anchor: Option<AnchorFix>,
    ) -> Result<SessionId>;

    fn close_session(&mut self, id: SessionId, end_time: DateTime<Utc>) -> Result<()>;

    fn append_motion(&mut self, id: SessionId, point: &TrajectoryPoint) -> Result<()>;

    /// All sessions, oldest first.
    fn list_sessions(&self) -> Result<Vec<Session>>;

    fn get_session(&self, id: SessionId) -> Result<Session>;

    /// Motion rows of one session in insertion order; empty for unknown ids.
    fn list_motion(&self, id: SessionId) -> Result<Vec<TrajectoryPoint>>;

    /// Delete a closed session together with its motion rows.
    fn delete_session(&mut self, id: SessionId) -> Result<()>;

    /// Close sessions left open by an interrupted run; returns how many.
    fn close_dangling_sessions(&mut self, end_time: DateTime<Utc>) -> Result<usize>;
}
