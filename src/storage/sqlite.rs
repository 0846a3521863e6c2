use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{error, info};
use nalgebra::Vector3;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::migrations::apply_migrations;
use super::SessionStore;
use crate::error::{Result, TrajectoryError};
use crate::types::{AnchorFix, Session, SessionId, TrajectoryPoint};

/// [`SessionStore`] backed by a single SQLite connection.
pub struct SqliteSessionStore {
    conn: Connection,
}

impl SqliteSessionStore {
    /// Open (or create) a database file and apply pending migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::bootstrap(Connection::open(path), "file")
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::bootstrap(Connection::open_in_memory(), "memory")
    }

    fn bootstrap(conn: rusqlite::Result<Connection>, mode: &str) -> Result<Self> {
        let started_at = Instant::now();
        let result = conn.map_err(TrajectoryError::from).and_then(|mut conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            conn.busy_timeout(Duration::from_secs(5))?;
            apply_migrations(&mut conn)?;
            Ok(conn)
        });

        match result {
            Ok(conn) => {
                info!(
                    "event=db_open status=ok mode={} duration_ms={}",
                    mode,
                    started_at.elapsed().as_millis()
                );
                Ok(Self { conn })
            }
            Err(err) => {
                error!("event=db_open status=error mode={} error={}", mode, err);
                Err(err)
            }
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// `Some(end_time)` of an existing session, `None` if it does not exist.
    fn session_end(&self, id: SessionId) -> Result<Option<Option<i64>>> {
        Ok(self
            .conn
            .query_row(
                "SELECT end_time FROM recording WHERE id = ?1;",
                [id],
                |row| row.get::<_, Option<i64>>(0),
            )
            .optional()?)
    }

    fn open_session_id(&self) -> Result<Option<SessionId>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id FROM recording WHERE end_time IS NULL ORDER BY id LIMIT 1;",
                [],
                |row| row.get(0),
            )
            .optional()?)
    }
}

fn from_millis(ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or(rusqlite::Error::IntegralValueOutOfRange(0, ms))
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    let end_ms: Option<i64> = row.get(2)?;
    let lat: Option<f64> = row.get(3)?;
    let lon: Option<f64> = row.get(4)?;
    Ok(Session {
        id: row.get(0)?,
        start_time: from_millis(row.get(1)?)?,
        end_time: end_ms.map(from_millis).transpose()?,
        anchor: lat
            .zip(lon)
            .map(|(latitude, longitude)| AnchorFix {
                latitude,
                longitude,
            }),
    })
}

fn point_from_row(row: &Row<'_>) -> rusqlite::Result<TrajectoryPoint> {
    Ok(TrajectoryPoint {
        timestamp: row.get(0)?,
        displacement: Vector3::new(row.get(1)?, row.get(2)?, row.get(3)?),
        acceleration: Vector3::new(row.get(4)?, row.get(5)?, row.get(6)?),
    })
}

const SESSION_COLUMNS: &str = "id, start_time, end_time, anchor_latitude, anchor_longitude";

impl SessionStore for SqliteSessionStore {
    fn create_session(
        &mut self,
        start_time: DateTime<Utc>,
        anchor: Option<AnchorFix>,
    ) -> Result<SessionId> {
        if let Some(open) = self.open_session_id()? {
            return Err(TrajectoryError::SessionAlreadyOpen(open));
        }

        self.conn.execute(
            "INSERT INTO recording (start_time, anchor_latitude, anchor_longitude) VALUES (?1, ?2, ?3);",
            params![
                start_time.timestamp_millis(),
                anchor.map(|a| a.latitude),
                anchor.map(|a| a.longitude)
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        info!("event=session_create status=ok session_id={}", id);
        Ok(id)
    }

    fn close_session(&mut self, id: SessionId, end_time: DateTime<Utc>) -> Result<()> {
        match self.session_end(id)? {
            None => Err(TrajectoryError::UnknownSession(id)),
            Some(Some(_)) => Err(TrajectoryError::SessionClosed(id)),
            Some(None) => {
                self.conn.execute(
                    "UPDATE recording SET end_time = ?1 WHERE id = ?2;",
                    params![end_time.timestamp_millis(), id],
                )?;
                info!("event=session_close status=ok session_id={}", id);
                Ok(())
            }
        }
    }

    fn append_motion(&mut self, id: SessionId, point: &TrajectoryPoint) -> Result<()> {
        match self.session_end(id)? {
            None => return Err(TrajectoryError::UnknownSession(id)),
            Some(Some(_)) => return Err(TrajectoryError::SessionClosed(id)),
            Some(None) => {}
        }

        let d = &point.displacement;
        let a = &point.acceleration;
        self.conn.execute(
            "INSERT INTO motion (recording_id, timestamp, x, y, z, ax, ay, az)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![id, point.timestamp, d.x, d.y, d.z, a.x, a.y, a.z],
        )?;
        Ok(())
    }

    fn list_sessions(&self) -> Result<Vec<Session>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {SESSION_COLUMNS} FROM recording ORDER BY id ASC;"))?;
        let sessions = stmt
            .query_map([], session_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    fn get_session(&self, id: SessionId) -> Result<Session> {
        self.conn
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM recording WHERE id = ?1;"),
                [id],
                session_from_row,
            )
            .optional()?
            .ok_or(TrajectoryError::UnknownSession(id))
    }

    fn list_motion(&self, id: SessionId) -> Result<Vec<TrajectoryPoint>> {
        let mut stmt = self.conn.prepare(
            "SELECT timestamp, x, y, z, ax, ay, az FROM motion
             WHERE recording_id = ?1 ORDER BY id ASC;",
        )?;
        let points = stmt
            .query_map([id], point_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(points)
    }

    fn delete_session(&mut self, id: SessionId) -> Result<()> {
        match self.session_end(id)? {
            None => return Err(TrajectoryError::UnknownSession(id)),
            Some(None) => return Err(TrajectoryError::SessionAlreadyOpen(id)),
            Some(Some(_)) => {}
        }
        self.conn
            .execute("DELETE FROM recording WHERE id = ?1;", [id])?;
        info!("event=session_delete status=ok session_id={}", id);
        Ok(())
    }

    fn close_dangling_sessions(&mut self, end_time: DateTime<Utc>) -> Result<usize> {
        let closed = self.conn.execute(
            "UPDATE recording SET end_time = ?1 WHERE end_time IS NULL;",
            [end_time.timestamp_millis()],
        )?;
        if closed > 0 {
            info!("event=session_recover status=ok closed={}", closed);
        }
        Ok(closed)
    }
}
