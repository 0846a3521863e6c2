//! Session database schema, versioned through `PRAGMA user_version`.
//!
//! Each step is a SQL script keyed by the schema version it produces. Opening
//! a database runs every step above its stored version in one transaction,
//! so a half-migrated file is never left behind. A file written by a newer
//! build is refused rather than guessed at.

use log::info;
use rusqlite::Connection;

use crate::error::{Result, TrajectoryError};

/// `(schema version, script)`, ascending
const SCHEMA_STEPS: &[(u32, &str)] = &[
    (1, include_str!("0001_init.sql")),
    (2, include_str!("0002_motion_acceleration.sql")),
];

pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |&(version, _)| version)
}

pub fn current_user_version(conn: &Connection) -> Result<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Bring `conn` up to [`latest_version`]; returns the number of steps run.
pub fn apply_migrations(conn: &mut Connection) -> Result<usize> {
    let from = current_user_version(conn)?;
    let to = latest_version();
    if from > to {
        return Err(TrajectoryError::UnsupportedSchemaVersion {
            db_version: from,
            latest_supported: to,
        });
    }

    let pending: Vec<_> = SCHEMA_STEPS.iter().filter(|&&(version, _)| version > from).collect();
    if pending.is_empty() {
        return Ok(0);
    }

    let tx = conn.transaction()?;
    for &&(version, script) in &pending {
        tx.execute_batch(script)?;
        tx.pragma_update(None, "user_version", version)?;
    }
    tx.commit()?;

    info!("event=db_migrate status=ok from={} to={} steps={}", from, to, pending.len());
    Ok(pending.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versions_strictly_increase() {
        assert!(SCHEMA_STEPS.windows(2).all(|w| w[0].0 < w[1].0));
        assert_eq!(latest_version(), 2);
    }

    #[test]
    fn test_fresh_database_runs_every_step_once() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(apply_migrations(&mut conn).unwrap(), SCHEMA_STEPS.len());
        assert_eq!(current_user_version(&conn).unwrap(), latest_version());
        assert_eq!(apply_migrations(&mut conn).unwrap(), 0);
    }

    #[test]
    fn test_upgrade_from_first_version_adds_acceleration_columns() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA_STEPS[0].1).unwrap();
        conn.pragma_update(None, "user_version", 1u32).unwrap();
        conn.execute_batch(
            "INSERT INTO recording (start_time) VALUES (0);
             INSERT INTO motion (recording_id, timestamp, x, y, z) VALUES (1, 0.5, 1.0, 2.0, 0.0);",
        )
        .unwrap();

        assert_eq!(apply_migrations(&mut conn).unwrap(), 1);
        let ax: f64 = conn
            .query_row("SELECT ax FROM motion WHERE recording_id = 1;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(ax, 0.0);
    }
}
