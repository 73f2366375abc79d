//! Database module
//!
//! Persists one plan per session key, with an optimistic version check on
//! every save.

mod schema;

pub use schema::SCHEMA;

use crate::plan::Plan;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Stored plan is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("Plan for session {session_key} changed concurrently (expected version {expected}, found {found})")]
    VersionConflict {
        session_key: String,
        expected: u64,
        found: u64,
    },
    #[error("Database connection lock poisoned")]
    LockPoisoned,
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)]
    pub fn open_in_memory() -> DbResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> DbResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    // ==================== Plan Operations ====================

    /// Get the stored plan for a session
    #[cfg(test)]
    pub fn get_plan(&self, session_key: &str) -> DbResult<Option<Plan>> {
        let conn = self.conn()?;
        read_plan(&conn, session_key)
    }

    /// Load the plan for a session, creating an empty one on first access
    pub fn load_or_create(&self, session_key: &str) -> DbResult<Plan> {
        let conn = self.conn()?;
        if let Some(plan) = read_plan(&conn, session_key)? {
            return Ok(plan);
        }

        let now = Utc::now().to_rfc3339();
        let mut plan = Plan::new(session_key);
        plan.version = 1;
        conn.execute(
            "INSERT INTO plans (session_key, version, plan, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![session_key, 1i64, serde_json::to_string(&plan)?, now],
        )?;
        tracing::debug!(session = session_key, "Created empty plan");

        Ok(plan)
    }

    /// Save a plan loaded at `plan.version`. Returns the new version.
    ///
    /// Fails with [`DbError::VersionConflict`] when someone else saved in
    /// between. A version of 0 means the plan has never been stored.
    pub fn save_plan(&self, plan: &Plan) -> DbResult<u64> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        let next = plan.version + 1;

        let mut stored = plan.clone();
        stored.version = next;
        let body = serde_json::to_string(&stored)?;

        let changed = if plan.version == 0 {
            conn.execute(
                "INSERT OR IGNORE INTO plans (session_key, version, plan, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![plan.session_key, to_sql_version(next), body, now],
            )?
        } else {
            conn.execute(
                "UPDATE plans SET version = ?1, plan = ?2, updated_at = ?3
                 WHERE session_key = ?4 AND version = ?5",
                params![
                    to_sql_version(next),
                    body,
                    now,
                    plan.session_key,
                    to_sql_version(plan.version)
                ],
            )?
        };

        if changed == 0 {
            let found = conn
                .query_row(
                    "SELECT version FROM plans WHERE session_key = ?1",
                    params![plan.session_key],
                    |row| row.get::<_, i64>(0),
                )
                .optional()?
                .map_or(0, from_sql_version);
            return Err(DbError::VersionConflict {
                session_key: plan.session_key.clone(),
                expected: plan.version,
                found,
            });
        }

        Ok(next)
    }
}

fn read_plan(conn: &Connection, session_key: &str) -> DbResult<Option<Plan>> {
    let row = conn
        .query_row(
            "SELECT version, plan FROM plans WHERE session_key = ?1",
            params![session_key],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;

    let Some((version, body)) = row else {
        return Ok(None);
    };

    let mut plan: Plan = serde_json::from_str(&body)?;
    // The column is authoritative
    plan.version = from_sql_version(version);
    plan.session_key = session_key.to_string();

    Ok(Some(plan))
}

fn to_sql_version(version: u64) -> i64 {
    i64::try_from(version).unwrap_or(i64::MAX)
}

fn from_sql_version(version: i64) -> u64 {
    u64::try_from(version).unwrap_or(0)
}
