//! SQLite-backed portal storage
//!
//! This module owns the single source of truth for the portal:
//! - Users, companies and internships
//! - Applications with their one authoritative status and version counter
//! - Committee assignments and votes
//! - Generated documents and supervisor visits
//!
//! Query functions take a `&Connection` so they work both on the open
//! database and inside a write transaction (which derefs to a connection).

pub mod applications;
pub mod catalog;
pub mod committee;
pub mod records;
mod schema;
mod types;
pub mod users;

pub use types::*;

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

use crate::core::error::{PortalError, PortalResult};
use crate::core::identity::{EntityId, EntityPrefix, Reference};

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// How long a writer waits for the lock before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// The portal database
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create the database at `path`
    pub fn open(path: &Path) -> PortalResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        // WAL lets readers continue while a vote transaction holds the write lock
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

        let mut db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Private in-memory database, used by tests
    pub fn open_in_memory() -> PortalResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let mut db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Read access
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a write transaction. `IMMEDIATE` takes the write lock up front, so
    /// every read inside the transaction sees the state the writes will commit on.
    pub fn write(&mut self) -> PortalResult<Transaction<'_>> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    fn schema_version(&self) -> PortalResult<i32> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version')",
            [],
            |row| row.get(0),
        )?;
        if !exists {
            return Ok(0);
        }
        let version: Option<i32> = self
            .conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
        Ok(version.unwrap_or(0))
    }

    fn init_schema(&mut self) -> PortalResult<()> {
        let current = self.schema_version()?;
        if current > SCHEMA_VERSION {
            return Err(PortalError::validation(format!(
                "Database schema version {} is newer than this portal build supports ({})",
                current, SCHEMA_VERSION
            )));
        }
        if current < SCHEMA_VERSION {
            let tx = self.write()?;
            schema::create_tables(&tx)?;
            tx.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )?;
            tx.commit()?;
            tracing::debug!(version = SCHEMA_VERSION, "initialized portal schema");
        }
        Ok(())
    }
}

// =========================================================================
// Column helpers
// =========================================================================

/// Parse a text column with `FromStr`, surfacing failures as conversion errors
pub(crate) fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let s: String = row.get(idx)?;
    s.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}

/// Like `parse_col` for nullable columns
pub(crate) fn parse_opt_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let s: Option<String> = row.get(idx)?;
    s.map(|s| {
        s.parse::<T>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
        })
    })
    .transpose()
}

pub(crate) fn parse_datetime(s: String) -> DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

pub(crate) fn parse_opt_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.map(parse_datetime)
}

pub(crate) fn parse_opt_date(s: Option<String>) -> Option<NaiveDate> {
    s.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
}

pub(crate) fn now_string() -> String {
    Utc::now().to_rfc3339()
}

// =========================================================================
// Reference resolution
// =========================================================================

/// Resolve a user-supplied reference (full ID, `APP@3`, or unique ID prefix)
pub fn resolve(conn: &Connection, prefix: EntityPrefix, input: &str) -> PortalResult<EntityId> {
    let table = prefix.table();
    let not_found = || PortalError::not_found(prefix.noun(), input);

    match Reference::parse(input, prefix) {
        Reference::Full(id) => {
            if id.prefix() != prefix {
                return Err(not_found());
            }
            let exists: bool = conn.query_row(
                &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?1)"),
                params![id.to_string()],
                |row| row.get(0),
            )?;
            if exists {
                Ok(id)
            } else {
                Err(not_found())
            }
        }
        Reference::Row(row_prefix, row) => {
            if row_prefix != prefix {
                return Err(not_found());
            }
            let id: Option<String> = conn
                .query_row(
                    &format!("SELECT id FROM {table} WHERE rowid = ?1"),
                    params![row],
                    |r| r.get(0),
                )
                .optional()?;
            Ok(id.ok_or_else(not_found)?.parse()?)
        }
        Reference::Partial(partial) => {
            // Bare ULID fragments are accepted without the prefix
            let needle = if partial.contains('-') {
                partial
            } else {
                format!("{}-{}", prefix, partial)
            };
            let mut stmt = conn.prepare(&format!(
                "SELECT id FROM {table} WHERE id LIKE ?1 || '%' LIMIT 2"
            ))?;
            let ids: Vec<String> = stmt
                .query_map(params![needle], |r| r.get(0))?
                .collect::<Result<_, _>>()?;
            match ids.as_slice() {
                [] => Err(not_found()),
                [one] => Ok(one.parse()?),
                _ => Err(PortalError::Ambiguous {
                    kind: prefix.noun(),
                    reference: input.to_string(),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests;
