//! SQLite-backed transactional store shared by every queue component.
//!
//! All writes run inside `BEGIN IMMEDIATE` transactions: the write lock is
//! taken before the first read, so every guard check made inside a
//! [`SqliteQueueStore::write`] closure sees state no other writer can change
//! until commit.

mod schema;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::error::QueueError;

/// Format used for the calendar day column.
pub const SERVICE_DAY_FORMAT: &str = "%Y-%m-%d";

/// SQLite-backed queue store.
pub struct SqliteQueueStore {
    conn: Mutex<Connection>,
}

impl SqliteQueueStore {
    /// Open (or create) a database file and make sure the schema exists.
    pub fn new(path: &Path, config: &DatabaseConfig) -> Result<Self, QueueError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(config.busy_timeout())?;

        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(path = %path.display(), journal_mode = %mode, "Opened queue database");

        Self::prepare(conn)
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, QueueError> {
        let conn = Connection::open_in_memory()?;
        Self::prepare(conn)
    }

    fn prepare(conn: Connection) -> Result<Self, QueueError> {
        conn.pragma_update(None, "foreign_keys", true)?;
        schema::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, QueueError> {
        self.conn
            .lock()
            .map_err(|_| QueueError::Database("store connection mutex poisoned".to_string()))
    }

    /// Run `f` inside one immediate transaction.
    ///
    /// Commits when `f` returns `Ok`; any error drops the transaction, which
    /// rolls it back.
    pub fn write<T, F>(&self, f: F) -> Result<T, QueueError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, QueueError>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Run `f` against the connection without opening a write transaction.
    pub fn read<T, F>(&self, f: F) -> Result<T, QueueError>
    where
        F: FnOnce(&Connection) -> Result<T, QueueError>,
    {
        let conn = self.lock()?;
        f(&conn)
    }
}

/// Encode an instant with fixed microsecond precision so text order matches time order.
pub(crate) fn encode_ts(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn encode_day(day: NaiveDate) -> String {
    day.format(SERVICE_DAY_FORMAT).to_string()
}

/// Read a timestamp column.
pub(crate) fn ts_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(idx, &raw)
}

/// Read a nullable timestamp column.
pub(crate) fn opt_ts_column(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_ts(idx, &s)).transpose()
}

pub(crate) fn day_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, SERVICE_DAY_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
