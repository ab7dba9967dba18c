//! Relational counter backend (SQLite)
//!
//! The counter is one row of
//!
//! ```sql
//! CREATE TABLE user_counter (
//!     user_id INTEGER PRIMARY KEY,
//!     counter INTEGER NOT NULL DEFAULT 0,
//!     version INTEGER NOT NULL DEFAULT 0
//! )
//! ```
//!
//! [`SqlCounter`] is the store; it hands out one [`SqlSession`] (one
//! connection) per worker. Sessions expose the individual statements the
//! relational scenarios are built from, so each scenario's exact sequence of
//! reads, writes and locks stays visible at the call site.
//!
//! The database runs in WAL journal mode. Under WAL a deferred transaction
//! that read a value and then tries to write after another connection
//! committed fails with `SQLITE_BUSY_SNAPSHOT`; that is SQLite's
//! serialization failure and is classified as a transient conflict.

use crate::traits::CounterStore;
use rusqlite::{params, Connection, ErrorCode, OpenFlags, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tally_core::{BackendKind, CounterState, Error, Result};

/// Default longest wait on a locked database per statement
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS user_counter (
    user_id INTEGER PRIMARY KEY,
    counter INTEGER NOT NULL DEFAULT 0,
    version INTEGER NOT NULL DEFAULT 0
)";

/// Map a rusqlite error onto the fault taxonomy
pub fn classify(e: rusqlite::Error) -> Error {
    match &e {
        rusqlite::Error::SqliteFailure(failure, message) => match failure.code {
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                Error::TransientConflict(e.to_string())
            }
            ErrorCode::CannotOpen | ErrorCode::NotADatabase | ErrorCode::PermissionDenied => {
                Error::BackendUnavailable(e.to_string())
            }
            _ if message
                .as_deref()
                .is_some_and(|m| m.contains("no such table")) =>
            {
                Error::ConfigurationFault(format!("{}; run prepare first", e))
            }
            _ => Error::Storage(e.to_string()),
        },
        rusqlite::Error::QueryReturnedNoRows => {
            Error::ConfigurationFault("counter row missing; run prepare first".into())
        }
        _ => Error::Storage(e.to_string()),
    }
}

fn to_column(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| Error::Storage(format!("counter {} exceeds INTEGER", value)))
}

fn from_column(value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| Error::Storage(format!("negative counter {}", value)))
}

/// How a transaction acquires its locks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Locks taken lazily; a write after a stale read aborts
    Deferred,
    /// Write lock taken at BEGIN, before any read
    Immediate,
}

impl From<LockMode> for TransactionBehavior {
    fn from(mode: LockMode) -> Self {
        match mode {
            LockMode::Deferred => TransactionBehavior::Deferred,
            LockMode::Immediate => TransactionBehavior::Immediate,
        }
    }
}

/// Counter row in a SQLite database
#[derive(Debug, Clone)]
pub struct SqlCounter {
    path: PathBuf,
    user_id: i64,
    busy_timeout: Duration,
}

impl SqlCounter {
    /// Counter row `user_id` in the database at `path`
    pub fn new(path: impl Into<PathBuf>, user_id: i64) -> Self {
        Self {
            path: path.into(),
            user_id,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// Override the per-statement lock wait bound
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Key of the counter row
    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    /// Open a new connection to an already prepared database
    pub fn connect(&self) -> Result<SqlSession> {
        if !self.path.exists() {
            return Err(Error::ConfigurationFault(format!(
                "database {} missing; run prepare first",
                self.path.display()
            )));
        }
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(classify)?;
        conn.busy_timeout(self.busy_timeout).map_err(classify)?;
        Ok(SqlSession {
            conn,
            user_id: self.user_id,
        })
    }
}

impl CounterStore for SqlCounter {
    fn kind(&self) -> BackendKind {
        BackendKind::Sql
    }

    fn prepare(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&self.path).map_err(classify)?;
        conn.busy_timeout(self.busy_timeout).map_err(classify)?;
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(classify)?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(classify)?;
        conn.execute_batch(CREATE_TABLE).map_err(classify)?;
        let inserted = conn
            .execute(
                "INSERT INTO user_counter (user_id, counter, version) VALUES (?1, 0, 0)
                 ON CONFLICT (user_id) DO NOTHING",
                params![self.user_id],
            )
            .map_err(classify)?;
        tracing::debug!(
            path = %self.path.display(),
            user_id = self.user_id,
            journal_mode = %mode,
            seeded = inserted == 1,
            "prepared counter table"
        );
        Ok(())
    }

    fn read(&self) -> Result<CounterState> {
        self.connect()?.select_state()
    }

    fn increment(&self) -> Result<u64> {
        self.connect()?.increment_in_place()
    }

    fn reset(&self, value: u64) -> Result<()> {
        let session = self.connect()?;
        let changed = session
            .conn
            .execute(
                "UPDATE user_counter SET counter = ?1, version = 0 WHERE user_id = ?2",
                params![to_column(value)?, self.user_id],
            )
            .map_err(classify)?;
        if changed == 0 {
            return Err(classify(rusqlite::Error::QueryReturnedNoRows));
        }
        Ok(())
    }
}

fn select_counter(conn: &Connection, user_id: i64) -> Result<u64> {
    let value: i64 = conn
        .query_row(
            "SELECT counter FROM user_counter WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )
        .map_err(classify)?;
    from_column(value)
}

fn select_state(conn: &Connection, user_id: i64) -> Result<CounterState> {
    let (value, version): (i64, i64) = conn
        .query_row(
            "SELECT counter, version FROM user_counter WHERE user_id = ?1",
            params![user_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map_err(classify)?;
    Ok(CounterState::versioned(
        from_column(value)?,
        from_column(version)?,
    ))
}

fn write_counter(conn: &Connection, user_id: i64, value: u64) -> Result<()> {
    let changed = conn
        .execute(
            "UPDATE user_counter SET counter = ?1, version = version + 1 WHERE user_id = ?2",
            params![to_column(value)?, user_id],
        )
        .map_err(classify)?;
    if changed == 0 {
        return Err(classify(rusqlite::Error::QueryReturnedNoRows));
    }
    Ok(())
}

/// One connection to the counter database
///
/// Statements outside [`SqlSession::transaction`] run in autocommit mode.
pub struct SqlSession {
    conn: Connection,
    user_id: i64,
}

impl SqlSession {
    /// `SELECT counter`
    pub fn select_counter(&self) -> Result<u64> {
        select_counter(&self.conn, self.user_id)
    }

    /// `SELECT counter, version`
    pub fn select_state(&self) -> Result<CounterState> {
        select_state(&self.conn, self.user_id)
    }

    /// Unconditional `UPDATE … SET counter = ?`
    pub fn write_counter(&self, value: u64) -> Result<()> {
        write_counter(&self.conn, self.user_id, value)
    }

    /// `UPDATE … SET counter = counter + 1 … RETURNING counter`
    ///
    /// One statement; the row's write lock covers the whole increment.
    pub fn increment_in_place(&self) -> Result<u64> {
        let value: i64 = self
            .conn
            .query_row(
                "UPDATE user_counter SET counter = counter + 1, version = version + 1
                 WHERE user_id = ?1 RETURNING counter",
                params![self.user_id],
                |row| row.get(0),
            )
            .map_err(classify)?;
        from_column(value)
    }

    /// Write `value` only if the row still carries `version`
    ///
    /// Returns `false` when another writer got there first.
    pub fn update_if_version(&self, value: u64, version: u64) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE user_counter SET counter = ?1, version = ?2
                 WHERE user_id = ?3 AND version = ?4",
                params![
                    to_column(value)?,
                    to_column(version + 1)?,
                    self.user_id,
                    to_column(version)?
                ],
            )
            .map_err(classify)?;
        Ok(changed == 1)
    }

    /// Begin an explicit transaction
    ///
    /// The transaction rolls back when dropped without
    /// [`SqlTransaction::commit`], releasing its locks on every exit path.
    pub fn transaction(&mut self, mode: LockMode) -> Result<SqlTransaction<'_>> {
        let tx = self
            .conn
            .transaction_with_behavior(mode.into())
            .map_err(classify)?;
        Ok(SqlTransaction {
            tx,
            user_id: self.user_id,
        })
    }
}

/// Open transaction on a [`SqlSession`]
pub struct SqlTransaction<'a> {
    tx: Transaction<'a>,
    user_id: i64,
}

impl SqlTransaction<'_> {
    /// `SELECT counter` inside the transaction
    pub fn select_counter(&self) -> Result<u64> {
        select_counter(&self.tx, self.user_id)
    }

    /// `UPDATE … SET counter = ?` inside the transaction
    pub fn write_counter(&self, value: u64) -> Result<()> {
        write_counter(&self.tx, self.user_id, value)
    }

    /// Commit, releasing all locks
    pub fn commit(self) -> Result<()> {
        self.tx.commit().map_err(classify)
    }
}
