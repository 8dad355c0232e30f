#![doc = include_str!("../README.md")]
#![deny(missing_docs)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use qsa_interface::{ErrorCode, WorkflowError, WorkflowResult};
use rusqlite::{Connection, Transaction, TransactionBehavior};

mod migrations;

pub use migrations::SCHEMA_VERSION;

/// Handle to the embedded engraving database.
///
/// All writers serialize on the inner mutex; combined with SQLite's
/// immediate transactions this is the deployment's table-level write lock.
/// Clones share the same connection.
#[derive(Clone)]
pub struct EngraveDb {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for EngraveDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngraveDb").finish_non_exhaustive()
    }
}

impl EngraveDb {
    /// Opens (creating if necessary) the database at `path` and brings the
    /// schema up to [`SCHEMA_VERSION`].
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        Self::setup(conn)
    }

    /// An in-memory database with the full schema, for tests.
    pub fn in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::setup(conn)
    }

    fn setup(conn: Connection) -> anyhow::Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        migrations::apply(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs a read-only closure against the connection.
    pub fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> WorkflowResult<T>,
    ) -> WorkflowResult<T> {
        let conn = self.conn.lock().unwrap();
        f(&conn)
    }

    /// Runs a closure inside one immediate (write-locking) transaction.
    ///
    /// The transaction commits iff the closure returns `Ok`; any error
    /// rolls everything back. Immediate mode acquires the write lock up
    /// front, so concurrent reservers serialize here and each sees the
    /// previous caller's committed rows.
    pub fn with_tx<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> WorkflowResult<T>,
    ) -> WorkflowResult<T> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(map_sqlite_error)?;
        let value = f(&tx)?;
        tx.commit().map_err(|e| {
            WorkflowError::retryable(
                ErrorCode::TransactionFailed,
                format!("commit failed: {}", e),
            )
        })?;
        Ok(value)
    }
}

/// Wraps a driver error into the domain taxonomy. Lock contention maps to
/// a retryable transaction failure; everything else is terminal.
pub fn map_sqlite_error(e: rusqlite::Error) -> WorkflowError {
    use rusqlite::ffi::ErrorCode as SqliteCode;
    match &e {
        rusqlite::Error::SqliteFailure(inner, _)
            if matches!(
                inner.code,
                SqliteCode::DatabaseBusy | SqliteCode::DatabaseLocked
            ) =>
        {
            WorkflowError::retryable(ErrorCode::TransactionFailed, format!("database busy: {}", e))
        }
        rusqlite::Error::QueryReturnedNoRows => WorkflowError::not_found("record not found"),
        _ => WorkflowError::new(ErrorCode::TransactionFailed, format!("storage error: {}", e)),
    }
}

/// Extension mapping driver results into the domain taxonomy with a chosen
/// failure code.
pub trait SqlResultExt<T> {
    /// Maps `Err` to a `WorkflowError` with `code`, keeping busy/locked
    /// failures retryable.
    fn storage(self, code: ErrorCode) -> WorkflowResult<T>;
}

impl<T> SqlResultExt<T> for Result<T, rusqlite::Error> {
    fn storage(self, code: ErrorCode) -> WorkflowResult<T> {
        self.map_err(|e| {
            let mapped = map_sqlite_error(e);
            if mapped.retryable || mapped.code == ErrorCode::NotFound {
                mapped
            } else {
                WorkflowError::new(code, mapped.message)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_applies_schema() {
        let dir = tempfile::tempdir().unwrap();
        let db = EngraveDb::open(dir.path().join("engrave.db")).unwrap();
        let version: i64 = db
            .with_conn(|conn| {
                conn.query_row("PRAGMA user_version", [], |row| row.get(0))
                    .storage(ErrorCode::TransactionFailed)
            })
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION as i64);
    }

    #[test]
    fn reopen_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engrave.db");
        drop(EngraveDb::open(&path).unwrap());
        // Second open must not re-run migrations or fail.
        let db = EngraveDb::open(&path).unwrap();
        db.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM serials", [], |row| row.get::<_, i64>(0))
                .storage(ErrorCode::TransactionFailed)
        })
        .unwrap();
    }

    #[test]
    fn failed_tx_rolls_back() {
        let db = EngraveDb::in_memory().unwrap();
        let result: WorkflowResult<()> = db.with_tx(|tx| {
            tx.execute(
                "INSERT INTO design_sequences (design, current_sequence) VALUES ('CUBE', 1)",
                [],
            )
            .storage(ErrorCode::InsertFailed)?;
            Err(WorkflowError::internal("boom"))
        });
        assert!(result.is_err());

        let count: i64 = db
            .with_conn(|conn| {
                conn.query_row("SELECT COUNT(*) FROM design_sequences", [], |row| row.get(0))
                    .storage(ErrorCode::TransactionFailed)
            })
            .unwrap();
        assert_eq!(count, 0);
    }
}
