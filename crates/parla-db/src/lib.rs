//! # parla-db
//!
//! Ledger store for the Parla daemon.
//! Manages the single SQLite database at `$PARLA_DATA_DIR/parla.db`.
//!
//! ## Schema
//!
//! - WAL mode mandatory
//! - Foreign keys enforced
//! - All timestamps are Unix epoch seconds (u64)
//! - All money is integer cents
//! - Schema version stored in `PRAGMA user_version`
//!
//! Query functions take `&Connection`, so they run unchanged inside a
//! [`rusqlite::Transaction`] (which derefs to `Connection`). Mutating workflows
//! wrap their writes in [`immediate`].

pub mod migrations;
pub mod queries;
pub mod schema;

use std::path::Path;
use std::str::FromStr;

use rusqlite::{Connection, ErrorCode, TransactionBehavior};

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Database error types.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Open or create the Parla database at the given path.
///
/// Configures WAL mode, foreign keys, and runs any pending migrations.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Open an in-memory database (for testing).
pub fn open_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Configure SQLite pragmas. `busy_timeout` doubles as the statement timeout for
/// writers waiting on the database lock.
fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;
         PRAGMA cache_size = -8000;",
    )?;
    Ok(())
}

/// Run `f` inside a `BEGIN IMMEDIATE` transaction.
///
/// The write lock is taken before the first read, so two workflows touching the
/// same ancestor chain serialize instead of reading stale aggregates. Commits when
/// `f` returns `Ok`; any `Err` drops the transaction, which rolls it back.
pub fn immediate<T, E, F>(conn: &mut Connection, f: F) -> std::result::Result<T, E>
where
    E: From<DbError>,
    F: FnOnce(&Connection) -> std::result::Result<T, E>,
{
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(DbError::from)?;
    let value = f(&*tx)?;
    tx.commit().map_err(DbError::from)?;
    Ok(value)
}

/// Whether a SQLite error is a UNIQUE/CHECK/FOREIGN KEY violation.
pub fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

/// Map a constraint violation to [`DbError::Constraint`], passing other errors through.
pub(crate) fn constraint(err: rusqlite::Error, what: impl Into<String>) -> DbError {
    if is_constraint_violation(&err) {
        DbError::Constraint(what.into())
    } else {
        DbError::Sqlite(err)
    }
}

/// Map `QueryReturnedNoRows` to [`DbError::NotFound`].
pub(crate) fn not_found(err: rusqlite::Error, what: impl Into<String>) -> DbError {
    match err {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(what.into()),
        other => DbError::Sqlite(other),
    }
}

/// Read a TEXT column into a `FromStr` domain enum.
pub(crate) fn parse_col<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Read a nullable TEXT column into an optional domain enum.
pub(crate) fn parse_opt_col<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        t.parse().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_memory() {
        let conn = open_memory().expect("open in-memory db");
        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .expect("get user_version");
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_wal_mode() {
        let conn = open_memory().expect("open");
        let mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .expect("get journal_mode");
        // In-memory databases use "memory" mode, not WAL
        assert!(mode == "wal" || mode == "memory");
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let conn = open_memory().expect("open");
        let fk: i32 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .expect("get foreign_keys");
        assert_eq!(fk, 1);
    }

    #[test]
    fn test_immediate_rolls_back_on_error() {
        let mut conn = open_memory().expect("open");
        let result: Result<()> = immediate(&mut conn, |tx| {
            queries::settings::set(tx, "probe", "written")?;
            Err(DbError::Constraint("abort".into()))
        });
        assert!(result.is_err());
        assert!(matches!(
            queries::settings::get(&conn, "probe"),
            Err(DbError::NotFound(_))
        ));
    }

    #[test]
    fn test_immediate_commits_on_ok() {
        let mut conn = open_memory().expect("open");
        immediate::<_, DbError, _>(&mut conn, |tx| queries::settings::set(tx, "probe", "kept"))
            .expect("commit");
        assert_eq!(queries::settings::get(&conn, "probe").expect("get"), "kept");
    }
}
