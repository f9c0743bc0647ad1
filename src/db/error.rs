//! Error types for the database engine layer.

use std::fmt;
use thiserror::Error;

/// Outcome classification of an executed statement or action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    NoErrors,
    SqlError,
    ConnectionError,
}

impl QueryState {
    pub fn of<T>(result: &Result<T, DbError>) -> Self {
        match result {
            Ok(_) => QueryState::NoErrors,
            Err(e) => e.state(),
        }
    }
}

/// How a driver classified a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeErrorKind {
    /// Transient lock contention (SQLite BUSY/LOCKED).
    Busy,
    /// The connection to the server was lost or could not be made.
    Connection,
    /// Anything else reported by the engine.
    Statement,
}

/// A failure as reported by a native driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeError {
    pub kind: NativeErrorKind,
    pub code: Option<i32>,
    pub driver_text: String,
    pub database_text: String,
}

impl NativeError {
    pub fn new(kind: NativeErrorKind, code: Option<i32>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            kind,
            code,
            driver_text: text.clone(),
            database_text: text,
        }
    }

    pub fn busy(text: impl Into<String>) -> Self {
        Self::new(NativeErrorKind::Busy, Some(5), text)
    }

    pub fn connection(text: impl Into<String>) -> Self {
        Self::new(NativeErrorKind::Connection, None, text)
    }

    pub fn statement(text: impl Into<String>) -> Self {
        Self::new(NativeErrorKind::Statement, None, text)
    }

    pub fn not_open() -> Self {
        Self::connection("database connection is not open")
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {})", self.database_text, code),
            None => f.write_str(&self.database_text),
        }
    }
}

impl std::error::Error for NativeError {}

#[derive(Debug, Clone, Error)]
pub enum DbError {
    #[error("SQL error: {error} [{sql}]")]
    Sql { error: NativeError, sql: String },

    #[error("connection error: {error}")]
    Connection { error: NativeError, sql: String },

    /// A defect in the catalog or in a caller's binding map.
    #[error("setup error: {0}")]
    Setup(String),

    #[error("queries aborted after a connection error")]
    Aborted,

    #[error("database is locked, gave up after {retries} retries")]
    LockTimeout { retries: u32, sql: String },

    #[error("database engine is unavailable")]
    Unavailable,
}

impl DbError {
    pub fn from_native(error: NativeError, sql: &str) -> Self {
        match error.kind {
            NativeErrorKind::Connection => DbError::Connection {
                error,
                sql: sql.to_string(),
            },
            _ => DbError::Sql {
                error,
                sql: sql.to_string(),
            },
        }
    }

    pub fn state(&self) -> QueryState {
        match self {
            DbError::Connection { .. } | DbError::Unavailable => QueryState::ConnectionError,
            _ => QueryState::SqlError,
        }
    }

    pub fn native(&self) -> Option<&NativeError> {
        match self {
            DbError::Sql { error, .. } | DbError::Connection { error, .. } => Some(error),
            _ => None,
        }
    }
}

pub type DbResult<T> = std::result::Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_state_classification() {
        let ok: DbResult<()> = Ok(());
        assert_eq!(QueryState::of(&ok), QueryState::NoErrors);

        let conn = DbError::from_native(NativeError::connection("gone"), "SELECT 1");
        assert_eq!(conn.state(), QueryState::ConnectionError);

        let busy = DbError::from_native(NativeError::busy("database is locked"), "SELECT 1");
        assert_eq!(busy.state(), QueryState::SqlError);
        assert_eq!(DbError::Setup("x".into()).state(), QueryState::SqlError);
    }
}
