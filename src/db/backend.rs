//! Native connection abstraction.
//!
//! The engine layer talks to SQLite and PostgreSQL through these two
//! traits. A `Connector` opens one connection per calling thread; a
//! `NativeConnection` runs statements on it and reports failures as
//! classified `NativeError`s so the executor can decide whether to retry,
//! reconnect or give up.

use super::engine::ConnectionParameters;
use super::error::NativeError;
use super::value::SqlValue;
use super::DatabaseType;

/// Rows returned by a native statement, flattened row-major.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    pub values: Vec<SqlValue>,
    pub columns: usize,
    pub last_insert_id: Option<i64>,
    pub rows_affected: u64,
}

impl QueryOutput {
    pub fn rows(&self) -> impl Iterator<Item = &[SqlValue]> {
        let width = self.columns.max(1);
        self.values.chunks(width).filter(move |_| self.columns > 0)
    }

    pub fn row_count(&self) -> usize {
        if self.columns == 0 {
            0
        } else {
            self.values.len() / self.columns
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn first_value(&self) -> Option<&SqlValue> {
        self.values.first()
    }

    /// First column of every row as integers.
    pub fn ids(&self) -> Vec<i64> {
        self.rows().filter_map(|row| row[0].as_i64()).collect()
    }

    /// First column of every row as text.
    pub fn strings(&self) -> Vec<String> {
        self.rows().map(|row| row[0].to_text()).collect()
    }
}

/// Opens native connections for a set of connection parameters.
pub trait Connector: Send + Sync {
    fn connect(&self, parameters: &ConnectionParameters)
        -> Result<Box<dyn NativeConnection>, NativeError>;
}

/// A single open connection, owned by exactly one thread at a time.
pub trait NativeConnection: Send {
    fn database_type(&self) -> DatabaseType;

    fn is_open(&self) -> bool;

    /// Check that `sql` compiles on this connection.
    fn prepare(&mut self, sql: &str) -> Result<(), NativeError>;

    /// Run a prepared statement with positional `?` parameters.
    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<QueryOutput, NativeError>;

    /// Run the same prepared statement once per row of parameters.
    fn execute_many(&mut self, sql: &str, rows: &[Vec<SqlValue>]) -> Result<u64, NativeError>;

    /// Run one or more statements without preparing or binding.
    fn execute_direct(&mut self, sql: &str) -> Result<(), NativeError>;

    fn begin(&mut self) -> Result<(), NativeError>;

    fn commit(&mut self) -> Result<(), NativeError>;

    fn rollback(&mut self) -> Result<(), NativeError>;

    fn tables(&mut self) -> Result<Vec<String>, NativeError>;
}
