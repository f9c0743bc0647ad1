//! SQLite driver.

use rusqlite::ErrorCode;
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Connection, OpenFlags, ToSql};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use super::backend::{Connector, NativeConnection, QueryOutput};
use super::engine::ConnectionParameters;
use super::error::{NativeError, NativeErrorKind};
use super::value::{SqlValue, ISO_DATETIME};
use super::DatabaseType;

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            SqlValue::Integer(v) => ToSqlOutput::Owned(Value::Integer(*v)),
            SqlValue::Real(v) => ToSqlOutput::Owned(Value::Real(*v)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            SqlValue::DateTime(dt) => {
                ToSqlOutput::Owned(Value::Text(dt.format(ISO_DATETIME).to_string()))
            }
        })
    }
}

fn from_value_ref(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(v) => SqlValue::Integer(v),
        ValueRef::Real(v) => SqlValue::Real(v),
        ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
    }
}

/// BUSY and LOCKED are transient; everything else is a statement error.
/// SQLite never reports a connection error.
fn native_error(error: rusqlite::Error) -> NativeError {
    match &error {
        rusqlite::Error::SqliteFailure(failure, message) => {
            let kind = match failure.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => NativeErrorKind::Busy,
                _ => NativeErrorKind::Statement,
            };
            NativeError {
                kind,
                code: Some(failure.extended_code & 0xff),
                driver_text: error.to_string(),
                database_text: message.clone().unwrap_or_else(|| failure.to_string()),
            }
        }
        _ => NativeError::statement(error.to_string()),
    }
}

fn is_insert(sql: &str) -> bool {
    let head = sql.trim_start();
    head.get(..6).is_some_and(|h| h.eq_ignore_ascii_case("INSERT"))
        || head.get(..7).is_some_and(|h| h.eq_ignore_ascii_case("REPLACE"))
}

/// Opens shared-cache SQLite connections with the busy handler disabled;
/// lock waits are handled by the engine's retry loop.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteConnector;

impl Connector for SqliteConnector {
    fn connect(
        &self,
        parameters: &ConnectionParameters,
    ) -> Result<Box<dyn NativeConnection>, NativeError> {
        Ok(Box::new(SqliteConnection::open(parameters)?))
    }
}

pub struct SqliteConnection {
    conn: Connection,
}

impl SqliteConnection {
    pub fn open(parameters: &ConnectionParameters) -> Result<Self, NativeError> {
        let path = PathBuf::from(&parameters.database_name);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    NativeError::statement(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
        }

        let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
            | OpenFlags::SQLITE_OPEN_SHARED_CACHE;
        let mut busy_timeout = Duration::ZERO;

        for (key, value) in parameters.options() {
            match key.as_str() {
                "OPEN_READONLY" => {
                    flags.remove(OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE);
                    flags.insert(OpenFlags::SQLITE_OPEN_READ_ONLY);
                }
                "ENABLE_SHARED_CACHE" => flags.insert(OpenFlags::SQLITE_OPEN_SHARED_CACHE),
                "DISABLE_SHARED_CACHE" => {
                    flags.remove(OpenFlags::SQLITE_OPEN_SHARED_CACHE);
                    flags.insert(OpenFlags::SQLITE_OPEN_PRIVATE_CACHE);
                }
                "BUSY_TIMEOUT" => match value.as_deref().map(str::parse::<u64>) {
                    Some(Ok(ms)) => busy_timeout = Duration::from_millis(ms),
                    _ => warn!("Ignoring BUSY_TIMEOUT without a millisecond value"),
                },
                other => warn!("Ignoring unknown SQLite connect option {}", other),
            }
        }

        let conn = Connection::open_with_flags(&path, flags).map_err(native_error)?;
        conn.busy_timeout(busy_timeout).map_err(native_error)?;
        conn.set_prepared_statement_cache_capacity(64);
        Ok(Self { conn })
    }
}

impl NativeConnection for SqliteConnection {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    fn is_open(&self) -> bool {
        true
    }

    fn prepare(&mut self, sql: &str) -> Result<(), NativeError> {
        self.conn.prepare_cached(sql).map(|_| ()).map_err(native_error)
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<QueryOutput, NativeError> {
        let mut stmt = self.conn.prepare_cached(sql).map_err(native_error)?;
        let columns = stmt.column_count();
        let mut values = Vec::new();
        {
            let mut rows = stmt.query(params_from_iter(params.iter())).map_err(native_error)?;
            while let Some(row) = rows.next().map_err(native_error)? {
                for i in 0..columns {
                    values.push(from_value_ref(row.get_ref(i).map_err(native_error)?));
                }
            }
        }
        drop(stmt);

        let rows_affected = self.conn.changes() as u64;
        let last_insert_id = if is_insert(sql) && rows_affected > 0 {
            Some(self.conn.last_insert_rowid())
        } else {
            None
        };
        Ok(QueryOutput {
            values,
            columns,
            last_insert_id,
            rows_affected,
        })
    }

    fn execute_many(&mut self, sql: &str, rows: &[Vec<SqlValue>]) -> Result<u64, NativeError> {
        let mut stmt = self.conn.prepare_cached(sql).map_err(native_error)?;
        let mut affected = 0u64;
        for row in rows {
            affected += stmt.execute(params_from_iter(row.iter())).map_err(native_error)? as u64;
        }
        Ok(affected)
    }

    fn execute_direct(&mut self, sql: &str) -> Result<(), NativeError> {
        self.conn.execute_batch(sql).map_err(native_error)
    }

    fn begin(&mut self) -> Result<(), NativeError> {
        self.conn.execute_batch("BEGIN").map_err(native_error)
    }

    fn commit(&mut self) -> Result<(), NativeError> {
        self.conn.execute_batch("COMMIT").map_err(native_error)
    }

    fn rollback(&mut self) -> Result<(), NativeError> {
        self.conn.execute_batch("ROLLBACK").map_err(native_error)
    }

    fn tables(&mut self) -> Result<Vec<String>, NativeError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .map_err(native_error)?;
        let tables = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(native_error)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open(dir: &std::path::Path) -> SqliteConnection {
        SqliteConnection::open(&ConnectionParameters::sqlite(dir.join("nested/core.db"))).unwrap()
    }

    #[test]
    fn test_query_flattens_rows_and_reports_insert_id() {
        let dir = tempdir().unwrap();
        let mut conn = open(dir.path());
        conn.execute_direct("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT, size REAL)")
            .unwrap();

        let inserted = conn
            .query(
                "INSERT INTO t (name, size) VALUES (?, ?)",
                &[SqlValue::from("a"), SqlValue::Real(1.5)],
            )
            .unwrap();
        assert_eq!(inserted.last_insert_id, Some(1));

        let rows = conn.query("SELECT id, name, size FROM t", &[]).unwrap();
        assert_eq!(rows.columns, 3);
        assert_eq!(
            rows.values,
            vec![SqlValue::Integer(1), SqlValue::from("a"), SqlValue::Real(1.5)]
        );
        assert_eq!(rows.last_insert_id, None);
    }

    #[test]
    fn test_constraint_violation_is_a_statement_error() {
        let dir = tempdir().unwrap();
        let mut conn = open(dir.path());
        conn.execute_direct("CREATE TABLE t (k TEXT UNIQUE)").unwrap();
        conn.query("INSERT INTO t VALUES (?)", &[SqlValue::from("x")]).unwrap();
        let err = conn
            .query("INSERT INTO t VALUES (?)", &[SqlValue::from("x")])
            .unwrap_err();
        assert_eq!(err.kind, NativeErrorKind::Statement);
        assert_eq!(err.code, Some(19));
    }

    #[test]
    fn test_writer_contention_is_busy() {
        let dir = tempdir().unwrap();
        let params = ConnectionParameters {
            connect_options: "DISABLE_SHARED_CACHE".into(),
            ..ConnectionParameters::sqlite(dir.path().join("core.db"))
        };
        let mut first = SqliteConnection::open(&params).unwrap();
        let mut second = SqliteConnection::open(&params).unwrap();
        first.execute_direct("CREATE TABLE t (v INTEGER)").unwrap();

        first.execute_direct("BEGIN IMMEDIATE").unwrap();
        first.query("INSERT INTO t VALUES (1)", &[]).unwrap();
        let err = second.execute_direct("BEGIN IMMEDIATE").unwrap_err();
        assert_eq!(err.kind, NativeErrorKind::Busy);
        assert_eq!(err.code, Some(5));
        first.commit().unwrap();
    }
}
