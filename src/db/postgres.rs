//! PostgreSQL driver.
//!
//! Statements are written with `?` markers; they are renumbered to `$n`
//! before reaching the server. Values convert to whatever type the server
//! inferred for each parameter.

use bytes::BytesMut;
use postgres::error::SqlState;
use postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use postgres::{Client, NoTls, Row};
use std::error::Error;
use std::time::Duration;
use tracing::warn;

use super::backend::{Connector, NativeConnection, QueryOutput};
use super::engine::ConnectionParameters;
use super::error::{NativeError, NativeErrorKind};
use super::value::{SqlValue, ISO_DATETIME};
use super::DatabaseType;

type BoxError = Box<dyn Error + Sync + Send>;

fn integer_to_sql(v: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if *ty == Type::INT8 {
        v.to_sql(ty, out)
    } else if *ty == Type::INT4 {
        i32::try_from(v)?.to_sql(ty, out)
    } else if *ty == Type::INT2 {
        i16::try_from(v)?.to_sql(ty, out)
    } else if *ty == Type::FLOAT8 {
        (v as f64).to_sql(ty, out)
    } else if *ty == Type::FLOAT4 {
        (v as f32).to_sql(ty, out)
    } else if *ty == Type::BOOL {
        (v != 0).to_sql(ty, out)
    } else {
        v.to_string().to_sql(ty, out)
    }
}

fn real_to_sql(v: f64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if *ty == Type::FLOAT8 {
        v.to_sql(ty, out)
    } else if *ty == Type::FLOAT4 {
        (v as f32).to_sql(ty, out)
    } else if *ty == Type::INT8 {
        (v as i64).to_sql(ty, out)
    } else {
        v.to_string().to_sql(ty, out)
    }
}

fn text_to_sql(v: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if *ty == Type::INT8 {
        v.trim().parse::<i64>()?.to_sql(ty, out)
    } else if *ty == Type::INT4 {
        v.trim().parse::<i32>()?.to_sql(ty, out)
    } else if *ty == Type::FLOAT8 {
        v.trim().parse::<f64>()?.to_sql(ty, out)
    } else {
        v.to_sql(ty, out)
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Integer(v) => integer_to_sql(*v, ty, out),
            SqlValue::Real(v) => real_to_sql(*v, ty, out),
            SqlValue::Text(s) => text_to_sql(s, ty, out),
            SqlValue::Blob(b) => b.as_slice().to_sql(ty, out),
            SqlValue::DateTime(dt) => text_to_sql(&dt.format(ISO_DATETIME).to_string(), ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn read_column(row: &Row, idx: usize, ty: &Type) -> Result<SqlValue, postgres::Error> {
    let value = if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx)?.map(SqlValue::Integer)
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)?.map(|v| SqlValue::Integer(v.into()))
    } else if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)?.map(|v| SqlValue::Integer(v.into()))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx)?.map(SqlValue::Real)
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)?.map(|v| SqlValue::Real(v.into()))
    } else if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx)?.map(SqlValue::from)
    } else if *ty == Type::BYTEA {
        row.try_get::<_, Option<Vec<u8>>>(idx)?.map(SqlValue::Blob)
    } else {
        row.try_get::<_, Option<String>>(idx).unwrap_or(None).map(SqlValue::Text)
    };
    Ok(value.unwrap_or(SqlValue::Null))
}

fn native_error(error: postgres::Error) -> NativeError {
    let io_failure = error
        .source()
        .is_some_and(|source| source.downcast_ref::<std::io::Error>().is_some());
    let (kind, database_text) = match error.as_db_error() {
        Some(db) => {
            let code = db.code();
            let lost = code.code().starts_with("08")
                || *code == SqlState::ADMIN_SHUTDOWN
                || *code == SqlState::CRASH_SHUTDOWN;
            let kind = if lost {
                NativeErrorKind::Connection
            } else {
                NativeErrorKind::Statement
            };
            (kind, format!("{} [{}]", db.message(), code.code()))
        }
        None if error.is_closed() || io_failure => (NativeErrorKind::Connection, error.to_string()),
        None => (NativeErrorKind::Statement, error.to_string()),
    };
    NativeError {
        kind,
        code: None,
        driver_text: error.to_string(),
        database_text,
    }
}

/// Rewrite `?` markers outside string literals as `$1`, `$2`, ...
pub fn number_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 16);
    let mut in_literal = false;
    let mut n = 0;
    for ch in sql.chars() {
        match ch {
            '\'' => {
                in_literal = !in_literal;
                out.push(ch);
            }
            '?' if !in_literal => {
                n += 1;
                out.push('$');
                out.push_str(&n.to_string());
            }
            _ => out.push(ch),
        }
    }
    out
}

fn is_insert(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .is_some_and(|h| h.eq_ignore_ascii_case("INSERT"))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PgConnector;

impl Connector for PgConnector {
    fn connect(
        &self,
        parameters: &ConnectionParameters,
    ) -> Result<Box<dyn NativeConnection>, NativeError> {
        Ok(Box::new(PgConnection::open(parameters)?))
    }
}

pub struct PgConnection {
    client: Client,
}

impl PgConnection {
    pub fn open(parameters: &ConnectionParameters) -> Result<Self, NativeError> {
        let mut config = postgres::Config::new();
        config
            .host(if parameters.host.is_empty() { "localhost" } else { &parameters.host })
            .port(if parameters.port == 0 { 5432 } else { parameters.port })
            .dbname(&parameters.database_name);
        if !parameters.user.is_empty() {
            config.user(&parameters.user);
        }
        if !parameters.password.is_empty() {
            config.password(&parameters.password);
        }

        for (key, value) in parameters.options() {
            match (key.as_str(), value) {
                ("connect_timeout", Some(secs)) => match secs.parse::<u64>() {
                    Ok(secs) => {
                        config.connect_timeout(Duration::from_secs(secs));
                    }
                    Err(_) => warn!("Ignoring connect_timeout={}", secs),
                },
                ("application_name", Some(name)) => {
                    config.application_name(&name);
                }
                ("options", Some(options)) => {
                    config.options(&options);
                }
                (other, _) => warn!("Ignoring unknown PostgreSQL connect option {}", other),
            }
        }

        let client = config.connect(NoTls).map_err(native_error)?;
        Ok(Self { client })
    }
}

impl NativeConnection for PgConnection {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Postgresql
    }

    fn is_open(&self) -> bool {
        !self.client.is_closed()
    }

    fn prepare(&mut self, sql: &str) -> Result<(), NativeError> {
        self.client
            .prepare(&number_placeholders(sql))
            .map(|_| ())
            .map_err(native_error)
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<QueryOutput, NativeError> {
        let numbered = number_placeholders(sql);
        let stmt = self.client.prepare(&numbered).map_err(native_error)?;
        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
        let columns = stmt.columns().len();

        if columns == 0 {
            let rows_affected = self.client.execute(&stmt, &refs).map_err(native_error)?;
            return Ok(QueryOutput {
                rows_affected,
                ..QueryOutput::default()
            });
        }

        let rows = self.client.query(&stmt, &refs).map_err(native_error)?;
        let mut values = Vec::with_capacity(rows.len() * columns);
        for row in &rows {
            for (idx, column) in stmt.columns().iter().enumerate() {
                values.push(read_column(row, idx, column.type_()).map_err(native_error)?);
            }
        }

        let returns_id = stmt.columns().first().is_some_and(|c| c.name() == "id");
        let last_insert_id = if is_insert(sql) && returns_id {
            values.first().and_then(SqlValue::as_i64)
        } else {
            None
        };
        Ok(QueryOutput {
            values,
            columns,
            last_insert_id,
            rows_affected: rows.len() as u64,
        })
    }

    fn execute_many(&mut self, sql: &str, rows: &[Vec<SqlValue>]) -> Result<u64, NativeError> {
        let stmt = self
            .client
            .prepare(&number_placeholders(sql))
            .map_err(native_error)?;
        let mut affected = 0;
        for row in rows {
            let refs: Vec<&(dyn ToSql + Sync)> = row.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
            affected += self.client.execute(&stmt, &refs).map_err(native_error)?;
        }
        Ok(affected)
    }

    fn execute_direct(&mut self, sql: &str) -> Result<(), NativeError> {
        self.client.batch_execute(sql).map_err(native_error)
    }

    fn begin(&mut self) -> Result<(), NativeError> {
        self.client.batch_execute("BEGIN").map_err(native_error)
    }

    fn commit(&mut self) -> Result<(), NativeError> {
        self.client.batch_execute("COMMIT").map_err(native_error)
    }

    fn rollback(&mut self) -> Result<(), NativeError> {
        self.client.batch_execute("ROLLBACK").map_err(native_error)
    }

    fn tables(&mut self) -> Result<Vec<String>, NativeError> {
        let rows = self
            .client
            .query(
                "SELECT tablename FROM pg_tables WHERE schemaname = current_schema() ORDER BY tablename",
                &[],
            )
            .map_err(native_error)?;
        Ok(rows.iter().map(|row| row.get::<_, String>(0)).collect())
    }
}
