pub mod actions;
pub mod backend;
pub mod coredb;
pub mod engine;
pub mod error;
mod schema;
pub mod sqlite;
pub mod value;

pub mod postgres_schema;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use backend::{Connector, NativeConnection, QueryOutput};
pub use coredb::CoreDb;
pub use engine::{
    ConnectionParameters, DatabaseType, DbEngine, DbTransaction, EngineStatus, ErrorAnswer,
    ErrorHandler, OperationStatus, RetryPolicy, SqlQuery,
};
pub use error::{DbError, DbResult, NativeError, NativeErrorKind, QueryState};
pub use schema::SCHEMA;
pub use value::SqlValue;

use crate::config::{DatabaseConfig, EngineConfig};

/// Connector that picks the driver from the parameters' database type.
#[derive(Debug, Default, Clone, Copy)]
pub struct Drivers;

impl Connector for Drivers {
    fn connect(
        &self,
        parameters: &ConnectionParameters,
    ) -> Result<Box<dyn NativeConnection>, NativeError> {
        match parameters.database_type {
            DatabaseType::Sqlite => sqlite::SqliteConnector.connect(parameters),
            #[cfg(feature = "postgres")]
            DatabaseType::Postgresql => postgres::PgConnector.connect(parameters),
            #[cfg(not(feature = "postgres"))]
            DatabaseType::Postgresql => Err(NativeError::connection(
                "PostgreSQL support is not compiled in (enable the `postgres` feature)",
            )),
        }
    }
}

/// Open the engine described by the configuration on the calling thread.
pub fn open(database: &DatabaseConfig, engine: &EngineConfig) -> DbResult<DbEngine> {
    let parameters = ConnectionParameters::from(database);
    let db = DbEngine::new(parameters.clone(), Box::new(Drivers), RetryPolicy::from(engine));
    db.open(parameters)?;
    Ok(db)
}
