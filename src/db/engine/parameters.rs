//! Connection parameters and retry policy.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// Embedded single-file engine.
    #[default]
    Sqlite,
    /// Client/server engine.
    Postgresql,
}

impl DatabaseType {
    /// Only the client/server engine can lose and regain its connection.
    pub fn reconnect_on_error(self) -> bool {
        matches!(self, DatabaseType::Postgresql)
    }

    pub fn maximum_bound_values(self) -> usize {
        match self {
            DatabaseType::Sqlite => 999,
            DatabaseType::Postgresql => 65535,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DatabaseType::Sqlite => "sqlite",
            DatabaseType::Postgresql => "postgresql",
        }
    }
}

/// Everything needed to open a connection on any thread.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionParameters {
    pub database_type: DatabaseType,
    /// File path for SQLite, database name for PostgreSQL.
    pub database_name: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// `;`-separated `key[=value]` options passed to the driver.
    pub connect_options: String,
}

impl ConnectionParameters {
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            database_type: DatabaseType::Sqlite,
            database_name: path.into().to_string_lossy().into_owned(),
            ..Self::default()
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.database_name.is_empty()
    }

    /// Parsed `connect_options` as `(key, value)` pairs.
    pub fn options(&self) -> Vec<(String, Option<String>)> {
        self.connect_options
            .split(';')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| match entry.split_once('=') {
                Some((key, value)) => (key.trim().to_string(), Some(value.trim().to_string())),
                None => (entry.to_string(), None),
            })
            .collect()
    }
}

/// Bounds for the transient-lock retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub busy_wait: Duration,
    pub max_retries: u32,
    /// Lower ceiling for the thread marked as the UI thread.
    pub ui_max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            busy_wait: Duration::from_millis(10),
            max_retries: 1000,
            ui_max_retries: 50,
        }
    }
}
