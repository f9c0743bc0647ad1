use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::db::{ConnectionParameters, DatabaseType, RetryPolicy};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    /// Directory for log files when journald is unavailable.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: DatabaseType,

    #[serde(default = "default_db_path")]
    pub sqlite_path: PathBuf,

    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub port: u16,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Database name on the server.
    #[serde(default = "default_db_name")]
    pub name: String,

    /// `;`-separated driver options, e.g. `connect_timeout=5`.
    #[serde(default)]
    pub connect_options: String,
}

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from(".local/share"))
        .join("photocore/core.db")
}

fn default_db_name() -> String {
    "photocore".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseType::default(),
            sqlite_path: default_db_path(),
            host: String::new(),
            port: 0,
            user: String::new(),
            password: String::new(),
            name: default_db_name(),
            connect_options: String::new(),
        }
    }
}

impl From<&DatabaseConfig> for ConnectionParameters {
    fn from(config: &DatabaseConfig) -> Self {
        let database_name = match config.backend {
            DatabaseType::Sqlite => config.sqlite_path.to_string_lossy().into_owned(),
            DatabaseType::Postgresql => config.name.clone(),
        };
        Self {
            database_type: config.backend,
            database_name,
            host: config.host.clone(),
            port: config.port,
            user: config.user.clone(),
            password: config.password.clone(),
            connect_options: config.connect_options.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Wait between retries of a locked statement.
    #[serde(default = "default_busy_wait_ms")]
    pub busy_wait_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_ui_max_retries")]
    pub ui_max_retries: u32,
}

fn default_busy_wait_ms() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    1000
}

fn default_ui_max_retries() -> u32 {
    50
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            busy_wait_ms: default_busy_wait_ms(),
            max_retries: default_max_retries(),
            ui_max_retries: default_ui_max_retries(),
        }
    }
}

impl From<&EngineConfig> for RetryPolicy {
    fn from(config: &EngineConfig) -> Self {
        Self {
            busy_wait: Duration::from_millis(config.busy_wait_ms),
            max_retries: config.max_retries,
            ui_max_retries: config.ui_max_retries,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            // Create default config
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("photocore")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [database]
            backend = "postgresql"
            host = "db.local"
            name = "photos"

            [engine]
            max_retries = 20
            "#,
        )
        .unwrap();

        assert_eq!(config.database.backend, DatabaseType::Postgresql);
        assert_eq!(config.engine.max_retries, 20);
        assert_eq!(config.engine.ui_max_retries, 50);

        let params = ConnectionParameters::from(&config.database);
        assert_eq!(params.database_name, "photos");
        assert_eq!(params.host, "db.local");

        let policy = RetryPolicy::from(&config.engine);
        assert_eq!(policy.busy_wait, Duration::from_millis(10));
    }

    #[test]
    fn test_sqlite_parameters_use_file_path() {
        let config = DatabaseConfig {
            sqlite_path: PathBuf::from("/tmp/photos/core.db"),
            ..DatabaseConfig::default()
        };
        let params = ConnectionParameters::from(&config);
        assert_eq!(params.database_type, DatabaseType::Sqlite);
        assert_eq!(params.database_name, "/tmp/photos/core.db");
    }
}
