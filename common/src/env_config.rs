use std::{env, sync::Arc};

use crate::error::{AppError, Res};

#[derive(Clone, Debug)]
/// Configuration for the audit logger.
///
/// Holds the MySQL connection details, the target table, which columns
/// to leave out of each row and the logging preferences.
pub struct Config {
    /// MySQL server host.
    pub db_host: String,
    /// MySQL server port.
    pub db_port: u16,
    /// MySQL user.
    pub db_user: String,
    /// MySQL password, empty when unset.
    pub db_password: String,
    /// Database holding the audit table.
    pub db_name: String,
    /// Table every exchange is inserted into.
    pub table: String,
    /// Column names left out of the insert.
    pub exclude_columns: Vec<String>,
    /// Whether clients derived from a logged client are logged too.
    pub all_instances: bool,
    /// A boolean indicating whether console logging is enabled.
    pub console_logging_enabled: bool,
    /// File the console log is mirrored to.
    pub log_file: String,
    /// Optional request timeout for the HTTP client, in seconds.
    pub http_timeout_secs: Option<u64>,
}

impl Config {
    /// Creates a new `Config` instance from environment variables.
    ///
    /// # Environment Variables
    ///
    /// Required:
    /// - `DB_HOST`, `DB_USER`, `DB_NAME`, `DB_TABLE`
    ///
    /// Optional (with defaults):
    /// - `DB_PASSWORD`: (default: empty)
    /// - `DB_PORT`: (default: 3306)
    /// - `EXCLUDE_COLUMNS`: comma separated column names (default: none)
    /// - `ALL_INSTANCES`: (default: false)
    /// - `ENABLE_CONSOLE_LOGGING`: (default: true)
    /// - `LOG_FILE`: (default: "audit.log")
    /// - `HTTP_TIMEOUT_SECS`: (default: no timeout)
    pub fn from_env() -> Res<Arc<Self>> {
        dotenvy::dotenv().ok();

        Ok(Arc::new(Config {
            db_host: required("DB_HOST")?,
            db_port: parsed("DB_PORT")?.unwrap_or(3306),
            db_user: required("DB_USER")?,
            db_password: env::var("DB_PASSWORD").unwrap_or_default(),
            db_name: required("DB_NAME")?,
            table: required("DB_TABLE")?,
            exclude_columns: split_list(&env::var("EXCLUDE_COLUMNS").unwrap_or_default()),
            all_instances: flag("ALL_INSTANCES", false),
            console_logging_enabled: flag("ENABLE_CONSOLE_LOGGING", true),
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "audit.log".to_string()),
            http_timeout_secs: parsed("HTTP_TIMEOUT_SECS")?,
        }))
    }
}

fn required(key: &str) -> Res<String> {
    env::var(key).map_err(|_| AppError::Config(format!("{} must be set", key)))
}

fn parsed<T: std::str::FromStr>(key: &str) -> Res<Option<T>> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AppError::Config(format!("{} must be a valid number", key))),
        Err(_) => Ok(None),
    }
}

fn flag(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|value| value.to_lowercase() == "true")
        .unwrap_or(default)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
