use std::{fmt, sync::Arc};

use common::{
    env_config::Config,
    error::{AppError, BoxError},
    exchange::{RawResponse, RequestConfig, SentRequest},
};
use db::ConnectionSettings;
use serde_json::Value;

/// What a body transform gets to look at besides the body itself.
#[derive(Clone, Copy, Debug)]
pub enum BodyContext<'a> {
    Request {
        request: Option<&'a SentRequest>,
        config: &'a RequestConfig,
    },
    Response {
        response: &'a RawResponse,
        config: &'a RequestConfig,
    },
}

/// Rewrites a non-null body before it is stored, e.g. to redact secrets.
///
/// An error returned here is not caught: it fails the handling of the
/// exchange and reaches the caller as [`AppError::Transform`].
pub type BodyTransform = Arc<dyn Fn(Value, BodyContext<'_>) -> Result<Value, BoxError> + Send + Sync>;

pub fn body_transform<F>(transform: F) -> BodyTransform
where
    F: Fn(Value, BodyContext<'_>) -> Result<Value, BoxError> + Send + Sync + 'static,
{
    Arc::new(transform)
}

/// Called when a row could not be inserted.
pub type FailureHandler = Arc<dyn Fn(&AppError) + Send + Sync>;

/// Terminates the process. Default reaction to a failed insert.
pub fn exit_on_failure() -> FailureHandler {
    Arc::new(|_| std::process::exit(1))
}

#[derive(Clone)]
pub struct LoggerOptions {
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub table: String,
    pub port: u16,
    /// Column names left out of every row. Unknown names are rejected.
    pub exclude_columns: Vec<String>,
    /// Log clients derived from the configured one as well.
    pub all_instances: bool,
    pub transform_request_body: Option<BodyTransform>,
    pub transform_response_body: Option<BodyTransform>,
    /// Print one line per exchange through the `log` facade.
    pub console_logging: bool,
    pub on_insert_failure: FailureHandler,
}

impl LoggerOptions {
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        database: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        LoggerOptions {
            host: host.into(),
            user: user.into(),
            password: String::new(),
            database: database.into(),
            table: table.into(),
            port: 3306,
            exclude_columns: Vec::new(),
            all_instances: false,
            transform_request_body: None,
            transform_response_body: None,
            console_logging: false,
            on_insert_failure: exit_on_failure(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.db_host.clone(),
            config.db_user.clone(),
            config.db_name.clone(),
            config.table.clone(),
        )
        .password(config.db_password.clone())
        .port(config.db_port)
        .exclude_columns(config.exclude_columns.clone())
        .all_instances(config.all_instances)
        .console_logging(config.console_logging_enabled)
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn exclude_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.exclude_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn all_instances(mut self, enabled: bool) -> Self {
        self.all_instances = enabled;
        self
    }

    pub fn console_logging(mut self, enabled: bool) -> Self {
        self.console_logging = enabled;
        self
    }

    pub fn transform_request_body<F>(mut self, transform: F) -> Self
    where
        F: Fn(Value, BodyContext<'_>) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.transform_request_body = Some(body_transform(transform));
        self
    }

    pub fn transform_response_body<F>(mut self, transform: F) -> Self
    where
        F: Fn(Value, BodyContext<'_>) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.transform_response_body = Some(body_transform(transform));
        self
    }

    pub fn on_insert_failure<F>(mut self, handler: F) -> Self
    where
        F: Fn(&AppError) + Send + Sync + 'static,
    {
        self.on_insert_failure = Arc::new(handler);
        self
    }

    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
        }
    }
}

impl fmt::Debug for LoggerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerOptions")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("database", &self.database)
            .field("table", &self.table)
            .field("port", &self.port)
            .field("exclude_columns", &self.exclude_columns)
            .field("all_instances", &self.all_instances)
            .field("transform_request_body", &self.transform_request_body.is_some())
            .field("transform_response_body", &self.transform_response_body.is_some())
            .field("console_logging", &self.console_logging)
            .finish_non_exhaustive()
    }
}
