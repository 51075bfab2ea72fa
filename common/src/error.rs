use thiserror::Error;

use crate::exchange::ExchangeError;

pub type Res<T> = std::result::Result<T, AppError>;

/// Boxed error raised by caller-supplied body transforms.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum AppError {
    // === CONVERSION ERRORS ===
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Url error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Json error: {0}")]
    Json(#[from] serde_json::Error),

    // === EXCHANGE ERRORS ===
    /// The HTTP exchange itself failed. Carries the original error untouched.
    #[error(transparent)]
    Exchange(Box<ExchangeError>),

    /// A caller-supplied body transform failed; its error is the source.
    #[error("Body transform failed: {0}")]
    Transform(#[source] BoxError),

    // === APPLICATION ERRORS ===
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Request was not tagged under '{0}'")]
    MissingTag(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Internal(String),
}

impl From<ExchangeError> for AppError {
    fn from(error: ExchangeError) -> Self {
        AppError::Exchange(Box::new(error))
    }
}

impl AppError {
    /// Returns the failed exchange when this error is an HTTP failure.
    pub fn as_exchange(&self) -> Option<&ExchangeError> {
        match self {
            AppError::Exchange(error) => Some(error),
            _ => None,
        }
    }

    /// Unwraps the failed exchange, handing back any other error unchanged.
    pub fn into_exchange(self) -> Result<ExchangeError, AppError> {
        match self {
            AppError::Exchange(error) => Ok(*error),
            other => Err(other),
        }
    }
}
