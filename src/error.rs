use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqlReuseError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Prepare error: {0}")]
    PrepareError(String),

    #[error("Parameter binding error: {0}")]
    ParameterError(String),

    #[error("Template error: {0}")]
    TemplateError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Executor was closed")]
    ExecutorClosed,

    #[error("Other database error: {0}")]
    Other(String),
}

impl From<serde_json::Error> for SqlReuseError {
    fn from(err: serde_json::Error) -> Self {
        SqlReuseError::ConfigError(format!("invalid options document: {err}"))
    }
}
