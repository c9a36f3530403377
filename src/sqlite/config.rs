use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SqlReuseError;

use super::executor::SqliteReuseExecutor;

const DEFAULT_STATEMENT_CACHE_CAPACITY: usize = 64;

/// Options for one `SQLite` session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteOptions {
    pub db_path: String,
    /// Overall budget of the session; every statement's timeout is capped by what is left.
    pub transaction_timeout: Option<Duration>,
    /// Timeout for commands that do not carry their own.
    pub statement_timeout: Option<Duration>,
    /// When false, the first statement of a session opens a transaction that lasts until
    /// commit or rollback.
    pub auto_commit: bool,
    /// Capacity of rusqlite's per-connection compiled statement cache.
    pub statement_cache_capacity: usize,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            db_path: ":memory:".to_string(),
            transaction_timeout: None,
            statement_timeout: None,
            auto_commit: false,
            statement_cache_capacity: DEFAULT_STATEMENT_CACHE_CAPACITY,
        }
    }
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            db_path,
            ..Self::default()
        }
    }

    /// Load options from a JSON document; missing fields take their defaults.
    ///
    /// # Errors
    /// Returns `SqlReuseError::ConfigError` if the document is malformed or fails validation.
    pub fn from_json(document: &str) -> Result<Self, SqlReuseError> {
        let opts: SqliteOptions = serde_json::from_str(document)?;
        opts.validate()?;
        Ok(opts)
    }

    /// # Errors
    /// Returns `SqlReuseError::ConfigError` for an empty path or a zero cache capacity.
    pub fn validate(&self) -> Result<(), SqlReuseError> {
        if self.db_path.trim().is_empty() {
            return Err(SqlReuseError::ConfigError("db_path must not be empty".into()));
        }
        if self.statement_cache_capacity == 0 {
            return Err(SqlReuseError::ConfigError(
                "statement_cache_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn transaction_timeout(mut self, timeout: Duration) -> Self {
        self.opts.transaction_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn statement_timeout(mut self, timeout: Duration) -> Self {
        self.opts.statement_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn auto_commit(mut self, auto_commit: bool) -> Self {
        self.opts.auto_commit = auto_commit;
        self
    }

    #[must_use]
    pub fn statement_cache_capacity(mut self, capacity: usize) -> Self {
        self.opts.statement_cache_capacity = capacity;
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// Validate the options and create an executor. The connection opens on first use.
    ///
    /// # Errors
    /// Returns `SqlReuseError::ConfigError` if validation fails.
    pub fn build(self) -> Result<SqliteReuseExecutor, SqlReuseError> {
        SqliteReuseExecutor::new(self.finish())
    }
}
