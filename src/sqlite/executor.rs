use crate::command::SqlCommand;
use crate::error::SqlReuseError;
use crate::results::{CustomDbRow, ResultSet};
use crate::reuse::{BatchResult, CacheStats, ReuseCache};

use super::config::SqliteOptions;
use super::renderer::SqliteRenderer;
use super::session::SqliteSession;
use super::statement::SqliteStatement;

/// Executor for one `SQLite` session that reuses prepared statements by rendered SQL.
///
/// Statements stay prepared until [`flush_statements`](Self::flush_statements), `commit`,
/// `rollback` or `close`. The executor is meant for one thread of control; it is `!Send`.
///
/// ```rust
/// use sql_reuse::prelude::*;
///
/// let mut exec = SqliteOptionsBuilder::new(":memory:".into()).build()?;
/// exec.update(&SqlCommand::from_sql("ddl", "CREATE TABLE t (id INTEGER, name TEXT)")?)?;
///
/// let insert = SqlCommand::from_sql("insert", "INSERT INTO t VALUES (#{id}, #{name})")?;
/// for (id, name) in [(1, "a"), (2, "b")] {
///     let cmd = insert
///         .clone()
///         .bind("id", RowValues::Int(id))
///         .bind("name", RowValues::Text(name.into()));
///     exec.update(&cmd)?;
/// }
/// // one prepare for the DDL, one shared by both inserts
/// assert_eq!(exec.cache_stats().misses, 2);
///
/// exec.commit(true)?;
/// assert_eq!(exec.cached_statements(), 0);
/// # Ok::<(), SqlReuseError>(())
/// ```
#[derive(Debug)]
pub struct SqliteReuseExecutor {
    session: SqliteSession,
    renderer: SqliteRenderer,
    cache: ReuseCache<SqliteStatement>,
    closed: bool,
}

impl SqliteReuseExecutor {
    /// # Errors
    /// Returns `SqlReuseError::ConfigError` if the options fail validation.
    pub fn new(options: SqliteOptions) -> Result<Self, SqlReuseError> {
        options.validate()?;
        Ok(Self::from_session(SqliteSession::new(options)))
    }

    #[must_use]
    pub fn from_session(session: SqliteSession) -> Self {
        let renderer = SqliteRenderer::new(session.options().statement_timeout);
        Self {
            session,
            renderer,
            cache: ReuseCache::new(),
            closed: false,
        }
    }

    /// Run a DML (or DDL) command and return the affected row count.
    ///
    /// # Errors
    /// Returns `SqlReuseError` if the executor is closed, the statement cannot be prepared or
    /// bound, or execution fails.
    pub fn update(&mut self, command: &SqlCommand) -> Result<usize, SqlReuseError> {
        self.statement_for(command)?.execute()
    }

    /// Run a query and collect its rows.
    ///
    /// # Errors
    /// Returns `SqlReuseError` if the executor is closed, the statement cannot be prepared or
    /// bound, or execution fails.
    pub fn query(&mut self, command: &SqlCommand) -> Result<ResultSet, SqlReuseError> {
        self.statement_for(command)?.query()
    }

    /// Run a query and stream its rows to `on_row`, returning how many rows were visited.
    ///
    /// Uses the same cached statement as [`query`](Self::query) but never builds a
    /// [`ResultSet`]. An error from `on_row` stops the iteration and is returned.
    ///
    /// # Errors
    /// Returns `SqlReuseError` if the executor is closed, the statement cannot be prepared or
    /// bound, execution fails, or `on_row` fails.
    pub fn query_each<F>(&mut self, command: &SqlCommand, on_row: F) -> Result<usize, SqlReuseError>
    where
        F: FnMut(&CustomDbRow) -> Result<(), SqlReuseError>,
    {
        self.statement_for(command)?.query_each(on_row)
    }

    /// Close and forget every cached statement. The rollback flag does not change anything.
    ///
    /// # Errors
    /// Returns `SqlReuseError::ExecutorClosed` if the executor is closed.
    pub fn flush_statements(&mut self, rollback: bool) -> Result<Vec<BatchResult>, SqlReuseError> {
        self.ensure_open()?;
        Ok(self.cache.flush_all(rollback))
    }

    /// Flush statements, then commit the open transaction when `required`.
    ///
    /// # Errors
    /// Returns `SqlReuseError::ExecutorClosed` if the executor is closed, or the `COMMIT` error.
    pub fn commit(&mut self, required: bool) -> Result<(), SqlReuseError> {
        self.ensure_open()?;
        self.cache.flush_all(false);
        if required {
            self.session.commit()?;
        }
        Ok(())
    }

    /// Flush statements, then roll back the open transaction when `required`.
    ///
    /// Statements are flushed even if the rollback fails. A closed executor has nothing to roll
    /// back, so this is a no-op there.
    ///
    /// # Errors
    /// Returns the `ROLLBACK` error.
    pub fn rollback(&mut self, required: bool) -> Result<(), SqlReuseError> {
        if self.closed {
            return Ok(());
        }
        self.cache.flush_all(true);
        if required {
            self.session.rollback()?;
        }
        Ok(())
    }

    /// Roll back (when `force_rollback`), flush statements and close the connection.
    ///
    /// Closing twice is a no-op. The executor is closed afterwards even if rolling back or
    /// closing the connection failed.
    ///
    /// # Errors
    /// Returns the first error from rolling back or closing the connection.
    pub fn close(&mut self, force_rollback: bool) -> Result<(), SqlReuseError> {
        if self.closed {
            return Ok(());
        }
        let rolled_back = self.rollback(force_rollback);
        let disconnected = self.session.close_connection();
        self.closed = true;
        rolled_back.and(disconnected)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Number of statements currently cached.
    #[must_use]
    pub fn cached_statements(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn session(&self) -> &SqliteSession {
        &self.session
    }

    /// Mutable session access, e.g. to close its connection out from under cached statements.
    pub fn session_mut(&mut self) -> &mut SqliteSession {
        &mut self.session
    }

    fn statement_for(&mut self, command: &SqlCommand) -> Result<&mut SqliteStatement, SqlReuseError> {
        self.ensure_open()?;
        let log = command.log();
        self.session.begin_if_needed(&log)?;
        self.cache
            .acquire(&mut self.session, &self.renderer, command, &log)
    }

    fn ensure_open(&self) -> Result<(), SqlReuseError> {
        if self.closed {
            Err(SqlReuseError::ExecutorClosed)
        } else {
            Ok(())
        }
    }
}

impl Drop for SqliteReuseExecutor {
    fn drop(&mut self) {
        if let Err(err) = self.close(false) {
            tracing::warn!(error = %err, "failed to close sqlite executor on drop");
        }
    }
}
