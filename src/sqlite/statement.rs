use std::sync::Arc;
use std::time::Duration;

use rusqlite::params_from_iter;
use rusqlite::types::Value;

use crate::error::SqlReuseError;
use crate::results::{CustomDbRow, ResultSet};
use crate::reuse::{ConnectionState, StatementHandle};

use super::connection::SqliteConnection;
use super::query::{build_result_set, for_each_row};

/// Prepared `SQLite` statement cached by a session.
///
/// The compiled statement lives in rusqlite's per-connection statement cache; this handle pins
/// the SQL, the connection it was prepared on, the currently bound values and the timeout the
/// next execution may use. Executing looks the compiled statement up again through
/// `prepare_cached`. The connection grows that cache to hold every live handle, so repeated
/// executions do not recompile.
#[derive(Debug)]
pub struct SqliteStatement {
    connection: SqliteConnection,
    sql: Arc<str>,
    values: Vec<Value>,
    configured_timeout: Option<Duration>,
    timeout: Option<Duration>,
    closed: bool,
}

impl SqliteStatement {
    pub(crate) fn new(
        connection: SqliteConnection,
        sql: Arc<str>,
        configured_timeout: Option<Duration>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            connection,
            sql,
            values: Vec::new(),
            configured_timeout,
            timeout,
            closed: false,
        }
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn connection_id(&self) -> u64 {
        self.connection.id()
    }

    /// Timeout the statement was prepared with, before the session budget is applied.
    #[must_use]
    pub fn configured_timeout(&self) -> Option<Duration> {
        self.configured_timeout
    }

    /// Timeout the next execution runs with.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    #[must_use]
    pub fn bound_values(&self) -> &[Value] {
        &self.values
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn bind(&mut self, values: Vec<Value>) {
        self.values = values;
    }

    pub(crate) fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Execute as DML and return the number of affected rows.
    ///
    /// # Errors
    /// Returns `SqlReuseError` if the statement or its connection is closed, the time budget is
    /// used up, or SQLite fails.
    pub fn execute(&self) -> Result<usize, SqlReuseError> {
        self.ensure_runnable()?;
        self.connection.with_connection(|conn| {
            self.apply_busy_timeout(conn)?;
            let mut stmt = conn.prepare_cached(&self.sql)?;
            Ok(stmt.execute(params_from_iter(self.values.iter()))?)
        })
    }

    /// Execute as a query and collect the rows.
    ///
    /// # Errors
    /// Returns `SqlReuseError` if the statement or its connection is closed, the time budget is
    /// used up, or SQLite fails.
    pub fn query(&self) -> Result<ResultSet, SqlReuseError> {
        self.ensure_runnable()?;
        self.connection.with_connection(|conn| {
            self.apply_busy_timeout(conn)?;
            let mut stmt = conn.prepare_cached(&self.sql)?;
            build_result_set(&mut stmt, &self.values)
        })
    }

    /// Execute as a query and stream the rows to `on_row` without collecting them.
    ///
    /// # Errors
    /// Returns `SqlReuseError` if the statement cannot run (see [`query`](Self::query)), or the
    /// first error returned by `on_row`.
    pub fn query_each<F>(&self, mut on_row: F) -> Result<usize, SqlReuseError>
    where
        F: FnMut(&CustomDbRow) -> Result<(), SqlReuseError>,
    {
        self.ensure_runnable()?;
        self.connection.with_connection(|conn| {
            self.apply_busy_timeout(conn)?;
            let mut stmt = conn.prepare_cached(&self.sql)?;
            for_each_row(&mut stmt, &self.values, &mut on_row)
        })
    }

    fn ensure_runnable(&self) -> Result<(), SqlReuseError> {
        if self.closed {
            return Err(SqlReuseError::ExecutionError(format!(
                "statement already closed: {}",
                self.sql
            )));
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(SqlReuseError::ExecutionError(format!(
                "time budget exhausted before executing: {}",
                self.sql
            )));
        }
        Ok(())
    }

    fn apply_busy_timeout(&self, conn: &rusqlite::Connection) -> Result<(), SqlReuseError> {
        if let Some(timeout) = self.timeout {
            conn.busy_timeout(timeout)?;
        }
        Ok(())
    }
}

impl StatementHandle for SqliteStatement {
    fn connection_state(&self) -> Result<ConnectionState, SqlReuseError> {
        Ok(if self.connection.is_open()? {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        })
    }

    /// rusqlite only evicts its compiled statements as a whole, so closing one handle flushes
    /// the connection's statement cache. Statements on a closed connection were released with it.
    fn close(&mut self) -> Result<(), SqlReuseError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.values.clear();
        self.connection.release_statement();
        if self.connection.is_open()? {
            self.connection.with_connection(|conn| {
                conn.flush_prepared_statement_cache();
                Ok(())
            })?;
        }
        Ok(())
    }
}
