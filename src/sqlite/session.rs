use std::time::Duration;

use crate::error::SqlReuseError;
use crate::reuse::{Session, StatementLog};
use crate::timeout::Deadline;

use super::config::SqliteOptions;
use super::connection::SqliteConnection;

/// One `SQLite` unit of work: a lazily opened connection, its transaction and its deadline.
#[derive(Debug)]
pub struct SqliteSession {
    options: SqliteOptions,
    deadline: Deadline,
    current: Option<SqliteConnection>,
    connections_opened: u64,
    // id of the connection the open transaction was begun on
    tx_connection: Option<u64>,
    // set when that connection went away before commit or rollback
    tx_lost: bool,
}

impl SqliteSession {
    /// Create a session; its deadline starts now.
    #[must_use]
    pub fn new(options: SqliteOptions) -> Self {
        let deadline = Deadline::start(options.transaction_timeout);
        Self::with_deadline(options, deadline)
    }

    #[must_use]
    pub fn with_deadline(options: SqliteOptions, deadline: Deadline) -> Self {
        Self {
            options,
            deadline,
            current: None,
            connections_opened: 0,
            tx_connection: None,
            tx_lost: false,
        }
    }

    #[must_use]
    pub fn options(&self) -> &SqliteOptions {
        &self.options
    }

    /// The held connection, open or not. `None` before first use and after `close_connection`.
    #[must_use]
    pub fn current_connection(&self) -> Option<&SqliteConnection> {
        self.current.as_ref()
    }

    #[must_use]
    pub fn connections_opened(&self) -> u64 {
        self.connections_opened
    }

    /// Whether a transaction is open on the currently held connection.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        match (&self.current, self.tx_connection) {
            (Some(conn), Some(tx_id)) => conn.id() == tx_id && conn.is_open().unwrap_or(false),
            _ => false,
        }
    }

    /// Whether the connection holding the open transaction was closed before the transaction
    /// ended. Its uncommitted work is gone; only `rollback` clears this.
    #[must_use]
    pub fn transaction_lost(&self) -> bool {
        self.tx_lost
    }

    /// Open a transaction unless the session auto-commits or one is already open.
    ///
    /// # Errors
    /// Returns `SqlReuseError::ConnectionError` while a lost transaction has not been rolled
    /// back, otherwise `SqlReuseError` if the connection cannot be opened or `BEGIN` fails.
    pub fn begin_if_needed(&mut self, log: &StatementLog<'_>) -> Result<(), SqlReuseError> {
        if self.options.auto_commit {
            return Ok(());
        }
        self.detect_lost_transaction();
        self.ensure_transaction_intact()?;
        if self.in_transaction() {
            return Ok(());
        }
        let conn = self.connection(log)?;
        conn.with_connection(|c| Ok(c.execute_batch("BEGIN")?))?;
        tracing::trace!(connection = conn.id(), "began transaction");
        self.tx_connection = Some(conn.id());
        Ok(())
    }

    /// Commit the open transaction, if any.
    ///
    /// # Errors
    /// Returns `SqlReuseError::ConnectionError` if the transaction was lost with its connection,
    /// or the `COMMIT` error.
    pub fn commit(&mut self) -> Result<(), SqlReuseError> {
        self.detect_lost_transaction();
        self.ensure_transaction_intact()?;
        self.finish_transaction("COMMIT")
    }

    /// Roll back the open transaction, if any. Also acknowledges a lost transaction.
    ///
    /// # Errors
    /// Returns `SqlReuseError` if `ROLLBACK` fails.
    pub fn rollback(&mut self) -> Result<(), SqlReuseError> {
        self.detect_lost_transaction();
        if self.tx_lost {
            tracing::debug!("lost transaction acknowledged by rollback");
            self.tx_lost = false;
        }
        self.finish_transaction("ROLLBACK")
    }

    fn ensure_transaction_intact(&self) -> Result<(), SqlReuseError> {
        if self.tx_lost {
            return Err(SqlReuseError::ConnectionError(
                "connection closed during an open transaction; roll back before continuing".into(),
            ));
        }
        Ok(())
    }

    /// Mark the transaction lost if its connection is no longer the open, held one.
    fn detect_lost_transaction(&mut self) {
        let Some(tx_id) = self.tx_connection else {
            return;
        };
        let intact = self
            .current
            .as_ref()
            .is_some_and(|conn| conn.id() == tx_id && conn.is_open().unwrap_or(false));
        if !intact {
            tracing::warn!(connection = tx_id, "transaction lost with its connection");
            self.tx_connection = None;
            self.tx_lost = true;
        }
    }

    fn finish_transaction(&mut self, sql: &str) -> Result<(), SqlReuseError> {
        let active = self.in_transaction();
        self.tx_connection = None;
        match &self.current {
            Some(conn) if active => conn.with_connection(|c| Ok(c.execute_batch(sql)?)),
            _ => Ok(()),
        }
    }

    /// Close the held connection. Statements prepared on it become stale, and an open transaction
    /// on it is lost: later statements and `commit` fail until `rollback` is called.
    ///
    /// # Errors
    /// Returns `SqlReuseError` if the driver refuses to close the connection.
    pub fn close_connection(&mut self) -> Result<(), SqlReuseError> {
        if self.in_transaction() {
            tracing::warn!("closing sqlite connection with an open transaction");
            self.tx_lost = true;
        }
        self.tx_connection = None;
        match self.current.take() {
            Some(conn) => {
                tracing::debug!(connection = conn.id(), "closing sqlite connection");
                conn.close()
            }
            None => Ok(()),
        }
    }
}

impl Session for SqliteSession {
    type Connection = SqliteConnection;

    fn connection(&mut self, log: &StatementLog<'_>) -> Result<SqliteConnection, SqlReuseError> {
        if let Some(conn) = &self.current
            && conn.is_open()?
        {
            return Ok(conn.clone());
        }

        let id = self.connections_opened + 1;
        tracing::debug!(
            statement = log.statement_id(),
            connection = id,
            path = %self.options.db_path,
            "opening sqlite connection"
        );
        let conn = SqliteConnection::open(&self.options, id)?;
        self.connections_opened = id;
        self.current = Some(conn.clone());
        Ok(conn)
    }

    fn remaining_budget(&self) -> Option<Duration> {
        self.deadline.remaining()
    }
}
