use std::time::Duration;

use crate::error::SqlReuseError;

/// Identity of the statement that caused a connection to be opened.
///
/// Sessions attach it to the log event they emit when the first command of a session forces the
/// connection open; it is not used for anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatementLog<'a> {
    statement_id: &'a str,
}

impl<'a> StatementLog<'a> {
    #[must_use]
    pub fn new(statement_id: &'a str) -> Self {
        Self { statement_id }
    }

    #[must_use]
    pub fn statement_id(&self) -> &'a str {
        self.statement_id
    }
}

/// Whether the connection a handle was prepared against can still run it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Closed,
}

/// A prepared statement resource bound to one connection.
pub trait StatementHandle {
    /// Report the state of the handle's connection.
    ///
    /// # Errors
    /// Implementations may fail when the connection cannot be inspected (for example while it is
    /// borrowed elsewhere). Callers that only need a yes/no answer treat a failure as `Closed`.
    fn connection_state(&self) -> Result<ConnectionState, SqlReuseError>;

    /// Release the driver/server resources held by the statement.
    ///
    /// # Errors
    /// Returns the driver error when releasing fails.
    fn close(&mut self) -> Result<(), SqlReuseError>;
}

/// The unit of work that owns one connection and one shrinking time budget.
pub trait Session {
    type Connection;

    /// The session's connection, opened on first use.
    ///
    /// # Errors
    /// Returns [`SqlReuseError::ConnectionError`] (or a driver error) when no connection can be
    /// produced.
    fn connection(&mut self, log: &StatementLog<'_>) -> Result<Self::Connection, SqlReuseError>;

    /// Time left before the session deadline; `None` when the session is unbounded.
    fn remaining_budget(&self) -> Option<Duration>;
}

/// Turns logical commands into rendered SQL and prepared, parameterized handles.
pub trait CommandRenderer {
    type Command: ?Sized;
    type Connection;
    type Handle: StatementHandle;

    /// Final command text with placeholders and without literal parameter values.
    fn rendered_text(&self, command: &Self::Command) -> String;

    /// Prepare `sql` (the text returned by [`rendered_text`](Self::rendered_text)) on
    /// `connection`.
    ///
    /// # Errors
    /// Returns [`SqlReuseError::PrepareError`] (or a driver error) when the statement cannot be
    /// prepared.
    fn prepare(
        &self,
        command: &Self::Command,
        sql: &str,
        connection: &Self::Connection,
        budget: Option<Duration>,
    ) -> Result<Self::Handle, SqlReuseError>;

    /// Bind the command's current parameter values, replacing earlier bindings.
    ///
    /// # Errors
    /// Returns [`SqlReuseError::ParameterError`] when a value is missing or cannot be converted.
    fn bind_parameters(
        &self,
        command: &Self::Command,
        handle: &mut Self::Handle,
    ) -> Result<(), SqlReuseError>;

    /// Refresh the time a reused handle may spend executing.
    fn apply_time_budget(&self, handle: &mut Self::Handle, budget: Option<Duration>);
}
