use std::sync::Arc;
use std::time::Duration;

use crate::command::SqlCommand;
use crate::error::SqlReuseError;
use crate::reuse::CommandRenderer;
use crate::template::PlaceholderStyle;
use crate::timeout::effective_timeout;

use super::connection::SqliteConnection;
use super::params::row_value_to_sqlite_value;
use super::statement::SqliteStatement;

/// Renders [`SqlCommand`]s with `?N` placeholders and prepares them on a `SQLite` connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteRenderer {
    default_timeout: Option<Duration>,
}

impl SqliteRenderer {
    /// `default_timeout` applies to commands that carry no timeout of their own.
    #[must_use]
    pub fn new(default_timeout: Option<Duration>) -> Self {
        Self { default_timeout }
    }
}

impl CommandRenderer for SqliteRenderer {
    type Command = SqlCommand;
    type Connection = SqliteConnection;
    type Handle = SqliteStatement;

    fn rendered_text(&self, command: &SqlCommand) -> String {
        command
            .template()
            .render(command.params(), PlaceholderStyle::Sqlite)
            .sql
    }

    fn prepare(
        &self,
        command: &SqlCommand,
        sql: &str,
        connection: &SqliteConnection,
        budget: Option<Duration>,
    ) -> Result<SqliteStatement, SqlReuseError> {
        connection.register_statement()?;
        let compiled = connection.with_connection(|conn| {
            // compiles the statement and keeps it in rusqlite's cache for execution
            conn.prepare_cached(sql).map(drop).map_err(|e| {
                SqlReuseError::PrepareError(format!("statement `{}`: {e}", command.id()))
            })
        });
        if let Err(err) = compiled {
            connection.release_statement();
            return Err(err);
        }
        let configured = command.timeout().or(self.default_timeout);
        Ok(SqliteStatement::new(
            connection.clone(),
            Arc::from(sql),
            configured,
            effective_timeout(configured, budget),
        ))
    }

    fn bind_parameters(
        &self,
        command: &SqlCommand,
        handle: &mut SqliteStatement,
    ) -> Result<(), SqlReuseError> {
        let names = command.template().binding_names(command.params());
        let mut values = Vec::with_capacity(names.len());
        for name in names {
            let value = command.params().get(name).ok_or_else(|| {
                SqlReuseError::ParameterError(format!(
                    "statement `{}` has no value for parameter `{name}`",
                    command.id()
                ))
            })?;
            values.push(row_value_to_sqlite_value(value));
        }
        handle.bind(values);
        Ok(())
    }

    fn apply_time_budget(&self, handle: &mut SqliteStatement, budget: Option<Duration>) {
        handle.set_timeout(effective_timeout(handle.configured_timeout(), budget));
    }
}
