use std::sync::Arc;
use std::time::Duration;

use crate::error::SqlReuseError;
use crate::reuse::StatementLog;
use crate::template::{NamedParams, SqlTemplate};
use crate::types::RowValues;

/// A logical command: which statement to run and the values to run it with.
///
/// The template is shared, so building many commands for the same statement is cheap. Parameter
/// values can be changed between executions; with conditional fragments that may change the
/// rendered text and therefore which cached statement is used.
#[derive(Debug, Clone)]
pub struct SqlCommand {
    id: Arc<str>,
    template: Arc<SqlTemplate>,
    params: NamedParams,
    timeout: Option<Duration>,
}

impl SqlCommand {
    #[must_use]
    pub fn new(id: impl Into<Arc<str>>, template: Arc<SqlTemplate>) -> Self {
        Self {
            id: id.into(),
            template,
            params: NamedParams::new(),
            timeout: None,
        }
    }

    /// Parse `sql` as a single-fragment template.
    ///
    /// # Errors
    /// Returns [`SqlReuseError::TemplateError`] for malformed parameter markers.
    pub fn from_sql(id: impl Into<Arc<str>>, sql: &str) -> Result<Self, SqlReuseError> {
        Ok(Self::new(id, Arc::new(SqlTemplate::parse(sql)?)))
    }

    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, value: RowValues) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    /// Replace one parameter value in place.
    pub fn set(&mut self, name: impl Into<String>, value: RowValues) {
        self.params.insert(name.into(), value);
    }

    /// Per-statement timeout; the session budget still caps it.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn template(&self) -> &SqlTemplate {
        &self.template
    }

    #[must_use]
    pub fn params(&self) -> &NamedParams {
        &self.params
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    #[must_use]
    pub fn log(&self) -> StatementLog<'_> {
        StatementLog::new(&self.id)
    }
}
