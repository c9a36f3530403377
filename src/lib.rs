//! Prepared statement reuse for a single database session.
//!
//! [`ReuseCache`] keeps one prepared statement per rendered SQL text for the lifetime of a
//! session and hands the same statement back whenever that text is executed again on the same,
//! still-open connection. Statements are closed only when the session flushes them.
//!
//! With the default `sqlite` feature, [`SqliteReuseExecutor`] wires the cache to a rusqlite
//! connection, a transaction deadline and [`SqlTemplate`] rendering.

pub mod command;
pub mod error;
pub mod prelude;
pub mod results;
pub mod reuse;
pub mod template;
pub mod timeout;
pub mod types;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use command::SqlCommand;
pub use error::SqlReuseError;
pub use results::{CustomDbRow, ResultSet};
pub use reuse::{
    BatchResult, CacheStats, CommandRenderer, ConnectionState, Liveness, ReuseCache, Session,
    StatementHandle, StatementLog,
};
pub use template::{PlaceholderStyle, RenderedSql, SqlTemplate, SqlTemplateBuilder};
pub use timeout::{Deadline, effective_timeout};
pub use types::RowValues;

#[cfg(feature = "sqlite")]
pub use sqlite::{
    SqliteConnection, SqliteOptions, SqliteOptionsBuilder, SqliteRenderer, SqliteReuseExecutor,
    SqliteSession, SqliteStatement,
};
