//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::command::SqlCommand;
pub use crate::error::SqlReuseError;
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::reuse::{
    BatchResult, CacheStats, CommandRenderer, ConnectionState, ReuseCache, Session,
    StatementHandle, StatementLog,
};
pub use crate::template::{PlaceholderStyle, SqlTemplate};
pub use crate::types::RowValues;

#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteOptions, SqliteOptionsBuilder, SqliteReuseExecutor};
