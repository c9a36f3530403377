// SQLite backend for the reuse cache
//
// This module is split into several sub-modules:
// - config: Session options and their builder
// - connection: The session's single shared connection
// - session: Lazy connection opening, transaction state and the time budget
// - statement: Prepared statement handle cached per rendered SQL text
// - renderer: Template rendering, preparing and parameter binding
// - executor: Session-level facade owning session, renderer and cache
// - params/query: Value conversion in both directions

pub mod config;
mod connection;
pub mod executor;
pub mod params;
pub mod query;
mod renderer;
mod session;
mod statement;

pub use config::{SqliteOptions, SqliteOptionsBuilder};
pub use connection::SqliteConnection;
pub use executor::SqliteReuseExecutor;
pub use query::{build_result_set, for_each_row};
pub use renderer::SqliteRenderer;
pub use session::SqliteSession;
pub use statement::SqliteStatement;
