//! Per-session reuse of prepared statements.
//!
//! [`ReuseCache`] maps rendered SQL text to a live prepared handle. It talks to the rest of the
//! system through the traits in [`collaborators`]: a [`Session`] that owns the connection and the
//! time budget, and a [`CommandRenderer`] that renders, prepares and binds.

mod cache;
pub mod collaborators;
mod stats;

#[cfg(test)]
mod tests;

pub use cache::{BatchResult, Liveness, ReuseCache};
pub use collaborators::{
    CommandRenderer, ConnectionState, Session, StatementHandle, StatementLog,
};
pub use stats::CacheStats;
