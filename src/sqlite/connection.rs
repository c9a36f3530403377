use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::error::SqlReuseError;

use super::config::SqliteOptions;

/// The single connection of a session, shared with the statements prepared on it.
///
/// Clones point at the same slot. Closing takes the connection out of the slot, so every
/// statement prepared on it observes the close. The slot is `Rc`/`RefCell` based: a session and
/// its statements stay on one thread.
#[derive(Clone)]
pub struct SqliteConnection {
    id: u64,
    slot: Rc<RefCell<Option<rusqlite::Connection>>>,
    // reuse handles prepared here and not yet closed
    live_statements: Rc<Cell<usize>>,
    // capacity currently set on rusqlite's compiled statement cache
    cache_capacity: Rc<Cell<usize>>,
}

impl SqliteConnection {
    pub(crate) fn open(options: &SqliteOptions, id: u64) -> Result<Self, SqlReuseError> {
        let conn = rusqlite::Connection::open(&options.db_path).map_err(|e| {
            SqlReuseError::ConnectionError(format!(
                "failed to open SQLite database {}: {e}",
                options.db_path
            ))
        })?;
        conn.set_prepared_statement_cache_capacity(options.statement_cache_capacity);
        Ok(Self {
            id,
            slot: Rc::new(RefCell::new(Some(conn))),
            live_statements: Rc::new(Cell::new(0)),
            cache_capacity: Rc::new(Cell::new(options.statement_cache_capacity)),
        })
    }

    /// Session-local number of this connection; reopening after a close yields a new id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Capacity of rusqlite's compiled statement cache. Grows so that every live reuse handle
    /// keeps its compiled statement.
    #[must_use]
    pub fn statement_cache_capacity(&self) -> usize {
        self.cache_capacity.get()
    }

    /// Number of reuse handles prepared on this connection and not yet closed.
    #[must_use]
    pub fn live_statements(&self) -> usize {
        self.live_statements.get()
    }

    /// Count a new handle, raising the compiled statement cache capacity if it would no longer
    /// hold every live handle.
    pub(crate) fn register_statement(&self) -> Result<(), SqlReuseError> {
        let live = self.live_statements.get() + 1;
        if live > self.cache_capacity.get() {
            self.with_connection(|conn| {
                conn.set_prepared_statement_cache_capacity(live);
                Ok(())
            })?;
            tracing::debug!(connection = self.id, capacity = live, "raised statement cache capacity");
            self.cache_capacity.set(live);
        }
        self.live_statements.set(live);
        Ok(())
    }

    pub(crate) fn release_statement(&self) {
        self.live_statements
            .set(self.live_statements.get().saturating_sub(1));
    }

    /// # Errors
    /// Returns `SqlReuseError::ConnectionError` if the connection is being closed while checked.
    pub fn is_open(&self) -> Result<bool, SqlReuseError> {
        let guard = self.slot.try_borrow().map_err(|_| {
            SqlReuseError::ConnectionError(format!("SQLite connection {} is busy", self.id))
        })?;
        Ok(guard.is_some())
    }

    /// Run `func` against the open connection.
    ///
    /// # Errors
    /// Returns `SqlReuseError::ConnectionError` if the connection is closed or busy, otherwise
    /// whatever `func` returns.
    pub fn with_connection<F, R>(&self, func: F) -> Result<R, SqlReuseError>
    where
        F: FnOnce(&rusqlite::Connection) -> Result<R, SqlReuseError>,
    {
        let guard = self.slot.try_borrow().map_err(|_| {
            SqlReuseError::ConnectionError(format!("SQLite connection {} is busy", self.id))
        })?;
        let conn = guard.as_ref().ok_or_else(|| {
            SqlReuseError::ConnectionError(format!("SQLite connection {} is closed", self.id))
        })?;
        func(conn)
    }

    /// Close the connection for every holder. Closing twice is a no-op.
    ///
    /// # Errors
    /// Returns `SqlReuseError::ConnectionError` if the connection is in use, or the driver error
    /// if SQLite refuses to close.
    pub fn close(&self) -> Result<(), SqlReuseError> {
        let taken = self
            .slot
            .try_borrow_mut()
            .map_err(|_| {
                SqlReuseError::ConnectionError(format!("SQLite connection {} is busy", self.id))
            })?
            .take();
        match taken {
            Some(conn) => conn.close().map_err(|(_, err)| SqlReuseError::SqliteError(err)),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("id", &self.id)
            .field("open", &self.is_open().unwrap_or(false))
            .field("live_statements", &self.live_statements.get())
            .finish()
    }
}
