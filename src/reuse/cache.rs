use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::time::Duration;

use crate::error::SqlReuseError;

use super::collaborators::{
    CommandRenderer, ConnectionState, Session, StatementHandle, StatementLog,
};
use super::stats::CacheStats;

/// Placeholder for the outcome of a deferred command.
///
/// Only executors that queue commands until flush would report these. Nothing in this crate
/// defers work, so the type exists for interface symmetry: [`ReuseCache::flush_all`] always
/// returns an empty list and no value of it is ever constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct BatchResult;

/// Result of checking a cached handle before handing it out again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Valid,
    Stale,
}

/// Prepared statements of one session, keyed by rendered SQL text.
///
/// The cache belongs to exactly one session and is driven by one thread of control: a handle is
/// acquired, bound and executed to completion before the next one is requested. `acquire` hands
/// out `&mut H` borrowed from the cache, so the borrow checker enforces that order; sharing one
/// cache between concurrent operations is outside its contract and no locking is provided.
///
/// Handles stay cached across any number of reuses. They are closed only by
/// [`flush_all`](Self::flush_all) or released when the cache is dropped.
#[derive(Debug)]
pub struct ReuseCache<H> {
    entries: HashMap<String, H>,
    stats: CacheStats,
}

impl<H> Default for ReuseCache<H> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::default(),
        }
    }
}

impl<H: StatementHandle> ReuseCache<H> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a bound handle for `command`, reusing the cached one when its connection is open.
    ///
    /// On a hit the handle's time budget is refreshed from the session's current budget. On a
    /// miss (nothing cached, or the cached handle's connection is gone) the session connection
    /// is obtained, a new handle is prepared and stored under the rendered text, replacing any
    /// stale entry. Parameters are bound on every call.
    ///
    /// # Errors
    /// Propagates the session's error when no connection can be obtained and the renderer's
    /// error when preparing or binding fails. A failed prepare leaves the cache unchanged.
    pub fn acquire<'c, S, R>(
        &'c mut self,
        session: &mut S,
        renderer: &R,
        command: &R::Command,
        log: &StatementLog<'_>,
    ) -> Result<&'c mut H, SqlReuseError>
    where
        R: CommandRenderer<Handle = H>,
        S: Session<Connection = R::Connection>,
    {
        let sql = renderer.rendered_text(command);
        let budget = session.remaining_budget();

        let handle = match self.entries.entry(sql) {
            Entry::Occupied(mut slot) => match liveness(slot.key(), slot.get()) {
                Liveness::Valid => {
                    self.stats.hits += 1;
                    tracing::trace!(sql = %slot.key(), "reusing cached statement");
                    let handle = slot.into_mut();
                    renderer.apply_time_budget(handle, budget);
                    handle
                }
                Liveness::Stale => {
                    let fresh = prepare_fresh(session, renderer, command, slot.key(), budget, log)?;
                    self.stats.misses += 1;
                    self.stats.stale_evictions += 1;
                    tracing::debug!(sql = %slot.key(), "replaced statement with a closed connection");
                    // the evicted handle's connection is gone; dropping it is all that is left
                    drop(slot.insert(fresh));
                    slot.into_mut()
                }
            },
            Entry::Vacant(slot) => {
                let fresh = prepare_fresh(session, renderer, command, slot.key(), budget, log)?;
                self.stats.misses += 1;
                tracing::trace!(sql = %slot.key(), "prepared new statement");
                slot.insert(fresh)
            }
        };

        renderer.bind_parameters(command, handle)?;
        Ok(handle)
    }

    /// Close every cached handle and empty the cache.
    ///
    /// The rollback flag only mirrors executors that queue commands until flush; this cache has
    /// nothing queued, so a rollback flush closes and clears exactly like a normal one. Close
    /// failures are logged and counted per handle and never stop the remaining handles from
    /// being closed. Always returns an empty list.
    pub fn flush_all(&mut self, _rollback: bool) -> Vec<BatchResult> {
        self.stats.flushes += 1;
        for (sql, mut handle) in self.entries.drain() {
            match handle.close() {
                Ok(()) => self.stats.closed += 1,
                Err(err) => {
                    self.stats.close_failures += 1;
                    tracing::warn!(sql = %sql, error = %err, "failed to close cached statement");
                }
            }
        }
        Vec::new()
    }
}

impl<H> ReuseCache<H> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a handle is cached for `sql`, without checking its connection.
    #[must_use]
    pub fn contains(&self, sql: &str) -> bool {
        self.entries.contains_key(sql)
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

fn liveness<H: StatementHandle>(sql: &str, handle: &H) -> Liveness {
    match handle.connection_state() {
        Ok(ConnectionState::Open) => Liveness::Valid,
        Ok(ConnectionState::Closed) => Liveness::Stale,
        Err(err) => {
            tracing::debug!(sql = %sql, error = %err, "liveness check failed; re-preparing");
            Liveness::Stale
        }
    }
}

fn prepare_fresh<S, R>(
    session: &mut S,
    renderer: &R,
    command: &R::Command,
    sql: &str,
    budget: Option<Duration>,
    log: &StatementLog<'_>,
) -> Result<R::Handle, SqlReuseError>
where
    R: CommandRenderer,
    S: Session<Connection = R::Connection>,
{
    let connection = session.connection(log)?;
    renderer.prepare(command, sql, &connection, budget)
}
