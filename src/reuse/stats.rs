use serde::Serialize;

/// Counters describing how well a session's statements were reused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Acquires served by an existing handle.
    pub hits: u64,
    /// Acquires that prepared a new handle, stale replacements included.
    pub misses: u64,
    /// Cached handles replaced because their connection was gone.
    pub stale_evictions: u64,
    /// Calls to `flush_all`, empty ones included.
    pub flushes: u64,
    /// Handles closed successfully by a flush.
    pub closed: u64,
    /// Handles whose close failed during a flush.
    pub close_failures: u64,
}

impl CacheStats {
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
