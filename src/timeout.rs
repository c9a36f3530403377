//! Time budget bookkeeping for a session and the statements it runs.

use std::time::{Duration, Instant};

/// Overall execution deadline of one session.
///
/// The remaining budget only ever shrinks: it is measured from the moment the deadline was
/// started and saturates at zero once the timeout has elapsed.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    timeout: Option<Duration>,
}

impl Deadline {
    /// Start a deadline now. `None` means the session has no time limit.
    #[must_use]
    pub fn start(timeout: Option<Duration>) -> Self {
        Self::started_at(Instant::now(), timeout)
    }

    #[must_use]
    pub fn started_at(started: Instant, timeout: Option<Duration>) -> Self {
        Self { started, timeout }
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Budget left at the current instant.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.remaining_at(Instant::now())
    }

    /// Budget left at `now`. Instants before the start count as no time elapsed.
    #[must_use]
    pub fn remaining_at(&self, now: Instant) -> Option<Duration> {
        let timeout = self.timeout?;
        let elapsed = now.saturating_duration_since(self.started);
        Some(timeout.saturating_sub(elapsed))
    }
}

/// Combine a statement's own timeout with the session budget.
///
/// A zero statement timeout means "unlimited", the same as none. Without a session budget the
/// statement timeout stands. An unlimited statement takes the budget, and so does one whose
/// timeout is more generous than what the session has left.
#[must_use]
pub fn effective_timeout(
    statement: Option<Duration>,
    budget: Option<Duration>,
) -> Option<Duration> {
    match (statement, budget) {
        (Some(own), None) if own.is_zero() => None,
        (statement, None) => statement,
        (None, Some(budget)) => Some(budget),
        (Some(own), Some(_)) if own.is_zero() => budget,
        (Some(own), Some(budget)) => Some(own.min(budget)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_shrinks_and_saturates() {
        let start = Instant::now();
        let deadline = Deadline::started_at(start, Some(Duration::from_secs(10)));

        assert_eq!(deadline.remaining_at(start), Some(Duration::from_secs(10)));
        assert_eq!(
            deadline.remaining_at(start + Duration::from_secs(4)),
            Some(Duration::from_secs(6))
        );
        assert_eq!(
            deadline.remaining_at(start + Duration::from_secs(30)),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn no_timeout_means_no_budget() {
        let deadline = Deadline::start(None);
        assert_eq!(deadline.remaining(), None);
        assert_eq!(deadline.timeout(), None);
    }

    #[test]
    fn effective_timeout_prefers_the_tighter_limit() {
        let secs = Duration::from_secs;
        assert_eq!(effective_timeout(Some(secs(5)), None), Some(secs(5)));
        assert_eq!(effective_timeout(None, None), None);
        assert_eq!(effective_timeout(None, Some(secs(3))), Some(secs(3)));
        assert_eq!(effective_timeout(Some(secs(5)), Some(secs(3))), Some(secs(3)));
        assert_eq!(effective_timeout(Some(secs(2)), Some(secs(3))), Some(secs(2)));
        assert_eq!(effective_timeout(Some(Duration::ZERO), Some(secs(3))), Some(secs(3)));
    }

    #[test]
    fn zero_statement_timeout_without_budget_is_unlimited() {
        assert_eq!(effective_timeout(Some(Duration::ZERO), None), None);
        assert_eq!(
            effective_timeout(Some(Duration::ZERO), Some(Duration::ZERO)),
            Some(Duration::ZERO)
        );
    }
}
