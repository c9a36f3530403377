use std::collections::HashMap;

#[derive(Debug, Clone)]
pub(crate) enum Op {
    Acquire { text: usize, value: i64 },
    DropConnection,
    Flush { rollback: bool },
    Tick(u64),
}

/// Handle the model expects to be cached for one rendered text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Expected {
    pub(crate) handle: u64,
    pub(crate) conn: u64,
}

/// What the cache should contain if it behaves correctly.
#[derive(Debug, Default)]
pub(crate) struct Model {
    pub(crate) cached: HashMap<String, Expected>,
    pub(crate) prepared: u64,
    pub(crate) closed: u64,
}

impl Model {
    /// Handle expected for `sql` on connection `conn`, or `None` when a prepare is due.
    pub(crate) fn reusable(&self, sql: &str, conn: u64) -> Option<Expected> {
        self.cached.get(sql).copied().filter(|e| e.conn == conn)
    }

    pub(crate) fn record_prepare(&mut self, sql: String, conn: u64) -> Expected {
        self.prepared += 1;
        let expected = Expected {
            handle: self.prepared,
            conn,
        };
        self.cached.insert(sql, expected);
        expected
    }

    pub(crate) fn record_flush(&mut self) -> Vec<u64> {
        let mut handles: Vec<u64> = self.cached.drain().map(|(_, e)| e.handle).collect();
        handles.sort_unstable();
        self.closed += handles.len() as u64;
        handles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_entries_are_not_reusable() {
        let mut model = Model::default();
        let e = model.record_prepare("A".into(), 1);
        assert_eq!(model.reusable("A", 1), Some(e));
        assert_eq!(model.reusable("A", 2), None);

        let replaced = model.record_prepare("A".into(), 2);
        assert_eq!(model.cached.len(), 1);
        assert_eq!(model.record_flush(), vec![replaced.handle]);
        assert!(model.cached.is_empty());
    }
}
