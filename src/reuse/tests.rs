use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Duration;

use super::*;
use crate::error::SqlReuseError;

#[derive(Debug, Clone)]
struct MockConnection {
    id: u64,
    open: Rc<Cell<bool>>,
    inspect_fails: Rc<Cell<bool>>,
}

impl MockConnection {
    fn close(&self) {
        self.open.set(false);
    }
}

#[derive(Default)]
struct MockSession {
    current: Option<MockConnection>,
    opened: Vec<String>,
    budget: Option<Duration>,
    refuse_connections: bool,
}

impl Session for MockSession {
    type Connection = MockConnection;

    fn connection(&mut self, log: &StatementLog<'_>) -> Result<MockConnection, SqlReuseError> {
        if self.refuse_connections {
            return Err(SqlReuseError::ConnectionError("refused".into()));
        }
        if let Some(conn) = &self.current
            && conn.open.get()
        {
            return Ok(conn.clone());
        }
        self.opened.push(log.statement_id().to_string());
        let conn = MockConnection {
            id: self.opened.len() as u64,
            open: Rc::new(Cell::new(true)),
            inspect_fails: Rc::new(Cell::new(false)),
        };
        self.current = Some(conn.clone());
        Ok(conn)
    }

    fn remaining_budget(&self) -> Option<Duration> {
        self.budget
    }
}

#[derive(Debug)]
struct MockHandle {
    id: u64,
    conn: MockConnection,
    prepared_budget: Option<Duration>,
    budget: Option<Duration>,
    bound: Vec<i64>,
    closes: Rc<RefCell<Vec<u64>>>,
    fail_close: bool,
}

impl StatementHandle for MockHandle {
    fn connection_state(&self) -> Result<ConnectionState, SqlReuseError> {
        if self.conn.inspect_fails.get() {
            return Err(SqlReuseError::ConnectionError("connection unusable".into()));
        }
        Ok(if self.conn.open.get() {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        })
    }

    fn close(&mut self) -> Result<(), SqlReuseError> {
        self.closes.borrow_mut().push(self.id);
        if self.fail_close {
            Err(SqlReuseError::Other(format!("close failed for {}", self.id)))
        } else {
            Ok(())
        }
    }
}

struct MockCommand {
    sql: &'static str,
    params: Vec<i64>,
}

fn cmd(sql: &'static str) -> MockCommand {
    MockCommand {
        sql,
        params: Vec::new(),
    }
}

#[derive(Default)]
struct MockRenderer {
    prepares: Cell<u64>,
    fail_prepare: Cell<bool>,
    fail_close_for: RefCell<HashSet<&'static str>>,
    closes: Rc<RefCell<Vec<u64>>>,
}

impl CommandRenderer for MockRenderer {
    type Command = MockCommand;
    type Connection = MockConnection;
    type Handle = MockHandle;

    fn rendered_text(&self, command: &MockCommand) -> String {
        command.sql.to_string()
    }

    fn prepare(
        &self,
        command: &MockCommand,
        sql: &str,
        connection: &MockConnection,
        budget: Option<Duration>,
    ) -> Result<MockHandle, SqlReuseError> {
        assert_eq!(command.sql, sql);
        if self.fail_prepare.get() {
            return Err(SqlReuseError::PrepareError(format!("cannot prepare {sql}")));
        }
        self.prepares.set(self.prepares.get() + 1);
        Ok(MockHandle {
            id: self.prepares.get(),
            conn: connection.clone(),
            prepared_budget: budget,
            budget,
            bound: Vec::new(),
            closes: Rc::clone(&self.closes),
            fail_close: self.fail_close_for.borrow().contains(command.sql),
        })
    }

    fn bind_parameters(
        &self,
        command: &MockCommand,
        handle: &mut MockHandle,
    ) -> Result<(), SqlReuseError> {
        handle.bound.clone_from(&command.params);
        Ok(())
    }

    fn apply_time_budget(&self, handle: &mut MockHandle, budget: Option<Duration>) {
        handle.budget = budget;
    }
}

fn log() -> StatementLog<'static> {
    StatementLog::new("test.statement")
}

fn acquire_id(
    cache: &mut ReuseCache<MockHandle>,
    session: &mut MockSession,
    renderer: &MockRenderer,
    command: &MockCommand,
) -> u64 {
    cache
        .acquire(session, renderer, command, &log())
        .expect("acquire")
        .id
}

#[test]
fn select_scenario_prepares_twice_and_flushes_both() {
    let mut cache = ReuseCache::new();
    let mut session = MockSession::default();
    let renderer = MockRenderer::default();

    let h1 = acquire_id(&mut cache, &mut session, &renderer, &cmd("SELECT 1"));
    assert_eq!(renderer.prepares.get(), 1);

    let again = acquire_id(&mut cache, &mut session, &renderer, &cmd("SELECT 1"));
    assert_eq!(again, h1);
    assert_eq!(renderer.prepares.get(), 1);

    let h2 = acquire_id(&mut cache, &mut session, &renderer, &cmd("SELECT 2"));
    assert_ne!(h2, h1);
    assert_eq!(renderer.prepares.get(), 2);

    let result = cache.flush_all(false);
    assert!(result.is_empty());
    assert!(cache.is_empty());
    let mut closed = renderer.closes.borrow().clone();
    closed.sort_unstable();
    assert_eq!(closed, vec![h1, h2]);
}

#[test]
fn identical_text_returns_same_handle_instance() {
    let mut cache = ReuseCache::new();
    let mut session = MockSession::default();
    let renderer = MockRenderer::default();
    let command = cmd("UPDATE t SET a = ?1");

    let first: *const MockHandle = cache
        .acquire(&mut session, &renderer, &command, &log())
        .expect("first acquire");
    let second: *const MockHandle = cache
        .acquire(&mut session, &renderer, &command, &log())
        .expect("second acquire");

    assert!(std::ptr::eq(first, second));
    assert_eq!(renderer.prepares.get(), 1);
    assert_eq!(cache.stats().hits, 1);
    assert_eq!(cache.stats().misses, 1);
}

#[test]
fn distinct_text_never_shares_a_handle() {
    let mut cache = ReuseCache::new();
    let mut session = MockSession::default();
    let renderer = MockRenderer::default();

    let a = acquire_id(&mut cache, &mut session, &renderer, &cmd("SELECT a FROM t"));
    let b = acquire_id(&mut cache, &mut session, &renderer, &cmd("SELECT b FROM t"));
    assert_ne!(a, b);
    assert_eq!(cache.len(), 2);
    assert!(cache.contains("SELECT a FROM t"));
    assert!(cache.contains("SELECT b FROM t"));

    // both stay independently cached
    assert_eq!(acquire_id(&mut cache, &mut session, &renderer, &cmd("SELECT a FROM t")), a);
    assert_eq!(acquire_id(&mut cache, &mut session, &renderer, &cmd("SELECT b FROM t")), b);
    assert_eq!(renderer.prepares.get(), 2);
}

#[test]
fn closed_connection_triggers_reprepare_not_failure() {
    let mut cache = ReuseCache::new();
    let mut session = MockSession::default();
    let renderer = MockRenderer::default();
    let command = cmd("SELECT 1");

    let stale_id = acquire_id(&mut cache, &mut session, &renderer, &command);
    session.current.as_ref().expect("connection").close();

    let fresh = cache
        .acquire(&mut session, &renderer, &command, &log())
        .expect("stale entry must not surface as an error");
    assert_ne!(fresh.id, stale_id);
    assert_eq!(fresh.conn.id, 2);
    assert_eq!(fresh.connection_state().expect("state"), ConnectionState::Open);

    assert_eq!(cache.len(), 1);
    assert_eq!(renderer.prepares.get(), 2);
    assert_eq!(cache.stats().stale_evictions, 1);
    // the evicted handle is dropped, not closed
    assert!(renderer.closes.borrow().is_empty());
}

#[test]
fn failing_liveness_check_counts_as_stale() {
    let mut cache = ReuseCache::new();
    let mut session = MockSession::default();
    let renderer = MockRenderer::default();
    let command = cmd("SELECT 1");

    let first = acquire_id(&mut cache, &mut session, &renderer, &command);
    let conn = session.current.clone().expect("connection");
    conn.inspect_fails.set(true);

    let second = acquire_id(&mut cache, &mut session, &renderer, &command);
    assert_ne!(first, second);
    assert_eq!(renderer.prepares.get(), 2);
}

#[test]
fn reused_handle_gets_the_current_budget() {
    let mut cache = ReuseCache::new();
    let mut session = MockSession {
        budget: Some(Duration::from_secs(10)),
        ..MockSession::default()
    };
    let renderer = MockRenderer::default();
    let command = cmd("SELECT 1");

    acquire_id(&mut cache, &mut session, &renderer, &command);
    session.budget = Some(Duration::from_secs(7));
    acquire_id(&mut cache, &mut session, &renderer, &command);
    session.budget = Some(Duration::from_secs(3));

    let handle = cache
        .acquire(&mut session, &renderer, &command, &log())
        .expect("acquire");
    assert_eq!(handle.prepared_budget, Some(Duration::from_secs(10)));
    assert_eq!(handle.budget, Some(Duration::from_secs(3)));
    assert_eq!(renderer.prepares.get(), 1);
}

#[test]
fn parameters_are_rebound_on_every_acquire() {
    let mut cache = ReuseCache::new();
    let mut session = MockSession::default();
    let renderer = MockRenderer::default();

    let first = MockCommand {
        sql: "SELECT * FROM t WHERE id = ?1",
        params: vec![1],
    };
    let second = MockCommand {
        sql: "SELECT * FROM t WHERE id = ?1",
        params: vec![42],
    };

    assert_eq!(
        cache
            .acquire(&mut session, &renderer, &first, &log())
            .expect("acquire")
            .bound,
        vec![1]
    );
    assert_eq!(
        cache
            .acquire(&mut session, &renderer, &second, &log())
            .expect("acquire")
            .bound,
        vec![42]
    );
}

#[test]
fn flush_drains_and_second_flush_is_a_noop() {
    let mut cache = ReuseCache::new();
    let mut session = MockSession::default();
    let renderer = MockRenderer::default();

    for sql in ["A", "B", "C"] {
        acquire_id(&mut cache, &mut session, &renderer, &cmd(sql));
    }
    assert_eq!(cache.len(), 3);

    assert!(cache.flush_all(false).is_empty());
    assert_eq!(renderer.closes.borrow().len(), 3);
    assert!(cache.is_empty());

    assert!(cache.flush_all(false).is_empty());
    assert_eq!(renderer.closes.borrow().len(), 3);
    assert_eq!(cache.stats().flushes, 2);
    assert_eq!(cache.stats().closed, 3);
}

#[test]
fn rollback_flag_does_not_change_flush() {
    fn closed_after_flush(rollback: bool) -> (Vec<u64>, usize, usize) {
        let mut cache = ReuseCache::new();
        let mut session = MockSession::default();
        let renderer = MockRenderer::default();
        for sql in ["A", "B", "C"] {
            acquire_id(&mut cache, &mut session, &renderer, &cmd(sql));
        }
        let result = cache.flush_all(rollback);
        let mut closed = renderer.closes.borrow().clone();
        closed.sort_unstable();
        (closed, result.len(), cache.len())
    }

    assert_eq!(closed_after_flush(true), closed_after_flush(false));
    assert_eq!(closed_after_flush(true), (vec![1, 2, 3], 0, 0));
}

#[test]
fn close_failure_does_not_stop_the_flush() {
    let mut cache = ReuseCache::new();
    let mut session = MockSession::default();
    let renderer = MockRenderer::default();
    renderer.fail_close_for.borrow_mut().insert("B");

    for sql in ["A", "B", "C"] {
        acquire_id(&mut cache, &mut session, &renderer, &cmd(sql));
    }

    assert!(cache.flush_all(false).is_empty());
    assert_eq!(renderer.closes.borrow().len(), 3);
    assert!(cache.is_empty());
    assert_eq!(cache.stats().closed, 2);
    assert_eq!(cache.stats().close_failures, 1);
}

#[test]
fn prepare_failure_leaves_cache_unchanged() {
    let mut cache = ReuseCache::new();
    let mut session = MockSession::default();
    let renderer = MockRenderer::default();

    let original = acquire_id(&mut cache, &mut session, &renderer, &cmd("SELECT 1"));
    session.current.as_ref().expect("connection").close();
    renderer.fail_prepare.set(true);

    let err = cache
        .acquire(&mut session, &renderer, &cmd("SELECT 1"), &log())
        .expect_err("prepare failure must propagate");
    assert!(matches!(err, SqlReuseError::PrepareError(_)));
    let err = cache
        .acquire(&mut session, &renderer, &cmd("SELECT 2"), &log())
        .expect_err("prepare failure must propagate");
    assert!(matches!(err, SqlReuseError::PrepareError(_)));

    assert_eq!(cache.len(), 1);
    assert!(!cache.contains("SELECT 2"));
    assert_eq!(cache.stats().stale_evictions, 0);

    renderer.fail_prepare.set(false);
    let replacement = acquire_id(&mut cache, &mut session, &renderer, &cmd("SELECT 1"));
    assert_ne!(replacement, original);
}

#[test]
fn connection_failure_propagates() {
    let mut cache = ReuseCache::new();
    let mut session = MockSession {
        refuse_connections: true,
        ..MockSession::default()
    };
    let renderer = MockRenderer::default();

    let err = cache
        .acquire(&mut session, &renderer, &cmd("SELECT 1"), &log())
        .expect_err("connection failure must propagate");
    assert!(matches!(err, SqlReuseError::ConnectionError(_)));
    assert!(cache.is_empty());
    assert_eq!(renderer.prepares.get(), 0);
}

#[test]
fn connection_opens_once_and_logs_the_first_statement() {
    let mut cache = ReuseCache::new();
    let mut session = MockSession::default();
    let renderer = MockRenderer::default();

    cache
        .acquire(&mut session, &renderer, &cmd("A"), &StatementLog::new("mapper.first"))
        .expect("acquire");
    cache
        .acquire(&mut session, &renderer, &cmd("B"), &StatementLog::new("mapper.second"))
        .expect("acquire");
    cache
        .acquire(&mut session, &renderer, &cmd("A"), &StatementLog::new("mapper.third"))
        .expect("acquire");

    assert_eq!(session.opened, vec!["mapper.first".to_string()]);
}

#[test]
fn hit_rate_reflects_reuse() {
    let mut cache = ReuseCache::new();
    let mut session = MockSession::default();
    let renderer = MockRenderer::default();
    assert_eq!(cache.stats().hit_rate(), 0.0);

    for _ in 0..4 {
        acquire_id(&mut cache, &mut session, &renderer, &cmd("SELECT 1"));
    }
    assert!((cache.stats().hit_rate() - 0.75).abs() < f64::EPSILON);
}
