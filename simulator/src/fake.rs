use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use sql_reuse::{
    CommandRenderer, ConnectionState, Session, SqlReuseError, StatementHandle, StatementLog,
};

/// Simulated milliseconds since the session started.
#[derive(Clone, Default)]
pub(crate) struct FakeClock {
    now_ms: Rc<Cell<u64>>,
}

impl FakeClock {
    pub(crate) fn now_ms(&self) -> u64 {
        self.now_ms.get()
    }

    pub(crate) fn advance(&self, ms: u64) {
        self.now_ms.set(self.now_ms.get().saturating_add(ms));
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FakeConnection {
    pub(crate) id: u64,
    open: Rc<Cell<bool>>,
}

impl FakeConnection {
    pub(crate) fn is_open(&self) -> bool {
        self.open.get()
    }
}

pub(crate) struct FakeSession {
    clock: FakeClock,
    budget_ms: u64,
    current: Option<FakeConnection>,
    pub(crate) opened: u64,
}

impl FakeSession {
    pub(crate) fn new(clock: FakeClock, budget_ms: u64) -> Self {
        Self {
            clock,
            budget_ms,
            current: None,
            opened: 0,
        }
    }

    pub(crate) fn current(&self) -> Option<&FakeConnection> {
        self.current.as_ref()
    }

    /// Close the connection behind the cache's back.
    pub(crate) fn drop_connection(&mut self) {
        if let Some(conn) = &self.current {
            conn.open.set(false);
        }
    }
}

impl Session for FakeSession {
    type Connection = FakeConnection;

    fn connection(&mut self, log: &StatementLog<'_>) -> Result<FakeConnection, SqlReuseError> {
        if let Some(conn) = &self.current
            && conn.is_open()
        {
            return Ok(conn.clone());
        }
        self.opened += 1;
        tracing::debug!(statement = log.statement_id(), connection = self.opened, "open");
        let conn = FakeConnection {
            id: self.opened,
            open: Rc::new(Cell::new(true)),
        };
        self.current = Some(conn.clone());
        Ok(conn)
    }

    fn remaining_budget(&self) -> Option<Duration> {
        Some(Duration::from_millis(
            self.budget_ms.saturating_sub(self.clock.now_ms()),
        ))
    }
}

pub(crate) struct FakeCommand {
    pub(crate) text: usize,
    pub(crate) value: i64,
}

#[derive(Debug)]
pub(crate) struct FakeHandle {
    pub(crate) id: u64,
    pub(crate) conn: FakeConnection,
    pub(crate) budget: Option<Duration>,
    pub(crate) bound: Option<i64>,
    closed_ids: Rc<RefCell<Vec<u64>>>,
}

impl StatementHandle for FakeHandle {
    fn connection_state(&self) -> Result<ConnectionState, SqlReuseError> {
        Ok(if self.conn.is_open() {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        })
    }

    fn close(&mut self) -> Result<(), SqlReuseError> {
        self.closed_ids.borrow_mut().push(self.id);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeRenderer {
    prepared: Cell<u64>,
    pub(crate) closed_ids: Rc<RefCell<Vec<u64>>>,
}

impl FakeRenderer {
    pub(crate) fn prepared(&self) -> u64 {
        self.prepared.get()
    }

    pub(crate) fn render(text: usize) -> String {
        format!("SELECT c{text} FROM sim WHERE id = ?1")
    }
}

impl CommandRenderer for FakeRenderer {
    type Command = FakeCommand;
    type Connection = FakeConnection;
    type Handle = FakeHandle;

    fn rendered_text(&self, command: &FakeCommand) -> String {
        Self::render(command.text)
    }

    fn prepare(
        &self,
        _command: &FakeCommand,
        _sql: &str,
        connection: &FakeConnection,
        budget: Option<Duration>,
    ) -> Result<FakeHandle, SqlReuseError> {
        self.prepared.set(self.prepared.get() + 1);
        Ok(FakeHandle {
            id: self.prepared.get(),
            conn: connection.clone(),
            budget,
            bound: None,
            closed_ids: Rc::clone(&self.closed_ids),
        })
    }

    fn bind_parameters(
        &self,
        command: &FakeCommand,
        handle: &mut FakeHandle,
    ) -> Result<(), SqlReuseError> {
        handle.bound = Some(command.value);
        Ok(())
    }

    fn apply_time_budget(&self, handle: &mut FakeHandle, budget: Option<Duration>) {
        handle.budget = budget;
    }
}
