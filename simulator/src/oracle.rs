use sql_reuse::Session;

use crate::fake::{FakeHandle, FakeSession};
use crate::model::Model;

pub(crate) struct Oracle;

impl Oracle {
    /// Check one acquire against the model and advance the model.
    pub(crate) fn check_acquire(
        model: &mut Model,
        sql: &str,
        value: i64,
        handle: &FakeHandle,
        session: &FakeSession,
        prepared: u64,
    ) -> Result<(), String> {
        let current = session
            .current()
            .ok_or_else(|| "acquire returned a handle but the session has no connection".to_string())?;
        if !current.is_open() || handle.conn.id != current.id {
            return Err(format!(
                "handle {} belongs to conn {} but the session holds conn {}",
                handle.id, handle.conn.id, current.id
            ));
        }

        let expected = match model.reusable(sql, current.id) {
            Some(expected) => expected,
            None => model.record_prepare(sql.to_string(), current.id),
        };
        if handle.id != expected.handle {
            return Err(format!(
                "{sql}: got handle {} but expected {:?}",
                handle.id, expected
            ));
        }
        if prepared != model.prepared {
            return Err(format!(
                "{sql}: renderer prepared {prepared} statements, model expects {}",
                model.prepared
            ));
        }

        let budget = session.remaining_budget();
        if handle.budget != budget {
            return Err(format!(
                "{sql}: handle {} carries budget {:?}, session has {:?}",
                handle.id, handle.budget, budget
            ));
        }
        if handle.bound != Some(value) {
            return Err(format!(
                "{sql}: handle {} bound {:?}, expected {value}",
                handle.id, handle.bound
            ));
        }
        Ok(())
    }

    pub(crate) fn check_flush(
        model: &mut Model,
        mut closed: Vec<u64>,
        result_len: usize,
        cache_len: usize,
    ) -> Result<(), String> {
        let expected = model.record_flush();
        closed.sort_unstable();
        if closed != expected {
            return Err(format!("flush closed {closed:?}, expected {expected:?}"));
        }
        if result_len != 0 {
            return Err(format!("flush returned {result_len} batch results"));
        }
        if cache_len != 0 {
            return Err(format!("{cache_len} statements survived a flush"));
        }
        Ok(())
    }

    pub(crate) fn check_size(model: &Model, cache_len: usize) -> Result<(), String> {
        if cache_len != model.cached.len() {
            return Err(format!(
                "cache holds {cache_len} statements, model expects {}",
                model.cached.len()
            ));
        }
        Ok(())
    }
}
