use std::sync::Arc;

use rusqlite::types::Value;
use rusqlite::{Statement, params_from_iter};

use crate::error::SqlReuseError;
use crate::results::{CustomDbRow, ResultSet, index_columns};
use crate::types::RowValues;

/// Extract a `RowValues` from a `SQLite` row.
///
/// # Errors
/// Returns `SqlReuseError` if the value cannot be read.
pub fn sqlite_extract_value(row: &rusqlite::Row, idx: usize) -> Result<RowValues, SqlReuseError> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    })
}

/// Run `stmt` with `params` and collect every row.
///
/// # Errors
/// Returns `SqlReuseError::SqliteError` if execution or row extraction fails.
pub fn build_result_set(stmt: &mut Statement, params: &[Value]) -> Result<ResultSet, SqlReuseError> {
    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let col_count = column_names.len();

    let mut result_set = ResultSet::with_capacity(10);
    result_set.set_column_names(Arc::new(column_names));

    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    while let Some(row) = rows.next()? {
        let mut row_values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            row_values.push(sqlite_extract_value(row, i)?);
        }
        result_set.add_row_values(row_values);
    }

    Ok(result_set)
}

/// Run `stmt` with `params` and hand each row to `on_row` as it is read.
///
/// Stops at the first error from `on_row` and returns it. Otherwise returns the number of rows
/// visited.
///
/// # Errors
/// Returns `SqlReuseError::SqliteError` if execution or row extraction fails, or the error
/// returned by `on_row`.
pub fn for_each_row<F>(stmt: &mut Statement, params: &[Value], mut on_row: F) -> Result<usize, SqlReuseError>
where
    F: FnMut(&CustomDbRow) -> Result<(), SqlReuseError>,
{
    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let col_count = column_names.len();
    let column_index = Arc::new(index_columns(&column_names));
    let column_names = Arc::new(column_names);

    let mut visited = 0;
    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    while let Some(row) = rows.next()? {
        let mut row_values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            row_values.push(sqlite_extract_value(row, i)?);
        }
        let row = CustomDbRow::with_index(
            Arc::clone(&column_names),
            Arc::clone(&column_index),
            row_values,
        );
        on_row(&row)?;
        visited += 1;
    }

    Ok(visited)
}
