// SPDX-License-Identifier: Apache-2.0

use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection};
use serde_json::{Map, Number, Value};
use tourcrm_model::{ColumnKind, ResourceDescriptor};
use tourcrm_query::Value as SqlParam;

use crate::error::StoreError;

/// One record as returned to clients.
pub type Row = Map<String, Value>;

/// One page of a list query.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub rows: Vec<Row>,
    pub total: u64,
}

fn kind_of(desc: &ResourceDescriptor, column: &str) -> Option<ColumnKind> {
    desc.column(column).map(|c| c.kind)
}

fn cell_to_json(kind: Option<ColumnKind>, cell: ValueRef<'_>) -> Value {
    match cell {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => match kind {
            Some(ColumnKind::Bool) => Value::Bool(n != 0),
            _ => Value::Number(n.into()),
        },
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            match kind {
                Some(ColumnKind::Json) => {
                    serde_json::from_str(&text).unwrap_or(Value::String(text.into_owned()))
                }
                _ => Value::String(text.into_owned()),
            }
        }
        ValueRef::Blob(bytes) => Value::String(hex::encode(bytes)),
    }
}

/// Maps a result row selected with `columns` into JSON, typed by `desc`.
pub fn row_to_json(
    desc: &ResourceDescriptor,
    columns: &[&str],
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<Row> {
    let mut out = Map::with_capacity(columns.len());
    for (idx, column) in columns.iter().enumerate() {
        out.insert(
            (*column).to_string(),
            cell_to_json(kind_of(desc, column), row.get_ref(idx)?),
        );
    }
    Ok(out)
}

/// Maps every selected column by its SQLite storage class alone. Used for
/// ad-hoc aggregate queries.
pub fn row_to_plain_json(row: &rusqlite::Row<'_>) -> rusqlite::Result<Row> {
    let stmt = row.as_ref();
    let mut out = Map::with_capacity(stmt.column_count());
    for idx in 0..stmt.column_count() {
        let name = stmt.column_name(idx)?.to_string();
        out.insert(name, cell_to_json(None, row.get_ref(idx)?));
    }
    Ok(out)
}

/// Runs `sql` and maps each row with `map`.
pub fn collect<T, F>(
    conn: &Connection,
    sql: &str,
    params: &[SqlParam],
    mut map: F,
) -> Result<Vec<T>, StoreError>
where
    F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params_from_iter(params.iter()), |r| map(r))?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Runs `sql` and maps every row with [`row_to_plain_json`].
pub fn collect_plain(
    conn: &Connection,
    sql: &str,
    params: &[SqlParam],
) -> Result<Vec<Value>, StoreError> {
    collect(conn, sql, params, |r| row_to_plain_json(r).map(Value::Object))
}

/// Reads one live row of one tenant.
pub fn fetch_row(
    conn: &Connection,
    desc: &ResourceDescriptor,
    organization_id: i64,
    id: i64,
) -> Result<Row, StoreError> {
    let columns = desc.select_columns();
    let sql = format!(
        "SELECT {} FROM {} WHERE id = ?1 AND organization_id = ?2 AND deleted_at IS NULL",
        columns.join(", "),
        desc.table
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let mut rows = stmt.query(rusqlite::params![id, organization_id])?;
    match rows.next()? {
        Some(row) => Ok(row_to_json(desc, &columns, row)?),
        None => Err(StoreError::not_found(desc.name, id)),
    }
}

/// Text value of `column` in `row`, if present and a string.
pub fn text_field<'a>(row: &'a Row, column: &str) -> Option<&'a str> {
    row.get(column).and_then(Value::as_str)
}

pub fn int_field(row: &Row, column: &str) -> Option<i64> {
    row.get(column).and_then(Value::as_i64)
}
