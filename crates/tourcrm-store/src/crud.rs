// SPDX-License-Identifier: Apache-2.0

//! Tenant-scoped create, read, update and soft delete for every collection
//! described by a [`ResourceDescriptor`].

use chrono::Datelike;
use rusqlite::{params, params_from_iter, Connection};
use tourcrm_core::{OrganizationId, RecordId, UserId};
use tourcrm_model::{validate_body, FieldError, InvoiceStatus, ResourceDescriptor, SqlValue};
use tourcrm_query::{
    build_count_sql, build_insert_sql, build_list_sql, build_update_sql, season_overlap_sql,
    to_sql_value, ListQuery, Value, WhereBuilder,
};
use tracing::debug;

use crate::error::StoreError;
use crate::numbering::next_document_number;
use crate::pool::Ctx;
use crate::quotations;
use crate::row::{fetch_row, int_field, row_to_json, text_field, Page, Row};

/// Column pairs whose second date may not precede the first.
const DATE_PAIRS: &[(&str, &str)] = &[
    ("start_date", "end_date"),
    ("travel_start", "travel_end"),
    ("issue_date", "due_date"),
];

pub(crate) type Assignments = Vec<(&'static str, SqlValue)>;

fn assigned<'a>(values: &'a [(&'static str, SqlValue)], column: &str) -> Option<&'a SqlValue> {
    values.iter().find(|(c, _)| *c == column).map(|(_, v)| v)
}

/// Value a column will hold after the write: the assignment if present,
/// else what the stored row holds.
fn effective_text(values: &[(&'static str, SqlValue)], existing: Option<&Row>, column: &str) -> Option<String> {
    match assigned(values, column) {
        Some(SqlValue::Text(s)) => Some(s.clone()),
        Some(_) => None,
        None => existing.and_then(|r| text_field(r, column)).map(str::to_string),
    }
}

fn effective_int(values: &[(&'static str, SqlValue)], existing: Option<&Row>, column: &str) -> Option<i64> {
    match assigned(values, column) {
        Some(SqlValue::Integer(n)) => Some(*n),
        Some(_) => None,
        None => existing.and_then(|r| int_field(r, column)),
    }
}

fn check_date_order(
    desc: &ResourceDescriptor,
    values: &[(&'static str, SqlValue)],
    existing: Option<&Row>,
) -> Result<(), StoreError> {
    let mut errors = Vec::new();
    for (start, end) in DATE_PAIRS {
        if desc.column(start).is_none() || desc.column(end).is_none() {
            continue;
        }
        if let (Some(s), Some(e)) = (
            effective_text(values, existing, start),
            effective_text(values, existing, end),
        ) {
            if e < s {
                errors.push(FieldError::new(end, format!("must not be before {start}")));
            }
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(StoreError::Validation(errors))
    }
}

/// True when `table` holds a live row `id` of the tenant.
pub(crate) fn live_row_exists(
    conn: &Connection,
    table: &str,
    organization_id: i64,
    id: i64,
) -> Result<bool, StoreError> {
    let sql = format!(
        "SELECT EXISTS (SELECT 1 FROM {table} WHERE id = ?1 AND organization_id = ?2 AND deleted_at IS NULL)"
    );
    Ok(conn.query_row(&sql, params![id, organization_id], |r| r.get::<_, bool>(0))?)
}

fn check_references(
    conn: &Connection,
    desc: &ResourceDescriptor,
    organization_id: i64,
    values: &[(&'static str, SqlValue)],
) -> Result<(), StoreError> {
    let mut errors = Vec::new();
    for (column, table) in desc.reference_columns() {
        if let Some(SqlValue::Integer(id)) = assigned(values, column) {
            if !live_row_exists(conn, table, organization_id, *id)? {
                errors.push(FieldError::new(
                    column,
                    format!("references missing {table} record {id}"),
                ));
            }
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(StoreError::Validation(errors))
    }
}

/// Value a column will hold after the write, as a bind parameter.
fn effective_param(values: &[(&'static str, SqlValue)], existing: Option<&Row>, column: &str) -> Value {
    match assigned(values, column) {
        Some(v) => to_sql_value(v),
        None => match existing.and_then(|r| r.get(column)) {
            Some(serde_json::Value::String(s)) => Value::Text(s.clone()),
            Some(serde_json::Value::Number(n)) => n.as_i64().map_or(Value::Null, Value::Integer),
            _ => Value::Null,
        },
    }
}

fn check_season_overlap(
    conn: &Connection,
    desc: &ResourceDescriptor,
    organization_id: i64,
    exclude_id: i64,
    values: &[(&'static str, SqlValue)],
    existing: Option<&Row>,
) -> Result<(), StoreError> {
    let Some(parent) = desc.season_parent else {
        return Ok(());
    };
    let touched = existing.is_none()
        || [parent, "start_date", "end_date"]
            .iter()
            .chain(desc.season_keys)
            .any(|c| assigned(values, c).is_some());
    if !touched {
        return Ok(());
    }
    let (Some(parent_id), Some(start), Some(end)) = (
        effective_int(values, existing, parent),
        effective_text(values, existing, "start_date"),
        effective_text(values, existing, "end_date"),
    ) else {
        return Ok(());
    };
    let mut binds = vec![Value::Integer(organization_id), Value::Integer(parent_id)];
    binds.extend(
        desc.season_keys
            .iter()
            .map(|k| effective_param(values, existing, k)),
    );
    binds.extend([
        Value::Integer(exclude_id),
        Value::Text(end.clone()),
        Value::Text(start.clone()),
    ]);
    let sql = season_overlap_sql(desc.table, parent, desc.season_keys);
    let mut stmt = conn.prepare_cached(&sql)?;
    let mut rows = stmt.query(params_from_iter(binds.iter()))?;
    if let Some(row) = rows.next()? {
        let id: i64 = row.get(0)?;
        let other_start: String = row.get(1)?;
        let other_end: String = row.get(2)?;
        return Err(StoreError::Conflict {
            message: format!(
                "season {start}..{end} overlaps {} {id} ({other_start}..{other_end})",
                desc.name
            ),
            conflicting_id: Some(id),
        });
    }
    Ok(())
}

fn is_invoice(desc: &ResourceDescriptor) -> bool {
    matches!(desc.table, "invoices_receivable" | "invoices_payable")
}

/// Keeps `status` in step with a changed `amount_cents`.
fn reconcile_invoice_amount(existing: &Row, values: &mut Assignments) -> Result<(), StoreError> {
    if text_field(existing, "status") == Some(InvoiceStatus::Cancelled.as_str()) {
        return Err(StoreError::InvalidTransition(
            "cancelled invoices cannot be edited".to_string(),
        ));
    }
    if let Some(SqlValue::Integer(amount)) = assigned(values, "amount_cents").cloned() {
        let paid = int_field(existing, "paid_cents").unwrap_or(0);
        if amount < paid {
            return Err(StoreError::field(
                "amount_cents",
                format!("must not be below the {paid} cents already paid"),
            ));
        }
        let status = InvoiceStatus::from_amounts(amount, paid);
        values.push(("status", SqlValue::Text(status.as_str().to_string())));
    }
    Ok(())
}

/// Inserts already validated values, running reference, date-order and
/// season checks and assigning a document number when the resource has one.
pub(crate) fn insert_validated(
    conn: &Connection,
    ctx: &Ctx<'_>,
    desc: &ResourceDescriptor,
    organization_id: i64,
    created_by: Option<i64>,
    values: &[(&'static str, SqlValue)],
) -> Result<i64, StoreError> {
    check_date_order(desc, values, None)?;
    check_references(conn, desc, organization_id, values)?;
    check_season_overlap(conn, desc, organization_id, 0, values, None)?;
    let mut assignments: Vec<(&str, Value)> =
        values.iter().map(|(c, v)| (*c, to_sql_value(v))).collect();
    if let Some((prefix, column)) = desc.number_prefix {
        let year = ctx.clock.today().year();
        let number = next_document_number(conn, organization_id, prefix, year)?;
        assignments.push((column, Value::Text(number)));
    }
    let now = ctx.clock.now_rfc3339();
    let (sql, params) = build_insert_sql(desc.table, organization_id, created_by, &now, &assignments);
    conn.execute(&sql, params_from_iter(params.iter()))?;
    let id = conn.last_insert_rowid();
    debug!(table = desc.table, id, organization_id, "row inserted");
    Ok(id)
}

/// Applies already validated values to one live row.
pub(crate) fn update_validated(
    conn: &Connection,
    ctx: &Ctx<'_>,
    desc: &ResourceDescriptor,
    organization_id: i64,
    id: i64,
    existing: &Row,
    values: &[(&'static str, SqlValue)],
) -> Result<(), StoreError> {
    check_date_order(desc, values, Some(existing))?;
    check_references(conn, desc, organization_id, values)?;
    check_season_overlap(conn, desc, organization_id, id, values, Some(existing))?;
    let assignments: Vec<(&str, Value)> =
        values.iter().map(|(c, v)| (*c, to_sql_value(v))).collect();
    let now = ctx.clock.now_rfc3339();
    let (sql, params) = build_update_sql(desc.table, organization_id, id, &now, &assignments);
    let changed = conn.execute(&sql, params_from_iter(params.iter()))?;
    if changed == 0 {
        return Err(StoreError::not_found(desc.name, id));
    }
    Ok(())
}

/// Lists rows matching an explicit predicate. The builder must already carry
/// the tenant scope.
pub fn list_with(
    conn: &Connection,
    desc: &ResourceDescriptor,
    filter: &WhereBuilder,
    query: &ListQuery,
) -> Result<Page, StoreError> {
    let columns = desc.select_columns();
    let (count_sql, count_params) = build_count_sql(desc.table, filter);
    let total: i64 = conn.query_row(&count_sql, params_from_iter(count_params.iter()), |r| r.get(0))?;
    let (sql, params) = build_list_sql(desc.table, &columns, filter, &query.sort, &query.page);
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(params.iter()), |r| row_to_json(desc, &columns, r))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Page {
        rows,
        total: u64::try_from(total).unwrap_or(0),
    })
}

pub fn list(
    conn: &Connection,
    desc: &ResourceDescriptor,
    org: OrganizationId,
    query: &ListQuery,
) -> Result<Page, StoreError> {
    let mut filter = WhereBuilder::tenant(org.get());
    filter.apply(query, &desc.searchable_columns());
    list_with(conn, desc, &filter, query)
}

pub fn get(
    conn: &Connection,
    desc: &ResourceDescriptor,
    org: OrganizationId,
    id: RecordId,
) -> Result<Row, StoreError> {
    fetch_row(conn, desc, org.get(), id.get())
}

pub fn create(
    conn: &mut Connection,
    ctx: &Ctx<'_>,
    desc: &ResourceDescriptor,
    org: OrganizationId,
    user: Option<UserId>,
    body: &Row,
) -> Result<Row, StoreError> {
    if desc.table == "users" {
        return Err(StoreError::field(
            "password",
            "users must be created with a password through the user registration endpoint",
        ));
    }
    let values = validate_body(desc, body, false).map_err(StoreError::Validation)?;
    let tx = conn.savepoint()?;
    let id = insert_validated(&tx, ctx, desc, org.get(), user.map(UserId::get), &values)?;
    let row = fetch_row(&tx, desc, org.get(), id)?;
    tx.commit()?;
    Ok(row)
}

pub fn update(
    conn: &mut Connection,
    ctx: &Ctx<'_>,
    desc: &ResourceDescriptor,
    org: OrganizationId,
    id: RecordId,
    body: &Row,
) -> Result<Row, StoreError> {
    let mut values = validate_body(desc, body, true).map_err(StoreError::Validation)?;
    let (org, id) = (org.get(), id.get());
    let tx = conn.savepoint()?;
    let existing = fetch_row(&tx, desc, org, id)?;
    if desc.table == "quotations" {
        quotations::ensure_editable(&existing)?;
    } else if is_invoice(desc) {
        reconcile_invoice_amount(&existing, &mut values)?;
    }
    update_validated(&tx, ctx, desc, org, id, &existing, &values)?;
    if desc.table == "quotations"
        && values.iter().any(|(c, _)| matches!(*c, "markup_pct" | "tax_pct"))
    {
        quotations::recalculate_totals(&tx, ctx, org, id)?;
    }
    let row = fetch_row(&tx, desc, org, id)?;
    tx.commit()?;
    Ok(row)
}

/// Marks a row deleted. Quotations take their days and expenses with them;
/// invoices with recorded payments are kept.
pub fn soft_delete(
    conn: &mut Connection,
    ctx: &Ctx<'_>,
    desc: &ResourceDescriptor,
    org: OrganizationId,
    id: RecordId,
) -> Result<(), StoreError> {
    let (org, id) = (org.get(), id.get());
    let now = ctx.clock.now_rfc3339();
    let tx = conn.savepoint()?;
    if is_invoice(desc) {
        let existing = fetch_row(&tx, desc, org, id)?;
        if int_field(&existing, "paid_cents").unwrap_or(0) > 0 {
            return Err(StoreError::InvalidTransition(
                "invoices with recorded payments cannot be deleted".to_string(),
            ));
        }
    }
    let changed = tx.execute(
        &format!(
            "UPDATE {} SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2 AND organization_id = ?3 AND deleted_at IS NULL",
            desc.table
        ),
        params![now, id, org],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found(desc.name, id));
    }
    if desc.table == "quotations" {
        for child in ["quotation_days", "quotation_expenses"] {
            tx.execute(
                &format!(
                    "UPDATE {child} SET deleted_at = ?1, updated_at = ?1 WHERE quotation_id = ?2 AND organization_id = ?3 AND deleted_at IS NULL"
                ),
                params![now, id, org],
            )?;
        }
    }
    tx.commit()?;
    debug!(table = desc.table, id, organization_id = org, "row soft-deleted");
    Ok(())
}
