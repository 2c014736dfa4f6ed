// SPDX-License-Identifier: Apache-2.0

use rusqlite::{params, Connection};
use serde::Serialize;
use serde_json::{json, Value};
use tourcrm_core::money::{apply_percent, format_money};
use tourcrm_core::{OrganizationId, RecordId, UserId};
use tourcrm_model::{
    resource_by_name, validate_body, BookingStatus, QuotationStatus, RequestStatus,
    ResourceDescriptor, SqlValue, QUOTATION_DAYS, QUOTATION_EXPENSES,
};
use tourcrm_query::{ListQuery, Value as SqlParam, WhereBuilder};
use tracing::info;

use crate::crud::{insert_validated, list_with, update_validated, Assignments};
use crate::error::StoreError;
use crate::pool::Ctx;
use crate::row::{collect, fetch_row, int_field, row_to_json, text_field, Page, Row};

fn quotations() -> Result<&'static ResourceDescriptor, StoreError> {
    resource_by_name("quotations")
        .ok_or_else(|| StoreError::Sql("quotations descriptor missing".to_string()))
}

fn bookings() -> Result<&'static ResourceDescriptor, StoreError> {
    resource_by_name("bookings")
        .ok_or_else(|| StoreError::Sql("bookings descriptor missing".to_string()))
}

fn status_of(quotation: &Row) -> Result<QuotationStatus, StoreError> {
    let raw = text_field(quotation, "status").unwrap_or_default();
    QuotationStatus::parse(raw).map_err(|e| StoreError::Sql(e.to_string()))
}

/// Only drafts may change their content.
pub(crate) fn ensure_editable(quotation: &Row) -> Result<(), StoreError> {
    let status = status_of(quotation)?;
    if status.is_editable() {
        return Ok(());
    }
    Err(StoreError::InvalidTransition(format!(
        "quotation {} is {status}; only draft quotations can be edited",
        text_field(quotation, "quote_number").unwrap_or("?")
    )))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotationTotals {
    pub subtotal_cents: i64,
    pub markup_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

impl QuotationTotals {
    /// `markup = subtotal × markup%`, `tax = (subtotal + markup) × tax%`.
    /// Fails when any sum leaves the `i64` range.
    pub fn compute(subtotal_cents: i64, markup_bp: i64, tax_bp: i64) -> Result<Self, StoreError> {
        let too_large = || StoreError::field("unit_price_cents", "quotation total is too large");
        let markup_cents = checked_percent(subtotal_cents, markup_bp).ok_or_else(too_large)?;
        let taxable = subtotal_cents.checked_add(markup_cents).ok_or_else(too_large)?;
        let tax_cents = checked_percent(taxable, tax_bp).ok_or_else(too_large)?;
        let total_cents = taxable.checked_add(tax_cents).ok_or_else(too_large)?;
        Ok(Self {
            subtotal_cents,
            markup_cents,
            tax_cents,
            total_cents,
        })
    }
}

/// `apply_percent` saturates; a saturated result is an overflow here.
fn checked_percent(cents: i64, basis_points: i64) -> Option<i64> {
    let value = apply_percent(cents, basis_points);
    (value != i64::MAX && value != i64::MIN).then_some(value)
}

/// Recomputes and stores the totals of one quotation from its live expenses.
pub(crate) fn recalculate_totals(
    conn: &Connection,
    ctx: &Ctx<'_>,
    organization_id: i64,
    quotation_id: i64,
) -> Result<QuotationTotals, StoreError> {
    let (markup_bp, tax_bp): (i64, i64) = conn.query_row(
        "SELECT markup_pct, tax_pct FROM quotations WHERE id = ?1 AND organization_id = ?2 AND deleted_at IS NULL",
        params![quotation_id, organization_id],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    let mut stmt = conn.prepare_cached(
        "SELECT total_cents FROM quotation_expenses
         WHERE quotation_id = ?1 AND organization_id = ?2 AND deleted_at IS NULL",
    )?;
    let lines = stmt
        .query_map(params![quotation_id, organization_id], |r| r.get::<_, i64>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    let subtotal = lines
        .into_iter()
        .try_fold(0_i64, i64::checked_add)
        .ok_or_else(|| StoreError::field("unit_price_cents", "quotation subtotal is too large"))?;
    let totals = QuotationTotals::compute(subtotal, markup_bp, tax_bp)?;
    conn.execute(
        "UPDATE quotations SET subtotal_cents = ?1, markup_cents = ?2, tax_cents = ?3, total_cents = ?4, updated_at = ?5
         WHERE id = ?6 AND organization_id = ?7",
        params![
            totals.subtotal_cents,
            totals.markup_cents,
            totals.tax_cents,
            totals.total_cents,
            ctx.clock.now_rfc3339(),
            quotation_id,
            organization_id
        ],
    )?;
    Ok(totals)
}

fn load_editable(conn: &Connection, org: i64, quotation_id: i64) -> Result<Row, StoreError> {
    let quotation = fetch_row(conn, quotations()?, org, quotation_id)?;
    ensure_editable(&quotation)?;
    Ok(quotation)
}

fn child_in_quotation(
    conn: &Connection,
    desc: &ResourceDescriptor,
    org: i64,
    quotation_id: i64,
    id: i64,
) -> Result<Row, StoreError> {
    let row = fetch_row(conn, desc, org, id)?;
    if int_field(&row, "quotation_id") != Some(quotation_id) {
        return Err(StoreError::not_found(desc.name, id));
    }
    Ok(row)
}

fn list_children(
    conn: &Connection,
    desc: &ResourceDescriptor,
    org: OrganizationId,
    quotation_id: RecordId,
    query: &ListQuery,
) -> Result<Page, StoreError> {
    fetch_row(conn, quotations()?, org.get(), quotation_id.get())?;
    let mut filter = WhereBuilder::tenant(org.get());
    filter.eq("quotation_id", SqlParam::Integer(quotation_id.get()));
    filter.apply(query, &desc.searchable_columns());
    list_with(conn, desc, &filter, query)
}

pub fn list_days(
    conn: &Connection,
    org: OrganizationId,
    quotation_id: RecordId,
    query: &ListQuery,
) -> Result<Page, StoreError> {
    list_children(conn, &QUOTATION_DAYS, org, quotation_id, query)
}

pub fn list_expenses(
    conn: &Connection,
    org: OrganizationId,
    quotation_id: RecordId,
    query: &ListQuery,
) -> Result<Page, StoreError> {
    list_children(conn, &QUOTATION_EXPENSES, org, quotation_id, query)
}

pub fn get_day(
    conn: &Connection,
    org: OrganizationId,
    quotation_id: RecordId,
    day_id: RecordId,
) -> Result<Row, StoreError> {
    fetch_row(conn, quotations()?, org.get(), quotation_id.get())?;
    child_in_quotation(conn, &QUOTATION_DAYS, org.get(), quotation_id.get(), day_id.get())
}

pub fn get_expense(
    conn: &Connection,
    org: OrganizationId,
    quotation_id: RecordId,
    expense_id: RecordId,
) -> Result<Row, StoreError> {
    fetch_row(conn, quotations()?, org.get(), quotation_id.get())?;
    child_in_quotation(
        conn,
        &QUOTATION_EXPENSES,
        org.get(),
        quotation_id.get(),
        expense_id.get(),
    )
}

pub fn add_day(
    conn: &mut Connection,
    ctx: &Ctx<'_>,
    org: OrganizationId,
    user: Option<UserId>,
    quotation_id: RecordId,
    body: &Row,
) -> Result<Row, StoreError> {
    let mut values = validate_body(&QUOTATION_DAYS, body, false).map_err(StoreError::Validation)?;
    let (org, qid) = (org.get(), quotation_id.get());
    let tx = conn.savepoint()?;
    load_editable(&tx, org, qid)?;
    values.push(("quotation_id", SqlValue::Integer(qid)));
    let id = insert_validated(&tx, ctx, &QUOTATION_DAYS, org, user.map(UserId::get), &values)?;
    let row = fetch_row(&tx, &QUOTATION_DAYS, org, id)?;
    tx.commit()?;
    Ok(row)
}

pub fn update_day(
    conn: &mut Connection,
    ctx: &Ctx<'_>,
    org: OrganizationId,
    quotation_id: RecordId,
    day_id: RecordId,
    body: &Row,
) -> Result<Row, StoreError> {
    let values = validate_body(&QUOTATION_DAYS, body, true).map_err(StoreError::Validation)?;
    let (org, qid, id) = (org.get(), quotation_id.get(), day_id.get());
    let tx = conn.savepoint()?;
    load_editable(&tx, org, qid)?;
    let existing = child_in_quotation(&tx, &QUOTATION_DAYS, org, qid, id)?;
    update_validated(&tx, ctx, &QUOTATION_DAYS, org, id, &existing, &values)?;
    let row = fetch_row(&tx, &QUOTATION_DAYS, org, id)?;
    tx.commit()?;
    Ok(row)
}

/// Deletes a day; its expenses stay on the quotation, unassigned.
pub fn delete_day(
    conn: &mut Connection,
    ctx: &Ctx<'_>,
    org: OrganizationId,
    quotation_id: RecordId,
    day_id: RecordId,
) -> Result<(), StoreError> {
    let (org, qid, id) = (org.get(), quotation_id.get(), day_id.get());
    let now = ctx.clock.now_rfc3339();
    let tx = conn.savepoint()?;
    load_editable(&tx, org, qid)?;
    child_in_quotation(&tx, &QUOTATION_DAYS, org, qid, id)?;
    tx.execute(
        "UPDATE quotation_days SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2 AND organization_id = ?3",
        params![now, id, org],
    )?;
    tx.execute(
        "UPDATE quotation_expenses SET day_id = NULL, updated_at = ?1
         WHERE day_id = ?2 AND organization_id = ?3 AND deleted_at IS NULL",
        params![now, id, org],
    )?;
    tx.commit()?;
    Ok(())
}

fn check_day_belongs(
    conn: &Connection,
    org: i64,
    quotation_id: i64,
    values: &[(&'static str, SqlValue)],
) -> Result<(), StoreError> {
    if let Some((_, SqlValue::Integer(day_id))) = values.iter().find(|(c, _)| *c == "day_id") {
        let day = fetch_row(conn, &QUOTATION_DAYS, org, *day_id)
            .map_err(|_| StoreError::field("day_id", format!("day {day_id} does not exist")))?;
        if int_field(&day, "quotation_id") != Some(quotation_id) {
            return Err(StoreError::field(
                "day_id",
                format!("day {day_id} belongs to another quotation"),
            ));
        }
    }
    Ok(())
}

fn line_total(quantity: i64, unit_price_cents: i64) -> Result<i64, StoreError> {
    quantity
        .checked_mul(unit_price_cents)
        .ok_or_else(|| StoreError::field("unit_price_cents", "quantity × unit price is too large"))
}

fn push_line_total(
    values: &mut Assignments,
    existing: Option<&Row>,
) -> Result<(), StoreError> {
    let pick = |values: &Assignments, column: &str| match values.iter().find(|(c, _)| *c == column) {
        Some((_, SqlValue::Integer(n))) => Some(*n),
        _ => existing.and_then(|r| int_field(r, column)),
    };
    let quantity = pick(values, "quantity").unwrap_or(1);
    let unit = pick(values, "unit_price_cents").unwrap_or(0);
    let total = line_total(quantity, unit)?;
    values.push(("total_cents", SqlValue::Integer(total)));
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseChange {
    pub expense: Option<Row>,
    pub totals: QuotationTotals,
}

pub fn add_expense(
    conn: &mut Connection,
    ctx: &Ctx<'_>,
    org: OrganizationId,
    user: Option<UserId>,
    quotation_id: RecordId,
    body: &Row,
) -> Result<ExpenseChange, StoreError> {
    let mut values =
        validate_body(&QUOTATION_EXPENSES, body, false).map_err(StoreError::Validation)?;
    let (org, qid) = (org.get(), quotation_id.get());
    let tx = conn.savepoint()?;
    load_editable(&tx, org, qid)?;
    check_day_belongs(&tx, org, qid, &values)?;
    push_line_total(&mut values, None)?;
    values.push(("quotation_id", SqlValue::Integer(qid)));
    let id = insert_validated(&tx, ctx, &QUOTATION_EXPENSES, org, user.map(UserId::get), &values)?;
    let totals = recalculate_totals(&tx, ctx, org, qid)?;
    let expense = fetch_row(&tx, &QUOTATION_EXPENSES, org, id)?;
    tx.commit()?;
    Ok(ExpenseChange {
        expense: Some(expense),
        totals,
    })
}

pub fn update_expense(
    conn: &mut Connection,
    ctx: &Ctx<'_>,
    org: OrganizationId,
    quotation_id: RecordId,
    expense_id: RecordId,
    body: &Row,
) -> Result<ExpenseChange, StoreError> {
    let mut values =
        validate_body(&QUOTATION_EXPENSES, body, true).map_err(StoreError::Validation)?;
    let (org, qid, id) = (org.get(), quotation_id.get(), expense_id.get());
    let tx = conn.savepoint()?;
    load_editable(&tx, org, qid)?;
    let existing = child_in_quotation(&tx, &QUOTATION_EXPENSES, org, qid, id)?;
    check_day_belongs(&tx, org, qid, &values)?;
    push_line_total(&mut values, Some(&existing))?;
    update_validated(&tx, ctx, &QUOTATION_EXPENSES, org, id, &existing, &values)?;
    let totals = recalculate_totals(&tx, ctx, org, qid)?;
    let expense = fetch_row(&tx, &QUOTATION_EXPENSES, org, id)?;
    tx.commit()?;
    Ok(ExpenseChange {
        expense: Some(expense),
        totals,
    })
}

pub fn delete_expense(
    conn: &mut Connection,
    ctx: &Ctx<'_>,
    org: OrganizationId,
    quotation_id: RecordId,
    expense_id: RecordId,
) -> Result<ExpenseChange, StoreError> {
    let (org, qid, id) = (org.get(), quotation_id.get(), expense_id.get());
    let tx = conn.savepoint()?;
    load_editable(&tx, org, qid)?;
    child_in_quotation(&tx, &QUOTATION_EXPENSES, org, qid, id)?;
    tx.execute(
        "UPDATE quotation_expenses SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2 AND organization_id = ?3",
        params![ctx.clock.now_rfc3339(), id, org],
    )?;
    let totals = recalculate_totals(&tx, ctx, org, qid)?;
    tx.commit()?;
    Ok(ExpenseChange {
        expense: None,
        totals,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusChange {
    pub quotation: Row,
    pub booking: Option<Row>,
}

fn set_request_status(
    conn: &Connection,
    ctx: &Ctx<'_>,
    org: i64,
    request_id: i64,
    next: RequestStatus,
    only_from: &[RequestStatus],
) -> Result<(), StoreError> {
    let allowed: Vec<&str> = only_from.iter().map(|s| s.as_str()).collect();
    let marks = vec!["?"; allowed.len()].join(", ");
    let sql = format!(
        "UPDATE requests SET status = ?, updated_at = ? WHERE id = ? AND organization_id = ? AND deleted_at IS NULL AND status IN ({marks})"
    );
    let mut params: Vec<SqlParam> = vec![
        SqlParam::Text(next.as_str().to_string()),
        SqlParam::Text(ctx.clock.now_rfc3339()),
        SqlParam::Integer(request_id),
        SqlParam::Integer(org),
    ];
    params.extend(allowed.into_iter().map(|s| SqlParam::Text(s.to_string())));
    conn.execute(&sql, rusqlite::params_from_iter(params.iter()))?;
    Ok(())
}

fn booking_values_from(quotation: &Row) -> Result<Assignments, StoreError> {
    let int = |c: &str| int_field(quotation, c);
    let text = |c: &str| text_field(quotation, c).map(str::to_string);
    let required_text = |c: &str| {
        text(c).ok_or_else(|| StoreError::field(c, "is missing on the quotation"))
    };
    let client_id = int("client_id")
        .ok_or_else(|| StoreError::field("client_id", "is missing on the quotation"))?;
    let pax = int("adults").unwrap_or(0) + int("children").unwrap_or(0);
    let mut values: Assignments = vec![
        ("quotation_id", SqlValue::Integer(int("id").unwrap_or_default())),
        ("client_id", SqlValue::Integer(client_id)),
        ("start_date", SqlValue::Text(required_text("start_date")?)),
        ("end_date", SqlValue::Text(required_text("end_date")?)),
        ("pax", SqlValue::Integer(pax.max(1))),
        ("total_cents", SqlValue::Integer(int("total_cents").unwrap_or(0))),
        ("currency", SqlValue::Text(required_text("currency")?)),
        (
            "status",
            SqlValue::Text(BookingStatus::Confirmed.as_str().to_string()),
        ),
    ];
    if let Some(agent_id) = int("agent_id") {
        values.push(("agent_id", SqlValue::Integer(agent_id)));
    }
    if let Some(destination) = text("destination") {
        values.push(("destination", SqlValue::Text(destination)));
    }
    Ok(values)
}

/// Moves a quotation through its state machine. Accepting creates a
/// confirmed booking and marks the originating request won, atomically.
pub fn change_status(
    conn: &mut Connection,
    ctx: &Ctx<'_>,
    org: OrganizationId,
    user: Option<UserId>,
    quotation_id: RecordId,
    next: QuotationStatus,
) -> Result<StatusChange, StoreError> {
    let desc = quotations()?;
    let (org, qid) = (org.get(), quotation_id.get());
    let tx = conn.savepoint()?;
    let quotation = fetch_row(&tx, desc, org, qid)?;
    let current = status_of(&quotation)?;
    if !current.can_transition_to(next) {
        return Err(StoreError::InvalidTransition(format!(
            "cannot move quotation from {current} to {next}"
        )));
    }
    if next == QuotationStatus::Accepted {
        let today = ctx.clock.today().format("%Y-%m-%d").to_string();
        if let Some(valid_until) = text_field(&quotation, "valid_until") {
            if valid_until < today.as_str() {
                return Err(StoreError::InvalidTransition(format!(
                    "quotation expired on {valid_until}"
                )));
            }
        }
    }
    tx.execute(
        "UPDATE quotations SET status = ?1, updated_at = ?2 WHERE id = ?3 AND organization_id = ?4",
        params![next.as_str(), ctx.clock.now_rfc3339(), qid, org],
    )?;

    let request_id = int_field(&quotation, "request_id");
    let mut booking = None;
    match next {
        QuotationStatus::Sent => {
            if let Some(request_id) = request_id {
                set_request_status(
                    &tx,
                    ctx,
                    org,
                    request_id,
                    RequestStatus::Quoted,
                    &[RequestStatus::New, RequestStatus::Contacted],
                )?;
            }
        }
        QuotationStatus::Accepted => {
            let values = booking_values_from(&quotation)?;
            let bookings = bookings()?;
            let booking_id =
                insert_validated(&tx, ctx, bookings, org, user.map(UserId::get), &values)?;
            booking = Some(fetch_row(&tx, bookings, org, booking_id)?);
            if let Some(request_id) = request_id {
                set_request_status(
                    &tx,
                    ctx,
                    org,
                    request_id,
                    RequestStatus::Won,
                    &[
                        RequestStatus::New,
                        RequestStatus::Contacted,
                        RequestStatus::Quoted,
                    ],
                )?;
            }
            info!(quotation_id = qid, booking_id, organization_id = org, "quotation accepted");
        }
        _ => {}
    }
    let quotation = fetch_row(&tx, desc, org, qid)?;
    tx.commit()?;
    Ok(StatusChange { quotation, booking })
}

fn service_json(expense: &Row, currency: &str) -> Value {
    let unit = int_field(expense, "unit_price_cents").unwrap_or(0);
    let total = int_field(expense, "total_cents").unwrap_or(0);
    json!({
        "id": expense.get("id"),
        "category": expense.get("category"),
        "description": expense.get("description"),
        "quantity": expense.get("quantity"),
        "unit_price_cents": unit,
        "total_cents": total,
        "unit_price": format_money(unit, currency),
        "total": format_money(total, currency),
    })
}

/// Printable itinerary: days in order with their services, services not tied
/// to a day, and formatted totals.
pub fn generate_itinerary(
    conn: &Connection,
    org: OrganizationId,
    quotation_id: RecordId,
) -> Result<Value, StoreError> {
    let (org, qid) = (org.get(), quotation_id.get());
    let quotation = fetch_row(conn, quotations()?, org, qid)?;
    let currency = text_field(&quotation, "currency").unwrap_or("EUR").to_string();

    let client = match int_field(&quotation, "client_id") {
        Some(client_id) => collect(
            conn,
            "SELECT id, name, email, phone FROM clients WHERE id = ?1 AND organization_id = ?2",
            &[SqlParam::Integer(client_id), SqlParam::Integer(org)],
            crate::row::row_to_plain_json,
        )?
        .into_iter()
        .next()
        .map_or(Value::Null, Value::Object),
        None => Value::Null,
    };

    let day_columns = QUOTATION_DAYS.select_columns();
    let days = collect(
        conn,
        &format!(
            "SELECT {} FROM quotation_days WHERE quotation_id = ?1 AND organization_id = ?2 AND deleted_at IS NULL ORDER BY day_number, id",
            day_columns.join(", ")
        ),
        &[SqlParam::Integer(qid), SqlParam::Integer(org)],
        |r| row_to_json(&QUOTATION_DAYS, &day_columns, r),
    )?;
    let expense_columns = QUOTATION_EXPENSES.select_columns();
    let expenses = collect(
        conn,
        &format!(
            "SELECT {} FROM quotation_expenses WHERE quotation_id = ?1 AND organization_id = ?2 AND deleted_at IS NULL ORDER BY id",
            expense_columns.join(", ")
        ),
        &[SqlParam::Integer(qid), SqlParam::Integer(org)],
        |r| row_to_json(&QUOTATION_EXPENSES, &expense_columns, r),
    )?;

    let day_json: Vec<Value> = days
        .iter()
        .map(|day| {
            let day_id = int_field(day, "id");
            let services: Vec<Value> = expenses
                .iter()
                .filter(|e| day_id.is_some() && int_field(e, "day_id") == day_id)
                .map(|e| service_json(e, &currency))
                .collect();
            let day_total: i64 = expenses
                .iter()
                .filter(|e| day_id.is_some() && int_field(e, "day_id") == day_id)
                .filter_map(|e| int_field(e, "total_cents"))
                .sum();
            json!({
                "day_number": day.get("day_number"),
                "date": day.get("date"),
                "title": day.get("title"),
                "city": day.get("city"),
                "description": day.get("description"),
                "services": services,
                "day_total_cents": day_total,
                "day_total": format_money(day_total, &currency),
            })
        })
        .collect();
    let unassigned: Vec<Value> = expenses
        .iter()
        .filter(|e| int_field(e, "day_id").is_none())
        .map(|e| service_json(e, &currency))
        .collect();

    let amount = |c: &str| int_field(&quotation, c).unwrap_or(0);
    Ok(json!({
        "quotation": {
            "id": qid,
            "quote_number": quotation.get("quote_number"),
            "title": quotation.get("title"),
            "destination": quotation.get("destination"),
            "start_date": quotation.get("start_date"),
            "end_date": quotation.get("end_date"),
            "adults": quotation.get("adults"),
            "children": quotation.get("children"),
            "status": quotation.get("status"),
            "valid_until": quotation.get("valid_until"),
            "currency": currency,
        },
        "client": client,
        "days": day_json,
        "unassigned_services": unassigned,
        "totals": {
            "subtotal_cents": amount("subtotal_cents"),
            "markup_cents": amount("markup_cents"),
            "tax_cents": amount("tax_cents"),
            "total_cents": amount("total_cents"),
            "subtotal": format_money(amount("subtotal_cents"), &currency),
            "markup": format_money(amount("markup_cents"), &currency),
            "tax": format_money(amount("tax_cents"), &currency),
            "total": format_money(amount("total_cents"), &currency),
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markup_compounds_into_tax() {
        let totals = QuotationTotals::compute(100_000, 1_500, 1_000).expect("totals");
        assert_eq!(totals.markup_cents, 15_000);
        assert_eq!(totals.tax_cents, 11_500);
        assert_eq!(totals.total_cents, 126_500);
    }

    #[test]
    fn zero_rates_leave_subtotal() {
        let totals = QuotationTotals::compute(4_321, 0, 0).expect("totals");
        assert_eq!(totals.total_cents, 4_321);
    }

    #[test]
    fn overflowing_totals_are_field_errors() {
        let half = i64::MAX / 2 + 1;
        let err = QuotationTotals::compute(half, 10_000, 0).expect_err("markup overflows");
        assert!(matches!(err, StoreError::Validation(ref fields) if fields[0].field == "unit_price_cents"));
        assert!(QuotationTotals::compute(i64::MAX, 0, 0).is_ok());
        assert!(QuotationTotals::compute(half, 0, 10_000).is_err());
        assert!(QuotationTotals::compute(i64::MAX, 1, 0).is_err());
    }
}
