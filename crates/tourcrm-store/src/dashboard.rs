// SPDX-License-Identifier: Apache-2.0

use chrono::{Datelike, Duration, NaiveDate};
use rusqlite::{params_from_iter, Connection};
use serde_json::{json, Value};
use tourcrm_core::OrganizationId;
use tourcrm_query::Value as SqlParam;

use crate::error::StoreError;
use crate::row::collect_plain;

fn day(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn count(conn: &Connection, sql: &str, params: &[SqlParam]) -> Result<i64, StoreError> {
    Ok(conn.query_row(sql, params_from_iter(params.iter()), |r| r.get(0))?)
}

/// Headline counters for the landing page.
pub fn dashboard_stats(
    conn: &Connection,
    org: OrganizationId,
    today: NaiveDate,
) -> Result<Value, StoreError> {
    let org = org.get();
    let today_s = day(today);
    let month_start = day(today.with_day(1).unwrap_or(today));

    let clients = count(
        conn,
        "SELECT COUNT(*) FROM clients WHERE organization_id = ?1 AND deleted_at IS NULL",
        &[SqlParam::Integer(org)],
    )?;
    let new_clients = count(
        conn,
        "SELECT COUNT(*) FROM clients WHERE organization_id = ?1 AND deleted_at IS NULL AND substr(created_at, 1, 10) >= ?2",
        &[SqlParam::Integer(org), SqlParam::Text(month_start.to_string())],
    )?;
    let open_requests = count(
        conn,
        "SELECT COUNT(*) FROM requests WHERE organization_id = ?1 AND deleted_at IS NULL AND status IN ('new', 'contacted', 'quoted')",
        &[SqlParam::Integer(org)],
    )?;
    let draft_quotations = count(
        conn,
        "SELECT COUNT(*) FROM quotations WHERE organization_id = ?1 AND deleted_at IS NULL AND status = ?2",
        &[SqlParam::Integer(org), SqlParam::Text("draft".to_string())],
    )?;
    let sent_quotations = count(
        conn,
        "SELECT COUNT(*) FROM quotations WHERE organization_id = ?1 AND deleted_at IS NULL AND status = ?2",
        &[SqlParam::Integer(org), SqlParam::Text("sent".to_string())],
    )?;
    let upcoming_bookings = count(
        conn,
        "SELECT COUNT(*) FROM bookings WHERE organization_id = ?1 AND deleted_at IS NULL AND status IN ('pending', 'confirmed') AND start_date >= ?2",
        &[SqlParam::Integer(org), SqlParam::Text(today_s.to_string())],
    )?;
    let bookings_this_month = count(
        conn,
        "SELECT COUNT(*) FROM bookings WHERE organization_id = ?1 AND deleted_at IS NULL AND status != 'cancelled' AND substr(created_at, 1, 10) >= ?2",
        &[SqlParam::Integer(org), SqlParam::Text(month_start.to_string())],
    )?;
    let collected_this_month = collect_plain(
        conn,
        "SELECT i.currency AS currency, SUM(p.amount_cents) AS amount_cents
         FROM invoice_payments p
         JOIN invoices_receivable i ON i.id = p.invoice_id AND i.organization_id = p.organization_id
         WHERE p.organization_id = ?1 AND p.invoice_kind = 'receivable' AND p.paid_on >= ?2
         GROUP BY i.currency ORDER BY i.currency",
        &[SqlParam::Integer(org), SqlParam::Text(month_start.clone())],
    )?;
    let outstanding = collect_plain(
        conn,
        "SELECT currency, SUM(amount_cents - paid_cents) AS amount_cents,
                SUM(CASE WHEN due_date < ?2 THEN amount_cents - paid_cents ELSE 0 END) AS overdue_cents
         FROM invoices_receivable
         WHERE organization_id = ?1 AND deleted_at IS NULL AND status IN ('unpaid', 'partial')
         GROUP BY currency ORDER BY currency",
        &[SqlParam::Integer(org), SqlParam::Text(today_s.clone())],
    )?;

    Ok(json!({
        "as_of": today_s,
        "clients": { "total": clients, "new_this_month": new_clients },
        "requests": { "open": open_requests },
        "quotations": { "draft": draft_quotations, "sent": sent_quotations },
        "bookings": { "upcoming": upcoming_bookings, "this_month": bookings_this_month },
        "revenue": {
            "collected_this_month": collected_this_month,
            "outstanding_receivables": outstanding,
        },
    }))
}

pub fn recent_requests(
    conn: &Connection,
    org: OrganizationId,
    limit: u32,
) -> Result<Vec<Value>, StoreError> {
    collect_plain(
        conn,
        "SELECT r.id, r.destination, r.status, r.travel_start, r.adults, r.children, r.created_at,
                c.id AS client_id, c.name AS client_name
         FROM requests r
         JOIN clients c ON c.id = r.client_id AND c.organization_id = r.organization_id
         WHERE r.organization_id = ?1 AND r.deleted_at IS NULL
         ORDER BY r.created_at DESC, r.id DESC LIMIT ?2",
        &[SqlParam::Integer(org.get()), SqlParam::Integer(i64::from(limit))],
    )
}

/// Bookings starting within `days` days of `today`, soonest first.
pub fn upcoming_tours(
    conn: &Connection,
    org: OrganizationId,
    today: NaiveDate,
    days: u32,
) -> Result<Vec<Value>, StoreError> {
    let until = today + Duration::days(i64::from(days));
    collect_plain(
        conn,
        "SELECT b.id, b.booking_number, b.destination, b.start_date, b.end_date, b.pax, b.status,
                b.total_cents, b.currency, c.id AS client_id, c.name AS client_name,
                CAST(julianday(b.start_date) - julianday(?2) AS INTEGER) AS days_until
         FROM bookings b
         JOIN clients c ON c.id = b.client_id AND c.organization_id = b.organization_id
         WHERE b.organization_id = ?1 AND b.deleted_at IS NULL AND b.status IN ('pending', 'confirmed')
           AND b.start_date >= ?2 AND b.start_date <= ?3
         ORDER BY b.start_date, b.id",
        &[
            SqlParam::Integer(org.get()),
            SqlParam::Text(day(today)),
            SqlParam::Text(day(until)),
        ],
    )
}
