// SPDX-License-Identifier: Apache-2.0

//! Read-only analytical reports. Every report is scoped to one tenant and an
//! optional inclusive date range. Money is summed per currency; amounts in
//! different currencies are never added together.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tourcrm_core::money::apply_percent;
use tourcrm_core::OrganizationId;
use tourcrm_query::Value as SqlParam;

use crate::error::StoreError;
use crate::row::{row_to_plain_json, Row};

pub const REPORT_NAMES: &[&str] = &[
    "agents/clients",
    "agents/performance",
    "clients/demographics",
    "clients/acquisition-retention",
    "clients/lifetime-value",
    "executive/summary",
    "financial/aging",
    "financial/commissions",
    "financial/dashboard",
    "financial/providers",
    "financial/profit-loss",
    "operations/booking-status",
    "operations/service-usage",
    "operations/response-times",
    "operations/capacity",
    "operations/upcoming-tours",
    "pricing/analysis",
    "pricing/cost-structure",
    "sales/overview",
    "sales/destinations",
    "sales/quotes",
    "sales/trends",
];

/// Inclusive `from..=to` bounds; either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

fn day(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

struct Binds {
    org: i64,
    from: Option<String>,
    to: Option<String>,
    today: String,
}

impl Binds {
    fn new(org: i64, range: &DateRange, today: NaiveDate) -> Self {
        Self {
            org,
            from: range.from.map(day),
            to: range.to.map(day),
            today: day(today),
        }
    }
}

/// Runs `sql`, binding whichever of `:org`, `:from`, `:to`, `:today` it names.
fn query(conn: &Connection, sql: &str, b: &Binds) -> Result<Vec<Row>, StoreError> {
    let mut stmt = conn.prepare_cached(sql)?;
    let binds = [
        (":org", SqlParam::Integer(b.org)),
        (":from", b.from.clone().map_or(SqlParam::Null, SqlParam::Text)),
        (":to", b.to.clone().map_or(SqlParam::Null, SqlParam::Text)),
        (":today", SqlParam::Text(b.today.clone())),
    ];
    for (name, value) in binds {
        if let Some(idx) = stmt.parameter_index(name)? {
            stmt.raw_bind_parameter(idx, value)?;
        }
    }
    let mut rows = stmt.raw_query();
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(row_to_plain_json(row)?);
    }
    Ok(out)
}

fn query_one(conn: &Connection, sql: &str, b: &Binds) -> Result<Row, StoreError> {
    Ok(query(conn, sql, b)?.into_iter().next().unwrap_or_default())
}

/// Date-range predicate on the day part of `column`.
fn in_range(column: &str) -> String {
    format!(
        "(:from IS NULL OR substr({column}, 1, 10) >= :from) AND (:to IS NULL OR substr({column}, 1, 10) <= :to)"
    )
}

fn int(row: &Row, key: &str) -> i64 {
    row.get(key).and_then(Value::as_i64).unwrap_or(0)
}

fn text(row: &Row, key: &str) -> String {
    row.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Percentage with one decimal; zero when the denominator is zero.
fn rate(numerator: i64, denominator: i64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let value = numerator as f64 * 100.0 / denominator as f64;
    (value * 10.0).round() / 10.0
}

fn array(rows: Vec<Row>) -> Value {
    Value::Array(rows.into_iter().map(Value::Object).collect())
}

fn agents_clients(conn: &Connection, b: &Binds) -> Result<Value, StoreError> {
    let sql = format!(
        "SELECT a.id AS agent_id, a.name AS agent_name,
                COUNT(DISTINCT r.client_id) AS clients,
                COUNT(r.id) AS requests,
                (SELECT COUNT(*) FROM bookings bk
                  WHERE bk.agent_id = a.id AND bk.organization_id = :org AND bk.deleted_at IS NULL
                    AND bk.status != 'cancelled' AND {bk_range}) AS bookings
         FROM agents a
         LEFT JOIN requests r ON r.agent_id = a.id AND r.organization_id = a.organization_id
              AND r.deleted_at IS NULL AND {r_range}
         WHERE a.organization_id = :org AND a.deleted_at IS NULL
         GROUP BY a.id, a.name
         ORDER BY clients DESC, a.name, a.id",
        bk_range = in_range("bk.start_date"),
        r_range = in_range("r.created_at"),
    );
    Ok(json!({ "agents": array(query(conn, &sql, b)?) }))
}

fn agents_performance(conn: &Connection, b: &Binds) -> Result<Value, StoreError> {
    let q_range = in_range("q.created_at");
    let agents = query(
        conn,
        &format!(
            "SELECT a.id AS agent_id, a.name AS agent_name, a.commission_pct AS commission_pct,
                    (SELECT COUNT(*) FROM quotations q WHERE q.agent_id = a.id AND q.organization_id = :org
                       AND q.deleted_at IS NULL AND {q_range}) AS quotations,
                    (SELECT COUNT(*) FROM quotations q WHERE q.agent_id = a.id AND q.organization_id = :org
                       AND q.deleted_at IS NULL AND q.status = 'accepted' AND {q_range}) AS accepted
             FROM agents a WHERE a.organization_id = :org AND a.deleted_at IS NULL
             ORDER BY a.name, a.id"
        ),
        b,
    )?;
    let revenue = query(
        conn,
        &format!(
            "SELECT agent_id, currency, COUNT(*) AS bookings, SUM(total_cents) AS revenue_cents
             FROM bookings
             WHERE organization_id = :org AND deleted_at IS NULL AND status != 'cancelled'
               AND agent_id IS NOT NULL AND {}
             GROUP BY agent_id, currency ORDER BY currency",
            in_range("start_date")
        ),
        b,
    )?;
    let rows: Vec<Value> = agents
        .into_iter()
        .map(|agent| {
            let id = int(&agent, "agent_id");
            let commission_bp = int(&agent, "commission_pct");
            let by_currency: Vec<Value> = revenue
                .iter()
                .filter(|r| int(r, "agent_id") == id)
                .map(|r| {
                    let cents = int(r, "revenue_cents");
                    json!({
                        "currency": text(r, "currency"),
                        "bookings": int(r, "bookings"),
                        "revenue_cents": cents,
                        "commission_cents": apply_percent(cents, commission_bp),
                    })
                })
                .collect();
            let quotations = int(&agent, "quotations");
            let accepted = int(&agent, "accepted");
            json!({
                "agent_id": id,
                "agent_name": text(&agent, "agent_name"),
                "commission_pct": commission_bp,
                "quotations": quotations,
                "accepted": accepted,
                "conversion_rate": rate(accepted, quotations),
                "revenue": by_currency,
            })
        })
        .collect();
    Ok(json!({ "agents": rows }))
}

fn clients_demographics(conn: &Connection, b: &Binds) -> Result<Value, StoreError> {
    let range = in_range("created_at");
    let group = |expr: &str, alias: &str| -> Result<Value, StoreError> {
        let sql = format!(
            "SELECT {expr} AS {alias}, COUNT(*) AS clients FROM clients
             WHERE organization_id = :org AND deleted_at IS NULL AND {range}
             GROUP BY 1 ORDER BY clients DESC, 1"
        );
        Ok(array(query(conn, &sql, b)?))
    };
    let total = query_one(
        conn,
        &format!(
            "SELECT COUNT(*) AS clients FROM clients WHERE organization_id = :org AND deleted_at IS NULL AND {range}"
        ),
        b,
    )?;
    Ok(json!({
        "total_clients": int(&total, "clients"),
        "by_nationality": group("COALESCE(NULLIF(nationality, ''), 'unknown')", "nationality")?,
        "by_client_type": group("COALESCE(client_type, 'unknown')", "client_type")?,
        "by_source": group("COALESCE(NULLIF(source, ''), 'unknown')", "source")?,
    }))
}

fn clients_acquisition_retention(conn: &Connection, b: &Binds) -> Result<Value, StoreError> {
    let monthly = query(
        conn,
        &format!(
            "SELECT substr(created_at, 1, 7) AS month, COUNT(*) AS new_clients FROM clients
             WHERE organization_id = :org AND deleted_at IS NULL AND {}
             GROUP BY month ORDER BY month",
            in_range("created_at")
        ),
        b,
    )?;
    let retention = query_one(
        conn,
        &format!(
            "SELECT COUNT(*) AS clients_with_bookings,
                    COALESCE(SUM(CASE WHEN n >= 2 THEN 1 ELSE 0 END), 0) AS repeat_clients
             FROM (SELECT client_id, COUNT(*) AS n FROM bookings
                   WHERE organization_id = :org AND deleted_at IS NULL AND status != 'cancelled' AND {}
                   GROUP BY client_id)",
            in_range("start_date")
        ),
        b,
    )?;
    let with_bookings = int(&retention, "clients_with_bookings");
    let repeat = int(&retention, "repeat_clients");
    Ok(json!({
        "acquisition": array(monthly),
        "retention": {
            "clients_with_bookings": with_bookings,
            "repeat_clients": repeat,
            "retention_rate": rate(repeat, with_bookings),
        },
    }))
}

fn clients_lifetime_value(conn: &Connection, b: &Binds) -> Result<Value, StoreError> {
    let rows = query(
        conn,
        &format!(
            "SELECT c.id AS client_id, c.name AS client_name, bk.currency AS currency,
                    COUNT(bk.id) AS bookings, SUM(bk.total_cents) AS total_cents,
                    CAST(AVG(bk.total_cents) AS INTEGER) AS average_cents,
                    MIN(bk.start_date) AS first_booking, MAX(bk.start_date) AS last_booking
             FROM bookings bk
             JOIN clients c ON c.id = bk.client_id AND c.organization_id = bk.organization_id
             WHERE bk.organization_id = :org AND bk.deleted_at IS NULL AND bk.status != 'cancelled' AND {}
             GROUP BY c.id, c.name, bk.currency
             ORDER BY total_cents DESC, c.id LIMIT 50",
            in_range("bk.start_date")
        ),
        b,
    )?;
    Ok(json!({ "clients": array(rows) }))
}

fn executive_summary(conn: &Connection, b: &Binds) -> Result<Value, StoreError> {
    let counts = query_one(
        conn,
        &format!(
            "SELECT
               (SELECT COUNT(*) FROM clients WHERE organization_id = :org AND deleted_at IS NULL AND {c}) AS new_clients,
               (SELECT COUNT(*) FROM requests WHERE organization_id = :org AND deleted_at IS NULL AND {c}) AS requests,
               (SELECT COUNT(*) FROM quotations WHERE organization_id = :org AND deleted_at IS NULL AND {c}) AS quotations,
               (SELECT COUNT(*) FROM quotations WHERE organization_id = :org AND deleted_at IS NULL AND status = 'accepted' AND {c}) AS accepted_quotations,
               (SELECT COUNT(*) FROM bookings WHERE organization_id = :org AND deleted_at IS NULL AND status != 'cancelled' AND {c}) AS bookings",
            c = in_range("created_at")
        ),
        b,
    )?;
    let revenue = query(
        conn,
        &format!(
            "SELECT currency, SUM(total_cents) AS revenue_cents, COUNT(*) AS bookings FROM bookings
             WHERE organization_id = :org AND deleted_at IS NULL AND status != 'cancelled' AND {}
             GROUP BY currency ORDER BY currency",
            in_range("created_at")
        ),
        b,
    )?;
    let outstanding = query(
        conn,
        "SELECT currency, SUM(amount_cents - paid_cents) AS outstanding_cents FROM invoices_receivable
         WHERE organization_id = :org AND deleted_at IS NULL AND status IN ('unpaid', 'partial')
         GROUP BY currency ORDER BY currency",
        b,
    )?;
    let quotations = int(&counts, "quotations");
    let accepted = int(&counts, "accepted_quotations");
    Ok(json!({
        "new_clients": int(&counts, "new_clients"),
        "requests": int(&counts, "requests"),
        "quotations": quotations,
        "accepted_quotations": accepted,
        "conversion_rate": rate(accepted, quotations),
        "bookings": int(&counts, "bookings"),
        "revenue": array(revenue),
        "outstanding_receivables": array(outstanding),
    }))
}

fn aging_for(conn: &Connection, b: &Binds, table: &str) -> Result<Value, StoreError> {
    let open = "amount_cents - paid_cents";
    let age = "CAST(julianday(:today) - julianday(due_date) AS INTEGER)";
    let sql = format!(
        "SELECT currency, COUNT(*) AS open_invoices,
                SUM(CASE WHEN due_date >= :today THEN {open} ELSE 0 END) AS current_cents,
                SUM(CASE WHEN {age} BETWEEN 1 AND 30 THEN {open} ELSE 0 END) AS days_1_30_cents,
                SUM(CASE WHEN {age} BETWEEN 31 AND 60 THEN {open} ELSE 0 END) AS days_31_60_cents,
                SUM(CASE WHEN {age} BETWEEN 61 AND 90 THEN {open} ELSE 0 END) AS days_61_90_cents,
                SUM(CASE WHEN {age} > 90 THEN {open} ELSE 0 END) AS days_over_90_cents,
                SUM({open}) AS outstanding_cents
         FROM {table}
         WHERE organization_id = :org AND deleted_at IS NULL AND status IN ('unpaid', 'partial') AND {range}
         GROUP BY currency ORDER BY currency",
        range = in_range("issue_date")
    );
    Ok(array(query(conn, &sql, b)?))
}

fn financial_aging(conn: &Connection, b: &Binds) -> Result<Value, StoreError> {
    Ok(json!({
        "as_of": b.today,
        "receivable": aging_for(conn, b, "invoices_receivable")?,
        "payable": aging_for(conn, b, "invoices_payable")?,
    }))
}

fn financial_commissions(conn: &Connection, b: &Binds) -> Result<Value, StoreError> {
    let rows = query(
        conn,
        &format!(
            "SELECT a.id AS agent_id, a.name AS agent_name, a.commission_pct AS commission_pct,
                    bk.currency AS currency, COUNT(bk.id) AS bookings, SUM(bk.total_cents) AS revenue_cents
             FROM bookings bk
             JOIN agents a ON a.id = bk.agent_id AND a.organization_id = bk.organization_id
             WHERE bk.organization_id = :org AND bk.deleted_at IS NULL
               AND bk.status IN ('confirmed', 'completed') AND {}
             GROUP BY a.id, a.name, a.commission_pct, bk.currency
             ORDER BY revenue_cents DESC, a.id",
            in_range("bk.start_date")
        ),
        b,
    )?;
    let mut totals: BTreeMap<String, i64> = BTreeMap::new();
    let agents: Vec<Value> = rows
        .into_iter()
        .map(|mut row| {
            let commission = apply_percent(int(&row, "revenue_cents"), int(&row, "commission_pct"));
            *totals.entry(text(&row, "currency")).or_insert(0) += commission;
            row.insert("commission_cents".to_string(), Value::from(commission));
            Value::Object(row)
        })
        .collect();
    let totals: Vec<Value> = totals
        .into_iter()
        .map(|(currency, cents)| json!({ "currency": currency, "commission_cents": cents }))
        .collect();
    Ok(json!({ "agents": agents, "totals": totals }))
}

fn financial_dashboard(conn: &Connection, b: &Binds) -> Result<Value, StoreError> {
    let side = |table: &str| -> Result<Vec<Row>, StoreError> {
        query(
            conn,
            &format!(
                "SELECT currency, COUNT(*) AS invoices, SUM(amount_cents) AS invoiced_cents,
                        SUM(paid_cents) AS paid_cents, SUM(amount_cents - paid_cents) AS outstanding_cents
                 FROM {table}
                 WHERE organization_id = :org AND deleted_at IS NULL AND status != 'cancelled' AND {}
                 GROUP BY currency ORDER BY currency",
                in_range("issue_date")
            ),
            b,
        )
    };
    let receivable = side("invoices_receivable")?;
    let payable = side("invoices_payable")?;
    let mut margins: BTreeMap<String, i64> = BTreeMap::new();
    for row in &receivable {
        *margins.entry(text(row, "currency")).or_insert(0) += int(row, "invoiced_cents");
    }
    for row in &payable {
        *margins.entry(text(row, "currency")).or_insert(0) -= int(row, "invoiced_cents");
    }
    let collections = query(
        conn,
        &format!(
            "SELECT substr(p.paid_on, 1, 7) AS month, i.currency AS currency, SUM(p.amount_cents) AS collected_cents
             FROM invoice_payments p
             JOIN invoices_receivable i ON i.id = p.invoice_id AND i.organization_id = p.organization_id
             WHERE p.organization_id = :org AND p.invoice_kind = 'receivable' AND {}
             GROUP BY month, i.currency ORDER BY month, i.currency",
            in_range("p.paid_on")
        ),
        b,
    )?;
    let gross_margin: Vec<Value> = margins
        .into_iter()
        .map(|(currency, cents)| json!({ "currency": currency, "gross_margin_cents": cents }))
        .collect();
    Ok(json!({
        "receivable": array(receivable),
        "payable": array(payable),
        "gross_margin": gross_margin,
        "monthly_collections": array(collections),
    }))
}

fn financial_providers(conn: &Connection, b: &Binds) -> Result<Value, StoreError> {
    let rows = query(
        conn,
        &format!(
            "SELECT pr.id AS provider_id, pr.name AS provider_name, pr.provider_type AS provider_type,
                    i.currency AS currency, COUNT(i.id) AS bills, SUM(i.amount_cents) AS billed_cents,
                    SUM(i.paid_cents) AS paid_cents, SUM(i.amount_cents - i.paid_cents) AS outstanding_cents
             FROM invoices_payable i
             JOIN providers pr ON pr.id = i.provider_id AND pr.organization_id = i.organization_id
             WHERE i.organization_id = :org AND i.deleted_at IS NULL AND i.status != 'cancelled' AND {}
             GROUP BY pr.id, pr.name, pr.provider_type, i.currency
             ORDER BY billed_cents DESC, pr.id",
            in_range("i.issue_date")
        ),
        b,
    )?;
    Ok(json!({ "providers": array(rows) }))
}

fn financial_profit_loss(conn: &Connection, b: &Binds) -> Result<Value, StoreError> {
    let monthly = |table: &str| -> Result<Vec<Row>, StoreError> {
        query(
            conn,
            &format!(
                "SELECT substr(issue_date, 1, 7) AS month, currency, SUM(amount_cents) AS cents FROM {table}
                 WHERE organization_id = :org AND deleted_at IS NULL AND status != 'cancelled' AND {}
                 GROUP BY month, currency",
                in_range("issue_date")
            ),
            b,
        )
    };
    let mut merged: BTreeMap<(String, String), (i64, i64)> = BTreeMap::new();
    for row in monthly("invoices_receivable")? {
        merged
            .entry((text(&row, "month"), text(&row, "currency")))
            .or_default()
            .0 += int(&row, "cents");
    }
    for row in monthly("invoices_payable")? {
        merged
            .entry((text(&row, "month"), text(&row, "currency")))
            .or_default()
            .1 += int(&row, "cents");
    }
    let months: Vec<Value> = merged
        .into_iter()
        .map(|((month, currency), (revenue, costs))| {
            json!({
                "month": month,
                "currency": currency,
                "revenue_cents": revenue,
                "cost_cents": costs,
                "profit_cents": revenue - costs,
                "margin_pct": rate(revenue - costs, revenue),
            })
        })
        .collect();
    Ok(json!({ "months": months }))
}

fn operations_booking_status(conn: &Connection, b: &Binds) -> Result<Value, StoreError> {
    let rows = query(
        conn,
        &format!(
            "SELECT status, currency, COUNT(*) AS bookings, SUM(pax) AS pax, SUM(total_cents) AS total_cents
             FROM bookings WHERE organization_id = :org AND deleted_at IS NULL AND {}
             GROUP BY status, currency ORDER BY status, currency",
            in_range("start_date")
        ),
        b,
    )?;
    Ok(json!({ "statuses": array(rows) }))
}

fn operations_service_usage(conn: &Connection, b: &Binds) -> Result<Value, StoreError> {
    let rows = query(
        conn,
        &format!(
            "SELECT e.category AS category, q.currency AS currency, COUNT(e.id) AS lines,
                    SUM(e.quantity) AS quantity, SUM(e.total_cents) AS total_cents
             FROM quotation_expenses e
             JOIN quotations q ON q.id = e.quotation_id AND q.organization_id = e.organization_id
             WHERE e.organization_id = :org AND e.deleted_at IS NULL AND q.deleted_at IS NULL
               AND q.status = 'accepted' AND {}
             GROUP BY e.category, q.currency ORDER BY total_cents DESC, e.category",
            in_range("q.start_date")
        ),
        b,
    )?;
    Ok(json!({ "services": array(rows) }))
}

fn hours_between(start: &str, end: &str) -> Option<f64> {
    let start = DateTime::parse_from_rfc3339(start).ok()?;
    let end = DateTime::parse_from_rfc3339(end).ok()?;
    #[allow(clippy::cast_precision_loss)]
    let hours = (end - start).num_seconds() as f64 / 3600.0;
    Some(hours.max(0.0))
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn operations_response_times(conn: &Connection, b: &Binds) -> Result<Value, StoreError> {
    let rows = query(
        conn,
        &format!(
            "SELECT r.id AS request_id, r.created_at AS created_at,
                    (SELECT MIN(q.created_at) FROM quotations q
                      WHERE q.request_id = r.id AND q.organization_id = r.organization_id
                        AND q.deleted_at IS NULL) AS first_quote_at
             FROM requests r
             WHERE r.organization_id = :org AND r.deleted_at IS NULL AND {}",
            in_range("r.created_at")
        ),
        b,
    )?;
    let mut hours: Vec<f64> = rows
        .iter()
        .filter_map(|r| {
            let quoted = r.get("first_quote_at").and_then(Value::as_str)?;
            hours_between(&text(r, "created_at"), quoted)
        })
        .collect();
    hours.sort_by(f64::total_cmp);
    let responded = hours.len();
    let awaiting = rows.len() - responded;
    let average = if hours.is_empty() {
        0.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        let n = responded as f64;
        hours.iter().sum::<f64>() / n
    };
    let median = match responded {
        0 => 0.0,
        n if n % 2 == 1 => hours[n / 2],
        n => (hours[n / 2 - 1] + hours[n / 2]) / 2.0,
    };
    let within_24h = hours.iter().filter(|h| **h <= 24.0).count();
    Ok(json!({
        "requests": rows.len(),
        "responded": responded,
        "awaiting_quote": awaiting,
        "average_hours": round1(average),
        "median_hours": round1(median),
        "fastest_hours": round1(hours.first().copied().unwrap_or(0.0)),
        "slowest_hours": round1(hours.last().copied().unwrap_or(0.0)),
        "within_24h": within_24h,
    }))
}

fn operations_capacity(conn: &Connection, b: &Binds) -> Result<Value, StoreError> {
    let monthly = query(
        conn,
        &format!(
            "SELECT substr(start_date, 1, 7) AS month, COUNT(*) AS bookings, SUM(pax) AS pax
             FROM bookings WHERE organization_id = :org AND deleted_at IS NULL AND status != 'cancelled' AND {}
             GROUP BY month ORDER BY month",
            in_range("start_date")
        ),
        b,
    )?;
    let fleet = query_one(
        conn,
        "SELECT (SELECT COUNT(*) FROM vehicles WHERE organization_id = :org AND deleted_at IS NULL AND is_active = 1) AS vehicles,
                (SELECT COALESCE(SUM(capacity), 0) FROM vehicles WHERE organization_id = :org AND deleted_at IS NULL AND is_active = 1) AS seats,
                (SELECT COUNT(*) FROM guides WHERE organization_id = :org AND deleted_at IS NULL AND is_active = 1) AS guides",
        b,
    )?;
    let peak = monthly
        .iter()
        .max_by_key(|r| (int(r, "pax"), std::cmp::Reverse(text(r, "month"))))
        .map_or(Value::Null, |r| json!({ "month": text(r, "month"), "pax": int(r, "pax") }));
    Ok(json!({
        "monthly": array(monthly),
        "peak_month": peak,
        "fleet": Value::Object(fleet),
    }))
}

fn operations_upcoming_tours(conn: &Connection, b: &Binds, today: NaiveDate) -> Result<Value, StoreError> {
    let bounded = Binds {
        org: b.org,
        from: Some(b.from.clone().unwrap_or_else(|| b.today.clone())),
        to: Some(b.to.clone().unwrap_or_else(|| day(today + Duration::days(30)))),
        today: b.today.clone(),
    };
    let rows = query(
        conn,
        "SELECT bk.id AS booking_id, bk.booking_number AS booking_number, bk.destination AS destination,
                bk.start_date AS start_date, bk.end_date AS end_date, bk.pax AS pax, bk.status AS status,
                c.id AS client_id, c.name AS client_name,
                CAST(julianday(bk.start_date) - julianday(:today) AS INTEGER) AS days_until
         FROM bookings bk
         JOIN clients c ON c.id = bk.client_id AND c.organization_id = bk.organization_id
         WHERE bk.organization_id = :org AND bk.deleted_at IS NULL AND bk.status IN ('pending', 'confirmed')
           AND bk.start_date >= :from AND bk.start_date <= :to
         ORDER BY bk.start_date, bk.id",
        &bounded,
    )?;
    Ok(json!({ "from": bounded.from, "to": bounded.to, "tours": array(rows) }))
}

/// Seasonal pricing tables and the price column summarised for each.
const PRICE_TABLES: &[(&str, &str, &str)] = &[
    ("hotel-pricing", "hotel_pricing", "price_per_night_cents"),
    ("guide-pricing", "guide_pricing", "price_cents"),
    ("vehicle-pricing", "vehicle_pricing", "price_per_day_cents"),
    ("tour-pricing", "tour_pricing", "adult_price_cents"),
    ("entrance-fee-pricing", "entrance_fee_pricing", "adult_price_cents"),
];

fn pricing_analysis(conn: &Connection, b: &Binds) -> Result<Value, StoreError> {
    let mut out = Map::new();
    for (name, table, column) in PRICE_TABLES {
        let rows = query(
            conn,
            &format!(
                "SELECT currency, COUNT(*) AS seasons, MIN({column}) AS min_cents,
                        CAST(AVG({column}) AS INTEGER) AS avg_cents, MAX({column}) AS max_cents
                 FROM {table}
                 WHERE organization_id = :org AND deleted_at IS NULL
                   AND (:to IS NULL OR start_date <= :to) AND (:from IS NULL OR end_date >= :from)
                 GROUP BY currency ORDER BY currency"
            ),
            b,
        )?;
        out.insert((*name).to_string(), array(rows));
    }
    Ok(Value::Object(out))
}

fn pricing_cost_structure(conn: &Connection, b: &Binds) -> Result<Value, StoreError> {
    let rows = query(
        conn,
        &format!(
            "SELECT q.currency AS currency, e.category AS category, SUM(e.total_cents) AS total_cents
             FROM quotation_expenses e
             JOIN quotations q ON q.id = e.quotation_id AND q.organization_id = e.organization_id
             WHERE e.organization_id = :org AND e.deleted_at IS NULL AND q.deleted_at IS NULL
               AND q.status != 'cancelled' AND {}
             GROUP BY q.currency, e.category ORDER BY q.currency, total_cents DESC",
            in_range("q.start_date")
        ),
        b,
    )?;
    let mut per_currency: BTreeMap<String, i64> = BTreeMap::new();
    for row in &rows {
        *per_currency.entry(text(row, "currency")).or_insert(0) += int(row, "total_cents");
    }
    let categories: Vec<Value> = rows
        .into_iter()
        .map(|mut row| {
            let total = per_currency.get(&text(&row, "currency")).copied().unwrap_or(0);
            let share = rate(int(&row, "total_cents"), total);
            row.insert("share_pct".to_string(), json!(share));
            Value::Object(row)
        })
        .collect();
    Ok(json!({ "categories": categories }))
}

fn sales_overview(conn: &Connection, b: &Binds) -> Result<Value, StoreError> {
    let range = in_range("created_at");
    let statuses = query(
        conn,
        &format!(
            "SELECT status, COUNT(*) AS quotations FROM quotations
             WHERE organization_id = :org AND deleted_at IS NULL AND {range}
             GROUP BY status ORDER BY status"
        ),
        b,
    )?;
    let accepted_value = query(
        conn,
        &format!(
            "SELECT currency, COUNT(*) AS accepted, SUM(total_cents) AS accepted_value_cents,
                    CAST(AVG(total_cents) AS INTEGER) AS average_value_cents
             FROM quotations
             WHERE organization_id = :org AND deleted_at IS NULL AND status = 'accepted' AND {range}
             GROUP BY currency ORDER BY currency"
        ),
        b,
    )?;
    let total: i64 = statuses.iter().map(|r| int(r, "quotations")).sum();
    let accepted: i64 = statuses
        .iter()
        .filter(|r| text(r, "status") == "accepted")
        .map(|r| int(r, "quotations"))
        .sum();
    Ok(json!({
        "quotations": total,
        "accepted": accepted,
        "conversion_rate": rate(accepted, total),
        "by_status": array(statuses),
        "accepted_value": array(accepted_value),
    }))
}

#[derive(Default)]
struct DestinationStats {
    requests: i64,
    quotations: i64,
    bookings: i64,
    revenue: BTreeMap<String, i64>,
}

fn sales_destinations(conn: &Connection, b: &Binds) -> Result<Value, StoreError> {
    let count_by = |table: &str, date: &str, extra: &str| -> Result<Vec<Row>, StoreError> {
        query(
            conn,
            &format!(
                "SELECT destination, COUNT(*) AS n FROM {table}
                 WHERE organization_id = :org AND deleted_at IS NULL AND destination IS NOT NULL {extra} AND {}
                 GROUP BY destination",
                in_range(date)
            ),
            b,
        )
    };
    let mut stats: BTreeMap<String, DestinationStats> = BTreeMap::new();
    for row in count_by("requests", "created_at", "")? {
        stats.entry(text(&row, "destination")).or_default().requests += int(&row, "n");
    }
    for row in count_by("quotations", "created_at", "")? {
        stats.entry(text(&row, "destination")).or_default().quotations += int(&row, "n");
    }
    let bookings = query(
        conn,
        &format!(
            "SELECT destination, currency, COUNT(*) AS n, SUM(total_cents) AS revenue_cents FROM bookings
             WHERE organization_id = :org AND deleted_at IS NULL AND destination IS NOT NULL
               AND status != 'cancelled' AND {}
             GROUP BY destination, currency",
            in_range("start_date")
        ),
        b,
    )?;
    for row in bookings {
        let entry = stats.entry(text(&row, "destination")).or_default();
        entry.bookings += int(&row, "n");
        *entry.revenue.entry(text(&row, "currency")).or_insert(0) += int(&row, "revenue_cents");
    }
    let mut rows: Vec<(String, DestinationStats)> = stats.into_iter().collect();
    rows.sort_by(|a, b| {
        b.1.bookings
            .cmp(&a.1.bookings)
            .then(b.1.requests.cmp(&a.1.requests))
            .then(a.0.cmp(&b.0))
    });
    let destinations: Vec<Value> = rows
        .into_iter()
        .map(|(destination, s)| {
            let revenue: Vec<Value> = s
                .revenue
                .into_iter()
                .map(|(currency, cents)| json!({ "currency": currency, "revenue_cents": cents }))
                .collect();
            json!({
                "destination": destination,
                "requests": s.requests,
                "quotations": s.quotations,
                "bookings": s.bookings,
                "conversion_rate": rate(s.bookings, s.requests),
                "revenue": revenue,
            })
        })
        .collect();
    Ok(json!({ "destinations": destinations }))
}

fn sales_quotes(conn: &Connection, b: &Binds) -> Result<Value, StoreError> {
    let rows = query(
        conn,
        &format!(
            "SELECT substr(created_at, 1, 7) AS month, COUNT(*) AS created,
                    SUM(CASE WHEN status IN ('sent', 'accepted', 'rejected', 'expired') THEN 1 ELSE 0 END) AS sent,
                    SUM(CASE WHEN status = 'accepted' THEN 1 ELSE 0 END) AS accepted,
                    SUM(CASE WHEN status = 'rejected' THEN 1 ELSE 0 END) AS rejected,
                    SUM(CASE WHEN status = 'expired' THEN 1 ELSE 0 END) AS expired
             FROM quotations WHERE organization_id = :org AND deleted_at IS NULL AND {}
             GROUP BY month ORDER BY month",
            in_range("created_at")
        ),
        b,
    )?;
    let months: Vec<Value> = rows
        .into_iter()
        .map(|mut row| {
            let win = rate(int(&row, "accepted"), int(&row, "sent"));
            row.insert("win_rate".to_string(), json!(win));
            Value::Object(row)
        })
        .collect();
    Ok(json!({ "months": months }))
}

#[derive(Default)]
struct MonthStats {
    requests: i64,
    quotations: i64,
    bookings: i64,
    revenue: BTreeMap<String, i64>,
}

fn sales_trends(conn: &Connection, b: &Binds) -> Result<Value, StoreError> {
    let range = in_range("created_at");
    let per_month = |table: &str| -> Result<Vec<Row>, StoreError> {
        query(
            conn,
            &format!(
                "SELECT substr(created_at, 1, 7) AS month, COUNT(*) AS n FROM {table}
                 WHERE organization_id = :org AND deleted_at IS NULL AND {range}
                 GROUP BY month"
            ),
            b,
        )
    };
    let mut months: BTreeMap<String, MonthStats> = BTreeMap::new();
    for row in per_month("requests")? {
        months.entry(text(&row, "month")).or_default().requests += int(&row, "n");
    }
    for row in per_month("quotations")? {
        months.entry(text(&row, "month")).or_default().quotations += int(&row, "n");
    }
    let bookings = query(
        conn,
        &format!(
            "SELECT substr(created_at, 1, 7) AS month, currency, COUNT(*) AS n, SUM(total_cents) AS revenue_cents
             FROM bookings WHERE organization_id = :org AND deleted_at IS NULL AND status != 'cancelled' AND {range}
             GROUP BY month, currency"
        ),
        b,
    )?;
    for row in bookings {
        let entry = months.entry(text(&row, "month")).or_default();
        entry.bookings += int(&row, "n");
        *entry.revenue.entry(text(&row, "currency")).or_insert(0) += int(&row, "revenue_cents");
    }
    let months: Vec<Value> = months
        .into_iter()
        .map(|(month, s)| {
            let revenue: Vec<Value> = s
                .revenue
                .into_iter()
                .map(|(currency, cents)| json!({ "currency": currency, "revenue_cents": cents }))
                .collect();
            json!({
                "month": month,
                "requests": s.requests,
                "quotations": s.quotations,
                "bookings": s.bookings,
                "revenue": revenue,
            })
        })
        .collect();
    Ok(json!({ "months": months }))
}

/// Runs one named report. Unknown names are `NotFound`.
pub fn run_report(
    conn: &Connection,
    name: &str,
    org: OrganizationId,
    range: &DateRange,
    today: NaiveDate,
) -> Result<Value, StoreError> {
    let b = Binds::new(org.get(), range, today);
    let data = match name {
        "agents/clients" => agents_clients(conn, &b)?,
        "agents/performance" => agents_performance(conn, &b)?,
        "clients/demographics" => clients_demographics(conn, &b)?,
        "clients/acquisition-retention" => clients_acquisition_retention(conn, &b)?,
        "clients/lifetime-value" => clients_lifetime_value(conn, &b)?,
        "executive/summary" => executive_summary(conn, &b)?,
        "financial/aging" => financial_aging(conn, &b)?,
        "financial/commissions" => financial_commissions(conn, &b)?,
        "financial/dashboard" => financial_dashboard(conn, &b)?,
        "financial/providers" => financial_providers(conn, &b)?,
        "financial/profit-loss" => financial_profit_loss(conn, &b)?,
        "operations/booking-status" => operations_booking_status(conn, &b)?,
        "operations/service-usage" => operations_service_usage(conn, &b)?,
        "operations/response-times" => operations_response_times(conn, &b)?,
        "operations/capacity" => operations_capacity(conn, &b)?,
        "operations/upcoming-tours" => operations_upcoming_tours(conn, &b, today)?,
        "pricing/analysis" => pricing_analysis(conn, &b)?,
        "pricing/cost-structure" => pricing_cost_structure(conn, &b)?,
        "sales/overview" => sales_overview(conn, &b)?,
        "sales/destinations" => sales_destinations(conn, &b)?,
        "sales/quotes" => sales_quotes(conn, &b)?,
        "sales/trends" => sales_trends(conn, &b)?,
        _ => {
            return Err(StoreError::NotFound {
                resource: format!("report {name}"),
                id: 0,
            })
        }
    };
    Ok(json!({
        "report": name,
        "range": { "from": b.from, "to": b.to },
        "generated_for": b.today,
        "data": data,
    }))
}
