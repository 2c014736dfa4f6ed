// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::{json, Value};
use tourcrm_core::OrganizationId;
use tourcrm_model::resource_by_name;
use tourcrm_query::Value as SqlParam;

use crate::error::StoreError;
use crate::row::{collect, collect_plain, row_to_json};

/// Newest rate per `(base, quote)` pair, optionally for one base currency.
pub fn latest_exchange_rates(
    conn: &Connection,
    org: OrganizationId,
    base: Option<&str>,
) -> Result<Vec<Value>, StoreError> {
    let desc = resource_by_name("exchange-rates")
        .ok_or_else(|| StoreError::Sql("exchange-rates descriptor missing".to_string()))?;
    let columns = desc.select_columns();
    let qualified: Vec<String> = columns.iter().map(|c| format!("r.{c}")).collect();
    let mut sql = format!(
        "SELECT {} FROM exchange_rates r
         WHERE r.organization_id = ?1 AND r.deleted_at IS NULL
           AND NOT EXISTS (
             SELECT 1 FROM exchange_rates n
             WHERE n.organization_id = r.organization_id AND n.deleted_at IS NULL
               AND n.base_currency = r.base_currency AND n.quote_currency = r.quote_currency
               AND (n.effective_date > r.effective_date
                    OR (n.effective_date = r.effective_date AND n.id > r.id)))",
        qualified.join(", ")
    );
    let mut params = vec![SqlParam::Integer(org.get())];
    if let Some(base) = base {
        sql.push_str(" AND r.base_currency = ?2");
        params.push(SqlParam::Text(base.to_string()));
    }
    sql.push_str(" ORDER BY r.base_currency, r.quote_currency");
    collect(conn, &sql, &params, |r| {
        row_to_json(desc, &columns, r).map(Value::Object)
    })
}

struct Totals {
    invoiced: i64,
    paid: i64,
    outstanding: i64,
    overdue: i64,
    count: i64,
}

fn invoice_totals(
    conn: &Connection,
    table: &str,
    org: i64,
    today: NaiveDate,
) -> Result<BTreeMap<String, Totals>, StoreError> {
    let sql = format!(
        "SELECT currency, COUNT(*), COALESCE(SUM(amount_cents), 0), COALESCE(SUM(paid_cents), 0),
                COALESCE(SUM(CASE WHEN due_date < ?2 THEN amount_cents - paid_cents ELSE 0 END), 0)
         FROM {table}
         WHERE organization_id = ?1 AND deleted_at IS NULL AND status != 'cancelled'
         GROUP BY currency ORDER BY currency"
    );
    let rows = collect(
        conn,
        &sql,
        &[
            SqlParam::Integer(org),
            SqlParam::Text(today.format("%Y-%m-%d").to_string()),
        ],
        |r| {
            let invoiced: i64 = r.get(2)?;
            let paid: i64 = r.get(3)?;
            Ok((
                r.get::<_, String>(0)?,
                Totals {
                    count: r.get(1)?,
                    invoiced,
                    paid,
                    outstanding: invoiced - paid,
                    overdue: r.get(4)?,
                },
            ))
        },
    )?;
    Ok(rows.into_iter().collect())
}

fn totals_json(t: &Totals) -> Value {
    json!({
        "count": t.count,
        "invoiced_cents": t.invoiced,
        "paid_cents": t.paid,
        "outstanding_cents": t.outstanding,
        "overdue_cents": t.overdue,
    })
}

/// Receivable and payable position per currency. Amounts in different
/// currencies are never added together.
pub fn finance_summary(
    conn: &Connection,
    org: OrganizationId,
    today: NaiveDate,
) -> Result<Value, StoreError> {
    let receivable = invoice_totals(conn, "invoices_receivable", org.get(), today)?;
    let payable = invoice_totals(conn, "invoices_payable", org.get(), today)?;
    let mut currencies: Vec<&String> = receivable.keys().chain(payable.keys()).collect();
    currencies.sort();
    currencies.dedup();
    let empty = Totals {
        invoiced: 0,
        paid: 0,
        outstanding: 0,
        overdue: 0,
        count: 0,
    };
    let by_currency: Vec<Value> = currencies
        .into_iter()
        .map(|currency| {
            let r = receivable.get(currency).unwrap_or(&empty);
            let p = payable.get(currency).unwrap_or(&empty);
            json!({
                "currency": currency,
                "receivable": totals_json(r),
                "payable": totals_json(p),
                "net_position_cents": r.outstanding - p.outstanding,
                "gross_margin_cents": r.invoiced - p.invoiced,
            })
        })
        .collect();
    Ok(json!({ "as_of": today.format("%Y-%m-%d").to_string(), "currencies": by_currency }))
}

/// Open receivable balance per client and currency, largest first.
pub fn finance_customers(conn: &Connection, org: OrganizationId) -> Result<Vec<Value>, StoreError> {
    collect_plain(
        conn,
        "SELECT c.id AS client_id, c.name AS client_name, i.currency AS currency,
                COUNT(i.id) AS invoice_count,
                SUM(i.amount_cents) AS invoiced_cents,
                SUM(i.paid_cents) AS paid_cents,
                SUM(i.amount_cents - i.paid_cents) AS outstanding_cents,
                MIN(CASE WHEN i.paid_cents < i.amount_cents THEN i.due_date END) AS oldest_due_date
         FROM invoices_receivable i
         JOIN clients c ON c.id = i.client_id AND c.organization_id = i.organization_id
         WHERE i.organization_id = ?1 AND i.deleted_at IS NULL AND i.status != 'cancelled'
         GROUP BY c.id, c.name, i.currency
         HAVING SUM(i.amount_cents - i.paid_cents) > 0
         ORDER BY outstanding_cents DESC, c.id",
        &[SqlParam::Integer(org.get())],
    )
}

/// Open payable balance per provider and currency, largest first.
pub fn finance_suppliers(conn: &Connection, org: OrganizationId) -> Result<Vec<Value>, StoreError> {
    collect_plain(
        conn,
        "SELECT p.id AS provider_id, p.name AS provider_name, i.currency AS currency,
                COUNT(i.id) AS invoice_count,
                SUM(i.amount_cents) AS billed_cents,
                SUM(i.paid_cents) AS paid_cents,
                SUM(i.amount_cents - i.paid_cents) AS outstanding_cents,
                MIN(CASE WHEN i.paid_cents < i.amount_cents THEN i.due_date END) AS oldest_due_date
         FROM invoices_payable i
         JOIN providers p ON p.id = i.provider_id AND p.organization_id = i.organization_id
         WHERE i.organization_id = ?1 AND i.deleted_at IS NULL AND i.status != 'cancelled'
         GROUP BY p.id, p.name, i.currency
         HAVING SUM(i.amount_cents - i.paid_cents) > 0
         ORDER BY outstanding_cents DESC, p.id",
        &[SqlParam::Integer(org.get())],
    )
}
