// SPDX-License-Identifier: Apache-2.0

use rusqlite::{params, Connection};
use serde::Serialize;
use serde_json::Value;
use tourcrm_core::{OrganizationId, RecordId, UserId};
use tourcrm_model::{
    resource_by_name, validate_value, ColumnSpec, FieldError, InvoiceStatus, ResourceDescriptor,
    SqlValue,
};
use tourcrm_query::Value as SqlParam;
use tracing::info;

use crate::error::StoreError;
use crate::pool::Ctx;
use crate::row::{collect, fetch_row, int_field, row_to_plain_json, text_field, Row};

pub const PAYMENT_METHODS: &[&str] = &["cash", "bank_transfer", "credit_card", "other"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceKind {
    Receivable,
    Payable,
}

impl InvoiceKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Receivable => "receivable",
            Self::Payable => "payable",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "receivable" => Some(Self::Receivable),
            "payable" => Some(Self::Payable),
            _ => None,
        }
    }

    pub fn descriptor(self) -> Result<&'static ResourceDescriptor, StoreError> {
        let name = match self {
            Self::Receivable => "invoices-receivable",
            Self::Payable => "invoices-payable",
        };
        resource_by_name(name).ok_or_else(|| StoreError::Sql(format!("{name} descriptor missing")))
    }
}

/// A validated payment request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentInput {
    pub amount_cents: i64,
    pub paid_on: String,
    pub method: String,
    pub reference: Option<String>,
}

const PAYMENT_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::money("amount_cents").required(),
    ColumnSpec::date("paid_on").required(),
    ColumnSpec::one_of("method", PAYMENT_METHODS).required(),
    ColumnSpec::text("reference", 120),
];

impl PaymentInput {
    /// Reads `amount_cents`, `paid_on`, `method` and optional `reference`.
    pub fn from_json(body: &Row) -> Result<Self, StoreError> {
        let mut errors: Vec<FieldError> = body
            .keys()
            .filter(|k| !PAYMENT_COLUMNS.iter().any(|c| c.name == k.as_str()))
            .map(|k| FieldError::new(k, "is not a known field"))
            .collect();
        let mut amount_cents = 0;
        let mut paid_on = String::new();
        let mut method = String::new();
        let mut reference = None;
        for column in PAYMENT_COLUMNS {
            let value = match body.get(column.name) {
                Some(v) => validate_value(column, v),
                None if column.required => Err(FieldError::new(column.name, "is required")),
                None => continue,
            };
            match (column.name, value) {
                (_, Err(e)) => errors.push(e),
                ("amount_cents", Ok(SqlValue::Integer(n))) => amount_cents = n,
                ("paid_on", Ok(SqlValue::Text(s))) => paid_on = s,
                ("method", Ok(SqlValue::Text(s))) => method = s,
                ("reference", Ok(SqlValue::Text(s))) => reference = Some(s),
                _ => {}
            }
        }
        if errors.is_empty() && amount_cents <= 0 {
            errors.push(FieldError::new("amount_cents", "must be greater than zero"));
        }
        if errors.is_empty() {
            Ok(Self {
                amount_cents,
                paid_on,
                method,
                reference,
            })
        } else {
            Err(StoreError::Validation(errors))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRecorded {
    pub invoice: Row,
    pub payment: Row,
}

const PAYMENT_SELECT: &str = "SELECT id, invoice_kind, invoice_id, amount_cents, paid_on, method, reference, created_by, created_at FROM invoice_payments";

/// Adds a payment to an open invoice and moves it to `partial` or `paid`.
/// Over-payment and payments on cancelled invoices are refused.
pub fn record_payment(
    conn: &mut Connection,
    ctx: &Ctx<'_>,
    kind: InvoiceKind,
    org: OrganizationId,
    user: Option<UserId>,
    invoice_id: RecordId,
    input: &PaymentInput,
) -> Result<PaymentRecorded, StoreError> {
    let desc = kind.descriptor()?;
    let (org, id) = (org.get(), invoice_id.get());
    let tx = conn.savepoint()?;
    let invoice = fetch_row(&tx, desc, org, id)?;
    if text_field(&invoice, "status") == Some(InvoiceStatus::Cancelled.as_str()) {
        return Err(StoreError::InvalidTransition(
            "cannot record a payment on a cancelled invoice".to_string(),
        ));
    }
    let amount = int_field(&invoice, "amount_cents").unwrap_or(0);
    let paid = int_field(&invoice, "paid_cents").unwrap_or(0);
    let outstanding = amount - paid;
    if input.amount_cents > outstanding {
        return Err(StoreError::field(
            "amount_cents",
            format!("exceeds the outstanding balance of {outstanding} cents"),
        ));
    }
    let now = ctx.clock.now_rfc3339();
    tx.execute(
        "INSERT INTO invoice_payments (organization_id, invoice_kind, invoice_id, amount_cents, paid_on, method, reference, created_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            org,
            kind.as_str(),
            id,
            input.amount_cents,
            input.paid_on,
            input.method,
            input.reference,
            user.map(UserId::get),
            now
        ],
    )?;
    let payment_id = tx.last_insert_rowid();
    let new_paid = paid + input.amount_cents;
    let status = InvoiceStatus::from_amounts(amount, new_paid);
    tx.execute(
        &format!(
            "UPDATE {} SET paid_cents = ?1, status = ?2, updated_at = ?3 WHERE id = ?4 AND organization_id = ?5",
            desc.table
        ),
        params![new_paid, status.as_str(), now, id, org],
    )?;
    let payment = collect(
        &tx,
        &format!("{PAYMENT_SELECT} WHERE id = ?1"),
        &[SqlParam::Integer(payment_id)],
        row_to_plain_json,
    )?
    .into_iter()
    .next()
    .ok_or_else(|| StoreError::not_found("invoice-payment", payment_id))?;
    let invoice = fetch_row(&tx, desc, org, id)?;
    tx.commit()?;
    info!(kind = kind.as_str(), invoice_id = id, organization_id = org, status = status.as_str(), "payment recorded");
    Ok(PaymentRecorded { invoice, payment })
}

pub fn list_payments(
    conn: &Connection,
    kind: InvoiceKind,
    org: OrganizationId,
    invoice_id: RecordId,
) -> Result<Vec<Value>, StoreError> {
    let desc = kind.descriptor()?;
    fetch_row(conn, desc, org.get(), invoice_id.get())?;
    collect(
        conn,
        &format!(
            "{PAYMENT_SELECT} WHERE organization_id = ?1 AND invoice_kind = ?2 AND invoice_id = ?3 ORDER BY paid_on, id"
        ),
        &[
            SqlParam::Integer(org.get()),
            SqlParam::Text(kind.as_str().to_string()),
            SqlParam::Integer(invoice_id.get()),
        ],
        |r| row_to_plain_json(r).map(Value::Object),
    )
}

/// Cancels an invoice that has no payments yet.
pub fn cancel_invoice(
    conn: &mut Connection,
    ctx: &Ctx<'_>,
    kind: InvoiceKind,
    org: OrganizationId,
    invoice_id: RecordId,
) -> Result<Row, StoreError> {
    let desc = kind.descriptor()?;
    let (org, id) = (org.get(), invoice_id.get());
    let tx = conn.savepoint()?;
    let invoice = fetch_row(&tx, desc, org, id)?;
    if text_field(&invoice, "status") == Some(InvoiceStatus::Cancelled.as_str()) {
        return Err(StoreError::InvalidTransition(
            "invoice is already cancelled".to_string(),
        ));
    }
    if int_field(&invoice, "paid_cents").unwrap_or(0) > 0 {
        return Err(StoreError::InvalidTransition(
            "invoices with recorded payments cannot be cancelled".to_string(),
        ));
    }
    tx.execute(
        &format!(
            "UPDATE {} SET status = ?1, updated_at = ?2 WHERE id = ?3 AND organization_id = ?4",
            desc.table
        ),
        params![InvoiceStatus::Cancelled.as_str(), ctx.clock.now_rfc3339(), id, org],
    )?;
    let invoice = fetch_row(&tx, desc, org, id)?;
    tx.commit()?;
    Ok(invoice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> Row {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn payment_body_accepts_decimal_amounts() {
        let input = PaymentInput::from_json(&body(json!({
            "amount_cents": "150.25",
            "paid_on": "2025-03-01",
            "method": "bank_transfer",
        })))
        .expect("valid");
        assert_eq!(input.amount_cents, 15_025);
        assert_eq!(input.reference, None);
    }

    #[test]
    fn payment_body_reports_every_problem() {
        let Err(StoreError::Validation(errors)) = PaymentInput::from_json(&body(json!({
            "amount_cents": 0,
            "method": "cheque",
            "memo": "x",
        }))) else {
            panic!("expected validation errors");
        };
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"memo"));
        assert!(fields.contains(&"paid_on"));
        assert!(fields.contains(&"method"));
    }

    #[test]
    fn zero_amount_is_rejected() {
        let err = PaymentInput::from_json(&body(json!({
            "amount_cents": 0,
            "paid_on": "2025-03-01",
            "method": "cash",
        })))
        .expect_err("zero");
        assert!(err.to_string().contains("greater than zero"));
    }
}
