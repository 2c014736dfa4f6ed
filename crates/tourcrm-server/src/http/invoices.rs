// SPDX-License-Identifier: Apache-2.0

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde_json::{json, Value};
use tourcrm_api::ApiResponseEnvelope;
use tourcrm_store::invoices::{cancel_invoice, list_payments, record_payment};
use tourcrm_store::{append_audit, audit_action, AuditVerb, InvoiceKind, PaymentInput};

use super::audit_trail;
use super::errors::HttpError;
use super::extract::{record_id, Caller, JsonObject};
use crate::AppState;

pub(crate) async fn list_payments_handler(
    State(state): State<AppState>,
    Extension(kind): Extension<InvoiceKind>,
    caller: Caller,
    Path(raw_id): Path<String>,
) -> Result<Json<Value>, HttpError> {
    let org = caller.tenant()?;
    let id = record_id("id", &raw_id)?;
    let payments = state
        .store
        .call(move |conn, _| list_payments(conn, kind, org, id))
        .await?;
    Ok(Json(json!({ "data": payments })))
}

pub(crate) async fn record_payment_handler(
    State(state): State<AppState>,
    Extension(kind): Extension<InvoiceKind>,
    caller: Caller,
    Path(raw_id): Path<String>,
    JsonObject(body): JsonObject,
) -> Result<Response, HttpError> {
    let org = caller.tenant()?;
    let id = record_id("id", &raw_id)?;
    let input = PaymentInput::from_json(&body)?;
    let user = caller.user();
    let desc = kind.descriptor()?;
    let audit = audit_trail::entry(
        org,
        user.map(|u| u.get()),
        &caller.meta,
        audit_action(desc.audit_resource, AuditVerb::PaymentRecorded),
        desc.name,
        Some(id.get()),
        json!({
            "amount_cents": input.amount_cents,
            "method": input.method,
            "paid_on": input.paid_on,
        }),
    );
    let (recorded, audit) = state
        .store
        .transact(move |conn, ctx| {
            let recorded = record_payment(conn, ctx, kind, org, user, id, &input)?;
            append_audit(conn, ctx.clock, &audit)?;
            Ok((recorded, audit))
        })
        .await?;
    audit_trail::emit(&state, &audit);
    Ok((StatusCode::CREATED, Json(ApiResponseEnvelope::new(recorded))).into_response())
}

pub(crate) async fn cancel_handler(
    State(state): State<AppState>,
    Extension(kind): Extension<InvoiceKind>,
    caller: Caller,
    Path(raw_id): Path<String>,
) -> Result<Json<ApiResponseEnvelope<Value>>, HttpError> {
    let org = caller.tenant()?;
    let id = record_id("id", &raw_id)?;
    let desc = kind.descriptor()?;
    let audit = audit_trail::entry(
        org,
        caller.user().map(|u| u.get()),
        &caller.meta,
        audit_action(desc.audit_resource, AuditVerb::Cancelled),
        desc.name,
        Some(id.get()),
        json!({}),
    );
    let (invoice, audit) = state
        .store
        .transact(move |conn, ctx| {
            let invoice = cancel_invoice(conn, ctx, kind, org, id)?;
            append_audit(conn, ctx.clock, &audit)?;
            Ok((invoice, audit))
        })
        .await?;
    audit_trail::emit(&state, &audit);
    Ok(Json(ApiResponseEnvelope::new(Value::Object(invoice))))
}
