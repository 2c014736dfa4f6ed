// SPDX-License-Identifier: Apache-2.0

//! Quotation itinerary days, priced expenses, status workflow and the
//! printable itinerary.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tourcrm_api::{build_list_response, parse_list_params, ApiError, ApiResponseEnvelope};
use tourcrm_core::{OrganizationId, RecordId};
use tourcrm_model::{QuotationStatus, ResourceDescriptor, QUOTATION_DAYS, QUOTATION_EXPENSES};
use tourcrm_store::{append_audit, audit_action, int_field, quotations, AuditVerb, Row};

use super::audit_trail;
use super::auth::typed_body;
use super::errors::HttpError;
use super::extract::{record_id, Caller, JsonObject, QueryMap};
use super::resources::{field_names, require_full_body, rows_to_values};
use crate::AppState;

/// Which child collection of a quotation a route serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Child {
    Days,
    Expenses,
}

impl Child {
    fn descriptor(self) -> &'static ResourceDescriptor {
        match self {
            Self::Days => &QUOTATION_DAYS,
            Self::Expenses => &QUOTATION_EXPENSES,
        }
    }

    const fn segment(self) -> &'static str {
        match self {
            Self::Days => "days",
            Self::Expenses => "expenses",
        }
    }
}

fn ids(raw_quotation: &str, raw_item: &str) -> Result<(RecordId, RecordId), HttpError> {
    Ok((record_id("id", raw_quotation)?, record_id("item_id", raw_item)?))
}

async fn list_children(
    state: AppState,
    child: Child,
    caller: Caller,
    raw_id: String,
    query: std::collections::BTreeMap<String, String>,
) -> Result<Json<Value>, HttpError> {
    let org = caller.tenant()?;
    let qid = record_id("id", &raw_id)?;
    let params = parse_list_params(child.descriptor(), &query)?;
    let list_query = params.query.clone();
    let page = state
        .store
        .call(move |conn, _| match child {
            Child::Days => quotations::list_days(conn, org, qid, &list_query),
            Child::Expenses => quotations::list_expenses(conn, org, qid, &list_query),
        })
        .await?;
    Ok(Json(build_list_response(
        rows_to_values(page.rows),
        page.total,
        &params.query.page,
        &format!("/api/quotations/{}/{}", qid.get(), child.segment()),
        &params.applied,
    )))
}

pub(crate) async fn list_days_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(raw_id): Path<String>,
    QueryMap(query): QueryMap,
) -> Result<Json<Value>, HttpError> {
    list_children(state, Child::Days, caller, raw_id, query).await
}

pub(crate) async fn list_expenses_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(raw_id): Path<String>,
    QueryMap(query): QueryMap,
) -> Result<Json<Value>, HttpError> {
    list_children(state, Child::Expenses, caller, raw_id, query).await
}

async fn get_child(
    state: AppState,
    child: Child,
    caller: Caller,
    raw: (String, String),
) -> Result<Json<ApiResponseEnvelope<Value>>, HttpError> {
    let org = caller.tenant()?;
    let (qid, item) = ids(&raw.0, &raw.1)?;
    let row = state
        .store
        .call(move |conn, _| match child {
            Child::Days => quotations::get_day(conn, org, qid, item),
            Child::Expenses => quotations::get_expense(conn, org, qid, item),
        })
        .await?;
    Ok(Json(ApiResponseEnvelope::new(Value::Object(row))))
}

pub(crate) async fn get_day_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(raw): Path<(String, String)>,
) -> Result<Json<ApiResponseEnvelope<Value>>, HttpError> {
    get_child(state, Child::Days, caller, raw).await
}

pub(crate) async fn get_expense_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(raw): Path<(String, String)>,
) -> Result<Json<ApiResponseEnvelope<Value>>, HttpError> {
    get_child(state, Child::Expenses, caller, raw).await
}

fn child_audit(
    caller: &Caller,
    org: OrganizationId,
    child: Child,
    verb: AuditVerb,
    resource_id: Option<i64>,
    details: Value,
) -> tourcrm_store::AuditEntry {
    let desc = child.descriptor();
    audit_trail::entry(
        org,
        caller.user().map(|u| u.get()),
        &caller.meta,
        audit_action(desc.audit_resource, verb),
        desc.name,
        resource_id,
        details,
    )
}

fn with_quotation(mut details: Value, qid: RecordId) -> Value {
    details["quotation_id"] = Value::from(qid.get());
    details
}

async fn create_child(
    state: AppState,
    child: Child,
    caller: Caller,
    raw_id: String,
    body: Row,
) -> Result<Response, HttpError> {
    let org = caller.tenant()?;
    let qid = record_id("id", &raw_id)?;
    let user = caller.user();
    let mut audit = child_audit(
        &caller,
        org,
        child,
        AuditVerb::Created,
        None,
        with_quotation(field_names(&body), qid),
    );
    let (data, audit) = state
        .store
        .transact(move |conn, ctx| {
            let data = match child {
                Child::Days => {
                    let row = quotations::add_day(conn, ctx, org, user, qid, &body)?;
                    audit.resource_id = int_field(&row, "id");
                    Value::Object(row)
                }
                Child::Expenses => {
                    let change = quotations::add_expense(conn, ctx, org, user, qid, &body)?;
                    audit.resource_id = change.expense.as_ref().and_then(|e| int_field(e, "id"));
                    audit.details["totals"] = serde_json::to_value(change.totals)?;
                    serde_json::to_value(&change)?
                }
            };
            append_audit(conn, ctx.clock, &audit)?;
            Ok((data, audit))
        })
        .await?;
    audit_trail::emit(&state, &audit);
    Ok((StatusCode::CREATED, Json(ApiResponseEnvelope::new(data))).into_response())
}

pub(crate) async fn create_day_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(raw_id): Path<String>,
    JsonObject(body): JsonObject,
) -> Result<Response, HttpError> {
    create_child(state, Child::Days, caller, raw_id, body).await
}

pub(crate) async fn create_expense_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(raw_id): Path<String>,
    JsonObject(body): JsonObject,
) -> Result<Response, HttpError> {
    create_child(state, Child::Expenses, caller, raw_id, body).await
}

async fn update_child(
    state: AppState,
    child: Child,
    caller: Caller,
    raw: (String, String),
    body: Row,
    replace: bool,
) -> Result<Json<ApiResponseEnvelope<Value>>, HttpError> {
    if replace {
        require_full_body(child.descriptor(), &body)?;
    }
    let org = caller.tenant()?;
    let (qid, item) = ids(&raw.0, &raw.1)?;
    let mut audit = child_audit(
        &caller,
        org,
        child,
        AuditVerb::Updated,
        Some(item.get()),
        with_quotation(field_names(&body), qid),
    );
    let (data, audit) = state
        .store
        .transact(move |conn, ctx| {
            let data = match child {
                Child::Days => {
                    Value::Object(quotations::update_day(conn, ctx, org, qid, item, &body)?)
                }
                Child::Expenses => {
                    let change = quotations::update_expense(conn, ctx, org, qid, item, &body)?;
                    audit.details["totals"] = serde_json::to_value(change.totals)?;
                    serde_json::to_value(&change)?
                }
            };
            append_audit(conn, ctx.clock, &audit)?;
            Ok((data, audit))
        })
        .await?;
    audit_trail::emit(&state, &audit);
    Ok(Json(ApiResponseEnvelope::new(data)))
}

pub(crate) async fn replace_day_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(raw): Path<(String, String)>,
    JsonObject(body): JsonObject,
) -> Result<Json<ApiResponseEnvelope<Value>>, HttpError> {
    update_child(state, Child::Days, caller, raw, body, true).await
}

pub(crate) async fn patch_day_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(raw): Path<(String, String)>,
    JsonObject(body): JsonObject,
) -> Result<Json<ApiResponseEnvelope<Value>>, HttpError> {
    update_child(state, Child::Days, caller, raw, body, false).await
}

pub(crate) async fn replace_expense_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(raw): Path<(String, String)>,
    JsonObject(body): JsonObject,
) -> Result<Json<ApiResponseEnvelope<Value>>, HttpError> {
    update_child(state, Child::Expenses, caller, raw, body, true).await
}

pub(crate) async fn patch_expense_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(raw): Path<(String, String)>,
    JsonObject(body): JsonObject,
) -> Result<Json<ApiResponseEnvelope<Value>>, HttpError> {
    update_child(state, Child::Expenses, caller, raw, body, false).await
}

async fn delete_child(
    state: AppState,
    child: Child,
    caller: Caller,
    raw: (String, String),
) -> Result<StatusCode, HttpError> {
    let org = caller.tenant()?;
    let (qid, item) = ids(&raw.0, &raw.1)?;
    let mut audit = child_audit(
        &caller,
        org,
        child,
        AuditVerb::Deleted,
        Some(item.get()),
        with_quotation(json!({}), qid),
    );
    let audit = state
        .store
        .transact(move |conn, ctx| {
            match child {
                Child::Days => quotations::delete_day(conn, ctx, org, qid, item)?,
                Child::Expenses => {
                    let change = quotations::delete_expense(conn, ctx, org, qid, item)?;
                    audit.details["totals"] = serde_json::to_value(change.totals)?;
                }
            }
            append_audit(conn, ctx.clock, &audit)?;
            Ok(audit)
        })
        .await?;
    audit_trail::emit(&state, &audit);
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn delete_day_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(raw): Path<(String, String)>,
) -> Result<StatusCode, HttpError> {
    delete_child(state, Child::Days, caller, raw).await
}

pub(crate) async fn delete_expense_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(raw): Path<(String, String)>,
) -> Result<StatusCode, HttpError> {
    delete_child(state, Child::Expenses, caller, raw).await
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StatusRequest {
    status: String,
}

/// Moves a quotation along its workflow. Acceptance also creates the booking.
pub(crate) async fn change_status_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(raw_id): Path<String>,
    JsonObject(body): JsonObject,
) -> Result<Json<ApiResponseEnvelope<Value>>, HttpError> {
    let org = caller.tenant()?;
    let qid = record_id("id", &raw_id)?;
    let request: StatusRequest = typed_body(body)?;
    let next = QuotationStatus::parse(request.status.trim()).map_err(|_| {
        HttpError(ApiError::validation_failed(&[tourcrm_model::FieldError::new(
            "status",
            format!("must be one of {}", QuotationStatus::NAMES.join(", ")),
        )]))
    })?;
    let user = caller.user();
    let status_audit = audit_trail::entry(
        org,
        user.map(|u| u.get()),
        &caller.meta,
        audit_action("QUOTATION", AuditVerb::StatusChanged),
        "quotations",
        Some(qid.get()),
        json!({ "status": next.as_str() }),
    );
    let booking_audit = audit_trail::entry(
        org,
        user.map(|u| u.get()),
        &caller.meta,
        audit_action("BOOKING", AuditVerb::Created),
        "bookings",
        None,
        json!({ "quotation_id": qid.get() }),
    );
    let (change, audits) = state
        .store
        .transact(move |conn, ctx| {
            let change = quotations::change_status(conn, ctx, org, user, qid, next)?;
            let mut audits = vec![status_audit];
            if let Some(booking) = &change.booking {
                let mut entry = booking_audit;
                entry.resource_id = int_field(booking, "id");
                audits.push(entry);
            }
            for entry in &audits {
                append_audit(conn, ctx.clock, entry)?;
            }
            Ok((change, audits))
        })
        .await?;
    for entry in &audits {
        audit_trail::emit(&state, entry);
    }
    Ok(Json(ApiResponseEnvelope::new(json!({
        "quotation": change.quotation,
        "booking": change.booking,
    }))))
}

pub(crate) async fn itinerary_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(raw_id): Path<String>,
) -> Result<Json<ApiResponseEnvelope<Value>>, HttpError> {
    let org = caller.tenant()?;
    let qid = record_id("id", &raw_id)?;
    let itinerary = state
        .store
        .call(move |conn, _| quotations::generate_itinerary(conn, org, qid))
        .await?;
    Ok(Json(ApiResponseEnvelope::new(itinerary)))
}
