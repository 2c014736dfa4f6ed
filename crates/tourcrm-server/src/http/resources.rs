// SPDX-License-Identifier: Apache-2.0

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde_json::{json, Value};
use tourcrm_api::{build_list_response, parse_list_params, ApiError, ApiResponseEnvelope};
use tourcrm_model::{FieldError, ResourceDescriptor};
use tourcrm_store::{append_audit, audit_action, crud, int_field, text_field, AuditVerb, Row};

use super::audit_trail;
use super::auth::guard_role_assignment;
use super::errors::HttpError;
use super::extract::{record_id, Caller, JsonObject, QueryMap, Resource};
use crate::AppState;

pub(crate) fn rows_to_values(rows: Vec<Row>) -> Vec<Value> {
    rows.into_iter().map(Value::Object).collect()
}

/// Changed field names, sorted, for audit details.
pub(crate) fn field_names(body: &Row) -> Value {
    let mut names: Vec<&str> = body.keys().map(String::as_str).collect();
    names.sort_unstable();
    json!({ "fields": names })
}

/// PUT replaces the writable fields, so every required one must be present.
pub(crate) fn require_full_body(desc: &ResourceDescriptor, body: &Row) -> Result<(), HttpError> {
    let missing: Vec<FieldError> = desc
        .columns
        .iter()
        .filter(|c| c.writable && c.required && !body.contains_key(c.name))
        .map(|c| FieldError::new(c.name, "is required"))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(HttpError(ApiError::validation_failed(&missing)))
    }
}

pub(crate) async fn list_handler(
    State(state): State<AppState>,
    Extension(Resource(desc)): Extension<Resource>,
    caller: Caller,
    QueryMap(query): QueryMap,
) -> Result<Json<Value>, HttpError> {
    let org = caller.tenant()?;
    let params = parse_list_params(desc, &query)?;
    let list_query = params.query.clone();
    let page = state
        .store
        .call(move |conn, _| crud::list(conn, desc, org, &list_query))
        .await?;
    Ok(Json(build_list_response(
        rows_to_values(page.rows),
        page.total,
        &params.query.page,
        &format!("/api/{}", desc.route),
        &params.applied,
    )))
}

pub(crate) async fn get_handler(
    State(state): State<AppState>,
    Extension(Resource(desc)): Extension<Resource>,
    caller: Caller,
    Path(raw_id): Path<String>,
) -> Result<Json<ApiResponseEnvelope<Value>>, HttpError> {
    let org = caller.tenant()?;
    let id = record_id("id", &raw_id)?;
    let row = state
        .store
        .call(move |conn, _| crud::get(conn, desc, org, id))
        .await?;
    Ok(Json(ApiResponseEnvelope::new(Value::Object(row))))
}

pub(crate) async fn create_handler(
    State(state): State<AppState>,
    Extension(Resource(desc)): Extension<Resource>,
    caller: Caller,
    JsonObject(body): JsonObject,
) -> Result<Response, HttpError> {
    let org = caller.tenant()?;
    let user = caller.user();
    let mut audit = audit_trail::entry(
        org,
        user.map(|u| u.get()),
        &caller.meta,
        audit_action(desc.audit_resource, AuditVerb::Created),
        desc.name,
        None,
        field_names(&body),
    );
    let (row, audit) = state
        .store
        .transact(move |conn, ctx| {
            let row = crud::create(conn, ctx, desc, org, user, &body)?;
            audit.resource_id = int_field(&row, "id");
            if let Some((_, number_column)) = desc.number_prefix {
                if let Some(number) = text_field(&row, number_column) {
                    audit.details[number_column] = Value::String(number.to_string());
                }
            }
            append_audit(conn, ctx.clock, &audit)?;
            Ok((row, audit))
        })
        .await?;
    audit_trail::emit(&state, &audit);
    Ok((StatusCode::CREATED, Json(ApiResponseEnvelope::new(Value::Object(row)))).into_response())
}

async fn update(
    state: AppState,
    desc: &'static ResourceDescriptor,
    caller: Caller,
    raw_id: &str,
    body: Row,
) -> Result<Json<ApiResponseEnvelope<Value>>, HttpError> {
    let org = caller.tenant()?;
    let id = record_id("id", raw_id)?;
    if desc.table == "users" {
        guard_role_assignment(&caller, body.get("role").and_then(Value::as_str))?;
    }
    let audit = audit_trail::entry(
        org,
        caller.user().map(|u| u.get()),
        &caller.meta,
        audit_action(desc.audit_resource, AuditVerb::Updated),
        desc.name,
        Some(id.get()),
        field_names(&body),
    );
    let (row, audit) = state
        .store
        .transact(move |conn, ctx| {
            let row = crud::update(conn, ctx, desc, org, id, &body)?;
            append_audit(conn, ctx.clock, &audit)?;
            Ok((row, audit))
        })
        .await?;
    audit_trail::emit(&state, &audit);
    Ok(Json(ApiResponseEnvelope::new(Value::Object(row))))
}

pub(crate) async fn replace_handler(
    State(state): State<AppState>,
    Extension(Resource(desc)): Extension<Resource>,
    caller: Caller,
    Path(raw_id): Path<String>,
    JsonObject(body): JsonObject,
) -> Result<Json<ApiResponseEnvelope<Value>>, HttpError> {
    require_full_body(desc, &body)?;
    update(state, desc, caller, &raw_id, body).await
}

pub(crate) async fn patch_handler(
    State(state): State<AppState>,
    Extension(Resource(desc)): Extension<Resource>,
    caller: Caller,
    Path(raw_id): Path<String>,
    JsonObject(body): JsonObject,
) -> Result<Json<ApiResponseEnvelope<Value>>, HttpError> {
    update(state, desc, caller, &raw_id, body).await
}

pub(crate) async fn delete_handler(
    State(state): State<AppState>,
    Extension(Resource(desc)): Extension<Resource>,
    caller: Caller,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, HttpError> {
    let org = caller.tenant()?;
    let id = record_id("id", &raw_id)?;
    if desc.table == "users" && caller.principal.user_id.get() == id.get() {
        return Err(HttpError(ApiError::invalid_transition("users cannot delete themselves")));
    }
    let audit = audit_trail::entry(
        org,
        caller.user().map(|u| u.get()),
        &caller.meta,
        audit_action(desc.audit_resource, AuditVerb::Deleted),
        desc.name,
        Some(id.get()),
        json!({}),
    );
    let audit = state
        .store
        .transact(move |conn, ctx| {
            crud::soft_delete(conn, ctx, desc, org, id)?;
            append_audit(conn, ctx.clock, &audit)?;
            Ok(audit)
        })
        .await?;
    audit_trail::emit(&state, &audit);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tourcrm_model::resource_by_name;

    #[test]
    fn put_requires_every_required_writable_column() {
        let desc = resource_by_name("clients").expect("clients");
        let mut body = Row::new();
        body.insert("phone".into(), json!("+90 555 000 0000"));
        let err = require_full_body(desc, &body).expect_err("name missing");
        let fields = err.0.details["field_errors"].as_array().expect("field errors");
        assert!(fields.iter().any(|f| f["field"] == "name"));
    }

    #[test]
    fn audit_details_list_fields_sorted() {
        let mut body = Row::new();
        body.insert("status".into(), json!("confirmed"));
        body.insert("notes".into(), json!("x"));
        assert_eq!(field_names(&body), json!({ "fields": ["notes", "status"] }));
    }
}
