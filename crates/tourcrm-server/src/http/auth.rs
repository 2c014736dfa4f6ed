// SPDX-License-Identifier: Apache-2.0

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::DateTime;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tourcrm_api::{ApiError, ApiResponseEnvelope, ErrorCode};
use tourcrm_core::{Clock, OrganizationId};
use tourcrm_model::Role;
use tourcrm_store::auth::{
    create_organization, create_user, get_auth_user, list_organizations, password_matches,
    set_password, verify_login,
};
use tourcrm_store::{append_audit, audit_action, int_field, AuditVerb, NewUser, StoreError};
use tracing::info;

use super::audit_trail;
use super::errors::HttpError;
use super::extract::{Caller, JsonObject, RequestMeta};
use crate::token::{issue_token, TokenClaims};
use crate::AppState;

/// Decodes a JSON object body into a typed request, rejecting unknown keys.
pub(crate) fn typed_body<T: DeserializeOwned>(body: tourcrm_store::Row) -> Result<T, HttpError> {
    serde_json::from_value(Value::Object(body)).map_err(|e| {
        HttpError(ApiError::new(
            ErrorCode::ValidationError,
            "invalid request body",
            json!({ "reason": e.to_string() }),
        ))
    })
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChangePasswordRequest {
    current_password: String,
    new_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct OrganizationRequest {
    name: String,
    slug: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NewUserRequest {
    email: String,
    name: String,
    role: Role,
    password: String,
}

fn org_of(raw: i64) -> Result<OrganizationId, StoreError> {
    OrganizationId::new(raw).map_err(|e| StoreError::Sql(e.to_string()))
}

pub(crate) async fn login_handler(
    State(state): State<AppState>,
    meta: Option<Extension<RequestMeta>>,
    JsonObject(body): JsonObject,
) -> Result<Json<Value>, HttpError> {
    let request: LoginRequest = typed_body(body)?;
    let meta = meta.map_or_else(
        || RequestMeta {
            request_id: "req-unknown".to_string(),
            ip_address: None,
        },
        |Extension(m)| m,
    );
    let (user, audit) = state
        .store
        .transact(move |conn, ctx| {
            let user = verify_login(conn, ctx, &request.email, &request.password)?;
            let audit = audit_trail::entry(
                org_of(user.organization_id)?,
                Some(user.id),
                &meta,
                audit_action("USER", AuditVerb::LoggedIn),
                "users",
                Some(user.id),
                json!({ "email": user.email }),
            );
            append_audit(conn, ctx.clock, &audit)?;
            Ok((user, audit))
        })
        .await?;
    audit_trail::emit(&state, &audit);

    let iat = state.clock.unix_secs();
    let exp = iat.saturating_add(i64::try_from(state.api.token_ttl.as_secs()).unwrap_or(i64::MAX));
    let claims = TokenClaims {
        sub: user.id,
        org: user.organization_id,
        role: user.role,
        iat,
        exp,
    };
    let token = issue_token(&state.api.token_secret, &claims)
        .map_err(|e| HttpError(ApiError::internal(format!("token issue failed: {e}"))))?;
    let expires_at = DateTime::from_timestamp(exp, 0).map(|t| t.to_rfc3339());
    info!(user_id = user.id, organization_id = user.organization_id, "login succeeded");
    Ok(Json(json!({
        "data": {
            "token": token,
            "token_type": "Bearer",
            "expires_at": expires_at,
            "user": user,
        }
    })))
}

pub(crate) async fn me_handler(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Value>, HttpError> {
    let user_id = caller.principal.user_id;
    let user = state
        .store
        .call(move |conn, _| get_auth_user(conn, user_id))
        .await?;
    let permissions: serde_json::Map<String, Value> = user
        .role
        .grants()
        .into_iter()
        .map(|(resource, actions)| {
            (
                resource.as_str().to_string(),
                actions.iter().map(|a| a.as_str()).collect::<Vec<_>>().into(),
            )
        })
        .collect();
    Ok(Json(json!({
        "data": {
            "user": user,
            "permissions": permissions,
        }
    })))
}

pub(crate) async fn change_password_handler(
    State(state): State<AppState>,
    caller: Caller,
    JsonObject(body): JsonObject,
) -> Result<StatusCode, HttpError> {
    let request: ChangePasswordRequest = typed_body(body)?;
    let user_id = caller.principal.user_id;
    let home_org = caller.principal.home_org;
    let meta = caller.meta.clone();
    let audit = state
        .store
        .transact(move |conn, ctx| {
            if !password_matches(conn, user_id, &request.current_password)? {
                return Err(StoreError::field("current_password", "is incorrect"));
            }
            set_password(conn, ctx, home_org, user_id, &request.new_password)?;
            let audit = audit_trail::entry(
                home_org,
                Some(user_id.get()),
                &meta,
                audit_action("USER", AuditVerb::PasswordChanged),
                "users",
                Some(user_id.get()),
                json!({}),
            );
            append_audit(conn, ctx.clock, &audit)?;
            Ok(audit)
        })
        .await?;
    audit_trail::emit(&state, &audit);
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn list_organizations_handler(
    State(state): State<AppState>,
    _caller: Caller,
) -> Result<Json<Value>, HttpError> {
    let orgs = state.store.call(|conn, _| list_organizations(conn)).await?;
    Ok(Json(json!({ "data": orgs })))
}

pub(crate) async fn create_organization_handler(
    State(state): State<AppState>,
    caller: Caller,
    JsonObject(body): JsonObject,
) -> Result<Response, HttpError> {
    let request: OrganizationRequest = typed_body(body)?;
    let meta = caller.meta.clone();
    let user_id = caller.principal.user_id.get();
    let (org, audit) = state
        .store
        .transact(move |conn, ctx| {
            let org = create_organization(conn, ctx, &request.name, &request.slug)?;
            let audit = audit_trail::entry(
                org_of(org.id)?,
                Some(user_id),
                &meta,
                audit_action("ORGANIZATION", AuditVerb::Created),
                "organizations",
                Some(org.id),
                json!({ "slug": org.slug }),
            );
            append_audit(conn, ctx.clock, &audit)?;
            Ok((org, audit))
        })
        .await?;
    audit_trail::emit(&state, &audit);
    Ok((StatusCode::CREATED, Json(ApiResponseEnvelope::new(org))).into_response())
}

/// Only `super_admin` may hand out `super_admin`.
pub(crate) fn guard_role_assignment(caller: &Caller, requested: Option<&str>) -> Result<(), HttpError> {
    if requested == Some(Role::SuperAdmin.as_str()) && !caller.principal.role.crosses_tenants() {
        return Err(HttpError(ApiError::permission_denied("users", "assign super_admin")));
    }
    Ok(())
}

pub(crate) async fn create_user_handler(
    State(state): State<AppState>,
    caller: Caller,
    JsonObject(body): JsonObject,
) -> Result<Response, HttpError> {
    let request: NewUserRequest = typed_body(body)?;
    guard_role_assignment(&caller, Some(request.role.as_str()))?;
    let org = caller.tenant()?;
    let created_by = caller.user();
    let meta = caller.meta.clone();
    let (row, audit) = state
        .store
        .transact(move |conn, ctx| {
            let new_user = NewUser {
                email: request.email,
                name: request.name,
                role: request.role,
                password: request.password,
            };
            let row = create_user(conn, ctx, org, created_by, &new_user)?;
            let audit = audit_trail::entry(
                org,
                created_by.map(|u| u.get()),
                &meta,
                audit_action("USER", AuditVerb::Created),
                "users",
                int_field(&row, "id"),
                json!({ "role": new_user.role.as_str() }),
            );
            append_audit(conn, ctx.clock, &audit)?;
            Ok((row, audit))
        })
        .await?;
    audit_trail::emit(&state, &audit);
    Ok((StatusCode::CREATED, Json(ApiResponseEnvelope::new(Value::Object(row)))).into_response())
}
