// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::Ordering;
use std::sync::OnceLock;

use axum::extract::State;
use axum::http::{header, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};
use tourcrm_api::{openapi_v1_spec, ApiError, ErrorCode};
use tourcrm_model::Role;
use tracing::warn;

use super::errors::HttpError;
use crate::AppState;

pub(crate) async fn healthz_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readyz_handler(State(state): State<AppState>) -> Response {
    let accepting = state.accepting_requests.load(Ordering::Relaxed);
    let store_ok = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "readiness probe: store unavailable");
            false
        }
    };
    let ready = accepting && store_ok;
    state.ready.store(ready, Ordering::Relaxed);
    if ready {
        Json(json!({ "status": "ready" })).into_response()
    } else {
        HttpError(ApiError::new(
            ErrorCode::NotReady,
            "service not ready",
            json!({ "accepting_requests": accepting, "store": store_ok }),
        ))
        .into_response()
    }
}

pub(crate) async fn metrics_handler(State(state): State<AppState>) -> Response {
    let entries = state.idempotency.lock().await.len();
    let body = state
        .metrics
        .render(state.ready.load(Ordering::Relaxed), entries)
        .await;
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}

fn openapi_document() -> &'static Value {
    static DOC: OnceLock<Value> = OnceLock::new();
    DOC.get_or_init(openapi_v1_spec)
}

pub(crate) async fn openapi_handler() -> Json<Value> {
    Json(openapi_document().clone())
}

/// Every role with the actions it holds per permission resource.
pub(crate) async fn roles_handler() -> Json<Value> {
    let roles: Vec<Value> = Role::ALL
        .iter()
        .map(|role| {
            let permissions: Map<String, Value> = role
                .grants()
                .into_iter()
                .map(|(resource, actions)| {
                    (
                        resource.as_str().to_string(),
                        actions.iter().map(|a| a.as_str()).collect::<Vec<_>>().into(),
                    )
                })
                .collect();
            json!({
                "role": role.as_str(),
                "crosses_tenants": role.crosses_tenants(),
                "permissions": permissions,
            })
        })
        .collect();
    Json(json!({ "data": roles }))
}

pub(crate) async fn fallback_handler(uri: Uri) -> HttpError {
    HttpError(ApiError::not_found("route", uri.path()))
}
