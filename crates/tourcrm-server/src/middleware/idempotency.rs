// SPDX-License-Identifier: Apache-2.0

use std::time::Instant;

use axum::body::{to_bytes, Body};
use axum::extract::State;
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tourcrm_api::{ApiError, ErrorCode};
use tourcrm_core::canonical::body_fingerprint;
use tracing::{debug, error, warn};

use crate::cache::idempotency::{valid_key, Lookup, StoredResponse};
use crate::http::errors::HttpError;
use crate::http::extract::Principal;
use crate::AppState;

fn replay(stored: StoredResponse) -> Response {
    let status = StatusCode::from_u16(stored.status).unwrap_or(StatusCode::OK);
    let mut response = (status, stored.body).into_response();
    if let Some(v) = stored
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
    {
        response.headers_mut().insert(header::CONTENT_TYPE, v);
    }
    response
        .headers_mut()
        .insert("idempotent-replayed", HeaderValue::from_static("true"));
    response
}

/// Replays the first successful response of a keyed POST. The scope is
/// tenant, user, path and key; the request body must hash the same.
pub(crate) async fn idempotency_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() != Method::POST {
        return next.run(request).await;
    }
    let Some(raw_key) = request.headers().get("idempotency-key") else {
        return next.run(request).await;
    };
    let key = match raw_key.to_str() {
        Ok(k) if valid_key(k) => k.to_string(),
        _ => {
            return HttpError(ApiError::new(
                ErrorCode::ValidationError,
                "invalid Idempotency-Key header",
                json!({
                    "header": "Idempotency-Key",
                    "message": "must be 1 to 255 visible ASCII characters",
                }),
            ))
            .into_response()
        }
    };
    let Some(principal) = request.extensions().get::<Principal>().cloned() else {
        return next.run(request).await;
    };

    let (parts, body) = request.into_parts();
    let Ok(bytes) = to_bytes(body, state.api.max_body_bytes).await else {
        return HttpError(ApiError::payload_too_large(state.api.max_body_bytes)).into_response();
    };
    let tenant = principal.tenant.unwrap_or(principal.home_org);
    let scope = format!(
        "{}:{}:{}:{key}",
        tenant.get(),
        principal.user_id.get(),
        parts.uri.path()
    );
    let fingerprint = body_fingerprint(&bytes);
    let lookup = {
        let mut cache = state.idempotency.lock().await;
        cache.lookup(&scope, &fingerprint, Instant::now())
    };
    match lookup {
        Lookup::Replay(stored) => {
            debug!(idempotency_key = %key, "replaying stored response");
            return replay(stored);
        }
        Lookup::Mismatch => {
            warn!(idempotency_key = %key, "idempotency key reused with a different body");
            return HttpError(ApiError::idempotency_key_reused(&key)).into_response();
        }
        Lookup::Miss => {}
    }

    let response = next.run(Request::from_parts(parts, Body::from(bytes))).await;
    if !response.status().is_success() {
        return response;
    }
    let (parts, body) = response.into_parts();
    let body = match to_bytes(body, usize::MAX).await {
        Ok(b) => b,
        Err(e) => {
            error!(error = %e, "could not buffer response for idempotency cache");
            return HttpError(ApiError::internal("internal server error")).into_response();
        }
    };
    let stored = StoredResponse {
        status: parts.status.as_u16(),
        content_type: parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string),
        body: body.to_vec(),
    };
    state
        .idempotency
        .lock()
        .await
        .insert(scope, fingerprint, stored, Instant::now());
    Response::from_parts(parts, Body::from(body))
}
