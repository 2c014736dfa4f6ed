// SPDX-License-Identifier: Apache-2.0

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tourcrm_api::{map_error, ApiError, ErrorCode};
use tourcrm_store::StoreError;
use tracing::error;

/// Handler and middleware error. The response carries the [`ApiError`] as an
/// extension so the tracing layer can stamp the request id into the body.
#[derive(Debug, Clone)]
pub struct HttpError(pub ApiError);

impl From<ApiError> for HttpError {
    fn from(value: ApiError) -> Self {
        Self(value)
    }
}

impl From<StoreError> for HttpError {
    fn from(value: StoreError) -> Self {
        Self(store_error_to_api(value))
    }
}

pub fn store_error_to_api(err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound { resource, id } => ApiError::not_found(&resource, id),
        StoreError::Validation(field_errors) => ApiError::validation_failed(&field_errors),
        StoreError::Conflict {
            message,
            conflicting_id,
        } => ApiError::conflict(message, json!({ "conflicting_id": conflicting_id })),
        StoreError::InvalidTransition(message) => ApiError::invalid_transition(message),
        StoreError::InvalidCredentials => ApiError::new(
            ErrorCode::AuthenticationRequired,
            "invalid email or password",
            json!({}),
        ),
        other => {
            error!(error = %other, "store operation failed");
            ApiError::internal("internal server error")
        }
    }
}

pub(crate) fn error_response(err: ApiError) -> Response {
    let status =
        StatusCode::from_u16(map_error(&err).status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let retry_after = (err.code == ErrorCode::RateLimitExceeded)
        .then(|| err.details.get("retry_after_secs").and_then(serde_json::Value::as_u64))
        .flatten();
    let mut response = (status, Json(err.envelope())).into_response();
    if let Some(secs) = retry_after {
        if let Ok(v) = HeaderValue::from_str(&secs.to_string()) {
            response.headers_mut().insert("retry-after", v);
        }
    }
    response.extensions_mut().insert(err);
    response
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        error_response(self.0)
    }
}
