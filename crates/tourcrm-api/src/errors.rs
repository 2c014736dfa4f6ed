// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tourcrm_model::FieldError;
use tourcrm_query::{QueryError, QueryErrorCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    AuthenticationRequired,
    InvalidToken,
    PermissionDenied,
    TenantRequired,
    TenantMismatch,
    NotFound,
    ValidationError,
    Conflict,
    InvalidStateTransition,
    IdempotencyKeyReused,
    RateLimitExceeded,
    PayloadTooLarge,
    Timeout,
    InternalError,
    NotReady,
}

impl ErrorCode {
    pub const ALL: &'static [Self] = &[
        Self::AuthenticationRequired,
        Self::InvalidToken,
        Self::PermissionDenied,
        Self::TenantRequired,
        Self::TenantMismatch,
        Self::NotFound,
        Self::ValidationError,
        Self::Conflict,
        Self::InvalidStateTransition,
        Self::IdempotencyKeyReused,
        Self::RateLimitExceeded,
        Self::PayloadTooLarge,
        Self::Timeout,
        Self::InternalError,
        Self::NotReady,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthenticationRequired => "AUTHENTICATION_REQUIRED",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::TenantRequired => "TENANT_REQUIRED",
            Self::TenantMismatch => "TENANT_MISMATCH",
            Self::NotFound => "NOT_FOUND",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::Conflict => "CONFLICT",
            Self::InvalidStateTransition => "INVALID_STATE_TRANSITION",
            Self::IdempotencyKeyReused => "IDEMPOTENCY_KEY_REUSED",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::Timeout => "TIMEOUT",
            Self::InternalError => "INTERNAL_ERROR",
            Self::NotReady => "NOT_READY",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error body sent as `{"error": ApiError}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub request_id: String,
}

impl ApiError {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            request_id: "req-unknown".to_string(),
        }
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    #[must_use]
    pub fn envelope(&self) -> Value {
        json!({ "error": self })
    }

    #[must_use]
    pub fn authentication_required() -> Self {
        Self::new(
            ErrorCode::AuthenticationRequired,
            "authentication required",
            json!({}),
        )
    }

    #[must_use]
    pub fn invalid_token(reason: &str) -> Self {
        Self::new(
            ErrorCode::InvalidToken,
            "invalid or expired token",
            json!({ "reason": reason }),
        )
    }

    #[must_use]
    pub fn permission_denied(resource: &str, action: &str) -> Self {
        Self::new(
            ErrorCode::PermissionDenied,
            format!("permission denied: {action} on {resource}"),
            json!({ "resource": resource, "action": action }),
        )
    }

    #[must_use]
    pub fn tenant_required() -> Self {
        Self::new(
            ErrorCode::TenantRequired,
            "X-Tenant-Id header is required",
            json!({ "header": "X-Tenant-Id" }),
        )
    }

    #[must_use]
    pub fn tenant_mismatch(requested: &str) -> Self {
        Self::new(
            ErrorCode::TenantMismatch,
            "tenant does not match the authenticated organization",
            json!({ "tenant": requested }),
        )
    }

    #[must_use]
    pub fn not_found(resource: &str, id: impl Into<Value>) -> Self {
        Self::new(
            ErrorCode::NotFound,
            format!("{resource} not found"),
            json!({ "resource": resource, "id": id.into() }),
        )
    }

    #[must_use]
    pub fn invalid_param(name: &str, value: &str, reason: &str) -> Self {
        Self::new(
            ErrorCode::ValidationError,
            format!("invalid query parameter: {name}"),
            json!({"field_errors": [{"field": name, "message": reason, "value": value}]}),
        )
    }

    #[must_use]
    pub fn unknown_param(name: &str, allowed: &[String]) -> Self {
        Self::new(
            ErrorCode::ValidationError,
            format!("unknown query parameter: {name}"),
            json!({ "parameter": name, "allowed": allowed }),
        )
    }

    #[must_use]
    pub fn validation_failed(field_errors: &[FieldError]) -> Self {
        Self::new(
            ErrorCode::ValidationError,
            "validation failed",
            json!({ "field_errors": field_errors }),
        )
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>, details: Value) -> Self {
        Self::new(ErrorCode::Conflict, message, details)
    }

    #[must_use]
    pub fn invalid_transition(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidStateTransition, message, json!({}))
    }

    #[must_use]
    pub fn idempotency_key_reused(key: &str) -> Self {
        Self::new(
            ErrorCode::IdempotencyKeyReused,
            "idempotency key was already used with a different request body",
            json!({ "idempotency_key": key }),
        )
    }

    #[must_use]
    pub fn rate_limited(limit: u32, retry_after_secs: u64) -> Self {
        let minutes = retry_after_secs.div_ceil(60).max(1);
        Self::new(
            ErrorCode::RateLimitExceeded,
            format!("Rate limit exceeded. Try again in {minutes} minutes."),
            json!({ "limit": limit, "retry_after_secs": retry_after_secs }),
        )
    }

    #[must_use]
    pub fn payload_too_large(max_bytes: usize) -> Self {
        Self::new(
            ErrorCode::PayloadTooLarge,
            "request body too large",
            json!({ "max_bytes": max_bytes }),
        )
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message, json!({}))
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        let reason = match err.code {
            QueryErrorCode::UnknownField => "unknown field",
            _ => "invalid",
        };
        Self::new(
            ErrorCode::ValidationError,
            err.message,
            json!({"field_errors": [{"field": err.param, "message": reason}]}),
        )
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}
