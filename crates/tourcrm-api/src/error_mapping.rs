// SPDX-License-Identifier: Apache-2.0

use crate::{ApiError, ErrorCode};

pub const API_ERROR_SCHEMA_REF: &str = "#/components/schemas/ApiError";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiErrorMapping {
    pub status_code: u16,
    pub schema_ref: &'static str,
}

#[must_use]
pub const fn status_for(code: ErrorCode) -> u16 {
    match code {
        ErrorCode::AuthenticationRequired | ErrorCode::InvalidToken => 401,
        ErrorCode::PermissionDenied | ErrorCode::TenantMismatch => 403,
        ErrorCode::TenantRequired | ErrorCode::ValidationError => 400,
        ErrorCode::NotFound => 404,
        ErrorCode::Conflict => 409,
        ErrorCode::InvalidStateTransition | ErrorCode::IdempotencyKeyReused => 422,
        ErrorCode::PayloadTooLarge => 413,
        ErrorCode::RateLimitExceeded => 429,
        ErrorCode::Timeout => 504,
        ErrorCode::NotReady => 503,
        ErrorCode::InternalError => 500,
    }
}

#[must_use]
pub fn map_error(error: &ApiError) -> ApiErrorMapping {
    ApiErrorMapping {
        status_code: status_for(error.code),
        schema_ref: API_ERROR_SCHEMA_REF,
    }
}
