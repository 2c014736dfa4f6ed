// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::http::StatusCode;
use serde_json::{json, Value};
use tourcrm_api::{ApiError, ErrorCode};
use tourcrm_core::{OrganizationId, RecordId, UserId};
use tourcrm_model::{ResourceDescriptor, Role};
use tourcrm_store::Row;

use super::errors::HttpError;

/// Authenticated identity resolved by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub home_org: OrganizationId,
    pub role: Role,
    /// Organization selected with `X-Tenant-Id`; absent on tenantless routes.
    pub tenant: Option<OrganizationId>,
}

/// Per-request facts recorded by the tracing middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMeta {
    pub request_id: String,
    pub ip_address: Option<String>,
}

/// Descriptor of the generic collection a route serves.
#[derive(Debug, Clone, Copy)]
pub struct Resource(pub &'static ResourceDescriptor);

/// Principal plus request metadata, available on every authenticated route.
#[derive(Debug, Clone)]
pub struct Caller {
    pub principal: Principal,
    pub meta: RequestMeta,
}

impl Caller {
    pub fn tenant(&self) -> Result<OrganizationId, HttpError> {
        self.principal
            .tenant
            .ok_or_else(|| HttpError(ApiError::tenant_required()))
    }

    #[must_use]
    pub fn user(&self) -> Option<UserId> {
        Some(self.principal.user_id)
    }
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let principal = parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or_else(|| HttpError(ApiError::authentication_required()))?;
        let meta = parts.extensions.get::<RequestMeta>().cloned().unwrap_or(RequestMeta {
            request_id: "req-unknown".to_string(),
            ip_address: None,
        });
        Ok(Self { principal, meta })
    }
}

/// Query string as a flat map; malformed encodings are validation errors.
#[derive(Debug, Clone, Default)]
pub struct QueryMap(pub BTreeMap<String, String>);

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for QueryMap {
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Query::<BTreeMap<String, String>>::try_from_uri(&parts.uri)
            .map(|Query(map)| Self(map))
            .map_err(|e| {
                HttpError(ApiError::new(
                    ErrorCode::ValidationError,
                    "malformed query string",
                    json!({ "reason": e.body_text() }),
                ))
            })
    }
}

/// A request body that must be one JSON object.
#[derive(Debug, Clone)]
pub struct JsonObject(pub Row);

#[axum::async_trait]
impl<S: Send + Sync> FromRequest<S> for JsonObject {
    type Rejection = HttpError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let limit_hint = req
            .extensions()
            .get::<BodyLimit>()
            .map_or(0, |l| l.0);
        let bytes = Bytes::from_request(req, state).await.map_err(|rejection| {
            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                HttpError(ApiError::payload_too_large(limit_hint))
            } else {
                HttpError(ApiError::new(
                    ErrorCode::ValidationError,
                    "request body could not be read",
                    json!({ "reason": rejection.body_text() }),
                ))
            }
        })?;
        parse_object(&bytes).map(Self)
    }
}

/// Configured body limit, attached to requests for error details.
#[derive(Debug, Clone, Copy)]
pub struct BodyLimit(pub usize);

pub(crate) fn parse_object(bytes: &[u8]) -> Result<Row, HttpError> {
    let not_object = || {
        HttpError(ApiError::new(
            ErrorCode::ValidationError,
            "request body must be a JSON object",
            json!({ "field_errors": [{ "field": "body", "message": "must be a JSON object" }] }),
        ))
    };
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(not_object()),
        Err(e) => Err(HttpError(ApiError::new(
            ErrorCode::ValidationError,
            "request body is not valid JSON",
            json!({ "reason": e.to_string() }),
        ))),
    }
}

pub(crate) fn record_id(param: &str, raw: &str) -> Result<RecordId, HttpError> {
    raw.parse::<RecordId>()
        .map_err(|_| HttpError(ApiError::invalid_param(param, raw, "must be a positive integer")))
}
