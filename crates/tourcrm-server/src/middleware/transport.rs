// SPDX-License-Identifier: Apache-2.0

use std::io::Write as _;

use axum::body::{to_bytes, Body};
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use brotli::CompressorWriter;
use flate2::{write::GzEncoder, Compression};
use serde_json::json;
use tourcrm_api::{ApiError, ErrorCode};
use tracing::{error, warn};

use crate::http::errors::HttpError;
use crate::AppState;

const CORS_ALLOW_METHODS: &str = "GET,POST,PUT,PATCH,DELETE,OPTIONS";
const CORS_ALLOW_HEADERS: &str =
    "authorization,content-type,idempotency-key,x-request-id,x-correlation-id,x-tenant-id";
const CORS_EXPOSE_HEADERS: &str = "x-request-id,x-ratelimit-limit,x-ratelimit-remaining,x-ratelimit-reset,retry-after,idempotent-replayed";

fn allowed_origin(state: &AppState, headers: &HeaderMap) -> Option<HeaderValue> {
    let origin = headers.get("origin")?.to_str().ok()?.trim();
    if origin.is_empty() || origin.len() > 256 {
        return None;
    }
    state
        .api
        .cors_allowed_origins
        .iter()
        .any(|o| o == origin)
        .then(|| HeaderValue::from_str(origin).ok())
        .flatten()
}

/// Explicit origin allow-list; preflights are answered here.
pub(crate) async fn cors_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let origin = allowed_origin(&state, request.headers());
    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        if let Some(origin) = origin {
            let headers = response.headers_mut();
            headers.insert("access-control-allow-origin", origin);
            headers.insert(
                "access-control-allow-methods",
                HeaderValue::from_static(CORS_ALLOW_METHODS),
            );
            headers.insert(
                "access-control-allow-headers",
                HeaderValue::from_static(CORS_ALLOW_HEADERS),
            );
            headers.insert("access-control-max-age", HeaderValue::from_static("600"));
            headers.insert("vary", HeaderValue::from_static("Origin"));
        }
        return response;
    }
    let mut response = next.run(request).await;
    if let Some(origin) = origin {
        let headers = response.headers_mut();
        headers.insert("access-control-allow-origin", origin);
        headers.insert(
            "access-control-expose-headers",
            HeaderValue::from_static(CORS_EXPOSE_HEADERS),
        );
        headers.append("vary", HeaderValue::from_static("Origin"));
    }
    response
}

pub(crate) fn accepted_encoding(headers: &HeaderMap) -> Option<&'static str> {
    let accept = headers
        .get("accept-encoding")
        .and_then(|v| v.to_str().ok())?;
    let offers = |name: &str| {
        accept.split(',').any(|part| {
            let mut pieces = part.split(';');
            let coding = pieces.next().unwrap_or("").trim();
            let refused = pieces.any(|p| matches!(p.trim(), "q=0" | "q=0.0" | "q=0.00" | "q=0.000"));
            coding.eq_ignore_ascii_case(name) && !refused
        })
    };
    if offers("br") {
        Some("br")
    } else if offers("gzip") {
        Some("gzip")
    } else {
        None
    }
}

pub(crate) fn compress(bytes: &[u8], encoding: &str) -> std::io::Result<Vec<u8>> {
    match encoding {
        "gzip" => {
            let mut encoder = GzEncoder::new(
                Vec::with_capacity((bytes.len() / 2).max(256)),
                Compression::fast(),
            );
            encoder.write_all(bytes)?;
            encoder.finish()
        }
        _ => {
            let mut compressed = Vec::with_capacity((bytes.len() / 2).max(256));
            {
                let mut writer = CompressorWriter::new(&mut compressed, 4096, 4, 22);
                writer.write_all(bytes)?;
            }
            Ok(compressed)
        }
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"))
}

/// gzip or brotli for JSON bodies at or above the configured size.
pub(crate) async fn compression_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let encoding = accepted_encoding(request.headers());
    let response = next.run(request).await;
    let Some(encoding) = encoding.filter(|_| state.api.enable_response_compression) else {
        return response;
    };
    if !is_json(response.headers()) || response.headers().contains_key(header::CONTENT_ENCODING) {
        return response;
    }
    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(b) => b,
        Err(e) => {
            error!(error = %e, "could not buffer response for compression");
            return HttpError(ApiError::internal("internal server error")).into_response();
        }
    };
    parts.headers.append("vary", HeaderValue::from_static("Accept-Encoding"));
    if bytes.len() < state.api.compression_min_bytes {
        return Response::from_parts(parts, Body::from(bytes));
    }
    match compress(&bytes, encoding) {
        Ok(compressed) => {
            parts.headers.remove(header::CONTENT_LENGTH);
            parts
                .headers
                .insert(header::CONTENT_ENCODING, HeaderValue::from_static(encoding));
            Response::from_parts(parts, Body::from(compressed))
        }
        Err(e) => {
            warn!(error = %e, encoding, "compression failed, sending identity");
            Response::from_parts(parts, Body::from(bytes))
        }
    }
}

pub(crate) async fn timeout_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let limit = state.api.request_timeout;
    if let Ok(response) = tokio::time::timeout(limit, next.run(request)).await {
        response
    } else {
        warn!(timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX), "request timed out");
        HttpError(ApiError::new(
            ErrorCode::Timeout,
            "request timed out",
            json!({ "timeout_ms": u64::try_from(limit.as_millis()).unwrap_or(u64::MAX) }),
        ))
        .into_response()
    }
}
