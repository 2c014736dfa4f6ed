// SPDX-License-Identifier: Apache-2.0

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{ConnectInfo, MatchedPath, State};
use axum::http::{header, HeaderMap, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use tourcrm_api::ApiError;
use tracing::{info, Instrument};

use crate::http::extract::{BodyLimit, RequestMeta};
use crate::AppState;

const MAX_ID_LEN: usize = 128;

fn header_token(headers: &HeaderMap, key: &str) -> Option<String> {
    let raw = headers.get(key)?.to_str().ok()?.trim();
    if raw.is_empty()
        || raw.len() > MAX_ID_LEN
        || !raw.bytes().all(|b| (0x21..=0x7e).contains(&b))
    {
        return None;
    }
    Some(raw.to_string())
}

pub(crate) fn make_request_id(state: &AppState) -> String {
    let id = state.request_id_seed.fetch_add(1, Ordering::Relaxed);
    format!("req-{id:016x}")
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get("x-forwarded-for")?.to_str().ok()?;
    let first = raw.split(',').next()?.trim();
    if first.is_empty() || first.len() > 64 {
        return None;
    }
    first
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b':' || b == b'-')
        .then(|| first.to_string())
}

/// Rewrites an error body so its `request_id` matches the response header.
fn stamp_request_id(response: Response, request_id: &str) -> Response {
    let Some(err) = response.extensions().get::<ApiError>().cloned() else {
        return response;
    };
    if err.request_id == request_id {
        return response;
    }
    let err = err.with_request_id(request_id);
    let Ok(bytes) = serde_json::to_vec(&err.envelope()) else {
        return response;
    };
    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.extensions.insert(err);
    Response::from_parts(parts, Body::from(bytes))
}

pub(crate) async fn request_tracing_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let started = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_string(), |p| p.as_str().to_string());
    let request_id =
        header_token(request.headers(), "x-request-id").unwrap_or_else(|| make_request_id(&state));
    let correlation_id = header_token(request.headers(), "x-correlation-id");
    let ip_address = forwarded_for(request.headers()).or_else(|| {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
    });
    request.extensions_mut().insert(RequestMeta {
        request_id: request_id.clone(),
        ip_address,
    });
    request
        .extensions_mut()
        .insert(BodyLimit(state.api.max_body_bytes));

    let span = tracing::info_span!(
        "http.request",
        request_id = %request_id,
        correlation_id = correlation_id.as_deref().unwrap_or(""),
        method = %method,
        route = %route,
    );
    let response = next.run(request).instrument(span.clone()).await;
    let mut response = stamp_request_id(response, &request_id);
    if let Ok(v) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", v);
    }
    if let Some(v) = correlation_id.and_then(|c| HeaderValue::from_str(&c).ok()) {
        response.headers_mut().insert("x-correlation-id", v);
    }
    let status = response.status().as_u16();
    let elapsed = started.elapsed();
    state.metrics.observe(&route, &method, status, elapsed).await;
    span.in_scope(|| {
        info!(
            status,
            latency_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "request completed"
        );
    });
    response
}
