// SPDX-License-Identifier: Apache-2.0

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tourcrm_api::ApiError;
use tourcrm_core::Clock;
use tracing::warn;

use crate::http::errors::HttpError;
use crate::http::extract::Principal;
use crate::rate_limiter::{Decision, MethodClass};
use crate::AppState;

fn put_rate_headers(headers: &mut HeaderMap, decision: &Decision) {
    for (name, value) in [
        ("x-ratelimit-limit", decision.limit.to_string()),
        ("x-ratelimit-remaining", decision.remaining.to_string()),
        ("x-ratelimit-reset", decision.reset_at.to_string()),
    ] {
        if let Ok(v) = HeaderValue::from_str(&value) {
            headers.insert(name, v);
        }
    }
}

/// Per-user fixed-window limits. Runs after authentication.
pub(crate) async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(user_id) = request
        .extensions()
        .get::<Principal>()
        .map(|p| p.user_id.get())
    else {
        return next.run(request).await;
    };
    let class = MethodClass::of(request.method().as_str());
    let now = state.clock.unix_secs();
    let decision = state
        .limiter
        .check(user_id, class, &state.api.rate_limit, now)
        .await;
    if !decision.allowed {
        warn!(user_id, class = ?class, limit = decision.limit, "rate limit exceeded");
        let mut response =
            HttpError(ApiError::rate_limited(decision.limit, decision.retry_after_secs(now)))
                .into_response();
        put_rate_headers(response.headers_mut(), &decision);
        return response;
    }
    let mut response = next.run(request).await;
    put_rate_headers(response.headers_mut(), &decision);
    response
}
