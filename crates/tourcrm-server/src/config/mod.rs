// SPDX-License-Identifier: Apache-2.0

use serde::Serialize;
use std::time::Duration;

pub const CONFIG_SCHEMA_VERSION: &str = "1";

/// Requests allowed per user and method class in one fixed window.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub read_per_window: u32,
    pub write_per_window: u32,
    pub delete_per_window: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            read_per_window: 100,
            write_per_window: 50,
            delete_per_window: 20,
            window: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiConfig {
    pub max_body_bytes: usize,
    pub request_timeout: Duration,
    #[serde(skip_serializing)]
    pub token_secret: String,
    pub token_ttl: Duration,
    pub rate_limit: RateLimitConfig,
    pub idempotency_ttl: Duration,
    pub idempotency_max_entries: usize,
    pub enable_audit_log: bool,
    pub cors_allowed_origins: Vec<String>,
    pub enable_response_compression: bool,
    pub compression_min_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 1024 * 1024,
            request_timeout: Duration::from_secs(30),
            token_secret: String::new(),
            token_ttl: Duration::from_secs(12 * 3600),
            rate_limit: RateLimitConfig::default(),
            idempotency_ttl: Duration::from_secs(24 * 3600),
            idempotency_max_entries: 10_000,
            enable_audit_log: true,
            cors_allowed_origins: Vec::new(),
            enable_response_compression: true,
            compression_min_bytes: 1024,
        }
    }
}

pub fn validate_startup_config(api: &ApiConfig) -> Result<(), String> {
    if api.token_secret.trim().is_empty() {
        return Err("token secret must not be empty (set CRM_TOKEN_SECRET)".to_string());
    }
    if api.token_secret.len() < 16 {
        return Err("token secret must be at least 16 bytes".to_string());
    }
    if api.max_body_bytes == 0 {
        return Err("max body bytes must be > 0".to_string());
    }
    if api.request_timeout.is_zero() || api.token_ttl.is_zero() {
        return Err("timeouts must be > 0".to_string());
    }
    let rl = &api.rate_limit;
    if rl.read_per_window == 0 || rl.write_per_window == 0 || rl.delete_per_window == 0 {
        return Err("rate limits must be > 0".to_string());
    }
    if rl.window.is_zero() {
        return Err("rate limit window must be > 0".to_string());
    }
    if api.idempotency_ttl.is_zero() || api.idempotency_max_entries == 0 {
        return Err("idempotency ttl and capacity must be > 0".to_string());
    }
    if api
        .cors_allowed_origins
        .iter()
        .any(|o| o == "*" || o.trim().is_empty())
    {
        return Err("cors origins must be explicit, non-empty origins".to_string());
    }
    Ok(())
}
