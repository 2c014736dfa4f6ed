// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::net::TcpListener;
use tourcrm_server::{build_router, validate_startup_config, ApiConfig, AppState, RateLimitConfig};
use tourcrm_store::{SqliteStore, StoreConfig};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_list(name: &str) -> Vec<String> {
    env::var(name)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn api_config_from_env() -> ApiConfig {
    let d = ApiConfig::default();
    let rl = RateLimitConfig::default();
    ApiConfig {
        max_body_bytes: env_usize("CRM_MAX_BODY_BYTES", d.max_body_bytes),
        request_timeout: Duration::from_millis(env_u64(
            "CRM_REQUEST_TIMEOUT_MS",
            u64::try_from(d.request_timeout.as_millis()).unwrap_or(30_000),
        )),
        token_secret: env::var("CRM_TOKEN_SECRET").unwrap_or_default(),
        token_ttl: Duration::from_secs(env_u64("CRM_TOKEN_TTL_SECS", d.token_ttl.as_secs())),
        rate_limit: RateLimitConfig {
            read_per_window: env_u32("CRM_RATE_LIMIT_READ", rl.read_per_window),
            write_per_window: env_u32("CRM_RATE_LIMIT_WRITE", rl.write_per_window),
            delete_per_window: env_u32("CRM_RATE_LIMIT_DELETE", rl.delete_per_window),
            window: Duration::from_secs(env_u64(
                "CRM_RATE_LIMIT_WINDOW_SECS",
                rl.window.as_secs(),
            )),
        },
        idempotency_ttl: Duration::from_secs(env_u64(
            "CRM_IDEMPOTENCY_TTL_SECS",
            d.idempotency_ttl.as_secs(),
        )),
        idempotency_max_entries: env_usize(
            "CRM_IDEMPOTENCY_MAX_ENTRIES",
            d.idempotency_max_entries,
        ),
        enable_audit_log: env_bool("CRM_ENABLE_AUDIT_LOG", d.enable_audit_log),
        cors_allowed_origins: env_list("CRM_CORS_ALLOWED_ORIGINS"),
        enable_response_compression: env_bool(
            "CRM_ENABLE_RESPONSE_COMPRESSION",
            d.enable_response_compression,
        ),
        compression_min_bytes: env_usize("CRM_COMPRESSION_MIN_BYTES", d.compression_min_bytes),
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
            }
            _ => {
                warn!("signal handlers unavailable, falling back to ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if env_bool("CRM_LOG_JSON", true) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    init_tracing();

    let bind_addr = env::var("CRM_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let db_path = PathBuf::from(
        env::var("CRM_DATABASE_PATH").unwrap_or_else(|_| "data/tourcrm.sqlite3".to_string()),
    );
    let api = api_config_from_env();
    validate_startup_config(&api)?;

    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("create {} failed: {e}", parent.display()))?;
    }
    let store_cfg = StoreConfig {
        max_connections: env_usize("CRM_DB_MAX_CONNECTIONS", StoreConfig::default().max_connections),
        password_iterations: env_u32(
            "CRM_PASSWORD_ITERATIONS",
            StoreConfig::default().password_iterations,
        ),
        ..StoreConfig::default()
    };
    let store = SqliteStore::open(&db_path, store_cfg)
        .map_err(|e| format!("open database {} failed: {e}", db_path.display()))?;

    let state = AppState::new(store, api);
    state.ready.store(true, Ordering::Relaxed);
    let app = build_router(state.clone());

    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| format!("invalid bind addr {bind_addr}: {e}"))?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| format!("bind failed: {e}"))?;
    info!(addr = %bind_addr, db = %db_path.display(), "tourcrm-server listening");

    let accepting = state.accepting_requests.clone();
    let ready = state.ready.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        wait_for_shutdown_signal().await;
        accepting.store(false, Ordering::Relaxed);
        ready.store(false, Ordering::Relaxed);
        let drain_ms = env_u64("CRM_SHUTDOWN_DRAIN_MS", 5000);
        info!(drain_ms, "shutdown requested, draining");
        tokio::time::sleep(Duration::from_millis(drain_ms)).await;
    })
    .await
    .map_err(|e| format!("server failed: {e}"))
}
