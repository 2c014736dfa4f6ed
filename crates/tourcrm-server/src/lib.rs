// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put, MethodRouter};
use axum::{Extension, Router};
use tokio::sync::Mutex;
use tourcrm_core::Clock;
use tourcrm_model::{ResourceDescriptor, RESOURCES};
use tourcrm_store::{InvoiceKind, SqliteStore};

mod cache;
mod config;
mod http;
mod middleware;
mod rate_limiter;
mod telemetry;
mod token;

pub use cache::idempotency::IdempotencyCache;
pub use config::{validate_startup_config, ApiConfig, RateLimitConfig, CONFIG_SCHEMA_VERSION};
pub use http::errors::{store_error_to_api, HttpError};
pub use rate_limiter::{Decision, MethodClass, RateLimiter};
pub use telemetry::metrics::RequestMetrics;
pub use token::{issue_token, verify_token, TokenClaims, TokenError};

pub const CRATE_NAME: &str = "tourcrm-server";

/// Shared handles for every request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SqliteStore>,
    pub api: Arc<ApiConfig>,
    pub clock: Arc<dyn Clock>,
    pub metrics: Arc<RequestMetrics>,
    pub limiter: Arc<RateLimiter>,
    pub idempotency: Arc<Mutex<IdempotencyCache>>,
    pub request_id_seed: Arc<AtomicU64>,
    /// Last readiness verdict, exported as `crm_ready`.
    pub ready: Arc<AtomicBool>,
    /// Cleared when shutdown starts so `/readyz` drains traffic.
    pub accepting_requests: Arc<AtomicBool>,
}

impl AppState {
    #[must_use]
    pub fn new(store: SqliteStore, api: ApiConfig) -> Self {
        let clock = store.clock();
        let idempotency = IdempotencyCache::new(api.idempotency_ttl, api.idempotency_max_entries);
        Self {
            store: Arc::new(store),
            api: Arc::new(api),
            clock,
            metrics: Arc::new(RequestMetrics::default()),
            limiter: Arc::new(RateLimiter::default()),
            idempotency: Arc::new(Mutex::new(idempotency)),
            request_id_seed: Arc::new(AtomicU64::new(rand::random::<u64>() >> 1)),
            ready: Arc::new(AtomicBool::new(false)),
            accepting_requests: Arc::new(AtomicBool::new(true)),
        }
    }
}

fn collection(desc: &'static ResourceDescriptor) -> (MethodRouter<AppState>, MethodRouter<AppState>) {
    let create = if desc.name == "users" {
        post(http::auth::create_user_handler)
    } else {
        post(http::resources::create_handler)
    };
    let list = get(http::resources::list_handler)
        .merge(create)
        .layer(Extension(http::extract::Resource(desc)));
    let item = get(http::resources::get_handler)
        .put(http::resources::replace_handler)
        .patch(http::resources::patch_handler)
        .delete(http::resources::delete_handler)
        .layer(Extension(http::extract::Resource(desc)));
    (list, item)
}

fn protected_routes(state: &AppState) -> Router<AppState> {
    use http::{auth, insights, invoices, quotations, system};

    let mut router = Router::new();
    for desc in RESOURCES {
        let (list, item) = collection(desc);
        router = router
            .route(&format!("/api/{}", desc.route), list)
            .route(&format!("/api/{}/:id", desc.route), item);
    }
    for kind in [InvoiceKind::Receivable, InvoiceKind::Payable] {
        let base = format!("/api/invoices/{}/:id", kind.as_str());
        router = router
            .route(
                &format!("{base}/payments"),
                get(invoices::list_payments_handler)
                    .post(invoices::record_payment_handler)
                    .layer(Extension(kind)),
            )
            .route(
                &format!("{base}/cancel"),
                post(invoices::cancel_handler).layer(Extension(kind)),
            );
    }
    router
        .route(
            "/api/quotations/:id/days",
            get(quotations::list_days_handler).post(quotations::create_day_handler),
        )
        .route(
            "/api/quotations/:id/days/:item_id",
            get(quotations::get_day_handler)
                .put(quotations::replace_day_handler)
                .patch(quotations::patch_day_handler)
                .delete(quotations::delete_day_handler),
        )
        .route(
            "/api/quotations/:id/expenses",
            get(quotations::list_expenses_handler).post(quotations::create_expense_handler),
        )
        .route(
            "/api/quotations/:id/expenses/:item_id",
            get(quotations::get_expense_handler)
                .put(quotations::replace_expense_handler)
                .patch(quotations::patch_expense_handler)
                .delete(quotations::delete_expense_handler),
        )
        .route("/api/quotations/:id/status", put(quotations::change_status_handler))
        .route("/api/quotations/:id/itinerary", get(quotations::itinerary_handler))
        .route("/api/finance/summary", get(insights::finance_summary_handler))
        .route("/api/finance/customers", get(insights::finance_customers_handler))
        .route("/api/finance/suppliers", get(insights::finance_suppliers_handler))
        .route(
            "/api/finance/exchange-rates/latest",
            get(insights::latest_rates_handler),
        )
        .route("/api/dashboard/stats", get(insights::dashboard_stats_handler))
        .route(
            "/api/dashboard/recent-requests",
            get(insights::recent_requests_handler),
        )
        .route(
            "/api/dashboard/upcoming-tours",
            get(insights::upcoming_tours_handler),
        )
        .route("/api/reports/:category/:report", get(insights::report_handler))
        .route("/api/suppliers/search", get(insights::supplier_search_handler))
        .route("/api/audit-logs", get(insights::audit_logs_handler))
        .route("/api/admin/check-schema", get(insights::check_schema_handler))
        .route("/api/auth/me", get(auth::me_handler))
        .route("/api/auth/change-password", post(auth::change_password_handler))
        .route("/api/roles", get(system::roles_handler))
        .route(
            "/api/organizations",
            get(auth::list_organizations_handler).post(auth::create_organization_handler),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::idempotency::idempotency_middleware,
        ))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::rate_limit::rate_limit_middleware,
        ))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ))
}

/// Full HTTP surface with the transport middleware stack applied.
pub fn build_router(state: AppState) -> Router {
    use http::{auth, system};
    use middleware::{request_tracing, transport};

    Router::new()
        .route("/healthz", get(system::healthz_handler))
        .route("/readyz", get(system::readyz_handler))
        .route("/metrics", get(system::metrics_handler))
        .route("/api/openapi.json", get(system::openapi_handler))
        .route("/api/auth/login", post(auth::login_handler))
        .merge(protected_routes(&state))
        .fallback(system::fallback_handler)
        .layer(DefaultBodyLimit::max(state.api.max_body_bytes))
        .layer(from_fn_with_state(state.clone(), transport::timeout_middleware))
        .layer(from_fn_with_state(
            state.clone(),
            request_tracing::request_tracing_middleware,
        ))
        .layer(from_fn_with_state(state.clone(), transport::cors_middleware))
        .layer(from_fn_with_state(state.clone(), transport::compression_middleware))
        .with_state(state)
}
