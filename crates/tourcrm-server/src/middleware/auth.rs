// SPDX-License-Identifier: Apache-2.0

use axum::body::Body;
use axum::extract::{MatchedPath, State};
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tourcrm_api::{ApiError, ErrorCode};
use tourcrm_core::{Clock, OrganizationId, UserId};
use tourcrm_model::{resource_by_route, Action, PermissionResource, Role};
use tracing::warn;

use crate::http::errors::HttpError;
use crate::http::extract::Principal;
use crate::token::verify_token;
use crate::AppState;

/// Routes that act on the caller or the whole installation rather than one tenant.
const TENANTLESS_ROUTES: &[&str] = &[
    "/api/auth/me",
    "/api/auth/change-password",
    "/api/roles",
    "/api/organizations",
];

/// What a route requires beyond a valid token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Requirement {
    Authenticated,
    SuperAdmin,
    Permission(PermissionResource),
}

/// Maps a route template (as registered on the router) to its permission.
pub(crate) fn requirement_for(route: &str) -> Option<Requirement> {
    let rest = route.strip_prefix("/api/")?;
    let first = rest.split('/').next().unwrap_or(rest);
    let requirement = match first {
        "auth" | "roles" => Requirement::Authenticated,
        "organizations" => Requirement::SuperAdmin,
        "invoices" => Requirement::Permission(PermissionResource::Invoices),
        "finance" => Requirement::Permission(PermissionResource::Finance),
        "dashboard" => Requirement::Permission(PermissionResource::Dashboard),
        "reports" => Requirement::Permission(PermissionResource::Reports),
        "suppliers" => Requirement::Permission(PermissionResource::Providers),
        "audit-logs" => Requirement::Permission(PermissionResource::Audit),
        "admin" => Requirement::Permission(PermissionResource::Admin),
        other => Requirement::Permission(resource_by_route(other)?.permission),
    };
    Some(requirement)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get("authorization")?.to_str().ok()?.trim();
    let (scheme, token) = raw.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn resolve_tenant(
    headers: &HeaderMap,
    home_org: OrganizationId,
    role: Role,
) -> Result<OrganizationId, ApiError> {
    let raw = headers
        .get("x-tenant-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(ApiError::tenant_required)?;
    let tenant = raw.parse::<OrganizationId>().map_err(|_| {
        ApiError::new(
            ErrorCode::ValidationError,
            "X-Tenant-Id must be a positive integer",
            json!({ "header": "X-Tenant-Id", "value": raw }),
        )
    })?;
    if tenant != home_org && !role.crosses_tenants() {
        warn!(tenant = raw, home_org = home_org.get(), "cross-tenant request refused");
        return Err(ApiError::tenant_mismatch(raw));
    }
    Ok(tenant)
}

pub(crate) fn authorize(role: Role, requirement: Requirement, method: &str) -> Result<(), ApiError> {
    match requirement {
        Requirement::Authenticated => Ok(()),
        Requirement::SuperAdmin if role.crosses_tenants() => Ok(()),
        Requirement::SuperAdmin => Err(ApiError::permission_denied(
            "organizations",
            Action::for_method(method).map_or("unknown", Action::as_str),
        )),
        Requirement::Permission(resource) => {
            let action = Action::for_method(method)
                .ok_or_else(|| ApiError::permission_denied(resource.as_str(), method))?;
            if role.allows(resource, action) {
                Ok(())
            } else {
                Err(ApiError::permission_denied(resource.as_str(), action.as_str()))
            }
        }
    }
}

fn authenticate(state: &AppState, request: &Request<Body>) -> Result<Principal, ApiError> {
    let token = bearer_token(request.headers()).ok_or_else(ApiError::authentication_required)?;
    let claims = verify_token(&state.api.token_secret, token, state.clock.unix_secs()).map_err(
        |e| {
            warn!(reason = e.reason(), "bearer token rejected");
            ApiError::invalid_token(e.reason())
        },
    )?;
    let (Ok(user_id), Ok(home_org)) = (UserId::new(claims.sub), OrganizationId::new(claims.org))
    else {
        return Err(ApiError::invalid_token("malformed"));
    };
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);
    let tenant = if TENANTLESS_ROUTES.contains(&route) {
        None
    } else {
        Some(resolve_tenant(request.headers(), home_org, claims.role)?)
    };
    let requirement = requirement_for(route).ok_or_else(|| ApiError::not_found("route", route))?;
    authorize(claims.role, requirement, request.method().as_str()).inspect_err(|_| {
        warn!(user_id = claims.sub, role = claims.role.as_str(), route, "permission denied");
    })?;
    Ok(Principal {
        user_id,
        home_org,
        role: claims.role,
        tenant,
    })
}

/// Bearer authentication, tenant resolution and RBAC for `/api` routes.
pub(crate) async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    match authenticate(&state, &request) {
        Ok(principal) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(err) => HttpError(err).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn routes_map_to_permission_resources() {
        assert_eq!(
            requirement_for("/api/clients/:id"),
            Some(Requirement::Permission(PermissionResource::Clients))
        );
        assert_eq!(
            requirement_for("/api/hotel-pricing"),
            Some(Requirement::Permission(PermissionResource::Pricing))
        );
        assert_eq!(
            requirement_for("/api/quotations/:id/expenses/:item_id"),
            Some(Requirement::Permission(PermissionResource::Quotations))
        );
        assert_eq!(
            requirement_for("/api/invoices/payable/:id/payments"),
            Some(Requirement::Permission(PermissionResource::Invoices))
        );
        assert_eq!(requirement_for("/api/organizations"), Some(Requirement::SuperAdmin));
        assert_eq!(requirement_for("/api/auth/me"), Some(Requirement::Authenticated));
        assert_eq!(requirement_for("/api/nope"), None);
        assert_eq!(requirement_for("/healthz"), None);
    }

    #[test]
    fn rbac_follows_the_permission_matrix() {
        let finance = Requirement::Permission(PermissionResource::Finance);
        assert!(authorize(Role::Accountant, finance, "POST").is_ok());
        let err = authorize(Role::Agent, finance, "GET").expect_err("agent has no finance");
        assert_eq!(err.code, ErrorCode::PermissionDenied);
        assert_eq!(err.details["action"], "read");
        let clients = Requirement::Permission(PermissionResource::Clients);
        assert!(authorize(Role::Viewer, clients, "GET").is_ok());
        assert!(authorize(Role::Viewer, clients, "DELETE").is_err());
        assert!(authorize(Role::Admin, Requirement::SuperAdmin, "GET").is_err());
        assert!(authorize(Role::SuperAdmin, Requirement::SuperAdmin, "POST").is_ok());
    }

    #[test]
    fn tenant_header_rules() {
        let home = OrganizationId::new(3).expect("org");
        let mut headers = HeaderMap::new();
        assert_eq!(
            resolve_tenant(&headers, home, Role::Admin).expect_err("missing").code,
            ErrorCode::TenantRequired
        );
        headers.insert("x-tenant-id", HeaderValue::from_static("3"));
        assert_eq!(resolve_tenant(&headers, home, Role::Admin), Ok(home));
        headers.insert("x-tenant-id", HeaderValue::from_static("4"));
        assert_eq!(
            resolve_tenant(&headers, home, Role::Admin).expect_err("mismatch").code,
            ErrorCode::TenantMismatch
        );
        assert_eq!(
            resolve_tenant(&headers, home, Role::SuperAdmin)
                .expect("super admin crosses")
                .get(),
            4
        );
        headers.insert("x-tenant-id", HeaderValue::from_static("abc"));
        assert_eq!(
            resolve_tenant(&headers, home, Role::Admin).expect_err("garbage").code,
            ErrorCode::ValidationError
        );
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
    }
}
