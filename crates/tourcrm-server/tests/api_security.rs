mod support;

use std::time::Duration;

use serde_json::json;
use support::{
    call, header, json as parse, send_raw, send_raw_with_method, spawn, spawn_with,
    test_api_config,
};
use tourcrm_server::{ApiConfig, RateLimitConfig};

#[tokio::test]
async fn missing_and_forged_tokens_are_rejected() {
    let server = spawn().await;
    let (status, _, body) = send_raw(server.addr, "/api/clients", &[("X-Tenant-Id", "1")]).await;
    assert_eq!(status, 401);
    assert_eq!(parse(&body)["error"]["code"], "AUTHENTICATION_REQUIRED");

    let forged = format!("Bearer {}x", server.alpha.admin);
    let (status, _, body) = send_raw(
        server.addr,
        "/api/clients",
        &[("Authorization", &forged), ("X-Tenant-Id", "1")],
    )
    .await;
    assert_eq!(status, 401);
    assert_eq!(parse(&body)["error"]["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn tenant_header_is_required_and_bound_to_the_token() {
    let server = spawn().await;
    let auth = format!("Bearer {}", server.alpha.admin);
    let (status, _, body) = send_raw(server.addr, "/api/clients", &[("Authorization", &auth)]).await;
    assert_eq!(status, 400);
    assert_eq!(parse(&body)["error"]["code"], "TENANT_REQUIRED");

    let (status, _, err) = call(&server, "GET", "/api/clients", &server.alpha.admin, server.beta.id, None).await;
    assert_eq!(status, 403);
    assert_eq!(err["error"]["code"], "TENANT_MISMATCH");

    let (status, _, _) = call(&server, "GET", "/api/clients", &server.super_admin, server.beta.id, None).await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn records_stay_inside_their_tenant() {
    let server = spawn().await;
    let (_, _, created) = call(&server, "POST", "/api/clients", &server.alpha.admin, server.alpha.id, Some(r#"{"name":"Ada"}"#)).await;
    let id = created["data"]["id"].as_i64().expect("id");
    let (status, _, err) = call(&server, "GET", &format!("/api/clients/{id}"), &server.beta.admin, server.beta.id, None).await;
    assert_eq!(status, 404, "{err}");
    let (_, _, listed) = call(&server, "GET", "/api/clients", &server.beta.admin, server.beta.id, None).await;
    assert_eq!(listed["meta"]["total"], 0);
}

#[tokio::test]
async fn roles_limit_what_callers_may_do() {
    let server = spawn().await;
    let t = &server.alpha;
    let (status, _, err) = call(&server, "POST", "/api/clients", &t.viewer, t.id, Some(r#"{"name":"Ada"}"#)).await;
    assert_eq!(status, 403);
    assert_eq!(err["error"]["code"], "PERMISSION_DENIED");

    let (status, _, _) = call(&server, "GET", "/api/finance/summary", &t.agent, t.id, None).await;
    assert_eq!(status, 403);
    let (status, _, _) = call(&server, "GET", "/api/audit-logs", &t.agent, t.id, None).await;
    assert_eq!(status, 403);
    let (status, _, _) = call(&server, "GET", "/api/organizations", &t.admin, t.id, None).await;
    assert_eq!(status, 403);
    let (status, _, orgs) = call(&server, "GET", "/api/organizations", &server.super_admin, t.id, None).await;
    assert_eq!(status, 200, "{orgs}");

    let promote = json!({
        "email": "sneaky@alpha.test",
        "name": "Sneaky",
        "role": "super_admin",
        "password": "long-enough-password",
    })
    .to_string();
    let (status, _, err) = call(&server, "POST", "/api/users", &t.admin, t.id, Some(&promote)).await;
    assert_eq!(status, 403, "{err}");

    let (status, _, _) = call(&server, "DELETE", &format!("/api/users/{}", t.admin_id), &t.admin, t.id, None).await;
    assert_eq!(status, 422);
}

#[tokio::test]
async fn write_limits_answer_429_with_headers() {
    let api = ApiConfig {
        rate_limit: RateLimitConfig {
            read_per_window: 100,
            write_per_window: 2,
            delete_per_window: 1,
            window: Duration::from_secs(60),
        },
        ..test_api_config()
    };
    let server = spawn_with(api).await;
    let t = &server.alpha;
    for remaining in ["1", "0"] {
        let (status, head, _) = call(&server, "POST", "/api/clients", &t.agent, t.id, Some(r#"{"name":"Ada"}"#)).await;
        assert_eq!(status, 201);
        assert_eq!(header(&head, "x-ratelimit-remaining"), Some(remaining));
    }
    let (status, head, err) = call(&server, "POST", "/api/clients", &t.agent, t.id, Some(r#"{"name":"Ada"}"#)).await;
    assert_eq!(status, 429);
    assert_eq!(err["error"]["code"], "RATE_LIMIT_EXCEEDED");
    assert!(header(&head, "retry-after").is_some());

    let (status, _, _) = call(&server, "GET", "/api/clients", &t.agent, t.id, None).await;
    assert_eq!(status, 200);
    let (status, _, _) = call(&server, "POST", "/api/clients", &t.admin, t.id, Some(r#"{"name":"Ada"}"#)).await;
    assert_eq!(status, 201);
}

#[tokio::test]
async fn idempotency_keys_replay_and_detect_reuse() {
    let server = spawn().await;
    let t = &server.alpha;
    let auth = format!("Bearer {}", t.agent);
    let tenant = t.id.to_string();
    let headers = [
        ("Authorization", auth.as_str()),
        ("X-Tenant-Id", tenant.as_str()),
        ("Idempotency-Key", "create-ada-1"),
    ];
    let body = r#"{"name":"Ada"}"#;
    let (first, head1, created) =
        send_raw_with_method(server.addr, "POST", "/api/clients", &headers, Some(body)).await;
    assert_eq!(first, 201, "{created}");
    assert!(header(&head1, "idempotent-replayed").is_none());

    let (second, head2, replayed) =
        send_raw_with_method(server.addr, "POST", "/api/clients", &headers, Some(body)).await;
    assert_eq!(second, 201);
    assert_eq!(header(&head2, "idempotent-replayed"), Some("true"));
    assert_eq!(parse(&created)["data"]["id"], parse(&replayed)["data"]["id"]);

    let (_, _, listed) = call(&server, "GET", "/api/clients", &t.agent, t.id, None).await;
    assert_eq!(listed["meta"]["total"], 1);

    let (status, _, err) = send_raw_with_method(
        server.addr,
        "POST",
        "/api/clients",
        &headers,
        Some(r#"{"name":"Grace"}"#),
    )
    .await;
    assert_eq!(status, 422);
    assert_eq!(parse(&err)["error"]["code"], "IDEMPOTENCY_KEY_REUSED");
}

#[tokio::test]
async fn oversized_bodies_are_refused() {
    let api = ApiConfig {
        max_body_bytes: 64,
        ..test_api_config()
    };
    let server = spawn_with(api).await;
    let t = &server.alpha;
    let big = json!({ "name": "x".repeat(200) }).to_string();
    let (status, _, err) = call(&server, "POST", "/api/clients", &t.admin, t.id, Some(&big)).await;
    assert_eq!(status, 413, "{err}");
    assert_eq!(err["error"]["code"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn cors_preflight_only_for_listed_origins() {
    let api = ApiConfig {
        cors_allowed_origins: vec!["https://crm.example".to_string()],
        ..test_api_config()
    };
    let server = spawn_with(api).await;
    let (status, head, _) = send_raw_with_method(
        server.addr,
        "OPTIONS",
        "/api/clients",
        &[
            ("Origin", "https://crm.example"),
            ("Access-Control-Request-Method", "POST"),
        ],
        None,
    )
    .await;
    assert_eq!(status, 204);
    assert_eq!(
        header(&head, "access-control-allow-origin"),
        Some("https://crm.example")
    );

    let (_, head, _) = send_raw(server.addr, "/healthz", &[("Origin", "https://evil.example")]).await;
    assert!(header(&head, "access-control-allow-origin").is_none());
}
