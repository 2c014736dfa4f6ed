#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::Value;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tourcrm_core::{Clock, FixedClock, OrganizationId};
use tourcrm_model::Role;
use tourcrm_server::{build_router, issue_token, ApiConfig, AppState, TokenClaims};
use tourcrm_store::auth::{create_organization, create_user};
use tourcrm_store::{int_field, NewUser, SqliteStore, StoreConfig};

pub const SECRET: &str = "integration-secret-0123456789";
pub const PASSWORD: &str = "correct-horse-battery";

pub struct Tenant {
    pub id: i64,
    pub admin: String,
    pub agent: String,
    pub viewer: String,
    pub accountant: String,
    pub admin_id: i64,
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    pub alpha: Tenant,
    pub beta: Tenant,
    pub super_admin: String,
    _dir: TempDir,
}

pub fn test_api_config() -> ApiConfig {
    ApiConfig {
        token_secret: SECRET.to_string(),
        ..ApiConfig::default()
    }
}

fn token(clock: &dyn Clock, sub: i64, org: i64, role: Role) -> String {
    let now = clock.unix_secs();
    issue_token(
        SECRET,
        &TokenClaims {
            sub,
            org,
            role,
            iat: now,
            exp: now + 3600,
        },
    )
    .expect("issue token")
}

fn seed_user(store: &SqliteStore, org: OrganizationId, email: &str, role: Role) -> i64 {
    let user = NewUser {
        email: email.to_string(),
        name: format!("{role} user"),
        role,
        password: PASSWORD.to_string(),
    };
    let row = store
        .call_blocking(|conn, ctx| create_user(conn, ctx, org, None, &user))
        .expect("seed user");
    int_field(&row, "id").expect("user id")
}

fn seed_tenant(store: &SqliteStore, clock: &dyn Clock, slug: &str) -> Tenant {
    let created = store
        .call_blocking(|conn, ctx| create_organization(conn, ctx, slug, slug))
        .expect("organization");
    let org = OrganizationId::new(created.id).expect("org id");
    let mut tokens = Vec::new();
    let mut admin_id = 0;
    for role in [Role::Admin, Role::Agent, Role::Viewer, Role::Accountant] {
        let id = seed_user(store, org, &format!("{role}@{slug}.test"), role);
        if role == Role::Admin {
            admin_id = id;
        }
        tokens.push(token(clock, id, created.id, role));
    }
    let mut tokens = tokens.into_iter();
    let mut next = || tokens.next().expect("token");
    Tenant {
        id: created.id,
        admin: next(),
        agent: next(),
        viewer: next(),
        accountant: next(),
        admin_id,
    }
}

pub async fn spawn_with(api: ApiConfig) -> TestServer {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock: Arc<dyn Clock> = Arc::new(FixedClock::at_date(2025, 3, 10));
    let store = SqliteStore::open_with_clock(
        &dir.path().join("crm.sqlite"),
        StoreConfig {
            password_iterations: 1_000,
            ..StoreConfig::default()
        },
        Arc::clone(&clock),
    )
    .expect("open store");
    let alpha = seed_tenant(&store, clock.as_ref(), "alpha");
    let beta = seed_tenant(&store, clock.as_ref(), "beta");
    let root_id = seed_user(
        &store,
        OrganizationId::new(alpha.id).expect("org"),
        "root@alpha.test",
        Role::SuperAdmin,
    );
    let super_admin = token(clock.as_ref(), root_id, alpha.id, Role::SuperAdmin);

    let state = AppState::new(store, api);
    let app = build_router(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("serve");
    });
    TestServer {
        addr,
        state,
        alpha,
        beta,
        super_admin,
        _dir: dir,
    }
}

pub async fn spawn() -> TestServer {
    spawn_with(test_api_config()).await
}

fn dechunk(body: &str) -> String {
    let mut out = String::new();
    let mut rest = body;
    while let Some((size, tail)) = rest.split_once("\r\n") {
        let Ok(size) = usize::from_str_radix(size.trim(), 16) else {
            break;
        };
        if size == 0 || tail.len() < size {
            break;
        }
        out.push_str(&tail[..size]);
        rest = tail[size..].trim_start_matches("\r\n");
    }
    out
}

pub async fn send_raw_with_method(
    addr: SocketAddr,
    method: &str,
    path: &str,
    headers: &[(&str, &str)],
    body: Option<&str>,
) -> (u16, String, String) {
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect server");
    let mut req = format!("{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n");
    if let Some(payload) = body {
        req.push_str("Content-Type: application/json\r\n");
        req.push_str(&format!("Content-Length: {}\r\n", payload.len()));
    }
    for (k, v) in headers {
        req.push_str(&format!("{k}: {v}\r\n"));
    }
    req.push_str("\r\n");
    if let Some(payload) = body {
        req.push_str(payload);
    }
    stream
        .write_all(req.as_bytes())
        .await
        .expect("write request");
    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");
    let (head, body) = response
        .split_once("\r\n\r\n")
        .expect("http response must have separator");
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .expect("http status");
    let body = if head
        .to_ascii_lowercase()
        .contains("transfer-encoding: chunked")
    {
        dechunk(body)
    } else {
        body.to_string()
    };
    (status, head.to_string(), body)
}

pub async fn send_raw(
    addr: SocketAddr,
    path: &str,
    headers: &[(&str, &str)],
) -> (u16, String, String) {
    send_raw_with_method(addr, "GET", path, headers, None).await
}

/// Header value from a raw response head, matched case-insensitively.
pub fn header<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.lines().skip(1).find_map(|line| {
        let (k, v) = line.split_once(':')?;
        k.trim().eq_ignore_ascii_case(name).then(|| v.trim())
    })
}

pub fn json(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("json body ({e}): {body}"))
}

/// Authenticated request on behalf of `token` inside `tenant`.
pub async fn call(
    server: &TestServer,
    method: &str,
    path: &str,
    token: &str,
    tenant: i64,
    body: Option<&str>,
) -> (u16, String, Value) {
    let auth = format!("Bearer {token}");
    let tenant = tenant.to_string();
    let (status, head, body) = send_raw_with_method(
        server.addr,
        method,
        path,
        &[("Authorization", &auth), ("X-Tenant-Id", &tenant)],
        body,
    )
    .await;
    let value = if body.trim().is_empty() {
        Value::Null
    } else {
        json(&body)
    };
    (status, head, value)
}
