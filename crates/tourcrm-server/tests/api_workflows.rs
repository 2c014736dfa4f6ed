mod support;

use serde_json::json;
use support::{call, header, json as parse, send_raw, send_raw_with_method, spawn, PASSWORD};

#[tokio::test]
async fn probes_and_openapi_are_public() {
    let server = spawn().await;
    let (status, _, body) = send_raw(server.addr, "/healthz", &[]).await;
    assert_eq!(status, 200);
    assert_eq!(parse(&body)["status"], "ok");

    let (status, _, body) = send_raw(server.addr, "/readyz", &[]).await;
    assert_eq!(status, 200, "{body}");

    let (status, head, body) = send_raw(server.addr, "/metrics", &[]).await;
    assert_eq!(status, 200);
    assert!(header(&head, "content-type")
        .is_some_and(|v| v.starts_with("text/plain")));
    assert!(body.contains("crm_ready 1"), "{body}");
    assert!(body.contains("crm_http_requests_total"), "{body}");

    let (status, _, body) = send_raw(server.addr, "/api/openapi.json", &[]).await;
    assert_eq!(status, 200);
    assert_eq!(parse(&body)["openapi"], "3.0.3");
}

#[tokio::test]
async fn login_issues_a_token_that_reaches_me() {
    let server = spawn().await;
    let payload = json!({ "email": "admin@alpha.test", "password": PASSWORD }).to_string();
    let (status, _, body) =
        send_raw_with_method(server.addr, "POST", "/api/auth/login", &[], Some(&payload)).await;
    assert_eq!(status, 200, "{body}");
    let login = parse(&body);
    assert_eq!(login["data"]["token_type"], "Bearer");
    let token = login["data"]["token"].as_str().expect("token").to_string();

    let auth = format!("Bearer {token}");
    let (status, _, body) = send_raw(server.addr, "/api/auth/me", &[("Authorization", &auth)]).await;
    assert_eq!(status, 200, "{body}");
    let me = parse(&body);
    assert_eq!(me["data"]["user"]["email"], "admin@alpha.test");
    assert!(me["data"]["permissions"].is_array() || me["data"]["permissions"].is_object());

    let wrong = json!({ "email": "admin@alpha.test", "password": "not-the-password" }).to_string();
    let (status, _, body) =
        send_raw_with_method(server.addr, "POST", "/api/auth/login", &[], Some(&wrong)).await;
    assert_eq!(status, 401);
    assert_eq!(parse(&body)["error"]["code"], "AUTHENTICATION_REQUIRED");
}

#[tokio::test]
async fn clients_list_with_pagination_and_filters() {
    let server = spawn().await;
    let t = &server.alpha;
    for (name, nationality) in [("Ada", "GB"), ("Grace", "US"), ("Linus", "FI")] {
        let body = json!({ "name": name, "nationality": nationality }).to_string();
        let (status, _, created) = call(&server, "POST", "/api/clients", &t.admin, t.id, Some(&body)).await;
        assert_eq!(status, 201, "{created}");
        assert_eq!(created["data"]["name"], name);
    }

    let (status, _, page) = call(&server, "GET", "/api/clients?pageSize=2&sort=name", &t.agent, t.id, None).await;
    assert_eq!(status, 200, "{page}");
    assert_eq!(page["meta"]["total"], 3);
    assert_eq!(page["meta"]["totalPages"], 2);
    assert_eq!(page["data"][0]["name"], "Ada");
    assert!(page["links"]["next"].as_str().is_some_and(|l| l.contains("page=2")));

    let (status, _, filtered) = call(&server, "GET", "/api/clients?nationality=US", &t.viewer, t.id, None).await;
    assert_eq!(status, 200);
    assert_eq!(filtered["meta"]["total"], 1);
    assert_eq!(filtered["meta"]["filters"]["nationality"], "US");

    let (status, _, err) = call(&server, "GET", "/api/clients?colour=red", &t.viewer, t.id, None).await;
    assert_eq!(status, 400);
    assert_eq!(err["error"]["details"]["parameter"], "colour");
}

#[tokio::test]
async fn failed_audit_write_discards_the_create() {
    let server = spawn().await;
    let t = &server.alpha;
    server
        .state
        .store
        .call_blocking(|conn, _| {
            conn.execute_batch(
                "CREATE TRIGGER audit_down BEFORE INSERT ON audit_log
                 BEGIN SELECT RAISE(ABORT, 'audit unavailable'); END;",
            )?;
            Ok(())
        })
        .expect("trigger");

    let auth = format!("Bearer {}", t.admin);
    let tenant = t.id.to_string();
    let headers = [
        ("Authorization", auth.as_str()),
        ("X-Tenant-Id", tenant.as_str()),
        ("Idempotency-Key", "create-edsger-1"),
    ];
    let body = r#"{"name":"Edsger"}"#;
    let (status, _, err) =
        send_raw_with_method(server.addr, "POST", "/api/clients", &headers, Some(body)).await;
    assert_eq!(status, 500, "{err}");
    let (_, _, page) = call(&server, "GET", "/api/clients", &t.viewer, t.id, None).await;
    assert_eq!(page["meta"]["total"], 0);

    server
        .state
        .store
        .call_blocking(|conn, _| {
            conn.execute_batch("DROP TRIGGER audit_down")?;
            Ok(())
        })
        .expect("drop trigger");
    let (status, head, created) =
        send_raw_with_method(server.addr, "POST", "/api/clients", &headers, Some(body)).await;
    assert_eq!(status, 201, "{created}");
    assert!(header(&head, "idempotent-replayed").is_none());
    let (_, _, page) = call(&server, "GET", "/api/clients", &t.viewer, t.id, None).await;
    assert_eq!(page["meta"]["total"], 1);
}

#[tokio::test]
async fn client_update_and_soft_delete() {
    let server = spawn().await;
    let t = &server.alpha;
    let (_, _, created) = call(&server, "POST", "/api/clients", &t.admin, t.id, Some(r#"{"name":"Ada"}"#)).await;
    let id = created["data"]["id"].as_i64().expect("id");
    let path = format!("/api/clients/{id}");

    let (status, _, patched) = call(&server, "PATCH", &path, &t.agent, t.id, Some(r#"{"nationality":"GB"}"#)).await;
    assert_eq!(status, 200, "{patched}");
    assert_eq!(patched["data"]["nationality"], "GB");
    assert_eq!(patched["data"]["name"], "Ada");

    let (status, _, err) = call(&server, "PUT", &path, &t.agent, t.id, Some(r#"{"nationality":"FR"}"#)).await;
    assert_eq!(status, 400, "{err}");
    assert_eq!(err["error"]["code"], "VALIDATION_ERROR");

    let (status, _, _) = call(&server, "DELETE", &path, &t.admin, t.id, None).await;
    assert_eq!(status, 204);
    let (status, _, err) = call(&server, "GET", &path, &t.admin, t.id, None).await;
    assert_eq!(status, 404);
    assert_eq!(err["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn quotation_lifecycle_creates_a_booking() {
    let server = spawn().await;
    let t = &server.alpha;
    let (_, _, client) = call(&server, "POST", "/api/clients", &t.agent, t.id, Some(r#"{"name":"Ada"}"#)).await;
    let client_id = client["data"]["id"].as_i64().expect("client id");
    let quotation = json!({
        "client_id": client_id,
        "title": "Cappadocia week",
        "destination": "Cappadocia",
        "start_date": "2025-05-01",
        "end_date": "2025-05-07",
        "adults": 2,
        "currency": "EUR",
    })
    .to_string();
    let (status, _, created) = call(&server, "POST", "/api/quotations", &t.agent, t.id, Some(&quotation)).await;
    assert_eq!(status, 201, "{created}");
    let qid = created["data"]["id"].as_i64().expect("quotation id");
    assert!(created["data"]["quote_number"].as_str().is_some_and(|n| n.starts_with('Q')));
    assert_eq!(created["data"]["status"], "draft");

    let day = json!({ "day_number": 1, "title": "Arrival", "city": "Göreme" }).to_string();
    let (status, _, day) = call(&server, "POST", &format!("/api/quotations/{qid}/days"), &t.agent, t.id, Some(&day)).await;
    assert_eq!(status, 201, "{day}");

    let expense = json!({
        "category": "hotel",
        "description": "Cave suite",
        "quantity": 2,
        "unit_price_cents": 15000,
    })
    .to_string();
    let (status, _, added) = call(&server, "POST", &format!("/api/quotations/{qid}/expenses"), &t.agent, t.id, Some(&expense)).await;
    assert_eq!(status, 201, "{added}");
    assert_eq!(added["data"]["expense"]["total_cents"], 30000);
    assert_eq!(added["data"]["totals"]["subtotal_cents"], 30000);

    let (status, _, itinerary) = call(&server, "GET", &format!("/api/quotations/{qid}/itinerary"), &t.viewer, t.id, None).await;
    assert_eq!(status, 200, "{itinerary}");

    let status_path = format!("/api/quotations/{qid}/status");
    let (status, _, err) = call(&server, "PUT", &status_path, &t.agent, t.id, Some(r#"{"status":"accepted"}"#)).await;
    assert_eq!(status, 422, "{err}");
    assert_eq!(err["error"]["code"], "INVALID_STATE_TRANSITION");

    let (status, _, sent) = call(&server, "PUT", &status_path, &t.agent, t.id, Some(r#"{"status":"sent"}"#)).await;
    assert_eq!(status, 200, "{sent}");
    assert!(sent["data"]["booking"].is_null());

    let (status, _, accepted) = call(&server, "PUT", &status_path, &t.agent, t.id, Some(r#"{"status":"accepted"}"#)).await;
    assert_eq!(status, 200, "{accepted}");
    assert_eq!(accepted["data"]["quotation"]["status"], "accepted");
    let booking = &accepted["data"]["booking"];
    assert!(booking["booking_number"].as_str().is_some_and(|n| n.starts_with('B')));
    assert_eq!(booking["quotation_id"], qid);

    let (status, _, audit) = call(&server, "GET", "/api/audit-logs?action=BOOKING_CREATED", &t.admin, t.id, None).await;
    assert_eq!(status, 200, "{audit}");
    assert_eq!(audit["meta"]["total"], 1);
}

#[tokio::test]
async fn receivable_payments_settle_the_invoice() {
    let server = spawn().await;
    let t = &server.alpha;
    let (_, _, client) = call(&server, "POST", "/api/clients", &t.admin, t.id, Some(r#"{"name":"Ada"}"#)).await;
    let client_id = client["data"]["id"].as_i64().expect("client id");
    let invoice = json!({
        "client_id": client_id,
        "issue_date": "2025-03-01",
        "due_date": "2025-03-31",
        "amount_cents": 100000,
        "currency": "EUR",
    })
    .to_string();
    let (status, _, created) = call(&server, "POST", "/api/invoices/receivable", &t.accountant, t.id, Some(&invoice)).await;
    assert_eq!(status, 201, "{created}");
    let id = created["data"]["id"].as_i64().expect("invoice id");
    let payments = format!("/api/invoices/receivable/{id}/payments");

    let payment = json!({ "amount_cents": 40000, "paid_on": "2025-03-05", "method": "bank_transfer" }).to_string();
    let (status, _, paid) = call(&server, "POST", &payments, &t.accountant, t.id, Some(&payment)).await;
    assert_eq!(status, 201, "{paid}");
    assert_eq!(paid["data"]["invoice"]["status"], "partial");

    let too_much = json!({ "amount_cents": 70000, "paid_on": "2025-03-06", "method": "cash" }).to_string();
    let (status, _, err) = call(&server, "POST", &payments, &t.accountant, t.id, Some(&too_much)).await;
    assert_eq!(status, 400, "{err}");

    let (status, _, listed) = call(&server, "GET", &payments, &t.accountant, t.id, None).await;
    assert_eq!(status, 200);
    assert_eq!(listed["data"].as_array().map(Vec::len), Some(1));

    let (status, _, summary) = call(&server, "GET", "/api/finance/summary", &t.accountant, t.id, None).await;
    assert_eq!(status, 200, "{summary}");
}

#[tokio::test]
async fn dashboard_reports_and_search_respond() {
    let server = spawn().await;
    let t = &server.alpha;
    call(&server, "POST", "/api/hotels", &t.admin, t.id, Some(r#"{"name":"Museum Hotel","city":"Uçhisar"}"#)).await;

    let (status, _, stats) = call(&server, "GET", "/api/dashboard/stats", &t.agent, t.id, None).await;
    assert_eq!(status, 200, "{stats}");

    let (status, _, err) = call(&server, "GET", "/api/dashboard/recent-requests?limit=51", &t.agent, t.id, None).await;
    assert_eq!(status, 400, "{err}");

    let (status, _, report) = call(&server, "GET", "/api/reports/executive/summary?from=2025-01-01&to=2025-03-31", &t.admin, t.id, None).await;
    assert_eq!(status, 200, "{report}");

    let (status, _, err) = call(&server, "GET", "/api/reports/executive/nothing", &t.admin, t.id, None).await;
    assert_eq!(status, 404, "{err}");

    let (status, _, found) = call(&server, "GET", "/api/suppliers/search?q=museum&type=hotel", &t.agent, t.id, None).await;
    assert_eq!(status, 200, "{found}");
    assert_eq!(found["data"].as_array().map(Vec::len), Some(1));

    let (status, _, err) = call(&server, "GET", "/api/suppliers/search?q=museum&type=castle", &t.agent, t.id, None).await;
    assert_eq!(status, 400, "{err}");

    let (status, _, schema) = call(&server, "GET", "/api/admin/check-schema", &t.admin, t.id, None).await;
    assert_eq!(status, 200, "{schema}");
    assert_eq!(schema["data"]["ok"], true);
}

#[tokio::test]
async fn unknown_routes_are_not_found_envelopes() {
    let server = spawn().await;
    let (status, head, body) = send_raw(server.addr, "/api/nowhere", &[]).await;
    assert_eq!(status, 404);
    let err = parse(&body);
    assert_eq!(err["error"]["code"], "NOT_FOUND");
    assert_eq!(
        header(&head, "x-request-id"),
        err["error"]["request_id"].as_str()
    );
}
