mod support;

use std::time::Duration;

use support::{json as parse, send_raw_with_method, spawn_with, test_api_config};
use tourcrm_api::openapi_v1_spec;
use tourcrm_server::{ApiConfig, RateLimitConfig};

fn concrete(path: &str) -> String {
    let mut out = String::new();
    let mut in_param = false;
    for ch in path.chars() {
        match ch {
            '{' => in_param = true,
            '}' => {
                in_param = false;
                out.push('1');
            }
            _ if !in_param => out.push(ch),
            _ => {}
        }
    }
    out
}

#[tokio::test]
async fn every_documented_operation_is_routed() {
    let api = ApiConfig {
        rate_limit: RateLimitConfig {
            read_per_window: 10_000,
            write_per_window: 10_000,
            delete_per_window: 10_000,
            window: Duration::from_secs(60),
        },
        ..test_api_config()
    };
    let server = spawn_with(api).await;
    let auth = format!("Bearer {}", server.super_admin);
    let tenant = server.alpha.id.to_string();
    let spec = openapi_v1_spec();
    let paths = spec["paths"].as_object().expect("paths");
    assert!(paths.len() > 30, "suspiciously small surface");

    for (template, item) in paths {
        let path = concrete(template);
        for method in item.as_object().expect("path item").keys() {
            let method = method.to_ascii_uppercase();
            let body = matches!(method.as_str(), "POST" | "PUT" | "PATCH").then_some("{}");
            let (status, _, text) = send_raw_with_method(
                server.addr,
                &method,
                &path,
                &[("Authorization", &auth), ("X-Tenant-Id", &tenant)],
                body,
            )
            .await;
            assert_ne!(status, 405, "{method} {template} is documented but not routed");
            if status == 404 {
                let err = parse(&text);
                assert_ne!(
                    err["error"]["details"]["resource"], "route",
                    "{method} {template} fell through to the fallback"
                );
            }
        }
    }
}

#[test]
fn templates_become_concrete_paths() {
    assert_eq!(
        concrete("/api/quotations/{id}/expenses/{item_id}"),
        "/api/quotations/1/expenses/1"
    );
}
