use serde_json::Value;
use tourcrm_api::{openapi_v1_spec, ErrorCode};
use tourcrm_core::canonical;
use tourcrm_model::RESOURCES;

#[test]
fn openapi_bytes_are_deterministic() {
    let first = canonical::stable_json_hash_hex(&openapi_v1_spec()).expect("hash openapi");
    let second = canonical::stable_json_hash_hex(&openapi_v1_spec()).expect("hash openapi");
    assert_eq!(first, second);
}

#[test]
fn openapi_paths_and_component_schemas_are_lexicographically_sorted() {
    let spec = openapi_v1_spec();
    assert_sorted_object(spec.get("paths").expect("paths"));
    let schemas = spec
        .get("components")
        .and_then(|v| v.get("schemas"))
        .expect("components.schemas");
    assert_sorted_object(schemas);
}

#[test]
fn openapi_schema_lint_rules_hold() {
    let spec = openapi_v1_spec();
    assert_eq!(spec["openapi"], "3.0.3");
    assert_eq!(spec["info"]["version"], "v1");

    let api_error = &spec["components"]["schemas"]["ApiError"];
    assert_eq!(api_error["type"], "object");
    assert_eq!(api_error["additionalProperties"], Value::Bool(false));

    let required = api_error["required"]
        .as_array()
        .expect("ApiError.required array")
        .iter()
        .map(|v| v.as_str().expect("required string"))
        .collect::<Vec<_>>();
    assert_eq!(required, vec!["code", "message", "details", "request_id"]);

    let codes = spec["components"]["schemas"]["ErrorCode"]["enum"]
        .as_array()
        .expect("error code enum");
    assert_eq!(codes.len(), ErrorCode::ALL.len());
}

#[test]
fn every_resource_has_collection_and_item_routes() {
    let spec = openapi_v1_spec();
    let paths = spec["paths"].as_object().expect("paths");
    for desc in RESOURCES {
        let collection = format!("/api/{}", desc.route);
        let item = format!("{collection}/{{id}}");
        for method in ["get", "post"] {
            assert!(paths[&collection].get(method).is_some(), "{method} {collection}");
        }
        for method in ["get", "put", "patch", "delete"] {
            assert!(paths[&item].get(method).is_some(), "{method} {item}");
        }
    }
}

#[test]
fn tenant_routes_require_bearer_and_tenant_header() {
    let spec = openapi_v1_spec();
    let op = &spec["paths"]["/api/clients"]["get"];
    assert_eq!(op["security"][0]["bearerAuth"], Value::Array(Vec::new()));
    assert_eq!(op["parameters"][0]["$ref"], "#/components/parameters/TenantId");
    assert!(spec["paths"]["/healthz"]["get"].get("security").is_none());
    assert!(spec["paths"]["/api/auth/login"]["post"].get("security").is_none());
}

#[test]
fn caller_scoped_routes_take_no_tenant_header() {
    let spec = openapi_v1_spec();
    for (path, method) in [
        ("/api/auth/me", "get"),
        ("/api/roles", "get"),
        ("/api/organizations", "post"),
    ] {
        let op = &spec["paths"][path][method];
        assert_eq!(op["security"][0]["bearerAuth"], Value::Array(Vec::new()), "{path}");
        assert!(op.get("parameters").is_none(), "{path} must not take X-Tenant-Id");
    }
    let users_post = &spec["paths"]["/api/users"]["post"];
    assert_eq!(
        users_post["requestBody"]["content"]["application/json"]["schema"]["$ref"],
        "#/components/schemas/NewUserRequest"
    );
}

#[test]
fn workflow_routes_are_documented() {
    let spec = openapi_v1_spec();
    for path in [
        "/api/quotations/{id}/status",
        "/api/quotations/{id}/itinerary",
        "/api/quotations/{id}/expenses/{item_id}",
        "/api/quotations/{id}/days",
        "/api/invoices/receivable/{id}/payments",
        "/api/invoices/payable/{id}/cancel",
        "/api/finance/summary",
        "/api/dashboard/upcoming-tours",
        "/api/reports/{category}/{report}",
        "/api/suppliers/search",
        "/api/audit-logs",
        "/api/admin/check-schema",
    ] {
        assert!(spec["paths"].get(path).is_some(), "missing {path}");
    }
}

fn assert_sorted_object(value: &Value) {
    let object = value.as_object().expect("json object");
    let observed = object.keys().map(String::as_str).collect::<Vec<_>>();
    let mut sorted = observed.clone();
    sorted.sort_unstable();
    assert_eq!(observed, sorted);
}
