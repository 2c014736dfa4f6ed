// SPDX-License-Identifier: Apache-2.0

use serde_json::{json, Map, Value};
use tourcrm_model::{
    ColumnKind, ColumnSpec, ResourceDescriptor, Role, QUOTATION_DAYS, QUOTATION_EXPENSES,
    RESOURCES,
};

use crate::error_mapping::API_ERROR_SCHEMA_REF;
use crate::errors::ErrorCode;
use crate::params::allowed_list_params;

fn error_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": {"application/json": {"schema": {"$ref": API_ERROR_SCHEMA_REF}}}
    })
}

fn ok(description: &str) -> Value {
    json!({ "description": description })
}

fn protect(mut operation: Value, tenant_scoped: bool) -> Value {
    if let Some(obj) = operation.as_object_mut() {
        obj.insert("security".to_string(), json!([{"bearerAuth": []}]));
        if tenant_scoped {
            let params = obj
                .entry("parameters")
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Some(list) = params.as_array_mut() {
                list.insert(0, json!({"$ref": "#/components/parameters/TenantId"}));
            }
        }
        let responses = obj
            .entry("responses")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(map) = responses.as_object_mut() {
            map.insert("401".to_string(), error_response("missing or invalid token"));
            map.insert("403".to_string(), error_response("permission or tenant denied"));
            map.insert("429".to_string(), error_response("rate limit exceeded"));
        }
    }
    operation
}

/// Bearer token plus `X-Tenant-Id`.
fn secured(operation: Value) -> Value {
    protect(operation, true)
}

/// Bearer token only; the route is not scoped to one tenant.
fn authenticated(operation: Value) -> Value {
    protect(operation, false)
}

fn path_param(name: &str) -> Value {
    json!({"name": name, "in": "path", "required": true, "schema": {"type": "integer", "minimum": 1}})
}

fn column_schema(column: &ColumnSpec) -> Value {
    match column.kind {
        ColumnKind::Text { max_len } => json!({"type": "string", "maxLength": max_len}),
        ColumnKind::Email => json!({"type": "string", "format": "email"}),
        ColumnKind::Phone => json!({"type": "string"}),
        ColumnKind::Integer { min, max } => json!({"type": "integer", "minimum": min, "maximum": max}),
        ColumnKind::Money => json!({"type": "integer", "description": "minor units (cents)"}),
        ColumnKind::Percent => json!({"type": "integer", "description": "basis points"}),
        ColumnKind::Decimal => json!({"type": "string", "pattern": "^[0-9]{1,12}(\\.[0-9]{1,6})?$"}),
        ColumnKind::Date => json!({"type": "string", "format": "date"}),
        ColumnKind::Bool => json!({"type": "boolean"}),
        ColumnKind::Enum(values) => json!({"type": "string", "enum": values}),
        ColumnKind::Currency => json!({"type": "string", "pattern": "^[A-Z]{3}$"}),
        ColumnKind::Reference(table) => {
            json!({"type": "integer", "minimum": 1, "x-references": table})
        }
        ColumnKind::Json => json!({"type": "object"}),
        _ => json!({}),
    }
}

fn schema_name(desc: &ResourceDescriptor) -> String {
    desc.name
        .split('-')
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_ascii_uppercase().to_string() + chars.as_str()
            })
        })
        .collect()
}

fn resource_schema(desc: &ResourceDescriptor) -> Value {
    let mut properties = Map::new();
    properties.insert("id".to_string(), json!({"type": "integer", "readOnly": true}));
    for system in ["created_at", "updated_at"] {
        properties.insert(
            system.to_string(),
            json!({"type": "string", "format": "date-time", "readOnly": true}),
        );
    }
    for column in desc.columns {
        let mut schema = column_schema(column);
        if !column.writable {
            if let Some(obj) = schema.as_object_mut() {
                obj.insert("readOnly".to_string(), Value::Bool(true));
            }
        }
        properties.insert(column.name.to_string(), schema);
    }
    let required: Vec<&str> = desc
        .columns
        .iter()
        .filter(|c| c.required)
        .map(|c| c.name)
        .collect();
    json!({"type": "object", "properties": properties, "required": required})
}

fn list_parameters(desc: &ResourceDescriptor) -> Vec<Value> {
    allowed_list_params(desc)
        .into_iter()
        .map(|name| {
            let schema = match name.as_str() {
                "page" | "pageSize" => json!({"type": "integer", "minimum": 1}),
                _ => json!({"type": "string"}),
            };
            json!({"name": name, "in": "query", "schema": schema})
        })
        .collect()
}

fn collection_paths(
    paths: &mut Map<String, Value>,
    base: &str,
    desc: &ResourceDescriptor,
    parents: &[&str],
    item: &str,
) {
    let schema_ref = format!("#/components/schemas/{}", schema_name(desc));
    let parent_params: Vec<Value> = parents.iter().map(|p| path_param(p)).collect();
    let mut list_params = parent_params.clone();
    list_params.extend(list_parameters(desc));
    paths.insert(
        base.to_string(),
        json!({
            "get": secured(json!({
                "tags": [desc.name],
                "parameters": list_params,
                "responses": {
                    "200": {"description": "paged list", "content": {"application/json": {"schema": {"$ref": "#/components/schemas/ListResponse"}}}},
                    "400": error_response("invalid query parameter")
                }
            })),
            "post": secured(json!({
                "tags": [desc.name],
                "parameters": parent_params.clone(),
                "requestBody": {"required": true, "content": {"application/json": {"schema": {"$ref": schema_ref}}}},
                "responses": {
                    "201": ok("created"),
                    "400": error_response("validation failed"),
                    "409": error_response("conflict"),
                    "422": error_response("idempotency key reused or invalid state")
                }
            }))
        }),
    );
    let mut item_params = parent_params;
    item_params.push(path_param(item));
    let write = |summary: &str| {
        secured(json!({
            "tags": [desc.name],
            "summary": summary,
            "parameters": item_params.clone(),
            "requestBody": {"required": true, "content": {"application/json": {"schema": {"$ref": schema_ref.clone()}}}},
            "responses": {
                "200": ok("updated"),
                "400": error_response("validation failed"),
                "404": error_response("not found"),
                "409": error_response("conflict"),
                "422": error_response("invalid state transition")
            }
        }))
    };
    paths.insert(
        format!("{base}/{{{item}}}"),
        json!({
            "get": secured(json!({
                "tags": [desc.name],
                "parameters": item_params.clone(),
                "responses": {"200": ok("record"), "404": error_response("not found")}
            })),
            "put": write("replace writable fields"),
            "patch": write("update some fields"),
            "delete": secured(json!({
                "tags": [desc.name],
                "parameters": item_params.clone(),
                "responses": {
                    "204": ok("deleted"),
                    "404": error_response("not found"),
                    "422": error_response("record cannot be deleted")
                }
            }))
        }),
    );
}

fn get_op(tag: &str, description: &str, parameters: Vec<Value>) -> Value {
    json!({"get": secured(json!({
        "tags": [tag],
        "parameters": parameters,
        "responses": {"200": ok(description), "400": error_response("invalid query parameter")}
    }))})
}

fn post_op(tag: &str, description: &str, parameters: Vec<Value>) -> Value {
    secured(json!({
        "tags": [tag],
        "parameters": parameters,
        "requestBody": {"required": true, "content": {"application/json": {"schema": {"type": "object"}}}},
        "responses": {
            "200": ok(description),
            "400": error_response("validation failed"),
            "404": error_response("not found"),
            "422": error_response("invalid state transition")
        }
    }))
}

fn query_param(name: &str, schema: Value) -> Value {
    json!({"name": name, "in": "query", "schema": schema})
}

/// OpenAPI 3.0 description of every route. Object keys are emitted sorted.
#[must_use]
pub fn openapi_v1_spec() -> Value {
    let mut paths = Map::new();
    paths.insert("/healthz".to_string(), json!({"get": {"responses": {"200": ok("ok")}}}));
    paths.insert(
        "/readyz".to_string(),
        json!({"get": {"responses": {"200": ok("ready"), "503": error_response("not ready")}}}),
    );
    paths.insert(
        "/metrics".to_string(),
        json!({"get": {"responses": {"200": ok("prometheus metrics")}}}),
    );
    paths.insert(
        "/api/openapi.json".to_string(),
        json!({"get": {"responses": {"200": ok("this document")}}}),
    );
    paths.insert(
        "/api/auth/login".to_string(),
        json!({"post": {
            "tags": ["auth"],
            "requestBody": {"required": true, "content": {"application/json": {"schema": {"$ref": "#/components/schemas/LoginRequest"}}}},
            "responses": {
                "200": ok("bearer token and user"),
                "400": error_response("validation failed"),
                "401": error_response("invalid credentials")
            }
        }}),
    );
    paths.insert(
        "/api/auth/me".to_string(),
        json!({"get": authenticated(json!({"tags": ["auth"], "responses": {"200": ok("current user")}}))}),
    );
    paths.insert(
        "/api/auth/change-password".to_string(),
        json!({"post": authenticated(json!({
            "tags": ["auth"],
            "requestBody": {"required": true, "content": {"application/json": {"schema": {"$ref": "#/components/schemas/ChangePasswordRequest"}}}},
            "responses": {"204": ok("password changed"), "400": error_response("validation failed")}
        }))}),
    );
    paths.insert(
        "/api/roles".to_string(),
        json!({"get": authenticated(json!({"tags": ["auth"], "responses": {"200": ok("roles and their grants")}}))}),
    );
    let org_body = json!({"required": true, "content": {"application/json": {"schema": {"$ref": "#/components/schemas/OrganizationRequest"}}}});
    paths.insert(
        "/api/organizations".to_string(),
        json!({
            "get": authenticated(json!({"tags": ["organizations"], "responses": {"200": ok("organizations")}})),
            "post": authenticated(json!({
                "tags": ["organizations"],
                "requestBody": org_body,
                "responses": {
                    "201": ok("organization created"),
                    "400": error_response("validation failed"),
                    "409": error_response("slug already taken")
                }
            }))
        }),
    );

    for desc in RESOURCES {
        collection_paths(&mut paths, &format!("/api/{}", desc.route), desc, &[], "id");
    }
    if let Some(post) = paths
        .get_mut("/api/users")
        .and_then(|p| p.get_mut("post"))
        .and_then(Value::as_object_mut)
    {
        post.insert(
            "requestBody".to_string(),
            json!({"required": true, "content": {"application/json": {"schema": {"$ref": "#/components/schemas/NewUserRequest"}}}}),
        );
    }
    collection_paths(&mut paths, "/api/quotations/{id}/days", &QUOTATION_DAYS, &["id"], "item_id");
    collection_paths(
        &mut paths,
        "/api/quotations/{id}/expenses",
        &QUOTATION_EXPENSES,
        &["id"],
        "item_id",
    );
    paths.insert(
        "/api/quotations/{id}/status".to_string(),
        json!({"put": post_op("quotations", "status changed; accepting returns the booking", vec![path_param("id")])}),
    );
    paths.insert(
        "/api/quotations/{id}/itinerary".to_string(),
        get_op("quotations", "itinerary document", vec![path_param("id")]),
    );
    for kind in ["receivable", "payable"] {
        let tag = format!("invoices-{kind}");
        paths.insert(
            format!("/api/invoices/{kind}/{{id}}/payments"),
            json!({
                "get": secured(json!({"tags": [tag], "parameters": [path_param("id")], "responses": {"200": ok("payments"), "404": error_response("not found")}})),
                "post": post_op(&tag, "payment recorded", vec![path_param("id")])
            }),
        );
        paths.insert(
            format!("/api/invoices/{kind}/{{id}}/cancel"),
            json!({"post": post_op(&tag, "invoice cancelled", vec![path_param("id")])}),
        );
    }
    paths.insert("/api/finance/summary".to_string(), get_op("finance", "per-currency totals", Vec::new()));
    paths.insert("/api/finance/customers".to_string(), get_op("finance", "outstanding by client", Vec::new()));
    paths.insert("/api/finance/suppliers".to_string(), get_op("finance", "outstanding by provider", Vec::new()));
    paths.insert(
        "/api/finance/exchange-rates/latest".to_string(),
        get_op("finance", "newest rate per pair", vec![query_param("base", json!({"type": "string"}))]),
    );
    paths.insert("/api/dashboard/stats".to_string(), get_op("dashboard", "headline counters", Vec::new()));
    paths.insert(
        "/api/dashboard/recent-requests".to_string(),
        get_op("dashboard", "latest requests", vec![query_param("limit", json!({"type": "integer", "minimum": 1, "maximum": 50}))]),
    );
    paths.insert(
        "/api/dashboard/upcoming-tours".to_string(),
        get_op("dashboard", "bookings starting soon", vec![query_param("days", json!({"type": "integer", "minimum": 1, "maximum": 365}))]),
    );
    paths.insert(
        "/api/reports/{category}/{report}".to_string(),
        get_op(
            "reports",
            "report document",
            vec![
                json!({"name": "category", "in": "path", "required": true, "schema": {"type": "string"}}),
                json!({"name": "report", "in": "path", "required": true, "schema": {"type": "string"}}),
                query_param("from", json!({"type": "string", "format": "date"})),
                query_param("to", json!({"type": "string", "format": "date"})),
            ],
        ),
    );
    paths.insert(
        "/api/suppliers/search".to_string(),
        get_op(
            "suppliers",
            "matching suppliers",
            vec![
                query_param("q", json!({"type": "string"})),
                query_param("type", json!({"type": "string"})),
                query_param("limit", json!({"type": "integer", "minimum": 1, "maximum": 100})),
            ],
        ),
    );
    paths.insert(
        "/api/audit-logs".to_string(),
        get_op(
            "audit",
            "audit entries, newest first",
            ["page", "pageSize", "user_id", "action", "resource", "resource_id", "from", "to"]
                .into_iter()
                .map(|name| query_param(name, json!({"type": "string"})))
                .collect(),
        ),
    );
    paths.insert(
        "/api/admin/check-schema".to_string(),
        get_op("admin", "schema report", Vec::new()),
    );

    let mut schemas = Map::new();
    for desc in RESOURCES.iter().chain([&QUOTATION_DAYS, &QUOTATION_EXPENSES]) {
        schemas.insert(schema_name(desc), resource_schema(desc));
    }
    let codes: Vec<&str> = ErrorCode::ALL.iter().map(|c| c.as_str()).collect();
    schemas.insert("ErrorCode".to_string(), json!({"type": "string", "enum": codes}));
    schemas.insert(
        "ApiError".to_string(),
        json!({
            "type": "object",
            "required": ["code", "message", "details", "request_id"],
            "additionalProperties": false,
            "properties": {
                "code": {"$ref": "#/components/schemas/ErrorCode"},
                "message": {"type": "string"},
                "details": {"type": "object", "additionalProperties": true},
                "request_id": {"type": "string"}
            }
        }),
    );
    schemas.insert(
        "ListResponse".to_string(),
        json!({
            "type": "object",
            "required": ["data", "meta", "links"],
            "properties": {
                "data": {"type": "array", "items": {"type": "object"}},
                "meta": {
                    "type": "object",
                    "required": ["page", "pageSize", "total", "totalPages", "filters"],
                    "properties": {
                        "page": {"type": "integer"},
                        "pageSize": {"type": "integer"},
                        "total": {"type": "integer"},
                        "totalPages": {"type": "integer"},
                        "filters": {"type": "object", "additionalProperties": {"type": "string"}}
                    }
                },
                "links": {
                    "type": "object",
                    "properties": {
                        "self": {"type": "string"},
                        "first": {"type": "string"},
                        "prev": {"type": "string", "nullable": true},
                        "next": {"type": "string", "nullable": true},
                        "last": {"type": "string"}
                    }
                }
            }
        }),
    );
    schemas.insert(
        "LoginRequest".to_string(),
        json!({
            "type": "object",
            "required": ["email", "password"],
            "properties": {"email": {"type": "string", "format": "email"}, "password": {"type": "string"}}
        }),
    );
    schemas.insert(
        "ChangePasswordRequest".to_string(),
        json!({
            "type": "object",
            "required": ["current_password", "new_password"],
            "properties": {
                "current_password": {"type": "string"},
                "new_password": {"type": "string", "minLength": 8}
            }
        }),
    );
    schemas.insert(
        "OrganizationRequest".to_string(),
        json!({
            "type": "object",
            "required": ["name", "slug"],
            "properties": {
                "name": {"type": "string", "maxLength": 200},
                "slug": {"type": "string", "pattern": "^[a-z0-9][a-z0-9-]*[a-z0-9]$"}
            }
        }),
    );
    schemas.insert(
        "NewUserRequest".to_string(),
        json!({
            "type": "object",
            "required": ["email", "name", "role", "password"],
            "properties": {
                "email": {"type": "string", "format": "email"},
                "name": {"type": "string"},
                "role": {"type": "string", "enum": Role::NAMES},
                "password": {"type": "string", "minLength": 8}
            }
        }),
    );

    json!({
        "openapi": "3.0.3",
        "info": {"title": "tourcrm API", "version": "v1"},
        "paths": paths,
        "components": {
            "schemas": schemas,
            "parameters": {
                "TenantId": {"name": "X-Tenant-Id", "in": "header", "required": true, "schema": {"type": "integer", "minimum": 1}}
            },
            "securitySchemes": {
                "bearerAuth": {"type": "http", "scheme": "bearer"}
            }
        }
    })
}
