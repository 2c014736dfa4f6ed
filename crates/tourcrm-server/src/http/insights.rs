// SPDX-License-Identifier: Apache-2.0

//! Read-only endpoints: finance, dashboard, reports, supplier search, the
//! audit trail and the schema check.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use tourcrm_api::{
    build_list_response, parse_report_range, ApiError, ApiResponseEnvelope, MAX_IN_VALUES,
};
use tourcrm_core::Clock;
use tourcrm_model::parse_date;
use tourcrm_query::{PageParams, MAX_SEARCH_LEN};
use tourcrm_store::dashboard::{dashboard_stats, recent_requests, upcoming_tours};
use tourcrm_store::finance::{
    finance_customers, finance_suppliers, finance_summary, latest_exchange_rates,
};
use tourcrm_store::suppliers::{search_suppliers, SUPPLIER_KINDS};
use tourcrm_store::{check_schema, list_audit, run_report, AuditFilter, DateRange, REPORT_NAMES};

use super::errors::HttpError;
use super::extract::{Caller, QueryMap};
use super::resources::rows_to_values;
use crate::AppState;

type Query = BTreeMap<String, String>;

fn reject_unknown(query: &Query, allowed: &[&str]) -> Result<(), HttpError> {
    if let Some(unknown) = query.keys().find(|k| !allowed.contains(&k.as_str())) {
        let allowed: Vec<String> = allowed.iter().map(|a| (*a).to_string()).collect();
        return Err(HttpError(ApiError::unknown_param(unknown, &allowed)));
    }
    Ok(())
}

/// Optional integer parameter within `min..=max`.
fn bounded(query: &Query, name: &str, default: u32, min: u32, max: u32) -> Result<u32, HttpError> {
    let Some(raw) = query.get(name) else {
        return Ok(default);
    };
    raw.trim()
        .parse::<u32>()
        .ok()
        .filter(|v| (min..=max).contains(v))
        .ok_or_else(|| {
            HttpError(ApiError::invalid_param(
                name,
                raw,
                &format!("must be an integer between {min} and {max}"),
            ))
        })
}

fn positive_id(query: &Query, name: &str) -> Result<Option<i64>, HttpError> {
    query
        .get(name)
        .map(|raw| {
            raw.trim()
                .parse::<i64>()
                .ok()
                .filter(|v| *v > 0)
                .ok_or_else(|| {
                    HttpError(ApiError::invalid_param(name, raw, "must be a positive integer"))
                })
        })
        .transpose()
}

fn day_param(query: &Query, name: &str) -> Result<Option<String>, HttpError> {
    query
        .get(name)
        .map(|raw| {
            parse_date(raw.trim())
                .map(|d| d.format("%Y-%m-%d").to_string())
                .ok_or_else(|| {
                    HttpError(ApiError::invalid_param(
                        name,
                        raw,
                        "must be a date in YYYY-MM-DD format",
                    ))
                })
        })
        .transpose()
}

fn currency_param(query: &Query, name: &str) -> Result<Option<String>, HttpError> {
    query
        .get(name)
        .map(|raw| {
            let code = raw.trim().to_ascii_uppercase();
            if code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase()) {
                Ok(code)
            } else {
                Err(HttpError(ApiError::invalid_param(
                    name,
                    raw,
                    "must be a three-letter currency code",
                )))
            }
        })
        .transpose()
}

fn data(value: Value) -> Json<ApiResponseEnvelope<Value>> {
    Json(ApiResponseEnvelope::new(value))
}

pub(crate) async fn finance_summary_handler(
    State(state): State<AppState>,
    caller: Caller,
    QueryMap(query): QueryMap,
) -> Result<Json<ApiResponseEnvelope<Value>>, HttpError> {
    reject_unknown(&query, &[])?;
    let org = caller.tenant()?;
    let today = state.clock.today();
    let summary = state
        .store
        .call(move |conn, _| finance_summary(conn, org, today))
        .await?;
    Ok(data(summary))
}

pub(crate) async fn finance_customers_handler(
    State(state): State<AppState>,
    caller: Caller,
    QueryMap(query): QueryMap,
) -> Result<Json<ApiResponseEnvelope<Value>>, HttpError> {
    reject_unknown(&query, &[])?;
    let org = caller.tenant()?;
    let rows = state
        .store
        .call(move |conn, _| finance_customers(conn, org))
        .await?;
    Ok(data(Value::Array(rows)))
}

pub(crate) async fn finance_suppliers_handler(
    State(state): State<AppState>,
    caller: Caller,
    QueryMap(query): QueryMap,
) -> Result<Json<ApiResponseEnvelope<Value>>, HttpError> {
    reject_unknown(&query, &[])?;
    let org = caller.tenant()?;
    let rows = state
        .store
        .call(move |conn, _| finance_suppliers(conn, org))
        .await?;
    Ok(data(Value::Array(rows)))
}

pub(crate) async fn latest_rates_handler(
    State(state): State<AppState>,
    caller: Caller,
    QueryMap(query): QueryMap,
) -> Result<Json<ApiResponseEnvelope<Value>>, HttpError> {
    reject_unknown(&query, &["base"])?;
    let base = currency_param(&query, "base")?;
    let org = caller.tenant()?;
    let rows = state
        .store
        .call(move |conn, _| latest_exchange_rates(conn, org, base.as_deref()))
        .await?;
    Ok(data(Value::Array(rows)))
}

pub(crate) async fn dashboard_stats_handler(
    State(state): State<AppState>,
    caller: Caller,
    QueryMap(query): QueryMap,
) -> Result<Json<ApiResponseEnvelope<Value>>, HttpError> {
    reject_unknown(&query, &[])?;
    let org = caller.tenant()?;
    let today = state.clock.today();
    let stats = state
        .store
        .call(move |conn, _| dashboard_stats(conn, org, today))
        .await?;
    Ok(data(stats))
}

pub(crate) async fn recent_requests_handler(
    State(state): State<AppState>,
    caller: Caller,
    QueryMap(query): QueryMap,
) -> Result<Json<ApiResponseEnvelope<Value>>, HttpError> {
    reject_unknown(&query, &["limit"])?;
    let limit = bounded(&query, "limit", 10, 1, 50)?;
    let org = caller.tenant()?;
    let rows = state
        .store
        .call(move |conn, _| recent_requests(conn, org, limit))
        .await?;
    Ok(data(Value::Array(rows)))
}

pub(crate) async fn upcoming_tours_handler(
    State(state): State<AppState>,
    caller: Caller,
    QueryMap(query): QueryMap,
) -> Result<Json<ApiResponseEnvelope<Value>>, HttpError> {
    reject_unknown(&query, &["days"])?;
    let days = bounded(&query, "days", 30, 1, 365)?;
    let org = caller.tenant()?;
    let today = state.clock.today();
    let rows = state
        .store
        .call(move |conn, _| upcoming_tours(conn, org, today, days))
        .await?;
    Ok(data(Value::Array(rows)))
}

pub(crate) async fn report_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path((category, report)): Path<(String, String)>,
    QueryMap(query): QueryMap,
) -> Result<Json<ApiResponseEnvelope<Value>>, HttpError> {
    let org = caller.tenant()?;
    let name = format!("{category}/{report}");
    if !REPORT_NAMES.contains(&name.as_str()) {
        return Err(HttpError(ApiError::not_found("report", name)));
    }
    let range = parse_report_range(&query)?;
    let range = DateRange {
        from: range.from,
        to: range.to,
    };
    let today = state.clock.today();
    let body = state
        .store
        .call(move |conn, _| run_report(conn, &name, org, &range, today))
        .await?;
    Ok(data(body))
}

pub(crate) async fn supplier_search_handler(
    State(state): State<AppState>,
    caller: Caller,
    QueryMap(query): QueryMap,
) -> Result<Json<ApiResponseEnvelope<Value>>, HttpError> {
    reject_unknown(&query, &["q", "type", "limit"])?;
    let term = query.get("q").map(|q| q.trim().to_string()).unwrap_or_default();
    if term.is_empty() || term.chars().count() > MAX_SEARCH_LEN {
        return Err(HttpError(ApiError::invalid_param(
            "q",
            &term,
            &format!("must be 1 to {MAX_SEARCH_LEN} characters"),
        )));
    }
    let mut kinds: Vec<&'static str> = Vec::new();
    if let Some(raw) = query.get("type") {
        let parts: Vec<&str> = raw.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
        if parts.len() > MAX_IN_VALUES {
            return Err(HttpError(ApiError::invalid_param(
                "type",
                raw,
                &format!("at most {MAX_IN_VALUES} values"),
            )));
        }
        for part in parts {
            let kind = SUPPLIER_KINDS
                .iter()
                .map(|(label, _)| *label)
                .find(|label| *label == part)
                .ok_or_else(|| {
                    let labels: Vec<&str> = SUPPLIER_KINDS.iter().map(|(l, _)| *l).collect();
                    HttpError(ApiError::invalid_param(
                        "type",
                        raw,
                        &format!("must be one of {}", labels.join(", ")),
                    ))
                })?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
    }
    let limit = bounded(&query, "limit", 20, 1, 50)?;
    let org = caller.tenant()?;
    let rows = state
        .store
        .call(move |conn, _| search_suppliers(conn, org, &term, &kinds, limit))
        .await?;
    Ok(data(Value::Array(rows)))
}

const AUDIT_PARAMS: &[&str] = &[
    "page",
    "pageSize",
    "user_id",
    "action",
    "resource",
    "resource_id",
    "from",
    "to",
];

pub(crate) async fn audit_logs_handler(
    State(state): State<AppState>,
    caller: Caller,
    QueryMap(query): QueryMap,
) -> Result<Json<Value>, HttpError> {
    reject_unknown(&query, AUDIT_PARAMS)?;
    let page = PageParams::parse(
        query.get("page").map(String::as_str),
        query.get("pageSize").map(String::as_str),
    )
    .map_err(ApiError::from)?;
    let text = |name: &str| {
        query
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    let filter = AuditFilter {
        user_id: positive_id(&query, "user_id")?,
        action: text("action").map(|a| a.to_ascii_uppercase()),
        resource: text("resource"),
        resource_id: positive_id(&query, "resource_id")?,
        from: day_param(&query, "from")?,
        to: day_param(&query, "to")?,
    };
    if let (Some(from), Some(to)) = (&filter.from, &filter.to) {
        if from > to {
            return Err(HttpError(ApiError::invalid_param("to", to, "must not be before from")));
        }
    }
    let applied: BTreeMap<String, String> = query
        .iter()
        .filter(|(k, _)| !matches!(k.as_str(), "page" | "pageSize"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let org = caller.tenant()?;
    let result = state
        .store
        .call(move |conn, _| list_audit(conn, org, &filter, &page))
        .await?;
    Ok(Json(build_list_response(
        rows_to_values(result.rows),
        result.total,
        &page,
        "/api/audit-logs",
        &applied,
    )))
}

pub(crate) async fn check_schema_handler(
    State(state): State<AppState>,
    _caller: Caller,
) -> Result<Json<ApiResponseEnvelope<Value>>, HttpError> {
    let report = state.store.call(|conn, _| check_schema(conn)).await?;
    Ok(data(serde_json::to_value(report).map_err(|e| {
        HttpError(ApiError::internal(format!("schema report encoding failed: {e}")))
    })?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(pairs: &[(&str, &str)]) -> Query {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn bounded_params_enforce_range() {
        assert_eq!(bounded(&q(&[]), "limit", 10, 1, 50).expect("default"), 10);
        assert_eq!(bounded(&q(&[("limit", "50")]), "limit", 10, 1, 50).expect("max"), 50);
        assert!(bounded(&q(&[("limit", "51")]), "limit", 10, 1, 50).is_err());
        assert!(bounded(&q(&[("limit", "0")]), "limit", 10, 1, 50).is_err());
        assert!(bounded(&q(&[("limit", "ten")]), "limit", 10, 1, 50).is_err());
    }

    #[test]
    fn unknown_params_list_the_allowed_ones() {
        let err = reject_unknown(&q(&[("bogus", "1")]), &["limit"]).expect_err("unknown");
        assert_eq!(err.0.details["parameter"], "bogus");
        assert_eq!(err.0.details["allowed"], json!(["limit"]));
    }

    #[test]
    fn currency_codes_are_normalised() {
        assert_eq!(
            currency_param(&q(&[("base", "eur")]), "base").expect("eur"),
            Some("EUR".to_string())
        );
        assert!(currency_param(&q(&[("base", "EURO")]), "base").is_err());
    }
}
