// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde_json::Value;
use tourcrm_model::{parse_date, validate_value, ColumnKind, ColumnSpec, ResourceDescriptor};
use tourcrm_query::{
    normalize_search, to_sql_value, Filter, ListQuery, PageParams, SortSpec, Value as SqlParam,
    MAX_SEARCH_LEN,
};

use crate::errors::ApiError;

/// Parameters every list endpoint understands.
pub const PAGING_PARAMS: [&str; 4] = ["page", "pageSize", "sort", "search"];

/// Upper bound on values in one comma-separated `IN` filter.
pub const MAX_IN_VALUES: usize = 20;

/// A parsed list request plus the raw filter parameters echoed back in
/// `meta.filters` and carried over into pagination links.
#[derive(Debug, Clone, PartialEq)]
pub struct ListParams {
    pub query: ListQuery,
    pub applied: BTreeMap<String, String>,
}

/// Every query parameter `desc` accepts, in a stable order.
#[must_use]
pub fn allowed_list_params(desc: &ResourceDescriptor) -> Vec<String> {
    let mut out: Vec<String> = PAGING_PARAMS.iter().map(|p| (*p).to_string()).collect();
    for column in desc.filterable_columns() {
        out.push(column.name.to_string());
        if column.kind == ColumnKind::Date {
            out.push(format!("{}_from", column.name));
            out.push(format!("{}_to", column.name));
        }
    }
    out.push("created_from".to_string());
    out.push("created_to".to_string());
    out
}

fn json_for(column: &ColumnSpec, raw: &str) -> Value {
    match column.kind {
        ColumnKind::Bool => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Value::Bool(true),
            "false" | "0" | "no" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        ColumnKind::Integer { .. } | ColumnKind::Reference(_) => raw
            .parse::<i64>()
            .map_or_else(|_| Value::String(raw.to_string()), Value::from),
        _ => Value::String(raw.to_string()),
    }
}

fn filter_value(column: &ColumnSpec, param: &str, raw: &str) -> Result<SqlParam, ApiError> {
    validate_value(column, &json_for(column, raw.trim()))
        .map(|v| to_sql_value(&v))
        .map_err(|e| ApiError::invalid_param(param, raw, &e.message))
}

fn date_bound(param: &str, raw: &str) -> Result<String, ApiError> {
    parse_date(raw.trim())
        .map(|d| d.format("%Y-%m-%d").to_string())
        .ok_or_else(|| ApiError::invalid_param(param, raw, "must be a date in YYYY-MM-DD format"))
}

/// Parses the query string of a list endpoint. Unknown parameters are
/// rejected with the allowed list in `details`.
pub fn parse_list_params(
    desc: &ResourceDescriptor,
    query: &BTreeMap<String, String>,
) -> Result<ListParams, ApiError> {
    let allowed = allowed_list_params(desc);
    if let Some(unknown) = query.keys().find(|k| !allowed.iter().any(|a| a == *k)) {
        return Err(ApiError::unknown_param(unknown, &allowed));
    }

    let page = PageParams::parse(
        query.get("page").map(String::as_str),
        query.get("pageSize").map(String::as_str),
    )?;
    let sort = SortSpec::parse(
        query.get("sort").map(String::as_str),
        &desc.sortable_columns(),
        desc.default_sort,
    )?;
    let search = match query.get("search") {
        Some(raw) if raw.chars().count() > MAX_SEARCH_LEN => {
            return Err(ApiError::invalid_param(
                "search",
                raw,
                &format!("must be at most {MAX_SEARCH_LEN} characters"),
            ))
        }
        Some(raw) => Some(normalize_search(raw)).filter(|s| !s.is_empty()),
        None => None,
    };

    let mut filters = Vec::new();
    let mut applied = BTreeMap::new();
    for column in desc.filterable_columns() {
        if let Some(raw) = query.get(column.name) {
            let parts: Vec<&str> = raw.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
            let is_list = matches!(column.kind, ColumnKind::Enum(_)) && parts.len() > 1;
            if is_list {
                if parts.len() > MAX_IN_VALUES {
                    return Err(ApiError::invalid_param(
                        column.name,
                        raw,
                        &format!("at most {MAX_IN_VALUES} values"),
                    ));
                }
                let mut seen = BTreeSet::new();
                let mut values = Vec::new();
                for part in parts {
                    if seen.insert(part) {
                        values.push(filter_value(column, column.name, part)?);
                    }
                }
                filters.push(Filter::In(column.name, values));
            } else {
                filters.push(Filter::Eq(column.name, filter_value(column, column.name, raw)?));
            }
            applied.insert(column.name.to_string(), raw.clone());
        }
        if column.kind == ColumnKind::Date {
            for (suffix, lower) in [("_from", true), ("_to", false)] {
                let param = format!("{}{suffix}", column.name);
                if let Some(raw) = query.get(&param) {
                    let bound = SqlParam::Text(date_bound(&param, raw)?);
                    filters.push(if lower {
                        Filter::Gte(column.name, bound)
                    } else {
                        Filter::Lte(column.name, bound)
                    });
                    applied.insert(param, raw.clone());
                }
            }
        }
    }
    for (param, lower) in [("created_from", true), ("created_to", false)] {
        if let Some(raw) = query.get(param) {
            let bound = SqlParam::Text(date_bound(param, raw)?);
            filters.push(if lower {
                Filter::Gte("substr(created_at, 1, 10)", bound)
            } else {
                Filter::Lte("substr(created_at, 1, 10)", bound)
            });
            applied.insert(param.to_string(), raw.clone());
        }
    }
    check_ranges(&applied)?;
    if let Some(term) = &search {
        applied.insert("search".to_string(), term.clone());
    }
    if query.contains_key("sort") {
        applied.insert("sort".to_string(), sort.as_param());
    }

    Ok(ListParams {
        query: ListQuery {
            page,
            sort,
            search,
            filters,
        },
        applied,
    })
}

/// `<x>_from` must not come after `<x>_to`.
fn check_ranges(applied: &BTreeMap<String, String>) -> Result<(), ApiError> {
    for (param, from) in applied {
        let Some(stem) = param.strip_suffix("_from") else {
            continue;
        };
        let to_param = format!("{stem}_to");
        if let Some(to) = applied.get(&to_param) {
            if parse_date(from.trim()) > parse_date(to.trim()) {
                return Err(ApiError::invalid_param(
                    &to_param,
                    to,
                    &format!("must not be before {param}"),
                ));
            }
        }
    }
    Ok(())
}

/// Inclusive report bounds from `from` and `to`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

pub fn parse_report_range(query: &BTreeMap<String, String>) -> Result<ReportRange, ApiError> {
    let allowed = vec!["from".to_string(), "to".to_string()];
    if let Some(unknown) = query.keys().find(|k| !allowed.iter().any(|a| a == *k)) {
        return Err(ApiError::unknown_param(unknown, &allowed));
    }
    let bound = |name: &str| -> Result<Option<NaiveDate>, ApiError> {
        query
            .get(name)
            .map(|raw| {
                parse_date(raw.trim()).ok_or_else(|| {
                    ApiError::invalid_param(name, raw, "must be a date in YYYY-MM-DD format")
                })
            })
            .transpose()
    };
    let from = bound("from")?;
    let to = bound("to")?;
    if let (Some(f), Some(t)) = (from, to) {
        if f > t {
            return Err(ApiError::invalid_param(
                "to",
                &t.to_string(),
                "must not be before from",
            ));
        }
    }
    Ok(ReportRange { from, to })
}
