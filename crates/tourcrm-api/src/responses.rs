// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tourcrm_query::PageParams;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiResponseEnvelope<T> {
    pub data: T,
}

impl<T> ApiResponseEnvelope<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Percent-encodes one query-string component (RFC 3986 unreserved set kept).
#[must_use]
pub fn encode_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}

fn page_link(
    base_path: &str,
    params: &BTreeMap<String, String>,
    page: u64,
    page_size: u32,
) -> String {
    let mut query: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(v)))
        .collect();
    query.push(format!("page={page}"));
    query.push(format!("pageSize={page_size}"));
    format!("{base_path}?{}", query.join("&"))
}

/// Paged envelope with hypermedia links. `applied` holds the filter, search
/// and sort parameters carried into every link.
#[must_use]
pub fn build_list_response(
    rows: Vec<Value>,
    total: u64,
    page: &PageParams,
    base_path: &str,
    applied: &BTreeMap<String, String>,
) -> Value {
    let total_pages = page.total_pages(total);
    let current = u64::from(page.page);
    let last = total_pages.max(1);
    let link = |n: u64| Value::String(page_link(base_path, applied, n, page.page_size));
    let filters: BTreeMap<&str, &str> = applied
        .iter()
        .filter(|(k, _)| k.as_str() != "sort")
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    json!({
        "data": rows,
        "meta": {
            "page": page.page,
            "pageSize": page.page_size,
            "total": total,
            "totalPages": total_pages,
            "filters": filters,
        },
        "links": {
            "self": link(current),
            "first": link(1),
            "prev": if current > 1 { link((current - 1).min(last)) } else { Value::Null },
            "next": if current < total_pages { link(current + 1) } else { Value::Null },
            "last": link(last),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn components_are_percent_encoded() {
        assert_eq!(encode_component("a b&c=d"), "a%20b%26c%3Dd");
        assert_eq!(encode_component("İstanbul"), "%C4%B0stanbul");
    }

    #[test]
    fn middle_page_links_both_ways() {
        let mut applied = BTreeMap::new();
        applied.insert("status".to_string(), "confirmed".to_string());
        let page = PageParams {
            page: 2,
            page_size: 10,
        };
        let body = build_list_response(vec![json!({"id": 11})], 35, &page, "/api/bookings", &applied);
        assert_eq!(body["meta"]["totalPages"], 4);
        assert_eq!(body["meta"]["filters"]["status"], "confirmed");
        assert_eq!(
            body["links"]["next"],
            "/api/bookings?status=confirmed&page=3&pageSize=10"
        );
        assert_eq!(
            body["links"]["prev"],
            "/api/bookings?status=confirmed&page=1&pageSize=10"
        );
        assert_eq!(body["links"]["last"], "/api/bookings?status=confirmed&page=4&pageSize=10");
    }

    #[test]
    fn empty_result_has_single_page() {
        let body = build_list_response(
            Vec::new(),
            0,
            &PageParams::default(),
            "/api/clients",
            &BTreeMap::new(),
        );
        assert_eq!(body["meta"]["totalPages"], 0);
        assert_eq!(body["links"]["prev"], Value::Null);
        assert_eq!(body["links"]["next"], Value::Null);
        assert_eq!(body["links"]["last"], "/api/clients?page=1&pageSize=25");
    }
}
