use std::collections::BTreeMap;

use proptest::prelude::*;
use tourcrm_api::{
    map_error, parse_list_params, parse_report_range, ApiError, ErrorCode, MAX_IN_VALUES,
};
use tourcrm_model::resource_by_name;
use tourcrm_query::{Filter, Value};

fn q(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

#[test]
fn page_size_bounds_are_enforced() {
    let desc = resource_by_name("clients").expect("clients");
    for bad in ["0", "101", "-1", "ten"] {
        let err = parse_list_params(desc, &q(&[("pageSize", bad)])).expect_err("bad pageSize");
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(map_error(&err).status_code, 400);
    }
    let parsed = parse_list_params(desc, &q(&[("pageSize", "100"), ("page", "3")])).expect("max");
    assert_eq!(parsed.query.page.page_size, 100);
    assert_eq!(parsed.query.page.offset(), 200);
}

#[test]
fn unknown_parameter_lists_allowed_names() {
    let desc = resource_by_name("clients").expect("clients");
    let err = parse_list_params(desc, &q(&[("colour", "red")])).expect_err("unknown");
    assert_eq!(err.code, ErrorCode::ValidationError);
    assert_eq!(err.details["parameter"], "colour");
    let allowed = err.details["allowed"].as_array().expect("allowed");
    assert!(allowed.iter().any(|v| v == "nationality"));
    assert!(allowed.iter().any(|v| v == "created_from"));
}

#[test]
fn sort_fields_must_be_sortable() {
    let desc = resource_by_name("clients").expect("clients");
    let parsed = parse_list_params(desc, &q(&[("sort", "-name")])).expect("sortable");
    assert_eq!(parsed.query.sort.as_param(), "-name,id");
    assert_eq!(parsed.applied["sort"], "-name,id");

    let err = parse_list_params(desc, &q(&[("sort", "notes")])).expect_err("not sortable");
    assert_eq!(err.code, ErrorCode::ValidationError);
}

#[test]
fn enum_filters_reject_unknown_members() {
    let desc = resource_by_name("bookings").expect("bookings");
    let err = parse_list_params(desc, &q(&[("status", "confirmed,lost")])).expect_err("enum");
    assert_eq!(err.details["field_errors"][0]["field"], "status");

    let too_many = vec!["pending"; MAX_IN_VALUES + 1].join(",");
    let err = parse_list_params(desc, &q(&[("status", &too_many)])).expect_err("too many");
    assert_eq!(err.code, ErrorCode::ValidationError);
}

#[test]
fn date_ranges_become_bounds_and_must_be_ordered() {
    let desc = resource_by_name("bookings").expect("bookings");
    let parsed = parse_list_params(
        desc,
        &q(&[("start_date_from", "2025-05-01"), ("start_date_to", "2025-05-31")]),
    )
    .expect("range");
    assert_eq!(
        parsed.query.filters,
        vec![
            Filter::Gte("start_date", Value::Text("2025-05-01".to_string())),
            Filter::Lte("start_date", Value::Text("2025-05-31".to_string())),
        ]
    );
    assert_eq!(parsed.applied.len(), 2);

    let err = parse_list_params(
        desc,
        &q(&[("start_date_from", "2025-06-01"), ("start_date_to", "2025-05-31")]),
    )
    .expect_err("reversed");
    assert_eq!(err.details["field_errors"][0]["field"], "start_date_to");

    let err = parse_list_params(desc, &q(&[("created_from", "31/05/2025")])).expect_err("format");
    assert_eq!(err.code, ErrorCode::ValidationError);
}

#[test]
fn search_is_normalised_and_echoed() {
    let desc = resource_by_name("clients").expect("clients");
    let parsed = parse_list_params(desc, &q(&[("search", "  ANNA  ")])).expect("search");
    assert_eq!(parsed.query.search.as_deref(), Some("anna"));
    assert_eq!(parsed.applied["search"], "anna");

    let blank = parse_list_params(desc, &q(&[("search", "   ")])).expect("blank");
    assert_eq!(blank.query.search, None);

    let long = "x".repeat(201);
    assert!(parse_list_params(desc, &q(&[("search", &long)])).is_err());
}

#[test]
fn report_range_is_strict() {
    let range = parse_report_range(&q(&[("from", "2025-01-01"), ("to", "2025-12-31")]))
        .expect("range");
    assert!(range.from < range.to);
    assert_eq!(parse_report_range(&BTreeMap::new()).expect("open"), Default::default());

    for bad in [
        q(&[("from", "2025-02-30")]),
        q(&[("from", "2025-03-01"), ("to", "2025-02-01")]),
        q(&[("month", "3")]),
    ] {
        let err = parse_report_range(&bad).expect_err("invalid range");
        assert_eq!(err.code, ErrorCode::ValidationError);
    }
}

#[test]
fn error_schema_rejects_unknown_fields() {
    let raw = r#"{"code":"NOT_FOUND","message":"gone","details":{},"request_id":"r","extra":1}"#;
    let err = serde_json::from_str::<ApiError>(raw).expect_err("deny unknown fields");
    assert!(err.to_string().contains("unknown field"));
}

proptest! {
    #[test]
    fn valid_pages_always_parse(page in 1u32..10_000, size in 1u32..=100) {
        let desc = resource_by_name("agents").expect("agents");
        let parsed = parse_list_params(
            desc,
            &q(&[("page", &page.to_string()), ("pageSize", &size.to_string())]),
        ).expect("valid page");
        prop_assert_eq!(parsed.query.page.page, page);
        prop_assert_eq!(parsed.query.page.page_size, size);
    }

    #[test]
    fn parameter_order_does_not_matter(a in "[a-z]{1,8}", b in "[a-z]{1,8}") {
        let desc = resource_by_name("clients").expect("clients");
        let one = parse_list_params(desc, &q(&[("search", &a), ("nationality", &b)])).ok();
        let two = parse_list_params(desc, &q(&[("nationality", &b), ("search", &a)])).ok();
        prop_assert_eq!(one, two);
    }
}
