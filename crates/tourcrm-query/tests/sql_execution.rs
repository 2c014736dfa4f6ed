// SPDX-License-Identifier: Apache-2.0

use proptest::prelude::*;
use rusqlite::{params_from_iter, Connection};
use tourcrm_query::{
    build_count_sql, build_insert_sql, build_list_sql, build_update_sql, ranges_overlap,
    season_overlap_sql, PageParams, SortSpec, Value, WhereBuilder,
};

fn setup_db() -> Connection {
    let conn = Connection::open_in_memory().expect("open memory db");
    conn.execute_batch(
        "
        CREATE TABLE clients (
          id INTEGER PRIMARY KEY,
          organization_id INTEGER NOT NULL,
          created_by INTEGER,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL,
          deleted_at TEXT,
          name TEXT NOT NULL,
          city TEXT
        );
        CREATE TABLE hotel_pricing (
          id INTEGER PRIMARY KEY,
          organization_id INTEGER NOT NULL,
          hotel_id INTEGER NOT NULL,
          room_type TEXT NOT NULL DEFAULT 'double',
          start_date TEXT NOT NULL,
          end_date TEXT NOT NULL,
          deleted_at TEXT
        );
        ",
    )
    .expect("schema");
    conn
}

fn insert_client(conn: &Connection, org: i64, name: &str, city: &str) {
    let (sql, params) = build_insert_sql(
        "clients",
        org,
        Some(1),
        "2025-01-01T00:00:00Z",
        &[
            ("name", Value::Text(name.to_string())),
            ("city", Value::Text(city.to_string())),
        ],
    );
    conn.execute(&sql, params_from_iter(params.iter()))
        .expect("insert");
}

fn list_names(conn: &Connection, filter: &WhereBuilder, sort: &SortSpec, page: PageParams) -> Vec<String> {
    let (sql, params) = build_list_sql("clients", &["id", "name"], filter, sort, &page);
    let mut stmt = conn.prepare(&sql).expect("prepare");
    let rows = stmt
        .query_map(params_from_iter(params.iter()), |row| row.get::<_, String>(1))
        .expect("query");
    rows.collect::<Result<Vec<_>, _>>().expect("rows")
}

#[test]
fn listing_never_crosses_tenants_or_returns_deleted_rows() {
    let conn = setup_db();
    insert_client(&conn, 1, "Ana", "Izmir");
    insert_client(&conn, 1, "Bora", "Istanbul");
    insert_client(&conn, 2, "Cem", "Istanbul");
    conn.execute("UPDATE clients SET deleted_at = 'x' WHERE name = 'Bora'", [])
        .expect("soft delete");

    let sort = SortSpec::parse(None, &["id", "name"], "name").expect("sort");
    let names = list_names(&conn, &WhereBuilder::tenant(1), &sort, PageParams::default());
    assert_eq!(names, vec!["Ana".to_string()]);

    let (sql, params) = build_count_sql("clients", &WhereBuilder::tenant(2));
    let total: i64 = conn
        .query_row(&sql, params_from_iter(params.iter()), |r| r.get(0))
        .expect("count");
    assert_eq!(total, 1);
}

#[test]
fn search_is_case_insensitive_and_escapes_wildcards() {
    let conn = setup_db();
    insert_client(&conn, 1, "Ana 100%", "Izmir");
    insert_client(&conn, 1, "Ana 1000", "Izmir");
    insert_client(&conn, 1, "Deniz", "ISTANBUL");

    let sort = SortSpec::parse(None, &["id", "name"], "name").expect("sort");
    let mut w = WhereBuilder::tenant(1);
    w.search(&["name", "city"], "istanbul");
    assert_eq!(list_names(&conn, &w, &sort, PageParams::default()), vec!["Deniz".to_string()]);

    let mut w = WhereBuilder::tenant(1);
    w.search(&["name"], "100%");
    assert_eq!(list_names(&conn, &w, &sort, PageParams::default()), vec!["Ana 100%".to_string()]);
}

#[test]
fn pages_are_stable_and_disjoint() {
    let conn = setup_db();
    for name in ["e", "a", "d", "b", "c"] {
        insert_client(&conn, 1, name, "x");
    }
    let sort = SortSpec::parse(Some("-name"), &["id", "name"], "id").expect("sort");
    let first = list_names(&conn, &WhereBuilder::tenant(1), &sort, PageParams { page: 1, page_size: 2 });
    let second = list_names(&conn, &WhereBuilder::tenant(1), &sort, PageParams { page: 2, page_size: 2 });
    let third = list_names(&conn, &WhereBuilder::tenant(1), &sort, PageParams { page: 3, page_size: 2 });
    assert_eq!(first, vec!["e", "d"]);
    assert_eq!(second, vec!["c", "b"]);
    assert_eq!(third, vec!["a"]);
}

#[test]
fn update_touches_only_the_tenant_row() {
    let conn = setup_db();
    insert_client(&conn, 1, "Ana", "Izmir");
    let (sql, params) = build_update_sql(
        "clients",
        2,
        1,
        "2025-02-02T00:00:00Z",
        &[("city", Value::Text("Bodrum".into()))],
    );
    let changed = conn.execute(&sql, params_from_iter(params.iter())).expect("update");
    assert_eq!(changed, 0);
    let (sql, params) = build_update_sql(
        "clients",
        1,
        1,
        "2025-02-02T00:00:00Z",
        &[("city", Value::Text("Bodrum".into()))],
    );
    assert_eq!(conn.execute(&sql, params_from_iter(params.iter())).expect("update"), 1);
    let (city, updated): (String, String) = conn
        .query_row("SELECT city, updated_at FROM clients WHERE id = 1", [], |r| {
            Ok((r.get(0)?, r.get(1)?))
        })
        .expect("row");
    assert_eq!(city, "Bodrum");
    assert_eq!(updated, "2025-02-02T00:00:00Z");
}

fn day(n: u32) -> String {
    let month = 1 + n / 28;
    let dom = 1 + n % 28;
    format!("2025-{month:02}-{dom:02}")
}

proptest! {
    #[test]
    fn overlap_query_agrees_with_interval_predicate(
        a in 0u32..300, a_len in 0u32..40,
        b in 0u32..300, b_len in 0u32..40,
        same_parent in any::<bool>(),
        same_room in any::<bool>(),
    ) {
        let conn = setup_db();
        let (a_start, a_end) = (day(a), day((a + a_len).min(335)));
        let (b_start, b_end) = (day(b), day((b + b_len).min(335)));
        conn.execute(
            "INSERT INTO hotel_pricing (organization_id, hotel_id, room_type, start_date, end_date) VALUES (1, 10, 'double', ?1, ?2)",
            rusqlite::params![a_start, a_end],
        ).expect("seed");
        let parent = if same_parent { 10 } else { 11 };
        let room = if same_room { "double" } else { "single" };
        let sql = season_overlap_sql("hotel_pricing", "hotel_id", &["room_type"]);
        let mut stmt = conn.prepare(&sql).expect("prepare");
        let found = stmt
            .exists(rusqlite::params![1i64, parent, room, 0i64, b_end, b_start])
            .expect("exists");
        let expected = same_parent && same_room && ranges_overlap(&a_start, &a_end, &b_start, &b_end);
        prop_assert_eq!(found, expected);
    }
}

#[test]
fn overlap_query_without_keys_ignores_other_columns() {
    let conn = setup_db();
    conn.execute_batch(
        "INSERT INTO hotel_pricing (organization_id, hotel_id, room_type, start_date, end_date)
         VALUES (1, 10, 'double', '2025-01-01', '2025-03-31');",
    )
    .expect("seed");
    let sql = season_overlap_sql("hotel_pricing", "hotel_id", &[]);
    let mut stmt = conn.prepare(&sql).expect("prepare");
    let found = stmt
        .exists(rusqlite::params![1i64, 10i64, 0i64, "2025-04-30", "2025-03-01"])
        .expect("exists");
    assert!(found);
}
