// SPDX-License-Identifier: Apache-2.0

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tourcrm_model::resource_by_route;
use tourcrm_query::{build_count_sql, build_list_sql, PageParams, SortSpec, Value, WhereBuilder};

fn bench_list_assembly(c: &mut Criterion) {
    let desc = resource_by_route("quotations").expect("quotations descriptor");
    let columns = desc.select_columns();
    let searchable = desc.searchable_columns();
    let sortable = desc.sortable_columns();

    c.bench_function("list_sql_with_search_and_filters", |b| {
        b.iter(|| {
            let sort = SortSpec::parse(Some("-start_date,title"), &sortable, desc.default_sort)
                .expect("sort");
            let mut w = WhereBuilder::tenant(black_box(42));
            w.eq("status", Value::Text("sent".into()))
                .gte("start_date", Value::Text("2025-01-01".into()))
                .lte("start_date", Value::Text("2025-12-31".into()))
                .search(&searchable, black_box("Kapadokya 5%"));
            let page = PageParams { page: 3, page_size: 50 };
            black_box(build_list_sql(desc.table, &columns, &w, &sort, &page));
            black_box(build_count_sql(desc.table, &w));
        });
    });
}

criterion_group!(benches, bench_list_assembly);
criterion_main!(benches);
