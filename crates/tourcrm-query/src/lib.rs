// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! Parameterized SQL assembly for tenant-scoped list, count, insert and
//! update statements. Column and table names come from static descriptors;
//! every caller-supplied value is bound as a parameter.

mod builder;
mod filters;
mod page;
mod query_error;
mod sort;

pub use builder::{
    build_count_sql, build_insert_sql, build_list_sql, build_update_sql, ranges_overlap,
    season_overlap_sql, to_sql_value, WhereBuilder,
};
pub use filters::{escape_like, normalize_search, Filter, ListQuery, MAX_SEARCH_LEN};
pub use page::{PageParams, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use query_error::{QueryError, QueryErrorCode};
pub use sort::{SortKey, SortSpec};

pub use rusqlite::types::Value;

pub const CRATE_NAME: &str = "tourcrm-query";
