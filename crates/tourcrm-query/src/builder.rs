// SPDX-License-Identifier: Apache-2.0

use rusqlite::types::Value;
use tourcrm_model::SqlValue;

use crate::filters::{escape_like, normalize_search, Filter, ListQuery};
use crate::page::PageParams;
use crate::sort::SortSpec;

#[must_use]
pub fn to_sql_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(n) => Value::Integer(*n),
        SqlValue::Text(s) => Value::Text(s.clone()),
    }
}

/// Accumulates `AND`-joined predicates. Every builder starts scoped to one
/// tenant and to rows that are not soft-deleted.
#[derive(Debug, Clone)]
pub struct WhereBuilder {
    parts: Vec<String>,
    params: Vec<Value>,
}

impl WhereBuilder {
    #[must_use]
    pub fn tenant(organization_id: i64) -> Self {
        Self {
            parts: vec![
                "organization_id = ?".to_string(),
                "deleted_at IS NULL".to_string(),
            ],
            params: vec![Value::Integer(organization_id)],
        }
    }

    /// Tenant scope for append-only tables that have no `deleted_at`.
    #[must_use]
    pub fn tenant_only(organization_id: i64) -> Self {
        Self {
            parts: vec!["organization_id = ?".to_string()],
            params: vec![Value::Integer(organization_id)],
        }
    }

    pub fn eq(&mut self, column: &str, value: Value) -> &mut Self {
        self.parts.push(format!("{column} = ?"));
        self.params.push(value);
        self
    }

    pub fn gte(&mut self, column: &str, value: Value) -> &mut Self {
        self.parts.push(format!("{column} >= ?"));
        self.params.push(value);
        self
    }

    pub fn lte(&mut self, column: &str, value: Value) -> &mut Self {
        self.parts.push(format!("{column} <= ?"));
        self.params.push(value);
        self
    }

    /// An empty list matches nothing.
    pub fn in_list(&mut self, column: &str, values: Vec<Value>) -> &mut Self {
        if values.is_empty() {
            self.parts.push("0 = 1".to_string());
            return self;
        }
        let marks = vec!["?"; values.len()].join(", ");
        self.parts.push(format!("{column} IN ({marks})"));
        self.params.extend(values);
        self
    }

    /// Case-insensitive substring match across `columns`, OR-ed together.
    pub fn search(&mut self, columns: &[&str], term: &str) -> &mut Self {
        let needle = normalize_search(term);
        if needle.is_empty() || columns.is_empty() {
            return self;
        }
        let pattern = format!("%{}%", escape_like(&needle));
        let clauses: Vec<String> = columns
            .iter()
            .map(|c| format!("lower(COALESCE({c}, '')) LIKE ? ESCAPE '!'"))
            .collect();
        self.parts.push(format!("({})", clauses.join(" OR ")));
        for _ in columns {
            self.params.push(Value::Text(pattern.clone()));
        }
        self
    }

    pub fn filter(&mut self, filter: &Filter) -> &mut Self {
        match filter {
            Filter::Eq(c, v) => self.eq(c, v.clone()),
            Filter::Gte(c, v) => self.gte(c, v.clone()),
            Filter::Lte(c, v) => self.lte(c, v.clone()),
            Filter::In(c, vs) => self.in_list(c, vs.clone()),
        }
    }

    /// Applies filters and search from a parsed list query.
    pub fn apply(&mut self, query: &ListQuery, searchable: &[&str]) -> &mut Self {
        for f in &query.filters {
            self.filter(f);
        }
        if let Some(term) = &query.search {
            self.search(searchable, term);
        }
        self
    }

    #[must_use]
    pub fn clause(&self) -> String {
        self.parts.join(" AND ")
    }

    #[must_use]
    pub fn params(&self) -> &[Value] {
        &self.params
    }
}

pub fn build_list_sql(
    table: &str,
    columns: &[&str],
    filter: &WhereBuilder,
    sort: &SortSpec,
    page: &PageParams,
) -> (String, Vec<Value>) {
    let sql = format!(
        "SELECT {} FROM {table} WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
        columns.join(", "),
        filter.clause(),
        sort.to_sql()
    );
    let mut params = filter.params().to_vec();
    params.push(Value::Integer(i64::from(page.page_size)));
    params.push(Value::Integer(i64::try_from(page.offset()).unwrap_or(i64::MAX)));
    (sql, params)
}

pub fn build_count_sql(table: &str, filter: &WhereBuilder) -> (String, Vec<Value>) {
    (
        format!("SELECT COUNT(*) FROM {table} WHERE {}", filter.clause()),
        filter.params().to_vec(),
    )
}

/// Insert with tenant, author and timestamps prepended to `assignments`.
pub fn build_insert_sql(
    table: &str,
    organization_id: i64,
    created_by: Option<i64>,
    now: &str,
    assignments: &[(&str, Value)],
) -> (String, Vec<Value>) {
    let mut columns = vec!["organization_id", "created_by", "created_at", "updated_at"];
    let mut params = vec![
        Value::Integer(organization_id),
        created_by.map_or(Value::Null, Value::Integer),
        Value::Text(now.to_string()),
        Value::Text(now.to_string()),
    ];
    for (column, value) in assignments {
        columns.push(*column);
        params.push(value.clone());
    }
    let marks = vec!["?"; columns.len()].join(", ");
    (
        format!("INSERT INTO {table} ({}) VALUES ({marks})", columns.join(", ")),
        params,
    )
}

/// `SET` only the provided columns plus `updated_at`, scoped to one live row
/// of one tenant.
pub fn build_update_sql(
    table: &str,
    organization_id: i64,
    id: i64,
    now: &str,
    assignments: &[(&str, Value)],
) -> (String, Vec<Value>) {
    let mut sets: Vec<String> = assignments.iter().map(|(c, _)| format!("{c} = ?")).collect();
    sets.push("updated_at = ?".to_string());
    let mut params: Vec<Value> = assignments.iter().map(|(_, v)| v.clone()).collect();
    params.push(Value::Text(now.to_string()));
    params.push(Value::Integer(id));
    params.push(Value::Integer(organization_id));
    (
        format!(
            "UPDATE {table} SET {} WHERE id = ? AND organization_id = ? AND deleted_at IS NULL",
            sets.join(", ")
        ),
        params,
    )
}

/// First live row of the same tenant, parent and season keys whose
/// inclusive date range intersects the candidate range. Keys compare with
/// `IS` so a NULL key only matches NULL.
///
/// Parameters in order: organization id, parent id, one value per key, id
/// to exclude (0 on create), candidate end date, candidate start date.
#[must_use]
pub fn season_overlap_sql(table: &str, parent_column: &str, keys: &[&str]) -> String {
    let key_clause: String = keys.iter().map(|k| format!(" AND {k} IS ?")).collect();
    format!(
        "SELECT id, start_date, end_date FROM {table} \
         WHERE organization_id = ? AND {parent_column} = ?{key_clause} AND deleted_at IS NULL \
         AND id != ? AND start_date <= ? AND end_date >= ? \
         ORDER BY start_date ASC, id ASC LIMIT 1"
    )
}

/// Inclusive interval intersection, the predicate `season_overlap_sql` encodes.
#[must_use]
pub fn ranges_overlap<T: PartialOrd>(a_start: &T, a_end: &T, b_start: &T, b_end: &T) -> bool {
    a_start <= b_end && a_end >= b_start
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_scope_is_always_first() {
        let mut w = WhereBuilder::tenant(7);
        w.eq("status", Value::Text("draft".into()));
        assert_eq!(
            w.clause(),
            "organization_id = ? AND deleted_at IS NULL AND status = ?"
        );
        assert_eq!(w.params().len(), 2);
    }

    #[test]
    fn search_binds_one_pattern_per_column() {
        let mut w = WhereBuilder::tenant(1);
        w.search(&["name", "email"], "100%");
        assert!(w.clause().ends_with(
            "(lower(COALESCE(name, '')) LIKE ? ESCAPE '!' OR lower(COALESCE(email, '')) LIKE ? ESCAPE '!')"
        ));
        assert_eq!(w.params()[1], Value::Text("%100!%%".into()));
        assert_eq!(w.params().len(), 3);
    }

    #[test]
    fn blank_search_adds_nothing() {
        let mut w = WhereBuilder::tenant(1);
        w.search(&["name"], "   ");
        assert_eq!(w.params().len(), 1);
    }

    #[test]
    fn empty_in_list_matches_nothing() {
        let mut w = WhereBuilder::tenant(1);
        w.in_list("status", vec![]);
        assert!(w.clause().ends_with("0 = 1"));
    }

    #[test]
    fn update_sets_only_given_columns() {
        let (sql, params) = build_update_sql(
            "clients",
            3,
            9,
            "2025-01-01T00:00:00Z",
            &[("name", Value::Text("Ana".into()))],
        );
        assert_eq!(
            sql,
            "UPDATE clients SET name = ?, updated_at = ? WHERE id = ? AND organization_id = ? AND deleted_at IS NULL"
        );
        assert_eq!(params.len(), 4);
        assert_eq!(params[2], Value::Integer(9));
        assert_eq!(params[3], Value::Integer(3));
    }

    #[test]
    fn overlap_predicate_is_inclusive() {
        assert!(ranges_overlap(&"2025-06-01", &"2025-06-30", &"2025-06-30", &"2025-07-15"));
        assert!(!ranges_overlap(&"2025-06-01", &"2025-06-30", &"2025-07-01", &"2025-07-15"));
    }
}
