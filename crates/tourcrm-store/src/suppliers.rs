// SPDX-License-Identifier: Apache-2.0

use rusqlite::Connection;
use serde_json::Value;
use tourcrm_core::OrganizationId;
use tourcrm_query::{escape_like, normalize_search, Value as SqlParam};

use crate::error::StoreError;
use crate::row::collect_plain;

/// Supplier tables searched together, with the type label each contributes.
pub const SUPPLIER_KINDS: &[(&str, &str)] = &[
    ("provider", "providers"),
    ("hotel", "hotels"),
    ("guide", "guides"),
    ("vehicle", "vehicles"),
    ("restaurant", "restaurants"),
    ("transfer", "transfers"),
];

/// Searches supplier names and cities across every supplier table.
/// `kinds` narrows to some labels of [`SUPPLIER_KINDS`]; empty means all.
pub fn search_suppliers(
    conn: &Connection,
    org: OrganizationId,
    term: &str,
    kinds: &[&str],
    limit: u32,
) -> Result<Vec<Value>, StoreError> {
    let needle = normalize_search(term);
    let pattern = format!("%{}%", escape_like(&needle));
    let mut branches = Vec::new();
    let mut params = Vec::new();
    for (kind, table) in SUPPLIER_KINDS {
        if !kinds.is_empty() && !kinds.contains(kind) {
            continue;
        }
        branches.push(format!(
            "SELECT '{kind}' AS supplier_type, id, name, city, is_active FROM {table}
             WHERE organization_id = ? AND deleted_at IS NULL
               AND (lower(name) LIKE ? ESCAPE '!' OR lower(COALESCE(city, '')) LIKE ? ESCAPE '!')"
        ));
        params.push(SqlParam::Integer(org.get()));
        params.push(SqlParam::Text(pattern.clone()));
        params.push(SqlParam::Text(pattern.clone()));
    }
    if branches.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT supplier_type, id, name, city, is_active FROM ({}) ORDER BY lower(name), supplier_type, id LIMIT ?",
        branches.join(" UNION ALL ")
    );
    params.push(SqlParam::Integer(i64::from(limit)));
    let mut rows = collect_plain(conn, &sql, &params)?;
    for row in &mut rows {
        if let Some(obj) = row.as_object_mut() {
            if let Some(active) = obj.get("is_active").and_then(Value::as_i64) {
                obj.insert("is_active".to_string(), Value::Bool(active != 0));
            }
        }
    }
    Ok(rows)
}
