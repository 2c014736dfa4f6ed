// SPDX-License-Identifier: Apache-2.0

use rusqlite::{params, params_from_iter, Connection};
use serde::Serialize;
use serde_json::Value;
use tourcrm_core::{Clock, OrganizationId};
use tourcrm_query::{PageParams, Value as SqlParam, WhereBuilder};

use crate::error::StoreError;
use crate::row::{collect, Page, Row};

/// Verb half of an audit action such as `CLIENT_CREATED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditVerb {
    Created,
    Updated,
    Deleted,
    StatusChanged,
    PaymentRecorded,
    Cancelled,
    LoggedIn,
    PasswordChanged,
}

impl AuditVerb {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Updated => "UPDATED",
            Self::Deleted => "DELETED",
            Self::StatusChanged => "STATUS_CHANGED",
            Self::PaymentRecorded => "PAYMENT_RECORDED",
            Self::Cancelled => "CANCELLED",
            Self::LoggedIn => "LOGIN",
            Self::PasswordChanged => "PASSWORD_CHANGED",
        }
    }
}

#[must_use]
pub fn audit_action(audit_resource: &str, verb: AuditVerb) -> String {
    format!("{audit_resource}_{}", verb.as_str())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub organization_id: i64,
    pub user_id: Option<i64>,
    pub action: String,
    pub resource: String,
    pub resource_id: Option<i64>,
    pub details: Value,
    pub request_id: Option<String>,
    pub ip_address: Option<String>,
}

/// Audit rows are append-only.
pub fn append_audit(
    conn: &Connection,
    clock: &dyn Clock,
    entry: &AuditEntry,
) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO audit_log (organization_id, user_id, action, resource, resource_id, details, request_id, ip_address, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            entry.organization_id,
            entry.user_id,
            entry.action,
            entry.resource,
            entry.resource_id,
            serde_json::to_string(&entry.details)?,
            entry.request_id,
            entry.ip_address,
            clock.now_rfc3339()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    pub user_id: Option<i64>,
    pub action: Option<String>,
    pub resource: Option<String>,
    pub resource_id: Option<i64>,
    /// Inclusive `YYYY-MM-DD` bounds on `created_at`.
    pub from: Option<String>,
    pub to: Option<String>,
}

const AUDIT_COLUMNS: &str =
    "id, organization_id, user_id, action, resource, resource_id, details, request_id, ip_address, created_at";

fn audit_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Row> {
    let details: String = r.get(6)?;
    let mut out = Row::new();
    out.insert("id".into(), Value::from(r.get::<_, i64>(0)?));
    out.insert("organization_id".into(), Value::from(r.get::<_, i64>(1)?));
    out.insert("user_id".into(), Value::from(r.get::<_, Option<i64>>(2)?));
    out.insert("action".into(), Value::from(r.get::<_, String>(3)?));
    out.insert("resource".into(), Value::from(r.get::<_, String>(4)?));
    out.insert("resource_id".into(), Value::from(r.get::<_, Option<i64>>(5)?));
    out.insert(
        "details".into(),
        serde_json::from_str(&details).unwrap_or(Value::String(details)),
    );
    out.insert("request_id".into(), Value::from(r.get::<_, Option<String>>(7)?));
    out.insert("ip_address".into(), Value::from(r.get::<_, Option<String>>(8)?));
    out.insert("created_at".into(), Value::from(r.get::<_, String>(9)?));
    Ok(out)
}

/// Newest first.
pub fn list_audit(
    conn: &Connection,
    org: OrganizationId,
    filter: &AuditFilter,
    page: &PageParams,
) -> Result<Page, StoreError> {
    let mut w = WhereBuilder::tenant_only(org.get());
    if let Some(user_id) = filter.user_id {
        w.eq("user_id", SqlParam::Integer(user_id));
    }
    if let Some(action) = &filter.action {
        w.eq("action", SqlParam::Text(action.clone()));
    }
    if let Some(resource) = &filter.resource {
        w.eq("resource", SqlParam::Text(resource.clone()));
    }
    if let Some(resource_id) = filter.resource_id {
        w.eq("resource_id", SqlParam::Integer(resource_id));
    }
    if let Some(from) = &filter.from {
        w.gte("substr(created_at, 1, 10)", SqlParam::Text(from.clone()));
    }
    if let Some(to) = &filter.to {
        w.lte("substr(created_at, 1, 10)", SqlParam::Text(to.clone()));
    }
    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM audit_log WHERE {}", w.clause()),
        params_from_iter(w.params().iter()),
        |r| r.get(0),
    )?;
    let mut params = w.params().to_vec();
    params.push(SqlParam::Integer(i64::from(page.page_size)));
    params.push(SqlParam::Integer(i64::try_from(page.offset()).unwrap_or(i64::MAX)));
    let rows = collect(
        conn,
        &format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_log WHERE {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            w.clause()
        ),
        &params,
        audit_row,
    )?;
    Ok(Page {
        rows,
        total: u64::try_from(total).unwrap_or(0),
    })
}
