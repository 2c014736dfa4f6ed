// SPDX-License-Identifier: Apache-2.0

use serde_json::Value;
use tourcrm_core::OrganizationId;
use tourcrm_store::AuditEntry;
use tracing::info;

use super::extract::RequestMeta;
use crate::AppState;

/// Audit row for a caller acting on `org`. `resource_id` may be filled in
/// once the store has assigned it.
pub(crate) fn entry(
    org: OrganizationId,
    user_id: Option<i64>,
    meta: &RequestMeta,
    action: String,
    resource: &str,
    resource_id: Option<i64>,
    details: Value,
) -> AuditEntry {
    AuditEntry {
        organization_id: org.get(),
        user_id,
        action,
        resource: resource.to_string(),
        resource_id,
        details,
        request_id: Some(meta.request_id.clone()),
        ip_address: meta.ip_address.clone(),
    }
}

/// Mirrors a stored audit row onto the `crm_audit` log target.
pub(crate) fn emit(state: &AppState, entry: &AuditEntry) {
    if !state.api.enable_audit_log {
        return;
    }
    info!(
        target: "crm_audit",
        organization_id = entry.organization_id,
        user_id = ?entry.user_id,
        action = %entry.action,
        resource = %entry.resource,
        resource_id = ?entry.resource_id,
        request_id = entry.request_id.as_deref().unwrap_or(""),
        ip_address = entry.ip_address.as_deref().unwrap_or(""),
        "audit"
    );
}
