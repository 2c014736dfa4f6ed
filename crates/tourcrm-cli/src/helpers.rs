// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use serde_json::Value;
use tourcrm_core::canonical;
use tourcrm_store::{SqliteStore, StoreConfig, StoreError};

use crate::OutputMode;

fn password_iterations() -> u32 {
    std::env::var("CRM_PASSWORD_ITERATIONS")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|n| *n > 0)
        .unwrap_or_else(|| StoreConfig::default().password_iterations)
}

/// Opens the database, creating its directory and applying migrations.
pub(crate) fn open_store(path: &Path) -> Result<SqliteStore, StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| StoreError::Pool(format!("create {} failed: {e}", parent.display())))?;
    }
    SqliteStore::open(
        path,
        StoreConfig {
            max_connections: 1,
            password_iterations: password_iterations(),
            ..StoreConfig::default()
        },
    )
}

pub(crate) fn emit_ok(output_mode: OutputMode, payload: Value) -> Result<(), String> {
    if output_mode.json {
        let bytes = canonical::stable_json_bytes(&payload).map_err(|e| e.to_string())?;
        let text = String::from_utf8(bytes).map_err(|e| e.to_string())?;
        println!("{text}");
    } else {
        println!(
            "{}",
            serde_json::to_string_pretty(&payload).map_err(|e| e.to_string())?
        );
    }
    Ok(())
}

pub(crate) fn write_json(out: &Path, value: &Value) -> Result<(), String> {
    let bytes = canonical::stable_json_bytes(value).map_err(|e| e.to_string())?;
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    std::fs::write(out, bytes).map_err(|e| format!("write {} failed: {e}", out.display()))
}
