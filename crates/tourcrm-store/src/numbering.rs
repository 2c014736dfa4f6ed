// SPDX-License-Identifier: Apache-2.0

use rusqlite::{params, Connection};

use crate::error::StoreError;

/// `Q-2025-0001`. Sequences wider than four digits keep all digits.
#[must_use]
pub fn format_document_number(prefix: &str, year: i32, value: i64) -> String {
    format!("{prefix}-{year}-{value:04}")
}

/// Reserves the next number of `prefix` for one tenant and calendar year.
/// Must run inside the transaction that inserts the numbered row.
pub fn next_document_number(
    conn: &Connection,
    organization_id: i64,
    prefix: &str,
    year: i32,
) -> Result<String, StoreError> {
    let value: i64 = conn.query_row(
        "INSERT INTO document_sequences (organization_id, prefix, year, last_value)
         VALUES (?1, ?2, ?3, 1)
         ON CONFLICT (organization_id, prefix, year) DO UPDATE SET last_value = last_value + 1
         RETURNING last_value",
        params![organization_id, prefix, year],
        |r| r.get(0),
    )?;
    Ok(format_document_number(prefix, year, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tourcrm_core::FixedClock;

    #[test]
    fn sequences_are_per_tenant_prefix_and_year() {
        let mut conn = Connection::open_in_memory().expect("memory db");
        crate::schema::migrate(&mut conn, &FixedClock::at_date(2025, 1, 1)).expect("migrate");
        assert_eq!(next_document_number(&conn, 1, "Q", 2025).expect("n"), "Q-2025-0001");
        assert_eq!(next_document_number(&conn, 1, "Q", 2025).expect("n"), "Q-2025-0002");
        assert_eq!(next_document_number(&conn, 2, "Q", 2025).expect("n"), "Q-2025-0001");
        assert_eq!(next_document_number(&conn, 1, "B", 2025).expect("n"), "B-2025-0001");
        assert_eq!(next_document_number(&conn, 1, "Q", 2026).expect("n"), "Q-2026-0001");
    }

    #[test]
    fn wide_sequences_are_not_truncated() {
        assert_eq!(format_document_number("INV", 2025, 12345), "INV-2025-12345");
    }
}
