// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, BTreeSet};

use rusqlite::{params, Connection};
use serde::Serialize;
use tourcrm_core::Clock;
use tourcrm_model::{
    ColumnKind, ResourceDescriptor, QUOTATION_DAYS, QUOTATION_EXPENSES, RESOURCES, SYSTEM_COLUMNS,
};
use tracing::info;

use crate::error::StoreError;

pub const SCHEMA_VERSION: i64 = 2;

const USER_EXTRA_COLUMNS: &[&str] = &["password_hash TEXT NOT NULL", "last_login_at TEXT"];

const SUPPORT_TABLES: &str = "
CREATE TABLE organizations (
  id INTEGER PRIMARY KEY,
  name TEXT NOT NULL,
  slug TEXT NOT NULL UNIQUE,
  is_active INTEGER NOT NULL DEFAULT 1,
  created_at TEXT NOT NULL
);
CREATE TABLE invoice_payments (
  id INTEGER PRIMARY KEY,
  organization_id INTEGER NOT NULL REFERENCES organizations(id),
  invoice_kind TEXT NOT NULL CHECK (invoice_kind IN ('receivable', 'payable')),
  invoice_id INTEGER NOT NULL,
  amount_cents INTEGER NOT NULL CHECK (amount_cents > 0),
  paid_on TEXT NOT NULL,
  method TEXT NOT NULL,
  reference TEXT,
  created_by INTEGER,
  created_at TEXT NOT NULL
);
CREATE TABLE document_sequences (
  organization_id INTEGER NOT NULL,
  prefix TEXT NOT NULL,
  year INTEGER NOT NULL,
  last_value INTEGER NOT NULL,
  PRIMARY KEY (organization_id, prefix, year)
) WITHOUT ROWID;
CREATE TABLE audit_log (
  id INTEGER PRIMARY KEY,
  organization_id INTEGER NOT NULL,
  user_id INTEGER,
  action TEXT NOT NULL,
  resource TEXT NOT NULL,
  resource_id INTEGER,
  details TEXT NOT NULL DEFAULT '{}',
  request_id TEXT,
  ip_address TEXT,
  created_at TEXT NOT NULL
);
";

fn sql_type(kind: ColumnKind) -> &'static str {
    if kind.is_integer_storage() {
        "INTEGER"
    } else {
        "TEXT"
    }
}

/// `CREATE TABLE` for a descriptor: system columns, then descriptor columns
/// in declaration order, then `extra` verbatim.
#[must_use]
pub fn resource_table_ddl(desc: &ResourceDescriptor, extra: &[&str]) -> String {
    let mut lines = vec![
        "id INTEGER PRIMARY KEY".to_string(),
        "organization_id INTEGER NOT NULL REFERENCES organizations(id)".to_string(),
        "created_by INTEGER".to_string(),
        "created_at TEXT NOT NULL".to_string(),
        "updated_at TEXT NOT NULL".to_string(),
        "deleted_at TEXT".to_string(),
    ];
    for column in desc.columns {
        let mut line = format!("{} {}", column.name, sql_type(column.kind));
        if column.required || column.default.is_some() {
            line.push_str(" NOT NULL");
        }
        if let Some(default) = column.default {
            line.push_str(" DEFAULT ");
            line.push_str(default);
        }
        if let ColumnKind::Reference(table) = column.kind {
            line.push_str(&format!(" REFERENCES {table}(id)"));
        }
        lines.push(line);
    }
    lines.extend(extra.iter().map(|e| (*e).to_string()));
    format!("CREATE TABLE {} (\n  {}\n);\n", desc.table, lines.join(",\n  "))
}

fn all_descriptors() -> impl Iterator<Item = &'static ResourceDescriptor> {
    RESOURCES
        .iter()
        .chain(std::iter::once(&QUOTATION_DAYS))
        .chain(std::iter::once(&QUOTATION_EXPENSES))
}

fn migration_core_tables() -> String {
    let mut sql = SUPPORT_TABLES.to_string();
    for desc in all_descriptors() {
        let extra: &[&str] = if desc.table == "users" {
            USER_EXTRA_COLUMNS
        } else {
            &[]
        };
        sql.push_str(&resource_table_ddl(desc, extra));
    }
    sql
}

fn migration_indexes() -> String {
    let mut sql = String::from(
        "CREATE UNIQUE INDEX idx_users_email_live ON users(email) WHERE deleted_at IS NULL;
CREATE UNIQUE INDEX idx_quotation_days_number ON quotation_days(quotation_id, day_number) WHERE deleted_at IS NULL;
CREATE INDEX idx_audit_log_org_created ON audit_log(organization_id, created_at);
CREATE INDEX idx_invoice_payments_invoice ON invoice_payments(invoice_kind, invoice_id);
",
    );
    for desc in all_descriptors() {
        sql.push_str(&format!(
            "CREATE INDEX idx_{t}_tenant ON {t}(organization_id, deleted_at);\n",
            t = desc.table
        ));
        if let Some(parent) = desc.season_parent {
            sql.push_str(&format!(
                "CREATE INDEX idx_{t}_season ON {t}(organization_id, {parent}, start_date, end_date);\n",
                t = desc.table
            ));
        }
        if let Some((_, column)) = desc.number_prefix {
            sql.push_str(&format!(
                "CREATE UNIQUE INDEX idx_{t}_{column} ON {t}(organization_id, {column});\n",
                t = desc.table
            ));
        }
    }
    sql
}

struct Migration {
    version: i64,
    name: &'static str,
    sql: fn() -> String,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "core_tables",
        sql: migration_core_tables,
    },
    Migration {
        version: 2,
        name: "indexes",
        sql: migration_indexes,
    },
];

/// Applies every migration not yet recorded in `schema_migrations`, each in
/// its own transaction. Returns how many were applied.
pub fn migrate(conn: &mut Connection, clock: &dyn Clock) -> Result<usize, StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
           version INTEGER PRIMARY KEY,
           name TEXT NOT NULL,
           applied_at TEXT NOT NULL
         );",
    )?;
    let applied: BTreeSet<i64> = {
        let mut stmt = conn.prepare("SELECT version FROM schema_migrations")?;
        let rows = stmt.query_map([], |r| r.get::<_, i64>(0))?;
        rows.collect::<Result<_, _>>()?
    };
    let mut count = 0;
    for migration in MIGRATIONS.iter().filter(|m| !applied.contains(&m.version)) {
        let tx = conn.transaction()?;
        tx.execute_batch(&(migration.sql)())?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            params![migration.version, migration.name, clock.now_rfc3339()],
        )?;
        tx.commit()?;
        info!(version = migration.version, name = migration.name, "migration applied");
        count += 1;
    }
    Ok(count)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingColumn {
    pub table: String,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaReport {
    pub ok: bool,
    pub schema_version: i64,
    pub applied_migrations: Vec<i64>,
    pub tables: BTreeMap<String, Vec<String>>,
    pub missing_tables: Vec<String>,
    pub missing_columns: Vec<MissingColumn>,
}

fn expected_tables() -> BTreeMap<String, Vec<String>> {
    let mut out = BTreeMap::new();
    for desc in all_descriptors() {
        let mut columns: Vec<String> = SYSTEM_COLUMNS.iter().map(|c| (*c).to_string()).collect();
        columns.extend(desc.columns.iter().map(|c| c.name.to_string()));
        if desc.table == "users" {
            columns.push("password_hash".to_string());
        }
        out.insert(desc.table.to_string(), columns);
    }
    for (table, columns) in [
        ("organizations", &["id", "name", "slug"][..]),
        (
            "invoice_payments",
            &["id", "organization_id", "invoice_kind", "invoice_id", "amount_cents", "paid_on"][..],
        ),
        ("document_sequences", &["organization_id", "prefix", "year", "last_value"][..]),
        (
            "audit_log",
            &["id", "organization_id", "user_id", "action", "resource", "created_at"][..],
        ),
        ("schema_migrations", &["version", "name", "applied_at"][..]),
    ] {
        out.insert(
            table.to_string(),
            columns.iter().map(|c| (*c).to_string()).collect(),
        );
    }
    out
}

/// Compares the live database against the tables and columns the code expects.
pub fn check_schema(conn: &Connection) -> Result<SchemaReport, StoreError> {
    let mut tables: BTreeMap<String, Vec<String>> = BTreeMap::new();
    {
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        for name in names {
            let mut info = conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
            let columns = info
                .query_map([&name], |r| r.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            tables.insert(name, columns);
        }
    }
    let applied_migrations = {
        let mut stmt = conn.prepare("SELECT version FROM schema_migrations ORDER BY version")?;
        let rows = stmt.query_map([], |r| r.get::<_, i64>(0))?;
        rows.collect::<Result<Vec<_>, _>>()?
    };

    let mut missing_tables = Vec::new();
    let mut missing_columns = Vec::new();
    for (table, expected) in expected_tables() {
        match tables.get(&table) {
            None => missing_tables.push(table),
            Some(actual) => {
                for column in expected.into_iter().filter(|c| !actual.contains(c)) {
                    missing_columns.push(MissingColumn {
                        table: table.clone(),
                        column,
                    });
                }
            }
        }
    }
    Ok(SchemaReport {
        ok: missing_tables.is_empty()
            && missing_columns.is_empty()
            && applied_migrations.last() == Some(&SCHEMA_VERSION),
        schema_version: SCHEMA_VERSION,
        applied_migrations,
        tables,
        missing_tables,
        missing_columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tourcrm_core::FixedClock;
    use tourcrm_model::resource_by_route;

    #[test]
    fn ddl_carries_defaults_and_references() {
        let desc = resource_by_route("quotations").expect("quotations");
        let ddl = resource_table_ddl(desc, &[]);
        assert!(ddl.starts_with("CREATE TABLE quotations ("));
        assert!(ddl.contains("status TEXT NOT NULL DEFAULT 'draft'"));
        assert!(ddl.contains("client_id INTEGER NOT NULL REFERENCES clients(id)"));
        assert!(ddl.contains("agent_id INTEGER REFERENCES agents(id)"));
    }

    #[test]
    fn migrations_apply_once_and_schema_checks_clean() {
        let mut conn = Connection::open_in_memory().expect("memory db");
        let clock = FixedClock::at_date(2025, 1, 1);
        assert_eq!(migrate(&mut conn, &clock).expect("first run"), MIGRATIONS.len());
        assert_eq!(migrate(&mut conn, &clock).expect("second run"), 0);
        let report = check_schema(&conn).expect("check");
        assert!(report.ok, "{report:?}");
        assert_eq!(report.applied_migrations, vec![1, 2]);
    }

    #[test]
    fn dropped_table_is_reported() {
        let mut conn = Connection::open_in_memory().expect("memory db");
        migrate(&mut conn, &FixedClock::at_date(2025, 1, 1)).expect("migrate");
        conn.execute_batch("DROP TABLE transfers;").expect("drop");
        let report = check_schema(&conn).expect("check");
        assert!(!report.ok);
        assert_eq!(report.missing_tables, vec!["transfers".to_string()]);
    }
}
