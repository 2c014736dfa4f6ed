// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! SQLite persistence for the CRM: schema and migrations, tenant-scoped
//! CRUD over the resource descriptors, the quotation and invoice workflows,
//! credentials, the audit trail and read-only reporting.

pub mod audit;
pub mod auth;
pub mod crud;
pub mod dashboard;
mod error;
pub mod finance;
pub mod invoices;
pub mod numbering;
mod pool;
pub mod quotations;
pub mod reports;
mod row;
pub mod schema;
pub mod suppliers;

pub use audit::{append_audit, audit_action, list_audit, AuditEntry, AuditFilter, AuditVerb};
pub use auth::{AuthUser, NewUser, Organization, MIN_PASSWORD_LEN};
pub use error::StoreError;
pub use invoices::{InvoiceKind, PaymentInput, PaymentRecorded, PAYMENT_METHODS};
pub use pool::{Ctx, SqliteStore, StoreConfig};
pub use quotations::{ExpenseChange, QuotationTotals, StatusChange};
pub use reports::{run_report, DateRange, REPORT_NAMES};
pub use row::{int_field, text_field, Page, Row};
pub use schema::{check_schema, SchemaReport, SCHEMA_VERSION};

pub const CRATE_NAME: &str = "tourcrm-store";
