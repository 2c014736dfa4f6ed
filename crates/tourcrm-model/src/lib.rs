// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! Domain vocabulary shared by the store, the wire contract and the server:
//! roles and the permission matrix, workflow statuses, and the static
//! descriptors that drive generic tenant-scoped CRUD.

mod access;
mod resource;
mod status;
mod value;

pub use access::{Action, PermissionResource, Role};
pub use resource::{
    resource_by_name, resource_by_route, ColumnKind, ColumnSpec, ResourceDescriptor,
    EXPENSE_CATEGORIES, QUOTATION_DAYS, QUOTATION_EXPENSES, RESOURCES, SYSTEM_COLUMNS,
};
pub use status::{BookingStatus, InvoiceStatus, ParseError, QuotationStatus, RequestStatus};
pub use value::{parse_date, validate_body, validate_value, FieldError, SqlValue};

pub const CRATE_NAME: &str = "tourcrm-model";
