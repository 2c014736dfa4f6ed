// SPDX-License-Identifier: Apache-2.0

pub(crate) mod audit_trail;
pub(crate) mod auth;
pub mod errors;
pub mod extract;
pub(crate) mod insights;
pub(crate) mod invoices;
pub(crate) mod quotations;
pub(crate) mod resources;
pub(crate) mod system;
