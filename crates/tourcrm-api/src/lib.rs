// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! Wire contract of the HTTP API: the error envelope and its status mapping,
//! list query parsing, the paged response envelope and the OpenAPI document.
//! This crate never touches the database or the async runtime.

pub mod error_mapping;
pub mod errors;
pub mod openapi;
pub mod params;
pub mod responses;

pub use error_mapping::{map_error, status_for, ApiErrorMapping, API_ERROR_SCHEMA_REF};
pub use errors::{ApiError, ErrorCode};
pub use openapi::openapi_v1_spec;
pub use params::{
    allowed_list_params, parse_list_params, parse_report_range, ListParams, ReportRange,
    MAX_IN_VALUES, PAGING_PARAMS,
};
pub use responses::{build_list_response, encode_component, ApiResponseEnvelope};

pub const CRATE_NAME: &str = "tourcrm-api";
