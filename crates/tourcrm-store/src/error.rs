// SPDX-License-Identifier: Apache-2.0

use std::fmt::{Display, Formatter};

use rusqlite::ErrorCode;
use tourcrm_model::FieldError;

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreError {
    NotFound {
        resource: String,
        id: i64,
    },
    Validation(Vec<FieldError>),
    Conflict {
        message: String,
        conflicting_id: Option<i64>,
    },
    InvalidTransition(String),
    InvalidCredentials,
    Sql(String),
    Pool(String),
}

impl StoreError {
    #[must_use]
    pub fn not_found(resource: &str, id: i64) -> Self {
        Self::NotFound {
            resource: resource.to_string(),
            id,
        }
    }

    #[must_use]
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { resource, id } => write!(f, "{resource} {id} not found"),
            Self::Validation(errors) => {
                let joined: Vec<String> = errors
                    .iter()
                    .map(|e| format!("{} {}", e.field, e.message))
                    .collect();
                write!(f, "validation failed: {}", joined.join("; "))
            }
            Self::Conflict { message, .. } => f.write_str(message),
            Self::InvalidTransition(message) => f.write_str(message),
            Self::InvalidCredentials => f.write_str("invalid email or password"),
            Self::Sql(message) => write!(f, "database error: {message}"),
            Self::Pool(message) => write!(f, "connection pool error: {message}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(code, message) = &value {
            if code.code == ErrorCode::ConstraintViolation
                && message.as_deref().is_some_and(|m| m.contains("UNIQUE"))
            {
                return Self::Conflict {
                    message: "a record with the same unique values already exists".to_string(),
                    conflicting_id: None,
                };
            }
        }
        Self::Sql(value.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Sql(format!("json encoding: {value}"))
    }
}
