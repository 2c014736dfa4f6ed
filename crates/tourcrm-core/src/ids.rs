// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Tenant key carried in `organization_id` columns and the `X-Tenant-Id` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct OrganizationId(i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct UserId(i64);

/// Primary key of any tenant-scoped row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct RecordId(i64);

fn validate_id(kind: &'static str, value: i64) -> Result<()> {
    if value <= 0 {
        return Err(Error::InvalidIdentifier {
            kind,
            value: value.to_string(),
            reason: "must be a positive integer",
        });
    }
    Ok(())
}

fn parse_id(kind: &'static str, raw: &str) -> Result<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidIdentifier {
            kind,
            value: raw.to_owned(),
            reason: "must not be empty",
        });
    }
    if trimmed.len() > 19 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidIdentifier {
            kind,
            value: raw.to_owned(),
            reason: "must contain only decimal digits",
        });
    }
    trimmed.parse::<i64>().map_err(|_| Error::InvalidIdentifier {
        kind,
        value: raw.to_owned(),
        reason: "out of range",
    })
}

macro_rules! impl_id {
    ($name:ident, $kind:literal) => {
        impl $name {
            pub fn new(value: i64) -> Result<Self> {
                validate_id($kind, value)?;
                Ok(Self(value))
            }

            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for i64 {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl TryFrom<i64> for $name {
            type Error = Error;

            fn try_from(value: i64) -> Result<Self> {
                Self::new(value)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Self::new(parse_id($kind, s)?)
            }
        }
    };
}

impl_id!(OrganizationId, "organization_id");
impl_id!(UserId, "user_id");
impl_id!(RecordId, "id");
