// SPDX-License-Identifier: Apache-2.0

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tourcrm_core::money::{parse_money, parse_percent};

use crate::resource::{ColumnKind, ColumnSpec, ResourceDescriptor};

/// Storage-level value; the store binds these as SQL parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    #[must_use]
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

static EMAIL_RE: OnceLock<Option<Regex>> = OnceLock::new();
static PHONE_RE: OnceLock<Option<Regex>> = OnceLock::new();
static DECIMAL_RE: OnceLock<Option<Regex>> = OnceLock::new();

/// A pattern that fails to compile matches nothing.
fn matches(cell: &OnceLock<Option<Regex>>, pattern: &str, text: &str) -> bool {
    cell.get_or_init(|| Regex::new(pattern).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(text))
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    if raw.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

fn text_of<'a>(field: &str, value: &'a Value, what: &str) -> Result<&'a str, FieldError> {
    value
        .as_str()
        .ok_or_else(|| FieldError::new(field, format!("must be {what}")))
}

/// Converts one JSON body value into its storage form.
pub fn validate_value(column: &ColumnSpec, value: &Value) -> Result<SqlValue, FieldError> {
    let field = column.name;
    if value.is_null() {
        if column.required {
            return Err(FieldError::new(field, "is required"));
        }
        if column.default.is_some() {
            return Err(FieldError::new(field, "must not be null"));
        }
        return Ok(SqlValue::Null);
    }
    match column.kind {
        ColumnKind::Text { max_len } => {
            let text = text_of(field, value, "a string")?.trim();
            if column.required && text.is_empty() {
                return Err(FieldError::new(field, "must not be empty"));
            }
            if text.chars().count() > max_len {
                return Err(FieldError::new(
                    field,
                    format!("must be at most {max_len} characters"),
                ));
            }
            Ok(SqlValue::Text(text.to_string()))
        }
        ColumnKind::Email => {
            let text = text_of(field, value, "a string")?.trim();
            if text.len() > 254 || !matches(&EMAIL_RE, r"^[^\s@]+@[^\s@]+\.[^\s@]+$", text) {
                return Err(FieldError::new(field, "must be a valid email address"));
            }
            Ok(SqlValue::Text(text.to_ascii_lowercase()))
        }
        ColumnKind::Phone => {
            let text = text_of(field, value, "a string")?.trim();
            if !matches(&PHONE_RE, r"^\+?[0-9 ()\-]{5,32}$", text) {
                return Err(FieldError::new(field, "must be a valid phone number"));
            }
            Ok(SqlValue::Text(text.to_string()))
        }
        ColumnKind::Integer { min, max } => {
            let n = value
                .as_i64()
                .ok_or_else(|| FieldError::new(field, "must be an integer"))?;
            if n < min || n > max {
                return Err(FieldError::new(
                    field,
                    format!("must be between {min} and {max}"),
                ));
            }
            Ok(SqlValue::Integer(n))
        }
        ColumnKind::Money => {
            let cents = match value {
                Value::Number(n) => n
                    .as_i64()
                    .ok_or_else(|| FieldError::new(field, "must be integer cents"))?,
                Value::String(s) => parse_money(s).map_err(|e| FieldError::new(field, e.to_string()))?,
                _ => return Err(FieldError::new(field, "must be integer cents or a decimal string")),
            };
            if cents < 0 {
                return Err(FieldError::new(field, "must not be negative"));
            }
            Ok(SqlValue::Integer(cents))
        }
        ColumnKind::Percent => {
            let bp = match value {
                Value::Number(n) => n
                    .as_i64()
                    .ok_or_else(|| FieldError::new(field, "must be integer basis points"))?,
                Value::String(s) => {
                    parse_percent(s).map_err(|e| FieldError::new(field, e.to_string()))?
                }
                _ => return Err(FieldError::new(field, "must be basis points or a decimal string")),
            };
            if !(0..=100_000).contains(&bp) {
                return Err(FieldError::new(field, "must be between 0 and 1000 percent"));
            }
            Ok(SqlValue::Integer(bp))
        }
        ColumnKind::Decimal => {
            let text = match value {
                Value::String(s) => s.trim().to_string(),
                Value::Number(n) => n.to_string(),
                _ => return Err(FieldError::new(field, "must be a decimal number")),
            };
            let zero = text.bytes().all(|b| b == b'0' || b == b'.');
            if zero || !matches(&DECIMAL_RE, r"^[0-9]{1,12}(\.[0-9]{1,6})?$", &text) {
                return Err(FieldError::new(
                    field,
                    "must be a positive decimal with at most 6 fraction digits",
                ));
            }
            Ok(SqlValue::Text(text))
        }
        ColumnKind::Date => {
            let text = text_of(field, value, "a date string")?;
            let date = parse_date(text)
                .ok_or_else(|| FieldError::new(field, "must be a date in YYYY-MM-DD format"))?;
            Ok(SqlValue::Text(date.format("%Y-%m-%d").to_string()))
        }
        ColumnKind::Bool => value
            .as_bool()
            .map(|b| SqlValue::Integer(i64::from(b)))
            .ok_or_else(|| FieldError::new(field, "must be a boolean")),
        ColumnKind::Enum(allowed) => {
            let text = text_of(field, value, "a string")?;
            if !allowed.contains(&text) {
                return Err(FieldError::new(
                    field,
                    format!("must be one of: {}", allowed.join(", ")),
                ));
            }
            Ok(SqlValue::Text(text.to_string()))
        }
        ColumnKind::Currency => {
            let text = text_of(field, value, "a currency code")?;
            if text.len() != 3 || !text.bytes().all(|b| b.is_ascii_uppercase()) {
                return Err(FieldError::new(field, "must be a three-letter ISO 4217 code"));
            }
            Ok(SqlValue::Text(text.to_string()))
        }
        ColumnKind::Reference(_) => {
            let id = value
                .as_i64()
                .filter(|id| *id > 0)
                .ok_or_else(|| FieldError::new(field, "must be a positive integer id"))?;
            Ok(SqlValue::Integer(id))
        }
        ColumnKind::Json => serde_json::to_string(value)
            .map(SqlValue::Text)
            .map_err(|e| FieldError::new(field, e.to_string())),
    }
}

/// Validates a create (`partial = false`) or update (`partial = true`) body
/// against a descriptor. Unknown keys and read-only columns are rejected;
/// all problems are reported together.
pub fn validate_body(
    desc: &ResourceDescriptor,
    body: &Map<String, Value>,
    partial: bool,
) -> Result<Vec<(&'static str, SqlValue)>, Vec<FieldError>> {
    let mut errors = Vec::new();
    let mut assignments = Vec::new();
    for key in body.keys() {
        match desc.column(key) {
            None => errors.push(FieldError::new(key, "is not a known field")),
            Some(column) if !column.writable => {
                errors.push(FieldError::new(key, "is read-only"));
            }
            Some(_) => {}
        }
    }
    for column in desc.columns.iter().filter(|c| c.writable) {
        match body.get(column.name) {
            Some(value) => match validate_value(column, value) {
                Ok(v) => assignments.push((column.name, v)),
                Err(e) => errors.push(e),
            },
            None if column.required && !partial => {
                errors.push(FieldError::new(column.name, "is required"));
            }
            None => {}
        }
    }
    if partial && assignments.is_empty() && errors.is_empty() {
        errors.push(FieldError::new("body", "must contain at least one field"));
    }
    if errors.is_empty() {
        Ok(assignments)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::resource_by_route;
    use serde_json::json;

    fn clients() -> &'static ResourceDescriptor {
        resource_by_route("clients").expect("clients")
    }

    #[test]
    fn money_accepts_cents_and_decimal_strings() {
        let column = ColumnSpec::money("price_cents");
        assert_eq!(validate_value(&column, &json!(1250)), Ok(SqlValue::Integer(1250)));
        assert_eq!(validate_value(&column, &json!("12.50")), Ok(SqlValue::Integer(1250)));
        assert!(validate_value(&column, &json!(-1)).is_err());
        assert!(validate_value(&column, &json!(12.5)).is_err());
    }

    #[test]
    fn dates_must_be_real_calendar_days() {
        let column = ColumnSpec::date("start_date");
        assert!(validate_value(&column, &json!("2025-02-29")).is_err());
        assert!(validate_value(&column, &json!("2025-2-01")).is_err());
        assert_eq!(
            validate_value(&column, &json!("2024-02-29")),
            Ok(SqlValue::Text("2024-02-29".into()))
        );
    }

    #[test]
    fn email_is_lowercased_and_checked() {
        let column = ColumnSpec::email("email");
        assert_eq!(
            validate_value(&column, &json!(" Ana@Example.COM ")),
            Ok(SqlValue::Text("ana@example.com".into()))
        );
        assert!(validate_value(&column, &json!("ana@")).is_err());
    }

    #[test]
    fn decimal_rate_rejects_zero_and_excess_precision() {
        let column = ColumnSpec::decimal("rate");
        assert_eq!(validate_value(&column, &json!("1.0825")), Ok(SqlValue::Text("1.0825".into())));
        assert!(validate_value(&column, &json!("0.000")).is_err());
        assert!(validate_value(&column, &json!("1.1234567")).is_err());
    }

    #[test]
    fn create_body_reports_every_problem() {
        let body = json!({"email": "bad", "colour": "red"});
        let errors = validate_body(clients(), body.as_object().expect("object"), false)
            .expect_err("invalid");
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"colour"));
        assert!(fields.contains(&"email"));
        assert!(fields.contains(&"name"));
    }

    #[test]
    fn update_body_may_be_partial_but_not_empty() {
        let ok = json!({"phone": "+90 212 555 0101"});
        let assignments =
            validate_body(clients(), ok.as_object().expect("object"), true).expect("valid");
        assert_eq!(assignments.len(), 1);
        let empty = json!({});
        assert!(validate_body(clients(), empty.as_object().expect("object"), true).is_err());
    }

    #[test]
    fn read_only_columns_are_refused() {
        let quotations = resource_by_route("quotations").expect("quotations");
        let body = json!({"status": "accepted"});
        let errors = validate_body(quotations, body.as_object().expect("object"), true)
            .expect_err("read-only");
        assert_eq!(errors[0].message, "is read-only");
    }
}
