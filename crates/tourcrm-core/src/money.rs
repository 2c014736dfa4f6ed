// SPDX-License-Identifier: Apache-2.0

//! Money is carried as integer minor units (cents). Percentages are carried
//! as basis points so `12.5%` is `1250`.

use crate::error::{Error, Result};

pub const BASIS_POINTS_PER_UNIT: i64 = 10_000;

/// Parses a decimal amount into cents. Accepts at most two fraction digits.
pub fn parse_money(raw: &str) -> Result<i64> {
    let invalid = |reason: &'static str| Error::InvalidMoney {
        value: raw.to_owned(),
        reason,
    };
    let text = raw.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (whole, frac) = match digits.split_once('.') {
        Some((w, f)) => (w, Some(f)),
        None => (digits, None),
    };
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("expected digits before the decimal point"));
    }
    let frac_cents = match frac {
        None => 0,
        Some(f) if f.is_empty() || !f.bytes().all(|b| b.is_ascii_digit()) => {
            return Err(invalid("expected digits after the decimal point"));
        }
        Some(f) if f.len() > 2 => return Err(invalid("at most two decimal places")),
        Some(f) if f.len() == 1 => i64::from(f.as_bytes()[0] - b'0') * 10,
        Some(f) => i64::from(f.as_bytes()[0] - b'0') * 10 + i64::from(f.as_bytes()[1] - b'0'),
    };
    let units: i64 = whole.parse().map_err(|_| invalid("amount out of range"))?;
    let cents = units
        .checked_mul(100)
        .and_then(|c| c.checked_add(frac_cents))
        .ok_or_else(|| invalid("amount out of range"))?;
    Ok(if negative { -cents } else { cents })
}

/// Same as [`parse_money`] for percentages: `"12.5"` becomes `1250` basis points.
pub fn parse_percent(raw: &str) -> Result<i64> {
    parse_money(raw)
}

#[must_use]
pub fn currency_symbol(code: &str) -> Option<&'static str> {
    match code {
        "EUR" => Some("€"),
        "USD" => Some("$"),
        "GBP" => Some("£"),
        "TRY" => Some("₺"),
        _ => None,
    }
}

/// Renders cents as `€1,234.50`, `-$3.05`, or `1,000.00 CHF` for codes
/// without a known symbol.
#[must_use]
pub fn format_money(cents: i64, currency: &str) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    let amount = format!("{}.{:02}", group_thousands(abs / 100), abs % 100);
    match currency_symbol(currency) {
        Some(symbol) => format!("{sign}{symbol}{amount}"),
        None => format!("{sign}{amount} {currency}"),
    }
}

/// Plain decimal rendering without grouping or symbol: `-1234` cents is `-12.34`.
#[must_use]
pub fn cents_to_decimal(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// `cents * basis_points / 10000`, rounded half away from zero.
#[must_use]
pub fn apply_percent(cents: i64, basis_points: i64) -> i64 {
    let product = i128::from(cents) * i128::from(basis_points);
    let divisor = i128::from(BASIS_POINTS_PER_UNIT);
    let quotient = product / divisor;
    let remainder = product % divisor;
    let rounded = if remainder.abs() * 2 >= divisor {
        quotient + product.signum()
    } else {
        quotient
    };
    i64::try_from(rounded).unwrap_or(if rounded > 0 { i64::MAX } else { i64::MIN })
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_whole_and_fractional_forms() {
        assert_eq!(parse_money("12").expect("whole"), 1200);
        assert_eq!(parse_money("12.5").expect("one digit"), 1250);
        assert_eq!(parse_money("12.05").expect("two digits"), 1205);
        assert_eq!(parse_money("-3.05").expect("negative"), -305);
        assert_eq!(parse_money(" 0 ").expect("zero"), 0);
    }

    #[test]
    fn parse_rejects_malformed_amounts() {
        for raw in ["", "-", "1.", ".5", "1.234", "1,000", "abc", "1e3", "99999999999999999999"] {
            assert!(parse_money(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn format_groups_thousands_and_places_sign_before_symbol() {
        assert_eq!(format_money(123_450, "EUR"), "€1,234.50");
        assert_eq!(format_money(-123_450, "EUR"), "-€1,234.50");
        assert_eq!(format_money(5, "USD"), "$0.05");
        assert_eq!(format_money(100_000_000, "GBP"), "£1,000,000.00");
        assert_eq!(format_money(99_900, "TRY"), "₺999.00");
        assert_eq!(format_money(100_000, "CHF"), "1,000.00 CHF");
    }

    #[test]
    fn percent_rounds_half_away_from_zero() {
        assert_eq!(apply_percent(10_000, 1_500), 1_500);
        assert_eq!(apply_percent(333, 5_000), 167);
        assert_eq!(apply_percent(-333, 5_000), -167);
        assert_eq!(apply_percent(101, 1_000), 10);
        assert_eq!(apply_percent(0, 2_000), 0);
    }

    #[test]
    fn decimal_rendering_keeps_two_places() {
        assert_eq!(cents_to_decimal(1205), "12.05");
        assert_eq!(cents_to_decimal(-7), "-0.07");
    }
}
