// SPDX-License-Identifier: Apache-2.0

use proptest::prelude::*;
use tourcrm_core::money::{apply_percent, cents_to_decimal, format_money, parse_money};

proptest! {
    #[test]
    fn decimal_rendering_parses_back(cents in -10_000_000_000i64..10_000_000_000i64) {
        prop_assert_eq!(parse_money(&cents_to_decimal(cents)).expect("parse"), cents);
    }

    #[test]
    fn formatted_amount_never_loses_cents(cents in 0i64..1_000_000_000i64) {
        let text = format_money(cents, "EUR");
        let digits: String = text.chars().filter(char::is_ascii_digit).collect();
        prop_assert_eq!(digits.parse::<i64>().expect("digits"), cents);
    }

    #[test]
    fn full_percentage_is_identity(cents in -1_000_000_000i64..1_000_000_000i64) {
        prop_assert_eq!(apply_percent(cents, 10_000), cents);
        prop_assert_eq!(apply_percent(cents, 0), 0);
    }

    #[test]
    fn percent_is_symmetric_in_sign(cents in 0i64..1_000_000_000i64, bp in 0i64..20_000i64) {
        prop_assert_eq!(apply_percent(-cents, bp), -apply_percent(cents, bp));
    }
}
