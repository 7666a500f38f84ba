//! Property-based tests for the locale-aware numeric parser.
//!
//! Run with: `cargo test --test proptest_tests`

#![cfg(feature = "core")]

use einvoice::core::parse_decimal_str;
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Render an integer + cents pair in European notation with dot-grouped
/// thousands: (1234567, 89) -> "1.234.567,89".
fn european(int_part: u64, cents: u8) -> String {
    let digits = int_part.to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    format!("{grouped},{cents:02}")
}

proptest! {
    /// Every European-notation string parses to its dot-decimal value.
    #[test]
    fn european_notation_parses_to_dot_decimal(int_part in 0u64..=999_999_999_999, cents in 0u8..=99) {
        let input = european(int_part, cents);
        let expected = Decimal::from(int_part) + Decimal::new(cents as i64, 2);
        prop_assert_eq!(parse_decimal_str(&input), Some(expected));
    }

    /// A plain dot-decimal string round-trips unchanged.
    #[test]
    fn single_decimal_point_is_identity(int_part in 0u64..=999_999_999_999, frac in 0u32..=999_999) {
        let input = format!("{int_part}.{frac:06}");
        let expected = Decimal::from(int_part) + Decimal::new(frac as i64, 6);
        prop_assert_eq!(parse_decimal_str(&input), Some(expected));
    }

    /// Whitespace padding never changes the result.
    #[test]
    fn padding_is_irrelevant(int_part in 0u64..=999_999, cents in 0u8..=99, pad in 0usize..=4) {
        let bare = european(int_part, cents);
        let padded = format!("{}{}{}", " ".repeat(pad), bare, " ".repeat(pad));
        prop_assert_eq!(parse_decimal_str(&padded), parse_decimal_str(&bare));
    }

    /// The parser never panics, whatever the input.
    #[test]
    fn never_panics(input in "\\PC{0,40}") {
        let _ = parse_decimal_str(&input);
    }
}
