//! Locale-aware numeric normalization.
//!
//! Extracted invoice amounts arrive as strings in whatever convention the
//! source document used — `1.234.567,89` (European), `1,234,567.89`
//! (Anglo), bare `1234567.89` — or as JSON numbers. The parser here decides
//! which separator is the decimal mark from separator positions alone and
//! reports unparseable input as `None`; it never substitutes a business
//! default.

use rust_decimal::Decimal;
use std::str::FromStr;

/// Parse a locale-ambiguous numeric string into a [`Decimal`].
///
/// Disambiguation scans for the last-occurring `.` and `,`:
///
/// - Both present, `,` after the last `.` — `,` is the decimal mark and
///   every `.` groups thousands (`"1.234.567,89"` → `1234567.89`); the
///   reverse order means Anglo grouping (`"1,234,567.89"` → `1234567.89`).
/// - Only `,` — decimal mark when followed by exactly 1–2 trailing digits
///   (`"100,50"` → `100.5`), otherwise a thousands separator (`"1,234"` →
///   `1234`).
/// - Only `.` — treated as a standard decimal point. A thousands-grouped
///   European integer such as `"1.234"` therefore parses as `1.234`; the
///   correct reading needs currency-precision context this parser does not
///   have, so the ambiguity is documented rather than guessed at.
///
/// Input is trimmed first. Empty or non-numeric input yields `None` — the
/// caller decides what absence means.
pub fn parse_decimal_str(value: &str) -> Option<Decimal> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    let last_dot = trimmed.rfind('.');
    let last_comma = trimmed.rfind(',');

    let normalized = match (last_dot, last_comma) {
        (Some(dot), Some(comma)) => {
            if comma > dot {
                // European: dots group thousands, comma is the decimal mark
                trimmed.replace('.', "").replace(',', ".")
            } else {
                // Anglo: commas group thousands
                trimmed.replace(',', "")
            }
        }
        (None, Some(comma)) => {
            let tail = &trimmed[comma + 1..];
            let single_comma = trimmed.matches(',').count() == 1;
            if single_comma
                && (1..=2).contains(&tail.len())
                && tail.bytes().all(|b| b.is_ascii_digit())
            {
                trimmed.replace(',', ".")
            } else {
                trimmed.replace(',', "")
            }
        }
        _ => trimmed.to_string(),
    };

    Decimal::from_str(&normalized)
        .or_else(|_| Decimal::from_scientific(&normalized))
        .ok()
}

/// Parse a raw JSON field into a [`Decimal`].
///
/// Numbers pass through unchanged; strings go through
/// [`parse_decimal_str`]; `null` and anything non-scalar yield `None`.
/// An array value (some providers emit `[19, 7]` for a mixed-rate
/// document) also yields `None` — "not representable at this granularity",
/// not an error.
pub fn parse_decimal_value(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::Number(n) => {
            let s = n.to_string();
            Decimal::from_str(&s)
                .or_else(|_| Decimal::from_scientific(&s))
                .ok()
        }
        serde_json::Value::String(s) => parse_decimal_str(s),
        _ => None,
    }
}
