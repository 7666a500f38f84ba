//! Mathematical cross-validation of a canonical invoice.
//!
//! All checks are read-only and accumulate issues; nothing here throws for
//! a business-rule violation. Tolerances encode acceptable rounding drift,
//! not business flexibility, and are deliberately not configurable.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::error::ValidationIssue;
use super::types::{CanonicalInvoice, LineItem};

/// Per-line tolerance for `unit_price × quantity` vs `total_price`.
const LINE_TOLERANCE: Decimal = dec!(0.02);

/// Tolerance for `Σ(line totals)` vs stated subtotal.
const SUBTOTAL_TOLERANCE: Decimal = dec!(0.05);

/// Per-line contribution to the tax tolerance. Per-line rounding can
/// accumulate, so the effective tolerance is this value × line count.
const TAX_TOLERANCE_PER_LINE: Decimal = dec!(0.02);

/// Tolerance for document-rate tax reconciliation.
const DOCUMENT_TAX_TOLERANCE: Decimal = dec!(0.05);

/// Tolerance for `subtotal + tax` vs stated grand total.
const TOTAL_TOLERANCE: Decimal = dec!(0.05);

/// Result of validating a canonical invoice. Ephemeral — consumed by the
/// retry loop or the review surface, never persisted.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    /// True iff no issues were found.
    pub valid: bool,
    /// Issues in check order.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationOutcome {
    fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        Self {
            valid: issues.is_empty(),
            issues,
        }
    }
}

/// Validate the mathematical consistency of an invoice.
///
/// An invoice without line items short-circuits with exactly one issue —
/// every other check either depends on lines or would drown the reviewer
/// in follow-on noise.
pub fn validate(invoice: &CanonicalInvoice) -> ValidationOutcome {
    if invoice.lines.is_empty() {
        return ValidationOutcome::from_issues(vec![ValidationIssue::new(
            "lines",
            "invoice must contain at least one line item",
        )]);
    }

    let mut issues = Vec::new();

    check_required_fields(invoice, &mut issues);
    check_non_negativity(invoice, &mut issues);

    for (i, line) in invoice.lines.iter().enumerate() {
        check_line(line, i, &mut issues);
    }

    check_subtotal(invoice, &mut issues);
    check_tax(invoice, &mut issues);
    check_grand_total(invoice, &mut issues);

    ValidationOutcome::from_issues(issues)
}

fn check_required_fields(invoice: &CanonicalInvoice, issues: &mut Vec<ValidationIssue>) {
    if invoice.invoice_number.trim().is_empty() {
        issues.push(ValidationIssue::new(
            "invoice_number",
            "invoice number is missing",
        ));
    }
    if invoice.issue_date.is_none() {
        issues.push(ValidationIssue::new(
            "issue_date",
            "issue date is missing or unparseable",
        ));
    }
    if invoice.seller.name.trim().is_empty() {
        issues.push(ValidationIssue::new("seller.name", "seller name is missing"));
    }
    if invoice.buyer.name.trim().is_empty() {
        issues.push(ValidationIssue::new("buyer.name", "buyer name is missing"));
    }
}

fn check_non_negativity(invoice: &CanonicalInvoice, issues: &mut Vec<ValidationIssue>) {
    let totals = [
        ("totals.subtotal", invoice.totals.subtotal),
        ("totals.tax_amount", invoice.totals.tax_amount),
        ("totals.total_amount", invoice.totals.total_amount),
    ];
    for (field, amount) in totals {
        if let Some(v) = amount {
            if v.is_sign_negative() {
                issues.push(ValidationIssue {
                    field: field.into(),
                    message: "amount must not be negative".into(),
                    expected: None,
                    actual: Some(v),
                });
            }
        }
    }
}

fn check_line(line: &LineItem, index: usize, issues: &mut Vec<ValidationIssue>) {
    let prefix = format!("lines[{index}]");

    for (name, amount) in [("unit_price", line.unit_price), ("total_price", line.total_price)] {
        match amount {
            Some(v) if v.is_sign_negative() => issues.push(ValidationIssue {
                field: format!("{prefix}.{name}"),
                message: "amount must not be negative".into(),
                expected: None,
                actual: Some(v),
            }),
            None => issues.push(ValidationIssue::new(
                format!("{prefix}.{name}"),
                "amount is missing or unparseable",
            )),
            _ => {}
        }
    }

    // Per-line reconciliation needs all three values; the missing ones
    // were already reported above.
    if let (Some(qty), Some(unit), Some(total)) =
        (line.quantity, line.unit_price, line.total_price)
    {
        let expected = round2(unit * qty);
        if (expected - total).abs() > LINE_TOLERANCE {
            issues.push(ValidationIssue::mismatch(
                format!("{prefix}.total_price"),
                "unit price × quantity does not match line total",
                expected,
                total,
            ));
        }
    }
}

/// Reconcile `Σ(line totals)` with the stated subtotal.
fn check_subtotal(invoice: &CanonicalInvoice, issues: &mut Vec<ValidationIssue>) {
    let line_sum: Decimal = invoice.lines.iter().filter_map(|l| l.total_price).sum();

    match invoice.totals.subtotal {
        Some(subtotal) => {
            if (line_sum - subtotal).abs() > SUBTOTAL_TOLERANCE {
                issues.push(ValidationIssue::mismatch(
                    "totals.subtotal",
                    "line totals do not sum to subtotal",
                    round2(line_sum),
                    subtotal,
                ));
            }
        }
        None => issues.push(ValidationIssue::new(
            "totals.subtotal",
            "subtotal is missing or unparseable",
        )),
    }
}

/// Tax reconciliation — two mutually exclusive strategies selected by data
/// shape: per-line rates when any line carries a positive rate, otherwise a
/// single document-level rate applied to the subtotal.
fn check_tax(invoice: &CanonicalInvoice, issues: &mut Vec<ValidationIssue>) {
    let has_line_rates = invoice
        .lines
        .iter()
        .any(|l| l.tax_rate.is_some_and(|r| r > Decimal::ZERO));

    if has_line_rates {
        let expected: Decimal = invoice
            .lines
            .iter()
            .filter_map(|l| Some(l.total_price? * l.tax_rate? / dec!(100)))
            .sum();
        let line_count = Decimal::from(invoice.lines.len());
        let tolerance = TAX_TOLERANCE_PER_LINE * line_count;

        match invoice.totals.tax_amount {
            Some(tax) => {
                if (expected - tax).abs() > tolerance {
                    issues.push(ValidationIssue::mismatch(
                        "totals.tax_amount",
                        "per-line tax does not match stated tax amount",
                        round2(expected),
                        tax,
                    ));
                }
            }
            None => issues.push(ValidationIssue::new(
                "totals.tax_amount",
                "tax amount is missing or unparseable",
            )),
        }
    } else if let (Some(rate), Some(subtotal)) =
        (invoice.document_tax_rate, invoice.totals.subtotal)
    {
        let expected = subtotal * rate / dec!(100);
        match invoice.totals.tax_amount {
            Some(tax) => {
                if (expected - tax).abs() > DOCUMENT_TAX_TOLERANCE {
                    issues.push(ValidationIssue::mismatch(
                        "totals.tax_amount",
                        "document-rate tax does not match stated tax amount",
                        round2(expected),
                        tax,
                    ));
                }
            }
            None => issues.push(ValidationIssue::new(
                "totals.tax_amount",
                "tax amount is missing or unparseable",
            )),
        }
    }
}

fn check_grand_total(invoice: &CanonicalInvoice, issues: &mut Vec<ValidationIssue>) {
    match (
        invoice.totals.subtotal,
        invoice.totals.tax_amount,
        invoice.totals.total_amount,
    ) {
        (Some(subtotal), Some(tax), Some(total)) => {
            let expected = subtotal + tax;
            if (expected - total).abs() > TOTAL_TOLERANCE {
                issues.push(ValidationIssue::mismatch(
                    "totals.total_amount",
                    "subtotal + tax does not match total amount",
                    round2(expected),
                    total,
                ));
            }
        }
        (_, _, None) => issues.push(ValidationIssue::new(
            "totals.total_amount",
            "total amount is missing or unparseable",
        )),
        // Missing subtotal/tax already reported by the earlier checks.
        _ => {}
    }
}

/// Round to 2 decimal places using half-up (commercial rounding).
pub(crate) fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn line(qty: Decimal, unit: Decimal, total: Decimal, rate: Decimal) -> LineItem {
        LineItem {
            description: "Item".into(),
            quantity: Some(qty),
            unit_price: Some(unit),
            total_price: Some(total),
            tax_rate: Some(rate),
            ..LineItem::default()
        }
    }

    fn consistent_invoice() -> CanonicalInvoice {
        let mut inv = CanonicalInvoice::new(FormatId::XrechnungUbl);
        inv.invoice_number = "RE-001".into();
        inv.issue_date = NaiveDate::from_ymd_opt(2026, 3, 1);
        inv.seller.name = "ACME GmbH".into();
        inv.buyer.name = "Kunde AG".into();
        inv.lines.push(line(dec!(10), dec!(150), dec!(1500), dec!(19)));
        inv.lines.push(line(dec!(1), dec!(500), dec!(500), dec!(19)));
        inv.totals = MonetaryTotals {
            subtotal: Some(dec!(2000)),
            tax_amount: Some(dec!(380)),
            total_amount: Some(dec!(2380)),
        };
        inv
    }

    #[test]
    fn consistent_invoice_is_valid() {
        let outcome = validate(&consistent_invoice());
        assert!(outcome.valid, "unexpected issues: {:?}", outcome.issues);
        assert!(outcome.issues.is_empty());
    }

    #[test]
    fn empty_lines_short_circuits_with_single_issue() {
        let mut inv = consistent_invoice();
        inv.lines.clear();
        inv.invoice_number.clear(); // would otherwise add a second issue
        let outcome = validate(&inv);
        assert!(!outcome.valid);
        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(outcome.issues[0].field, "lines");
    }

    #[test]
    fn missing_required_fields_are_reported() {
        let mut inv = consistent_invoice();
        inv.invoice_number = "  ".into();
        inv.issue_date = None;
        inv.seller.name.clear();
        inv.buyer.name.clear();
        let outcome = validate(&inv);
        let fields: Vec<_> = outcome.issues.iter().map(|i| i.field.as_str()).collect();
        assert!(fields.contains(&"invoice_number"));
        assert!(fields.contains(&"issue_date"));
        assert!(fields.contains(&"seller.name"));
        assert!(fields.contains(&"buyer.name"));
    }

    #[test]
    fn line_mismatch_reports_rounded_expected() {
        let mut inv = consistent_invoice();
        inv.lines[0].total_price = Some(dec!(1400));
        inv.totals.subtotal = Some(dec!(1900));
        inv.totals.tax_amount = Some(dec!(361));
        inv.totals.total_amount = Some(dec!(2261));
        let outcome = validate(&inv);
        let issue = outcome
            .issues
            .iter()
            .find(|i| i.field == "lines[0].total_price")
            .expect("line mismatch issue");
        assert_eq!(issue.expected, Some(dec!(1500.00)));
        assert_eq!(issue.actual, Some(dec!(1400)));
    }

    #[test]
    fn line_mismatch_within_tolerance_passes() {
        let mut inv = consistent_invoice();
        // 1 cent of rounding drift
        inv.lines[0].total_price = Some(dec!(1500.01));
        inv.totals.subtotal = Some(dec!(2000.01));
        inv.totals.tax_amount = Some(dec!(380));
        inv.totals.total_amount = Some(dec!(2380.01));
        let outcome = validate(&inv);
        assert!(outcome.valid, "unexpected issues: {:?}", outcome.issues);
    }

    #[test]
    fn document_rate_fallback_when_no_line_rates() {
        let mut inv = consistent_invoice();
        for l in &mut inv.lines {
            l.tax_rate = None;
        }
        inv.document_tax_rate = Some(dec!(19));
        assert!(validate(&inv).valid);

        inv.totals.tax_amount = Some(dec!(200));
        inv.totals.total_amount = Some(dec!(2200));
        let outcome = validate(&inv);
        assert!(outcome
            .issues
            .iter()
            .any(|i| i.field == "totals.tax_amount"));
    }

    #[test]
    fn tax_tolerance_scales_with_line_count() {
        let mut inv = consistent_invoice();
        inv.lines.clear();
        // 40 lines of 50.00 at 19%: per-line tax 9.50, total 380.00.
        for _ in 0..40 {
            inv.lines.push(line(dec!(1), dec!(50), dec!(50), dec!(19)));
        }
        // 0.60 drift: outside the fixed 0.05 but inside 0.02 × 40 = 0.80.
        inv.totals = MonetaryTotals {
            subtotal: Some(dec!(2000)),
            tax_amount: Some(dec!(380.60)),
            total_amount: Some(dec!(2380.60)),
        };
        let outcome = validate(&inv);
        assert!(outcome.valid, "unexpected issues: {:?}", outcome.issues);
    }

    #[test]
    fn zeroed_total_amount_is_flagged_as_mismatch() {
        // What normalize does with "N/A": total_amount becomes 0.
        let mut inv = consistent_invoice();
        inv.totals.total_amount = Some(Decimal::ZERO);
        let outcome = validate(&inv);
        let issue = outcome
            .issues
            .iter()
            .find(|i| i.field == "totals.total_amount")
            .expect("total mismatch issue");
        assert_eq!(issue.expected, Some(dec!(2380)));
        assert_eq!(issue.actual, Some(Decimal::ZERO));
    }

    #[test]
    fn negative_amounts_are_flagged() {
        let mut inv = consistent_invoice();
        inv.lines[1].unit_price = Some(dec!(-500));
        inv.totals.tax_amount = Some(dec!(-1));
        let outcome = validate(&inv);
        let fields: Vec<_> = outcome.issues.iter().map(|i| i.field.as_str()).collect();
        assert!(fields.contains(&"lines[1].unit_price"));
        assert!(fields.contains(&"totals.tax_amount"));
    }

    #[test]
    fn missing_line_amounts_are_flagged_not_guessed() {
        let mut inv = consistent_invoice();
        inv.lines[0].total_price = None;
        let outcome = validate(&inv);
        assert!(outcome
            .issues
            .iter()
            .any(|i| i.field == "lines[0].total_price" && i.expected.is_none()));
    }
}
