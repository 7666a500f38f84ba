//! Normalization of raw provider output into the canonical model.
//!
//! Every monetary and line-item numeric field runs through the locale-aware
//! parser. Unparseable values stay `None` so validation flags them — with
//! one exception: an unparseable `total_amount` becomes `0.00`, an explicit
//! and logged decision that keeps garbage out of persisted records while
//! still tripping the grand-total check.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::warn;

use crate::core::{
    CanonicalInvoice, DocumentTypeCode, ElectronicAddress, FormatId, LineItem, MonetaryTotals,
    PaymentDetails, Period, TaxCategoryCode, TradeParty, parse_decimal_value,
};

/// Build a [`CanonicalInvoice`] from the provider's raw field object.
pub fn normalize_extracted(fields: &Value, format: FormatId) -> CanonicalInvoice {
    let mut invoice = CanonicalInvoice::new(format);

    invoice.invoice_number = str_field(fields, "invoice_number").unwrap_or_default();
    invoice.issue_date = str_field(fields, "issue_date").as_deref().and_then(parse_date);
    if let Some(currency) = str_field(fields, "currency") {
        invoice.currency_code = currency.to_uppercase();
    }
    invoice.type_code = fields
        .get("document_type")
        .and_then(Value::as_u64)
        .and_then(|c| u16::try_from(c).ok())
        .and_then(DocumentTypeCode::from_code)
        .unwrap_or_default();
    invoice.buyer_reference = str_field(fields, "buyer_reference");
    invoice.notes = match fields.get("notes") {
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    };
    invoice.preceding_invoice = str_field(fields, "preceding_invoice");
    invoice.billing_period = parse_period(fields.get("billing_period"));

    invoice.seller = normalize_party(fields.get("seller"));
    invoice.buyer = normalize_party(fields.get("buyer"));
    invoice.payment = normalize_payment(fields.get("payment"));

    invoice.lines = fields
        .get("line_items")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(normalize_line).collect())
        .unwrap_or_default();

    invoice.totals = MonetaryTotals {
        subtotal: decimal_field(fields, "subtotal"),
        tax_amount: decimal_field(fields, "tax_amount"),
        total_amount: None,
    };
    invoice.totals.total_amount = match decimal_field(fields, "total_amount") {
        Some(total) => Some(total),
        None => {
            let raw = fields.get("total_amount").unwrap_or(&Value::Null);
            warn!(
                raw = %raw,
                "total_amount unparseable, defaulting to 0"
            );
            Some(Decimal::ZERO)
        }
    };

    // An array here means the document mixes rates; per-line rates carry
    // that information, the scalar stays unset.
    invoice.document_tax_rate = decimal_field(fields, "tax_rate");

    invoice
}

fn str_field(fields: &Value, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn decimal_field(fields: &Value, key: &str) -> Option<Decimal> {
    fields.get(key).and_then(|v| parse_decimal_value(v))
}

/// Parse the date formats extraction realistically produces.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    for format in ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y", "%Y%m%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }
    None
}

fn parse_period(value: Option<&Value>) -> Option<Period> {
    let period = value?;
    let start = period.get("start").and_then(Value::as_str).and_then(parse_date)?;
    let end = period.get("end").and_then(Value::as_str).and_then(parse_date)?;
    Some(Period { start, end })
}

fn normalize_party(value: Option<&Value>) -> TradeParty {
    let Some(party) = value else {
        return TradeParty::default();
    };

    let address_lines = match party.get("address_lines") {
        Some(Value::Array(lines)) => lines
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect(),
        _ => str_field(party, "address").into_iter().collect(),
    };

    TradeParty {
        name: str_field(party, "name").unwrap_or_default(),
        email: str_field(party, "email"),
        address_lines,
        city: str_field(party, "city"),
        postal_code: str_field(party, "postal_code"),
        country_code: str_field(party, "country").map(|c| c.to_uppercase()),
        vat_id: str_field(party, "vat_id"),
        tax_number: str_field(party, "tax_number"),
        electronic_address: party.get("electronic_address").and_then(|ea| {
            Some(ElectronicAddress {
                scheme: str_field(ea, "scheme")?,
                value: str_field(ea, "value")?,
            })
        }),
        contact_name: str_field(party, "contact"),
        phone: str_field(party, "phone"),
    }
}

fn normalize_payment(value: Option<&Value>) -> PaymentDetails {
    let Some(payment) = value else {
        return PaymentDetails::default();
    };
    PaymentDetails {
        iban: str_field(payment, "iban").map(|i| i.replace(' ', "")),
        bic: str_field(payment, "bic"),
        terms: str_field(payment, "terms"),
        due_date: str_field(payment, "due_date").as_deref().and_then(parse_date),
    }
}

fn normalize_line(value: &Value) -> LineItem {
    LineItem {
        description: str_field(value, "description").unwrap_or_default(),
        quantity: decimal_field(value, "quantity"),
        unit_price: decimal_field(value, "unit_price"),
        total_price: decimal_field(value, "total_price"),
        tax_rate: decimal_field(value, "tax_rate"),
        tax_category: value
            .get("tax_category")
            .and_then(Value::as_str)
            .and_then(TaxCategoryCode::from_code),
        unit_code: str_field(value, "unit"),
    }
}
