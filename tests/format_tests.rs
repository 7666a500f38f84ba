#![cfg(feature = "formats")]

use chrono::NaiveDate;
use einvoice::core::*;
use einvoice::formats::{GeneratorRegistry, descriptor_for, global_registry};
use rust_decimal_macros::dec;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// The reference scenario: 2000.00 net, 19% single rate, two line items.
fn test_invoice(format: FormatId) -> CanonicalInvoice {
    let mut inv = CanonicalInvoice::new(format);
    inv.invoice_number = "RE-2026-001".into();
    inv.issue_date = Some(date(2026, 3, 1));
    inv.buyer_reference = Some("04011000-12345-03".into());
    inv.seller = TradeParty {
        name: "ACME GmbH".into(),
        email: Some("billing@acme.de".into()),
        address_lines: vec!["Friedrichstraße 123".into()],
        city: Some("Berlin".into()),
        postal_code: Some("10115".into()),
        country_code: Some("DE".into()),
        vat_id: Some("DE123456789".into()),
        tax_number: Some("29/456/78901".into()),
        contact_name: Some("Max Mustermann".into()),
        phone: Some("+49 30 12345678".into()),
        ..TradeParty::default()
    };
    inv.buyer = TradeParty {
        name: "Kunde AG".into(),
        email: Some("rechnung@kunde.de".into()),
        address_lines: vec!["Marienplatz 1".into()],
        city: Some("München".into()),
        postal_code: Some("80331".into()),
        country_code: Some("DE".into()),
        ..TradeParty::default()
    };
    inv.payment = PaymentDetails {
        iban: Some("DE89370400440532013000".into()),
        bic: Some("COBADEFFXXX".into()),
        terms: Some("Zahlbar innerhalb von 30 Tagen".into()),
        due_date: Some(date(2026, 3, 31)),
    };
    inv.lines = vec![
        LineItem {
            description: "Beratung".into(),
            quantity: Some(dec!(10)),
            unit_price: Some(dec!(150)),
            total_price: Some(dec!(1500.00)),
            tax_rate: Some(dec!(19)),
            tax_category: Some(TaxCategoryCode::StandardRate),
            unit_code: Some("HUR".into()),
        },
        LineItem {
            description: "Lizenz".into(),
            quantity: Some(dec!(1)),
            unit_price: Some(dec!(500)),
            total_price: Some(dec!(500.00)),
            tax_rate: Some(dec!(19)),
            tax_category: Some(TaxCategoryCode::StandardRate),
            unit_code: Some("C62".into()),
        },
    ];
    inv.totals = MonetaryTotals {
        subtotal: Some(dec!(2000.00)),
        tax_amount: Some(dec!(380.00)),
        total_amount: Some(dec!(2380.00)),
    };
    inv
}

#[test]
fn reference_invoice_validates_clean() {
    let outcome = validate(&test_invoice(FormatId::XrechnungUbl));
    assert!(outcome.valid, "unexpected issues: {:?}", outcome.issues);
}

#[test]
fn all_formats_generate_nonempty_distinct_xml() {
    let registry = GeneratorRegistry::new();
    let mut outputs: Vec<(FormatId, String)> = Vec::new();

    for format in FormatId::ALL {
        let invoice = test_invoice(format);
        assert!(validate(&invoice).valid);

        let generator = registry.create(format.as_str()).unwrap();
        let doc = generator
            .generate(&invoice)
            .unwrap_or_else(|e| panic!("{format}: {e}"));
        assert!(!doc.xml.is_empty(), "{format}: empty XML");
        assert!(doc.xml.starts_with("<?xml"), "{format}: missing declaration");
        assert!(doc.xml.contains("RE-2026-001"), "{format}: invoice number");
        outputs.push((format, doc.xml));
    }

    for (i, (fmt_a, xml_a)) in outputs.iter().enumerate() {
        for (fmt_b, xml_b) in &outputs[i + 1..] {
            assert_ne!(xml_a, xml_b, "{fmt_a} and {fmt_b} produced identical XML");
        }
    }
}

#[test]
fn facturx_family_embeds_pdf() {
    let registry = GeneratorRegistry::new();
    for format in [FormatId::FacturxEn16931, FormatId::FacturxBasic] {
        let doc = registry
            .create_for(format)
            .generate(&test_invoice(format))
            .unwrap();
        let pdf = doc.pdf.unwrap_or_else(|| panic!("{format}: no PDF"));
        assert!(pdf.len() > 100, "{format}: implausibly small PDF");
        assert!(pdf.starts_with(b"%PDF"), "{format}: not a PDF header");
        // The XML rides inside the container
        let needle = b"factur-x.xml";
        assert!(
            pdf.windows(needle.len()).any(|w| w == needle),
            "{format}: embedded filename missing"
        );
    }
}

#[test]
fn xml_only_formats_return_no_pdf() {
    let registry = GeneratorRegistry::new();
    for format in FormatId::ALL {
        if descriptor_for(format).embeds_pdf {
            continue;
        }
        let doc = registry
            .create_for(format)
            .generate(&test_invoice(format))
            .unwrap();
        assert!(doc.pdf.is_none(), "{format}: unexpected PDF");
    }
}

#[test]
fn generation_is_idempotent_and_does_not_mutate_input() {
    let registry = GeneratorRegistry::new();
    for format in FormatId::ALL {
        let invoice = test_invoice(format);
        let before = serde_json::to_value(&invoice).unwrap();

        let generator = registry.create_for(format);
        let first = generator.generate(&invoice).unwrap();
        let second = generator.generate(&invoice).unwrap();

        assert_eq!(first.xml, second.xml, "{format}: XML not deterministic");
        assert_eq!(first.pdf, second.pdf, "{format}: PDF not deterministic");
        assert_eq!(
            before,
            serde_json::to_value(&invoice).unwrap(),
            "{format}: input mutated"
        );
    }
}

#[test]
fn customization_ids_differ_per_format() {
    let registry = GeneratorRegistry::new();
    let ubl_formats = [
        FormatId::XrechnungUbl,
        FormatId::PeppolBis,
        FormatId::Nlcius,
        FormatId::CiusRo,
    ];
    for format in ubl_formats {
        let doc = registry
            .create_for(format)
            .generate(&test_invoice(format))
            .unwrap();
        let customization = descriptor_for(format).customization_id;
        assert!(
            doc.xml.contains(customization),
            "{format}: customization id missing"
        );
    }
}

#[test]
fn xrechnung_without_leitweg_id_fails_structured() {
    let registry = GeneratorRegistry::new();
    let mut invoice = test_invoice(FormatId::XrechnungCii);
    invoice.buyer_reference = None;

    for format in [FormatId::XrechnungCii, FormatId::XrechnungUbl] {
        let err = registry
            .create_for(format)
            .generate(&invoice)
            .unwrap_err();
        match err {
            GenerateError::MissingField { format: f, field } => {
                assert_eq!(f, format);
                assert_eq!(field, "buyer_reference");
            }
            other => panic!("{format}: expected MissingField, got {other}"),
        }
    }
}

#[test]
fn fatturapa_requires_seller_vat_id() {
    let registry = GeneratorRegistry::new();
    let mut invoice = test_invoice(FormatId::FatturaPa);
    invoice.seller.vat_id = None;

    let err = registry
        .create_for(FormatId::FatturaPa)
        .generate(&invoice)
        .unwrap_err();
    assert!(matches!(
        err,
        GenerateError::MissingField {
            field: "seller.vat_id",
            ..
        }
    ));
}

#[test]
fn fatturapa_exempt_line_carries_natura_code() {
    let mut invoice = test_invoice(FormatId::FatturaPa);
    invoice.lines.push(LineItem {
        description: "Esente art. 10".into(),
        quantity: Some(dec!(1)),
        unit_price: Some(dec!(100)),
        total_price: Some(dec!(100.00)),
        tax_rate: Some(dec!(0)),
        tax_category: Some(TaxCategoryCode::Exempt),
        unit_code: None,
    });
    invoice.totals = MonetaryTotals {
        subtotal: Some(dec!(2100.00)),
        tax_amount: Some(dec!(380.00)),
        total_amount: Some(dec!(2480.00)),
    };

    let doc = GeneratorRegistry::new()
        .create_for(FormatId::FatturaPa)
        .generate(&invoice)
        .unwrap();
    assert!(doc.xml.contains("<Natura>N4</Natura>"));
    assert!(doc.xml.contains("FPR12"));
}

#[test]
fn ksef_normalizes_polish_nip() {
    let mut invoice = test_invoice(FormatId::Ksef);
    invoice.seller.country_code = Some("PL".into());
    invoice.seller.vat_id = None;
    invoice.seller.tax_number = Some("PL 123-456-78-90".into());

    let doc = GeneratorRegistry::new()
        .create_for(FormatId::Ksef)
        .generate(&invoice)
        .unwrap();
    assert!(doc.xml.contains("<NIP>1234567890</NIP>"));
    assert!(!doc.xml.contains("123-456-78-90"));
}

#[test]
fn credit_note_switches_ubl_root_and_line_elements() {
    let mut invoice = test_invoice(FormatId::XrechnungUbl);
    invoice.type_code = DocumentTypeCode::CreditNote;
    invoice.preceding_invoice = Some("RE-2025-118".into());

    let doc = GeneratorRegistry::new()
        .create_for(FormatId::XrechnungUbl)
        .generate(&invoice)
        .unwrap();
    assert!(doc.xml.contains("<ubl:CreditNote"));
    assert!(doc.xml.contains("cac:CreditNoteLine"));
    assert!(doc.xml.contains("RE-2025-118"));
}

#[test]
fn global_registry_caches_across_calls() {
    let a = global_registry().create("peppol-bis").unwrap();
    let b = global_registry().create("peppol-bis").unwrap();
    assert!(std::sync::Arc::ptr_eq(&a, &b));
}
