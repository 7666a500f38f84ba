//! Format generators and the generator registry.
//!
//! One generator per target e-invoice standard, each a pure function from
//! [`CanonicalInvoice`] to output bytes. Syntax families are shared: the
//! four UBL-based formats run through one parameterized UBL writer, the
//! three CII-based formats through one CII writer; FatturaPA and KSeF have
//! their own national structures. The Factur-X pair additionally wraps its
//! CII XML in a PDF/A-3 container.
//!
//! # Example
//!
//! ```no_run
//! use einvoice::core::CanonicalInvoice;
//! use einvoice::formats::global_registry;
//!
//! let invoice: CanonicalInvoice = todo!(); // from extraction or review
//! let generator = global_registry().create("xrechnung-ubl").unwrap();
//! let doc = generator.generate(&invoice).unwrap();
//! assert!(!doc.xml.is_empty());
//! ```

mod cii;
mod descriptor;
mod facturx;
mod fatturapa;
mod ksef;
mod pdf;
mod registry;
mod ubl;
pub(crate) mod xml;

pub use descriptor::{FormatDescriptor, MandatoryField, Syntax, descriptor_for};
pub use registry::{GeneratorRegistry, global_registry};

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::core::{CanonicalInvoice, GenerateError, TaxCategoryCode, round2};

/// Output of a format generator.
#[derive(Debug, Clone)]
pub struct GeneratedDocument {
    /// UTF-8 XML conforming to the target schema. Never empty.
    pub xml: String,
    /// PDF/A-3 container with the XML embedded, for the Factur-X family.
    /// `None` for XML-only formats.
    pub pdf: Option<Vec<u8>>,
}

/// A generator for one target e-invoice standard.
///
/// Implementations must not mutate the input invoice and must produce
/// byte-identical output for identical input — no timestamps or random
/// identifiers are embedded anywhere.
pub trait FormatGenerator: Send + Sync {
    /// The descriptor this generator serializes against.
    fn descriptor(&self) -> &'static FormatDescriptor;

    /// Serialize the invoice. Fails with [`GenerateError::MissingField`]
    /// when the canonical model lacks a field the format mandates.
    fn generate(&self, invoice: &CanonicalInvoice) -> Result<GeneratedDocument, GenerateError>;
}

/// One VAT group derived from the invoice lines, keyed by (category, rate).
pub(crate) struct TaxGroup {
    pub category: TaxCategoryCode,
    pub rate: Decimal,
    pub taxable: Decimal,
    pub tax: Decimal,
}

/// Derive the per-category VAT breakdown the XML schemas require from the
/// flat line list. Lines without a rate fall back to the document-level
/// rate; lines without a category are classified by whether their rate is
/// positive. Ordering is deterministic (category code, then rate).
pub(crate) fn vat_breakdown(invoice: &CanonicalInvoice) -> Vec<TaxGroup> {
    let mut bases: BTreeMap<(&'static str, Decimal), (TaxCategoryCode, Decimal)> = BTreeMap::new();

    for line in &invoice.lines {
        let Some(base) = line.total_price else {
            continue;
        };
        let rate = line
            .tax_rate
            .or(invoice.document_tax_rate)
            .unwrap_or(Decimal::ZERO);
        let category = line.tax_category.unwrap_or(if rate > Decimal::ZERO {
            TaxCategoryCode::StandardRate
        } else {
            TaxCategoryCode::ZeroRated
        });
        let entry = bases
            .entry((category.code(), rate))
            .or_insert((category, Decimal::ZERO));
        entry.1 += base;
    }

    bases
        .into_iter()
        .map(|((_, rate), (category, taxable))| TaxGroup {
            category,
            rate,
            taxable,
            tax: round2(taxable * rate / dec!(100)),
        })
        .collect()
}
