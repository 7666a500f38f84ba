//! Data-driven per-format schema descriptors.
//!
//! Adding a format means registering a descriptor and a mapping, not
//! threading another conditional through the generators.

use crate::core::{CanonicalInvoice, FormatId, GenerateError};

/// XML syntax family a format is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    /// OASIS Universal Business Language 2.1.
    Ubl,
    /// UN/CEFACT Cross Industry Invoice.
    Cii,
    /// Italian FatturaPA 1.2.
    FatturaPa,
    /// Polish KSeF FA(2).
    KsefFa,
}

/// A document-level field a format's schema mandates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MandatoryField {
    InvoiceNumber,
    IssueDate,
    CurrencyCode,
    SellerName,
    SellerCountry,
    /// Seller VAT identifier (FatturaPA: Partita IVA).
    SellerVatId,
    /// Seller VAT identifier or national tax number (KSeF: NIP).
    SellerTaxId,
    BuyerName,
    BuyerCountry,
    /// Buyer reference — the Leitweg-ID slot, mandatory for XRechnung.
    BuyerReference,
    Lines,
    TotalAmount,
}

impl MandatoryField {
    /// Field path reported in [`GenerateError::MissingField`].
    pub fn name(&self) -> &'static str {
        match self {
            Self::InvoiceNumber => "invoice_number",
            Self::IssueDate => "issue_date",
            Self::CurrencyCode => "currency_code",
            Self::SellerName => "seller.name",
            Self::SellerCountry => "seller.country_code",
            Self::SellerVatId => "seller.vat_id",
            Self::SellerTaxId => "seller.vat_id|tax_number",
            Self::BuyerName => "buyer.name",
            Self::BuyerCountry => "buyer.country_code",
            Self::BuyerReference => "buyer_reference",
            Self::Lines => "lines",
            Self::TotalAmount => "totals.total_amount",
        }
    }

    fn is_satisfied(&self, invoice: &CanonicalInvoice) -> bool {
        fn present(value: &Option<String>) -> bool {
            value.as_deref().is_some_and(|s| !s.trim().is_empty())
        }

        match self {
            Self::InvoiceNumber => !invoice.invoice_number.trim().is_empty(),
            Self::IssueDate => invoice.issue_date.is_some(),
            Self::CurrencyCode => !invoice.currency_code.trim().is_empty(),
            Self::SellerName => !invoice.seller.name.trim().is_empty(),
            Self::SellerCountry => present(&invoice.seller.country_code),
            Self::SellerVatId => present(&invoice.seller.vat_id),
            Self::SellerTaxId => {
                present(&invoice.seller.vat_id) || present(&invoice.seller.tax_number)
            }
            Self::BuyerName => !invoice.buyer.name.trim().is_empty(),
            Self::BuyerCountry => present(&invoice.buyer.country_code),
            Self::BuyerReference => present(&invoice.buyer_reference),
            Self::Lines => !invoice.lines.is_empty(),
            Self::TotalAmount => invoice.totals.total_amount.is_some(),
        }
    }
}

/// Static description of one target format.
#[derive(Debug)]
pub struct FormatDescriptor {
    pub id: FormatId,
    /// Display name.
    pub name: &'static str,
    pub syntax: Syntax,
    /// BT-24 specification/customization identifier (or the national
    /// transmission format code for FatturaPA/KSeF).
    pub customization_id: &'static str,
    /// BT-23 business process / profile identifier, where the syntax has one.
    pub profile_id: Option<&'static str>,
    /// Whether the XML is delivered inside a PDF/A-3 container.
    pub embeds_pdf: bool,
    /// Document-level fields the schema mandates; checked before any XML
    /// is written.
    pub mandatory: &'static [MandatoryField],
}

impl FormatDescriptor {
    /// Verify every mandated field is populated; fail fast on the first gap.
    pub fn check_mandatory(&self, invoice: &CanonicalInvoice) -> Result<(), GenerateError> {
        for field in self.mandatory {
            if !field.is_satisfied(invoice) {
                return Err(GenerateError::MissingField {
                    format: self.id,
                    field: field.name(),
                });
            }
        }
        Ok(())
    }
}

use MandatoryField as M;

const EN16931_BASE: &[M] = &[
    M::InvoiceNumber,
    M::IssueDate,
    M::CurrencyCode,
    M::SellerName,
    M::SellerCountry,
    M::BuyerName,
    M::Lines,
    M::TotalAmount,
];

const XRECHNUNG_MANDATORY: &[M] = &[
    M::InvoiceNumber,
    M::IssueDate,
    M::CurrencyCode,
    M::SellerName,
    M::SellerCountry,
    M::BuyerName,
    // BR-DE-15: Leitweg-ID
    M::BuyerReference,
    M::Lines,
    M::TotalAmount,
];

const PEPPOL_MANDATORY: &[M] = &[
    M::InvoiceNumber,
    M::IssueDate,
    M::CurrencyCode,
    M::SellerName,
    M::SellerCountry,
    M::BuyerName,
    M::BuyerCountry,
    M::Lines,
    M::TotalAmount,
];

const FATTURAPA_MANDATORY: &[M] = &[
    M::InvoiceNumber,
    M::IssueDate,
    M::CurrencyCode,
    M::SellerName,
    M::SellerVatId,
    M::SellerCountry,
    M::BuyerName,
    M::Lines,
    M::TotalAmount,
];

const KSEF_MANDATORY: &[M] = &[
    M::InvoiceNumber,
    M::IssueDate,
    M::CurrencyCode,
    M::SellerName,
    M::SellerTaxId,
    M::BuyerName,
    M::Lines,
    M::TotalAmount,
];

static DESCRIPTORS: [FormatDescriptor; 9] = [
    FormatDescriptor {
        id: FormatId::XrechnungCii,
        name: "XRechnung 3.0 (CII)",
        syntax: Syntax::Cii,
        customization_id:
            "urn:cen.eu:en16931:2017#compliant#urn:xeinkauf.de:kosit:xrechnung_3.0",
        profile_id: Some("urn:fdc:peppol.eu:2017:poacc:billing:01:1.0"),
        embeds_pdf: false,
        mandatory: XRECHNUNG_MANDATORY,
    },
    FormatDescriptor {
        id: FormatId::XrechnungUbl,
        name: "XRechnung 3.0 (UBL)",
        syntax: Syntax::Ubl,
        customization_id:
            "urn:cen.eu:en16931:2017#compliant#urn:xeinkauf.de:kosit:xrechnung_3.0",
        profile_id: Some("urn:fdc:peppol.eu:2017:poacc:billing:01:1.0"),
        embeds_pdf: false,
        mandatory: XRECHNUNG_MANDATORY,
    },
    FormatDescriptor {
        id: FormatId::PeppolBis,
        name: "Peppol BIS Billing 3.0",
        syntax: Syntax::Ubl,
        customization_id:
            "urn:cen.eu:en16931:2017#compliant#urn:fdc:peppol.eu:2017:poacc:billing:3.0",
        profile_id: Some("urn:fdc:peppol.eu:2017:poacc:billing:01:1.0"),
        embeds_pdf: false,
        mandatory: PEPPOL_MANDATORY,
    },
    FormatDescriptor {
        id: FormatId::FacturxEn16931,
        name: "Factur-X EN 16931",
        syntax: Syntax::Cii,
        customization_id: "urn:cen.eu:en16931:2017",
        profile_id: None,
        embeds_pdf: true,
        mandatory: EN16931_BASE,
    },
    FormatDescriptor {
        id: FormatId::FacturxBasic,
        name: "Factur-X Basic",
        syntax: Syntax::Cii,
        customization_id: "urn:cen.eu:en16931:2017#compliant#urn:factur-x.eu:1p0:basic",
        profile_id: None,
        embeds_pdf: true,
        mandatory: EN16931_BASE,
    },
    FormatDescriptor {
        id: FormatId::FatturaPa,
        name: "FatturaPA 1.2",
        syntax: Syntax::FatturaPa,
        customization_id: "FPR12",
        profile_id: None,
        embeds_pdf: false,
        mandatory: FATTURAPA_MANDATORY,
    },
    FormatDescriptor {
        id: FormatId::Ksef,
        name: "KSeF FA(2)",
        syntax: Syntax::KsefFa,
        customization_id: "FA (2)",
        profile_id: None,
        embeds_pdf: false,
        mandatory: KSEF_MANDATORY,
    },
    FormatDescriptor {
        id: FormatId::Nlcius,
        name: "NLCIUS",
        syntax: Syntax::Ubl,
        customization_id: "urn:cen.eu:en16931:2017#compliant#urn:fdc:nen.nl:nlcius:v1.0",
        profile_id: Some("urn:fdc:peppol.eu:2017:poacc:billing:01:1.0"),
        embeds_pdf: false,
        mandatory: EN16931_BASE,
    },
    FormatDescriptor {
        id: FormatId::CiusRo,
        name: "CIUS-RO e-Factura",
        syntax: Syntax::Ubl,
        customization_id:
            "urn:cen.eu:en16931:2017#compliant#urn:efactura.mfinante.ro:CIUS-RO:1.0.1",
        profile_id: None,
        embeds_pdf: false,
        mandatory: EN16931_BASE,
    },
];

/// Look up the descriptor for a format.
pub fn descriptor_for(id: FormatId) -> &'static FormatDescriptor {
    match id {
        FormatId::XrechnungCii => &DESCRIPTORS[0],
        FormatId::XrechnungUbl => &DESCRIPTORS[1],
        FormatId::PeppolBis => &DESCRIPTORS[2],
        FormatId::FacturxEn16931 => &DESCRIPTORS[3],
        FormatId::FacturxBasic => &DESCRIPTORS[4],
        FormatId::FatturaPa => &DESCRIPTORS[5],
        FormatId::Ksef => &DESCRIPTORS[6],
        FormatId::Nlcius => &DESCRIPTORS[7],
        FormatId::CiusRo => &DESCRIPTORS[8],
    }
}
