use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::UnknownFormatError;

/// Identifier of a supported target e-invoice format.
///
/// The string forms (`"xrechnung-cii"`, `"facturx-en16931"`, …) are the
/// public API keys accepted by the generator registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatId {
    /// German XRechnung 3.0, CII syntax.
    #[serde(rename = "xrechnung-cii")]
    XrechnungCii,
    /// German XRechnung 3.0, UBL syntax.
    #[serde(rename = "xrechnung-ubl")]
    XrechnungUbl,
    /// Peppol BIS Billing 3.0 (UBL).
    #[serde(rename = "peppol-bis")]
    PeppolBis,
    /// Factur-X / ZUGFeRD EN 16931 profile (CII embedded in PDF/A-3).
    #[serde(rename = "facturx-en16931")]
    FacturxEn16931,
    /// Factur-X / ZUGFeRD Basic profile (CII embedded in PDF/A-3).
    #[serde(rename = "facturx-basic")]
    FacturxBasic,
    /// Italian FatturaPA 1.2.
    #[serde(rename = "fatturapa")]
    FatturaPa,
    /// Polish KSeF FA(2).
    #[serde(rename = "ksef")]
    Ksef,
    /// Dutch NLCIUS (UBL).
    #[serde(rename = "nlcius")]
    Nlcius,
    /// Romanian CIUS-RO / e-Factura (UBL).
    #[serde(rename = "cius-ro")]
    CiusRo,
}

impl FormatId {
    /// All supported formats, in registry order.
    pub const ALL: [FormatId; 9] = [
        Self::XrechnungCii,
        Self::XrechnungUbl,
        Self::PeppolBis,
        Self::FacturxEn16931,
        Self::FacturxBasic,
        Self::FatturaPa,
        Self::Ksef,
        Self::Nlcius,
        Self::CiusRo,
    ];

    /// The registry key for this format.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::XrechnungCii => "xrechnung-cii",
            Self::XrechnungUbl => "xrechnung-ubl",
            Self::PeppolBis => "peppol-bis",
            Self::FacturxEn16931 => "facturx-en16931",
            Self::FacturxBasic => "facturx-basic",
            Self::FatturaPa => "fatturapa",
            Self::Ksef => "ksef",
            Self::Nlcius => "nlcius",
            Self::CiusRo => "cius-ro",
        }
    }

    /// Parse a registry key.
    pub fn parse(id: &str) -> Result<Self, UnknownFormatError> {
        match id {
            "xrechnung-cii" => Ok(Self::XrechnungCii),
            "xrechnung-ubl" => Ok(Self::XrechnungUbl),
            "peppol-bis" => Ok(Self::PeppolBis),
            "facturx-en16931" => Ok(Self::FacturxEn16931),
            "facturx-basic" => Ok(Self::FacturxBasic),
            "fatturapa" => Ok(Self::FatturaPa),
            "ksef" => Ok(Self::Ksef),
            "nlcius" => Ok(Self::Nlcius),
            "cius-ro" => Ok(Self::CiusRo),
            other => Err(UnknownFormatError { id: other.into() }),
        }
    }
}

impl std::fmt::Display for FormatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FormatId {
    type Err = UnknownFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// UNTDID 1001 — document type codes (subset relevant to e-invoicing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentTypeCode {
    /// 380 — Commercial invoice.
    Invoice,
    /// 381 — Credit note.
    CreditNote,
    /// 384 — Corrected invoice.
    Corrected,
    /// 386 — Prepayment invoice.
    Prepayment,
    /// 326 — Partial invoice.
    Partial,
}

impl DocumentTypeCode {
    /// UNTDID 1001 numeric code.
    pub fn code(&self) -> u16 {
        match self {
            Self::Invoice => 380,
            Self::CreditNote => 381,
            Self::Corrected => 384,
            Self::Prepayment => 386,
            Self::Partial => 326,
        }
    }

    /// Parse from UNTDID 1001 numeric code.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            380 => Some(Self::Invoice),
            381 => Some(Self::CreditNote),
            384 => Some(Self::Corrected),
            386 => Some(Self::Prepayment),
            326 => Some(Self::Partial),
            _ => None,
        }
    }
}

impl Default for DocumentTypeCode {
    fn default() -> Self {
        Self::Invoice
    }
}

/// UNTDID 5305 — tax category codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaxCategoryCode {
    /// S — Standard rate.
    StandardRate,
    /// Z — Zero rated.
    ZeroRated,
    /// E — Exempt from tax.
    Exempt,
    /// AE — Reverse charge.
    ReverseCharge,
    /// K — Intra-community supply.
    IntraCommunitySupply,
    /// G — Export outside the EU.
    Export,
    /// O — Not subject to VAT.
    NotSubjectToVat,
}

impl TaxCategoryCode {
    /// UNTDID 5305 code letter.
    pub fn code(&self) -> &'static str {
        match self {
            Self::StandardRate => "S",
            Self::ZeroRated => "Z",
            Self::Exempt => "E",
            Self::ReverseCharge => "AE",
            Self::IntraCommunitySupply => "K",
            Self::Export => "G",
            Self::NotSubjectToVat => "O",
        }
    }

    /// Parse from UNTDID 5305 code string.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "S" => Some(Self::StandardRate),
            "Z" => Some(Self::ZeroRated),
            "E" => Some(Self::Exempt),
            "AE" => Some(Self::ReverseCharge),
            "K" => Some(Self::IntraCommunitySupply),
            "G" => Some(Self::Export),
            "O" => Some(Self::NotSubjectToVat),
            _ => None,
        }
    }
}

/// The format-agnostic invoice representation all generators consume.
///
/// Constructed once per extraction/review cycle from normalized provider
/// output (or from manual review edits) and passed to generators by
/// read-only reference. Amount fields are `Option`al: `None` means the
/// extraction could not produce the value, and the validator reports it
/// rather than any component substituting a guess.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalInvoice {
    /// Target output format.
    pub format: FormatId,
    /// BT-1: Invoice number. Empty when extraction failed to find one.
    pub invoice_number: String,
    /// BT-2: Issue date.
    pub issue_date: Option<NaiveDate>,
    /// BT-5: Invoice currency code (ISO 4217).
    pub currency_code: String,
    /// BT-3: Document type code (UNTDID 1001).
    pub type_code: DocumentTypeCode,
    /// BT-10: Buyer reference (Leitweg-ID for XRechnung).
    pub buyer_reference: Option<String>,
    /// BT-22: Notes / free text.
    pub notes: Vec<String>,
    /// BT-25: Preceding invoice reference (for corrections/credit notes).
    pub preceding_invoice: Option<String>,
    /// BG-14: Billing period.
    pub billing_period: Option<Period>,
    /// BG-4: Seller.
    pub seller: TradeParty,
    /// BG-7: Buyer.
    pub buyer: TradeParty,
    /// BG-16: Payment details.
    pub payment: PaymentDetails,
    /// BG-25: Line items, in document order.
    pub lines: Vec<LineItem>,
    /// BG-22: Stated document totals.
    pub totals: MonetaryTotals,
    /// Document-level tax rate, used when line items carry no rates.
    /// `None` when the document mixes rates the extraction could not
    /// attribute to lines.
    pub document_tax_rate: Option<Decimal>,
}

impl CanonicalInvoice {
    /// An empty invoice skeleton targeting `format`, currency EUR.
    pub fn new(format: FormatId) -> Self {
        Self {
            format,
            invoice_number: String::new(),
            issue_date: None,
            currency_code: "EUR".into(),
            type_code: DocumentTypeCode::Invoice,
            buyer_reference: None,
            notes: Vec::new(),
            preceding_invoice: None,
            billing_period: None,
            seller: TradeParty::default(),
            buyer: TradeParty::default(),
            payment: PaymentDetails::default(),
            lines: Vec::new(),
            totals: MonetaryTotals::default(),
            document_tax_rate: None,
        }
    }
}

/// BG-4 / BG-7: Seller or buyer party.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeParty {
    /// BT-27 / BT-44: Name. Empty when extraction failed.
    pub name: String,
    /// Contact email.
    pub email: Option<String>,
    /// BT-35 / BT-50: Street address lines.
    pub address_lines: Vec<String>,
    /// BT-37 / BT-52: City.
    pub city: Option<String>,
    /// BT-38 / BT-53: Postal code.
    pub postal_code: Option<String>,
    /// BT-40 / BT-55: Country code (ISO 3166-1 alpha-2).
    pub country_code: Option<String>,
    /// BT-31 / BT-48: VAT identifier.
    pub vat_id: Option<String>,
    /// BT-32: National tax registration number (Steuernummer, NIP, …).
    pub tax_number: Option<String>,
    /// BT-34 / BT-49: Electronic address for network delivery.
    pub electronic_address: Option<ElectronicAddress>,
    /// BT-41 / BT-56: Contact person.
    pub contact_name: Option<String>,
    /// BT-42 / BT-57: Telephone.
    pub phone: Option<String>,
}

/// Electronic address with scheme identifier (EAS code list).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectronicAddress {
    /// Scheme identifier (e.g. "EM" for email, "0204" for Leitweg-ID).
    pub scheme: String,
    /// Address value.
    pub value: String,
}

/// BG-16: Payment details.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentDetails {
    /// BT-84: IBAN of the payee account.
    pub iban: Option<String>,
    /// BT-86: BIC.
    pub bic: Option<String>,
    /// BT-20: Payment terms free text.
    pub terms: Option<String>,
    /// BT-9: Payment due date.
    pub due_date: Option<NaiveDate>,
}

/// BG-25: Invoice line item as extracted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineItem {
    /// BT-153/154: Item description.
    pub description: String,
    /// BT-129: Invoiced quantity.
    pub quantity: Option<Decimal>,
    /// BT-146: Net unit price.
    pub unit_price: Option<Decimal>,
    /// BT-131: Line net amount (quantity × unit price).
    pub total_price: Option<Decimal>,
    /// BT-152: VAT rate percentage for this line.
    pub tax_rate: Option<Decimal>,
    /// BT-151: VAT category for this line.
    pub tax_category: Option<TaxCategoryCode>,
    /// BT-130: Unit of measure (UN/CEFACT Rec 20, e.g. "C62", "HUR").
    pub unit_code: Option<String>,
}

/// BG-22: Stated document totals, as extracted.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MonetaryTotals {
    /// BT-106: Sum of line net amounts.
    pub subtotal: Option<Decimal>,
    /// BT-110: Total VAT amount.
    pub tax_amount: Option<Decimal>,
    /// BT-112: Invoice total including VAT.
    pub total_amount: Option<Decimal>,
}

/// BG-14: Billing period.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Period {
    /// BT-73: Start date.
    pub start: NaiveDate,
    /// BT-74: End date.
    pub end: NaiveDate,
}
