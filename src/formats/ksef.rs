//! Polish KSeF FA(2) generation.
//!
//! Structured invoice for the Krajowy System e-Faktur. Party
//! identification runs on the NIP; extracted tax numbers arrive in all
//! sorts of shapes (`PL 123-456-78-90`, `1234567890`) and are normalized
//! to the bare 10 digits the schema expects.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::descriptor::FormatDescriptor;
use super::xml::{XmlWriter, format_decimal};
use super::{FormatGenerator, GeneratedDocument};
use crate::core::{CanonicalInvoice, GenerateError, TradeParty, round2};

const KSEF_NS: &str = "http://crd.gov.pl/wzor/2023/06/29/12648/";

pub(crate) struct KsefGenerator {
    descriptor: &'static FormatDescriptor,
}

impl KsefGenerator {
    pub(crate) fn new(descriptor: &'static FormatDescriptor) -> Self {
        Self { descriptor }
    }
}

impl FormatGenerator for KsefGenerator {
    fn descriptor(&self) -> &'static FormatDescriptor {
        self.descriptor
    }

    fn generate(&self, invoice: &CanonicalInvoice) -> Result<GeneratedDocument, GenerateError> {
        self.descriptor.check_mandatory(invoice)?;
        let xml = to_ksef_xml(invoice, self.descriptor)?;
        Ok(GeneratedDocument { xml, pdf: None })
    }
}

fn missing(descriptor: &FormatDescriptor, field: &'static str) -> GenerateError {
    GenerateError::MissingField {
        format: descriptor.id,
        field,
    }
}

/// Normalize a Polish NIP: strip the country prefix and every separator,
/// keeping digits only.
fn normalize_nip(raw: &str) -> String {
    raw.trim()
        .trim_start_matches("PL")
        .trim_start_matches("pl")
        .chars()
        .filter(char::is_ascii_digit)
        .collect()
}

fn nip_for(party: &TradeParty) -> Option<String> {
    let raw = party.tax_number.as_deref().or(party.vat_id.as_deref())?;
    let nip = normalize_nip(raw);
    (!nip.is_empty()).then_some(nip)
}

fn to_ksef_xml(
    invoice: &CanonicalInvoice,
    descriptor: &'static FormatDescriptor,
) -> Result<String, GenerateError> {
    let issue_date = invoice
        .issue_date
        .ok_or_else(|| missing(descriptor, "issue_date"))?;
    let seller_nip =
        nip_for(&invoice.seller).ok_or_else(|| missing(descriptor, "seller.tax_number"))?;
    let grand_total = invoice
        .totals
        .total_amount
        .ok_or_else(|| missing(descriptor, "totals.total_amount"))?;

    let line_sum: Decimal = invoice.lines.iter().filter_map(|l| l.total_price).sum();
    let subtotal = invoice.totals.subtotal.unwrap_or(line_sum);
    let tax_total = invoice
        .totals
        .tax_amount
        .unwrap_or_else(|| round2(grand_total - subtotal));

    let mut w = XmlWriter::new()?;
    w.start_element_with_attrs("Faktura", &[("xmlns", KSEF_NS)])?;

    // --- Naglowek ---
    w.start_element("Naglowek")?;
    w.text_element_with_attrs(
        "KodFormularza",
        "FA",
        &[("kodSystemowy", descriptor.customization_id), ("wersjaSchemy", "1-0E")],
    )?;
    w.text_element("WariantFormularza", "2")?;
    w.end_element("Naglowek")?;

    // --- Podmiot1 (seller) ---
    w.start_element("Podmiot1")?;
    write_party(&mut w, &invoice.seller, Some(&seller_nip))?;
    w.end_element("Podmiot1")?;

    // --- Podmiot2 (buyer) ---
    w.start_element("Podmiot2")?;
    write_party(&mut w, &invoice.buyer, nip_for(&invoice.buyer).as_deref())?;
    w.end_element("Podmiot2")?;

    // --- Fa ---
    w.start_element("Fa")?;
    w.text_element("KodWaluty", &invoice.currency_code)?;
    // P_1: issue date, P_2: invoice number
    w.text_element("P_1", &issue_date.to_string())?;
    w.text_element("P_2", &invoice.invoice_number)?;
    // P_13_1 / P_14_1: net and tax at the basic rate bucket
    w.text_element("P_13_1", &format_decimal(subtotal))?;
    w.text_element("P_14_1", &format_decimal(tax_total))?;
    // P_15: amount due
    w.text_element("P_15", &format_decimal(grand_total))?;

    w.start_element("Adnotacje")?;
    w.text_element("P_16", "2")?;
    w.text_element("P_17", "2")?;
    w.text_element("P_18", "2")?;
    w.end_element("Adnotacje")?;

    w.text_element("RodzajFaktury", "VAT")?;

    for (i, line) in invoice.lines.iter().enumerate() {
        let total = line
            .total_price
            .ok_or_else(|| missing(descriptor, "lines.total_price"))?;
        let quantity = line.quantity.unwrap_or(dec!(1));
        let unit_price = line.unit_price.unwrap_or(total);
        let rate = line.tax_rate.or(invoice.document_tax_rate);

        w.start_element("FaWiersz")?;
        w.text_element("NrWierszaFa", &(i + 1).to_string())?;
        w.text_element("P_7", &line.description)?;
        if let Some(unit) = &line.unit_code {
            w.text_element("P_8A", unit)?;
        }
        w.text_element("P_8B", &format_decimal(quantity))?;
        w.text_element("P_9A", &format_decimal(unit_price))?;
        w.text_element("P_11", &format_decimal(total))?;
        if let Some(rate) = rate {
            w.text_element("P_12", &format_decimal(rate))?;
        }
        w.end_element("FaWiersz")?;
    }

    if invoice.payment.iban.is_some() || invoice.payment.due_date.is_some() {
        w.start_element("Platnosc")?;
        if let Some(due) = &invoice.payment.due_date {
            w.start_element("TerminPlatnosci")?;
            w.text_element("Termin", &due.to_string())?;
            w.end_element("TerminPlatnosci")?;
        }
        if let Some(iban) = &invoice.payment.iban {
            w.start_element("RachunekBankowy")?;
            w.text_element("NrRB", iban)?;
            if let Some(bic) = &invoice.payment.bic {
                w.text_element("SWIFT", bic)?;
            }
            w.end_element("RachunekBankowy")?;
        }
        w.end_element("Platnosc")?;
    }

    w.end_element("Fa")?;
    w.end_element("Faktura")?;

    w.into_string()
}

fn write_party(
    w: &mut XmlWriter,
    party: &TradeParty,
    nip: Option<&str>,
) -> Result<(), GenerateError> {
    w.start_element("DaneIdentyfikacyjne")?;
    if let Some(nip) = nip {
        w.text_element("NIP", nip)?;
    }
    w.text_element("Nazwa", &party.name)?;
    w.end_element("DaneIdentyfikacyjne")?;

    w.start_element("Adres")?;
    w.text_element(
        "KodKraju",
        party.country_code.as_deref().unwrap_or("PL"),
    )?;
    let line1 = party.address_lines.first().map(String::as_str).unwrap_or("-");
    w.text_element("AdresL1", line1)?;
    let city_line = match (&party.postal_code, &party.city) {
        (Some(postal), Some(city)) => Some(format!("{postal} {city}")),
        (None, Some(city)) => Some(city.clone()),
        (Some(postal), None) => Some(postal.clone()),
        (None, None) => None,
    };
    if let Some(line2) = city_line {
        w.text_element("AdresL2", &line2)?;
    }
    w.end_element("Adres")?;
    Ok(())
}
