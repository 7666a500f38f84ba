//! Italian FatturaPA 1.2 generation.
//!
//! FatturaElettronica in the FPR12 (private-recipient) transmission format.
//! Non-standard tax categories must carry a Natura code instead of a rate;
//! the SDI rejects exempt lines without one.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::descriptor::FormatDescriptor;
use super::xml::{XmlWriter, format_decimal};
use super::{FormatGenerator, GeneratedDocument, vat_breakdown};
use crate::core::{CanonicalInvoice, DocumentTypeCode, GenerateError, TaxCategoryCode, TradeParty};

const FATTURAPA_NS: &str = "http://ivaservizi.agenziaentrate.gov.it/docs/xsd/fatture/v1.2";

/// CodiceDestinatario placeholder when the buyer has no SDI code — the
/// invoice is then routed via PEC or the buyer's tax drawer.
const DEFAULT_CODICE_DESTINATARIO: &str = "0000000";

pub(crate) struct FatturaPaGenerator {
    descriptor: &'static FormatDescriptor,
}

impl FatturaPaGenerator {
    pub(crate) fn new(descriptor: &'static FormatDescriptor) -> Self {
        Self { descriptor }
    }
}

impl FormatGenerator for FatturaPaGenerator {
    fn descriptor(&self) -> &'static FormatDescriptor {
        self.descriptor
    }

    fn generate(&self, invoice: &CanonicalInvoice) -> Result<GeneratedDocument, GenerateError> {
        self.descriptor.check_mandatory(invoice)?;
        let xml = to_fatturapa_xml(invoice, self.descriptor)?;
        Ok(GeneratedDocument { xml, pdf: None })
    }
}

fn missing(descriptor: &FormatDescriptor, field: &'static str) -> GenerateError {
    GenerateError::MissingField {
        format: descriptor.id,
        field,
    }
}

/// UNTDID 5305 category → Natura code (Italian exemption nature).
fn natura_code(category: TaxCategoryCode) -> Option<&'static str> {
    match category {
        TaxCategoryCode::StandardRate => None,
        TaxCategoryCode::ZeroRated => Some("N2.2"),
        TaxCategoryCode::Exempt => Some("N4"),
        TaxCategoryCode::ReverseCharge => Some("N6.9"),
        TaxCategoryCode::IntraCommunitySupply => Some("N3.2"),
        TaxCategoryCode::Export => Some("N3.1"),
        TaxCategoryCode::NotSubjectToVat => Some("N2.2"),
    }
}

/// TD document type for DatiGeneraliDocumento.
fn tipo_documento(code: DocumentTypeCode) -> &'static str {
    match code {
        DocumentTypeCode::Invoice => "TD01",
        DocumentTypeCode::CreditNote => "TD04",
        DocumentTypeCode::Corrected => "TD01",
        DocumentTypeCode::Prepayment => "TD02",
        DocumentTypeCode::Partial => "TD01",
    }
}

/// Split an Italian VAT id into (IdPaese, IdCodice); "IT01234567890" →
/// ("IT", "01234567890"). Ids without a letter prefix default to IT.
fn split_vat_id(vat_id: &str) -> (&str, &str) {
    let prefix = vat_id.get(..2).unwrap_or_default();
    if prefix.len() == 2 && prefix.bytes().all(|b| b.is_ascii_alphabetic()) {
        (prefix, &vat_id[2..])
    } else {
        ("IT", vat_id)
    }
}

fn to_fatturapa_xml(
    invoice: &CanonicalInvoice,
    descriptor: &'static FormatDescriptor,
) -> Result<String, GenerateError> {
    let issue_date = invoice
        .issue_date
        .ok_or_else(|| missing(descriptor, "issue_date"))?;
    let seller_vat = invoice
        .seller
        .vat_id
        .as_deref()
        .ok_or_else(|| missing(descriptor, "seller.vat_id"))?;
    let grand_total = invoice
        .totals
        .total_amount
        .ok_or_else(|| missing(descriptor, "totals.total_amount"))?;

    let mut w = XmlWriter::new()?;
    w.start_element_with_attrs(
        "p:FatturaElettronica",
        &[
            ("versione", descriptor.customization_id),
            ("xmlns:p", FATTURAPA_NS),
        ],
    )?;

    // --- FatturaElettronicaHeader ---
    w.start_element("FatturaElettronicaHeader")?;

    w.start_element("DatiTrasmissione")?;
    let (id_paese, id_codice) = split_vat_id(seller_vat);
    w.start_element("IdTrasmittente")?;
    w.text_element("IdPaese", id_paese)?;
    w.text_element("IdCodice", id_codice)?;
    w.end_element("IdTrasmittente")?;
    // Progressive number is per-transmission; derived from the invoice
    // number so identical input yields identical output.
    let progressivo: String = invoice
        .invoice_number
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(10)
        .collect();
    w.text_element("ProgressivoInvio", &progressivo)?;
    w.text_element("FormatoTrasmissione", descriptor.customization_id)?;
    let codice_destinatario = invoice
        .buyer
        .electronic_address
        .as_ref()
        .map(|ea| ea.value.as_str())
        .filter(|v| v.len() == 7)
        .unwrap_or(DEFAULT_CODICE_DESTINATARIO);
    w.text_element("CodiceDestinatario", codice_destinatario)?;
    w.end_element("DatiTrasmissione")?;

    write_party(&mut w, &invoice.seller, "CedentePrestatore", true)?;
    write_party(&mut w, &invoice.buyer, "CessionarioCommittente", false)?;

    w.end_element("FatturaElettronicaHeader")?;

    // --- FatturaElettronicaBody ---
    w.start_element("FatturaElettronicaBody")?;

    w.start_element("DatiGenerali")?;
    w.start_element("DatiGeneraliDocumento")?;
    w.text_element("TipoDocumento", tipo_documento(invoice.type_code))?;
    w.text_element("Divisa", &invoice.currency_code)?;
    w.text_element("Data", &issue_date.to_string())?;
    w.text_element("Numero", &invoice.invoice_number)?;
    for note in &invoice.notes {
        w.text_element("Causale", note)?;
    }
    w.text_element("ImportoTotaleDocumento", &format_decimal(grand_total))?;
    w.end_element("DatiGeneraliDocumento")?;
    if let Some(pi) = &invoice.preceding_invoice {
        w.start_element("DatiFattureCollegate")?;
        w.text_element("IdDocumento", pi)?;
        w.end_element("DatiFattureCollegate")?;
    }
    w.end_element("DatiGenerali")?;

    w.start_element("DatiBeniServizi")?;
    for (i, line) in invoice.lines.iter().enumerate() {
        let total = line
            .total_price
            .ok_or_else(|| missing(descriptor, "lines.total_price"))?;
        let quantity = line.quantity.unwrap_or(dec!(1));
        let unit_price = line.unit_price.unwrap_or(total);
        let rate = line
            .tax_rate
            .or(invoice.document_tax_rate)
            .unwrap_or(Decimal::ZERO);

        w.start_element("DettaglioLinee")?;
        w.text_element("NumeroLinea", &(i + 1).to_string())?;
        w.text_element("Descrizione", &line.description)?;
        w.text_element("Quantita", &format_decimal(quantity))?;
        w.text_element("PrezzoUnitario", &format_decimal(unit_price))?;
        w.text_element("PrezzoTotale", &format_decimal(total))?;
        w.text_element("AliquotaIVA", &format_decimal(rate))?;
        if rate.is_zero() {
            let category = line.tax_category.unwrap_or(TaxCategoryCode::ZeroRated);
            if let Some(natura) = natura_code(category) {
                w.text_element("Natura", natura)?;
            }
        }
        w.end_element("DettaglioLinee")?;
    }

    for group in vat_breakdown(invoice) {
        w.start_element("DatiRiepilogo")?;
        w.text_element("AliquotaIVA", &format_decimal(group.rate))?;
        if group.rate.is_zero() {
            if let Some(natura) = natura_code(group.category) {
                w.text_element("Natura", natura)?;
            }
        }
        w.text_element("ImponibileImporto", &format_decimal(group.taxable))?;
        w.text_element("Imposta", &format_decimal(group.tax))?;
        w.end_element("DatiRiepilogo")?;
    }
    w.end_element("DatiBeniServizi")?;

    if invoice.payment.iban.is_some() || invoice.payment.due_date.is_some() {
        w.start_element("DatiPagamento")?;
        // TP02 — complete payment in one installment
        w.text_element("CondizioniPagamento", "TP02")?;
        w.start_element("DettaglioPagamento")?;
        // MP05 — bank transfer
        w.text_element("ModalitaPagamento", "MP05")?;
        if let Some(due) = &invoice.payment.due_date {
            w.text_element("DataScadenzaPagamento", &due.to_string())?;
        }
        w.text_element("ImportoPagamento", &format_decimal(grand_total))?;
        if let Some(iban) = &invoice.payment.iban {
            w.text_element("IBAN", iban)?;
        }
        w.end_element("DettaglioPagamento")?;
        w.end_element("DatiPagamento")?;
    }

    w.end_element("FatturaElettronicaBody")?;
    w.end_element("p:FatturaElettronica")?;

    w.into_string()
}

fn write_party(
    w: &mut XmlWriter,
    party: &TradeParty,
    element: &str,
    is_seller: bool,
) -> Result<(), GenerateError> {
    w.start_element(element)?;
    w.start_element("DatiAnagrafici")?;

    if let Some(vat_id) = &party.vat_id {
        let (paese, codice) = split_vat_id(vat_id);
        w.start_element("IdFiscaleIVA")?;
        w.text_element("IdPaese", paese)?;
        w.text_element("IdCodice", codice)?;
        w.end_element("IdFiscaleIVA")?;
    }
    if let Some(tax_number) = &party.tax_number {
        w.text_element("CodiceFiscale", tax_number)?;
    }
    w.start_element("Anagrafica")?;
    w.text_element("Denominazione", &party.name)?;
    w.end_element("Anagrafica")?;
    if is_seller {
        // RF01 — ordinary tax regime
        w.text_element("RegimeFiscale", "RF01")?;
    }
    w.end_element("DatiAnagrafici")?;

    w.start_element("Sede")?;
    w.text_element(
        "Indirizzo",
        party.address_lines.first().map(String::as_str).unwrap_or("-"),
    )?;
    if let Some(postal) = &party.postal_code {
        w.text_element("CAP", postal)?;
    }
    if let Some(city) = &party.city {
        w.text_element("Comune", city)?;
    }
    w.text_element(
        "Nazione",
        party.country_code.as_deref().unwrap_or("IT"),
    )?;
    w.end_element("Sede")?;

    w.end_element(element)?;
    Ok(())
}
