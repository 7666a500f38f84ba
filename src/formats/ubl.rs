//! UBL 2.1 syntax family: XRechnung (UBL), Peppol BIS, NLCIUS, CIUS-RO.
//!
//! One parameterized writer — the formats share the EN 16931 UBL structure
//! and differ in customization identifier and a few national rules.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::descriptor::FormatDescriptor;
use super::xml::{XmlWriter, format_decimal};
use super::{FormatGenerator, GeneratedDocument, vat_breakdown};
use crate::core::{
    CanonicalInvoice, DocumentTypeCode, FormatId, GenerateError, TradeParty,
};

/// UBL 2.1 namespace URIs.
mod ns {
    pub const INVOICE: &str = "urn:oasis:names:specification:ubl:schema:xsd:Invoice-2";
    pub const CREDIT_NOTE: &str = "urn:oasis:names:specification:ubl:schema:xsd:CreditNote-2";
    pub const CAC: &str =
        "urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2";
    pub const CBC: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2";
}

pub(crate) struct UblGenerator {
    descriptor: &'static FormatDescriptor,
}

impl UblGenerator {
    pub(crate) fn new(descriptor: &'static FormatDescriptor) -> Self {
        Self { descriptor }
    }
}

impl FormatGenerator for UblGenerator {
    fn descriptor(&self) -> &'static FormatDescriptor {
        self.descriptor
    }

    fn generate(&self, invoice: &CanonicalInvoice) -> Result<GeneratedDocument, GenerateError> {
        self.descriptor.check_mandatory(invoice)?;
        let xml = to_ubl_xml(invoice, self.descriptor)?;
        Ok(GeneratedDocument { xml, pdf: None })
    }
}

fn missing(descriptor: &FormatDescriptor, field: &'static str) -> GenerateError {
    GenerateError::MissingField {
        format: descriptor.id,
        field,
    }
}

pub(crate) fn to_ubl_xml(
    invoice: &CanonicalInvoice,
    descriptor: &'static FormatDescriptor,
) -> Result<String, GenerateError> {
    let currency = invoice.currency_code.as_str();
    let issue_date = invoice
        .issue_date
        .ok_or_else(|| missing(descriptor, "issue_date"))?;

    let is_credit_note = invoice.type_code == DocumentTypeCode::CreditNote;
    let (root_tag, root_ns) = if is_credit_note {
        ("ubl:CreditNote", ns::CREDIT_NOTE)
    } else {
        ("ubl:Invoice", ns::INVOICE)
    };

    let mut w = XmlWriter::new()?;
    w.start_element_with_attrs(
        root_tag,
        &[
            ("xmlns:ubl", root_ns),
            ("xmlns:cac", ns::CAC),
            ("xmlns:cbc", ns::CBC),
        ],
    )?;

    // BT-24: CustomizationID
    w.text_element("cbc:CustomizationID", descriptor.customization_id)?;
    // BT-23: ProfileID
    if let Some(profile) = descriptor.profile_id {
        w.text_element("cbc:ProfileID", profile)?;
    }
    // BT-1: Invoice number
    w.text_element("cbc:ID", &invoice.invoice_number)?;
    // BT-2: Issue date
    w.text_element("cbc:IssueDate", &issue_date.to_string())?;
    // BT-9: Due date
    if let Some(due) = &invoice.payment.due_date {
        if !is_credit_note {
            w.text_element("cbc:DueDate", &due.to_string())?;
        }
    }
    // BT-3: Type code
    let type_element = if is_credit_note {
        "cbc:CreditNoteTypeCode"
    } else {
        "cbc:InvoiceTypeCode"
    };
    w.text_element(type_element, &invoice.type_code.code().to_string())?;
    // BT-22: Notes
    for note in &invoice.notes {
        w.text_element("cbc:Note", note)?;
    }
    // BT-5: Currency code
    w.text_element("cbc:DocumentCurrencyCode", currency)?;
    // BT-10: Buyer reference (Leitweg-ID for XRechnung)
    if let Some(br) = &invoice.buyer_reference {
        w.text_element("cbc:BuyerReference", br)?;
    }

    // BG-14: Billing period
    if let Some(period) = &invoice.billing_period {
        w.start_element("cac:InvoicePeriod")?;
        w.text_element("cbc:StartDate", &period.start.to_string())?;
        w.text_element("cbc:EndDate", &period.end.to_string())?;
        w.end_element("cac:InvoicePeriod")?;
    }

    // BG-3: Preceding invoice reference
    if let Some(pi) = &invoice.preceding_invoice {
        w.start_element("cac:BillingReference")?;
        w.start_element("cac:InvoiceDocumentReference")?;
        w.text_element("cbc:ID", pi)?;
        w.end_element("cac:InvoiceDocumentReference")?;
        w.end_element("cac:BillingReference")?;
    }

    // BG-4: Seller
    write_party(&mut w, &invoice.seller, "cac:AccountingSupplierParty", descriptor)?;
    // BG-7: Buyer
    write_party(&mut w, &invoice.buyer, "cac:AccountingCustomerParty", descriptor)?;

    // BG-16: Payment means
    if let Some(iban) = &invoice.payment.iban {
        w.start_element("cac:PaymentMeans")?;
        // BT-81: 58 = SEPA credit transfer
        w.text_element("cbc:PaymentMeansCode", "58")?;
        w.start_element("cac:PayeeFinancialAccount")?;
        w.text_element("cbc:ID", iban)?;
        if let Some(bic) = &invoice.payment.bic {
            w.start_element("cac:FinancialInstitutionBranch")?;
            w.text_element("cbc:ID", bic)?;
            w.end_element("cac:FinancialInstitutionBranch")?;
        }
        w.end_element("cac:PayeeFinancialAccount")?;
        w.end_element("cac:PaymentMeans")?;
    }

    // BT-20: Payment terms
    if let Some(terms) = &invoice.payment.terms {
        w.start_element("cac:PaymentTerms")?;
        w.text_element("cbc:Note", terms)?;
        w.end_element("cac:PaymentTerms")?;
    }

    let groups = vat_breakdown(invoice);
    let computed_tax: Decimal = groups.iter().map(|g| g.tax).sum();
    let line_sum: Decimal = invoice.lines.iter().filter_map(|l| l.total_price).sum();
    let subtotal = invoice.totals.subtotal.unwrap_or(line_sum);
    let tax_total = invoice.totals.tax_amount.unwrap_or(computed_tax);
    let grand_total = invoice
        .totals
        .total_amount
        .ok_or_else(|| missing(descriptor, "totals.total_amount"))?;

    // BG-23: Tax total with per-category subtotals
    w.start_element("cac:TaxTotal")?;
    w.amount_element("cbc:TaxAmount", tax_total, currency)?;
    for group in &groups {
        w.start_element("cac:TaxSubtotal")?;
        w.amount_element("cbc:TaxableAmount", group.taxable, currency)?;
        w.amount_element("cbc:TaxAmount", group.tax, currency)?;
        w.start_element("cac:TaxCategory")?;
        w.text_element("cbc:ID", group.category.code())?;
        w.text_element("cbc:Percent", &format_decimal(group.rate))?;
        w.start_element("cac:TaxScheme")?;
        w.text_element("cbc:ID", "VAT")?;
        w.end_element("cac:TaxScheme")?;
        w.end_element("cac:TaxCategory")?;
        w.end_element("cac:TaxSubtotal")?;
    }
    w.end_element("cac:TaxTotal")?;

    // BG-22: Legal monetary total
    w.start_element("cac:LegalMonetaryTotal")?;
    w.amount_element("cbc:LineExtensionAmount", line_sum, currency)?;
    w.amount_element("cbc:TaxExclusiveAmount", subtotal, currency)?;
    w.amount_element("cbc:TaxInclusiveAmount", grand_total, currency)?;
    w.amount_element("cbc:PayableAmount", grand_total, currency)?;
    w.end_element("cac:LegalMonetaryTotal")?;

    // BG-25: Lines
    let (line_tag, qty_tag) = if is_credit_note {
        ("cac:CreditNoteLine", "cbc:CreditedQuantity")
    } else {
        ("cac:InvoiceLine", "cbc:InvoicedQuantity")
    };
    for (i, line) in invoice.lines.iter().enumerate() {
        let total = line
            .total_price
            .ok_or_else(|| missing(descriptor, "lines.total_price"))?;
        let quantity = line.quantity.unwrap_or(dec!(1));
        let unit = line.unit_code.as_deref().unwrap_or("C62");
        let unit_price = line.unit_price.unwrap_or(total);
        let rate = line
            .tax_rate
            .or(invoice.document_tax_rate)
            .unwrap_or(Decimal::ZERO);
        let category = line
            .tax_category
            .map(|c| c.code())
            .unwrap_or(if rate > Decimal::ZERO { "S" } else { "Z" });

        w.start_element(line_tag)?;
        w.text_element("cbc:ID", &(i + 1).to_string())?;
        w.quantity_element(qty_tag, quantity, unit)?;
        w.amount_element("cbc:LineExtensionAmount", total, currency)?;
        w.start_element("cac:Item")?;
        w.text_element("cbc:Name", &line.description)?;
        w.start_element("cac:ClassifiedTaxCategory")?;
        w.text_element("cbc:ID", category)?;
        w.text_element("cbc:Percent", &format_decimal(rate))?;
        w.start_element("cac:TaxScheme")?;
        w.text_element("cbc:ID", "VAT")?;
        w.end_element("cac:TaxScheme")?;
        w.end_element("cac:ClassifiedTaxCategory")?;
        w.end_element("cac:Item")?;
        w.start_element("cac:Price")?;
        w.amount_element("cbc:PriceAmount", unit_price, currency)?;
        w.end_element("cac:Price")?;
        w.end_element(line_tag)?;
    }

    w.end_element(root_tag)?;
    w.into_string()
}

fn write_party(
    w: &mut XmlWriter,
    party: &TradeParty,
    wrapper: &str,
    descriptor: &'static FormatDescriptor,
) -> Result<(), GenerateError> {
    w.start_element(wrapper)?;
    w.start_element("cac:Party")?;

    // BT-34/49: Endpoint — mandatory on the Peppol network
    match endpoint_for(party) {
        Some((scheme, value)) => {
            w.text_element_with_attrs("cbc:EndpointID", &value, &[("schemeID", &scheme)])?;
        }
        None if descriptor.id == FormatId::PeppolBis => {
            return Err(missing(descriptor, "electronic_address"));
        }
        None => {}
    }

    // BG-5/8: Postal address
    w.start_element("cac:PostalAddress")?;
    if let Some(street) = party.address_lines.first() {
        w.text_element("cbc:StreetName", street)?;
    }
    if let Some(additional) = party.address_lines.get(1) {
        w.text_element("cbc:AdditionalStreetName", additional)?;
    }
    if let Some(city) = &party.city {
        w.text_element("cbc:CityName", city)?;
    }
    if let Some(postal) = &party.postal_code {
        w.text_element("cbc:PostalZone", postal)?;
    }
    if let Some(country) = &party.country_code {
        w.start_element("cac:Country")?;
        w.text_element("cbc:IdentificationCode", country)?;
        w.end_element("cac:Country")?;
    }
    w.end_element("cac:PostalAddress")?;

    // BT-31/48: VAT registration
    if let Some(vat_id) = &party.vat_id {
        w.start_element("cac:PartyTaxScheme")?;
        w.text_element("cbc:CompanyID", vat_id)?;
        w.start_element("cac:TaxScheme")?;
        w.text_element("cbc:ID", "VAT")?;
        w.end_element("cac:TaxScheme")?;
        w.end_element("cac:PartyTaxScheme")?;
    }

    // BT-27/44: Registration name
    w.start_element("cac:PartyLegalEntity")?;
    w.text_element("cbc:RegistrationName", &party.name)?;
    if let Some(tax_number) = &party.tax_number {
        w.text_element("cbc:CompanyID", tax_number)?;
    }
    w.end_element("cac:PartyLegalEntity")?;

    // BG-6/9: Contact
    if party.contact_name.is_some() || party.phone.is_some() || party.email.is_some() {
        w.start_element("cac:Contact")?;
        if let Some(name) = &party.contact_name {
            w.text_element("cbc:Name", name)?;
        }
        if let Some(phone) = &party.phone {
            w.text_element("cbc:Telephone", phone)?;
        }
        if let Some(email) = &party.email {
            w.text_element("cbc:ElectronicMail", email)?;
        }
        w.end_element("cac:Contact")?;
    }

    w.end_element("cac:Party")?;
    w.end_element(wrapper)?;
    Ok(())
}

/// Resolve the endpoint identifier for a party: explicit electronic address
/// first, then email under the "EM" scheme, then the VAT identifier under
/// the country's VAT scheme.
fn endpoint_for(party: &TradeParty) -> Option<(String, String)> {
    if let Some(ea) = &party.electronic_address {
        return Some((ea.scheme.clone(), ea.value.clone()));
    }
    if let Some(email) = &party.email {
        return Some(("EM".into(), email.clone()));
    }
    if let (Some(vat_id), Some(country)) = (&party.vat_id, party.country_code.as_deref()) {
        if let Some(scheme) = vat_scheme_for_country(country) {
            return Some((scheme.into(), vat_id.clone()));
        }
    }
    None
}

/// Default EAS scheme for a VAT-number endpoint, by country.
fn vat_scheme_for_country(country: &str) -> Option<&'static str> {
    match country {
        "DE" => Some("9930"),
        "AT" => Some("9914"),
        "BE" => Some("9925"),
        "FR" => Some("9957"),
        "IT" => Some("9906"),
        "NL" => Some("9944"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ElectronicAddress;

    #[test]
    fn endpoint_prefers_explicit_address() {
        let party = TradeParty {
            name: "X".into(),
            electronic_address: Some(ElectronicAddress {
                scheme: "0204".into(),
                value: "04011000-1234-56".into(),
            }),
            email: Some("x@example.com".into()),
            ..TradeParty::default()
        };
        assert_eq!(
            endpoint_for(&party),
            Some(("0204".to_string(), "04011000-1234-56".to_string()))
        );
    }

    #[test]
    fn endpoint_falls_back_to_email_then_vat() {
        let mut party = TradeParty {
            name: "X".into(),
            email: Some("x@example.com".into()),
            vat_id: Some("DE123456789".into()),
            country_code: Some("DE".into()),
            ..TradeParty::default()
        };
        assert_eq!(
            endpoint_for(&party),
            Some(("EM".to_string(), "x@example.com".to_string()))
        );

        party.email = None;
        assert_eq!(
            endpoint_for(&party),
            Some(("9930".to_string(), "DE123456789".to_string()))
        );
    }
}
