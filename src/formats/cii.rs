//! CII syntax family: XRechnung (CII) and the Factur-X profiles.
//!
//! UN/CEFACT Cross Industry Invoice, EN 16931 element order. The Factur-X
//! generators reuse this writer with their profile's guideline URN and wrap
//! the result in a PDF/A-3 container.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::descriptor::FormatDescriptor;
use super::xml::{XmlWriter, format_decimal};
use super::{FormatGenerator, GeneratedDocument, vat_breakdown};
use crate::core::{CanonicalInvoice, GenerateError, TradeParty};

/// CII namespace URIs.
mod ns {
    pub const RSM: &str = "urn:un:unece:uncefact:data:standard:CrossIndustryInvoice:100";
    pub const RAM: &str =
        "urn:un:unece:uncefact:data:standard:ReusableAggregateBusinessInformationEntity:100";
    pub const QDT: &str = "urn:un:unece:uncefact:data:standard:QualifiedDataType:100";
    pub const UDT: &str = "urn:un:unece:uncefact:data:standard:UnqualifiedDataType:100";
}

pub(crate) struct CiiGenerator {
    descriptor: &'static FormatDescriptor,
}

impl CiiGenerator {
    pub(crate) fn new(descriptor: &'static FormatDescriptor) -> Self {
        Self { descriptor }
    }
}

impl FormatGenerator for CiiGenerator {
    fn descriptor(&self) -> &'static FormatDescriptor {
        self.descriptor
    }

    fn generate(&self, invoice: &CanonicalInvoice) -> Result<GeneratedDocument, GenerateError> {
        self.descriptor.check_mandatory(invoice)?;
        let xml = to_cii_xml(invoice, self.descriptor)?;
        Ok(GeneratedDocument { xml, pdf: None })
    }
}

fn missing(descriptor: &FormatDescriptor, field: &'static str) -> GenerateError {
    GenerateError::MissingField {
        format: descriptor.id,
        field,
    }
}

pub(crate) fn to_cii_xml(
    invoice: &CanonicalInvoice,
    descriptor: &'static FormatDescriptor,
) -> Result<String, GenerateError> {
    let currency = invoice.currency_code.as_str();
    let issue_date = invoice
        .issue_date
        .ok_or_else(|| missing(descriptor, "issue_date"))?;

    let mut w = XmlWriter::new()?;
    w.start_element_with_attrs(
        "rsm:CrossIndustryInvoice",
        &[
            ("xmlns:rsm", ns::RSM),
            ("xmlns:ram", ns::RAM),
            ("xmlns:qdt", ns::QDT),
            ("xmlns:udt", ns::UDT),
        ],
    )?;

    // --- ExchangedDocumentContext ---
    w.start_element("rsm:ExchangedDocumentContext")?;
    if let Some(profile) = descriptor.profile_id {
        w.start_element("ram:BusinessProcessSpecifiedDocumentContextParameter")?;
        w.text_element("ram:ID", profile)?;
        w.end_element("ram:BusinessProcessSpecifiedDocumentContextParameter")?;
    }
    w.start_element("ram:GuidelineSpecifiedDocumentContextParameter")?;
    w.text_element("ram:ID", descriptor.customization_id)?;
    w.end_element("ram:GuidelineSpecifiedDocumentContextParameter")?;
    w.end_element("rsm:ExchangedDocumentContext")?;

    // --- ExchangedDocument ---
    w.start_element("rsm:ExchangedDocument")?;
    w.text_element("ram:ID", &invoice.invoice_number)?;
    w.text_element("ram:TypeCode", &invoice.type_code.code().to_string())?;
    write_cii_date(&mut w, "ram:IssueDateTime", &issue_date)?;
    for note in &invoice.notes {
        w.start_element("ram:IncludedNote")?;
        w.text_element("ram:Content", note)?;
        w.end_element("ram:IncludedNote")?;
    }
    w.end_element("rsm:ExchangedDocument")?;

    // --- SupplyChainTradeTransaction ---
    w.start_element("rsm:SupplyChainTradeTransaction")?;

    // BG-25: Lines first per CII element order
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

        w.start_element("ram:IncludedSupplyChainTradeLineItem")?;
        w.start_element("ram:AssociatedDocumentLineDocument")?;
        w.text_element("ram:LineID", &(i + 1).to_string())?;
        w.end_element("ram:AssociatedDocumentLineDocument")?;

        w.start_element("ram:SpecifiedTradeProduct")?;
        w.text_element("ram:Name", &line.description)?;
        w.end_element("ram:SpecifiedTradeProduct")?;

        w.start_element("ram:SpecifiedLineTradeAgreement")?;
        w.start_element("ram:NetPriceProductTradePrice")?;
        w.text_element("ram:ChargeAmount", &format_decimal(unit_price))?;
        w.end_element("ram:NetPriceProductTradePrice")?;
        w.end_element("ram:SpecifiedLineTradeAgreement")?;

        w.start_element("ram:SpecifiedLineTradeDelivery")?;
        w.text_element_with_attrs(
            "ram:BilledQuantity",
            &format_decimal(quantity),
            &[("unitCode", unit)],
        )?;
        w.end_element("ram:SpecifiedLineTradeDelivery")?;

        w.start_element("ram:SpecifiedLineTradeSettlement")?;
        w.start_element("ram:ApplicableTradeTax")?;
        w.text_element("ram:TypeCode", "VAT")?;
        w.text_element("ram:CategoryCode", category)?;
        w.text_element("ram:RateApplicablePercent", &format_decimal(rate))?;
        w.end_element("ram:ApplicableTradeTax")?;
        w.start_element("ram:SpecifiedTradeSettlementLineMonetarySummation")?;
        w.text_element("ram:LineTotalAmount", &format_decimal(total))?;
        w.end_element("ram:SpecifiedTradeSettlementLineMonetarySummation")?;
        w.end_element("ram:SpecifiedLineTradeSettlement")?;

        w.end_element("ram:IncludedSupplyChainTradeLineItem")?;
    }

    // --- ApplicableHeaderTradeAgreement ---
    w.start_element("ram:ApplicableHeaderTradeAgreement")?;
    if let Some(br) = &invoice.buyer_reference {
        w.text_element("ram:BuyerReference", br)?;
    }
    write_cii_party(&mut w, &invoice.seller, "ram:SellerTradeParty")?;
    write_cii_party(&mut w, &invoice.buyer, "ram:BuyerTradeParty")?;
    w.end_element("ram:ApplicableHeaderTradeAgreement")?;

    // --- ApplicableHeaderTradeDelivery ---
    w.start_element("ram:ApplicableHeaderTradeDelivery")?;
    w.end_element("ram:ApplicableHeaderTradeDelivery")?;

    // --- ApplicableHeaderTradeSettlement ---
    w.start_element("ram:ApplicableHeaderTradeSettlement")?;
    w.text_element("ram:InvoiceCurrencyCode", currency)?;

    if let Some(iban) = &invoice.payment.iban {
        w.start_element("ram:SpecifiedTradeSettlementPaymentMeans")?;
        w.text_element("ram:TypeCode", "58")?;
        w.start_element("ram:PayeePartyCreditorFinancialAccount")?;
        w.text_element("ram:IBANID", iban)?;
        w.end_element("ram:PayeePartyCreditorFinancialAccount")?;
        if let Some(bic) = &invoice.payment.bic {
            w.start_element("ram:PayeeSpecifiedCreditorFinancialInstitution")?;
            w.text_element("ram:BICID", bic)?;
            w.end_element("ram:PayeeSpecifiedCreditorFinancialInstitution")?;
        }
        w.end_element("ram:SpecifiedTradeSettlementPaymentMeans")?;
    }

    let groups = vat_breakdown(invoice);
    for group in &groups {
        w.start_element("ram:ApplicableTradeTax")?;
        w.text_element("ram:CalculatedAmount", &format_decimal(group.tax))?;
        w.text_element("ram:TypeCode", "VAT")?;
        w.text_element("ram:BasisAmount", &format_decimal(group.taxable))?;
        w.text_element("ram:CategoryCode", group.category.code())?;
        w.text_element("ram:RateApplicablePercent", &format_decimal(group.rate))?;
        w.end_element("ram:ApplicableTradeTax")?;
    }

    // BG-14: Billing period
    if let Some(period) = &invoice.billing_period {
        w.start_element("ram:BillingSpecifiedPeriod")?;
        write_cii_date(&mut w, "ram:StartDateTime", &period.start)?;
        write_cii_date(&mut w, "ram:EndDateTime", &period.end)?;
        w.end_element("ram:BillingSpecifiedPeriod")?;
    }

    if invoice.payment.terms.is_some() || invoice.payment.due_date.is_some() {
        w.start_element("ram:SpecifiedTradePaymentTerms")?;
        if let Some(terms) = &invoice.payment.terms {
            w.text_element("ram:Description", terms)?;
        }
        if let Some(due) = &invoice.payment.due_date {
            write_cii_date(&mut w, "ram:DueDateDateTime", due)?;
        }
        w.end_element("ram:SpecifiedTradePaymentTerms")?;
    }

    let computed_tax: Decimal = groups.iter().map(|g| g.tax).sum();
    let line_sum: Decimal = invoice.lines.iter().filter_map(|l| l.total_price).sum();
    let subtotal = invoice.totals.subtotal.unwrap_or(line_sum);
    let tax_total = invoice.totals.tax_amount.unwrap_or(computed_tax);
    let grand_total = invoice
        .totals
        .total_amount
        .ok_or_else(|| missing(descriptor, "totals.total_amount"))?;

    w.start_element("ram:SpecifiedTradeSettlementHeaderMonetarySummation")?;
    w.text_element("ram:LineTotalAmount", &format_decimal(line_sum))?;
    w.text_element("ram:TaxBasisTotalAmount", &format_decimal(subtotal))?;
    w.text_element_with_attrs(
        "ram:TaxTotalAmount",
        &format_decimal(tax_total),
        &[("currencyID", currency)],
    )?;
    w.text_element("ram:GrandTotalAmount", &format_decimal(grand_total))?;
    w.text_element("ram:DuePayableAmount", &format_decimal(grand_total))?;
    w.end_element("ram:SpecifiedTradeSettlementHeaderMonetarySummation")?;

    // BT-25: Preceding invoice reference
    if let Some(pi) = &invoice.preceding_invoice {
        w.start_element("ram:InvoiceReferencedDocument")?;
        w.text_element("ram:IssuerAssignedID", pi)?;
        w.end_element("ram:InvoiceReferencedDocument")?;
    }

    w.end_element("ram:ApplicableHeaderTradeSettlement")?;
    w.end_element("rsm:SupplyChainTradeTransaction")?;
    w.end_element("rsm:CrossIndustryInvoice")?;

    w.into_string()
}

fn write_cii_date(
    w: &mut XmlWriter,
    element: &str,
    date: &NaiveDate,
) -> Result<(), GenerateError> {
    w.start_element(element)?;
    w.text_element_with_attrs(
        "udt:DateTimeString",
        &date.format("%Y%m%d").to_string(),
        &[("format", "102")],
    )?;
    w.end_element(element)?;
    Ok(())
}

fn write_cii_party(
    w: &mut XmlWriter,
    party: &TradeParty,
    element: &str,
) -> Result<(), GenerateError> {
    w.start_element(element)?;
    w.text_element("ram:Name", &party.name)?;

    if let Some(contact_name) = &party.contact_name {
        w.start_element("ram:DefinedTradeContact")?;
        w.text_element("ram:PersonName", contact_name)?;
        if let Some(phone) = &party.phone {
            w.start_element("ram:TelephoneUniversalCommunication")?;
            w.text_element("ram:CompleteNumber", phone)?;
            w.end_element("ram:TelephoneUniversalCommunication")?;
        }
        w.end_element("ram:DefinedTradeContact")?;
    }

    w.start_element("ram:PostalTradeAddress")?;
    if let Some(postal) = &party.postal_code {
        w.text_element("ram:PostcodeCode", postal)?;
    }
    if let Some(street) = party.address_lines.first() {
        w.text_element("ram:LineOne", street)?;
    }
    if let Some(additional) = party.address_lines.get(1) {
        w.text_element("ram:LineTwo", additional)?;
    }
    if let Some(city) = &party.city {
        w.text_element("ram:CityName", city)?;
    }
    if let Some(country) = &party.country_code {
        w.text_element("ram:CountryID", country)?;
    }
    w.end_element("ram:PostalTradeAddress")?;

    if let Some(email) = &party.email {
        w.start_element("ram:URIUniversalCommunication")?;
        w.text_element_with_attrs("ram:URIID", email, &[("schemeID", "EM")])?;
        w.end_element("ram:URIUniversalCommunication")?;
    }

    if let Some(vat_id) = &party.vat_id {
        w.start_element("ram:SpecifiedTaxRegistration")?;
        w.text_element_with_attrs("ram:ID", vat_id, &[("schemeID", "VA")])?;
        w.end_element("ram:SpecifiedTaxRegistration")?;
    } else if let Some(tax_number) = &party.tax_number {
        w.start_element("ram:SpecifiedTaxRegistration")?;
        w.text_element_with_attrs("ram:ID", tax_number, &[("schemeID", "FC")])?;
        w.end_element("ram:SpecifiedTaxRegistration")?;
    }

    w.end_element(element)?;
    Ok(())
}
