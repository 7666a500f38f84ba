//! Factur-X / ZUGFeRD generators: CII XML embedded in a PDF/A-3 container.

use super::cii::to_cii_xml;
use super::descriptor::FormatDescriptor;
use super::pdf::build_facturx_pdf;
use super::{FormatGenerator, GeneratedDocument};
use crate::core::{CanonicalInvoice, FormatId, GenerateError};

pub(crate) struct FacturXGenerator {
    descriptor: &'static FormatDescriptor,
}

impl FacturXGenerator {
    pub(crate) fn new(descriptor: &'static FormatDescriptor) -> Self {
        Self { descriptor }
    }

    /// The XMP `fx:ConformanceLevel` value for this profile.
    fn conformance_level(&self) -> &'static str {
        match self.descriptor.id {
            FormatId::FacturxBasic => "BASIC",
            _ => "EN 16931",
        }
    }

    /// `AFRelationship` for the embedded file spec. Both supported profiles
    /// carry full invoice data, so the XML is an alternative representation
    /// of the page (only the data-only Minimum/BasicWL profiles use "Data").
    fn af_relationship(&self) -> &'static str {
        "Alternative"
    }
}

impl FormatGenerator for FacturXGenerator {
    fn descriptor(&self) -> &'static FormatDescriptor {
        self.descriptor
    }

    fn generate(&self, invoice: &CanonicalInvoice) -> Result<GeneratedDocument, GenerateError> {
        self.descriptor.check_mandatory(invoice)?;
        let xml = to_cii_xml(invoice, self.descriptor)?;
        let pdf = build_facturx_pdf(invoice, &xml, self.conformance_level(), self.af_relationship())?;
        Ok(GeneratedDocument { xml, pdf: Some(pdf) })
    }
}
