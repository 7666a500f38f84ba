//! PDF/A-3 container construction for the Factur-X family.
//!
//! Builds a minimal human-readable invoice page and attaches the CII XML
//! as `factur-x.xml` with the XMP extension schema the Factur-X 1.0
//! specification requires. No timestamps or random identifiers are
//! written, so output is byte-stable for identical input.

use lopdf::{Document, Object, Stream, dictionary};

use crate::core::{CanonicalInvoice, GenerateError};

/// The embedded XML filename per Factur-X 1.0+ specification.
pub const FACTURX_FILENAME: &str = "factur-x.xml";

fn pdf_err(msg: impl std::fmt::Display) -> GenerateError {
    GenerateError::Pdf(msg.to_string())
}

/// Build the Factur-X PDF/A-3 for an invoice: visual page plus embedded XML.
///
/// `conformance_level` is the XMP `fx:ConformanceLevel` value ("EN 16931",
/// "BASIC"); `af_relationship` the PDF `AFRelationship` for the file spec.
pub(crate) fn build_facturx_pdf(
    invoice: &CanonicalInvoice,
    xml: &str,
    conformance_level: &str,
    af_relationship: &str,
) -> Result<Vec<u8>, GenerateError> {
    let mut doc = build_invoice_page(invoice)?;
    embed_xml_into_document(&mut doc, xml.as_bytes(), conformance_level, af_relationship)?;

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| pdf_err(format!("failed to save PDF: {e}")))?;
    Ok(output)
}

/// Escape a string for a PDF literal string in a content stream.
fn pdf_text(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii() && !c.is_control())
        .flat_map(|c| match c {
            '(' | ')' | '\\' => vec!['\\', c],
            c => vec![c],
        })
        .collect()
}

/// A single A4 page showing the key invoice data. The machine-readable
/// content is the embedded XML; this page exists so the file remains a
/// legible invoice for human recipients.
fn build_invoice_page(invoice: &CanonicalInvoice) -> Result<Document, GenerateError> {
    let mut doc = Document::with_version("1.7");

    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => Object::Reference(font_id),
        },
    });

    let total = invoice
        .totals
        .total_amount
        .map(|t| format!("{t} {}", invoice.currency_code))
        .unwrap_or_default();
    let issue_date = invoice
        .issue_date
        .map(|d| d.to_string())
        .unwrap_or_default();

    let mut content = String::from("BT /F1 16 Tf 50 780 Td (Invoice ");
    content.push_str(&pdf_text(&invoice.invoice_number));
    content.push_str(") Tj ET\n");
    let rows = [
        format!("Date: {issue_date}"),
        format!("Seller: {}", invoice.seller.name),
        format!("Buyer: {}", invoice.buyer.name),
        format!("Total: {total}"),
    ];
    for (i, row) in rows.iter().enumerate() {
        content.push_str(&format!(
            "BT /F1 11 Tf 50 {} Td ({}) Tj ET\n",
            750 - i * 18,
            pdf_text(row)
        ));
    }

    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => Object::Reference(pages_id),
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        "Contents" => Object::Reference(content_id),
        "Resources" => Object::Reference(resources_id),
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![Object::Reference(page_id)],
        "Count" => 1,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    Ok(doc)
}

fn embed_xml_into_document(
    doc: &mut Document,
    xml_bytes: &[u8],
    conformance_level: &str,
    af_relationship: &str,
) -> Result<(), GenerateError> {
    // 1. EmbeddedFile stream
    let ef_stream = Stream::new(
        dictionary! {
            "Type" => "EmbeddedFile",
            "Subtype" => Object::Name(b"text#2Fxml".to_vec()),
            "Params" => dictionary! {
                "Size" => Object::Integer(xml_bytes.len() as i64),
            },
        },
        xml_bytes.to_vec(),
    );
    let ef_stream_id = doc.add_object(ef_stream);

    // 2. FileSpec dictionary
    let filespec = dictionary! {
        "Type" => "Filespec",
        "F" => Object::string_literal(FACTURX_FILENAME),
        "UF" => Object::string_literal(FACTURX_FILENAME),
        "Desc" => Object::string_literal("Factur-X XML invoice"),
        "AFRelationship" => Object::Name(af_relationship.as_bytes().to_vec()),
        "EF" => dictionary! {
            "F" => Object::Reference(ef_stream_id),
            "UF" => Object::Reference(ef_stream_id),
        },
    };
    let filespec_id = doc.add_object(filespec);

    // 3. EmbeddedFiles name tree
    let ef_name_tree = dictionary! {
        "Names" => Object::Array(vec![
            Object::string_literal(FACTURX_FILENAME),
            Object::Reference(filespec_id),
        ]),
    };
    let ef_name_tree_id = doc.add_object(ef_name_tree);

    // 4. Names dictionary
    let names_dict = dictionary! {
        "EmbeddedFiles" => Object::Reference(ef_name_tree_id),
    };
    let names_id = doc.add_object(names_dict);

    // 5. XMP metadata stream — must not be compressed per PDF/A
    let xmp_str = build_xmp(conformance_level);
    let metadata_stream = Stream::new(
        dictionary! {
            "Type" => "Metadata",
            "Subtype" => "XML",
        },
        xmp_str.into_bytes(),
    )
    .with_compression(false);
    let metadata_id = doc.add_object(metadata_stream);

    // 6. Catalog
    let catalog = doc
        .catalog_mut()
        .map_err(|e| pdf_err(format!("failed to get catalog: {e}")))?;
    catalog.set("AF", Object::Array(vec![Object::Reference(filespec_id)]));
    catalog.set("Names", Object::Reference(names_id));
    catalog.set("Metadata", Object::Reference(metadata_id));
    catalog.set(
        "MarkInfo",
        dictionary! { "Marked" => Object::Boolean(true) },
    );

    Ok(())
}

/// Build the XMP metadata block for a Factur-X PDF/A-3 document.
fn build_xmp(conformance_level: &str) -> String {
    format!(
        r#"<?xpacket begin="{BOM}" id="W5M0MpCehiHzreSzNTczkc9d"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/">
  <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
    <rdf:Description rdf:about=""
        xmlns:pdfaid="http://www.aiim.org/pdfa/ns/id/">
      <pdfaid:part>3</pdfaid:part>
      <pdfaid:conformance>B</pdfaid:conformance>
    </rdf:Description>
    <rdf:Description rdf:about=""
        xmlns:dc="http://purl.org/dc/elements/1.1/">
      <dc:title>
        <rdf:Alt>
          <rdf:li xml:lang="x-default">Factur-X Invoice</rdf:li>
        </rdf:Alt>
      </dc:title>
    </rdf:Description>
    <rdf:Description rdf:about=""
        xmlns:pdfaExtension="http://www.aiim.org/pdfa/ns/extension/"
        xmlns:pdfaSchema="http://www.aiim.org/pdfa/ns/schema#"
        xmlns:pdfaProperty="http://www.aiim.org/pdfa/ns/property#">
      <pdfaExtension:schemas>
        <rdf:Bag>
          <rdf:li rdf:parseType="Resource">
            <pdfaSchema:schema>Factur-X PDFA Extension Schema</pdfaSchema:schema>
            <pdfaSchema:namespaceURI>urn:factur-x:pdfa:CrossIndustryDocument:invoice:1p0#</pdfaSchema:namespaceURI>
            <pdfaSchema:prefix>fx</pdfaSchema:prefix>
            <pdfaSchema:property>
              <rdf:Seq>
                <rdf:li rdf:parseType="Resource">
                  <pdfaProperty:name>DocumentFileName</pdfaProperty:name>
                  <pdfaProperty:valueType>Text</pdfaProperty:valueType>
                  <pdfaProperty:category>external</pdfaProperty:category>
                  <pdfaProperty:description>name of the embedded XML invoice file</pdfaProperty:description>
                </rdf:li>
                <rdf:li rdf:parseType="Resource">
                  <pdfaProperty:name>DocumentType</pdfaProperty:name>
                  <pdfaProperty:valueType>Text</pdfaProperty:valueType>
                  <pdfaProperty:category>external</pdfaProperty:category>
                  <pdfaProperty:description>INVOICE</pdfaProperty:description>
                </rdf:li>
                <rdf:li rdf:parseType="Resource">
                  <pdfaProperty:name>Version</pdfaProperty:name>
                  <pdfaProperty:valueType>Text</pdfaProperty:valueType>
                  <pdfaProperty:category>external</pdfaProperty:category>
                  <pdfaProperty:description>The actual version of the Factur-X XML schema</pdfaProperty:description>
                </rdf:li>
                <rdf:li rdf:parseType="Resource">
                  <pdfaProperty:name>ConformanceLevel</pdfaProperty:name>
                  <pdfaProperty:valueType>Text</pdfaProperty:valueType>
                  <pdfaProperty:category>external</pdfaProperty:category>
                  <pdfaProperty:description>The conformance level of the embedded Factur-X data</pdfaProperty:description>
                </rdf:li>
              </rdf:Seq>
            </pdfaSchema:property>
          </rdf:li>
        </rdf:Bag>
      </pdfaExtension:schemas>
    </rdf:Description>
    <rdf:Description rdf:about=""
        xmlns:fx="urn:factur-x:pdfa:CrossIndustryDocument:invoice:1p0#">
      <fx:DocumentType>INVOICE</fx:DocumentType>
      <fx:DocumentFileName>factur-x.xml</fx:DocumentFileName>
      <fx:Version>1.0</fx:Version>
      <fx:ConformanceLevel>{conformance_level}</fx:ConformanceLevel>
    </rdf:Description>
  </rdf:RDF>
</x:xmpmeta>
<?xpacket end="w"?>"#,
        BOM = '\u{FEFF}',
        conformance_level = conformance_level,
    )
}
