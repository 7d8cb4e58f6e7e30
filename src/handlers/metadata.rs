use crate::{
    document::{Address, Document},
    error::PdfResult,
    instructions::MetadataInstruction,
    objects::{Dictionary, Object, Stream},
    page,
};

/// Document-level metadata: info title, catalog language, viewer
/// preferences, MarkInfo, page tab order and the XMP packet
#[derive(Debug, Default)]
pub struct MetadataHandler;

impl MetadataHandler {
    pub fn apply(&self, doc: &mut Document, instruction: &MetadataInstruction) -> PdfResult<()> {
        if let Some(title) = &instruction.title {
            doc.info_mut()?
                .insert("Title", Object::string(title.clone()));
        }

        if let Some(language) = &instruction.language {
            doc.catalog_mut()?
                .insert("Lang", Object::string(language.clone()));
        }

        if let Some(display) = instruction.display_doc_title {
            set_catalog_sub_entry(doc, "ViewerPreferences", "DisplayDocTitle", Object::Boolean(display))?;
        }

        if let Some(marked) = instruction.mark_info {
            set_catalog_sub_entry(doc, "MarkInfo", "Marked", Object::Boolean(marked))?;
        }

        if let Some(tab_order) = instruction.tab_order {
            for page in page::pages(doc)? {
                let addr = Address::new(page.object_number);
                doc.dict_at_mut(&addr)?
                    .insert("Tabs", Object::name(tab_order.pdf_name()));
            }
        }

        if instruction.title.is_some() || instruction.pdf_ua_identifier.is_some() {
            write_xmp(doc, instruction)?;
        }

        Ok(())
    }
}

/// Sets one key inside a direct or referenced catalog subdictionary,
/// creating the subdictionary when absent
fn set_catalog_sub_entry(
    doc: &mut Document,
    dict_key: &str,
    key: &str,
    value: Object,
) -> PdfResult<()> {
    if !doc.catalog()?.contains_key(dict_key) {
        doc.catalog_mut()?
            .insert(dict_key, Object::Dictionary(Dictionary::new()));
    }

    let catalog_number = doc.catalog_number()?;
    let addr = doc.locate(catalog_number, &[dict_key])?;
    doc.dict_at_mut(&addr)?.insert(key, value);

    Ok(())
}

/// Replaces the catalog `/Metadata` stream with a generated XMP packet
/// carrying the producer, the Dublin Core title and, when requested, the
/// PDF/UA identifier part
fn write_xmp(doc: &mut Document, instruction: &MetadataInstruction) -> PdfResult<()> {
    let xml = render_xmp(
        instruction.title.as_deref(),
        instruction.pdf_ua_identifier,
        instruction.language.as_deref(),
    );

    let dict = Dictionary::from_entries(vec![
        ("Type", Object::name("Metadata")),
        ("Subtype", Object::name("XML")),
    ]);
    let stream = doc.add_object(Object::Stream(Stream::new(dict, xml.into_bytes())));
    doc.catalog_mut()?
        .insert("Metadata", Object::Reference(stream));

    Ok(())
}

fn render_xmp(title: Option<&str>, pdf_ua_part: Option<i64>, language: Option<&str>) -> String {
    let mut descriptions = String::new();

    descriptions.push_str(&format!(
        r#"  <rdf:Description rdf:about="" xmlns:pdf="http://ns.adobe.com/pdf/1.3/">
   <pdf:Producer>{}</pdf:Producer>
  </rdf:Description>
"#,
        escape_xml(crate::interpreter::PROCESSOR)
    ));

    if let Some(title) = title {
        descriptions.push_str(&format!(
            r#"  <rdf:Description rdf:about="" xmlns:dc="http://purl.org/dc/elements/1.1/">
   <dc:title>
    <rdf:Alt>
     <rdf:li xml:lang="{}">{}</rdf:li>
    </rdf:Alt>
   </dc:title>
  </rdf:Description>
"#,
            language.unwrap_or("x-default"),
            escape_xml(title)
        ));
    }

    if let Some(part) = pdf_ua_part {
        descriptions.push_str(&format!(
            r#"  <rdf:Description rdf:about="" xmlns:pdfuaid="http://www.aiim.org/pdfua/ns/id/">
   <pdfuaid:part>{}</pdfuaid:part>
  </rdf:Description>
"#,
            part
        ));
    }

    format!(
        "<?xpacket begin=\"\u{FEFF}\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>\n\
         <x:xmpmeta xmlns:x=\"adobe:ns:meta/\">\n \
         <rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\">\n\
         {}</rdf:RDF>\n\
         </x:xmpmeta>\n\
         <?xpacket end=\"w\"?>",
        descriptions
    )
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
