use crate::{
    cancel::CancelToken,
    document::Document,
    error::PdfResult,
    instructions::OcrInstruction,
    objects::{Dictionary, Object},
    page::{self, Page},
};

/// Lays recognized text invisibly over scanned pages: one appended
/// content stream per page, text render mode 3, each word positioned at
/// its bbox origin
#[derive(Debug, Default)]
pub struct OcrHandler;

impl OcrHandler {
    pub fn apply(
        &self,
        doc: &mut Document,
        instructions: &[OcrInstruction],
        cancel: &CancelToken,
    ) -> PdfResult<()> {
        for instruction in instructions {
            cancel.check()?;

            let page = page::page_at(doc, instruction.page)?;
            let font_key = text_font_key(doc, &page)?;
            let stream = build_text_stream(&font_key, instruction);

            page::append_content_stream(doc, &page, stream)?;
        }

        Ok(())
    }
}

/// The resource key of a Helvetica to draw with: an existing one is
/// reused, otherwise the font is registered under the lowest-numbered
/// unused `Fk` key
fn text_font_key(doc: &mut Document, page: &Page) -> PdfResult<String> {
    if let Some(resources) = page::resources(doc, page) {
        if let Some(fonts) = doc.dict_get_dict(resources, "Font") {
            for (key, value) in fonts.iter() {
                let font = doc.resolve(value);
                if let Some(dict) = font.as_dict() {
                    if dict.get_name("BaseFont") == Some("Helvetica")
                        && dict.get_name("Subtype") == Some("Type1")
                    {
                        return Ok(key.clone());
                    }
                }
            }
        }
    }

    let key = {
        let taken = page::resources(doc, page)
            .and_then(|resources| doc.dict_get_dict(resources, "Font"));

        let mut k = 1;
        loop {
            let candidate = format!("F{}", k);
            match taken {
                Some(fonts) if fonts.contains_key(&candidate) => k += 1,
                _ => break candidate,
            }
        }
    };

    let helvetica = doc.add_object(Object::Dictionary(Dictionary::from_entries(vec![
        ("Type", Object::name("Font")),
        ("Subtype", Object::name("Type1")),
        ("BaseFont", Object::name("Helvetica")),
        ("Encoding", Object::name("WinAnsiEncoding")),
    ])));

    let resources_addr = page::ensure_resources(doc, page)?;
    let resources = doc.dict_at_mut(&resources_addr)?;
    match resources.get_mut("Font") {
        Some(Object::Dictionary(fonts)) => {
            fonts.insert(key.clone(), Object::Reference(helvetica));
        }
        _ => {
            resources.insert(
                "Font",
                Object::Dictionary(Dictionary::from_entries(vec![(
                    key.as_str(),
                    Object::Reference(helvetica),
                )])),
            );
        }
    }

    Ok(key)
}

/// Invisible-text program: one `Tf`/`Tm`/`Tj` triple per word. Numbers are
/// formatted with two decimals; the word's bbox height doubles as the
/// font size
fn build_text_stream(font_key: &str, instruction: &OcrInstruction) -> Vec<u8> {
    let mut out = String::new();
    out.push_str("BT\n");
    out.push_str("3 Tr\n");

    for word in &instruction.words {
        if word.text.is_empty() {
            continue;
        }

        let font_size = if word.bbox.height > 0.0 {
            word.bbox.height
        } else {
            12.0
        };

        out.push_str(&format!("/{} {:.2} Tf\n", font_key, font_size));
        out.push_str(&format!(
            "1 0 0 1 {:.2} {:.2} Tm\n",
            word.bbox.x, word.bbox.y
        ));
        out.push_str(&format!("({}) Tj\n", escape_text(&word.text)));
    }

    out.push_str("ET");
    out.into_bytes()
}

fn escape_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
}
