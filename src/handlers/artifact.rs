use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::{
    bbox,
    cancel::CancelToken,
    content,
    data_structures::Rectangle,
    document::Document,
    error::PdfResult,
    handlers::tagging::splice_brackets,
    instructions::ArtifactInstruction,
    page::{self, Page},
};

/// Wraps the operators each instruction's bbox resolves to in
/// `/Artifact <</Type /…>> BDC … EMC` brackets. No structure wiring is
/// involved; artifacts are exactly the content assistive technology skips
#[derive(Debug, Default)]
pub struct ArtifactHandler;

impl ArtifactHandler {
    pub fn apply(
        &self,
        doc: &mut Document,
        entries: &[ArtifactInstruction],
        cancel: &CancelToken,
    ) -> PdfResult<()> {
        let mut by_page: BTreeMap<usize, Vec<&ArtifactInstruction>> = BTreeMap::new();
        for entry in entries {
            by_page.entry(entry.page).or_default().push(entry);
        }

        for (page_number, entries) in by_page {
            cancel.check()?;
            let page = page::page_at(doc, page_number)?;
            apply_page(doc, &page, &entries)?;
        }

        Ok(())
    }
}

fn apply_page(doc: &mut Document, page: &Page, entries: &[&ArtifactInstruction]) -> PdfResult<()> {
    // operators claimed by more than one entry keep the first entry's type
    let mut type_ids: Vec<String> = Vec::new();
    let mut id_by_operator: HashMap<usize, i64> = HashMap::new();

    for entry in entries {
        let target = Rectangle::from_origin_size(
            entry.bbox.x,
            entry.bbox.y,
            entry.bbox.width,
            entry.bbox.height,
        );
        let resolved = bbox::resolve_rect(doc, page, &target)?;

        if resolved.is_empty() {
            debug!(
                "artifact entry ({}) matched nothing on page {}",
                entry.artifact_type,
                page.number()
            );
            continue;
        }

        let type_name = artifact_type_name(&entry.artifact_type);
        let id = match type_ids.iter().position(|name| name == type_name) {
            Some(pos) => pos as i64,
            None => {
                type_ids.push(type_name.to_owned());
                type_ids.len() as i64 - 1
            }
        };

        for idx in resolved {
            id_by_operator.entry(idx).or_insert(id);
        }
    }

    if id_by_operator.is_empty() {
        return Ok(());
    }

    let bytes = page::content_bytes(doc, page)?;
    let lines = content::lex_lines(&bytes);
    let rewritten = splice_brackets(&lines, &id_by_operator, &|id| {
        format!("/Artifact <</Type /{}>> BDC", type_ids[id as usize])
    });

    page::set_content(doc, page, rewritten)
}

/// Case-insensitive mapping of instruction artifact types onto the PDF
/// artifact type names; anything unrecognized is layout
fn artifact_type_name(raw: &str) -> &'static str {
    match raw.to_ascii_lowercase().as_str() {
        "header" => "Header",
        "footer" => "Footer",
        "pagination" => "Pagination",
        "background" => "Background",
        _ => "Layout",
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{instructions::Bbox, testutil};

    fn fixture() -> (Document, Page) {
        let mut doc = Document::new();
        let content = b"BT\n/F1 10 Tf\n72 770 Td\n(Page 1 of 9) Tj\nET".to_vec();
        let page = testutil::add_test_page(&mut doc, 612.0, 792.0, content);
        testutil::register_test_font(&mut doc, &page, "F1", "Helvetica");
        (doc, page)
    }

    fn entry(artifact_type: &str, bbox: Bbox) -> ArtifactInstruction {
        ArtifactInstruction {
            artifact_type: artifact_type.to_owned(),
            page: 1,
            bbox,
        }
    }

    fn header_bbox() -> Bbox {
        Bbox {
            x: 70.0,
            y: 768.0,
            width: 100.0,
            height: 14.0,
        }
    }

    #[test]
    fn wraps_operators_in_typed_brackets() {
        let (mut doc, page) = fixture();

        ArtifactHandler
            .apply(
                &mut doc,
                &[entry("pagination", header_bbox())],
                &CancelToken::new(),
            )
            .unwrap();

        let text = String::from_utf8(page::content_bytes(&doc, &page).unwrap()).unwrap();
        assert_eq!(
            text,
            "BT\n/F1 10 Tf\n72 770 Td\n/Artifact <</Type /Pagination>> BDC\n(Page 1 of 9) Tj\nEMC\nET"
        );
    }

    #[test]
    fn unknown_types_default_to_layout() {
        assert_eq!(artifact_type_name("watermark"), "Layout");
        assert_eq!(artifact_type_name("HEADER"), "Header");
    }

    #[test]
    fn first_entry_wins_contested_operators() {
        let (mut doc, page) = fixture();

        ArtifactHandler
            .apply(
                &mut doc,
                &[entry("header", header_bbox()), entry("footer", header_bbox())],
                &CancelToken::new(),
            )
            .unwrap();

        let text = String::from_utf8(page::content_bytes(&doc, &page).unwrap()).unwrap();
        assert!(text.contains("/Artifact <</Type /Header>> BDC"));
        assert!(!text.contains("Footer"));
    }

    #[test]
    fn miss_leaves_page_untouched() {
        let (mut doc, page) = fixture();
        let before = page::content_bytes(&doc, &page).unwrap();

        ArtifactHandler
            .apply(
                &mut doc,
                &[entry(
                    "header",
                    Bbox {
                        x: 5.0,
                        y: 5.0,
                        width: 5.0,
                        height: 5.0,
                    },
                )],
                &CancelToken::new(),
            )
            .unwrap();

        assert_eq!(page::content_bytes(&doc, &page).unwrap(), before);
    }
}
