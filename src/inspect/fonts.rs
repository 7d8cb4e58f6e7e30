//! Document-level font records: one entry per distinct BaseFont name,
//! analytic fields from the first observation, page list from every one.

use std::collections::HashMap;
use std::io::Write;

use base64::Engine;
use flate2::{write::GzEncoder, Compression};
use log::warn;

use crate::{
    cancel::CancelToken,
    document::Document,
    error::PdfResult,
    inspect::{
        cmap, font_program,
        report::{
            CidSystemInfoReport, CmapInfoReport, EncodingDetailReport, FontReport, Type3Report,
        },
    },
    objects::{Dictionary, Object},
    page::{self, Page},
};

pub(crate) fn collect_fonts(
    doc: &Document,
    pages: &[Page],
    cancel: &CancelToken,
) -> PdfResult<Vec<FontReport>> {
    let mut reports: Vec<FontReport> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for page in pages {
        cancel.check()?;

        let fonts = match page::resources(doc, page)
            .and_then(|resources| doc.dict_get_dict(resources, "Font"))
        {
            Some(fonts) => fonts,
            None => continue,
        };

        for (key, value) in fonts.iter() {
            let font = match doc.resolve(value).as_dict() {
                Some(font) => font,
                None => {
                    warn!("font resource {:?} on page {} is not a dictionary", key, page.number());
                    continue;
                }
            };

            let name = font.get_name("BaseFont").unwrap_or(key).to_owned();

            match by_name.get(&name) {
                Some(&idx) => reports[idx].pages.push(page.number()),
                None => {
                    let mut report = font_record(doc, name.clone(), font);
                    report.pages.push(page.number());
                    by_name.insert(name, reports.len());
                    reports.push(report);
                }
            }
        }
    }

    for report in &mut reports {
        report.pages.sort_unstable();
        report.pages.dedup();
    }

    Ok(reports)
}

/// The descriptor dictionary, descending into the descendant CID font for
/// composite fonts
fn descriptor<'a>(doc: &'a Document, font: &'a Dictionary) -> Option<&'a Dictionary> {
    let owner = if font.get_name("Subtype") == Some("Type0") {
        descendant(doc, font)?
    } else {
        font
    };

    doc.dict_get_dict(owner, "FontDescriptor")
}

fn descendant<'a>(doc: &'a Document, font: &'a Dictionary) -> Option<&'a Dictionary> {
    doc.dict_get_array(font, "DescendantFonts")?
        .first()
        .map(|obj| doc.resolve(obj))
        .and_then(Object::as_dict)
}

fn font_record(doc: &Document, name: String, font: &Dictionary) -> FontReport {
    let font_type = font.get_name("Subtype").map(str::to_owned);
    let descriptor = descriptor(doc, font);

    let flags = descriptor
        .and_then(|d| doc.dict_get_integer(d, "Flags"))
        .unwrap_or(0);

    let to_unicode = doc
        .dict_get_stream(font, "ToUnicode")
        .and_then(|stream| match doc.decoded_stream(stream) {
            Ok(data) => Some(cmap::parse_tounicode(&data)),
            Err(err) => {
                warn!("unreadable ToUnicode stream for {:?}: {}", name, err);
                None
            }
        })
        .unwrap_or_default();
    let has_to_unicode = font.contains_key("ToUnicode");

    let (encoding, encoding_detail) = encoding_info(doc, font);

    let program = embedded_program(doc, descriptor);
    let (analysis, font_program_data) = match program {
        Some((kind, data)) => {
            let analysis = match kind {
                ProgramKind::Type1 => font_program::analyze_type1(&data),
                ProgramKind::TrueType => font_program::analyze_true_type(&data),
                ProgramKind::Cff => font_program::analyze_cff(&data),
            };
            (analysis, Some(gzip_base64(&data)))
        }
        None => (font_program::ProgramAnalysis::default(), None),
    };

    let type3 = type3_info(doc, font);
    let unmappable_codes = match &type3 {
        Some(_) => unmappable_type3_codes(doc, font, &to_unicode),
        None => Vec::new(),
    };

    let is_embedded = descriptor.map_or(false, |d| {
        d.contains_key("FontFile") || d.contains_key("FontFile2") || d.contains_key("FontFile3")
    });

    FontReport {
        name,
        is_embedded,
        is_symbolic: flags & 4 != 0,
        has_to_unicode,
        has_notdef_glyph: analysis.has_notdef,
        encoding,
        has_charset: descriptor.map_or(false, |d| d.contains_key("CharSet")),
        has_cidset: descriptor.map_or(false, |d| d.contains_key("CIDSet")),
        has_font_descriptor: descriptor.is_some(),
        cid_system_info: cid_system_info(doc, font),
        cmap_info: cmap_info(doc, font),
        cid_to_gid_map: cid_to_gid_map(doc, font),
        encoding_detail,
        cmap_subtables: analysis.cmap_subtables,
        to_unicode,
        unmappable_codes,
        type3,
        type1_glyph_names: analysis.glyph_names,
        font_program_data,
        font_type,
        pages: Vec::new(),
    }
}

enum ProgramKind {
    Type1,
    TrueType,
    Cff,
}

fn embedded_program(
    doc: &Document,
    descriptor: Option<&Dictionary>,
) -> Option<(ProgramKind, Vec<u8>)> {
    let descriptor = descriptor?;

    let (kind, stream) = if let Some(stream) = doc.dict_get_stream(descriptor, "FontFile") {
        (ProgramKind::Type1, stream)
    } else if let Some(stream) = doc.dict_get_stream(descriptor, "FontFile2") {
        (ProgramKind::TrueType, stream)
    } else if let Some(stream) = doc.dict_get_stream(descriptor, "FontFile3") {
        // OpenType wrappers are sfnt files; bare CFF is not
        let kind = if stream.dict.get_name("Subtype") == Some("OpenType") {
            ProgramKind::TrueType
        } else {
            ProgramKind::Cff
        };
        (kind, stream)
    } else {
        return None;
    };

    match doc.decoded_stream(stream) {
        Ok(data) => Some((kind, data)),
        Err(err) => {
            warn!("unreadable font program: {}", err);
            None
        }
    }
}

fn encoding_info(
    doc: &Document,
    font: &Dictionary,
) -> (Option<String>, Option<EncodingDetailReport>) {
    match font.get("Encoding").map(|obj| doc.resolve(obj)) {
        Some(Object::Name(name)) => (Some(name.clone()), None),
        Some(Object::Dictionary(dict)) => {
            let base_encoding = doc.dict_get_name(dict, "BaseEncoding").map(str::to_owned);
            let differences = doc
                .dict_get_array(dict, "Differences")
                .map(|arr| {
                    arr.iter()
                        .filter_map(Object::as_name)
                        .map(str::to_owned)
                        .collect()
                })
                .unwrap_or_default();

            (
                base_encoding.clone(),
                Some(EncodingDetailReport {
                    base_encoding,
                    differences,
                }),
            )
        }
        // an embedded CMap stream for composite fonts
        Some(Object::Stream(stream)) => (
            stream.dict.get_name("CMapName").map(str::to_owned),
            None,
        ),
        _ => (None, None),
    }
}

fn cid_system_info(doc: &Document, font: &Dictionary) -> Option<CidSystemInfoReport> {
    let descendant = descendant(doc, font)?;
    let info = doc.dict_get_dict(descendant, "CIDSystemInfo")?;

    Some(CidSystemInfoReport {
        registry: doc.dict_get_string(info, "Registry").map(str::to_owned),
        ordering: doc.dict_get_string(info, "Ordering").map(str::to_owned),
        supplement: doc.dict_get_integer(info, "Supplement"),
    })
}

fn cmap_info(doc: &Document, font: &Dictionary) -> Option<CmapInfoReport> {
    if font.get_name("Subtype") != Some("Type0") {
        return None;
    }

    match font.get("Encoding").map(|obj| doc.resolve(obj)) {
        Some(Object::Name(name)) => Some(CmapInfoReport {
            is_identity: name == "Identity-H" || name == "Identity-V",
            name: name.clone(),
        }),
        Some(Object::Stream(stream)) => Some(CmapInfoReport {
            name: stream
                .dict
                .get_name("CMapName")
                .unwrap_or("Embedded")
                .to_owned(),
            is_identity: false,
        }),
        _ => None,
    }
}

fn cid_to_gid_map(doc: &Document, font: &Dictionary) -> Option<String> {
    let descendant = descendant(doc, font)?;

    match descendant.get("CIDToGIDMap").map(|obj| doc.resolve(obj)) {
        Some(Object::Name(name)) => Some(name.clone()),
        Some(Object::Stream(..)) => Some("Stream".to_owned()),
        _ => None,
    }
}

fn type3_info(doc: &Document, font: &Dictionary) -> Option<Type3Report> {
    if font.get_name("Subtype") != Some("Type3") {
        return None;
    }

    let char_procs = doc
        .dict_get_dict(font, "CharProcs")
        .map(|procs| procs.keys().cloned().collect())
        .unwrap_or_default();

    let font_matrix = doc
        .dict_get_array(font, "FontMatrix")
        .map(|arr| arr.iter().filter_map(Object::as_number).collect())
        .unwrap_or_default();

    Some(Type3Report {
        char_procs,
        font_matrix,
    })
}

/// Character codes a Type3 font uses (through its `/Differences`) that no
/// ToUnicode mapping covers
fn unmappable_type3_codes(
    doc: &Document,
    font: &Dictionary,
    to_unicode: &std::collections::BTreeMap<String, String>,
) -> Vec<u32> {
    let differences = match font
        .get("Encoding")
        .map(|obj| doc.resolve(obj))
        .and_then(Object::as_dict)
        .and_then(|dict| doc.dict_get_array(dict, "Differences"))
    {
        Some(differences) => differences,
        None => return Vec::new(),
    };

    let mut codes = Vec::new();
    let mut current = 0u32;

    for entry in differences {
        match entry {
            Object::Integer(n) => current = *n as u32,
            Object::Name(..) => {
                let mapped = to_unicode.contains_key(&format!("{:02X}", current))
                    || to_unicode.contains_key(&format!("{:04X}", current));
                if !mapped {
                    codes.push(current);
                }
                current += 1;
            }
            _ => {}
        }
    }

    codes.sort_unstable();
    codes.dedup();
    codes
}

fn gzip_base64(data: &[u8]) -> String {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    // writing to a Vec cannot fail
    encoder.write_all(data).unwrap();
    let compressed = encoder.finish().unwrap();

    base64::engine::general_purpose::STANDARD.encode(compressed)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{document::Address, objects::Stream, testutil};

    #[test]
    fn helvetica_record_is_unembedded() {
        let doc = testutil::hello_world_document();
        let pages = page::pages(&doc).unwrap();
        let fonts = collect_fonts(&doc, &pages, &CancelToken::new()).unwrap();

        assert_eq!(fonts.len(), 1);
        let font = &fonts[0];
        assert_eq!(font.name, "Helvetica");
        assert_eq!(font.font_type.as_deref(), Some("Type1"));
        assert!(!font.is_embedded);
        assert!(font.font_program_data.is_none());
        assert!(!font.has_font_descriptor);
        assert_eq!(font.pages, vec![1]);
    }

    #[test]
    fn same_base_font_on_two_pages_dedups() {
        let mut doc = Document::new();
        let first = testutil::add_test_page(&mut doc, 612.0, 792.0, b"".to_vec());
        let second = testutil::add_test_page(&mut doc, 612.0, 792.0, b"".to_vec());
        testutil::register_test_font(&mut doc, &first, "F1", "Helvetica");
        testutil::register_test_font(&mut doc, &second, "F4", "Helvetica");

        let pages = page::pages(&doc).unwrap();
        let fonts = collect_fonts(&doc, &pages, &CancelToken::new()).unwrap();

        assert_eq!(fonts.len(), 1);
        assert_eq!(fonts[0].pages, vec![1, 2]);
    }

    #[test]
    fn tounicode_round_trips_through_the_parser() {
        let mut doc = Document::new();
        let page = testutil::add_test_page(&mut doc, 612.0, 792.0, b"".to_vec());
        testutil::register_test_font(&mut doc, &page, "F1", "Helvetica");

        crate::handlers::FontHandler
            .apply(
                &mut doc,
                &[crate::instructions::FontInstruction::WriteTounicode {
                    page: 1,
                    font: "F1".to_owned(),
                    mappings: std::collections::BTreeMap::from([
                        (0x41u32, "A".to_owned()),
                        (0x42, "B\u{00E9}".to_owned()),
                    ]),
                }],
            )
            .unwrap();

        let pages = page::pages(&doc).unwrap();
        let fonts = collect_fonts(&doc, &pages, &CancelToken::new()).unwrap();

        assert!(fonts[0].has_to_unicode);
        assert_eq!(fonts[0].to_unicode.get("0041").map(String::as_str), Some("A"));
        assert_eq!(
            fonts[0].to_unicode.get("0042").map(String::as_str),
            Some("B\u{00E9}")
        );
    }

    #[test]
    fn differences_encoding_is_reported_in_detail() {
        let mut doc = Document::new();
        let page = testutil::add_test_page(&mut doc, 612.0, 792.0, b"".to_vec());
        testutil::register_test_font(&mut doc, &page, "F1", "Special");

        let addr = doc
            .locate(page.object_number, &["Resources", "Font", "F1"])
            .unwrap();
        doc.dict_at_mut(&addr).unwrap().insert(
            "Encoding",
            Object::Dictionary(Dictionary::from_entries(vec![
                ("Type", Object::name("Encoding")),
                ("BaseEncoding", Object::name("WinAnsiEncoding")),
                (
                    "Differences",
                    Object::Array(vec![
                        Object::Integer(65),
                        Object::name("Alpha"),
                        Object::name("Beta"),
                    ]),
                ),
            ])),
        );

        let pages = page::pages(&doc).unwrap();
        let fonts = collect_fonts(&doc, &pages, &CancelToken::new()).unwrap();

        assert_eq!(fonts[0].encoding.as_deref(), Some("WinAnsiEncoding"));
        let detail = fonts[0].encoding_detail.as_ref().unwrap();
        assert_eq!(detail.base_encoding.as_deref(), Some("WinAnsiEncoding"));
        assert_eq!(detail.differences, vec!["Alpha", "Beta"]);
    }

    #[test]
    fn type3_reports_char_procs_and_unmappable_codes() {
        let mut doc = Document::new();
        let page = testutil::add_test_page(&mut doc, 612.0, 792.0, b"".to_vec());

        let glyph = doc.add_object(Object::Stream(Stream::new(
            Dictionary::new(),
            b"0 0 m 10 10 l S".to_vec(),
        )));
        let font = doc.add_object(Object::Dictionary(Dictionary::from_entries(vec![
            ("Type", Object::name("Font")),
            ("Subtype", Object::name("Type3")),
            (
                "FontMatrix",
                Object::Array(vec![
                    Object::Real(0.001),
                    Object::Real(0.0),
                    Object::Real(0.0),
                    Object::Real(0.001),
                    Object::Real(0.0),
                    Object::Real(0.0),
                ]),
            ),
            (
                "CharProcs",
                Object::Dictionary(Dictionary::from_entries(vec![(
                    "square",
                    Object::Reference(glyph),
                )])),
            ),
            (
                "Encoding",
                Object::Dictionary(Dictionary::from_entries(vec![(
                    "Differences",
                    Object::Array(vec![Object::Integer(97), Object::name("square")]),
                )])),
            ),
        ])));

        let addr = Address::new(page.object_number);
        let resources = doc
            .dict_at_mut(&addr)
            .unwrap()
            .get_mut("Resources")
            .unwrap()
            .as_dict_mut()
            .unwrap();
        resources.insert(
            "Font",
            Object::Dictionary(Dictionary::from_entries(vec![(
                "T3",
                Object::Reference(font),
            )])),
        );

        let pages = page::pages(&doc).unwrap();
        let fonts = collect_fonts(&doc, &pages, &CancelToken::new()).unwrap();

        let type3 = fonts[0].type3.as_ref().unwrap();
        assert_eq!(type3.char_procs, vec!["square"]);
        assert_eq!(type3.font_matrix.len(), 6);
        // code 97 has no ToUnicode mapping
        assert_eq!(fonts[0].unmappable_codes, vec![97]);
    }
}
