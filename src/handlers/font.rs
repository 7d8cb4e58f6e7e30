use std::collections::BTreeMap;

use crate::{
    document::{Address, Document},
    error::{PdfError, PdfResult},
    instructions::FontInstruction,
    objects::{Dictionary, Object, Stream},
    page::{self, Page},
};

/// Font dictionary and descriptor surgery: subset-usage metadata (CIDSet,
/// CharSet), encodings, ToUnicode CMaps, widths and minimal descriptors
#[derive(Debug, Default)]
pub struct FontHandler;

impl FontHandler {
    pub fn apply(&self, doc: &mut Document, instructions: &[FontInstruction]) -> PdfResult<()> {
        for instruction in instructions {
            let (page_number, key) = instruction.locator();
            let page = page::page_at(doc, page_number)?;
            let font = font_address(doc, &page, key)?;

            match instruction {
                FontInstruction::WriteCidset { cids, .. } => write_cidset(doc, &font, key, cids)?,
                FontInstruction::WriteCharset { glyph_names, .. } => {
                    write_charset(doc, &font, key, glyph_names)?
                }
                FontInstruction::SetEncoding { encoding, .. } => {
                    doc.dict_at_mut(&font)?
                        .insert("Encoding", Object::name(encoding.clone()));
                }
                FontInstruction::SetDifferences { differences, .. } => {
                    set_differences(doc, &font, differences)?
                }
                FontInstruction::WriteTounicode { mappings, .. } => {
                    write_tounicode(doc, &font, mappings)?
                }
                FontInstruction::SetWidths { widths, .. } => {
                    set_widths(doc, &font, key, widths)?
                }
                FontInstruction::AddFontDescriptor { .. } => {
                    add_font_descriptor(doc, &font, key)?
                }
            }
        }

        Ok(())
    }
}

/// Locates the font dictionary for a (page, resource key) pair. The
/// contract is explicit: the page must exist, its resources must carry a
/// `/Font` dictionary, and the key must be present
fn font_address(doc: &Document, page: &Page, key: &str) -> PdfResult<Address> {
    // resources may be inherited from an ancestor page tree node
    let mut number = page.object_number;
    let owner = loop {
        let dict = doc
            .get_object(number)
            .and_then(Object::as_dict)
            .ok_or_else(|| PdfError::internal(format!("page object {} vanished", number)))?;

        if dict.contains_key("Resources") {
            break number;
        }

        number = dict
            .get_reference("Parent")
            .map(|r| r.object_number)
            .ok_or_else(|| {
                PdfError::not_found(
                    "Resources dictionary".to_owned(),
                    format!("page {}", page.number()),
                )
            })?;
    };

    let resources_addr = doc.locate(owner, &["Resources"])?;
    let resources = doc
        .object_at(&resources_addr)?
        .as_dict()
        .ok_or_else(|| PdfError::parse(format!("page {} Resources is not a dictionary", page.number())))?;

    if doc.dict_get_dict(resources, "Font").is_none() {
        return Err(PdfError::not_found(
            "Font dictionary".to_owned(),
            format!("page {} resources", page.number()),
        ));
    }

    doc.locate_from(&resources_addr, &["Font", key])
        .map_err(|_| {
            PdfError::not_found(
                format!("font resource {:?}", key),
                format!("page {} /Font dictionary", page.number()),
            )
        })
}

/// The dictionary that carries (or should carry) the FontDescriptor:
/// the descendant CID font for Type0, the font itself otherwise
fn descriptor_owner(doc: &Document, font: &Address, key: &str) -> PdfResult<Address> {
    let dict = doc
        .object_at(font)?
        .as_dict()
        .ok_or_else(|| PdfError::parse(format!("font resource {:?} is not a dictionary", key)))?;

    if dict.get_name("Subtype") != Some("Type0") {
        return Ok(font.clone());
    }

    let descendants = doc.dict_get_array(dict, "DescendantFonts").ok_or_else(|| {
        PdfError::parse(format!("Type0 font {:?} has no DescendantFonts", key))
    })?;

    match descendants.first() {
        Some(Object::Reference(r)) => Ok(Address::new(r.object_number)),
        _ => Err(PdfError::unsupported(format!(
            "Type0 font {:?} descendant is not an indirect object",
            key
        ))),
    }
}

fn descriptor_address(doc: &Document, font: &Address, key: &str) -> PdfResult<Address> {
    let owner = descriptor_owner(doc, font, key)?;
    doc.locate_from(&owner, &["FontDescriptor"]).map_err(|_| {
        PdfError::not_found(
            "FontDescriptor".to_owned(),
            format!("font resource {:?}", key),
        )
    })
}

/// Builds the used-CID bitmap: bit `7 - (cid mod 8)` of byte `cid / 8`.
/// An empty CID list still produces a one-byte stream
fn write_cidset(doc: &mut Document, font: &Address, key: &str, cids: &[u32]) -> PdfResult<()> {
    let descriptor = descriptor_address(doc, font, key)?;

    let max = cids.iter().copied().max().unwrap_or(0) as usize;
    let mut bitmap = vec![0u8; max / 8 + 1];
    for &cid in cids {
        bitmap[cid as usize / 8] |= 1 << (7 - (cid % 8));
    }

    let stream = doc.add_object(Object::Stream(Stream::new(Dictionary::new(), bitmap)));
    doc.dict_at_mut(&descriptor)?
        .insert("CIDSet", Object::Reference(stream));

    Ok(())
}

fn write_charset(
    doc: &mut Document,
    font: &Address,
    key: &str,
    glyph_names: &[String],
) -> PdfResult<()> {
    let descriptor = descriptor_address(doc, font, key)?;

    let charset = glyph_names
        .iter()
        .map(|name| format!("/{}", name))
        .collect::<String>();

    doc.dict_at_mut(&descriptor)?
        .insert("CharSet", Object::string(charset));

    Ok(())
}

/// `/Differences` built by ascending code, alternating code and glyph
/// name. An `/Encoding` that was absent or a bare name becomes an
/// encoding dictionary first
fn set_differences(
    doc: &mut Document,
    font: &Address,
    differences: &BTreeMap<u32, String>,
) -> PdfResult<()> {
    let needs_dict = match doc.object_at(font)?.as_dict().and_then(|d| d.get("Encoding")) {
        Some(Object::Dictionary(..)) => false,
        Some(Object::Reference(r)) => !matches!(
            doc.get_object(r.object_number),
            Some(Object::Dictionary(..))
        ),
        _ => true,
    };

    if needs_dict {
        doc.dict_at_mut(font)?.insert(
            "Encoding",
            Object::Dictionary(Dictionary::from_entries(vec![(
                "Type",
                Object::name("Encoding"),
            )])),
        );
    }

    let mut arr = Vec::with_capacity(differences.len() * 2);
    for (&code, glyph_name) in differences {
        arr.push(Object::Integer(i64::from(code)));
        arr.push(Object::name(glyph_name.clone()));
    }

    let encoding = doc.locate_from(font, &["Encoding"])?;
    doc.dict_at_mut(&encoding)?
        .insert("Differences", Object::Array(arr));

    Ok(())
}

/// Emits a ToUnicode CMap with one bfchar block: sources are the codes as
/// uppercase 4-digit hex, destinations the UTF-16 units of each string
fn write_tounicode(
    doc: &mut Document,
    font: &Address,
    mappings: &BTreeMap<u32, String>,
) -> PdfResult<()> {
    let mut body = String::new();
    body.push_str("/CIDInit /ProcSet findresource begin\n");
    body.push_str("12 dict begin\n");
    body.push_str("begincmap\n");
    body.push_str("/CIDSystemInfo\n");
    body.push_str("<< /Registry (Adobe)\n/Ordering (UCS)\n/Supplement 0\n>> def\n");
    body.push_str("/CMapName /Adobe-Identity-UCS def\n");
    body.push_str("/CMapType 2 def\n");
    body.push_str("1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n");
    body.push_str(&format!("{} beginbfchar\n", mappings.len()));

    for (&code, text) in mappings {
        let destination: String = text
            .encode_utf16()
            .map(|unit| format!("{:04X}", unit))
            .collect();
        body.push_str(&format!("<{:04X}> <{}>\n", code, destination));
    }

    body.push_str("endbfchar\n");
    body.push_str("endcmap\n");
    body.push_str("CMapName currentdict /CMap defineresource pop\n");
    body.push_str("end\nend\n");

    let stream = doc.add_object(Object::Stream(Stream::new(
        Dictionary::new(),
        body.into_bytes(),
    )));
    doc.dict_at_mut(font)?
        .insert("ToUnicode", Object::Reference(stream));

    Ok(())
}

fn set_widths(
    doc: &mut Document,
    font: &Address,
    key: &str,
    widths: &BTreeMap<u32, f32>,
) -> PdfResult<()> {
    let dict = doc
        .object_at(font)?
        .as_dict()
        .ok_or_else(|| PdfError::parse(format!("font resource {:?} is not a dictionary", key)))?;

    if dict.get_name("Subtype") == Some("Type0") {
        return set_cid_widths(doc, font, key, widths);
    }

    let existing = doc.dict_get_array(dict, "Widths").map(<[Object]>::to_vec);
    let first_char = doc.dict_get_integer(dict, "FirstChar").unwrap_or(0);

    match existing {
        Some(mut arr) => {
            for (&code, &width) in widths {
                let index = i64::from(code) - first_char;
                if index >= 0 && (index as usize) < arr.len() {
                    arr[index as usize] = Object::Real(width);
                } else {
                    log::warn!("width for code {} outside the Widths array; ignored", code);
                }
            }
            let addr = doc.locate_from(font, &["Widths"])?;
            *doc.object_at_mut(&addr)? = Object::Array(arr);
        }
        None => {
            let (&min_code, _) = match widths.iter().next() {
                Some(entry) => entry,
                None => return Ok(()),
            };
            let (&max_code, _) = widths.iter().next_back().unwrap();

            let mut arr =
                vec![Object::Integer(0); (max_code - min_code) as usize + 1];
            for (&code, &width) in widths {
                arr[(code - min_code) as usize] = Object::Real(width);
            }

            let font_dict = doc.dict_at_mut(font)?;
            font_dict.insert("FirstChar", Object::Integer(i64::from(min_code)));
            font_dict.insert("LastChar", Object::Integer(i64::from(max_code)));
            font_dict.insert("Widths", Object::Array(arr));
        }
    }

    Ok(())
}

/// `/W` on the descendant CID font, `[cid [w] …]` by ascending CID
fn set_cid_widths(
    doc: &mut Document,
    font: &Address,
    key: &str,
    widths: &BTreeMap<u32, f32>,
) -> PdfResult<()> {
    let descendant = descriptor_owner(doc, font, key)?;

    let mut arr = Vec::with_capacity(widths.len() * 2);
    for (&cid, &width) in widths {
        arr.push(Object::Integer(i64::from(cid)));
        arr.push(Object::Array(vec![Object::Real(width)]));
    }

    doc.dict_at_mut(&descendant)?.insert("W", Object::Array(arr));

    Ok(())
}

fn add_font_descriptor(doc: &mut Document, font: &Address, key: &str) -> PdfResult<()> {
    let owner = descriptor_owner(doc, font, key)?;

    let font_name = doc
        .object_at(&owner)?
        .as_dict()
        .and_then(|dict| dict.get_name("BaseFont"))
        .unwrap_or(key)
        .to_owned();

    let descriptor = doc.add_object(Object::Dictionary(Dictionary::from_entries(vec![
        ("Type", Object::name("FontDescriptor")),
        ("FontName", Object::name(font_name)),
        ("Flags", Object::Integer(32)),
        (
            "FontBBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(1000),
                Object::Integer(1000),
            ]),
        ),
        ("ItalicAngle", Object::Integer(0)),
        ("Ascent", Object::Integer(800)),
        ("Descent", Object::Integer(-200)),
        ("CapHeight", Object::Integer(700)),
        ("StemV", Object::Integer(80)),
    ])));

    doc.dict_at_mut(&owner)?
        .insert("FontDescriptor", Object::Reference(descriptor));

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutil;

    fn simple_font_fixture() -> (Document, Page) {
        let mut doc = Document::new();
        let page = testutil::add_test_page(&mut doc, 612.0, 792.0, b"BT ET".to_vec());
        testutil::register_test_font(&mut doc, &page, "F1", "Helvetica");
        (doc, page)
    }

    /// An embedded Type0 font with a descriptor on its descendant
    fn type0_fixture() -> (Document, Page) {
        let mut doc = Document::new();
        let page = testutil::add_test_page(&mut doc, 612.0, 792.0, b"BT ET".to_vec());

        let descriptor = doc.add_object(Object::Dictionary(Dictionary::from_entries(vec![
            ("Type", Object::name("FontDescriptor")),
            ("FontName", Object::name("ABCDEF+Noto")),
        ])));
        let descendant = doc.add_object(Object::Dictionary(Dictionary::from_entries(vec![
            ("Type", Object::name("Font")),
            ("Subtype", Object::name("CIDFontType2")),
            ("BaseFont", Object::name("ABCDEF+Noto")),
            ("FontDescriptor", Object::Reference(descriptor)),
        ])));
        let font = doc.add_object(Object::Dictionary(Dictionary::from_entries(vec![
            ("Type", Object::name("Font")),
            ("Subtype", Object::name("Type0")),
            ("BaseFont", Object::name("ABCDEF+Noto")),
            ("Encoding", Object::name("Identity-H")),
            (
                "DescendantFonts",
                Object::Array(vec![Object::Reference(descendant)]),
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
                "F1",
                Object::Reference(font),
            )])),
        );

        (doc, page)
    }

    fn font_dict<'a>(doc: &'a Document, page: &Page, key: &str) -> &'a Dictionary {
        let resources = page::resources(doc, page).unwrap();
        let fonts = doc.dict_get_dict(resources, "Font").unwrap();
        doc.dict_get_dict(fonts, key).unwrap()
    }

    #[test]
    fn cidset_bitmap_matches_the_specified_layout() {
        let (mut doc, page) = type0_fixture();

        FontHandler
            .apply(
                &mut doc,
                &[FontInstruction::WriteCidset {
                    page: 1,
                    font: "F1".to_owned(),
                    cids: vec![0, 1, 5, 10],
                }],
            )
            .unwrap();

        let font = font_dict(&doc, &page, "F1");
        let descendant = doc
            .resolve(&font.get("DescendantFonts").unwrap().as_array().unwrap()[0])
            .as_dict()
            .unwrap();
        let descriptor = doc.dict_get_dict(descendant, "FontDescriptor").unwrap();
        let cidset = doc.dict_get_stream(descriptor, "CIDSet").unwrap();

        assert_eq!(cidset.data, vec![0xC4, 0x20]);
    }

    #[test]
    fn empty_cid_list_still_writes_one_byte() {
        let (mut doc, page) = type0_fixture();

        FontHandler
            .apply(
                &mut doc,
                &[FontInstruction::WriteCidset {
                    page: 1,
                    font: "F1".to_owned(),
                    cids: vec![],
                }],
            )
            .unwrap();

        let font = font_dict(&doc, &page, "F1");
        let descendant = doc
            .resolve(&font.get("DescendantFonts").unwrap().as_array().unwrap()[0])
            .as_dict()
            .unwrap();
        let descriptor = doc.dict_get_dict(descendant, "FontDescriptor").unwrap();
        let cidset = doc.dict_get_stream(descriptor, "CIDSet").unwrap();

        assert_eq!(cidset.data, vec![0u8]);
    }

    #[test]
    fn charset_concatenates_slash_prefixed_names() {
        let (mut doc, page) = simple_font_fixture();

        // a simple font needs a descriptor for CharSet to land on
        FontHandler
            .apply(
                &mut doc,
                &[
                    FontInstruction::AddFontDescriptor {
                        page: 1,
                        font: "F1".to_owned(),
                    },
                    FontInstruction::WriteCharset {
                        page: 1,
                        font: "F1".to_owned(),
                        glyph_names: vec!["space".to_owned(), "A".to_owned(), "B".to_owned()],
                    },
                ],
            )
            .unwrap();

        let font = font_dict(&doc, &page, "F1");
        let descriptor = doc.dict_get_dict(font, "FontDescriptor").unwrap();
        assert_eq!(descriptor.get_string("CharSet"), Some("/space/A/B"));
        assert_eq!(descriptor.get_integer("Flags"), Some(32));
        assert_eq!(descriptor.get_name("FontName"), Some("Helvetica"));
    }

    #[test]
    fn missing_font_key_is_descriptive() {
        let (mut doc, _) = simple_font_fixture();

        let err = FontHandler
            .apply(
                &mut doc,
                &[FontInstruction::SetEncoding {
                    page: 1,
                    font: "F9".to_owned(),
                    encoding: "WinAnsiEncoding".to_owned(),
                }],
            )
            .unwrap_err();

        assert_eq!(err.kind(), "not_found");
        assert!(err.to_string().contains("F9"));
        assert!(err.to_string().contains("page 1"));
    }

    #[test]
    fn differences_replace_a_name_encoding() {
        let (mut doc, page) = simple_font_fixture();

        FontHandler
            .apply(
                &mut doc,
                &[
                    FontInstruction::SetEncoding {
                        page: 1,
                        font: "F1".to_owned(),
                        encoding: "MacRomanEncoding".to_owned(),
                    },
                    FontInstruction::SetDifferences {
                        page: 1,
                        font: "F1".to_owned(),
                        differences: BTreeMap::from([
                            (65, "Alpha".to_owned()),
                            (32, "space".to_owned()),
                        ]),
                    },
                ],
            )
            .unwrap();

        let font = font_dict(&doc, &page, "F1");
        let encoding = doc.dict_get_dict(font, "Encoding").unwrap();
        assert_eq!(encoding.get_name("Type"), Some("Encoding"));

        let differences = encoding.get("Differences").unwrap().as_array().unwrap();
        assert_eq!(
            differences,
            &[
                Object::Integer(32),
                Object::name("space"),
                Object::Integer(65),
                Object::name("Alpha"),
            ]
        );
    }

    #[test]
    fn tounicode_emits_the_standard_wrapper() {
        let (mut doc, page) = simple_font_fixture();

        FontHandler
            .apply(
                &mut doc,
                &[FontInstruction::WriteTounicode {
                    page: 1,
                    font: "F1".to_owned(),
                    mappings: BTreeMap::from([
                        (1, "A".to_owned()),
                        (2, "ffi".to_owned()),
                    ]),
                }],
            )
            .unwrap();

        let font = font_dict(&doc, &page, "F1");
        let stream = doc.dict_get_stream(font, "ToUnicode").unwrap();
        let body = String::from_utf8(stream.data.clone()).unwrap();

        assert!(body.starts_with("/CIDInit /ProcSet findresource begin"));
        assert!(body.contains("/CMapName /Adobe-Identity-UCS def"));
        assert!(body.contains("1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange"));
        assert!(body.contains("2 beginbfchar\n<0001> <0041>\n<0002> <006600660069>\nendbfchar"));
        assert!(body.trim_end().ends_with("end\nend"));
    }

    #[test]
    fn set_widths_twice_is_idempotent() {
        let (mut doc, page) = simple_font_fixture();
        let widths = BTreeMap::from([(65u32, 600.0f32), (66, 650.0), (70, 500.0)]);

        let instruction = FontInstruction::SetWidths {
            page: 1,
            font: "F1".to_owned(),
            widths: widths.clone(),
        };

        FontHandler.apply(&mut doc, &[instruction.clone()]).unwrap();
        let first = font_dict(&doc, &page, "F1").get("Widths").cloned();

        FontHandler.apply(&mut doc, &[instruction]).unwrap();
        let second = font_dict(&doc, &page, "F1").get("Widths").cloned();

        assert_eq!(first, second);

        let font = font_dict(&doc, &page, "F1");
        assert_eq!(font.get_integer("FirstChar"), Some(65));
        assert_eq!(font.get_integer("LastChar"), Some(70));
        let arr = font.get("Widths").unwrap().as_array().unwrap();
        assert_eq!(arr.len(), 6);
        assert_eq!(arr[0], Object::Real(600.0));
        assert_eq!(arr[1], Object::Real(650.0));
        assert_eq!(arr[2], Object::Integer(0));
        assert_eq!(arr[5], Object::Real(500.0));
    }

    #[test]
    fn type0_widths_go_to_the_descendant_w_array() {
        let (mut doc, page) = type0_fixture();

        FontHandler
            .apply(
                &mut doc,
                &[FontInstruction::SetWidths {
                    page: 1,
                    font: "F1".to_owned(),
                    widths: BTreeMap::from([(3u32, 512.0f32), (1, 600.0)]),
                }],
            )
            .unwrap();

        let font = font_dict(&doc, &page, "F1");
        let descendant = doc
            .resolve(&font.get("DescendantFonts").unwrap().as_array().unwrap()[0])
            .as_dict()
            .unwrap();
        let w = descendant.get("W").unwrap().as_array().unwrap();

        assert_eq!(w[0], Object::Integer(1));
        assert_eq!(w[1], Object::Array(vec![Object::Real(600.0)]));
        assert_eq!(w[2], Object::Integer(3));
        assert_eq!(w[3], Object::Array(vec![Object::Real(512.0)]));
    }

    #[test]
    fn type0_widths_error_names_the_resource_key() {
        let mut doc = Document::new();
        let page = testutil::add_test_page(&mut doc, 612.0, 792.0, b"BT ET".to_vec());

        // a Type0 font with no DescendantFonts entry
        let font = doc.add_object(Object::Dictionary(Dictionary::from_entries(vec![
            ("Type", Object::name("Font")),
            ("Subtype", Object::name("Type0")),
            ("BaseFont", Object::name("Broken")),
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
                "F1",
                Object::Reference(font),
            )])),
        );

        let err = FontHandler
            .apply(
                &mut doc,
                &[FontInstruction::SetWidths {
                    page: 1,
                    font: "F1".to_owned(),
                    widths: BTreeMap::from([(1u32, 500.0f32)]),
                }],
            )
            .unwrap_err();

        assert!(err.to_string().contains("\"F1\""));
    }

    #[test]
    fn cidset_on_font_without_descriptor_fails() {
        let (mut doc, _) = simple_font_fixture();

        let err = FontHandler
            .apply(
                &mut doc,
                &[FontInstruction::WriteCidset {
                    page: 1,
                    font: "F1".to_owned(),
                    cids: vec![0],
                }],
            )
            .unwrap_err();

        assert_eq!(err.kind(), "not_found");
        assert!(err.to_string().contains("FontDescriptor"));
    }

    #[test]
    fn widths_update_in_place_when_array_exists() {
        let (mut doc, page) = simple_font_fixture();

        // seed a Widths array
        let font_addr = {
            let resources_addr = doc.locate(page.object_number, &["Resources"]).unwrap();
            doc.locate_from(&resources_addr, &["Font", "F1"]).unwrap()
        };
        {
            let dict = doc.dict_at_mut(&font_addr).unwrap();
            dict.insert("FirstChar", Object::Integer(60));
            dict.insert(
                "Widths",
                Object::Array(vec![Object::Integer(100); 10]),
            );
        }

        FontHandler
            .apply(
                &mut doc,
                &[FontInstruction::SetWidths {
                    page: 1,
                    font: "F1".to_owned(),
                    widths: BTreeMap::from([(65u32, 777.0f32)]),
                }],
            )
            .unwrap();

        let font = font_dict(&doc, &page, "F1");
        let arr = font.get("Widths").unwrap().as_array().unwrap();
        assert_eq!(arr[5], Object::Real(777.0));
        assert_eq!(arr[0], Object::Integer(100));
        assert_eq!(font.get_integer("FirstChar"), Some(60));
    }

    #[test]
    fn descriptor_reference_survives_save() {
        let (mut doc, _) = type0_fixture();

        FontHandler
            .apply(
                &mut doc,
                &[FontInstruction::WriteCidset {
                    page: 1,
                    font: "F1".to_owned(),
                    cids: vec![0, 7],
                }],
            )
            .unwrap();

        let bytes = doc.save().unwrap();
        let reloaded = Document::load(&bytes).unwrap();

        // find the descriptor again through the reloaded page
        let page = crate::page::page_at(&reloaded, 1).unwrap();
        let resources = page::resources(&reloaded, &page).unwrap();
        let fonts = reloaded.dict_get_dict(resources, "Font").unwrap();
        let font = reloaded.dict_get_dict(fonts, "F1").unwrap();
        let descendant = reloaded
            .resolve(&font.get("DescendantFonts").unwrap().as_array().unwrap()[0])
            .as_dict()
            .unwrap();
        let descriptor = reloaded.dict_get_dict(descendant, "FontDescriptor").unwrap();
        let cidset = reloaded.dict_get_stream(descriptor, "CIDSet").unwrap();
        assert_eq!(cidset.data, vec![0x81]);
    }
}
