//! The read-only inspection path: one pass over the document graph
//! producing the canonical report. Per-object parse failures degrade to
//! absent fields; only a document that cannot be opened at all fails.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use base64::Engine;
use log::warn;
use sha2::{Digest, Sha256};

pub use report::{
    AttributeValue, CidSystemInfoReport, CmapInfoReport, CmapSubtableReport, DocumentInfo,
    EmbeddedFileReport, EncodingDetailReport, FontReport, InspectionReport,
    OptionalContentConfigReport, OutlineReport, PageReport, StructureNodeReport, Type3Report,
};

mod cmap;
mod font_program;
mod fonts;
mod report;

use crate::{
    cancel::CancelToken,
    document::Document,
    error::PdfResult,
    objects::{Dictionary, Object},
    page::{self, Page},
};

pub fn inspect(bytes: &[u8], cancel: &CancelToken) -> PdfResult<InspectionReport> {
    let file_hash = Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<String>();

    let doc = Document::load(bytes)?;
    let pages = page::pages(&doc)?;
    let page_numbers: HashMap<usize, usize> = pages
        .iter()
        .map(|page| (page.object_number, page.number()))
        .collect();

    let mut mcids_by_page: HashMap<usize, BTreeSet<i64>> = HashMap::new();
    let structure_tree = structure_tree(&doc, &page_numbers, &mut mcids_by_page);

    Ok(InspectionReport {
        file_hash,
        file_size: bytes.len() as u64,
        document: document_info(&doc, &pages),
        xmp_metadata: xmp_metadata(&doc),
        structure_tree,
        role_map: role_map(&doc),
        pages: page_reports(&doc, &pages, &mcids_by_page, cancel)?,
        fonts: fonts::collect_fonts(&doc, &pages, cancel)?,
        outlines: outlines(&doc, &page_numbers),
        embedded_files: embedded_files(&doc),
        optional_content_configs: optional_content_configs(&doc),
    })
}

fn document_info(doc: &Document, pages: &[Page]) -> DocumentInfo {
    let catalog = doc.catalog().ok();

    let mark_info = catalog.and_then(|c| doc.dict_get_dict(c, "MarkInfo"));
    let mark_info_marked = mark_info
        .and_then(|m| doc.dict_get_bool(m, "Marked"))
        .unwrap_or(false);
    let suspect_flag = mark_info
        .and_then(|m| doc.dict_get_bool(m, "Suspects"))
        .unwrap_or(false);

    let struct_tree_root = catalog.and_then(|c| doc.dict_get_dict(c, "StructTreeRoot"));

    let pdf_version = catalog
        .and_then(|c| doc.dict_get_name(c, "Version"))
        .unwrap_or(&doc.version)
        .to_owned();

    let display_doc_title = catalog
        .and_then(|c| doc.dict_get_dict(c, "ViewerPreferences"))
        .and_then(|prefs| doc.dict_get_bool(prefs, "DisplayDocTitle"))
        .unwrap_or(false);

    let encryption_permissions = doc
        .trailer
        .get("Encrypt")
        .map(|obj| doc.resolve(obj))
        .and_then(Object::as_dict)
        .and_then(|encrypt| doc.dict_get_integer(encrypt, "P"));

    let acro_form = catalog.and_then(|c| doc.dict_get_dict(c, "AcroForm"));
    let has_xfa_dynamic_render = acro_form.map_or(false, |form| form.contains_key("XFA"))
        && catalog
            .and_then(|c| doc.dict_get_bool(c, "NeedsRendering"))
            .unwrap_or(false);

    DocumentInfo {
        is_tagged: struct_tree_root.is_some() && mark_info_marked,
        page_count: pages.len(),
        pdf_version,
        language: catalog
            .and_then(|c| doc.dict_get_string(c, "Lang"))
            .map(str::to_owned),
        title: doc
            .info()
            .and_then(|info| doc.dict_get_string(info, "Title"))
            .map(str::to_owned),
        display_doc_title,
        mark_info_marked,
        suspect_flag,
        has_info_dictionary: doc.info().is_some(),
        is_encrypted: doc.is_encrypted(),
        encryption_permissions,
        has_structural_parent_tree: struct_tree_root
            .map_or(false, |root| root.contains_key("ParentTree")),
        has_xfa_dynamic_render,
    }
}

fn xmp_metadata(doc: &Document) -> Option<String> {
    let catalog = doc.catalog().ok()?;
    let stream = doc.dict_get_stream(catalog, "Metadata")?;

    match doc.decoded_stream(stream) {
        Ok(data) => Some(base64::engine::general_purpose::STANDARD.encode(data)),
        Err(err) => {
            warn!("unreadable XMP metadata stream: {}", err);
            None
        }
    }
}

fn role_map(doc: &Document) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();

    let role_map = doc
        .catalog()
        .ok()
        .and_then(|c| doc.dict_get_dict(c, "StructTreeRoot"))
        .and_then(|root| doc.dict_get_dict(root, "RoleMap"));

    if let Some(role_map) = role_map {
        for (key, value) in role_map.iter() {
            if let Some(target) = doc.resolve(value).as_name() {
                map.insert(key.clone(), target.to_owned());
            }
        }
    }

    map
}

// --- structure tree ---

fn structure_tree(
    doc: &Document,
    page_numbers: &HashMap<usize, usize>,
    mcids_by_page: &mut HashMap<usize, BTreeSet<i64>>,
) -> Vec<StructureNodeReport> {
    let root = match doc
        .catalog()
        .ok()
        .and_then(|c| doc.dict_get_dict(c, "StructTreeRoot"))
    {
        Some(root) => root,
        None => return Vec::new(),
    };

    let mut visited = HashSet::new();
    match root.get("K") {
        Some(kids) => child_reports(doc, kids, None, page_numbers, mcids_by_page, &mut visited),
        None => Vec::new(),
    }
}

fn child_reports(
    doc: &Document,
    obj: &Object,
    inherited_pg: Option<usize>,
    page_numbers: &HashMap<usize, usize>,
    mcids_by_page: &mut HashMap<usize, BTreeSet<i64>>,
    visited: &mut HashSet<usize>,
) -> Vec<StructureNodeReport> {
    if let Object::Reference(r) = obj {
        if !visited.insert(r.object_number) {
            warn!("structure tree cycle through object {}", r.object_number);
            return Vec::new();
        }
    }

    match doc.resolve(obj) {
        Object::Array(items) => items
            .iter()
            .flat_map(|item| {
                child_reports(doc, item, inherited_pg, page_numbers, mcids_by_page, visited)
            })
            .collect(),
        Object::Dictionary(dict) => {
            match dict.get_name("Type") {
                Some("MCR") => {
                    if let Some(mcid) = doc.dict_get_integer(dict, "MCID") {
                        let pg = dict
                            .get_reference("Pg")
                            .map(|r| r.object_number)
                            .or(inherited_pg);
                        if let Some(pg) = pg {
                            mcids_by_page.entry(pg).or_default().insert(mcid);
                        }
                    }
                    Vec::new()
                }
                Some("OBJR") => Vec::new(),
                _ => match element_report(doc, dict, inherited_pg, page_numbers, mcids_by_page, visited) {
                    Some(report) => vec![report],
                    None => Vec::new(),
                },
            }
        }
        // a bare integer kid is an MCID on the nearest enclosing page
        Object::Integer(mcid) => {
            if let Some(pg) = inherited_pg {
                mcids_by_page.entry(pg).or_default().insert(*mcid);
            }
            Vec::new()
        }
        _ => Vec::new(),
    }
}

fn element_report(
    doc: &Document,
    dict: &Dictionary,
    inherited_pg: Option<usize>,
    page_numbers: &HashMap<usize, usize>,
    mcids_by_page: &mut HashMap<usize, BTreeSet<i64>>,
    visited: &mut HashSet<usize>,
) -> Option<StructureNodeReport> {
    let role = dict.get_name("S")?.to_owned();

    // the element's own /Pg, an ancestor's, or the first MCR kid's
    let pg = dict
        .get_reference("Pg")
        .map(|r| r.object_number)
        .or(inherited_pg)
        .or_else(|| first_mcr_page(doc, dict.get("K")));

    let (attributes, has_bbox) = attribute_map(doc, dict.get("A"));

    let children = match dict.get("K") {
        Some(kids) => child_reports(doc, kids, pg, page_numbers, mcids_by_page, visited),
        None => Vec::new(),
    };

    Some(StructureNodeReport {
        role,
        id: doc.dict_get_string(dict, "ID").map(str::to_owned),
        alt_text: doc.dict_get_string(dict, "Alt").map(str::to_owned),
        actual_text: doc.dict_get_string(dict, "ActualText").map(str::to_owned),
        language: doc.dict_get_string(dict, "Lang").map(str::to_owned),
        has_bbox,
        attributes,
        page: pg.and_then(|pg| page_numbers.get(&pg)).copied(),
        first_mcid: first_mcid(doc, dict.get("K")),
        children,
    })
}

/// Flattens the `/A` entry (one attribute dictionary or an array of them)
/// into `owner:key` pairs, converting PDF primitives to the report value
/// model
fn attribute_map(
    doc: &Document,
    attrs: Option<&Object>,
) -> (BTreeMap<String, AttributeValue>, bool) {
    let mut map = BTreeMap::new();
    let mut has_bbox = false;

    let mut add_dict = |dict: &Dictionary, map: &mut BTreeMap<String, AttributeValue>, has_bbox: &mut bool| {
        let owner = dict.get_name("O").map(str::to_owned);
        for (key, value) in dict.iter() {
            if key == "O" {
                continue;
            }
            if key == "BBox" {
                *has_bbox = true;
            }
            let report_key = match &owner {
                Some(owner) => format!("{}:{}", owner, key),
                None => key.clone(),
            };
            map.insert(report_key, attribute_value(doc, value));
        }
    };

    match attrs.map(|obj| doc.resolve(obj)) {
        Some(Object::Dictionary(dict)) => add_dict(dict, &mut map, &mut has_bbox),
        Some(Object::Array(items)) => {
            for item in items {
                if let Some(dict) = doc.resolve(item).as_dict() {
                    add_dict(dict, &mut map, &mut has_bbox);
                }
            }
        }
        _ => {}
    }

    (map, has_bbox)
}

fn attribute_value(doc: &Document, obj: &Object) -> AttributeValue {
    match doc.resolve(obj) {
        Object::Name(name) => AttributeValue::Text(name.clone()),
        Object::String(s) => AttributeValue::Text(s.clone()),
        Object::Integer(n) => AttributeValue::Number(*n as f64),
        Object::Real(n) => AttributeValue::Number(f64::from(*n)),
        Object::Boolean(b) => AttributeValue::Bool(*b),
        Object::Array(items) => AttributeValue::List(
            items
                .iter()
                .map(|item| attribute_value(doc, item))
                .collect(),
        ),
        other => AttributeValue::Text(other.printable()),
    }
}

fn first_mcr_page(doc: &Document, kids: Option<&Object>) -> Option<usize> {
    let page_of = |obj: &Object| match doc.resolve(obj) {
        Object::Dictionary(dict) if dict.get_name("Type") == Some("MCR") => {
            dict.get_reference("Pg").map(|r| r.object_number)
        }
        _ => None,
    };

    match kids.map(|obj| doc.resolve(obj)) {
        Some(Object::Array(items)) => items.iter().find_map(page_of),
        Some(_) => page_of(kids?),
        None => None,
    }
}

fn first_mcid(doc: &Document, kids: Option<&Object>) -> Option<i64> {
    let mcid_of = |obj: &Object| match doc.resolve(obj) {
        Object::Integer(mcid) => Some(*mcid),
        Object::Dictionary(dict) if dict.get_name("Type") == Some("MCR") => {
            dict.get_integer("MCID")
        }
        _ => None,
    };

    match kids.map(|obj| doc.resolve(obj)) {
        Some(Object::Array(items)) => items.iter().find_map(mcid_of),
        Some(_) => mcid_of(kids?),
        None => None,
    }
}

// --- pages ---

fn page_reports(
    doc: &Document,
    pages: &[Page],
    mcids_by_page: &HashMap<usize, BTreeSet<i64>>,
    cancel: &CancelToken,
) -> PdfResult<Vec<PageReport>> {
    let mut reports = Vec::with_capacity(pages.len());

    for page in pages {
        cancel.check()?;

        let media_box = page::media_box(doc, page);

        let tab_order = page::page_dict(doc, page)
            .ok()
            .and_then(|dict| doc.dict_get_name(dict, "Tabs"))
            .map(tab_order_word);

        let font_names = page::resources(doc, page)
            .and_then(|resources| doc.dict_get_dict(resources, "Font"))
            .map(|fonts| {
                fonts
                    .iter()
                    .map(|(key, value)| {
                        doc.resolve(value)
                            .as_dict()
                            .and_then(|font| font.get_name("BaseFont"))
                            .unwrap_or(key)
                            .to_owned()
                    })
                    .collect()
            })
            .unwrap_or_default();

        let structured_mcids = mcids_by_page
            .get(&page.object_number)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();

        reports.push(PageReport {
            page_number: page.number(),
            width: media_box.width(),
            height: media_box.height(),
            tab_order,
            font_names,
            structured_mcids,
        });
    }

    Ok(reports)
}

/// `/Tabs` values are reported with the instruction vocabulary; unknown
/// names pass through verbatim
fn tab_order_word(name: &str) -> String {
    match name {
        "S" => "structure".to_owned(),
        "R" => "row".to_owned(),
        "C" => "column".to_owned(),
        "W" => "unordered".to_owned(),
        other => other.to_owned(),
    }
}

// --- outlines ---

fn outlines(doc: &Document, page_numbers: &HashMap<usize, usize>) -> Vec<OutlineReport> {
    let root = match doc
        .catalog()
        .ok()
        .and_then(|c| doc.dict_get_dict(c, "Outlines"))
    {
        Some(root) => root,
        None => return Vec::new(),
    };

    let mut visited = HashSet::new();
    outline_siblings(doc, root, page_numbers, &mut visited)
}

fn outline_siblings(
    doc: &Document,
    parent: &Dictionary,
    page_numbers: &HashMap<usize, usize>,
    visited: &mut HashSet<usize>,
) -> Vec<OutlineReport> {
    let mut out = Vec::new();
    let mut next = parent.get_reference("First");

    while let Some(r) = next {
        if !visited.insert(r.object_number) {
            warn!("outline cycle through object {}", r.object_number);
            break;
        }

        let dict = match doc.get_object(r.object_number).and_then(Object::as_dict) {
            Some(dict) => dict,
            None => break,
        };

        out.push(OutlineReport {
            title: doc
                .dict_get_string(dict, "Title")
                .unwrap_or_default()
                .to_owned(),
            page: outline_destination_page(doc, dict, page_numbers),
            children: outline_siblings(doc, dict, page_numbers, visited),
        });

        next = dict.get_reference("Next");
    }

    out
}

/// Resolves `/Dest` (or a GoTo `/A` action's `/D`) to a 1-based page
fn outline_destination_page(
    doc: &Document,
    item: &Dictionary,
    page_numbers: &HashMap<usize, usize>,
) -> Option<usize> {
    let dest = doc.dict_get(item, "Dest").or_else(|| {
        let action = doc.dict_get_dict(item, "A")?;
        if doc.dict_get_name(action, "S") != Some("GoTo") {
            return None;
        }
        doc.dict_get(action, "D")
    })?;

    match doc.resolve(dest) {
        Object::Array(arr) => arr
            .first()
            .and_then(Object::as_reference)
            .and_then(|r| page_numbers.get(&r.object_number))
            .copied(),
        _ => None,
    }
}

// --- embedded files & optional content ---

fn embedded_files(doc: &Document) -> Vec<EmbeddedFileReport> {
    let tree = match doc
        .catalog()
        .ok()
        .and_then(|c| doc.dict_get_dict(c, "Names"))
        .and_then(|names| doc.dict_get_dict(names, "EmbeddedFiles"))
    {
        Some(tree) => tree,
        None => return Vec::new(),
    };

    let mut out = Vec::new();
    let mut visited = HashSet::new();
    walk_name_tree(doc, tree, &mut out, &mut visited);
    out
}

fn walk_name_tree(
    doc: &Document,
    node: &Dictionary,
    out: &mut Vec<EmbeddedFileReport>,
    visited: &mut HashSet<usize>,
) {
    if let Some(kids) = doc.dict_get_array(node, "Kids") {
        for kid in kids {
            if let Object::Reference(r) = kid {
                if !visited.insert(r.object_number) {
                    continue;
                }
            }
            if let Some(kid) = doc.resolve(kid).as_dict() {
                walk_name_tree(doc, kid, out, visited);
            }
        }
    }

    if let Some(names) = doc.dict_get_array(node, "Names") {
        for pair in names.chunks_exact(2) {
            let name = doc
                .resolve(&pair[0])
                .as_string()
                .unwrap_or_default()
                .to_owned();
            if let Some(spec) = doc.resolve(&pair[1]).as_dict() {
                out.push(EmbeddedFileReport {
                    name,
                    has_f: spec.contains_key("F"),
                    has_uf: spec.contains_key("UF"),
                });
            }
        }
    }
}

fn optional_content_configs(doc: &Document) -> Vec<OptionalContentConfigReport> {
    let properties = match doc
        .catalog()
        .ok()
        .and_then(|c| doc.dict_get_dict(c, "OCProperties"))
    {
        Some(properties) => properties,
        None => return Vec::new(),
    };

    let mut configs = Vec::new();

    if let Some(default) = doc.dict_get_dict(properties, "D") {
        configs.push(config_report(doc, default));
    }
    if let Some(alternates) = doc.dict_get_array(properties, "Configs") {
        for config in alternates {
            if let Some(dict) = doc.resolve(config).as_dict() {
                configs.push(config_report(doc, dict));
            }
        }
    }

    configs
}

fn config_report(doc: &Document, config: &Dictionary) -> OptionalContentConfigReport {
    OptionalContentConfigReport {
        name: doc.dict_get_string(config, "Name").map(str::to_owned),
        creator: doc.dict_get_string(config, "Creator").map(str::to_owned),
        base_state: doc.dict_get_name(config, "BaseState").map(str::to_owned),
        on_count: doc.dict_get_array(config, "ON").map_or(0, <[Object]>::len),
        off_count: doc.dict_get_array(config, "OFF").map_or(0, <[Object]>::len),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        cancel::CancelToken,
        instructions::{
            Bbox, BookmarkInstruction, ContentTagInstruction, InstructionSet,
            MetadataInstruction, StructureInstruction, StructureNode, TabOrder,
        },
        interpreter::Interpreter,
        testutil,
    };

    fn inspect_bytes(bytes: &[u8]) -> InspectionReport {
        inspect(bytes, &CancelToken::new()).unwrap()
    }

    #[test]
    fn untagged_hello_world_report() {
        let report = inspect_bytes(&testutil::hello_world_pdf());

        assert!(!report.document.is_tagged);
        assert_eq!(report.document.page_count, 1);
        assert!(!report.document.is_encrypted);
        assert!(report.document.title.is_none());

        assert_eq!(report.pages.len(), 1);
        assert_eq!(report.pages[0].width, 612.0);
        assert_eq!(report.pages[0].height, 792.0);
        assert!(report.pages[0]
            .font_names
            .contains(&"Helvetica".to_owned()));
        assert!(report.pages[0].structured_mcids.is_empty());

        assert_eq!(report.fonts.len(), 1);
        assert_eq!(report.fonts[0].name, "Helvetica");
        assert!(!report.fonts[0].is_embedded);
    }

    #[test]
    fn file_hash_is_64_lowercase_hex_chars() {
        let report = inspect_bytes(&testutil::hello_world_pdf());

        assert_eq!(report.file_hash.len(), 64);
        assert!(report
            .file_hash
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(report.file_size as usize, testutil::hello_world_pdf().len());
    }

    #[test]
    fn inspection_is_pure() {
        let bytes = testutil::hello_world_pdf();

        let first = serde_json::to_string(&inspect_bytes(&bytes)).unwrap();
        let second = serde_json::to_string(&inspect_bytes(&bytes)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn executed_metadata_appears_in_the_report() {
        let instructions = InstructionSet {
            metadata: Some(MetadataInstruction {
                language: Some("en-US".to_owned()),
                title: Some("T".to_owned()),
                display_doc_title: Some(true),
                mark_info: Some(true),
                pdf_ua_identifier: Some(1),
                tab_order: Some(TabOrder::Structure),
            }),
            ..InstructionSet::default()
        };

        let output = Interpreter::new()
            .execute(
                &testutil::hello_world_pdf(),
                &instructions,
                &CancelToken::new(),
            )
            .unwrap();
        let report = inspect_bytes(&output);

        assert_eq!(report.document.language.as_deref(), Some("en-US"));
        assert_eq!(report.document.title.as_deref(), Some("T"));
        assert!(report.document.display_doc_title);
        assert!(report.document.mark_info_marked);
        assert_eq!(report.pages[0].tab_order.as_deref(), Some("structure"));

        let xmp = report.xmp_metadata.expect("xmp metadata present");
        let xml = base64::engine::general_purpose::STANDARD.decode(xmp).unwrap();
        let xml = String::from_utf8(xml).unwrap();
        assert!(xml.contains("dc:title"));
        assert!(xml.contains("<pdfuaid:part>1</pdfuaid:part>"));
    }

    #[test]
    fn executed_structure_appears_in_the_report() {
        let instructions = InstructionSet {
            structure: Some(StructureInstruction {
                strip_existing: false,
                root: "Document".to_owned(),
                children: vec![
                    StructureNode {
                        id: Some("h1".to_owned()),
                        role: "H1".to_owned(),
                        ..StructureNode::default()
                    },
                    StructureNode {
                        id: Some("p1".to_owned()),
                        role: "P".to_owned(),
                        ..StructureNode::default()
                    },
                ],
            }),
            content_tagging: vec![ContentTagInstruction {
                node: "h1".to_owned(),
                page: 1,
                bbox: Bbox {
                    x: 72.0,
                    y: 699.0,
                    width: 80.0,
                    height: 14.0,
                },
            }],
            ..InstructionSet::default()
        };

        let output = Interpreter::new()
            .execute(
                &testutil::hello_world_pdf(),
                &instructions,
                &CancelToken::new(),
            )
            .unwrap();
        let report = inspect_bytes(&output);

        assert!(report.document.is_tagged);
        assert!(report.document.has_structural_parent_tree);

        assert_eq!(report.structure_tree.len(), 1);
        let document = &report.structure_tree[0];
        assert_eq!(document.role, "Document");
        assert_eq!(document.children.len(), 2);
        assert_eq!(document.children[0].role, "H1");
        assert_eq!(document.children[1].role, "P");

        let h1 = &document.children[0];
        assert_eq!(h1.first_mcid, Some(0));
        assert_eq!(h1.page, Some(1));

        assert_eq!(report.pages[0].structured_mcids, vec![0]);
    }

    #[test]
    fn attribute_extraction_prefixes_owners() {
        let instructions = InstructionSet {
            structure: Some(StructureInstruction {
                strip_existing: false,
                root: "Document".to_owned(),
                children: vec![StructureNode {
                    id: Some("fig".to_owned()),
                    role: "Figure".to_owned(),
                    alt_text: Some("a chart".to_owned()),
                    bbox: Some(Bbox {
                        x: 10.0,
                        y: 20.0,
                        width: 100.0,
                        height: 80.0,
                    }),
                    ..StructureNode::default()
                }],
            }),
            ..InstructionSet::default()
        };

        let output = Interpreter::new()
            .execute(
                &testutil::hello_world_pdf(),
                &instructions,
                &CancelToken::new(),
            )
            .unwrap();
        let report = inspect_bytes(&output);

        let figure = &report.structure_tree[0].children[0];
        assert_eq!(figure.alt_text.as_deref(), Some("a chart"));
        assert!(figure.has_bbox);
        assert_eq!(
            figure.attributes.get("Layout:BBox"),
            Some(&AttributeValue::List(vec![
                AttributeValue::Number(10.0),
                AttributeValue::Number(20.0),
                AttributeValue::Number(110.0),
                AttributeValue::Number(100.0),
            ]))
        );
    }

    #[test]
    fn generated_outlines_appear_nested() {
        let instructions = InstructionSet {
            structure: Some(StructureInstruction {
                strip_existing: false,
                root: "Document".to_owned(),
                children: vec![
                    StructureNode {
                        id: Some("h1".to_owned()),
                        role: "H1".to_owned(),
                        actual_text: Some("Chapter".to_owned()),
                        ..StructureNode::default()
                    },
                    StructureNode {
                        id: Some("h2".to_owned()),
                        role: "H2".to_owned(),
                        actual_text: Some("Section".to_owned()),
                        ..StructureNode::default()
                    },
                ],
            }),
            content_tagging: vec![
                ContentTagInstruction {
                    node: "h1".to_owned(),
                    page: 1,
                    bbox: Bbox {
                        x: 72.0,
                        y: 699.0,
                        width: 80.0,
                        height: 14.0,
                    },
                },
            ],
            bookmarks: Some(BookmarkInstruction {
                generate_from_headings: true,
            }),
            ..InstructionSet::default()
        };

        let output = Interpreter::new()
            .execute(
                &testutil::hello_world_pdf(),
                &instructions,
                &CancelToken::new(),
            )
            .unwrap();
        let report = inspect_bytes(&output);

        assert_eq!(report.outlines.len(), 1);
        assert_eq!(report.outlines[0].title, "Chapter");
        assert_eq!(report.outlines[0].page, Some(1));
    }

    #[test]
    fn cancelled_inspection_stops() {
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = inspect(&testutil::hello_world_pdf(), &cancel).unwrap_err();
        assert_eq!(err.kind(), "cancelled");
    }
}
