use std::collections::{HashMap, HashSet, VecDeque};

use log::debug;

use crate::{
    cancel::CancelToken,
    content::{ContentScanner, ContentToken},
    document::Document,
    error::{PdfError, PdfResult},
    instructions::BookmarkInstruction,
    objects::{Dictionary, Object, Reference},
    page::{self, Page},
};

/// Generates a nested outline from the `H1`…`H6` elements of the
/// structure tree. Titles come from `/ActualText` when present, otherwise
/// from the text inside the headings' marked-content blocks; a document
/// whose marked-content references yield nothing falls back to scanning
/// the content streams for heading-named brackets and matching them to
/// the tree positionally by role
#[derive(Debug, Default)]
pub struct BookmarkHandler;

impl BookmarkHandler {
    pub fn apply(
        &self,
        doc: &mut Document,
        instruction: &BookmarkInstruction,
        cancel: &CancelToken,
    ) -> PdfResult<()> {
        if !instruction.generate_from_headings {
            return Ok(());
        }

        let headings = collect_headings(doc)?;
        if headings.is_empty() {
            debug!("no heading elements in the structure tree");
            return Ok(());
        }

        let page_numbers = page::page_numbers_by_object(doc)?;
        let mut cache = TextCache::default();

        let mut resolved: Vec<Option<(String, usize)>> = Vec::with_capacity(headings.len());
        for heading in &headings {
            resolved.push(resolve_heading(doc, heading, &page_numbers, &mut cache, cancel)?);
        }

        // the positional fallback only fires when marked content gave us
        // nothing at all
        if resolved.iter().all(Option::is_none) {
            resolved = match_headings_positionally(doc, &headings, cancel)?;
        }

        let entries: Vec<(u8, String, usize)> = headings
            .iter()
            .zip(resolved)
            .filter_map(|(heading, resolved)| {
                resolved.map(|(title, page)| (heading.level, title, page))
            })
            .collect();

        if entries.is_empty() {
            return Ok(());
        }

        build_outline(doc, &entries)
    }
}

#[derive(Debug)]
struct Heading {
    level: u8,
    role: String,
    actual_text: Option<String>,
    /// `(page object number, MCID)` per marked-content kid; the page falls
    /// back to the nearest enclosing `/Pg`
    mcrs: Vec<(Option<usize>, i64)>,
    /// Nearest enclosing `/Pg` object number
    pg: Option<usize>,
}

fn heading_level(role: &str) -> Option<u8> {
    match role {
        "H1" => Some(1),
        "H2" => Some(2),
        "H3" => Some(3),
        "H4" => Some(4),
        "H5" => Some(5),
        "H6" => Some(6),
        _ => None,
    }
}

/// Walks the structure tree in document order collecting heading elements
fn collect_headings(doc: &Document) -> PdfResult<Vec<Heading>> {
    let catalog = doc.catalog()?;
    let root = match doc.dict_get_dict(catalog, "StructTreeRoot") {
        Some(root) => root,
        None => return Ok(Vec::new()),
    };

    let mut out = Vec::new();
    let mut visited = HashSet::new();

    if let Some(kids) = root.get("K") {
        walk_element(doc, kids, None, &mut out, &mut visited);
    }

    Ok(out)
}

fn walk_element(
    doc: &Document,
    obj: &Object,
    current_pg: Option<usize>,
    out: &mut Vec<Heading>,
    visited: &mut HashSet<usize>,
) {
    if let Object::Reference(r) = obj {
        if !visited.insert(r.object_number) {
            return;
        }
    }

    match doc.resolve(obj) {
        Object::Array(items) => {
            for item in items {
                walk_element(doc, item, current_pg, out, visited);
            }
        }
        Object::Dictionary(dict) => {
            match dict.get_name("Type") {
                // content items are handled while reading their parent
                Some("MCR") | Some("OBJR") => return,
                _ => {}
            }

            let role = match dict.get_name("S") {
                Some(role) => role.to_owned(),
                None => return,
            };

            let pg = dict
                .get_reference("Pg")
                .map(|r| r.object_number)
                .or(current_pg);

            if let Some(level) = heading_level(&role) {
                out.push(Heading {
                    level,
                    role,
                    actual_text: dict.get_string("ActualText").map(str::to_owned),
                    mcrs: collect_mcrs(doc, dict.get("K"), pg),
                    pg,
                });
                return;
            }

            if let Some(kids) = dict.get("K") {
                walk_element(doc, kids, pg, out, visited);
            }
        }
        _ => {}
    }
}

/// The marked-content kids of one element: integer MCIDs take the nearest
/// enclosing `/Pg`, MCR dictionaries may carry their own
fn collect_mcrs(
    doc: &Document,
    kids: Option<&Object>,
    pg: Option<usize>,
) -> Vec<(Option<usize>, i64)> {
    let mut out = Vec::new();

    let mut gather = |obj: &Object, out: &mut Vec<(Option<usize>, i64)>| {
        match doc.resolve(obj) {
            Object::Integer(mcid) => out.push((pg, *mcid)),
            Object::Dictionary(dict) if dict.get_name("Type") == Some("MCR") => {
                if let Some(mcid) = dict.get_integer("MCID") {
                    let mcr_pg = dict.get_reference("Pg").map(|r| r.object_number).or(pg);
                    out.push((mcr_pg, mcid));
                }
            }
            _ => {}
        }
    };

    match kids.map(|obj| doc.resolve(obj)) {
        Some(Object::Array(items)) => {
            for item in items {
                gather(item, &mut out);
            }
        }
        Some(obj) => gather(obj, &mut out),
        None => {}
    }

    out
}

/// Title and 1-based destination page of one heading via its marked
/// content; `None` when neither `ActualText` nor MCID text is available
fn resolve_heading(
    doc: &Document,
    heading: &Heading,
    page_numbers: &HashMap<usize, usize>,
    cache: &mut TextCache,
    cancel: &CancelToken,
) -> PdfResult<Option<(String, usize)>> {
    let page_object = heading
        .mcrs
        .iter()
        .find_map(|(pg, _)| *pg)
        .or(heading.pg);

    let page_number = match page_object.and_then(|obj| page_numbers.get(&obj)) {
        Some(number) => *number,
        None => return Ok(None),
    };

    if let Some(actual) = &heading.actual_text {
        return Ok(Some((actual.clone(), page_number)));
    }

    let mut title = String::new();
    for (pg, mcid) in &heading.mcrs {
        let pg = match pg.or(heading.pg) {
            Some(pg) => pg,
            None => continue,
        };
        if let Some(text) = cache.text_for(doc, pg, *mcid, cancel)? {
            title.push_str(&text);
        }
    }

    if title.is_empty() {
        return Ok(None);
    }

    Ok(Some((title, page_number)))
}

/// Per-page map from MCID to the text shown inside its bracket, built by
/// scanning the content once and kept for later headings on the same page
#[derive(Debug, Default)]
struct TextCache {
    pages: HashMap<usize, HashMap<i64, String>>,
}

impl TextCache {
    fn text_for(
        &mut self,
        doc: &Document,
        page_object: usize,
        mcid: i64,
        cancel: &CancelToken,
    ) -> PdfResult<Option<String>> {
        if !self.pages.contains_key(&page_object) {
            cancel.check()?;
            let map = match find_page(doc, page_object)? {
                Some(page) => scan_mcid_text(doc, &page)?,
                None => HashMap::new(),
            };
            self.pages.insert(page_object, map);
        }

        Ok(self.pages[&page_object].get(&mcid).cloned())
    }
}

fn find_page(doc: &Document, page_object: usize) -> PdfResult<Option<Page>> {
    Ok(page::pages(doc)?
        .into_iter()
        .find(|page| page.object_number == page_object))
}

/// Scans one page's content, attributing shown text to the innermost
/// marked-content bracket that carries an MCID
fn scan_mcid_text(doc: &Document, page: &Page) -> PdfResult<HashMap<i64, String>> {
    let bytes = page::content_bytes(doc, page)?;

    let mut map: HashMap<i64, String> = HashMap::new();
    let mut stack: Vec<Option<i64>> = Vec::new();
    let mut operands: Vec<Object> = Vec::new();

    for token in ContentScanner::new(&bytes) {
        let token = match token {
            Ok(token) => token,
            Err(_) => break,
        };

        match token {
            ContentToken::Object(obj) => operands.push(obj),
            ContentToken::Operator(op) => {
                match op.as_str() {
                    "BDC" => {
                        let mcid = operands
                            .last()
                            .and_then(Object::as_dict)
                            .and_then(|dict| dict.get_integer("MCID"));
                        stack.push(mcid);
                    }
                    "BMC" => stack.push(None),
                    "EMC" => {
                        stack.pop();
                    }
                    "Tj" | "'" | "\"" => {
                        if let Some(text) = operands.last().and_then(Object::as_string) {
                            append_to_innermost(&mut map, &stack, text);
                        }
                    }
                    "TJ" => {
                        if let Some(arr) = operands.last().and_then(Object::as_array) {
                            let text: String = arr
                                .iter()
                                .filter_map(Object::as_string)
                                .collect();
                            append_to_innermost(&mut map, &stack, &text);
                        }
                    }
                    _ => {}
                }
                operands.clear();
            }
        }
    }

    Ok(map)
}

fn append_to_innermost(map: &mut HashMap<i64, String>, stack: &[Option<i64>], text: &str) {
    if let Some(mcid) = stack.iter().rev().flatten().next() {
        map.entry(*mcid).or_default().push_str(text);
    }
}

/// The last-resort path: scan every page for `/H1`…`/H6` brackets and
/// hand their text to the structure-tree headings in role order. Brittle
/// when bracket order differs from tree order; kept as the source behaves
fn match_headings_positionally(
    doc: &Document,
    headings: &[Heading],
    cancel: &CancelToken,
) -> PdfResult<Vec<Option<(String, usize)>>> {
    let mut by_role: HashMap<String, VecDeque<(String, usize)>> = HashMap::new();

    for page in page::pages(doc)? {
        cancel.check()?;
        for (role, text) in scan_heading_brackets(doc, &page)? {
            by_role
                .entry(role)
                .or_default()
                .push_back((text, page.number()));
        }
    }

    Ok(headings
        .iter()
        .map(|heading| {
            by_role
                .get_mut(&heading.role)
                .and_then(VecDeque::pop_front)
        })
        .collect())
}

/// `(role, text)` for every heading-named bracket on the page, in stream
/// order
fn scan_heading_brackets(doc: &Document, page: &Page) -> PdfResult<Vec<(String, String)>> {
    let bytes = page::content_bytes(doc, page)?;

    let mut out: Vec<(String, String)> = Vec::new();
    // (tag, position in `out` when the tag is a heading)
    let mut stack: Vec<Option<usize>> = Vec::new();
    let mut operands: Vec<Object> = Vec::new();

    for token in ContentScanner::new(&bytes) {
        let token = match token {
            Ok(token) => token,
            Err(_) => break,
        };

        match token {
            ContentToken::Object(obj) => operands.push(obj),
            ContentToken::Operator(op) => {
                match op.as_str() {
                    "BDC" | "BMC" => {
                        let tag = operands.first().and_then(Object::as_name);
                        match tag.filter(|tag| heading_level(tag).is_some()) {
                            Some(tag) => {
                                out.push((tag.to_owned(), String::new()));
                                stack.push(Some(out.len() - 1));
                            }
                            None => stack.push(None),
                        }
                    }
                    "EMC" => {
                        stack.pop();
                    }
                    "Tj" | "'" | "\"" => {
                        if let Some(text) = operands.last().and_then(Object::as_string) {
                            if let Some(slot) = stack.iter().rev().flatten().next() {
                                out[*slot].1.push_str(text);
                            }
                        }
                    }
                    "TJ" => {
                        if let Some(arr) = operands.last().and_then(Object::as_array) {
                            if let Some(slot) = stack.iter().rev().flatten().next() {
                                let text: String =
                                    arr.iter().filter_map(Object::as_string).collect();
                                out[*slot].1.push_str(&text);
                            }
                        }
                    }
                    _ => {}
                }
                operands.clear();
            }
        }
    }

    Ok(out)
}

/// Builds the nested outline with a level stack: each heading pops to its
/// ancestor and appends a child with a fit-to-page destination
fn build_outline(doc: &mut Document, entries: &[(u8, String, usize)]) -> PdfResult<()> {
    let pages = page::pages(doc)?;
    let root_number = ensure_outlines_root(doc)?;

    let mut stack: Vec<(u8, usize)> = vec![(0, root_number)];

    for (level, title, page_number) in entries {
        let page_object = match pages.iter().find(|page| page.number() == *page_number) {
            Some(page) => page.object_number,
            None => continue,
        };

        while stack.last().map_or(false, |(l, _)| *l >= *level) {
            stack.pop();
        }
        let parent = stack.last().map_or(root_number, |(_, n)| *n);

        let item = append_outline_item(doc, parent, title, page_object)?;

        // every open ancestor counts this descendant
        for (_, ancestor) in &stack {
            let dict = doc
                .object_mut(*ancestor)
                .and_then(Object::as_dict_mut)
                .ok_or_else(|| PdfError::internal("outline node vanished"))?;
            let count = dict.get_integer("Count").unwrap_or(0);
            dict.insert("Count", Object::Integer(count + 1));
        }

        stack.push((*level, item.object_number));
    }

    Ok(())
}

fn ensure_outlines_root(doc: &mut Document) -> PdfResult<usize> {
    let catalog = doc.catalog()?;

    match catalog.get("Outlines") {
        Some(Object::Reference(r)) => Ok(r.object_number),
        _ => {
            let created = doc.add_object(Object::Dictionary(Dictionary::from_entries(vec![(
                "Type",
                Object::name("Outlines"),
            )])));
            doc.catalog_mut()?
                .insert("Outlines", Object::Reference(created));
            Ok(created.object_number)
        }
    }
}

fn append_outline_item(
    doc: &mut Document,
    parent_number: usize,
    title: &str,
    page_object: usize,
) -> PdfResult<Reference> {
    let item = doc.add_object(Object::Dictionary(Dictionary::from_entries(vec![
        ("Title", Object::string(title.to_owned())),
        ("Parent", Object::Reference(Reference::new(parent_number))),
        (
            "Dest",
            Object::Array(vec![
                Object::Reference(Reference::new(page_object)),
                Object::name("Fit"),
            ]),
        ),
    ])));

    let previous = doc
        .get_object(parent_number)
        .and_then(Object::as_dict)
        .and_then(|dict| dict.get_reference("Last"));

    let parent = doc
        .object_mut(parent_number)
        .and_then(Object::as_dict_mut)
        .ok_or_else(|| PdfError::internal("outline parent vanished"))?;
    if parent.get("First").is_none() {
        parent.insert("First", Object::Reference(item));
    }
    parent.insert("Last", Object::Reference(item));

    if let Some(previous) = previous {
        doc.object_mut(previous.object_number)
            .and_then(Object::as_dict_mut)
            .ok_or_else(|| PdfError::internal("outline sibling vanished"))?
            .insert("Next", Object::Reference(item));
        doc.object_mut(item.object_number)
            .and_then(Object::as_dict_mut)
            .unwrap()
            .insert("Prev", Object::Reference(previous));
    }

    Ok(item)
}
