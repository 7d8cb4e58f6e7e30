use std::collections::{HashMap, HashSet};

use log::warn;

use crate::{
    data_structures::Rectangle,
    document::{Address, Document},
    error::{PdfError, PdfResult},
    objects::{Dictionary, Object, Stream},
};

/// A leaf of the page tree: the page dictionary's object number plus its
/// 0-based position in reading order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Page {
    pub object_number: usize,
    pub index: usize,
}

impl Page {
    /// 1-based page number, as used by instructions and reports
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// Collects the leaves of the page tree in reading order. Inner nodes may
/// nest arbitrarily; cycles are guarded by object identity
pub fn pages(doc: &Document) -> PdfResult<Vec<Page>> {
    let catalog = doc.catalog()?;
    let root = match catalog.get_reference("Pages") {
        Some(r) => r,
        None => return Ok(Vec::new()),
    };

    let mut leaves = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![root.object_number];

    while let Some(number) = stack.pop() {
        if !visited.insert(number) {
            warn!("page tree cycle through object {}", number);
            continue;
        }

        let dict = match doc.get_object(number).and_then(Object::as_dict) {
            Some(dict) => dict,
            None => continue,
        };

        match dict.get_name("Type") {
            Some("Pages") | None if dict.contains_key("Kids") => {
                let kids = doc.dict_get_array(dict, "Kids").unwrap_or(&[]);
                // pushed reversed so pops come out in document order
                for kid in kids.iter().rev() {
                    match kid {
                        Object::Reference(r) => stack.push(r.object_number),
                        _ => warn!("page tree kid is not an indirect reference; skipped"),
                    }
                }
            }
            _ => {
                leaves.push(Page {
                    object_number: number,
                    index: leaves.len(),
                });
            }
        }
    }

    Ok(leaves)
}

/// Fetches a page by its 1-based number, failing descriptively
pub fn page_at(doc: &Document, number: usize) -> PdfResult<Page> {
    let all = pages(doc)?;
    let count = all.len();

    all.into_iter()
        .find(|page| page.number() == number)
        .ok_or_else(|| {
            PdfError::not_found(
                format!("page {}", number),
                format!("document ({} pages)", count),
            )
        })
}

/// Maps page-dictionary object numbers to 1-based page numbers, for
/// resolving `/Pg` references
pub fn page_numbers_by_object(doc: &Document) -> PdfResult<HashMap<usize, usize>> {
    Ok(pages(doc)?
        .into_iter()
        .map(|page| (page.object_number, page.number()))
        .collect())
}

pub fn page_dict<'a>(doc: &'a Document, page: &Page) -> PdfResult<&'a Dictionary> {
    doc.get_object(page.object_number)
        .and_then(Object::as_dict)
        .ok_or_else(|| PdfError::internal(format!("page object {} vanished", page.object_number)))
}

/// A page attribute, walking the `/Parent` chain for inheritable entries
pub fn inherited<'a>(doc: &'a Document, page: &Page, key: &str) -> Option<&'a Object> {
    let mut number = page.object_number;
    let mut visited = HashSet::new();

    while visited.insert(number) {
        let dict = doc.get_object(number)?.as_dict()?;

        if let Some(obj) = doc.dict_get(dict, key) {
            return Some(obj);
        }

        number = dict.get_reference("Parent")?.object_number;
    }

    None
}

pub fn media_box(doc: &Document, page: &Page) -> Rectangle {
    inherited(doc, page, "MediaBox")
        .and_then(Object::as_array)
        .and_then(Rectangle::from_array)
        .unwrap_or_else(|| {
            warn!("page {} has no MediaBox; assuming letter", page.number());
            Rectangle::from_points(0.0, 0.0, 612.0, 792.0)
        })
}

pub fn resources<'a>(doc: &'a Document, page: &Page) -> Option<&'a Dictionary> {
    inherited(doc, page, "Resources").and_then(Object::as_dict)
}

/// The address of the page's own `/Resources`, materializing a copy of an
/// inherited dictionary onto the page first so edits stay page-local
pub fn ensure_resources(doc: &mut Document, page: &Page) -> PdfResult<Address> {
    let has_own = page_dict(doc, page)?.contains_key("Resources");

    if !has_own {
        let copied = resources(doc, page).cloned().unwrap_or_default();
        let addr = Address::new(page.object_number);
        doc.dict_at_mut(&addr)?
            .insert("Resources", Object::Dictionary(copied));
    }

    doc.locate(page.object_number, &["Resources"])
}

/// The page's imaging program: every content stream decoded and
/// concatenated, newline separated
pub fn content_bytes(doc: &Document, page: &Page) -> PdfResult<Vec<u8>> {
    let dict = page_dict(doc, page)?;

    let mut streams = Vec::new();
    match dict.get("Contents").map(|obj| doc.resolve(obj)) {
        None | Some(Object::Null) => {}
        Some(Object::Stream(stream)) => streams.push(stream),
        Some(Object::Array(arr)) => {
            for entry in arr {
                match doc.resolve(entry) {
                    Object::Stream(stream) => streams.push(stream),
                    _ => warn!("page {} content entry is not a stream", page.number()),
                }
            }
        }
        Some(_) => {
            return Err(PdfError::parse(format!(
                "page {} Contents is neither stream nor array",
                page.number()
            )))
        }
    }

    let mut out = Vec::new();
    for (i, stream) in streams.iter().enumerate() {
        if i > 0 {
            out.push(b'\n');
        }
        out.extend_from_slice(&doc.decoded_stream(stream)?);
    }

    Ok(out)
}

/// Replaces the page's imaging program with `bytes`: the first stream
/// receives the new program, every following stream is emptied, and a page
/// without streams gets one
pub fn set_content(doc: &mut Document, page: &Page, bytes: Vec<u8>) -> PdfResult<()> {
    let dict = page_dict(doc, page)?;

    let targets: Vec<usize> = match dict.get("Contents").map(|obj| doc.resolve(obj)) {
        None | Some(Object::Null) => Vec::new(),
        Some(Object::Stream(..)) => match dict.get("Contents") {
            Some(Object::Reference(r)) => vec![r.object_number],
            // a direct stream on the page is replaced by a proper indirect one
            _ => {
                let stream = doc.add_object(Object::Stream(Stream::new(Dictionary::new(), bytes)));
                let addr = Address::new(page.object_number);
                doc.dict_at_mut(&addr)?
                    .insert("Contents", Object::Reference(stream));
                return Ok(());
            }
        },
        Some(Object::Array(arr)) => arr
            .iter()
            .filter_map(Object::as_reference)
            .map(|r| r.object_number)
            .collect(),
        Some(_) => Vec::new(),
    };

    if targets.is_empty() {
        let stream = doc.add_object(Object::Stream(Stream::new(Dictionary::new(), bytes)));
        let addr = Address::new(page.object_number);
        doc.dict_at_mut(&addr)?
            .insert("Contents", Object::Reference(stream));
        return Ok(());
    }

    for (i, number) in targets.iter().enumerate() {
        let data = if i == 0 { bytes.clone() } else { Vec::new() };
        match doc.object_mut(*number) {
            Some(obj) => *obj = Object::Stream(Stream::new(Dictionary::new(), data)),
            None => warn!("content stream object {} vanished", number),
        }
    }

    Ok(())
}

/// Appends a content stream after the existing ones, preserving visible
/// content (used by the OCR overlay)
pub fn append_content_stream(doc: &mut Document, page: &Page, bytes: Vec<u8>) -> PdfResult<()> {
    let new_ref = doc.add_object(Object::Stream(Stream::new(Dictionary::new(), bytes)));

    let dict = page_dict(doc, page)?;
    let existing = dict.get("Contents").cloned();

    let addr = Address::new(page.object_number);
    let page_dict = doc.dict_at_mut(&addr)?;

    match existing {
        None => {
            page_dict.insert("Contents", Object::Reference(new_ref));
        }
        Some(Object::Array(mut arr)) => {
            arr.push(Object::Reference(new_ref));
            page_dict.insert("Contents", Object::Array(arr));
        }
        Some(single) => {
            page_dict.insert(
                "Contents",
                Object::Array(vec![single, Object::Reference(new_ref)]),
            );
        }
    }

    Ok(())
}

/// Promotes every entry of the page's `/Annots` array to an indirect
/// object and returns their addresses in array order
pub fn annotation_addresses(doc: &mut Document, page: &Page) -> PdfResult<Vec<Address>> {
    let dict = page_dict(doc, page)?;

    let entries = match dict.get("Annots").map(|obj| doc.resolve(obj)) {
        None | Some(Object::Null) => return Ok(Vec::new()),
        Some(Object::Array(arr)) => arr.clone(),
        Some(_) => {
            return Err(PdfError::parse(format!(
                "page {} Annots is not an array",
                page.number()
            )))
        }
    };

    let mut addresses = Vec::with_capacity(entries.len());
    let mut rebuilt = Vec::with_capacity(entries.len());
    let mut changed = false;

    for entry in entries {
        match entry {
            Object::Reference(r) => {
                addresses.push(Address::new(r.object_number));
                rebuilt.push(Object::Reference(r));
            }
            direct => {
                let r = doc.add_object(direct);
                changed = true;
                addresses.push(Address::new(r.object_number));
                rebuilt.push(Object::Reference(r));
            }
        }
    }

    if changed {
        // the array itself may live behind a reference
        let addr = doc.locate(page.object_number, &["Annots"])?;
        *doc.object_at_mut(&addr)? = Object::Array(rebuilt);
    }

    Ok(addresses)
}
