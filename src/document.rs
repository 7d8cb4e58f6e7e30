use std::collections::BTreeMap;

use log::warn;

use crate::{
    error::{PdfError, PdfResult},
    filter,
    lex::{LexBase, Lexer},
    objects::{Dictionary, Object, Reference, Stream},
    writer,
    xref::{Xref, XrefEntry},
};

static NULL: Object = Object::Null;

/// How many reference hops resolution follows before assuming a cycle
const MAX_RESOLVE_DEPTH: usize = 32;

/// The location of a mutable object: an indirect object plus the key path
/// of direct dictionaries descended inside it.
///
/// Computed by [`Document::locate`], consumed by [`Document::dict_at_mut`].
/// Splitting address computation from mutation keeps borrows single-object
#[derive(Debug, Clone)]
pub struct Address {
    pub object_number: usize,
    pub path: Vec<String>,
}

impl Address {
    pub fn new(object_number: usize) -> Self {
        Self {
            object_number,
            path: Vec::new(),
        }
    }
}

/// A mutable in-memory PDF document.
///
/// All indirect objects live in an arena keyed by object number; references
/// are indices into the arena, never owning pointers, so the cyclic object
/// graph (page tree parents, parent tree) needs no special ownership
#[derive(Debug)]
pub struct Document {
    objects: BTreeMap<usize, Object>,
    pub trailer: Dictionary,
    /// The header version, e.g. "1.7"
    pub version: String,
    next_object_number: usize,
}

impl Document {
    /// An empty document holding a catalog and an empty page tree
    pub fn new() -> Self {
        let mut doc = Self {
            objects: BTreeMap::new(),
            trailer: Dictionary::new(),
            version: "1.7".to_owned(),
            next_object_number: 1,
        };

        let pages = doc.add_object(Object::Dictionary(Dictionary::from_entries(vec![
            ("Type", Object::name("Pages")),
            ("Kids", Object::Array(Vec::new())),
            ("Count", Object::Integer(0)),
        ])));
        let catalog = doc.add_object(Object::Dictionary(Dictionary::from_entries(vec![
            ("Type", Object::name("Catalog")),
            ("Pages", Object::Reference(pages)),
        ])));
        doc.trailer.insert("Root", Object::Reference(catalog));

        doc
    }

    pub fn load(file: &[u8]) -> PdfResult<Self> {
        let version = parse_header_version(file)?;
        let xref = Xref::parse(file)?;

        let mut objects = BTreeMap::new();

        // pass 1: objects stored directly in the file body
        for (&number, entry) in &xref.entries {
            if let XrefEntry::InUse { byte_offset } = entry {
                match lex_object_at(file, &xref, *byte_offset) {
                    Ok(obj) => {
                        objects.insert(number, obj);
                    }
                    Err(err) => warn!("skipping unreadable object {}: {}", number, err),
                }
            }
        }

        // pass 2: objects packed into object streams
        for (&number, entry) in &xref.entries {
            if let XrefEntry::InStream {
                stream_number,
                index,
            } = entry
            {
                match lex_object_in_stream(&objects, *stream_number, *index) {
                    Ok(obj) => {
                        objects.insert(number, obj);
                    }
                    Err(err) => warn!("skipping unreadable object {}: {}", number, err),
                }
            }
        }

        let next_object_number = objects.keys().next_back().map_or(1, |max| max + 1);

        Ok(Self {
            objects,
            trailer: xref.trailer,
            version,
            next_object_number,
        })
    }

    /// Serializes the document as a complete PDF file
    pub fn save(&self) -> PdfResult<Vec<u8>> {
        writer::write_document(self)
    }

    pub fn is_encrypted(&self) -> bool {
        self.trailer.contains_key("Encrypt")
    }

    pub fn object_numbers(&self) -> impl Iterator<Item = usize> + '_ {
        self.objects.keys().copied()
    }

    pub fn get_object(&self, number: usize) -> Option<&Object> {
        self.objects.get(&number)
    }

    pub fn object_mut(&mut self, number: usize) -> Option<&mut Object> {
        self.objects.get_mut(&number)
    }

    pub fn add_object(&mut self, obj: Object) -> Reference {
        let number = self.next_object_number;
        self.next_object_number += 1;
        self.objects.insert(number, obj);

        Reference::new(number)
    }

    /// Follows reference chains to a concrete object. A dangling reference
    /// resolves to null
    pub fn resolve<'a>(&'a self, obj: &'a Object) -> &'a Object {
        let mut current = obj;

        for _ in 0..MAX_RESOLVE_DEPTH {
            match current {
                Object::Reference(r) => {
                    current = self.objects.get(&r.object_number).unwrap_or(&NULL)
                }
                other => return other,
            }
        }

        warn!("reference chain exceeded {} hops", MAX_RESOLVE_DEPTH);
        &NULL
    }

    pub fn catalog_number(&self) -> PdfResult<usize> {
        self.trailer
            .get_reference("Root")
            .map(|r| r.object_number)
            .ok_or_else(|| PdfError::parse("trailer has no Root reference"))
    }

    pub fn catalog(&self) -> PdfResult<&Dictionary> {
        let number = self.catalog_number()?;
        self.objects
            .get(&number)
            .and_then(Object::as_dict)
            .ok_or_else(|| PdfError::parse("document catalog is missing or not a dictionary"))
    }

    pub fn catalog_mut(&mut self) -> PdfResult<&mut Dictionary> {
        let number = self.catalog_number()?;
        self.objects
            .get_mut(&number)
            .and_then(Object::as_dict_mut)
            .ok_or_else(|| PdfError::parse("document catalog is missing or not a dictionary"))
    }

    pub fn info(&self) -> Option<&Dictionary> {
        let info = self.trailer.get("Info")?;
        self.resolve(info).as_dict()
    }

    /// The information dictionary, created (and wired into the trailer)
    /// when absent
    pub fn info_mut(&mut self) -> PdfResult<&mut Dictionary> {
        let number = match self.trailer.get_reference("Info") {
            Some(r) if self.objects.contains_key(&r.object_number) => r.object_number,
            _ => {
                let r = self.add_object(Object::Dictionary(Dictionary::new()));
                self.trailer.insert("Info", Object::Reference(r));
                r.object_number
            }
        };

        self.objects
            .get_mut(&number)
            .and_then(Object::as_dict_mut)
            .ok_or_else(|| PdfError::parse("information dictionary is not a dictionary"))
    }

    // --- resolution-aware dictionary access ---

    pub fn dict_get<'a>(&'a self, dict: &'a Dictionary, key: &str) -> Option<&'a Object> {
        let obj = self.resolve(dict.get(key)?);
        match obj {
            Object::Null => None,
            other => Some(other),
        }
    }

    pub fn dict_get_dict<'a>(&'a self, dict: &'a Dictionary, key: &str) -> Option<&'a Dictionary> {
        self.dict_get(dict, key).and_then(Object::as_dict)
    }

    pub fn dict_get_array<'a>(&'a self, dict: &'a Dictionary, key: &str) -> Option<&'a [Object]> {
        self.dict_get(dict, key).and_then(Object::as_array)
    }

    pub fn dict_get_stream<'a>(&'a self, dict: &'a Dictionary, key: &str) -> Option<&'a Stream> {
        self.dict_get(dict, key).and_then(Object::as_stream)
    }

    pub fn dict_get_name<'a>(&'a self, dict: &'a Dictionary, key: &str) -> Option<&'a str> {
        self.dict_get(dict, key).and_then(Object::as_name)
    }

    pub fn dict_get_string<'a>(&'a self, dict: &'a Dictionary, key: &str) -> Option<&'a str> {
        self.dict_get(dict, key).and_then(Object::as_string)
    }

    pub fn dict_get_integer(&self, dict: &Dictionary, key: &str) -> Option<i64> {
        self.dict_get(dict, key).and_then(Object::as_integer)
    }

    pub fn dict_get_number(&self, dict: &Dictionary, key: &str) -> Option<f32> {
        self.dict_get(dict, key).and_then(Object::as_number)
    }

    pub fn dict_get_bool(&self, dict: &Dictionary, key: &str) -> Option<bool> {
        self.dict_get(dict, key).and_then(Object::as_bool)
    }

    /// Decoded payload of a stream, applying its filter chain
    pub fn decoded_stream(&self, stream: &Stream) -> PdfResult<Vec<u8>> {
        filter::decode_stream(&stream.dict, &stream.data)
    }

    // --- mutation addressing ---

    /// Walks `path` from the indirect object `start`, jumping through
    /// references, and returns the address of the final value.
    ///
    /// The returned address points at the referenced object itself when the
    /// final value is a reference, so mutation lands on the shared object
    pub fn locate(&self, start: usize, path: &[&str]) -> PdfResult<Address> {
        self.locate_from(&Address::new(start), path)
    }

    /// As [`Self::locate`], but starting from an existing address
    pub fn locate_from(&self, start: &Address, path: &[&str]) -> PdfResult<Address> {
        let mut addr = start.clone();

        for &key in path {
            let obj = self.object_at(&addr)?;
            let dict = obj.as_dict().ok_or_else(|| {
                PdfError::parse(format!(
                    "expected dictionary while descending to {:?} in object {}",
                    key, addr.object_number
                ))
            })?;

            match dict.get(key) {
                Some(Object::Reference(r)) => addr = Address::new(r.object_number),
                Some(_) => addr.path.push(key.to_owned()),
                None => {
                    return Err(PdfError::not_found(
                        format!("key {:?}", key),
                        format!("object {} dictionary", addr.object_number),
                    ))
                }
            }
        }

        Ok(addr)
    }

    pub fn object_at(&self, addr: &Address) -> PdfResult<&Object> {
        let mut obj = self.objects.get(&addr.object_number).ok_or_else(|| {
            PdfError::not_found(
                format!("object {}", addr.object_number),
                "object table".to_owned(),
            )
        })?;

        for key in &addr.path {
            obj = obj
                .as_dict()
                .and_then(|dict| dict.get(key))
                .ok_or_else(|| PdfError::internal(format!("stale address path at {:?}", key)))?;
        }

        Ok(obj)
    }

    pub fn object_at_mut(&mut self, addr: &Address) -> PdfResult<&mut Object> {
        let mut obj = self
            .objects
            .get_mut(&addr.object_number)
            .ok_or_else(|| {
                PdfError::not_found(
                    format!("object {}", addr.object_number),
                    "object table".to_owned(),
                )
            })?;

        for key in &addr.path {
            obj = obj
                .as_dict_mut()
                .and_then(|dict| dict.get_mut(key))
                .ok_or_else(|| PdfError::internal(format!("stale address path at {:?}", key)))?;
        }

        Ok(obj)
    }

    pub fn dict_at_mut(&mut self, addr: &Address) -> PdfResult<&mut Dictionary> {
        let object_number = addr.object_number;
        self.object_at_mut(addr)?
            .as_dict_mut()
            .ok_or_else(|| {
                PdfError::parse(format!(
                    "object {} is not a dictionary",
                    object_number
                ))
            })
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_header_version(file: &[u8]) -> PdfResult<String> {
    let window = &file[..file.len().min(1024)];
    let start = window
        .windows(5)
        .position(|w| w == b"%PDF-")
        .ok_or_else(|| PdfError::parse("missing %PDF- header"))?;

    let version = file[start + 5..]
        .iter()
        .take_while(|&&b| b.is_ascii_digit() || b == b'.')
        .map(|&b| b as char)
        .collect::<String>();

    if version.is_empty() {
        return Err(PdfError::parse("malformed %PDF- header"));
    }

    Ok(version)
}

fn lex_object_at(file: &[u8], xref: &Xref, offset: usize) -> PdfResult<Object> {
    if offset >= file.len() {
        return Err(PdfError::parse_at("object offset beyond end of file", offset));
    }

    let mut lexer = Lexer::at(file, offset);
    lexer.read_obj_prelude()?;

    let obj = lexer.lex_object()?;
    lexer.skip_whitespace();

    if let Object::Dictionary(dict) = obj {
        if lexer.next_matches(b"stream") {
            let len = stream_length(file, xref, &dict);
            let data = lexer.lex_stream_payload(len)?;
            return Ok(Object::Stream(Stream::new(dict, data)));
        }
        return Ok(Object::Dictionary(dict));
    }

    Ok(obj)
}

/// `Length` may itself be indirect; chase it through the xref without
/// needing the arena
fn stream_length(file: &[u8], xref: &Xref, dict: &Dictionary) -> Option<usize> {
    match dict.get("Length") {
        Some(Object::Integer(n)) if *n >= 0 => Some(*n as usize),
        Some(Object::Reference(r)) => match xref.entries.get(&r.object_number)? {
            XrefEntry::InUse { byte_offset } => {
                let mut lexer = Lexer::at(file, *byte_offset);
                lexer.read_obj_prelude().ok()?;
                lexer.lex_object().ok()?.as_integer().map(|n| n as usize)
            }
            _ => None,
        },
        _ => None,
    }
}

fn lex_object_in_stream(
    objects: &BTreeMap<usize, Object>,
    stream_number: usize,
    index: usize,
) -> PdfResult<Object> {
    let stream = objects
        .get(&stream_number)
        .and_then(Object::as_stream)
        .ok_or_else(|| {
            PdfError::parse(format!("object stream {} is missing", stream_number))
        })?;

    let data = filter::decode_stream(&stream.dict, &stream.data)?;
    let count = stream.dict.expect_integer("N")? as usize;
    let first = stream.dict.expect_integer("First")? as usize;

    let mut lexer = Lexer::new(&data);
    let mut offsets = Vec::with_capacity(count);
    for _ in 0..count {
        lexer.skip_whitespace();
        lexer.lex_whole_number();
        lexer.skip_whitespace();
        let offset = lexer
            .lex_whole_number()
            .parse::<usize>()
            .map_err(|_| PdfError::parse("malformed object stream header"))?;
        offsets.push(offset);
    }

    let offset = *offsets.get(index).ok_or_else(|| {
        PdfError::not_found(
            format!("index {}", index),
            format!("object stream {} ({} objects)", stream_number, count),
        )
    })?;

    let mut lexer = Lexer::at(&data, first + offset);
    lexer.lex_object()
}
