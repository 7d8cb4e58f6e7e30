use indexmap::IndexMap;

use crate::error::{PdfError, PdfResult};

#[derive(Debug)]
pub enum ObjectType {
    Null,
    Boolean,
    Integer,
    Real,
    String,
    Name,
    Array,
    Stream,
    Dictionary,
    Reference,
}

/// A PDF value.
///
/// Strings are held as `String`s whose chars are the source byte values
/// (UTF-16BE text strings are decoded on read); names are held with `#xx`
/// escapes already resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f32),
    String(String),
    Name(String),
    Array(Vec<Self>),
    Dictionary(Dictionary),
    Stream(Stream),
    Reference(Reference),
}

impl Object {
    pub fn name(name: impl Into<String>) -> Self {
        Object::Name(name.into())
    }

    pub fn string(s: impl Into<String>) -> Self {
        Object::String(s.into())
    }

    pub fn ty(&self) -> ObjectType {
        match self {
            Object::Null => ObjectType::Null,
            Object::Boolean(..) => ObjectType::Boolean,
            Object::Integer(..) => ObjectType::Integer,
            Object::Real(..) => ObjectType::Real,
            Object::String(..) => ObjectType::String,
            Object::Name(..) => ObjectType::Name,
            Object::Array(..) => ObjectType::Array,
            Object::Dictionary(..) => ObjectType::Dictionary,
            Object::Stream(..) => ObjectType::Stream,
            Object::Reference(..) => ObjectType::Reference,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f32> {
        match self {
            Object::Integer(n) => Some(*n as f32),
            Object::Real(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Object]> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Object>> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(dict) => Some(dict),
            Object::Stream(stream) => Some(&stream.dict),
            _ => None,
        }
    }

    pub fn as_dict_mut(&mut self) -> Option<&mut Dictionary> {
        match self {
            Object::Dictionary(dict) => Some(dict),
            Object::Stream(stream) => Some(&mut stream.dict),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Object::Stream(stream) => Some(stream),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<Reference> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }

    pub fn expect_reference(self) -> PdfResult<Reference> {
        match self {
            Object::Reference(r) => Ok(r),
            obj => Err(PdfError::parse(format!(
                "expected reference, found {:?}",
                obj.ty()
            ))),
        }
    }

    /// A printable rendition used when converting attribute values
    pub fn printable(&self) -> String {
        match self {
            Object::Null => "null".to_owned(),
            Object::Boolean(b) => b.to_string(),
            Object::Integer(n) => n.to_string(),
            Object::Real(n) => n.to_string(),
            Object::String(s) | Object::Name(s) => s.clone(),
            Object::Array(..) => "[array]".to_owned(),
            Object::Dictionary(..) => "[dictionary]".to_owned(),
            Object::Stream(..) => "[stream]".to_owned(),
            Object::Reference(r) => format!("{} {} R", r.object_number, r.generation),
        }
    }
}

/// A reference to an indirect object. A reference to a non-existing object
/// is treated as `null`
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub struct Reference {
    pub object_number: usize,
    pub generation: usize,
}

impl Reference {
    pub fn new(object_number: usize) -> Self {
        Self {
            object_number,
            generation: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    pub dict: Dictionary,
    /// Raw payload bytes, encoded per the dictionary's `Filter` entry.
    /// Streams rebuilt by handlers carry plain bytes and no filter.
    pub data: Vec<u8>,
}

impl Stream {
    pub fn new(dict: Dictionary, data: Vec<u8>) -> Self {
        Self { dict, data }
    }
}

/// A dictionary preserving key insertion order on write.
///
/// Key lookup is by name equality; values are direct objects or references.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dictionary {
    dict: IndexMap<String, Object>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self {
            dict: IndexMap::new(),
        }
    }

    pub fn from_entries(entries: Vec<(&str, Object)>) -> Self {
        let mut dict = Self::new();
        for (key, value) in entries {
            dict.insert(key, value);
        }
        dict
    }

    pub fn get(&self, key: &str) -> Option<&Object> {
        self.dict.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Object> {
        self.dict.get_mut(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Object) -> Option<Object> {
        self.dict.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Object> {
        self.dict.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.dict.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.dict.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dict.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Object)> {
        self.dict.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.dict.keys()
    }

    /// Direct (non-resolving) typed access. Resolution-aware access lives
    /// on [`crate::document::Document`]
    pub fn get_name(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Object::as_name)
    }

    pub fn get_integer(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Object::as_integer)
    }

    pub fn get_number(&self, key: &str) -> Option<f32> {
        self.get(key).and_then(Object::as_number)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Object::as_bool)
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Object::as_string)
    }

    pub fn get_reference(&self, key: &str) -> Option<Reference> {
        self.get(key).and_then(Object::as_reference)
    }

    pub fn expect_name(&self, key: &'static str) -> PdfResult<&str> {
        self.get_name(key)
            .ok_or_else(|| PdfError::parse(format!("missing required name key {:?}", key)))
    }

    pub fn expect_integer(&self, key: &'static str) -> PdfResult<i64> {
        self.get_integer(key)
            .ok_or_else(|| PdfError::parse(format!("missing required integer key {:?}", key)))
    }

    /// Appends `value` to the array at `key`, promoting an existing single
    /// entry to a one-element array first. Used for `/K` and `/Annots`
    /// style entries
    pub fn push_to_array(&mut self, key: &str, value: Object) {
        match self.dict.get_mut(key) {
            Some(Object::Array(arr)) => arr.push(value),
            Some(existing) => {
                let prev = std::mem::replace(existing, Object::Null);
                *existing = Object::Array(vec![prev, value]);
            }
            None => {
                self.dict.insert(key.to_owned(), Object::Array(vec![value]));
            }
        }
    }
}
