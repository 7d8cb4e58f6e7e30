use std::collections::BTreeMap;

use crate::{
    document::Document,
    error::PdfResult,
    objects::{Dictionary, Object, Stream},
};

/// Serializes the arena as a complete file: header, body, a single xref
/// section covering `0..=max`, trailer, `startxref`.
///
/// The document is always rewritten in full; incremental updates are not
/// produced
pub fn write_document(doc: &Document) -> PdfResult<Vec<u8>> {
    let mut out = Vec::new();

    out.extend_from_slice(format!("%PDF-{}\n", doc.version).as_bytes());
    // binary marker comment so transports treat the file as binary
    out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

    let mut offsets: BTreeMap<usize, usize> = BTreeMap::new();

    for number in doc.object_numbers() {
        let obj = doc.get_object(number).unwrap();
        offsets.insert(number, out.len());

        out.extend_from_slice(format!("{} 0 obj\n", number).as_bytes());
        write_object(&mut out, obj);
        out.extend_from_slice(b"\nendobj\n");
    }

    let max_number = offsets.keys().next_back().copied().unwrap_or(0);
    let size = max_number + 1;

    let xref_offset = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", size).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for number in 1..size {
        match offsets.get(&number) {
            Some(offset) => {
                out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes())
            }
            None => out.extend_from_slice(b"0000000000 00000 f \n"),
        }
    }

    let mut trailer = Dictionary::new();
    trailer.insert("Size", Object::Integer(size as i64));
    for (key, value) in doc.trailer.iter() {
        // Prev/XRefStm describe the incremental chain of the source file,
        // which a full rewrite discards
        if matches!(key.as_str(), "Size" | "Prev" | "XRefStm" | "Type" | "W" | "Index" | "Length" | "Filter" | "DecodeParms") {
            continue;
        }
        trailer.insert(key.clone(), value.clone());
    }

    out.extend_from_slice(b"trailer\n");
    write_dict(&mut out, &trailer);
    out.extend_from_slice(format!("\nstartxref\n{}\n%%EOF", xref_offset).as_bytes());

    Ok(out)
}

pub fn write_object(out: &mut Vec<u8>, obj: &Object) {
    match obj {
        Object::Null => out.extend_from_slice(b"null"),
        Object::Boolean(true) => out.extend_from_slice(b"true"),
        Object::Boolean(false) => out.extend_from_slice(b"false"),
        Object::Integer(n) => out.extend_from_slice(n.to_string().as_bytes()),
        Object::Real(n) => write_real(out, *n),
        Object::String(s) => write_string(out, s),
        Object::Name(name) => write_name(out, name),
        Object::Array(arr) => {
            out.push(b'[');
            for (i, item) in arr.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                write_object(out, item);
            }
            out.push(b']');
        }
        Object::Dictionary(dict) => write_dict(out, dict),
        Object::Stream(stream) => write_stream(out, stream),
        Object::Reference(r) => {
            out.extend_from_slice(format!("{} {} R", r.object_number, r.generation).as_bytes())
        }
    }
}

fn write_real(out: &mut Vec<u8>, n: f32) {
    if n.is_finite() {
        out.extend_from_slice(n.to_string().as_bytes());
    } else {
        out.push(b'0');
    }
}

fn write_dict(out: &mut Vec<u8>, dict: &Dictionary) {
    out.extend_from_slice(b"<<");
    for (key, value) in dict.iter() {
        out.push(b' ');
        write_name(out, key);
        out.push(b' ');
        write_object(out, value);
    }
    out.extend_from_slice(b" >>");
}

fn write_stream(out: &mut Vec<u8>, stream: &Stream) {
    let mut dict = stream.dict.clone();
    dict.insert("Length", Object::Integer(stream.data.len() as i64));

    write_dict(out, &dict);
    out.extend_from_slice(b"\nstream\n");
    out.extend_from_slice(&stream.data);
    out.extend_from_slice(b"\nendstream");
}

/// Strings whose chars all fit a byte go out literal-escaped; anything
/// wider becomes UTF-16BE hex with a byte-order mark
fn write_string(out: &mut Vec<u8>, s: &str) {
    if s.chars().all(|c| (c as u32) < 256) {
        out.push(b'(');
        for c in s.chars() {
            match c {
                '(' => out.extend_from_slice(b"\\("),
                ')' => out.extend_from_slice(b"\\)"),
                '\\' => out.extend_from_slice(b"\\\\"),
                '\n' => out.extend_from_slice(b"\\n"),
                '\r' => out.extend_from_slice(b"\\r"),
                c => out.push(c as u8),
            }
        }
        out.push(b')');
    } else {
        out.push(b'<');
        out.extend_from_slice(b"FEFF");
        for unit in s.encode_utf16() {
            out.extend_from_slice(format!("{:04X}", unit).as_bytes());
        }
        out.push(b'>');
    }
}

fn write_name(out: &mut Vec<u8>, name: &str) {
    out.push(b'/');
    for c in name.chars() {
        let b = c as u32;
        if b >= 0x21 && b < 0x7F && crate::lex::is_regular(b as u8) && c != '#' {
            out.push(b as u8);
        } else {
            out.extend_from_slice(format!("#{:02X}", b & 0xFF).as_bytes());
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::document::Document;

    fn serialized(obj: &Object) -> String {
        let mut out = Vec::new();
        write_object(&mut out, obj);
        out.iter().map(|&b| b as char).collect()
    }

    #[test]
    fn scalars() {
        assert_eq!(serialized(&Object::Integer(-7)), "-7");
        assert_eq!(serialized(&Object::Real(612.0)), "612");
        assert_eq!(serialized(&Object::Real(0.5)), "0.5");
        assert_eq!(serialized(&Object::name("Page")), "/Page");
        assert_eq!(serialized(&Object::Null), "null");
    }

    #[test]
    fn string_escaping() {
        assert_eq!(serialized(&Object::string("a(b)c\\")), "(a\\(b\\)c\\\\)");
    }

    #[test]
    fn wide_string_goes_utf16() {
        assert_eq!(serialized(&Object::string("\u{2019}")), "<FEFF2019>");
    }

    #[test]
    fn name_escaping() {
        assert_eq!(serialized(&Object::name("A B#")), "/A#20B#23");
    }

    #[test]
    fn written_document_reloads() {
        let mut doc = Document::new();
        doc.info_mut()
            .unwrap()
            .insert("Title", Object::string("round trip"));

        let bytes = doc.save().unwrap();
        assert!(bytes.starts_with(b"%PDF-1.7"));
        assert!(bytes.ends_with(b"%%EOF"));

        let reloaded = Document::load(&bytes).unwrap();
        assert_eq!(
            reloaded.info().unwrap().get_string("Title"),
            Some("round trip")
        );
        assert_eq!(
            reloaded.catalog().unwrap().get_name("Type"),
            Some("Catalog")
        );
    }
}
