use std::collections::HashMap;

use log::warn;

use crate::{
    error::{PdfError, PdfResult},
    filter,
    lex::{LexBase, Lexer},
    objects::{Dictionary, Object},
};

const START_XREF_SIGNATURE: &[u8] = b"startxref";
const KILOBYTE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum XrefEntry {
    Free,
    InUse {
        byte_offset: usize,
    },
    /// The object lives inside an object stream
    InStream {
        stream_number: usize,
        index: usize,
    },
}

/// The merged cross-reference information of a file: the newest entry for
/// every object number, plus the newest trailer dictionary
#[derive(Debug)]
pub struct Xref {
    pub entries: HashMap<usize, XrefEntry>,
    pub trailer: Dictionary,
}

impl Xref {
    /// We read backwards in 1024-byte chunks looking for `startxref`, then
    /// follow the `/Prev` (and hybrid `/XRefStm`) chain, newest first
    pub fn parse(file: &[u8]) -> PdfResult<Self> {
        let start = find_startxref(file)?;

        let mut lexer = Lexer::at(file, start + START_XREF_SIGNATURE.len());
        lexer.skip_whitespace();
        let first_offset = lexer
            .lex_whole_number()
            .parse::<usize>()
            .map_err(|_| PdfError::parse_at("malformed startxref offset", start))?;

        let mut entries: HashMap<usize, XrefEntry> = HashMap::new();
        let mut trailer: Option<Dictionary> = None;

        let mut queue = vec![first_offset];
        let mut seen_offsets = Vec::new();

        while let Some(offset) = queue.pop() {
            // offsets may cycle in corrupt files
            if seen_offsets.contains(&offset) || offset >= file.len() {
                continue;
            }
            seen_offsets.push(offset);

            let section = parse_section(file, offset)?;

            for (number, entry) in section.entries {
                // the newest section wins
                entries.entry(number).or_insert(entry);
            }

            if let Some(prev) = section.dict.get_integer("Prev") {
                queue.push(prev as usize);
            }
            if let Some(hybrid) = section.dict.get_integer("XRefStm") {
                queue.push(hybrid as usize);
            }

            if trailer.is_none() {
                trailer = Some(section.dict);
            }
        }

        Ok(Self {
            entries,
            trailer: trailer.unwrap_or_default(),
        })
    }
}

struct Section {
    entries: Vec<(usize, XrefEntry)>,
    dict: Dictionary,
}

fn find_startxref(file: &[u8]) -> PdfResult<usize> {
    let mut pos = file.len().saturating_sub(1);

    loop {
        if pos == 0 {
            return Err(PdfError::parse("startxref not found"));
        }

        let next_pos = pos.saturating_sub(KILOBYTE - START_XREF_SIGNATURE.len());
        if let Some(found) = file[next_pos..=pos]
            .windows(START_XREF_SIGNATURE.len())
            .rposition(|window| window == START_XREF_SIGNATURE)
        {
            return Ok(next_pos + found);
        }

        pos = next_pos;
    }
}

fn parse_section(file: &[u8], offset: usize) -> PdfResult<Section> {
    let mut lexer = Lexer::at(file, offset);
    lexer.skip_whitespace();

    if lexer.next_matches(b"xref") {
        parse_table(&mut lexer)
    } else {
        parse_stream_section(&mut lexer)
    }
}

fn parse_table(lexer: &mut Lexer) -> PdfResult<Section> {
    lexer.expect_bytes(b"xref")?;
    lexer.skip_whitespace();

    let mut entries = Vec::new();

    loop {
        if lexer.next_matches(b"trailer") {
            break;
        }

        let first = lexer
            .lex_whole_number()
            .parse::<usize>()
            .map_err(|_| PdfError::parse_at("malformed xref subsection header", lexer.pos))?;
        lexer.skip_whitespace();
        let count = lexer
            .lex_whole_number()
            .parse::<usize>()
            .map_err(|_| PdfError::parse_at("malformed xref subsection header", lexer.pos))?;
        lexer.skip_whitespace();

        for i in 0..count {
            let byte_offset = lexer
                .lex_whole_number()
                .parse::<usize>()
                .map_err(|_| PdfError::parse_at("malformed xref entry", lexer.pos))?;
            lexer.skip_whitespace();
            lexer.lex_whole_number();
            lexer.skip_whitespace();

            let kind = lexer.next_byte_err()?;
            lexer.skip_whitespace();

            entries.push((
                first + i,
                match kind {
                    b'f' => XrefEntry::Free,
                    b'n' => XrefEntry::InUse { byte_offset },
                    found => {
                        return Err(PdfError::parse(format!(
                            "invalid xref entry kind {:?}",
                            found as char
                        )))
                    }
                },
            ));
        }
    }

    lexer.expect_bytes(b"trailer")?;
    lexer.skip_whitespace();
    let dict = lexer.lex_dict()?;

    Ok(Section { entries, dict })
}

fn parse_stream_section(lexer: &mut Lexer) -> PdfResult<Section> {
    lexer.read_obj_prelude()?;
    let dict = lexer.lex_dict()?;
    lexer.skip_whitespace();

    let len = dict.get_integer("Length").map(|n| n as usize);
    let data = lexer.lex_stream_payload(len)?;
    let decoded = filter::decode_stream(&dict, &data)?;

    let widths = dict
        .get("W")
        .and_then(Object::as_array)
        .ok_or_else(|| PdfError::parse("xref stream missing W array"))?
        .iter()
        .map(|obj| obj.as_integer().unwrap_or(0) as usize)
        .collect::<Vec<usize>>();

    if widths.len() != 3 {
        return Err(PdfError::parse("xref stream W array must have 3 entries"));
    }

    let size = dict.expect_integer("Size")? as usize;
    let index = match dict.get("Index").and_then(Object::as_array) {
        Some(arr) => arr
            .iter()
            .map(|obj| obj.as_integer().unwrap_or(0) as usize)
            .collect(),
        None => vec![0, size],
    };

    let row_len: usize = widths.iter().sum();
    let mut entries = Vec::new();
    let mut rows = decoded.chunks_exact(row_len);

    for pair in index.chunks_exact(2) {
        let (first, count) = (pair[0], pair[1]);

        for number in first..first + count {
            let row = match rows.next() {
                Some(row) => row,
                None => {
                    warn!("xref stream ended before index ranges were satisfied");
                    break;
                }
            };

            let mut fields = [1u64, 0, 0];
            let mut cursor = 0;
            for (i, &width) in widths.iter().enumerate() {
                if width == 0 {
                    // a zero-width first field defaults to type 1
                    continue;
                }
                let mut value = 0u64;
                for &b in &row[cursor..cursor + width] {
                    value = (value << 8) | u64::from(b);
                }
                fields[i] = value;
                cursor += width;
            }

            let entry = match fields[0] {
                0 => XrefEntry::Free,
                1 => XrefEntry::InUse {
                    byte_offset: fields[1] as usize,
                },
                2 => XrefEntry::InStream {
                    stream_number: fields[1] as usize,
                    index: fields[2] as usize,
                },
                other => {
                    warn!("unknown xref stream entry type {}", other);
                    XrefEntry::Free
                }
            };

            entries.push((number, entry));
        }
    }

    Ok(Section { entries, dict })
}
