//! Shallow analysis of embedded font programs: TrueType `cmap` subtable
//! headers and glyph counts, Type1 charstring names behind the eexec
//! encryption, CFF charstring counts. Parsing stops at the first
//! inconsistency and reports whatever was recovered.

use log::warn;

use crate::inspect::report::CmapSubtableReport;

#[derive(Debug, Default)]
pub struct ProgramAnalysis {
    pub cmap_subtables: Vec<CmapSubtableReport>,
    pub glyph_names: Vec<String>,
    pub has_notdef: Option<bool>,
}

// --- TrueType ---

pub fn analyze_true_type(data: &[u8]) -> ProgramAnalysis {
    let mut analysis = ProgramAnalysis::default();

    let num_tables = match read_u16(data, 4) {
        Some(n) => n as usize,
        None => return analysis,
    };

    let mut cmap_offset = None;
    let mut maxp_offset = None;

    for i in 0..num_tables {
        let entry = 12 + i * 16;
        let tag = match data.get(entry..entry + 4) {
            Some(tag) => tag,
            None => break,
        };
        let offset = match read_u32(data, entry + 8) {
            Some(offset) => offset as usize,
            None => break,
        };

        match tag {
            b"cmap" => cmap_offset = Some(offset),
            b"maxp" => maxp_offset = Some(offset),
            _ => {}
        }
    }

    if let Some(offset) = cmap_offset {
        analysis.cmap_subtables = read_cmap_subtables(data, offset);
    }

    if let Some(offset) = maxp_offset {
        if let Some(num_glyphs) = read_u16(data, offset + 4) {
            analysis.has_notdef = Some(num_glyphs > 0);
        }
    }

    analysis
}

fn read_cmap_subtables(data: &[u8], cmap_start: usize) -> Vec<CmapSubtableReport> {
    let mut subtables = Vec::new();

    let count = match read_u16(data, cmap_start + 2) {
        Some(count) => count as usize,
        None => return subtables,
    };

    for i in 0..count {
        let record = cmap_start + 4 + i * 8;
        let platform_id = match read_u16(data, record) {
            Some(id) => id,
            None => break,
        };
        let encoding_id = match read_u16(data, record + 2) {
            Some(id) => id,
            None => break,
        };
        let format = read_u32(data, record + 4)
            .and_then(|offset| read_u16(data, cmap_start + offset as usize));

        subtables.push(CmapSubtableReport {
            platform_id,
            encoding_id,
            format,
        });
    }

    subtables
}

// --- Type1 ---

const EEXEC_R: u16 = 55665;
const CHARSTRING_SKIP: usize = 4;

pub fn analyze_type1(data: &[u8]) -> ProgramAnalysis {
    let mut analysis = ProgramAnalysis::default();

    let eexec = match find(data, b"eexec") {
        Some(pos) => pos + b"eexec".len(),
        None => return analysis,
    };

    let encrypted = hex_or_binary(&data[eexec..]);
    let decrypted = eexec_decrypt(&encrypted);

    analysis.glyph_names = charstring_names(&decrypted);
    if !analysis.glyph_names.is_empty() {
        analysis.has_notdef = Some(analysis.glyph_names.iter().any(|name| name == ".notdef"));
    }

    analysis
}

/// The eexec section may be stored as ASCII hex; decide by the first four
/// non-whitespace bytes
fn hex_or_binary(data: &[u8]) -> Vec<u8> {
    let meaningful: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !crate::lex::is_whitespace(*b))
        .take(4)
        .collect();

    if meaningful.len() == 4 && meaningful.iter().all(u8::is_ascii_hexdigit) {
        let digits: Vec<u8> = data
            .iter()
            .copied()
            .filter(u8::is_ascii_hexdigit)
            .map(|b| match b {
                b'0'..=b'9' => b - b'0',
                b'a'..=b'f' => b - b'a' + 10,
                _ => b - b'A' + 10,
            })
            .collect();
        digits.chunks_exact(2).map(|p| p[0] * 16 + p[1]).collect()
    } else {
        let start = data
            .iter()
            .position(|b| !crate::lex::is_whitespace(*b))
            .unwrap_or(0);
        data[start..].to_vec()
    }
}

fn eexec_decrypt(data: &[u8]) -> Vec<u8> {
    let mut r = EEXEC_R;
    let mut out = Vec::with_capacity(data.len().saturating_sub(CHARSTRING_SKIP));

    for (i, &c) in data.iter().enumerate() {
        let p = c ^ (r >> 8) as u8;
        r = (u16::from(c).wrapping_add(r))
            .wrapping_mul(52845)
            .wrapping_add(22719);
        if i >= CHARSTRING_SKIP {
            out.push(p);
        }
    }

    out
}

/// `/name len RD <len bytes> ND` entries following `/CharStrings`
fn charstring_names(data: &[u8]) -> Vec<String> {
    let mut names = Vec::new();

    let mut pos = match find(data, b"/CharStrings") {
        Some(pos) => pos + b"/CharStrings".len(),
        None => return names,
    };

    while pos < data.len() {
        match data[pos] {
            b'/' => {
                pos += 1;
                let start = pos;
                while pos < data.len() && crate::lex::is_regular(data[pos]) {
                    pos += 1;
                }
                let name: String = data[start..pos].iter().map(|&b| b as char).collect();

                // `len RD` (or `-|`) then the binary charstring
                let mut len = 0usize;
                while pos < data.len() && crate::lex::is_whitespace(data[pos]) {
                    pos += 1;
                }
                while pos < data.len() && data[pos].is_ascii_digit() {
                    len = len * 10 + usize::from(data[pos] - b'0');
                    pos += 1;
                }
                while pos < data.len() && crate::lex::is_whitespace(data[pos]) {
                    pos += 1;
                }
                while pos < data.len()
                    && !crate::lex::is_whitespace(data[pos])
                {
                    pos += 1;
                }
                // one separator byte, then the encrypted charstring
                pos = (pos + 1 + len).min(data.len());

                names.push(name);
            }
            _ => {
                // `end` closes the charstring dictionary
                if data[pos..].starts_with(b"end") {
                    break;
                }
                pos += 1;
            }
        }
    }

    names
}

// --- CFF ---

pub fn analyze_cff(data: &[u8]) -> ProgramAnalysis {
    let mut analysis = ProgramAnalysis::default();

    let header_size = match data.get(2) {
        Some(&size) => size as usize,
        None => return analysis,
    };

    // Name INDEX, then Top DICT INDEX
    let (_, top_dict_index_pos) = match read_index(data, header_size) {
        Some(index) => index,
        None => return analysis,
    };
    let (top_dicts, _) = match read_index(data, top_dict_index_pos) {
        Some(index) => index,
        None => return analysis,
    };

    let top_dict = match top_dicts.first() {
        Some(dict) => dict,
        None => return analysis,
    };

    if let Some(charstrings_offset) = top_dict_operand(top_dict, 17) {
        if let Some((charstrings, _)) = read_index(data, charstrings_offset as usize) {
            analysis.has_notdef = Some(!charstrings.is_empty());
        }
    } else {
        warn!("CFF top dict carries no CharStrings entry");
    }

    analysis
}

/// Reads a CFF INDEX at `pos`, returning its entries and the position just
/// past it
fn read_index(data: &[u8], pos: usize) -> Option<(Vec<Vec<u8>>, usize)> {
    let count = read_u16(data, pos)? as usize;
    if count == 0 {
        return Some((Vec::new(), pos + 2));
    }

    let off_size = *data.get(pos + 2)? as usize;
    if off_size == 0 || off_size > 4 {
        return None;
    }

    let offsets_start = pos + 3;
    let mut offsets = Vec::with_capacity(count + 1);
    for i in 0..=count {
        let mut value = 0usize;
        for j in 0..off_size {
            value = (value << 8) | *data.get(offsets_start + i * off_size + j)? as usize;
        }
        offsets.push(value);
    }

    let data_start = offsets_start + (count + 1) * off_size - 1;
    let mut entries = Vec::with_capacity(count);
    for window in offsets.windows(2) {
        entries.push(data.get(data_start + window[0]..data_start + window[1])?.to_vec());
    }

    Some((entries, data_start + offsets[count]))
}

/// The last integer operand preceding operator `op` in a CFF DICT
fn top_dict_operand(dict: &[u8], op: u8) -> Option<i64> {
    let mut operands: Vec<i64> = Vec::new();
    let mut i = 0;

    while i < dict.len() {
        let b = dict[i];
        match b {
            // operators
            0..=21 => {
                if b == 12 {
                    i += 2;
                } else {
                    if b == op {
                        return operands.last().copied();
                    }
                    i += 1;
                }
                operands.clear();
            }
            28 => {
                operands.push(i64::from(i16::from_be_bytes([
                    *dict.get(i + 1)?,
                    *dict.get(i + 2)?,
                ])));
                i += 3;
            }
            29 => {
                operands.push(i64::from(i32::from_be_bytes([
                    *dict.get(i + 1)?,
                    *dict.get(i + 2)?,
                    *dict.get(i + 3)?,
                    *dict.get(i + 4)?,
                ])));
                i += 5;
            }
            // real number: nibble-encoded, terminated by 0xF
            30 => {
                i += 1;
                while i < dict.len() {
                    let nibbles = dict[i];
                    i += 1;
                    if nibbles & 0x0F == 0x0F || nibbles >> 4 == 0x0F {
                        break;
                    }
                }
                operands.push(0);
            }
            32..=246 => {
                operands.push(i64::from(b) - 139);
                i += 1;
            }
            247..=250 => {
                let b1 = *dict.get(i + 1)?;
                operands.push((i64::from(b) - 247) * 256 + i64::from(b1) + 108);
                i += 2;
            }
            251..=254 => {
                let b1 = *dict.get(i + 1)?;
                operands.push(-(i64::from(b) - 251) * 256 - i64::from(b1) - 108);
                i += 2;
            }
            _ => i += 1,
        }
    }

    None
}

fn find(data: &[u8], needle: &[u8]) -> Option<usize> {
    data.windows(needle.len()).position(|w| w == needle)
}

fn read_u16(data: &[u8], pos: usize) -> Option<u16> {
    Some(u16::from_be_bytes([*data.get(pos)?, *data.get(pos + 1)?]))
}

fn read_u32(data: &[u8], pos: usize) -> Option<u32> {
    Some(u32::from_be_bytes([
        *data.get(pos)?,
        *data.get(pos + 1)?,
        *data.get(pos + 2)?,
        *data.get(pos + 3)?,
    ]))
}

#[cfg(test)]
mod test {
    use super::*;

    /// A minimal sfnt: directory with `cmap` (one 3,1 format 4 subtable)
    /// and `maxp` (2 glyphs)
    fn tiny_true_type() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&0x00010000u32.to_be_bytes());
        data.extend_from_slice(&2u16.to_be_bytes()); // numTables
        data.extend_from_slice(&[0; 6]); // searchRange etc.

        let cmap_offset = 12 + 2 * 16;
        let maxp_offset = cmap_offset + 16;

        data.extend_from_slice(b"cmap");
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&(cmap_offset as u32).to_be_bytes());
        data.extend_from_slice(&16u32.to_be_bytes());

        data.extend_from_slice(b"maxp");
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&(maxp_offset as u32).to_be_bytes());
        data.extend_from_slice(&6u32.to_be_bytes());

        // cmap: version 0, 1 subtable, (3, 1) at offset 12, format 4
        data.extend_from_slice(&0u16.to_be_bytes());
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(&3u16.to_be_bytes());
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(&12u32.to_be_bytes());
        data.extend_from_slice(&4u16.to_be_bytes());
        data.extend_from_slice(&0u16.to_be_bytes());

        // maxp: version, numGlyphs = 2
        data.extend_from_slice(&0x00005000u32.to_be_bytes());
        data.extend_from_slice(&2u16.to_be_bytes());

        data
    }

    #[test]
    fn true_type_cmap_subtables_and_glyph_count() {
        let analysis = analyze_true_type(&tiny_true_type());

        assert_eq!(analysis.cmap_subtables.len(), 1);
        assert_eq!(analysis.cmap_subtables[0].platform_id, 3);
        assert_eq!(analysis.cmap_subtables[0].encoding_id, 1);
        assert_eq!(analysis.cmap_subtables[0].format, Some(4));
        assert_eq!(analysis.has_notdef, Some(true));
    }

    #[test]
    fn truncated_program_degrades_to_empty() {
        let analysis = analyze_true_type(b"\x00\x01");
        assert!(analysis.cmap_subtables.is_empty());
        assert_eq!(analysis.has_notdef, None);
    }

    fn eexec_encrypt(plain: &[u8]) -> Vec<u8> {
        let mut r = EEXEC_R;
        let mut out = Vec::new();
        // four salt bytes the decryptor discards
        for &p in [0u8, 0, 0, 0].iter().chain(plain) {
            let c = p ^ (r >> 8) as u8;
            r = (u16::from(c).wrapping_add(r))
                .wrapping_mul(52845)
                .wrapping_add(22719);
            out.push(c);
        }
        out
    }

    #[test]
    fn type1_charstring_names_survive_the_round_trip() {
        let private = b"dup /CharStrings 3 dict dup begin\n/.notdef 4 RD \x01\x02\x03\x04 ND\n/A 2 RD \x05\x06 ND\n/B 2 RD \x07\x08 ND\nend";
        let mut program = b"%!PS-AdobeFont-1.0: Test\n/FontName /Test def\ncurrentfile eexec\n".to_vec();
        program.extend_from_slice(&eexec_encrypt(private));

        let analysis = analyze_type1(&program);
        assert_eq!(analysis.glyph_names, vec![".notdef", "A", "B"]);
        assert_eq!(analysis.has_notdef, Some(true));
    }

    #[test]
    fn type1_without_eexec_yields_nothing() {
        let analysis = analyze_type1(b"%!PS-AdobeFont but no charstrings");
        assert!(analysis.glyph_names.is_empty());
        assert_eq!(analysis.has_notdef, None);
    }

    /// Header + empty name INDEX + a top dict INDEX whose single dict
    /// points CharStrings (op 17) at an INDEX with one entry
    fn tiny_cff() -> Vec<u8> {
        let mut data = vec![1, 0, 4, 1]; // header, hdrSize 4

        // Name INDEX: one entry "T"
        data.extend_from_slice(&1u16.to_be_bytes());
        data.push(1); // offSize
        data.push(1); // offset[0]
        data.push(2); // offset[1]
        data.push(b'T');

        // Top DICT INDEX: one dict of `29 <i32 offset> 17`, patched below
        let dict_len = 6u8;
        data.extend_from_slice(&1u16.to_be_bytes());
        data.push(1);
        data.push(1);
        data.push(1 + dict_len);
        let dict_data_pos = data.len();
        data.extend_from_slice(&[29, 0, 0, 0, 0, 17]);

        // CharStrings INDEX: one one-byte entry
        let charstrings_offset = data.len() as u32;
        data.extend_from_slice(&1u16.to_be_bytes());
        data.push(1);
        data.push(1);
        data.push(2);
        data.push(0x0E); // endchar

        // patch the offset operand
        let mut dict = vec![29];
        dict.extend_from_slice(&(charstrings_offset as i32).to_be_bytes());
        dict.push(17);
        data[dict_data_pos..dict_data_pos + dict.len()].copy_from_slice(&dict);

        data
    }

    #[test]
    fn cff_counts_charstrings() {
        let analysis = analyze_cff(&tiny_cff());
        assert_eq!(analysis.has_notdef, Some(true));
    }
}
