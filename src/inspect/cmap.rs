//! Parsing the `bfchar`/`bfrange` sections of ToUnicode CMaps back into
//! code-to-text mappings. Anything unparseable degrades to the mappings
//! recovered so far; a broken CMap never fails an inspection.

use std::collections::BTreeMap;

use log::warn;

#[derive(Debug, PartialEq)]
enum Token {
    Hex(String),
    ArrayStart,
    ArrayEnd,
    Word(String),
}

/// Source hex (canonicalized to upper case, original width) to destination
/// text (decoded as concatenated UTF-16 code units)
pub fn parse_tounicode(data: &[u8]) -> BTreeMap<String, String> {
    let tokens = tokenize(data);
    let mut map = BTreeMap::new();

    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            Token::Word(word) if word == "beginbfchar" => {
                i = parse_bfchar(&tokens, i + 1, &mut map);
            }
            Token::Word(word) if word == "beginbfrange" => {
                i = parse_bfrange(&tokens, i + 1, &mut map);
            }
            _ => i += 1,
        }
    }

    map
}

fn parse_bfchar(tokens: &[Token], mut i: usize, map: &mut BTreeMap<String, String>) -> usize {
    while i < tokens.len() {
        match (&tokens[i], tokens.get(i + 1)) {
            (Token::Word(word), _) if word == "endbfchar" => return i + 1,
            (Token::Hex(src), Some(Token::Hex(dst))) => {
                map.insert(src.to_uppercase(), decode_utf16_hex(dst));
                i += 2;
            }
            _ => {
                warn!("malformed bfchar entry; stopping section");
                return i + 1;
            }
        }
    }

    i
}

fn parse_bfrange(tokens: &[Token], mut i: usize, map: &mut BTreeMap<String, String>) -> usize {
    while i < tokens.len() {
        match &tokens[i] {
            Token::Word(word) if word == "endbfrange" => return i + 1,
            Token::Hex(start) => {
                let end = match tokens.get(i + 1) {
                    Some(Token::Hex(end)) => end,
                    _ => {
                        warn!("malformed bfrange entry; stopping section");
                        return i + 1;
                    }
                };

                let (start_code, end_code) = match (
                    u32::from_str_radix(start, 16),
                    u32::from_str_radix(end, 16),
                ) {
                    (Ok(s), Ok(e)) if s <= e => (s, e),
                    _ => {
                        warn!("invalid bfrange bounds <{}> <{}>", start, end);
                        return i + 2;
                    }
                };

                let width = start.len();

                match tokens.get(i + 2) {
                    // one destination, incremented per code
                    Some(Token::Hex(dst)) => {
                        for code in start_code..=end_code {
                            let key = format!("{:0width$X}", code, width = width);
                            map.insert(key, offset_destination(dst, code - start_code));
                        }
                        i += 3;
                    }
                    // one destination per code
                    Some(Token::ArrayStart) => {
                        let mut j = i + 3;
                        let mut code = start_code;
                        while let Some(Token::Hex(dst)) = tokens.get(j) {
                            if code > end_code {
                                break;
                            }
                            let key = format!("{:0width$X}", code, width = width);
                            map.insert(key, decode_utf16_hex(dst));
                            code += 1;
                            j += 1;
                        }
                        // skip past the closing bracket if present
                        if let Some(Token::ArrayEnd) = tokens.get(j) {
                            j += 1;
                        }
                        i = j;
                    }
                    _ => {
                        warn!("malformed bfrange destination; stopping section");
                        return i + 2;
                    }
                }
            }
            _ => {
                i += 1;
            }
        }
    }

    i
}

fn tokenize(data: &[u8]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < data.len() {
        match data[i] {
            b'<' => {
                let start = i + 1;
                let mut end = start;
                while end < data.len() && data[end] != b'>' {
                    end += 1;
                }
                let hex: String = data[start..end]
                    .iter()
                    .filter(|b| b.is_ascii_hexdigit())
                    .map(|&b| b as char)
                    .collect();
                tokens.push(Token::Hex(hex));
                i = end + 1;
            }
            b'[' => {
                tokens.push(Token::ArrayStart);
                i += 1;
            }
            b']' => {
                tokens.push(Token::ArrayEnd);
                i += 1;
            }
            b if b.is_ascii_alphabetic() => {
                let start = i;
                while i < data.len()
                    && (data[i].is_ascii_alphanumeric() || data[i] == b'_')
                {
                    i += 1;
                }
                tokens.push(Token::Word(
                    data[start..i].iter().map(|&b| b as char).collect(),
                ));
            }
            _ => i += 1,
        }
    }

    tokens
}

/// Destination hex decoded as a string of UTF-16 code units, four hex
/// digits per unit
fn decode_utf16_hex(hex: &str) -> String {
    String::from_utf16_lossy(&destination_units(hex))
}

/// `dst + offset`: the increment applies to the final code unit
fn offset_destination(hex: &str, offset: u32) -> String {
    let mut units = destination_units(hex);
    if let Some(last) = units.last_mut() {
        *last = last.wrapping_add(offset as u16);
    }
    String::from_utf16_lossy(&units)
}

fn destination_units(hex: &str) -> Vec<u16> {
    let digits: Vec<char> = hex.chars().collect();

    digits
        .chunks(4)
        .filter_map(|chunk| {
            let s: String = chunk.iter().collect();
            u16::from_str_radix(&s, 16).ok()
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    const CMAP: &[u8] = b"/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
2 beginbfchar
<0001> <0041>
<0002> <006600660069>
endbfchar
1 beginbfrange
<0010> <0012> <0061>
endbfrange
endcmap
end
end";

    #[test]
    fn bfchar_entries_decode_utf16_destinations() {
        let map = parse_tounicode(CMAP);

        assert_eq!(map.get("0001").map(String::as_str), Some("A"));
        assert_eq!(map.get("0002").map(String::as_str), Some("ffi"));
    }

    #[test]
    fn bfrange_expands_with_incremented_destinations() {
        let map = parse_tounicode(CMAP);

        assert_eq!(map.get("0010").map(String::as_str), Some("a"));
        assert_eq!(map.get("0011").map(String::as_str), Some("b"));
        assert_eq!(map.get("0012").map(String::as_str), Some("c"));
    }

    #[test]
    fn bfrange_array_destinations_map_positionally() {
        let map = parse_tounicode(
            b"1 beginbfrange\n<01> <02> [<0058> <0059>]\nendbfrange",
        );

        assert_eq!(map.get("01").map(String::as_str), Some("X"));
        assert_eq!(map.get("02").map(String::as_str), Some("Y"));
    }

    #[test]
    fn source_hex_is_canonicalized_uppercase_keeping_width() {
        let map = parse_tounicode(b"1 beginbfchar\n<ab> <0041>\nendbfchar");
        assert_eq!(map.get("AB").map(String::as_str), Some("A"));
    }

    #[test]
    fn garbage_yields_empty_mappings() {
        assert!(parse_tounicode(b"not a cmap at all").is_empty());
        assert!(parse_tounicode(b"beginbfchar <01>").is_empty());
    }
}
