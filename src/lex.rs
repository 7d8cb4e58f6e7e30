use crate::{
    error::{PdfError, PdfResult},
    objects::{Dictionary, Object, Reference},
};

const FORM_FEED: u8 = b'\x0C';
const BACKSPACE: u8 = b'\x08';

/// Byte-level lexing over a PDF syntax buffer.
///
/// Implementors supply the buffer and cursor; everything else is defaulted.
/// The same machinery lexes file bodies, xref sections and content streams.
pub(crate) trait LexBase {
    fn buffer(&self) -> &[u8];
    fn cursor(&self) -> usize;
    fn cursor_mut(&mut self) -> &mut usize;

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek_byte() {
            if is_whitespace(b) {
                self.next_byte();
            } else if b == b'%' {
                self.next_byte();
                self.skip_comment();
            } else {
                break;
            }
        }
    }

    fn next_byte(&mut self) -> Option<u8> {
        self.buffer().get(self.cursor()).copied().map(|b| {
            *self.cursor_mut() += 1;
            b
        })
    }

    fn peek_byte(&self) -> Option<u8> {
        self.buffer().get(self.cursor()).copied()
    }

    fn peek_byte_offset(&self, offset: usize) -> Option<u8> {
        self.buffer().get(self.cursor() + offset).copied()
    }

    fn next_is_delimiter(&self) -> bool {
        self.peek_byte().map_or(false, is_delimiter)
    }

    fn next_is_whitespace(&self) -> bool {
        self.peek_byte().map_or(false, is_whitespace)
    }

    /// Assumes the leading `%` has already been consumed
    fn skip_comment(&mut self) {
        while let Some(b) = self.peek_byte() {
            if b == b'\r' || b == b'\n' {
                break;
            }
            self.next_byte();
        }
    }

    /// Does not modify the cursor
    fn next_matches(&mut self, bytes: &[u8]) -> bool {
        let start_pos = self.cursor();

        for &b in bytes {
            if Some(b) != self.next_byte() {
                *self.cursor_mut() = start_pos;
                return false;
            }
        }

        *self.cursor_mut() = start_pos;

        true
    }

    fn next_byte_err(&mut self) -> PdfResult<u8> {
        let pos = self.cursor();
        self.next_byte()
            .ok_or_else(|| PdfError::parse_at("unexpected end of input", pos))
    }

    fn expect_byte(&mut self, expected: u8) -> PdfResult<()> {
        let pos = self.cursor();
        match self.next_byte() {
            Some(found) if expected == found => Ok(()),
            found => Err(PdfError::parse_at(
                format!("expected byte {:?}, found {:?}", expected as char, found.map(char::from)),
                pos,
            )),
        }
    }

    fn expect_bytes(&mut self, bytes: &[u8]) -> PdfResult<()> {
        for &b in bytes {
            self.expect_byte(b)?;
        }

        Ok(())
    }

    fn expect_eol(&mut self) -> PdfResult<()> {
        let pos = self.cursor();
        match self.next_byte() {
            Some(b'\n') => {}
            Some(b'\r') => {
                if self.peek_byte() == Some(b'\n') {
                    self.next_byte();
                }
            }
            b => {
                return Err(PdfError::parse_at(
                    format!("expected end of line, found {:?}", b.map(char::from)),
                    pos,
                ));
            }
        }

        Ok(())
    }

    // todo: throw error on empty string
    fn lex_whole_number(&mut self) -> String {
        let mut whole_number = String::new();

        while let Some(b) = self.peek_byte() {
            if !b.is_ascii_digit() {
                break;
            }

            self.next_byte();

            whole_number.push(b as char);
        }

        whole_number
    }

    fn lex_name(&mut self) -> PdfResult<String> {
        self.expect_byte(b'/')?;

        let mut name = String::new();

        while let Some(b) = self.peek_byte() {
            if !is_regular(b) {
                break;
            }

            self.next_byte();

            if b == b'#' {
                let hi = hex_byte_to_digit(self.next_byte_err()?)?;
                let lo = hex_byte_to_digit(self.next_byte_err()?)?;
                name.push((hi * 16 + lo) as char);
            } else {
                name.push(b as char);
            }
        }

        Ok(name)
    }

    fn lex_string(&mut self) -> PdfResult<String> {
        self.expect_byte(b'(')?;

        let mut string = String::new();
        let mut num_open_parens = 0;

        while let Some(b) = self.peek_byte() {
            match b {
                b')' if num_open_parens == 0 => {
                    self.next_byte();
                    break;
                }
                b')' => {
                    num_open_parens -= 1;
                    string.push(')');
                }
                b'(' => {
                    num_open_parens += 1;
                    string.push('(');
                }
                b'\\' => {
                    self.next_byte();
                    match self.next_byte() {
                        Some(b'n') => string.push('\n'),
                        Some(b'r') => string.push('\r'),
                        Some(b't') => string.push('\t'),
                        Some(b'b') => string.push(BACKSPACE as char),
                        Some(b'f') => string.push(FORM_FEED as char),
                        Some(b'(') => string.push('('),
                        Some(b')') => string.push(')'),
                        Some(b'\\') => string.push('\\'),
                        // line continuation
                        Some(b'\n') => {}
                        Some(b'\r') => {
                            if self.peek_byte() == Some(b'\n') {
                                self.next_byte();
                            }
                        }
                        // octal escape of the form `\d`, `\dd` or `\ddd`
                        Some(c @ b'0'..=b'7') => {
                            let mut n = u32::from(c - b'0');
                            for _ in 0..2 {
                                match self.peek_byte() {
                                    Some(d @ b'0'..=b'7') => {
                                        self.next_byte();
                                        n = n * 8 + u32::from(d - b'0');
                                    }
                                    _ => break,
                                }
                            }
                            string.push((n & 0xFF) as u8 as char);
                        }
                        // a reverse solidus before anything else is dropped
                        Some(c) => string.push(c as char),
                        None => return Err(PdfError::parse("unterminated string")),
                    }
                    continue;
                }
                _ => {
                    string.push(b as char);
                }
            }
            self.next_byte();
        }

        Ok(string)
    }

    fn lex_hex_string(&mut self) -> PdfResult<String> {
        self.expect_byte(b'<')?;

        let mut digits = Vec::new();

        while let Some(b) = self.next_byte() {
            match b {
                b'>' => break,
                b if is_whitespace(b) => {}
                b => digits.push(hex_byte_to_digit(b)?),
            }
        }

        // an odd number of digits behaves as if a trailing 0 were present
        if digits.len() % 2 != 0 {
            digits.push(0);
        }

        let bytes = digits
            .chunks_exact(2)
            .map(|pair| pair[0] * 16 + pair[1])
            .collect::<Vec<u8>>();

        Ok(decode_text_bytes(&bytes))
    }

    // todo: scientific notation (1e2)
    fn lex_number(&mut self) -> PdfResult<Object> {
        let negative = match self.peek_byte() {
            Some(b'+') => {
                self.next_byte();
                1
            }
            Some(b'-') => {
                self.next_byte();
                -1
            }
            _ => 1,
        };

        let whole_number = self.lex_whole_number();

        let whole_end_pos = self.cursor();

        if self.peek_byte() == Some(b'.') {
            self.next_byte();
            let decimal_number = format!("{}.{}", whole_number, self.lex_whole_number());
            let parsed = decimal_number
                .parse::<f32>()
                .map_err(|_| PdfError::parse_at("malformed real number", whole_end_pos))?;
            return Ok(Object::Real(parsed * negative as f32));
        }

        if whole_number.is_empty() {
            return Err(PdfError::parse_at("malformed number", whole_end_pos));
        }

        // `N G R` is an indirect reference; back off if the lookahead fails
        if negative == 1 {
            self.skip_whitespace();
            if self.peek_byte().map_or(false, |b| b.is_ascii_digit()) {
                let generation = self.lex_whole_number();
                self.skip_whitespace();

                if self.next_byte() == Some(b'R')
                    && (self.next_is_delimiter() || self.next_is_whitespace() || self.peek_byte().is_none())
                {
                    return Ok(Object::Reference(Reference {
                        object_number: whole_number.parse::<usize>().map_err(|_| {
                            PdfError::parse_at("object number out of range", whole_end_pos)
                        })?,
                        generation: generation.parse::<usize>().map_err(|_| {
                            PdfError::parse_at("generation out of range", whole_end_pos)
                        })?,
                    }));
                }

                *self.cursor_mut() = whole_end_pos;
            } else {
                *self.cursor_mut() = whole_end_pos;
            }
        }

        let parsed = whole_number
            .parse::<i64>()
            .map_err(|_| PdfError::parse_at("integer out of range", whole_end_pos))?;

        Ok(Object::Integer(parsed * negative))
    }

    fn lex_array(&mut self) -> PdfResult<Object> {
        let mut arr = Vec::new();
        self.expect_byte(b'[')?;
        loop {
            self.skip_whitespace();
            match self.peek_byte() {
                Some(b']') => {
                    self.next_byte();
                    break;
                }
                Some(..) => arr.push(self.lex_object()?),
                None => return Err(PdfError::parse("unterminated array")),
            }
        }

        Ok(Object::Array(arr))
    }

    fn lex_dict(&mut self) -> PdfResult<Dictionary> {
        self.expect_byte(b'<')?;
        self.expect_byte(b'<')?;
        self.skip_whitespace();

        let mut dict = Dictionary::new();

        while let Some(b) = self.peek_byte() {
            if b == b'>' {
                self.next_byte();
                self.expect_byte(b'>')?;
                break;
            }

            let name = self.lex_name()?;
            let value = self.lex_object()?;
            self.skip_whitespace();
            dict.insert(name, value);
        }

        Ok(dict)
    }

    fn lex_object(&mut self) -> PdfResult<Object> {
        self.skip_whitespace();
        let pos = self.cursor();
        let obj = match self.peek_byte() {
            Some(b't') => {
                self.expect_bytes(b"true")?;
                Ok(Object::Boolean(true))
            }
            Some(b'f') => {
                self.expect_bytes(b"false")?;
                Ok(Object::Boolean(false))
            }
            Some(b'n') => {
                self.expect_bytes(b"null")?;
                Ok(Object::Null)
            }
            Some(b'<') => match self.peek_byte_offset(1) {
                Some(b'<') => Ok(Object::Dictionary(self.lex_dict()?)),
                _ => Ok(Object::String(self.lex_hex_string()?)),
            },
            Some(b'+' | b'-' | b'0'..=b'9' | b'.') => self.lex_number(),
            Some(b'(') => Ok(Object::String(self.lex_string()?)),
            Some(b'/') => Ok(Object::Name(self.lex_name()?)),
            Some(b'[') => self.lex_array(),
            Some(b) => Err(PdfError::parse_at(
                format!("unexpected object start {:?}", b as char),
                pos,
            )),
            None => Err(PdfError::parse_at("unexpected end of input", pos)),
        }?;
        Ok(obj)
    }

    /// Reads an object prelude `N G obj` and returns the object number
    fn read_obj_prelude(&mut self) -> PdfResult<usize> {
        self.skip_whitespace();
        let number = self.lex_whole_number();
        self.skip_whitespace();
        self.lex_whole_number();
        self.skip_whitespace();
        self.expect_bytes(b"obj")?;
        self.skip_whitespace();

        number
            .parse::<usize>()
            .map_err(|_| PdfError::parse("malformed object prelude"))
    }

    fn read_obj_trailer(&mut self) -> PdfResult<()> {
        self.skip_whitespace();
        self.expect_bytes(b"endobj")?;

        Ok(())
    }

    /// Reads the raw payload following a stream dictionary. `len` of `None`
    /// falls back to scanning for the `endstream` keyword
    fn lex_stream_payload(&mut self, len: Option<usize>) -> PdfResult<Vec<u8>> {
        self.expect_bytes(b"stream")?;
        // the keyword is followed by CRLF or LF (a bare CR is tolerated)
        match self.peek_byte() {
            Some(b'\r') => {
                self.next_byte();
                if self.peek_byte() == Some(b'\n') {
                    self.next_byte();
                }
            }
            Some(b'\n') => {
                self.next_byte();
            }
            _ => {}
        }

        let start = self.cursor();

        let end = match len {
            Some(len) if self.payload_end_is_consistent(start, len) => start + len,
            _ => self.scan_for_endstream(start)?,
        };

        let data = self.buffer()[start..end].to_vec();
        *self.cursor_mut() = end;

        self.skip_whitespace();
        self.expect_bytes(b"endstream")?;

        Ok(data)
    }

    /// `Length` entries are occasionally wrong; trust them only when
    /// `endstream` actually follows
    fn payload_end_is_consistent(&self, start: usize, len: usize) -> bool {
        let end = start + len;
        let buffer = self.buffer();
        if end > buffer.len() {
            return false;
        }

        let mut pos = end;
        while pos < buffer.len() && is_whitespace(buffer[pos]) {
            pos += 1;
        }

        buffer[pos..].starts_with(b"endstream")
    }

    fn scan_for_endstream(&self, start: usize) -> PdfResult<usize> {
        let buffer = self.buffer();
        let found = buffer[start..]
            .windows(b"endstream".len())
            .position(|window| window == b"endstream")
            .ok_or_else(|| PdfError::parse_at("unterminated stream", start))?;

        let mut end = start + found;
        // back off the EOL that precedes the keyword
        if end > start && buffer[end - 1] == b'\n' {
            end -= 1;
        }
        if end > start && buffer[end - 1] == b'\r' {
            end -= 1;
        }

        Ok(end)
    }
}

/// Whitespace chars are NUL, tab, line feed, form feed, carriage return
/// and space
pub(crate) fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\0' | 0x9 | b'\n' | FORM_FEED | b'\r' | b' ')
}

pub(crate) fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

pub(crate) fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

fn hex_byte_to_digit(b: u8) -> PdfResult<u8> {
    match b {
        b'0'..=b'9' => Ok(b - b'0'),
        b'a'..=b'f' => Ok(b - b'a' + 10),
        b'A'..=b'F' => Ok(b - b'A' + 10),
        _ => Err(PdfError::parse(format!("invalid hex digit {:?}", b as char))),
    }
}

/// Text strings with a UTF-16BE byte-order mark decode to their code
/// points; everything else maps each byte to the same-valued char
pub(crate) fn decode_text_bytes(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect::<Vec<u16>>();
        return String::from_utf16_lossy(&units);
    }

    bytes.iter().map(|&b| b as char).collect()
}

/// A standalone lexer over a borrowed buffer
pub(crate) struct Lexer<'a> {
    buffer: &'a [u8],
    pub pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, pos: 0 }
    }

    pub fn at(buffer: &'a [u8], pos: usize) -> Self {
        Self { buffer, pos }
    }
}

impl LexBase for Lexer<'_> {
    fn buffer(&self) -> &[u8] {
        self.buffer
    }

    fn cursor(&self) -> usize {
        self.pos
    }

    fn cursor_mut(&mut self) -> &mut usize {
        &mut self.pos
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn lex_one(buffer: &[u8]) -> Object {
        Lexer::new(buffer).lex_object().unwrap()
    }

    #[test]
    fn number_vs_reference_lookahead() {
        assert_eq!(
            lex_one(b"5 0 R"),
            Object::Reference(Reference::new(5)),
        );
        assert_eq!(lex_one(b"5 0"), Object::Integer(5));
        assert_eq!(lex_one(b"-14.5"), Object::Real(-14.5));
    }

    #[test]
    fn name_hash_escape() {
        assert_eq!(lex_one(b"/A#20B"), Object::Name("A B".to_owned()));
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            lex_one(br"(a\(b\)c\\d)"),
            Object::String("a(b)c\\d".to_owned())
        );
        assert_eq!(lex_one(br"(\101)"), Object::String("A".to_owned()));
        assert_eq!(lex_one(b"(nested (parens) ok)"), Object::String("nested (parens) ok".to_owned()));
    }

    #[test]
    fn hex_string_utf16() {
        assert_eq!(lex_one(b"<FEFF0054>"), Object::String("T".to_owned()));
        assert_eq!(lex_one(b"<48656C6C6F>"), Object::String("Hello".to_owned()));
        // odd digit count implies a trailing zero
        assert_eq!(lex_one(b"<48656C6C6F2>"), Object::String("Hello ".to_owned()));
    }

    #[test]
    fn dict_preserves_order_and_nested_values() {
        let obj = lex_one(b"<< /Type /Page /MediaBox [0 0 612 792] /Rotate 0 >>");
        let dict = obj.as_dict().unwrap();

        assert_eq!(
            dict.keys().cloned().collect::<Vec<_>>(),
            vec!["Type", "MediaBox", "Rotate"]
        );
        assert_eq!(dict.get_name("Type"), Some("Page"));
        assert_eq!(dict.get("MediaBox").unwrap().as_array().unwrap().len(), 4);
    }

    #[test]
    fn stream_payload_with_bad_length_falls_back_to_scan() {
        let buffer = b"stream\nhello world\nendstream";
        let mut lexer = Lexer::new(buffer);
        let data = lexer.lex_stream_payload(Some(500)).unwrap();
        assert_eq!(data, b"hello world");
    }

    #[test]
    fn stream_payload_with_correct_length() {
        let buffer = b"stream\r\nabc\nendstream";
        let mut lexer = Lexer::new(buffer);
        let data = lexer.lex_stream_payload(Some(3)).unwrap();
        assert_eq!(data, b"abc");
    }
}
