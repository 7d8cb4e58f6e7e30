use crate::{
    error::PdfResult,
    lex::LexBase,
    objects::Object,
};

/// One line of a content stream, carrying its operator index: `None` for
/// pass-through lines, `Some(0..)` for indexable ones.
///
/// Indexable lines are text-showing operators (`Tj`, `TJ`) inside a BT/ET
/// block and image draws (`Do`) outside one. The bbox resolver and the
/// bracket-splicing handlers agree on this numbering
#[derive(Debug, Clone, PartialEq)]
pub struct ContentLine {
    pub text: String,
    pub operator_index: Option<usize>,
}

/// Splits a content buffer into lines, dropping blank ones and assigning
/// operator indices in stream order.
///
/// Bytes map 1:1 onto chars (no transcoding), so splicing the lines back
/// together reproduces the original bytes
pub fn lex_lines(buffer: &[u8]) -> Vec<ContentLine> {
    let text: String = buffer.iter().map(|&b| b as char).collect();

    let mut lines = Vec::new();
    let mut in_text_block = false;
    let mut next_index = 0;

    for raw in text.split(['\n', '\r']) {
        let line = raw.trim_end();
        if line.trim().is_empty() {
            continue;
        }

        let trimmed = line.trim_start();
        match trimmed {
            "BT" => in_text_block = true,
            "ET" => in_text_block = false,
            _ => {}
        }

        let indexable = if in_text_block {
            trimmed.ends_with("Tj") || trimmed.ends_with("TJ")
        } else {
            trimmed.ends_with(" Do")
        };

        let operator_index = if indexable {
            let idx = next_index;
            next_index += 1;
            Some(idx)
        } else {
            None
        };

        lines.push(ContentLine {
            text: line.to_owned(),
            operator_index,
        });
    }

    lines
}

/// Joins lines back into a byte program, one operator per line
pub fn join_lines(lines: &[ContentLine]) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            out.push(b'\n');
        }
        out.extend(line.text.chars().map(|c| c as u8));
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentToken {
    Object(Object),
    Operator(String),
}

/// A token-level scan of a content stream: operands and operators in
/// stream order. Inline image data (`BI … EI`) is skipped wholesale
pub struct ContentScanner<'a> {
    buffer: &'a [u8],
    cursor: usize,
}

impl<'a> ContentScanner<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, cursor: 0 }
    }

    fn lex_operator(&mut self) -> ContentToken {
        let start = self.cursor;

        while let Some(b) = self.peek_byte() {
            // terminal characters that end operators but are not alphanumeric
            if b == b'*' || b == b'\'' || b == b'"' {
                self.next_byte();
                break;
            }

            if !b.is_ascii_alphanumeric() {
                break;
            }

            self.next_byte();
        }

        let s: String = self.buffer[start..self.cursor]
            .iter()
            .map(|&b| b as char)
            .collect();

        match s.as_str() {
            "true" => ContentToken::Object(Object::Boolean(true)),
            "false" => ContentToken::Object(Object::Boolean(false)),
            "null" => ContentToken::Object(Object::Null),
            _ => ContentToken::Operator(s),
        }
    }

    /// Consumes everything up to and including the `EI` that closes an
    /// inline image
    fn skip_inline_image(&mut self) {
        while self.cursor + 1 < self.buffer.len() {
            let at_ei = self.buffer[self.cursor] == b'E'
                && self.buffer[self.cursor + 1] == b'I'
                && (self.cursor == 0 || crate::lex::is_whitespace(self.buffer[self.cursor - 1]))
                && self
                    .buffer
                    .get(self.cursor + 2)
                    .map_or(true, |&b| crate::lex::is_whitespace(b));

            if at_ei {
                self.cursor += 2;
                return;
            }

            self.cursor += 1;
        }

        self.cursor = self.buffer.len();
    }
}

impl Iterator for ContentScanner<'_> {
    type Item = PdfResult<ContentToken>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_whitespace();

        match self.peek_byte()? {
            b'\'' | b'"' | b'a'..=b'z' | b'A'..=b'Z' => match self.lex_operator() {
                ContentToken::Operator(op) if op == "BI" => {
                    self.skip_inline_image();
                    self.next()
                }
                token => Some(Ok(token)),
            },
            _ => Some(self.lex_object().map(ContentToken::Object)),
        }
    }
}

impl LexBase for ContentScanner<'_> {
    fn buffer(&self) -> &[u8] {
        self.buffer
    }

    fn cursor(&self) -> usize {
        self.cursor
    }

    fn cursor_mut(&mut self) -> &mut usize {
        &mut self.cursor
    }
}
