use std::collections::HashMap;

use log::warn;

use crate::{
    content::{ContentScanner, ContentToken},
    data_structures::{Matrix, Rectangle},
    document::Document,
    error::PdfResult,
    objects::{Dictionary, Object},
    page::{self, Page},
};

/// Target rectangles are inflated by this much on each side before the
/// intersection test
pub const TOLERANCE: f32 = 2.0;

/// Ascent approximation as a fraction of the font size; real metrics
/// would require parsing every font program on the resolution path
const ASCENT_FACTOR: f32 = 0.8;

const DEFAULT_GLYPH_WIDTH: f32 = 500.0;

/// Replays a page's imaging program and reports the indices of every
/// indexable operator whose bounds intersect `target` inflated by
/// [`TOLERANCE`]. Indices are returned in increasing order; an empty result
/// is a valid outcome, not an error
pub fn resolve_rect(doc: &Document, page: &Page, target: &Rectangle) -> PdfResult<Vec<usize>> {
    let inflated = target.inflate(TOLERANCE);

    Ok(operator_bounds(doc, page)?
        .into_iter()
        .filter(|(_, rect)| rect.intersects(&inflated))
        .map(|(index, _)| index)
        .collect())
}

/// The bounds of every indexable operator, in index order.
///
/// Text events: `(x, y)` is the baseline start, width the baseline
/// displacement, height the rise to the ascent line. Image events: the
/// translation and scale components of the CTM (axis-aligned
/// approximation)
pub fn operator_bounds(doc: &Document, page: &Page) -> PdfResult<Vec<(usize, Rectangle)>> {
    let content = page::content_bytes(doc, page)?;
    let resources = page::resources(doc, page);

    let mut replay = Replay::new(doc, resources);
    let mut bounds = Vec::new();

    let mut operands: Vec<Object> = Vec::new();

    for token in ContentScanner::new(&content) {
        let token = match token {
            Ok(token) => token,
            Err(err) => {
                warn!("content scan stopped on page {}: {}", page.number(), err);
                break;
            }
        };

        match token {
            ContentToken::Object(obj) => operands.push(obj),
            ContentToken::Operator(op) => {
                if let Some(rect) = replay.operator(&op, &operands) {
                    bounds.push((bounds.len(), rect));
                }
                operands.clear();
            }
        }
    }

    Ok(bounds)
}

struct FontMetrics {
    first_char: i64,
    widths: Vec<f32>,
    cid_widths: HashMap<u32, f32>,
    default_width: f32,
    two_byte: bool,
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self {
            first_char: 0,
            widths: Vec::new(),
            cid_widths: HashMap::new(),
            default_width: DEFAULT_GLYPH_WIDTH,
            two_byte: false,
        }
    }
}

impl FontMetrics {
    /// Glyph width in 1000-unit glyph space
    fn width(&self, code: u32) -> f32 {
        if self.two_byte {
            return self
                .cid_widths
                .get(&code)
                .copied()
                .unwrap_or(self.default_width);
        }

        let index = code as i64 - self.first_char;
        if index >= 0 {
            if let Some(width) = self.widths.get(index as usize) {
                return *width;
            }
        }

        self.default_width
    }
}

struct Replay<'a> {
    doc: &'a Document,
    resources: Option<&'a Dictionary>,

    ctm: Matrix,
    ctm_stack: Vec<Matrix>,

    in_text_block: bool,
    tm: Matrix,
    tlm: Matrix,
    leading: f32,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    rise: f32,
    metrics: FontMetrics,
}

impl<'a> Replay<'a> {
    fn new(doc: &'a Document, resources: Option<&'a Dictionary>) -> Self {
        Self {
            doc,
            resources,
            ctm: Matrix::identity(),
            ctm_stack: Vec::new(),
            in_text_block: false,
            tm: Matrix::identity(),
            tlm: Matrix::identity(),
            leading: 0.0,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            rise: 0.0,
            metrics: FontMetrics::default(),
        }
    }

    /// Handles one operator; returns bounds when it is an indexable event
    fn operator(&mut self, op: &str, operands: &[Object]) -> Option<Rectangle> {
        match op {
            "q" => self.ctm_stack.push(self.ctm),
            "Q" => {
                if let Some(ctm) = self.ctm_stack.pop() {
                    self.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_array(operands) {
                    self.ctm = m.multiply(&self.ctm);
                }
            }
            "BT" => {
                self.in_text_block = true;
                self.tm = Matrix::identity();
                self.tlm = Matrix::identity();
            }
            "ET" => self.in_text_block = false,
            "Td" => {
                if let [tx, ty] = numbers(operands)[..] {
                    self.translate_line(tx, ty);
                }
            }
            "TD" => {
                if let [tx, ty] = numbers(operands)[..] {
                    self.leading = -ty;
                    self.translate_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = Matrix::from_array(operands) {
                    self.tm = m;
                    self.tlm = m;
                }
            }
            "T*" => self.next_line(),
            "TL" => self.leading = numbers(operands).first().copied().unwrap_or(0.0),
            "Tc" => self.char_spacing = numbers(operands).first().copied().unwrap_or(0.0),
            "Tw" => self.word_spacing = numbers(operands).first().copied().unwrap_or(0.0),
            "Tz" => {
                self.horizontal_scale =
                    numbers(operands).first().copied().unwrap_or(100.0) / 100.0
            }
            "Ts" => self.rise = numbers(operands).first().copied().unwrap_or(0.0),
            "Tf" => self.select_font(operands),
            "Tj" if self.in_text_block => {
                let advance = operands.first().map_or(0.0, |obj| self.string_advance(obj));
                return Some(self.show(advance));
            }
            "TJ" if self.in_text_block => {
                let advance = operands.first().map_or(0.0, |obj| self.array_advance(obj));
                return Some(self.show(advance));
            }
            // the quote operators show text but are never indexable; they
            // still move the text matrix
            "'" if self.in_text_block => {
                self.next_line();
                let advance = operands.first().map_or(0.0, |obj| self.string_advance(obj));
                self.show(advance);
            }
            "\"" if self.in_text_block => {
                let nums = numbers(operands);
                if nums.len() >= 2 {
                    self.word_spacing = nums[0];
                    self.char_spacing = nums[1];
                }
                self.next_line();
                let advance = operands.last().map_or(0.0, |obj| self.string_advance(obj));
                self.show(advance);
            }
            "Do" if !self.in_text_block => {
                return Some(Rectangle::from_origin_size(
                    self.ctm.e,
                    self.ctm.f,
                    self.ctm.a,
                    self.ctm.d,
                ));
            }
            _ => {}
        }

        None
    }

    fn translate_line(&mut self, tx: f32, ty: f32) {
        self.tlm = Matrix::translate(tx, ty).multiply(&self.tlm);
        self.tm = self.tlm;
    }

    fn next_line(&mut self) {
        let leading = self.leading;
        self.translate_line(0.0, -leading);
    }

    fn select_font(&mut self, operands: &[Object]) {
        self.font_size = operands
            .get(1)
            .and_then(Object::as_number)
            .unwrap_or(self.font_size);

        self.metrics = operands
            .first()
            .and_then(Object::as_name)
            .map(|key| self.load_metrics(key))
            .unwrap_or_default();
    }

    fn load_metrics(&self, key: &str) -> FontMetrics {
        let mut metrics = FontMetrics::default();

        let font = match self
            .resources
            .and_then(|res| self.doc.dict_get_dict(res, "Font"))
            .and_then(|fonts| self.doc.dict_get_dict(fonts, key))
        {
            Some(font) => font,
            None => return metrics,
        };

        if self.doc.dict_get_name(font, "Subtype") == Some("Type0") {
            metrics.two_byte = true;

            let descendant = self
                .doc
                .dict_get_array(font, "DescendantFonts")
                .and_then(|arr| arr.first())
                .map(|obj| self.doc.resolve(obj))
                .and_then(Object::as_dict);

            if let Some(descendant) = descendant {
                if let Some(dw) = self.doc.dict_get_number(descendant, "DW") {
                    metrics.default_width = dw;
                }
                if let Some(w) = self.doc.dict_get_array(descendant, "W") {
                    metrics.cid_widths = parse_cid_widths(self.doc, w);
                }
            }

            return metrics;
        }

        metrics.first_char = self.doc.dict_get_integer(font, "FirstChar").unwrap_or(0);
        if let Some(widths) = self.doc.dict_get_array(font, "Widths") {
            metrics.widths = widths
                .iter()
                .map(|obj| self.doc.resolve(obj).as_number().unwrap_or(0.0))
                .collect();
        }
        if let Some(descriptor) = self.doc.dict_get_dict(font, "FontDescriptor") {
            if let Some(missing) = self.doc.dict_get_number(descriptor, "MissingWidth") {
                metrics.default_width = missing;
            }
        }

        metrics
    }

    /// Text-space displacement of showing `text`
    fn string_advance(&self, text: &Object) -> f32 {
        let text = match text.as_string() {
            Some(text) => text,
            None => return 0.0,
        };

        let codes: Vec<u32> = if self.metrics.two_byte {
            let bytes: Vec<u32> = text.chars().map(|c| c as u32).collect();
            bytes
                .chunks(2)
                .map(|pair| (pair[0] << 8) | pair.get(1).copied().unwrap_or(0))
                .collect()
        } else {
            text.chars().map(|c| c as u32).collect()
        };

        let mut advance = 0.0;
        for code in codes {
            let glyph = self.metrics.width(code) / 1000.0 * self.font_size;
            let word = if !self.metrics.two_byte && code == 32 {
                self.word_spacing
            } else {
                0.0
            };
            advance += (glyph + self.char_spacing + word) * self.horizontal_scale;
        }

        advance
    }

    fn array_advance(&self, arr: &Object) -> f32 {
        let arr = match arr.as_array() {
            Some(arr) => arr,
            None => return 0.0,
        };

        let mut advance = 0.0;
        for item in arr {
            match item {
                Object::String(..) => advance += self.string_advance(item),
                Object::Integer(..) | Object::Real(..) => {
                    let n = item.as_number().unwrap_or(0.0);
                    advance -= n / 1000.0 * self.font_size * self.horizontal_scale;
                }
                _ => {}
            }
        }

        advance
    }

    /// Computes the event bounds and advances the text matrix
    fn show(&mut self, advance: f32) -> Rectangle {
        let trm = self.tm.multiply(&self.ctm);

        let (x0, y0) = trm.apply(0.0, self.rise);
        let (x1, _) = trm.apply(advance, self.rise);
        let (_, y2) = trm.apply(0.0, self.rise + ASCENT_FACTOR * self.font_size);

        self.tm = Matrix::translate(advance, 0.0).multiply(&self.tm);

        Rectangle::from_points(x0, y0, x1, y2)
    }
}

fn numbers(operands: &[Object]) -> Vec<f32> {
    operands.iter().filter_map(Object::as_number).collect()
}

/// `/W [c [w1 w2] c1 c2 w]` — both forms, resolved per CID
fn parse_cid_widths(doc: &Document, arr: &[Object]) -> HashMap<u32, f32> {
    let mut widths = HashMap::new();
    let mut i = 0;

    while i < arr.len() {
        let first = match doc.resolve(&arr[i]).as_number() {
            Some(n) => n as u32,
            None => break,
        };

        match arr.get(i + 1).map(|obj| doc.resolve(obj)) {
            Some(Object::Array(per_glyph)) => {
                for (offset, w) in per_glyph.iter().enumerate() {
                    if let Some(w) = doc.resolve(w).as_number() {
                        widths.insert(first + offset as u32, w);
                    }
                }
                i += 2;
            }
            Some(other) => {
                let last = match other.as_number() {
                    Some(n) => n as u32,
                    None => break,
                };
                let w = match arr.get(i + 2).and_then(|obj| doc.resolve(obj).as_number()) {
                    Some(w) => w,
                    None => break,
                };
                for cid in first..=last {
                    widths.insert(cid, w);
                }
                i += 3;
            }
            None => break,
        }
    }

    widths
}
