use std::io::Read;

use flate2::read::ZlibDecoder;
use log::warn;

use crate::{
    error::{PdfError, PdfResult},
    objects::{Dictionary, Object},
};

/// Decode parameters for the flate predictor stage.
///
/// Predictor 1 means no predictor and no tag byte; predictors >= 10 are the
/// PNG per-row filters, each row prefixed by a filter-type byte
#[derive(Debug, Clone, Copy)]
pub struct PredictorParams {
    pub predictor: u8,
    pub colors: u32,
    pub bits_per_component: u32,
    pub columns: u32,
}

impl Default for PredictorParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            colors: 1,
            bits_per_component: 8,
            columns: 1,
        }
    }
}

impl PredictorParams {
    pub fn from_dict(dict: Option<&Dictionary>) -> Self {
        let mut params = Self::default();

        if let Some(dict) = dict {
            if let Some(predictor) = dict.get_integer("Predictor") {
                params.predictor = predictor as u8;
            }
            if let Some(colors) = dict.get_integer("Colors") {
                params.colors = colors as u32;
            }
            if let Some(bits) = dict.get_integer("BitsPerComponent") {
                params.bits_per_component = bits as u32;
            }
            if let Some(columns) = dict.get_integer("Columns") {
                params.columns = columns as u32;
            }
        }

        params
    }

    fn bytes_per_pixel(&self) -> usize {
        ((self.colors * self.bits_per_component + 7) / 8) as usize
    }

    fn bytes_per_row(&self) -> usize {
        ((self.columns * self.colors * self.bits_per_component + 7) / 8) as usize
    }
}

/// Applies the filter chain named by a stream dictionary in order.
///
/// `decode_parms` may be a single dictionary or an array parallel to the
/// filter array
pub fn decode_stream(dict: &Dictionary, data: &[u8]) -> PdfResult<Vec<u8>> {
    let filters = match dict.get("Filter") {
        None => return Ok(data.to_vec()),
        Some(Object::Name(name)) => vec![name.clone()],
        Some(Object::Array(arr)) => arr
            .iter()
            .filter_map(|obj| obj.as_name().map(str::to_owned))
            .collect(),
        Some(obj) => {
            return Err(PdfError::parse(format!(
                "malformed Filter entry: {:?}",
                obj.ty()
            )))
        }
    };

    let parms_for = |idx: usize| -> Option<&Dictionary> {
        match dict.get("DecodeParms") {
            Some(Object::Dictionary(d)) if idx == 0 => Some(d),
            Some(Object::Array(arr)) => arr.get(idx).and_then(Object::as_dict),
            _ => None,
        }
    };

    let mut data = data.to_vec();

    for (idx, filter) in filters.iter().enumerate() {
        data = match filter.as_str() {
            "FlateDecode" | "Fl" => {
                flate_decode(&data, PredictorParams::from_dict(parms_for(idx)))?
            }
            "ASCIIHexDecode" | "AHx" => ascii_hex_decode(&data)?,
            other => {
                return Err(PdfError::unsupported(format!(
                    "stream filter {:?} is not supported",
                    other
                )))
            }
        };
    }

    Ok(data)
}

pub fn flate_decode(data: &[u8], params: PredictorParams) -> PdfResult<Vec<u8>> {
    let mut decoded = Vec::new();
    ZlibDecoder::new(data)
        .read_to_end(&mut decoded)
        .map_err(|err| PdfError::parse(format!("flate decode failed: {}", err)))?;

    if params.predictor <= 1 {
        return Ok(decoded);
    }

    if params.predictor < 10 {
        // TIFF predictor 2; rare enough that refusing beats corrupting
        return Err(PdfError::unsupported("TIFF predictor 2 is not supported"));
    }

    undo_png_predictor(&decoded, params)
}

fn ascii_hex_decode(data: &[u8]) -> PdfResult<Vec<u8>> {
    let mut digits = Vec::new();

    for &b in data {
        match b {
            b'>' => break,
            b'0'..=b'9' => digits.push(b - b'0'),
            b'a'..=b'f' => digits.push(b - b'a' + 10),
            b'A'..=b'F' => digits.push(b - b'A' + 10),
            b if crate::lex::is_whitespace(b) => {}
            b => {
                return Err(PdfError::parse(format!(
                    "invalid byte {:?} in ASCIIHexDecode data",
                    b as char
                )))
            }
        }
    }

    if digits.len() % 2 != 0 {
        digits.push(0);
    }

    Ok(digits.chunks_exact(2).map(|pair| pair[0] * 16 + pair[1]).collect())
}

fn undo_png_predictor(data: &[u8], params: PredictorParams) -> PdfResult<Vec<u8>> {
    let bpp = params.bytes_per_pixel();
    let row_len = params.bytes_per_row();

    if row_len == 0 || data.len() % (row_len + 1) != 0 {
        warn!(
            "predictor row length {} does not divide stream of {} bytes",
            row_len + 1,
            data.len()
        );
    }

    let mut out: Vec<u8> = Vec::with_capacity(data.len());
    let mut prev_row = vec![0u8; row_len];

    for chunk in data.chunks(row_len + 1) {
        if chunk.len() < 2 {
            break;
        }

        let filter_type = chunk[0];
        let mut row = chunk[1..].to_vec();

        for i in 0..row.len() {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = prev_row.get(i).copied().unwrap_or(0);
            let up_left = if i >= bpp {
                prev_row.get(i - bpp).copied().unwrap_or(0)
            } else {
                0
            };

            row[i] = match filter_type {
                0 => row[i],
                1 => row[i].wrapping_add(left),
                2 => row[i].wrapping_add(up),
                3 => row[i].wrapping_add(((u16::from(left) + u16::from(up)) / 2) as u8),
                4 => row[i].wrapping_add(paeth(left, up, up_left)),
                t => {
                    return Err(PdfError::parse(format!(
                        "invalid PNG predictor filter type {}",
                        t
                    )))
                }
            };
        }

        out.extend_from_slice(&row);
        prev_row = row;
    }

    Ok(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i32::from(a) + i32::from(b) - i32::from(c);
    let pa = (p - i32::from(a)).abs();
    let pb = (p - i32::from(b)).abs();
    let pc = (p - i32::from(c)).abs();

    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flate_decode_recovers_zlib_data() {
        use flate2::{write::ZlibEncoder, Compression};
        use std::io::Write;

        let plain = b"BT /F1 12 Tf (Hello) Tj ET".repeat(20);
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&plain).unwrap();
        let encoded = encoder.finish().unwrap();

        let decoded = flate_decode(&encoded, PredictorParams::default()).unwrap();
        assert_eq!(decoded, plain);
    }

    #[test]
    fn ascii_hex() {
        assert_eq!(ascii_hex_decode(b"48 65 6C 6C 6F>").unwrap(), b"Hello");
        // odd digit count implies trailing zero
        assert_eq!(ascii_hex_decode(b"7>").unwrap(), vec![0x70]);
    }

    #[test]
    fn png_up_predictor() {
        // two rows of four bytes, filter type 2 (Up)
        let rows = vec![
            2, 1, 1, 1, 1, //
            2, 1, 1, 1, 1,
        ];
        let params = PredictorParams {
            predictor: 12,
            colors: 1,
            bits_per_component: 8,
            columns: 4,
        };
        let out = undo_png_predictor(&rows, params).unwrap();
        assert_eq!(out, vec![1, 1, 1, 1, 2, 2, 2, 2]);
    }

    #[test]
    fn decode_stream_without_filter_is_identity() {
        let dict = Dictionary::new();
        assert_eq!(decode_stream(&dict, b"abc").unwrap(), b"abc");
    }
}
