//! Stream filters.
//!
//! Generic filters are decoded here. Image codecs (DCT, JPX, JBIG2, CCITT)
//! stop the chain: the still-encoded bytes are handed to the image decoder
//! together with the codec name.

use super::error::{PDFError, PDFResult};
use super::lexer::Lexer;
use super::parser::{Dict, PdfStream};
use flate2::read::ZlibDecoder;
use log::warn;
use std::io::Read;

/// Output of [`decode_stream`].
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub data: Vec<u8>,
    /// Image codec left for the image decoder, if the chain ended in one
    pub codec: Option<String>,
}

/// Canonical name of an image codec filter, if `name` is one.
pub fn image_codec(name: &str) -> Option<&'static str> {
    match name {
        "DCTDecode" | "DCT" => Some("DCTDecode"),
        "JPXDecode" => Some("JPXDecode"),
        "JBIG2Decode" => Some("JBIG2Decode"),
        "CCITTFaxDecode" | "CCF" => Some("CCITTFaxDecode"),
        _ => None,
    }
}

/// Runs the stream's filter chain.
pub fn decode_stream(stream: &PdfStream) -> PDFResult<Decoded> {
    let filters = stream.filters();
    let parms = stream.decode_parms();
    let mut data = stream.data.clone();

    for (index, filter) in filters.iter().enumerate() {
        if let Some(codec) = image_codec(filter) {
            return Ok(Decoded {
                data,
                codec: Some(codec.to_string()),
            });
        }
        let parm = parms.get(index).copied().flatten();
        data = apply_filter(filter, &data, parm)?;
    }

    Ok(Decoded { data, codec: None })
}

fn apply_filter(filter: &str, data: &[u8], parms: Option<&Dict>) -> PDFResult<Vec<u8>> {
    match filter {
        "FlateDecode" | "Fl" => apply_predictor(decode_flate(data)?, parms),
        "LZWDecode" | "LZW" => {
            let early_change = parms
                .and_then(|p| p.get("EarlyChange"))
                .and_then(|v| v.as_i64())
                .unwrap_or(1)
                != 0;
            apply_predictor(decode_lzw(data, early_change)?, parms)
        }
        "ASCIIHexDecode" | "AHx" => Ok(decode_ascii_hex(data)),
        "ASCII85Decode" | "A85" => decode_ascii85(data),
        "RunLengthDecode" | "RL" => Ok(decode_run_length(data)),
        other => Err(PDFError::decode(other, "unsupported filter")),
    }
}

/// Decodes a FlateDecode (zlib) stream.
///
/// A truncated stream that still produced output is accepted with a warning;
/// a stream that yields nothing is an error.
pub fn decode_flate(compressed_data: &[u8]) -> PDFResult<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(compressed_data);
    let mut decompressed = Vec::new();

    match decoder.read_to_end(&mut decompressed) {
        Ok(_) => Ok(decompressed),
        Err(e) if !decompressed.is_empty() => {
            warn!(
                "FlateDecode stopped early ({}), keeping {} bytes",
                e,
                decompressed.len()
            );
            Ok(decompressed)
        }
        Err(e) => Err(PDFError::decode("FlateDecode", e.to_string())),
    }
}

/// Undoes PNG (10..=15) or TIFF (2) prediction.
pub fn apply_predictor(data: Vec<u8>, parms: Option<&Dict>) -> PDFResult<Vec<u8>> {
    let Some(parms) = parms else {
        return Ok(data);
    };
    let int = |key: &str, default: i64| {
        parms
            .get(key)
            .and_then(|v| v.as_i64())
            .unwrap_or(default)
    };

    let predictor = int("Predictor", 1);
    if predictor <= 1 {
        return Ok(data);
    }

    let colors = int("Colors", 1).clamp(1, 32) as usize;
    let bits = int("BitsPerComponent", 8).clamp(1, 16) as usize;
    let columns = int("Columns", 1).max(1) as usize;
    let bytes_per_pixel = (colors * bits).div_ceil(8);
    let row_length = (colors * bits * columns).div_ceil(8);

    if predictor == 2 {
        return Ok(undo_tiff_predictor(data, row_length, bytes_per_pixel, bits));
    }
    if !(10..=15).contains(&predictor) {
        return Err(PDFError::decode(
            "FlateDecode",
            format!("unknown predictor {}", predictor),
        ));
    }

    let mut output = Vec::with_capacity(data.len());
    let mut previous = vec![0u8; row_length];
    for chunk in data.chunks(row_length + 1) {
        let Some((&kind, encoded)) = chunk.split_first() else {
            break;
        };
        let mut row = encoded.to_vec();
        row.resize(row_length, 0);
        for i in 0..row_length {
            let left = if i >= bytes_per_pixel { row[i - bytes_per_pixel] } else { 0 };
            let up = previous[i];
            let up_left = if i >= bytes_per_pixel {
                previous[i - bytes_per_pixel]
            } else {
                0
            };
            let add = match kind {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((u16::from(left) + u16::from(up)) / 2) as u8,
                4 => paeth(left, up, up_left),
                _ => 0,
            };
            row[i] = row[i].wrapping_add(add);
        }
        output.extend_from_slice(&row);
        previous = row;
    }
    Ok(output)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i16::from(a) + i16::from(b) - i16::from(c);
    let pa = (p - i16::from(a)).abs();
    let pb = (p - i16::from(b)).abs();
    let pc = (p - i16::from(c)).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

fn undo_tiff_predictor(mut data: Vec<u8>, row_length: usize, bpp: usize, bits: usize) -> Vec<u8> {
    if bits != 8 {
        warn!("TIFF predictor with {} bits per component not supported", bits);
        return data;
    }
    for row in data.chunks_mut(row_length) {
        for i in bpp..row.len() {
            row[i] = row[i].wrapping_add(row[i - bpp]);
        }
    }
    data
}

pub fn decode_ascii_hex(data: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(data.len() / 2);
    let mut high: Option<u8> = None;
    for &byte in data {
        if byte == b'>' {
            break;
        }
        let nibble = match byte {
            b'0'..=b'9' => byte - b'0',
            b'a'..=b'f' => byte - b'a' + 10,
            b'A'..=b'F' => byte - b'A' + 10,
            _ => continue,
        };
        match high.take() {
            Some(h) => output.push((h << 4) | nibble),
            None => high = Some(nibble),
        }
    }
    if let Some(h) = high {
        output.push(h << 4);
    }
    output
}

pub fn decode_ascii85(data: &[u8]) -> PDFResult<Vec<u8>> {
    let mut output = Vec::with_capacity(data.len() * 4 / 5);
    let mut group = [0u8; 5];
    let mut count = 0;

    let body = data.strip_prefix(b"<~").unwrap_or(data);
    for &byte in body {
        match byte {
            b'~' => break,
            b'z' if count == 0 => output.extend_from_slice(&[0; 4]),
            b'!'..=b'u' => {
                group[count] = byte - b'!';
                count += 1;
                if count == 5 {
                    output.extend_from_slice(&ascii85_group(&group)?);
                    count = 0;
                }
            }
            _ if Lexer::is_whitespace(byte) => {}
            other => {
                return Err(PDFError::decode(
                    "ASCII85Decode",
                    format!("invalid byte 0x{:02x}", other),
                ));
            }
        }
    }

    if count > 1 {
        for slot in group.iter_mut().skip(count) {
            *slot = b'u' - b'!';
        }
        let bytes = ascii85_group(&group)?;
        output.extend_from_slice(&bytes[..count - 1]);
    }
    Ok(output)
}

fn ascii85_group(group: &[u8; 5]) -> PDFResult<[u8; 4]> {
    let value = group
        .iter()
        .try_fold(0u64, |acc, &digit| Some(acc * 85 + u64::from(digit)))
        .filter(|v| *v <= u64::from(u32::MAX))
        .ok_or_else(|| PDFError::decode("ASCII85Decode", "group out of range"))?;
    Ok((value as u32).to_be_bytes())
}

pub fn decode_run_length(data: &[u8]) -> Vec<u8> {
    let mut output = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let length = data[i];
        i += 1;
        match length {
            128 => break,
            0..=127 => {
                let count = usize::from(length) + 1;
                let end = (i + count).min(data.len());
                output.extend_from_slice(&data[i..end]);
                i = end;
            }
            _ => {
                if let Some(&byte) = data.get(i) {
                    output.extend(std::iter::repeat_n(byte, 257 - usize::from(length)));
                }
                i += 1;
            }
        }
    }
    output
}

/// LZW with 9..=12 bit codes, as used by LZWDecode.
pub fn decode_lzw(data: &[u8], early_change: bool) -> PDFResult<Vec<u8>> {
    const CLEAR: usize = 256;
    const EOD: usize = 257;

    let mut table: Vec<Vec<u8>> = (0..=255u8).map(|b| vec![b]).collect();
    table.push(Vec::new());
    table.push(Vec::new());

    let mut output = Vec::new();
    let mut code_length = 9;
    let mut bit_buffer: u32 = 0;
    let mut bits_in_buffer = 0;
    let mut previous: Option<usize> = None;

    for &byte in data {
        bit_buffer = (bit_buffer << 8) | u32::from(byte);
        bits_in_buffer += 8;

        while bits_in_buffer >= code_length {
            let code = ((bit_buffer >> (bits_in_buffer - code_length)) & ((1 << code_length) - 1)) as usize;
            bits_in_buffer -= code_length;

            if code == CLEAR {
                table.truncate(258);
                code_length = 9;
                previous = None;
                continue;
            }
            if code == EOD {
                return Ok(output);
            }

            let entry = match (code < table.len(), previous) {
                (true, _) => table[code].clone(),
                (false, Some(prev)) if code == table.len() => {
                    let mut entry = table[prev].clone();
                    entry.push(table[prev][0]);
                    entry
                }
                _ => {
                    return Err(PDFError::decode(
                        "LZWDecode",
                        format!("invalid code {}", code),
                    ));
                }
            };

            output.extend_from_slice(&entry);
            if let Some(prev) = previous {
                let mut new_entry = table[prev].clone();
                new_entry.push(entry[0]);
                table.push(new_entry);
            }
            previous = Some(code);

            let threshold = table.len() + usize::from(early_change);
            code_length = match threshold {
                0..=511 => 9,
                512..=1023 => 10,
                1024..=2047 => 11,
                _ => 12,
            };
        }
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::PDFObject;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn stream_with(filter: PDFObject, data: Vec<u8>) -> PdfStream {
        let mut dict = Dict::default();
        dict.insert("Filter".to_string(), filter);
        PdfStream::new(dict, data)
    }

    #[test]
    fn test_flate_round_trip() {
        let original = b"q 1 0 0 1 0 0 cm 0 0 10 10 re f Q";
        assert_eq!(decode_flate(&deflate(original)).unwrap(), original.to_vec());
    }

    #[test]
    fn test_corrupt_flate_is_an_error() {
        let err = decode_flate(b"definitely not zlib").unwrap_err();
        assert!(matches!(err, PDFError::Decode { .. }));
    }

    #[test]
    fn test_filter_chain() {
        let hex: String = deflate(b"BT ET").iter().map(|b| format!("{:02x}", b)).collect();
        let stream = stream_with(
            PDFObject::Array(vec![
                PDFObject::Name("ASCIIHexDecode".to_string()),
                PDFObject::Name("FlateDecode".to_string()),
            ]),
            format!("{}>", hex).into_bytes(),
        );
        let decoded = decode_stream(&stream).unwrap();
        assert_eq!(decoded.data, b"BT ET".to_vec());
        assert_eq!(decoded.codec, None);
    }

    #[test]
    fn test_image_codec_stops_chain() {
        let stream = stream_with(PDFObject::Name("DCTDecode".to_string()), vec![0xFF, 0xD8]);
        let decoded = decode_stream(&stream).unwrap();
        assert_eq!(decoded.codec.as_deref(), Some("DCTDecode"));
        assert_eq!(decoded.data, vec![0xFF, 0xD8]);
    }

    #[test]
    fn test_unsupported_filter() {
        let stream = stream_with(PDFObject::Name("Crypt".to_string()), vec![1, 2]);
        assert!(decode_stream(&stream).is_err());
    }

    #[test]
    fn test_png_up_predictor() {
        // Two rows of 3 bytes, second row uses the Up filter
        let raw = vec![0, 1, 2, 3, 2, 1, 1, 1];
        let mut parms = Dict::default();
        parms.insert("Predictor".to_string(), PDFObject::Number(12.0));
        parms.insert("Columns".to_string(), PDFObject::Number(3.0));
        let out = apply_predictor(raw, Some(&parms)).unwrap();
        assert_eq!(out, vec![1, 2, 3, 2, 3, 4]);
    }

    #[test]
    fn test_ascii85() {
        assert_eq!(decode_ascii85(b"<~87cURD]i,\"Ebo7~>").unwrap(), b"Hello World".to_vec());
        assert_eq!(decode_ascii85(b"z~>").unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_run_length() {
        assert_eq!(decode_run_length(&[2, b'a', b'b', b'c', 254, b'x', 128]), b"abcxxx".to_vec());
    }

    #[test]
    fn test_lzw_sample() {
        // Example from the PDF reference, section 7.4.4.2
        let encoded = [0x80, 0x0B, 0x60, 0x50, 0x22, 0x0C, 0x0C, 0x85, 0x01];
        assert_eq!(
            decode_lzw(&encoded, true).unwrap(),
            vec![45, 45, 45, 45, 45, 65, 45, 45, 45, 66]
        );
    }
}
