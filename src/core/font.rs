//! Font metrics and text decoding.
//!
//! Glyph outlines are a device concern. A `Font` only knows what the
//! content parser needs: how to split a string into character codes, how far
//! each code advances, and how to turn codes into Unicode.

use super::cmap::CMap;
use super::library::Library;
use super::parser::{Dict, PDFObject};
use crate::rendering::matrix::Matrix;
use log::debug;
use rustc_hash::FxHashMap;

/// Glyph width used when a simple font carries no `/Widths` at all.
pub const FALLBACK_WIDTH: f64 = 500.0;

/// PDF font type, from `/Subtype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontType {
    Type1,
    MMType1,
    TrueType,
    /// Glyphs are content streams
    Type3,
    /// Composite font over a CIDFont
    Type0,
    Unknown,
}

impl FontType {
    pub fn from_subtype(subtype: &str) -> Self {
        match subtype {
            "Type1" => FontType::Type1,
            "MMType1" => FontType::MMType1,
            "TrueType" => FontType::TrueType,
            "Type3" => FontType::Type3,
            "Type0" => FontType::Type0,
            _ => FontType::Unknown,
        }
    }

    pub fn is_composite(self) -> bool {
        self == FontType::Type0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Font {
    /// Resource name the font was looked up under
    pub name: String,
    pub font_type: FontType,
    pub base_font: String,
    first_char: u32,
    /// Widths in glyph space (thousandths of text space, except Type3)
    widths: Vec<f64>,
    missing_width: f64,
    has_widths: bool,
    /// `/W` of the descendant CIDFont
    cid_widths: FxHashMap<u32, f64>,
    /// `/DW` of the descendant CIDFont
    default_cid_width: f64,
    /// Glyph space to text space; `[0.001 0 0 0.001 0 0]` except for Type3
    pub font_matrix: Matrix,
    to_unicode: Option<CMap>,
}

impl Font {
    /// Builds a font from its dictionary. Missing entries fall back to
    /// defaults, so this never fails.
    pub fn from_dict(library: &Library, name: &str, dict: &Dict) -> Font {
        let font_type = FontType::from_subtype(library.get_name(dict, "Subtype").unwrap_or(""));
        let base_font = library
            .get_name(dict, "BaseFont")
            .unwrap_or("Unknown")
            .to_string();

        let font_matrix = match font_type {
            FontType::Type3 => library
                .get_matrix(dict, "FontMatrix")
                .unwrap_or(Matrix::scale(0.001, 0.001)),
            _ => Matrix::scale(0.001, 0.001),
        };

        let widths = library.get_number_array(dict, "Widths");
        let missing_width = library
            .get_dictionary(dict, "FontDescriptor")
            .and_then(|descriptor| library.get_number(descriptor, "MissingWidth"))
            .unwrap_or(0.0);

        let mut font = Font {
            name: name.to_string(),
            font_type,
            base_font,
            first_char: library
                .get_int(dict, "FirstChar")
                .map_or(0, |n| n.max(0) as u32),
            has_widths: widths.is_some(),
            widths: widths.unwrap_or_default(),
            missing_width,
            cid_widths: FxHashMap::default(),
            default_cid_width: 1000.0,
            font_matrix,
            to_unicode: library
                .get_stream(dict, "ToUnicode")
                .and_then(|stream| library.decode_stream(stream).ok())
                .map(|decoded| CMap::parse(&decoded.data)),
        };

        if font_type.is_composite() {
            font.read_descendant(library, dict);
        }
        font
    }

    fn read_descendant(&mut self, library: &Library, dict: &Dict) {
        let Some(descendant) = library
            .get_array(dict, "DescendantFonts")
            .and_then(|fonts| fonts.first())
            .and_then(|font| library.resolve(font).as_dict())
        else {
            debug!("Type0 font {} without descendant", self.base_font);
            return;
        };
        if let Some(dw) = library.get_number(descendant, "DW") {
            self.default_cid_width = dw;
        }
        let Some(w) = library.get_array(descendant, "W") else {
            return;
        };

        // Entries are `c [w1 w2 ...]` or `c_first c_last w`.
        let mut i = 0;
        while i < w.len() {
            let Some(first) = library.resolve(&w[i]).as_f64().map(|n| n as u32) else {
                break;
            };
            match w.get(i + 1).map(|o| library.resolve(o)) {
                Some(PDFObject::Array(list)) => {
                    for (offset, width) in list.iter().enumerate() {
                        if let Some(width) = library.resolve(width).as_f64() {
                            self.cid_widths.insert(first + offset as u32, width);
                        }
                    }
                    i += 2;
                }
                Some(PDFObject::Number(last)) => {
                    let Some(width) = w.get(i + 2).and_then(|o| library.resolve(o).as_f64())
                    else {
                        break;
                    };
                    for cid in first..=(*last as u32).min(first.saturating_add(0xFFFF)) {
                        self.cid_widths.insert(cid, width);
                    }
                    i += 3;
                }
                _ => break,
            }
        }
    }

    /// Splits a shown string into character codes.
    pub fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.font_type.is_composite() {
            bytes
                .chunks(2)
                .map(|pair| pair.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32))
                .collect()
        } else {
            bytes.iter().map(|&b| b as u32).collect()
        }
    }

    /// Horizontal advance of `code` in text space units (per unit font size).
    pub fn advance(&self, code: u32) -> f64 {
        if self.font_type.is_composite() {
            let width = self
                .cid_widths
                .get(&code)
                .copied()
                .unwrap_or(self.default_cid_width);
            return width / 1000.0;
        }
        let glyph_width = if self.has_widths {
            code.checked_sub(self.first_char)
                .and_then(|index| self.widths.get(index as usize))
                .copied()
                .unwrap_or(self.missing_width)
        } else {
            FALLBACK_WIDTH
        };
        match self.font_type {
            FontType::Type3 => self.font_matrix.transform_vector(glyph_width, 0.0).0,
            _ => glyph_width / 1000.0,
        }
    }

    /// Word spacing applies to single-byte code 32 only.
    pub fn is_word_space(&self, code: u32) -> bool {
        code == 32 && !self.font_type.is_composite()
    }

    /// Unicode text for a shown string: ToUnicode first, then WinAnsi for
    /// simple fonts.
    pub fn decode_text(&self, bytes: &[u8]) -> String {
        self.codes(bytes)
            .into_iter()
            .map(|code| match self.to_unicode.as_ref().and_then(|m| m.lookup(code)) {
                Some(text) => text.to_string(),
                None if self.font_type.is_composite() => char::from_u32(code)
                    .unwrap_or(char::REPLACEMENT_CHARACTER)
                    .to_string(),
                None => win_ansi_char(code as u8).to_string(),
            })
            .collect()
    }
}

/// Text decoding used when no font resolved for `Tf`.
pub fn decode_without_font(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| win_ansi_char(b)).collect()
}

/// WinAnsiEncoding: Latin-1 with the Windows-1252 block at 0x80..0x9F.
fn win_ansi_char(byte: u8) -> char {
    const HIGH: [char; 32] = [
        '€', '\u{FFFD}', '‚', 'ƒ', '„', '…', '†', '‡', 'ˆ', '‰', 'Š', '‹', 'Œ', '\u{FFFD}', 'Ž',
        '\u{FFFD}', '\u{FFFD}', '‘', '’', '“', '”', '•', '–', '—', '˜', '™', 'š', '›', 'œ',
        '\u{FFFD}', 'ž', 'Ÿ',
    ];
    match byte {
        0x80..=0x9F => HIGH[(byte - 0x80) as usize],
        _ => byte as char,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::Parser;

    fn font(source: &str) -> Font {
        let object = Parser::from_bytes(source.as_bytes().to_vec())
            .get_object()
            .unwrap();
        Font::from_dict(&Library::default(), "F1", object.as_dict().unwrap())
    }

    #[test]
    fn test_simple_widths() {
        let font = font(
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /FirstChar 65 /Widths [600 700] \
             /FontDescriptor << /MissingWidth 250 >> >>",
        );
        assert_eq!(font.font_type, FontType::Type1);
        assert_eq!(font.advance(65), 0.6);
        assert_eq!(font.advance(66), 0.7);
        assert_eq!(font.advance(67), 0.25);
        assert_eq!(font.advance(10), 0.25);
        assert_eq!(font.codes(b"AB"), vec![65, 66]);
    }

    #[test]
    fn test_fallback_width_without_widths() {
        let font = font("<< /Subtype /TrueType /BaseFont /Arial >>");
        assert_eq!(font.advance(65), 0.5);
        assert!(font.is_word_space(32));
    }

    #[test]
    fn test_type0_widths() {
        let font = font(
            "<< /Subtype /Type0 /BaseFont /Foo /Encoding /Identity-H \
             /DescendantFonts [<< /Subtype /CIDFontType2 /DW 800 /W [1 [500 600] 10 12 300] >>] >>",
        );
        assert_eq!(font.codes(&[0x00, 0x01, 0x00, 0x0B]), vec![1, 11]);
        assert_eq!(font.advance(1), 0.5);
        assert_eq!(font.advance(2), 0.6);
        assert_eq!(font.advance(11), 0.3);
        assert_eq!(font.advance(99), 0.8);
        assert!(!font.is_word_space(32));
    }

    #[test]
    fn test_type3_font_matrix() {
        let font = font(
            "<< /Subtype /Type3 /FontMatrix [0.01 0 0 0.01 0 0] /FirstChar 0 /Widths [50] >>",
        );
        assert_eq!(font.advance(0), 0.5);
    }

    #[test]
    fn test_win_ansi_text() {
        let font = font("<< /Subtype /Type1 /BaseFont /Times-Roman >>");
        assert_eq!(font.decode_text(b"Caf\xE9 \x80"), "Café €");
        assert_eq!(decode_without_font(b"\x93hi\x94"), "“hi”");
    }
}
