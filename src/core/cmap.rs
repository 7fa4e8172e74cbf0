//! `/ToUnicode` CMaps.
//!
//! Only the `bfchar` and `bfrange` sections matter for text decoding; the
//! stream is tokenized with the regular [`Lexer`] so entries may be laid out
//! on any number of lines.

use super::lexer::{Lexer, Token};
use log::debug;
use rustc_hash::FxHashMap;

/// Character code to Unicode string mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CMap {
    mappings: FxHashMap<u32, String>,
}

impl CMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a decoded ToUnicode stream. Malformed entries are skipped.
    pub fn parse(data: &[u8]) -> Self {
        let mut cmap = CMap::new();
        let mut lexer = Lexer::from_bytes(data.to_vec());
        let mut operands: Vec<Token> = Vec::new();

        loop {
            let token = match lexer.get_object() {
                Ok(Token::EOF) => break,
                Ok(token) => token,
                Err(e) => {
                    debug!("skipping bad CMap token: {}", e);
                    continue;
                }
            };
            match token {
                Token::Command(cmd) if cmd == "endbfchar" => {
                    for pair in operands.chunks_exact(2) {
                        if let (Token::HexString(src), Token::HexString(dst)) = (&pair[0], &pair[1])
                        {
                            cmap.mappings.insert(code_of(src), utf16_to_string(dst));
                        }
                    }
                    operands.clear();
                }
                Token::Command(cmd) if cmd == "endbfrange" => {
                    cmap.read_ranges(&operands);
                    operands.clear();
                }
                Token::Command(_) => operands.clear(),
                other => operands.push(other),
            }
        }
        cmap
    }

    fn read_ranges(&mut self, operands: &[Token]) {
        let mut items = operands.iter();
        while let (Some(Token::HexString(lo)), Some(Token::HexString(hi)), Some(dst)) =
            (items.next(), items.next(), items.next())
        {
            let (lo, hi) = (code_of(lo), code_of(hi));
            if hi < lo || hi - lo > 0xFFFF {
                continue;
            }
            match dst {
                Token::HexString(start) => {
                    let base = utf16_to_string(start);
                    let mut chars: Vec<char> = base.chars().collect();
                    for code in lo..=hi {
                        self.mappings.insert(code, chars.iter().collect());
                        if let Some(last) = chars.last_mut() {
                            *last = char::from_u32(*last as u32 + 1).unwrap_or(*last);
                        }
                    }
                }
                Token::ArrayStart => {
                    let mut code = lo;
                    for item in items.by_ref() {
                        match item {
                            Token::ArrayEnd => break,
                            Token::HexString(dst) if code <= hi => {
                                self.mappings.insert(code, utf16_to_string(dst));
                                code += 1;
                            }
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }
    }

    pub fn lookup(&self, code: u32) -> Option<&str> {
        self.mappings.get(&code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

fn code_of(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32)
}

fn utf16_to_string(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [single] => *single as u16,
            _ => 0,
        })
        .collect();
    String::from_utf16_lossy(&units)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bfchar() {
        let cmap = CMap::parse(b"2 beginbfchar\n<0003> <0020>\n<0005> <0041>\nendbfchar\n");
        assert_eq!(cmap.lookup(3), Some(" "));
        assert_eq!(cmap.lookup(5), Some("A"));
        assert_eq!(cmap.lookup(4), None);
    }

    #[test]
    fn test_bfrange_increment_and_array() {
        let cmap = CMap::parse(
            b"2 beginbfrange <10> <12> <0030> <20> <21> [<0041> <00660066>] endbfrange",
        );
        assert_eq!(cmap.lookup(0x10), Some("0"));
        assert_eq!(cmap.lookup(0x12), Some("2"));
        assert_eq!(cmap.lookup(0x20), Some("A"));
        assert_eq!(cmap.lookup(0x21), Some("ff"));
        assert_eq!(cmap.len(), 5);
    }

    #[test]
    fn test_full_cmap_program() {
        let data = b"/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n\
            /CMapName /Adobe-Identity-UCS def\n1 begincodespacerange\n<0000> <FFFF>\n\
            endcodespacerange\n1 beginbfchar\n<0001> <D835DC00>\nendbfchar\nendcmap\n";
        let cmap = CMap::parse(data);
        assert_eq!(cmap.lookup(1), Some("\u{1D400}"));
        assert_eq!(cmap.len(), 1);
    }
}
