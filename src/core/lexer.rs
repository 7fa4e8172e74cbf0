use super::base_stream::BaseStream;
use super::error::{PDFError, PDFResult};
use super::stream::Stream;
use log::debug;

/// PDF syntax token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// End of input
    EOF,

    Boolean(bool),

    Null,

    /// Numeric value (integers and reals)
    Number(f64),

    /// Literal string `(...)`, escapes already resolved
    String(Vec<u8>),

    /// Hex string `<...>`, already decoded to bytes
    HexString(Vec<u8>),

    /// Name without the leading `/`, `#xx` escapes resolved
    Name(String),

    /// Operator or keyword (`q`, `Tj`, `obj`, `R`, ...)
    Command(String),

    ArrayStart,
    ArrayEnd,
    DictStart,
    DictEnd,
}

/// Operators longer than this are treated as garbage.
const MAX_COMMAND_LENGTH: usize = 128;

/// Decimal scale applied to a mantissa; anything past it is out of `f64` range.
const MAX_DECIMAL_SCALE: i64 = 400;

/// Tokenizer over a [`BaseStream`].
///
/// Forward-only, with a single byte of lookahead held in `current`. Malformed
/// input never aborts the whole stream: a bad token is reported as an `Err`
/// after the cursor has already moved past it, so the caller can log it and
/// ask for the next token.
pub struct Lexer {
    stream: Box<dyn BaseStream>,

    /// Byte under the cursor, `None` once the input is exhausted
    current: Option<u8>,

    /// Scratch buffer for strings and names
    buf: Vec<u8>,
}

impl Lexer {
    pub fn new(mut stream: Box<dyn BaseStream>) -> Self {
        let current = stream.get_byte().ok();
        Lexer {
            stream,
            current,
            buf: Vec::new(),
        }
    }

    /// Convenience constructor over an owned buffer.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::new(Box::new(Stream::from_bytes(bytes)))
    }

    /// PDF whitespace: NUL, TAB, LF, FF, CR, SPACE
    pub fn is_whitespace(ch: u8) -> bool {
        matches!(ch, 0x00 | 0x09 | 0x0A | 0x0C | 0x0D | 0x20)
    }

    /// PDF delimiters: ( ) < > [ ] { } / %
    pub fn is_delimiter(ch: u8) -> bool {
        matches!(
            ch,
            b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
        )
    }

    fn is_special(ch: u8) -> bool {
        Self::is_whitespace(ch) || Self::is_delimiter(ch)
    }

    fn hex_value(ch: u8) -> Option<u8> {
        match ch {
            b'0'..=b'9' => Some(ch - b'0'),
            b'a'..=b'f' => Some(ch - b'a' + 10),
            b'A'..=b'F' => Some(ch - b'A' + 10),
            _ => None,
        }
    }

    fn advance(&mut self) -> Option<u8> {
        self.current = self.stream.get_byte().ok();
        self.current
    }

    fn peek(&mut self) -> Option<u8> {
        self.stream.peek_byte().ok()
    }

    /// Absolute offset of the byte under the cursor.
    pub fn position(&self) -> usize {
        match self.current {
            Some(_) => self.stream.pos().saturating_sub(1),
            None => self.stream.pos(),
        }
    }

    /// Moves the cursor to an absolute offset.
    pub fn set_position(&mut self, pos: usize) -> PDFResult<()> {
        self.stream.set_pos(pos)?;
        self.current = self.stream.get_byte().ok();
        Ok(())
    }

    fn skip_whitespace_and_comments(&mut self) {
        let mut in_comment = false;
        while let Some(ch) = self.current {
            if in_comment {
                if ch == b'\n' || ch == b'\r' {
                    in_comment = false;
                }
            } else if ch == b'%' {
                in_comment = true;
            } else if !Self::is_whitespace(ch) {
                break;
            }
            self.advance();
        }
    }

    /// Returns the next token.
    pub fn get_object(&mut self) -> PDFResult<Token> {
        self.skip_whitespace_and_comments();

        let Some(ch) = self.current else {
            return Ok(Token::EOF);
        };

        match ch {
            b'0'..=b'9' | b'+' | b'-' | b'.' => Ok(self.read_number()),
            b'(' => Ok(self.read_literal_string()),
            b'/' => Ok(self.read_name()),
            b'[' => {
                self.advance();
                Ok(Token::ArrayStart)
            }
            b']' => {
                self.advance();
                Ok(Token::ArrayEnd)
            }
            b'<' => {
                if self.advance() == Some(b'<') {
                    self.advance();
                    Ok(Token::DictStart)
                } else {
                    Ok(self.read_hex_string())
                }
            }
            b'>' => {
                let pos = self.position();
                if self.advance() == Some(b'>') {
                    self.advance();
                    Ok(Token::DictEnd)
                } else {
                    Err(PDFError::syntax(pos, "stray '>'"))
                }
            }
            b'{' | b'}' => {
                self.advance();
                Ok(Token::Command((ch as char).to_string()))
            }
            b')' => {
                let pos = self.position();
                self.advance();
                Err(PDFError::syntax(pos, "unbalanced ')'"))
            }
            _ => self.read_keyword(),
        }
    }

    /// Reads a number, tolerating the forms Acrobat accepts.
    ///
    /// A sign or dot that is not followed by a digit yields `0` without
    /// consuming the next byte. A doubled leading minus and minus signs in the
    /// middle of the digits are ignored. `e`/`E` is only an exponent when a
    /// digit or sign follows, otherwise it starts the next operator.
    fn read_number(&mut self) -> Token {
        let mut ch = self.current;
        let mut negative = false;

        match ch {
            Some(b'-') => {
                negative = true;
                ch = self.advance();
                if ch == Some(b'-') {
                    ch = self.advance();
                }
            }
            Some(b'+') => ch = self.advance(),
            _ => {}
        }

        while matches!(ch, Some(b'\r' | b'\n')) {
            ch = self.advance();
        }

        let mut mantissa = 0.0_f64;
        let mut fraction_digits = 0_i32;
        let mut in_fraction = false;

        if ch == Some(b'.') {
            in_fraction = true;
            ch = self.advance();
        }

        if !matches!(ch, Some(b'0'..=b'9')) {
            return Token::Number(0.0);
        }

        let mut exponent = 0_i32;
        let mut exponent_negative = false;
        let mut in_exponent = false;

        while let Some(c) = ch {
            match c {
                b'0'..=b'9' => {
                    let digit = f64::from(c - b'0');
                    if in_exponent {
                        exponent = exponent.saturating_mul(10).saturating_add(i32::from(c - b'0'));
                    } else {
                        mantissa = mantissa * 10.0 + digit;
                        if in_fraction {
                            fraction_digits = fraction_digits.saturating_add(1);
                        }
                    }
                }
                b'.' if !in_fraction && !in_exponent => in_fraction = true,
                b'-' if !in_exponent => {}
                b'e' | b'E' if !in_exponent => match self.peek() {
                    Some(sign @ (b'+' | b'-')) => {
                        exponent_negative = sign == b'-';
                        self.advance();
                        in_exponent = true;
                    }
                    Some(b'0'..=b'9') => in_exponent = true,
                    _ => break,
                },
                _ => break,
            }
            ch = self.advance();
        }

        let exponent = i64::from(exponent);
        let scale = (if exponent_negative { -exponent } else { exponent }
            - i64::from(fraction_digits))
        .clamp(-MAX_DECIMAL_SCALE, MAX_DECIMAL_SCALE) as i32;
        let magnitude = if scale >= 0 {
            mantissa * 10_f64.powi(scale)
        } else {
            mantissa / 10_f64.powi(-scale)
        };
        if !magnitude.is_finite() {
            debug!("number out of range, read as 0");
            return Token::Number(0.0);
        }

        Token::Number(if negative { -magnitude } else { magnitude })
    }

    /// Reads a literal string with balanced parentheses and escapes.
    ///
    /// An unterminated string returns what was read up to end of input.
    fn read_literal_string(&mut self) -> Token {
        self.buf.clear();
        let mut depth = 1;
        let mut ch = self.advance();

        while let Some(c) = ch {
            let mut lookahead_held = false;
            match c {
                b'(' => {
                    depth += 1;
                    self.buf.push(c);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        break;
                    }
                    self.buf.push(c);
                }
                b'\\' => {
                    let Some(escaped) = self.advance() else {
                        break;
                    };
                    match escaped {
                        b'n' => self.buf.push(b'\n'),
                        b'r' => self.buf.push(b'\r'),
                        b't' => self.buf.push(b'\t'),
                        b'b' => self.buf.push(0x08),
                        b'f' => self.buf.push(0x0C),
                        b'0'..=b'7' => {
                            let mut value = u32::from(escaped - b'0');
                            let mut digits = 1;
                            while digits < 3 {
                                match self.advance() {
                                    Some(d @ b'0'..=b'7') => {
                                        value = value * 8 + u32::from(d - b'0');
                                        digits += 1;
                                    }
                                    _ => {
                                        lookahead_held = true;
                                        break;
                                    }
                                }
                            }
                            self.buf.push((value & 0xFF) as u8);
                        }
                        // Line continuation
                        b'\r' => {
                            if self.peek() == Some(b'\n') {
                                self.advance();
                            }
                        }
                        b'\n' => {}
                        other => self.buf.push(other),
                    }
                }
                _ => self.buf.push(c),
            }

            ch = if lookahead_held {
                self.current
            } else {
                self.advance()
            };
        }

        Token::String(self.buf.clone())
    }

    /// Reads a hex string. Whitespace and non-hex bytes are skipped, an odd
    /// trailing digit is padded with zero.
    fn read_hex_string(&mut self) -> Token {
        self.buf.clear();
        let mut high: Option<u8> = None;

        while let Some(c) = self.current {
            if c == b'>' {
                self.advance();
                break;
            }
            if let Some(nibble) = Self::hex_value(c) {
                match high.take() {
                    Some(h) => self.buf.push((h << 4) | nibble),
                    None => high = Some(nibble),
                }
            }
            self.advance();
        }

        if let Some(h) = high {
            self.buf.push(h << 4);
        }

        Token::HexString(self.buf.clone())
    }

    /// Reads a name, resolving `#xx` escapes. A `#` not followed by two hex
    /// digits is kept literally.
    fn read_name(&mut self) -> Token {
        self.buf.clear();
        let mut ch = self.advance();

        while let Some(c) = ch {
            if Self::is_special(c) {
                break;
            }
            if c == b'#' {
                let first = self.advance();
                match first.and_then(Self::hex_value) {
                    Some(high) => {
                        let second = self.advance();
                        match second.and_then(Self::hex_value) {
                            Some(low) => {
                                self.buf.push((high << 4) | low);
                                ch = self.advance();
                            }
                            None => {
                                self.buf.push(b'#');
                                self.buf.push(first.unwrap_or(b'#'));
                                ch = second;
                            }
                        }
                    }
                    None => {
                        self.buf.push(b'#');
                        ch = first;
                    }
                }
                continue;
            }
            self.buf.push(c);
            ch = self.advance();
        }

        Token::Name(String::from_utf8_lossy(&self.buf).into_owned())
    }

    fn read_keyword(&mut self) -> PDFResult<Token> {
        let start = self.position();
        let mut word = String::new();
        let mut too_long = false;

        while let Some(c) = self.current {
            if Self::is_special(c) {
                break;
            }
            if word.len() < MAX_COMMAND_LENGTH {
                word.push(c as char);
            } else {
                too_long = true;
            }
            self.advance();
        }

        if too_long {
            return Err(PDFError::syntax(start, "operator token too long"));
        }

        Ok(match word.as_str() {
            "true" => Token::Boolean(true),
            "false" => Token::Boolean(false),
            "null" => Token::Null,
            _ => Token::Command(word),
        })
    }

    /// Reads inline image samples following the `ID` operator.
    ///
    /// The single whitespace byte after `ID` is skipped, then bytes are taken
    /// verbatim up to a whitespace-delimited `EI`. The `EI` is consumed.
    pub fn read_inline_image_data(&mut self) -> Vec<u8> {
        if self.current.is_some_and(Self::is_whitespace) {
            self.advance();
        }

        let mut data = Vec::new();
        while let Some(byte) = self.current {
            data.push(byte);
            self.advance();

            let n = data.len();
            let ends_with_ei = n >= 2 && data[n - 2..] == *b"EI";
            let delimited_before = n == 2 || (n > 2 && Self::is_whitespace(data[n - 3]));
            let delimited_after = self.current.is_none_or(Self::is_special);
            if ends_with_ei && delimited_before && delimited_after {
                data.truncate(n.saturating_sub(3));
                return data;
            }
        }
        data
    }

    /// Reads the body of a `stream ... endstream` object.
    ///
    /// Called with the cursor right after the `stream` keyword. When `length`
    /// is known and is followed by `endstream` it is trusted, otherwise the
    /// body is recovered by scanning for the `endstream` keyword. The trailing
    /// `endstream` is consumed either way.
    pub fn read_stream_body(&mut self, length: Option<usize>) -> Vec<u8> {
        while self.current == Some(b' ') {
            self.advance();
        }
        if self.current == Some(b'\r') {
            self.advance();
        }
        if self.current == Some(b'\n') {
            self.advance();
        }

        let data_start = self.position();

        if let Some(length) = length {
            let mut data = Vec::with_capacity(length);
            while data.len() < length {
                let Some(byte) = self.current else { break };
                data.push(byte);
                self.advance();
            }
            self.skip_whitespace_and_comments();
            if self.matches_ahead(b"endstream") {
                self.consume(b"endstream".len());
                return data;
            }
            if self.set_position(data_start).is_err() {
                return data;
            }
        }

        const MARKER: &[u8] = b"endstream";
        let mut data = Vec::new();
        while let Some(byte) = self.current {
            data.push(byte);
            self.advance();
            if data.ends_with(MARKER) {
                data.truncate(data.len() - MARKER.len());
                if data.last() == Some(&b'\n') {
                    data.pop();
                }
                if data.last() == Some(&b'\r') {
                    data.pop();
                }
                break;
            }
        }
        data
    }

    fn matches_ahead(&mut self, word: &[u8]) -> bool {
        let Some((first, rest)) = word.split_first() else {
            return true;
        };
        if self.current != Some(*first) {
            return false;
        }
        let saved = self.stream.pos();
        let matched = self
            .stream
            .get_bytes(rest.len())
            .map(|bytes| bytes == rest)
            .unwrap_or(false);
        let _ = self.stream.set_pos(saved);
        matched
    }

    fn consume(&mut self, count: usize) {
        for _ in 0..count {
            if self.advance().is_none() {
                break;
            }
        }
    }
}
