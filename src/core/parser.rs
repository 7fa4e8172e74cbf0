use super::error::{PDFError, PDFResult};
use super::lexer::{Lexer, Token};
use log::debug;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// Dictionary of PDF objects keyed by name (without the `/`).
pub type Dict = FxHashMap<String, PDFObject>;

/// Indirect object identifier (`num gen R`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjRef {
    pub num: u32,
    pub generation: u32,
}

impl ObjRef {
    pub fn new(num: u32, generation: u32) -> Self {
        ObjRef { num, generation }
    }
}

impl fmt::Display for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.num, self.generation)
    }
}

/// A stream object: dictionary plus raw (still encoded) bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfStream {
    pub dict: Dict,
    pub data: Vec<u8>,
    /// Set when the stream was loaded as an indirect object; used as the
    /// decode cache key and for form recursion detection.
    pub obj_ref: Option<ObjRef>,
}

impl PdfStream {
    pub fn new(dict: Dict, data: Vec<u8>) -> Self {
        PdfStream {
            dict,
            data,
            obj_ref: None,
        }
    }

    /// Filter names in application order.
    pub fn filters(&self) -> Vec<&str> {
        match self.dict.get("Filter") {
            Some(PDFObject::Name(name)) => vec![name.as_str()],
            Some(PDFObject::Array(items)) => items.iter().filter_map(|o| o.as_name()).collect(),
            _ => Vec::new(),
        }
    }

    /// Decode parameters matching each entry of [`filters`](Self::filters).
    pub fn decode_parms(&self) -> Vec<Option<&Dict>> {
        let count = self.filters().len();
        match self.dict.get("DecodeParms") {
            Some(PDFObject::Dictionary(d)) => {
                let mut parms = vec![None; count];
                if let Some(first) = parms.first_mut() {
                    *first = Some(d);
                }
                parms
            }
            Some(PDFObject::Array(items)) => (0..count)
                .map(|i| items.get(i).and_then(|o| o.as_dict()))
                .collect(),
            _ => vec![None; count],
        }
    }
}

/// PDF object model.
#[derive(Debug, Clone, PartialEq)]
pub enum PDFObject {
    Null,
    Boolean(bool),
    Number(f64),
    String(Vec<u8>),
    HexString(Vec<u8>),
    Name(String),
    Array(Vec<PDFObject>),
    Dictionary(Dict),
    Stream(Arc<PdfStream>),
    Ref(ObjRef),
    EOF,
    /// Keyword that is not part of the object syntax (content stream operator)
    Command(String),
}

impl PDFObject {
    pub fn is_null(&self) -> bool {
        matches!(self, PDFObject::Null)
    }

    pub fn is_eof(&self) -> bool {
        matches!(self, PDFObject::EOF)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PDFObject::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_f64().map(|n| n as i64)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PDFObject::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            PDFObject::Name(name) => Some(name),
            _ => None,
        }
    }

    /// Bytes of a literal or hex string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            PDFObject::String(bytes) | PDFObject::HexString(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[PDFObject]> {
        match self {
            PDFObject::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Dictionary of a dictionary or of a stream.
    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            PDFObject::Dictionary(dict) => Some(dict),
            PDFObject::Stream(stream) => Some(&stream.dict),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&Arc<PdfStream>> {
        match self {
            PDFObject::Stream(stream) => Some(stream),
            _ => None,
        }
    }

    pub fn as_obj_ref(&self) -> Option<ObjRef> {
        match self {
            PDFObject::Ref(r) => Some(*r),
            _ => None,
        }
    }

    /// Numbers of an all-numeric array.
    pub fn as_number_array(&self) -> Option<Vec<f64>> {
        self.as_array()?.iter().map(|o| o.as_f64()).collect()
    }
}

/// Builds objects from tokens with a two-token lookahead, which is what it
/// takes to recognise `num gen R` and `<< ... >> stream`.
///
/// Used for object bodies in a file. Content streams are read by
/// [`ContentStreamReader`](super::content_stream::ContentStreamReader), which
/// must not look ahead past `ID`.
pub struct Parser {
    lexer: Lexer,
    buf1: Token,
    buf2: Token,
}

impl Parser {
    pub fn new(mut lexer: Lexer) -> Self {
        let buf1 = Self::next_token(&mut lexer);
        let buf2 = Self::next_token(&mut lexer);
        Parser { lexer, buf1, buf2 }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::new(Lexer::from_bytes(bytes))
    }

    /// Next well-formed token; malformed ones are logged and skipped.
    fn next_token(lexer: &mut Lexer) -> Token {
        loop {
            match lexer.get_object() {
                Ok(token) => return token,
                Err(e) => debug!("skipping malformed token: {}", e),
            }
        }
    }

    fn shift(&mut self) -> Token {
        let next = Self::next_token(&mut self.lexer);
        let buf2 = std::mem::replace(&mut self.buf2, next);
        std::mem::replace(&mut self.buf1, buf2)
    }

    pub fn has_more(&self) -> bool {
        self.buf1 != Token::EOF
    }

    /// Parses the next object.
    pub fn get_object(&mut self) -> PDFResult<PDFObject> {
        match self.shift() {
            Token::ArrayStart => self.parse_array(),
            Token::DictStart => self.parse_dictionary(),
            Token::ArrayEnd => Err(PDFError::Generic("Unexpected array end token".to_string())),
            Token::DictEnd => Err(PDFError::Generic(
                "Unexpected dictionary end token".to_string(),
            )),
            Token::Number(n) => {
                if let (Token::Number(generation), Token::Command(cmd)) = (&self.buf1, &self.buf2) {
                    if cmd == "R" && n >= 0.0 && *generation >= 0.0 {
                        let obj_ref = ObjRef::new(n as u32, *generation as u32);
                        self.shift();
                        self.shift();
                        return Ok(PDFObject::Ref(obj_ref));
                    }
                }
                Ok(PDFObject::Number(n))
            }
            Token::EOF => Ok(PDFObject::EOF),
            Token::Boolean(b) => Ok(PDFObject::Boolean(b)),
            Token::Null => Ok(PDFObject::Null),
            Token::String(s) => Ok(PDFObject::String(s)),
            Token::HexString(s) => Ok(PDFObject::HexString(s)),
            Token::Name(n) => Ok(PDFObject::Name(n)),
            Token::Command(c) => Ok(PDFObject::Command(c)),
        }
    }

    /// Parses `num gen obj <object> [endobj]`.
    pub fn get_indirect_object(&mut self) -> PDFResult<(ObjRef, PDFObject)> {
        let num = match self.shift() {
            Token::Number(n) if n >= 0.0 => n as u32,
            other => {
                return Err(PDFError::Generic(format!(
                    "Expected object number, found {:?}",
                    other
                )));
            }
        };
        let generation = match self.shift() {
            Token::Number(n) if n >= 0.0 => n as u32,
            other => {
                return Err(PDFError::Generic(format!(
                    "Expected generation number, found {:?}",
                    other
                )));
            }
        };
        match self.shift() {
            Token::Command(cmd) if cmd == "obj" => {}
            other => {
                return Err(PDFError::Generic(format!(
                    "Expected 'obj' keyword, found {:?}",
                    other
                )));
            }
        }

        let obj_ref = ObjRef::new(num, generation);
        let mut object = self.get_object()?;
        if let PDFObject::Stream(stream) = &mut object {
            if let Some(stream) = Arc::get_mut(stream) {
                stream.obj_ref = Some(obj_ref);
            }
        }
        if matches!(&self.buf1, Token::Command(cmd) if cmd == "endobj") {
            self.shift();
        }
        Ok((obj_ref, object))
    }

    fn parse_array(&mut self) -> PDFResult<PDFObject> {
        let mut items = Vec::new();
        loop {
            match &self.buf1 {
                Token::ArrayEnd => {
                    self.shift();
                    break;
                }
                Token::EOF => {
                    debug!("unterminated array, keeping {} items", items.len());
                    break;
                }
                Token::DictEnd => {
                    // Stray '>>' inside an array
                    self.shift();
                }
                _ => items.push(self.get_object()?),
            }
        }
        Ok(PDFObject::Array(items))
    }

    fn parse_dictionary(&mut self) -> PDFResult<PDFObject> {
        let mut dict = Dict::default();

        loop {
            let key = match &self.buf1 {
                Token::DictEnd => break,
                Token::EOF => {
                    return Err(PDFError::Generic(
                        "Unterminated dictionary (missing '>>')".to_string(),
                    ));
                }
                Token::Name(name) => name.clone(),
                other => {
                    debug!("skipping non-name dictionary key {:?}", other);
                    self.shift();
                    continue;
                }
            };
            self.shift();

            if matches!(self.buf1, Token::DictEnd | Token::EOF) {
                dict.insert(key, PDFObject::Null);
                continue;
            }

            let value = match self.get_object() {
                Ok(value) => value,
                Err(e) => {
                    debug!("bad value for /{}: {}, using null", key, e);
                    PDFObject::Null
                }
            };
            dict.insert(key, value);
        }

        // buf1 is '>>'. If buf2 is `stream`, the lexer sits right after the
        // keyword and the body must be read raw before refilling the buffers.
        if matches!(&self.buf2, Token::Command(cmd) if cmd == "stream") {
            let length = dict
                .get("Length")
                .and_then(|len| len.as_f64())
                .filter(|len| *len >= 0.0)
                .map(|len| len as usize);
            let data = self.lexer.read_stream_body(length);
            self.buf1 = Self::next_token(&mut self.lexer);
            self.buf2 = Self::next_token(&mut self.lexer);
            return Ok(PDFObject::Stream(Arc::new(PdfStream::new(dict, data))));
        }

        self.shift();
        Ok(PDFObject::Dictionary(dict))
    }
}
