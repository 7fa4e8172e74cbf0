//! Content stream operators and the operand/operator reader.
//!
//! [`ContentStreamReader`] turns a token sequence into [`Operation`]s.
//! Operands accumulate until an operator arrives; the operator then takes
//! the operands it needs from the top of the stack and the stack is cleared.
//! Operators with too few operands and unknown operators are dropped here,
//! so the interpreter only ever sees well-sized operations.

use super::lexer::{Lexer, Token};
use super::parser::{Dict, PDFObject, PdfStream};
use log::{debug, trace};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Content stream operators (PDF 32000-1, Annex A).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    // Graphics state
    SetLineWidth,
    SetLineCap,
    SetLineJoin,
    SetMiterLimit,
    SetDash,
    SetRenderingIntent,
    SetFlatness,
    SetGState,
    Save,
    Restore,
    Transform,

    // Path construction
    MoveTo,
    LineTo,
    CurveTo,
    /// `v`, first control point is the current point
    CurveTo2,
    /// `y`, second control point is the end point
    CurveTo3,
    ClosePath,
    Rectangle,

    // Path painting
    Stroke,
    CloseStroke,
    Fill,
    EOFill,
    FillStroke,
    EOFillStroke,
    CloseFillStroke,
    CloseEOFillStroke,
    EndPath,
    Clip,
    EOClip,

    // Text
    BeginText,
    EndText,
    SetCharSpacing,
    SetWordSpacing,
    SetHScale,
    SetLeading,
    SetFont,
    SetTextRenderingMode,
    SetTextRise,
    MoveText,
    SetLeadingMoveText,
    SetTextMatrix,
    NextLine,
    ShowText,
    ShowSpacedText,
    NextLineShowText,
    NextLineSetSpacingShowText,

    // Type 3 glyph metrics
    SetCharWidth,
    SetCharWidthAndBounds,

    // Colour
    SetStrokeColorSpace,
    SetFillColorSpace,
    SetStrokeColor,
    SetStrokeColorN,
    SetFillColor,
    SetFillColorN,
    SetStrokeGray,
    SetFillGray,
    SetStrokeRGBColor,
    SetFillRGBColor,
    SetStrokeCMYKColor,
    SetFillCMYKColor,

    ShadingFill,

    /// `BI ... ID ... EI`, delivered as one operation carrying the image
    InlineImage,
    PaintXObject,

    // Marked content
    MarkPoint,
    MarkPointProps,
    BeginMarkedContent,
    BeginMarkedContentProps,
    EndMarkedContent,

    // Compatibility sections
    BeginCompat,
    EndCompat,
}

impl OpCode {
    pub fn from_command(cmd: &str) -> Option<OpCode> {
        use OpCode::*;
        Some(match cmd {
            "w" => SetLineWidth,
            "J" => SetLineCap,
            "j" => SetLineJoin,
            "M" => SetMiterLimit,
            "d" => SetDash,
            "ri" => SetRenderingIntent,
            "i" => SetFlatness,
            "gs" => SetGState,
            "q" => Save,
            "Q" => Restore,
            "cm" => Transform,
            "m" => MoveTo,
            "l" => LineTo,
            "c" => CurveTo,
            "v" => CurveTo2,
            "y" => CurveTo3,
            "h" => ClosePath,
            "re" => Rectangle,
            "S" => Stroke,
            "s" => CloseStroke,
            "f" | "F" => Fill,
            "f*" => EOFill,
            "B" => FillStroke,
            "B*" => EOFillStroke,
            "b" => CloseFillStroke,
            "b*" => CloseEOFillStroke,
            "n" => EndPath,
            "W" => Clip,
            "W*" => EOClip,
            "BT" => BeginText,
            "ET" => EndText,
            "Tc" => SetCharSpacing,
            "Tw" => SetWordSpacing,
            "Tz" => SetHScale,
            "TL" => SetLeading,
            "Tf" => SetFont,
            "Tr" => SetTextRenderingMode,
            "Ts" => SetTextRise,
            "Td" => MoveText,
            "TD" => SetLeadingMoveText,
            "Tm" => SetTextMatrix,
            "T*" => NextLine,
            "Tj" => ShowText,
            "TJ" => ShowSpacedText,
            "'" => NextLineShowText,
            "\"" => NextLineSetSpacingShowText,
            "d0" => SetCharWidth,
            "d1" => SetCharWidthAndBounds,
            "CS" => SetStrokeColorSpace,
            "cs" => SetFillColorSpace,
            "SC" => SetStrokeColor,
            "SCN" => SetStrokeColorN,
            "sc" => SetFillColor,
            "scn" => SetFillColorN,
            "G" => SetStrokeGray,
            "g" => SetFillGray,
            "RG" => SetStrokeRGBColor,
            "rg" => SetFillRGBColor,
            "K" => SetStrokeCMYKColor,
            "k" => SetFillCMYKColor,
            "sh" => ShadingFill,
            "BI" => InlineImage,
            "Do" => PaintXObject,
            "MP" => MarkPoint,
            "DP" => MarkPointProps,
            "BMC" => BeginMarkedContent,
            "BDC" => BeginMarkedContentProps,
            "EMC" => EndMarkedContent,
            "BX" => BeginCompat,
            "EX" => EndCompat,
            _ => return None,
        })
    }

    pub fn to_command(self) -> &'static str {
        use OpCode::*;
        match self {
            SetLineWidth => "w",
            SetLineCap => "J",
            SetLineJoin => "j",
            SetMiterLimit => "M",
            SetDash => "d",
            SetRenderingIntent => "ri",
            SetFlatness => "i",
            SetGState => "gs",
            Save => "q",
            Restore => "Q",
            Transform => "cm",
            MoveTo => "m",
            LineTo => "l",
            CurveTo => "c",
            CurveTo2 => "v",
            CurveTo3 => "y",
            ClosePath => "h",
            Rectangle => "re",
            Stroke => "S",
            CloseStroke => "s",
            Fill => "f",
            EOFill => "f*",
            FillStroke => "B",
            EOFillStroke => "B*",
            CloseFillStroke => "b",
            CloseEOFillStroke => "b*",
            EndPath => "n",
            Clip => "W",
            EOClip => "W*",
            BeginText => "BT",
            EndText => "ET",
            SetCharSpacing => "Tc",
            SetWordSpacing => "Tw",
            SetHScale => "Tz",
            SetLeading => "TL",
            SetFont => "Tf",
            SetTextRenderingMode => "Tr",
            SetTextRise => "Ts",
            MoveText => "Td",
            SetLeadingMoveText => "TD",
            SetTextMatrix => "Tm",
            NextLine => "T*",
            ShowText => "Tj",
            ShowSpacedText => "TJ",
            NextLineShowText => "'",
            NextLineSetSpacingShowText => "\"",
            SetCharWidth => "d0",
            SetCharWidthAndBounds => "d1",
            SetStrokeColorSpace => "CS",
            SetFillColorSpace => "cs",
            SetStrokeColor => "SC",
            SetStrokeColorN => "SCN",
            SetFillColor => "sc",
            SetFillColorN => "scn",
            SetStrokeGray => "G",
            SetFillGray => "g",
            SetStrokeRGBColor => "RG",
            SetFillRGBColor => "rg",
            SetStrokeCMYKColor => "K",
            SetFillCMYKColor => "k",
            ShadingFill => "sh",
            InlineImage => "BI",
            PaintXObject => "Do",
            MarkPoint => "MP",
            MarkPointProps => "DP",
            BeginMarkedContent => "BMC",
            BeginMarkedContentProps => "BDC",
            EndMarkedContent => "EMC",
            BeginCompat => "BX",
            EndCompat => "EX",
        }
    }

    /// Number of operands the operator consumes; `None` for the colour
    /// operators that take as many as the colour space needs.
    pub fn arity(self) -> Option<usize> {
        use OpCode::*;
        Some(match self {
            SetStrokeColor | SetStrokeColorN | SetFillColor | SetFillColorN => return None,
            Save | Restore | ClosePath | Stroke | CloseStroke | Fill | EOFill | FillStroke
            | EOFillStroke | CloseFillStroke | CloseEOFillStroke | EndPath | Clip | EOClip
            | BeginText | EndText | NextLine | InlineImage | EndMarkedContent | BeginCompat
            | EndCompat => 0,
            SetLineWidth | SetLineCap | SetLineJoin | SetMiterLimit | SetRenderingIntent
            | SetFlatness | SetGState | SetCharSpacing | SetWordSpacing | SetHScale
            | SetLeading | SetTextRenderingMode | SetTextRise | ShowText | ShowSpacedText
            | NextLineShowText | SetStrokeColorSpace | SetFillColorSpace | SetStrokeGray
            | SetFillGray | ShadingFill | PaintXObject | MarkPoint | BeginMarkedContent => 1,
            SetDash | MoveTo | LineTo | SetFont | MoveText | SetLeadingMoveText
            | SetCharWidth | MarkPointProps | BeginMarkedContentProps => 2,
            NextLineSetSpacingShowText | SetStrokeRGBColor | SetFillRGBColor => 3,
            CurveTo2 | CurveTo3 | Rectangle | SetStrokeCMYKColor | SetFillCMYKColor => 4,
            Transform | CurveTo | SetTextMatrix | SetCharWidthAndBounds => 6,
        })
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_command())
    }
}

/// An operator with exactly the operands it consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub op: OpCode,
    pub args: SmallVec<[PDFObject; 8]>,
}

impl Operation {
    pub fn new(op: OpCode, args: SmallVec<[PDFObject; 8]>) -> Self {
        Operation { op, args }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for arg in &self.args {
            write!(f, "{:?} ", arg)?;
        }
        write!(f, "{}", self.op)
    }
}

/// Nesting limit for operand arrays and dictionaries.
const MAX_OPERAND_NESTING: usize = 64;

/// Reads operations from decoded content bytes.
///
/// Never fails: malformed tokens, short operations and unknown operators
/// are logged at debug level and skipped. Operands left over at the end of
/// the data are ignored.
pub struct ContentStreamReader {
    lexer: Lexer,
    operands: SmallVec<[PDFObject; 8]>,
}

impl ContentStreamReader {
    pub fn new(data: Vec<u8>) -> Self {
        ContentStreamReader {
            lexer: Lexer::from_bytes(data),
            operands: SmallVec::new(),
        }
    }

    /// Next well-formed operation, `None` at the end of the data.
    pub fn read_operation(&mut self) -> Option<Operation> {
        loop {
            let token = match self.lexer.get_object() {
                Ok(Token::EOF) => {
                    if !self.operands.is_empty() {
                        debug!("{} trailing operands ignored", self.operands.len());
                        self.operands.clear();
                    }
                    return None;
                }
                Ok(token) => token,
                Err(e) => {
                    debug!("content stream: {}", e);
                    continue;
                }
            };

            let cmd = match token {
                Token::Command(cmd) => cmd,
                other => {
                    if let Some(operand) = self.read_operand(other, 0) {
                        self.operands.push(operand);
                    }
                    continue;
                }
            };

            let Some(op) = OpCode::from_command(&cmd) else {
                debug!("unknown operator '{}' skipped", cmd);
                self.operands.clear();
                continue;
            };
            trace!("{} with {} operands", op, self.operands.len());

            if op == OpCode::InlineImage {
                self.operands.clear();
                let image = self.read_inline_image();
                return Some(Operation::new(op, SmallVec::from_elem(image, 1)));
            }

            let mut args = std::mem::take(&mut self.operands);
            if let Some(arity) = op.arity() {
                if args.len() < arity {
                    debug!(
                        "'{}' needs {} operands, found {}; dropped",
                        op,
                        arity,
                        args.len()
                    );
                    continue;
                }
                if args.len() > arity {
                    args.drain(..args.len() - arity);
                }
            }
            return Some(Operation::new(op, args));
        }
    }

    /// Builds an operand from `token`, reading nested containers.
    fn read_operand(&mut self, token: Token, depth: usize) -> Option<PDFObject> {
        Some(match token {
            Token::Number(n) => PDFObject::Number(n),
            Token::Boolean(b) => PDFObject::Boolean(b),
            Token::Null => PDFObject::Null,
            Token::String(s) => PDFObject::String(s),
            Token::HexString(s) => PDFObject::HexString(s),
            Token::Name(n) => PDFObject::Name(n),
            Token::ArrayStart if depth < MAX_OPERAND_NESTING => {
                let mut items = Vec::new();
                loop {
                    match self.next_token()? {
                        Token::ArrayEnd => break,
                        Token::Command(cmd) => debug!("operator '{}' inside array ignored", cmd),
                        token => items.extend(self.read_operand(token, depth + 1)),
                    }
                }
                PDFObject::Array(items)
            }
            Token::DictStart if depth < MAX_OPERAND_NESTING => {
                PDFObject::Dictionary(self.read_dict_entries(depth, |t| *t == Token::DictEnd)?)
            }
            other => {
                debug!("unexpected token {:?} in operands", other);
                return None;
            }
        })
    }

    /// Key/value pairs up to a token accepted by `is_end`.
    fn read_dict_entries(&mut self, depth: usize, is_end: impl Fn(&Token) -> bool) -> Option<Dict> {
        let mut dict = Dict::default();
        loop {
            let token = self.next_token()?;
            if is_end(&token) {
                return Some(dict);
            }
            let Token::Name(key) = token else {
                debug!("non-name key {:?} skipped", token);
                continue;
            };
            let value = self.next_token()?;
            if is_end(&value) {
                return Some(dict);
            }
            if let Some(value) = self.read_operand(value, depth + 1) {
                dict.insert(key, value);
            }
        }
    }

    /// Next token, `None` at the end of data.
    fn next_token(&mut self) -> Option<Token> {
        loop {
            match self.lexer.get_object() {
                Ok(Token::EOF) => return None,
                Ok(token) => return Some(token),
                Err(e) => debug!("content stream: {}", e),
            }
        }
    }

    /// Reads `<dict> ID <data> EI` after `BI` into a stream object. Keys are
    /// kept as written, abbreviations included.
    fn read_inline_image(&mut self) -> PDFObject {
        let dict = self
            .read_dict_entries(0, |t| matches!(t, Token::Command(cmd) if cmd == "ID"))
            .unwrap_or_default();
        let data = self.lexer.read_inline_image_data();
        PDFObject::Stream(Arc::new(PdfStream::new(dict, data)))
    }
}

impl Iterator for ContentStreamReader {
    type Item = Operation;

    fn next(&mut self) -> Option<Operation> {
        self.read_operation()
    }
}
