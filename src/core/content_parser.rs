//! Content stream interpretation.
//!
//! A [`ContentParser`] runs the operator state machine over decoded content
//! bytes and produces [`Shapes`]. It holds only configuration; every call to
//! [`parse`](ContentParser::parse) gets its own operand reader, graphics
//! state stack, current path and output list.
//!
//! Operator problems are local. An operation with operands of the wrong type
//! is logged and has no effect, and everything after it runs normally. The
//! only errors that leave `parse` are image decoding failures; the page or
//! form that owns the content turns those into an empty display list.

use super::color_space::ColorSpace;
use super::config::ParserOptions;
use super::content_stream::{ContentStreamReader, OpCode, Operation};
use super::error::{PDFError, PDFResult};
use super::font::{self, FALLBACK_WIDTH};
use super::image::{DefaultImageDecoder, ImageDecoder, ImageXObject};
use super::library::Library;
use super::parser::{Dict, ObjRef, PDFObject, PdfStream};
use super::resources::{ResourceChain, XObject};
use crate::rendering::graphics_state::{
    FillRule, GraphicsState, LineCap, LineJoin, Paint, TextRenderingMode,
};
use crate::rendering::matrix::Matrix;
use crate::rendering::path::{ClipPath, Path};
use crate::rendering::shapes::{ImageShape, PathShape, Shape, ShadingShape, Shapes, TextRun};
use log::{debug, warn};
use std::sync::Arc;

/// One shown string, as reported by [`ContentParser::parse_text_blocks`].
#[derive(Debug, Clone, PartialEq)]
pub struct TextItem {
    pub text: String,
    pub font_name: Option<String>,
    pub font_size: f64,
    /// Baseline start in user space
    pub origin: (f64, f64),
    /// Baseline end in user space
    pub end: (f64, f64),
}

/// The strings shown between one `BT` and its `ET`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextBlock {
    pub items: Vec<TextItem>,
}

impl TextBlock {
    pub fn text(&self) -> String {
        self.items.iter().map(|item| item.text.as_str()).collect()
    }
}

pub struct ContentParser {
    library: Arc<Library>,
    resources: ResourceChain,
    options: ParserOptions,
    image_decoder: Arc<dyn ImageDecoder>,
    graphics_state: GraphicsState,
    /// Form nesting of this parser, 0 for page content
    depth: usize,
    /// Forms whose content is being interpreted by this parser or an
    /// enclosing one
    forms_in_progress: Vec<ObjRef>,
}

impl ContentParser {
    pub fn new(library: Arc<Library>, resources: ResourceChain) -> Self {
        ContentParser {
            library,
            resources,
            options: ParserOptions::default(),
            image_decoder: Arc::new(DefaultImageDecoder),
            graphics_state: GraphicsState::default(),
            depth: 0,
            forms_in_progress: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: ParserOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_image_decoder(mut self, decoder: Arc<dyn ImageDecoder>) -> Self {
        self.image_decoder = decoder;
        self
    }

    /// State the content starts from, e.g. the invoking CTM for a form.
    pub fn with_graphics_state(mut self, state: GraphicsState) -> Self {
        self.graphics_state = state;
        self
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    pub fn library(&self) -> &Arc<Library> {
        &self.library
    }

    pub fn resources(&self) -> &ResourceChain {
        &self.resources
    }

    pub fn image_decoder(&self) -> &Arc<dyn ImageDecoder> {
        &self.image_decoder
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Interprets `data` into a display list.
    pub fn parse(&self, data: &[u8]) -> PDFResult<Shapes> {
        let mut interpreter = Interpreter::new(self, Mode::Shapes);
        interpreter.run(data)?;
        Ok(interpreter.shapes)
    }

    /// Runs the same state machine but only records shown text, skipping
    /// path, image and shading construction.
    pub fn parse_text_blocks(&self, data: &[u8]) -> PDFResult<Vec<TextBlock>> {
        let mut interpreter = Interpreter::new(self, Mode::Text);
        interpreter.run(data)?;
        Ok(interpreter.blocks)
    }

    /// Parser for a form invoked from content run by this parser.
    pub(crate) fn nested(
        &self,
        resources: ResourceChain,
        state: GraphicsState,
        form: Option<ObjRef>,
    ) -> ContentParser {
        let mut forms_in_progress = self.forms_in_progress.clone();
        forms_in_progress.extend(form);
        ContentParser {
            library: self.library.clone(),
            resources,
            options: self.options.clone(),
            image_decoder: self.image_decoder.clone(),
            graphics_state: state,
            depth: self.depth + 1,
            forms_in_progress,
        }
    }

    /// Whether invoking `form` from this parser must be refused.
    fn refuses_form(&self, form: Option<ObjRef>) -> Option<String> {
        if self.depth >= self.options.max_form_depth {
            return Some(format!(
                "form nesting deeper than {}",
                self.options.max_form_depth
            ));
        }
        let form = form?;
        self.forms_in_progress
            .contains(&form)
            .then(|| format!("form {} invokes itself", form))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Shapes,
    Text,
}

/// Per-call interpretation state.
struct Interpreter<'p> {
    parser: &'p ContentParser,
    mode: Mode,
    state: GraphicsState,
    saved: Vec<GraphicsState>,
    path: Path,
    /// Set by `W`/`W*`, applied when the path is painted or ended
    pending_clip: Option<FillRule>,
    shapes: Shapes,
    blocks: Vec<TextBlock>,
    block: Option<TextBlock>,
}

fn operand_error(op: OpCode, message: &str) -> PDFError {
    PDFError::content_stream_error(format!("'{}': {}", op, message))
}

fn number(op: &Operation, index: usize) -> PDFResult<f64> {
    op.args
        .get(index)
        .and_then(PDFObject::as_f64)
        .ok_or_else(|| operand_error(op.op, "expected a number"))
}

fn numbers<const N: usize>(op: &Operation) -> PDFResult<[f64; N]> {
    let mut values = [0.0; N];
    for (index, value) in values.iter_mut().enumerate() {
        *value = number(op, index)?;
    }
    Ok(values)
}

fn name(op: &Operation, index: usize) -> PDFResult<&str> {
    op.args
        .get(index)
        .and_then(PDFObject::as_name)
        .ok_or_else(|| operand_error(op.op, "expected a name"))
}

fn string(op: &Operation, index: usize) -> PDFResult<&[u8]> {
    op.args
        .get(index)
        .and_then(PDFObject::as_bytes)
        .ok_or_else(|| operand_error(op.op, "expected a string"))
}

/// Inline image dictionary keys and their full names.
const INLINE_IMAGE_KEYS: [(&str, &str); 10] = [
    ("BPC", "BitsPerComponent"),
    ("CS", "ColorSpace"),
    ("D", "Decode"),
    ("DP", "DecodeParms"),
    ("F", "Filter"),
    ("H", "Height"),
    ("IM", "ImageMask"),
    ("I", "Interpolate"),
    ("L", "Length"),
    ("W", "Width"),
];

impl<'p> Interpreter<'p> {
    fn new(parser: &'p ContentParser, mode: Mode) -> Self {
        Interpreter {
            parser,
            mode,
            state: parser.graphics_state.clone(),
            saved: Vec::new(),
            path: Path::new(),
            pending_clip: None,
            shapes: Shapes::new(),
            blocks: Vec::new(),
            block: None,
        }
    }

    fn run(&mut self, data: &[u8]) -> PDFResult<()> {
        for operation in ContentStreamReader::new(data.to_vec()) {
            match self.execute(&operation) {
                Ok(()) => {}
                Err(PDFError::ContentStream(message)) => debug!("{}", message),
                Err(e) => return Err(e),
            }
        }
        if !self.path.is_empty() {
            debug!("unpainted path dropped at end of content");
        }
        if self.block.take().is_some() {
            debug!("text object without ET dropped");
        }
        Ok(())
    }

    fn execute(&mut self, op: &Operation) -> PDFResult<()> {
        use OpCode::*;
        let text_only = self.mode == Mode::Text;
        match op.op {
            Save => self.saved.push(self.state.clone()),
            Restore => match self.saved.pop() {
                Some(state) => self.state = state,
                None => debug!("'Q' without matching 'q' ignored"),
            },
            Transform => {
                let [a, b, c, d, e, f] = numbers::<6>(op)?;
                self.state.concat_matrix(&Matrix::new(a, b, c, d, e, f));
            }

            SetLineWidth => self.state.stroke_props.line_width = number(op, 0)?,
            SetLineCap => {
                self.state.stroke_props.line_cap = LineCap::from_i64(number(op, 0)? as i64)
                    .ok_or_else(|| operand_error(op.op, "bad line cap"))?;
            }
            SetLineJoin => {
                self.state.stroke_props.line_join = LineJoin::from_i64(number(op, 0)? as i64)
                    .ok_or_else(|| operand_error(op.op, "bad line join"))?;
            }
            SetMiterLimit => self.state.stroke_props.miter_limit = number(op, 0)?,
            SetDash => {
                let pattern = op.args[0]
                    .as_number_array()
                    .ok_or_else(|| operand_error(op.op, "expected a dash array"))?;
                self.state.stroke_props.dash_array = pattern;
                self.state.stroke_props.dash_offset = number(op, 1)?;
            }
            SetGState => {
                let key = name(op, 0)?;
                match self.parser.resources.get_ext_gstate(key) {
                    Some(ext) => ext.apply(&mut self.state),
                    None => debug!("ExtGState {} not found", key),
                }
            }
            SetRenderingIntent | SetFlatness => {}

            MoveTo | LineTo | CurveTo | CurveTo2 | CurveTo3 | ClosePath | Rectangle
                if text_only => {}
            MoveTo => {
                let [x, y] = numbers::<2>(op)?;
                self.path.move_to(x, y);
            }
            LineTo => {
                let [x, y] = numbers::<2>(op)?;
                self.path.line_to(x, y);
            }
            CurveTo => {
                let [x1, y1, x2, y2, x, y] = numbers::<6>(op)?;
                self.path.curve_to(x1, y1, x2, y2, x, y);
            }
            CurveTo2 => {
                let [x2, y2, x, y] = numbers::<4>(op)?;
                let (x1, y1) = self.path.current_point().unwrap_or((x2, y2));
                self.path.curve_to(x1, y1, x2, y2, x, y);
            }
            CurveTo3 => {
                let [x1, y1, x, y] = numbers::<4>(op)?;
                self.path.curve_to(x1, y1, x, y, x, y);
            }
            ClosePath => self.path.close_path(),
            Rectangle => {
                let [x, y, width, height] = numbers::<4>(op)?;
                self.path.rect(x, y, width, height);
            }

            Stroke => self.paint_path(false, None, true),
            CloseStroke => self.paint_path(true, None, true),
            Fill => self.paint_path(false, Some(FillRule::NonZero), false),
            EOFill => self.paint_path(false, Some(FillRule::EvenOdd), false),
            FillStroke => self.paint_path(false, Some(FillRule::NonZero), true),
            EOFillStroke => self.paint_path(false, Some(FillRule::EvenOdd), true),
            CloseFillStroke => self.paint_path(true, Some(FillRule::NonZero), true),
            CloseEOFillStroke => self.paint_path(true, Some(FillRule::EvenOdd), true),
            EndPath => self.paint_path(false, None, false),
            Clip => self.pending_clip = Some(FillRule::NonZero),
            EOClip => self.pending_clip = Some(FillRule::EvenOdd),

            BeginText => {
                self.state.text.set_matrix(Matrix::IDENTITY);
                if text_only {
                    self.block = Some(TextBlock::default());
                }
            }
            EndText => {
                if let Some(block) = self.block.take() {
                    if !block.items.is_empty() {
                        self.blocks.push(block);
                    }
                }
            }
            SetCharSpacing => self.state.text.char_spacing = number(op, 0)?,
            SetWordSpacing => self.state.text.word_spacing = number(op, 0)?,
            SetHScale => self.state.text.horizontal_scaling = number(op, 0)? / 100.0,
            SetLeading => self.state.text.leading = number(op, 0)?,
            SetFont => {
                let key = name(op, 0)?.to_string();
                let size = number(op, 1)?;
                let font = self.parser.resources.get_font(&key);
                if font.is_none() {
                    debug!("font {} not found, showing text without metrics", key);
                }
                self.state.text.font = font;
                self.state.text.font_name = Some(key);
                self.state.text.font_size = size;
            }
            SetTextRenderingMode => {
                self.state.text.render_mode =
                    TextRenderingMode::from_i64(number(op, 0)? as i64)
                        .ok_or_else(|| operand_error(op.op, "bad rendering mode"))?;
            }
            SetTextRise => self.state.text.rise = number(op, 0)?,
            MoveText => {
                let [tx, ty] = numbers::<2>(op)?;
                self.state.text.move_line(tx, ty);
            }
            SetLeadingMoveText => {
                let [tx, ty] = numbers::<2>(op)?;
                self.state.text.leading = -ty;
                self.state.text.move_line(tx, ty);
            }
            SetTextMatrix => {
                let [a, b, c, d, e, f] = numbers::<6>(op)?;
                self.state.text.set_matrix(Matrix::new(a, b, c, d, e, f));
            }
            NextLine => self.state.text.next_line(),
            ShowText => self.show_text(string(op, 0)?),
            ShowSpacedText => self.show_spaced_text(op)?,
            NextLineShowText => {
                let bytes = string(op, 0)?;
                self.state.text.next_line();
                self.show_text(bytes);
            }
            NextLineSetSpacingShowText => {
                let [word_spacing, char_spacing] = numbers::<2>(op)?;
                let bytes = string(op, 2)?;
                self.state.text.word_spacing = word_spacing;
                self.state.text.char_spacing = char_spacing;
                self.state.text.next_line();
                self.show_text(bytes);
            }
            SetCharWidth | SetCharWidthAndBounds => {}

            SetStrokeColorSpace => {
                let space = self.color_space(name(op, 0)?)?;
                self.state.stroke_paint = Paint::Solid(space.initial_color());
                self.state.stroke_color_space = space;
            }
            SetFillColorSpace => {
                let space = self.color_space(name(op, 0)?)?;
                self.state.fill_paint = Paint::Solid(space.initial_color());
                self.state.fill_color_space = space;
            }
            SetStrokeColor | SetStrokeColorN => {
                self.state.stroke_paint = self.paint(op, &self.state.stroke_color_space)?;
            }
            SetFillColor | SetFillColorN => {
                self.state.fill_paint = self.paint(op, &self.state.fill_color_space)?;
            }
            SetStrokeGray => self.set_device_color(true, ColorSpace::DeviceGray, op)?,
            SetFillGray => self.set_device_color(false, ColorSpace::DeviceGray, op)?,
            SetStrokeRGBColor => self.set_device_color(true, ColorSpace::DeviceRGB, op)?,
            SetFillRGBColor => self.set_device_color(false, ColorSpace::DeviceRGB, op)?,
            SetStrokeCMYKColor => self.set_device_color(true, ColorSpace::DeviceCMYK, op)?,
            SetFillCMYKColor => self.set_device_color(false, ColorSpace::DeviceCMYK, op)?,

            ShadingFill | InlineImage if text_only => {}
            ShadingFill => {
                let key = name(op, 0)?;
                match self.parser.resources.get_shading(key) {
                    Some(shading) => self.shapes.push(Shape::Shading(ShadingShape {
                        shading,
                        transform: self.state.ctm,
                        fill_alpha: self.state.fill_alpha,
                        clip: self.state.clip.clone(),
                    })),
                    None => debug!("shading {} not found", key),
                }
            }
            InlineImage => {
                let stream = op.args[0]
                    .as_stream()
                    .ok_or_else(|| operand_error(op.op, "missing image"))?;
                self.inline_image(stream)?;
            }
            PaintXObject => self.paint_xobject(name(op, 0)?)?,

            MarkPoint | MarkPointProps | BeginMarkedContent | BeginMarkedContentProps
            | EndMarkedContent | BeginCompat | EndCompat => {}
        }
        Ok(())
    }

    /// Ends the current path: emits it if painted, then applies a pending
    /// clip. The shape is clipped by the clip in effect before this path.
    fn paint_path(&mut self, close: bool, fill: Option<FillRule>, stroke: bool) {
        if self.mode == Mode::Text {
            self.pending_clip = None;
            return;
        }
        if close {
            self.path.close_path();
        }
        if !self.path.is_empty() && (fill.is_some() || stroke) {
            self.shapes.push(Shape::Path(PathShape {
                path: self.path.clone(),
                transform: self.state.ctm,
                fill,
                stroke,
                fill_paint: self.state.fill_paint.clone(),
                stroke_paint: self.state.stroke_paint.clone(),
                stroke_props: self.state.stroke_props.clone(),
                fill_alpha: self.state.fill_alpha,
                stroke_alpha: self.state.stroke_alpha,
                blend_mode: self.state.blend_mode,
                clip: self.state.clip.clone(),
            }));
        }
        if let Some(rule) = self.pending_clip.take() {
            let path = std::mem::take(&mut self.path);
            self.state.clip = Some(ClipPath::intersect(
                self.state.clip.take(),
                path,
                self.state.ctm,
                rule,
            ));
        }
        self.path.clear();
    }

    /// Device colour space name or a `/ColorSpace` resource.
    fn color_space(&self, key: &str) -> PDFResult<ColorSpace> {
        ColorSpace::from_device_name(key)
            .or_else(|| self.parser.resources.get_color_space(key))
            .or_else(|| match key {
                "CalGray" => Some(ColorSpace::CalGray),
                "CalRGB" => Some(ColorSpace::CalRGB),
                _ => None,
            })
            .ok_or_else(|| {
                PDFError::content_stream_error(format!("colour space {} not found", key))
            })
    }

    /// Paint for `SC`/`SCN`/`sc`/`scn` in `space`.
    fn paint(&self, op: &Operation, space: &ColorSpace) -> PDFResult<Paint> {
        let components: Vec<f64> = op.args.iter().filter_map(PDFObject::as_f64).collect();
        if let ColorSpace::Pattern { underlying } = space {
            let key = op
                .args
                .last()
                .and_then(PDFObject::as_name)
                .ok_or_else(|| operand_error(op.op, "expected a pattern name"))?;
            let pattern = self.parser.resources.get_pattern(key).ok_or_else(|| {
                PDFError::content_stream_error(format!("pattern {} not found", key))
            })?;
            let color = underlying.as_ref().map(|space| space.to_color(&components));
            return Ok(Paint::Pattern(pattern, color));
        }
        Ok(Paint::Solid(space.to_color(&components)))
    }

    fn set_device_color(&mut self, stroke: bool, space: ColorSpace, op: &Operation) -> PDFResult<()> {
        let components = op
            .args
            .iter()
            .map(|arg| arg.as_f64())
            .collect::<Option<Vec<f64>>>()
            .ok_or_else(|| operand_error(op.op, "expected numbers"))?;
        let paint = Paint::Solid(space.to_color(&components));
        if stroke {
            self.state.stroke_color_space = space;
            self.state.stroke_paint = paint;
        } else {
            self.state.fill_color_space = space;
            self.state.fill_paint = paint;
        }
        Ok(())
    }

    /// Shows one string and advances the text matrix past it.
    fn show_text(&mut self, bytes: &[u8]) {
        let text = &self.state.text;
        let font = text.font.clone();
        let codes = match &font {
            Some(font) => font.codes(bytes),
            None => bytes.iter().map(|&b| b as u32).collect(),
        };
        let advance: f64 = codes
            .iter()
            .map(|&code| {
                let (width, word_space) = match &font {
                    Some(font) => (font.advance(code), font.is_word_space(code)),
                    None => (FALLBACK_WIDTH / 1000.0, code == 32),
                };
                let word = if word_space { text.word_spacing } else { 0.0 };
                (width * text.font_size + text.char_spacing + word) * text.horizontal_scaling
            })
            .sum();

        let record = match self.mode {
            Mode::Shapes => self.parser.options.record_text,
            Mode::Text => self.block.is_some(),
        };
        if record {
            let decoded = match &font {
                Some(font) => font.decode_text(bytes),
                None => font::decode_without_font(bytes),
            };
            let run = TextRun {
                bytes: bytes.to_vec(),
                text: decoded,
                font_name: text.font_name.clone(),
                font,
                font_size: text.font_size,
                text_matrix: text.text_matrix,
                ctm: self.state.ctm,
                char_spacing: text.char_spacing,
                word_spacing: text.word_spacing,
                horizontal_scaling: text.horizontal_scaling,
                rise: text.rise,
                render_mode: text.render_mode,
                fill_paint: self.state.fill_paint.clone(),
                stroke_paint: self.state.stroke_paint.clone(),
                fill_alpha: self.state.fill_alpha,
                advance,
                clip: self.state.clip.clone(),
            };
            self.record_run(run);
        }
        self.state.text.advance(advance);
    }

    fn record_run(&mut self, run: TextRun) {
        match (&mut self.block, self.mode) {
            (Some(block), Mode::Text) => {
                let end = Matrix::translate(run.advance, 0.0)
                    .multiply(&run.text_matrix)
                    .multiply(&run.ctm)
                    .transform_point(0.0, 0.0);
                block.items.push(TextItem {
                    origin: run.origin(),
                    end,
                    text: run.text,
                    font_name: run.font_name,
                    font_size: run.font_size,
                });
            }
            _ => self.shapes.push(Shape::Text(run)),
        }
    }

    /// `TJ`: strings are shown, numbers move back by thousandths of a unit
    /// of text space.
    fn show_spaced_text(&mut self, op: &Operation) -> PDFResult<()> {
        let items = op.args[0]
            .as_array()
            .ok_or_else(|| operand_error(op.op, "expected an array"))?;
        for item in items {
            match item {
                PDFObject::Number(adjustment) => {
                    let text = &self.state.text;
                    let tx = -adjustment / 1000.0 * text.font_size * text.horizontal_scaling;
                    self.state.text.advance(tx);
                }
                other => match other.as_bytes() {
                    Some(bytes) => self.show_text(bytes),
                    None => debug!("'TJ' element {:?} ignored", other),
                },
            }
        }
        Ok(())
    }

    fn paint_xobject(&mut self, key: &str) -> PDFResult<()> {
        match self.parser.resources.get_xobject(key) {
            None => debug!("XObject {} not found", key),
            Some(XObject::Image(image)) => {
                if self.mode == Mode::Shapes {
                    self.push_image(image, false)?;
                }
            }
            Some(XObject::Form(mut form)) => {
                if let Some(reason) = self.parser.refuses_form(form.obj_ref) {
                    warn!("form {} skipped: {}", key, reason);
                    return Ok(());
                }
                form.set_parent_resources(self.parser.resources.clone());
                form.set_graphics_state(self.state.clone());
                match self.mode {
                    Mode::Shapes => self.shapes.extend(form.parse_nested(self.parser)),
                    Mode::Text => {
                        let blocks = form.text_blocks_nested(self.parser);
                        match &mut self.block {
                            Some(block) => {
                                block.items.extend(blocks.into_iter().flat_map(|b| b.items))
                            }
                            None => self.blocks.extend(blocks),
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn inline_image(&mut self, stream: &Arc<PdfStream>) -> PDFResult<()> {
        let mut dict = Dict::default();
        for (key, value) in &stream.dict {
            let full = INLINE_IMAGE_KEYS
                .iter()
                .find(|(short, _)| short == key)
                .map_or(key.as_str(), |(_, full)| *full);
            dict.insert(full.to_string(), value.clone());
        }
        let expanded = Arc::new(PdfStream::new(dict, stream.data.clone()));
        let resources = &self.parser.resources;
        let named_space = |space: &str| resources.get_color_space(space);
        let image = ImageXObject::from_stream(&self.parser.library, expanded, &named_space)?;
        self.push_image(Arc::new(image), true)
    }

    /// Decodes `image` and places it in the unit square of the CTM.
    fn push_image(&mut self, image: Arc<ImageXObject>, inline: bool) -> PDFResult<()> {
        let data = image.data(&self.parser.library)?;
        let pixels = self.parser.image_decoder.decode(&image, &data)?.map(Arc::new);
        self.shapes.push(Shape::Image(ImageShape {
            image,
            pixels,
            transform: self.state.ctm,
            fill_paint: self.state.fill_paint.clone(),
            fill_alpha: self.state.fill_alpha,
            inline,
            clip: self.state.clip.clone(),
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::Parser;
    use crate::core::resources::Resources;
    use crate::rendering::graphics_state::Color;
    use crate::rendering::path::PathElement;

    fn parse(content: &[u8]) -> Shapes {
        let library = Arc::new(Library::default());
        ContentParser::new(library, ResourceChain::empty())
            .parse(content)
            .unwrap()
    }

    fn with_resources(objects: &[(u32, &str)], resources: &str) -> ContentParser {
        let mut library = Library::default();
        for (num, source) in objects {
            let object = Parser::from_bytes(source.as_bytes().to_vec())
                .get_object()
                .unwrap();
            let object = match object {
                PDFObject::Stream(stream) => {
                    let mut stream = (*stream).clone();
                    stream.obj_ref = Some(ObjRef::new(*num, 0));
                    PDFObject::Stream(Arc::new(stream))
                }
                other => other,
            };
            library.insert(ObjRef::new(*num, 0), object);
        }
        let library = Arc::new(library);
        let dict = Parser::from_bytes(resources.as_bytes().to_vec())
            .get_object()
            .unwrap()
            .as_dict()
            .unwrap()
            .clone();
        let chain = ResourceChain::new(Arc::new(Resources::new(library.clone(), dict)));
        ContentParser::new(library, chain)
    }

    fn only_path(shapes: &Shapes) -> &PathShape {
        let paths: Vec<_> = shapes.paths().collect();
        assert_eq!(paths.len(), 1);
        paths[0]
    }

    #[test]
    fn test_identity_rect_fill() {
        let shapes = parse(b"1 0 0 1 0 0 cm 10 10 100 100 re f");
        let path = only_path(&shapes);
        assert_eq!(path.path.as_rect(), Some((10.0, 10.0, 100.0, 100.0)));
        assert!(path.transform.is_identity());
        assert_eq!(path.fill, Some(FillRule::NonZero));
        assert!(!path.stroke);
    }

    #[test]
    fn test_save_restore_scopes_transform() {
        let shapes = parse(b"q 2 0 0 2 0 0 cm 1 0 0 1 0 0 cm 0 0 50 50 re f Q 0 0 50 50 re f");
        let paths: Vec<_> = shapes.paths().collect();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].transform, Matrix::scale(2.0, 2.0));
        assert!(paths[1].transform.is_identity());
    }

    #[test]
    fn test_unbalanced_restore_is_ignored() {
        let shapes = parse(b"Q Q 3 0 0 3 0 0 cm 0 0 1 1 re f");
        assert_eq!(only_path(&shapes).transform, Matrix::scale(3.0, 3.0));
    }

    #[test]
    fn test_short_operator_does_not_corrupt_next() {
        let shapes = parse(b"10 10 re 0 0 50 50 re f");
        assert_eq!(only_path(&shapes).path.as_rect(), Some((0.0, 0.0, 50.0, 50.0)));
    }

    #[test]
    fn test_wrong_operand_type_drops_only_that_operator() {
        let shapes = parse(b"/Foo 2 0 0 2 0 0 cm 0 0 1 1 re f /X w 0 0 1 1 re S");
        let paths: Vec<_> = shapes.paths().collect();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].transform, Matrix::scale(2.0, 2.0));
        assert_eq!(paths[1].stroke_props.line_width, 1.0);
    }

    #[test]
    fn test_colors() {
        let shapes = parse(b"1 0 0 rg 0 0 1 RG 0 0 1 1 re B 0.5 g 0 0 1 1 re f");
        let paths: Vec<_> = shapes.paths().collect();
        assert_eq!(paths[0].fill_paint, Paint::Solid(Color::RGB(1.0, 0.0, 0.0)));
        assert_eq!(paths[0].stroke_paint, Paint::Solid(Color::RGB(0.0, 0.0, 1.0)));
        assert_eq!(paths[1].fill_paint, Paint::Solid(Color::Gray(0.5)));
    }

    #[test]
    fn test_color_space_reset_and_bad_component_count() {
        let shapes = parse(b"1 0 0 rg /DeviceCMYK cs 0 0 1 1 re f 0.5 sc 0 0 1 1 re f");
        let paths: Vec<_> = shapes.paths().collect();
        let initial = Paint::Solid(Color::CMYK(0.0, 0.0, 0.0, 1.0));
        assert_eq!(paths[0].fill_paint, initial);
        assert_eq!(paths[1].fill_paint, initial);
    }

    #[test]
    fn test_curves_and_close() {
        let shapes = parse(b"0 0 m 1 1 2 2 v 3 3 4 4 y h S");
        let path = only_path(&shapes);
        assert_eq!(
            path.path.elements(),
            &[
                PathElement::MoveTo(0.0, 0.0),
                PathElement::CurveTo(0.0, 0.0, 1.0, 1.0, 2.0, 2.0),
                PathElement::CurveTo(3.0, 3.0, 4.0, 4.0, 4.0, 4.0),
                PathElement::ClosePath,
            ]
        );
    }

    #[test]
    fn test_clip_applies_after_paint() {
        let shapes = parse(b"0 0 10 10 re W f 0 0 5 5 re f q 1 1 2 2 re W n 0 0 1 1 re f Q 0 0 1 1 re f");
        let paths: Vec<_> = shapes.paths().collect();
        assert_eq!(paths.len(), 4);
        assert!(paths[0].clip.is_none());
        assert_eq!(paths[1].clip.as_ref().map(|c| c.depth()), Some(1));
        assert_eq!(paths[2].clip.as_ref().map(|c| c.depth()), Some(2));
        assert_eq!(paths[3].clip.as_ref().map(|c| c.depth()), Some(1));
    }

    #[test]
    fn test_end_path_without_clip_emits_nothing() {
        assert!(parse(b"0 0 10 10 re n").is_empty());
        assert!(parse(b"0 0 10 10 re").is_empty());
    }

    #[test]
    fn test_text_positioning_without_font() {
        let shapes = parse(b"BT /F1 10 Tf 100 700 Td (AB) Tj 0 -12 TD (C) Tj T* (D) ' ET");
        let runs: Vec<_> = shapes.text_runs().collect();
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0].text, "AB");
        assert_eq!(runs[0].font_name.as_deref(), Some("F1"));
        assert_eq!(runs[0].origin(), (100.0, 700.0));
        // Without metrics each glyph advances half the font size.
        assert_eq!(runs[0].advance, 10.0);
        assert_eq!(runs[1].origin(), (100.0, 688.0));
        assert_eq!(runs[2].origin(), (100.0, 664.0));
    }

    #[test]
    fn test_tj_adjustments_and_spacing() {
        let parser = with_resources(
            &[(5, "<< /Type /Font /Subtype /Type1 /FirstChar 32 /Widths [250 0 600] >>")],
            "<< /Font << /F1 5 0 R >> >>",
        );
        let shapes = parser
            .parse(b"BT /F1 10 Tf 2 Tw 1 Tc [(\") -1000 ( )] TJ ET")
            .unwrap();
        let runs: Vec<_> = shapes.text_runs().collect();
        assert_eq!(runs.len(), 2);
        // '"' is code 34: 0.6 * 10 + 1
        assert_eq!(runs[0].advance, 7.0);
        // 7 + 10 for the adjustment
        assert_eq!(runs[1].origin(), (17.0, 0.0));
        // space: 0.25 * 10 + 1 + 2
        assert_eq!(runs[1].advance, 5.5);
    }

    #[test]
    fn test_horizontal_scaling() {
        let shapes = parse(b"BT /F1 10 Tf 50 Tz (A) Tj (B) Tj ET");
        let runs: Vec<_> = shapes.text_runs().collect();
        assert_eq!(runs[0].advance, 2.5);
        assert_eq!(runs[1].origin(), (2.5, 0.0));
    }

    #[test]
    fn test_record_text_off_still_moves() {
        let library = Arc::new(Library::default());
        let parser = ContentParser::new(library, ResourceChain::empty()).with_options(
            ParserOptions {
                record_text: false,
                ..ParserOptions::default()
            },
        );
        let shapes = parser.parse(b"BT /F1 10 Tf (A) Tj ET 0 0 1 1 re f").unwrap();
        assert_eq!(shapes.len(), 1);
    }

    #[test]
    fn test_text_blocks() {
        let library = Arc::new(Library::default());
        let parser = ContentParser::new(library, ResourceChain::empty());
        let blocks = parser
            .parse_text_blocks(b"0 0 10 10 re f BT /F1 12 Tf 72 720 Td (Hello) Tj ET BT ET BT (X) Tj")
            .unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text(), "Hello");
        let item = &blocks[0].items[0];
        assert_eq!(item.origin, (72.0, 720.0));
        assert_eq!(item.end, (102.0, 720.0));
    }

    #[test]
    fn test_form_is_spliced_with_its_matrix() {
        let parser = with_resources(
            &[(
                7,
                "<< /Type /XObject /Subtype /Form /BBox [0 0 100 100] /Matrix [0.5 0 0 0.5 0 0] /Length 15 >>\nstream\n0 0 10 10 re f\nendstream",
            )],
            "<< /XObject << /Fm0 7 0 R >> >>",
        );
        let shapes = parser.parse(b"1 0 0 1 20 30 cm /Fm0 Do").unwrap();
        let path = only_path(&shapes);
        let expected = Matrix::scale(0.5, 0.5).multiply(&Matrix::translate(20.0, 30.0));
        assert!(path.transform.approx_eq(&expected, 1e-9));
        // The form's bounding box clips its content.
        let clip = path.clip.as_ref().unwrap();
        assert_eq!(clip.path.as_rect(), Some((0.0, 0.0, 100.0, 100.0)));
        assert!(clip.transform.approx_eq(&expected, 1e-9));
    }

    #[test]
    fn test_self_invoking_form_terminates() {
        let parser = with_resources(
            &[(
                8,
                "<< /Type /XObject /Subtype /Form /BBox [0 0 10 10] /Resources << /XObject << /Me 8 0 R >> >> /Length 20 >>\nstream\n0 0 1 1 re f /Me Do\nendstream",
            )],
            "<< /XObject << /Me 8 0 R >> >>",
        );
        let shapes = parser.parse(b"/Me Do").unwrap();
        assert_eq!(shapes.len(), 1);
    }

    #[test]
    fn test_missing_names_are_no_ops() {
        let shapes = parse(b"/Nope Do /GS9 gs /Sh0 sh 0 0 1 1 re f");
        assert_eq!(shapes.len(), 1);
    }

    #[test]
    fn test_inline_image() {
        let shapes = parse(b"q 20 0 0 10 5 5 cm BI /W 2 /H 1 /CS /RGB /BPC 8 ID \xFF\x00\x00\x00\xFF\x00 EI Q");
        let images: Vec<_> = shapes.images().collect();
        assert_eq!(images.len(), 1);
        assert!(images[0].inline);
        assert_eq!(images[0].transform, Matrix::new(20.0, 0.0, 0.0, 10.0, 5.0, 5.0));
        let pixels = images[0].pixels.as_ref().unwrap();
        assert_eq!(pixels.rgba, vec![255, 0, 0, 255, 0, 255, 0, 255]);
    }

    #[test]
    fn test_corrupt_image_fails_the_parse() {
        let parser = with_resources(
            &[(
                9,
                "<< /Type /XObject /Subtype /Image /Width 1 /Height 1 /ColorSpace /DeviceGray /BitsPerComponent 8 /Filter /FlateDecode /Length 4 >>\nstream\njunk\nendstream",
            )],
            "<< /XObject << /Im0 9 0 R >> >>",
        );
        assert!(parser.parse(b"0 0 1 1 re f /Im0 Do").is_err());
    }

    #[test]
    fn test_out_of_range_operand_reads_as_zero() {
        let shapes = parse(b"1.55e-9999999999 w 0 0 1 1 re S");
        assert_eq!(only_path(&shapes).stroke_props.line_width, 0.0);
    }

    #[test]
    fn test_ext_gstate() {
        let parser = with_resources(&[], "<< /ExtGState << /GS0 << /LW 4 /ca 0.25 >> >> >>");
        let shapes = parser.parse(b"/GS0 gs 0 0 1 1 re B").unwrap();
        let path = only_path(&shapes);
        assert_eq!(path.stroke_props.line_width, 4.0);
        assert_eq!(path.fill_alpha, 0.25);
    }

    #[test]
    fn test_seeded_graphics_state() {
        let library = Arc::new(Library::default());
        let parser = ContentParser::new(library, ResourceChain::empty())
            .with_graphics_state(GraphicsState::with_ctm(Matrix::translate(1.0, 2.0)));
        let shapes = parser.parse(b"Q 0 0 1 1 re f").unwrap();
        assert_eq!(only_path(&shapes).transform, Matrix::translate(1.0, 2.0));
    }
}
