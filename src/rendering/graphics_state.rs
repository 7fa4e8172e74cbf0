//! Graphics state for content interpretation.
//!
//! `GraphicsState` is a plain value: `q` pushes a clone onto the parser's
//! stack and `Q` pops it. Shared pieces (clip chain, font, patterns) sit
//! behind `Arc` so a snapshot stays cheap.

use super::matrix::Matrix;
use super::path::ClipPath;
use crate::core::color_space::ColorSpace;
use crate::core::font::Font;
use crate::core::pattern::Pattern;
use std::sync::Arc;

/// Line cap style (PDF 8.4.3.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCap {
    #[default]
    Butt = 0,
    Round = 1,
    ProjectingSquare = 2,
}

impl LineCap {
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(LineCap::Butt),
            1 => Some(LineCap::Round),
            2 => Some(LineCap::ProjectingSquare),
            _ => None,
        }
    }
}

/// Line join style (PDF 8.4.3.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineJoin {
    #[default]
    Miter = 0,
    Round = 1,
    Bevel = 2,
}

impl LineJoin {
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(LineJoin::Miter),
            1 => Some(LineJoin::Round),
            2 => Some(LineJoin::Bevel),
            _ => None,
        }
    }
}

/// Stroke properties for path rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeProps {
    /// Line width in user space units (default: 1.0)
    pub line_width: f64,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    /// Maximum ratio of miter length to line width before a bevel is used
    pub miter_limit: f64,
    /// Alternating on/off dash lengths; empty for a solid line
    pub dash_array: Vec<f64>,
    pub dash_offset: f64,
}

impl Default for StrokeProps {
    fn default() -> Self {
        StrokeProps {
            line_width: 1.0,
            line_cap: LineCap::default(),
            line_join: LineJoin::default(),
            miter_limit: 10.0,
            dash_array: Vec::new(),
            dash_offset: 0.0,
        }
    }
}

/// Device colour after colour-space conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Color {
    /// 0.0 = black, 1.0 = white
    Gray(f64),
    RGB(f64, f64, f64),
    CMYK(f64, f64, f64, f64),
}

impl Color {
    pub fn black() -> Self {
        Color::Gray(0.0)
    }

    pub fn white() -> Self {
        Color::Gray(1.0)
    }

    /// Create an RGB color from byte components.
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color::RGB(r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0)
    }

    /// RGBA components as bytes; alpha is always opaque here, the shape
    /// carries its own alpha.
    pub fn rgba(&self) -> (u8, u8, u8, u8) {
        let byte = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        match *self {
            Color::Gray(g) => {
                let v = byte(g);
                (v, v, v, 255)
            }
            Color::RGB(r, g, b) => (byte(r), byte(g), byte(b), 255),
            Color::CMYK(c, m, y, k) => {
                let k = 1.0 - k.clamp(0.0, 1.0);
                (
                    byte((1.0 - c.clamp(0.0, 1.0)) * k),
                    byte((1.0 - m.clamp(0.0, 1.0)) * k),
                    byte((1.0 - y.clamp(0.0, 1.0)) * k),
                    255,
                )
            }
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::black()
    }
}

/// What a fill or stroke paints with.
#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Solid(Color),
    /// Tiling or shading pattern, plus the colour used for uncoloured tiles
    Pattern(Arc<Pattern>, Option<Color>),
}

impl Default for Paint {
    fn default() -> Self {
        Paint::Solid(Color::black())
    }
}

impl Paint {
    pub fn color(&self) -> Option<Color> {
        match self {
            Paint::Solid(color) => Some(*color),
            Paint::Pattern(_, color) => *color,
        }
    }
}

/// Text rendering mode (PDF 9.3.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextRenderingMode {
    #[default]
    Fill = 0,
    Stroke = 1,
    FillStroke = 2,
    Invisible = 3,
    FillClip = 4,
    StrokeClip = 5,
    FillStrokeClip = 6,
    Clip = 7,
}

impl TextRenderingMode {
    pub fn from_i64(value: i64) -> Option<Self> {
        use TextRenderingMode::*;
        Some(match value {
            0 => Fill,
            1 => Stroke,
            2 => FillStroke,
            3 => Invisible,
            4 => FillClip,
            5 => StrokeClip,
            6 => FillStrokeClip,
            7 => Clip,
            _ => return None,
        })
    }

    pub fn fills(self) -> bool {
        matches!(
            self,
            TextRenderingMode::Fill
                | TextRenderingMode::FillStroke
                | TextRenderingMode::FillClip
                | TextRenderingMode::FillStrokeClip
        )
    }

    pub fn strokes(self) -> bool {
        matches!(
            self,
            TextRenderingMode::Stroke
                | TextRenderingMode::FillStroke
                | TextRenderingMode::StrokeClip
                | TextRenderingMode::FillStrokeClip
        )
    }

    pub fn is_invisible(self) -> bool {
        matches!(self, TextRenderingMode::Invisible | TextRenderingMode::Clip)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

/// Separable and non-separable blend modes (PDF 11.3.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
    Hue,
    Saturation,
    Color,
    Luminosity,
}

impl BlendMode {
    pub fn from_name(name: &str) -> Option<Self> {
        use BlendMode::*;
        Some(match name {
            "Normal" | "Compatible" => Normal,
            "Multiply" => Multiply,
            "Screen" => Screen,
            "Overlay" => Overlay,
            "Darken" => Darken,
            "Lighten" => Lighten,
            "ColorDodge" => ColorDodge,
            "ColorBurn" => ColorBurn,
            "HardLight" => HardLight,
            "SoftLight" => SoftLight,
            "Difference" => Difference,
            "Exclusion" => Exclusion,
            "Hue" => Hue,
            "Saturation" => Saturation,
            "Color" => Color,
            "Luminosity" => Luminosity,
            _ => return None,
        })
    }
}

/// Text state parameters (PDF 9.3) plus the two text matrices.
#[derive(Debug, Clone, PartialEq)]
pub struct TextState {
    pub font: Option<Arc<Font>>,
    /// Resource name given to `Tf`, kept even when the font did not resolve
    pub font_name: Option<String>,
    pub font_size: f64,
    pub char_spacing: f64,
    pub word_spacing: f64,
    /// `Tz / 100`
    pub horizontal_scaling: f64,
    pub leading: f64,
    pub rise: f64,
    pub render_mode: TextRenderingMode,
    pub text_matrix: Matrix,
    pub line_matrix: Matrix,
}

impl Default for TextState {
    fn default() -> Self {
        TextState {
            font: None,
            font_name: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 1.0,
            leading: 0.0,
            rise: 0.0,
            render_mode: TextRenderingMode::default(),
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
        }
    }
}

impl TextState {
    /// `Tm`: sets both matrices.
    pub fn set_matrix(&mut self, matrix: Matrix) {
        self.text_matrix = matrix;
        self.line_matrix = matrix;
    }

    /// `Td`: `Tlm' = T(tx, ty) × Tlm`, `Tm = Tlm'`.
    pub fn move_line(&mut self, tx: f64, ty: f64) {
        self.line_matrix = Matrix::translate(tx, ty).multiply(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    /// `T*`
    pub fn next_line(&mut self) {
        self.move_line(0.0, -self.leading);
    }

    /// Moves the text matrix along the baseline by `tx` text-space units.
    pub fn advance(&mut self, tx: f64) {
        self.text_matrix = Matrix::translate(tx, 0.0).multiply(&self.text_matrix);
    }

    /// `[Tfs·Th 0 0 Tfs 0 Trise]`, the text-space to unscaled-glyph part
    /// of the text rendering matrix.
    pub fn parameters_matrix(&self) -> Matrix {
        Matrix::new(
            self.font_size * self.horizontal_scaling,
            0.0,
            0.0,
            self.font_size,
            0.0,
            self.rise,
        )
    }

    /// Text rendering matrix `Trm = params × Tm × CTM`.
    pub fn rendering_matrix(&self, ctm: &Matrix) -> Matrix {
        self.parameters_matrix()
            .multiply(&self.text_matrix)
            .multiply(ctm)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsState {
    pub ctm: Matrix,
    pub stroke_color_space: ColorSpace,
    pub fill_color_space: ColorSpace,
    pub stroke_paint: Paint,
    pub fill_paint: Paint,
    pub stroke_props: StrokeProps,
    pub clip: Option<Arc<ClipPath>>,
    pub text: TextState,
    /// `CA`
    pub stroke_alpha: f64,
    /// `ca`
    pub fill_alpha: f64,
    pub blend_mode: BlendMode,
}

impl Default for GraphicsState {
    fn default() -> Self {
        GraphicsState {
            ctm: Matrix::IDENTITY,
            stroke_color_space: ColorSpace::DeviceGray,
            fill_color_space: ColorSpace::DeviceGray,
            stroke_paint: Paint::default(),
            fill_paint: Paint::default(),
            stroke_props: StrokeProps::default(),
            clip: None,
            text: TextState::default(),
            stroke_alpha: 1.0,
            fill_alpha: 1.0,
            blend_mode: BlendMode::Normal,
        }
    }
}

impl GraphicsState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh state positioned by `ctm`, used to seed forms and pages.
    pub fn with_ctm(ctm: Matrix) -> Self {
        GraphicsState {
            ctm,
            ..Self::default()
        }
    }

    /// `cm`: `CTM' = M × CTM`.
    pub fn concat_matrix(&mut self, matrix: &Matrix) {
        self.ctm = matrix.multiply(&self.ctm);
    }

    pub fn transform_point(&self, x: f64, y: f64) -> (f64, f64) {
        self.ctm.transform_point(x, y)
    }
}
