//! Display list produced by the content parser.
//!
//! Every [`Shape`] carries its own transform, paint and clip, so a
//! [`Shapes`] list can be replayed any number of times against any
//! [`Device`] without re-running the content stream.

use super::device::Device;
use super::graphics_state::{BlendMode, FillRule, Paint, StrokeProps, TextRenderingMode};
use super::matrix::Matrix;
use super::path::{ClipPath, Path};
use crate::core::error::PDFResult;
use crate::core::font::Font;
use crate::core::image::{ImageData, ImageXObject};
use crate::core::pattern::Shading;
use std::sync::Arc;

/// A painted path.
#[derive(Debug, Clone, PartialEq)]
pub struct PathShape {
    /// Path in user space
    pub path: Path,
    /// CTM when the path was painted
    pub transform: Matrix,
    /// Fill rule if the path is filled
    pub fill: Option<FillRule>,
    pub stroke: bool,
    pub fill_paint: Paint,
    pub stroke_paint: Paint,
    pub stroke_props: StrokeProps,
    pub fill_alpha: f64,
    pub stroke_alpha: f64,
    pub blend_mode: BlendMode,
    pub clip: Option<Arc<ClipPath>>,
}

/// One shown string (`Tj`, `TJ` element, `'` or `"`).
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    /// Bytes as they appear in the content stream
    pub bytes: Vec<u8>,
    /// Unicode text
    pub text: String,
    /// Resource name from `Tf`, kept even when the font did not resolve
    pub font_name: Option<String>,
    pub font: Option<Arc<Font>>,
    pub font_size: f64,
    /// Text matrix at the start of the run
    pub text_matrix: Matrix,
    pub ctm: Matrix,
    pub char_spacing: f64,
    pub word_spacing: f64,
    /// `Tz / 100`
    pub horizontal_scaling: f64,
    pub rise: f64,
    pub render_mode: TextRenderingMode,
    pub fill_paint: Paint,
    pub stroke_paint: Paint,
    pub fill_alpha: f64,
    /// Displacement along the baseline in text space, `Th` included
    pub advance: f64,
    pub clip: Option<Arc<ClipPath>>,
}

impl TextRun {
    /// Text space to user space at the start of the run (PDF 9.4.4).
    pub fn rendering_matrix(&self) -> Matrix {
        Matrix::new(
            self.font_size * self.horizontal_scaling,
            0.0,
            0.0,
            self.font_size,
            0.0,
            self.rise,
        )
        .multiply(&self.text_matrix)
        .multiply(&self.ctm)
    }

    /// Start of the baseline in user space.
    pub fn origin(&self) -> (f64, f64) {
        self.text_matrix.multiply(&self.ctm).transform_point(0.0, 0.0)
    }
}

/// An image placed into the unit square of `transform`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageShape {
    pub image: Arc<ImageXObject>,
    /// `None` when no decoder handles the image's codec
    pub pixels: Option<Arc<ImageData>>,
    pub transform: Matrix,
    /// Paint for stencil masks
    pub fill_paint: Paint,
    pub fill_alpha: f64,
    pub inline: bool,
    pub clip: Option<Arc<ClipPath>>,
}

/// A shading painted over the clip (`sh`).
#[derive(Debug, Clone, PartialEq)]
pub struct ShadingShape {
    pub shading: Arc<Shading>,
    pub transform: Matrix,
    pub fill_alpha: f64,
    pub clip: Option<Arc<ClipPath>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Path(PathShape),
    Text(TextRun),
    Image(ImageShape),
    Shading(ShadingShape),
}

impl Shape {
    pub fn clip(&self) -> Option<&Arc<ClipPath>> {
        match self {
            Shape::Path(shape) => shape.clip.as_ref(),
            Shape::Text(run) => run.clip.as_ref(),
            Shape::Image(image) => image.clip.as_ref(),
            Shape::Shading(shading) => shading.clip.as_ref(),
        }
    }
}

/// Ordered display list; list order is paint order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shapes {
    shapes: Vec<Shape>,
}

impl Shapes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, shape: Shape) {
        self.shapes.push(shape);
    }

    /// Appends another list, keeping its order.
    pub fn extend(&mut self, other: Shapes) {
        self.shapes.extend(other.shapes);
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Shape> {
        self.shapes.iter()
    }

    pub fn images(&self) -> impl Iterator<Item = &ImageShape> {
        self.shapes.iter().filter_map(|shape| match shape {
            Shape::Image(image) => Some(image),
            _ => None,
        })
    }

    pub fn text_runs(&self) -> impl Iterator<Item = &TextRun> {
        self.shapes.iter().filter_map(|shape| match shape {
            Shape::Text(run) => Some(run),
            _ => None,
        })
    }

    pub fn paths(&self) -> impl Iterator<Item = &PathShape> {
        self.shapes.iter().filter_map(|shape| match shape {
            Shape::Path(path) => Some(path),
            _ => None,
        })
    }

    /// Replays every shape in order; `base` maps user space to the device.
    pub fn paint(&self, device: &mut dyn Device, base: &Matrix) -> PDFResult<()> {
        for shape in &self.shapes {
            match shape {
                Shape::Path(path) => device.draw_path(path, base)?,
                Shape::Text(run) => {
                    if !run.render_mode.is_invisible() {
                        device.draw_text(run, base)?;
                    }
                }
                Shape::Image(image) => device.draw_image(image, base)?,
                Shape::Shading(shading) => device.draw_shading(shading, base)?,
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Shapes {
    type Item = &'a Shape;
    type IntoIter = std::slice::Iter<'a, Shape>;

    fn into_iter(self) -> Self::IntoIter {
        self.shapes.iter()
    }
}
