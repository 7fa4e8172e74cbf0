//! Paint target abstraction.
//!
//! The content parser never talks to a device. A device only sees finished
//! [`Shapes`](super::shapes::Shapes) replayed by a page or form, each call
//! carrying the `base` transform from user space to device space.

use super::graphics_state::Color;
use super::matrix::Matrix;
use super::shapes::{ImageShape, PathShape, ShadingShape, TextRun};
use crate::core::error::PDFResult;
use crate::core::geometry::PRectangle;

/// A backend that can paint shapes.
pub trait Device {
    fn save_state(&mut self);

    fn restore_state(&mut self);

    /// Intersects the device clip with `rect` given in the space of `base`.
    fn clip_rect(&mut self, rect: &PRectangle, base: &Matrix) -> PDFResult<()>;

    /// Fills `rect` (in the space of `base`) with a solid colour.
    fn fill_rect(&mut self, rect: &PRectangle, color: &Color, base: &Matrix) -> PDFResult<()>;

    fn draw_path(&mut self, shape: &PathShape, base: &Matrix) -> PDFResult<()>;

    fn draw_text(&mut self, run: &TextRun, base: &Matrix) -> PDFResult<()>;

    fn draw_image(&mut self, image: &ImageShape, base: &Matrix) -> PDFResult<()>;

    fn draw_shading(&mut self, shading: &ShadingShape, base: &Matrix) -> PDFResult<()>;
}

/// What a [`RecordingDevice`] saw, with coordinates in device space.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedOp {
    Save,
    Restore,
    ClipRect([(f64, f64); 4]),
    FillRect([(f64, f64); 4], Color),
    Path {
        fill: bool,
        stroke: bool,
        /// Device-space bounds `(min_x, min_y, max_x, max_y)`
        bounds: Option<(f64, f64, f64, f64)>,
    },
    Text {
        text: String,
        origin: (f64, f64),
    },
    Image {
        id: u32,
        has_pixels: bool,
        transform: Matrix,
    },
    Shading {
        shading_type: i64,
    },
}

/// Device that records what it is asked to paint.
///
/// Produces no pixels; used by tests and by `pdf-inspect` to report what a
/// page paints.
#[derive(Debug, Default)]
pub struct RecordingDevice {
    operations: Vec<RecordedOp>,
    depth: usize,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operations(&self) -> &[RecordedOp] {
        &self.operations
    }

    pub fn clear_operations(&mut self) {
        self.operations.clear();
    }

    /// Current `save_state` nesting.
    pub fn depth(&self) -> usize {
        self.depth
    }

    fn device_corners(rect: &PRectangle, base: &Matrix) -> [(f64, f64); 4] {
        rect.corners().map(|(x, y)| base.transform_point(x, y))
    }
}

impl Device for RecordingDevice {
    fn save_state(&mut self) {
        self.depth += 1;
        self.operations.push(RecordedOp::Save);
    }

    fn restore_state(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.operations.push(RecordedOp::Restore);
    }

    fn clip_rect(&mut self, rect: &PRectangle, base: &Matrix) -> PDFResult<()> {
        self.operations
            .push(RecordedOp::ClipRect(Self::device_corners(rect, base)));
        Ok(())
    }

    fn fill_rect(&mut self, rect: &PRectangle, color: &Color, base: &Matrix) -> PDFResult<()> {
        self.operations
            .push(RecordedOp::FillRect(Self::device_corners(rect, base), *color));
        Ok(())
    }

    fn draw_path(&mut self, shape: &PathShape, base: &Matrix) -> PDFResult<()> {
        let to_device = shape.transform.multiply(base);
        self.operations.push(RecordedOp::Path {
            fill: shape.fill.is_some(),
            stroke: shape.stroke,
            bounds: shape.path.transformed(&to_device).bounds(),
        });
        Ok(())
    }

    fn draw_text(&mut self, run: &TextRun, base: &Matrix) -> PDFResult<()> {
        let (x, y) = run.origin();
        self.operations.push(RecordedOp::Text {
            text: run.text.clone(),
            origin: base.transform_point(x, y),
        });
        Ok(())
    }

    fn draw_image(&mut self, image: &ImageShape, base: &Matrix) -> PDFResult<()> {
        self.operations.push(RecordedOp::Image {
            id: image.image.id,
            has_pixels: image.pixels.is_some(),
            transform: image.transform.multiply(base),
        });
        Ok(())
    }

    fn draw_shading(&mut self, shading: &ShadingShape, _base: &Matrix) -> PDFResult<()> {
        self.operations.push(RecordedOp::Shading {
            shading_type: shading.shading.shading_type,
        });
        Ok(())
    }
}
