//! Page boundaries and the page-to-device transform.
//!
//! Everything here works on a resolved boundary rectangle, a total rotation
//! in degrees and a zoom factor, so it can be exercised without a document.
//! Device space has its origin at the top-left corner of the rotated,
//! zoomed page with y growing downwards.

use crate::rendering::matrix::Matrix;
use std::fmt;

/// Rectangle in default user space, stored with its lower-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PRectangle {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// US Letter, used when a page has no media box anywhere in its tree.
pub const US_LETTER: PRectangle = PRectangle {
    x: 0.0,
    y: 0.0,
    width: 612.0,
    height: 792.0,
};

impl PRectangle {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        PRectangle {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a rectangle from any two opposite corners.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        PRectangle {
            x: x1.min(x2),
            y: y1.min(y2),
            width: (x2 - x1).abs(),
            height: (y2 - y1).abs(),
        }
    }

    /// Parses a PDF rectangle array `[llx lly urx ury]`, in any corner order.
    pub fn from_array(values: &[f64]) -> Option<Self> {
        match values {
            [x1, y1, x2, y2, ..] => Some(Self::from_corners(*x1, *y1, *x2, *y2)),
            _ => None,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn top(&self) -> f64 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Overlap of two rectangles; `None` when they do not overlap.
    pub fn intersection(&self, other: &PRectangle) -> Option<PRectangle> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.top().min(other.top());
        (x2 > x1 && y2 > y1).then(|| PRectangle::new(x1, y1, x2 - x1, y2 - y1))
    }

    /// Corners in the order top-left, top-right, bottom-right, bottom-left.
    pub fn corners(&self) -> [(f64, f64); 4] {
        [
            (self.x, self.top()),
            (self.right(), self.top()),
            (self.right(), self.y),
            (self.x, self.y),
        ]
    }

    /// Smallest axis-aligned rectangle holding `points`.
    pub fn bounding(points: &[(f64, f64)]) -> Option<PRectangle> {
        let (&(x0, y0), rest) = points.split_first()?;
        let (min_x, min_y, max_x, max_y) = rest.iter().fold(
            (x0, y0, x0, y0),
            |(min_x, min_y, max_x, max_y), &(x, y)| {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            },
        );
        Some(PRectangle::new(min_x, min_y, max_x - min_x, max_y - min_y))
    }

    /// Axis-aligned bounds of this rectangle mapped through `matrix`.
    pub fn transformed(&self, matrix: &Matrix) -> PRectangle {
        let points = self.corners().map(|(x, y)| matrix.transform_point(x, y));
        PRectangle::bounding(&points).unwrap_or_default()
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.x, self.y, self.right(), self.top()]
    }
}

impl fmt::Display for PRectangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} {} {} {}]",
            self.x,
            self.y,
            self.right(),
            self.top()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PDimension {
    pub width: f64,
    pub height: f64,
}

impl PDimension {
    pub fn new(width: f64, height: f64) -> Self {
        PDimension { width, height }
    }
}

/// The five page boundaries (PDF 14.11.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Boundary {
    Media = 1,
    #[default]
    Crop = 2,
    Bleed = 3,
    Trim = 4,
    Art = 5,
}

impl Boundary {
    pub const ALL: [Boundary; 5] = [
        Boundary::Media,
        Boundary::Crop,
        Boundary::Bleed,
        Boundary::Trim,
        Boundary::Art,
    ];

    /// Maps a numeric boundary constant; anything unknown means the crop box.
    pub fn from_constant(value: i32) -> Self {
        match value {
            1 => Boundary::Media,
            3 => Boundary::Bleed,
            4 => Boundary::Trim,
            5 => Boundary::Art,
            _ => Boundary::Crop,
        }
    }

    /// Page dictionary key holding this boundary.
    pub fn key(self) -> &'static str {
        match self {
            Boundary::Media => "MediaBox",
            Boundary::Crop => "CropBox",
            Boundary::Bleed => "BleedBox",
            Boundary::Trim => "TrimBox",
            Boundary::Art => "ArtBox",
        }
    }
}

/// Combines a page's stored `/Rotate` with a viewer rotation.
///
/// `/Rotate` is clockwise while the transform rotates counter-clockwise, so
/// the stored value is negated first. The result lies in `[0, 360)` and is
/// snapped onto a right angle when it is within float noise of one.
pub fn total_rotation(stored_rotation: f64, user_rotation: f64) -> f64 {
    let page_rotation = (360.0 - stored_rotation) % 360.0;
    let mut total = (page_rotation + user_rotation) % 360.0;
    if total < 0.0 {
        total += 360.0;
    }

    const SNAPS: [(f64, f64, f64); 4] = [
        (-0.001, 0.001, 0.0),
        (89.99, 90.001, 90.0),
        (179.99, 180.001, 180.0),
        (269.99, 270.001, 270.0),
    ];
    SNAPS
        .iter()
        .find(|(low, high, _)| (*low..=*high).contains(&total))
        .map_or(total, |(_, _, snapped)| *snapped)
}

/// Axis-aligned bounds of the zoomed boundary rotated about the origin.
pub fn bounding_box(boundary: &PRectangle, rotation: f64, zoom: f64) -> PRectangle {
    let width = boundary.width * zoom;
    let height = boundary.height * zoom;
    let rotate = Matrix::rotate_degrees(rotation);
    let mut points = vec![(0.0, 0.0)];
    points.extend(
        [(0.0, height), (width, height), (0.0, 0.0), (width, 0.0)]
            .iter()
            .map(|&(x, y)| rotate.transform_point(x, y)),
    );
    PRectangle::bounding(&points).unwrap_or_default()
}

/// Device size of the page: right angles swap or keep the sides, any other
/// angle uses the rotated bounds.
pub fn size(boundary: &PRectangle, rotation: f64, zoom: f64) -> PDimension {
    let width = boundary.width * zoom;
    let height = boundary.height * zoom;
    if rotation == 0.0 || rotation == 180.0 {
        PDimension::new(width, height)
    } else if rotation == 90.0 || rotation == 270.0 {
        PDimension::new(height, width)
    } else {
        let bounds = bounding_box(boundary, rotation, zoom);
        PDimension::new(bounds.width, bounds.height)
    }
}

/// Maps default user space onto device space.
///
/// Composition order, outermost first: move down by the rotated page
/// height, flip y, zoom, shift the rotated page back into the positive
/// quadrant, rotate, and finally move the boundary's lower-left corner to
/// the origin.
pub fn page_transform(boundary: &PRectangle, rotation: f64, zoom: f64) -> Matrix {
    let bounds = bounding_box(boundary, rotation, zoom);
    let (w, h) = (boundary.width, boundary.height);

    let shift = if rotation == 0.0 {
        Matrix::IDENTITY
    } else if rotation == 90.0 {
        Matrix::translate(h, 0.0)
    } else if rotation == 180.0 {
        Matrix::translate(w, h)
    } else if rotation == 270.0 {
        Matrix::translate(0.0, w)
    } else if rotation < 90.0 {
        Matrix::translate(h * (90.0 - rotation).to_radians().cos(), 0.0)
    } else if rotation < 180.0 {
        let (sin, cos) = (180.0 - rotation).to_radians().sin_cos();
        Matrix::translate(h * sin + w * cos, h * cos)
    } else if rotation < 270.0 {
        let (sin, cos) = (rotation - 180.0).to_radians().sin_cos();
        Matrix::translate(w * cos, w * sin + h * cos)
    } else {
        Matrix::translate(0.0, w * (rotation - 270.0).to_radians().cos())
    };

    // Each step applies before the ones already composed.
    [
        Matrix::translate(0.0, bounds.height),
        Matrix::scale(1.0, -1.0),
        Matrix::scale(zoom, zoom),
        shift,
        Matrix::rotate_degrees(rotation),
        Matrix::translate(-boundary.x, -boundary.y),
    ]
    .iter()
    .fold(Matrix::IDENTITY, |composed, step| step.multiply(&composed))
}

/// The boundary's corners in device space, in [`PRectangle::corners`] order.
pub fn page_shape(boundary: &PRectangle, rotation: f64, zoom: f64) -> [(f64, f64); 4] {
    let transform = page_transform(boundary, rotation, zoom);
    boundary
        .corners()
        .map(|(x, y)| transform.transform_point(x, y))
}
