//! Path geometry in user space.
//!
//! Paths are recorded untransformed; the CTM captured at paint time travels
//! with the shape that owns the path.

use super::graphics_state::FillRule;
use super::matrix::Matrix;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathElement {
    MoveTo(f64, f64),
    LineTo(f64, f64),
    /// Cubic Bézier (cp1x, cp1y, cp2x, cp2y, x, y)
    CurveTo(f64, f64, f64, f64, f64, f64),
    ClosePath,
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathElement::MoveTo(x, y) => write!(f, "M {} {}", x, y),
            PathElement::LineTo(x, y) => write!(f, "L {} {}", x, y),
            PathElement::CurveTo(x1, y1, x2, y2, x, y) => {
                write!(f, "C {} {} {} {} {} {}", x1, y1, x2, y2, x, y)
            }
            PathElement::ClosePath => write!(f, "Z"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    elements: Vec<PathElement>,
    current_point: Option<(f64, f64)>,
    subpath_start: Option<(f64, f64)>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.elements.clear();
        self.current_point = None;
        self.subpath_start = None;
    }

    pub fn move_to(&mut self, x: f64, y: f64) {
        self.elements.push(PathElement::MoveTo(x, y));
        self.current_point = Some((x, y));
        self.subpath_start = Some((x, y));
    }

    /// Appends a line; without a current point this degrades to a move.
    pub fn line_to(&mut self, x: f64, y: f64) {
        if self.current_point.is_none() {
            self.move_to(x, y);
            return;
        }
        self.elements.push(PathElement::LineTo(x, y));
        self.current_point = Some((x, y));
    }

    pub fn curve_to(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, x: f64, y: f64) {
        if self.current_point.is_none() {
            self.move_to(x1, y1);
        }
        self.elements.push(PathElement::CurveTo(x1, y1, x2, y2, x, y));
        self.current_point = Some((x, y));
    }

    /// `re`: a closed four-sided subpath starting at (x, y).
    pub fn rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.move_to(x, y);
        self.line_to(x + width, y);
        self.line_to(x + width, y + height);
        self.line_to(x, y + height);
        self.close_path();
    }

    pub fn close_path(&mut self) {
        if self.current_point.is_none() {
            return;
        }
        if self.elements.last() != Some(&PathElement::ClosePath) {
            self.elements.push(PathElement::ClosePath);
        }
        self.current_point = self.subpath_start;
    }

    pub fn current_point(&self) -> Option<(f64, f64)> {
        self.current_point
    }

    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// (min_x, min_y, max_x, max_y) over all points, control points included.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut points = self.elements.iter().flat_map(|el| match *el {
            PathElement::MoveTo(x, y) | PathElement::LineTo(x, y) => vec![(x, y)],
            PathElement::CurveTo(x1, y1, x2, y2, x, y) => vec![(x1, y1), (x2, y2), (x, y)],
            PathElement::ClosePath => Vec::new(),
        });
        let (x0, y0) = points.next()?;
        Some(points.fold((x0, y0, x0, y0), |(min_x, min_y, max_x, max_y), (x, y)| {
            (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
        }))
    }

    /// Returns (x, y, width, height) when the path is exactly one `re` rectangle.
    pub fn as_rect(&self) -> Option<(f64, f64, f64, f64)> {
        match self.elements.as_slice() {
            [
                PathElement::MoveTo(x0, y0),
                PathElement::LineTo(x1, y1),
                PathElement::LineTo(x2, y2),
                PathElement::LineTo(x3, y3),
                PathElement::ClosePath,
            ] if y1 == y0 && x2 == x1 && y3 == y2 && x3 == x0 => {
                Some((*x0, *y0, x1 - x0, y2 - y0))
            }
            _ => None,
        }
    }

    /// A copy with every point mapped through `matrix`.
    pub fn transformed(&self, matrix: &Matrix) -> Path {
        let map = |x: f64, y: f64| matrix.transform_point(x, y);
        let elements = self
            .elements
            .iter()
            .map(|el| match *el {
                PathElement::MoveTo(x, y) => {
                    let (x, y) = map(x, y);
                    PathElement::MoveTo(x, y)
                }
                PathElement::LineTo(x, y) => {
                    let (x, y) = map(x, y);
                    PathElement::LineTo(x, y)
                }
                PathElement::CurveTo(x1, y1, x2, y2, x, y) => {
                    let (x1, y1) = map(x1, y1);
                    let (x2, y2) = map(x2, y2);
                    let (x, y) = map(x, y);
                    PathElement::CurveTo(x1, y1, x2, y2, x, y)
                }
                PathElement::ClosePath => PathElement::ClosePath,
            })
            .collect();
        Path {
            elements,
            current_point: self.current_point.map(|(x, y)| map(x, y)),
            subpath_start: self.subpath_start.map(|(x, y)| map(x, y)),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, el) in self.elements.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", el)?;
        }
        Ok(())
    }
}

/// One clipping region, intersected with every region in `outer`.
///
/// The chain is immutable and shared between graphics-state snapshots, so
/// `q` only bumps a reference count.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipPath {
    pub path: Path,
    /// CTM in effect when the clip was set
    pub transform: Matrix,
    pub rule: FillRule,
    pub outer: Option<Arc<ClipPath>>,
}

impl ClipPath {
    pub fn intersect(
        outer: Option<Arc<ClipPath>>,
        path: Path,
        transform: Matrix,
        rule: FillRule,
    ) -> Arc<ClipPath> {
        Arc::new(ClipPath {
            path,
            transform,
            rule,
            outer,
        })
    }

    /// Number of regions in the chain, this one included.
    pub fn depth(&self) -> usize {
        1 + self.outer.as_ref().map_or(0, |outer| outer.depth())
    }

    /// Regions from outermost to innermost.
    pub fn regions(&self) -> Vec<&ClipPath> {
        let mut chain = match &self.outer {
            Some(outer) => outer.regions(),
            None => Vec::new(),
        };
        chain.push(self);
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_without_move_is_a_move() {
        let mut path = Path::new();
        path.line_to(30.0, 40.0);
        assert_eq!(path.elements(), &[PathElement::MoveTo(30.0, 40.0)]);
    }

    #[test]
    fn test_close_returns_to_subpath_start() {
        let mut path = Path::new();
        path.move_to(10.0, 20.0);
        path.line_to(30.0, 40.0);
        path.close_path();
        path.close_path();
        assert_eq!(path.current_point(), Some((10.0, 20.0)));
        assert_eq!(path.len(), 3);
    }

    #[test]
    fn test_rect() {
        let mut path = Path::new();
        path.rect(10.0, 20.0, 100.0, 50.0);
        assert_eq!(path.len(), 5);
        assert_eq!(path.as_rect(), Some((10.0, 20.0, 100.0, 50.0)));
        assert_eq!(path.bounds(), Some((10.0, 20.0, 110.0, 70.0)));
    }

    #[test]
    fn test_bounds_include_control_points() {
        let mut path = Path::new();
        path.move_to(0.0, 0.0);
        path.curve_to(5.0, 30.0, 10.0, -10.0, 20.0, 0.0);
        assert_eq!(path.bounds(), Some((0.0, -10.0, 20.0, 30.0)));
        assert_eq!(path.as_rect(), None);
    }

    #[test]
    fn test_transformed() {
        let mut path = Path::new();
        path.rect(0.0, 0.0, 50.0, 50.0);
        let scaled = path.transformed(&Matrix::scale(2.0, 2.0));
        assert_eq!(scaled.as_rect(), Some((0.0, 0.0, 100.0, 100.0)));
    }

    #[test]
    fn test_clip_chain() {
        let mut outer_path = Path::new();
        outer_path.rect(0.0, 0.0, 100.0, 100.0);
        let outer = ClipPath::intersect(None, outer_path, Matrix::IDENTITY, FillRule::NonZero);

        let mut inner_path = Path::new();
        inner_path.rect(10.0, 10.0, 10.0, 10.0);
        let inner = ClipPath::intersect(
            Some(outer.clone()),
            inner_path,
            Matrix::IDENTITY,
            FillRule::EvenOdd,
        );

        assert_eq!(inner.depth(), 2);
        let regions = inner.regions();
        assert_eq!(regions[0].rule, FillRule::NonZero);
        assert_eq!(regions[1].rule, FillRule::EvenOdd);
    }
}
