//! Patterns and shadings (PDF 8.7).
//!
//! Only the parameters a device needs to paint are extracted; function
//! dictionaries and vertex data stay in `dict` for the device to interpret.

use super::color_space::ColorSpace;
use super::library::Library;
use super::parser::{Dict, ObjRef, PDFObject, PdfStream};
use crate::rendering::matrix::Matrix;
use log::debug;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct Shading {
    /// 1 function, 2 axial, 3 radial, 4-7 meshes
    pub shading_type: i64,
    pub color_space: ColorSpace,
    pub bbox: Option<[f64; 4]>,
    pub background: Option<Vec<f64>>,
    pub anti_alias: bool,
    pub dict: Dict,
    /// Mesh shadings carry their vertex data in a stream
    pub stream: Option<Arc<PdfStream>>,
}

impl Shading {
    pub fn parse(library: &Library, object: &PDFObject) -> Option<Shading> {
        let object = library.resolve(object);
        let dict = object.as_dict()?;
        let shading_type = library.get_int(dict, "ShadingType")?;
        if !(1..=7).contains(&shading_type) {
            debug!("unknown shading type {}", shading_type);
            return None;
        }
        let color_space = library
            .get_object(dict, "ColorSpace")
            .and_then(|cs| ColorSpace::parse(library, cs))?;
        Some(Shading {
            shading_type,
            color_space,
            bbox: library
                .get_number_array(dict, "BBox")
                .and_then(|b| <[f64; 4]>::try_from(b.get(..4)?).ok()),
            background: library.get_number_array(dict, "Background"),
            anti_alias: library.get_bool(dict, "AntiAlias").unwrap_or(false),
            dict: dict.clone(),
            stream: object.as_stream().cloned(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaintType {
    /// Tile content specifies its own colours
    Coloured,
    /// Tile is a stencil painted with the colour given to `scn`
    Uncoloured,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TilingPattern {
    pub obj_ref: Option<ObjRef>,
    pub paint_type: PaintType,
    pub tiling_type: i64,
    pub bbox: [f64; 4],
    pub x_step: f64,
    pub y_step: f64,
    pub matrix: Matrix,
    /// Tile content stream, painted like a form
    pub stream: Arc<PdfStream>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShadingPattern {
    pub shading: Arc<Shading>,
    pub matrix: Matrix,
    pub ext_gstate: Option<Dict>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Tiling(TilingPattern),
    Shading(ShadingPattern),
}

impl Pattern {
    pub fn parse(library: &Library, object: &PDFObject) -> Option<Pattern> {
        let obj_ref = object.as_obj_ref();
        let object = library.resolve(object);
        let dict = object.as_dict()?;
        let matrix = library
            .get_matrix(dict, "Matrix")
            .unwrap_or(Matrix::IDENTITY);

        match library.get_int(dict, "PatternType")? {
            1 => {
                let stream = object.as_stream()?.clone();
                let bbox = library
                    .get_number_array(dict, "BBox")
                    .and_then(|b| <[f64; 4]>::try_from(b.get(..4)?).ok())?;
                Some(Pattern::Tiling(TilingPattern {
                    obj_ref: obj_ref.or(stream.obj_ref),
                    paint_type: match library.get_int(dict, "PaintType") {
                        Some(2) => PaintType::Uncoloured,
                        _ => PaintType::Coloured,
                    },
                    tiling_type: library.get_int(dict, "TilingType").unwrap_or(1),
                    bbox,
                    x_step: library.get_number(dict, "XStep").unwrap_or(bbox[2] - bbox[0]),
                    y_step: library.get_number(dict, "YStep").unwrap_or(bbox[3] - bbox[1]),
                    matrix,
                    stream,
                }))
            }
            2 => {
                let shading = Shading::parse(library, dict.get("Shading")?)?;
                Some(Pattern::Shading(ShadingPattern {
                    shading: Arc::new(shading),
                    matrix,
                    ext_gstate: library.get_dictionary(dict, "ExtGState").cloned(),
                }))
            }
            other => {
                debug!("unknown pattern type {}", other);
                None
            }
        }
    }

    pub fn matrix(&self) -> &Matrix {
        match self {
            Pattern::Tiling(tiling) => &tiling.matrix,
            Pattern::Shading(shading) => &shading.matrix,
        }
    }
}
