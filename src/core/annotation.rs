//! Page annotations and their normal appearance.

use super::config::RenderTarget;
use super::geometry::PRectangle;
use super::library::Library;
use super::parser::{Dict, ObjRef, PDFObject, PdfStream};
use super::xobject::FormXObject;
use crate::rendering::matrix::Matrix;
use log::debug;
use std::sync::Arc;

/// `/F` bits (PDF 12.5.3).
pub mod flags {
    pub const INVISIBLE: u32 = 1 << 0;
    pub const HIDDEN: u32 = 1 << 1;
    pub const PRINT: u32 = 1 << 2;
    pub const NO_ZOOM: u32 = 1 << 3;
    pub const NO_ROTATE: u32 = 1 << 4;
    pub const NO_VIEW: u32 = 1 << 5;
    pub const READ_ONLY: u32 = 1 << 6;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationType {
    Text,
    Link,
    FreeText,
    Line,
    Square,
    Circle,
    Highlight,
    Underline,
    StrikeOut,
    Stamp,
    Ink,
    Popup,
    Widget,
    Other(String),
}

impl AnnotationType {
    fn from_name(name: &str) -> Self {
        match name {
            "Text" => AnnotationType::Text,
            "Link" => AnnotationType::Link,
            "FreeText" => AnnotationType::FreeText,
            "Line" => AnnotationType::Line,
            "Square" => AnnotationType::Square,
            "Circle" => AnnotationType::Circle,
            "Highlight" => AnnotationType::Highlight,
            "Underline" => AnnotationType::Underline,
            "StrikeOut" => AnnotationType::StrikeOut,
            "Stamp" => AnnotationType::Stamp,
            "Ink" => AnnotationType::Ink,
            "Popup" => AnnotationType::Popup,
            "Widget" => AnnotationType::Widget,
            other => AnnotationType::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub obj_ref: Option<ObjRef>,
    pub subtype: AnnotationType,
    pub rect: PRectangle,
    pub flags: u32,
    /// Normal appearance stream, with `/AS` already applied
    pub appearance: Option<Arc<PdfStream>>,
    dict: Dict,
}

impl Annotation {
    /// Builds an annotation from an `/Annots` entry. Untyped dictionaries
    /// are accepted; one without a usable `/Rect` is not an annotation.
    pub fn from_object(library: &Library, object: &PDFObject) -> Option<Annotation> {
        let dict = library.resolve(object).as_dict()?;
        let Some(rect) = library.get_rectangle(dict, "Rect") else {
            debug!("annotation without /Rect skipped");
            return None;
        };
        Some(Annotation {
            obj_ref: object.as_obj_ref(),
            subtype: AnnotationType::from_name(library.get_name(dict, "Subtype").unwrap_or("")),
            rect,
            flags: library.get_int(dict, "F").map_or(0, |f| f as u32),
            appearance: normal_appearance(library, dict),
            dict: dict.clone(),
        })
    }

    pub fn dict(&self) -> &Dict {
        &self.dict
    }

    pub fn is_hidden(&self) -> bool {
        self.flags & flags::HIDDEN != 0
    }

    pub fn no_view(&self) -> bool {
        self.flags & flags::NO_VIEW != 0
    }

    pub fn printable(&self) -> bool {
        self.flags & flags::PRINT != 0
    }

    pub fn is_visible_for(&self, target: RenderTarget) -> bool {
        if self.is_hidden() {
            return false;
        }
        match target {
            RenderTarget::Screen => !self.no_view(),
            RenderTarget::Print => self.printable(),
        }
    }

    /// A form over the appearance stream, not yet positioned.
    pub fn appearance_form(&self, library: &Arc<Library>) -> Option<FormXObject> {
        let stream = self.appearance.as_ref()?;
        Some(FormXObject::new(library.clone(), stream.clone()))
    }

    /// Maps the appearance's bounding box, after its `/Matrix`, onto
    /// `/Rect` (PDF 12.5.5, algorithm 8.1).
    pub fn appearance_matrix(&self, form: &FormXObject) -> Matrix {
        let bbox = form.bbox.unwrap_or(self.rect);
        let transformed = bbox.transformed(&form.matrix);
        if transformed.width == 0.0 || transformed.height == 0.0 {
            return Matrix::translate(self.rect.x, self.rect.y);
        }
        Matrix::translate(-transformed.x, -transformed.y)
            .multiply(&Matrix::scale(
                self.rect.width / transformed.width,
                self.rect.height / transformed.height,
            ))
            .multiply(&Matrix::translate(self.rect.x, self.rect.y))
    }
}

/// `/AP /N`, either a stream or a state dictionary selected by `/AS`.
fn normal_appearance(library: &Library, dict: &Dict) -> Option<Arc<PdfStream>> {
    let normal = library.get_object(library.get_dictionary(dict, "AP")?, "N")?;
    if let Some(stream) = normal.as_stream() {
        return Some(stream.clone());
    }
    let states = normal.as_dict()?;
    let state = library.get_name(dict, "AS")?;
    library.get_stream(states, state).cloned()
}
