//! PDF page content interpretation.
//!
//! Pages are loaded from a [`Document`], their content streams are
//! interpreted into a [`Shapes`] display list, and the display list is
//! replayed onto any [`Device`] through the page transform derived from the
//! page boundaries, rotation and zoom.

pub mod core;
pub mod rendering;

// Re-export main types for convenience
pub use core::{
    Boundary, ContentParser, Document, Library, Page, PDFError, PDFObject, PDFResult, PRectangle,
    RenderHints, ResourceChain, Resources,
};
pub use rendering::{Device, Matrix, RecordingDevice, Shape, Shapes};
