//! Classification of document objects by role.
//!
//! Objects stay plain [`PDFObject`]s in the [`Library`]; a [`Node`] is a
//! borrowed view that says what an object is used as, so callers can match
//! on the role instead of probing dictionary keys.

use super::library::Library;
use super::parser::{Dict, PDFObject, PdfStream};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Node<'a> {
    Page(&'a Dict),
    /// Intermediate `/Pages` node
    PageTree(&'a Dict),
    Form(&'a Arc<PdfStream>),
    Image(&'a Arc<PdfStream>),
    Annotation(&'a Dict),
    /// Any other stream (content, font program, ...)
    Stream(&'a Arc<PdfStream>),
    Dictionary(&'a Dict),
    Other(&'a PDFObject),
}

/// Resolves `object` and classifies it.
pub fn classify<'a>(library: &'a Library, object: &'a PDFObject) -> Node<'a> {
    match library.resolve(object) {
        PDFObject::Stream(stream) => match library.get_name(&stream.dict, "Subtype") {
            Some("Form") => Node::Form(stream),
            Some("Image") => Node::Image(stream),
            _ => Node::Stream(stream),
        },
        PDFObject::Dictionary(dict) => classify_dict(library, dict),
        other => Node::Other(other),
    }
}

fn classify_dict<'a>(library: &'a Library, dict: &'a Dict) -> Node<'a> {
    match library.get_name(dict, "Type") {
        Some("Page") => Node::Page(dict),
        Some("Pages") => Node::PageTree(dict),
        Some("Annot") => Node::Annotation(dict),
        Some(_) => Node::Dictionary(dict),
        // Untyped: tree nodes have kids, annotations have a subtype and rect.
        None if dict.contains_key("Kids") => Node::PageTree(dict),
        None if dict.contains_key("Subtype") && dict.contains_key("Rect") => {
            Node::Annotation(dict)
        }
        None if dict.contains_key("Contents") && dict.contains_key("Parent") => Node::Page(dict),
        None => Node::Dictionary(dict),
    }
}

impl<'a> Node<'a> {
    /// Dictionary of the node, for streams the stream dictionary.
    pub fn dict(&self) -> Option<&'a Dict> {
        match *self {
            Node::Page(dict)
            | Node::PageTree(dict)
            | Node::Annotation(dict)
            | Node::Dictionary(dict) => Some(dict),
            Node::Form(stream) | Node::Image(stream) | Node::Stream(stream) => Some(&stream.dict),
            Node::Other(object) => object.as_dict(),
        }
    }

    pub fn is_page(&self) -> bool {
        matches!(self, Node::Page(_))
    }
}

impl fmt::Display for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Node::Page(_) => "page",
            Node::PageTree(_) => "page tree",
            Node::Form(_) => "form",
            Node::Image(_) => "image",
            Node::Annotation(_) => "annotation",
            Node::Stream(_) => "stream",
            Node::Dictionary(_) => "dictionary",
            Node::Other(_) => "object",
        };
        f.write_str(kind)
    }
}
