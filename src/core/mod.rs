pub mod annotation;
pub mod base_stream;
pub mod cmap;
pub mod color_space;
pub mod config;
pub mod content_parser;
pub mod content_stream;
pub mod decode;
pub mod document;
pub mod error;
pub mod ext_gstate;
pub mod font;
pub mod geometry;
pub mod image;
pub mod lexer;
pub mod library;
pub mod node;
pub mod page;
pub mod page_tree;
pub mod parser;
pub mod pattern;
pub mod resources;
pub mod stream;
pub mod xobject;

pub use annotation::{Annotation, AnnotationType};
pub use base_stream::BaseStream;
pub use color_space::ColorSpace;
pub use config::{LibraryOptions, ParserOptions, RenderHints, RenderTarget};
pub use content_parser::{ContentParser, TextBlock, TextItem};
pub use content_stream::{ContentStreamReader, OpCode, Operation};
pub use document::{Document, DocumentOptions};
pub use error::{PDFError, PDFResult};
pub use font::Font;
pub use geometry::{Boundary, PDimension, PRectangle};
pub use image::{DefaultImageDecoder, ImageData, ImageDecoder, ImageXObject};
pub use lexer::{Lexer, Token};
pub use library::Library;
pub use node::Node;
pub use page::Page;
pub use parser::{Dict, ObjRef, PDFObject, Parser, PdfStream};
pub use resources::{ResourceChain, Resources, XObject};
pub use stream::Stream;
pub use xobject::FormXObject;
