//! Form XObjects.
//!
//! A form is a self-contained content stream with its own `/Matrix`,
//! `/BBox` and optional `/Resources`. Forms reached through `Do` are
//! reparsed on every invocation and spliced into the invoking display list;
//! a form used on its own (annotation appearances) parses once on
//! [`init`](FormXObject::init) and replays its cached [`Shapes`].

use super::config::ParserOptions;
use super::content_parser::{ContentParser, TextBlock};
use super::decode::Decoded;
use super::error::PDFResult;
use super::geometry::PRectangle;
use super::image::{DefaultImageDecoder, ImageDecoder};
use super::library::Library;
use super::parser::{Dict, ObjRef, PdfStream};
use super::resources::{ResourceChain, Resources};
use crate::rendering::device::Device;
use crate::rendering::graphics_state::{FillRule, GraphicsState};
use crate::rendering::matrix::Matrix;
use crate::rendering::path::{ClipPath, Path};
use crate::rendering::shapes::Shapes;
use log::warn;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct FormContent {
    inited: bool,
    shapes: Arc<Shapes>,
}

pub struct FormXObject {
    library: Arc<Library>,
    stream: Arc<PdfStream>,
    pub id: u32,
    pub obj_ref: Option<ObjRef>,
    pub bbox: Option<PRectangle>,
    pub matrix: Matrix,
    /// The form's own `/Resources`, if it has any
    resources: Option<Arc<Resources>>,
    /// Scopes of whatever invokes the form, searched after its own
    parent: ResourceChain,
    graphics_state: Option<GraphicsState>,
    options: ParserOptions,
    image_decoder: Arc<dyn ImageDecoder>,
    content: Mutex<FormContent>,
}

impl FormXObject {
    pub fn new(library: Arc<Library>, stream: Arc<PdfStream>) -> Self {
        let dict = &stream.dict;
        let obj_ref = stream.obj_ref;
        let resources = library
            .get_resources(dict)
            .map(|resources| Arc::new(Resources::new(library.clone(), resources.clone())));
        FormXObject {
            id: obj_ref.map_or_else(|| library.next_id(), |r| r.num),
            obj_ref,
            bbox: library.get_rectangle(dict, "BBox"),
            matrix: library.get_matrix(dict, "Matrix").unwrap_or(Matrix::IDENTITY),
            resources,
            parent: ResourceChain::empty(),
            graphics_state: None,
            options: ParserOptions::default(),
            image_decoder: Arc::new(DefaultImageDecoder),
            content: Mutex::new(FormContent::default()),
            stream,
            library,
        }
    }

    pub fn dict(&self) -> &Dict {
        &self.stream.dict
    }

    pub fn stream(&self) -> &Arc<PdfStream> {
        &self.stream
    }

    pub fn resources(&self) -> Option<&Arc<Resources>> {
        self.resources.as_ref()
    }

    /// Resources of the invoking page or form.
    pub fn set_parent_resources(&mut self, parent: ResourceChain) {
        self.parent = parent;
    }

    /// State at the point of invocation; `ctm` is the invoking CTM.
    pub fn set_graphics_state(&mut self, state: GraphicsState) {
        self.graphics_state = Some(state);
    }

    pub fn set_options(&mut self, options: ParserOptions) {
        self.options = options;
    }

    pub fn set_image_decoder(&mut self, decoder: Arc<dyn ImageDecoder>) {
        self.image_decoder = decoder;
    }

    /// Own resources first, then the parent's scopes.
    pub fn resource_chain(&self) -> ResourceChain {
        match &self.resources {
            Some(resources) => self.parent.with_inner(resources.clone()),
            None => self.parent.clone(),
        }
    }

    /// The invoking state with `/Matrix` applied and clipped to `/BBox`.
    pub fn initial_state(&self) -> GraphicsState {
        let mut state = self.graphics_state.clone().unwrap_or_default();
        state.concat_matrix(&self.matrix);
        if let Some(bbox) = self.bbox {
            let mut path = Path::new();
            path.rect(bbox.x, bbox.y, bbox.width, bbox.height);
            state.clip = Some(ClipPath::intersect(
                state.clip.take(),
                path,
                state.ctm,
                FillRule::NonZero,
            ));
        }
        state
    }

    /// Decoded content bytes.
    pub fn data(&self) -> PDFResult<Arc<Decoded>> {
        self.library.decode_stream(&self.stream)
    }

    /// Parser for this form's content when invoked from `parser`.
    fn parser_under(&self, parser: &ContentParser) -> ContentParser {
        parser.nested(self.resource_chain(), self.initial_state(), self.obj_ref)
    }

    fn parse_under(&self, parser: &ContentParser) -> PDFResult<Shapes> {
        let data = self.data()?;
        self.parser_under(parser).parse(&data.data)
    }

    /// Content as spliced into an invoking stream; a form that fails to
    /// parse contributes nothing.
    pub(crate) fn parse_nested(&self, parser: &ContentParser) -> Shapes {
        self.parse_under(parser).unwrap_or_else(|e| {
            warn!("form {} not painted: {}", self.id, e);
            Shapes::new()
        })
    }

    pub(crate) fn text_blocks_nested(&self, parser: &ContentParser) -> Vec<TextBlock> {
        let blocks = self
            .data()
            .and_then(|data| self.parser_under(parser).parse_text_blocks(&data.data));
        blocks.unwrap_or_else(|e| {
            warn!("form {} text skipped: {}", self.id, e);
            Vec::new()
        })
    }

    fn root_parser(&self) -> ContentParser {
        ContentParser::new(self.library.clone(), self.parent.clone())
            .with_options(self.options.clone())
            .with_image_decoder(self.image_decoder.clone())
    }

    fn lock(&self) -> MutexGuard<'_, FormContent> {
        self.content
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn initialized(&self) -> MutexGuard<'_, FormContent> {
        let mut content = self.lock();
        if !content.inited {
            content.shapes = Arc::new(self.parse_nested(&self.root_parser()));
            content.inited = true;
        }
        content
    }

    /// Parses the content once; later calls return immediately.
    pub fn init(&self) {
        drop(self.initialized());
    }

    pub fn is_inited(&self) -> bool {
        self.lock().inited
    }

    pub fn shapes(&self) -> Arc<Shapes> {
        self.initialized().shapes.clone()
    }

    /// Replays the form's shapes; `base` maps user space to the device.
    pub fn paint(&self, device: &mut dyn Device, base: &Matrix) -> PDFResult<()> {
        let shapes = self.shapes();
        device.save_state();
        let result = shapes.paint(device, base);
        device.restore_state();
        result
    }

    /// Drops the parsed shapes and memoized fonts; the form can init again.
    pub fn dispose(&self) {
        let mut content = self.lock();
        content.inited = false;
        content.shapes = Arc::new(Shapes::new());
        if let Some(resources) = &self.resources {
            resources.dispose();
        }
    }
}

impl fmt::Debug for FormXObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormXObject")
            .field("id", &self.id)
            .field("obj_ref", &self.obj_ref)
            .field("bbox", &self.bbox)
            .field("matrix", &self.matrix)
            .field("has_resources", &self.resources.is_some())
            .field("parent_scopes", &self.parent.scopes().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::Parser;
    use crate::rendering::device::{RecordedOp, RecordingDevice};

    fn form(source: &str, num: u32) -> (Arc<Library>, FormXObject) {
        let mut library = Library::default();
        let object = Parser::from_bytes(source.as_bytes().to_vec())
            .get_object()
            .unwrap();
        let mut stream = object.as_stream().unwrap().as_ref().clone();
        stream.obj_ref = Some(ObjRef::new(num, 0));
        library.insert(
            ObjRef::new(num, 0),
            crate::core::parser::PDFObject::Stream(Arc::new(stream.clone())),
        );
        let library = Arc::new(library);
        let form = FormXObject::new(library.clone(), Arc::new(stream));
        (library, form)
    }

    #[test]
    fn test_form_metadata() {
        let (_, form) = form(
            "<< /Subtype /Form /BBox [0 0 20 10] /Matrix [2 0 0 2 5 5] /Length 0 >>\nstream\n\nendstream",
            3,
        );
        assert_eq!(form.id, 3);
        assert_eq!(form.bbox, Some(PRectangle::new(0.0, 0.0, 20.0, 10.0)));
        assert_eq!(form.matrix, Matrix::new(2.0, 0.0, 0.0, 2.0, 5.0, 5.0));
        assert!(form.resources().is_none());
        assert!(form.shapes().is_empty());
    }

    #[test]
    fn test_init_is_idempotent() {
        let (_, form) = form(
            "<< /Subtype /Form /BBox [0 0 20 10] /Length 14 >>\nstream\n0 0 5 5 re f\n\nendstream",
            4,
        );
        assert!(!form.is_inited());
        form.init();
        let first = form.shapes();
        form.init();
        assert!(Arc::ptr_eq(&first, &form.shapes()));
        assert_eq!(first.len(), 1);

        form.dispose();
        assert!(!form.is_inited());
        assert_eq!(form.shapes().len(), 1);
    }

    #[test]
    fn test_initial_state_uses_invoking_ctm() {
        let (_, mut form) = form(
            "<< /Subtype /Form /BBox [0 0 20 10] /Matrix [2 0 0 2 0 0] /Length 0 >>\nstream\n\nendstream",
            5,
        );
        form.set_graphics_state(GraphicsState::with_ctm(Matrix::translate(100.0, 0.0)));
        let state = form.initial_state();
        assert_eq!(state.ctm, Matrix::new(2.0, 0.0, 0.0, 2.0, 100.0, 0.0));
        let clip = state.clip.unwrap();
        assert_eq!(clip.path.as_rect(), Some((0.0, 0.0, 20.0, 10.0)));
        assert_eq!(clip.depth(), 1);
    }

    #[test]
    fn test_corrupt_content_gives_empty_shapes() {
        let (_, form) = form(
            "<< /Subtype /Form /BBox [0 0 1 1] /Filter /FlateDecode /Length 4 >>\nstream\njunk\nendstream",
            6,
        );
        assert!(form.shapes().is_empty());
        assert!(form.is_inited());
    }

    #[test]
    fn test_paint_is_balanced() {
        let (_, form) = form(
            "<< /Subtype /Form /BBox [0 0 20 10] /Length 14 >>\nstream\n0 0 5 5 re f\n\nendstream",
            7,
        );
        let mut device = RecordingDevice::new();
        form.paint(&mut device, &Matrix::IDENTITY).unwrap();
        assert_eq!(device.depth(), 0);
        assert!(matches!(device.operations()[1], RecordedOp::Path { fill: true, .. }));
    }
}
