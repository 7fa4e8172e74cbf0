use super::annotation::Annotation;
use super::config::{ParserOptions, RenderHints};
use super::content_parser::{ContentParser, TextBlock};
use super::error::PDFResult;
use super::geometry::{self, Boundary, PDimension, PRectangle, US_LETTER};
use super::image::{DefaultImageDecoder, ImageDecoder};
use super::library::Library;
use super::page_tree::PageNode;
use super::parser::{Dict, ObjRef, PDFObject};
use super::resources::{ResourceChain, Resources};
use crate::rendering::device::Device;
use crate::rendering::graphics_state::GraphicsState;
use crate::rendering::matrix::Matrix;
use crate::rendering::shapes::{ImageShape, Shapes};
use log::{debug, warn};
use std::sync::{Arc, Mutex, MutexGuard};

/// Everything built by `init` and dropped by `dispose`.
#[derive(Default)]
struct PageContent {
    inited: bool,
    resources: Option<Arc<Resources>>,
    annotations: Vec<Arc<Annotation>>,
    /// Decoded `/Contents`, segments joined by a newline
    contents: Arc<Vec<u8>>,
    /// Content streams read by `init`, for cache eviction
    content_refs: Vec<ObjRef>,
    shapes: Arc<Shapes>,
    text: Option<Arc<Vec<TextBlock>>>,
}

/// A single page of a document.
///
/// The page dictionary and its ancestor chain are kept for the page's whole
/// life; content is parsed lazily by [`init`](Page::init) and can be dropped
/// with [`dispose`](Page::dispose) and rebuilt later. All lifecycle calls
/// take one per-page lock, so a page can be shared between threads.
///
/// A page dictionary contains properties like:
/// - MediaBox, CropBox: the page boundaries, inheritable from `/Pages` nodes
/// - Resources: fonts, images and other named resources, inheritable
/// - Contents: one content stream or an array of them
/// - Rotate: clockwise rotation in multiples of 90, inheritable
pub struct Page {
    library: Arc<Library>,
    index: usize,
    obj_ref: Option<ObjRef>,
    dict: Dict,
    /// Enclosing page tree nodes, nearest first
    ancestors: Vec<Dict>,
    options: ParserOptions,
    image_decoder: Arc<dyn ImageDecoder>,
    content: Mutex<PageContent>,
}

impl Page {
    /// Creates a page from a flattened page tree leaf.
    pub fn new(library: Arc<Library>, node: PageNode) -> Self {
        Page {
            library,
            index: node.index,
            obj_ref: node.obj_ref,
            dict: node.dict,
            ancestors: node.ancestors,
            options: ParserOptions::default(),
            image_decoder: Arc::new(DefaultImageDecoder),
            content: Mutex::new(PageContent::default()),
        }
    }

    pub fn with_options(mut self, options: ParserOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_image_decoder(mut self, decoder: Arc<dyn ImageDecoder>) -> Self {
        self.image_decoder = decoder;
        self
    }

    /// Returns the page index (0-based).
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn obj_ref(&self) -> Option<ObjRef> {
        self.obj_ref
    }

    pub fn dict(&self) -> &Dict {
        &self.dict
    }

    pub fn library(&self) -> &Arc<Library> {
        &self.library
    }

    /// Entry `key` of the page, or of the nearest ancestor that has it.
    fn inherited(&self, key: &str) -> Option<&PDFObject> {
        std::iter::once(&self.dict)
            .chain(&self.ancestors)
            .find_map(|dict| self.library.get_object(dict, key))
    }

    fn inherited_rect(&self, key: &str) -> Option<PRectangle> {
        let values = self.library.number_array(self.inherited(key)?)?;
        PRectangle::from_array(&values)
    }

    /// Resolves one of the five page boundaries; never fails.
    ///
    /// - MediaBox: page, else nearest ancestor, else US Letter.
    /// - CropBox: page or ancestor, clipped to the MediaBox; else MediaBox.
    /// - BleedBox, TrimBox, ArtBox: the page's own entry, else the CropBox.
    pub fn page_boundary(&self, boundary: Boundary) -> PRectangle {
        let media = self.inherited_rect("MediaBox").unwrap_or_else(|| {
            warn!("page {} has no MediaBox, assuming US Letter", self.index);
            US_LETTER
        });
        let crop = || match self.inherited_rect("CropBox") {
            Some(crop) => crop.intersection(&media).unwrap_or_else(|| {
                debug!("page {} CropBox lies outside its MediaBox", self.index);
                media
            }),
            None => media,
        };
        match boundary {
            Boundary::Media => media,
            Boundary::Crop => crop(),
            other => self
                .library
                .get_rectangle(&self.dict, other.key())
                .unwrap_or_else(crop),
        }
    }

    /// Stored `/Rotate` (inheritable), in degrees clockwise.
    pub fn stored_rotation(&self) -> f64 {
        self.inherited("Rotate")
            .and_then(PDFObject::as_f64)
            .unwrap_or(0.0)
    }

    /// The page's rotation combined with a viewer rotation, counter-clockwise
    /// in `[0, 360)`.
    pub fn total_rotation(&self, user_rotation: f64) -> f64 {
        geometry::total_rotation(self.stored_rotation(), user_rotation)
    }

    /// Transform from default user space to device space.
    pub fn page_transform(&self, boundary: Boundary, user_rotation: f64, zoom: f64) -> Matrix {
        geometry::page_transform(
            &self.page_boundary(boundary),
            self.total_rotation(user_rotation),
            zoom,
        )
    }

    pub fn size(&self, boundary: Boundary, user_rotation: f64, zoom: f64) -> PDimension {
        geometry::size(
            &self.page_boundary(boundary),
            self.total_rotation(user_rotation),
            zoom,
        )
    }

    pub fn bounding_box(&self, boundary: Boundary, user_rotation: f64, zoom: f64) -> PRectangle {
        geometry::bounding_box(
            &self.page_boundary(boundary),
            self.total_rotation(user_rotation),
            zoom,
        )
    }

    /// Corners of the boundary in device space.
    pub fn page_shape(&self, boundary: Boundary, user_rotation: f64, zoom: f64) -> [(f64, f64); 4] {
        geometry::page_shape(
            &self.page_boundary(boundary),
            self.total_rotation(user_rotation),
            zoom,
        )
    }

    fn lock(&self) -> MutexGuard<'_, PageContent> {
        self.content
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn initialized(&self) -> MutexGuard<'_, PageContent> {
        let mut content = self.lock();
        if !content.inited {
            self.load(&mut content);
        }
        content
    }

    fn load(&self, content: &mut PageContent) {
        let resources = Arc::new(
            match std::iter::once(&self.dict)
                .chain(&self.ancestors)
                .find_map(|dict| self.library.get_resources(dict))
            {
                Some(dict) => Resources::new(self.library.clone(), dict.clone()),
                None => Resources::empty(self.library.clone()),
            },
        );

        content.annotations = self
            .library
            .get_array(&self.dict, "Annots")
            .unwrap_or_default()
            .iter()
            .filter_map(|entry| Annotation::from_object(&self.library, entry))
            .map(Arc::new)
            .collect();

        let (data, refs) = self.read_contents();
        content.content_refs = refs;
        content.shapes = Arc::new(match data {
            Some(data) => {
                let parsed = self.parser(&resources).parse(&data);
                content.contents = Arc::new(data);
                parsed.unwrap_or_else(|e| {
                    warn!("page {} content not painted: {}", self.index, e);
                    Shapes::new()
                })
            }
            None => Shapes::new(),
        });
        content.resources = Some(resources);
        content.text = None;
        content.inited = true;
    }

    fn parser(&self, resources: &Arc<Resources>) -> ContentParser {
        ContentParser::new(self.library.clone(), ResourceChain::new(resources.clone()))
            .with_options(self.options.clone())
            .with_image_decoder(self.image_decoder.clone())
    }

    /// Decodes `/Contents` and joins the segments with a newline. A segment
    /// that fails to decode empties the whole page.
    fn read_contents(&self) -> (Option<Vec<u8>>, Vec<ObjRef>) {
        let Some(raw) = self.dict.get("Contents") else {
            return (Some(Vec::new()), Vec::new());
        };
        let entries = match self.library.resolve(raw) {
            PDFObject::Array(items) => items.as_slice(),
            _ => std::slice::from_ref(raw),
        };

        let mut data = Vec::new();
        let mut refs = Vec::new();
        for (i, entry) in entries.iter().enumerate() {
            let Some(stream) = self.library.resolve(entry).as_stream() else {
                debug!("page {} content entry {} is not a stream", self.index, i);
                continue;
            };
            refs.extend(stream.obj_ref);
            match self.library.decode_stream(stream) {
                Ok(decoded) => {
                    if i > 0 {
                        data.push(b'\n');
                    }
                    data.extend_from_slice(&decoded.data);
                }
                Err(e) => {
                    warn!("page {} content stream {} not decoded: {}", self.index, i, e);
                    return (None, refs);
                }
            }
        }
        (Some(data), refs)
    }

    /// Resolves resources, annotations and content, then parses the
    /// content. Later calls return immediately until the page is disposed.
    pub fn init(&self) {
        drop(self.initialized());
    }

    pub fn is_inited(&self) -> bool {
        self.lock().inited
    }

    /// Drops everything `init` built.
    ///
    /// # Arguments
    /// * `keep_cache` - when false the library also forgets the decoded data
    ///   of the streams this page used
    pub fn dispose(&self, keep_cache: bool) {
        let mut content = self.lock();
        if !content.inited {
            return;
        }
        if !keep_cache {
            let mut refs = std::mem::take(&mut content.content_refs);
            if let Some(resources) = &content.resources {
                refs.extend(resources.stream_refs());
            }
            refs.extend(
                content
                    .annotations
                    .iter()
                    .filter_map(|annot| annot.appearance.as_ref()?.obj_ref),
            );
            self.library.evict_streams(&refs);
        }
        if let Some(resources) = &content.resources {
            resources.dispose();
        }
        *content = PageContent::default();
    }

    /// The page's display list, initialising the page if needed.
    pub fn shapes(&self) -> Arc<Shapes> {
        self.initialized().shapes.clone()
    }

    pub fn annotations(&self) -> Vec<Arc<Annotation>> {
        self.initialized().annotations.clone()
    }

    /// Every image the page paints directly or through forms.
    pub fn images(&self) -> Vec<ImageShape> {
        self.shapes().images().cloned().collect()
    }

    /// Text shown on the page, one block per text object. Computed once per
    /// init.
    pub fn text_blocks(&self) -> Arc<Vec<TextBlock>> {
        let mut content = self.initialized();
        if let Some(text) = &content.text {
            return text.clone();
        }
        let blocks = match &content.resources {
            Some(resources) => self
                .parser(resources)
                .parse_text_blocks(&content.contents)
                .unwrap_or_else(|e| {
                    warn!("page {} text not read: {}", self.index, e);
                    Vec::new()
                }),
            None => Vec::new(),
        };
        let blocks = Arc::new(blocks);
        content.text = Some(blocks.clone());
        blocks
    }

    /// Paints the page onto `device`.
    ///
    /// Sets up the page transform, paints the background the hints ask for,
    /// clips to `boundary`, replays the shapes and then, if `annotations` is
    /// set, the visible annotations' appearances.
    pub fn paint(
        &self,
        device: &mut dyn Device,
        hints: &RenderHints,
        boundary: Boundary,
        user_rotation: f64,
        zoom: f64,
        annotations: bool,
    ) -> PDFResult<()> {
        let (shapes, annots, resources) = {
            let content = self.initialized();
            (
                content.shapes.clone(),
                content.annotations.clone(),
                content.resources.clone(),
            )
        };
        let rect = self.page_boundary(boundary);
        let base = geometry::page_transform(&rect, self.total_rotation(user_rotation), zoom);

        device.save_state();
        let result = self.paint_layers(device, hints, &rect, &base, &shapes);
        let result = result.and_then(|()| {
            if !(annotations && hints.annotations) {
                return Ok(());
            }
            let chain = resources.map(ResourceChain::new).unwrap_or_default();
            annots
                .iter()
                .filter(|annot| annot.is_visible_for(hints.target))
                .try_for_each(|annot| self.paint_annotation(device, annot, &chain, &base))
        });
        device.restore_state();
        result
    }

    fn paint_layers(
        &self,
        device: &mut dyn Device,
        hints: &RenderHints,
        rect: &PRectangle,
        base: &Matrix,
        shapes: &Shapes,
    ) -> PDFResult<()> {
        if let Some(background) = &hints.background {
            device.fill_rect(rect, background, base)?;
        }
        device.clip_rect(rect, base)?;
        shapes.paint(device, base)
    }

    fn paint_annotation(
        &self,
        device: &mut dyn Device,
        annot: &Annotation,
        resources: &ResourceChain,
        base: &Matrix,
    ) -> PDFResult<()> {
        let Some(mut form) = annot.appearance_form(&self.library) else {
            return Ok(());
        };
        let placement = annot.appearance_matrix(&form);
        form.set_parent_resources(resources.clone());
        form.set_graphics_state(GraphicsState::with_ctm(placement));
        form.set_options(self.options.clone());
        form.set_image_decoder(self.image_decoder.clone());
        form.paint(device, base)
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("index", &self.index)
            .field("obj_ref", &self.obj_ref)
            .field("ancestors", &self.ancestors.len())
            .field("inited", &self.is_inited())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::Parser;

    fn dict(source: &str) -> Dict {
        Parser::from_bytes(source.as_bytes().to_vec())
            .get_object()
            .unwrap()
            .as_dict()
            .unwrap()
            .clone()
    }

    fn page(page: &str, ancestors: &[&str]) -> Page {
        Page::new(
            Arc::new(Library::default()),
            PageNode {
                index: 0,
                obj_ref: None,
                dict: dict(page),
                ancestors: ancestors.iter().map(|a| dict(a)).collect(),
            },
        )
    }

    #[test]
    fn test_media_box_default_and_inheritance() {
        let bare = page("<< /Type /Page >>", &[]);
        assert_eq!(bare.page_boundary(Boundary::Media), US_LETTER);
        assert_eq!(bare.page_boundary(Boundary::Art), US_LETTER);

        let inherited = page(
            "<< /Type /Page >>",
            &["<< /MediaBox [0 0 200 300] >>", "<< /MediaBox [0 0 10 10] >>"],
        );
        assert_eq!(
            inherited.page_boundary(Boundary::Media),
            PRectangle::new(0.0, 0.0, 200.0, 300.0)
        );
    }

    #[test]
    fn test_crop_box_is_clipped_to_media_box() {
        let page = page(
            "<< /Type /Page /MediaBox [0 0 600 800] /CropBox [-50 100 400 1100] /TrimBox [10 10 20 20] >>",
            &[],
        );
        let crop = PRectangle::new(0.0, 100.0, 400.0, 700.0);
        assert_eq!(page.page_boundary(Boundary::Crop), crop);
        assert_eq!(page.page_boundary(Boundary::Bleed), crop);
        assert_eq!(
            page.page_boundary(Boundary::Trim),
            PRectangle::new(10.0, 10.0, 10.0, 10.0)
        );
    }

    #[test]
    fn test_rotation_is_inherited() {
        let page = page("<< /Type /Page >>", &["<< /Rotate 90 >>"]);
        assert_eq!(page.stored_rotation(), 90.0);
        assert_eq!(page.total_rotation(0.0), 270.0);
        assert_eq!(page.total_rotation(90.0), 0.0);
        let size = page.size(Boundary::Media, 0.0, 1.0);
        assert_eq!((size.width, size.height), (792.0, 612.0));
    }

    #[test]
    fn test_page_without_contents() {
        let page = page("<< /Type /Page /MediaBox [0 0 10 10] >>", &[]);
        assert!(page.shapes().is_empty());
        assert!(page.is_inited());
        assert!(page.text_blocks().is_empty());
        page.dispose(true);
        assert!(!page.is_inited());
    }
}
