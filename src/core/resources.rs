//! Named resource lookup for pages and forms.
//!
//! A [`Resources`] wraps one `/Resources` dictionary. Content is always
//! interpreted against a [`ResourceChain`], an ordered list of scopes with the
//! innermost first: a form's own resources, then those of whatever invoked
//! it, down to the page. A name missing from every scope resolves to `None`.

use super::color_space::ColorSpace;
use super::ext_gstate::ExtGState;
use super::font::Font;
use super::image::ImageXObject;
use super::library::Library;
use super::parser::{Dict, ObjRef, PDFObject, PdfStream};
use super::pattern::{Pattern, Shading};
use super::xobject::FormXObject;
use log::{debug, warn};
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// A resolved `/XObject` entry.
#[derive(Debug)]
pub enum XObject {
    Image(Arc<ImageXObject>),
    Form(FormXObject),
}

pub struct Resources {
    library: Arc<Library>,
    dict: Dict,
    /// Fonts built so far, by resource name
    fonts: RwLock<FxHashMap<String, Arc<Font>>>,
}

impl Resources {
    pub fn new(library: Arc<Library>, dict: Dict) -> Self {
        Resources {
            library,
            dict,
            fonts: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn empty(library: Arc<Library>) -> Self {
        Self::new(library, Dict::default())
    }

    pub fn dict(&self) -> &Dict {
        &self.dict
    }

    pub fn library(&self) -> &Arc<Library> {
        &self.library
    }

    /// Raw entry `name` of the `category` sub-dictionary.
    fn entry(&self, category: &str, name: &str) -> Option<&PDFObject> {
        let entry = self.library.get_dictionary(&self.dict, category)?.get(name)?;
        (!self.library.resolve(entry).is_null()).then_some(entry)
    }

    /// Font by resource name. Fonts are built once per scope; concurrent
    /// first lookups may both build, the first one stored is kept.
    pub fn get_font(&self, name: &str) -> Option<Arc<Font>> {
        if let Some(font) = self
            .fonts
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
        {
            return Some(font.clone());
        }

        let dict = self.library.resolve(self.entry("Font", name)?).as_dict()?;
        let font = Arc::new(Font::from_dict(&self.library, name, dict));
        let mut fonts = self
            .fonts
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Some(fonts.entry(name.to_string()).or_insert(font).clone())
    }

    pub fn get_xobject(&self, name: &str) -> Option<XObject> {
        let stream = self
            .library
            .resolve(self.entry("XObject", name)?)
            .as_stream()?
            .clone();
        match self.library.get_name(&stream.dict, "Subtype") {
            Some("Image") => self.build_image(name, stream).map(XObject::Image),
            Some("Form") => Some(XObject::Form(FormXObject::new(
                self.library.clone(),
                stream,
            ))),
            // PostScript XObjects are not painted.
            other => {
                debug!("ignoring XObject {} with subtype {:?}", name, other);
                None
            }
        }
    }

    fn build_image(&self, name: &str, stream: Arc<PdfStream>) -> Option<Arc<ImageXObject>> {
        let named_space = |space: &str| self.get_color_space(space);
        match ImageXObject::from_stream(&self.library, stream, &named_space) {
            Ok(image) => Some(Arc::new(image)),
            Err(e) => {
                warn!("image {}: {}", name, e);
                None
            }
        }
    }

    pub fn get_image(&self, name: &str) -> Option<Arc<ImageXObject>> {
        match self.get_xobject(name)? {
            XObject::Image(image) => Some(image),
            XObject::Form(_) => None,
        }
    }

    /// A fresh form for every call; its content is parsed on `init`.
    pub fn get_form(&self, name: &str) -> Option<FormXObject> {
        match self.get_xobject(name)? {
            XObject::Form(form) => Some(form),
            XObject::Image(_) => None,
        }
    }

    pub fn get_pattern(&self, name: &str) -> Option<Arc<Pattern>> {
        Pattern::parse(&self.library, self.entry("Pattern", name)?).map(Arc::new)
    }

    pub fn get_shading(&self, name: &str) -> Option<Arc<Shading>> {
        Shading::parse(&self.library, self.entry("Shading", name)?).map(Arc::new)
    }

    pub fn get_ext_gstate(&self, name: &str) -> Option<ExtGState> {
        let dict = self.library.resolve(self.entry("ExtGState", name)?).as_dict()?;
        Some(ExtGState::parse(&self.library, dict))
    }

    pub fn get_color_space(&self, name: &str) -> Option<ColorSpace> {
        ColorSpace::parse(&self.library, self.entry("ColorSpace", name)?)
    }

    /// Marked-content property list.
    pub fn get_property(&self, name: &str) -> Option<Dict> {
        self.library
            .resolve(self.entry("Properties", name)?)
            .as_dict()
            .cloned()
    }

    /// References of every stream this scope names directly, used to
    /// evict their decoded data.
    pub fn stream_refs(&self) -> Vec<ObjRef> {
        ["XObject", "Pattern", "Shading"]
            .iter()
            .filter_map(|category| self.library.get_dictionary(&self.dict, category))
            .flat_map(|entries| entries.values())
            .filter_map(|entry| {
                entry
                    .as_obj_ref()
                    .or_else(|| self.library.resolve(entry).as_stream()?.obj_ref)
            })
            .collect()
    }

    pub fn cached_font_count(&self) -> usize {
        self.fonts
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Drops memoized fonts.
    pub fn dispose(&self) {
        self.fonts
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

impl fmt::Debug for Resources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut categories: Vec<&String> = self.dict.keys().collect();
        categories.sort();
        f.debug_struct("Resources")
            .field("categories", &categories)
            .field("cached_fonts", &self.cached_font_count())
            .finish()
    }
}

/// Resource scopes searched in order, innermost first.
#[derive(Debug, Clone, Default)]
pub struct ResourceChain {
    scopes: Vec<Arc<Resources>>,
}

impl ResourceChain {
    pub fn new(resources: Arc<Resources>) -> Self {
        ResourceChain {
            scopes: vec![resources],
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// This chain with `inner` searched first.
    pub fn with_inner(&self, inner: Arc<Resources>) -> ResourceChain {
        let mut scopes = Vec::with_capacity(self.scopes.len() + 1);
        scopes.push(inner);
        scopes.extend(self.scopes.iter().cloned());
        ResourceChain { scopes }
    }

    pub fn scopes(&self) -> &[Arc<Resources>] {
        &self.scopes
    }

    pub fn innermost(&self) -> Option<&Arc<Resources>> {
        self.scopes.first()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    fn find<T>(&self, lookup: impl Fn(&Resources) -> Option<T>) -> Option<T> {
        self.scopes.iter().find_map(|scope| lookup(scope))
    }

    pub fn get_font(&self, name: &str) -> Option<Arc<Font>> {
        self.find(|scope| scope.get_font(name))
    }

    pub fn get_xobject(&self, name: &str) -> Option<XObject> {
        self.find(|scope| scope.get_xobject(name))
    }

    pub fn get_image(&self, name: &str) -> Option<Arc<ImageXObject>> {
        self.find(|scope| scope.get_image(name))
    }

    pub fn get_form(&self, name: &str) -> Option<FormXObject> {
        self.find(|scope| scope.get_form(name))
    }

    pub fn get_pattern(&self, name: &str) -> Option<Arc<Pattern>> {
        self.find(|scope| scope.get_pattern(name))
    }

    pub fn get_shading(&self, name: &str) -> Option<Arc<Shading>> {
        self.find(|scope| scope.get_shading(name))
    }

    pub fn get_ext_gstate(&self, name: &str) -> Option<ExtGState> {
        self.find(|scope| scope.get_ext_gstate(name))
    }

    pub fn get_color_space(&self, name: &str) -> Option<ColorSpace> {
        self.find(|scope| scope.get_color_space(name))
    }

    pub fn get_property(&self, name: &str) -> Option<Dict> {
        self.find(|scope| scope.get_property(name))
    }
}
