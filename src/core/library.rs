//! Object store for one loaded document.
//!
//! The `Library` owns every indirect object of a document, resolves
//! references, and keeps an LRU cache of decoded stream data. It is
//! read-only once built and shared as `Arc<Library>` between pages, forms
//! and resource scopes.

use super::config::LibraryOptions;
use super::decode::{self, Decoded};
use super::error::{PDFError, PDFResult};
use super::geometry::PRectangle;
use super::lexer::Lexer;
use super::parser::{Dict, ObjRef, PDFObject, Parser, PdfStream};
use super::stream::Stream;
use crate::rendering::matrix::Matrix;
use log::{debug, warn};
use lru::LruCache;
use rustc_hash::FxHashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

static NULL_OBJECT: PDFObject = PDFObject::Null;

/// Reference chains longer than this are treated as broken.
const MAX_REFERENCE_DEPTH: usize = 32;

pub struct Library {
    objects: FxHashMap<ObjRef, PDFObject>,
    trailer: Dict,
    /// Source of ids for objects that have no object number (inline images,
    /// synthesized dictionaries)
    next_id: AtomicU32,
    stream_cache: Mutex<LruCache<ObjRef, Arc<Decoded>>>,
}

impl Library {
    pub fn new(options: LibraryOptions) -> Self {
        let capacity =
            NonZeroUsize::new(options.stream_cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Library {
            objects: FxHashMap::default(),
            trailer: Dict::default(),
            next_id: AtomicU32::new(1),
            stream_cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Builds a library by scanning a whole file for `N G obj` bodies.
    ///
    /// Cross-reference tables are not consulted: every object body found is
    /// loaded, and a later definition of the same reference replaces an
    /// earlier one, which is what an incremental update means. Objects packed
    /// in object streams are loaded unless a plain definition exists.
    pub fn scan(bytes: Vec<u8>, options: LibraryOptions) -> PDFResult<Library> {
        let mut library = Library::new(options);
        let data = Arc::new(bytes);
        let mut object_streams = Vec::new();

        let mut pos = 0;
        while let Some(found) = find(&data, b"obj", pos) {
            pos = found + 3;
            let Some(start) = object_header_start(&data, found) else {
                continue;
            };
            let stream = Stream::from_shared(data.clone(), start, data.len() - start);
            let mut parser = Parser::new(Lexer::new(Box::new(stream)));
            match parser.get_indirect_object() {
                Ok((obj_ref, object)) => {
                    if let PDFObject::Stream(stream) = &object {
                        match stream.dict.get("Type").and_then(|t| t.as_name()) {
                            Some("ObjStm") => object_streams.push(stream.clone()),
                            Some("XRef") => library.merge_trailer(&stream.dict),
                            _ => {}
                        }
                    }
                    library.insert(obj_ref, object);
                    if let Some(end) = find(&data, b"endobj", pos) {
                        pos = end + 6;
                    }
                }
                Err(e) => debug!("skipping unreadable object at {}: {}", start, e),
            }
        }

        let mut trailer_pos = 0;
        while let Some(found) = find(&data, b"trailer", trailer_pos) {
            trailer_pos = found + 7;
            let stream = Stream::from_shared(data.clone(), trailer_pos, data.len() - trailer_pos);
            let mut parser = Parser::new(Lexer::new(Box::new(stream)));
            if let Ok(PDFObject::Dictionary(dict)) = parser.get_object() {
                library.merge_trailer(&dict);
            }
        }

        for stream in object_streams {
            if let Err(e) = library.load_object_stream(&stream) {
                warn!("skipping object stream {:?}: {}", stream.obj_ref, e);
            }
        }

        if library.catalog().is_none() {
            let catalog = library
                .objects
                .iter()
                .filter(|(_, obj)| {
                    obj.as_dict()
                        .and_then(|d| d.get("Type"))
                        .and_then(|t| t.as_name())
                        == Some("Catalog")
                })
                .map(|(obj_ref, _)| *obj_ref)
                .min();
            match catalog {
                Some(obj_ref) => {
                    library
                        .trailer
                        .insert("Root".to_string(), PDFObject::Ref(obj_ref));
                }
                None => return Err(PDFError::MissingObject("document catalog".to_string())),
            }
        }

        Ok(library)
    }

    fn merge_trailer(&mut self, dict: &Dict) {
        for (key, value) in dict {
            if matches!(key.as_str(), "Root" | "Info" | "ID" | "Size") {
                self.trailer.insert(key.clone(), value.clone());
            }
        }
    }

    fn load_object_stream(&mut self, stream: &PdfStream) -> PDFResult<()> {
        let count = stream.dict.get("N").and_then(|n| n.as_i64()).unwrap_or(0);
        let first = stream.dict.get("First").and_then(|n| n.as_i64()).unwrap_or(0);
        if count <= 0 || first < 0 {
            return Err(PDFError::Generic("object stream without /N or /First".into()));
        }
        let decoded = decode::decode_stream(stream)?;
        let data = Arc::new(decoded.data);

        let mut header = Parser::new(Lexer::new(Box::new(Stream::from_shared(
            data.clone(),
            0,
            first as usize,
        ))));
        for _ in 0..count {
            let (Ok(PDFObject::Number(num)), Ok(PDFObject::Number(offset))) =
                (header.get_object(), header.get_object())
            else {
                break;
            };
            let obj_ref = ObjRef::new(num as u32, 0);
            if self.objects.contains_key(&obj_ref) {
                continue;
            }
            let start = first as usize + offset as usize;
            let body = Stream::from_shared(data.clone(), start, data.len().saturating_sub(start));
            let mut parser = Parser::new(Lexer::new(Box::new(body)));
            match parser.get_object() {
                Ok(object) => self.insert(obj_ref, object),
                Err(e) => debug!("skipping compressed object {}: {}", obj_ref, e),
            }
        }
        Ok(())
    }

    pub fn insert(&mut self, obj_ref: ObjRef, object: PDFObject) {
        if obj_ref.num >= *self.next_id.get_mut() {
            *self.next_id.get_mut() = obj_ref.num.saturating_add(1);
        }
        self.objects.insert(obj_ref, object);
    }

    pub fn set_trailer(&mut self, trailer: Dict) {
        self.trailer = trailer;
    }

    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Fresh id above every object number in the document.
    pub fn next_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn object(&self, obj_ref: ObjRef) -> Option<&PDFObject> {
        self.objects.get(&obj_ref)
    }

    pub fn catalog(&self) -> Option<&Dict> {
        self.get_dictionary(&self.trailer, "Root")
    }

    /// Follows references until a direct object; missing or circular
    /// references resolve to `null`.
    pub fn resolve<'a>(&'a self, object: &'a PDFObject) -> &'a PDFObject {
        let mut current = object;
        for _ in 0..MAX_REFERENCE_DEPTH {
            match current {
                PDFObject::Ref(obj_ref) => match self.objects.get(obj_ref) {
                    Some(target) => current = target,
                    None => {
                        debug!("missing object {}", obj_ref);
                        return &NULL_OBJECT;
                    }
                },
                _ => return current,
            }
        }
        warn!("reference chain too deep");
        &NULL_OBJECT
    }

    /// Resolved value of `dict[key]`; `None` for an absent or null entry.
    pub fn get_object<'a>(&'a self, dict: &'a Dict, key: &str) -> Option<&'a PDFObject> {
        let value = self.resolve(dict.get(key)?);
        (!value.is_null()).then_some(value)
    }

    /// Dictionary (or stream dictionary) at `dict[key]`.
    pub fn get_dictionary<'a>(&'a self, dict: &'a Dict, key: &str) -> Option<&'a Dict> {
        self.get_object(dict, key)?.as_dict()
    }

    pub fn get_stream<'a>(&'a self, dict: &'a Dict, key: &str) -> Option<&'a Arc<PdfStream>> {
        self.get_object(dict, key)?.as_stream()
    }

    pub fn get_array<'a>(&'a self, dict: &'a Dict, key: &str) -> Option<&'a [PDFObject]> {
        self.get_object(dict, key)?.as_array()
    }

    pub fn get_number(&self, dict: &Dict, key: &str) -> Option<f64> {
        self.get_object(dict, key)?.as_f64()
    }

    pub fn get_int(&self, dict: &Dict, key: &str) -> Option<i64> {
        self.get_object(dict, key)?.as_i64()
    }

    pub fn get_bool(&self, dict: &Dict, key: &str) -> Option<bool> {
        self.get_object(dict, key)?.as_bool()
    }

    pub fn get_name<'a>(&'a self, dict: &'a Dict, key: &str) -> Option<&'a str> {
        self.get_object(dict, key)?.as_name()
    }

    /// Numeric array at `dict[key]`, resolving indirect elements.
    pub fn get_number_array(&self, dict: &Dict, key: &str) -> Option<Vec<f64>> {
        self.number_array(self.get_object(dict, key)?)
    }

    pub fn number_array(&self, object: &PDFObject) -> Option<Vec<f64>> {
        self.resolve(object)
            .as_array()?
            .iter()
            .map(|item| self.resolve(item).as_f64())
            .collect()
    }

    /// Rectangle array at `dict[key]`, normalized to lower-left origin.
    pub fn get_rectangle(&self, dict: &Dict, key: &str) -> Option<PRectangle> {
        PRectangle::from_array(&self.get_number_array(dict, key)?)
    }

    pub fn get_matrix(&self, dict: &Dict, key: &str) -> Option<Matrix> {
        Matrix::from_slice(&self.get_number_array(dict, key)?)
    }

    /// `/Resources` of a page, page-tree node or form.
    pub fn get_resources<'a>(&'a self, dict: &'a Dict) -> Option<&'a Dict> {
        self.get_dictionary(dict, "Resources")
    }

    /// Decoded stream data, cached per object reference.
    pub fn decode_stream(&self, stream: &PdfStream) -> PDFResult<Arc<Decoded>> {
        let Some(obj_ref) = stream.obj_ref else {
            return decode::decode_stream(stream).map(Arc::new);
        };
        if let Some(cached) = self.cache().get(&obj_ref) {
            return Ok(cached.clone());
        }
        // Decoded outside the lock; a concurrent decode of the same stream
        // only costs time.
        let decoded = Arc::new(decode::decode_stream(stream)?);
        self.cache().put(obj_ref, decoded.clone());
        Ok(decoded)
    }

    /// Drops cached decoded data for the given streams.
    pub fn evict_streams(&self, refs: &[ObjRef]) {
        let mut cache = self.cache();
        for obj_ref in refs {
            cache.pop(obj_ref);
        }
    }

    pub fn cached_stream_count(&self) -> usize {
        self.cache().len()
    }

    fn cache(&self) -> MutexGuard<'_, LruCache<ObjRef, Arc<Decoded>>> {
        self.stream_cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for Library {
    fn default() -> Self {
        Self::new(LibraryOptions::default())
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}

/// Start of `N G` in front of an `obj` keyword at `keyword`, if the bytes
/// there really form an object header.
fn object_header_start(data: &[u8], keyword: usize) -> Option<usize> {
    let after = data.get(keyword + 3).copied();
    if after.is_some_and(|ch| !Lexer::is_whitespace(ch) && !Lexer::is_delimiter(ch)) {
        return None;
    }

    let mut i = keyword;
    let skip_spaces = |mut i: usize| {
        while i > 0 && Lexer::is_whitespace(data[i - 1]) {
            i -= 1;
        }
        i
    };
    let skip_digits = |mut i: usize| {
        let end = i;
        while i > 0 && data[i - 1].is_ascii_digit() {
            i -= 1;
        }
        (i < end).then_some(i)
    };

    let gen_end = skip_spaces(i);
    if gen_end == i {
        return None;
    }
    i = skip_digits(gen_end)?;
    let num_end = skip_spaces(i);
    if num_end == i {
        return None;
    }
    i = skip_digits(num_end)?;
    if i > 0 && !Lexer::is_whitespace(data[i - 1]) && !Lexer::is_delimiter(data[i - 1]) {
        return None;
    }
    Some(i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    const SIMPLE: &[u8] = b"%PDF-1.4\n\
        1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
        2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n\
        3 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R >>\nendobj\n\
        4 0 obj\n<< /Length 5 0 R >>\nstream\n0 0 m\nendstream\nendobj\n\
        5 0 obj\n6\nendobj\n\
        trailer\n<< /Root 1 0 R /Size 6 >>\n%%EOF\n";

    #[test]
    fn test_scan_finds_objects_and_catalog() {
        let library = Library::scan(SIMPLE.to_vec(), LibraryOptions::default()).unwrap();
        assert_eq!(library.len(), 5);
        let catalog = library.catalog().unwrap();
        assert_eq!(library.get_name(catalog, "Type"), Some("Catalog"));

        let page = library.object(ObjRef::new(3, 0)).unwrap().as_dict().unwrap();
        let media = library.get_rectangle(page, "MediaBox").unwrap();
        assert_eq!(media.width, 612.0);

        let contents = library.get_stream(page, "Contents").unwrap();
        assert_eq!(contents.data, b"0 0 m");
        assert_eq!(contents.obj_ref, Some(ObjRef::new(4, 0)));
    }

    #[test]
    fn test_later_definition_wins() {
        let mut data = SIMPLE.to_vec();
        data.extend_from_slice(b"5 0 obj\n7\nendobj\n");
        let library = Library::scan(data, LibraryOptions::default()).unwrap();
        assert_eq!(
            library.object(ObjRef::new(5, 0)),
            Some(&PDFObject::Number(7.0))
        );
    }

    #[test]
    fn test_catalog_without_trailer() {
        let data = b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj".to_vec();
        let library = Library::scan(data, LibraryOptions::default()).unwrap();
        assert!(library.catalog().is_some());

        let missing = Library::scan(b"1 0 obj 5 endobj".to_vec(), LibraryOptions::default());
        assert!(matches!(missing, Err(PDFError::MissingObject(_))));
    }

    #[test]
    fn test_object_stream() {
        let body = b"<< /Type /Catalog /Pages 3 0 R >> << /Type /Pages /Kids [] /Count 0 >>";
        let header = b"1 0 3 34 ";
        let mut raw = header.to_vec();
        raw.extend_from_slice(body);
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut data = format!(
            "5 0 obj\n<< /Type /ObjStm /N 2 /First {} /Filter /FlateDecode /Length {} >>\nstream\n",
            header.len(),
            compressed.len()
        )
        .into_bytes();
        data.extend_from_slice(&compressed);
        data.extend_from_slice(b"\nendstream\nendobj\ntrailer << /Root 1 0 R >>\n");

        let library = Library::scan(data, LibraryOptions::default()).unwrap();
        let catalog = library.catalog().unwrap();
        let pages = library.get_dictionary(catalog, "Pages").unwrap();
        assert_eq!(library.get_int(pages, "Count"), Some(0));
    }

    #[test]
    fn test_resolve_missing_and_cyclic() {
        let mut library = Library::default();
        library.insert(ObjRef::new(1, 0), PDFObject::Ref(ObjRef::new(2, 0)));
        library.insert(ObjRef::new(2, 0), PDFObject::Ref(ObjRef::new(1, 0)));
        assert!(library.resolve(&PDFObject::Ref(ObjRef::new(1, 0))).is_null());
        assert!(library.resolve(&PDFObject::Ref(ObjRef::new(9, 0))).is_null());

        let mut dict = Dict::default();
        dict.insert("A".into(), PDFObject::Ref(ObjRef::new(9, 0)));
        assert!(library.get_object(&dict, "A").is_none());
    }

    #[test]
    fn test_next_id_is_above_object_numbers() {
        let library = Library::scan(SIMPLE.to_vec(), LibraryOptions::default()).unwrap();
        let first = library.next_id();
        assert!(first > 5);
        assert_eq!(library.next_id(), first + 1);
    }

    #[test]
    fn test_decode_cache_and_eviction() {
        let library = Library::scan(SIMPLE.to_vec(), LibraryOptions::default()).unwrap();
        let page = library.object(ObjRef::new(3, 0)).unwrap().as_dict().unwrap();
        let contents = library.get_stream(page, "Contents").unwrap();

        let first = library.decode_stream(contents).unwrap();
        let second = library.decode_stream(contents).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(library.cached_stream_count(), 1);

        library.evict_streams(&[ObjRef::new(4, 0)]);
        assert_eq!(library.cached_stream_count(), 0);
    }

    #[test]
    fn test_header_detection() {
        let data = b"x 12 0 obj";
        assert_eq!(object_header_start(data, 7), Some(2));
        assert_eq!(object_header_start(b"endobj", 3), None);
        assert_eq!(object_header_start(b"a12 0 obj", 6), None);
    }
}
