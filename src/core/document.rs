use super::config::{LibraryOptions, ParserOptions};
use super::error::{PDFError, PDFResult};
use super::image::{DefaultImageDecoder, ImageDecoder};
use super::library::Library;
use super::page::Page;
use super::page_tree;
use log::{debug, info};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Options used when opening a document.
#[derive(Clone)]
pub struct DocumentOptions {
    pub library: LibraryOptions,
    pub parser: ParserOptions,
    pub image_decoder: Arc<dyn ImageDecoder>,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        DocumentOptions {
            library: LibraryOptions::default(),
            parser: ParserOptions::default(),
            image_decoder: Arc::new(DefaultImageDecoder),
        }
    }
}

/// A loaded PDF document.
///
/// This is the main entry point: it owns the [`Library`] holding every
/// object of the file and one [`Page`] per leaf of the page tree. Pages
/// are cheap until initialised and can be shared across threads.
pub struct Document {
    library: Arc<Library>,
    pages: Vec<Arc<Page>>,
}

impl Document {
    /// Opens a PDF document from a byte array.
    ///
    /// # Arguments
    /// * `data` - The complete PDF file as bytes
    ///
    /// # Example
    /// ```no_run
    /// use pdf_shapes::core::Document;
    ///
    /// let pdf_data = std::fs::read("document.pdf").unwrap();
    /// let doc = Document::open(pdf_data).unwrap();
    /// println!("{} pages", doc.page_count());
    /// ```
    pub fn open(data: Vec<u8>) -> PDFResult<Self> {
        Self::open_with_options(data, DocumentOptions::default())
    }

    pub fn open_with_options(data: Vec<u8>, options: DocumentOptions) -> PDFResult<Self> {
        let library = Arc::new(Library::scan(data, options.library)?);
        let catalog = library
            .catalog()
            .ok_or_else(|| PDFError::MissingObject("document catalog".to_string()))?;
        let root = catalog
            .get("Pages")
            .ok_or_else(|| PDFError::MissingObject("/Pages in catalog".to_string()))?;

        let pages: Vec<Arc<Page>> = page_tree::flatten(&library, root)
            .into_iter()
            .map(|node| {
                Arc::new(
                    Page::new(library.clone(), node)
                        .with_options(options.parser.clone())
                        .with_image_decoder(options.image_decoder.clone()),
                )
            })
            .collect();
        info!("opened document with {} objects, {} pages", library.len(), pages.len());

        Ok(Document { library, pages })
    }

    /// Reads and opens the file at `path`.
    pub fn open_file(path: impl AsRef<Path>) -> PDFResult<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::open(data)
    }

    pub fn library(&self) -> &Arc<Library> {
        &self.library
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, index: usize) -> Option<Arc<Page>> {
        self.pages.get(index).cloned()
    }

    pub fn pages(&self) -> &[Arc<Page>] {
        &self.pages
    }

    /// Initialises page `index` unless `cancel` is already set.
    ///
    /// Returns `Ok(None)` when cancelled. Cancellation is only checked
    /// before starting; a running init always completes.
    pub fn init_page(&self, index: usize, cancel: &AtomicBool) -> PDFResult<Option<Arc<Page>>> {
        let page = self.page(index).ok_or_else(|| {
            PDFError::MissingObject(format!("page {} of {}", index, self.page_count()))
        })?;
        if cancel.load(Ordering::Acquire) {
            debug!("init of page {} cancelled", index);
            return Ok(None);
        }
        page.init();
        Ok(Some(page))
    }

    /// Disposes every initialised page not listed in `keep`, also dropping
    /// their decoded streams from the cache. Returns how many were disposed.
    pub fn reduce_memory(&self, keep: &[usize]) -> usize {
        let mut disposed = 0;
        for page in &self.pages {
            if keep.contains(&page.index()) || !page.is_inited() {
                continue;
            }
            page.dispose(false);
            disposed += 1;
        }
        debug!("reduce_memory disposed {} pages", disposed);
        disposed
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("objects", &self.library.len())
            .field("pages", &self.pages.len())
            .finish()
    }
}
