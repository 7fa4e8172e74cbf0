//! Test utilities shared by the integration tests.
//!
//! Documents are built in memory from object bodies, so tests do not depend
//! on fixture files. The output has no cross-reference table; the loader
//! scans for object bodies anyway.

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::ZlibEncoder;
use pdf_shapes::core::Document;
use std::io::Write;

/// Builds a PDF file from numbered object bodies.
#[derive(Debug, Default)]
pub struct PdfBuilder {
    objects: Vec<(u32, Vec<u8>)>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `num 0 obj <body> endobj`.
    pub fn object(&mut self, num: u32, body: &str) -> &mut Self {
        self.objects.push((num, body.as_bytes().to_vec()));
        self
    }

    /// Adds a stream object; `/Length` is appended to `dict_entries`.
    pub fn stream(&mut self, num: u32, dict_entries: &str, data: &[u8]) -> &mut Self {
        let mut body = format!("<< {} /Length {} >>\nstream\n", dict_entries, data.len()).into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");
        self.objects.push((num, body));
        self
    }

    /// Adds a FlateDecode stream holding `data` compressed.
    pub fn flate_stream(&mut self, num: u32, dict_entries: &str, data: &[u8]) -> &mut Self {
        let entries = format!("{} /Filter /FlateDecode", dict_entries);
        self.stream(num, &entries, &compress(data))
    }

    /// Serializes the file with `root` as the catalog.
    pub fn build(&self, root: u32) -> Vec<u8> {
        let mut out = b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n".to_vec();
        for (num, body) in &self.objects {
            out.extend_from_slice(format!("{} 0 obj\n", num).as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }
        out.extend_from_slice(format!("trailer\n<< /Root {} 0 R >>\n%%EOF\n", root).as_bytes());
        out
    }
}

pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Catalog 1, page tree 2, page 3 with `page_entries`, content in
/// object 4. More objects can be added before building with root 1.
pub fn page_builder(page_entries: &str, content: &[u8]) -> PdfBuilder {
    let mut builder = PdfBuilder::new();
    builder
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(
            3,
            &format!("<< /Type /Page /Parent 2 0 R /Contents 4 0 R {} >>", page_entries),
        )
        .stream(4, "", content);
    builder
}

pub fn page_document(page_entries: &str, content: &[u8]) -> Vec<u8> {
    page_builder(page_entries, content).build(1)
}

/// A one-page US Letter document painting `content` with no resources.
pub fn single_page_pdf(content: &[u8]) -> Vec<u8> {
    page_document("/MediaBox [0 0 612 792]", content)
}

pub fn open(bytes: Vec<u8>) -> Document {
    Document::open(bytes).unwrap()
}
