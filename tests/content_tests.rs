//! Content interpretation through whole documents.

mod test_utils;

use pdf_shapes::core::geometry::PRectangle;
use pdf_shapes::core::{ContentParser, Library, ResourceChain};
use pdf_shapes::rendering::graphics_state::{Color, FillRule, Paint};
use pdf_shapes::rendering::Matrix;
use std::sync::Arc;
use test_utils::*;

#[test]
fn test_identity_rect_fill() {
    let doc = open(single_page_pdf(b"1 0 0 1 0 0 cm 10 10 100 100 re f"));
    let shapes = doc.page(0).unwrap().shapes();
    assert_eq!(shapes.len(), 1);
    let path = shapes.paths().next().unwrap();
    assert_eq!(path.path.as_rect(), Some((10.0, 10.0, 100.0, 100.0)));
    assert_eq!(path.fill, Some(FillRule::NonZero));
    assert!(path.transform.is_identity());
}

#[test]
fn test_save_restore_scopes_the_transform() {
    let doc = open(single_page_pdf(
        b"q 2 0 0 2 0 0 cm 1 0 0 1 0 0 cm 0 0 50 50 re f Q 0 0 50 50 re f",
    ));
    let shapes = doc.page(0).unwrap().shapes();
    let paths: Vec<_> = shapes.paths().collect();
    assert_eq!(paths.len(), 2);
    let first = PRectangle::new(0.0, 0.0, 50.0, 50.0).transformed(&paths[0].transform);
    assert_eq!(first, PRectangle::new(0.0, 0.0, 100.0, 100.0));
    assert!(paths[1].transform.is_identity());
}

#[test]
fn test_short_operator_leaves_next_intact() {
    let doc = open(single_page_pdf(b"10 10 re 0 0 50 50 re f"));
    let shapes = doc.page(0).unwrap().shapes();
    assert_eq!(shapes.len(), 1);
    assert_eq!(
        shapes.paths().next().unwrap().path.as_rect(),
        Some((0.0, 0.0, 50.0, 50.0))
    );
}

#[test]
fn test_form_matrix_premultiplies_invoking_ctm() {
    let mut builder = page_builder(
        "/MediaBox [0 0 612 792] /Resources << /XObject << /Fm0 5 0 R >> /ExtGState << /GS0 6 0 R >> >>",
        b"1 0 0 1 100 100 cm /Fm0 Do 0 0 1 1 re f",
    );
    builder
        .stream(
            5,
            "/Type /XObject /Subtype /Form /BBox [0 0 200 200] /Matrix [0.5 0 0 0.5 0 0]",
            b"/GS0 gs 0 0 10 10 re f",
        )
        .object(6, "<< /Type /ExtGState /ca 0.5 >>");
    let doc = open(builder.build(1));
    let shapes = doc.page(0).unwrap().shapes();
    let paths: Vec<_> = shapes.paths().collect();
    assert_eq!(paths.len(), 2);

    let caller = Matrix::translate(100.0, 100.0);
    let expected = Matrix::scale(0.5, 0.5).multiply(&caller);
    assert!(paths[0].transform.approx_eq(&expected, 1e-9));
    // The form has no resources of its own and resolves GS0 from the page.
    assert_eq!(paths[0].fill_alpha, 0.5);
    assert!(paths[0].clip.is_some());

    // State changes inside the form do not leak out.
    assert!(paths[1].transform.approx_eq(&caller, 1e-9));
    assert_eq!(paths[1].fill_alpha, 1.0);
    assert!(paths[1].clip.is_none());
}

#[test]
fn test_content_arrays_are_joined_with_newline() {
    let mut builder = PdfBuilder::new();
    builder
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(
            3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 100 100] /Contents [4 0 R 5 0 R] >>",
        )
        .stream(4, "", b"0 0 10 10 re")
        .flate_stream(5, "", b"f");
    let doc = open(builder.build(1));
    let shapes = doc.page(0).unwrap().shapes();
    assert_eq!(shapes.len(), 1);
}

#[test]
fn test_token_split_across_streams_is_two_tokens() {
    let mut builder = PdfBuilder::new();
    builder
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(
            3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 100 100] /Contents [4 0 R 5 0 R] >>",
        )
        .stream(4, "", b"0 0 10 1")
        .stream(5, "", b"5 re f");
    let doc = open(builder.build(1));
    let shapes = doc.page(0).unwrap().shapes();
    // "1" and "5" stay separate operands, so `re` sees 0 10 1 5.
    assert_eq!(
        shapes.paths().next().unwrap().path.as_rect(),
        Some((0.0, 10.0, 1.0, 5.0))
    );
}

#[test]
fn test_fonts_and_colors_from_resources() {
    let mut builder = page_builder(
        "/MediaBox [0 0 612 792] /Resources << /Font << /F1 5 0 R >> /ColorSpace << /CS0 [/ICCBased 6 0 R] >> >>",
        b"/CS0 cs 0 0 1 sc BT /F1 12 Tf 72 700 Td (Hi) Tj ET",
    );
    builder
        .object(
            5,
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /FirstChar 72 /LastChar 105 /Widths [722 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 222] >>",
        )
        .stream(6, "/N 3", b"");
    let doc = open(builder.build(1));
    let shapes = doc.page(0).unwrap().shapes();
    let run = shapes.text_runs().next().unwrap();
    assert_eq!(run.text, "Hi");
    assert_eq!(run.font.as_ref().unwrap().base_font, "Helvetica");
    assert_eq!(run.origin(), (72.0, 700.0));
    assert!((run.advance - 0.944 * 12.0).abs() < 1e-9);
    assert_eq!(run.fill_paint, Paint::Solid(Color::RGB(0.0, 0.0, 1.0)));
}

#[test]
fn test_parse_text_blocks_per_text_object() {
    let library = Arc::new(Library::default());
    let parser = ContentParser::new(library, ResourceChain::empty());
    let blocks = parser
        .parse_text_blocks(b"BT /F1 10 Tf 1 0 0 1 10 20 Tm (one) Tj ET q BT (two) ' ET Q")
        .unwrap();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].text(), "one");
    assert_eq!(blocks[0].items[0].origin, (10.0, 20.0));
    assert_eq!(blocks[1].text(), "two");
}
