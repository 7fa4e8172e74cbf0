//! Property-based tests for content interpretation and page geometry.

use pdf_shapes::core::geometry::{self, PRectangle};
use pdf_shapes::core::{ContentParser, Document, Library, ResourceChain};
use pdf_shapes::rendering::Matrix;
use proptest::prelude::*;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
enum StateOp {
    Save,
    Restore,
    Double,
}

fn state_op() -> impl Strategy<Value = StateOp> {
    prop_oneof![
        Just(StateOp::Save),
        Just(StateOp::Restore),
        Just(StateOp::Double),
    ]
}

fn parser() -> ContentParser {
    ContentParser::new(Arc::new(Library::default()), ResourceChain::empty())
}

proptest! {
    /// Any mix of `q`, `Q` and `cm` leaves the fill transform equal to the
    /// one a plain save/restore stack model predicts.
    #[test]
    fn prop_save_restore_matches_stack_model(ops in prop::collection::vec(state_op(), 0..40)) {
        let mut content = String::new();
        let mut stack: Vec<f64> = Vec::new();
        let mut scale = 1.0;
        for op in &ops {
            match op {
                StateOp::Save => {
                    content.push_str("q ");
                    stack.push(scale);
                }
                StateOp::Restore => {
                    content.push_str("Q ");
                    if let Some(saved) = stack.pop() {
                        scale = saved;
                    }
                }
                StateOp::Double => {
                    content.push_str("2 0 0 2 0 0 cm ");
                    scale *= 2.0;
                }
            }
        }
        content.push_str("0 0 1 1 re f");

        let shapes = parser().parse(content.as_bytes()).unwrap();
        prop_assert_eq!(shapes.len(), 1);
        let path = shapes.paths().next().unwrap();
        prop_assert!(path.transform.approx_eq(&Matrix::scale(scale, scale), 1e-9));
    }

    /// Device points map back onto the user-space points they came from.
    #[test]
    fn prop_page_transform_inverts(
        x in -500.0..500.0f64,
        y in -500.0..500.0f64,
        width in 1.0..2000.0f64,
        height in 1.0..2000.0f64,
        quarter in 0..4u32,
        zoom in 0.1..8.0f64,
        px in 0.0..1.0f64,
        py in 0.0..1.0f64,
    ) {
        let rect = PRectangle::new(x, y, width, height);
        let rotation = (quarter * 90) as f64;
        let transform = geometry::page_transform(&rect, rotation, zoom);
        let inverse = transform.invert().unwrap();

        let user = (x + px * width, y + py * height);
        let device = transform.transform_point(user.0, user.1);
        let back = inverse.transform_point(device.0, device.1);
        let tolerance = 1e-6 * (1.0 + x.abs() + y.abs() + width + height);
        prop_assert!((back.0 - user.0).abs() < tolerance);
        prop_assert!((back.1 - user.1).abs() < tolerance);

        let size = geometry::size(&rect, rotation, zoom);
        let slack = 1e-6 * (1.0 + size.width + size.height);
        prop_assert!(device.0 > -slack && device.0 < size.width + slack);
        prop_assert!(device.1 > -slack && device.1 < size.height + slack);
    }

    /// Arbitrary bytes never panic the content parser.
    #[test]
    fn prop_content_parser_never_panics(data in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = parser().parse(&data);
        let _ = parser().parse_text_blocks(&data);
    }

    /// Arbitrary bytes never panic the document loader, and a page of
    /// whatever loaded can still be initialised.
    #[test]
    fn prop_document_open_never_panics(data in prop::collection::vec(any::<u8>(), 0..512)) {
        if let Ok(doc) = Document::open(data) {
            for page in doc.pages() {
                let _ = page.shapes();
            }
        }
    }
}
