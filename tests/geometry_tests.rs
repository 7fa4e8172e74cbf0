mod test_utils;

use pdf_shapes::core::geometry::{self, Boundary, PRectangle};
use test_utils::*;

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {}, got {}",
        expected,
        actual
    );
}

#[test]
fn test_user_rotation_swaps_page_size() {
    let doc = open(page_document("/MediaBox [0 0 600 800]", b""));
    let page = doc.page(0).unwrap();

    let upright = page.size(Boundary::Media, 0.0, 1.0);
    assert_close(upright.width, 600.0);
    assert_close(upright.height, 800.0);

    let rotated = page.size(Boundary::Media, 90.0, 1.0);
    assert_close(rotated.width, 800.0);
    assert_close(rotated.height, 600.0);

    let zoomed = page.size(Boundary::Media, 270.0, 2.0);
    assert_close(zoomed.width, 1600.0);
    assert_close(zoomed.height, 1200.0);
}

#[test]
fn test_page_shape_fills_device_area() {
    let doc = open(page_document("/MediaBox [0 0 600 800]", b""));
    let page = doc.page(0).unwrap();
    for rotation in [0.0, 90.0, 180.0, 270.0] {
        let size = page.size(Boundary::Crop, rotation, 1.5);
        let corners = page.page_shape(Boundary::Crop, rotation, 1.5);
        for (x, y) in corners {
            assert!(x > -1e-9 && x < size.width + 1e-9, "x {} at {}", x, rotation);
            assert!(y > -1e-9 && y < size.height + 1e-9, "y {} at {}", y, rotation);
        }
        let bounds = PRectangle::bounding(&corners).unwrap();
        assert_close(bounds.width, size.width);
        assert_close(bounds.height, size.height);
    }
}

#[test]
fn test_user_space_origin_lands_bottom_left() {
    let doc = open(page_document("/MediaBox [0 0 612 792]", b""));
    let page = doc.page(0).unwrap();
    let transform = page.page_transform(Boundary::Crop, 0.0, 1.0);
    let (x, y) = transform.transform_point(0.0, 0.0);
    assert_close(x, 0.0);
    assert_close(y, 792.0);
    let (x, y) = transform.transform_point(612.0, 792.0);
    assert_close(x, 612.0);
    assert_close(y, 0.0);
}

#[test]
fn test_crop_box_inherited_and_clipped_to_media() {
    let mut builder = PdfBuilder::new();
    builder
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(
            2,
            "<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 600 800] /CropBox [-50 100 400 1000] /Rotate 90 >>",
        )
        .object(3, "<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>")
        .stream(4, "", b"");
    let doc = open(builder.build(1));
    let page = doc.page(0).unwrap();

    assert_eq!(
        page.page_boundary(Boundary::Media),
        PRectangle::new(0.0, 0.0, 600.0, 800.0)
    );
    assert_eq!(
        page.page_boundary(Boundary::Crop),
        PRectangle::new(0.0, 100.0, 400.0, 700.0)
    );
    // Missing art and bleed boxes fall back to the crop box.
    assert_eq!(
        page.page_boundary(Boundary::Art),
        page.page_boundary(Boundary::Crop)
    );
    assert_eq!(page.stored_rotation(), 90.0);
    assert_eq!(page.total_rotation(0.0), 270.0);
}

#[test]
fn test_missing_media_box_defaults_to_letter() {
    let doc = open(page_document("", b""));
    let page = doc.page(0).unwrap();
    assert_eq!(
        page.page_boundary(Boundary::Media),
        PRectangle::new(0.0, 0.0, 612.0, 792.0)
    );
}

#[test]
fn test_rotation_snapping_and_wrapping() {
    assert_eq!(geometry::total_rotation(0.0, 89.995), 90.0);
    assert_eq!(geometry::total_rotation(0.0, 450.0), 90.0);
    assert_eq!(geometry::total_rotation(0.0, -90.0), 270.0);
    assert_eq!(geometry::total_rotation(180.0, 0.0), 180.0);
    assert_eq!(geometry::total_rotation(270.0, 0.0), 90.0);
    assert_close(geometry::total_rotation(0.0, 45.0), 45.0);
}

#[test]
fn test_odd_angle_uses_rotated_bounds() {
    let rect = PRectangle::new(0.0, 0.0, 100.0, 100.0);
    let size = geometry::size(&rect, 45.0, 1.0);
    let diagonal = 100.0 * std::f64::consts::SQRT_2;
    assert_close(size.width, diagonal);
    assert_close(size.height, diagonal);

    for (x, y) in geometry::page_shape(&rect, 45.0, 1.0) {
        assert!(x > -1e-9 && x < diagonal + 1e-9);
        assert!(y > -1e-9 && y < diagonal + 1e-9);
    }
}
