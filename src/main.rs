use pdf_shapes::core::geometry::Boundary;
use pdf_shapes::core::{Document, Page, RenderHints};
use pdf_shapes::rendering::{RecordedOp, RecordingDevice, Shape};
use std::env;
use std::path::Path;
use std::process;

struct Options {
    show_pages: bool,
    show_shapes: bool,
    show_text: bool,
    show_boxes: bool,
    rotation: f64,
    zoom: f64,
}

fn usage(program: &str) -> ! {
    eprintln!("PDF Page Inspector");
    eprintln!("Usage: {} <pdf-file> [options]", program);
    eprintln!("\nOptions:");
    eprintln!("  --pages            Show page sizes and rotation (default)");
    eprintln!("  --shapes           Show shape statistics per page");
    eprintln!("  --text             Show text blocks per page");
    eprintln!("  --boxes            Show all five boundary boxes");
    eprintln!("  --rotation <deg>   Viewer rotation added to each page (default 0)");
    eprintln!("  --zoom <factor>    Zoom used for device sizes (default 1)");
    eprintln!("\nSet RUST_LOG=debug to see dropped operators and degraded pages.");
    process::exit(1);
}

fn value_after(args: &[String], flag: &str) -> Option<f64> {
    let pos = args.iter().position(|arg| arg == flag)?;
    match args.get(pos + 1).and_then(|value| value.parse::<f64>().ok()) {
        Some(value) => Some(value),
        None => {
            eprintln!("Error: {} requires a number", flag);
            process::exit(1);
        }
    }
}

fn parse_options(args: &[String]) -> Options {
    let has = |flag: &str| args.iter().any(|arg| arg == flag);
    let show_shapes = has("--shapes");
    let show_text = has("--text");
    let show_boxes = has("--boxes");
    Options {
        show_pages: has("--pages") || !(show_shapes || show_text || show_boxes),
        show_shapes,
        show_text,
        show_boxes,
        rotation: value_after(args, "--rotation").unwrap_or(0.0),
        zoom: value_after(args, "--zoom").unwrap_or(1.0),
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        usage(&args[0]);
    }
    let pdf_path = &args[1];
    if !Path::new(pdf_path).exists() {
        eprintln!("Error: File not found: {}", pdf_path);
        process::exit(1);
    }
    let options = parse_options(&args[2..]);

    let doc = match Document::open_file(pdf_path) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("Error opening PDF: {}", e);
            process::exit(1);
        }
    };

    println!("╔═══════════════════════════════════════════════════════════╗");
    println!("║           PDF Page Inspector                              ║");
    println!("╚═══════════════════════════════════════════════════════════╝");
    println!("\nFile: {}", pdf_path);
    println!("Objects: {}", doc.library().len());
    println!("Pages: {}\n", doc.page_count());

    for page in doc.pages() {
        println!("═══════════════ PAGE {} ═══════════════", page.index() + 1);
        if options.show_pages {
            print_page_info(page, &options);
        }
        if options.show_boxes {
            print_boxes(page);
        }
        if options.show_shapes {
            print_shape_stats(page, &options);
        }
        if options.show_text {
            print_text(page);
        }
        // Keep memory flat on large files.
        page.dispose(false);
        println!();
    }
}

fn print_page_info(page: &Page, options: &Options) {
    let size = page.size(Boundary::Crop, options.rotation, options.zoom);
    println!(
        "Size: {:.2} x {:.2} (zoom {}, rotation {}°)",
        size.width,
        size.height,
        options.zoom,
        page.total_rotation(options.rotation)
    );
    println!("Stored /Rotate: {}", page.stored_rotation());
    println!("Transform: {}", page.page_transform(Boundary::Crop, options.rotation, options.zoom));
}

fn print_boxes(page: &Page) {
    for boundary in Boundary::ALL {
        println!("  {:<9} {}", boundary.key(), page.page_boundary(boundary));
    }
}

fn print_shape_stats(page: &Page, options: &Options) {
    let shapes = page.shapes();
    let (mut paths, mut text, mut images, mut shadings) = (0, 0, 0, 0);
    for shape in shapes.iter() {
        match shape {
            Shape::Path(_) => paths += 1,
            Shape::Text(_) => text += 1,
            Shape::Image(_) => images += 1,
            Shape::Shading(_) => shadings += 1,
        }
    }
    println!(
        "Shapes: {} (paths {}, text runs {}, images {}, shadings {})",
        shapes.len(),
        paths,
        text,
        images,
        shadings
    );

    let undecoded = shapes.images().filter(|image| image.pixels.is_none()).count();
    if undecoded > 0 {
        println!("  {} image(s) without a decoder", undecoded);
    }

    let mut device = RecordingDevice::new();
    match page.paint(
        &mut device,
        &RenderHints::screen(),
        Boundary::Crop,
        options.rotation,
        options.zoom,
        true,
    ) {
        Ok(()) => {
            let annotation_ops = device
                .operations()
                .iter()
                .filter(|op| matches!(op, RecordedOp::Save))
                .count()
                .saturating_sub(1);
            println!(
                "Painted operations: {} ({} annotation appearance(s))",
                device.operations().len(),
                annotation_ops
            );
        }
        Err(e) => println!("Paint failed: {}", e),
    }
}

fn print_text(page: &Page) {
    let blocks = page.text_blocks();
    if blocks.is_empty() {
        println!("(no text)");
        return;
    }
    for block in blocks.iter() {
        let Some(first) = block.items.first() else {
            continue;
        };
        println!(
            "[{:>7.2}, {:>7.2}] {}",
            first.origin.0,
            first.origin.1,
            block.text()
        );
    }
}
