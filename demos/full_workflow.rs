//! Example demonstrating the full conversion workflow.
//!
//! This example shows how to:
//! 1. Build a blank US Letter PDF with printpdf
//! 2. Convert its first page with PDFium
//! 3. Write the PNG and release its object URL
//!
//! Run with: cargo run --example full_workflow
//! (PDFium must be installed, or set PDF2PNG_PDFIUM_PATH)

use pdf2png::{InputFile, LibraryLocation, PdfToImageConverter};
use printpdf::Mm;
use std::io::BufWriter;

fn create_resume_pdf() -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    // US Letter, 612 x 792 points
    let (doc, _, _) = printpdf::PdfDocument::new("Resume", Mm(215.9), Mm(279.4), "Layer 1");

    let mut buf = Vec::new();
    doc.save(&mut BufWriter::new(&mut buf))
        .map_err(|e| e.to_string())?;
    Ok(buf)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("debug").init();

    println!("Creating PDF...");
    let pdf = create_resume_pdf()?;
    println!("PDF size: {} bytes", pdf.len());

    let mut location = LibraryLocation::default();
    if let Ok(path) = std::env::var(pdf2png::pdfium::LIBRARY_PATH_ENV) {
        location = location.with_override(path);
    }
    let converter = PdfToImageConverter::with_pdfium(location);

    println!("Converting first page...");
    let image = converter.try_convert(&InputFile::new("resume.pdf", pdf))?;
    println!(
        "Rendered {}x{} image, URL {}",
        image.width, image.height, image.image_url
    );

    std::fs::write(image.file.name(), image.file.bytes())?;
    println!("✓ Saved {} ({} bytes)", image.file.name(), image.file.size());

    converter.urls().revoke(&image.image_url);
    Ok(())
}
