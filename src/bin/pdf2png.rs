//! pdf2png CLI
//!
//! Converts the first page of each input PDF into a PNG image written
//! next to the input, or to `--output-filename` for a single input.

use clap::Parser;
use pdf2png::{
    ConvertedImage, LibraryLocation, ObjectUrlRegistry, PathSource, PdfToImageConverter,
    PdfiumLibrary,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// pdf2png - Render the first page of a PDF as a PNG image
#[derive(Parser, Debug)]
#[command(name = "pdf2png")]
#[command(version, about, long_about = None)]
struct Args {
    /// Input PDF file(s) to convert
    #[arg(required = true)]
    filenames: Vec<PathBuf>,

    /// Output filename (only valid with single input file)
    #[arg(short, long)]
    output_filename: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// PDFium library file or the directory containing it
    #[arg(long, env = "PDF2PNG_PDFIUM_PATH")]
    library_path: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.debug);

    // Validate arguments
    if args.filenames.len() > 1 && args.output_filename.is_some() {
        eprintln!("Error: --output-filename can only be used with one input file.");
        std::process::exit(1);
    }

    let mut location = LibraryLocation::default();
    if let Some(path) = &args.library_path {
        location = location.with_override(path);
    }
    let converter = PdfToImageConverter::with_pdfium(location);

    let mut success_count = 0;
    let mut failed_files = Vec::new();

    for input_path in &args.filenames {
        if !input_path.exists() {
            eprintln!("Error: File not found: {}", input_path.display());
            failed_files.push(input_path.clone());
            continue;
        }

        println!("\nConverting: {}", input_path.display());

        match convert_document(&converter, input_path, args.output_filename.as_deref()) {
            Ok(output_path) => {
                println!("Output: {}", output_path.display());
                println!("✓ Successfully converted to PNG");
                success_count += 1;
            }
            Err(e) => {
                eprintln!("✗ Conversion failed: {}", e);
                failed_files.push(input_path.clone());
            }
        }
    }

    // Summary
    println!();
    println!("{}", "=".repeat(50));
    println!("Conversion Summary:");
    println!("  Successful: {}", success_count);
    println!("  Failed: {}", failed_files.len());

    if !failed_files.is_empty() {
        println!("\nFailed files:");
        for file in &failed_files {
            println!("  - {}", file.display());
        }
        std::process::exit(1);
    }

    Ok(())
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn convert_document(
    converter: &PdfToImageConverter<PdfiumLibrary>,
    input_path: &Path,
    output_filename: Option<&Path>,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let image = converter.try_convert(&PathSource::new(input_path))?;

    let output_path = match output_filename {
        Some(path) => path.to_path_buf(),
        None => generate_output_filename(input_path, image.file.name()),
    };
    save_image(converter.urls(), &image, &output_path)?;

    tracing::debug!(
        path = %output_path.display(),
        bytes = image.file.size(),
        "wrote image"
    );
    Ok(output_path)
}

/// Writes the image file and revokes its URL, whether or not the write succeeds.
fn save_image(
    urls: &ObjectUrlRegistry,
    image: &ConvertedImage,
    output_path: &Path,
) -> std::io::Result<()> {
    let written = std::fs::write(output_path, image.file.bytes());
    urls.revoke(&image.image_url);
    written
}

fn generate_output_filename(input_path: &Path, file_name: &str) -> PathBuf {
    let mut output = input_path.to_path_buf();
    output.set_file_name(file_name);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf2png::{Blob, ImageFile, PNG_MIME_TYPE};
    use tempfile::TempDir;

    fn registered_image(urls: &ObjectUrlRegistry) -> ConvertedImage {
        let blob = Blob::new(vec![0x89, b'P', b'N', b'G'], PNG_MIME_TYPE);
        let file = ImageFile::new(blob, "resume.png", PNG_MIME_TYPE).unwrap();
        ConvertedImage {
            image_url: urls.create_object_url(file.blob()),
            file,
            width: 1,
            height: 1,
        }
    }

    #[test]
    fn test_generate_output_filename() {
        assert_eq!(
            generate_output_filename(Path::new("dir/Resume.PDF"), "Resume.png"),
            PathBuf::from("dir/Resume.png")
        );
        assert_eq!(
            generate_output_filename(Path::new("/uploads/cv.pdf"), "cv.png"),
            PathBuf::from("/uploads/cv.png")
        );
        assert_eq!(
            generate_output_filename(Path::new("notes"), "notes.png"),
            PathBuf::from("notes.png")
        );
    }

    #[test]
    fn test_save_image_writes_and_revokes() {
        let temp_dir = TempDir::new().unwrap();
        let urls = ObjectUrlRegistry::new();
        let image = registered_image(&urls);
        let output = temp_dir.path().join("resume.png");

        save_image(&urls, &image, &output).unwrap();

        assert_eq!(std::fs::read(&output).unwrap(), image.file.bytes());
        assert!(urls.resolve(&image.image_url).is_none());
        assert!(urls.is_empty());
    }

    #[test]
    fn test_save_image_revokes_on_write_failure() {
        let temp_dir = TempDir::new().unwrap();
        let urls = ObjectUrlRegistry::new();
        let image = registered_image(&urls);
        let output = temp_dir.path().join("missing-dir").join("resume.png");

        assert!(save_image(&urls, &image, &output).is_err());
        assert!(urls.is_empty());
    }
}
