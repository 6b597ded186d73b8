//! pdf2png
//!
//! This library rasterizes the first page of a PDF into a PNG image using
//! PDFium, returning it as a named file and a revocable object URL.

pub mod blob;
pub mod converter;
pub mod library;
pub mod pdfium;
pub mod source;
pub mod surface;

pub use blob::{png_file_name, Blob, FileError, ImageFile, ObjectUrlRegistry, PNG_MIME_TYPE};
pub use converter::{
    ConversionResult, ConvertError, ConvertedImage, ErrorKind, PdfToImageConverter, PNG_QUALITY,
    RENDER_SCALE,
};
pub use library::{
    DocumentOptions, LibraryError, LibraryLoader, PageSize, RenderDocument, RenderLibrary,
    RenderOptions, Smoothing, FIRST_PAGE_INDEX,
};
pub use pdfium::{BuildMode, LibraryLocation, PdfiumLibrary};
pub use source::{InputFile, PathSource, PdfSource};
pub use surface::{EncodeError, Surface, SurfaceError, Viewport};
