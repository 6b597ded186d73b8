//! PDF to PNG conversion.
//!
//! [`PdfToImageConverter`] rasterizes the first page of a PDF at a fixed
//! scale and returns the PNG both as a named file and as an object URL.
//! The stages run in order and stop at the first failure:
//!
//! library ready -> document parsed -> page rendered -> blob encoded

use crate::blob::{png_file_name, FileError, ImageFile, ObjectUrlRegistry, PNG_MIME_TYPE};
use crate::library::{
    DocumentOptions, LibraryError, LibraryLoader, RenderDocument, RenderLibrary, RenderOptions,
    Smoothing, FIRST_PAGE_INDEX,
};
use crate::pdfium::{LibraryLocation, PdfiumLibrary};
use crate::source::PdfSource;
use crate::surface::{EncodeError, Surface, SurfaceError, Viewport};
use std::io;
use std::sync::Arc;

/// Scale applied to the page size in points.
pub const RENDER_SCALE: f32 = 4.0;

/// Quality passed to the PNG encoder.
pub const PNG_QUALITY: f32 = 0.9;

/// Broad category of a conversion failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Environment,
    Encoding,
    Library,
}

/// Errors that can occur during a conversion.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("File is empty or could not be read")]
    EmptyInput,

    #[error("File is empty or could not be read: {0}")]
    Read(#[from] io::Error),

    #[error("PDF has no pages")]
    NoPages,

    #[error(transparent)]
    Surface(#[from] SurfaceError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    File(#[from] FileError),

    #[error(transparent)]
    Library(#[from] LibraryError),
}

impl ConvertError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConvertError::EmptyInput | ConvertError::Read(_) | ConvertError::NoPages => {
                ErrorKind::Validation
            }
            ConvertError::Surface(_) => ErrorKind::Environment,
            ConvertError::Encode(_) | ConvertError::File(_) => ErrorKind::Encoding,
            ConvertError::Library(_) => ErrorKind::Library,
        }
    }

    /// Message reported to callers of [`PdfToImageConverter::convert`].
    pub fn report(&self) -> String {
        match self.kind() {
            ErrorKind::Encoding => self.to_string(),
            _ => format!("Failed to convert PDF: {}", self),
        }
    }
}

/// A successful conversion.
#[derive(Debug, Clone)]
pub struct ConvertedImage {
    pub image_url: String,
    pub file: ImageFile,
    pub width: u32,
    pub height: u32,
}

/// Outcome of [`PdfToImageConverter::convert`].
///
/// On failure `image_url` is empty, `file` is `None` and `error` holds
/// the message.
#[derive(Debug, Clone, Default)]
pub struct ConversionResult {
    pub image_url: String,
    pub file: Option<ImageFile>,
    pub error: Option<String>,
    pub kind: Option<ErrorKind>,
}

impl ConversionResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.file.is_some() && !self.image_url.is_empty()
    }
}

impl From<Result<ConvertedImage, ConvertError>> for ConversionResult {
    fn from(result: Result<ConvertedImage, ConvertError>) -> Self {
        match result {
            Ok(image) => ConversionResult {
                image_url: image.image_url,
                file: Some(image.file),
                error: None,
                kind: None,
            },
            Err(e) => ConversionResult {
                image_url: String::new(),
                file: None,
                error: Some(e.report()),
                kind: Some(e.kind()),
            },
        }
    }
}

/// Converts the first page of a PDF into a PNG.
pub struct PdfToImageConverter<L> {
    loader: LibraryLoader<L>,
    urls: Arc<ObjectUrlRegistry>,
}

impl PdfToImageConverter<PdfiumLibrary> {
    /// Creates a converter that binds PDFium from `location` on first use.
    pub fn with_pdfium(location: LibraryLocation) -> Self {
        Self::new(LibraryLoader::new(move || PdfiumLibrary::bind(&location)))
    }
}

impl<L: RenderLibrary> PdfToImageConverter<L> {
    pub fn new(loader: LibraryLoader<L>) -> Self {
        Self::with_url_registry(loader, Arc::new(ObjectUrlRegistry::new()))
    }

    /// Creates a converter that registers its URLs in `urls`.
    pub fn with_url_registry(loader: LibraryLoader<L>, urls: Arc<ObjectUrlRegistry>) -> Self {
        PdfToImageConverter { loader, urls }
    }

    pub fn loader(&self) -> &LibraryLoader<L> {
        &self.loader
    }

    /// Registry holding the URLs of converted images. Callers revoke them.
    pub fn urls(&self) -> &Arc<ObjectUrlRegistry> {
        &self.urls
    }

    /// Converts `source`, reporting any failure in the result.
    pub fn convert(&self, source: &dyn PdfSource) -> ConversionResult {
        tracing::debug!(name = source.name(), "starting PDF to image conversion");
        let result = self.try_convert(source);
        if let Err(e) = &result {
            match e.kind() {
                ErrorKind::Encoding => tracing::warn!(error = %e, "could not produce image file"),
                _ => tracing::error!(error = %e, kind = ?e.kind(), "PDF conversion error"),
            }
        }
        result.into()
    }

    /// Converts `source`, returning the first failure as an error.
    pub fn try_convert(&self, source: &dyn PdfSource) -> Result<ConvertedImage, ConvertError> {
        tracing::debug!("loading PDF library");
        let library = self.loader.get()?;

        let data = source.read_bytes()?;
        if data.is_empty() {
            return Err(ConvertError::EmptyInput);
        }
        tracing::debug!(bytes = data.len(), "file read successfully");

        let options = DocumentOptions::default();
        let document = library.open_document(&data, &options)?;
        let pages = document.page_count();
        tracing::debug!(pages, "PDF loaded");
        if pages == 0 {
            return Err(ConvertError::NoPages);
        }

        let page_size = document.page_size(FIRST_PAGE_INDEX)?;
        let viewport = Viewport::new(page_size.width, page_size.height, RENDER_SCALE);

        // An empty or over-limit surface encodes to no blob at all.
        if !viewport.is_drawable() {
            tracing::warn!(
                width = viewport.width,
                height = viewport.height,
                "viewport cannot be drawn"
            );
            return Err(EncodeError::EmptyBlob.into());
        }

        let mut surface = Surface::for_viewport(&viewport)?;
        tracing::debug!(
            width = viewport.width,
            height = viewport.height,
            "rendering first page"
        );
        document.render_page(
            FIRST_PAGE_INDEX,
            &viewport,
            &mut surface,
            &RenderOptions {
                smoothing: Smoothing::High,
            },
        )?;

        let blob = surface.to_png(PNG_QUALITY)?;
        tracing::debug!(bytes = blob.size(), "blob created");

        let file = ImageFile::new(blob, &png_file_name(source.name()), PNG_MIME_TYPE)?;
        let image_url = self.urls.create_object_url(file.blob());

        tracing::info!(
            file = file.name(),
            width = viewport.width,
            height = viewport.height,
            "conversion completed"
        );
        Ok(ConvertedImage {
            image_url,
            file,
            width: viewport.width,
            height: viewport.height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::PageSize;
    use crate::source::InputFile;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeLibrary {
        pages: Vec<PageSize>,
    }

    struct FakeDocument<'a> {
        pages: &'a [PageSize],
    }

    impl RenderLibrary for FakeLibrary {
        type Document<'a> = FakeDocument<'a>
        where
            Self: 'a;

        fn open_document<'a>(
            &'a self,
            data: &'a [u8],
            options: &'a DocumentOptions,
        ) -> Result<Self::Document<'a>, LibraryError> {
            assert_eq!(*options, DocumentOptions::default());
            if !data.starts_with(b"%PDF-") {
                return Err(LibraryError::Document("Invalid PDF structure".into()));
            }
            Ok(FakeDocument { pages: &self.pages })
        }
    }

    impl RenderDocument for FakeDocument<'_> {
        fn page_count(&self) -> u16 {
            self.pages.len() as u16
        }

        fn page_size(&self, index: u16) -> Result<PageSize, LibraryError> {
            self.pages
                .get(index as usize)
                .copied()
                .ok_or(LibraryError::PageOutOfRange {
                    index,
                    count: self.page_count(),
                })
        }

        fn render_page(
            &self,
            _index: u16,
            _viewport: &Viewport,
            surface: &mut Surface,
            options: &RenderOptions,
        ) -> Result<(), LibraryError> {
            assert_eq!(options.smoothing, Smoothing::High);
            surface.fill([255, 255, 255, 255]);
            Ok(())
        }
    }

    fn converter(pages: Vec<PageSize>) -> PdfToImageConverter<FakeLibrary> {
        PdfToImageConverter::new(LibraryLoader::ready(FakeLibrary { pages }))
    }

    fn letter() -> PageSize {
        PageSize {
            width: 61.2,
            height: 79.2,
        }
    }

    #[test]
    fn test_convert_success() {
        let converter = converter(vec![letter()]);
        let result = converter.convert(&InputFile::new("resume.pdf", b"%PDF-1.7".to_vec()));

        assert!(result.is_success());
        assert!(result.error.is_none());
        assert!(result.image_url.starts_with("blob:"));

        let file = result.file.unwrap();
        assert_eq!(file.name(), "resume.png");
        assert_eq!(file.mime_type(), "image/png");

        let decoded = image::load_from_memory(file.bytes()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (244, 316));
        assert_eq!(
            converter.urls().resolve(&result.image_url).unwrap().bytes(),
            file.bytes()
        );
    }

    #[test]
    fn test_try_convert_dimensions() {
        let converter = converter(vec![letter(), PageSize { width: 10.0, height: 10.0 }]);
        let image = converter
            .try_convert(&InputFile::new("CV.PDF", b"%PDF-1.4".to_vec()))
            .unwrap();
        assert_eq!((image.width, image.height), (244, 316));
        assert_eq!(image.file.name(), "CV.png");
    }

    #[test]
    fn test_empty_input() {
        let converter = converter(vec![letter()]);
        let result = converter.convert(&InputFile::new("resume.pdf", Vec::new()));

        assert!(!result.is_success());
        assert!(result.file.is_none());
        assert_eq!(result.image_url, "");
        assert_eq!(result.kind, Some(ErrorKind::Validation));
        assert!(result
            .error
            .unwrap()
            .contains("File is empty or could not be read"));
    }

    #[test]
    fn test_no_pages() {
        let converter = converter(vec![]);
        let result = converter.convert(&InputFile::new("blank.pdf", b"%PDF-1.7".to_vec()));

        assert!(result.file.is_none());
        assert_eq!(result.kind, Some(ErrorKind::Validation));
        assert_eq!(result.error.as_deref(), Some("Failed to convert PDF: PDF has no pages"));
    }

    #[test]
    fn test_invalid_document() {
        let converter = converter(vec![letter()]);
        let result = converter.convert(&InputFile::new("fake.pdf", b"not a pdf".to_vec()));

        assert_eq!(result.kind, Some(ErrorKind::Library));
        assert!(result.error.unwrap().starts_with("Failed to convert PDF: "));
        assert!(converter.urls().is_empty());
    }

    #[test]
    fn test_sub_pixel_page_yields_no_blob() {
        let converter = converter(vec![PageSize {
            width: 0.1,
            height: 0.1,
        }]);
        let result = converter.convert(&InputFile::new("dot.pdf", b"%PDF-1.7".to_vec()));

        assert!(result.file.is_none());
        assert_eq!(result.image_url, "");
        assert_eq!(result.kind, Some(ErrorKind::Encoding));
        assert_eq!(
            result.error.as_deref(),
            Some("Failed to create image blob: blob is null")
        );
        assert!(converter.urls().is_empty());
    }

    #[test]
    fn test_oversized_page_yields_no_blob() {
        let converter = converter(vec![PageSize {
            width: 14_400.0,
            height: 14_400.0,
        }]);
        let result = converter.convert(&InputFile::new("poster.pdf", b"%PDF-1.7".to_vec()));

        assert_eq!(result.kind, Some(ErrorKind::Encoding));
        assert_eq!(
            result.error.as_deref(),
            Some("Failed to create image blob: blob is null")
        );
    }

    #[test]
    fn test_invalid_output_name_is_encoding_error() {
        let converter = converter(vec![letter()]);
        let result = converter.convert(&InputFile::new("uploads/cv.pdf", b"%PDF-1.7".to_vec()));

        assert_eq!(result.kind, Some(ErrorKind::Encoding));
        assert!(result
            .error
            .unwrap()
            .starts_with("Error creating File object"));
        assert_eq!(result.image_url, "");
    }

    #[test]
    fn test_convert_twice_yields_independent_urls() {
        let converter = converter(vec![letter()]);
        let input = InputFile::new("resume.pdf", b"%PDF-1.7".to_vec());

        let first = converter.try_convert(&input).unwrap();
        let second = converter.try_convert(&input).unwrap();

        assert_ne!(first.image_url, second.image_url);
        assert_eq!((first.width, first.height), (second.width, second.height));
        assert_eq!(converter.urls().len(), 2);

        assert!(converter.urls().revoke(&first.image_url));
        assert!(converter.urls().resolve(&second.image_url).is_some());
    }

    #[test]
    fn test_library_load_failure_is_reported() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let converter = PdfToImageConverter::new(LibraryLoader::<FakeLibrary>::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(LibraryError::Bind("libpdfium not found".into()))
        }));
        let input = InputFile::new("resume.pdf", b"%PDF-1.7".to_vec());

        let result = converter.convert(&input);
        assert_eq!(result.kind, Some(ErrorKind::Library));
        assert_eq!(
            result.error.as_deref(),
            Some("Failed to convert PDF: Failed to load PDF library: libpdfium not found")
        );

        converter.convert(&input);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(ConvertError::EmptyInput.kind(), ErrorKind::Validation);
        assert_eq!(ConvertError::NoPages.kind(), ErrorKind::Validation);
        assert_eq!(
            ConvertError::from(EncodeError::EmptyBlob).kind(),
            ErrorKind::Encoding
        );
        assert_eq!(
            ConvertError::from(EncodeError::EmptyBlob).report(),
            "Failed to create image blob: blob is null"
        );
        assert_eq!(
            ConvertError::from(LibraryError::Abandoned).kind(),
            ErrorKind::Library
        );
        let allocation = ConvertError::from(SurfaceError::Allocation {
            width: 10,
            height: 10,
        });
        assert_eq!(allocation.kind(), ErrorKind::Environment);
        assert_eq!(
            allocation.report(),
            "Failed to convert PDF: Could not allocate a 10x10 drawing surface"
        );
    }
}
