//! PDFium-backed [`RenderLibrary`].
//!
//! The PDFium shared library is looked up in a build-mode dependent
//! location, then in the system library path.

use crate::library::{
    DocumentOptions, LibraryError, PageSize, RenderDocument, RenderLibrary, RenderOptions,
    Smoothing,
};
use crate::surface::{Surface, Viewport};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the PDFium library location.
pub const LIBRARY_PATH_ENV: &str = "PDF2PNG_PDFIUM_PATH";

/// Directory searched for PDFium in deployed builds.
pub const PRODUCTION_LIBRARY_DIR: &str = "/usr/lib/pdf2png";

/// Whether this binary was built for development or deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    Development,
    Production,
}

impl BuildMode {
    pub fn current() -> Self {
        if cfg!(debug_assertions) {
            BuildMode::Development
        } else {
            BuildMode::Production
        }
    }
}

/// Where to look for the PDFium shared library.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryLocation {
    mode: BuildMode,
    override_path: Option<PathBuf>,
}

impl Default for LibraryLocation {
    fn default() -> Self {
        LibraryLocation {
            mode: BuildMode::current(),
            override_path: None,
        }
    }
}

impl LibraryLocation {
    pub fn new(mode: BuildMode) -> Self {
        LibraryLocation {
            mode,
            override_path: None,
        }
    }

    /// Tries `path` before the build-mode locations. `path` may name the
    /// library file itself or the directory holding it.
    pub fn with_override(mut self, path: impl Into<PathBuf>) -> Self {
        self.override_path = Some(path.into());
        self
    }

    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    /// Candidate library files, in search order.
    pub fn search_paths(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Some(path) = &self.override_path {
            if path.is_dir() {
                paths.push(Pdfium::pdfium_platform_library_name_at_path(path.as_path()));
            } else {
                paths.push(path.clone());
            }
        }

        match self.mode {
            BuildMode::Development => {
                let package_lib = Path::new(env!("CARGO_MANIFEST_DIR")).join("lib");
                paths.push(Pdfium::pdfium_platform_library_name_at_path(
                    package_lib.as_path(),
                ));
                if let Ok(cwd) = std::env::current_dir() {
                    let cwd_lib = cwd.join("lib");
                    if cwd_lib != package_lib {
                        paths.push(Pdfium::pdfium_platform_library_name_at_path(
                            cwd_lib.as_path(),
                        ));
                    }
                }
            }
            BuildMode::Production => {
                paths.push(Pdfium::pdfium_platform_library_name_at_path(Path::new(
                    PRODUCTION_LIBRARY_DIR,
                )));
            }
        }

        paths
    }
}

/// A bound PDFium instance.
pub struct PdfiumLibrary {
    pdfium: Pdfium,
}

impl PdfiumLibrary {
    /// Binds PDFium from `location`, falling back to the system library.
    pub fn bind(location: &LibraryLocation) -> Result<Self, LibraryError> {
        for path in location.search_paths() {
            if !path.exists() {
                continue;
            }
            match Pdfium::bind_to_library(&path) {
                Ok(bindings) => {
                    tracing::debug!(path = %path.display(), "bound PDFium");
                    return Ok(PdfiumLibrary {
                        pdfium: Pdfium::new(bindings),
                    });
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = ?e, "could not bind PDFium");
                }
            }
        }

        let bindings = Pdfium::bind_to_system_library()
            .map_err(|e| LibraryError::Bind(format!("{:?}", e)))?;
        tracing::debug!("bound system PDFium");
        Ok(PdfiumLibrary {
            pdfium: Pdfium::new(bindings),
        })
    }
}

impl RenderLibrary for PdfiumLibrary {
    type Document<'a> = PdfiumDocument<'a>
    where
        Self: 'a;

    fn open_document<'a>(
        &'a self,
        data: &'a [u8],
        options: &'a DocumentOptions,
    ) -> Result<Self::Document<'a>, LibraryError> {
        tracing::trace!(
            disable_worker = options.disable_worker,
            use_system_fonts = options.use_system_fonts,
            "opening document with PDFium"
        );
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(data, options.password.as_deref())
            .map_err(|e| LibraryError::Document(format!("{:?}", e)))?;
        Ok(PdfiumDocument { document })
    }
}

/// A document opened by [`PdfiumLibrary`].
pub struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl PdfiumDocument<'_> {
    fn page(&self, index: u16) -> Result<PdfPage<'_>, LibraryError> {
        let count = self.page_count();
        if index >= count {
            return Err(LibraryError::PageOutOfRange { index, count });
        }
        self.document
            .pages()
            .get(index)
            .map_err(|e| LibraryError::Document(format!("{:?}", e)))
    }
}

impl RenderDocument for PdfiumDocument<'_> {
    fn page_count(&self) -> u16 {
        self.document.pages().len()
    }

    fn page_size(&self, index: u16) -> Result<PageSize, LibraryError> {
        let page = self.page(index)?;
        Ok(PageSize {
            width: page.width().value,
            height: page.height().value,
        })
    }

    fn render_page(
        &self,
        index: u16,
        viewport: &Viewport,
        surface: &mut Surface,
        options: &RenderOptions,
    ) -> Result<(), LibraryError> {
        let render_error = |message: String| LibraryError::Render { index, message };

        let page = self.page(index)?;
        let target_width = i32::try_from(viewport.width)
            .map_err(|_| render_error(format!("width {} too large", viewport.width)))?;
        let target_height = i32::try_from(viewport.height)
            .map_err(|_| render_error(format!("height {} too large", viewport.height)))?;

        let smooth = options.smoothing != Smoothing::Disabled;
        let config = PdfRenderConfig::new()
            .set_target_size(target_width, target_height)
            .render_form_data(true)
            .set_text_smoothing(smooth)
            .set_image_smoothing(smooth)
            .set_path_smoothing(smooth);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| render_error(format!("{:?}", e)))?;

        let (width, height) = (bitmap.width() as u32, bitmap.height() as u32);
        if (width, height) != (surface.width(), surface.height()) {
            return Err(render_error(format!(
                "rendered {}x{} into a {}x{} surface",
                width,
                height,
                surface.width(),
                surface.height()
            )));
        }

        surface
            .put_rgba(bitmap.as_rgba_bytes())
            .map_err(|e| render_error(e.to_string()))
    }
}
