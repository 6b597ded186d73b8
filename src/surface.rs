//! In-memory drawing surface and PNG encoding.
//!
//! A [`Surface`] is the pixel buffer a page is rendered into. Its size
//! comes from a [`Viewport`]: the page size in points times a scale
//! factor, truncated to whole pixels.

use crate::blob::Blob;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ImageEncoder, RgbaImage};

/// Largest width or height a surface may have.
pub const MAX_SURFACE_SIDE: u32 = 32_767;

/// Largest pixel count a surface may have.
pub const MAX_SURFACE_AREA: u64 = 268_435_456;

/// Errors raised when a surface cannot be allocated or filled.
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("Surface size {width}x{height} is empty")]
    Empty { width: u32, height: u32 },

    #[error("Surface size {width}x{height} exceeds limits")]
    TooLarge { width: u32, height: u32 },

    #[error("Could not allocate a {width}x{height} drawing surface")]
    Allocation { width: u32, height: u32 },

    #[error("Invalid pixel data: expected {expected} bytes, got {actual}")]
    InvalidPixelData { expected: usize, actual: usize },
}

/// Errors raised while encoding a surface.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Failed to create image blob: {0}")]
    Image(#[from] image::ImageError),

    #[error("Failed to create image blob: blob is null")]
    EmptyBlob,
}

/// Pixel-space rectangle a page is rendered at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scale: f32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Scales a page size given in points.
    pub fn new(page_width: f32, page_height: f32, scale: f32) -> Self {
        Viewport {
            scale,
            width: to_pixels(page_width * scale),
            height: to_pixels(page_height * scale),
        }
    }

    /// Whether a surface of this size can hold any pixels.
    pub fn is_drawable(&self) -> bool {
        check_size(self.width, self.height).is_ok()
    }
}

fn check_size(width: u32, height: u32) -> Result<(), SurfaceError> {
    if width == 0 || height == 0 {
        return Err(SurfaceError::Empty { width, height });
    }
    if width > MAX_SURFACE_SIDE
        || height > MAX_SURFACE_SIDE
        || (width as u64) * (height as u64) > MAX_SURFACE_AREA
    {
        return Err(SurfaceError::TooLarge { width, height });
    }
    Ok(())
}

fn to_pixels(value: f32) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.floor().min(u32::MAX as f32) as u32
    } else {
        0
    }
}

/// RGBA pixel buffer with a fixed size.
#[derive(Debug, Clone)]
pub struct Surface {
    pixels: RgbaImage,
}

impl Surface {
    /// Allocates a transparent surface of the given size.
    pub fn new(width: u32, height: u32) -> Result<Self, SurfaceError> {
        check_size(width, height)?;

        let len = (width as usize) * (height as usize) * 4;
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(len)
            .map_err(|_| SurfaceError::Allocation { width, height })?;
        buffer.resize(len, 0);

        let pixels = RgbaImage::from_raw(width, height, buffer)
            .ok_or(SurfaceError::Allocation { width, height })?;
        Ok(Surface { pixels })
    }

    /// Allocates a surface sized to `viewport`.
    pub fn for_viewport(viewport: &Viewport) -> Result<Self, SurfaceError> {
        Self::new(viewport.width, viewport.height)
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Replaces the surface contents with RGBA bytes of the same size.
    pub fn put_rgba(&mut self, rgba: Vec<u8>) -> Result<(), SurfaceError> {
        let expected = (self.width() as usize) * (self.height() as usize) * 4;
        let actual = rgba.len();
        let (width, height) = (self.width(), self.height());
        self.pixels = RgbaImage::from_raw(width, height, rgba)
            .filter(|_| actual == expected)
            .ok_or(SurfaceError::InvalidPixelData { expected, actual })?;
        Ok(())
    }

    /// Fills every pixel with `rgba`.
    pub fn fill(&mut self, rgba: [u8; 4]) {
        for pixel in self.pixels.pixels_mut() {
            pixel.0 = rgba;
        }
    }

    /// Encodes the surface as a PNG blob.
    ///
    /// PNG is lossless, so `quality` selects the compression effort.
    pub fn to_png(&self, quality: f32) -> Result<Blob, EncodeError> {
        let mut bytes = Vec::new();
        let encoder = PngEncoder::new_with_quality(
            &mut bytes,
            compression_for(quality),
            FilterType::Adaptive,
        );
        encoder.write_image(
            self.pixels.as_raw(),
            self.width(),
            self.height(),
            image::ColorType::Rgba8.into(),
        )?;

        if bytes.is_empty() {
            return Err(EncodeError::EmptyBlob);
        }
        Ok(Blob::new(bytes, crate::blob::PNG_MIME_TYPE))
    }
}

fn compression_for(quality: f32) -> CompressionType {
    if quality >= 0.95 {
        CompressionType::Best
    } else if quality >= 0.5 {
        CompressionType::Default
    } else {
        CompressionType::Fast
    }
}
