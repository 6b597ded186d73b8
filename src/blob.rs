//! Encoded image bytes, named image files and revocable object URLs.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// MIME type of every converted image.
pub const PNG_MIME_TYPE: &str = "image/png";

const OBJECT_URL_PREFIX: &str = "blob:pdf2png/";

/// Errors that can occur while building an [`ImageFile`].
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("Error creating File object: file name is empty")]
    EmptyName,

    #[error("Error creating File object: invalid file name {0:?}")]
    InvalidName(String),
}

/// Immutable, cheaply cloned bytes with a MIME type.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    bytes: Arc<[u8]>,
    mime_type: String,
}

impl Blob {
    pub fn new(bytes: Vec<u8>, mime_type: &str) -> Self {
        Blob {
            bytes: bytes.into(),
            mime_type: mime_type.to_string(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// A named blob, ready to be written out or uploaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFile {
    name: String,
    blob: Blob,
}

impl ImageFile {
    /// Wraps `blob` under `name`, retyped to `mime_type`.
    pub fn new(blob: Blob, name: &str, mime_type: &str) -> Result<Self, FileError> {
        if name.is_empty() {
            return Err(FileError::EmptyName);
        }
        if name.contains(['/', '\\', '\0']) {
            return Err(FileError::InvalidName(name.to_string()));
        }

        Ok(ImageFile {
            name: name.to_string(),
            blob: Blob {
                bytes: blob.bytes,
                mime_type: mime_type.to_string(),
            },
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        self.blob.mime_type()
    }

    pub fn bytes(&self) -> &[u8] {
        self.blob.bytes()
    }

    pub fn size(&self) -> usize {
        self.blob.size()
    }

    pub fn blob(&self) -> &Blob {
        &self.blob
    }
}

/// Returns the PNG name for a PDF file name.
///
/// A trailing `.pdf` (any case) is replaced; other names get `.png` appended.
pub fn png_file_name(original: &str) -> String {
    let base = original.len().checked_sub(4).and_then(|split| {
        let (head, tail) = (original.get(..split)?, original.get(split..)?);
        tail.eq_ignore_ascii_case(".pdf").then_some(head)
    });
    format!("{}.png", base.unwrap_or(original))
}

/// Process-local registry of revocable URLs that reference blobs.
///
/// URLs stay valid until revoked; nothing here revokes them on its own.
#[derive(Debug, Default)]
pub struct ObjectUrlRegistry {
    entries: RwLock<HashMap<String, Blob>>,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `blob` under a fresh URL.
    pub fn create_object_url(&self, blob: &Blob) -> String {
        let url = format!("{}{}", OBJECT_URL_PREFIX, Uuid::new_v4());
        self.entries.write().insert(url.clone(), blob.clone());
        url
    }

    pub fn resolve(&self, url: &str) -> Option<Blob> {
        self.entries.read().get(url).cloned()
    }

    /// Releases `url`. Returns false if it was unknown or already revoked.
    pub fn revoke(&self, url: &str) -> bool {
        self.entries.write().remove(url).is_some()
    }

    /// Number of live URLs.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
