//! PDF inputs: anything with a name and readable bytes.

use std::io;
use std::path::{Path, PathBuf};

/// A named source of PDF bytes.
pub trait PdfSource {
    fn name(&self) -> &str;

    fn read_bytes(&self) -> io::Result<Vec<u8>>;
}

/// PDF bytes already held in memory, e.g. from an upload.
#[derive(Debug, Clone, PartialEq)]
pub struct InputFile {
    name: String,
    bytes: Vec<u8>,
}

impl InputFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        InputFile {
            name: name.into(),
            bytes,
        }
    }
}

impl PdfSource for InputFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_bytes(&self) -> io::Result<Vec<u8>> {
        Ok(self.bytes.clone())
    }
}

/// A PDF file on disk, read when the conversion runs.
#[derive(Debug, Clone, PartialEq)]
pub struct PathSource {
    path: PathBuf,
    name: String,
}

impl PathSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        PathSource { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PdfSource for PathSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_bytes(&self) -> io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }
}
