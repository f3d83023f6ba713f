//! Source file descriptors.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A file on disk that has been checked for existence.
///
/// This is the input unit handed to processors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Path as given by the caller
    pub path: PathBuf,

    /// File name without directories
    pub file_name: String,

    /// File name without extension
    pub stem: String,

    /// Lower-cased extension including the leading dot, empty if none
    pub extension: String,

    /// Size in bytes
    pub size: u64,
}

impl SourceFile {
    /// Stat the file, failing with `FileNotFound` when it is missing.
    pub fn inspect(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let size = std::fs::metadata(path)
            .map_err(|e| Error::io(path, e))?
            .len();

        Ok(Self {
            path: path.to_path_buf(),
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            stem: path
                .file_stem()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            extension: extension_of(path),
            size,
        })
    }

    /// `<file_stem>_<format_tag>`, e.g. `report_pdf`.
    pub fn document_id(&self, format_tag: &str) -> String {
        format!("{}_{}", self.stem, format_tag)
    }
}

/// Lower-cased extension with a leading dot (`.pdf`), or an empty string.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}
