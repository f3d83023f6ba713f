//! OCR of rendered PDF pages through `pdftoppm` and `tesseract`.

use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::DEFAULT_OCR_DPI;

/// Recognizes the text of a single PDF page.
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the engine can run on this machine.
    fn is_available(&self) -> bool;

    /// OCR page `page_number` (1-based) of the PDF at `pdf_path`.
    fn recognize_pdf_page(&self, pdf_path: &Path, page_number: u32) -> Result<String>;
}

/// Tesseract OCR over pages rendered by poppler's `pdftoppm`.
#[derive(Debug)]
pub struct TesseractOcr {
    language: String,
    dpi: u32,
    available: OnceLock<bool>,
}

impl TesseractOcr {
    pub fn new(language: impl Into<String>, dpi: u32) -> Self {
        Self {
            language: language.into(),
            dpi,
            available: OnceLock::new(),
        }
    }

    /// Check if tesseract is installed.
    pub fn has_tesseract() -> bool {
        Command::new("tesseract")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Check if pdftoppm is installed. `pdftoppm -v` exits non-zero on some
    /// builds, so only spawning is checked.
    pub fn has_pdftoppm() -> bool {
        Command::new("pdftoppm").arg("-v").output().is_ok()
    }

    fn failure(&self, pdf_path: &Path, reason: String) -> Error {
        Error::extraction(self.name(), pdf_path, reason)
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new("eng", DEFAULT_OCR_DPI)
    }
}

impl OcrEngine for TesseractOcr {
    fn name(&self) -> &'static str {
        "TesseractOCR"
    }

    fn is_available(&self) -> bool {
        *self.available.get_or_init(|| {
            let available = Self::has_tesseract() && Self::has_pdftoppm();
            info!(available, "OCR availability checked");
            available
        })
    }

    fn recognize_pdf_page(&self, pdf_path: &Path, page_number: u32) -> Result<String> {
        let temp_dir = tempfile::Builder::new()
            .prefix("rag-store-ocr-")
            .tempdir()
            .map_err(|e| Error::io(pdf_path, e))?;
        let image_base = temp_dir.path().join(format!("page-{page_number}"));
        let page = page_number.to_string();
        let dpi = self.dpi.to_string();

        let render = Command::new("pdftoppm")
            .args(["-png", "-r", dpi.as_str(), "-f", page.as_str(), "-l", page.as_str(), "-singlefile"])
            .arg(pdf_path)
            .arg(&image_base)
            .output()
            .map_err(|e| self.failure(pdf_path, format!("pdftoppm failed: {e}")))?;

        if !render.status.success() {
            let stderr = String::from_utf8_lossy(&render.stderr);
            return Err(self.failure(pdf_path, format!("pdftoppm error: {}", stderr.trim())));
        }

        let image_path = image_base.with_extension("png");
        let recognized = Command::new("tesseract")
            .arg(&image_path)
            .arg("stdout")
            .args(["-l", self.language.as_str()])
            .output()
            .map_err(|e| self.failure(pdf_path, format!("tesseract failed on page {page_number}: {e}")))?;

        if !recognized.status.success() {
            let stderr = String::from_utf8_lossy(&recognized.stderr);
            return Err(self.failure(
                pdf_path,
                format!("tesseract error on page {page_number}: {}", stderr.trim()),
            ));
        }

        let text = String::from_utf8_lossy(&recognized.stdout).trim().to_string();
        debug!(
            file_path = %pdf_path.display(),
            page = page_number,
            chars = text.chars().count(),
            "OCR page complete"
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let ocr = TesseractOcr::default();
        assert_eq!(ocr.language, "eng");
        assert_eq!(ocr.dpi, 300);
    }

    #[test]
    fn test_availability_is_cached() {
        let ocr = TesseractOcr::default();
        let first = ocr.is_available();
        assert_eq!(ocr.is_available(), first);
    }

    #[test]
    fn test_missing_pdf_is_an_error() {
        let ocr = TesseractOcr::default();
        if !ocr.is_available() {
            return;
        }
        assert!(ocr.recognize_pdf_page(Path::new("/no/such/file.pdf"), 1).is_err());
    }
}
