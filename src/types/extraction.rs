//! Extraction outcomes and the intermediate text units fed to splitters.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::chunk::{keys, Metadata};

/// Which extraction path produced a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// PDF text layer
    PdfText,
    /// PDF content-stream text blocks
    PdfBlocks,
    /// OCR of a rendered PDF page
    TesseractOcr,
    /// Structured HTML elements from a MIME archive
    UnstructuredElements,
    /// Hand-rolled MIME walk over a malformed archive
    ManualMhtParser,
}

impl ExtractionMethod {
    /// The value written to the `extraction_method` metadata field.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::PdfText => "pymupdf_text",
            ExtractionMethod::PdfBlocks => "pymupdf_blocks",
            ExtractionMethod::TesseractOcr => "tesseract_ocr",
            ExtractionMethod::UnstructuredElements => "unstructured_elements",
            ExtractionMethod::ManualMhtParser => "manual_mht_parser",
        }
    }
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a page-level fallback chain.
///
/// The winning method is carried by the variant, so `extraction_method`
/// metadata is a pure function of the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionResult {
    DirectText(String),
    BlockText(String),
    OcrText(String),
    Empty,
}

impl ExtractionResult {
    /// The extraction method for this result, `None` when nothing was found.
    pub fn method(&self) -> Option<ExtractionMethod> {
        match self {
            ExtractionResult::DirectText(_) => Some(ExtractionMethod::PdfText),
            ExtractionResult::BlockText(_) => Some(ExtractionMethod::PdfBlocks),
            ExtractionResult::OcrText(_) => Some(ExtractionMethod::TesseractOcr),
            ExtractionResult::Empty => None,
        }
    }

    /// Borrow the extracted text (empty for `Empty`).
    pub fn text(&self) -> &str {
        match self {
            ExtractionResult::DirectText(t)
            | ExtractionResult::BlockText(t)
            | ExtractionResult::OcrText(t) => t,
            ExtractionResult::Empty => "",
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text().trim().is_empty()
    }
}

/// A unit of extracted text with its own metadata, prior to splitting.
///
/// PDF pages, a whole Word document, or an MHT body each become one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct TextUnit {
    pub text: String,
    pub metadata: Metadata,
}

impl TextUnit {
    /// Create a unit without metadata.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    /// Attach a metadata field.
    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Tag the unit with the extraction method that produced it.
    pub fn with_method(self, method: ExtractionMethod) -> Self {
        self.with_meta(keys::EXTRACTION_METHOD, method.as_str())
    }
}

/// A split piece of a unit, carrying the unit's metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitPiece {
    pub text: String,
    pub metadata: Metadata,
}
