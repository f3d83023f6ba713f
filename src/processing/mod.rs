//! Format processors and the contract they share.
//!
//! This module provides:
//! - The `DocumentProcessor` trait implemented by every format
//! - PDF, text, Word and MHT processors with their fallback chains
//! - Encoding fallback, MIME parsing and HTML-to-text helpers
//! - File filtering for the directory driver

pub mod encoding;
pub mod enrich;
pub mod filter;
pub mod html;
pub mod mht;
pub mod mime;
pub mod ocr;
pub mod pdf;
pub mod text;
pub mod word;

use std::path::Path;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::observability::{ProcessingContext, ProcessingObserver, ProcessingStatus};
use crate::types::{extension_of, keys, ChunkConfig, DocumentChunk, Metadata, ProcessOptions, SourceFile};

pub use encoding::{decode_with_fallback, DecodedText, TextEncoding, DEFAULT_FALLBACK_ENCODINGS};
pub use enrich::ChunkEnricher;
pub use filter::{FileFilter, FilterConfig};
pub use mht::MhtProcessor;
pub use ocr::{OcrEngine, TesseractOcr};
pub use pdf::PdfProcessor;
pub use text::TextProcessor;
pub use word::{LegacyDocConverter, WordProcessor};

/// A format-specific extraction strategy.
///
/// Processors are stateless and reentrant: one instance handles any number
/// of files, from any thread.
pub trait DocumentProcessor: Send + Sync {
    /// Processor name recorded in `processor` metadata, e.g. `PDFProcessor`.
    fn name(&self) -> &'static str;

    /// Human-readable description of the supported file types.
    fn file_type_description(&self) -> &'static str;

    /// Lower-cased extensions with a leading dot.
    fn supported_extensions(&self) -> &[&'static str];

    /// Chunk size and overlap used when the caller gives none.
    fn default_chunk_config(&self) -> ChunkConfig;

    /// Error tag reported when extraction itself fails.
    fn error_tag(&self) -> &'static str;

    /// Sink for lifecycle events.
    fn observer(&self) -> &dyn ProcessingObserver;

    /// Extract, split and enrich a validated file.
    fn extract_chunks(&self, source: &SourceFile, options: &ProcessOptions) -> Result<Vec<DocumentChunk>>;

    /// Check the extension against `supported_extensions`, ignoring case.
    fn is_supported_file(&self, path: &Path) -> bool {
        let extension = extension_of(path);
        self.supported_extensions().iter().any(|e| *e == extension)
    }

    /// Fail with `FileNotFound` or `UnsupportedFormat`.
    fn validate_file(&self, path: &Path) -> Result<SourceFile> {
        let source = SourceFile::inspect(path)?;
        if !self.is_supported_file(path) {
            return Err(unsupported(path, self.supported_extensions(), None));
        }
        Ok(source)
    }

    /// Metadata shared by every chunk this processor emits.
    fn metadata_template(&self, source: &SourceFile) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert(keys::SOURCE.to_string(), Value::from(source.file_name.clone()));
        metadata.insert(
            keys::FILE_PATH.to_string(),
            Value::from(source.path.to_string_lossy().into_owned()),
        );
        metadata.insert(keys::FILE_TYPE.to_string(), Value::from(source.extension.clone()));
        metadata.insert(keys::PROCESSOR.to_string(), Value::from(self.name()));
        metadata.insert(keys::FILE_SIZE.to_string(), Value::from(source.size));
        metadata
    }

    /// Caller overrides on top of the processor defaults.
    fn processing_params(&self, options: &ProcessOptions) -> Result<ChunkConfig> {
        ChunkConfig::resolve(self.default_chunk_config(), options.chunk_size, options.chunk_overlap)
    }

    /// Validate, extract and report a document.
    fn process_document(&self, path: &Path, options: &ProcessOptions) -> Result<Vec<DocumentChunk>> {
        let source = self.validate_file(path)?;
        let ctx = ProcessingContext::start(self.name(), &source);
        let observer = self.observer();
        observer.processing_started(&ctx);

        match self.extract_chunks(&source, options) {
            Ok(chunks) => {
                observer.processing_completed(&ctx, chunks.len(), ProcessingStatus::for_chunks(chunks.len()));
                Ok(chunks)
            }
            Err(e) => {
                let e = e.with_error_tag(self.error_tag());
                observer.processing_error(&ctx, &e, e.error_type());
                observer.processing_completed(&ctx, 0, ProcessingStatus::Error);
                Err(e)
            }
        }
    }
}

/// Build an `UnsupportedFormat` error for `path`.
pub fn unsupported(path: &Path, supported: &[&'static str], hint: Option<&str>) -> Error {
    Error::UnsupportedFormat {
        path: path.to_path_buf(),
        extension: extension_of(path),
        supported: supported.iter().map(|s| s.to_string()).collect(),
        hint: hint.map(str::to_string),
    }
}
