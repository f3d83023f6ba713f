//! Plain text and Markdown processor.

use tracing::debug;

use super::encoding::{decode_with_fallback, normalize_line_endings, TextEncoding, DEFAULT_FALLBACK_ENCODINGS};
use super::enrich::ChunkEnricher;
use super::DocumentProcessor;
use crate::chunkers::{CharacterSplitter, TextSplitter, DEFAULT_SEPARATOR};
use crate::error::{Error, Result};
use crate::observability::{default_observer, ProcessingObserver, SharedObserver};
use crate::types::{keys, ChunkConfig, DocumentChunk, ProcessOptions, SourceFile, TextUnit};

const EXTENSIONS: [&str; 3] = [".txt", ".md", ".text"];

/// Reads text files with encoding fallback and splits on a single separator.
pub struct TextProcessor {
    fallback_encodings: Vec<TextEncoding>,
    observer: SharedObserver,
}

impl TextProcessor {
    pub fn new() -> Self {
        Self {
            fallback_encodings: DEFAULT_FALLBACK_ENCODINGS.to_vec(),
            observer: default_observer(),
        }
    }

    /// Replace the encodings tried after UTF-8.
    pub fn with_fallback_encodings(mut self, encodings: Vec<TextEncoding>) -> Self {
        self.fallback_encodings = encodings;
        self
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }
}

impl Default for TextProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentProcessor for TextProcessor {
    fn name(&self) -> &'static str {
        "TextProcessor"
    }

    fn file_type_description(&self) -> &'static str {
        "Text documents (.txt, .md, .text)"
    }

    fn supported_extensions(&self) -> &[&'static str] {
        &EXTENSIONS
    }

    fn default_chunk_config(&self) -> ChunkConfig {
        ChunkConfig::new(300, 50)
    }

    fn error_tag(&self) -> &'static str {
        "text_processing_error"
    }

    fn observer(&self) -> &dyn ProcessingObserver {
        self.observer.as_ref()
    }

    fn extract_chunks(&self, source: &SourceFile, options: &ProcessOptions) -> Result<Vec<DocumentChunk>> {
        let config = self.processing_params(options)?;
        let separator = options.separator.as_deref().unwrap_or(DEFAULT_SEPARATOR);

        let bytes = std::fs::read(&source.path).map_err(|e| Error::io(&source.path, e))?;
        let decoded = decode_with_fallback(&bytes, &self.fallback_encodings).map_err(|attempted| {
            Error::EncodingExhausted {
                path: source.path.clone(),
                attempted,
            }
        })?;

        let splitter = CharacterSplitter::with_separator(separator);
        let text = normalize_line_endings(&decoded.text);
        let pieces = splitter.split_units(&[TextUnit::new(text)], &config);

        let mut enricher = ChunkEnricher::new(
            self.metadata_template(source),
            source.document_id("text"),
            &config,
            splitter.name(),
        )
        .with_field(keys::SEPARATOR, separator);
        if decoded.used_fallback {
            debug!(
                file_path = %source.path.display(),
                encoding = decoded.encoding.label(),
                "Decoded text with fallback encoding"
            );
            enricher = enricher.with_field(keys::ENCODING, decoded.encoding.label());
        }

        Ok(enricher.finish(pieces))
    }
}
