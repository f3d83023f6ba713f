//! Configuration types for ingestion and chunking.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::{DEFAULT_CONCURRENCY, DEFAULT_MIN_PAGE_CHARS, DEFAULT_OCR_DPI};

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Global ingestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Directory scanned by the batch driver
    pub source_dir: PathBuf,

    /// Chunk size override applied to every processor
    pub chunk_size: Option<usize>,

    /// Chunk overlap override applied to every processor
    pub chunk_overlap: Option<usize>,

    /// Whether PDF pages without a text layer may be OCR'd
    pub ocr_enabled: bool,

    /// Tesseract language pack
    pub ocr_language: String,

    /// Render resolution for OCR
    pub ocr_dpi: u32,

    /// Characters a PDF page must yield before the fallback chain stops
    pub min_page_chars: usize,

    /// Files processed concurrently by the batch driver
    pub concurrency: usize,

    /// Keep going when a single file fails
    pub continue_on_error: bool,

    /// Convert legacy `.doc` files through LibreOffice before processing
    pub convert_legacy_word: bool,

    /// Log output format
    pub log_format: LogFormat,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("data_source"),
            chunk_size: None,
            chunk_overlap: None,
            ocr_enabled: true,
            ocr_language: "eng".to_string(),
            ocr_dpi: DEFAULT_OCR_DPI,
            min_page_chars: DEFAULT_MIN_PAGE_CHARS,
            concurrency: DEFAULT_CONCURRENCY,
            continue_on_error: true,
            convert_legacy_word: false,
            log_format: LogFormat::Pretty,
        }
    }
}

impl IngestConfig {
    /// Prefix for environment variables, e.g. `RAG_STORE_SOURCE_DIR`.
    pub const ENV_PREFIX: &'static str = "RAG_STORE";

    /// Layer defaults, an optional `rag-store.toml` and `RAG_STORE_*` variables.
    pub fn load() -> Result<Self> {
        Self::load_from("rag-store")
    }

    /// Same as [`IngestConfig::load`] with an explicit config file stem.
    pub fn load_from(file_stem: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            .add_source(config::File::with_name(file_stem).required(false))
            .add_source(config::Environment::with_prefix(Self::ENV_PREFIX).try_parsing(true))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Caller options derived from the global overrides.
    pub fn process_options(&self) -> ProcessOptions {
        ProcessOptions {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            separator: None,
        }
    }
}

/// Effective chunking parameters for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Maximum characters per chunk
    pub chunk_size: usize,

    /// Characters repeated between consecutive chunks
    pub chunk_overlap: usize,
}

impl ChunkConfig {
    /// Create a config with the given size and overlap.
    pub const fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Create a config with the given chunk size and no overlap.
    pub fn with_size(size: usize) -> Self {
        Self::new(size, 0)
    }

    /// Set the overlap.
    pub fn with_overlap(mut self, overlap: usize) -> Self {
        self.chunk_overlap = overlap;
        self
    }

    /// Apply caller overrides on top of per-format defaults.
    pub fn resolve(
        defaults: ChunkConfig,
        chunk_size: Option<usize>,
        chunk_overlap: Option<usize>,
    ) -> Result<Self> {
        let config = Self {
            chunk_size: chunk_size.unwrap_or(defaults.chunk_size),
            chunk_overlap: chunk_overlap.unwrap_or(defaults.chunk_overlap),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the splitters cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidChunkConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::InvalidChunkConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Optional overrides accepted by every processor entry point.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOptions {
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
    /// Separator for the character splitter (text files only)
    pub separator: Option<String>,
}

impl ProcessOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size);
        self
    }

    pub fn with_chunk_overlap(mut self, overlap: usize) -> Self {
        self.chunk_overlap = Some(overlap);
        self
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = Some(separator.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_uses_defaults() {
        let config = ChunkConfig::resolve(ChunkConfig::new(1800, 270), None, None).unwrap();
        assert_eq!(config, ChunkConfig::new(1800, 270));
    }

    #[test]
    fn test_resolve_applies_overrides() {
        let config = ChunkConfig::resolve(ChunkConfig::new(1800, 270), Some(500), Some(20)).unwrap();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.chunk_overlap, 20);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let err = ChunkConfig::resolve(ChunkConfig::new(300, 50), Some(40), None).unwrap_err();
        assert_eq!(err.error_type(), "invalid_chunk_config");
        assert!(ChunkConfig::with_size(0).validate().is_err());
    }

    #[test]
    fn test_ingest_config_defaults() {
        let config = IngestConfig::default();
        assert_eq!(config.ocr_dpi, 300);
        assert_eq!(config.min_page_chars, 50);
        assert!(config.continue_on_error);
        assert_eq!(config.process_options(), ProcessOptions::default());
    }

    #[test]
    fn test_load_without_file_falls_back_to_defaults() {
        let config = IngestConfig::load_from("definitely-missing-rag-store-config").unwrap();
        assert_eq!(config.ocr_language, "eng");
        assert_eq!(config.concurrency, crate::DEFAULT_CONCURRENCY);
    }

    #[test]
    fn test_load_reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("ingest.toml"),
            "min_page_chars = 80\nchunk_size = 640\nlog_format = \"json\"\n",
        )
        .unwrap();

        let stem = dir.path().join("ingest");
        let config = IngestConfig::load_from(stem.to_str().unwrap()).unwrap();
        assert_eq!(config.min_page_chars, 80);
        assert_eq!(config.chunk_size, Some(640));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.ocr_dpi, 300);
    }
}
