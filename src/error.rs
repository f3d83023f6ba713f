//! Error taxonomy for the ingestion pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed cause attached to extraction failures.
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

const EXTRACTION_FAILED: &str = "extraction_failed";

/// Errors raised while resolving, extracting or chunking a document.
#[derive(Debug, Error)]
pub enum Error {
    /// The input path does not exist.
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// No registered processor handles the file's extension.
    #[error(
        "Unsupported file type: '{extension}' for {} (supported: {}){}",
        .path.display(),
        .supported.join(", "),
        .hint.as_deref().map(|h| format!(". {h}")).unwrap_or_default()
    )]
    UnsupportedFormat {
        path: PathBuf,
        extension: String,
        supported: Vec<String>,
        hint: Option<String>,
    },

    /// Every candidate text encoding failed to decode the file.
    #[error(
        "Could not decode text file {} with any supported encoding (tried: {})",
        .path.display(),
        .attempted.join(", ")
    )]
    EncodingExhausted { path: PathBuf, attempted: Vec<String> },

    /// A loader failed and no fallback recovered.
    #[error("Error processing {} with {processor}: {reason}", .path.display())]
    ExtractionFailed {
        processor: &'static str,
        path: PathBuf,
        reason: String,
        /// Format-specific tag such as `pdf_processing_error`.
        tag: &'static str,
        #[source]
        source: Option<BoxedCause>,
    },

    /// The archive parsed but held no renderable HTML.
    #[error("No HTML content found in {}", .0.display())]
    NoContentFound(PathBuf),

    /// Chunk size/overlap combination cannot be honoured.
    #[error("Invalid chunk configuration: {0}")]
    InvalidChunkConfig(String),

    /// Two processors claimed the same extension.
    #[error("Extension '{extension}' is already registered to {existing}, refusing {incoming}")]
    DuplicateExtension {
        extension: String,
        existing: &'static str,
        incoming: &'static str,
    },

    /// Filesystem failure outside the extraction step.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration could not be assembled.
    #[error(transparent)]
    Config(#[from] config::ConfigError),
}

impl Error {
    /// Build an extraction failure without an underlying cause.
    pub fn extraction(processor: &'static str, path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ExtractionFailed {
            processor,
            path: path.into(),
            reason: reason.into(),
            tag: EXTRACTION_FAILED,
            source: None,
        }
    }

    /// Build an extraction failure wrapping the error that caused it.
    pub fn extraction_with_source<E>(
        processor: &'static str,
        path: impl Into<PathBuf>,
        reason: impl Into<String>,
        source: E,
    ) -> Self
    where
        E: Into<BoxedCause>,
    {
        Self::ExtractionFailed {
            processor,
            path: path.into(),
            reason: reason.into(),
            tag: EXTRACTION_FAILED,
            source: Some(source.into()),
        }
    }

    /// Attach a processor's error tag to an extraction failure. Other
    /// variants are returned unchanged.
    pub fn with_error_tag(mut self, error_tag: &'static str) -> Self {
        if let Error::ExtractionFailed { tag, .. } = &mut self {
            *tag = error_tag;
        }
        self
    }

    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable snake_case tag used in observability events and batch reports.
    pub fn error_type(&self) -> &'static str {
        match self {
            Error::FileNotFound(_) => "file_not_found",
            Error::UnsupportedFormat { .. } => "unsupported_format",
            Error::EncodingExhausted { .. } => "encoding_exhausted",
            Error::ExtractionFailed { tag, .. } => *tag,
            Error::NoContentFound(_) => "no_content_found",
            Error::InvalidChunkConfig(_) => "invalid_chunk_config",
            Error::DuplicateExtension { .. } => "duplicate_extension",
            Error::Io { .. } => "io_error",
            Error::Config(_) => "config_error",
        }
    }
}
