//! RAG Store Ingestion Library
//!
//! Turns PDF, Word, plain text and MHT web archive files into ordered,
//! metadata-rich chunks ready for embedding.

pub mod batch;
pub mod chunkers;
pub mod error;
pub mod observability;
pub mod processing;
pub mod registry;
pub mod types;

pub use batch::{BatchConfig, BatchProcessor, BatchResult, FileFailure};
pub use error::{Error, Result};
pub use processing::DocumentProcessor;
pub use registry::ProcessorRegistry;
pub use types::{DocumentChunk, IngestConfig, ProcessOptions};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::batch::*;
    pub use crate::chunkers::{CharacterSplitter, RecursiveSplitter, TextSplitter};
    pub use crate::error::{Error, Result};
    pub use crate::observability::{ProcessingObserver, SharedObserver};
    pub use crate::processing::{DocumentProcessor, MhtProcessor, PdfProcessor, TextProcessor, WordProcessor};
    pub use crate::registry::ProcessorRegistry;
    pub use crate::types::*;
}

/// Minimum characters a PDF page must yield before its fallback chain stops
pub const DEFAULT_MIN_PAGE_CHARS: usize = 50;

/// Render resolution for OCR
pub const DEFAULT_OCR_DPI: u32 = 300;

/// Files processed concurrently by the batch driver
pub const DEFAULT_CONCURRENCY: usize = 4;
