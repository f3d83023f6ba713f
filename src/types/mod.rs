//! Core types for the ingestion pipeline.

mod chunk;
mod config;
mod extraction;
mod source;

pub use chunk::{keys, DocumentChunk, Metadata};
pub use config::{ChunkConfig, IngestConfig, LogFormat, ProcessOptions};
pub use extraction::{ExtractionMethod, ExtractionResult, SplitPiece, TextUnit};
pub use source::{extension_of, SourceFile};
