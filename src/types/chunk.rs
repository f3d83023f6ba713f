//! Chunk type definitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata attached to a chunk. Ordered so serialized output is stable.
pub type Metadata = BTreeMap<String, Value>;

/// Metadata keys shared by every processor.
pub mod keys {
    pub const SOURCE: &str = "source";
    pub const FILE_PATH: &str = "file_path";
    pub const FILE_TYPE: &str = "file_type";
    pub const PROCESSOR: &str = "processor";
    pub const FILE_SIZE: &str = "file_size";
    pub const CHUNK_ID: &str = "chunk_id";
    pub const DOCUMENT_ID: &str = "document_id";
    pub const CHUNK_SIZE: &str = "chunk_size";
    pub const CHUNK_OVERLAP: &str = "chunk_overlap";
    pub const SPLITTING_METHOD: &str = "splitting_method";
    pub const TOTAL_CHUNKS: &str = "total_chunks";
    pub const ENCODING: &str = "encoding";
    pub const SEPARATOR: &str = "separator";
    pub const SEPARATORS: &str = "separators";
    pub const EXTRACTION_METHOD: &str = "extraction_method";
    pub const LOADER_TYPE: &str = "loader_type";
    pub const SUPPORTS_LEGACY_DOC: &str = "supports_legacy_doc";
    pub const SOURCE_FORMAT: &str = "source_format";
    pub const PAGE: &str = "page";
    pub const TOTAL_PAGES: &str = "total_pages";
    pub const TITLE: &str = "title";
    pub const CONTENT_TYPE: &str = "content_type";
    pub const CONVERTED_FROM: &str = "converted_from";
}

/// A bounded span of extracted text plus metadata.
///
/// Chunks are the unit handed to the embedding/storage stage. The
/// `source` + `chunk_id` pair identifies a chunk's position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// The text content of the chunk (never empty)
    pub content: String,

    /// Enriched metadata
    pub metadata: Metadata,
}

impl DocumentChunk {
    /// Create a chunk with the given content and metadata.
    pub fn new(content: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }

    /// Look up a string metadata field.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// Look up an integer metadata field.
    pub fn meta_u64(&self, key: &str) -> Option<u64> {
        self.metadata.get(key).and_then(Value::as_u64)
    }

    /// The `chunk_id` field.
    pub fn chunk_id(&self) -> Option<&str> {
        self.meta_str(keys::CHUNK_ID)
    }

    /// The `source` field.
    pub fn source(&self) -> Option<&str> {
        self.meta_str(keys::SOURCE)
    }

    /// Length of the content in characters.
    pub fn len(&self) -> usize {
        self.content.chars().count()
    }

    /// Check if the chunk is empty.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_accessors() {
        let mut metadata = Metadata::new();
        metadata.insert(keys::CHUNK_ID.to_string(), json!("chunk_3"));
        metadata.insert(keys::SOURCE.to_string(), json!("report.pdf"));
        metadata.insert(keys::TOTAL_CHUNKS.to_string(), json!(7));

        let chunk = DocumentChunk::new("héllo", metadata);
        assert_eq!(chunk.chunk_id(), Some("chunk_3"));
        assert_eq!(chunk.source(), Some("report.pdf"));
        assert_eq!(chunk.meta_u64(keys::TOTAL_CHUNKS), Some(7));
        assert_eq!(chunk.len(), 5);
    }

    #[test]
    fn test_serialized_metadata_is_ordered() {
        let mut metadata = Metadata::new();
        metadata.insert("b".to_string(), json!(1));
        metadata.insert("a".to_string(), json!(2));
        let chunk = DocumentChunk::new("x", metadata);
        let encoded = serde_json::to_string(&chunk).unwrap();
        assert_eq!(encoded, r#"{"content":"x","metadata":{"a":2,"b":1}}"#);
    }
}
