//! Shared metadata enrichment applied by every processor.

use serde_json::Value;

use crate::types::{keys, ChunkConfig, DocumentChunk, Metadata, SplitPiece};

/// Builds the final chunks of one document.
///
/// Field precedence, lowest to highest: the processor's metadata template,
/// the chunking fields, processor extras, then each piece's unit metadata.
/// `chunk_id` and `total_chunks` are always set last.
#[derive(Debug, Clone)]
pub struct ChunkEnricher {
    base: Metadata,
}

impl ChunkEnricher {
    pub fn new(
        template: Metadata,
        document_id: String,
        config: &ChunkConfig,
        splitting_method: &str,
    ) -> Self {
        let mut base = template;
        base.insert(keys::DOCUMENT_ID.to_string(), Value::from(document_id));
        base.insert(keys::CHUNK_SIZE.to_string(), Value::from(config.chunk_size));
        base.insert(keys::CHUNK_OVERLAP.to_string(), Value::from(config.chunk_overlap));
        base.insert(keys::SPLITTING_METHOD.to_string(), Value::from(splitting_method));
        Self { base }
    }

    /// Add a document-level field.
    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.base.insert(key.to_string(), value.into());
        self
    }

    /// Drop empty pieces, then number the rest `chunk_0..chunk_(N-1)`.
    pub fn finish(&self, pieces: Vec<SplitPiece>) -> Vec<DocumentChunk> {
        let kept: Vec<SplitPiece> = pieces
            .into_iter()
            .filter(|p| !p.text.trim().is_empty())
            .collect();
        let total = kept.len();

        kept.into_iter()
            .enumerate()
            .map(|(i, piece)| {
                let mut metadata = self.base.clone();
                metadata.extend(piece.metadata);
                metadata.insert(keys::CHUNK_ID.to_string(), Value::from(format!("chunk_{i}")));
                metadata.insert(keys::TOTAL_CHUNKS.to_string(), Value::from(total));
                DocumentChunk::new(piece.text, metadata)
            })
            .collect()
    }
}
