//! Single-separator splitter with exact character overlap.

use tracing::warn;

use super::base::{char_len, split_keeping_separator, tail_chars, TextSplitter};
use crate::types::ChunkConfig;

/// Default separator: paragraph breaks.
pub const DEFAULT_SEPARATOR: &str = "\n\n";

/// Splits text on one separator and packs segments greedily.
///
/// Consecutive chunks share exactly `chunk_overlap` characters: the tail of
/// chunk `i` is the prefix of chunk `i + 1`. The overlap is dropped when the
/// next segment would not fit beside it.
#[derive(Debug, Clone)]
pub struct CharacterSplitter {
    separator: String,
}

impl CharacterSplitter {
    /// Create a splitter that breaks on paragraphs.
    pub fn new() -> Self {
        Self::with_separator(DEFAULT_SEPARATOR)
    }

    /// Create a splitter with a custom separator. An empty separator splits
    /// on grapheme clusters.
    pub fn with_separator(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
        }
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    fn segments(&self, text: &str) -> Vec<String> {
        let pieces: Vec<String> = if self.separator.is_empty() {
            split_keeping_separator(text, "")
        } else {
            text.split(self.separator.as_str()).map(str::to_string).collect()
        };

        pieces
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl Default for CharacterSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl TextSplitter for CharacterSplitter {
    fn name(&self) -> &'static str {
        "CharacterTextSplitter"
    }

    fn split_text(&self, text: &str, config: &ChunkConfig) -> Vec<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return vec![];
        }
        if char_len(trimmed) <= config.chunk_size {
            return vec![trimmed.to_string()];
        }

        let separator_len = char_len(&self.separator);
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;

        for segment in self.segments(trimmed) {
            let segment_len = char_len(&segment);

            if current.is_empty() {
                current = segment;
                current_len = segment_len;
                continue;
            }

            if current_len + separator_len + segment_len <= config.chunk_size {
                current.push_str(&self.separator);
                current.push_str(&segment);
                current_len += separator_len + segment_len;
                continue;
            }

            let carry = tail_chars(&current, config.chunk_overlap).to_string();
            chunks.push(std::mem::take(&mut current));

            let with_carry = char_len(&carry) + separator_len + segment_len;
            if carry.is_empty() || with_carry > config.chunk_size {
                current = segment;
                current_len = segment_len;
            } else {
                current_len = with_carry;
                current = format!("{carry}{}{segment}", self.separator);
            }

            if current_len > config.chunk_size {
                warn!(
                    size = current_len,
                    chunk_size = config.chunk_size,
                    "Segment is longer than the chunk size; keeping it whole"
                );
            }
        }

        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }
}
