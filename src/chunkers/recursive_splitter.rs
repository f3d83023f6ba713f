//! Recursive text splitter with hierarchical separators.

use super::base::{char_len, merge_splits, split_keeping_separator, TextSplitter};
use crate::types::ChunkConfig;

/// Recursive splitter that breaks text hierarchically.
///
/// This splitter tries separators in order of preference:
/// 1. Double newlines (paragraphs)
/// 2. Single newlines
/// 3. Spaces (words)
/// 4. Graphemes (last resort)
///
/// Text is split on the first separator it contains. Pieces that are still
/// too large are split again with the remaining, finer separators; small
/// pieces are merged back together with overlap.
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    /// Separators in order of preference (most to least preferred)
    separators: Vec<String>,
}

impl RecursiveSplitter {
    /// Create a recursive splitter with default separators.
    pub fn new() -> Self {
        Self::with_separators(default_separators())
    }

    /// Create a recursive splitter with custom separators.
    pub fn with_separators<S: Into<String>>(separators: impl IntoIterator<Item = S>) -> Self {
        Self {
            separators: separators.into_iter().map(Into::into).collect(),
        }
    }

    pub fn separators(&self) -> &[String] {
        &self.separators
    }

    /// Recursively split text using the separator hierarchy.
    fn recursive_split(&self, text: &str, separators: &[String], config: &ChunkConfig) -> Vec<String> {
        // Pick the first separator present in the text; "" always matches.
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut finer: &[String] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate.as_str();
                finer = &separators[i + 1..];
                break;
            }
        }

        let splits = split_keeping_separator(text, separator);

        let mut chunks = Vec::new();
        let mut good_splits: Vec<String> = Vec::new();

        for split in splits {
            if char_len(&split) < config.chunk_size {
                good_splits.push(split);
                continue;
            }

            if !good_splits.is_empty() {
                chunks.extend(merge_splits(&good_splits, "", config));
                good_splits.clear();
            }

            if finer.is_empty() {
                let piece = split.trim();
                if !piece.is_empty() {
                    chunks.push(piece.to_string());
                }
            } else {
                chunks.extend(self.recursive_split(&split, finer, config));
            }
        }

        if !good_splits.is_empty() {
            chunks.extend(merge_splits(&good_splits, "", config));
        }

        chunks
    }
}

/// Paragraphs, lines, words, then graphemes.
pub fn default_separators() -> Vec<String> {
    ["\n\n", "\n", " ", ""].iter().map(|s| s.to_string()).collect()
}

impl Default for RecursiveSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl TextSplitter for RecursiveSplitter {
    fn name(&self) -> &'static str {
        "RecursiveCharacterTextSplitter"
    }

    fn split_text(&self, text: &str, config: &ChunkConfig) -> Vec<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return vec![];
        }
        if char_len(trimmed) <= config.chunk_size {
            return vec![trimmed.to_string()];
        }

        self.recursive_split(trimmed, &self.separators, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TextUnit;
    use pretty_assertions::assert_eq;

    const LOREM: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. \
        Sed do eiusmod tempor incididunt ut labore et dolore magna aliqua.\n\
        Ut enim ad minim veniam, quis nostrud exercitation ullamco laboris.\n\n\
        Duis aute irure dolor in reprehenderit in voluptate velit esse cillum \
        dolore eu fugiat nulla pariatur. Excepteur sint occaecat cupidatat non \
        proident, sunt in culpa qui officia deserunt mollit anim id est laborum.";

    #[test]
    fn test_short_input_single_chunk() {
        let splitter = RecursiveSplitter::new();
        let chunks = splitter.split_text("\n  Hello world  \n", &ChunkConfig::new(1800, 270));
        assert_eq!(chunks, vec!["Hello world".to_string()]);
    }

    #[test]
    fn test_splits_on_paragraphs_first() {
        let splitter = RecursiveSplitter::new();
        let chunks = splitter.split_text("aaaa\n\nbbbb\n\ncccc", &ChunkConfig::new(10, 0));
        assert_eq!(chunks, vec!["aaaa\n\nbbbb".to_string(), "cccc".to_string()]);
    }

    #[test]
    fn test_falls_back_to_graphemes() {
        let splitter = RecursiveSplitter::new();
        let chunks = splitter.split_text(&"x".repeat(25), &ChunkConfig::new(10, 0));
        let lengths: Vec<usize> = chunks.iter().map(|c| char_len(c)).collect();
        assert_eq!(lengths, vec![10, 10, 5]);
    }

    #[test]
    fn test_chunks_respect_size_with_overlap() {
        let splitter = RecursiveSplitter::new();
        let config = ChunkConfig::new(80, 20);
        let chunks = splitter.split_text(LOREM, &config);

        assert!(chunks.len() > 3);
        assert!(chunks.iter().all(|c| char_len(c) <= 80));
        assert!(chunks.iter().all(|c| !c.trim().is_empty()));
    }

    #[test]
    fn test_overlap_repeats_trailing_words() {
        let splitter = RecursiveSplitter::new();
        let config = ChunkConfig::new(40, 15);
        let chunks = splitter.split_text(LOREM, &config);

        let repeated = chunks.windows(2).any(|pair| {
            pair[0]
                .split_whitespace()
                .last()
                .map(|word| pair[1].contains(word))
                .unwrap_or(false)
        });
        assert!(repeated);
    }

    #[test]
    fn test_units_keep_their_metadata() {
        let splitter = RecursiveSplitter::new();
        let units = vec![
            TextUnit::new("first page").with_meta("page", 1),
            TextUnit::new("second page").with_meta("page", 2),
        ];
        let pieces = splitter.split_units(&units, &ChunkConfig::new(100, 10));
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[1].text, "second page");
        assert_eq!(pieces[1].metadata.get("page"), Some(&serde_json::Value::from(2)));
    }
}
