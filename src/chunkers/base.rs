//! Base trait and shared helpers for text splitters.

use tracing::warn;
use unicode_segmentation::UnicodeSegmentation;

use crate::types::{ChunkConfig, SplitPiece, TextUnit};

/// The core trait that all splitters implement.
///
/// A splitter turns extracted text into ordered chunks no longer than
/// `chunk_size` characters, except for a single unit that cannot be divided
/// further.
pub trait TextSplitter: Send + Sync {
    /// Name recorded in `splitting_method` metadata.
    fn name(&self) -> &'static str;

    /// Split raw text into ordered, non-empty chunks.
    fn split_text(&self, text: &str, config: &ChunkConfig) -> Vec<String>;

    /// Split a sequence of units, keeping each piece's unit metadata.
    ///
    /// Pieces never span two units, so a PDF chunk always belongs to one page.
    fn split_units(&self, units: &[TextUnit], config: &ChunkConfig) -> Vec<SplitPiece> {
        units
            .iter()
            .flat_map(|unit| {
                self.split_text(&unit.text, config)
                    .into_iter()
                    .map(move |text| SplitPiece {
                        text,
                        metadata: unit.metadata.clone(),
                    })
            })
            .collect()
    }
}

/// Length in Unicode scalar values.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// The last `count` characters of `text`.
pub fn tail_chars(text: &str, count: usize) -> &str {
    if count == 0 {
        return "";
    }
    match text.char_indices().rev().nth(count - 1) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

/// Split on `separator`, prepending the separator to every piece after the
/// first. An empty separator splits into grapheme clusters. Empty pieces are
/// dropped.
pub fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.graphemes(true).map(str::to_string).collect();
    }

    let mut pieces = Vec::new();
    let mut iter = text.split(separator);
    if let Some(first) = iter.next() {
        if !first.is_empty() {
            pieces.push(first.to_string());
        }
    }
    for rest in iter {
        pieces.push(format!("{separator}{rest}"));
    }
    pieces
}

/// Merge small splits into chunks of at most `chunk_size` characters.
///
/// When a chunk is emitted, trailing splits totalling at most `chunk_overlap`
/// characters are kept as the start of the next chunk.
pub fn merge_splits(splits: &[String], separator: &str, config: &ChunkConfig) -> Vec<String> {
    let separator_len = char_len(separator);
    let mut docs = Vec::new();
    let mut current: Vec<(&str, usize)> = Vec::new();
    let mut total = 0usize;

    let joined = |parts: &[(&str, usize)]| -> Option<String> {
        let text = parts
            .iter()
            .map(|(s, _)| *s)
            .collect::<Vec<_>>()
            .join(separator);
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    };

    for split in splits {
        let len = char_len(split);
        let gap = if current.is_empty() { 0 } else { separator_len };

        if total + len + gap > config.chunk_size {
            if total > config.chunk_size {
                warn!(
                    size = total,
                    chunk_size = config.chunk_size,
                    "Created a chunk longer than the configured size"
                );
            }
            if !current.is_empty() {
                if let Some(doc) = joined(&current) {
                    docs.push(doc);
                }
                // Drop leading splits until the remainder fits the overlap
                // and leaves room for the incoming split.
                while total > config.chunk_overlap
                    || (total > 0
                        && total + len + if current.is_empty() { 0 } else { separator_len }
                            > config.chunk_size)
                {
                    let (_, first_len) = current.remove(0);
                    total -= first_len + if current.is_empty() { 0 } else { separator_len };
                }
            }
        }

        current.push((split.as_str(), len));
        total += len + if current.len() > 1 { separator_len } else { 0 };
    }

    if let Some(doc) = joined(&current) {
        docs.push(doc);
    }
    docs
}
