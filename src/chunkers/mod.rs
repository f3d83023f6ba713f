//! Text splitting strategies used by the format processors.

mod base;
mod character_splitter;
mod recursive_splitter;

pub use base::{char_len, merge_splits, split_keeping_separator, tail_chars, TextSplitter};
pub use character_splitter::{CharacterSplitter, DEFAULT_SEPARATOR};
pub use recursive_splitter::{default_separators, RecursiveSplitter};
