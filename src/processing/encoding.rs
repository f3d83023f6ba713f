//! Byte decoding with an ordered fallback list.
//!
//! UTF-8 is always tried first. When it fails, each fallback encoding is
//! attempted in order and the first success wins.

use std::str;

/// Encodings the text pipeline knows how to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextEncoding {
    Utf8,
    Latin1,
    Cp1252,
    Iso8859_1,
}

/// Fallback order used after UTF-8 fails.
pub const DEFAULT_FALLBACK_ENCODINGS: [TextEncoding; 3] = [
    TextEncoding::Latin1,
    TextEncoding::Cp1252,
    TextEncoding::Iso8859_1,
];

/// Windows-1252 code points for bytes 0x80..=0x9F. `None` marks the five
/// undefined bytes.
const CP1252_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'), None, Some('\u{201A}'), Some('\u{0192}'),
    Some('\u{201E}'), Some('\u{2026}'), Some('\u{2020}'), Some('\u{2021}'),
    Some('\u{02C6}'), Some('\u{2030}'), Some('\u{0160}'), Some('\u{2039}'),
    Some('\u{0152}'), None, Some('\u{017D}'), None,
    None, Some('\u{2018}'), Some('\u{2019}'), Some('\u{201C}'),
    Some('\u{201D}'), Some('\u{2022}'), Some('\u{2013}'), Some('\u{2014}'),
    Some('\u{02DC}'), Some('\u{2122}'), Some('\u{0161}'), Some('\u{203A}'),
    Some('\u{0153}'), None, Some('\u{017E}'), Some('\u{0178}'),
];

impl TextEncoding {
    /// Label recorded in chunk metadata.
    pub fn label(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Latin1 => "latin-1",
            TextEncoding::Cp1252 => "cp1252",
            TextEncoding::Iso8859_1 => "iso-8859-1",
        }
    }

    /// Look up an encoding by a MIME charset or common alias.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().trim_matches('"').to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" | "us-ascii" | "ascii" => Some(TextEncoding::Utf8),
            "latin-1" | "latin1" | "l1" => Some(TextEncoding::Latin1),
            "cp1252" | "windows-1252" => Some(TextEncoding::Cp1252),
            "iso-8859-1" | "iso8859-1" | "iso_8859-1" => Some(TextEncoding::Iso8859_1),
            _ => None,
        }
    }

    /// Decode `bytes`, returning `None` when they are invalid for this encoding.
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        match self {
            TextEncoding::Utf8 => {
                let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
                str::from_utf8(bytes).ok().map(str::to_string)
            }
            TextEncoding::Latin1 | TextEncoding::Iso8859_1 => {
                Some(bytes.iter().map(|&b| b as char).collect())
            }
            TextEncoding::Cp1252 => bytes
                .iter()
                .map(|&b| match b {
                    0x80..=0x9F => CP1252_HIGH[(b - 0x80) as usize],
                    _ => Some(b as char),
                })
                .collect(),
        }
    }
}

impl std::fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Successfully decoded text and the encoding that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub encoding: TextEncoding,
    /// True when UTF-8 failed and a fallback won
    pub used_fallback: bool,
}

/// Decode with UTF-8 first, then each fallback in order.
///
/// On failure returns the labels of every attempted encoding.
pub fn decode_with_fallback(
    bytes: &[u8],
    fallbacks: &[TextEncoding],
) -> Result<DecodedText, Vec<String>> {
    if let Some(text) = TextEncoding::Utf8.decode(bytes) {
        return Ok(DecodedText {
            text,
            encoding: TextEncoding::Utf8,
            used_fallback: false,
        });
    }

    let mut attempted = vec![TextEncoding::Utf8.label().to_string()];
    for encoding in fallbacks {
        if let Some(text) = encoding.decode(bytes) {
            return Ok(DecodedText {
                text,
                encoding: *encoding,
                used_fallback: true,
            });
        }
        attempted.push(encoding.label().to_string());
    }

    Err(attempted)
}

/// Normalize line endings to Unix style.
pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_utf8_wins_first() {
        let decoded = decode_with_fallback("héllo".as_bytes(), &DEFAULT_FALLBACK_ENCODINGS).unwrap();
        assert_eq!(decoded.text, "héllo");
        assert_eq!(decoded.encoding, TextEncoding::Utf8);
        assert!(!decoded.used_fallback);
    }

    #[test]
    fn test_bom_is_stripped() {
        let decoded = decode_with_fallback(b"\xEF\xBB\xBFhi", &DEFAULT_FALLBACK_ENCODINGS).unwrap();
        assert_eq!(decoded.text, "hi");
    }

    #[test]
    fn test_latin1_fallback() {
        let decoded = decode_with_fallback(b"caf\xE9", &DEFAULT_FALLBACK_ENCODINGS).unwrap();
        assert_eq!(decoded.text, "café");
        assert_eq!(decoded.encoding.label(), "latin-1");
        assert!(decoded.used_fallback);
    }

    #[test]
    fn test_cp1252_maps_smart_quotes() {
        let text = TextEncoding::Cp1252.decode(b"\x93quoted\x94").unwrap();
        assert_eq!(text, "\u{201C}quoted\u{201D}");
        assert_eq!(TextEncoding::Cp1252.decode(b"\x81"), None);
    }

    #[test]
    fn test_exhausted_lists_attempts() {
        let attempted = decode_with_fallback(b"\x81\x8D", &[TextEncoding::Cp1252]).unwrap_err();
        assert_eq!(attempted, vec!["utf-8".to_string(), "cp1252".to_string()]);
    }

    #[test]
    fn test_from_label() {
        assert_eq!(TextEncoding::from_label("\"Windows-1252\""), Some(TextEncoding::Cp1252));
        assert_eq!(TextEncoding::from_label("ISO-8859-1"), Some(TextEncoding::Iso8859_1));
        assert_eq!(TextEncoding::from_label("koi8-r"), None);
    }

    #[test]
    fn test_normalize_line_endings() {
        assert_eq!(normalize_line_endings("a\r\nb\rc"), "a\nb\nc");
    }
}
