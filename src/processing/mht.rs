//! MHT/MHTML web archive processor.
//!
//! The primary path parses the archive with `mailparse` and reads the
//! structured block elements of every HTML part. Archives that path rejects
//! are re-read by the tolerant walker in [`super::mime`], which flattens the
//! HTML into visible text.

use tracing::{debug, info, warn};

use super::enrich::ChunkEnricher;
use super::html::{extract_elements, extract_title, html_to_text};
use super::mime::html_bodies;
use super::DocumentProcessor;
use crate::chunkers::{RecursiveSplitter, TextSplitter};
use crate::error::{BoxedCause, Error, Result};
use crate::observability::{default_observer, ProcessingObserver, SharedObserver};
use crate::types::{keys, ChunkConfig, DocumentChunk, ExtractionMethod, ProcessOptions, SourceFile, TextUnit};

const EXTENSIONS: [&str; 2] = [".mht", ".mhtml"];

const SOURCE_FORMAT: &str = "mht/mhtml";

/// Splits saved web pages into chunks of their visible text.
pub struct MhtProcessor {
    observer: SharedObserver,
}

impl MhtProcessor {
    pub fn new() -> Self {
        Self {
            observer: default_observer(),
        }
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Primary path: block elements of each `text/html` part.
    fn parse_elements(&self, bytes: &[u8]) -> std::result::Result<Vec<TextUnit>, BoxedCause> {
        let mail = mailparse::parse_mail(bytes)?;

        let mut html_parts = Vec::new();
        collect_html_parts(&mail, &mut html_parts)?;
        if html_parts.is_empty() {
            return Err("archive has no text/html part".into());
        }

        let mut elements = Vec::new();
        let mut title = None;
        for html in &html_parts {
            elements.extend(extract_elements(html));
            if title.is_none() {
                title = extract_title(html);
            }
        }

        if elements.is_empty() {
            return Ok(Vec::new());
        }

        let mut unit = TextUnit::new(elements.join("\n\n")).with_method(ExtractionMethod::UnstructuredElements);
        if let Some(title) = title {
            unit = unit.with_meta(keys::TITLE, title);
        }
        Ok(vec![unit])
    }

    /// Fallback path: walk the MIME tree by hand and flatten the HTML.
    fn parse_manually(&self, source: &SourceFile, bytes: &[u8]) -> Result<Vec<TextUnit>> {
        let raw = String::from_utf8_lossy(bytes);
        let bodies = html_bodies(&raw).map_err(|e| {
            Error::extraction_with_source(self.name(), &source.path, "Manual MHT parsing failed", e)
        })?;

        let html: String = bodies.concat();
        if html.trim().is_empty() {
            warn!(file_path = %source.path.display(), "No HTML content found in MHT file");
            return Err(Error::NoContentFound(source.path.clone()));
        }

        let text = html_to_text(&html);
        if text.is_empty() {
            warn!(file_path = %source.path.display(), "No text content extracted from MHT file");
            return Ok(Vec::new());
        }

        let mut unit = TextUnit::new(text)
            .with_method(ExtractionMethod::ManualMhtParser)
            .with_meta(keys::CONTENT_TYPE, "text/html");
        if let Some(title) = extract_title(&html) {
            unit = unit.with_meta(keys::TITLE, title);
        }
        Ok(vec![unit])
    }

    fn read_units(&self, source: &SourceFile) -> Result<Vec<TextUnit>> {
        let bytes = std::fs::read(&source.path).map_err(|e| Error::io(&source.path, e))?;

        let primary_error = match self.parse_elements(&bytes) {
            Ok(units) => return Ok(units),
            Err(e) => e,
        };
        info!(
            file_path = %source.path.display(),
            error = %primary_error,
            "Element loader failed, attempting manual MHT parsing"
        );

        match self.parse_manually(source, &bytes) {
            Ok(units) => Ok(units),
            Err(Error::ExtractionFailed { reason, source: cause, .. }) => {
                let reason = match cause {
                    Some(cause) => format!("{reason}: {cause}"),
                    None => reason,
                };
                Err(Error::extraction_with_source(self.name(), &source.path, reason, primary_error))
            }
            Err(other) => Err(other),
        }
    }
}

impl Default for MhtProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentProcessor for MhtProcessor {
    fn name(&self) -> &'static str {
        "MHTProcessor"
    }

    fn file_type_description(&self) -> &'static str {
        "MHT/MHTML web archive files (.mht, .mhtml)"
    }

    fn supported_extensions(&self) -> &[&'static str] {
        &EXTENSIONS
    }

    fn default_chunk_config(&self) -> ChunkConfig {
        ChunkConfig::new(1200, 180)
    }

    fn error_tag(&self) -> &'static str {
        "mht_processing_error"
    }

    fn observer(&self) -> &dyn ProcessingObserver {
        self.observer.as_ref()
    }

    fn extract_chunks(&self, source: &SourceFile, options: &ProcessOptions) -> Result<Vec<DocumentChunk>> {
        let config = self.processing_params(options)?;
        let units = self.read_units(source)?;
        debug!(file_path = %source.path.display(), units = units.len(), "Read MHT archive");

        let splitter = RecursiveSplitter::new();
        let pieces = splitter.split_units(&units, &config);

        Ok(ChunkEnricher::new(
            self.metadata_template(source),
            source.document_id("mht"),
            &config,
            splitter.name(),
        )
        .with_field(keys::SOURCE_FORMAT, SOURCE_FORMAT)
        .finish(pieces))
    }
}

fn collect_html_parts(mail: &mailparse::ParsedMail<'_>, out: &mut Vec<String>) -> std::result::Result<(), BoxedCause> {
    if mail.subparts.is_empty() {
        if mail.ctype.mimetype == "text/html" {
            out.push(mail.get_body()?);
        }
        return Ok(());
    }
    for part in &mail.subparts {
        collect_html_parts(part, out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::error::Error as _;
    use std::path::PathBuf;

    const HELLO: &str = "From: <Saved by Browser>\r\n\
Subject: Hello\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/related; type=\"text/html\"; boundary=\"----=_Part_1\"\r\n\
\r\n\
------=_Part_1\r\n\
Content-Type: text/html; charset=\"utf-8\"\r\n\
Content-Location: https://example.com/\r\n\
\r\n\
<html><head><title>Greeting</title></head><body><h1>Hello</h1><p>Welcome aboard.</p></body></html>\r\n\
------=_Part_1--\r\n";

    fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_hello_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "page.mht", HELLO);
        let chunks = MhtProcessor::new()
            .process_document(&path, &ProcessOptions::default())
            .unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Hello\n\nWelcome aboard.");
        assert_eq!(chunks[0].meta_str(keys::SOURCE_FORMAT), Some("mht/mhtml"));
        assert_eq!(chunks[0].meta_str(keys::EXTRACTION_METHOD), Some("unstructured_elements"));
        assert_eq!(chunks[0].meta_str(keys::TITLE), Some("Greeting"));
        assert_eq!(chunks[0].meta_str(keys::DOCUMENT_ID), Some("page_mht"));
        assert_eq!(chunks[0].meta_u64(keys::CHUNK_SIZE), Some(1200));
    }

    #[test]
    fn test_div_text_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let body = "Content-Type: multipart/related; boundary=\"b1\"\r\n\r\n--b1\r\n\
Content-Type: text/html; charset=utf-8\r\n\r\n\
<html><body><div>Important notice about refunds</div><p>Footer</p></body></html>\r\n--b1--\r\n";
        let path = write(&dir, "notice.mht", body);
        let chunks = MhtProcessor::new()
            .process_document(&path, &ProcessOptions::default())
            .unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Important notice about refunds\n\nFooter");
        assert_eq!(chunks[0].meta_str(keys::EXTRACTION_METHOD), Some("unstructured_elements"));
    }

    #[test]
    fn test_broken_transfer_encoding_uses_manual_parser() {
        let dir = tempfile::tempdir().unwrap();
        let body = "Content-Type: multipart/related; boundary=\"b1\"\n\n--b1\n\
Content-Type: text/html\nContent-Transfer-Encoding: base64\n\n\
<html><head><title>Kept</title></head><body><p>Recovered text</p></body></html>\n--b1--\n";
        let path = write(&dir, "broken.mhtml", body);
        let chunks = MhtProcessor::new()
            .process_document(&path, &ProcessOptions::default())
            .unwrap();

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].content.contains("Recovered text"));
        assert_eq!(chunks[0].meta_str(keys::EXTRACTION_METHOD), Some("manual_mht_parser"));
        assert_eq!(chunks[0].meta_str(keys::CONTENT_TYPE), Some("text/html"));
        assert_eq!(chunks[0].meta_str(keys::TITLE), Some("Kept"));
        assert_eq!(chunks[0].meta_str(keys::SOURCE_FORMAT), Some("mht/mhtml"));
    }

    #[test]
    fn test_no_html_is_no_content() {
        let dir = tempfile::tempdir().unwrap();
        let body = "Content-Type: multipart/related; boundary=\"b1\"\n\n--b1\n\
Content-Type: image/png\n\nnot-html\n--b1--\n";
        let path = write(&dir, "images.mht", body);
        let err = MhtProcessor::new()
            .process_document(&path, &ProcessOptions::default())
            .unwrap_err();
        assert_eq!(err.error_type(), "no_content_found");
    }

    #[test]
    fn test_double_failure_keeps_primary_error_as_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "hopeless.mht", "Content-Type: multipart/related\n\nno boundary anywhere");
        let err = MhtProcessor::new()
            .process_document(&path, &ProcessOptions::default())
            .unwrap_err();

        assert_eq!(err.error_type(), "mht_processing_error");
        assert!(err.to_string().contains("Manual MHT parsing failed"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_long_archive_is_split() {
        let dir = tempfile::tempdir().unwrap();
        let paragraphs: String = (0..40)
            .map(|i| format!("<p>Paragraph {i} describes the archived page in some detail.</p>"))
            .collect();
        let body = format!("Content-Type: text/html\n\n<html><body>{paragraphs}</body></html>");
        let path = write(&dir, "long.mht", &body);
        let chunks = MhtProcessor::new()
            .process_document(&path, &ProcessOptions::default())
            .unwrap();

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= 1200));
        assert!(chunks
            .iter()
            .all(|c| c.meta_str(keys::EXTRACTION_METHOD) == Some("unstructured_elements")));
    }
}
