//! PDF processor with a per-page extraction fallback chain.
//!
//! Each page tries, in order: the text layer, raw content-stream text blocks
//! (only when the text layer is empty), then OCR of the rendered page. The
//! first result with at least `min_page_chars` characters wins.

use std::sync::Arc;

use lopdf::{Document, Object, ObjectId};
use tracing::{debug, warn};

use super::enrich::ChunkEnricher;
use super::ocr::{OcrEngine, TesseractOcr};
use super::DocumentProcessor;
use crate::chunkers::{char_len, RecursiveSplitter, TextSplitter};
use crate::error::{Error, Result};
use crate::observability::{default_observer, ProcessingObserver, SharedObserver};
use crate::types::{
    keys, ChunkConfig, DocumentChunk, ExtractionResult, IngestConfig, ProcessOptions, SourceFile,
    TextUnit,
};
use crate::DEFAULT_MIN_PAGE_CHARS;

const EXTENSIONS: [&str; 1] = [".pdf"];

/// Extracts PDF pages and splits them with the recursive splitter.
pub struct PdfProcessor {
    ocr: Option<Arc<dyn OcrEngine>>,
    min_page_chars: usize,
    observer: SharedObserver,
}

impl PdfProcessor {
    /// Processor with Tesseract OCR at the default resolution.
    pub fn new() -> Self {
        Self {
            ocr: Some(Arc::new(TesseractOcr::default())),
            min_page_chars: DEFAULT_MIN_PAGE_CHARS,
            observer: default_observer(),
        }
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        let processor = Self::new().with_min_page_chars(config.min_page_chars);
        if config.ocr_enabled {
            processor.with_ocr(Arc::new(TesseractOcr::new(config.ocr_language.clone(), config.ocr_dpi)))
        } else {
            processor.without_ocr()
        }
    }

    pub fn with_ocr(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(engine);
        self
    }

    pub fn without_ocr(mut self) -> Self {
        self.ocr = None;
        self
    }

    pub fn with_min_page_chars(mut self, min_page_chars: usize) -> Self {
        self.min_page_chars = min_page_chars;
        self
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    fn ocr_engine(&self) -> Option<&dyn OcrEngine> {
        self.ocr
            .as_deref()
            .filter(|engine| engine.is_available())
    }

    /// One unit per page that yielded text, plus the page count.
    fn extract_pages(&self, source: &SourceFile) -> Result<(Vec<TextUnit>, usize)> {
        let doc = Document::load(&source.path).map_err(|e| {
            Error::extraction(self.name(), &source.path, format!("failed to open PDF: {e}"))
        })?;
        let pages = doc.get_pages();
        let total_pages = pages.len();
        let ocr = self.ocr_engine();

        let mut units = Vec::new();
        for (page_number, page_id) in pages {
            let direct = match doc.extract_text(&[page_number]) {
                Ok(text) => normalize_lines(&text),
                Err(e) => {
                    debug!(page = page_number, error = %e, "Text layer extraction failed");
                    String::new()
                }
            };

            let result = resolve_page_text(
                direct,
                || block_text(&doc, page_id),
                ocr.map(|engine| move || engine.recognize_pdf_page(&source.path, page_number)),
                self.min_page_chars,
            )?;

            match result.method() {
                Some(method) => {
                    debug!(page = page_number, method = %method, "Page extracted");
                    units.push(
                        TextUnit::new(result.text())
                            .with_method(method)
                            .with_meta(keys::PAGE, page_number),
                    );
                }
                None => warn!(
                    file_path = %source.path.display(),
                    page = page_number,
                    "Page has no extractable text"
                ),
            }
        }

        Ok((units, total_pages))
    }
}

impl Default for PdfProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentProcessor for PdfProcessor {
    fn name(&self) -> &'static str {
        "PDFProcessor"
    }

    fn file_type_description(&self) -> &'static str {
        "PDF documents (.pdf)"
    }

    fn supported_extensions(&self) -> &[&'static str] {
        &EXTENSIONS
    }

    fn default_chunk_config(&self) -> ChunkConfig {
        ChunkConfig::new(1800, 270)
    }

    fn error_tag(&self) -> &'static str {
        "pdf_processing_error"
    }

    fn observer(&self) -> &dyn ProcessingObserver {
        self.observer.as_ref()
    }

    fn extract_chunks(&self, source: &SourceFile, options: &ProcessOptions) -> Result<Vec<DocumentChunk>> {
        let config = self.processing_params(options)?;
        let (units, total_pages) = self.extract_pages(source)?;

        let splitter = RecursiveSplitter::new();
        let pieces = splitter.split_units(&units, &config);

        Ok(ChunkEnricher::new(
            self.metadata_template(source),
            source.document_id("pdf"),
            &config,
            splitter.name(),
        )
        .with_field(keys::TOTAL_PAGES, total_pages)
        .finish(pieces))
    }
}

/// Run the page fallback chain.
///
/// `blocks` is only consulted when the text layer is empty; `ocr` is only
/// run when neither text source reaches `min_chars`. When nothing reaches
/// the threshold, the best shorter non-empty text is kept.
pub fn resolve_page_text<B, O>(
    direct: String,
    blocks: B,
    ocr: Option<O>,
    min_chars: usize,
) -> Result<ExtractionResult>
where
    B: FnOnce() -> String,
    O: FnOnce() -> Result<String>,
{
    let direct = direct.trim().to_string();
    if char_len(&direct) >= min_chars && !direct.is_empty() {
        return Ok(ExtractionResult::DirectText(direct));
    }

    let blocks = if direct.is_empty() {
        blocks().trim().to_string()
    } else {
        String::new()
    };
    if char_len(&blocks) >= min_chars && !blocks.is_empty() {
        return Ok(ExtractionResult::BlockText(blocks));
    }

    if let Some(ocr) = ocr {
        let recognized = ocr()?;
        let recognized = recognized.trim();
        if !recognized.is_empty() {
            return Ok(ExtractionResult::OcrText(recognized.to_string()));
        }
    }

    Ok(if !direct.is_empty() {
        ExtractionResult::DirectText(direct)
    } else if !blocks.is_empty() {
        ExtractionResult::BlockText(blocks)
    } else {
        ExtractionResult::Empty
    })
}

/// Trim every line and drop blank ones.
fn normalize_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text shown between each BT/ET pair of the page's content streams,
/// one block per pair, blocks separated by blank lines.
fn block_text(doc: &Document, page_id: ObjectId) -> String {
    let content = match doc.get_and_decode_page_content(page_id) {
        Ok(content) => content,
        Err(e) => {
            debug!(error = %e, "Could not decode page content");
            return String::new();
        }
    };

    let mut blocks = Vec::new();
    let mut current = String::new();
    let mut in_block = false;

    for operation in &content.operations {
        match operation.operator.as_str() {
            "BT" => {
                in_block = true;
                current.clear();
            }
            "ET" => {
                in_block = false;
                let block = normalize_lines(&current);
                if !block.is_empty() {
                    blocks.push(block);
                }
                current.clear();
            }
            _ if !in_block => {}
            "Tj" => {
                if let Some(operand) = operation.operands.last() {
                    push_pdf_string(&mut current, operand);
                }
            }
            "'" | "\"" => {
                current.push('\n');
                if let Some(operand) = operation.operands.last() {
                    push_pdf_string(&mut current, operand);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operation.operands.first() {
                    for item in items {
                        match item {
                            Object::Integer(kern) if *kern < -200 => current.push(' '),
                            Object::Real(kern) if *kern < -200.0 => current.push(' '),
                            other => push_pdf_string(&mut current, other),
                        }
                    }
                }
            }
            "T*" => current.push('\n'),
            "Td" | "TD" => {
                let moves_line = match operation.operands.get(1) {
                    Some(Object::Integer(ty)) => *ty != 0,
                    Some(Object::Real(ty)) => *ty != 0.0,
                    _ => false,
                };
                if moves_line {
                    current.push('\n');
                }
            }
            _ => {}
        }
    }

    blocks.join("\n\n")
}

fn push_pdf_string(out: &mut String, object: &Object) {
    if let Object::String(bytes, _) = object {
        out.push_str(&decode_pdf_string(bytes));
    }
}

/// UTF-16BE when the string carries a byte order mark, Latin-1 otherwise.
fn decode_pdf_string(bytes: &[u8]) -> String {
    match bytes.strip_prefix(&[0xFE, 0xFF]) {
        Some(utf16) => {
            let units: Vec<u16> = utf16
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        None => bytes.iter().map(|&b| b as char).collect(),
    }
}
