//! Word (.docx) processor and the legacy `.doc` converter.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use super::enrich::ChunkEnricher;
use super::{unsupported, DocumentProcessor};
use crate::chunkers::{RecursiveSplitter, TextSplitter};
use crate::error::{Error, Result};
use crate::observability::{default_observer, ProcessingObserver, SharedObserver};
use crate::types::{keys, ChunkConfig, DocumentChunk, ProcessOptions, SourceFile, TextUnit};

const EXTENSIONS: [&str; 1] = [".docx"];

/// Compound File Binary header used by Word 97-2003 files.
const OLE_MAGIC: [u8; 4] = [0xD0, 0xCF, 0x11, 0xE0];

/// Zip local file header; every .docx starts with one.
const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";

const LEGACY_DOC_HINT: &str =
    "Legacy .doc files are not supported. Convert the file to .docx (for example with LibreOffice) and retry";

/// Diagnostic for extensions that need conversion before processing.
pub fn legacy_doc_hint(extension: &str) -> Option<&'static str> {
    (extension == ".doc").then_some(LEGACY_DOC_HINT)
}

/// Reads .docx files as a single unit of paragraph text.
pub struct WordProcessor {
    observer: SharedObserver,
}

impl WordProcessor {
    pub fn new() -> Self {
        Self {
            observer: default_observer(),
        }
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    fn read_text(&self, source: &SourceFile) -> Result<String> {
        let bytes = std::fs::read(&source.path).map_err(|e| Error::io(&source.path, e))?;

        if bytes.starts_with(&OLE_MAGIC) {
            return Err(Error::extraction(
                self.name(),
                &source.path,
                "file is a legacy Word 97-2003 document; convert it to .docx",
            ));
        }
        if !bytes.starts_with(&ZIP_MAGIC) {
            return Err(Error::extraction(
                self.name(),
                &source.path,
                "file is not a Word file (.docx) or is corrupted",
            ));
        }

        let docx = docx_rs::read_docx(&bytes).map_err(|e| {
            Error::extraction(
                self.name(),
                &source.path,
                format!("file is not a Word file (.docx) or is corrupted: {e}"),
            )
        })?;

        Ok(extract_docx_text(&docx))
    }
}

impl Default for WordProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentProcessor for WordProcessor {
    fn name(&self) -> &'static str {
        "WordProcessor"
    }

    fn file_type_description(&self) -> &'static str {
        "Microsoft Word documents (.docx)"
    }

    fn supported_extensions(&self) -> &[&'static str] {
        &EXTENSIONS
    }

    fn default_chunk_config(&self) -> ChunkConfig {
        ChunkConfig::new(1000, 150)
    }

    fn error_tag(&self) -> &'static str {
        "word_processing_error"
    }

    fn observer(&self) -> &dyn ProcessingObserver {
        self.observer.as_ref()
    }

    fn validate_file(&self, path: &Path) -> Result<SourceFile> {
        let source = SourceFile::inspect(path)?;
        if let Some(hint) = legacy_doc_hint(&source.extension) {
            return Err(unsupported(path, self.supported_extensions(), Some(hint)));
        }
        if !self.is_supported_file(path) {
            return Err(unsupported(path, self.supported_extensions(), None));
        }
        Ok(source)
    }

    fn extract_chunks(&self, source: &SourceFile, options: &ProcessOptions) -> Result<Vec<DocumentChunk>> {
        let config = self.processing_params(options)?;
        let text = self.read_text(source)?;
        debug!(file_path = %source.path.display(), chars = text.chars().count(), "Read DOCX");

        let splitter = RecursiveSplitter::new();
        let pieces = splitter.split_units(&[TextUnit::new(text)], &config);

        Ok(ChunkEnricher::new(
            self.metadata_template(source),
            source.document_id("word"),
            &config,
            splitter.name(),
        )
        .with_field(keys::LOADER_TYPE, "docx_reader")
        .with_field(keys::SUPPORTS_LEGACY_DOC, false)
        .with_field(keys::SEPARATORS, splitter.separators().to_vec())
        .finish(pieces))
    }
}

/// Paragraph text separated by blank lines; table rows as `cell | cell`.
fn extract_docx_text(docx: &docx_rs::Docx) -> String {
    let mut text = String::new();

    for child in &docx.document.children {
        match child {
            docx_rs::DocumentChild::Paragraph(para) => {
                push_block(&mut text, &paragraph_text(para), "\n\n");
            }
            docx_rs::DocumentChild::Table(table) => {
                for row in &table.rows {
                    let docx_rs::TableChild::TableRow(tr) = row;
                    let cells: Vec<String> = tr
                        .cells
                        .iter()
                        .map(|cell| {
                            let docx_rs::TableRowChild::TableCell(tc) = cell;
                            tc.children
                                .iter()
                                .filter_map(|c| match c {
                                    docx_rs::TableCellContent::Paragraph(p) => Some(paragraph_text(p)),
                                    _ => None,
                                })
                                .filter(|t| !t.is_empty())
                                .collect::<Vec<_>>()
                                .join(" ")
                        })
                        .filter(|t| !t.is_empty())
                        .collect();
                    push_block(&mut text, &cells.join(" | "), "\n");
                }
            }
            _ => {}
        }
    }

    text.trim().to_string()
}

fn push_block(out: &mut String, block: &str, separator: &str) {
    if block.is_empty() {
        return;
    }
    if !out.is_empty() {
        out.push_str(separator);
    }
    out.push_str(block);
}

fn paragraph_text(para: &docx_rs::Paragraph) -> String {
    let mut text = String::new();
    for child in &para.children {
        match child {
            docx_rs::ParagraphChild::Run(run) => push_run_text(&mut text, run),
            docx_rs::ParagraphChild::Hyperlink(link) => {
                for child in &link.children {
                    if let docx_rs::ParagraphChild::Run(run) = child {
                        push_run_text(&mut text, run);
                    }
                }
            }
            _ => {}
        }
    }
    text
}

fn push_run_text(out: &mut String, run: &docx_rs::Run) {
    for child in &run.children {
        match child {
            docx_rs::RunChild::Text(t) => out.push_str(&t.text),
            docx_rs::RunChild::Tab(_) => out.push('\t'),
            docx_rs::RunChild::Break(_) => out.push('\n'),
            _ => {}
        }
    }
}

/// Converts legacy `.doc` files to `.docx` with headless LibreOffice.
#[derive(Debug, Clone)]
pub struct LegacyDocConverter {
    program: String,
}

impl LegacyDocConverter {
    pub fn new() -> Self {
        Self::with_program("libreoffice")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Check if the LibreOffice binary can be spawned.
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Convert `doc_path` into `out_dir`, returning the new `.docx` path.
    pub fn convert(&self, doc_path: &Path, out_dir: &Path) -> Result<PathBuf> {
        let output = Command::new(&self.program)
            .args(["--headless", "--convert-to", "docx", "--outdir"])
            .arg(out_dir)
            .arg(doc_path)
            .output()
            .map_err(|e| Error::extraction("LegacyDocConverter", doc_path, format!("LibreOffice failed: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::extraction(
                "LegacyDocConverter",
                doc_path,
                format!("LibreOffice error: {}", stderr.trim()),
            ));
        }

        let stem = doc_path.file_stem().unwrap_or_default().to_string_lossy();
        let converted = out_dir.join(format!("{stem}.docx"));
        if !converted.exists() {
            return Err(Error::extraction(
                "LegacyDocConverter",
                doc_path,
                "LibreOffice produced no .docx output",
            ));
        }

        info!(
            source = %doc_path.display(),
            converted = %converted.display(),
            "Converted legacy Word document"
        );
        Ok(converted)
    }
}

impl Default for LegacyDocConverter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docx_rs::{Docx, Paragraph, Run};
    use pretty_assertions::assert_eq;

    fn write_docx(path: &Path, paragraphs: &[&str]) {
        let mut docx = Docx::new();
        for text in paragraphs {
            docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(*text)));
        }
        let file = std::fs::File::create(path).unwrap();
        docx.build().pack(file).unwrap();
    }

    #[test]
    fn test_docx_single_unit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memo.docx");
        write_docx(&path, &["Quarterly memo", "Budget is approved."]);

        let chunks = WordProcessor::new()
            .process_document(&path, &ProcessOptions::default())
            .unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Quarterly memo\n\nBudget is approved.");
        assert_eq!(chunks[0].meta_str(keys::DOCUMENT_ID), Some("memo_word"));
        assert_eq!(chunks[0].meta_str(keys::LOADER_TYPE), Some("docx_reader"));
        assert_eq!(
            chunks[0].metadata.get(keys::SUPPORTS_LEGACY_DOC),
            Some(&serde_json::Value::Bool(false))
        );
        assert_eq!(chunks[0].meta_u64(keys::CHUNK_SIZE), Some(1000));
    }

    #[test]
    fn test_legacy_doc_is_rejected_with_hint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.doc");
        std::fs::write(&path, OLE_MAGIC).unwrap();

        let err = WordProcessor::new()
            .process_document(&path, &ProcessOptions::default())
            .unwrap_err();
        assert_eq!(err.error_type(), "unsupported_format");
        assert!(err.to_string().contains("Convert the file to .docx"));
    }

    #[test]
    fn test_renamed_legacy_file_is_diagnosed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("renamed.docx");
        std::fs::write(&path, [&OLE_MAGIC[..], &b"rest"[..]].concat()).unwrap();

        let err = WordProcessor::new()
            .process_document(&path, &ProcessOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("legacy Word 97-2003"));
    }

    #[test]
    fn test_corrupted_docx_is_diagnosed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.docx");
        std::fs::write(&path, b"plain text pretending to be docx").unwrap();

        let err = WordProcessor::new()
            .process_document(&path, &ProcessOptions::default())
            .unwrap_err();
        assert_eq!(err.error_type(), "word_processing_error");
        assert!(err.to_string().contains("not a Word file"));
    }

    #[test]
    fn test_legacy_hint_only_for_doc() {
        assert!(legacy_doc_hint(".doc").is_some());
        assert!(legacy_doc_hint(".docx").is_none());
    }
}
