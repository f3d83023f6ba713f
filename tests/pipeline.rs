//! End-to-end ingestion through the registry and the batch driver.

use std::path::Path;
use std::sync::Arc;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use pretty_assertions::assert_eq;

use rag_store::observability::RecordingObserver;
use rag_store::types::keys;
use rag_store::{BatchConfig, BatchProcessor, IngestConfig, ProcessOptions, ProcessorRegistry};

fn registry() -> ProcessorRegistry {
    let config = IngestConfig {
        ocr_enabled: false,
        ..IngestConfig::default()
    };
    ProcessorRegistry::with_defaults(&config, Arc::new(RecordingObserver::new())).unwrap()
}

fn write_pdf(path: &Path, pages: &[&str]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 10.into()]),
                Operation::new("Td", vec![50.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

#[tokio::test]
async fn test_directory_with_mixed_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "Alpha notes for the team.").unwrap();
    write_pdf(
        &dir.path().join("b.pdf"),
        &[
            "Page one explains how the ingestion pipeline reads every document.",
            "Page two lists the fallback chain used when a page has no text layer.",
        ],
    );
    std::fs::write(dir.path().join("c.xyz"), "unknown format").unwrap();

    let batch = BatchProcessor::new(Arc::new(registry()), BatchConfig::default());
    let (chunks, result) = batch.process_directory(dir.path()).await.unwrap();

    assert_eq!(result.total_files, 3);
    assert_eq!(result.processed_files, 2);
    assert_eq!(result.failed_files, 1);
    assert_eq!(result.failures[0].error_type, "unsupported_format");
    assert!(result.failures[0].path.ends_with("c.xyz"));

    let text: Vec<_> = chunks.iter().filter(|c| c.source() == Some("a.txt")).collect();
    assert_eq!(text.len(), 1);
    assert_eq!(text[0].content, "Alpha notes for the team.");

    let pdf: Vec<_> = chunks.iter().filter(|c| c.source() == Some("b.pdf")).collect();
    assert_eq!(pdf.len(), 2);
    for (i, chunk) in pdf.iter().enumerate() {
        assert_eq!(chunk.meta_str(keys::EXTRACTION_METHOD), Some("pymupdf_text"));
        assert_eq!(chunk.meta_str(keys::CHUNK_ID), Some(format!("chunk_{i}").as_str()));
        assert_eq!(chunk.meta_u64(keys::TOTAL_CHUNKS), Some(2));
        assert_eq!(chunk.meta_u64(keys::PAGE), Some(i as u64 + 1));
    }
    assert!(pdf[0].content.contains("Page one"));
    assert_eq!(result.total_chunks, chunks.len());
}

#[test]
fn test_upper_case_extension_resolves_like_lower_case() {
    let registry = registry();
    let upper = registry.resolve(Path::new("report.PDF")).map(|p| p.name());
    let lower = registry.resolve(Path::new("report.pdf")).map(|p| p.name());
    assert_eq!(upper, lower);
    assert_eq!(upper, Some("PDFProcessor"));
}

#[test]
fn test_mht_hello() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("page.mht");
    std::fs::write(
        &path,
        "MIME-Version: 1.0\r\n\
Content-Type: multipart/related; boundary=\"frontier\"\r\n\
\r\n\
--frontier\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<html><body><h1>Hello</h1></body></html>\r\n\
--frontier--\r\n",
    )
    .unwrap();

    let chunks = registry().process(&path, &ProcessOptions::default()).unwrap();
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].content.contains("Hello"));
    assert_eq!(chunks[0].meta_str(keys::SOURCE_FORMAT), Some("mht/mhtml"));
    assert_eq!(chunks[0].meta_str(keys::PROCESSOR), Some("MHTProcessor"));
}

#[test]
fn test_latin1_text_and_idempotence() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.txt");
    let mut body = Vec::new();
    for i in 0..20 {
        body.extend_from_slice(format!("Paragraphe {i}: le caf").as_bytes());
        body.push(0xE9);
        body.extend_from_slice(b" est servi avec une cr\xE8me l\xE9g\xE8re.\n\n");
    }
    std::fs::write(&path, &body).unwrap();

    let registry = registry();
    let options = ProcessOptions::new().with_chunk_size(120).with_chunk_overlap(20);
    let first = registry.process(&path, &options).unwrap();
    let second = registry.process(&path, &options).unwrap();

    assert!(first.len() > 1);
    assert_eq!(first, second);
    assert!(first.iter().all(|c| c.meta_str(keys::ENCODING) == Some("latin-1")));
    assert!(first[0].content.contains("café"));
    assert!(first.iter().all(|c| c.len() <= 120));
}

#[test]
fn test_missing_file() {
    let err = registry()
        .process(Path::new("/no/such/dir/report.pdf"), &ProcessOptions::default())
        .unwrap_err();
    assert_eq!(err.error_type(), "file_not_found");
}
