//! Directory batch driver.
//!
//! Scans the immediate children of a directory, dispatches each file to the
//! registry on a blocking worker and collects chunks in file-name order.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::processing::{FileFilter, FilterConfig, LegacyDocConverter};
use crate::registry::ProcessorRegistry;
use crate::types::{extension_of, keys, DocumentChunk, IngestConfig, ProcessOptions};
use crate::DEFAULT_CONCURRENCY;

/// Configuration for batch processing.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum files to process concurrently
    pub concurrency: usize,
    /// Whether to continue on individual file failures
    pub continue_on_error: bool,
    /// Convert `.doc` files to `.docx` through LibreOffice first
    pub convert_legacy_word: bool,
    /// Chunking overrides applied to every file
    pub options: ProcessOptions,
    /// Which directory entries are dispatched at all
    pub filter: FilterConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            continue_on_error: true,
            convert_legacy_word: false,
            options: ProcessOptions::default(),
            filter: FilterConfig::default(),
        }
    }
}

impl BatchConfig {
    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            concurrency: config.concurrency.max(1),
            continue_on_error: config.continue_on_error,
            convert_legacy_word: config.convert_legacy_word,
            options: config.process_options(),
            filter: FilterConfig::default(),
        }
    }
}

/// Result of batch processing.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub total_files: usize,
    pub processed_files: usize,
    pub failed_files: usize,
    pub total_chunks: usize,
    pub failures: Vec<FileFailure>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// A file that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error_type: String,
    pub message: String,
}

impl FileFailure {
    fn new(path: PathBuf, error: &Error) -> Self {
        Self {
            path,
            error_type: error.error_type().to_string(),
            message: error.to_string(),
        }
    }
}

/// Running totals shared by the collecting and streaming drivers.
struct Tally {
    total_files: usize,
    processed_files: usize,
    total_chunks: usize,
    failures: Vec<FileFailure>,
    started_at: DateTime<Utc>,
}

impl Tally {
    fn new(total_files: usize) -> Self {
        Self {
            total_files,
            processed_files: 0,
            total_chunks: 0,
            failures: Vec::new(),
            started_at: Utc::now(),
        }
    }

    fn finish(self) -> BatchResult {
        BatchResult {
            total_files: self.total_files,
            processed_files: self.processed_files,
            failed_files: self.failures.len(),
            total_chunks: self.total_chunks,
            failures: self.failures,
            started_at: self.started_at,
            completed_at: Utc::now(),
        }
    }
}

/// Batch processor for whole directories.
pub struct BatchProcessor {
    registry: Arc<ProcessorRegistry>,
    config: BatchConfig,
    filter: FileFilter,
}

impl BatchProcessor {
    /// Create a new batch processor.
    pub fn new(registry: Arc<ProcessorRegistry>, config: BatchConfig) -> Self {
        let filter = FileFilter::new(config.filter.clone());
        Self {
            registry,
            config,
            filter,
        }
    }

    /// Process a single file or every file directly inside a directory.
    pub async fn process_path(&self, path: &Path) -> Result<(Vec<DocumentChunk>, BatchResult)> {
        if path.is_dir() {
            return self.process_directory(path).await;
        }
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        self.process_files(vec![path.to_path_buf()]).await
    }

    /// Process every file directly inside `dir` and return all chunks.
    pub async fn process_directory(&self, dir: &Path) -> Result<(Vec<DocumentChunk>, BatchResult)> {
        let files = self.collect_files(dir)?;
        self.process_files(files).await
    }

    /// Process a directory, sending each file's chunks downstream as soon as
    /// it is done.
    pub async fn process_directory_streaming(
        &self,
        dir: &Path,
        sender: mpsc::Sender<Vec<DocumentChunk>>,
    ) -> Result<BatchResult> {
        let files = self.collect_files(dir)?;
        let mut tally = Tally::new(files.len());
        let mut results = Box::pin(self.file_results(files));

        while let Some((path, outcome)) = results.next().await {
            match outcome {
                Ok(chunks) => {
                    tally.processed_files += 1;
                    tally.total_chunks += chunks.len();
                    if chunks.is_empty() {
                        continue;
                    }
                    if sender.send(chunks).await.is_err() {
                        warn!("Receiver dropped, stopping batch processing");
                        break;
                    }
                }
                Err(e) => self.record_failure(&mut tally, path, e)?,
            }
        }

        Ok(self.finish(tally))
    }

    /// Sorted regular files directly inside `dir` that pass the filter.
    pub fn collect_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.exists() {
            return Err(Error::FileNotFound(dir.to_path_buf()));
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
            let entry = entry.map_err(|e| Error::io(dir, e))?;
            let path = entry.path();
            let metadata = match entry.metadata() {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(e) => return Err(Error::io(&path, e)),
            };

            if let Err(reason) = self.filter.should_process(&path, metadata.len()) {
                debug!(file_path = %path.display(), reason = %reason, "Skipping file");
                continue;
            }
            files.push(path);
        }

        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }

    async fn process_files(&self, files: Vec<PathBuf>) -> Result<(Vec<DocumentChunk>, BatchResult)> {
        let mut tally = Tally::new(files.len());
        let mut all_chunks = Vec::new();

        info!(total_files = tally.total_files, "Starting batch processing");

        let mut results = Box::pin(self.file_results(files));
        while let Some((path, outcome)) = results.next().await {
            match outcome {
                Ok(chunks) => {
                    tally.processed_files += 1;
                    tally.total_chunks += chunks.len();
                    all_chunks.extend(chunks);
                }
                Err(e) => self.record_failure(&mut tally, path, e)?,
            }
        }

        Ok((all_chunks, self.finish(tally)))
    }

    /// Per-file outcomes in input order, at most `concurrency` in flight.
    fn file_results(
        &self,
        files: Vec<PathBuf>,
    ) -> impl Stream<Item = (PathBuf, Result<Vec<DocumentChunk>>)> + '_ {
        stream::iter(files)
            .map(move |path| {
                let registry = Arc::clone(&self.registry);
                let options = self.config.options.clone();
                let convert = self.config.convert_legacy_word;
                async move {
                    let worker_path = path.clone();
                    let outcome = tokio::task::spawn_blocking(move || {
                        process_file(&registry, &worker_path, &options, convert)
                    })
                    .await
                    .unwrap_or_else(|e| {
                        Err(Error::extraction("BatchProcessor", &path, format!("worker task failed: {e}")))
                    });
                    (path, outcome)
                }
            })
            .buffered(self.config.concurrency.max(1))
    }

    fn record_failure(&self, tally: &mut Tally, path: PathBuf, error: Error) -> Result<()> {
        if !self.config.continue_on_error {
            return Err(error);
        }
        warn!(
            file_path = %path.display(),
            error_type = error.error_type(),
            error = %error,
            "Failed to process file"
        );
        tally.failures.push(FileFailure::new(path, &error));
        Ok(())
    }

    fn finish(&self, tally: Tally) -> BatchResult {
        let result = tally.finish();

        if result.processed_files == 0 {
            let supported: Vec<String> = self
                .registry
                .descriptions()
                .into_iter()
                .map(|(name, description)| format!("{name}: {description}"))
                .collect();
            info!(supported = ?supported, "No documents were processed");
        }

        info!(
            processed = result.processed_files,
            failed = result.failed_files,
            chunks = result.total_chunks,
            "Batch processing complete"
        );
        result
    }
}

/// Process one file, converting legacy Word documents first when enabled.
fn process_file(
    registry: &ProcessorRegistry,
    path: &Path,
    options: &ProcessOptions,
    convert_legacy_word: bool,
) -> Result<Vec<DocumentChunk>> {
    if !(convert_legacy_word && extension_of(path) == ".doc") {
        return registry.process(path, options);
    }

    let scratch = tempfile::Builder::new()
        .prefix("rag-store-doc-")
        .tempdir()
        .map_err(|e| Error::io(path, e))?;
    let converted = LegacyDocConverter::new().convert(path, scratch.path())?;
    let mut chunks = registry.process(&converted, options)?;

    let original = Value::from(path.to_string_lossy().into_owned());
    for chunk in &mut chunks {
        chunk.metadata.insert(keys::FILE_PATH.to_string(), original.clone());
        chunk.metadata.insert(keys::CONVERTED_FROM.to_string(), original.clone());
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    use crate::observability::RecordingObserver;

    fn batch(config: BatchConfig) -> BatchProcessor {
        let ingest = IngestConfig {
            ocr_enabled: false,
            ..IngestConfig::default()
        };
        let registry = ProcessorRegistry::with_defaults(&ingest, Arc::new(RecordingObserver::new())).unwrap();
        BatchProcessor::new(Arc::new(registry), config)
    }

    fn write(dir: &Path, name: &str, body: &[u8]) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    #[tokio::test]
    async fn test_directory_records_unsupported_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.txt", b"Second file.");
        write(dir.path(), "a.txt", b"First file.");
        write(dir.path(), "c.xyz", b"mystery");
        write(dir.path(), ".hidden.txt", b"skipped");
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        write(&dir.path().join("nested"), "deep.txt", b"not visited");

        let (chunks, result) = batch(BatchConfig::default())
            .process_directory(dir.path())
            .await
            .unwrap();

        let sources: Vec<&str> = chunks.iter().filter_map(|c| c.source()).collect();
        assert_eq!(sources, vec!["a.txt", "b.txt"]);
        assert_eq!(result.total_files, 3);
        assert_eq!(result.processed_files, 2);
        assert_eq!(result.failed_files, 1);
        assert_eq!(result.total_chunks, 2);
        assert_eq!(result.failures[0].error_type, "unsupported_format");
        assert!(result.failures[0].path.ends_with("c.xyz"));
    }

    #[tokio::test]
    async fn test_failure_records_format_tag() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "broken.pdf", b"not a pdf at all");
        write(dir.path(), "fine.txt", b"Still processed.");

        let (chunks, result) = batch(BatchConfig::default())
            .process_directory(dir.path())
            .await
            .unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(result.failed_files, 1);
        assert_eq!(result.failures[0].error_type, "pdf_processing_error");
        assert!(result.failures[0].path.ends_with("broken.pdf"));
    }

    #[tokio::test]
    async fn test_stop_on_first_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.xyz", b"mystery");
        write(dir.path(), "b.txt", b"never reached");

        let config = BatchConfig {
            continue_on_error: false,
            ..BatchConfig::default()
        };
        let err = batch(config).process_directory(dir.path()).await.unwrap_err();
        assert_eq!(err.error_type(), "unsupported_format");
    }

    #[tokio::test]
    async fn test_single_file_path() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "solo.md", b"# Title\n\nBody.");

        let (chunks, result) = batch(BatchConfig::default())
            .process_path(&dir.path().join("solo.md"))
            .await
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(result.total_files, 1);

        let missing = batch(BatchConfig::default())
            .process_path(&dir.path().join("gone.txt"))
            .await
            .unwrap_err();
        assert_eq!(missing.error_type(), "file_not_found");
    }

    #[tokio::test]
    async fn test_streaming_sends_per_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "one.txt", b"One.");
        write(dir.path(), "two.txt", b"Two.");

        let (tx, mut rx) = mpsc::channel(8);
        let result = batch(BatchConfig::default())
            .process_directory_streaming(dir.path(), tx)
            .await
            .unwrap();

        let mut received = Vec::new();
        while let Some(chunks) = rx.recv().await {
            received.push(chunks[0].content.clone());
        }
        assert_eq!(received, vec!["One.".to_string(), "Two.".to_string()]);
        assert_eq!(result.processed_files, 2);
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let (chunks, result) =
            tokio_test::block_on(batch(BatchConfig::default()).process_directory(dir.path())).unwrap();
        assert!(chunks.is_empty());
        assert_eq!(result.total_files, 0);
        assert!(result.completed_at >= result.started_at);
    }

    #[test]
    fn test_config_from_ingest_config() {
        let ingest = IngestConfig {
            concurrency: 0,
            chunk_size: Some(500),
            convert_legacy_word: true,
            ..IngestConfig::default()
        };
        let config = BatchConfig::from_config(&ingest);
        assert_eq!(config.concurrency, 1);
        assert!(config.convert_legacy_word);
        assert_eq!(config.options.chunk_size, Some(500));
    }
}
