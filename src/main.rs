//! RAG Store Ingestion - Main Entry Point
//!
//! Processes a file or directory and writes one JSON chunk per line to stdout.

use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use rag_store::observability::{init_tracing, FanoutObserver, MetricsObserver, TracingObserver};
use rag_store::{BatchConfig, BatchProcessor, IngestConfig, ProcessorRegistry};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = IngestConfig::load().context("failed to load configuration")?;

    init_tracing(config.log_format);

    info!("Starting rag-store v{}", env!("CARGO_PKG_VERSION"));

    let target = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| config.source_dir.clone());
    info!(path = %target.display(), ocr_enabled = config.ocr_enabled, "Ingesting documents");

    // Initialize components
    let metrics = Arc::new(MetricsObserver::new().context("failed to register metrics")?);
    let observer = Arc::new(
        FanoutObserver::new()
            .with(Arc::new(TracingObserver))
            .with(metrics.clone()),
    );
    let registry = ProcessorRegistry::with_defaults(&config, observer)?;
    let batch = BatchProcessor::new(Arc::new(registry), BatchConfig::from_config(&config));

    let (chunks, result) = batch
        .process_path(&target)
        .await
        .with_context(|| format!("failed to process {}", target.display()))?;

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for chunk in &chunks {
        serde_json::to_writer(&mut out, chunk)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;

    info!(
        total_files = result.total_files,
        processed = result.processed_files,
        failed = result.failed_files,
        chunks = result.total_chunks,
        "Ingestion complete"
    );
    for failure in &result.failures {
        info!(
            file_path = %failure.path.display(),
            error_type = %failure.error_type,
            message = %failure.message,
            "File failed"
        );
    }
    info!(metrics = %serde_json::to_string(&metrics.snapshot())?, "Processing metrics");

    Ok(())
}
