//! Processing events, the observer seam, and tracing setup.
//!
//! Processors and the registry report their lifecycle through a
//! [`ProcessingObserver`]. The default sink logs structured records with
//! `tracing`; [`MetricsObserver`] feeds Prometheus metrics and
//! [`RecordingObserver`] captures events for tests.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use prometheus::proto::MetricType;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::Error;
use crate::types::{LogFormat, SourceFile};

/// Outcome reported when a document finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Success,
    SuccessEmpty,
    Error,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Success => "success",
            ProcessingStatus::SuccessEmpty => "success_empty",
            ProcessingStatus::Error => "error",
        }
    }

    /// `success` for a non-empty result, `success_empty` otherwise.
    pub fn for_chunks(count: usize) -> Self {
        if count == 0 {
            ProcessingStatus::SuccessEmpty
        } else {
            ProcessingStatus::Success
        }
    }
}

/// Context captured when a document starts processing.
#[derive(Debug, Clone)]
pub struct ProcessingContext {
    pub processor: &'static str,
    pub file_path: PathBuf,
    pub file_size: u64,
    pub file_type: String,
    started: Instant,
}

impl ProcessingContext {
    pub fn start(processor: &'static str, source: &SourceFile) -> Self {
        Self {
            processor,
            file_path: source.path.clone(),
            file_size: source.size,
            file_type: source.extension.clone(),
            started: Instant::now(),
        }
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

/// Registry operations worth reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum RegistryEvent {
    RegisterProcessor {
        processor: &'static str,
        extensions: Vec<String>,
        total_processors: usize,
    },
    ProcessorLookupSuccess {
        file_path: PathBuf,
        processor: &'static str,
        extension: String,
    },
    ProcessorLookupFailed {
        file_path: PathBuf,
        extension: String,
        supported: Vec<String>,
    },
    DocumentProcessed {
        file_path: PathBuf,
        processor: &'static str,
        chunks_created: usize,
        processing_time_seconds: f64,
    },
}

impl RegistryEvent {
    pub fn operation(&self) -> &'static str {
        match self {
            RegistryEvent::RegisterProcessor { .. } => "register_processor",
            RegistryEvent::ProcessorLookupSuccess { .. } => "processor_lookup_success",
            RegistryEvent::ProcessorLookupFailed { .. } => "processor_lookup_failed",
            RegistryEvent::DocumentProcessed { .. } => "document_processed",
        }
    }
}

/// Sink for processing lifecycle events.
///
/// All methods default to no-ops so sinks implement only what they need.
pub trait ProcessingObserver: Send + Sync {
    fn processing_started(&self, _ctx: &ProcessingContext) {}

    fn processing_completed(&self, _ctx: &ProcessingContext, _chunks: usize, _status: ProcessingStatus) {}

    fn processing_error(&self, _ctx: &ProcessingContext, _error: &Error, _error_type: &str) {}

    fn registry_event(&self, _event: &RegistryEvent) {}
}

/// Shared handle to an observer.
pub type SharedObserver = Arc<dyn ProcessingObserver>;

/// The default observer: structured `tracing` records.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ProcessingObserver for TracingObserver {
    fn processing_started(&self, ctx: &ProcessingContext) {
        info!(
            processor_name = ctx.processor,
            file_path = %ctx.file_path.display(),
            file_size = ctx.file_size,
            file_type = %ctx.file_type,
            operation = "document_processing",
            "Document processing started"
        );
    }

    fn processing_completed(&self, ctx: &ProcessingContext, chunks: usize, status: ProcessingStatus) {
        info!(
            processor_name = ctx.processor,
            file_path = %ctx.file_path.display(),
            file_type = %ctx.file_type,
            chunks_created = chunks,
            processing_time_seconds = ctx.elapsed_seconds(),
            status = status.as_str(),
            "Document processing completed"
        );
    }

    fn processing_error(&self, ctx: &ProcessingContext, err: &Error, error_type: &str) {
        error!(
            processor_name = ctx.processor,
            file_path = %ctx.file_path.display(),
            error = %err,
            error_type,
            "Document processing failed"
        );
    }

    fn registry_event(&self, event: &RegistryEvent) {
        match event {
            RegistryEvent::RegisterProcessor {
                processor,
                extensions,
                total_processors,
            } => info!(
                operation = event.operation(),
                processor_name = processor,
                supported_extensions = ?extensions,
                total_processors,
                "Registry operation: register_processor"
            ),
            RegistryEvent::ProcessorLookupSuccess {
                file_path,
                processor,
                extension,
            } => info!(
                operation = event.operation(),
                file_path = %file_path.display(),
                processor_name = processor,
                file_extension = %extension,
                "Registry operation: processor_lookup_success"
            ),
            RegistryEvent::ProcessorLookupFailed {
                file_path,
                extension,
                supported,
            } => info!(
                operation = event.operation(),
                file_path = %file_path.display(),
                file_extension = %extension,
                supported_extensions = ?supported,
                "Registry operation: processor_lookup_failed"
            ),
            RegistryEvent::DocumentProcessed {
                file_path,
                processor,
                chunks_created,
                processing_time_seconds,
            } => info!(
                operation = event.operation(),
                file_path = %file_path.display(),
                processor_name = processor,
                chunks_created,
                processing_time_seconds,
                "Registry operation: document_processed"
            ),
        }
    }
}

/// Buckets for `rag_document_processing_duration_seconds`.
const DURATION_BUCKETS: [f64; 8] = [0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0];

/// Buckets for `rag_document_size_bytes`.
const SIZE_BUCKETS: [f64; 6] = [1e3, 1e4, 1e5, 1e6, 1e7, 1e8];

/// Prometheus metrics for document processing.
///
/// Every metric lives in the observer's own [`Registry`], so several
/// observers (one per test, say) never collide.
pub struct MetricsObserver {
    registry: Registry,
    documents_processed_total: IntCounterVec,
    chunks_created_total: IntCounterVec,
    processing_errors_total: IntCounterVec,
    document_processing_duration_seconds: HistogramVec,
    document_size_bytes: HistogramVec,
    active_processors: IntGaugeVec,
}

impl MetricsObserver {
    /// Create the observer with all metrics registered.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let documents_processed_total = IntCounterVec::new(
            Opts::new("rag_documents_processed_total", "Total number of documents processed"),
            &["processor_type", "file_type", "status"],
        )?;
        let chunks_created_total = IntCounterVec::new(
            Opts::new("rag_chunks_created_total", "Total number of chunks created"),
            &["processor_type", "file_type"],
        )?;
        let processing_errors_total = IntCounterVec::new(
            Opts::new("rag_processing_errors_total", "Total number of processing errors"),
            &["processor_type", "error_type"],
        )?;
        let document_processing_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "rag_document_processing_duration_seconds",
                "Time spent processing documents",
            )
            .buckets(DURATION_BUCKETS.to_vec()),
            &["processor_type", "file_type"],
        )?;
        let document_size_bytes = HistogramVec::new(
            HistogramOpts::new("rag_document_size_bytes", "Size of processed documents in bytes")
                .buckets(SIZE_BUCKETS.to_vec()),
            &["processor_type", "file_type"],
        )?;
        let active_processors = IntGaugeVec::new(
            Opts::new("rag_active_processors", "Number of active document processors"),
            &["processor_type"],
        )?;

        registry.register(Box::new(documents_processed_total.clone()))?;
        registry.register(Box::new(chunks_created_total.clone()))?;
        registry.register(Box::new(processing_errors_total.clone()))?;
        registry.register(Box::new(document_processing_duration_seconds.clone()))?;
        registry.register(Box::new(document_size_bytes.clone()))?;
        registry.register(Box::new(active_processors.clone()))?;

        Ok(Self {
            registry,
            documents_processed_total,
            chunks_created_total,
            processing_errors_total,
            document_processing_duration_seconds,
            document_size_bytes,
            active_processors,
        })
    }

    /// The registry holding every metric, for callers that expose it.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Metrics in the Prometheus text exposition format.
    pub fn export_prometheus(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    /// Current values, keyed by metric name and labels.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot::default();

        for family in self.registry.gather() {
            for metric in family.get_metric() {
                let key = series_key(family.get_name(), metric);
                match family.get_field_type() {
                    MetricType::COUNTER => {
                        snapshot.counters.insert(key, metric.get_counter().get_value() as u64);
                    }
                    MetricType::GAUGE => {
                        snapshot.gauges.insert(key, metric.get_gauge().get_value() as i64);
                    }
                    MetricType::HISTOGRAM => {
                        let histogram = metric.get_histogram();
                        snapshot.histograms.insert(
                            key,
                            HistogramSnapshot::new(histogram.get_sample_count(), histogram.get_sample_sum()),
                        );
                    }
                    _ => {}
                }
            }
        }
        snapshot
    }
}

/// `name{label="value",...}` with labels sorted by name.
fn series_key(name: &str, metric: &prometheus::proto::Metric) -> String {
    let mut labels: Vec<(&str, &str)> = metric
        .get_label()
        .iter()
        .map(|pair| (pair.get_name(), pair.get_value()))
        .collect();
    labels.sort_unstable();

    let labels = labels
        .iter()
        .map(|(name, value)| format!("{name}=\"{value}\""))
        .collect::<Vec<_>>()
        .join(",");
    format!("{name}{{{labels}}}")
}

impl ProcessingObserver for MetricsObserver {
    fn processing_started(&self, ctx: &ProcessingContext) {
        self.active_processors.with_label_values(&[ctx.processor]).inc();
    }

    fn processing_completed(&self, ctx: &ProcessingContext, chunks: usize, status: ProcessingStatus) {
        let labels = [ctx.processor, ctx.file_type.as_str()];

        self.documents_processed_total
            .with_label_values(&[ctx.processor, ctx.file_type.as_str(), status.as_str()])
            .inc();
        self.chunks_created_total
            .with_label_values(&labels)
            .inc_by(chunks as u64);
        self.document_processing_duration_seconds
            .with_label_values(&labels)
            .observe(ctx.elapsed_seconds());
        self.document_size_bytes
            .with_label_values(&labels)
            .observe(ctx.file_size as f64);
        self.active_processors.with_label_values(&[ctx.processor]).dec();
    }

    fn processing_error(&self, ctx: &ProcessingContext, _error: &Error, error_type: &str) {
        self.processing_errors_total
            .with_label_values(&[ctx.processor, error_type])
            .inc();
    }
}

/// Point-in-time copy of [`MetricsObserver`], ready for JSON logging.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, u64>,
    pub gauges: BTreeMap<String, i64>,
    pub histograms: BTreeMap<String, HistogramSnapshot>,
}

/// Sample count, sum and mean of one histogram series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub sum: f64,
    pub mean: Option<f64>,
}

impl HistogramSnapshot {
    fn new(count: u64, sum: f64) -> Self {
        Self {
            count,
            sum,
            mean: (count > 0).then(|| sum / count as f64),
        }
    }
}

/// An event captured by [`RecordingObserver`].
#[derive(Debug, Clone, PartialEq)]
pub enum ObservedEvent {
    Started {
        processor: &'static str,
        file_path: PathBuf,
    },
    Completed {
        processor: &'static str,
        chunks: usize,
        status: ProcessingStatus,
    },
    Error {
        processor: &'static str,
        error_type: String,
    },
    Registry(RegistryEvent),
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObservedEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ObservedEvent> {
        self.lock().clone()
    }

    /// Registry operations in the order they happened.
    pub fn registry_operations(&self) -> Vec<&'static str> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                ObservedEvent::Registry(event) => Some(event.operation()),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ObservedEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, event: ObservedEvent) {
        self.lock().push(event);
    }
}

impl ProcessingObserver for RecordingObserver {
    fn processing_started(&self, ctx: &ProcessingContext) {
        self.push(ObservedEvent::Started {
            processor: ctx.processor,
            file_path: ctx.file_path.clone(),
        });
    }

    fn processing_completed(&self, ctx: &ProcessingContext, chunks: usize, status: ProcessingStatus) {
        self.push(ObservedEvent::Completed {
            processor: ctx.processor,
            chunks,
            status,
        });
    }

    fn processing_error(&self, ctx: &ProcessingContext, _error: &Error, error_type: &str) {
        self.push(ObservedEvent::Error {
            processor: ctx.processor,
            error_type: error_type.to_string(),
        });
    }

    fn registry_event(&self, event: &RegistryEvent) {
        self.push(ObservedEvent::Registry(event.clone()));
    }
}

/// Forwards every event to each inner observer in order.
#[derive(Default, Clone)]
pub struct FanoutObserver {
    observers: Vec<SharedObserver>,
}

impl FanoutObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: SharedObserver) -> Self {
        self.observers.push(observer);
        self
    }
}

impl ProcessingObserver for FanoutObserver {
    fn processing_started(&self, ctx: &ProcessingContext) {
        self.observers.iter().for_each(|o| o.processing_started(ctx));
    }

    fn processing_completed(&self, ctx: &ProcessingContext, chunks: usize, status: ProcessingStatus) {
        self.observers
            .iter()
            .for_each(|o| o.processing_completed(ctx, chunks, status));
    }

    fn processing_error(&self, ctx: &ProcessingContext, err: &Error, error_type: &str) {
        self.observers
            .iter()
            .for_each(|o| o.processing_error(ctx, err, error_type));
    }

    fn registry_event(&self, event: &RegistryEvent) {
        self.observers.iter().for_each(|o| o.registry_event(event));
    }
}

/// The observer used when none is injected.
pub fn default_observer() -> SharedObserver {
    Arc::new(TracingObserver)
}

/// Install the global subscriber. Logs go to stderr so stdout stays free
/// for chunk output. Calling this twice is harmless.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rag_store=info"));
    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "Tracing subscriber already installed");
    }
}
