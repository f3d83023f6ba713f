//! Extension-based processor registry.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::error::{Error, Result};
use crate::observability::{RegistryEvent, SharedObserver};
use crate::processing::word::legacy_doc_hint;
use crate::processing::{DocumentProcessor, MhtProcessor, PdfProcessor, TextProcessor, WordProcessor};
use crate::types::{extension_of, DocumentChunk, IngestConfig, ProcessOptions};

/// Registry that selects the processor for a file by its extension.
///
/// Built once at startup and read-only afterwards. Lookups ignore the case
/// of the extension.
pub struct ProcessorRegistry {
    /// Processors in registration order
    processors: Vec<Arc<dyn DocumentProcessor>>,
    /// Lower-cased extension to owning processor
    extension_map: BTreeMap<String, Arc<dyn DocumentProcessor>>,
    observer: SharedObserver,
}

impl ProcessorRegistry {
    /// Create an empty registry.
    pub fn new(observer: SharedObserver) -> Self {
        Self {
            processors: Vec::new(),
            extension_map: BTreeMap::new(),
            observer,
        }
    }

    /// Registry with the PDF, text, Word and MHT processors, all reporting to
    /// `observer`.
    pub fn with_defaults(config: &IngestConfig, observer: SharedObserver) -> Result<Self> {
        let mut registry = Self::new(observer.clone());
        registry.register(Arc::new(PdfProcessor::from_config(config).with_observer(observer.clone())))?;
        registry.register(Arc::new(TextProcessor::new().with_observer(observer.clone())))?;
        registry.register(Arc::new(WordProcessor::new().with_observer(observer.clone())))?;
        registry.register(Arc::new(MhtProcessor::new().with_observer(observer)))?;
        Ok(registry)
    }

    /// Register a processor under each of its extensions.
    ///
    /// Fails without changing the registry if any extension is taken.
    pub fn register(&mut self, processor: Arc<dyn DocumentProcessor>) -> Result<()> {
        for extension in processor.supported_extensions() {
            if let Some(existing) = self.extension_map.get(&extension.to_lowercase()) {
                return Err(Error::DuplicateExtension {
                    extension: extension.to_string(),
                    existing: existing.name(),
                    incoming: processor.name(),
                });
            }
        }
        self.insert(processor);
        Ok(())
    }

    /// Register a processor, taking over any extension already claimed.
    ///
    /// Processors left without extensions are dropped.
    pub fn replace(&mut self, processor: Arc<dyn DocumentProcessor>) {
        self.insert(processor);
        let owned: Vec<Arc<dyn DocumentProcessor>> = self.extension_map.values().cloned().collect();
        self.processors
            .retain(|p| owned.iter().any(|o| Arc::ptr_eq(o, p)));
    }

    fn insert(&mut self, processor: Arc<dyn DocumentProcessor>) {
        let extensions: Vec<String> = processor
            .supported_extensions()
            .iter()
            .map(|e| e.to_lowercase())
            .collect();
        for extension in &extensions {
            self.extension_map.insert(extension.clone(), Arc::clone(&processor));
        }
        self.processors.push(Arc::clone(&processor));

        self.observer.registry_event(&RegistryEvent::RegisterProcessor {
            processor: processor.name(),
            extensions,
            total_processors: self.processors.len(),
        });
    }

    /// Find the processor for `path`, if any.
    pub fn resolve(&self, path: &Path) -> Option<Arc<dyn DocumentProcessor>> {
        let extension = extension_of(path);

        match self.extension_map.get(&extension) {
            Some(processor) => {
                self.observer.registry_event(&RegistryEvent::ProcessorLookupSuccess {
                    file_path: path.to_path_buf(),
                    processor: processor.name(),
                    extension,
                });
                Some(Arc::clone(processor))
            }
            None => {
                self.observer.registry_event(&RegistryEvent::ProcessorLookupFailed {
                    file_path: path.to_path_buf(),
                    extension,
                    supported: self.extension_map.keys().cloned().collect(),
                });
                None
            }
        }
    }

    /// Process one file with whichever processor owns its extension.
    pub fn process(&self, path: &Path, options: &ProcessOptions) -> Result<Vec<DocumentChunk>> {
        let Some(processor) = self.resolve(path) else {
            let extension = extension_of(path);
            return Err(Error::UnsupportedFormat {
                path: path.to_path_buf(),
                hint: legacy_doc_hint(&extension).map(str::to_string),
                extension,
                supported: self.extension_map.keys().cloned().collect(),
            });
        };

        let started = Instant::now();
        let chunks = processor.process_document(path, options)?;

        self.observer.registry_event(&RegistryEvent::DocumentProcessed {
            file_path: path.to_path_buf(),
            processor: processor.name(),
            chunks_created: chunks.len(),
            processing_time_seconds: started.elapsed().as_secs_f64(),
        });
        debug!(file_path = %path.display(), chunks = chunks.len(), "Registry processed document");

        Ok(chunks)
    }

    /// Every registered extension.
    pub fn supported_extensions(&self) -> BTreeSet<String> {
        self.extension_map.keys().cloned().collect()
    }

    /// Check if some processor handles `path`. Emits no events.
    pub fn is_supported(&self, path: &Path) -> bool {
        self.extension_map.contains_key(&extension_of(path))
    }

    /// Processors in registration order.
    pub fn processors(&self) -> &[Arc<dyn DocumentProcessor>] {
        &self.processors
    }

    /// `(name, description)` of each processor.
    pub fn descriptions(&self) -> Vec<(&'static str, &'static str)> {
        self.processors
            .iter()
            .map(|p| (p.name(), p.file_type_description()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    use crate::observability::RecordingObserver;

    fn registry() -> (ProcessorRegistry, Arc<RecordingObserver>) {
        let observer = Arc::new(RecordingObserver::new());
        let config = IngestConfig {
            ocr_enabled: false,
            ..IngestConfig::default()
        };
        let registry = ProcessorRegistry::with_defaults(&config, observer.clone()).unwrap();
        (registry, observer)
    }

    #[test]
    fn test_default_extensions() {
        let (registry, observer) = registry();
        let extensions: Vec<String> = registry.supported_extensions().into_iter().collect();
        assert_eq!(
            extensions,
            vec![".docx", ".md", ".mht", ".mhtml", ".pdf", ".text", ".txt"]
        );
        assert_eq!(registry.processors().len(), 4);
        assert_eq!(
            observer.registry_operations(),
            vec!["register_processor"; 4]
        );
    }

    #[test]
    fn test_resolve_ignores_case() {
        let (registry, _) = registry();
        let upper = registry.resolve(Path::new("report.PDF")).map(|p| p.name());
        let lower = registry.resolve(Path::new("report.pdf")).map(|p| p.name());
        assert_eq!(upper, Some("PDFProcessor"));
        assert_eq!(upper, lower);
        assert_eq!(
            registry.resolve(Path::new("notes.MD")).map(|p| p.name()),
            Some("TextProcessor")
        );
        assert!(registry.resolve(Path::new("data.xyz")).is_none());
    }

    #[test]
    fn test_duplicate_extension_is_rejected() {
        let (mut registry, _) = registry();
        let err = registry.register(Arc::new(TextProcessor::new())).unwrap_err();
        assert_eq!(err.error_type(), "duplicate_extension");
        assert_eq!(registry.processors().len(), 4);
    }

    #[test]
    fn test_replace_is_last_wins() {
        let (mut registry, _) = registry();
        let replacement: Arc<dyn DocumentProcessor> = Arc::new(TextProcessor::new());
        registry.replace(Arc::clone(&replacement));

        let resolved = registry.resolve(Path::new("notes.txt")).unwrap();
        assert!(Arc::ptr_eq(&resolved, &replacement));
        assert_eq!(registry.processors().len(), 4);
    }

    #[test]
    fn test_unsupported_file_is_reported() {
        let (registry, observer) = registry();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.xyz");
        std::fs::write(&path, b"???").unwrap();

        let err = registry.process(&path, &ProcessOptions::default()).unwrap_err();
        assert_eq!(err.error_type(), "unsupported_format");
        assert!(err.to_string().contains(".pdf"));
        assert_eq!(observer.registry_operations().last(), Some(&"processor_lookup_failed"));
    }

    #[test]
    fn test_legacy_doc_gets_conversion_hint() {
        let (registry, _) = registry();
        let err = registry
            .process(Path::new("old.doc"), &ProcessOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("Convert the file to .docx"));
    }

    #[test]
    fn test_process_emits_document_processed() {
        let (registry, observer) = registry();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Notes.TXT");
        std::fs::write(&path, b"Hello registry.").unwrap();

        let chunks = registry.process(&path, &ProcessOptions::default()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(
            observer.registry_operations()[4..],
            ["processor_lookup_success", "document_processed"]
        );
    }

    #[test]
    fn test_descriptions() {
        let (registry, _) = registry();
        let names: Vec<&str> = registry.descriptions().iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["PDFProcessor", "TextProcessor", "WordProcessor", "MHTProcessor"]);
    }
}
