//! Directory entry filtering for the batch driver.
//!
//! Skips files that are never documents in their own right: hidden files,
//! Office lock files (`~$report.docx`), editor backups and anything over the
//! size cap. Unsupported extensions are *not* filtered here; the registry
//! reports those as failures.

use std::collections::HashSet;
use std::path::Path;

/// Configuration for file filtering.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Exact file names to skip (e.g., "Thumbs.db").
    pub excluded_names: HashSet<String>,
    /// Maximum file size in bytes, `None` for no limit.
    pub max_file_size: Option<u64>,
    /// Minimum file size in bytes (default: 0, empty files yield no chunks).
    pub min_file_size: u64,
    /// Whether to include hidden files (starting with .).
    pub include_hidden: bool,
    /// Patterns for temporary files to exclude.
    pub temporary_patterns: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            excluded_names: default_excluded_names(),
            max_file_size: None,
            min_file_size: 0,
            include_hidden: false,
            temporary_patterns: default_temporary_patterns(),
        }
    }
}

fn default_excluded_names() -> HashSet<String> {
    ["Thumbs.db", "desktop.ini", ".DS_Store"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_temporary_patterns() -> Vec<String> {
    [
        // Office owner/lock files
        r"^~\$",
        // Editor backups and swap files
        r"~$",
        r"\.swp$",
        r"\.tmp$",
        r"\.crdownload$",
        r"\.part$",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Decides which directory entries the batch driver dispatches.
pub struct FileFilter {
    config: FilterConfig,
    temporary_regexes: Vec<regex::Regex>,
}

impl FileFilter {
    /// Create a new file filter with the given configuration.
    pub fn new(config: FilterConfig) -> Self {
        let temporary_regexes = config
            .temporary_patterns
            .iter()
            .filter_map(|p| regex::Regex::new(p).ok())
            .collect();

        Self {
            config,
            temporary_regexes,
        }
    }

    /// Create a filter with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(FilterConfig::default())
    }

    /// Check if a file should be processed.
    ///
    /// Returns `Ok(())` if the file should be processed, or `Err(reason)` if it should be skipped.
    pub fn should_process(&self, path: &Path, size: u64) -> Result<(), String> {
        let Some(filename) = path.file_name().map(|n| n.to_string_lossy()) else {
            return Err("Path has no file name".to_string());
        };
        let filename = filename.as_ref();

        if self.config.excluded_names.contains(filename) {
            return Err(format!("Excluded file: {filename}"));
        }

        if !self.config.include_hidden && filename.starts_with('.') {
            return Err("Hidden file".to_string());
        }

        for regex in &self.temporary_regexes {
            if regex.is_match(filename) {
                return Err(format!("Temporary file pattern: {}", regex.as_str()));
            }
        }

        if size < self.config.min_file_size {
            return Err(format!(
                "File too small: {} bytes (min: {})",
                size, self.config.min_file_size
            ));
        }

        if let Some(max) = self.config.max_file_size {
            if size > max {
                return Err(format!("File too large: {size} bytes (max: {max})"));
            }
        }

        Ok(())
    }

    /// Get the configuration.
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }
}

impl Default for FileFilter {
    fn default() -> Self {
        Self::with_defaults()
    }
}
