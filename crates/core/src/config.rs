//! Index configuration via `index.toml`
//!
//! Every key is optional; missing keys take their defaults. Values are
//! validated when the file is loaded and again when an index is opened.

use crate::error::{IndexError, Result};
use crate::numeric::{validate_precision_step, DEFAULT_PRECISION_STEP};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Conventional config file name
pub const CONFIG_FILE_NAME: &str = "index.toml";

/// Dictionary updater tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryConfig {
    /// Maximum time deltas wait before being flushed
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    /// Flush early once this many distinct keys are pending
    #[serde(default = "default_batch_threshold")]
    pub batch_threshold: usize,
    /// How long `close` waits for the final drain
    #[serde(default = "default_close_timeout_ms")]
    pub close_timeout_ms: u64,
}

fn default_flush_interval_ms() -> u64 {
    100
}

fn default_batch_threshold() -> usize {
    1024
}

fn default_close_timeout_ms() -> u64 {
    5000
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: default_flush_interval_ms(),
            batch_threshold: default_batch_threshold(),
            close_timeout_ms: default_close_timeout_ms(),
        }
    }
}

impl DictionaryConfig {
    /// Flush interval as a `Duration`
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// Close timeout as a `Duration`
    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }
}

/// Index configuration loaded from `index.toml`.
///
/// # Example
///
/// ```toml
/// precision_step = 4
/// analysis_workers = 4
///
/// [dictionary]
/// flush_interval_ms = 100
/// batch_threshold = 1024
/// close_timeout_ms = 5000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Bits masked off per numeric precision level
    #[serde(default = "default_precision_step")]
    pub precision_step: u8,
    /// Size of the analysis worker pool
    #[serde(default = "default_analysis_workers")]
    pub analysis_workers: usize,
    /// Dictionary updater settings
    #[serde(default)]
    pub dictionary: DictionaryConfig,
}

fn default_precision_step() -> u8 {
    DEFAULT_PRECISION_STEP
}

fn default_analysis_workers() -> usize {
    4
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            precision_step: default_precision_step(),
            analysis_workers: default_analysis_workers(),
            dictionary: DictionaryConfig::default(),
        }
    }
}

impl IndexConfig {
    /// Check every value is usable
    pub fn validate(&self) -> Result<()> {
        validate_precision_step(self.precision_step)?;
        if self.analysis_workers == 0 {
            return Err(IndexError::Config(
                "analysis_workers must be at least 1".to_string(),
            ));
        }
        if self.dictionary.batch_threshold == 0 {
            return Err(IndexError::Config(
                "dictionary.batch_threshold must be at least 1".to_string(),
            ));
        }
        if self.dictionary.flush_interval_ms == 0 {
            return Err(IndexError::Config(
                "dictionary.flush_interval_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Row index configuration
#
# Bits masked off per numeric/datetime precision level (1..=64).
# 4 produces 16 terms per value.
precision_step = 4

# Number of threads analyzing documents in parallel.
analysis_workers = 4

[dictionary]
# Maximum time (ms) a dictionary delta waits before it is flushed.
flush_interval_ms = 100
# Flush early once this many distinct terms have pending deltas.
batch_threshold = 1024
# How long (ms) closing the index waits for pending deltas.
close_timeout_ms = 5000
"#
    }

    /// Read and parse config from a file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            IndexError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: IndexConfig = toml::from_str(&content).map_err(|e| {
            IndexError::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                IndexError::Config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| IndexError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            IndexError::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
