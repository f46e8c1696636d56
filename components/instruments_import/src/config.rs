//! Configuration for the import pipeline

use serde::{Deserialize, Serialize};
use trace_store::{DEFAULT_PREAMBLE_WORDS, MAX_PREAMBLE_WORDS};

use crate::error::{ImportError, Result};

/// Schema text identifying the time-profile store
pub const TIME_PROFILE_SCHEMA_MARKER: &str = r#"name="time-profile""#;

/// Raw bulkstore timestamps per millisecond
pub const DEFAULT_TIMESTAMP_DIVISOR: f64 = 1_000_000.0;

/// Configuration for one import
///
/// Every field has a default that matches bundles written by current
/// Instruments versions; a JSON document may override any subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Run to convert; `None` picks the first run listed in `form.template`
    run_number: Option<u32>,

    /// Text a store's `schema.xml` must contain to be read as samples
    schema_marker: String,

    /// Number of `u32` words before the bulkstore header
    bulkstore_preamble_words: usize,

    /// Raw timestamp units per millisecond
    timestamp_divisor: f64,

    /// Sampling interval recorded in the profile metadata, in milliseconds
    interval_ms: f64,

    /// Reject bundles not recorded with the CPU core sampler
    require_supported_instrument: bool,
}

impl ImportConfig {
    /// Create a new builder for ImportConfig
    ///
    /// # Example
    ///
    /// ```
    /// use instruments_import::ImportConfig;
    ///
    /// let config = ImportConfig::builder()
    ///     .run_number(2)
    ///     .interval_ms(0.5)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.run_number(), Some(2));
    /// ```
    pub fn builder() -> ImportConfigBuilder {
        ImportConfigBuilder::default()
    }

    /// Parse a JSON configuration; absent fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ImportConfig = serde_json::from_str(json)
            .map_err(|e| ImportError::InvalidConfiguration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if !(self.timestamp_divisor.is_finite() && self.timestamp_divisor > 0.0) {
            return Err(ImportError::InvalidConfiguration(format!(
                "timestamp_divisor must be positive, got {}",
                self.timestamp_divisor
            )));
        }
        if !(self.interval_ms.is_finite() && self.interval_ms > 0.0) {
            return Err(ImportError::InvalidConfiguration(format!(
                "interval_ms must be positive, got {}",
                self.interval_ms
            )));
        }
        if self.bulkstore_preamble_words > MAX_PREAMBLE_WORDS {
            return Err(ImportError::InvalidConfiguration(format!(
                "bulkstore_preamble_words must be at most {}, got {}",
                MAX_PREAMBLE_WORDS, self.bulkstore_preamble_words
            )));
        }
        if self.schema_marker.is_empty() {
            return Err(ImportError::InvalidConfiguration(
                "schema_marker must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn run_number(&self) -> Option<u32> {
        self.run_number
    }

    pub fn schema_marker(&self) -> &str {
        &self.schema_marker
    }

    pub fn bulkstore_preamble_words(&self) -> usize {
        self.bulkstore_preamble_words
    }

    pub fn timestamp_divisor(&self) -> f64 {
        self.timestamp_divisor
    }

    pub fn interval_ms(&self) -> f64 {
        self.interval_ms
    }

    pub fn require_supported_instrument(&self) -> bool {
        self.require_supported_instrument
    }
}

impl Default for ImportConfig {
    /// Default values:
    /// - run_number: first listed run
    /// - schema_marker: `name="time-profile"`
    /// - bulkstore_preamble_words: 4
    /// - timestamp_divisor: 1 000 000
    /// - interval_ms: 1.0
    /// - require_supported_instrument: true
    fn default() -> Self {
        Self {
            run_number: None,
            schema_marker: TIME_PROFILE_SCHEMA_MARKER.to_string(),
            bulkstore_preamble_words: DEFAULT_PREAMBLE_WORDS,
            timestamp_divisor: DEFAULT_TIMESTAMP_DIVISOR,
            interval_ms: 1.0,
            require_supported_instrument: true,
        }
    }
}

/// Builder for ImportConfig
#[derive(Debug, Clone, Default)]
pub struct ImportConfigBuilder {
    run_number: Option<u32>,
    schema_marker: Option<String>,
    bulkstore_preamble_words: Option<usize>,
    timestamp_divisor: Option<f64>,
    interval_ms: Option<f64>,
    require_supported_instrument: Option<bool>,
}

impl ImportConfigBuilder {
    /// Convert this run instead of the first listed one
    pub fn run_number(mut self, run: u32) -> Self {
        self.run_number = Some(run);
        self
    }

    pub fn schema_marker(mut self, marker: impl Into<String>) -> Self {
        self.schema_marker = Some(marker.into());
        self
    }

    pub fn bulkstore_preamble_words(mut self, words: usize) -> Self {
        self.bulkstore_preamble_words = Some(words);
        self
    }

    pub fn timestamp_divisor(mut self, divisor: f64) -> Self {
        self.timestamp_divisor = Some(divisor);
        self
    }

    pub fn interval_ms(mut self, interval: f64) -> Self {
        self.interval_ms = Some(interval);
        self
    }

    pub fn require_supported_instrument(mut self, required: bool) -> Self {
        self.require_supported_instrument = Some(required);
        self
    }

    /// Build the ImportConfig
    ///
    /// Uses default values for any options not explicitly set.
    pub fn build(self) -> Result<ImportConfig> {
        let default = ImportConfig::default();

        let config = ImportConfig {
            run_number: self.run_number.or(default.run_number),
            schema_marker: self.schema_marker.unwrap_or(default.schema_marker),
            bulkstore_preamble_words: self
                .bulkstore_preamble_words
                .unwrap_or(default.bulkstore_preamble_words),
            timestamp_divisor: self.timestamp_divisor.unwrap_or(default.timestamp_divisor),
            interval_ms: self.interval_ms.unwrap_or(default.interval_ms),
            require_supported_instrument: self
                .require_supported_instrument
                .unwrap_or(default.require_supported_instrument),
        };
        config.validate()?;
        Ok(config)
    }
}
