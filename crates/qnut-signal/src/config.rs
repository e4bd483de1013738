//! Pipeline configuration.
//!
//! [`PipelineConfig`] holds every tunable of the capture pipeline, from the
//! sample gate down to the normalizer. All fields have defaults, so a JSON
//! file only needs to name the values it overrides.
//!
//! # Example
//!
//! ```rust
//! use qnut_signal::config::PipelineConfig;
//!
//! let cfg = PipelineConfig::default();
//! cfg.validate().expect("default config is valid");
//!
//! assert_eq!(cfg.window_size, 128);
//! assert_eq!(cfg.bucket_capacity, 50);
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::aggregate::{AggregationMode, AggregatorConfig};
use crate::normalize::{NormalizationMode, NormalizerConfig};
use crate::window::WindowFunction;

/// Errors produced when loading or validating a [`PipelineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field has an invalid value.
    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Name of the field.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },

    /// A configuration file could not be read or written.
    #[error("Cannot access config file `{path}`: {source}")]
    FileRead {
        /// Path that was being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Construct an [`ConfigError::InvalidValue`].
    pub fn invalid_value(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Complete configuration of a capture pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    // -----------------------------------------------------------------------
    // Gate
    // -----------------------------------------------------------------------
    /// Maximum accepted GPS horizontal accuracy in metres. Default: **15**.
    pub accuracy_threshold_m: f64,

    /// Maximum age of the latched fix, relative to the motion sample, before
    /// speed is treated as unknown. `None` disables the check.
    /// Default: **5000 ms**.
    pub max_fix_age_ms: Option<u64>,

    // -----------------------------------------------------------------------
    // Window / transform
    // -----------------------------------------------------------------------
    /// Samples per window; must be a power of two. Default: **128**.
    pub window_size: usize,

    /// Taper applied to each full window. Default: **Hann**.
    pub window_fn: WindowFunction,

    // -----------------------------------------------------------------------
    // Store
    // -----------------------------------------------------------------------
    /// Speed bucket width in km/h. Default: **5**.
    pub bucket_width_kmh: u32,

    /// Spectra retained per bucket ("measurements per row"). Default: **50**.
    pub bucket_capacity: usize,

    /// Number of leading bins summed into the ranking quality proxy.
    /// Default: **2** (DC and first near-DC bin).
    pub quality_bins: usize,

    // -----------------------------------------------------------------------
    // Aggregation / normalization
    // -----------------------------------------------------------------------
    /// Per-bin representative value. Default: **mean**.
    pub aggregation: AggregationMode,

    /// Scale the mean by bucket confidence. Default: **false**.
    pub weight_by_confidence: bool,

    /// Normalization strategy. Default: **global**.
    pub normalization: NormalizationMode,

    /// Fraction of the lowest frequency bins excluded from min/max.
    /// Default: **0.1**.
    pub low_bin_fraction: f64,

    /// Fraction of the lowest-speed buckets excluded from the global
    /// min/max. Default: **0.3**.
    pub low_speed_fraction: f64,

    /// Leading bins that carry confidence instead of magnitude in the
    /// heat map. Default: **2**.
    pub confidence_bins: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            // Gate
            accuracy_threshold_m: 15.0,
            max_fix_age_ms: Some(5_000),
            // Window
            window_size: 128,
            window_fn: WindowFunction::Hann,
            // Store
            bucket_width_kmh: 5,
            bucket_capacity: 50,
            quality_bins: 2,
            // Aggregation / normalization
            aggregation: AggregationMode::Mean,
            weight_by_confidence: false,
            normalization: NormalizationMode::Global,
            low_bin_fraction: 0.1,
            low_speed_fraction: 0.3,
            confidence_bins: 2,
        }
    }
}

impl PipelineConfig {
    /// Load a [`PipelineConfig`] from a JSON file at `path` and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileRead`] if the file cannot be opened and
    /// [`ConfigError::InvalidValue`] if the JSON is malformed or a field is
    /// out of range.
    pub fn from_json(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: PipelineConfig = serde_json::from_str(&contents)
            .map_err(|e| ConfigError::invalid_value("(file)", e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Serialize this configuration to pretty-printed JSON at `path`,
    /// creating parent directories if necessary.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileRead`] if the directory cannot be created or
    /// the file cannot be written.
    pub fn to_json(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::FileRead {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::invalid_value("(serialization)", e.to_string()))?;
        std::fs::write(path, json).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// Number of positive-frequency bins each spectrum carries.
    #[must_use]
    pub fn spectrum_bins(&self) -> usize {
        self.window_size / 2
    }

    /// Aggregator settings derived from this configuration.
    #[must_use]
    pub fn aggregator(&self) -> AggregatorConfig {
        AggregatorConfig {
            mode: self.aggregation,
            weight_by_confidence: self.weight_by_confidence,
            capacity: self.bucket_capacity,
        }
    }

    /// Normalizer settings derived from this configuration.
    #[must_use]
    pub fn normalizer(&self) -> NormalizerConfig {
        NormalizerConfig {
            mode: self.normalization,
            low_bin_fraction: self.low_bin_fraction,
            low_speed_fraction: self.low_speed_fraction,
            confidence_bins: self.confidence_bins,
        }
    }

    /// Validate all fields and return the first problem found.
    ///
    /// # Validated invariants
    ///
    /// - `window_size` is a power of two and at least 4.
    /// - `bucket_width_kmh` and `bucket_capacity` are non-zero.
    /// - `accuracy_threshold_m` is a non-negative number.
    /// - `quality_bins` lies in `[1, window_size / 2]`.
    /// - Both exclusion fractions lie in `[0, 1)`.
    /// - `confidence_bins` does not exceed `window_size / 2`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size < 4 || !self.window_size.is_power_of_two() {
            return Err(ConfigError::invalid_value(
                "window_size",
                format!("must be a power of two >= 4, got {}", self.window_size),
            ));
        }
        if self.bucket_width_kmh == 0 {
            return Err(ConfigError::invalid_value("bucket_width_kmh", "must be > 0"));
        }
        if self.bucket_capacity == 0 {
            return Err(ConfigError::invalid_value("bucket_capacity", "must be > 0"));
        }
        if self.accuracy_threshold_m.is_nan() || self.accuracy_threshold_m < 0.0 {
            return Err(ConfigError::invalid_value(
                "accuracy_threshold_m",
                "must be a non-negative number",
            ));
        }

        let bins = self.spectrum_bins();
        if self.quality_bins == 0 || self.quality_bins > bins {
            return Err(ConfigError::invalid_value(
                "quality_bins",
                format!("must be in [1, {bins}], got {}", self.quality_bins),
            ));
        }
        if self.confidence_bins > bins {
            return Err(ConfigError::invalid_value(
                "confidence_bins",
                format!("must be <= {bins}, got {}", self.confidence_bins),
            ));
        }
        if !(0.0..1.0).contains(&self.low_bin_fraction) {
            return Err(ConfigError::invalid_value(
                "low_bin_fraction",
                format!("must be in [0, 1), got {}", self.low_bin_fraction),
            ));
        }
        if !(0.0..1.0).contains(&self.low_speed_fraction) {
            return Err(ConfigError::invalid_value(
                "low_speed_fraction",
                format!("must be in [0, 1), got {}", self.low_speed_fraction),
            ));
        }

        Ok(())
    }
}
