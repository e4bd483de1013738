//! Per-bucket representative spectra.
//!
//! Each occupied bucket collapses to one spectrum (bin-wise mean or
//! median of its retained spectra) plus a confidence value
//! `min(count / capacity, 1)`. Confidence is a display weight, not a
//! probability.
//!
//! With `weight_by_confidence`, every spectrum is multiplied by the bucket
//! confidence before summing, and the sum is still divided by the raw
//! count. This damps sparse buckets instead of computing a true weighted
//! average.

use serde::{Deserialize, Serialize};

use crate::store::BucketSnapshot;
use crate::types::{BucketKey, Spectrum};

/// Bin-wise reduction across a bucket's spectra.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    /// Arithmetic mean per bin.
    #[default]
    Mean,
    /// Median per bin; even counts average the two central values.
    Median,
}

/// Aggregator settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Reduction mode.
    pub mode: AggregationMode,
    /// Pre-multiply spectra by confidence (mean mode only).
    pub weight_by_confidence: bool,
    /// Bucket capacity used as the confidence denominator.
    pub capacity: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            mode: AggregationMode::Mean,
            weight_by_confidence: false,
            capacity: 50,
        }
    }
}

/// Representative spectrum of one bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedFrame {
    /// Speed bucket.
    pub bucket: BucketKey,
    /// Bin-wise representative magnitudes.
    pub spectrum: Vec<f64>,
    /// `min(count / capacity, 1)`.
    pub confidence: f64,
    /// Spectra that contributed.
    pub count: usize,
}

/// Turns store snapshots into [`AggregatedFrame`]s.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    config: AggregatorConfig,
}

impl Aggregator {
    /// Create an aggregator.
    #[must_use]
    pub fn new(config: AggregatorConfig) -> Self {
        Self { config }
    }

    /// Confidence for a bucket holding `count` spectra.
    #[must_use]
    pub fn confidence(&self, count: usize) -> f64 {
        let capacity = self.config.capacity.max(1);
        (count as f64 / capacity as f64).min(1.0)
    }

    /// One frame per occupied bucket, in ascending speed order.
    pub fn aggregate(&self, snapshot: &BucketSnapshot) -> Vec<AggregatedFrame> {
        snapshot
            .iter()
            .filter(|(_, spectra)| !spectra.is_empty())
            .map(|(key, spectra)| self.aggregate_bucket(*key, spectra))
            .collect()
    }

    /// Aggregate a single bucket's spectra.
    ///
    /// Spectra of differing lengths are reduced over the shortest one.
    pub fn aggregate_bucket(&self, bucket: BucketKey, spectra: &[Spectrum]) -> AggregatedFrame {
        let count = spectra.len();
        let confidence = self.confidence(count);
        let bins = spectra.iter().map(|s| s.len()).min().unwrap_or(0);

        let spectrum = match self.config.mode {
            AggregationMode::Mean => {
                let weight = if self.config.weight_by_confidence {
                    confidence
                } else {
                    1.0
                };
                mean_bins(spectra, bins, weight)
            }
            AggregationMode::Median => median_bins(spectra, bins),
        };

        AggregatedFrame {
            bucket,
            spectrum,
            confidence,
            count,
        }
    }
}

fn mean_bins(spectra: &[Spectrum], bins: usize, weight: f64) -> Vec<f64> {
    let count = spectra.len() as f64;
    let mut acc = vec![0.0; bins];
    for spectrum in spectra {
        for (a, v) in acc.iter_mut().zip(spectrum.iter()) {
            *a += v * weight;
        }
    }
    acc.iter_mut().for_each(|a| *a /= count);
    acc
}

fn median_bins(spectra: &[Spectrum], bins: usize) -> Vec<f64> {
    let mut column = Vec::with_capacity(spectra.len());
    (0..bins)
        .map(|bin| {
            column.clear();
            column.extend(spectra.iter().map(|s| s[bin]));
            median(&mut column)
        })
        .collect()
}

/// Median of `values`; reorders the slice. Empty input yields 0.
fn median(values: &mut [f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}
