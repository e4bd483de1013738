//! Scaling aggregated frames into a `[0, 1]` heat map.
//!
//! Two modes:
//!
//! - **Global**: one min/max over all frames, leaving out the lowest-speed
//!   buckets (`low_speed_fraction`) and the lowest frequency bins
//!   (`low_bin_fraction`). Every row shares that range, so rows are
//!   comparable in absolute terms and the result is not scale-invariant per
//!   row.
//! - **Per-bucket**: each row uses its own min/max over the same bin range.
//!
//! A zero-width range is replaced by 1, which maps every value to 0.
//! The first `confidence_bins` cells of each row carry the bucket
//! confidence instead of a magnitude.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::aggregate::AggregatedFrame;
use crate::types::BucketKey;

/// Normalization strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationMode {
    /// Shared min/max across frames.
    #[default]
    Global,
    /// Independent min/max per frame.
    PerBucket,
}

/// Normalizer settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Strategy.
    pub mode: NormalizationMode,
    /// Fraction of low-index bins left out of min/max.
    pub low_bin_fraction: f64,
    /// Fraction of lowest-speed frames left out of the global min/max.
    pub low_speed_fraction: f64,
    /// Leading bins replaced by confidence.
    pub confidence_bins: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            mode: NormalizationMode::Global,
            low_bin_fraction: 0.1,
            low_speed_fraction: 0.3,
            confidence_bins: 2,
        }
    }
}

/// Min/max pair used to scale values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    /// Smallest value considered.
    pub min: f64,
    /// Largest value considered.
    pub max: f64,
}

impl ValueRange {
    /// Range over `values`, ignoring NaN. `None` if nothing remains.
    fn over<'a>(values: impl IntoIterator<Item = &'a f64>) -> Option<Self> {
        values
            .into_iter()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, &v| match acc {
                None => Some(Self { min: v, max: v }),
                Some(r) => Some(Self {
                    min: r.min.min(v),
                    max: r.max.max(v),
                }),
            })
    }

    /// Scale `value` into `[0, 1]`. A zero-width range scales by 1.
    #[must_use]
    pub fn scale(&self, value: f64) -> f64 {
        let range = self.max - self.min;
        let range = if range == 0.0 {
            1.0
        } else {
            range.max(f64::EPSILON)
        };
        let norm = (value - self.min) / range;
        if norm.is_nan() {
            0.0
        } else {
            norm.clamp(0.0, 1.0)
        }
    }
}

impl Default for ValueRange {
    fn default() -> Self {
        Self { min: 0.0, max: 0.0 }
    }
}

/// One rendered speed bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatMapRow {
    /// Speed bucket.
    pub bucket: BucketKey,
    /// Bucket confidence in `[0, 1]`.
    pub confidence: f64,
    /// Spectra behind this row.
    pub count: usize,
    /// Per-bin values in `[0, 1]`; leading cells hold confidence.
    pub values: Vec<f64>,
}

/// Normalized speed-by-frequency matrix, rows in ascending speed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HeatMap {
    /// Strategy that produced the map.
    pub mode: NormalizationMode,
    /// Shared range in global mode.
    pub global_range: Option<ValueRange>,
    /// Leading cells per row carrying confidence.
    pub confidence_bins: usize,
    /// Rows.
    pub rows: Vec<HeatMapRow>,
}

impl HeatMap {
    /// Whether there is nothing to draw.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Bins per row (the shortest row wins).
    #[must_use]
    pub fn bins(&self) -> usize {
        self.rows.iter().map(|r| r.values.len()).min().unwrap_or(0)
    }

    /// Matrix view: rows = buckets, columns = bins.
    #[must_use]
    pub fn to_array(&self) -> Array2<f64> {
        let bins = self.bins();
        Array2::from_shape_fn((self.rows.len(), bins), |(r, c)| self.rows[r].values[c])
    }
}

/// Produces [`HeatMap`]s from aggregated frames.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    /// Create a normalizer.
    #[must_use]
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// Bins at the low end of a `bins`-long spectrum left out of min/max.
    #[must_use]
    pub fn skipped_bins(&self, bins: usize) -> usize {
        (bins as f64 * self.config.low_bin_fraction).floor() as usize
    }

    /// Lowest-speed frames left out of the global min/max.
    #[must_use]
    pub fn skipped_frames(&self, frames: usize) -> usize {
        let skip = (frames as f64 * self.config.low_speed_fraction).floor() as usize;
        skip.min(frames.saturating_sub(1))
    }

    /// Normalize `frames` into a heat map. Empty input gives an empty map.
    pub fn normalize(&self, frames: &[AggregatedFrame]) -> HeatMap {
        let mut ordered: Vec<&AggregatedFrame> = frames.iter().collect();
        ordered.sort_by_key(|f| f.bucket);

        let global_range = match self.config.mode {
            NormalizationMode::Global => Some(self.global_range(&ordered)),
            NormalizationMode::PerBucket => None,
        };

        let rows = ordered
            .iter()
            .map(|frame| {
                let range = global_range.unwrap_or_else(|| self.frame_range(frame));
                self.row(frame, &range)
            })
            .collect();

        HeatMap {
            mode: self.config.mode,
            global_range,
            confidence_bins: self.config.confidence_bins,
            rows,
        }
    }

    fn global_range(&self, ordered: &[&AggregatedFrame]) -> ValueRange {
        let skip_frames = self.skipped_frames(ordered.len());
        let values = ordered.iter().skip(skip_frames).flat_map(|frame| {
            let skip = self.skipped_bins(frame.spectrum.len());
            frame.spectrum.iter().skip(skip)
        });
        ValueRange::over(values).unwrap_or_default()
    }

    fn frame_range(&self, frame: &AggregatedFrame) -> ValueRange {
        let skip = self.skipped_bins(frame.spectrum.len());
        ValueRange::over(frame.spectrum.iter().skip(skip)).unwrap_or_default()
    }

    fn row(&self, frame: &AggregatedFrame, range: &ValueRange) -> HeatMapRow {
        let confidence = frame.confidence.clamp(0.0, 1.0);
        let values = frame
            .spectrum
            .iter()
            .enumerate()
            .map(|(bin, &v)| {
                if bin < self.config.confidence_bins {
                    confidence
                } else {
                    range.scale(v)
                }
            })
            .collect();
        HeatMapRow {
            bucket: frame.bucket,
            confidence,
            count: frame.count,
            values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn frame(lower: u32, spectrum: Vec<f64>, confidence: f64) -> AggregatedFrame {
        AggregatedFrame {
            bucket: BucketKey {
                lower_kmh: lower,
                width_kmh: 5,
            },
            spectrum,
            confidence,
            count: 1,
        }
    }

    fn normalizer(mode: NormalizationMode, bin_frac: f64, speed_frac: f64) -> Normalizer {
        Normalizer::new(NormalizerConfig {
            mode,
            low_bin_fraction: bin_frac,
            low_speed_fraction: speed_frac,
            confidence_bins: 2,
        })
    }

    #[test]
    fn empty_frames_give_empty_map() {
        let map = Normalizer::default().normalize(&[]);
        assert!(map.is_empty());
        assert_eq!(map.to_array().dim(), (0, 0));
    }

    #[test]
    fn leading_bins_carry_confidence() {
        let n = normalizer(NormalizationMode::PerBucket, 0.0, 0.0);
        let map = n.normalize(&[frame(50, vec![100.0, 50.0, 0.0, 10.0], 0.4)]);
        assert_eq!(map.rows[0].values[..2], [0.4, 0.4]);
        assert_abs_diff_eq!(map.rows[0].values[2], 0.0);
        assert_abs_diff_eq!(map.rows[0].values[3], 0.1);
    }

    #[test]
    fn per_bucket_flat_spectrum_normalizes_to_zero() {
        let n = normalizer(NormalizationMode::PerBucket, 0.1, 0.3);
        let map = n.normalize(&[frame(50, vec![3.0; 16], 1.0)]);
        assert!(map.rows[0].values[2..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn global_flat_values_normalize_to_zero() {
        let n = normalizer(NormalizationMode::Global, 0.1, 0.3);
        let map = n.normalize(&[frame(50, vec![7.0; 16], 1.0), frame(55, vec![7.0; 16], 1.0)]);
        assert_eq!(map.global_range, Some(ValueRange { min: 7.0, max: 7.0 }));
        for row in &map.rows {
            assert!(row.values[2..].iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn global_excludes_low_speed_buckets_and_low_bins() {
        // 10 bins -> 1 skipped bin; 4 frames -> 1 skipped frame.
        let n = normalizer(NormalizationMode::Global, 0.1, 0.3);
        let mut slow = vec![0.0; 10];
        slow[5] = 1_000.0;
        let mut hot_dc = vec![1.0; 10];
        hot_dc[0] = 500.0;
        let frames = [
            frame(10, slow, 1.0),
            frame(20, hot_dc, 1.0),
            frame(30, vec![2.0; 10], 1.0),
            frame(40, vec![3.0; 10], 1.0),
        ];
        let map = n.normalize(&frames);
        assert_eq!(map.global_range, Some(ValueRange { min: 1.0, max: 3.0 }));

        // Excluded values still render, clamped to the shared range.
        assert_eq!(map.rows[0].values[5], 1.0);
        assert_eq!(map.rows[0].values[6], 0.0);
        assert_abs_diff_eq!(map.rows[2].values[4], 0.5);
    }

    #[test]
    fn global_is_not_scale_invariant_per_row() {
        let base = vec![0.0, 0.0, 1.0, 2.0, 3.0, 4.0];
        let scaled: Vec<f64> = base.iter().map(|v| v * 2.0).collect();
        let frames = [frame(50, base, 1.0), frame(55, scaled, 1.0)];

        let per = normalizer(NormalizationMode::PerBucket, 0.0, 0.0).normalize(&frames);
        assert_eq!(per.rows[0].values, per.rows[1].values);

        let global = normalizer(NormalizationMode::Global, 0.0, 0.0).normalize(&frames);
        assert_ne!(global.rows[0].values, global.rows[1].values);
    }

    #[test]
    fn rows_sorted_by_speed() {
        let n = Normalizer::default();
        let map = n.normalize(&[frame(60, vec![1.0; 8], 1.0), frame(15, vec![2.0; 8], 1.0)]);
        assert_eq!(map.rows[0].bucket.lower_kmh, 15);
        assert_eq!(map.rows[1].bucket.lower_kmh, 60);
    }

    #[test]
    fn single_frame_is_never_fully_excluded() {
        let n = normalizer(NormalizationMode::Global, 0.0, 0.9);
        assert_eq!(n.skipped_frames(1), 0);
        assert_eq!(n.skipped_frames(10), 9);
    }

    #[test]
    fn values_are_clamped_to_unit_interval() {
        let range = ValueRange { min: 1.0, max: 3.0 };
        assert_eq!(range.scale(-5.0), 0.0);
        assert_eq!(range.scale(10.0), 1.0);
        assert_eq!(range.scale(f64::NAN), 0.0);
        assert_abs_diff_eq!(range.scale(2.0), 0.5);
    }

    #[test]
    fn to_array_shape_matches_rows() {
        let n = Normalizer::default();
        let map = n.normalize(&[frame(0, vec![1.0; 8], 0.5), frame(5, vec![2.0; 8], 0.5)]);
        let arr = map.to_array();
        assert_eq!(arr.dim(), (2, 8));
        assert_eq!(arr[[0, 0]], 0.5);
    }
}
