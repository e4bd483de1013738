//! Speed-bucketed, capacity-bounded spectrum store.
//!
//! Spectra are grouped by the speed bucket they were recorded in. Each
//! bucket keeps at most `capacity` spectra, ranked by a quality proxy: the
//! summed magnitude of the leading (DC / near-DC) bins, lower is better.
//! After every insert the bucket is re-ranked and the worst entries are
//! evicted.
//!
//! The map sits behind a single [`RwLock`]; an insert holds the write
//! lock for the whole append/rank/trim step, so a concurrent
//! [`BucketStore::snapshot`] never observes a bucket mid-resort.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{BucketKey, Spectrum};

/// Ranking heuristic for retained spectra.
///
/// Higher DC energy is taken as a sign of constant-acceleration
/// contamination rather than wheel vibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityProxy {
    /// Number of leading bins summed into the score.
    pub bins: usize,
}

impl QualityProxy {
    /// Score a spectrum; lower ranks better. Non-finite scores rank last.
    #[must_use]
    pub fn score(&self, spectrum: &[f64]) -> f64 {
        let score: f64 = spectrum.iter().take(self.bins.max(1)).sum();
        if score.is_nan() {
            f64::INFINITY
        } else {
            score
        }
    }
}

impl Default for QualityProxy {
    fn default() -> Self {
        Self { bins: 2 }
    }
}

#[derive(Debug, Clone)]
struct Ranked {
    score: f64,
    spectrum: Spectrum,
}

/// What happened to a spectrum handed to [`BucketStore::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOutcome {
    /// Bucket the spectrum went into.
    pub key: BucketKey,
    /// Position of the new spectrum after ranking, or `None` if it was
    /// evicted straight away.
    pub rank: Option<usize>,
    /// Number of spectra evicted by this insert.
    pub evicted: usize,
    /// Bucket size after the insert.
    pub len: usize,
}

/// Read-only copy of the store contents, buckets in ascending speed order
/// and spectra in rank order.
pub type BucketSnapshot = BTreeMap<BucketKey, Vec<Spectrum>>;

/// Bounded, ranked spectrum retention per speed bucket.
#[derive(Debug)]
pub struct BucketStore {
    buckets: RwLock<BTreeMap<BucketKey, Vec<Ranked>>>,
    width_kmh: u32,
    capacity: usize,
    proxy: QualityProxy,
}

impl BucketStore {
    /// Create an empty store.
    ///
    /// `width_kmh` and `capacity` are raised to at least 1.
    #[must_use]
    pub fn new(width_kmh: u32, capacity: usize, proxy: QualityProxy) -> Self {
        Self {
            buckets: RwLock::new(BTreeMap::new()),
            width_kmh: width_kmh.max(1),
            capacity: capacity.max(1),
            proxy,
        }
    }

    /// Bucket containing `speed_kmh`: lower bound `floor(speed / width) * width`.
    ///
    /// Negative and NaN speeds fall into the first bucket; the gate never
    /// lets them through.
    #[must_use]
    pub fn classify(&self, speed_kmh: f64) -> BucketKey {
        let width = self.width_kmh;
        // Float-to-int `as` saturates, so absurd speeds land in the top bucket.
        let speed = speed_kmh.max(0.0);
        let mut index = ((speed / f64::from(width)).floor() as u32).min(u32::MAX / width - 1);
        // The quotient can round up to the next integer just below a boundary.
        if index > 0 && f64::from(index * width) > speed {
            index -= 1;
        }
        BucketKey {
            lower_kmh: index * width,
            width_kmh: width,
        }
    }

    /// Insert a spectrum into `key`, re-rank the bucket and trim it to
    /// capacity.
    pub fn insert(&self, key: BucketKey, spectrum: Spectrum) -> InsertOutcome {
        let score = self.proxy.score(&spectrum);
        let mut buckets = self.buckets.write();
        let bucket = buckets.entry(key).or_default();

        // Stable: among equal scores the earlier arrival keeps its place.
        let rank = bucket.partition_point(|r| r.score.total_cmp(&score).is_le());
        bucket.insert(rank, Ranked { score, spectrum });

        let evicted = bucket.len().saturating_sub(self.capacity);
        bucket.truncate(self.capacity);

        let outcome = InsertOutcome {
            key,
            rank: (rank < self.capacity).then_some(rank),
            evicted,
            len: bucket.len(),
        };
        if evicted > 0 {
            tracing::debug!(bucket = %key, evicted, "bucket at capacity, evicted worst spectra");
        }
        outcome
    }

    /// Classify `speed_kmh` and insert.
    pub fn insert_at_speed(&self, speed_kmh: f64, spectrum: Spectrum) -> InsertOutcome {
        self.insert(self.classify(speed_kmh), spectrum)
    }

    /// Consistent copy of every occupied bucket.
    #[must_use]
    pub fn snapshot(&self) -> BucketSnapshot {
        self.buckets
            .read()
            .iter()
            .map(|(key, ranked)| {
                (
                    *key,
                    ranked.iter().map(|r| r.spectrum.clone()).collect(),
                )
            })
            .collect()
    }

    /// Quality scores of one bucket in rank order.
    #[must_use]
    pub fn scores(&self, key: &BucketKey) -> Vec<f64> {
        self.buckets
            .read()
            .get(key)
            .map(|b| b.iter().map(|r| r.score).collect())
            .unwrap_or_default()
    }

    /// Drop all buckets.
    pub fn clear(&self) {
        self.buckets.write().clear();
    }

    /// Number of occupied buckets.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.read().len()
    }

    /// Total spectra across all buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.read().values().map(Vec::len).sum()
    }

    /// Whether the store holds no spectra.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.read().is_empty()
    }

    /// Retained spectra per bucket.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bucket width in km/h.
    #[must_use]
    pub fn width_kmh(&self) -> u32 {
        self.width_kmh
    }
}
