//! Fixed-size sample window with taper.
//!
//! Magnitudes accumulate in arrival order. When the buffer reaches its
//! size it is tapered, handed out, and cleared; windows never overlap.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Window function types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowFunction {
    /// Rectangular (no windowing)
    Rectangular,
    /// Hann window (raised cosine)
    #[default]
    Hann,
    /// Hamming window
    Hamming,
    /// Blackman window (lower sidelobe level)
    Blackman,
}

impl WindowFunction {
    /// Coefficients of this window for `size` samples.
    ///
    /// Symmetric form, normalised over `size - 1`.
    #[must_use]
    pub fn coefficients(self, size: usize) -> Vec<f64> {
        if size < 2 {
            return vec![1.0; size];
        }
        let n = (size - 1) as f64;
        match self {
            WindowFunction::Rectangular => vec![1.0; size],
            WindowFunction::Hann => (0..size)
                .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n).cos())
                .collect(),
            WindowFunction::Hamming => (0..size)
                .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / n).cos())
                .collect(),
            WindowFunction::Blackman => (0..size)
                .map(|i| {
                    0.42 - 0.5 * (2.0 * PI * i as f64 / n).cos()
                        + 0.08 * (4.0 * PI * i as f64 / n).cos()
                })
                .collect(),
        }
    }
}

/// Accumulates magnitudes into fixed, non-overlapping windows.
#[derive(Debug, Clone)]
pub struct WindowedBuffer {
    samples: Vec<f64>,
    coefficients: Vec<f64>,
    size: usize,
}

impl WindowedBuffer {
    /// Create a buffer emitting windows of `size` samples tapered by
    /// `window_fn`.
    #[must_use]
    pub fn new(size: usize, window_fn: WindowFunction) -> Self {
        Self {
            samples: Vec::with_capacity(size),
            coefficients: window_fn.coefficients(size),
            size,
        }
    }

    /// Append one magnitude.
    ///
    /// Returns the tapered window when this sample completes it; the buffer
    /// is empty again afterwards.
    pub fn push(&mut self, magnitude: f64) -> Option<Vec<f64>> {
        self.samples.push(magnitude);
        if self.samples.len() < self.size {
            return None;
        }
        let windowed = self
            .samples
            .iter()
            .zip(&self.coefficients)
            .map(|(&s, &w)| s * w)
            .collect();
        self.samples.clear();
        Some(windowed)
    }

    /// Drop any partially accumulated samples.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Number of samples currently accumulated.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no samples are accumulated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Window length.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }
}
