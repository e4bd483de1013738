//! Window-to-spectrum transform.
//!
//! A tapered window of `N` real samples becomes `N / 2` raw magnitudes
//! `sqrt(re² + im²)`, one per positive-frequency bin starting at DC. No
//! scaling is applied. The Nyquist bin is not part of the output.
//!
//! Two implementations share the [`SpectralTransform`] contract:
//! [`RealFftTransform`] (real-to-complex, skips the redundant half) and
//! [`ComplexFftTransform`] (full complex FFT of the zero-imaginary input).

use num_complex::Complex64;
use realfft::{RealFftPlanner, RealToComplex};
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;
use thiserror::Error;

use crate::types::Spectrum;

/// Errors from spectrum computation.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Transform size must be a power of two >= 2, got {0}")]
    InvalidSize(usize),

    #[error("Input length {actual} does not match transform size {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("FFT backend failed: {0}")]
    Backend(String),
}

/// Forward transform from a tapered window to a magnitude spectrum.
pub trait SpectralTransform: Send + Sync {
    /// Input length `N` this transform was planned for.
    fn size(&self) -> usize;

    /// Compute the `N / 2` bin magnitudes of `windowed`.
    fn transform(&self, windowed: &[f64]) -> Result<Spectrum, TransformError>;

    /// Number of bins in each output spectrum.
    fn bins(&self) -> usize {
        self.size() / 2
    }
}

fn check_size(size: usize) -> Result<(), TransformError> {
    if size < 2 || !size.is_power_of_two() {
        return Err(TransformError::InvalidSize(size));
    }
    Ok(())
}

fn check_input(expected: usize, input: &[f64]) -> Result<(), TransformError> {
    if input.len() != expected {
        return Err(TransformError::LengthMismatch {
            expected,
            actual: input.len(),
        });
    }
    Ok(())
}

/// Real-input FFT exploiting conjugate symmetry.
pub struct RealFftTransform {
    r2c: Arc<dyn RealToComplex<f64>>,
    size: usize,
}

impl RealFftTransform {
    /// Plan a transform for windows of `size` samples.
    pub fn new(size: usize) -> Result<Self, TransformError> {
        check_size(size)?;
        let r2c = RealFftPlanner::<f64>::new().plan_fft_forward(size);
        Ok(Self { r2c, size })
    }
}

impl SpectralTransform for RealFftTransform {
    fn size(&self) -> usize {
        self.size
    }

    fn transform(&self, windowed: &[f64]) -> Result<Spectrum, TransformError> {
        check_input(self.size, windowed)?;

        // realfft uses the input as scratch space.
        let mut input = windowed.to_vec();
        let mut output = self.r2c.make_output_vec();
        self.r2c
            .process(&mut input, &mut output)
            .map_err(|e| TransformError::Backend(e.to_string()))?;

        let bins = output[..self.size / 2].iter().map(|c| c.norm()).collect();
        Ok(Spectrum::new(bins))
    }
}

/// Full complex FFT over the real window.
pub struct ComplexFftTransform {
    fft: Arc<dyn Fft<f64>>,
    size: usize,
}

impl ComplexFftTransform {
    /// Plan a transform for windows of `size` samples.
    pub fn new(size: usize) -> Result<Self, TransformError> {
        check_size(size)?;
        let fft = FftPlanner::new().plan_fft_forward(size);
        Ok(Self { fft, size })
    }
}

impl SpectralTransform for ComplexFftTransform {
    fn size(&self) -> usize {
        self.size
    }

    fn transform(&self, windowed: &[f64]) -> Result<Spectrum, TransformError> {
        check_input(self.size, windowed)?;

        let mut buffer: Vec<Complex64> = windowed.iter().map(|&s| Complex64::new(s, 0.0)).collect();
        self.fft.process(&mut buffer);

        let bins = buffer[..self.size / 2].iter().map(|c| c.norm()).collect();
        Ok(Spectrum::new(bins))
    }
}
