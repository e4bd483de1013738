//! qnut Signal Processing Library
//!
//! Turns phone accelerometer vibration into a speed-versus-frequency heat
//! map that helps a driver spot wheel imbalance. Vibration is correlated
//! with GPS speed, so resonances that appear only in certain speed ranges
//! stand out.
//!
//! # Pipeline
//!
//! 1. **Gating** ([`SampleGate`]): rejects partial motion readings and
//!    samples taken without a usable GPS speed; a rejection resets the
//!    current window.
//! 2. **Windowing** ([`WindowedBuffer`]): collects fixed, non-overlapping
//!    windows of acceleration magnitude and applies a Hann taper.
//! 3. **Transform** ([`SpectralTransform`]): real FFT to `N / 2` raw bin
//!    magnitudes.
//! 4. **Retention** ([`BucketStore`]): groups spectra by speed bucket and
//!    keeps the lowest-DC spectra up to a per-bucket capacity.
//! 5. **Aggregation** ([`Aggregator`]): bin-wise mean or median per bucket
//!    with a saturating confidence.
//! 6. **Normalization** ([`Normalizer`]): global or per-bucket min/max
//!    scaling into a `[0, 1]` [`HeatMap`].
//!
//! [`CaptureSession`] wires stages 1-4 to incoming events and exposes the
//! read side through [`SpectrogramReader`].
//!
//! # Example
//!
//! ```rust
//! use qnut_signal::{CaptureSession, MotionSample, PipelineConfig, PositionFix};
//!
//! let mut session = CaptureSession::new(PipelineConfig::default()).unwrap();
//! session.start();
//! session.on_position(&PositionFix { speed_mps: Some(13.9), accuracy_m: 5.0, t_ms: 0 });
//!
//! for i in 0..128 {
//!     session.on_motion(&MotionSample::new(0.0, 0.0, 1.0, i * 16));
//! }
//!
//! let heat_map = session.render();
//! assert_eq!(heat_map.rows.len(), 1);
//! assert_eq!(heat_map.rows[0].bucket.to_string(), "50-55");
//! ```

pub mod aggregate;
pub mod config;
pub mod events;
pub mod gate;
pub mod normalize;
pub mod session;
pub mod spectral;
pub mod store;
pub mod synthetic;
pub mod telemetry;
pub mod types;
pub mod window;

// Re-export main types for convenience
pub use aggregate::{AggregatedFrame, AggregationMode, Aggregator, AggregatorConfig};
pub use config::{ConfigError, PipelineConfig};
pub use events::{read_capture, write_capture, CaptureError, CaptureEvent, CaptureReader};
pub use gate::{DiscardReason, GateDecision, SampleGate, SpeedLatch};
pub use normalize::{
    HeatMap, HeatMapRow, NormalizationMode, Normalizer, NormalizerConfig, ValueRange,
};
pub use session::{CaptureSession, SampleOutcome, SessionState, SessionStats, SpectrogramReader};
pub use spectral::{ComplexFftTransform, RealFftTransform, SpectralTransform, TransformError};
pub use store::{BucketSnapshot, BucketStore, InsertOutcome, QualityProxy};
pub use telemetry::{MeasurementCounter, NoopTelemetry, TelemetryError, TelemetrySink};
pub use types::{BucketKey, MotionSample, PositionFix, SpeedReading, Spectrum, UNKNOWN_SPEED};
pub use window::{WindowFunction, WindowedBuffer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common result type for signal processing operations
pub type Result<T> = std::result::Result<T, SignalError>;

/// Unified error type for signal processing operations
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Transform planning or execution error
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// Capture file error
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::PipelineConfig;
    pub use crate::events::CaptureEvent;
    pub use crate::normalize::{HeatMap, NormalizationMode};
    pub use crate::session::{CaptureSession, SpectrogramReader};
    pub use crate::types::{MotionSample, PositionFix};
    pub use crate::{Result, SignalError};
}
