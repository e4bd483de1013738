//! Capture session: the producer path from motion events to the store.
//!
//! A [`CaptureSession`] owns the gate, the window and the transform of one
//! measurement and shares its [`BucketStore`] with any number of
//! [`SpectrogramReader`]s. Motion events drive the pipeline synchronously:
//!
//! ```text
//! motion ─► SampleGate ─► WindowedBuffer ─► SpectralTransform ─► BucketStore
//!              ▲                                                   │
//!   position ─► SpeedLatch                 SpectrogramReader ◄─────┘
//!                                            (aggregate ─► normalize)
//! ```
//!
//! Stopping halts all further mutation but keeps retained spectra; only
//! [`CaptureSession::reset`] clears them.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use crate::aggregate::{AggregatedFrame, Aggregator};
use crate::config::PipelineConfig;
use crate::events::CaptureEvent;
use crate::gate::{DiscardReason, GateDecision, SampleGate, SpeedLatch};
use crate::normalize::{HeatMap, Normalizer};
use crate::spectral::{RealFftTransform, SpectralTransform};
use crate::store::{BucketStore, InsertOutcome, QualityProxy};
use crate::telemetry::{NoopTelemetry, TelemetrySink};
use crate::types::{MotionSample, PositionFix};
use crate::window::WindowedBuffer;
use crate::{Result, SignalError};

/// Measurement kind reported to telemetry.
pub const MEASUREMENT_KIND: &str = "acceleration";

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created, never started.
    Idle,
    /// Accepting motion samples.
    Measuring,
    /// Stopped; data retained.
    Stopped,
}

/// What a single motion sample did to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleOutcome {
    /// Session not measuring; nothing changed.
    Ignored,
    /// Rejected by the gate; the partial window was cleared.
    Discarded(DiscardReason),
    /// Added to the current window.
    Buffered,
    /// Completed a window whose spectrum went into the store.
    Inserted(InsertOutcome),
    /// Completed a window but the transform failed; window dropped.
    TransformFailed,
}

/// Running counters for a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Samples that entered a window.
    pub accepted: u64,
    /// Samples rejected for a missing axis.
    pub missing_axis: u64,
    /// Samples rejected for unknown speed.
    pub unknown_speed: u64,
    /// Samples rejected for a stale fix.
    pub stale_fix: u64,
    /// Samples rejected for poor accuracy.
    pub poor_accuracy: u64,
    /// Partial windows thrown away by a discard.
    pub windows_dropped: u64,
    /// Full windows transformed and inserted.
    pub windows_emitted: u64,
    /// Full windows lost to transform errors.
    pub transform_failures: u64,
    /// Spectra evicted from buckets.
    pub evicted: u64,
}

impl SessionStats {
    /// Total rejected samples.
    #[must_use]
    pub fn discarded(&self) -> u64 {
        self.missing_axis + self.unknown_speed + self.stale_fix + self.poor_accuracy
    }

    fn record_discard(&mut self, reason: DiscardReason) {
        match reason {
            DiscardReason::MissingAxis => self.missing_axis += 1,
            DiscardReason::UnknownSpeed => self.unknown_speed += 1,
            DiscardReason::StaleFix => self.stale_fix += 1,
            DiscardReason::PoorAccuracy => self.poor_accuracy += 1,
        }
    }
}

/// Consumer-side view of a session's store.
///
/// Cheap to clone and safe to use from another thread while the session
/// keeps inserting.
#[derive(Clone)]
pub struct SpectrogramReader {
    store: Arc<BucketStore>,
    aggregator: Aggregator,
    normalizer: Normalizer,
}

impl SpectrogramReader {
    /// Build a reader over `store` using the aggregation and normalization
    /// settings of `config`.
    pub fn new(store: Arc<BucketStore>, config: &PipelineConfig) -> Self {
        Self {
            store,
            aggregator: Aggregator::new(config.aggregator()),
            normalizer: Normalizer::new(config.normalizer()),
        }
    }

    /// Fresh aggregated frames, ascending speed.
    pub fn frames(&self) -> Vec<AggregatedFrame> {
        self.aggregator.aggregate(&self.store.snapshot())
    }

    /// Fresh normalized heat map.
    pub fn render(&self) -> HeatMap {
        self.normalizer.normalize(&self.frames())
    }
}

/// One active measurement.
pub struct CaptureSession {
    config: PipelineConfig,
    gate: SampleGate,
    window: WindowedBuffer,
    transform: Box<dyn SpectralTransform>,
    store: Arc<BucketStore>,
    speed: SpeedLatch,
    telemetry: Arc<dyn TelemetrySink>,
    reader: SpectrogramReader,
    state: SessionState,
    stats: SessionStats,
}

impl CaptureSession {
    /// Create a session using the real-input FFT.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Config`] if `config` does not validate.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let transform = RealFftTransform::new(config.window_size)?;
        Self::with_transform(config, Box::new(transform))
    }

    /// Create a session around a specific transform implementation.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Config`] if `config` does not validate, or
    /// [`SignalError::InvalidConfig`] if the transform was planned for a
    /// different window size.
    pub fn with_transform(
        config: PipelineConfig,
        transform: Box<dyn SpectralTransform>,
    ) -> Result<Self> {
        config.validate()?;
        if transform.size() != config.window_size {
            return Err(SignalError::InvalidConfig(format!(
                "transform size {} does not match window size {}",
                transform.size(),
                config.window_size
            )));
        }

        let store = Arc::new(BucketStore::new(
            config.bucket_width_kmh,
            config.bucket_capacity,
            QualityProxy {
                bins: config.quality_bins,
            },
        ));
        let reader = SpectrogramReader::new(Arc::clone(&store), &config);

        Ok(Self {
            gate: SampleGate::new(config.accuracy_threshold_m, config.max_fix_age_ms),
            window: WindowedBuffer::new(config.window_size, config.window_fn),
            transform,
            store,
            speed: SpeedLatch::new(),
            telemetry: Arc::new(NoopTelemetry),
            reader,
            state: SessionState::Idle,
            stats: SessionStats::default(),
            config,
        })
    }

    /// Report measurement starts to `sink`.
    #[must_use]
    pub fn with_telemetry(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = sink;
        self
    }

    /// Begin accepting motion samples. Starting twice is a no-op.
    pub fn start(&mut self) {
        if self.state == SessionState::Measuring {
            return;
        }
        self.state = SessionState::Measuring;
        info!(
            window = self.config.window_size,
            bucket_width_kmh = self.config.bucket_width_kmh,
            capacity = self.config.bucket_capacity,
            "measurement started"
        );
        if let Err(e) = self.telemetry.measurement_started(MEASUREMENT_KIND) {
            warn!(error = %e, "failed to report measurement start");
        }
    }

    /// Stop accepting motion samples. Retained spectra are kept; the
    /// partial window is dropped. Stopping twice is a no-op.
    pub fn stop(&mut self) {
        if self.state != SessionState::Measuring {
            return;
        }
        self.state = SessionState::Stopped;
        self.window.clear();
        info!(
            buckets = self.store.bucket_count(),
            spectra = self.store.len(),
            "measurement stopped"
        );
    }

    /// Drop all retained spectra, the partial window and the counters.
    pub fn reset(&mut self) {
        self.store.clear();
        self.window.clear();
        self.stats = SessionStats::default();
        info!("measurement data cleared");
    }

    /// Latch a new position fix.
    pub fn on_position(&self, fix: &PositionFix) {
        let reading = self.speed.update(fix);
        trace!(speed_kmh = reading.speed_kmh, accuracy_m = reading.accuracy_m, "position fix");
    }

    /// The position source failed; speed becomes unknown.
    pub fn on_position_lost(&self, t_ms: u64) {
        self.speed.invalidate(t_ms);
        debug!(t_ms, "position source lost");
    }

    /// Run one motion sample through the producer path.
    pub fn on_motion(&mut self, sample: &MotionSample) -> SampleOutcome {
        if self.state != SessionState::Measuring {
            return SampleOutcome::Ignored;
        }

        let (magnitude, speed_kmh) = match self.gate.evaluate(sample, &self.speed.latest()) {
            GateDecision::Accept {
                magnitude,
                speed_kmh,
            } => (magnitude, speed_kmh),
            GateDecision::Discard(reason) => {
                self.stats.record_discard(reason);
                if !self.window.is_empty() {
                    self.stats.windows_dropped += 1;
                }
                self.window.clear();
                trace!(?reason, t_ms = sample.t_ms, "sample discarded");
                return SampleOutcome::Discarded(reason);
            }
        };

        self.stats.accepted += 1;
        let Some(windowed) = self.window.push(magnitude) else {
            return SampleOutcome::Buffered;
        };

        match self.transform.transform(&windowed) {
            Ok(spectrum) => {
                let outcome = self.store.insert_at_speed(speed_kmh, spectrum);
                self.stats.windows_emitted += 1;
                self.stats.evicted += outcome.evicted as u64;
                debug!(
                    bucket = %outcome.key,
                    rank = ?outcome.rank,
                    len = outcome.len,
                    "spectrum stored"
                );
                SampleOutcome::Inserted(outcome)
            }
            Err(e) => {
                self.stats.transform_failures += 1;
                warn!(error = %e, "transform failed, window dropped");
                SampleOutcome::TransformFailed
            }
        }
    }

    /// Dispatch a recorded capture event.
    pub fn handle_event(&mut self, event: &CaptureEvent) -> Option<SampleOutcome> {
        match event {
            CaptureEvent::Motion(sample) => Some(self.on_motion(sample)),
            CaptureEvent::Position(fix) => {
                self.on_position(fix);
                None
            }
            CaptureEvent::PositionLost { t_ms } => {
                self.on_position_lost(*t_ms);
                None
            }
        }
    }

    /// Fresh aggregated frames.
    pub fn frames(&self) -> Vec<AggregatedFrame> {
        self.reader.frames()
    }

    /// Fresh normalized heat map.
    pub fn render(&self) -> HeatMap {
        self.reader.render()
    }

    /// Reader sharing this session's store.
    #[must_use]
    pub fn reader(&self) -> SpectrogramReader {
        self.reader.clone()
    }

    /// Shared store handle.
    #[must_use]
    pub fn store(&self) -> Arc<BucketStore> {
        Arc::clone(&self.store)
    }

    /// Handle for delivering position fixes from another thread.
    #[must_use]
    pub fn speed_latch(&self) -> SpeedLatch {
        self.speed.clone()
    }

    /// Samples accumulated in the current window.
    #[must_use]
    pub fn pending_samples(&self) -> usize {
        self.window.len()
    }

    /// Lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether motion samples are being accepted.
    #[must_use]
    pub fn is_measuring(&self) -> bool {
        self.state == SessionState::Measuring
    }

    /// Counters since creation or the last reset.
    #[must_use]
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}
