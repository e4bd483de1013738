//! Sample gating by motion completeness and GPS quality.
//!
//! Every motion sample is checked against the most recently latched speed
//! reading before it may enter a window. Samples without all three axes,
//! samples taken while speed is unknown or stale, and samples taken under a
//! poor GPS fix are discarded. A discard also resets the in-flight window
//! (the session does that), so a window never spans a gap.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::types::{MotionSample, PositionFix, SpeedReading};

/// Why a sample was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    /// At least one acceleration axis was absent.
    MissingAxis,
    /// No speed available from the latest fix.
    UnknownSpeed,
    /// The latest fix is older than the configured maximum age.
    StaleFix,
    /// Horizontal accuracy worse than the threshold.
    PoorAccuracy,
}

/// Gate verdict for one motion sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateDecision {
    /// Sample usable; carries its magnitude and the speed it was taken at.
    Accept {
        /// Euclidean norm of the acceleration vector.
        magnitude: f64,
        /// Speed latched when the sample arrived (km/h).
        speed_kmh: f64,
    },
    /// Sample unusable.
    Discard(DiscardReason),
}

impl GateDecision {
    /// Returns true if the sample was accepted.
    #[must_use]
    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept { .. })
    }
}

/// Stateless accept/discard decision for motion samples.
#[derive(Debug, Clone)]
pub struct SampleGate {
    accuracy_threshold_m: f64,
    max_fix_age_ms: Option<u64>,
}

impl SampleGate {
    /// Create a gate.
    ///
    /// - `accuracy_threshold_m`: fixes with a larger accuracy radius are
    ///   rejected.
    /// - `max_fix_age_ms`: fixes older than this relative to the sample are
    ///   treated as speed-less. `None` disables the age check.
    #[must_use]
    pub fn new(accuracy_threshold_m: f64, max_fix_age_ms: Option<u64>) -> Self {
        Self {
            accuracy_threshold_m,
            max_fix_age_ms,
        }
    }

    /// Decide whether `sample` may enter the window given `speed`.
    ///
    /// Checks run in order: axis completeness, speed availability, fix age,
    /// accuracy.
    pub fn evaluate(&self, sample: &MotionSample, speed: &SpeedReading) -> GateDecision {
        let Some(magnitude) = sample.magnitude() else {
            return GateDecision::Discard(DiscardReason::MissingAxis);
        };
        if speed.is_unknown() {
            return GateDecision::Discard(DiscardReason::UnknownSpeed);
        }
        if let Some(max_age) = self.max_fix_age_ms {
            if sample.t_ms.saturating_sub(speed.t_ms) > max_age {
                return GateDecision::Discard(DiscardReason::StaleFix);
            }
        }
        if speed.accuracy_m.is_nan() || speed.accuracy_m > self.accuracy_threshold_m {
            return GateDecision::Discard(DiscardReason::PoorAccuracy);
        }
        GateDecision::Accept {
            magnitude,
            speed_kmh: speed.speed_kmh,
        }
    }

    /// Accuracy threshold in metres.
    #[must_use]
    pub fn accuracy_threshold_m(&self) -> f64 {
        self.accuracy_threshold_m
    }
}

/// Shared latch holding the latest [`SpeedReading`].
///
/// Position fixes arrive on their own schedule; the latch keeps only the
/// newest one. Clones share the same reading.
#[derive(Debug, Clone, Default)]
pub struct SpeedLatch {
    inner: Arc<RwLock<SpeedReading>>,
}

impl SpeedLatch {
    /// Create a latch holding the unknown reading.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the latched reading with one derived from `fix`.
    pub fn update(&self, fix: &PositionFix) -> SpeedReading {
        let reading = SpeedReading::from_fix(fix);
        *self.inner.write() = reading;
        reading
    }

    /// Mark speed as unknown, e.g. after a position-source error.
    pub fn invalidate(&self, t_ms: u64) {
        *self.inner.write() = SpeedReading {
            t_ms,
            ..SpeedReading::unknown()
        };
    }

    /// Latest latched reading.
    #[must_use]
    pub fn latest(&self) -> SpeedReading {
        *self.inner.read()
    }
}
