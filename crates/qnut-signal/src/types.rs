//! Domain types shared by every pipeline stage.
//!
//! Motion samples and position fixes arrive independently from their
//! respective device sources. A [`Spectrum`] is produced once per full
//! window and never mutated afterwards, so it is reference-counted and
//! cheap to clone into snapshots.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Speed value reported while no usable GPS speed is available.
pub const UNKNOWN_SPEED: f64 = -1.0;

/// Conversion factor from metres per second to kilometres per hour.
pub const MPS_TO_KMH: f64 = 3.6;

/// A raw 3-axis acceleration reading (m/s²).
///
/// Device motion sources may report any component as absent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    /// Acceleration along the device X axis.
    pub x: Option<f64>,
    /// Acceleration along the device Y axis.
    pub y: Option<f64>,
    /// Acceleration along the device Z axis.
    pub z: Option<f64>,
    /// Sample time in milliseconds on the capture clock.
    #[serde(default)]
    pub t_ms: u64,
}

impl MotionSample {
    /// Create a sample with all three axes present.
    pub fn new(x: f64, y: f64, z: f64, t_ms: u64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            z: Some(z),
            t_ms,
        }
    }

    /// Euclidean norm of the acceleration vector.
    ///
    /// Returns `None` when any axis is missing or not finite; a partial
    /// reading is never treated as a zero magnitude.
    #[must_use]
    pub fn magnitude(&self) -> Option<f64> {
        let (x, y, z) = (self.x?, self.y?, self.z?);
        let magnitude = (x * x + y * y + z * z).sqrt();
        magnitude.is_finite().then_some(magnitude)
    }
}

/// A position update from the GPS source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    /// Speed over ground in metres per second, when the fix carries one.
    pub speed_mps: Option<f64>,
    /// Horizontal accuracy radius in metres.
    pub accuracy_m: f64,
    /// Fix time in milliseconds on the capture clock.
    #[serde(default)]
    pub t_ms: u64,
}

/// Latest speed and accuracy, as latched from the most recent fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedReading {
    /// Speed in km/h, or [`UNKNOWN_SPEED`].
    pub speed_kmh: f64,
    /// Horizontal accuracy in metres.
    pub accuracy_m: f64,
    /// Time of the fix this reading came from.
    pub t_ms: u64,
}

impl SpeedReading {
    /// Reading used before any fix has arrived or after the source failed.
    pub fn unknown() -> Self {
        Self {
            speed_kmh: UNKNOWN_SPEED,
            accuracy_m: f64::INFINITY,
            t_ms: 0,
        }
    }

    /// Derive a reading from a raw fix: `max(0, speed * 3.6)` when speed is
    /// present and finite, the unknown sentinel otherwise.
    pub fn from_fix(fix: &PositionFix) -> Self {
        let speed_kmh = match fix.speed_mps {
            Some(mps) if mps.is_finite() => (mps * MPS_TO_KMH).max(0.0),
            _ => UNKNOWN_SPEED,
        };
        Self {
            speed_kmh,
            accuracy_m: fix.accuracy_m,
            t_ms: fix.t_ms,
        }
    }

    /// Whether the speed component is the unknown sentinel.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.speed_kmh < 0.0 || !self.speed_kmh.is_finite()
    }
}

impl Default for SpeedReading {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Magnitude spectrum of one window: one non-negative value per
/// positive-frequency bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Spectrum(Arc<[f64]>);

impl Spectrum {
    /// Wrap a vector of bin magnitudes.
    pub fn new(bins: Vec<f64>) -> Self {
        Self(bins.into())
    }

    /// Bin magnitudes.
    #[must_use]
    pub fn bins(&self) -> &[f64] {
        &self.0
    }
}

impl Deref for Spectrum {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.0
    }
}

impl From<Vec<f64>> for Spectrum {
    fn from(bins: Vec<f64>) -> Self {
        Self::new(bins)
    }
}

/// Half-open speed interval `[lower, lower + width)` in km/h.
///
/// Ordering is by lower bound, which is the canonical identity of a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BucketKey {
    /// Inclusive lower bound (km/h).
    pub lower_kmh: u32,
    /// Bucket width (km/h).
    pub width_kmh: u32,
}

impl BucketKey {
    /// Exclusive upper bound (km/h).
    #[must_use]
    pub fn upper_kmh(&self) -> u32 {
        self.lower_kmh.saturating_add(self.width_kmh)
    }

    /// Whether `speed_kmh` lies inside this bucket.
    #[must_use]
    pub fn contains(&self, speed_kmh: f64) -> bool {
        speed_kmh >= f64::from(self.lower_kmh) && speed_kmh < f64::from(self.upper_kmh())
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.lower_kmh, self.upper_kmh())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn magnitude_is_euclidean_norm() {
        let s = MotionSample::new(3.0, 4.0, 12.0, 0);
        assert_abs_diff_eq!(s.magnitude().unwrap(), 13.0, epsilon = 1e-12);
    }

    #[test]
    fn magnitude_missing_axis_is_none_not_zero() {
        let s = MotionSample {
            x: Some(0.0),
            y: None,
            z: Some(0.0),
            t_ms: 0,
        };
        assert!(s.magnitude().is_none());

        let nan = MotionSample::new(f64::NAN, 0.0, 0.0, 0);
        assert!(nan.magnitude().is_none());
    }

    #[test]
    fn speed_from_fix_converts_and_clamps() {
        let fix = PositionFix {
            speed_mps: Some(10.0),
            accuracy_m: 4.0,
            t_ms: 7,
        };
        let r = SpeedReading::from_fix(&fix);
        assert_abs_diff_eq!(r.speed_kmh, 36.0, epsilon = 1e-12);
        assert_eq!(r.t_ms, 7);

        let backwards = PositionFix {
            speed_mps: Some(-2.0),
            ..fix
        };
        assert_eq!(SpeedReading::from_fix(&backwards).speed_kmh, 0.0);
    }

    #[test]
    fn speed_from_fix_without_speed_is_unknown() {
        let fix = PositionFix {
            speed_mps: None,
            accuracy_m: 4.0,
            t_ms: 0,
        };
        assert!(SpeedReading::from_fix(&fix).is_unknown());

        let nan = PositionFix {
            speed_mps: Some(f64::NAN),
            ..fix
        };
        assert!(SpeedReading::from_fix(&nan).is_unknown());
    }

    #[test]
    fn bucket_key_display_and_contains() {
        let key = BucketKey {
            lower_kmh: 50,
            width_kmh: 5,
        };
        assert_eq!(key.to_string(), "50-55");
        assert!(key.contains(50.0));
        assert!(key.contains(54.999));
        assert!(!key.contains(55.0));
    }

    #[test]
    fn spectrum_clone_shares_storage() {
        let a = Spectrum::new(vec![1.0, 2.0]);
        let b = a.clone();
        assert_eq!(a.bins().as_ptr(), b.bins().as_ptr());
        assert_eq!(b.len(), 2);
    }
}
