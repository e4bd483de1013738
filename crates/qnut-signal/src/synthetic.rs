//! Seeded synthetic data for demos, tests and benchmarks.
//!
//! [`synthetic_buckets`] files made-up spectra into a bucket store and
//! returns its snapshot; [`SyntheticDrive`] produces a raw capture (motion and position
//! events) that exercises the whole pipeline.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

use crate::events::CaptureEvent;
use crate::store::{BucketSnapshot, BucketStore, QualityProxy};
use crate::types::{MotionSample, PositionFix, Spectrum, MPS_TO_KMH};

/// Speeds (km/h) covered by [`synthetic_buckets`].
pub const SYNTHETIC_SPEEDS: [u32; 10] = [15, 20, 25, 30, 35, 40, 45, 50, 55, 60];

/// Spectra generated per synthetic bucket.
pub const SYNTHETIC_SPECTRA_PER_BUCKET: usize = 5;

/// Synthetic per-bucket spectra of `bins` bins, filed through a
/// [`BucketStore`] of the given width, capacity and quality proxy.
///
/// Each spectrum has a resonance peak whose bin moves with speed, a second
/// peak around bin 15 above 35 km/h, and noise above bin 30 that grows with
/// speed. Speeds that share a bucket merge and are trimmed to `capacity`
/// exactly as captured spectra would be.
pub fn synthetic_buckets(
    bins: usize,
    width_kmh: u32,
    capacity: usize,
    proxy: QualityProxy,
    seed: u64,
) -> BucketSnapshot {
    let mut rng = StdRng::seed_from_u64(seed);
    let store = BucketStore::new(width_kmh, capacity, proxy);
    for &speed in &SYNTHETIC_SPEEDS {
        let speed = f64::from(speed);
        for _ in 0..SYNTHETIC_SPECTRA_PER_BUCKET {
            store.insert_at_speed(speed, Spectrum::new(synthetic_spectrum(bins, speed, &mut rng)));
        }
    }
    store.snapshot()
}

fn synthetic_spectrum(bins: usize, speed: f64, rng: &mut StdRng) -> Vec<f64> {
    (0..bins)
        .map(|i| {
            let i = i as f64;
            let mut value = (-(i - speed / 3.0).powi(2) / 50.0).exp() * speed / 8.0;
            if speed > 35.0 {
                value += (-(i - 15.0).powi(2) / 10.0).exp() * (speed - 30.0) / 20.0;
            }
            if i > 30.0 {
                value += (rng.gen::<f64>() * 0.4 + 0.1) * (speed / 60.0);
            }
            value
        })
        .collect()
}

/// Generator of a simulated drive with a wheel imbalance.
///
/// The imbalance shakes the phone at the wheel rotation frequency
/// (`speed / circumference`) with an amplitude that grows with speed, on
/// top of uniform road noise.
#[derive(Debug, Clone)]
pub struct SyntheticDrive {
    /// Motion sample rate (Hz).
    pub sample_rate_hz: f64,
    /// Position fix interval (ms).
    pub fix_interval_ms: u64,
    /// Reported GPS accuracy (m).
    pub accuracy_m: f64,
    /// Tyre circumference (m).
    pub wheel_circumference_m: f64,
    /// Imbalance amplitude per km/h (m/s² per km/h).
    pub imbalance_gain: f64,
    /// Peak road-noise amplitude (m/s²).
    pub noise: f64,
    /// RNG seed.
    pub seed: u64,
}

impl Default for SyntheticDrive {
    fn default() -> Self {
        Self {
            sample_rate_hz: 60.0,
            fix_interval_ms: 1_000,
            accuracy_m: 5.0,
            wheel_circumference_m: 2.0,
            imbalance_gain: 0.01,
            noise: 0.05,
            seed: 7,
        }
    }
}

impl SyntheticDrive {
    /// Events for a drive holding each `(speed_kmh, seconds)` leg in turn.
    pub fn events(&self, legs: &[(f64, f64)]) -> Vec<CaptureEvent> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let rate = self.sample_rate_hz.max(1.0);
        let mut events = Vec::new();
        let mut index = 0_u64;
        let mut next_fix_ms = 0_u64;
        let mut phase = 0.0_f64;

        for &(speed_kmh, seconds) in legs {
            let speed_mps = speed_kmh.max(0.0) / MPS_TO_KMH;
            let wheel_hz = speed_mps / self.wheel_circumference_m.max(0.1);
            let amplitude = self.imbalance_gain * speed_kmh.max(0.0);
            let samples = (seconds.max(0.0) * rate).round() as u64;

            for _ in 0..samples {
                let t_ms = (index as f64 * 1_000.0 / rate).round() as u64;
                if t_ms >= next_fix_ms {
                    events.push(CaptureEvent::Position(PositionFix {
                        speed_mps: Some(speed_mps),
                        accuracy_m: self.accuracy_m,
                        t_ms,
                    }));
                    next_fix_ms = t_ms + self.fix_interval_ms;
                }

                let shake = amplitude * (2.0 * PI * phase).sin();
                let mut noise = || self.noise * rng.gen_range(-1.0..=1.0);
                events.push(CaptureEvent::Motion(MotionSample::new(
                    noise(),
                    noise(),
                    shake + noise(),
                    t_ms,
                )));

                phase = (phase + wheel_hz / rate).fract();
                index += 1;
            }
        }
        events
    }
}
