//! End-to-end tests of the capture pipeline
//!
//! These drive a [`CaptureSession`] with hand-built and simulated events and
//! check the stored spectra and rendered heat map against known results.

use approx::assert_abs_diff_eq;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use qnut_signal::synthetic::SyntheticDrive;
use qnut_signal::{
    AggregationMode, BucketKey, CaptureEvent, CaptureSession, ComplexFftTransform,
    DiscardReason, MotionSample, NormalizationMode, PipelineConfig, PositionFix, SampleOutcome,
};

fn fix_kmh(speed_kmh: f64, accuracy_m: f64, t_ms: u64) -> PositionFix {
    PositionFix {
        speed_mps: Some(speed_kmh / 3.6),
        accuracy_m,
        t_ms,
    }
}

fn bucket(lower: u32) -> BucketKey {
    BucketKey {
        lower_kmh: lower,
        width_kmh: 5,
    }
}

fn feed_constant(session: &mut CaptureSession, n: usize, start_ms: u64) -> Vec<SampleOutcome> {
    (0..n as u64)
        .map(|i| session.on_motion(&MotionSample::new(1.0, 0.0, 0.0, start_ms + i * 16)))
        .collect()
}

fn peak_bin(spectrum: &[f64], from: usize) -> usize {
    spectrum
        .iter()
        .enumerate()
        .skip(from)
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap()
}

/// A single constant window at 50 km/h ends up in the "50-55" bucket with
/// the Hann-weighted DC in bin 0.
#[test]
fn constant_window_at_fifty_kmh() {
    let mut session = CaptureSession::new(PipelineConfig::default()).unwrap();
    session.start();
    session.on_position(&fix_kmh(50.0, 5.0, 0));

    let outcomes = feed_constant(&mut session, 128, 0);
    assert!(matches!(outcomes[127], SampleOutcome::Inserted(_)));

    let frames = session.frames();
    assert_eq!(frames.len(), 1);
    let frame = &frames[0];
    assert_eq!(frame.bucket, bucket(50));
    assert_eq!(frame.bucket.to_string(), "50-55");
    assert_eq!(frame.count, 1);
    assert_abs_diff_eq!(frame.confidence, 0.02, epsilon = 1e-12);
    assert_eq!(frame.spectrum.len(), 64);
    assert_abs_diff_eq!(frame.spectrum[0], 63.5, epsilon = 1e-9);
    assert!(frame.spectrum[1] > 30.0);
    assert!(frame.spectrum[2..].iter().all(|v| *v < 0.2));

    let heat_map = session.render();
    assert_eq!(heat_map.rows.len(), 1);
    let row = &heat_map.rows[0];
    assert_abs_diff_eq!(row.values[0], 0.02, epsilon = 1e-12);
    assert_abs_diff_eq!(row.values[1], 0.02, epsilon = 1e-12);
    assert!(row.values.iter().all(|v| (0.0..=1.0).contains(v)));
}

/// Poor GPS accuracy keeps the window empty and creates no bucket.
#[test]
fn poor_accuracy_stores_nothing() {
    let mut session = CaptureSession::new(PipelineConfig::default()).unwrap();
    session.start();
    session.on_position(&fix_kmh(50.0, 30.0, 0));

    let outcomes = feed_constant(&mut session, 300, 0);
    assert!(outcomes
        .iter()
        .all(|o| *o == SampleOutcome::Discarded(DiscardReason::PoorAccuracy)));
    assert_eq!(session.pending_samples(), 0);
    assert!(session.store().is_empty());
    assert!(session.render().is_empty());
    assert_eq!(session.stats().poor_accuracy, 300);
}

/// A discard mid-window throws away the partial window only.
#[test]
fn discard_between_windows() {
    let mut session = CaptureSession::new(PipelineConfig::default()).unwrap();
    session.start();
    session.on_position(&fix_kmh(42.0, 5.0, 0));

    feed_constant(&mut session, 200, 0);
    assert_eq!(session.stats().windows_emitted, 1);
    assert_eq!(session.pending_samples(), 72);

    let partial = MotionSample {
        x: Some(1.0),
        y: None,
        z: Some(0.0),
        t_ms: 3_300,
    };
    assert_eq!(
        session.on_motion(&partial),
        SampleOutcome::Discarded(DiscardReason::MissingAxis)
    );
    assert_eq!(session.pending_samples(), 0);

    session.on_position(&fix_kmh(42.0, 5.0, 3_300));
    let outcomes = feed_constant(&mut session, 128, 3_316);
    assert!(outcomes[..127]
        .iter()
        .all(|o| *o == SampleOutcome::Buffered));
    assert!(matches!(outcomes[127], SampleOutcome::Inserted(out) if out.key == bucket(40)));
    assert_eq!(session.stats().windows_emitted, 2);
    assert_eq!(session.stats().windows_dropped, 1);
}

/// Samples taken long after the last fix are treated as speed-less.
#[test]
fn stale_fix_is_rejected() {
    let mut session = CaptureSession::new(PipelineConfig::default()).unwrap();
    session.start();
    session.on_position(&fix_kmh(50.0, 5.0, 0));

    let late = MotionSample::new(0.0, 0.0, 1.0, 6_000);
    assert_eq!(
        session.on_motion(&late),
        SampleOutcome::Discarded(DiscardReason::StaleFix)
    );

    let unchecked = PipelineConfig {
        max_fix_age_ms: None,
        ..PipelineConfig::default()
    };
    let mut session = CaptureSession::new(unchecked).unwrap();
    session.start();
    session.on_position(&fix_kmh(50.0, 5.0, 0));
    assert_eq!(session.on_motion(&late), SampleOutcome::Buffered);
}

/// A fix without speed makes every following sample a discard.
#[test]
fn missing_speed_blocks_until_next_fix() {
    let mut session = CaptureSession::new(PipelineConfig::default()).unwrap();
    session.start();
    session.on_position(&PositionFix {
        speed_mps: None,
        accuracy_m: 3.0,
        t_ms: 0,
    });
    let outcomes = feed_constant(&mut session, 10, 0);
    assert!(outcomes
        .iter()
        .all(|o| *o == SampleOutcome::Discarded(DiscardReason::UnknownSpeed)));

    session.on_position(&fix_kmh(30.0, 3.0, 200));
    assert_eq!(feed_constant(&mut session, 1, 200)[0], SampleOutcome::Buffered);
}

/// Readers on another thread always see whole spectra and bounded buckets
/// while the session keeps inserting.
#[test]
fn concurrent_reader_sees_consistent_snapshots() {
    let config = PipelineConfig {
        window_size: 16,
        bucket_capacity: 4,
        ..PipelineConfig::default()
    };
    let mut session = CaptureSession::new(config).unwrap();
    session.start();
    let reader = session.reader();
    let store = session.store();
    let done = Arc::new(AtomicBool::new(false));

    std::thread::scope(|scope| {
        let done_flag = Arc::clone(&done);
        let observer = scope.spawn(move || {
            let mut renders = 0_usize;
            while !done_flag.load(Ordering::Acquire) || renders == 0 {
                let snapshot = store.snapshot();
                for spectra in snapshot.values() {
                    assert!(spectra.len() <= 4);
                    assert!(spectra.iter().all(|s| s.len() == 8));
                }
                let heat_map = reader.render();
                for row in &heat_map.rows {
                    assert_eq!(row.values.len(), 8);
                    assert!(row.confidence <= 1.0);
                    assert!(row.values.iter().all(|v| (0.0..=1.0).contains(v)));
                }
                renders += 1;
            }
            renders
        });

        for round in 0..200_u64 {
            let speed = 10.0 + (round % 12) as f64 * 5.0 + 2.0;
            session.on_position(&fix_kmh(speed, 4.0, round * 1_000));
            for i in 0..16_u64 {
                let v = 1.0 + ((round * 16 + i) as f64 * 0.7).sin();
                session.on_motion(&MotionSample::new(v, 0.1, 0.2, round * 1_000 + i));
            }
        }
        done.store(true, Ordering::Release);

        assert!(observer.join().unwrap() > 0);
    });

    assert_eq!(session.stats().windows_emitted, 200);
    assert_eq!(session.store().bucket_count(), 12);
    assert_eq!(session.store().len(), 12 * 4);
}

/// A simulated drive with an unbalanced wheel puts the vibration peak at
/// higher frequencies for higher speeds.
#[test]
fn simulated_drive_peak_follows_speed() {
    let drive = SyntheticDrive::default();
    let events = drive.events(&[(22.0, 10.0), (52.0, 10.0), (82.0, 10.0)]);

    let mut session = CaptureSession::new(PipelineConfig::default()).unwrap();
    session.start();
    for event in &events {
        session.handle_event(event);
    }

    let frames = session.frames();
    let keys: Vec<_> = frames.iter().map(|f| f.bucket).collect();
    assert_eq!(keys, vec![bucket(20), bucket(50), bucket(80)]);
    assert_eq!(
        frames.iter().map(|f| f.count).collect::<Vec<_>>(),
        vec![4, 5, 5]
    );

    let peaks: Vec<usize> = frames.iter().map(|f| peak_bin(&f.spectrum, 4)).collect();
    println!("peak bins per bucket: {:?}", peaks);
    assert!(peaks[0] < peaks[1] && peaks[1] < peaks[2]);

    let heat_map = session.render();
    assert_eq!(heat_map.to_array().dim(), (3, 64));
}

/// The complex FFT path produces the same heat map as the real one.
#[test]
fn real_and_complex_transforms_agree_end_to_end() {
    let events = SyntheticDrive {
        seed: 11,
        ..SyntheticDrive::default()
    }
    .events(&[(35.0, 8.0), (65.0, 8.0)]);

    let config = PipelineConfig::default();
    let mut real = CaptureSession::new(config.clone()).unwrap();
    let complex = ComplexFftTransform::new(config.window_size).unwrap();
    let mut cplx = CaptureSession::with_transform(config, Box::new(complex)).unwrap();

    for session in [&mut real, &mut cplx] {
        session.start();
        for event in &events {
            session.handle_event(event);
        }
    }

    let a = real.frames();
    let b = cplx.frames();
    assert_eq!(a.len(), b.len());
    for (fa, fb) in a.iter().zip(&b) {
        assert_eq!(fa.bucket, fb.bucket);
        for (x, y) in fa.spectrum.iter().zip(&fb.spectrum) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-9);
        }
    }
}

/// Median aggregation and per-bucket normalization run through the session.
#[test]
fn median_per_bucket_configuration() {
    let config = PipelineConfig {
        aggregation: AggregationMode::Median,
        normalization: NormalizationMode::PerBucket,
        ..PipelineConfig::default()
    };
    let events = SyntheticDrive::default().events(&[(27.0, 12.0), (47.0, 12.0)]);

    let mut session = CaptureSession::new(config).unwrap();
    session.start();
    for event in &events {
        session.handle_event(event);
    }

    let heat_map = session.render();
    assert_eq!(heat_map.mode, NormalizationMode::PerBucket);
    assert!(heat_map.global_range.is_none());
    assert_eq!(heat_map.rows.len(), 2);
    for row in &heat_map.rows {
        let max = row.values[2..].iter().cloned().fold(f64::MIN, f64::max);
        assert_abs_diff_eq!(max, 1.0, epsilon = 1e-12);
    }
}

/// Stopping keeps what was measured; events after stop change nothing.
#[test]
fn replay_after_stop_is_ignored() {
    let events = SyntheticDrive::default().events(&[(40.0, 5.0)]);
    let mut session = CaptureSession::new(PipelineConfig::default()).unwrap();
    session.start();
    for event in &events {
        session.handle_event(event);
    }
    let before = session.store().len();
    assert!(before > 0);

    session.stop();
    let ignored = events
        .iter()
        .filter_map(|e| session.handle_event(e))
        .all(|o| o == SampleOutcome::Ignored);
    assert!(ignored);
    assert_eq!(session.store().len(), before);
    assert!(matches!(events[0], CaptureEvent::Position(_)));
}
