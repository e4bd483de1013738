//! Fire-and-forget measurement telemetry.
//!
//! A capture session reports one "measurement started" event when it
//! starts. Delivery failures never reach the pipeline; the session logs and
//! drops them.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use thiserror::Error;

/// Metric name of the measurement counter.
pub const MEASUREMENTS_METRIC: &str = "qnut_measurements_total";

/// Telemetry delivery failure.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Telemetry sink unavailable: {0}")]
    Unavailable(String),
}

/// Receiver of capture-session lifecycle events.
pub trait TelemetrySink: Send + Sync {
    /// Record that a measurement of kind `kind` started.
    fn measurement_started(&self, kind: &str) -> Result<(), TelemetryError>;
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn measurement_started(&self, _kind: &str) -> Result<(), TelemetryError> {
        Ok(())
    }
}

/// In-process counter of started measurements, labelled by kind.
#[derive(Debug, Default)]
pub struct MeasurementCounter {
    counts: Mutex<BTreeMap<String, u64>>,
}

impl MeasurementCounter {
    /// Create an empty counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count for one label.
    #[must_use]
    pub fn get(&self, kind: &str) -> u64 {
        self.counts.lock().get(kind).copied().unwrap_or(0)
    }

    /// Sum over all labels.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.lock().values().sum()
    }

    /// Prometheus text exposition of the counter.
    #[must_use]
    pub fn render_prometheus(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# HELP {MEASUREMENTS_METRIC} Total number of measurements started");
        let _ = writeln!(out, "# TYPE {MEASUREMENTS_METRIC} counter");
        for (kind, count) in self.counts.lock().iter() {
            let _ = writeln!(out, "{MEASUREMENTS_METRIC}{{type=\"{kind}\"}} {count}");
        }
        out
    }
}

impl TelemetrySink for MeasurementCounter {
    fn measurement_started(&self, kind: &str) -> Result<(), TelemetryError> {
        let label = if kind.is_empty() { "unknown" } else { kind };
        *self.counts.lock().entry(label.to_string()).or_insert(0) += 1;
        Ok(())
    }
}
