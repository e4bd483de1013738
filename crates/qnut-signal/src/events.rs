//! Recorded capture events.
//!
//! Captures are stored as JSON lines, one event per line:
//!
//! ```text
//! {"type":"position","speed_mps":13.9,"accuracy_m":4.0,"t_ms":0}
//! {"type":"motion","x":0.12,"y":-0.03,"z":0.41,"t_ms":16}
//! {"type":"motion","x":null,"y":0.1,"z":0.2,"t_ms":32}
//! {"type":"position_lost","t_ms":5000}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use thiserror::Error;

use crate::types::{MotionSample, PositionFix};

/// Errors reading or writing a capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed capture event on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cannot serialize capture event: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// One event from a device source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CaptureEvent {
    /// Accelerometer reading.
    Motion(MotionSample),
    /// GPS fix.
    Position(PositionFix),
    /// Position source error or timeout.
    PositionLost {
        /// Time the loss was noticed.
        t_ms: u64,
    },
}

impl CaptureEvent {
    /// Event time on the capture clock.
    #[must_use]
    pub fn t_ms(&self) -> u64 {
        match self {
            CaptureEvent::Motion(m) => m.t_ms,
            CaptureEvent::Position(p) => p.t_ms,
            CaptureEvent::PositionLost { t_ms } => *t_ms,
        }
    }
}

/// Streaming reader over a JSON-lines capture.
pub struct CaptureReader<R> {
    lines: std::io::Lines<R>,
    line: usize,
}

impl<R: BufRead> CaptureReader<R> {
    /// Wrap a buffered reader.
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }
}

impl<R: BufRead> Iterator for CaptureReader<R> {
    type Item = Result<CaptureEvent, CaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let text = match self.lines.next()? {
                Ok(text) => text,
                Err(e) => return Some(Err(e.into())),
            };
            self.line += 1;
            let trimmed = text.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let line = self.line;
            return Some(
                serde_json::from_str(trimmed).map_err(|source| CaptureError::Parse { line, source }),
            );
        }
    }
}

/// Read a whole capture into memory.
pub fn read_capture<R: BufRead>(reader: R) -> Result<Vec<CaptureEvent>, CaptureError> {
    CaptureReader::new(reader).collect()
}

/// Write events as JSON lines.
pub fn write_capture<W: Write>(mut writer: W, events: &[CaptureEvent]) -> Result<(), CaptureError> {
    for event in events {
        serde_json::to_writer(&mut writer, event).map_err(CaptureError::Serialize)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
