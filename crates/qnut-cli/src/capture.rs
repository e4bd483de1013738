//! Capture subcommands
//!
//! This module provides the commands that feed events through a
//! [`CaptureSession`] and print the resulting heat map:
//! - Replay of recorded JSON-lines captures
//! - Synthetic bucket demo
//! - Simulated drives
//! - Configuration display and scaffolding

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use qnut_signal::synthetic::{synthetic_buckets, SyntheticDrive};
use qnut_signal::{
    Aggregator, CaptureError, CaptureEvent, CaptureReader, CaptureSession, HeatMap,
    MeasurementCounter, Normalizer, PipelineConfig, QualityProxy, SessionStats,
};

use crate::render::{render_heat_map, stats_table, RenderOptions};

/// Arguments shared by every command that prints a heat map
#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Print the heat map as JSON instead of drawing it
    #[arg(long)]
    pub json: bool,

    /// Disable ANSI colors
    #[arg(long)]
    pub no_color: bool,

    /// Maximum spectrum columns in the drawing
    #[arg(long, default_value = "64")]
    pub columns: usize,
}

/// Arguments for the replay command
#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Capture file (JSON lines); `-` reads standard input
    pub input: PathBuf,

    /// Print session counters
    #[arg(short, long)]
    pub stats: bool,

    /// Print the measurement counter in Prometheus text format
    #[arg(long)]
    pub metrics: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Arguments for the demo command
#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Random seed for the synthetic spectra
    #[arg(long, default_value = "42")]
    pub seed: u64,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Arguments for the simulate command
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Drive leg as `SPEED_KMH:SECONDS`; repeat for several legs
    #[arg(short, long = "leg", value_parser = parse_leg)]
    pub legs: Vec<(f64, f64)>,

    /// Random seed for road noise
    #[arg(long, default_value = "7")]
    pub seed: u64,

    /// Accelerometer sample rate in Hz
    #[arg(long, default_value = "60.0")]
    pub sample_rate: f64,

    /// Also write the generated capture to this file
    #[arg(short, long)]
    pub output_capture: Option<PathBuf>,

    /// Print session counters
    #[arg(short, long)]
    pub stats: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration as JSON
    Show,

    /// Write the effective configuration to a file
    Init {
        /// Destination path
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

/// Legs used by `simulate` when none are given.
pub const DEFAULT_LEGS: [(f64, f64); 3] = [(30.0, 20.0), (60.0, 20.0), (90.0, 20.0)];

/// Parse a `SPEED_KMH:SECONDS` drive leg.
pub fn parse_leg(s: &str) -> std::result::Result<(f64, f64), String> {
    let (speed, seconds) = s
        .split_once(':')
        .ok_or_else(|| format!("expected SPEED_KMH:SECONDS, got `{s}`"))?;
    let speed: f64 = speed
        .trim()
        .parse()
        .map_err(|e| format!("bad speed `{speed}`: {e}"))?;
    let seconds: f64 = seconds
        .trim()
        .parse()
        .map_err(|e| format!("bad duration `{seconds}`: {e}"))?;
    if !speed.is_finite() || speed < 0.0 {
        return Err(format!("speed must be a non-negative number, got {speed}"));
    }
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(format!("duration must be positive, got {seconds}"));
    }
    Ok((speed, seconds))
}

/// JSON output document
#[derive(Serialize)]
struct Report<'a> {
    heat_map: &'a HeatMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<&'a SessionStats>,
}

/// Run `events` through a fresh session built from `config`.
///
/// Malformed events abort the replay; the session is stopped before
/// returning so retained spectra stay readable.
pub fn replay<I>(events: I, config: PipelineConfig, counter: Arc<MeasurementCounter>) -> Result<CaptureSession>
where
    I: IntoIterator<Item = std::result::Result<CaptureEvent, CaptureError>>,
{
    let mut session = CaptureSession::new(config)?.with_telemetry(counter);
    session.start();
    for event in events {
        session.handle_event(&event?);
    }
    session.stop();
    Ok(session)
}

fn print_report(heat_map: &HeatMap, stats: Option<&SessionStats>, output: &OutputArgs) -> Result<()> {
    if output.json {
        let report = Report { heat_map, stats };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let options = RenderOptions {
        color: !output.no_color,
        max_columns: output.columns.max(1),
    };
    print!("{}", render_heat_map(heat_map, &options));
    if let Some(stats) = stats {
        println!();
        println!("{}", stats_table(stats));
    }
    Ok(())
}

fn open_capture(input: &Path) -> Result<Box<dyn BufRead>> {
    if input.as_os_str() == "-" {
        return Ok(Box::new(BufReader::new(std::io::stdin())));
    }
    let file = File::open(input).with_context(|| format!("opening capture {}", input.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Execute the replay command
pub fn execute_replay(args: ReplayArgs, config: PipelineConfig) -> Result<()> {
    let reader = open_capture(&args.input)?;
    let counter = Arc::new(MeasurementCounter::new());
    let session = replay(CaptureReader::new(reader), config, Arc::clone(&counter))
        .with_context(|| format!("replaying {}", args.input.display()))?;

    let stats = session.stats();
    info!(
        windows = stats.windows_emitted,
        discarded = stats.discarded(),
        buckets = session.store().bucket_count(),
        "replay finished"
    );
    if stats.windows_emitted == 0 && stats.discarded() > 0 {
        warn!("every window was interrupted; check GPS accuracy and fix timing");
    }

    print_report(&session.render(), args.stats.then_some(stats), &args.output)?;
    if args.metrics {
        println!();
        print!("{}", counter.render_prometheus());
    }
    Ok(())
}

/// Execute the demo command
pub fn execute_demo(args: DemoArgs, config: PipelineConfig) -> Result<()> {
    if !args.output.json {
        println!(
            "{} Synthetic bucket spectra (seed {})",
            "[DEMO]".bright_cyan().bold(),
            args.seed
        );
        println!();
    }
    let snapshot = synthetic_buckets(
        config.spectrum_bins(),
        config.bucket_width_kmh,
        config.bucket_capacity,
        QualityProxy {
            bins: config.quality_bins,
        },
        args.seed,
    );
    let frames = Aggregator::new(config.aggregator()).aggregate(&snapshot);
    let heat_map = Normalizer::new(config.normalizer()).normalize(&frames);
    print_report(&heat_map, None, &args.output)
}

/// Execute the simulate command
pub fn execute_simulate(args: SimulateArgs, config: PipelineConfig) -> Result<()> {
    if !args.sample_rate.is_finite() || args.sample_rate <= 0.0 {
        bail!("sample rate must be positive, got {}", args.sample_rate);
    }
    let legs = if args.legs.is_empty() {
        DEFAULT_LEGS.to_vec()
    } else {
        args.legs.clone()
    };
    let drive = SyntheticDrive {
        sample_rate_hz: args.sample_rate,
        seed: args.seed,
        ..SyntheticDrive::default()
    };
    let events = drive.events(&legs);
    info!(legs = legs.len(), events = events.len(), "simulated drive generated");

    if let Some(path) = &args.output_capture {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        qnut_signal::write_capture(BufWriter::new(file), &events)
            .with_context(|| format!("writing capture to {}", path.display()))?;
        info!(path = %path.display(), "capture written");
    }

    if !args.output.json {
        let described: Vec<String> = legs
            .iter()
            .map(|(speed, secs)| format!("{speed} km/h for {secs} s"))
            .collect();
        println!(
            "{} {}",
            "[SIMULATION]".yellow().bold(),
            described.join(", ")
        );
        println!();
    }

    let session = replay(
        events.into_iter().map(Ok),
        config,
        Arc::new(MeasurementCounter::new()),
    )?;
    print_report(&session.render(), args.stats.then_some(session.stats()), &args.output)
}

/// Execute a config command
pub fn execute_config(command: ConfigCommand, config: PipelineConfig) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigCommand::Init { path, force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            config.to_json(&path)?;
            println!("{} wrote {}", "[CONFIG]".green().bold(), path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn parse_leg_accepts_speed_and_duration() {
        assert_eq!(parse_leg("50:30").unwrap(), (50.0, 30.0));
        assert_eq!(parse_leg(" 72.5 : 1.5 ").unwrap(), (72.5, 1.5));
    }

    #[test]
    fn parse_leg_rejects_bad_input() {
        assert!(parse_leg("50").is_err());
        assert!(parse_leg("fast:30").is_err());
        assert!(parse_leg("-5:30").is_err());
        assert!(parse_leg("50:0").is_err());
    }

    #[test]
    fn replay_counts_one_measurement() {
        let events = SyntheticDrive::default().events(&[(52.0, 5.0)]);
        let counter = Arc::new(MeasurementCounter::new());
        let session = replay(
            events.into_iter().map(Ok),
            PipelineConfig::default(),
            Arc::clone(&counter),
        )
        .unwrap();

        assert_eq!(counter.total(), 1);
        assert!(!session.is_measuring());
        let heat_map = session.render();
        assert_eq!(heat_map.rows.len(), 1);
        assert_eq!(heat_map.rows[0].bucket.to_string(), "50-55");
        // 300 samples at 60 Hz fill two 128-sample windows.
        assert_abs_diff_eq!(heat_map.rows[0].confidence, 2.0 / 50.0, epsilon = 1e-12);
    }

    #[test]
    fn replay_stops_on_malformed_event() {
        let input = "{\"type\":\"position_lost\",\"t_ms\":0}\nnot json\n";
        let result = replay(
            CaptureReader::new(input.as_bytes()),
            PipelineConfig::default(),
            Arc::new(MeasurementCounter::new()),
        );
        let err = result.err().unwrap();
        assert!(format!("{err:#}").contains("line 2"));
    }

    #[test]
    fn simulated_capture_round_trips_through_file() {
        let path = std::env::temp_dir().join(format!("qnut-sim-{}.jsonl", std::process::id()));
        let events = SyntheticDrive::default().events(&[(45.0, 3.0)]);
        qnut_signal::write_capture(BufWriter::new(File::create(&path).unwrap()), &events).unwrap();

        let reader = open_capture(&path).unwrap();
        let session = replay(
            CaptureReader::new(reader),
            PipelineConfig::default(),
            Arc::new(MeasurementCounter::new()),
        )
        .unwrap();
        std::fs::remove_file(&path).ok();

        // 180 samples: one full window, one partial window dropped on stop.
        assert_eq!(session.stats().windows_emitted, 1);
        assert_eq!(session.stats().accepted, 180);
    }

    #[test]
    fn config_init_refuses_to_overwrite() {
        let path = std::env::temp_dir().join(format!("qnut-init-{}.json", std::process::id()));
        std::fs::write(&path, "{}").unwrap();
        let cmd = ConfigCommand::Init {
            path: path.clone(),
            force: false,
        };
        assert!(execute_config(cmd, PipelineConfig::default()).is_err());

        let cmd = ConfigCommand::Init {
            path: path.clone(),
            force: true,
        };
        execute_config(cmd, PipelineConfig::default()).unwrap();
        let loaded = PipelineConfig::from_json(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, PipelineConfig::default());
    }
}
