//! qnut CLI
//!
//! Command-line interface for replaying recorded vibration captures and
//! drawing the speed-versus-frequency heat map in the terminal.
//!
//! # Features
//!
//! - **replay**: Run a JSON-lines capture through the pipeline
//! - **demo**: Draw a heat map from synthetic bucket spectra
//! - **simulate**: Generate and replay a drive with an unbalanced wheel
//! - **config**: Show or write the pipeline configuration
//! - **version**: Display version information
//!
//! # Usage
//!
//! ```bash
//! # Replay a capture recorded on the phone
//! qnut replay drive.jsonl --stats
//!
//! # Same capture, median aggregation, per-bucket scaling, JSON output
//! qnut --aggregation median --normalization per-bucket replay drive.jsonl --json
//!
//! # Simulate 30 s at 50 km/h then 30 s at 90 km/h and keep the capture
//! qnut simulate --leg 50:30 --leg 90:30 --output sim.jsonl
//!
//! # Write the default configuration for editing
//! qnut config init qnut.json
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use qnut_signal::{AggregationMode, NormalizationMode, PipelineConfig, WindowFunction};

pub mod capture;
pub mod render;

/// qnut Command Line Interface
#[derive(Parser, Debug)]
#[command(name = "qnut")]
#[command(author, version, about = "Wheel-vibration spectrogram from accelerometer and GPS data")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Pipeline configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Configuration overrides
    #[command(flatten)]
    pub overrides: ConfigOverrides,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a recorded JSON-lines capture
    Replay(capture::ReplayArgs),

    /// Render a heat map from synthetic bucket spectra
    Demo(capture::DemoArgs),

    /// Simulate a drive and replay it through the pipeline
    Simulate(capture::SimulateArgs),

    /// Show or write the pipeline configuration
    #[command(subcommand)]
    Config(capture::ConfigCommand),

    /// Display version information
    Version,
}

/// Command-line overrides applied on top of the configuration file.
#[derive(Args, Debug, Default, Clone)]
pub struct ConfigOverrides {
    /// Samples per FFT window (power of two)
    #[arg(long, global = true)]
    pub window_size: Option<usize>,

    /// Window taper
    #[arg(long, value_enum, global = true)]
    pub window_fn: Option<WindowArg>,

    /// Speed bucket width in km/h
    #[arg(long, global = true)]
    pub bucket_width: Option<u32>,

    /// Spectra kept per speed bucket
    #[arg(long, global = true)]
    pub capacity: Option<usize>,

    /// Maximum accepted GPS accuracy in metres
    #[arg(long, global = true)]
    pub accuracy: Option<f64>,

    /// Per-bin aggregation
    #[arg(long, value_enum, global = true)]
    pub aggregation: Option<AggregationArg>,

    /// Heat map scaling
    #[arg(long, value_enum, global = true)]
    pub normalization: Option<NormalizationArg>,

    /// Weight the bucket mean by confidence
    #[arg(long, global = true)]
    pub weighted: bool,
}

/// Window taper argument for CLI
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum WindowArg {
    Rectangular,
    Hann,
    Hamming,
    Blackman,
}

impl From<WindowArg> for WindowFunction {
    fn from(val: WindowArg) -> Self {
        match val {
            WindowArg::Rectangular => WindowFunction::Rectangular,
            WindowArg::Hann => WindowFunction::Hann,
            WindowArg::Hamming => WindowFunction::Hamming,
            WindowArg::Blackman => WindowFunction::Blackman,
        }
    }
}

/// Aggregation argument for CLI
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum AggregationArg {
    Mean,
    Median,
}

impl From<AggregationArg> for AggregationMode {
    fn from(val: AggregationArg) -> Self {
        match val {
            AggregationArg::Mean => AggregationMode::Mean,
            AggregationArg::Median => AggregationMode::Median,
        }
    }
}

/// Normalization argument for CLI
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum NormalizationArg {
    Global,
    PerBucket,
}

impl From<NormalizationArg> for NormalizationMode {
    fn from(val: NormalizationArg) -> Self {
        match val {
            NormalizationArg::Global => NormalizationMode::Global,
            NormalizationArg::PerBucket => NormalizationMode::PerBucket,
        }
    }
}

impl ConfigOverrides {
    /// Apply the set overrides to `config`.
    pub fn apply(&self, config: &mut PipelineConfig) {
        if let Some(v) = self.window_size {
            config.window_size = v;
        }
        if let Some(v) = self.window_fn {
            config.window_fn = v.into();
        }
        if let Some(v) = self.bucket_width {
            config.bucket_width_kmh = v;
        }
        if let Some(v) = self.capacity {
            config.bucket_capacity = v;
        }
        if let Some(v) = self.accuracy {
            config.accuracy_threshold_m = v;
        }
        if let Some(v) = self.aggregation {
            config.aggregation = v.into();
        }
        if let Some(v) = self.normalization {
            config.normalization = v.into();
        }
        if self.weighted {
            config.weight_by_confidence = true;
        }
    }
}

impl Cli {
    /// Effective pipeline configuration: file (or defaults) plus overrides.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or the result does not validate.
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        self.overrides.apply(&mut config);
        config
            .validate()
            .context("invalid pipeline configuration")?;
        Ok(config)
    }

    /// Whether the chosen command asked for plain output.
    pub fn no_color(&self) -> bool {
        match &self.command {
            Commands::Replay(args) => args.output.no_color,
            Commands::Demo(args) => args.output.no_color,
            Commands::Simulate(args) => args.output.no_color,
            Commands::Config(_) | Commands::Version => false,
        }
    }

    /// Dispatch the parsed command.
    ///
    /// The configuration is only resolved for commands that use it, so
    /// `version` works even when `--config` points at a broken file.
    pub fn run(self) -> Result<()> {
        if let Commands::Version = self.command {
            println!("qnut {}", env!("CARGO_PKG_VERSION"));
            println!("signal library version: {}", qnut_signal::VERSION);
            return Ok(());
        }

        let config = self.pipeline_config()?;
        match self.command {
            Commands::Replay(args) => capture::execute_replay(args, config),
            Commands::Demo(args) => capture::execute_demo(args, config),
            Commands::Simulate(args) => capture::execute_simulate(args, config),
            Commands::Config(cmd) => capture::execute_config(cmd, config),
            Commands::Version => Ok(()),
        }
    }
}
