//! qnut CLI Entry Point
//!
//! This is the main entry point for the qnut command-line tool.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use qnut_cli::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let no_color = cli.no_color();
    if no_color {
        colored::control::set_override(false);
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(!no_color)
                .with_writer(std::io::stderr),
        )
        .init();

    cli.run()
}
