//! Pitwall CLI: command-line interface for telemetry overlay rendering.
//!
//! Usage:
//!   pitwall init <DIR>                          Write a sample session and telemetry dump
//!   pitwall info --telemetry <FILE>             Show telemetry channels
//!   pitwall validate <SESSION> --telemetry <F>  Build and prime a session without rendering
//!   pitwall render <SESSION> --telemetry <F>    Render overlays to a PNG sequence

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pitwall_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "pitwall",
    about = "Composite telemetry overlays onto video frames",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a sample session.json and a synthetic telemetry.json
    Init {
        /// Output directory
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Length of the synthetic telemetry (seconds)
        #[arg(long, default_value = "60")]
        duration: f64,
    },

    /// Show the channels of a telemetry dump
    Info {
        /// Telemetry dump (JSON)
        #[arg(short, long)]
        telemetry: PathBuf,
    },

    /// Build the layer stack and prime it against the telemetry
    Validate {
        /// Session file
        session: PathBuf,

        /// Telemetry dump (JSON)
        #[arg(short, long)]
        telemetry: PathBuf,

        /// Video length used for the coverage check (seconds)
        #[arg(long)]
        duration: Option<f64>,
    },

    /// Render a session to a PNG sequence
    Render {
        /// Session file
        session: PathBuf,

        /// Telemetry dump (JSON)
        #[arg(short, long)]
        telemetry: PathBuf,

        /// Output directory for frames and the anomaly report
        #[arg(short, long, default_value = "render")]
        output: PathBuf,

        /// Directory of decoded video frames (PNG/JPEG); omitted renders onto a blank background
        #[arg(long)]
        frames: Option<PathBuf>,

        /// Video length when rendering without input frames (seconds)
        #[arg(long)]
        duration: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    // Initialize logging
    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    pitwall_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Init { dir, duration } => commands::init::run(dir, duration),
        Commands::Info { telemetry } => commands::info::run(telemetry),
        Commands::Validate {
            session,
            telemetry,
            duration,
        } => commands::validate::run(session, telemetry, duration),
        Commands::Render {
            session,
            telemetry,
            output,
            frames,
            duration,
        } => commands::render::run(&config, session, telemetry, output, frames, duration).await,
    }
}
