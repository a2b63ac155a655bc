//! Visage CLI: frame-sequence analysis from the command line.
//!
//! Usage:
//!   visage analyze <FRAMES>      Analyze a directory of frames
//!   visage train <FRAMES>        Train and save the anomaly model
//!   visage model-info [PATH]     Show a saved anomaly model
//!   visage init-config           Write a default configuration file

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use visage_common::{AppConfig, EmotionStrategy};

mod commands;
mod frames;
mod report;

#[derive(Parser)]
#[command(
    name = "visage",
    about = "Motion, emotion, and anomaly analysis for video frame sequences",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to the user config, then built-ins)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a directory of frames
    Analyze {
        /// Directory of frame images, processed in filename order
        frames: PathBuf,

        /// Detections sidecar (JSON Lines)
        #[arg(short, long)]
        detections: Option<PathBuf>,

        /// Frame rate of the sequence
        #[arg(long, default_value = "30")]
        fps: f64,

        /// Output directory for report.txt and summary.json
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Anomaly model file
        #[arg(long)]
        model: Option<PathBuf>,

        /// Run without anomaly detection
        #[arg(long)]
        no_model: bool,

        /// Emotion strategy: library|heuristic|auto
        #[arg(long, value_parser = parse_strategy)]
        emotion: Option<EmotionStrategy>,

        /// Mean motion below which a frame is static
        #[arg(long)]
        activity_low: Option<f64>,

        /// Mean motion at or above which a frame is rapid movement
        #[arg(long)]
        activity_high: Option<f64>,

        /// Anomaly score threshold (must be non-zero)
        #[arg(long, allow_hyphen_values = true)]
        anomaly_threshold: Option<f64>,
    },

    /// Train the anomaly model on a directory of frames
    Train {
        /// Directory of frame images, processed in filename order
        frames: PathBuf,

        /// Detections sidecar (JSON Lines)
        #[arg(short, long)]
        detections: Option<PathBuf>,

        /// Where to write the model
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show a saved anomaly model
    ModelInfo {
        /// Model file (defaults to the configured path)
        path: Option<PathBuf>,
    },

    /// Write a default configuration file
    InitConfig {
        /// Destination (defaults to the user config path)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn parse_strategy(s: &str) -> Result<EmotionStrategy, String> {
    match s.to_ascii_lowercase().as_str() {
        "library" => Ok(EmotionStrategy::Library),
        "heuristic" => Ok(EmotionStrategy::Heuristic),
        "auto" => Ok(EmotionStrategy::Auto),
        other => Err(format!(
            "unknown emotion strategy '{other}' (expected library, heuristic, or auto)"
        )),
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_from(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {e}", path.display())),
        None => Ok(AppConfig::load()),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_ref())?;

    // Initialize logging
    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    visage_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Analyze {
            frames,
            detections,
            fps,
            output,
            model,
            no_model,
            emotion,
            activity_low,
            activity_high,
            anomaly_threshold,
        } => {
            if let Some(strategy) = emotion {
                config.analysis.emotion_strategy = strategy;
            }
            if let Some(low) = activity_low {
                config.analysis.activity_threshold_low = low;
            }
            if let Some(high) = activity_high {
                config.analysis.activity_threshold_high = high;
            }
            if let Some(threshold) = anomaly_threshold {
                config.analysis.anomaly_threshold = threshold;
            }
            if let Some(output) = output {
                config.output_dir = output;
            }
            if let Some(model) = model {
                config.model_path = model;
            }
            commands::analyze::run(config, frames, detections, fps, !no_model)
        }
        Commands::Train {
            frames,
            detections,
            output,
        } => {
            let output = output.unwrap_or_else(|| config.model_path.clone());
            commands::train::run(config, frames, detections, output)
        }
        Commands::ModelInfo { path } => {
            commands::model_info::run(path.unwrap_or_else(|| config.model_path.clone()))
        }
        Commands::InitConfig { path, force } => commands::init_config::run(path, force),
    }
}
