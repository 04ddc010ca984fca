//! Command-line interface for the conversion pipeline.

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{ConversionMode, FailurePolicy};
use crate::platform::{BaseDirOutputLocator, OutputLocator, SiblingOutputLocator};
use crate::processors::batch::{spawn_batch, BatchEvent, BatchReport, BatchRequest};
use crate::processors::conversion::{convert_file, ArtifactPaths};
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "laser-pipeline")]
#[command(about = "Interferometer log conversion pipeline", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by the conversion subcommands; unset flags keep config values.
#[derive(clap::Args)]
struct ConversionArgs {
    /// Displacement reference mode: absolute or relative
    #[arg(short, long)]
    mode: Option<ConversionMode>,

    /// Sampling frequency in Hz used to rebuild the time axis
    #[arg(short = 'f', long)]
    sample_freq: Option<f64>,

    /// Number of leading samples in the zoom plot
    #[arg(short, long)]
    zoom_points: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert every .txt log under a directory, mirroring its layout
    Batch {
        /// Directory containing raw .txt logs
        input_dir: PathBuf,
        /// Output root (defaults to output_<input name> next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Put the default output_<input name> folder under this directory instead
        #[arg(long, conflicts_with = "output")]
        output_base: Option<PathBuf>,
        /// Keep going when a file fails and report failures at the end
        #[arg(long)]
        continue_on_error: bool,
        #[command(flatten)]
        conversion: ConversionArgs,
    },

    /// Convert a single .txt log
    File {
        /// Raw .txt log
        input: PathBuf,
        /// Output directory (defaults to the input's directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        #[command(flatten)]
        conversion: ConversionArgs,
    },

    /// Write the default configuration as YAML
    InitConfig {
        /// Destination file
        #[arg(default_value = "laser-pipeline.yaml")]
        path: PathBuf,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Create a bar for the per-file batch loop
fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} {pos}/{len} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb.set_message("Starting...");
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<60} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 37 {
            let head: String = value.chars().take(34).collect();
            format!("{}...", head)
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<37} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    // Dispatch to subcommands
    let outcome = match cli.command {
        Commands::Batch {
            input_dir,
            output,
            output_base,
            continue_on_error,
            conversion,
        } => apply_overrides(config, &conversion, continue_on_error).and_then(|config| {
            cmd_batch(&input_dir, output, output_base, config)
        }),
        Commands::File {
            input,
            output_dir,
            conversion,
        } => apply_overrides(config, &conversion, false)
            .and_then(|config| cmd_file(&input, output_dir, &config)),
        Commands::InitConfig { path } => cmd_init_config(&path, &config),
    };

    if let Err(e) = outcome {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn apply_overrides(
    mut config: PipelineConfig,
    args: &ConversionArgs,
    continue_on_error: bool,
) -> anyhow::Result<PipelineConfig> {
    if let Some(mode) = args.mode {
        config.conversion.mode = mode;
    }
    if let Some(freq) = args.sample_freq {
        config.conversion.sample_frequency_hz = freq;
    }
    if let Some(points) = args.zoom_points {
        config.conversion.zoom_points = points;
    }
    if continue_on_error {
        config.conversion.failure_policy = FailurePolicy::Continue;
    }
    config.validate()?;
    Ok(config)
}

fn cmd_batch(
    input_dir: &Path,
    output: Option<PathBuf>,
    output_base: Option<PathBuf>,
    config: PipelineConfig,
) -> anyhow::Result<()> {
    let start = Instant::now();

    // Relative inputs like "." have no file name to derive a default from.
    let resolved_input = input_dir
        .canonicalize()
        .unwrap_or_else(|_| input_dir.to_path_buf());
    let output_root = match (output, output_base) {
        (Some(path), _) => path,
        (None, Some(base)) => BaseDirOutputLocator { base }
            .output_root_for(&resolved_input)
            .ok_or_else(|| no_default_output(input_dir))?,
        (None, None) => SiblingOutputLocator
            .output_root_for(&resolved_input)
            .ok_or_else(|| no_default_output(input_dir))?,
    };

    println!("Converting raw logs in batch mode...");
    println!("Input directory: {}", input_dir.display());
    println!("Output directory: {}", output_root.display());
    println!(
        "Mode: {}, sample freq: {} Hz, zoom points: {}",
        config.conversion.mode, config.conversion.sample_frequency_hz, config.conversion.zoom_points
    );

    let mode = config.conversion.mode;
    let handle = spawn_batch(BatchRequest {
        input_root: input_dir.to_path_buf(),
        output_root: output_root.clone(),
        config,
    })?;

    let pb = create_progress_bar();
    let mut outcome: anyhow::Result<BatchReport> =
        Err(anyhow::anyhow!("batch worker exited without a result"));

    for event in handle.events().iter() {
        match event {
            BatchEvent::Progress {
                done,
                total,
                message,
            } => {
                pb.set_length(total as u64);
                pb.set_position(done as u64);
                pb.set_message(message);
            }
            BatchEvent::Finished(report) => outcome = Ok(report),
            BatchEvent::Failed(e) => outcome = Err(e.into()),
        }
    }
    pb.finish_and_clear();
    handle.join()?;

    let report = outcome?;
    for failure in &report.failures {
        error!("{}: {}", failure.relative_path.display(), failure.message);
    }

    print_summary(
        "Batch Conversion Complete",
        &[
            ("Input directory", input_dir.display().to_string()),
            ("Output directory", output_root.display().to_string()),
            ("Mode", mode.to_string()),
            ("Files converted", format!("{}/{}", report.converted.len(), report.total)),
            ("Files failed", report.failures.len().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    if !report.failures.is_empty() {
        anyhow::bail!("{} file(s) failed to convert", report.failures.len());
    }
    Ok(())
}

fn cmd_file(input: &Path, output_dir: Option<PathBuf>, config: &PipelineConfig) -> anyhow::Result<()> {
    let start = Instant::now();

    let output_dir = output_dir.unwrap_or_else(|| {
        input
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    });
    let artifacts = ArtifactPaths::for_input(input, &output_dir, config.conversion.mode)?;

    println!("Converting single file...");
    println!("Input: {}", input.display());
    println!("Output directory: {}", output_dir.display());

    let spinner = create_spinner("Converting and plotting...");
    let result = convert_file(input, &artifacts, config);
    spinner.finish_and_clear();
    let job = result?;

    print_summary(
        "Conversion Complete",
        &[
            ("Input file", input.display().to_string()),
            ("Output CSV", artifacts.csv.display().to_string()),
            ("Samples", job.len().to_string()),
            ("Zoom samples", job.zoom_count.to_string()),
            ("Mode", job.mode.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    Ok(())
}

fn cmd_init_config(path: &Path, config: &PipelineConfig) -> anyhow::Result<()> {
    config
        .to_yaml(path)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    println!("Wrote configuration to {}", path.display());
    Ok(())
}

fn no_default_output(input_dir: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "cannot derive an output directory from '{}'; pass --output",
        input_dir.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides(args: &[&str]) -> PipelineConfig {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::File { conversion, .. } => {
                apply_overrides(PipelineConfig::default(), &conversion, false).unwrap()
            }
            _ => panic!("expected file subcommand"),
        }
    }

    #[test]
    fn test_mode_flag_parsing() {
        let config = overrides(&["laser-pipeline", "file", "run.txt", "--mode", "abs"]);
        assert_eq!(config.conversion.mode, ConversionMode::Absolute);

        let config = overrides(&["laser-pipeline", "file", "run.txt", "-m", "Relative"]);
        assert_eq!(config.conversion.mode, ConversionMode::Relative);

        assert!(Cli::try_parse_from(["laser-pipeline", "file", "run.txt", "-m", "sideways"]).is_err());
    }

    #[test]
    fn test_unset_flags_keep_config() {
        let config = overrides(&["laser-pipeline", "file", "run.txt", "-f", "1200"]);
        assert_eq!(config.conversion.mode, ConversionMode::Relative);
        assert_eq!(config.conversion.sample_frequency_hz, 1200.0);
    }
}
