//! Audio Batch Converter - command line front end
//!
//! Converts files or whole folders between MP3, WAV, M4A and FLAC using
//! ffmpeg, and manages the saved ffmpeg location.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::LevelFilter;

use audio_batch_converter::audio::{SUPPORTED_EXTENSIONS, collect_audio_files};
use audio_batch_converter::conversion::{JobStatus, apply_format_to_all};
use audio_batch_converter::logging::init_logging;
use audio_batch_converter::{
    BatchObserver, BatchSettings, ConversionError, ConversionOrchestrator, EncoderLocator,
    JobDescriptor, JsonPathStore,
};

#[derive(Parser, Debug)]
#[command(name = "audio-batch")]
#[command(about = "Batch convert audio files with ffmpeg", long_about = None)]
struct Cli {
    /// Settings file holding the ffmpeg path (defaults to the user data dir)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Show ffmpeg output and debug messages on the terminal
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert files and folders
    Convert {
        /// Files or folders to convert; folders are searched recursively
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Target format: mp3, wav, m4a or flac
        #[arg(short, long, default_value = "mp3")]
        format: String,

        /// Output folder
        #[arg(short, long)]
        out: PathBuf,

        /// Audio bitrate, e.g. "192 kbps" or 192k
        #[arg(short, long)]
        bitrate: Option<String>,

        /// Sample rate, e.g. "44100 Hz" or 44100
        #[arg(short, long)]
        sample_rate: Option<String>,

        /// Mono or Stereo
        #[arg(short, long)]
        channels: Option<String>,
    },

    /// Show or change the ffmpeg location
    Encoder {
        #[command(subcommand)]
        action: EncoderAction,
    },
}

#[derive(Subcommand, Debug)]
enum EncoderAction {
    /// Print the configured ffmpeg path
    Show,
    /// Save a new ffmpeg path; an empty string clears it
    Set { path: String },
    /// Check that the configured ffmpeg runs
    Check,
}

/// Prints aggregate progress whenever it crosses a whole percent
struct TerminalProgress {
    last_percent: Mutex<Option<u32>>,
}

impl BatchObserver for TerminalProgress {
    fn on_aggregate_progress(&self, progress: f64) {
        let percent = (progress * 100.0).floor() as u32;
        let mut last = self.last_percent.lock().unwrap_or_else(|e| e.into_inner());
        if *last != Some(percent) {
            *last = Some(percent);
            println!("Overall progress: {}%", percent);
        }
    }

    fn on_job_finished(&self, descriptor: &JobDescriptor) {
        println!("  {} - {}", descriptor.file_name(), descriptor.status());
    }

    fn on_job_error(&self, descriptor: &JobDescriptor, error: &ConversionError) {
        log::error!("{}: {}", descriptor.file_name(), error);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    init_logging(level);

    let store = match &cli.settings {
        Some(path) => JsonPathStore::at(path),
        None => JsonPathStore::user_default().context("Could not locate the settings file")?,
    };
    let locator = Arc::new(EncoderLocator::new(Arc::new(store)));

    match cli.command {
        Command::Encoder { action } => run_encoder(&locator, action),
        Command::Convert {
            inputs,
            format,
            out,
            bitrate,
            sample_rate,
            channels,
        } => {
            // Unset options become blank labels, which add no ffmpeg flag
            let settings = BatchSettings::new(out, &format.to_lowercase()).with_labels(
                bitrate.as_deref().unwrap_or(""),
                sample_rate.as_deref().unwrap_or(""),
                channels.as_deref().unwrap_or(""),
            );
            run_convert(locator, &inputs, settings)
        }
    }
}

fn run_encoder(locator: &EncoderLocator, action: EncoderAction) -> Result<()> {
    match action {
        EncoderAction::Show => {
            if locator.is_configured() {
                println!("{}", locator.path());
            } else {
                println!("ffmpeg is not set");
            }
        }
        EncoderAction::Set { path } => {
            locator
                .set_path(path.trim())
                .context("Failed to save ffmpeg path")?;
            if path.trim().is_empty() {
                println!("Cleared ffmpeg path");
            } else {
                println!("Saved ffmpeg path: {}", path.trim());
            }
        }
        EncoderAction::Check => {
            let path = locator.require_available()?;
            println!("ffmpeg OK: {}", path);
        }
    }
    Ok(())
}

fn run_convert(
    locator: Arc<EncoderLocator>,
    inputs: &[PathBuf],
    settings: BatchSettings,
) -> Result<()> {
    if !SUPPORTED_EXTENSIONS.contains(&settings.default_format.as_str()) {
        bail!(
            "Unsupported format \"{}\" (expected one of: {})",
            settings.default_format,
            SUPPORTED_EXTENSIONS.join(", ")
        );
    }

    let files = collect_audio_files(inputs);
    if files.is_empty() {
        bail!("No audio files found");
    }

    let mut descriptors = Vec::with_capacity(files.len());
    for file in &files {
        let descriptor = JobDescriptor::from_path(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        descriptors.push(Arc::new(descriptor));
    }
    apply_format_to_all(&descriptors, &settings.default_format);

    let orchestrator = ConversionOrchestrator::new(locator);
    let observer = Arc::new(TerminalProgress {
        last_percent: Mutex::new(None),
    });

    let batch = orchestrator.start_conversions(&descriptors, settings, observer)?;
    for descriptor in batch.descriptors() {
        let status = descriptor.status();
        if status.is_skipped() {
            println!("  {} - {}", descriptor.file_name(), status);
        }
    }
    batch.wait();

    let converted = descriptors
        .iter()
        .filter(|d| d.status() == JobStatus::Success)
        .count();
    let skipped = descriptors.iter().filter(|d| d.status().is_skipped()).count();
    let failed = descriptors.len() - converted - skipped;
    println!(
        "Done: {} converted, {} skipped, {} failed",
        converted, skipped, failed
    );

    if failed > 0 {
        bail!("{} file(s) could not be converted", failed);
    }
    Ok(())
}
