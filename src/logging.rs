//! Logging configuration for Audio Batch Converter
//!
//! Logs are written to both the terminal and a file under the platform's
//! local data directory, e.g.
//! `~/.local/share/Audio Batch Converter/logs/audio-batch.log`.
//!
//! The file log captures ffmpeg's raw output at debug level, which is the
//! first thing to look at when a conversion fails.

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "Audio Batch Converter";
const LOG_FILE: &str = "audio-batch.log";

/// Rotate the log once it grows past this size
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Get the log directory path
/// On macOS: ~/Library/Logs/Audio Batch Converter/
pub fn get_log_directory() -> Option<PathBuf> {
    if cfg!(target_os = "macos") {
        dirs::home_dir().map(|h| h.join("Library").join("Logs").join(APP_DIR))
    } else {
        dirs::data_local_dir().map(|d| d.join(APP_DIR).join("logs"))
    }
}

/// Get the current log file path
pub fn get_log_file_path() -> Option<PathBuf> {
    get_log_directory().map(|d| d.join(LOG_FILE))
}

/// Initialize the logging system
///
/// Terminal output is filtered at `terminal_level`; the file always gets
/// debug and above. Falls back to terminal-only logging if the file cannot
/// be opened.
///
/// Returns the path to the log file on success
pub fn init_logging(terminal_level: LevelFilter) -> Option<PathBuf> {
    let log_dir = match get_log_directory() {
        Some(d) => d,
        None => {
            eprintln!("Warning: Could not determine log directory");
            init_terminal_only(terminal_level);
            return None;
        }
    };

    // Create log directory if it doesn't exist
    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Could not create log directory: {}", e);
        init_terminal_only(terminal_level);
        return None;
    }

    let log_path = log_dir.join(LOG_FILE);

    // Rotate old log if it's too large
    rotate_if_larger_than(&log_path, MAX_LOG_SIZE);

    // Open log file (append mode)
    let log_file = match OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not open log file: {}", e);
            // Fall back to terminal-only logging
            init_terminal_only(terminal_level);
            return None;
        }
    };

    // Configure logging format
    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_thread_level(LevelFilter::Off) // Don't show thread IDs
        .set_target_level(LevelFilter::Off) // Don't show module targets
        .build();

    // Set up combined logger (terminal + file)
    let loggers: Vec<Box<dyn SharedLogger>> = vec![
        // Terminal logger - info and above unless running verbose
        TermLogger::new(terminal_level, config.clone(), TerminalMode::Mixed, ColorChoice::Auto),
        // File logger - capture debug and above, including raw ffmpeg output
        WriteLogger::new(LevelFilter::Debug, config, log_file),
    ];

    if CombinedLogger::init(loggers).is_err() {
        eprintln!("Warning: Logger already initialized");
    }

    // Write session start marker
    log::info!("=== Audio Batch Converter session started ===");
    log::debug!("Log file: {}", log_path.display());

    Some(log_path)
}

/// Move `log_path` to `<name>.old` once it exceeds `max_size` bytes
fn rotate_if_larger_than(log_path: &Path, max_size: u64) {
    if let Ok(metadata) = fs::metadata(log_path)
        && metadata.len() > max_size
    {
        let mut backup = log_path.as_os_str().to_owned();
        backup.push(".old");
        let _ = fs::rename(log_path, backup);
    }
}

/// Initialize terminal-only logging (fallback if file logging fails)
fn init_terminal_only(level: LevelFilter) {
    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_thread_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .build();

    let term_logger = TermLogger::new(level, config, TerminalMode::Mixed, ColorChoice::Auto);
    let _ = CombinedLogger::init(vec![term_logger]);
}
