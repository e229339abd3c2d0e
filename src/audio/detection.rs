use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Source formats the converter accepts
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "flac"];

/// Check if a file is a supported audio file based on its extension
pub fn is_audio_file(path: &Path) -> bool {
    if let Some(ext) = path.extension() {
        let ext = ext.to_string_lossy().to_lowercase();
        SUPPORTED_EXTENSIONS.contains(&ext.as_str())
    } else {
        false
    }
}

/// Expand files and directories into a list of audio files
///
/// Files are kept if their extension is supported. Directories are walked
/// recursively, following links. Order within each directory is by file
/// name; inputs that do not exist are skipped with a warning.
pub fn collect_audio_files(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path();
                if path.is_file() && is_audio_file(path) {
                    files.push(path.to_path_buf());
                }
            }
        } else if input.is_file() {
            if is_audio_file(input) {
                files.push(input.clone());
            } else {
                log::warn!("Not a supported audio file: {}", input.display());
            }
        } else {
            log::warn!("No such file or directory: {}", input.display());
        }
    }

    files
}

/// Format bytes as a human-readable size (decimal units)
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1000;
    const MB: u64 = KB * 1000;
    const GB: u64 = MB * 1000;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
