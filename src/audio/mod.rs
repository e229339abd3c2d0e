// Audio module - source file detection and sizing

pub mod detection;

pub use detection::{collect_audio_files, format_size, is_audio_file, SUPPORTED_EXTENSIONS};
