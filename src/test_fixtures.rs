//! Test fixtures for process supervision tests
//!
//! Writes small shell scripts that stand in for ffmpeg and ffprobe, so jobs
//! can be run end to end without the real binaries. Every fake ffmpeg call
//! appends its arguments to `invocations.log` next to the script, which lets
//! tests assert whether a process was spawned at all.

#![cfg(all(test, unix))]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Emits two progress markers on stderr, writes the output, exits 0
pub const ENCODE_OK: &str = r#"
printf 'Input #0, mp3, from input:\n' >&2
printf 'size=N/A time=00:00:01.00 bitrate=N/A speed=1x\r' >&2
printf 'size=N/A time=00:00:02.00 bitrate=N/A speed=1x\r' >&2
printf 'converted' > "$last"
exit 0
"#;

/// Writes a partial output, then exits 3
pub const ENCODE_FAIL: &str = r#"
printf 'size=N/A time=00:00:01.00 bitrate=N/A\r' >&2
printf 'partial' > "$last"
printf 'Conversion failed!\n' >&2
exit 3
"#;

/// Reports one marker, then blocks until killed
pub const ENCODE_SLOW: &str = r#"
printf 'partial' > "$last"
printf 'size=N/A time=00:00:01.00 bitrate=N/A\r' >&2
exec sleep 30
"#;

/// Write an executable `#!/bin/sh` script into `dir`
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("Failed to write script");
    let mut permissions = std::fs::metadata(&path)
        .expect("Failed to stat script")
        .permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&path, permissions).expect("Failed to chmod script");
    path
}

/// Write a fake `ffmpeg` into `dir`
///
/// `body` runs with `$last` set to the final argument (the output path).
pub fn fake_encoder(dir: &Path, body: &str) -> PathBuf {
    let script = format!(
        "echo \"$@\" >> \"$(dirname \"$0\")/invocations.log\"\nfor last; do :; done\n{}",
        body
    );
    write_script(dir, "ffmpeg", &script)
}

/// Write a fake `ffprobe` into `dir` that prints `duration`
pub fn fake_probe(dir: &Path, duration: &str) -> PathBuf {
    write_script(dir, "ffprobe", &format!("printf '%s\\n' '{}'", duration))
}

/// How many times the fake ffmpeg in `dir` was started
pub fn invocation_count(dir: &Path) -> usize {
    std::fs::read_to_string(dir.join("invocations.log"))
        .map(|log| log.lines().count())
        .unwrap_or(0)
}
