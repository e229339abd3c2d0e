//! Argument lists for ffmpeg and ffprobe
//!
//! Argument order is fixed so invocations are reproducible.

use std::ffi::OsString;
use std::path::Path;

use crate::conversion::BatchSettings;

/// Map a channel label to the `-ac` value: "Mono" is 1, anything else 2
pub fn channel_count(label: &str) -> &'static str {
    if label == "Mono" { "1" } else { "2" }
}

/// Build the ffmpeg arguments for one conversion
///
/// ```text
/// -y -hide_banner -stats -i <input> -vn [-b:a <bitrate>] [-ar <rate>] [-ac 1|2] [-c:a aac] <output>
/// ```
/// `-c:a aac` is only added for an `m4a` target.
pub fn build_encoder_args(
    input: &Path,
    output: &Path,
    target_format: &str,
    settings: &BatchSettings,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-y".into(),
        "-hide_banner".into(),
        "-stats".into(),
        "-i".into(),
        input.as_os_str().to_owned(),
        "-vn".into(),
    ];

    if let Some(bitrate) = non_blank(settings.bitrate.as_deref()) {
        args.push("-b:a".into());
        args.push(bitrate.into());
    }

    if let Some(rate) = non_blank(settings.sample_rate.as_deref()) {
        args.push("-ar".into());
        args.push(rate.into());
    }

    if let Some(channels) = non_blank(settings.channels.as_deref()) {
        args.push("-ac".into());
        args.push(channel_count(channels).into());
    }

    if target_format.eq_ignore_ascii_case("m4a") {
        args.push("-c:a".into());
        args.push("aac".into());
    }

    args.push(output.as_os_str().to_owned());
    args
}

/// Build the ffprobe arguments that print only the container duration
pub fn build_probe_args(input: &Path) -> Vec<OsString> {
    vec![
        "-v".into(),
        "error".into(),
        "-show_entries".into(),
        "format=duration".into(),
        "-of".into(),
        "default=noprint_wrappers=1:nokey=1".into(),
        input.as_os_str().to_owned(),
    ]
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
