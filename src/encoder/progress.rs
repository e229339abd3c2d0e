//! Progress scanning for ffmpeg output
//!
//! ffmpeg rewrites its `-stats` line in place with `\r`, so the output is
//! split on both carriage returns and newlines before matching.

use regex::Regex;
use std::io::{self, BufRead};
use std::sync::LazyLock;

static TIME_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"time=(\d+):(\d{2}):(\d{2})\.(\d+)").unwrap());

/// Elapsed media seconds from a `time=HH:MM:SS.ff` marker, if the line has one
pub fn parse_time_marker(line: &str) -> Option<f64> {
    let cap = TIME_MARKER.captures(line)?;
    let hours: f64 = cap.get(1)?.as_str().parse().ok()?;
    let minutes: f64 = cap.get(2)?.as_str().parse().ok()?;
    let seconds: f64 = cap.get(3)?.as_str().parse().ok()?;
    let fraction: f64 = format!("0.{}", cap.get(4)?.as_str()).parse().ok()?;

    Some(hours * 3600.0 + minutes * 60.0 + seconds + fraction)
}

/// Fraction complete, clamped to `[0.0, 1.0]`
///
/// A non-positive `duration` is treated as 1.0, matching the fallback used
/// when probing fails.
pub fn progress_fraction(elapsed: f64, duration: f64) -> f64 {
    let denominator = if duration > 0.0 { duration } else { 1.0 };
    (elapsed / denominator).clamp(0.0, 1.0)
}

/// Iterator over output lines terminated by `\n`, `\r\n` or a bare `\r`
///
/// Empty segments are skipped and invalid UTF-8 is replaced.
pub struct OutputLines<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead> OutputLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
        }
    }

    fn next_segment(&mut self) -> io::Result<Option<String>> {
        self.buf.clear();
        loop {
            let available = match self.reader.fill_buf() {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            if available.is_empty() {
                // EOF: flush whatever is left
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()));
            }

            match available.iter().position(|b| *b == b'\n' || *b == b'\r') {
                Some(pos) => {
                    self.buf.extend_from_slice(&available[..pos]);
                    self.reader.consume(pos + 1);
                    if self.buf.is_empty() {
                        continue;
                    }
                    return Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()));
                }
                None => {
                    let len = available.len();
                    self.buf.extend_from_slice(available);
                    self.reader.consume(len);
                }
            }
        }
    }
}

impl<R: BufRead> Iterator for OutputLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_segment().transpose()
    }
}
