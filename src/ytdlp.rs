// Download collaborator: metadata queries and downloads through the yt-dlp
// executable.

use crate::config::Config;
use crate::deps;
use crate::error::{MissingDependencyError, StageError};
use crate::plan::FALLBACK_BASE_NAME;
use crate::progress::ProgressEvent;
use serde::Deserialize;
use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::thread;

/// Best video and best audio merged, or the best single file.
pub const FORMAT_SELECTOR: &str = "bestvideo+bestaudio/best";

const PROGRESS_PREFIX: &str = "YTCONVERT_PROGRESS";

const PROGRESS_TEMPLATE: &str = "download:YTCONVERT_PROGRESS|%(progress.status)s|%(progress.downloaded_bytes)s|%(progress.total_bytes)s|%(progress.total_bytes_estimate)s";

/// Title and channel of a video, fetched without downloading it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoMetadata {
    pub title: String,
    pub uploader: String,
}

/// Fields read from yt-dlp's info JSON.
#[derive(Debug, Default, Deserialize)]
struct InfoJson {
    title: Option<String>,
    uploader: Option<String>,
}

impl From<InfoJson> for VideoMetadata {
    fn from(info: InfoJson) -> Self {
        Self {
            title: info.title.unwrap_or_else(|| FALLBACK_BASE_NAME.to_string()),
            uploader: info.uploader.unwrap_or_else(|| "Unknown".to_string()),
        }
    }
}

/// Source of video metadata and files.
pub trait MediaSource {
    /// Query title and uploader without downloading anything.
    fn fetch_metadata(&self, url: &str) -> Result<VideoMetadata, StageError>;

    /// Download `url` to `output_template` (`%(ext)s` is filled in by the
    /// source), reporting progress as it goes.
    fn download(
        &self,
        url: &str,
        output_template: &str,
        on_progress: &mut dyn FnMut(ProgressEvent),
    ) -> Result<(), StageError>;
}

impl<T: MediaSource + ?Sized> MediaSource for &T {
    fn fetch_metadata(&self, url: &str) -> Result<VideoMetadata, StageError> {
        (**self).fetch_metadata(url)
    }

    fn download(
        &self,
        url: &str,
        output_template: &str,
        on_progress: &mut dyn FnMut(ProgressEvent),
    ) -> Result<(), StageError> {
        (**self).download(url, output_template, on_progress)
    }
}

/// `yt-dlp` child-process runner.
#[derive(Clone, Debug)]
pub struct YtDlp {
    bin: String,
    ffmpeg_location: Option<String>,
}

impl YtDlp {
    pub fn new(bin: impl Into<String>) -> Self {
        Self {
            bin: bin.into(),
            ffmpeg_location: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            bin: config.ytdlp_bin.clone(),
            ffmpeg_location: config.ffmpeg_location().map(str::to_string),
        }
    }

    pub fn check_installed(&self) -> Result<(), MissingDependencyError> {
        deps::ensure_available(&self.bin, "--version")
    }

    fn metadata_args(url: &str) -> Vec<String> {
        ["--dump-single-json", "--no-playlist", "--no-warnings", "--", url]
            .map(str::to_string)
            .to_vec()
    }

    fn download_args(&self, url: &str, output_template: &str) -> Vec<String> {
        let mut args: Vec<String> = [
            "-f",
            FORMAT_SELECTOR,
            "--no-playlist",
            "--no-warnings",
            "--newline",
            "--progress",
            "--progress-template",
            PROGRESS_TEMPLATE,
            "-o",
            output_template,
        ]
        .map(str::to_string)
        .to_vec();

        if let Some(location) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".to_string());
            args.push(location.clone());
        }

        // Keep a URL starting with `-` from being read as an option.
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }
}

impl MediaSource for YtDlp {
    fn fetch_metadata(&self, url: &str) -> Result<VideoMetadata, StageError> {
        let args = Self::metadata_args(url);
        tracing::debug!(bin = %self.bin, ?args, "querying metadata");

        let output = Command::new(&self.bin)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| StageError::MetadataFetch(format!("failed to run {}: {e}", self.bin)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StageError::MetadataFetch(failure_reason(
                &stderr,
                output.status.code(),
            )));
        }

        parse_metadata(&output.stdout)
    }

    fn download(
        &self,
        url: &str,
        output_template: &str,
        on_progress: &mut dyn FnMut(ProgressEvent),
    ) -> Result<(), StageError> {
        let args = self.download_args(url, output_template);
        tracing::debug!(bin = %self.bin, ?args, "starting download");

        let mut child = Command::new(&self.bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| StageError::Download(format!("failed to start {}: {e}", self.bin)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| StageError::Download("failed to capture yt-dlp output".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| StageError::Download("failed to capture yt-dlp errors".to_string()))?;

        // Drained on its own thread so a chatty stderr cannot stall the child.
        let stderr_reader = thread::spawn(move || {
            let mut raw = Vec::new();
            let _ = BufReader::new(stderr).read_to_end(&mut raw);
            String::from_utf8_lossy(&raw).into_owned()
        });

        let mut reader = BufReader::new(stdout);
        let mut buffer = Vec::new();
        loop {
            buffer.clear();
            match reader.read_until(b'\n', &mut buffer) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buffer);
                    match parse_progress_line(&line) {
                        Some(event) => on_progress(event),
                        None => tracing::trace!(line = %line.trim_end(), "yt-dlp"),
                    }
                }
                Err(e) => {
                    // Nobody reads stdout any more; stop the child before it
                    // blocks on a full pipe.
                    tracing::warn!(error = %e, "failed to read yt-dlp output");
                    if let Err(e) = child.kill() {
                        tracing::warn!(error = %e, "failed to stop yt-dlp");
                    }
                    break;
                }
            }
        }

        let status = child
            .wait()
            .map_err(|e| StageError::Download(format!("yt-dlp did not finish: {e}")))?;
        let stderr = stderr_reader.join().unwrap_or_default();

        if !status.success() {
            return Err(StageError::Download(failure_reason(&stderr, status.code())));
        }

        Ok(())
    }
}

fn parse_metadata(stdout: &[u8]) -> Result<VideoMetadata, StageError> {
    serde_json::from_slice::<InfoJson>(stdout)
        .map(VideoMetadata::from)
        .map_err(|e| StageError::MetadataFetch(format!("unreadable video information: {e}")))
}

/// Parse one `--progress-template` line. Fields yt-dlp cannot fill are `NA`.
pub fn parse_progress_line(line: &str) -> Option<ProgressEvent> {
    let mut fields = line.trim().split('|');
    if fields.next()? != PROGRESS_PREFIX {
        return None;
    }

    let status = fields.next()?;
    let downloaded = parse_bytes(fields.next()?);
    let total = parse_bytes(fields.next().unwrap_or("NA"));
    let estimate = parse_bytes(fields.next().unwrap_or("NA"));

    match status {
        "finished" => Some(ProgressEvent::Finished),
        "downloading" => Some(ProgressEvent::Downloading {
            downloaded_bytes: downloaded?,
            total_bytes: total.or(estimate),
        }),
        _ => None,
    }
}

/// Byte counts come as integers, estimates as floats.
fn parse_bytes(field: &str) -> Option<u64> {
    let value: f64 = field.trim().parse().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value as u64)
}

/// Last `ERROR:` line from yt-dlp, else the last non-empty line, else the
/// exit code.
fn failure_reason(stderr: &str, code: Option<i32>) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    lines
        .iter()
        .rev()
        .find(|l| l.starts_with("ERROR:"))
        .or(lines.last())
        .map(|l| l.trim_start_matches("ERROR:").trim().to_string())
        .unwrap_or_else(|| match code {
            Some(code) => format!("yt-dlp exited with code {code}"),
            None => "yt-dlp was terminated by a signal".to_string(),
        })
}
