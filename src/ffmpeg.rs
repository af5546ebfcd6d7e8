// Conversion collaborator: audio probing and MP3 extraction through the
// ffmpeg executable.

use crate::deps;
use crate::error::{MissingDependencyError, StageError};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Audio track extraction from a downloaded container.
pub trait AudioExtractor {
    /// Whether `container` carries at least one audio stream.
    fn has_audio(&self, container: &Path) -> Result<bool, StageError>;

    /// Write the audio of `container` to `output`.
    fn extract_audio(&self, container: &Path, output: &Path) -> Result<(), StageError>;
}

impl<T: AudioExtractor + ?Sized> AudioExtractor for &T {
    fn has_audio(&self, container: &Path) -> Result<bool, StageError> {
        (**self).has_audio(container)
    }

    fn extract_audio(&self, container: &Path, output: &Path) -> Result<(), StageError> {
        (**self).extract_audio(container, output)
    }
}

/// Streams listed by `ffmpeg -i`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub total: usize,
    pub audio: usize,
}

/// Count `Stream #` lines in ffmpeg's input dump, and how many are audio.
pub fn parse_streams(stderr: &str) -> StreamSummary {
    stderr
        .lines()
        .map(str::trim_start)
        .filter(|line| line.starts_with("Stream #"))
        .fold(StreamSummary::default(), |mut summary, line| {
            summary.total += 1;
            if line.contains(": Audio:") {
                summary.audio += 1;
            }
            summary
        })
}

#[derive(Clone, Debug)]
pub struct Ffmpeg {
    bin: String,
}

impl Ffmpeg {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    pub fn check_installed(&self) -> Result<(), MissingDependencyError> {
        deps::ensure_available(&self.bin, "-version")
    }

    fn extract_args(container: &Path, output: &Path) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-nostdin", "-loglevel", "error", "-y", "-i"]
            .map(str::to_string)
            .to_vec();
        args.push(container.to_string_lossy().into_owned());
        args.extend(
            ["-vn", "-map", "0:a:0", "-codec:a", "libmp3lame", "-q:a", "2", "-f", "mp3"]
                .map(str::to_string),
        );
        args.push(output.to_string_lossy().into_owned());
        args
    }
}

/// Hidden sibling ffmpeg writes to; it only replaces `output` once the
/// encode succeeded, so a failed run never touches an existing MP3.
fn partial_path(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    output.with_file_name(format!(".{name}.partial"))
}

fn remove_partial(partial: &Path) {
    if partial.exists() {
        if let Err(e) = fs::remove_file(partial) {
            tracing::warn!(path = %partial.display(), error = %e, "could not remove partial audio file");
        }
    }
}

impl AudioExtractor for Ffmpeg {
    fn has_audio(&self, container: &Path) -> Result<bool, StageError> {
        // Without an output file ffmpeg exits non-zero after dumping the
        // input streams, so only the dump matters here.
        let output = Command::new(&self.bin)
            .args(["-hide_banner", "-nostdin", "-i"])
            .arg(container)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| StageError::Conversion(format!("failed to run {}: {e}", self.bin)))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let streams = parse_streams(&stderr);
        tracing::debug!(container = %container.display(), ?streams, "probed container");

        if streams.total == 0 {
            let reason = stderr
                .lines()
                .rev()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .unwrap_or("no streams found");
            return Err(StageError::Conversion(format!(
                "could not read {}: {reason}",
                container.display()
            )));
        }

        Ok(streams.audio > 0)
    }

    fn extract_audio(&self, container: &Path, output: &Path) -> Result<(), StageError> {
        let partial = partial_path(output);
        let args = Self::extract_args(container, &partial);
        tracing::debug!(bin = %self.bin, ?args, "extracting audio");

        let result = Command::new(&self.bin)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| StageError::Conversion(format!("failed to run {}: {e}", self.bin)))?;

        if !result.status.success() {
            remove_partial(&partial);
            let stderr = String::from_utf8_lossy(&result.stderr);
            let reason = stderr
                .lines()
                .rev()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("ffmpeg exited with {}", result.status));
            return Err(StageError::Conversion(reason));
        }

        fs::rename(&partial, output).map_err(|e| {
            remove_partial(&partial);
            StageError::Conversion(format!("could not save {}: {e}", output.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WITH_AUDIO: &str = "\
Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'Test.mp4':
  Metadata:
    major_brand     : isom
  Duration: 00:00:19.06, start: 0.000000, bitrate: 493 kb/s
  Stream #0:0[0x1](und): Video: h264 (High) (avc1 / 0x31637661), yuv420p, 320x240, 400 kb/s, 30 fps
  Stream #0:1[0x2](und): Audio: aac (LC) (mp4a / 0x6134706D), 44100 Hz, stereo, fltp, 87 kb/s (default)
At least one output file must be specified
";

    const VIDEO_ONLY: &str = "\
Input #0, matroska,webm, from 'Silent.webm':
  Duration: 00:00:05.00, start: 0.000000, bitrate: 120 kb/s
  Stream #0:0: Video: vp9 (Profile 0), yuv420p(tv), 640x360, SAR 1:1 DAR 16:9, 25 fps
At least one output file must be specified
";

    #[test]
    fn counts_audio_streams() {
        assert_eq!(parse_streams(WITH_AUDIO), StreamSummary { total: 2, audio: 1 });
    }

    #[test]
    fn video_only_has_no_audio() {
        assert_eq!(parse_streams(VIDEO_ONLY), StreamSummary { total: 1, audio: 0 });
    }

    #[test]
    fn unreadable_input_has_no_streams() {
        let stderr = "broken.mp4: Invalid data found when processing input\n";
        assert_eq!(parse_streams(stderr), StreamSummary::default());
    }

    #[test]
    fn extract_args_encode_mp3() {
        let args = Ffmpeg::extract_args(
            &PathBuf::from("downloads/Test.webm"),
            &PathBuf::from("downloads/Test.mp3"),
        );

        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
        assert_eq!(args[pos("-i") + 1], "downloads/Test.webm");
        assert_eq!(args[pos("-codec:a") + 1], "libmp3lame");
        assert_eq!(args[pos("-f") + 1], "mp3");
        assert!(args.contains(&"-vn".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("downloads/Test.mp3"));
    }

    #[test]
    fn partial_output_is_a_hidden_sibling() {
        assert_eq!(
            partial_path(Path::new("downloads/Test.mp3")),
            PathBuf::from("downloads/.Test.mp3.partial")
        );
    }

    /// Executable shell script standing in for ffmpeg.
    #[cfg(unix)]
    fn stand_in(dir: &Path, body: &str) -> Ffmpeg {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-ffmpeg");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        Ffmpeg::new(path.to_string_lossy())
    }

    #[cfg(unix)]
    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[cfg(unix)]
    #[test]
    fn failed_extraction_keeps_existing_mp3() {
        let temp = tempfile::tempdir().unwrap();
        let tools = tempfile::tempdir().unwrap();
        let ffmpeg = stand_in(
            tools.path(),
            "echo \"Unknown encoder 'libmp3lame'\" >&2; exit 1",
        );
        let container = temp.path().join("Test.mp4");
        let output = temp.path().join("Test.mp3");
        fs::write(&container, b"container").unwrap();
        fs::write(&output, b"earlier run").unwrap();

        let err = ffmpeg.extract_audio(&container, &output).unwrap_err();

        assert!(
            matches!(&err, StageError::Conversion(reason) if reason.contains("Unknown encoder")),
            "unexpected error: {err:?}"
        );
        assert_eq!(fs::read(&output).unwrap(), b"earlier run");
        assert_eq!(dir_entries(temp.path()), vec!["Test.mp3", "Test.mp4"]);
    }

    #[cfg(unix)]
    #[test]
    fn failed_extraction_removes_its_own_output() {
        let temp = tempfile::tempdir().unwrap();
        let tools = tempfile::tempdir().unwrap();
        // Writes to its last argument, then fails mid-encode.
        let ffmpeg = stand_in(
            tools.path(),
            "for last; do :; done; printf half > \"$last\"; echo 'Conversion failed!' >&2; exit 1",
        );
        let container = temp.path().join("Test.mp4");
        let output = temp.path().join("Test.mp3");
        fs::write(&container, b"container").unwrap();

        let err = ffmpeg.extract_audio(&container, &output).unwrap_err();

        assert!(matches!(err, StageError::Conversion(_)));
        assert_eq!(dir_entries(temp.path()), vec!["Test.mp4"]);
    }

    #[cfg(unix)]
    #[test]
    fn successful_extraction_replaces_output() {
        let temp = tempfile::tempdir().unwrap();
        let tools = tempfile::tempdir().unwrap();
        let ffmpeg = stand_in(tools.path(), "for last; do :; done; printf new > \"$last\"");
        let container = temp.path().join("Test.mp4");
        let output = temp.path().join("Test.mp3");
        fs::write(&container, b"container").unwrap();
        fs::write(&output, b"old").unwrap();

        ffmpeg.extract_audio(&container, &output).unwrap();

        assert_eq!(fs::read(&output).unwrap(), b"new");
        assert_eq!(dir_entries(temp.path()), vec!["Test.mp3", "Test.mp4"]);
    }
}
