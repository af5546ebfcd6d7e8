// One download/convert iteration: metadata, plan, download, verify, convert,
// place. Every stage returns a `Result`; the first error ends the iteration
// and is handed back to the prompt loop.

use crate::config::{Config, StagedContainer};
use crate::console::{self, Tag};
use crate::error::{CopyError, StageError};
use crate::ffmpeg::AudioExtractor;
use crate::plan::{sanitize, Action, FilenameSource, OutputPlan, FALLBACK_BASE_NAME};
use crate::progress::{self, DownloadProgress};
use crate::ytdlp::{MediaSource, VideoMetadata};
use std::fs;
use std::path::{Path, PathBuf};

/// Everything the user entered for one iteration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRequest {
    pub url: String,
    pub filename_source: FilenameSource,
    /// Only read for [`FilenameSource::Custom`]
    pub custom_name: Option<String>,
    pub action: Action,
}

/// Files left behind by a completed iteration.
#[derive(Debug)]
pub struct IterationOutcome {
    pub base_name: String,
    pub uploader: String,
    pub video_file: Option<PathBuf>,
    pub audio_file: Option<PathBuf>,
    /// Placement problems that did not stop the iteration
    pub warnings: Vec<CopyError>,
}

/// Base filename for a request. A blank custom name, or one that sanitizes
/// to nothing, falls back to the title.
pub fn resolve_base_name(request: &SessionRequest, metadata: &VideoMetadata) -> String {
    let from_title = || non_empty(sanitize(&metadata.title));

    let name = match request.filename_source {
        FilenameSource::UseTitle => from_title(),
        FilenameSource::Custom => {
            match request.custom_name.as_deref().map(str::trim) {
                Some(custom) if !custom.is_empty() => {
                    non_empty(sanitize(custom)).or_else(from_title)
                }
                _ => {
                    console::status(
                        Tag::Warn,
                        "No filename entered. Using video title as fallback.",
                    );
                    from_title()
                }
            }
        }
    };

    name.unwrap_or_else(|| FALLBACK_BASE_NAME.to_string())
}

fn non_empty(name: String) -> Option<String> {
    (!name.is_empty()).then_some(name)
}

/// Drives one iteration against a download source and an audio extractor.
pub struct Session<S, A> {
    config: Config,
    source: S,
    extractor: A,
}

impl<S: MediaSource, A: AudioExtractor> Session<S, A> {
    pub fn new(config: Config, source: S, extractor: A) -> Self {
        Self {
            config,
            source,
            extractor,
        }
    }

    pub fn run(&self, request: &SessionRequest) -> Result<IterationOutcome, StageError> {
        let span = tracing::info_span!("iteration", url = %request.url, action = ?request.action);
        let _enter = span.enter();

        console::status(Tag::Info, "Fetching video information...");
        let metadata = self.source.fetch_metadata(&request.url)?;
        console::status(Tag::Info, format!("Channel: {}", metadata.uploader));

        let base_name = resolve_base_name(request, &metadata);
        console::status(Tag::Info, format!("Title: {base_name}"));
        tracing::info!(%base_name, uploader = %metadata.uploader, "metadata fetched");

        let plan = OutputPlan::resolve(request.action, &self.config);
        plan.prepare_dirs()?;

        let container = self.download(request, &plan, &base_name)?;

        let mut outcome = IterationOutcome {
            base_name,
            uploader: metadata.uploader,
            video_file: None,
            audio_file: None,
            warnings: Vec::new(),
        };

        if plan.produce_audio {
            let audio = plan.audio_path(&outcome.base_name);
            self.convert(&container, &audio)?;
            outcome.audio_file = Some(audio);
            self.place(&plan, container, &mut outcome);
        } else {
            outcome.video_file = Some(container);
        }

        tracing::info!(
            video = ?outcome.video_file,
            audio = ?outcome.audio_file,
            warnings = outcome.warnings.len(),
            "iteration complete"
        );
        Ok(outcome)
    }

    /// Download into the plan's folder and return the container actually
    /// written.
    fn download(
        &self,
        request: &SessionRequest,
        plan: &OutputPlan,
        base_name: &str,
    ) -> Result<PathBuf, StageError> {
        console::status(Tag::Download, format!("Starting download of {base_name}..."));

        let bar = DownloadProgress::new();
        let template = plan.output_template(base_name);
        let result = self
            .source
            .download(&request.url, &template, &mut |event| bar.update(event));

        match result {
            Ok(()) => bar.finish(),
            Err(e) => {
                bar.abandon();
                return Err(e);
            }
        }

        let container = plan
            .locate_container(base_name)
            .ok_or_else(|| StageError::MissingOutputFile {
                dir: plan.download_dir().to_path_buf(),
                base_name: base_name.to_string(),
            })?;
        tracing::info!(container = %container.display(), "download verified");

        if plan.produce_audio {
            console::status(Tag::Success, "Video downloaded successfully!");
        } else {
            console::status(
                Tag::Success,
                format!(
                    "Video downloaded successfully and saved to '{}' folder!",
                    plan.videos_dir.display()
                ),
            );
        }

        Ok(container)
    }

    fn convert(&self, container: &Path, audio: &Path) -> Result<(), StageError> {
        console::status(Tag::Converting, "Converting MP4 to MP3...");

        // Failures are reported once, by the prompt loop.
        if !self.extractor.has_audio(container)? {
            return Err(StageError::NoAudioTrack(container.to_path_buf()));
        }

        let spinner = progress::spinner("Converting");
        let result = self.extractor.extract_audio(container, audio);
        spinner.finish_and_clear();
        result?;

        console::status(Tag::Success, "Conversion to MP3 completed!");
        tracing::info!(audio = %audio.display(), "audio extracted");
        Ok(())
    }

    /// After a successful conversion: drop the container, or hand it over to
    /// the videos folder. Failures here are only warnings.
    fn place(&self, plan: &OutputPlan, container: PathBuf, outcome: &mut IterationOutcome) {
        if !plan.keep_container {
            match fs::remove_file(&container) {
                Ok(()) => console::status(
                    Tag::Info,
                    format!("Removed video file: {}", display_name(&container)),
                ),
                Err(source) => outcome.warnings.push(CopyError::Remove {
                    path: container,
                    source,
                }),
            }
            return;
        }

        if !plan.needs_transfer() || !container.starts_with(&plan.downloads_dir) {
            outcome.video_file = Some(container);
            return;
        }

        let Some(file_name) = container.file_name() else {
            outcome.video_file = Some(container);
            return;
        };
        let target = plan.videos_dir.join(file_name);

        let placed = match self.config.staged_container {
            StagedContainer::Copy => copy_file(&container, &target),
            StagedContainer::Move => move_file(&container, &target),
        };

        match placed {
            Ok(()) => {
                console::status(
                    Tag::Info,
                    format!(
                        "{} video file to '{}' folder.",
                        match self.config.staged_container {
                            StagedContainer::Copy => "Copied",
                            StagedContainer::Move => "Moved",
                        },
                        plan.videos_dir.display()
                    ),
                );
                outcome.video_file = Some(target);
            }
            Err(e) => {
                // The staged file is still usable where it is.
                outcome.video_file = Some(container);
                outcome.warnings.push(e);
            }
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn copy_file(from: &Path, to: &Path) -> Result<(), CopyError> {
    fs::copy(from, to)
        .map(|_| ())
        .map_err(|source| CopyError::Copy {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        })
}

/// Rename, or copy and remove when the folders live on different
/// filesystems.
fn move_file(from: &Path, to: &Path) -> Result<(), CopyError> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }

    fs::copy(from, to).map_err(|source| CopyError::Move {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })?;
    fs::remove_file(from).map_err(|source| CopyError::Remove {
        path: from.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(source: FilenameSource, custom: Option<&str>) -> SessionRequest {
        SessionRequest {
            url: "https://example.com/watch?v=1".to_string(),
            filename_source: source,
            custom_name: custom.map(str::to_string),
            action: Action::ConvertOnly,
        }
    }

    fn metadata(title: &str) -> VideoMetadata {
        VideoMetadata {
            title: title.to_string(),
            uploader: "someone".to_string(),
        }
    }

    #[test]
    fn title_is_sanitized() {
        let name = resolve_base_name(&request(FilenameSource::UseTitle, None), &metadata("My Video!"));
        assert_eq!(name, "My Video");
    }

    #[test]
    fn custom_name_wins() {
        let name = resolve_base_name(
            &request(FilenameSource::Custom, Some("  my: clip ")),
            &metadata("Title"),
        );
        assert_eq!(name, "my clip");
    }

    #[test]
    fn blank_custom_name_falls_back_to_title() {
        let meta = metadata("Clip_01");
        assert_eq!(
            resolve_base_name(&request(FilenameSource::Custom, Some("   ")), &meta),
            "Clip_01"
        );
        assert_eq!(
            resolve_base_name(&request(FilenameSource::Custom, None), &meta),
            "Clip_01"
        );
    }

    #[test]
    fn custom_name_is_ignored_for_title_source() {
        let name = resolve_base_name(
            &request(FilenameSource::UseTitle, Some("custom")),
            &metadata("Title"),
        );
        assert_eq!(name, "Title");
    }

    #[test]
    fn unusable_names_fall_back_to_placeholder() {
        assert_eq!(
            resolve_base_name(&request(FilenameSource::UseTitle, None), &metadata("???")),
            FALLBACK_BASE_NAME
        );
        assert_eq!(
            resolve_base_name(&request(FilenameSource::Custom, Some("!!")), &metadata("日本")),
            FALLBACK_BASE_NAME
        );
    }

    #[test]
    fn move_file_relocates() {
        let temp = tempfile::tempdir().unwrap();
        let from = temp.path().join("a.mp4");
        let to = temp.path().join("b.mp4");
        fs::write(&from, b"data").unwrap();

        move_file(&from, &to).unwrap();

        assert!(!from.exists());
        assert_eq!(fs::read(&to).unwrap(), b"data");
    }

    #[test]
    fn copy_file_reports_missing_source() {
        let temp = tempfile::tempdir().unwrap();
        let err = copy_file(&temp.path().join("missing.mp4"), &temp.path().join("x.mp4"))
            .unwrap_err();
        assert!(matches!(err, CopyError::Copy { .. }));
    }
}
