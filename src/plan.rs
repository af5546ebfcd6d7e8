// Output planning: which files an action keeps or produces, where they go,
// and how the shared base filename is built.

use crate::config::Config;
use crate::error::StageError;
use std::fs;
use std::path::{Path, PathBuf};

/// Container extensions tried, in order, when `<base>.mp4` is absent after a
/// download. Best-effort guess at what the downloader merged into; no content
/// sniffing is done.
pub const CONTAINER_EXTENSIONS: [&str; 5] = ["mp4", "webm", "mkv", "flv", "avi"];

pub const AUDIO_EXTENSION: &str = "mp3";

/// Stem used when neither the platform nor the user gives a usable name.
pub const FALLBACK_BASE_NAME: &str = "downloaded_video";

/// What the user wants done with the video.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Download, convert to MP3, drop the video
    ConvertOnly,
    /// Download the video only
    DownloadOnly,
    /// Download, convert to MP3 and keep the video
    DownloadAndConvert,
}

impl Action {
    pub const TOKENS: [&'static str; 3] = ["1", "2", "3"];

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "1" => Some(Self::ConvertOnly),
            "2" => Some(Self::DownloadOnly),
            "3" => Some(Self::DownloadAndConvert),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::ConvertOnly => "Download and Convert to MP3",
            Self::DownloadOnly => "Only Download MP4",
            Self::DownloadAndConvert => "Download MP4 and Convert to MP3",
        }
    }

    /// `(keep_container, produce_audio)`
    pub fn outputs(self) -> (bool, bool) {
        match self {
            Self::ConvertOnly => (false, true),
            Self::DownloadOnly => (true, false),
            Self::DownloadAndConvert => (true, true),
        }
    }
}

/// Where the base filename comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilenameSource {
    UseTitle,
    Custom,
}

impl FilenameSource {
    pub const TOKENS: [&'static str; 2] = ["y", "n"];

    /// `y` keeps the video title, `n` asks for a custom name.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "y" => Some(Self::UseTitle),
            "n" => Some(Self::Custom),
            _ => None,
        }
    }
}

/// Keep ASCII alphanumerics, space, `.`, `-` and `_`, then trim trailing
/// whitespace.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '.' | '-' | '_'))
        .collect::<String>()
        .trim_end()
        .to_string()
}

/// Files and folders touched by one iteration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputPlan {
    pub keep_container: bool,
    pub produce_audio: bool,
    pub videos_dir: PathBuf,
    pub downloads_dir: PathBuf,
}

impl OutputPlan {
    pub fn resolve(action: Action, config: &Config) -> Self {
        let (keep_container, produce_audio) = action.outputs();
        Self {
            keep_container,
            produce_audio,
            videos_dir: config.videos_dir.clone(),
            downloads_dir: config.downloads_dir.clone(),
        }
    }

    /// The downloader writes straight into the videos folder only when no MP3
    /// is wanted; otherwise the container is staged next to the MP3.
    pub fn download_dir(&self) -> &Path {
        if self.keep_container && !self.produce_audio {
            &self.videos_dir
        } else {
            &self.downloads_dir
        }
    }

    /// The staged container has to end up in the videos folder too.
    pub fn needs_transfer(&self) -> bool {
        self.keep_container && self.produce_audio
    }

    /// Create the folders this plan writes to. Existing folders are fine.
    pub fn prepare_dirs(&self) -> Result<(), StageError> {
        let wanted = [
            (self.produce_audio, &self.downloads_dir),
            (self.keep_container, &self.videos_dir),
        ];
        for (_, dir) in wanted.iter().filter(|(needed, _)| *needed) {
            fs::create_dir_all(dir).map_err(|source| StageError::Filesystem {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }

    /// yt-dlp output template, `<download_dir>/<base>.%(ext)s`.
    pub fn output_template(&self, base_name: &str) -> String {
        self.download_dir()
            .join(format!("{base_name}.%(ext)s"))
            .to_string_lossy()
            .into_owned()
    }

    pub fn audio_path(&self, base_name: &str) -> PathBuf {
        self.downloads_dir
            .join(format!("{base_name}.{AUDIO_EXTENSION}"))
    }

    /// First existing `<base>.<ext>` in the download folder, trying
    /// [`CONTAINER_EXTENSIONS`] in order.
    pub fn locate_container(&self, base_name: &str) -> Option<PathBuf> {
        let dir = self.download_dir();
        CONTAINER_EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{base_name}.{ext}")))
            .find(|path| path.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(action: Action, root: &Path) -> OutputPlan {
        let config = Config {
            videos_dir: root.join("videos"),
            downloads_dir: root.join("downloads"),
            ..Config::default()
        };
        OutputPlan::resolve(action, &config)
    }

    #[test]
    fn action_outputs_table() {
        assert_eq!(Action::ConvertOnly.outputs(), (false, true));
        assert_eq!(Action::DownloadOnly.outputs(), (true, false));
        assert_eq!(Action::DownloadAndConvert.outputs(), (true, true));
    }

    #[test]
    fn action_tokens() {
        assert_eq!(Action::from_token("1"), Some(Action::ConvertOnly));
        assert_eq!(Action::from_token("2"), Some(Action::DownloadOnly));
        assert_eq!(Action::from_token("3"), Some(Action::DownloadAndConvert));
        assert_eq!(Action::from_token("4"), None);
        assert!(Action::TOKENS.iter().all(|t| Action::from_token(t).is_some()));
    }

    #[test]
    fn filename_source_tokens() {
        assert_eq!(FilenameSource::from_token("y"), Some(FilenameSource::UseTitle));
        assert_eq!(FilenameSource::from_token("n"), Some(FilenameSource::Custom));
        assert_eq!(FilenameSource::from_token("yes"), None);
    }

    #[test]
    fn sanitize_strips_punctuation() {
        assert_eq!(sanitize("My Video!"), "My Video");
        assert_eq!(sanitize("a/b\\c:d*e?f\"g<h>i|j"), "abcdefghij");
        assert_eq!(sanitize("Clip_01 - final.v2"), "Clip_01 - final.v2");
    }

    #[test]
    fn sanitize_trims_trailing_whitespace_only() {
        assert_eq!(sanitize("  lead and trail   "), "  lead and trail");
        assert_eq!(sanitize("tail ?!"), "tail");
    }

    #[test]
    fn sanitize_drops_non_ascii() {
        assert_eq!(sanitize("Café ☕ 2024"), "Caf  2024");
        assert_eq!(sanitize("日本語"), "");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let samples = [
            "My Video!",
            "  spaced out ! ",
            "tabs\tand\nnewlines ",
            "Ünïcödé ✓ title ",
            "already_clean-1.0",
            "",
        ];
        for sample in samples {
            let once = sanitize(sample);
            assert_eq!(sanitize(&once), once, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn download_dir_follows_action() {
        let root = Path::new("/data");
        assert_eq!(
            plan(Action::DownloadOnly, root).download_dir(),
            Path::new("/data/videos")
        );
        assert_eq!(
            plan(Action::ConvertOnly, root).download_dir(),
            Path::new("/data/downloads")
        );
        assert_eq!(
            plan(Action::DownloadAndConvert, root).download_dir(),
            Path::new("/data/downloads")
        );
        assert!(plan(Action::DownloadAndConvert, root).needs_transfer());
        assert!(!plan(Action::ConvertOnly, root).needs_transfer());
    }

    #[test]
    fn output_template_and_audio_path() {
        let plan = plan(Action::ConvertOnly, Path::new("/data"));
        assert_eq!(
            plan.output_template("My Video"),
            "/data/downloads/My Video.%(ext)s"
        );
        assert_eq!(
            plan.audio_path("My Video"),
            PathBuf::from("/data/downloads/My Video.mp3")
        );
    }

    #[test]
    fn prepare_dirs_creates_only_needed_folders() {
        let temp = tempfile::tempdir().unwrap();

        plan(Action::DownloadOnly, temp.path()).prepare_dirs().unwrap();
        assert!(temp.path().join("videos").is_dir());
        assert!(!temp.path().join("downloads").exists());

        // Second call on existing folders is a no-op.
        plan(Action::DownloadAndConvert, temp.path())
            .prepare_dirs()
            .unwrap();
        plan(Action::DownloadAndConvert, temp.path())
            .prepare_dirs()
            .unwrap();
        assert!(temp.path().join("downloads").is_dir());
    }

    #[test]
    fn locate_container_prefers_list_order() {
        let temp = tempfile::tempdir().unwrap();
        let plan = plan(Action::ConvertOnly, temp.path());
        plan.prepare_dirs().unwrap();

        assert_eq!(plan.locate_container("Test"), None);

        fs::write(temp.path().join("downloads/Test.mkv"), b"mkv").unwrap();
        fs::write(temp.path().join("downloads/Test.webm"), b"webm").unwrap();
        assert_eq!(
            plan.locate_container("Test"),
            Some(temp.path().join("downloads/Test.webm"))
        );

        fs::write(temp.path().join("downloads/Test.mp4"), b"mp4").unwrap();
        assert_eq!(
            plan.locate_container("Test"),
            Some(temp.path().join("downloads/Test.mp4"))
        );
    }

    #[test]
    fn locate_container_ignores_other_stems() {
        let temp = tempfile::tempdir().unwrap();
        let plan = plan(Action::DownloadOnly, temp.path());
        plan.prepare_dirs().unwrap();

        fs::write(temp.path().join("videos/Other.mp4"), b"mp4").unwrap();
        fs::write(temp.path().join("videos/Test.mp3"), b"mp3").unwrap();
        assert_eq!(plan.locate_container("Test"), None);
    }
}
