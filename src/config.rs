// Runtime configuration, read once from the environment at startup.
//
// Nothing here is ever written back: every run starts from the defaults
// plus whatever `YTCONVERT_*` variables are set.

use anyhow::{bail, Result};
use std::path::PathBuf;

pub const DEFAULT_VIDEOS_DIR: &str = "videos";
pub const DEFAULT_DOWNLOADS_DIR: &str = "downloads";
pub const DEFAULT_YTDLP: &str = "yt-dlp";
pub const DEFAULT_FFMPEG: &str = "ffmpeg";

/// What happens to the staged container when both a video and an MP3 were
/// requested.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StagedContainer {
    /// Move it into the videos folder, leaving only the MP3 in downloads.
    #[default]
    Move,
    /// Copy it into the videos folder and keep the staged copy.
    Copy,
}

impl StagedContainer {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "move" => Some(Self::Move),
            "copy" => Some(Self::Copy),
            _ => None,
        }
    }
}

/// Folder layout and toolchain locations used by every iteration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Kept container files
    pub videos_dir: PathBuf,
    /// Staged containers and produced MP3 files
    pub downloads_dir: PathBuf,
    pub ytdlp_bin: String,
    pub ffmpeg_bin: String,
    pub staged_container: StagedContainer,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            videos_dir: PathBuf::from(DEFAULT_VIDEOS_DIR),
            downloads_dir: PathBuf::from(DEFAULT_DOWNLOADS_DIR),
            ytdlp_bin: DEFAULT_YTDLP.to_string(),
            ffmpeg_bin: DEFAULT_FFMPEG.to_string(),
            staged_container: StagedContainer::default(),
        }
    }
}

impl Config {
    /// Build the configuration from `YTCONVERT_*` environment variables,
    /// falling back to `videos/`, `downloads/` and the executables on PATH.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // Empty values count as unset.
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = Self::default();

        if let Some(dir) = var("YTCONVERT_VIDEOS_DIR") {
            config.videos_dir = PathBuf::from(dir);
        }
        if let Some(dir) = var("YTCONVERT_DOWNLOADS_DIR") {
            config.downloads_dir = PathBuf::from(dir);
        }
        if let Some(bin) = var("YTCONVERT_YTDLP") {
            config.ytdlp_bin = bin;
        }
        if let Some(bin) = var("YTCONVERT_FFMPEG") {
            config.ffmpeg_bin = bin;
        }
        if let Some(value) = var("YTCONVERT_STAGED") {
            config.staged_container = match StagedContainer::parse(&value) {
                Some(policy) => policy,
                None => bail!("YTCONVERT_STAGED must be `move` or `copy`, got {value:?}"),
            };
        }

        if config.videos_dir == config.downloads_dir {
            bail!(
                "videos and downloads folders must differ (both are {})",
                config.videos_dir.display()
            );
        }

        tracing::debug!(?config, "configuration loaded");
        Ok(config)
    }

    /// `--ffmpeg-location` for yt-dlp, only when ffmpeg was overridden.
    pub fn ffmpeg_location(&self) -> Option<&str> {
        (self.ffmpeg_bin != DEFAULT_FFMPEG).then_some(self.ffmpeg_bin.as_str())
    }
}
