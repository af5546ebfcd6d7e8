// Error types shared by the stages of one download/convert iteration.
//
// `StageError` aborts the current iteration and sends the user back to the
// URL prompt. `CopyError` is only ever reported as a warning. A
// `MissingDependencyError` at startup ends the process.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of one stage; the driving loop restarts from input collection.
#[derive(Debug, Error)]
pub enum StageError {
    /// The no-download metadata query failed
    #[error("failed to fetch video information: {0}")]
    MetadataFetch(String),

    /// The downloader reported an error or could not be started
    #[error("failed to download video: {0}")]
    Download(String),

    /// No container file matched `<base>.<ext>` after the download
    #[error("downloaded video file not found for {base_name:?} in {}", .dir.display())]
    MissingOutputFile { dir: PathBuf, base_name: String },

    /// The container has no audio stream to extract
    #[error("no audio track found in {}", .0.display())]
    NoAudioTrack(PathBuf),

    /// The audio extraction itself failed
    #[error("could not convert to MP3: {0}")]
    Conversion(String),

    /// An output directory could not be created
    #[error("could not create directory {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Non-fatal failure while placing the container file after conversion.
#[derive(Debug, Error)]
pub enum CopyError {
    #[error("failed to copy {} to {}: {source}", .from.display(), .to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to move {} to {}: {source}", .from.display(), .to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove {}: {source}", .path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A required executable is not installed or does not run.
#[derive(Debug, Error)]
#[error("{program} is not installed. Please install {program} to proceed.")]
pub struct MissingDependencyError {
    pub program: String,
}

/// Rejected console input; the prompt is shown again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("No input entered. Please try again.")]
    Empty,

    #[error("Invalid choice. Please enter one of {}.", .expected.join(", ").to_uppercase())]
    InvalidChoice { expected: Vec<String> },
}
