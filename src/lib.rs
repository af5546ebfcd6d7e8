// Library root
// -----------
// This crate exposes a small library surface for the CLI. The binary
// (`main.rs`) uses these modules to run the interactive converter.
//
// Module responsibilities:
// - `config`: folder layout and toolchain locations from the environment.
// - `plan`: actions, output plans and base filename sanitizing.
// - `ytdlp` / `ffmpeg`: the download and conversion collaborators, each
//   behind a trait so they can be swapped or faked.
// - `session`: one download/convert iteration, stage by stage.
// - `progress` / `console`: progress bar, spinner and coloured output.
// - `ui`: prompts and the loop that drives sessions.
pub mod config;
pub mod console;
pub mod deps;
pub mod error;
pub mod ffmpeg;
pub mod plan;
pub mod progress;
pub mod session;
pub mod ui;
pub mod ytdlp;
