// UI layer: interactive prompts built on `dialoguer` and the loop that runs
// one iteration per video until the user is done.

use crate::console::{self, Tag};
use crate::error::{InputError, StageError};
use crate::ffmpeg::AudioExtractor;
use crate::plan::{Action, FilenameSource};
use crate::session::{Session, SessionRequest};
use crate::ytdlp::MediaSource;
use anyhow::{Context, Result};
use dialoguer::Input;

/// Lower-case, trimmed `input` if it is one of `choices`.
pub fn parse_choice(input: &str, choices: &[&str]) -> Result<String, InputError> {
    let token = input.trim().to_lowercase();
    if choices.contains(&token.as_str()) {
        Ok(token)
    } else {
        Err(InputError::InvalidChoice {
            expected: choices.iter().map(|c| c.to_string()).collect(),
        })
    }
}

pub fn validate_url(input: &str) -> Result<(), InputError> {
    if input.trim().is_empty() {
        Err(InputError::Empty)
    } else {
        Ok(())
    }
}

/// Ask until the answer is one of `choices`; returns the normalized token.
fn prompt_choice(prompt: &str, choices: &[&str]) -> Result<String> {
    let answer: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .validate_with(|input: &String| parse_choice(input, choices).map(|_| ()))
        .interact_text()
        .context("failed to read choice")?;
    Ok(parse_choice(&answer, choices)?)
}

fn prompt_url() -> Result<String> {
    let url: String = Input::new()
        .with_prompt("Please enter the YouTube video URL")
        .allow_empty(true)
        .validate_with(|input: &String| validate_url(input))
        .interact_text()
        .context("failed to read URL")?;
    Ok(url.trim().to_string())
}

fn prompt_filename_source() -> Result<FilenameSource> {
    let token = prompt_choice(
        "Do you want to use the video title as the filename? (Y/N)",
        &FilenameSource::TOKENS,
    )?;
    FilenameSource::from_token(&token).context("unexpected filename choice")
}

fn prompt_custom_name() -> Result<String> {
    let name: String = Input::new()
        .with_prompt("Please enter your desired filename (without extension)")
        .allow_empty(true)
        .interact_text()
        .context("failed to read filename")?;
    Ok(name.trim().to_string())
}

fn prompt_action() -> Result<Action> {
    console::action_menu();
    let token = prompt_choice("Enter your choice (1/2/3)", &Action::TOKENS)?;
    Action::from_token(&token).context("unexpected action choice")
}

/// Collect URL, filename source, optional custom name and action.
pub fn collect_request() -> Result<SessionRequest> {
    let url = prompt_url()?;
    let filename_source = prompt_filename_source()?;
    let custom_name = match filename_source {
        FilenameSource::Custom => Some(prompt_custom_name()?),
        FilenameSource::UseTitle => None,
    };
    let action = prompt_action()?;

    Ok(SessionRequest {
        url,
        filename_source,
        custom_name,
        action,
    })
}

/// Tag of the single line printed for a failed iteration.
pub fn failure_tag(error: &StageError) -> Tag {
    match error {
        StageError::NoAudioTrack(_) | StageError::Conversion(_) => Tag::Failed,
        _ => Tag::Error,
    }
}

/// Main interactive loop. A failed iteration goes straight back to the URL
/// prompt; a completed one asks whether to process another video.
pub fn main_menu<S: MediaSource, A: AudioExtractor>(session: &Session<S, A>) -> Result<()> {
    loop {
        console::welcome();
        let request = collect_request()?;
        println!();

        match session.run(&request) {
            Ok(outcome) => {
                for warning in &outcome.warnings {
                    console::status(Tag::Error, warning);
                }
                console::status(Tag::Done, "Your files are located in the respective folders.\n");
                console::thank_you();
            }
            Err(e) => {
                tracing::warn!(error = %e, "iteration aborted");
                console::status(failure_tag(&e), format!("{e}\n"));
                continue;
            }
        }

        let again = prompt_choice(
            "Do you want to download/convert another video? (Y/N)",
            &["y", "n"],
        )?;
        if again == "n" {
            console::goodbye();
            break;
        }
        console::separator();
    }
    Ok(())
}
