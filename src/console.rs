// Coloured status lines, banner and screen handling for the interactive
// flow. Everything here writes to stdout; logs go to stderr via tracing.

use crate::plan::Action;
use crossterm::style::{StyledContent, Stylize};
use crossterm::terminal::{Clear, ClearType};
use crossterm::{cursor::MoveTo, execute};
use std::fmt::Display;
use std::io;

const BANNER: &str = r"
 __  ______   _________  _   ___    ____________  ______
 \ \/ /_  _/ / ___/ __ \/ | / / |  / / ____/ __ \/_  __/
  \  / / /  / /  / / / /  |/ /| | / / __/ / /_/ / / /
  / / / /  / /__/ /_/ / /|  / | |/ / /___/ _, _/ / /
 /_/ /_/   \____\____/_/ |_/  |___/_____/_/ |_| /_/
";

/// Leading tag of a status line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tag {
    Info,
    Download,
    Converting,
    Success,
    Warn,
    Error,
    Failed,
    Done,
}

impl Tag {
    fn styled(self) -> StyledContent<&'static str> {
        match self {
            Tag::Info => "[INFO]".magenta(),
            Tag::Download => "[DOWNLOAD]".blue(),
            Tag::Converting => "[CONVERTING]".blue(),
            Tag::Success => "[SUCCESS]".green(),
            Tag::Warn => "[WARN]".yellow(),
            Tag::Error => "[ERROR]".red(),
            Tag::Failed => "[FAILED]".red(),
            Tag::Done => "[DONE]".green(),
        }
    }
}

pub fn status(tag: Tag, message: impl Display) {
    println!("{} {message}", tag.styled());
}

pub fn clear_screen() -> io::Result<()> {
    execute!(io::stdout(), Clear(ClearType::All), MoveTo(0, 0))
}

pub fn banner() {
    println!("{}", BANNER.green());
}

pub fn welcome() {
    println!(
        "{} {}",
        "Welcome to the".yellow(),
        "YouTube MP4-to-MP3 Converter!".yellow().bold()
    );
}

pub fn action_menu() {
    println!("\nWhat would you like to do with the video?");
    for token in Action::TOKENS {
        if let Some(action) = Action::from_token(token) {
            println!("{token}. {}", action.label());
        }
    }
}

pub fn thank_you() {
    println!(
        "{}",
        "Thank you for using the YouTube MP4-to-MP3 Converter! Have a great day!".cyan()
    );
}

pub fn goodbye() {
    println!("{}", "Goodbye!".cyan());
}

pub fn separator() {
    println!("\n{}\n", "-".repeat(50));
}
