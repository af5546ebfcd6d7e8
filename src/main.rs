// Entrypoint for the CLI application.
// - Sets up logging, reads the configuration and checks the toolchain.
// - Hands a `Session` to the UI loop, which blocks until the user exits.

use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use ytconvert_cli::{
    config::Config,
    console::{self, Tag},
    ffmpeg::Ffmpeg,
    session::Session,
    ui::main_menu,
    ytdlp::YtDlp,
};

fn main() -> anyhow::Result<ExitCode> {
    // Silent unless RUST_LOG is set; stderr keeps logs away from the prompts.
    let (non_blocking, _guard) = tracing_appender::non_blocking(std::io::stderr());
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;

    console::clear_screen()?;

    let ffmpeg = Ffmpeg::new(&config.ffmpeg_bin);
    let ytdlp = YtDlp::from_config(&config);

    // Nothing works without the toolchain, so stop before the first prompt.
    // Returning instead of exiting lets `_guard` flush pending log lines.
    let missing = ffmpeg
        .check_installed()
        .and_then(|()| ytdlp.check_installed());
    if let Err(e) = missing {
        console::status(Tag::Error, e);
        return Ok(ExitCode::FAILURE);
    }

    console::banner();

    let session = Session::new(config, ytdlp, ffmpeg);
    main_menu(&session)?;
    Ok(ExitCode::SUCCESS)
}
