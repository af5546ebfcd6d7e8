// Startup check for the external executables the program drives.

use crate::error::MissingDependencyError;
use std::process::{Command, Stdio};

/// Run `program version_arg` and require a successful exit.
pub fn ensure_available(program: &str, version_arg: &str) -> Result<(), MissingDependencyError> {
    let available = Command::new(program)
        .arg(version_arg)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false);

    if available {
        tracing::debug!(program, "dependency found");
        Ok(())
    } else {
        tracing::error!(program, "dependency missing");
        Err(MissingDependencyError {
            program: program.to_string(),
        })
    }
}
