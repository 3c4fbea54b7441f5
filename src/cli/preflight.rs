//! Pre-flight checks before starting the bot.
//!
//! Validates that required tools are available before accepting requests
//! that would otherwise fail on every download.

use crate::config::Settings;
use crate::error::{Result, ShazbotError};
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Running the bot requires yt-dlp (and ffmpeg when converting).
    Run,
    /// A lookup only talks to the YouTube API.
    Lookup,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Run => {
            check_tool(&settings.extractor.binary)?;
            if settings.extractor.convert_to_mp3 {
                check_tool("ffmpeg")?;
            }
        }
        Operation::Lookup => {
            // No external tools needed
        }
    }
    Ok(())
}

/// Check if an external tool is available.
fn check_tool(name: &str) -> Result<()> {
    // ffmpeg uses -version (single dash), yt-dlp uses --version
    let version_arg = match name {
        "ffmpeg" => "-version",
        _ => "--version",
    };
    match Command::new(name).arg(version_arg).output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(ShazbotError::ToolFailed(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ShazbotError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(ShazbotError::ToolNotFound(format!("{}: {}", name, e))),
    }
}
