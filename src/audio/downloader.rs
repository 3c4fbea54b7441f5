//! yt-dlp backed audio extraction.
//!
//! Runs yt-dlp as a child process and waits for it to exit. The exit status
//! is the only success signal. A failed or timed-out run leaves no files
//! behind.

use super::{remove_artifacts, MediaExtractor};
use crate::config::ExtractorSettings;
use crate::error::{Result, ShazbotError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, instrument};

/// Downloads audio with yt-dlp.
pub struct YtDlpExtractor {
    binary: String,
    timeout: Option<Duration>,
    convert_to_mp3: bool,
}

impl YtDlpExtractor {
    /// Extractor using `yt-dlp` from PATH, no timeout, no conversion.
    pub fn new() -> Self {
        Self::with_config(&ExtractorSettings::default())
    }

    pub fn with_config(settings: &ExtractorSettings) -> Self {
        Self {
            binary: settings.binary.clone(),
            timeout: settings.timeout_seconds.map(Duration::from_secs),
            convert_to_mp3: settings.convert_to_mp3,
        }
    }

    /// Arguments passed to yt-dlp for one download.
    fn args(&self, link: &str, dest: &Path) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            "bestaudio".to_string(),
            "--no-playlist".to_string(),
            "--quiet".to_string(),
            "--no-warnings".to_string(),
        ];

        if self.convert_to_mp3 {
            // yt-dlp picks the final extension itself, so hand it a template
            args.extend(
                ["--extract-audio", "--audio-format", "mp3", "--audio-quality", "0"]
                    .map(String::from),
            );
            args.push("-o".to_string());
            args.push(output_template(dest).to_string_lossy().into_owned());
        } else {
            args.push("-o".to_string());
            args.push(dest.to_string_lossy().into_owned());
        }

        args.push(link.to_string());
        args
    }
}

impl Default for YtDlpExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// `<dir>/<stem>.%(ext)s` for a destination like `<dir>/<stem>.mp3`.
fn output_template(dest: &Path) -> PathBuf {
    let stem = dest
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".to_string());
    dest.with_file_name(format!("{}.%(ext)s", stem))
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    #[instrument(skip(self, dest), fields(dest = %dest.display()))]
    async fn extract(&self, link: &str, dest: &Path) -> Result<()> {
        let result = self.run(link, dest).await;
        if result.is_err() {
            remove_artifacts(dest).await;
        }
        result
    }
}

impl YtDlpExtractor {
    async fn run(&self, link: &str, dest: &Path) -> Result<()> {
        info!("Downloading audio from {}", link);

        let child = Command::new(&self.binary)
            .args(self.args(link, dest))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child).await {
                Ok(result) => result,
                // Dropping the future kills the child
                Err(_) => {
                    return Err(ShazbotError::AudioDownload(format!(
                        "{} timed out after {}s",
                        self.binary,
                        limit.as_secs()
                    )));
                }
            },
            None => child.await,
        };

        let output = match result {
            Ok(o) => o,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ShazbotError::ToolNotFound(self.binary.clone()));
            }
            Err(e) => {
                return Err(ShazbotError::AudioDownload(format!(
                    "{} execution failed: {e}",
                    self.binary
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ShazbotError::AudioDownload(format!(
                "{} failed ({}): {}",
                self.binary,
                output.status,
                stderr.trim()
            )));
        }

        info!("Audio saved");
        Ok(())
    }
}
