//! Error types for Shazbot.

use thiserror::Error;

/// Library-level error type for Shazbot operations.
#[derive(Error, Debug)]
pub enum ShazbotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("YouTube API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Video not found: {0}")]
    VideoNotFound(String),

    #[error("Audio download failed: {0}")]
    AudioDownload(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),

    #[error("Chat platform error: {0}")]
    Chat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Result type alias for Shazbot operations.
pub type Result<T> = std::result::Result<T, ShazbotError>;
