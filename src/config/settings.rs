//! Configuration settings for Shazbot.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable holding the YouTube Data API key.
pub const YOUTUBE_API_KEY_ENV: &str = "YOUTUBE_API_KEY";

/// Environment variable holding the Telegram bot token.
pub const TELEGRAM_TOKEN_ENV: &str = "TELOXIDE_TOKEN";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub telegram: TelegramSettings,
    pub youtube: YoutubeSettings,
    pub extractor: ExtractorSettings,
    pub session: SessionSettings,
    pub bot: BotSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory where downloaded audio files are kept until sent.
    pub download_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            download_dir: "./downloads".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Telegram settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct TelegramSettings {
    /// Bot token. Prefer the TELOXIDE_TOKEN environment variable.
    pub token: Option<String>,
}

/// YouTube Data API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YoutubeSettings {
    /// API key. Prefer the YOUTUBE_API_KEY environment variable.
    pub api_key: Option<String>,
    /// Base URL of the Data API v3.
    pub api_base: String,
    /// Per-request timeout. None waits indefinitely.
    pub request_timeout_seconds: Option<u64>,
}

impl Default for YoutubeSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: "https://www.googleapis.com/youtube/v3".to_string(),
            request_timeout_seconds: None,
        }
    }
}

/// Settings for the yt-dlp extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorSettings {
    /// Name or path of the yt-dlp binary.
    pub binary: String,
    /// Maximum number of yt-dlp processes running at once.
    pub max_concurrent: usize,
    /// Kill a download after this many seconds. None waits indefinitely.
    pub timeout_seconds: Option<u64>,
    /// Re-encode the downloaded stream to MP3 (requires ffmpeg).
    pub convert_to_mp3: bool,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            max_concurrent: 2,
            timeout_seconds: None,
            convert_to_mp3: false,
        }
    }
}

/// Session store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Maximum number of users remembered; least recently active are evicted.
    pub capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self { capacity: 10_000 }
    }
}

/// Reply formatting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct BotSettings {
    /// Truncate video descriptions to this many characters. None sends them in full.
    pub max_description_chars: Option<usize>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shazbot")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded download directory path.
    pub fn download_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.download_dir)
    }

    /// Resolve the YouTube API key, environment first.
    pub fn youtube_api_key(&self) -> crate::error::Result<String> {
        resolve_secret(YOUTUBE_API_KEY_ENV, self.youtube.api_key.as_deref())
    }

    /// Resolve the Telegram bot token, environment first.
    pub fn telegram_token(&self) -> crate::error::Result<String> {
        resolve_secret(TELEGRAM_TOKEN_ENV, self.telegram.token.as_deref())
    }

    /// Render the settings as TOML with secrets masked.
    pub fn to_redacted_toml(&self) -> crate::error::Result<String> {
        let mut shown = self.clone();
        shown.youtube.api_key = shown.youtube.api_key.map(|_| "********".to_string());
        shown.telegram.token = shown.telegram.token.map(|_| "********".to_string());
        toml::to_string_pretty(&shown)
            .map_err(|e| crate::error::ShazbotError::Config(e.to_string()))
    }
}

fn resolve_secret(var: &str, configured: Option<&str>) -> crate::error::Result<String> {
    let from_env = std::env::var(var).ok().filter(|v| !v.trim().is_empty());
    let from_file = configured.map(str::to_string).filter(|v| !v.trim().is_empty());

    from_env.or(from_file).ok_or_else(|| {
        crate::error::ShazbotError::Config(format!(
            "{var} not set. Set it with: export {var}='...'"
        ))
    })
}
