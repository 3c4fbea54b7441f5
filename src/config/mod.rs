//! Configuration module for Shazbot.
//!
//! Handles loading application settings and resolving secrets.

mod settings;

pub use settings::{
    BotSettings, ExtractorSettings, GeneralSettings, SessionSettings, Settings,
    TelegramSettings, YoutubeSettings, TELEGRAM_TOKEN_ENV, YOUTUBE_API_KEY_ENV,
};
