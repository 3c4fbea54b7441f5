//! CLI module for Shazbot.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Shazbot - song downloads over Telegram
///
/// Send the bot a song title, some lyrics or an artist; it finds the track on
/// YouTube, downloads the audio and sends it back on /send_audio.
#[derive(Parser, Debug)]
#[command(name = "shazbot")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the Telegram bot
    Run {
        /// Telegram bot token
        #[arg(long, env = "TELOXIDE_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// YouTube Data API key
        #[arg(long, env = "YOUTUBE_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },

    /// Look up a song and print what the bot would reply
    Lookup {
        /// Song title, lyrics or artist
        query: String,

        /// YouTube Data API key
        #[arg(long, env = "YOUTUBE_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration (secrets masked)
    Show,

    /// Show configuration file path
    Path,
}
