//! Shazbot - song downloads over Telegram
//!
//! A Telegram bot that takes a free-text song query, finds the matching
//! video through the YouTube Data API, downloads its audio with yt-dlp and
//! sends the file back when the user asks for it.
//!
//! # Architecture
//!
//! - `config` - Configuration and secrets
//! - `youtube` - Search and metadata lookup
//! - `audio` - Audio extraction via yt-dlp
//! - `session` - Per-user request state
//! - `conversation` - Request workflow and replies
//! - `telegram` - Telegram dispatcher and chat client
//!
//! # Example
//!
//! ```rust,no_run
//! use shazbot::youtube::{MetadataFetcher, VideoResolver, YoutubeClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = YoutubeClient::new(std::env::var("YOUTUBE_API_KEY")?)?;
//!
//!     if let Some(video) = client.resolve("bohemian rhapsody").await? {
//!         let details = client.fetch_metadata(&video.id).await?;
//!         println!("{}", details.describe(Some(300)));
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod error;
pub mod session;
pub mod telegram;
pub mod youtube;

pub use error::{Result, ShazbotError};
