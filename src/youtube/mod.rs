//! YouTube lookup for Shazbot.
//!
//! Resolves free-text song queries to videos and fetches the details shown
//! to the user before the download starts.

mod client;
pub mod duration;

pub use client::YoutubeClient;
pub use duration::format_duration;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};

/// Build the canonical watch link for a video.
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// The top search hit for a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoReference {
    /// YouTube video ID.
    pub id: String,
    /// Canonical watch link, suitable for yt-dlp.
    pub link: String,
}

impl VideoReference {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let link = watch_url(&id);
        Self { id, link }
    }
}

/// Details about a video shown in the descriptive reply.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub title: Option<String>,
    /// Channel name, shown as the artist.
    pub channel: Option<String>,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    /// Human-readable duration, e.g. "3 min 45 sec".
    pub duration: Option<String>,
}

impl VideoMetadata {
    /// Metadata with every field unknown.
    pub fn unavailable() -> Self {
        Self {
            title: None,
            channel: None,
            description: None,
            published_at: None,
            duration: None,
        }
    }

    /// Render the descriptive reply sent before downloading.
    ///
    /// Unknown fields are shown with placeholders.
    pub fn describe(&self, max_description_chars: Option<usize>) -> String {
        let description = match (&self.description, max_description_chars) {
            (Some(d), Some(limit)) => shorten(d, limit),
            (Some(d), None) => d.clone(),
            (None, _) => "No description".to_string(),
        };
        let published = self
            .published_at
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_else(|| "Unknown Date".to_string());

        format!(
            "🎵 Title: {}\n\n🎤 Artist: {}\n\n📝 Description: {}\n\n📅 Published At: {}\n\n⏳ Duration: {}",
            self.title.as_deref().unwrap_or("Unknown Title"),
            self.channel.as_deref().unwrap_or("Unknown Artist"),
            description,
            published,
            self.duration.as_deref().unwrap_or("unknown"),
        )
    }
}

fn shorten(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Resolves a free-text query to the best matching video.
#[async_trait]
pub trait VideoResolver: Send + Sync {
    /// Return the top video hit, or `None` when the search has no results.
    async fn resolve(&self, query: &str) -> Result<Option<VideoReference>>;
}

/// Fetches details about a known video.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    async fn fetch_metadata(&self, video_id: &str) -> Result<VideoMetadata>;
}
