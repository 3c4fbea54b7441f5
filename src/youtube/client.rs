//! YouTube Data API v3 client.

use super::{duration::format_duration, MetadataFetcher, VideoMetadata, VideoReference, VideoResolver};
use crate::config::YoutubeSettings;
use crate::error::{Result, ShazbotError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Client for the `search` and `videos` endpoints.
pub struct YoutubeClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl YoutubeClient {
    /// Create a client against the public API with no request timeout.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(&YoutubeSettings::default(), api_key)
    }

    /// Create a client using the base URL and timeout from settings.
    pub fn with_config(settings: &YoutubeSettings, api_key: impl Into<String>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = settings.request_timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            http: builder.build()?,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url> {
        let base = format!("{}/{}", self.api_base, path);
        let key = [("key", self.api_key.as_str())];
        Url::parse_with_params(&base, params.iter().chain(key.iter()))
            .map_err(|e| ShazbotError::Config(format!("Invalid YouTube API base URL: {}", e)))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self.http.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ShazbotError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        Ok(response.json().await?)
    }
}

/// Pull the human-readable message out of a Google API error body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| json["error"]["message"].as_str().map(|s| s.to_string()))
        .unwrap_or_else(|| body.chars().take(200).collect())
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    #[serde(default)]
    snippet: Snippet,
    content_details: Option<ContentDetails>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: Option<String>,
    channel_title: Option<String>,
    description: Option<String>,
    published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

impl VideoItem {
    fn into_metadata(self) -> VideoMetadata {
        VideoMetadata {
            title: self.snippet.title,
            channel: self.snippet.channel_title,
            description: self.snippet.description,
            published_at: self.snippet.published_at,
            duration: self
                .content_details
                .and_then(|d| d.duration)
                .map(|code| format_duration(&code)),
        }
    }
}

#[async_trait]
impl VideoResolver for YoutubeClient {
    #[instrument(skip(self))]
    async fn resolve(&self, query: &str) -> Result<Option<VideoReference>> {
        let url = self.endpoint(
            "search",
            &[
                ("part", "snippet"),
                ("q", query),
                ("maxResults", "1"),
                ("type", "video"),
            ],
        )?;

        let response: SearchResponse = self.get_json(url).await?;
        let hit = response
            .items
            .into_iter()
            .find_map(|item| item.id.video_id)
            .map(VideoReference::new);

        debug!("Search hit: {:?}", hit);
        Ok(hit)
    }
}

#[async_trait]
impl MetadataFetcher for YoutubeClient {
    #[instrument(skip(self))]
    async fn fetch_metadata(&self, video_id: &str) -> Result<VideoMetadata> {
        let url = self.endpoint(
            "videos",
            &[("part", "snippet,contentDetails"), ("id", video_id)],
        )?;

        let response: VideosResponse = self.get_json(url).await?;
        response
            .items
            .into_iter()
            .next()
            .map(VideoItem::into_metadata)
            .ok_or_else(|| ShazbotError::VideoNotFound(video_id.to_string()))
    }
}
