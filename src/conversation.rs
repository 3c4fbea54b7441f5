//! Conversation handling for Shazbot.
//!
//! Turns inbound chat events into replies: looks the song up, downloads it,
//! and hands the file back on `/send_audio`. Each request runs as one
//! sequential workflow and every outcome maps to a single reply.

use crate::audio::{remove_artifacts, MediaExtractor};
use crate::error::Result;
use crate::session::{SessionEntry, SessionStore, UserId};
use crate::youtube::{MetadataFetcher, VideoMetadata, VideoResolver};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Chat identifier on the messaging platform.
pub type ChatId = i64;

pub const GREETING: &str = "Hi! I'm Shazam bot! 👋😊\nJust give me a song title, some lyrics, or the artist's name, and I'll download the best quality version for you! 📥✨";
pub const PLEASE_WAIT: &str = "⏰ Please wait";
pub const DOWNLOADING: &str = "📥 Downloading";
pub const DOWNLOADED: &str = "Your audio is successfully downloaded! 😉📥\nUse /send_audio command, if you want to retrieve it.";
pub const NOT_FOUND: &str = "🚫 Sorry, I couldn't find the song❗";
pub const DOWNLOAD_FAILED: &str = "🚫 Sorry, I couldn't download the song❗";
pub const EMPTY_QUERY: &str = "Please send me a song title, some lyrics, or the artist's name.";
pub const REQUEST_FIRST: &str = "Please request a song first by sending the song title.";
pub const FILE_MISSING: &str = "Sorry, I couldn't find the audio file. Please try again.";
pub const SEND_FAILED: &str = "Failed to send audio. Try again with the command /send_audio";
pub const ENJOY: &str = "Enjoy 😊🥂";
pub const EXPIRED: &str = "⌛ Sorry, I had too many requests and lost yours. Please send the song title again.";
pub const UNSUPPORTED: &str = "Nice! But I only understand song titles. Send me the name of a track.";

/// Outbound side of the messaging platform.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<()>;

    /// Send a local file as an audio attachment titled `title`.
    async fn send_audio(&self, chat: ChatId, path: &Path, title: &str) -> Result<()>;
}

/// Why a song request did not produce a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    /// The search had no usable hit, or the search itself failed.
    NotFound,
    /// yt-dlp failed.
    Download,
    /// The user's session was evicted while the download ran.
    Expired,
}

impl RequestError {
    pub fn user_message(self) -> &'static str {
        match self {
            RequestError::NotFound => NOT_FOUND,
            RequestError::Download => DOWNLOAD_FAILED,
            RequestError::Expired => EXPIRED,
        }
    }
}

/// Final state of a song request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The file is ready for `/send_audio`.
    Ready(SessionEntry),
    /// The download finished after the user asked for another song.
    Superseded,
    Failed(RequestError),
    /// Nothing to search for.
    Empty,
}

/// Result of a `/send_audio` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrieveOutcome {
    Sent,
    NoRequest,
    FileMissing,
    SendFailed,
}

/// Coordinates lookups, downloads and replies for all users.
pub struct Conversation {
    resolver: Arc<dyn VideoResolver>,
    metadata: Arc<dyn MetadataFetcher>,
    extractor: Arc<dyn MediaExtractor>,
    chat: Arc<dyn ChatClient>,
    sessions: SessionStore,
    max_description_chars: Option<usize>,
}

impl Conversation {
    pub fn new(
        resolver: Arc<dyn VideoResolver>,
        metadata: Arc<dyn MetadataFetcher>,
        extractor: Arc<dyn MediaExtractor>,
        chat: Arc<dyn ChatClient>,
        sessions: SessionStore,
    ) -> Self {
        Self {
            resolver,
            metadata,
            extractor,
            chat,
            sessions,
            max_description_chars: None,
        }
    }

    /// Truncate descriptions in the details reply.
    pub fn with_max_description_chars(mut self, limit: Option<usize>) -> Self {
        self.max_description_chars = limit;
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    async fn reply(&self, chat: ChatId, text: &str) -> Result<()> {
        self.chat.send_text(chat, text).await
    }

    /// Progress message; a failed send does not stop the request.
    async fn notify(&self, chat: ChatId, text: &str) {
        if let Err(e) = self.chat.send_text(chat, text).await {
            warn!("Progress message not delivered: {}", e);
        }
    }

    /// `/start` and friends.
    pub async fn handle_start(&self, chat: ChatId) -> Result<()> {
        self.reply(chat, GREETING).await
    }

    /// `/help`, listing the supported commands.
    pub async fn handle_help(&self, chat: ChatId, commands: &str) -> Result<()> {
        self.reply(chat, commands).await
    }

    /// Anything that is neither a command nor text.
    pub async fn handle_unsupported(&self, chat: ChatId) -> Result<()> {
        self.reply(chat, UNSUPPORTED).await
    }

    /// Look up and download the song named by `text`.
    #[instrument(skip(self, text))]
    pub async fn handle_text(&self, chat: ChatId, user: UserId, text: &str) -> Result<RequestOutcome> {
        let query = text.trim();
        if query.is_empty() {
            self.reply(chat, EMPTY_QUERY).await?;
            return Ok(RequestOutcome::Empty);
        }

        let begun = self.sessions.begin(user, query);
        for stale in &begun.stale {
            discard_file(&stale.audio_path).await;
        }
        let entry = begun.entry;

        self.notify(chat, PLEASE_WAIT).await;

        let outcome = match self.fetch_song(chat, user, &entry).await? {
            Ok(true) => RequestOutcome::Ready(entry),
            Ok(false) => RequestOutcome::Superseded,
            Err(e) => RequestOutcome::Failed(e),
        };

        match &outcome {
            RequestOutcome::Ready(_) => self.reply(chat, DOWNLOADED).await?,
            RequestOutcome::Failed(e) => self.reply(chat, e.user_message()).await?,
            RequestOutcome::Superseded | RequestOutcome::Empty => {}
        }

        Ok(outcome)
    }

    /// Resolve, describe and download one request.
    ///
    /// The outer error is a failed reply, the inner one a failed stage.
    /// `Ok(false)` means the file was discarded because a newer request exists.
    /// Whatever the extractor left behind is removed unless the file is ready.
    async fn fetch_song(
        &self,
        chat: ChatId,
        user: UserId,
        entry: &SessionEntry,
    ) -> Result<std::result::Result<bool, RequestError>> {
        let video = match self.resolver.resolve(&entry.title).await {
            Ok(Some(video)) => video,
            Ok(None) => {
                info!("No search results");
                return Ok(Err(RequestError::NotFound));
            }
            Err(e) => {
                warn!("Search failed: {}", e);
                return Ok(Err(RequestError::NotFound));
            }
        };

        let metadata = match self.metadata.fetch_metadata(&video.id).await {
            Ok(meta) => meta,
            Err(e) => {
                warn!("Metadata for {} unavailable: {}", video.id, e);
                VideoMetadata::unavailable()
            }
        };

        self.reply(chat, &metadata.describe(self.max_description_chars)).await?;
        self.notify(chat, DOWNLOADING).await;

        let extracted = self.extractor.extract(&video.link, &entry.audio_path).await;

        match self.sessions.current_seq(user) {
            Some(seq) if seq == entry.seq => match extracted {
                Ok(()) => Ok(Ok(true)),
                Err(e) => {
                    warn!("Download of {} failed: {}", video.link, e);
                    remove_artifacts(&entry.audio_path).await;
                    Ok(Err(RequestError::Download))
                }
            },
            Some(_) => {
                debug!("Request {} superseded, dropping its file", entry.seq);
                remove_artifacts(&entry.audio_path).await;
                Ok(Ok(false))
            }
            None => {
                warn!("Session evicted while request {} was downloading", entry.seq);
                remove_artifacts(&entry.audio_path).await;
                Ok(Err(RequestError::Expired))
            }
        }
    }

    /// Send the user's latest downloaded song and delete it.
    #[instrument(skip(self))]
    pub async fn handle_send_audio(&self, chat: ChatId, user: UserId) -> Result<RetrieveOutcome> {
        let Some(entry) = self.sessions.get(user) else {
            self.reply(chat, REQUEST_FIRST).await?;
            return Ok(RetrieveOutcome::NoRequest);
        };

        if !tokio::fs::try_exists(&entry.audio_path).await.unwrap_or(false) {
            self.reply(chat, FILE_MISSING).await?;
            return Ok(RetrieveOutcome::FileMissing);
        }

        match self.chat.send_audio(chat, &entry.audio_path, &entry.title).await {
            Ok(()) => {
                discard_file(&entry.audio_path).await;
                self.reply(chat, ENJOY).await?;
                Ok(RetrieveOutcome::Sent)
            }
            // File stays so the user can retry
            Err(e) => {
                error!("Sending {} failed: {}", entry.audio_path.display(), e);
                self.reply(chat, SEND_FAILED).await?;
                Ok(RetrieveOutcome::SendFailed)
            }
        }
    }
}

/// Remove a file that may not exist.
async fn discard_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShazbotError;
    use crate::youtube::{format_duration, VideoReference};
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    /// Answers searches from a fixed table; `"boom"` fails.
    struct FakeYoutube {
        hits: HashMap<String, String>,
        metadata_fails: bool,
    }

    #[async_trait]
    impl VideoResolver for FakeYoutube {
        async fn resolve(&self, query: &str) -> Result<Option<VideoReference>> {
            if query == "boom" {
                return Err(ShazbotError::Api {
                    status: 403,
                    message: "quotaExceeded".to_string(),
                });
            }
            Ok(self.hits.get(query).map(VideoReference::new))
        }
    }

    #[async_trait]
    impl MetadataFetcher for FakeYoutube {
        async fn fetch_metadata(&self, video_id: &str) -> Result<VideoMetadata> {
            if self.metadata_fails {
                return Err(ShazbotError::VideoNotFound(video_id.to_string()));
            }
            Ok(VideoMetadata {
                title: Some(format!("Title of {video_id}")),
                channel: Some("Some Channel".to_string()),
                description: Some("desc".to_string()),
                published_at: None,
                duration: Some(format_duration("PT3M45S")),
            })
        }
    }

    /// Writes the link into the destination file.
    #[derive(Default)]
    struct FakeExtractor {
        calls: AtomicUsize,
        fail: AtomicBool,
    }

    #[async_trait]
    impl MediaExtractor for FakeExtractor {
        async fn extract(&self, link: &str, dest: &Path) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(ShazbotError::AudioDownload("exit status 1".to_string()));
            }
            tokio::fs::write(dest, link).await?;
            Ok(())
        }
    }

    /// Writes a `.part` file, blocks until released, then writes the
    /// destination and leaves the `.part` behind.
    #[derive(Default)]
    struct GatedExtractor {
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl MediaExtractor for GatedExtractor {
        async fn extract(&self, link: &str, dest: &Path) -> Result<()> {
            let partial = format!("{}.part", dest.display());
            tokio::fs::write(&partial, b"partial").await?;
            self.started.notify_one();
            self.release.notified().await;
            tokio::fs::write(dest, link).await?;
            Ok(())
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        Text(ChatId, String),
        Audio(ChatId, PathBuf, String, Vec<u8>),
    }

    #[derive(Default)]
    struct RecordingChat {
        sent: Mutex<Vec<Sent>>,
        reject_audio: AtomicBool,
    }

    impl RecordingChat {
        fn texts(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter_map(|s| match s {
                    Sent::Text(_, t) => Some(t.clone()),
                    Sent::Audio(..) => None,
                })
                .collect()
        }

        fn audio(&self) -> Vec<(PathBuf, String, Vec<u8>)> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter_map(|s| match s {
                    Sent::Audio(_, p, t, b) => Some((p.clone(), t.clone(), b.clone())),
                    Sent::Text(..) => None,
                })
                .collect()
        }

        fn clear(&self) {
            self.sent.lock().unwrap().clear();
        }
    }

    #[async_trait]
    impl ChatClient for RecordingChat {
        async fn send_text(&self, chat: ChatId, text: &str) -> Result<()> {
            self.sent.lock().unwrap().push(Sent::Text(chat, text.to_string()));
            Ok(())
        }

        async fn send_audio(&self, chat: ChatId, path: &Path, title: &str) -> Result<()> {
            if self.reject_audio.load(Ordering::SeqCst) {
                return Err(ShazbotError::Chat("Request Entity Too Large".to_string()));
            }
            let bytes = tokio::fs::read(path).await?;
            self.sent
                .lock()
                .unwrap()
                .push(Sent::Audio(chat, path.to_path_buf(), title.to_string(), bytes));
            Ok(())
        }
    }

    struct Harness {
        conversation: Conversation,
        chat: Arc<RecordingChat>,
        extractor: Arc<FakeExtractor>,
        dir: TempDir,
    }

    fn fake_youtube(metadata_fails: bool) -> Arc<FakeYoutube> {
        Arc::new(FakeYoutube {
            hits: HashMap::from([
                ("song a".to_string(), "aaaaaaaaaaa".to_string()),
                ("song b".to_string(), "bbbbbbbbbbb".to_string()),
            ]),
            metadata_fails,
        })
    }

    fn harness_with(metadata_fails: bool) -> Harness {
        let youtube = fake_youtube(metadata_fails);
        let extractor = Arc::new(FakeExtractor::default());
        let chat = Arc::new(RecordingChat::default());
        let dir = tempfile::tempdir().unwrap();

        let conversation = Conversation::new(
            youtube.clone(),
            youtube,
            extractor.clone(),
            chat.clone(),
            SessionStore::new(dir.path(), 100),
        );

        Harness {
            conversation,
            chat,
            extractor,
            dir,
        }
    }

    fn harness() -> Harness {
        harness_with(false)
    }

    /// Conversation whose downloads wait for the test to release them.
    fn gated(capacity: usize) -> (Arc<Conversation>, Arc<RecordingChat>, Arc<GatedExtractor>, TempDir) {
        let youtube = fake_youtube(false);
        let extractor = Arc::new(GatedExtractor::default());
        let chat = Arc::new(RecordingChat::default());
        let dir = tempfile::tempdir().unwrap();

        let conversation = Conversation::new(
            youtube.clone(),
            youtube,
            extractor.clone(),
            chat.clone(),
            SessionStore::new(dir.path(), capacity),
        );

        (Arc::new(conversation), chat, extractor, dir)
    }

    fn files_in(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_start_greets() {
        let h = harness();
        h.conversation.handle_start(1).await.unwrap();
        assert_eq!(h.chat.texts(), vec![GREETING.to_string()]);
        assert!(h.conversation.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_message_reply() {
        let h = harness();
        h.conversation.handle_unsupported(1).await.unwrap();

        assert_eq!(h.chat.texts(), vec![UNSUPPORTED.to_string()]);
        assert!(h.conversation.sessions().is_empty());
        assert_eq!(h.extractor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_found_song_is_described_and_downloaded() {
        let h = harness();

        let entry = match h.conversation.handle_text(1, 10, "song a").await.unwrap() {
            RequestOutcome::Ready(entry) => entry,
            other => panic!("expected a ready file, got {other:?}"),
        };

        let texts = h.chat.texts();
        assert_eq!(texts.len(), 4);
        assert_eq!(texts[0], PLEASE_WAIT);
        assert!(texts[1].contains("Title: Title of aaaaaaaaaaa"));
        assert!(texts[1].contains("Artist: Some Channel"));
        assert!(texts[1].contains("Duration: 3 min 45 sec"));
        assert_eq!(texts[2], DOWNLOADING);
        assert_eq!(texts[3], DOWNLOADED);

        let content = std::fs::read_to_string(&entry.audio_path).unwrap();
        assert_eq!(content, "https://www.youtube.com/watch?v=aaaaaaaaaaa");
    }

    #[tokio::test]
    async fn test_no_results_sends_one_not_found() {
        let h = harness();

        let outcome = h.conversation.handle_text(1, 10, "unknown song").await.unwrap();

        assert_eq!(outcome, RequestOutcome::Failed(RequestError::NotFound));
        assert_eq!(h.chat.texts(), vec![PLEASE_WAIT.to_string(), NOT_FOUND.to_string()]);
        assert_eq!(h.extractor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_search_error_looks_like_not_found() {
        let h = harness();

        let outcome = h.conversation.handle_text(1, 10, "boom").await.unwrap();

        assert_eq!(outcome, RequestOutcome::Failed(RequestError::NotFound));
        let texts = h.chat.texts();
        assert_eq!(texts.iter().filter(|t| *t == NOT_FOUND).count(), 1);
        assert!(!texts.iter().any(|t| t.contains("quotaExceeded")));
        assert_eq!(h.extractor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_metadata_failure_uses_placeholders_and_still_downloads() {
        let h = harness_with(true);

        let outcome = h.conversation.handle_text(1, 10, "song a").await.unwrap();

        assert!(matches!(outcome, RequestOutcome::Ready(_)));
        let texts = h.chat.texts();
        assert!(texts[1].contains("Unknown Title"));
        assert!(!texts[1].contains("undefined"));
        assert_eq!(h.extractor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_download_failure_reported_once() {
        let h = harness();
        h.extractor.fail.store(true, Ordering::SeqCst);

        let outcome = h.conversation.handle_text(1, 10, "song a").await.unwrap();

        assert_eq!(outcome, RequestOutcome::Failed(RequestError::Download));
        let texts = h.chat.texts();
        assert_eq!(texts.last().map(String::as_str), Some(DOWNLOAD_FAILED));
        assert!(!texts.iter().any(|t| t == DOWNLOADED || t == NOT_FOUND));
        assert_eq!(files_in(h.dir.path()), 0);
    }

    #[tokio::test]
    async fn test_blank_text_is_not_a_request() {
        let h = harness();

        let outcome = h.conversation.handle_text(1, 10, "   ").await.unwrap();

        assert_eq!(outcome, RequestOutcome::Empty);
        assert_eq!(h.chat.texts(), vec![EMPTY_QUERY.to_string()]);
        assert!(h.conversation.sessions().get(10).is_none());
    }

    #[tokio::test]
    async fn test_send_audio_without_request() {
        let h = harness();

        let outcome = h.conversation.handle_send_audio(1, 10).await.unwrap();

        assert_eq!(outcome, RetrieveOutcome::NoRequest);
        assert_eq!(h.chat.texts(), vec![REQUEST_FIRST.to_string()]);
        assert!(h.chat.audio().is_empty());
    }

    #[tokio::test]
    async fn test_send_audio_uses_latest_request() {
        let h = harness();
        h.conversation.handle_text(1, 10, "song a").await.unwrap();
        h.conversation.handle_text(1, 10, "song b").await.unwrap();
        h.chat.clear();

        let outcome = h.conversation.handle_send_audio(1, 10).await.unwrap();

        assert_eq!(outcome, RetrieveOutcome::Sent);
        let audio = h.chat.audio();
        assert_eq!(audio.len(), 1);
        assert_eq!(audio[0].1, "song b");
        assert_eq!(audio[0].2, b"https://www.youtube.com/watch?v=bbbbbbbbbbb");
        // Song A's file was dropped when song B was requested
        assert_eq!(files_in(h.dir.path()), 0);
    }

    #[tokio::test]
    async fn test_send_audio_is_single_use() {
        let h = harness();
        let Ok(RequestOutcome::Ready(entry)) = h.conversation.handle_text(1, 10, "song a").await else {
            panic!("download should succeed");
        };
        h.chat.clear();

        assert_eq!(h.conversation.handle_send_audio(1, 10).await.unwrap(), RetrieveOutcome::Sent);
        assert!(!entry.audio_path.exists());
        assert_eq!(h.chat.texts(), vec![ENJOY.to_string()]);

        h.chat.clear();
        assert_eq!(
            h.conversation.handle_send_audio(1, 10).await.unwrap(),
            RetrieveOutcome::FileMissing
        );
        assert_eq!(h.chat.texts(), vec![FILE_MISSING.to_string()]);
    }

    #[tokio::test]
    async fn test_send_failure_keeps_file_for_retry() {
        let h = harness();
        let Ok(RequestOutcome::Ready(entry)) = h.conversation.handle_text(1, 10, "song a").await else {
            panic!("download should succeed");
        };
        h.chat.clear();
        h.chat.reject_audio.store(true, Ordering::SeqCst);

        let outcome = h.conversation.handle_send_audio(1, 10).await.unwrap();

        assert_eq!(outcome, RetrieveOutcome::SendFailed);
        assert_eq!(h.chat.texts(), vec![SEND_FAILED.to_string()]);
        assert!(entry.audio_path.exists());

        h.chat.reject_audio.store(false, Ordering::SeqCst);
        assert_eq!(h.conversation.handle_send_audio(1, 10).await.unwrap(), RetrieveOutcome::Sent);
    }

    #[tokio::test]
    async fn test_users_are_independent() {
        let h = harness();
        h.conversation.handle_text(1, 10, "song a").await.unwrap();
        h.conversation.handle_text(2, 20, "song a").await.unwrap();

        assert_eq!(files_in(h.dir.path()), 2);
        assert_eq!(h.conversation.handle_send_audio(1, 10).await.unwrap(), RetrieveOutcome::Sent);
        assert_eq!(h.conversation.handle_send_audio(2, 20).await.unwrap(), RetrieveOutcome::Sent);
    }

    #[tokio::test]
    async fn test_concurrent_requests_from_one_user() {
        let h = harness();
        let conversation = Arc::new(h.conversation);

        let mut handles = Vec::new();
        for _ in 0..5 {
            let conversation = conversation.clone();
            handles.push(tokio::spawn(async move {
                conversation.handle_text(1, 10, "song a").await
            }));
        }
        let mut ready = 0;
        for handle in handles {
            if let RequestOutcome::Ready(_) = handle.await.unwrap().unwrap() {
                ready += 1;
            }
        }

        assert!(ready >= 1);
        assert_eq!(
            conversation.handle_send_audio(1, 10).await.unwrap(),
            RetrieveOutcome::Sent
        );
        assert_eq!(files_in(h.dir.path()), 0);
    }

    #[tokio::test]
    async fn test_superseded_download_is_dropped_silently() {
        let (conversation, chat, extractor, dir) = gated(100);

        let pending = {
            let conversation = conversation.clone();
            tokio::spawn(async move { conversation.handle_text(1, 10, "song a").await })
        };
        extractor.started.notified().await;

        // A newer request from the same user lands mid-download
        let newer = conversation.sessions().begin(10, "song b").entry;
        extractor.release.notify_one();

        let outcome = pending.await.unwrap().unwrap();
        assert_eq!(outcome, RequestOutcome::Superseded);
        assert!(!chat.texts().iter().any(|t| t == DOWNLOADED));
        assert_eq!(files_in(dir.path()), 0);
        assert_eq!(conversation.sessions().get(10), Some(newer));
    }

    #[tokio::test]
    async fn test_evicted_download_gets_a_final_reply() {
        let (conversation, chat, extractor, dir) = gated(1);

        let pending = {
            let conversation = conversation.clone();
            tokio::spawn(async move { conversation.handle_text(1, 10, "song a").await })
        };
        extractor.started.notified().await;

        // Another user pushes user 10 out of a single-slot store
        conversation.sessions().begin(20, "song b");
        extractor.release.notify_one();

        let outcome = pending.await.unwrap().unwrap();
        assert_eq!(outcome, RequestOutcome::Failed(RequestError::Expired));
        let texts = chat.texts();
        assert_eq!(texts.last().map(String::as_str), Some(EXPIRED));
        assert!(!texts.iter().any(|t| t == DOWNLOADED));
        assert_eq!(files_in(dir.path()), 0);
    }
}
