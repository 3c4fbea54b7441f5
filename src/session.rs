//! Per-user session state.
//!
//! Remembers each user's most recent song request so `/send_audio` knows
//! which file to send. Entries live in memory only and are lost on restart.
//!
//! Audio files are named after the user id and a process-wide request
//! sequence number, never after the song title. The title is kept only for
//! display.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Telegram user identifier.
pub type UserId = u64;

/// A user's latest request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    /// The query as the user typed it.
    pub title: String,
    /// Where the audio for this request is (or will be) stored.
    pub audio_path: PathBuf,
    /// Request sequence number, unique for the process lifetime.
    pub seq: u64,
}

/// Result of recording a new request.
#[derive(Debug)]
pub struct Begun {
    pub entry: SessionEntry,
    /// Entries dropped by this call: the user's previous request and any
    /// evicted users. Their audio files are no longer reachable.
    pub stale: Vec<SessionEntry>,
}

struct Slot {
    entry: SessionEntry,
    last_used: u64,
}

#[derive(Default)]
struct Inner {
    slots: HashMap<UserId, Slot>,
    clock: u64,
    next_seq: u64,
}

impl Inner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

/// In-memory map from user to their latest request, bounded with LRU eviction.
pub struct SessionStore {
    inner: Mutex<Inner>,
    download_dir: PathBuf,
    capacity: usize,
}

impl SessionStore {
    pub fn new(download_dir: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            download_dir: download_dir.into(),
            capacity: capacity.max(1),
        }
    }

    /// Directory holding the audio files.
    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a new request for `user`, replacing their previous one.
    pub fn begin(&self, user: UserId, title: &str) -> Begun {
        let mut inner = self.lock();

        inner.next_seq += 1;
        let seq = inner.next_seq;
        let entry = SessionEntry {
            title: title.to_string(),
            audio_path: self.download_dir.join(format!("{}-{}.mp3", user, seq)),
            seq,
        };

        let last_used = inner.tick();
        let mut stale: Vec<SessionEntry> = inner
            .slots
            .insert(
                user,
                Slot {
                    entry: entry.clone(),
                    last_used,
                },
            )
            .map(|slot| slot.entry)
            .into_iter()
            .collect();

        while inner.slots.len() > self.capacity {
            let oldest = inner
                .slots
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(id, _)| *id);
            match oldest.and_then(|id| inner.slots.remove(&id)) {
                Some(slot) => {
                    debug!("Evicted session seq={}", slot.entry.seq);
                    stale.push(slot.entry);
                }
                None => break,
            }
        }

        Begun { entry, stale }
    }

    /// The user's latest request, if any.
    pub fn get(&self, user: UserId) -> Option<SessionEntry> {
        let mut inner = self.lock();
        let now = inner.tick();
        inner.slots.get_mut(&user).map(|slot| {
            slot.last_used = now;
            slot.entry.clone()
        })
    }

    /// Sequence number of the user's latest request, without touching LRU order.
    ///
    /// `None` means the user has no session, e.g. after eviction.
    pub fn current_seq(&self, user: UserId) -> Option<u64> {
        self.lock().slots.get(&user).map(|slot| slot.entry.seq)
    }

    /// Whether request `seq` is still the user's latest one.
    pub fn is_current(&self, user: UserId, seq: u64) -> bool {
        self.current_seq(user) == Some(seq)
    }

    /// Number of users with a session.
    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_request_wins() {
        let store = SessionStore::new("/downloads", 10);

        let first = store.begin(1, "song a");
        assert!(first.stale.is_empty());
        let second = store.begin(1, "song b");

        assert_eq!(second.stale, vec![first.entry.clone()]);
        let entry = store.get(1).unwrap();
        assert_eq!(entry.title, "song b");
        assert_eq!(entry, second.entry);
        assert!(!store.is_current(1, first.entry.seq));
        assert!(store.is_current(1, second.entry.seq));
    }

    #[test]
    fn test_file_names_ignore_title() {
        let store = SessionStore::new("/downloads", 10);

        let begun = store.begin(42, "../../etc/passwd");
        assert_eq!(begun.entry.audio_path.parent(), Some(Path::new("/downloads")));
        assert_eq!(
            begun.entry.audio_path.file_name().unwrap().to_string_lossy(),
            format!("42-{}.mp3", begun.entry.seq)
        );
    }

    #[test]
    fn test_same_title_never_shares_a_path() {
        let store = SessionStore::new("/downloads", 10);

        let a = store.begin(1, "same song").entry;
        let b = store.begin(2, "same song").entry;
        let c = store.begin(1, "same song").entry;

        assert_ne!(a.audio_path, b.audio_path);
        assert_ne!(a.audio_path, c.audio_path);
    }

    #[test]
    fn test_lru_eviction() {
        let store = SessionStore::new("/downloads", 2);

        let one = store.begin(1, "one").entry;
        store.begin(2, "two");
        // Touch user 1 so user 2 becomes least recently used
        store.get(1);
        let begun = store.begin(3, "three");

        assert_eq!(store.len(), 2);
        assert!(store.get(2).is_none());
        assert_eq!(store.get(1), Some(one));
        assert_eq!(begun.stale.len(), 1);
        assert_eq!(begun.stale[0].title, "two");
        assert_eq!(store.current_seq(2), None);
        assert_eq!(store.current_seq(3), Some(begun.entry.seq));
    }

    #[test]
    fn test_unknown_user() {
        let store = SessionStore::new("/downloads", 2);
        assert!(store.is_empty());
        assert!(store.get(7).is_none());
        assert!(!store.is_current(7, 1));
    }
}
