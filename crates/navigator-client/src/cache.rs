use crate::types::chat::Message;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

/// File-backed transcript cache, one JSON file per chat.
///
/// The cache is an optimistic mirror of server-held history: reads serve as
/// a fallback when the authoritative fetch fails, writes are last-writer-
/// wins, and every I/O failure is logged and swallowed. Nothing here may
/// fail a send or a chat load.
pub struct TranscriptCache {
    dir: PathBuf,
}

impl TranscriptCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Default location under the platform cache directory, e.g.
    /// `~/.cache/fleet-navigator/chats` on Linux. Falls back to a relative
    /// directory when the platform reports no cache dir.
    pub fn default_location() -> Self {
        let dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".fleet-navigator"))
            .join("fleet-navigator")
            .join("chats");
        Self::new(dir)
    }

    fn path_for(&self, chat_id: i64) -> PathBuf {
        self.dir.join(format!("chat-{chat_id}.json"))
    }

    /// Overwrites the cached transcript for a chat.
    pub fn store(&self, chat_id: i64, messages: &[Message]) {
        if let Err(e) = self.try_store(chat_id, messages) {
            warn!(chat_id, error = %e, "failed to write transcript cache");
        }
    }

    fn try_store(&self, chat_id: i64, messages: &[Message]) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_vec(messages)?;
        // Write-then-rename so a crash never leaves a torn file behind.
        let tmp = self.dir.join(format!("chat-{chat_id}.json.tmp"));
        fs::write(&tmp, json)?;
        fs::rename(&tmp, self.path_for(chat_id))?;
        Ok(())
    }

    /// Reads the cached transcript, `None` when absent or unreadable. A
    /// corrupt file is treated the same as a missing one.
    pub fn load(&self, chat_id: i64) -> Option<Vec<Message>> {
        let path = self.path_for(chat_id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(chat_id, error = %e, "failed to read transcript cache");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(messages) => Some(messages),
            Err(e) => {
                warn!(chat_id, error = %e, "discarding corrupt transcript cache entry");
                None
            }
        }
    }

    /// Drops the cached transcript for a deleted chat.
    pub fn evict(&self, chat_id: i64) {
        match fs::remove_file(self.path_for(chat_id)) {
            Ok(()) => debug!(chat_id, "evicted cached transcript"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(chat_id, error = %e, "failed to evict cached transcript"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TranscriptCache::new(dir.path());
        let messages = vec![Message::user("hallo"), Message::assistant("Hallo!")];

        cache.store(7, &messages);
        let loaded = cache.load(7).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].content, "Hallo!");
    }

    #[test]
    fn test_load_missing_chat_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TranscriptCache::new(dir.path());
        assert!(cache.load(999).is_none());
    }

    #[test]
    fn test_corrupt_entry_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TranscriptCache::new(dir.path());
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(dir.path().join("chat-3.json"), b"not json").unwrap();
        assert!(cache.load(3).is_none());
    }

    #[test]
    fn test_store_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TranscriptCache::new(dir.path());
        cache.store(1, &[Message::user("a")]);
        cache.store(1, &[Message::user("a"), Message::assistant("b")]);
        assert_eq!(cache.load(1).unwrap().len(), 2);
    }

    #[test]
    fn test_evict_removes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TranscriptCache::new(dir.path());
        cache.store(1, &[Message::user("a")]);
        cache.evict(1);
        assert!(cache.load(1).is_none());
        // Evicting again is harmless.
        cache.evict(1);
    }
}
