use super::kv::KvStore;
use anyhow::{Result, anyhow};
use cocreate_common::ChatTurn;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

pub const MAX_SESSION_ID_LEN: usize = 128;

/// Per-session chat transcripts, keyed `session:{id}:{micros:020}:{seq:020}`.
#[derive(Clone)]
pub struct ChatHistory {
    kv: KvStore,
    seq: std::sync::Arc<AtomicU64>,
}

impl ChatHistory {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;
        let kv = KvStore::open(path)?;
        tracing::info!("Chat history store opened at {}", path.display());
        Ok(Self {
            kv,
            seq: std::sync::Arc::new(AtomicU64::new(0)),
        })
    }

    /// Session ids become part of the key, so the separator is not allowed.
    pub fn validate_session_id(session_id: &str) -> Result<()> {
        if session_id.is_empty() {
            return Err(anyhow!("session_id must not be empty"));
        }
        if session_id.len() > MAX_SESSION_ID_LEN {
            return Err(anyhow!("session_id longer than {} bytes", MAX_SESSION_ID_LEN));
        }
        if session_id.contains(':') {
            return Err(anyhow!("session_id must not contain ':'"));
        }
        Ok(())
    }

    fn session_prefix(session_id: &str) -> String {
        format!("session:{}:", session_id)
    }

    pub fn append(&self, session_id: &str, turn: &ChatTurn) -> Result<()> {
        Self::validate_session_id(session_id)?;
        let micros = turn.created_at.timestamp_micros().max(0);
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let key = format!("{}{:020}:{:020}", Self::session_prefix(session_id), micros, seq);
        let value = serde_json::to_vec(turn)?;
        self.kv.put(key.as_bytes(), &value)
    }

    pub fn append_all(&self, session_id: &str, turns: &[ChatTurn]) -> Result<()> {
        for turn in turns {
            self.append(session_id, turn)?;
        }
        Ok(())
    }

    /// The most recent `limit` turns of a session, oldest first.
    pub fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<ChatTurn>> {
        Self::validate_session_id(session_id)?;
        let prefix = Self::session_prefix(session_id);
        self.kv
            .scan_tail(prefix.as_bytes(), limit)?
            .into_iter()
            .map(|(_, v)| serde_json::from_slice::<ChatTurn>(&v).map_err(Into::into))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cocreate_common::ChatRole;
    use tempfile::tempdir;

    #[test]
    fn test_append_and_recent_in_order() -> Result<()> {
        let dir = tempdir()?;
        let history = ChatHistory::open(dir.path().join("history"))?;

        history.append_all("s1", &[
            ChatTurn::new(ChatRole::User, "one"),
            ChatTurn::new(ChatRole::Assistant, "two"),
            ChatTurn::new(ChatRole::User, "three"),
        ])?;
        history.append("s2", &ChatTurn::new(ChatRole::User, "elsewhere"))?;

        let turns = history.recent("s1", 2)?;
        let contents: Vec<_> = turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["two", "three"]);

        assert_eq!(history.recent("s1", 10)?.len(), 3);
        assert_eq!(history.recent("s2", 10)?.len(), 1);
        assert!(history.recent("unknown", 10)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_sessions_sharing_a_prefix_stay_apart() -> Result<()> {
        let dir = tempdir()?;
        let history = ChatHistory::open(dir.path())?;

        history.append("abc", &ChatTurn::new(ChatRole::User, "short"))?;
        history.append("abcd", &ChatTurn::new(ChatRole::User, "long"))?;

        let turns = history.recent("abc", 10)?;
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].content, "short");
        Ok(())
    }

    #[test]
    fn test_rejects_bad_session_ids() -> Result<()> {
        let dir = tempdir()?;
        let history = ChatHistory::open(dir.path())?;
        let turn = ChatTurn::new(ChatRole::User, "x");

        assert!(history.append("", &turn).is_err());
        assert!(history.append("a:b", &turn).is_err());
        assert!(history.recent(&"x".repeat(MAX_SESSION_ID_LEN + 1), 1).is_err());
        assert!(ChatHistory::validate_session_id("session-42").is_ok());
        Ok(())
    }

    #[test]
    fn test_history_survives_reopen() -> Result<()> {
        let dir = tempdir()?;
        {
            let history = ChatHistory::open(dir.path())?;
            history.append("s1", &ChatTurn::new(ChatRole::User, "persisted"))?;
        }
        let reopened = ChatHistory::open(dir.path())?;
        assert_eq!(reopened.recent("s1", 5)?[0].content, "persisted");
        Ok(())
    }
}
