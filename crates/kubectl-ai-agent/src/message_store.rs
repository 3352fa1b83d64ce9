//! `ChatMessageStore` (spec §4.5, §6): append-only ordered log of `Message`
//! records for a session, with in-memory and file-backed implementations.

use kubectl_ai_core::{Message, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

#[async_trait::async_trait]
pub trait ChatMessageStore: Send + Sync {
    async fn add(&self, msg: Message) -> Result<()>;
    async fn set(&self, msgs: Vec<Message>) -> Result<()>;
    async fn get(&self) -> Result<Vec<Message>>;
    async fn clear(&self) -> Result<()>;
}

/// Guarded by a single read/write lock (spec §4.5 memory store).
#[derive(Default)]
pub struct MemoryChatMessageStore {
    messages: RwLock<Vec<Message>>,
}

impl MemoryChatMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ChatMessageStore for MemoryChatMessageStore {
    async fn add(&self, msg: Message) -> Result<()> {
        self.messages.write().await.push(msg);
        Ok(())
    }

    async fn set(&self, msgs: Vec<Message>) -> Result<()> {
        *self.messages.write().await = msgs;
        Ok(())
    }

    async fn get(&self) -> Result<Vec<Message>> {
        Ok(self.messages.read().await.clone())
    }

    async fn clear(&self) -> Result<()> {
        self.messages.write().await.clear();
        Ok(())
    }
}

/// Persists the whole session as a single JSON array at `<dir>/history.json`
/// (spec §4.5: "pick one and document it" — a single array is simplest to
/// keep consistent with `Set`/`Clear` replacing the whole log). Every
/// mutation rewrites the file under an internal mutex.
pub struct FileChatMessageStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileChatMessageStore {
    pub fn new(history_path: impl Into<PathBuf>) -> Self {
        Self {
            path: history_path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> Result<Vec<Message>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn write_file(&self, msgs: &[Message]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(msgs)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ChatMessageStore for FileChatMessageStore {
    async fn add(&self, msg: Message) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut msgs = self.read_file()?;
        msgs.push(msg);
        self.write_file(&msgs)
    }

    async fn set(&self, msgs: Vec<Message>) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.write_file(&msgs)
    }

    async fn get(&self) -> Result<Vec<Message>> {
        let _guard = self.lock.lock().await;
        self.read_file()
    }

    async fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.write_file(&[])
    }
}

pub fn memory_store() -> Arc<dyn ChatMessageStore> {
    Arc::new(MemoryChatMessageStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubectl_ai_core::Message;

    #[tokio::test]
    async fn memory_store_round_trips_set_and_get() {
        let store = MemoryChatMessageStore::new();
        let msgs = vec![Message::user_text("hi"), Message::model_text("hello")];
        store.set(msgs.clone()).await.unwrap();
        let got = store.get().await.unwrap();
        assert_eq!(got.len(), msgs.len());
        assert_eq!(got[0].id, msgs[0].id);
    }

    #[tokio::test]
    async fn file_store_round_trips_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let store = FileChatMessageStore::new(&path);
        let msgs = vec![
            Message::user_text("one"),
            Message::model_text("two"),
            Message::agent_text("three"),
        ];
        store.set(msgs.clone()).await.unwrap();

        let reopened = FileChatMessageStore::new(&path);
        let got = reopened.get().await.unwrap();
        assert_eq!(got.len(), 3);
        assert_eq!(got[2].id, msgs[2].id);
    }

    #[tokio::test]
    async fn clear_empties_the_store() {
        let store = MemoryChatMessageStore::new();
        store.add(Message::user_text("x")).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.get().await.unwrap().is_empty());
    }
}
