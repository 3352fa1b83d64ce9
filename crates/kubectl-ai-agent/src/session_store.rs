//! `SessionStore` + `SessionManager` (spec §4.5): persist session metadata
//! alongside a `ChatMessageStore`. Memory and file-backed implementations.

use crate::message_store::{memory_store, ChatMessageStore, FileChatMessageStore};
use kubectl_ai_core::{Error, Result, SessionId, SessionMeta};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Session metadata plus its attached message store — returned by
/// `SessionStore::get`/`create` (spec §4.5: "`Get` ... attaches a
/// file-backed `ChatMessageStore`").
pub struct SessionHandle {
    pub meta: SessionMeta,
    pub messages: Arc<dyn ChatMessageStore>,
}

#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: &SessionId) -> Result<SessionHandle>;
    async fn create(&self, meta: SessionMeta) -> Result<SessionHandle>;
    async fn update(&self, meta: &SessionMeta) -> Result<()>;
    /// Sorted newest-first by `last_modified`.
    async fn list(&self) -> Result<Vec<SessionMeta>>;
    async fn delete(&self, id: &SessionId) -> Result<()>;
}

/// Guarded by a read/write lock; insertion order is list order, callers sort
/// by `last_modified` descending (spec §4.5).
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, (SessionMeta, Arc<dyn ChatMessageStore>)>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &SessionId) -> Result<SessionHandle> {
        let sessions = self.sessions.read().await;
        let (meta, messages) = sessions
            .get(id)
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))?;
        Ok(SessionHandle {
            meta: meta.clone(),
            messages: messages.clone(),
        })
    }

    async fn create(&self, meta: SessionMeta) -> Result<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&meta.id) {
            return Err(Error::SessionAlreadyExists(meta.id.to_string()));
        }
        let messages = memory_store();
        sessions.insert(meta.id.clone(), (meta.clone(), messages.clone()));
        Ok(SessionHandle { meta, messages })
    }

    async fn update(&self, meta: &SessionMeta) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(&meta.id)
            .ok_or_else(|| Error::SessionNotFound(meta.id.to_string()))?;
        entry.0 = meta.clone();
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionMeta>> {
        let sessions = self.sessions.read().await;
        let mut metas: Vec<SessionMeta> = sessions.values().map(|(m, _)| m.clone()).collect();
        metas.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(metas)
    }

    async fn delete(&self, id: &SessionId) -> Result<()> {
        self.sessions.write().await.remove(id);
        Ok(())
    }
}

/// Each session is a directory under `base_path` named after its id:
/// `metadata.yaml` (session fields, no messages) + `history.json` (spec
/// §4.5, §6).
pub struct FileSessionStore {
    base_path: PathBuf,
}

impl FileSessionStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// `<home>/.kubectl-ai/sessions/` (spec §6).
    pub fn default_base_path() -> PathBuf {
        dirs_home().join(".kubectl-ai").join("sessions")
    }

    fn session_dir(&self, id: &SessionId) -> PathBuf {
        self.base_path.join(id.as_str())
    }

    fn metadata_path(&self, id: &SessionId) -> PathBuf {
        self.session_dir(id).join("metadata.yaml")
    }

    fn history_path(&self, id: &SessionId) -> PathBuf {
        self.session_dir(id).join("history.json")
    }

    fn read_meta(&self, id: &SessionId) -> Result<SessionMeta> {
        let path = self.metadata_path(id);
        if !path.exists() {
            return Err(Error::SessionNotFound(id.to_string()));
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&raw)?)
    }

    fn write_meta(&self, meta: &SessionMeta) -> Result<()> {
        let dir = self.session_dir(&meta.id);
        std::fs::create_dir_all(&dir)?;
        let raw = serde_yaml::to_string(meta)?;
        std::fs::write(self.metadata_path(&meta.id), raw)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SessionStore for FileSessionStore {
    async fn get(&self, id: &SessionId) -> Result<SessionHandle> {
        let meta = self.read_meta(id)?;
        let messages = Arc::new(FileChatMessageStore::new(self.history_path(id)));
        Ok(SessionHandle { meta, messages })
    }

    async fn create(&self, meta: SessionMeta) -> Result<SessionHandle> {
        if self.metadata_path(&meta.id).exists() {
            return Err(Error::SessionAlreadyExists(meta.id.to_string()));
        }
        self.write_meta(&meta)?;
        let messages = Arc::new(FileChatMessageStore::new(self.history_path(&meta.id)));
        messages.set(Vec::new()).await?;
        Ok(SessionHandle { meta, messages })
    }

    async fn update(&self, meta: &SessionMeta) -> Result<()> {
        if !self.metadata_path(&meta.id).exists() {
            return Err(Error::SessionNotFound(meta.id.to_string()));
        }
        self.write_meta(meta)
    }

    async fn list(&self) -> Result<Vec<SessionMeta>> {
        let mut metas = Vec::new();
        if !self.base_path.exists() {
            return Ok(metas);
        }
        for entry in std::fs::read_dir(&self.base_path)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let id = SessionId::new(entry.file_name().to_string_lossy().to_string());
            if let Ok(meta) = self.read_meta(&id) {
                metas.push(meta);
            }
        }
        metas.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(metas)
    }

    async fn delete(&self, id: &SessionId) -> Result<()> {
        let dir = self.session_dir(id);
        if dir.exists() {
            std::fs::remove_dir_all(dir)?;
        }
        Ok(())
    }
}

fn dirs_home() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Binds an id-keyed `SessionStore` to session creation (spec §4.5).
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Generates an id of the form `YYYYMMDD-NNNN`; on collision, retries
    /// with a fresh random suffix (spec §4.5, open question resolution).
    pub async fn new_session(
        &self,
        provider_id: impl Into<String> + Clone,
        model_id: impl Into<String> + Clone,
    ) -> Result<SessionHandle> {
        const MAX_ATTEMPTS: usize = 20;
        for _ in 0..MAX_ATTEMPTS {
            let id = generate_session_id();
            let meta = SessionMeta::new(id, provider_id.clone(), model_id.clone());
            match self.store.create(meta).await {
                Ok(handle) => return Ok(handle),
                Err(Error::SessionAlreadyExists(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(Error::storage("exhausted session id generation attempts"))
    }

    pub async fn get(&self, id: &SessionId) -> Result<SessionHandle> {
        self.store.get(id).await
    }

    pub async fn update(&self, meta: &SessionMeta) -> Result<()> {
        self.store.update(meta).await
    }

    pub async fn list(&self) -> Result<Vec<SessionMeta>> {
        self.store.list().await
    }

    pub async fn delete(&self, id: &SessionId) -> Result<()> {
        self.store.delete(id).await
    }
}

fn generate_session_id() -> SessionId {
    let now = chrono::Utc::now();
    let date = now.format("%Y%m%d");
    let suffix = (uuid::Uuid::new_v4().as_u128() % 10_000) as u32;
    SessionId::new(format!("{}-{:04}", date, suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_session_id_is_well_formed() {
        let manager = SessionManager::new(Arc::new(MemorySessionStore::new()));
        let handle = manager.new_session("anthropic", "claude").await.unwrap();
        assert!(handle.meta.id.is_well_formed());
    }

    #[tokio::test]
    async fn create_twice_fails_already_exists() {
        let store = MemorySessionStore::new();
        let meta = SessionMeta::new(SessionId::new("20260727-0001"), "anthropic", "claude");
        store.create(meta.clone()).await.unwrap();
        let err = store.create(meta).await.unwrap_err();
        assert!(matches!(err, Error::SessionAlreadyExists(_)));
    }

    #[tokio::test]
    async fn list_is_sorted_newest_first() {
        let store = MemorySessionStore::new();
        let mut older = SessionMeta::new(SessionId::new("20260727-0001"), "a", "m");
        older.last_modified = older.created_at - chrono::Duration::seconds(60);
        let newer = SessionMeta::new(SessionId::new("20260727-0002"), "a", "m");
        store.create(older.clone()).await.unwrap();
        store.create(newer.clone()).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed[0].id, newer.id);
        assert_eq!(listed[1].id, older.id);
    }

    #[tokio::test]
    async fn file_store_round_trip_across_instances() {
        let base = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(base.path());
        let meta = SessionMeta::new(SessionId::new("20260727-0003"), "anthropic", "claude");
        let handle = store.create(meta.clone()).await.unwrap();
        handle
            .messages
            .set(vec![kubectl_ai_core::Message::user_text("hi")])
            .await
            .unwrap();

        let reopened = FileSessionStore::new(base.path());
        let fetched = reopened.get(&meta.id).await.unwrap();
        assert_eq!(fetched.meta.id, meta.id);
        assert_eq!(fetched.messages.get().await.unwrap().len(), 1);
    }
}
