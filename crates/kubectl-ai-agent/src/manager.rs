//! `AgentManager` (spec §4.5): binds a `SessionStore` to a pool of live
//! `Agent`s, one per session. A `DashMap`-backed concurrent registry rather
//! than a single lock around a `HashMap`.

use crate::agent::{Agent, AgentConfig};
use crate::session_store::SessionManager;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use kubectl_ai_core::{Result, SessionId, SessionMeta};
use kubectl_ai_llm::LlmProvider;
use kubectl_ai_tools::ToolRegistry;
use std::sync::Arc;

/// Invoked exactly once per freshly-registered agent, under the same lock
/// that inserts it into the agent map (spec §4.5).
pub type AgentCreatedCallback = Arc<dyn Fn(&SessionId, &Arc<Agent>) + Send + Sync>;

/// Factory + registry for `Agent`s bound to sessions (spec §4.5). Enforces
/// "at most one agent per session id."
pub struct AgentManager {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    sessions: SessionManager,
    config: AgentConfig,
    agents: DashMap<SessionId, Arc<Agent>>,
    on_agent_created: Option<AgentCreatedCallback>,
}

impl AgentManager {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        sessions: SessionManager,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            sessions,
            config,
            agents: DashMap::new(),
            on_agent_created: None,
        }
    }

    /// Registers a one-shot callback invoked whenever `start_agent` actually
    /// registers a new agent (spec §4.5: "`onAgentCreated` ... invoked under
    /// the same lock as agent registration").
    pub fn with_on_agent_created(
        mut self,
        callback: impl Fn(&SessionId, &Arc<Agent>) + Send + Sync + 'static,
    ) -> Self {
        self.on_agent_created = Some(Arc::new(callback));
        self
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Creates a new session and immediately starts its agent (spec §4.5:
    /// `CreateSession` calls the factory, creates the session, then starts
    /// the agent before returning).
    pub async fn create_session(
        &self,
        provider_id: impl Into<String> + Clone,
        model_id: impl Into<String> + Clone,
    ) -> Result<SessionMeta> {
        let handle = self.sessions.new_session(provider_id, model_id).await?;
        let meta = handle.meta.clone();
        self.start_agent(&meta.id).await?;
        Ok(meta)
    }

    pub fn get_agent(&self, id: &SessionId) -> Option<Arc<Agent>> {
        self.agents.get(id).map(|entry| entry.value().clone())
    }

    /// Attaches and starts an `Agent` for `id`, or returns the existing one
    /// if already running (spec §4.5 invariant: at most one agent per
    /// session id). Registration and the `onAgentCreated` callback happen
    /// under the same `DashMap` shard lock, via the entry API, so a
    /// concurrent caller either observes the fully-registered agent or
    /// none at all.
    pub async fn start_agent(&self, id: &SessionId) -> Result<Arc<Agent>> {
        if let Some(existing) = self.get_agent(id) {
            return Ok(existing);
        }

        let handle = self.sessions.get(id).await?;
        let agent = Agent::new(
            self.provider.clone(),
            self.tools.clone(),
            handle,
            self.config.clone(),
        );
        agent.init().await?;

        match self.agents.entry(id.clone()) {
            Entry::Occupied(entry) => {
                // Another caller registered this session's agent while we
                // awaited `init`.
                let existing = entry.get().clone();
                let _ = agent.close().await;
                Ok(existing)
            }
            Entry::Vacant(entry) => {
                entry.insert(agent.clone());
                if let Some(callback) = &self.on_agent_created {
                    callback(id, &agent);
                }
                agent.run("");
                Ok(agent)
            }
        }
    }

    /// Closes the agent (if running) and deletes the session from the
    /// store.
    pub async fn delete_session(&self, id: &SessionId) -> Result<()> {
        if let Some((_, agent)) = self.agents.remove(id) {
            let _ = agent.close().await;
        }
        self.sessions.delete(id).await
    }

    /// Closes every active agent, best-effort.
    pub async fn close(&self) -> Result<()> {
        let ids: Vec<SessionId> = self.agents.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((_, agent)) = self.agents.remove(&id) {
                let _ = agent.close().await;
            }
        }
        Ok(())
    }

    pub fn active_session_ids(&self) -> Vec<SessionId> {
        self.agents.iter().map(|e| e.key().clone()).collect()
    }
}
