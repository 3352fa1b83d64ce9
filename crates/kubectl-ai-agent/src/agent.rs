//! `Agent` state machine and iteration loop (spec §4.1). The core of this
//! crate: a single long-running task driven by channel selects rather than
//! a callback tree (Design Notes §9).

use crate::dispatcher::{self, dispatch};
use crate::message_store::ChatMessageStore;
use crate::request::RequestController;
use crate::session_store::SessionHandle;
use crate::shim;
use kubectl_ai_core::{
    AgentState, Choice, Error, FunctionCall, FunctionCallResult, Message, OperationKind, Result,
    SessionMeta,
};
use kubectl_ai_llm::{Chat, LlmMessage, LlmProvider, LlmStream};
use kubectl_ai_tools::{ToolCallAnalyzer, ToolRegistry};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Bounded so a slow consumer applies back-pressure instead of the agent
/// buffering Messages without limit.
const CHANNEL_CAPACITY: usize = 256;

/// Per spec §5: a streaming tool command gets a soft timeout layered over
/// the request context; elapsing it yields `streamType = "timeout"`, not an
/// error.
pub const SOFT_STREAM_TIMEOUT_SECS: u64 = 7;

/// Bounds `Close()`'s executor/LLM-client teardown (spec §4.1).
const CLOSE_BUDGET_SECS: u64 = 120;

const MAX_ITERATIONS_DEFAULT: usize = 25;

/// Responses the UI sends back to the agent (spec §6 "Input Message
/// schema").
#[derive(Clone, Debug)]
pub enum InputMessage {
    UserInput(String),
    UserChoice(i32),
    Eof,
}

#[derive(Clone)]
pub struct AgentConfig {
    pub default_model: String,
    pub max_iterations: usize,
    pub system_prompt: Option<String>,
    pub workspace_root: PathBuf,
    /// Path to the kubeconfig a dispatched tool call should use, if any
    /// (spec §4.3 item 2).
    pub kubeconfig: Option<PathBuf>,
    /// The executor handle every dispatched tool call is scoped to (spec
    /// §4.3 item 2). Defaults to a no-op executor; a binary wiring up a real
    /// `kubectl`/shell backend would supply its own here.
    pub executor: Arc<dyn kubectl_ai_tools::Executor>,
    pub skip_permissions: bool,
    /// Non-interactive mode: one query, no permission prompts, terminal on
    /// first completion (glossary "RunOnce mode").
    pub run_once: bool,
    pub shim_enabled: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            default_model: "gemini-2.0-flash".to_string(),
            max_iterations: MAX_ITERATIONS_DEFAULT,
            system_prompt: None,
            workspace_root: std::env::current_dir().unwrap_or_default(),
            kubeconfig: None,
            executor: Arc::new(kubectl_ai_tools::NoopExecutor::default()),
            skip_permissions: false,
            run_once: false,
            shim_enabled: false,
        }
    }
}

pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    session_meta: RwLock<SessionMeta>,
    messages: Arc<dyn ChatMessageStore>,
    config: AgentConfig,
    chat: Mutex<Option<Box<dyn Chat>>>,
    input_tx: mpsc::Sender<InputMessage>,
    input_rx: Mutex<Option<mpsc::Receiver<InputMessage>>>,
    output_tx: Mutex<Option<mpsc::Sender<Message>>>,
    output_rx: Mutex<Option<mpsc::Receiver<Message>>>,
    base_cancel: CancellationToken,
    current_controller: RwLock<Option<Arc<RequestController>>>,
    skip_permissions: AtomicBool,
    models_cache: Mutex<Option<Vec<String>>>,
    last_err: Mutex<Option<String>>,
}

impl Agent {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        session: SessionHandle,
        config: AgentConfig,
    ) -> Arc<Self> {
        let (input_tx, input_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (output_tx, output_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let skip_permissions = config.skip_permissions;
        Arc::new(Self {
            provider,
            tools,
            session_meta: RwLock::new(session.meta),
            messages: session.messages,
            config,
            chat: Mutex::new(None),
            input_tx,
            input_rx: Mutex::new(Some(input_rx)),
            output_tx: Mutex::new(Some(output_tx)),
            output_rx: Mutex::new(Some(output_rx)),
            base_cancel: CancellationToken::new(),
            current_controller: RwLock::new(None),
            skip_permissions: AtomicBool::new(skip_permissions),
            models_cache: Mutex::new(None),
            last_err: Mutex::new(None),
        })
    }

    pub fn input_sender(&self) -> mpsc::Sender<InputMessage> {
        self.input_tx.clone()
    }

    /// Takes the `Output` receiver. Callers must call this before `Run` if
    /// they want to read Messages — once taken, a second call returns `None`.
    pub async fn take_output(&self) -> Option<mpsc::Receiver<Message>> {
        self.output_rx.lock().await.take()
    }

    pub async fn get_session(&self) -> SessionMeta {
        self.session_meta.read().await.clone()
    }

    pub async fn last_error(&self) -> Option<String> {
        self.last_err.lock().await.clone()
    }

    /// One-shot setup (spec §4.1): starts a chat bound to the session's
    /// model, seeds it with existing history, and registers tool
    /// definitions (skipped when the shim is enabled — the shim's LLM has
    /// no native function-calling to register against).
    pub async fn init(&self) -> Result<()> {
        let model = {
            let meta = self.session_meta.read().await;
            if meta.model_id.is_empty() {
                self.config.default_model.clone()
            } else {
                meta.model_id.clone()
            }
        };
        let mut chat = self
            .provider
            .start_chat(self.config.system_prompt.clone(), &model)
            .await
            .map_err(|e| Error::llm(e.to_string()))?;

        let existing = self.messages.get().await?;
        chat.initialize(existing);
        if !self.config.shim_enabled {
            chat.set_function_definitions(self.tools.get_definitions());
        }
        *self.chat.lock().await = Some(chat);
        self.set_state(AgentState::Idle).await;
        Ok(())
    }

    /// Spawns the loop in the background; returns immediately (spec §4.1).
    /// If `initial_query` is non-empty it's treated as if typed at the
    /// first prompt.
    pub fn run(self: &Arc<Self>, initial_query: impl Into<String>) {
        let agent = self.clone();
        let query = initial_query.into();
        tokio::spawn(async move {
            agent.run_loop(query).await;
        });
    }

    /// Requests cancellation of the identified in-flight request (spec
    /// §4.4). Stale ids (not the current request) are ignored silently.
    pub async fn cancel_request(&self, request_id: &str) {
        let controller = self.current_controller.read().await.clone();
        if let Some(controller) = controller {
            if controller.id() == request_id && controller.mark_cancellation_pending() {
                controller.cancel();
            }
        }
    }

    /// Idempotent teardown bounded by a 2-minute overall budget (spec §4.1).
    pub async fn close(&self) -> Result<()> {
        self.base_cancel.cancel();
        let _ = tokio::time::timeout(
            std::time::Duration::from_secs(CLOSE_BUDGET_SECS),
            self.provider.close(),
        )
        .await;
        Ok(())
    }

    async fn set_state(&self, state: AgentState) {
        self.session_meta.write().await.set_state(state);
    }

    async fn set_current_request_id(&self, id: Option<String>) {
        let mut meta = self.session_meta.write().await;
        meta.current_request_id = id;
        meta.touch();
    }

    /// Appends to the message store, then publishes to `Output` (spec §8
    /// invariant 3: every published Message was first appended). `Output`
    /// is bounded and the agent must not drop Messages, so this blocks the
    /// producer when the channel is full (spec §5).
    async fn publish(&self, msg: Message) {
        if let Err(e) = self.messages.add(msg.clone()).await {
            tracing::warn!("failed to persist message: {}", e);
        }
        let tx = self.output_tx.lock().await;
        if let Some(tx) = tx.as_ref() {
            let _ = tx.send(msg).await;
        }
    }

    async fn exit(&self) {
        self.publish(Message::agent_text(
            "It has been a pleasure assisting you. Have a great day!",
        ))
        .await;
        self.set_state(AgentState::Exited).await;
    }

    /// Builds the per-request `ToolContext` a dispatched batch runs under
    /// (spec §4.3 item 2: work directory, kubeconfig, executor handle).
    fn tool_context(&self) -> kubectl_ai_tools::ToolContext {
        kubectl_ai_tools::ToolContext {
            work_dir: self.config.workspace_root.clone(),
            kubeconfig: self.config.kubeconfig.clone(),
            executor: self.config.executor.clone(),
        }
    }

    async fn list_models_cached(&self) -> Vec<String> {
        let mut cache = self.models_cache.lock().await;
        if let Some(models) = cache.as_ref() {
            return models.clone();
        }
        let models = self.provider.list_models().await.unwrap_or_default();
        *cache = Some(models.clone());
        models
    }

    async fn run_loop(self: Arc<Self>, initial_query: String) {
        let mut rx = match self.input_rx.lock().await.take() {
            Some(rx) => rx,
            None => return,
        };

        let mut pending_query = if initial_query.trim().is_empty() {
            None
        } else {
            Some(initial_query)
        };

        loop {
            if self.get_session().await.agent_state.is_terminal() {
                break;
            }

            let text = match pending_query.take() {
                Some(q) => q,
                None => {
                    // Idle/Done both block here waiting on the next query;
                    // the state itself is left as-is until input arrives.
                    self.publish(Message::user_input_request()).await;
                    tokio::select! {
                        _ = self.base_cancel.cancelled() => { self.exit().await; break; }
                        maybe = rx.recv() => match maybe {
                            Some(InputMessage::UserInput(t)) => t,
                            Some(InputMessage::Eof) | None => { self.exit().await; break; }
                            Some(InputMessage::UserChoice(_)) => continue,
                        }
                    }
                }
            };

            match self.handle_meta_command(&text).await {
                Some(exited) => {
                    if exited {
                        break;
                    }
                    continue;
                }
                None => {}
            }

            self.publish(Message::user_text(&text)).await;

            let controller = Arc::new(RequestController::new(&self.base_cancel));
            *self.current_controller.write().await = Some(controller.clone());
            self.set_current_request_id(Some(controller.id().to_string()))
                .await;
            self.set_state(AgentState::Running).await;

            self.run_turn(&controller, text, &mut rx).await;

            *self.current_controller.write().await = None;
            self.set_current_request_id(None).await;

            if self.config.run_once {
                self.set_state(AgentState::Exited).await;
                break;
            }
        }

        *self.output_tx.lock().await = None;
    }

    /// Handles a meta-query (spec §4.1) before it would ever reach the LLM.
    /// Returns `None` if `text` is not a meta-query, `Some(exited)` if it
    /// was handled.
    async fn handle_meta_command(&self, text: &str) -> Option<bool> {
        match text {
            "clear" | "reset" => {
                if let Err(e) = self.messages.clear().await {
                    self.publish(Message::agent_error(e.to_string())).await;
                } else if let Some(chat) = self.chat.lock().await.as_mut() {
                    chat.initialize(Vec::new());
                }
                Some(false)
            }
            "exit" | "quit" => {
                self.exit().await;
                Some(true)
            }
            "model" => {
                let meta = self.get_session().await;
                self.publish(Message::agent_text(format!(
                    "model: {} (provider: {})",
                    meta.model_id, meta.provider_id
                )))
                .await;
                Some(false)
            }
            "models" => {
                let models = self.list_models_cached().await;
                self.publish(Message::agent_text(models.join("\n"))).await;
                Some(false)
            }
            "tools" => {
                let names = self.tools.list().join(", ");
                self.publish(Message::agent_text(names)).await;
                Some(false)
            }
            "session" | "sessions" => {
                let meta = self.get_session().await;
                self.publish(Message::agent_text(format!(
                    "{} (state: {:?}, model: {})",
                    meta.id, meta.agent_state, meta.model_id
                )))
                .await;
                Some(false)
            }
            "save-session" => Some(false),
            other if other.starts_with("resume-session ") => {
                let id = other.trim_start_matches("resume-session ").trim();
                self.publish(Message::agent_text(format!(
                    "resume-session is handled by the session manager, not within a running agent (id: {})",
                    id
                )))
                .await;
                Some(false)
            }
            _ => None,
        }
    }

    /// Runs the iteration loop for one user query (spec §4.1 "Iteration
    /// algorithm"). Blocks on `rx` internally while `WaitingForInput`.
    async fn run_turn(
        self: &Arc<Self>,
        controller: &Arc<RequestController>,
        first_text: String,
        rx: &mut mpsc::Receiver<InputMessage>,
    ) {
        let mut curr_chat_content = vec![LlmMessage::user(first_text)];
        let mut iterations = 0usize;

        loop {
            if controller.is_cancelled() {
                self.finish_cancelled().await;
                return;
            }

            iterations += 1;
            if iterations > self.config.max_iterations {
                self.publish(Message::agent_error("Max iterations reached."))
                    .await;
                self.set_state(AgentState::Done).await;
                return;
            }

            let cancel_token = controller.token();
            let contents = std::mem::take(&mut curr_chat_content);
            let send_result = {
                let chat = self.chat.lock().await;
                match chat.as_ref() {
                    Some(chat) => chat.send_streaming(cancel_token.clone(), contents).await,
                    None => {
                        self.publish(Message::agent_error("agent not initialized"))
                            .await;
                        self.set_state(AgentState::Done).await;
                        return;
                    }
                }
            };

            let stream = match send_result {
                Ok(s) => s,
                Err(e) => {
                    *self.last_err.lock().await = Some(e.to_string());
                    self.publish(Message::agent_error(e.to_string())).await;
                    self.set_state(AgentState::Done).await;
                    return;
                }
            };

            let outcome = if self.config.shim_enabled {
                self.consume_shimmed(stream).await
            } else {
                consume_stream(stream, cancel_token.clone()).await
            };

            let (text, tool_calls) = match outcome {
                StreamOutcome::Cancelled => {
                    self.finish_cancelled().await;
                    return;
                }
                StreamOutcome::Error(e) => {
                    *self.last_err.lock().await = Some(e.clone());
                    self.publish(Message::agent_error(e)).await;
                    self.set_state(AgentState::Done).await;
                    return;
                }
                StreamOutcome::Complete { text, tool_calls } => (text, tool_calls),
            };

            if !text.is_empty() {
                self.publish(Message::model_text(&text)).await;
            }

            if tool_calls.is_empty() {
                if text.is_empty() {
                    self.publish(Message::model_text("(no response)")).await;
                }
                self.set_state(AgentState::Done).await;
                return;
            }

            let analyzer = ToolCallAnalyzer::new(self.tools.clone());
            let analyses = match analyzer.analyze_all(&tool_calls) {
                Ok(a) => a,
                Err(e) => {
                    self.publish(Message::agent_error(e.to_string())).await;
                    self.set_state(AgentState::Done).await;
                    return;
                }
            };

            // Errors inside `is_interactive` don't abort analysis, but this
            // step surfaces them the same way a genuinely interactive call
            // is surfaced (spec §4.2).
            if analyses.iter().any(|a| a.is_interactive || a.interactive_err.is_some()) {
                self.publish(Message::agent_error(
                    "one or more tool calls require interactive input, which is not supported here",
                ))
                .await;
                curr_chat_content = analyses
                    .iter()
                    .map(|a| {
                        let message = match &a.interactive_err {
                            Some(e) => e.clone(),
                            None => "interactive tool calls are not supported".to_string(),
                        };
                        let result = FunctionCallResult::error(&a.call, message, false);
                        LlmMessage::user(canonical_result_text(&result))
                    })
                    .collect();
                continue;
            }

            let batch_kind = kubectl_ai_tools::OperationApprover::classify_batch(&analyses);
            controller.set_operation_kind(batch_kind);

            if self.config.run_once && batch_kind == OperationKind::Write
                && !self.skip_permissions.load(Ordering::SeqCst)
            {
                *self.last_err.lock().await = Some(Error::PermissionConflict.to_string());
                self.publish(Message::agent_error(Error::PermissionConflict.to_string()))
                    .await;
                self.set_state(AgentState::Exited).await;
                return;
            }

            if !self.skip_permissions.load(Ordering::SeqCst) && batch_kind == OperationKind::Write
            {
                let prompt = analyses
                    .iter()
                    .map(|a| a.description.clone())
                    .collect::<Vec<_>>()
                    .join("\n");
                self.publish(Message::user_choice_request(prompt)).await;
                self.set_state(AgentState::WaitingForInput).await;

                let choice = tokio::select! {
                    _ = controller.token().cancelled() => { self.finish_cancelled().await; return; }
                    maybe = rx.recv() => match maybe {
                        Some(InputMessage::UserChoice(c)) => Choice::from_index(c),
                        _ => None,
                    }
                };

                self.set_state(AgentState::Running).await;

                match choice {
                    Some(Choice::Yes) => {
                        curr_chat_content =
                            self.dispatch_batch(&analyses, controller).await;
                    }
                    Some(Choice::YesAndDontAskAgain) => {
                        self.skip_permissions.store(true, Ordering::SeqCst);
                        curr_chat_content =
                            self.dispatch_batch(&analyses, controller).await;
                    }
                    Some(Choice::No) | None => {
                        let mut results_text = Vec::new();
                        for analysis in &analyses {
                            let (result, err_msg) = dispatcher::declined(&analysis.call);
                            self.publish(err_msg).await;
                            results_text.push(LlmMessage::user(canonical_result_text(&result)));
                        }
                        curr_chat_content = results_text;
                    }
                }

                if controller.is_cancelled() {
                    self.finish_cancelled().await;
                    return;
                }
                continue;
            }

            curr_chat_content = self.dispatch_batch(&analyses, controller).await;
            if controller.is_cancelled() {
                self.finish_cancelled().await;
                return;
            }
        }
    }

    /// Runs the dispatcher and folds its results into the next round's
    /// content, publishing every emitted Message along the way. Returns
    /// `Vec::new()` (ending the turn) if the dispatch aborted.
    async fn dispatch_batch(
        &self,
        analyses: &[kubectl_ai_tools::ToolCallAnalysis],
        controller: &Arc<RequestController>,
    ) -> Vec<LlmMessage> {
        let ctx = self.tool_context();
        let outcome = dispatch(analyses, &ctx, controller.token()).await;
        controller.set_operation_kind(outcome.operation_kind);
        for msg in outcome.messages {
            self.publish(msg).await;
        }
        if outcome.aborted {
            self.set_state(AgentState::Done).await;
            return Vec::new();
        }
        outcome
            .results
            .iter()
            .map(|r| LlmMessage::user(canonical_result_text(r)))
            .collect()
    }

    async fn consume_shimmed(&self, stream: LlmStream) -> StreamOutcome {
        match shim::run_shim(stream).await {
            Ok(result) => {
                let text = if result.answer.is_empty() {
                    result.thought
                } else {
                    result.answer
                };
                StreamOutcome::Complete {
                    text,
                    tool_calls: vec![result.call],
                }
            }
            Err(e) => StreamOutcome::Error(e.to_string()),
        }
    }

    /// Terminal event for a cancelled request (spec §4.4, §8-D): any
    /// streamed text accumulated up to the cancel point is discarded, and
    /// `"Request cancelled."` is the only Message published for it.
    async fn finish_cancelled(&self) {
        debug!("request cancelled");
        self.publish(Message::agent_text("Request cancelled."))
            .await;
        self.set_state(AgentState::Done).await;
    }
}

fn canonical_result_text(result: &FunctionCallResult) -> String {
    serde_json::to_string(&result.result).unwrap_or_default()
}

enum StreamOutcome {
    Complete {
        text: String,
        tool_calls: Vec<FunctionCall>,
    },
    Cancelled,
    Error(String),
}

/// Consumes an `LlmStream`, racing each item against `cancel` so a
/// cancellation lands between stream items rather than only after the
/// whole stream drains.
async fn consume_stream(mut stream: LlmStream, cancel: CancellationToken) -> StreamOutcome {
    use futures::StreamExt;

    let mut text = String::new();
    let mut tool_calls = Vec::new();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("llm stream cancelled mid-iteration");
                return StreamOutcome::Cancelled;
            }
            item = stream.next() => {
                match item {
                    Some(Ok(resp)) => {
                        text.push_str(&resp.text());
                        tool_calls.extend(resp.function_calls());
                    }
                    Some(Err(e)) => return StreamOutcome::Error(e.to_string()),
                    None => return StreamOutcome::Complete { text, tool_calls },
                }
            }
        }
    }
}
