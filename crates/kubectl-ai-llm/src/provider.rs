//! `LlmProvider`/`Chat` trait boundary (spec §6).
//!
//! `LlmProvider::start_chat` returns a `Chat` handle bound to one model;
//! the agent sends one streaming request per iteration through that handle,
//! scoped to the current request's `CancellationToken`.

use crate::types::{LlmMessage, LlmResponse, LlmTool};
use futures::Stream;
use kubectl_ai_core::Message;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

pub type LlmResult<T> = Result<T, LlmError>;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("cancelled")]
    Cancelled,
}

/// A stream of full `LlmResponse` items (spec §6: "yields `(response, err)`
/// pairs"). Each response carries its own candidates/parts; the agent
/// accumulates text and function calls across the whole stream.
pub type LlmStream = Pin<Box<dyn Stream<Item = LlmResult<LlmResponse>> + Send>>;

/// A chat handle bound to one model (spec §6).
#[async_trait::async_trait]
pub trait Chat: Send + Sync {
    /// Seed conversation history.
    fn initialize(&mut self, messages: Vec<Message>);

    /// Register tools by name and parameter schema. Implementations must
    /// sort by name to aid provider-side prompt caching (spec §6).
    fn set_function_definitions(&mut self, defs: Vec<LlmTool>);

    /// Send the accumulated conversation plus `contents` and stream the
    /// response. `cancel` aborts the underlying call when triggered.
    async fn send_streaming(
        &self,
        cancel: CancellationToken,
        contents: Vec<LlmMessage>,
    ) -> LlmResult<LlmStream>;

    /// Whether `err` is worth retrying (delegated to a retrying wrapper
    /// around this client — the core never retries itself, spec §1).
    fn is_retryable_error(&self, err: &LlmError) -> bool {
        matches!(
            err,
            LlmError::RateLimited { .. } | LlmError::RequestFailed(_)
        )
    }
}

/// An LLM client — factory for `Chat` handles (spec §6).
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Start a chat bound to `model`, seeded with `system_prompt`.
    async fn start_chat(
        &self,
        system_prompt: Option<String>,
        model: &str,
    ) -> LlmResult<Box<dyn Chat>>;

    async fn list_models(&self) -> LlmResult<Vec<String>>;

    async fn close(&self) -> LlmResult<()> {
        Ok(())
    }
}
