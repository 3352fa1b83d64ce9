//! Deterministic, scripted `LlmProvider` for exercising the agent loop in
//! tests without a concrete wire client (spec §1 Non-goals exclude a real
//! provider; this crate still needs something that implements the seam).
//!
//! Shaped like a real provider (`name`/`models`/streaming), minus the
//! HTTP/SSE plumbing: responses are supplied up front, one "turn" (a
//! sequence of stream items) per call to `send_streaming`.

use crate::provider::{Chat, LlmError, LlmProvider, LlmResult, LlmStream};
use crate::types::{LlmMessage, LlmResponse, LlmTool};
use kubectl_ai_core::Message;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

type Turn = Vec<LlmResult<LlmResponse>>;

pub struct MockProvider {
    turns: Arc<Mutex<VecDeque<Turn>>>,
}

impl MockProvider {
    /// `turns[i]` is the sequence of stream items yielded by the `i`-th
    /// call to `send_streaming` across the whole provider's lifetime.
    pub fn new(turns: Vec<Turn>) -> Self {
        Self {
            turns: Arc::new(Mutex::new(turns.into_iter().collect())),
        }
    }

    /// Convenience for the common case of one plain-text response per turn.
    pub fn with_text_replies(replies: Vec<&str>) -> Self {
        Self::new(
            replies
                .into_iter()
                .map(|r| vec![Ok(LlmResponse::text_only(r))])
                .collect(),
        )
    }
}

#[async_trait::async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn start_chat(
        &self,
        _system_prompt: Option<String>,
        _model: &str,
    ) -> LlmResult<Box<dyn Chat>> {
        Ok(Box::new(MockChat {
            turns: self.turns.clone(),
            messages: Vec::new(),
            tools: Vec::new(),
        }))
    }

    async fn list_models(&self) -> LlmResult<Vec<String>> {
        Ok(vec!["mock-model".to_string()])
    }
}

struct MockChat {
    turns: Arc<Mutex<VecDeque<Turn>>>,
    messages: Vec<Message>,
    tools: Vec<LlmTool>,
}

#[async_trait::async_trait]
impl Chat for MockChat {
    fn initialize(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    fn set_function_definitions(&mut self, mut defs: Vec<LlmTool>) {
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        self.tools = defs;
    }

    async fn send_streaming(
        &self,
        cancel: CancellationToken,
        _contents: Vec<LlmMessage>,
    ) -> LlmResult<LlmStream> {
        let turn = self
            .turns
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::StreamError("mock provider exhausted".to_string()))?;

        let stream = async_stream::stream! {
            for item in turn {
                if cancel.is_cancelled() {
                    yield Err(LlmError::Cancelled);
                    return;
                }
                yield item;
            }
        };
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Candidate, Part};

    #[tokio::test]
    async fn replies_in_order_across_turns() {
        let provider = MockProvider::with_text_replies(vec!["first", "second"]);
        let mut chat = provider.start_chat(None, "mock-model").await.unwrap();
        chat.initialize(vec![]);

        use futures::StreamExt;
        let mut s1 = chat
            .send_streaming(CancellationToken::new(), vec![])
            .await
            .unwrap();
        let first = s1.next().await.unwrap().unwrap();
        assert_eq!(first.text(), "first");

        let mut s2 = chat
            .send_streaming(CancellationToken::new(), vec![])
            .await
            .unwrap();
        let second = s2.next().await.unwrap().unwrap();
        assert_eq!(second.text(), "second");
    }

    #[tokio::test]
    async fn cancellation_yields_cancelled_error() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let provider = MockProvider::new(vec![vec![Ok(LlmResponse {
            candidates: vec![Candidate {
                parts: vec![Part::Text("late".to_string())],
            }],
            stop_reason: None,
        })]]);
        let mut chat = provider.start_chat(None, "mock-model").await.unwrap();
        chat.initialize(vec![]);

        use futures::StreamExt;
        let mut stream = chat.send_streaming(cancel, vec![]).await.unwrap();
        let item = stream.next().await.unwrap();
        assert!(matches!(item, Err(LlmError::Cancelled)));
    }
}
