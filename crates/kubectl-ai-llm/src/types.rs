//! Wire-shaped types for the `LlmProvider`/`Chat` seam (spec §6, §9).
//!
//! A response `Part` is one of exactly two observable cases — text, or a
//! list of function calls — modeled as a tagged union rather than an
//! `any`-typed field (Design Notes §9).

use kubectl_ai_core::{FunctionCall, Message};
use serde::{Deserialize, Serialize};

/// A message handed to `Chat::initialize`/`Chat::send_streaming`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: LlmRole,
    pub content: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmRole {
    User,
    Model,
}

impl LlmMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: LlmRole::User,
            content: content.into(),
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: LlmRole::Model,
            content: content.into(),
        }
    }
}

/// A function/tool definition advertised to the LLM.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmTool {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// One part of a streamed `Candidate` — either plain text or a batch of
/// function calls (spec §3 "Part"; Design Notes §9).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Part {
    Text(String),
    FunctionCalls(Vec<FunctionCall>),
}

/// One candidate of a streamed response; the agent loop only ever consumes
/// the first candidate (spec does not describe multi-candidate fan-out).
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Candidate {
    pub parts: Vec<Part>,
}

/// One item yielded by a `Chat::send_streaming` response iterator.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct LlmResponse {
    pub candidates: Vec<Candidate>,
    pub stop_reason: Option<String>,
}

impl LlmResponse {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            candidates: vec![Candidate {
                parts: vec![Part::Text(text.into())],
            }],
            stop_reason: Some("end_turn".to_string()),
        }
    }

    /// All text parts across the first candidate, concatenated.
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| match p {
                        Part::Text(t) => Some(t.as_str()),
                        _ => None,
                    })
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    /// All function calls across the first candidate, in order.
    pub fn function_calls(&self) -> Vec<FunctionCall> {
        self.candidates
            .first()
            .map(|c| {
                c.parts
                    .iter()
                    .flat_map(|p| match p {
                        Part::FunctionCalls(calls) => calls.clone(),
                        _ => Vec::new(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Convert an agent-core `Message` into the plain `LlmMessage` shape the
/// provider seam expects (system/tool messages flatten to user/model text).
pub fn to_llm_message(msg: &Message) -> LlmMessage {
    use kubectl_ai_core::MessageSource;
    let text = msg.payload.as_text().unwrap_or_default().to_string();
    match msg.source {
        MessageSource::Model => LlmMessage::model(text),
        _ => LlmMessage::user(text),
    }
}
