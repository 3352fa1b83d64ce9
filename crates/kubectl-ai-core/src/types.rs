//! Data model (spec §3): `Message`, `SessionMeta`, `AgentState`,
//! `FunctionCall`/`FunctionCallResult`, and the read/write classification
//! types shared by the analyzer, the approver, and the agent loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Session identifier — cheaply cloneable, `^\d{8}-\d{4}$` by convention
/// (spec §6, enforced by `SessionManager::new_session`, not by this type).
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Arc<str>);

impl SessionId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Arc::from(s.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` if the id matches the mandated `YYYYMMDD-NNNN` shape.
    pub fn is_well_formed(&self) -> bool {
        let s = &*self.0;
        let bytes = s.as_bytes();
        bytes.len() == 13
            && bytes[..8].iter().all(u8::is_ascii_digit)
            && bytes[8] == b'-'
            && bytes[9..].iter().all(u8::is_ascii_digit)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Who produced a `Message` (spec §3).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageSource {
    User,
    Model,
    Agent,
    Tool,
}

/// The shape of a `Message`'s payload (spec §3, §6).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MessageType {
    Text,
    ToolCallRequest,
    ToolCallResponse,
    UserInputRequest,
    UserChoiceRequest,
    Error,
}

/// The three fixed choices offered by a `userChoiceRequest` (spec §6).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[repr(u8)]
pub enum Choice {
    Yes = 1,
    YesAndDontAskAgain = 2,
    No = 3,
}

impl Choice {
    pub fn from_index(i: i32) -> Option<Self> {
        match i {
            1 => Some(Choice::Yes),
            2 => Some(Choice::YesAndDontAskAgain),
            3 => Some(Choice::No),
            _ => None,
        }
    }
}

/// One `{value, label}` entry of a `userChoiceRequest` payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub value: String,
    pub label: String,
}

/// The fixed, ordered option set mandated by spec §6: yes, yes-and-don't-ask,
/// no — always in this order, indices 1..3.
pub fn permission_choice_options() -> Vec<ChoiceOption> {
    vec![
        ChoiceOption {
            value: "yes".to_string(),
            label: "Yes".to_string(),
        },
        ChoiceOption {
            value: "yes_and_dont_ask_me_again".to_string(),
            label: "Yes, and don't ask again".to_string(),
        },
        ChoiceOption {
            value: "no".to_string(),
            label: "No".to_string(),
        },
    ]
}

/// Payload of a `userChoiceRequest` Message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserChoiceRequest {
    pub prompt: String,
    pub options: Vec<ChoiceOption>,
}

/// Payload carried by a `Message`. Untagged: renders as a bare string for the
/// common `text`/`error`/`userInputRequest` cases, or a JSON object for the
/// structured ones.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessagePayload {
    Text(String),
    Choice(UserChoiceRequest),
    Json(Value),
}

impl MessagePayload {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessagePayload::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Immutable record produced at the agent/user/model/tool boundaries
/// (spec §3). Once appended to a `ChatMessageStore` a `Message` is never
/// mutated — only appended, or the whole store is replaced/cleared.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub source: MessageSource,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub payload: MessagePayload,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(source: MessageSource, message_type: MessageType, payload: MessagePayload) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source,
            message_type,
            payload,
            timestamp: Utc::now(),
        }
    }

    pub fn user_text(content: impl Into<String>) -> Self {
        Self::new(
            MessageSource::User,
            MessageType::Text,
            MessagePayload::Text(content.into()),
        )
    }

    pub fn model_text(content: impl Into<String>) -> Self {
        Self::new(
            MessageSource::Model,
            MessageType::Text,
            MessagePayload::Text(content.into()),
        )
    }

    pub fn agent_text(content: impl Into<String>) -> Self {
        Self::new(
            MessageSource::Agent,
            MessageType::Text,
            MessagePayload::Text(content.into()),
        )
    }

    pub fn agent_error(content: impl Into<String>) -> Self {
        Self::new(
            MessageSource::Agent,
            MessageType::Error,
            MessagePayload::Text(content.into()),
        )
    }

    pub fn tool_call_request(description: impl Into<String>) -> Self {
        Self::new(
            MessageSource::Agent,
            MessageType::ToolCallRequest,
            MessagePayload::Text(description.into()),
        )
    }

    pub fn tool_call_response(payload: Value) -> Self {
        Self::new(
            MessageSource::Tool,
            MessageType::ToolCallResponse,
            MessagePayload::Json(payload),
        )
    }

    pub fn user_input_request() -> Self {
        Self::new(
            MessageSource::Agent,
            MessageType::UserInputRequest,
            MessagePayload::Text(">>>".to_string()),
        )
    }

    pub fn user_choice_request(prompt: impl Into<String>) -> Self {
        Self::new(
            MessageSource::Agent,
            MessageType::UserChoiceRequest,
            MessagePayload::Choice(UserChoiceRequest {
                prompt: prompt.into(),
                options: permission_choice_options(),
            }),
        )
    }
}

/// One of the six agent lifecycle states (spec §3/§4.1).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AgentState {
    Initializing,
    Idle,
    Running,
    WaitingForInput,
    Done,
    Exited,
}

impl AgentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentState::Exited)
    }
}

/// Session metadata persisted by a `SessionStore` (spec §3, §4.5). Does not
/// own a message store — that is attached separately by `SessionManager`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionMeta {
    pub id: SessionId,
    pub provider_id: String,
    pub model_id: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub agent_state: AgentState,
    pub current_request_id: Option<String>,
}

impl SessionMeta {
    pub fn new(id: SessionId, provider_id: impl Into<String>, model_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            provider_id: provider_id.into(),
            model_id: model_id.into(),
            created_at: now,
            last_modified: now,
            agent_state: AgentState::Idle,
            current_request_id: None,
        }
    }

    /// Bump `last_modified`; enforces the `last_modified >= created_at` invariant.
    pub fn touch(&mut self) {
        self.last_modified = Utc::now().max(self.created_at);
    }

    pub fn set_state(&mut self, state: AgentState) {
        self.agent_state = state;
        self.touch();
    }
}

/// The LLM's request to invoke a tool (spec §3). `id` binds the request to
/// its `FunctionCallResult` within one iteration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionCall {
    pub id: String,
    pub name: String,
    pub arguments: Map<String, Value>,
}

/// The result of dispatching a `FunctionCall` (spec §3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionCallResult {
    pub id: String,
    pub name: String,
    pub result: Map<String, Value>,
}

impl FunctionCallResult {
    pub fn declined(call: &FunctionCall) -> Self {
        let mut result = Map::new();
        result.insert(
            "error".to_string(),
            Value::String("User declined to run this operation.".to_string()),
        );
        result.insert("status".to_string(), Value::String("declined".to_string()));
        result.insert("retryable".to_string(), Value::Bool(false));
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            result,
        }
    }

    pub fn error(call: &FunctionCall, message: impl Into<String>, retryable: bool) -> Self {
        let mut result = Map::new();
        result.insert("error".to_string(), Value::String(message.into()));
        result.insert("status".to_string(), Value::String("error".to_string()));
        result.insert("retryable".to_string(), Value::Bool(retryable));
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            result,
        }
    }

    pub fn success(call: &FunctionCall, result: Map<String, Value>) -> Self {
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            result,
        }
    }
}

/// `modifies_resource` classification for a tool call (spec §3, §4.2).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModifiesResource {
    Yes,
    No,
    Unknown,
}

impl ModifiesResource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModifiesResource::Yes => "yes",
            ModifiesResource::No => "no",
            ModifiesResource::Unknown => "unknown",
        }
    }
}

impl std::str::FromStr for ModifiesResource {
    type Err = std::convert::Infallible;

    /// Permissive by design: anything other than exactly `"no"` classifies
    /// as non-`no` upstream in `OperationKind::classify` (spec §8 invariant 5).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "yes" => ModifiesResource::Yes,
            "no" => ModifiesResource::No,
            _ => ModifiesResource::Unknown,
        })
    }
}

/// Read/write classification of a request's cumulative side effects
/// (spec §3, §4.4, glossary). `"unknown"` is a safety default and maps to
/// `Write`, same as `"yes"`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Read,
    Write,
}

impl OperationKind {
    /// `OperationApprover.Classify` (spec §4.2, invariant 5): `"no"` → Read,
    /// `"yes"` and anything else (including `"unknown"` and empty) → Write.
    pub fn classify(modifies: ModifiesResource) -> Self {
        match modifies {
            ModifiesResource::No => OperationKind::Read,
            ModifiesResource::Yes | ModifiesResource::Unknown => OperationKind::Write,
        }
    }

    /// Latch semantics (spec open question / §4.4): once `Write`, stays `Write`.
    pub fn merge(self, other: OperationKind) -> OperationKind {
        if self == OperationKind::Write || other == OperationKind::Write {
            OperationKind::Write
        } else {
            OperationKind::Read
        }
    }
}
