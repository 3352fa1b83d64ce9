//! Error taxonomy for the agent core (spec §7).
//!
//! Kinds map to spec.md §7 one-to-one; `CancellationError` and `TimeoutError`
//! are not represented here because they are not surfaced as `Err` values —
//! cancellation is swallowed internally and a timeout is a successful
//! `ExecResult` with `stream_type = Timeout` (see `kubectl-ai-tools`).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Bad arguments, missing session, unknown tool.
    #[error("validation error: {0}")]
    Validation(String),

    /// Stream read failure, empty candidates, unretryable provider error.
    #[error("llm error: {0}")]
    Llm(String),

    /// A tool's `Run` returned an error.
    #[error("tool '{name}' failed: {message}")]
    ToolInvocation { name: String, message: String },

    /// The text-to-function-call shim failed to parse a response.
    #[error("shim parse error: {0}")]
    ShimParse(String),

    /// RunOnce mode encountered a write call with permissions required.
    #[error("permission conflict: a write operation requires approval in run-once mode")]
    PermissionConflict,

    /// Session or message persistence failure.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session already exists: {0}")]
    SessionAlreadyExists(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    pub fn tool_invocation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolInvocation {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}
