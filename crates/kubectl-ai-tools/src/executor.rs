//! `Executor` trait consumed by tools that shell out (spec §6).
//!
//! A concrete executor (local process, sandboxed container) is an external
//! collaborator; this crate only defines the seam and the result shape.

use crate::registry::ToolResult;
use kubectl_ai_core::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Non-error stream outcomes. `Timeout` is the only documented case (spec
/// §5, §7): a streaming command (follow-log, watch) that outlives its soft
/// budget yields a `Timeout` result, not an `Err`. Serializes to the bare
/// string `"timeout"` so the dispatcher's `stream_type == "timeout"` check
/// (Design Notes §9) sees it after the round trip through JSON.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    Timeout,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExecResult {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub stream_type: Option<StreamType>,
    pub error: Option<String>,
}

impl ExecResult {
    pub fn success(command: impl Into<String>, stdout: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
            stream_type: None,
            error: None,
        }
    }

    pub fn timed_out(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            stream_type: Some(StreamType::Timeout),
            ..Default::default()
        }
    }

    /// Canonical JSON round trip (Design Notes §9) from an executor's result
    /// into the `ToolResult` a `Tool::run` implementation returns.
    pub fn into_tool_result(self) -> ToolResult {
        match serde_json::to_value(&self) {
            Ok(serde_json::Value::Object(map)) => ToolResult::ok(map),
            Ok(_) | Err(_) => ToolResult::error("executor result did not serialize to an object"),
        }
    }
}

/// Per-request context a dispatched `Tool::run` call is scoped to: the
/// working directory, an optional kubeconfig path, and the executor handle
/// it should shell out through (spec §4.3 item 2).
pub struct ToolContext {
    pub work_dir: PathBuf,
    pub kubeconfig: Option<PathBuf>,
    pub executor: Arc<dyn Executor>,
}

#[async_trait::async_trait]
pub trait Executor: Send + Sync {
    async fn execute(
        &self,
        command: &str,
        env: &HashMap<String, String>,
        work_dir: &PathBuf,
    ) -> Result<ExecResult>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// No-op `Executor`: the default when no concrete backend (local process,
/// sandboxed container) has been configured. A tool that actually needs to
/// run something should be paired with a real `Executor`; this exists so the
/// seam has a safe default instead of forcing one at every construction
/// site.
#[derive(Default)]
pub struct NoopExecutor;

#[async_trait::async_trait]
impl Executor for NoopExecutor {
    async fn execute(
        &self,
        command: &str,
        _env: &HashMap<String, String>,
        _work_dir: &PathBuf,
    ) -> Result<ExecResult> {
        Ok(ExecResult::success(command, ""))
    }
}
