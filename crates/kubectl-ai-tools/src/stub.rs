//! Minimal, fully-worked `Tool` implementations used by this crate's own
//! tests and by the agent loop's tests. Not shipped as a real capability —
//! a production binary would register a real `kubectl`/shell-backed tool
//! instead.

use crate::executor::{ExecResult, Executor, ToolContext};
use crate::registry::{Tool, ToolResult};
use kubectl_ai_core::{ModifiesResource, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

/// Read-only tool: echoes its `text` argument back. Never modifies
/// anything, never interactive.
#[derive(Default)]
pub struct EchoTool;

#[async_trait::async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the given text back."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": ["text"],
        })
    }

    fn check_modifies_resource(&self, _args: &Map<String, Value>) -> ModifiesResource {
        ModifiesResource::No
    }

    async fn run(
        &self,
        _ctx: &ToolContext,
        _cancel: CancellationToken,
        args: Map<String, Value>,
    ) -> Result<ToolResult> {
        let text = args.get("text").and_then(Value::as_str).unwrap_or("");
        let mut out = Map::new();
        out.insert("text".to_string(), Value::String(text.to_string()));
        Ok(ToolResult::ok(out))
    }
}

/// Write tool: always reports that it modifies a resource, regardless of
/// arguments. Used to exercise the permission-request path.
#[derive(Default)]
pub struct WriteTool;

#[async_trait::async_trait]
impl Tool for WriteTool {
    fn name(&self) -> &str {
        "write"
    }

    fn description(&self) -> &str {
        "Write the given content somewhere."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": { "content": { "type": "string" } },
            "required": ["content"],
        })
    }

    fn check_modifies_resource(&self, _args: &Map<String, Value>) -> ModifiesResource {
        ModifiesResource::Yes
    }

    async fn run(
        &self,
        _ctx: &ToolContext,
        _cancel: CancellationToken,
        args: Map<String, Value>,
    ) -> Result<ToolResult> {
        let content = args.get("content").and_then(Value::as_str).unwrap_or("");
        let mut out = Map::new();
        out.insert("wrote".to_string(), Value::String(content.to_string()));
        Ok(ToolResult::ok(out))
    }
}

/// Write tool whose `run` blocks until cancelled, used to exercise
/// cancellation during tool execution (spec §8 scenario E).
#[derive(Default)]
pub struct SlowTool;

#[async_trait::async_trait]
impl Tool for SlowTool {
    fn name(&self) -> &str {
        "slowtool"
    }

    fn description(&self) -> &str {
        "A tool that runs until cancelled; used in tests."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    fn check_modifies_resource(&self, _args: &Map<String, Value>) -> ModifiesResource {
        ModifiesResource::Yes
    }

    async fn run(
        &self,
        _ctx: &ToolContext,
        cancel: CancellationToken,
        _args: Map<String, Value>,
    ) -> Result<ToolResult> {
        tokio::select! {
            _ = cancel.cancelled() => {
                Ok(ToolResult::error("cancelled"))
            }
            _ = sleep(Duration::from_secs(3600)) => {
                Ok(ToolResult::ok(Map::new()))
            }
        }
    }
}

/// Tool whose `is_interactive` always fails, used to exercise the
/// analyzer's "errors recorded, not propagated" behavior (spec §4.2).
#[derive(Default)]
pub struct FlakyInteractiveTool;

#[async_trait::async_trait]
impl Tool for FlakyInteractiveTool {
    fn name(&self) -> &str {
        "flaky"
    }

    fn description(&self) -> &str {
        "A tool whose interactivity check always fails; used in tests."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    fn check_modifies_resource(&self, _args: &Map<String, Value>) -> ModifiesResource {
        ModifiesResource::No
    }

    fn is_interactive(&self, _args: &Map<String, Value>) -> std::result::Result<bool, String> {
        Err("could not determine tty requirement".to_string())
    }

    async fn run(
        &self,
        _ctx: &ToolContext,
        _cancel: CancellationToken,
        _args: Map<String, Value>,
    ) -> Result<ToolResult> {
        Ok(ToolResult::ok(Map::new()))
    }
}

/// An `Executor` that always reports a soft timeout, used to exercise the
/// dispatcher's `stream_type == "timeout"` path (spec §4.3 item 4, §7
/// `TimeoutError`).
#[derive(Default)]
pub struct AlwaysTimesOutExecutor;

#[async_trait::async_trait]
impl Executor for AlwaysTimesOutExecutor {
    async fn execute(
        &self,
        command: &str,
        _env: &HashMap<String, String>,
        _work_dir: &PathBuf,
    ) -> Result<ExecResult> {
        Ok(ExecResult::timed_out(command))
    }
}

/// A tool that shells out through its `ToolContext`'s executor and folds the
/// resulting `ExecResult` straight into a `ToolResult` — the executor round
/// trip from Design Notes §9. A real tool would build `command`/`env` from
/// its own arguments; this one ignores them to keep the round trip visible
/// in tests.
#[derive(Default)]
pub struct StreamingTool;

#[async_trait::async_trait]
impl Tool for StreamingTool {
    fn name(&self) -> &str {
        "stream"
    }

    fn description(&self) -> &str {
        "Runs a streaming command through the configured executor."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    fn check_modifies_resource(&self, _args: &Map<String, Value>) -> ModifiesResource {
        ModifiesResource::No
    }

    async fn run(
        &self,
        ctx: &ToolContext,
        _cancel: CancellationToken,
        _args: Map<String, Value>,
    ) -> Result<ToolResult> {
        let exec_result = ctx
            .executor
            .execute("kubectl logs -f pod/demo", &HashMap::new(), &ctx.work_dir)
            .await?;
        Ok(exec_result.into_tool_result())
    }
}
