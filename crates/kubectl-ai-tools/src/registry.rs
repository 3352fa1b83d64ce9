//! `Tool` trait and `ToolRegistry` (spec §4.2, §6, §9).
//!
//! `Tool` is a closed set of operations implemented per concrete tool —
//! no runtime reflection, consumers match on the trait object directly
//! (Design Notes §9: "dynamic dispatch -> tagged interface").

use crate::executor::ToolContext;
use kubectl_ai_core::{Error, FunctionCall, ModifiesResource, Result};
use kubectl_ai_llm::LlmTool;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug)]
pub enum ToolResult {
    Value(Map<String, Value>),
    Error(String),
}

impl ToolResult {
    pub fn ok(map: Map<String, Value>) -> Self {
        Self::Value(map)
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self::Error(msg.into())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// Implement this to add a capability the agent can invoke. Each tool is
/// self-contained: name, description, schema, classification, execution.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name (e.g. "bash", "kubectl").
    fn name(&self) -> &str;

    /// Human-readable description sent to the LLM.
    fn description(&self) -> &str;

    /// JSON Schema for input parameters.
    fn input_schema(&self) -> Value;

    /// Whether invoking this tool would modify a resource. `Unknown` is the
    /// safe default when a tool cannot introspect its own arguments.
    fn check_modifies_resource(&self, args: &Map<String, Value>) -> ModifiesResource;

    /// Whether this particular invocation would require interactive input
    /// (e.g. a TTY-attached `kubectl exec`). Errors here do not abort
    /// analysis — they're recorded and surfaced by the agent loop.
    fn is_interactive(&self, args: &Map<String, Value>) -> std::result::Result<bool, String> {
        let _ = args;
        Ok(false)
    }

    /// Execute the tool with the given arguments, scoped to the per-request
    /// work directory, kubeconfig, and executor handle (spec §4.3 item 2).
    async fn run(
        &self,
        ctx: &ToolContext,
        cancel: CancellationToken,
        args: Map<String, Value>,
    ) -> Result<ToolResult>;

    fn to_llm_tool(&self) -> LlmTool {
        LlmTool {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// A validated tool invocation: the resolved tool, the original call, and a
/// human-readable description (spec §4.2, e.g. "bash: kubectl get pods").
#[derive(Clone)]
pub struct ToolCall {
    pub tool: Arc<dyn Tool>,
    pub call: FunctionCall,
    pub description: String,
}

pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Parse an `(name, args)` invocation into a validated `ToolCall`
    /// (spec §4.2). Fails with `UnknownTool` if the name is not registered.
    pub fn parse_invocation(&self, call: &FunctionCall) -> Result<ToolCall> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| Error::UnknownTool(call.name.clone()))?;
        let description = describe(tool.name(), &call.arguments);
        Ok(ToolCall {
            tool,
            call: call.clone(),
            description,
        })
    }

    /// Function definitions for every registered tool, sorted lexically by
    /// name to aid provider-side prompt caching (spec §6).
    pub fn get_definitions(&self) -> Vec<LlmTool> {
        let mut defs: Vec<LlmTool> = self.tools.values().map(|t| t.to_llm_tool()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub fn list(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}

/// Best-effort one-line description of a call, e.g. "bash: kubectl get pods".
fn describe(tool_name: &str, args: &Map<String, Value>) -> String {
    let primary = args
        .iter()
        .find_map(|(_, v)| v.as_str())
        .unwrap_or_default();
    if primary.is_empty() {
        tool_name.to_string()
    } else {
        format!("{}: {}", tool_name, primary)
    }
}
