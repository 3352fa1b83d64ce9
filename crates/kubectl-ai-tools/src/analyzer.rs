//! Tool call analysis (spec §4.2): resolve an LLM function call against the
//! registry and classify it before any permission or execution decision is
//! made.

use crate::registry::{Tool, ToolRegistry};
use kubectl_ai_core::{FunctionCall, ModifiesResource, Result};
use std::sync::Arc;

/// What the agent needs to know about a call before deciding whether to run
/// it: the resolved tool, a human-readable description, whether it modifies
/// a resource, and whether it needs a TTY.
///
/// `interactive_err` is populated instead of aborting analysis when
/// `Tool::is_interactive` fails — the call can still be classified and
/// surfaced, the agent just treats interactivity as unknown.
#[derive(Clone)]
pub struct ToolCallAnalysis {
    pub tool: Arc<dyn Tool>,
    pub call: FunctionCall,
    pub description: String,
    pub modifies_resource: ModifiesResource,
    pub is_interactive: bool,
    pub interactive_err: Option<String>,
}

pub struct ToolCallAnalyzer {
    registry: Arc<ToolRegistry>,
}

impl ToolCallAnalyzer {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Resolve and classify a single function call. Fails with
    /// `Error::UnknownTool` if the name isn't registered; that failure does
    /// propagate, unlike an `is_interactive` failure.
    pub fn analyze(&self, call: &FunctionCall) -> Result<ToolCallAnalysis> {
        let resolved = self.registry.parse_invocation(call)?;
        let modifies_resource = resolved.tool.check_modifies_resource(&call.arguments);

        let (is_interactive, interactive_err) =
            match resolved.tool.is_interactive(&call.arguments) {
                Ok(v) => (v, None),
                Err(e) => (false, Some(e)),
            };

        Ok(ToolCallAnalysis {
            tool: resolved.tool,
            call: resolved.call,
            description: resolved.description,
            modifies_resource,
            is_interactive,
            interactive_err,
        })
    }

    /// Analyze every call in a batch, in order. The first unknown-tool
    /// failure aborts the whole batch (spec §4.2: parse errors propagate).
    pub fn analyze_all(&self, calls: &[FunctionCall]) -> Result<Vec<ToolCallAnalysis>> {
        calls.iter().map(|c| self.analyze(c)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::{EchoTool, WriteTool};
    use serde_json::Map;

    fn call(name: &str) -> FunctionCall {
        FunctionCall {
            id: "1".to_string(),
            name: name.to_string(),
            arguments: Map::new(),
        }
    }

    #[test]
    fn analyze_resolves_and_classifies() {
        let mut reg = ToolRegistry::new();
        reg.register(EchoTool::default());
        reg.register(WriteTool::default());
        let analyzer = ToolCallAnalyzer::new(Arc::new(reg));

        let read = analyzer.analyze(&call("echo")).unwrap();
        assert_eq!(read.modifies_resource, ModifiesResource::No);
        assert!(read.interactive_err.is_none());

        let write = analyzer.analyze(&call("write")).unwrap();
        assert_eq!(write.modifies_resource, ModifiesResource::Yes);
    }

    #[test]
    fn analyze_unknown_tool_propagates() {
        let reg = ToolRegistry::new();
        let analyzer = ToolCallAnalyzer::new(Arc::new(reg));
        assert!(analyzer.analyze(&call("nope")).is_err());
    }
}
