//! Dispatcher (spec §4.3): runs pending tool calls in order, appending
//! `FunctionCallResult`s and emitting `toolCallRequest`/`toolCallResponse`
//! Messages as it goes.

use kubectl_ai_core::{FunctionCall, FunctionCallResult, Message, OperationKind};
use kubectl_ai_tools::{ToolCallAnalysis, ToolContext, ToolResult};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Truncation ceiling for a single tool result embedded back into the
/// conversation.
const MAX_RESULT_CHARS: usize = 50_000;

pub struct DispatchOutcome {
    pub messages: Vec<Message>,
    pub results: Vec<FunctionCallResult>,
    /// `true` if a tool error aborted the batch before every call ran
    /// (spec §4.3 failure policy).
    pub aborted: bool,
    /// The read/write classification accumulated while dispatching this
    /// batch (spec §4.4: latches to write once any call is non-`"no"`).
    pub operation_kind: OperationKind,
}

/// Runs `analyses` in order, stopping at the first tool error (spec §4.3
/// failure policy: "one tool error aborts dispatch").
pub async fn dispatch(
    analyses: &[ToolCallAnalysis],
    ctx: &ToolContext,
    cancel: CancellationToken,
) -> DispatchOutcome {
    let mut messages = Vec::new();
    let mut results = Vec::new();
    let mut operation_kind = OperationKind::Read;
    let mut aborted = false;

    for analysis in analyses {
        if cancel.is_cancelled() {
            aborted = true;
            break;
        }

        operation_kind = operation_kind.merge(OperationKind::classify(analysis.modifies_resource));
        messages.push(Message::tool_call_request(&analysis.description));

        let run_result = analysis
            .tool
            .run(ctx, cancel.clone(), analysis.call.arguments.clone())
            .await;

        match run_result {
            Err(e) => {
                let err_result = FunctionCallResult::error(&analysis.call, e.to_string(), false);
                messages.push(Message::tool_call_response(error_payload(&e.to_string())));
                results.push(err_result);
                aborted = true;
                break;
            }
            Ok(ToolResult::Error(msg)) => {
                let err_result = FunctionCallResult::error(&analysis.call, msg.clone(), false);
                messages.push(Message::tool_call_response(error_payload(&msg)));
                results.push(err_result);
                aborted = true;
                break;
            }
            Ok(ToolResult::Value(map)) => {
                if is_soft_timeout(&map) {
                    messages.push(Message::agent_error("timeout reached"));
                }
                let truncated = truncate_result(map);
                let payload = Value::Object(truncated.clone());
                results.push(FunctionCallResult::success(&analysis.call, truncated));
                messages.push(Message::tool_call_response(payload));
            }
        }
    }

    DispatchOutcome {
        messages,
        results,
        aborted,
        operation_kind,
    }
}

fn is_soft_timeout(map: &serde_json::Map<String, Value>) -> bool {
    matches!(map.get("stream_type").and_then(Value::as_str), Some("timeout"))
}

fn error_payload(message: &str) -> Value {
    serde_json::json!({ "error": message, "status": "error", "retryable": false })
}

fn truncate_result(mut map: serde_json::Map<String, Value>) -> serde_json::Map<String, Value> {
    for (_, value) in map.iter_mut() {
        if let Value::String(s) = value {
            if s.len() > MAX_RESULT_CHARS {
                let total = s.len();
                let mut truncated = s[..MAX_RESULT_CHARS].to_string();
                truncated.push_str(&format!("...\n[truncated, {} total chars]", total));
                *s = truncated;
            }
        }
    }
    map
}

/// Build the declined `FunctionCallResult` + agent error Message for a call
/// the user chose "no" on (spec §8 scenario B).
pub fn declined(call: &FunctionCall) -> (FunctionCallResult, Message) {
    (
        FunctionCallResult::declined(call),
        Message::agent_error(format!(
            "Operation was skipped. The user declined to run: {}",
            call.name
        )),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubectl_ai_tools::stub::{AlwaysTimesOutExecutor, EchoTool, SlowTool, StreamingTool, WriteTool};
    use kubectl_ai_tools::{NoopExecutor, ToolCallAnalyzer, ToolRegistry as Registry};
    use serde_json::Map;
    use std::sync::Arc;

    fn call(name: &str) -> FunctionCall {
        FunctionCall {
            id: "1".to_string(),
            name: name.to_string(),
            arguments: Map::new(),
        }
    }

    fn noop_ctx() -> ToolContext {
        ToolContext {
            work_dir: std::env::temp_dir(),
            kubeconfig: None,
            executor: Arc::new(NoopExecutor::default()),
        }
    }

    #[tokio::test]
    async fn dispatch_appends_one_result_per_call_in_order() {
        let mut reg = Registry::new();
        reg.register(EchoTool::default());
        reg.register(WriteTool::default());
        let analyzer = ToolCallAnalyzer::new(Arc::new(reg));
        let analyses = analyzer
            .analyze_all(&[call("echo"), call("write")])
            .unwrap();

        let outcome = dispatch(&analyses, &noop_ctx(), CancellationToken::new()).await;
        assert!(!outcome.aborted);
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.operation_kind, OperationKind::Write);
    }

    #[tokio::test]
    async fn dispatch_aborts_batch_on_tool_error() {
        struct AlwaysFails;
        #[async_trait::async_trait]
        impl kubectl_ai_tools::Tool for AlwaysFails {
            fn name(&self) -> &str {
                "fails"
            }
            fn description(&self) -> &str {
                "fails"
            }
            fn input_schema(&self) -> Value {
                serde_json::json!({})
            }
            fn check_modifies_resource(
                &self,
                _args: &Map<String, Value>,
            ) -> kubectl_ai_core::ModifiesResource {
                kubectl_ai_core::ModifiesResource::No
            }
            async fn run(
                &self,
                _ctx: &ToolContext,
                _cancel: CancellationToken,
                _args: Map<String, Value>,
            ) -> kubectl_ai_core::Result<ToolResult> {
                Ok(ToolResult::error("boom"))
            }
        }

        let mut reg = Registry::new();
        reg.register(AlwaysFails);
        reg.register(EchoTool::default());
        let analyzer = ToolCallAnalyzer::new(Arc::new(reg));
        let analyses = analyzer
            .analyze_all(&[call("fails"), call("echo")])
            .unwrap();

        let outcome = dispatch(&analyses, &noop_ctx(), CancellationToken::new()).await;
        assert!(outcome.aborted);
        assert_eq!(outcome.results.len(), 1);
    }

    #[tokio::test]
    async fn dispatch_stops_immediately_if_already_cancelled() {
        let mut reg = Registry::new();
        reg.register(SlowTool::default());
        let analyzer = ToolCallAnalyzer::new(Arc::new(reg));
        let analyses = analyzer.analyze_all(&[call("slowtool")]).unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = dispatch(&analyses, &noop_ctx(), cancel).await;
        assert!(outcome.aborted);
        assert!(outcome.results.is_empty());
        assert!(outcome.messages.is_empty());
    }

    #[tokio::test]
    async fn dispatch_surfaces_soft_timeout_from_executor_round_trip() {
        let mut reg = Registry::new();
        reg.register(StreamingTool::default());
        let analyzer = ToolCallAnalyzer::new(Arc::new(reg));
        let analyses = analyzer.analyze_all(&[call("stream")]).unwrap();

        let ctx = ToolContext {
            work_dir: std::env::temp_dir(),
            kubeconfig: None,
            executor: Arc::new(AlwaysTimesOutExecutor::default()),
        };

        let outcome = dispatch(&analyses, &ctx, CancellationToken::new()).await;
        assert!(!outcome.aborted);
        assert!(outcome
            .messages
            .iter()
            .any(|m| m.payload.as_text() == Some("timeout reached")));
    }
}
