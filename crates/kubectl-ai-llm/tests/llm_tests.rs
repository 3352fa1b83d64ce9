//! Tests for kubectl-ai-llm: wire types and the mock provider.

use futures::StreamExt;
use kubectl_ai_llm::mock::MockProvider;
use kubectl_ai_llm::{Candidate, LlmResponse, LlmTool, Part};
use tokio_util::sync::CancellationToken;

#[test]
fn llm_response_text_concatenates_text_parts_only() {
    let resp = LlmResponse {
        candidates: vec![Candidate {
            parts: vec![
                Part::Text("hello ".to_string()),
                Part::FunctionCalls(vec![]),
                Part::Text("world".to_string()),
            ],
        }],
        stop_reason: None,
    };
    assert_eq!(resp.text(), "hello world");
}

#[test]
fn llm_response_function_calls_flattened_in_order() {
    use kubectl_ai_core::FunctionCall;
    use serde_json::Map;

    let call_a = FunctionCall {
        id: "a".to_string(),
        name: "bash".to_string(),
        arguments: Map::new(),
    };
    let call_b = FunctionCall {
        id: "b".to_string(),
        name: "kubectl".to_string(),
        arguments: Map::new(),
    };
    let resp = LlmResponse {
        candidates: vec![Candidate {
            parts: vec![Part::FunctionCalls(vec![call_a.clone(), call_b.clone()])],
        }],
        stop_reason: None,
    };
    let calls = resp.function_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].id, "a");
    assert_eq!(calls[1].id, "b");
}

#[tokio::test]
async fn mock_provider_streams_scripted_text() {
    use kubectl_ai_llm::LlmProvider;

    let provider = MockProvider::with_text_replies(vec!["hello from the mock"]);
    let mut chat = provider.start_chat(None, "mock-model").await.unwrap();
    chat.initialize(vec![]);
    chat.set_function_definitions(vec![LlmTool {
        name: "bash".to_string(),
        description: "run a shell command".to_string(),
        input_schema: serde_json::json!({"type": "object"}),
    }]);

    let mut stream = chat
        .send_streaming(CancellationToken::new(), vec![])
        .await
        .unwrap();
    let item = stream.next().await.unwrap().unwrap();
    assert_eq!(item.text(), "hello from the mock");
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn mock_provider_exhaustion_is_a_stream_error() {
    use kubectl_ai_llm::{LlmError, LlmProvider};

    let provider = MockProvider::new(vec![]);
    let mut chat = provider.start_chat(None, "mock-model").await.unwrap();
    chat.initialize(vec![]);
    let err = chat
        .send_streaming(CancellationToken::new(), vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::StreamError(_)));
}
