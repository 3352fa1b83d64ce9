//! `ToolUseShim` (spec §4.6): adapts a plain-text LLM that emits fenced
//! `json` thought/answer/action blocks into the native function-call
//! interface. Parse failure is treated as an LLM error by the loop (spec
//! §7: "ShimParseError ... treated as LLMError").

use futures::StreamExt;
use kubectl_ai_core::{Error, FunctionCall, Result};
use kubectl_ai_llm::LlmStream;
use serde_json::Value;

/// The normalized result of one shimmed turn: the LLM's reasoning text, its
/// user-facing answer text, and the single function call it decided on.
pub struct ShimResult {
    pub thought: String,
    pub answer: String,
    pub call: FunctionCall,
}

/// Buffers the full stream (concatenating every text part), then extracts
/// and parses the single fenced ```json block (spec §4.6).
pub async fn run_shim(mut stream: LlmStream) -> Result<ShimResult> {
    let mut buf = String::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(resp) => buf.push_str(&resp.text()),
            Err(e) => return Err(Error::llm(e.to_string())),
        }
    }
    parse_shim_block(&buf)
}

fn parse_shim_block(buf: &str) -> Result<ShimResult> {
    const FENCE_OPEN: &str = "```json";
    const FENCE_CLOSE: &str = "```";

    let open = buf
        .find(FENCE_OPEN)
        .ok_or_else(|| Error::ShimParse("no ```json block found in response".to_string()))?;
    let body_start = open + FENCE_OPEN.len();
    let close = buf
        .rfind(FENCE_CLOSE)
        .ok_or_else(|| Error::ShimParse("unterminated ```json block".to_string()))?;
    if close <= body_start {
        return Err(Error::ShimParse("empty ```json block".to_string()));
    }

    let json_str = buf[body_start..close].trim();
    let value: Value =
        serde_json::from_str(json_str).map_err(|e| Error::ShimParse(e.to_string()))?;
    let obj = value
        .as_object()
        .ok_or_else(|| Error::ShimParse("shim block is not a JSON object".to_string()))?;

    let thought = obj
        .get("thought")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let answer = obj
        .get("answer")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let action = obj
        .get("action")
        .and_then(Value::as_object)
        .ok_or_else(|| Error::ShimParse("shim block missing 'action' object".to_string()))?;
    let name = action
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::ShimParse("shim action missing 'name'".to_string()))?
        .to_string();

    let mut arguments = action.clone();
    arguments.remove("name");

    Ok(ShimResult {
        thought,
        answer,
        call: FunctionCall {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            arguments,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_shim_block() {
        let text = r#"Some preamble.
```json
{"thought": "checking pods", "answer": "Listing pods now.", "action": {"name": "kubectl", "command": "get pods", "modifies_resource": "no"}}
```
"#;
        let result = parse_shim_block(text).unwrap();
        assert_eq!(result.thought, "checking pods");
        assert_eq!(result.answer, "Listing pods now.");
        assert_eq!(result.call.name, "kubectl");
        assert_eq!(
            result.call.arguments.get("command").unwrap().as_str(),
            Some("get pods")
        );
        assert!(result.call.arguments.get("name").is_none());
    }

    #[test]
    fn missing_fence_is_shim_parse_error() {
        let err = parse_shim_block("no fenced block here").unwrap_err();
        assert!(matches!(err, Error::ShimParse(_)));
    }

    #[test]
    fn missing_action_name_is_shim_parse_error() {
        let text = "```json\n{\"thought\":\"t\",\"answer\":\"a\",\"action\":{}}\n```";
        let err = parse_shim_block(text).unwrap_err();
        assert!(matches!(err, Error::ShimParse(_)));
    }
}
