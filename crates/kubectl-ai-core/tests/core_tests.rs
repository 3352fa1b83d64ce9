//! Tests for kubectl-ai-core: types, error taxonomy, and invariants from spec §8.

use kubectl_ai_core::*;

#[test]
fn session_id_new_and_display() {
    let id = SessionId::new("20260727-0001");
    assert_eq!(id.as_str(), "20260727-0001");
    assert_eq!(format!("{}", id), "20260727-0001");
}

#[test]
fn session_id_clone_is_cheap_and_hashable() {
    use std::collections::HashSet;
    let a = SessionId::new("20260727-0001");
    let b = a.clone();
    assert_eq!(a, b);
    let mut set = HashSet::new();
    set.insert(a);
    assert!(set.contains(&b));
}

#[test]
fn message_constructors_set_expected_fields() {
    let m = Message::user_text("hello");
    assert_eq!(m.source, MessageSource::User);
    assert_eq!(m.message_type, MessageType::Text);
    assert_eq!(m.payload.as_text(), Some("hello"));

    let err = Message::agent_error("boom");
    assert_eq!(err.source, MessageSource::Agent);
    assert_eq!(err.message_type, MessageType::Error);
}

#[test]
fn user_choice_request_has_three_fixed_options_in_order() {
    let m = Message::user_choice_request("run this?");
    match m.payload {
        MessagePayload::Choice(c) => {
            assert_eq!(c.options.len(), 3);
            assert_eq!(c.options[0].value, "yes");
            assert_eq!(c.options[1].value, "yes_and_dont_ask_me_again");
            assert_eq!(c.options[2].value, "no");
        }
        _ => panic!("expected a choice payload"),
    }
}

#[test]
fn choice_from_index_maps_1_2_3() {
    assert_eq!(Choice::from_index(1), Some(Choice::Yes));
    assert_eq!(Choice::from_index(2), Some(Choice::YesAndDontAskAgain));
    assert_eq!(Choice::from_index(3), Some(Choice::No));
    assert_eq!(Choice::from_index(4), None);
    assert_eq!(Choice::from_index(0), None);
}

// Invariant 5 (spec §8): Classify maps "no" -> Read, "yes" and anything
// else (including empty) -> Write.
#[test]
fn operation_kind_classify_invariant() {
    use std::str::FromStr;
    assert_eq!(
        OperationKind::classify(ModifiesResource::from_str("no").unwrap()),
        OperationKind::Read
    );
    assert_eq!(
        OperationKind::classify(ModifiesResource::from_str("yes").unwrap()),
        OperationKind::Write
    );
    assert_eq!(
        OperationKind::classify(ModifiesResource::from_str("").unwrap()),
        OperationKind::Write
    );
    assert_eq!(
        OperationKind::classify(ModifiesResource::from_str("garbage").unwrap()),
        OperationKind::Write
    );
}

// Invariant 7 (spec §8): the session id format matches ^\d{8}-\d{4}$.
#[test]
fn session_id_format_invariant() {
    assert!(SessionId::new("20260727-9999").is_well_formed());
    assert!(!SessionId::new("not-an-id").is_well_formed());
}

#[test]
fn function_call_result_declined_shape() {
    let call = FunctionCall {
        id: "call-1".to_string(),
        name: "kubectl".to_string(),
        arguments: serde_json::Map::new(),
    };
    let declined = FunctionCallResult::declined(&call);
    assert_eq!(declined.id, "call-1");
    assert_eq!(
        declined.result.get("status").and_then(|v| v.as_str()),
        Some("declined")
    );
    assert_eq!(
        declined.result.get("retryable").and_then(|v| v.as_bool()),
        Some(false)
    );
}

#[test]
fn agent_state_only_exited_is_terminal() {
    assert!(AgentState::Exited.is_terminal());
    assert!(!AgentState::Idle.is_terminal());
    assert!(!AgentState::Done.is_terminal());
    assert!(!AgentState::Running.is_terminal());
}

#[test]
fn error_constructors_produce_expected_messages() {
    let e = Error::validation("missing session");
    assert!(e.to_string().contains("missing session"));

    let e = Error::tool_invocation("bash", "exit code 1");
    assert!(e.to_string().contains("bash"));
    assert!(e.to_string().contains("exit code 1"));
}
