//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::handlers::*;
use super::state::*;
use super::transition::*;
use super::*;
use crate::conversation::ConversationState;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context() -> SessionContext {
    SessionContext::new("test-session", Arc::new(HandlerRegistry::standard()))
}

const FUNCTION_NAMES: &[&str] = &[
    "collect_user_info",
    "collect_relationship_preferences",
    "provide_advice",
    "update_preferences",
    "end_session",
    "unknown_function",
];

/// Apply the conversation-mutating effects the way the runtime does
fn apply(conversation: &mut ConversationState, effects: &[Effect]) {
    for effect in effects {
        match effect {
            Effect::ResetConversation => conversation.reset(),
            Effect::RecordUserName { name } => conversation.record_user_name(name.clone()),
            Effect::AppendTurn { turn } => conversation.append(turn.clone()),
            _ => {}
        }
    }
}

fn allowed_edge(from: &SessionState, to: &SessionState) -> bool {
    use NodeKind::{Advice, Initial, Preferences, UpdateOrEnd};
    let kind = |s: &SessionState| s.active_node().map(|n| n.kind);
    match (from, to) {
        (_, SessionState::Released) => true,
        (SessionState::Ended, SessionState::Ended) => true,
        (SessionState::Pending, SessionState::Pending) => true,
        (SessionState::Active { .. }, SessionState::Ended) => kind(from) == Some(UpdateOrEnd),
        (_, SessionState::Active { .. }) => matches!(
            (kind(from), kind(to)),
            (_, Some(Initial))
                | (Some(Initial), Some(Preferences))
                | (Some(Preferences), Some(Advice))
                | (Some(Advice), Some(UpdateOrEnd))
                | (Some(UpdateOrEnd), Some(Advice))
                | (Some(Preferences), Some(Preferences))
                | (Some(Advice), Some(Advice))
                | (Some(UpdateOrEnd), Some(UpdateOrEnd))
        ),
        _ => false,
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_arguments() -> impl Strategy<Value = Value> {
    prop_oneof![
        ("[A-Za-z]{1,10}", 0u32..100).prop_map(|(name, age)| json!({"name": name, "age": age})),
        "[a-z ]{0,20}".prop_map(|interests| json!({
            "interests": interests,
            "partner_criteria": {
                "age_range": "20-30",
                "height": "any",
                "financial_goals": "stable",
                "values": "kindness"
            }
        })),
        (0u32..100, prop_oneof![Just("single"), Just("divorced")])
            .prop_map(|(age, status)| json!({"age": age, "relationship_status": status})),
        Just(json!({"status": "completed"})),
        Just(json!({})),
        Just(Value::Null),
        any::<i64>().prop_map(|n| json!({"name": n, "age": n.to_string()})),
    ]
}

fn arb_function_call() -> impl Strategy<Value = Event> {
    (proptest::sample::select(FUNCTION_NAMES), arb_arguments()).prop_map(|(name, arguments)| {
        Event::FunctionCall {
            name: name.to_string(),
            arguments,
        }
    })
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        8 => arb_function_call(),
        1 => Just(Event::SessionStart),
        1 => "[a-z ]{1,20}".prop_map(|text| Event::UserTranscript { text }),
        1 => proptest::collection::vec(any::<u8>(), 0..16).prop_map(|pcm| Event::Audio { pcm }),
    ]
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Every reachable node declares unique function names, and only the
    // documented edges are ever taken
    #[test]
    fn prop_reachable_nodes_well_formed(events in proptest::collection::vec(arb_event(), 0..30)) {
        let ctx = test_context();
        let mut state = transition(&SessionState::Pending, &ctx, Event::SessionStart)
            .unwrap()
            .new_state;

        for event in events {
            if let Ok(result) = transition(&state, &ctx, event) {
                prop_assert!(allowed_edge(&state, &result.new_state),
                    "Unexpected edge {} -> {}", state.label(), result.new_state.label());
                if let Some(node) = result.new_state.active_node() {
                    let names = node.function_names();
                    let unique: HashSet<_> = names.iter().collect();
                    prop_assert_eq!(names.len(), unique.len());
                    prop_assert!(!names.is_empty());
                }
                state = result.new_state;
            }
        }
    }

    // Rejected events leave the conversation and the active node untouched
    #[test]
    fn prop_rejected_events_do_not_mutate(events in proptest::collection::vec(arb_event(), 0..30)) {
        let ctx = test_context();
        let mut conversation = ConversationState::new();
        let mut state = SessionState::Pending;

        for event in events {
            let before_state = state.clone();
            let before_conversation = conversation.clone();
            match transition(&state, &ctx, event) {
                Ok(result) => {
                    apply(&mut conversation, &result.effects);
                    state = result.new_state;
                }
                Err(_) => {
                    prop_assert_eq!(&state, &before_state);
                    prop_assert_eq!(&conversation, &before_conversation);
                }
            }
        }
    }

    // Handlers are total over arbitrary arguments
    #[test]
    fn prop_handlers_never_panic(arguments in arb_arguments()) {
        for handler in [
            handle_user_info as TransitionHandler,
            handle_relationship_preferences,
            handle_advice,
            handle_update_preferences,
            handle_end_session,
        ] {
            let outcome = handler(&arguments);
            prop_assert!(!outcome.response.is_empty());
        }
    }

    // Starting a session always yields exactly the two seeded turns
    #[test]
    fn prop_start_reseeds(events in proptest::collection::vec(arb_event(), 0..15)) {
        let ctx = test_context();
        let mut conversation = ConversationState::new();
        let mut state = SessionState::Pending;
        for event in events {
            if let Ok(result) = transition(&state, &ctx, event) {
                apply(&mut conversation, &result.effects);
                state = result.new_state;
            }
        }

        if let Ok(result) = transition(&state, &ctx, Event::SessionStart) {
            apply(&mut conversation, &result.effects);
            prop_assert_eq!(conversation.len(), 2);
            prop_assert!(conversation.user_name().is_none());
        }
    }
}

// ============================================================================
// Scenario Tests
// ============================================================================

#[test]
fn test_full_flow_with_update_loop() {
    let ctx = test_context();
    let mut conversation = ConversationState::new();
    let mut state = SessionState::Pending;

    let criteria = json!({
        "age_range": "22-30",
        "height": "any",
        "financial_goals": "debt free",
        "values": "family"
    });
    let steps = [
        Event::SessionStart,
        Event::FunctionCall {
            name: "collect_user_info".to_string(),
            arguments: json!({"name": "Bob", "age": 25}),
        },
        Event::FunctionCall {
            name: "collect_relationship_preferences".to_string(),
            arguments: json!({"interests": "hiking", "partner_criteria": criteria.clone()}),
        },
        Event::FunctionCall {
            name: "provide_advice".to_string(),
            arguments: json!({"age": 25, "relationship_status": "single"}),
        },
        Event::FunctionCall {
            name: "update_preferences".to_string(),
            arguments: json!({"interests": "climbing", "partner_criteria": criteria}),
        },
    ];

    for event in steps {
        let result = transition(&state, &ctx, event).unwrap();
        apply(&mut conversation, &result.effects);
        state = result.new_state;
    }

    let node = state.active_node().unwrap();
    assert_eq!(node.kind, NodeKind::Advice);
    assert_eq!(node.function_names(), vec!["provide_advice"]);
    assert_eq!(conversation.user_name(), Some("Bob"));
    // seeded pair plus one assistant reply per function call
    assert_eq!(conversation.len(), 6);
}
