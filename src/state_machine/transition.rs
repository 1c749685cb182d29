//! Pure state transition function
//!
//! Given the same state, context and event this always produces the same
//! result and performs no I/O. Rejected events leave the state untouched:
//! the caller keeps the old state when an error comes back.

use super::node::NodeKind;
use super::{Effect, Event, Node, SessionContext, SessionState};
use crate::conversation::Turn;
use serde_json::Value;
use thiserror::Error;

/// Status reported when a handler ends the session without naming one
const COMPLETED_STATUS: &str = "completed";
/// Status reported when the call is torn down before the flow finished
const RELEASED_STATUS: &str = "released";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SessionState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: SessionState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Function '{name}' is not declared on the {node} node")]
    UnknownFunction { name: String, node: NodeKind },
    #[error("No handler registered for function '{0}'")]
    UnregisteredHandler(String),
    #[error("Session has not started")]
    SessionNotStarted,
    #[error("Session has ended")]
    SessionEnded,
    #[error("Session has been released")]
    SessionReleased,
}

/// Pure transition function
pub fn transition(
    state: &SessionState,
    context: &SessionContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Released sessions accept nothing
        // ============================================================
        (SessionState::Released, _) => Err(TransitionError::SessionReleased),

        // ============================================================
        // Session start (also a reentrant reset)
        // ============================================================
        (SessionState::Pending | SessionState::Active { .. }, Event::SessionStart) => {
            Ok(activate(Node::initial(), true).prepend_effects(vec![Effect::ResetConversation]))
        }

        (SessionState::Ended, Event::SessionStart) => Err(TransitionError::SessionEnded),

        // ============================================================
        // Caller speech
        // ============================================================
        (SessionState::Active { node }, Event::UserTranscript { text }) => {
            Ok(TransitionResult::new(SessionState::Active { node: node.clone() })
                .with_effect(Effect::AppendTurn {
                    turn: Turn::user(text),
                })
                .with_effect(Effect::PublishContext))
        }

        // ============================================================
        // Function calls
        // ============================================================
        (SessionState::Active { node }, Event::FunctionCall { name, arguments }) => {
            let declaration = node.function(&name).ok_or_else(|| TransitionError::UnknownFunction {
                name: name.clone(),
                node: node.kind,
            })?;
            let handler = context
                .registry
                .get(declaration.handler)
                .ok_or_else(|| TransitionError::UnregisteredHandler(name.clone()))?;

            let outcome = handler(&arguments);
            let status = outcome
                .result
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or(COMPLETED_STATUS)
                .to_string();

            let mut effects = Vec::new();
            if let Some(user_name) = outcome.captured_name {
                effects.push(Effect::RecordUserName { name: user_name });
            }
            effects.push(Effect::append_assistant(outcome.response.clone()));
            effects.push(Effect::speak(outcome.response));
            effects.push(Effect::FunctionResult {
                name,
                result: outcome.result,
            });

            match outcome.next_node {
                Some(next) => Ok(activate(next, false).prepend_effects(effects)),
                None => Ok(TransitionResult::new(SessionState::Ended)
                    .with_effects(effects)
                    .with_effect(Effect::NotifyEnded { status })
                    .with_effect(Effect::ReleaseConversation)),
            }
        }

        (SessionState::Pending, Event::UserTranscript { .. } | Event::FunctionCall { .. }) => {
            Err(TransitionError::SessionNotStarted)
        }

        (SessionState::Ended, Event::UserTranscript { .. } | Event::FunctionCall { .. }) => {
            Err(TransitionError::SessionEnded)
        }

        // ============================================================
        // Recording
        // ============================================================
        (state, Event::AudioFormat { sample_rate, channels }) => {
            Ok(TransitionResult::new(state.clone())
                .with_effect(Effect::SetAudioFormat { sample_rate, channels }))
        }

        (state, Event::Audio { pcm }) => {
            Ok(TransitionResult::new(state.clone()).with_effect(Effect::BufferAudio { pcm }))
        }

        // ============================================================
        // Session end
        // ============================================================
        (SessionState::Ended, Event::SessionEnd) => Ok(TransitionResult::new(SessionState::Released)
            .with_effect(Effect::PersistRecording)
            .with_effect(Effect::ReleaseConversation)),

        (SessionState::Pending | SessionState::Active { .. }, Event::SessionEnd) => {
            Ok(TransitionResult::new(SessionState::Released)
                .with_effect(Effect::NotifyEnded {
                    status: RELEASED_STATUS.to_string(),
                })
                .with_effect(Effect::PersistRecording)
                .with_effect(Effect::ReleaseConversation))
        }
    }
}

/// Make `node` active and register its functions.
///
/// The opening utterance is only spoken on session start; after a function
/// call the handler's response is what the caller hears.
fn activate(node: Node, speak_opening: bool) -> TransitionResult {
    let opening = node
        .opening_utterance()
        .filter(|_| speak_opening)
        .map(str::to_string);
    let definitions = node.definitions();

    let mut result = TransitionResult::new(SessionState::Active { node });
    if let Some(text) = opening {
        result = result.with_effect(Effect::speak(text));
    }
    result
        .with_effect(Effect::register_functions(definitions))
        .with_effect(Effect::PublishContext)
}

impl TransitionResult {
    fn prepend_effects(mut self, effects: Vec<Effect>) -> Self {
        let rest = std::mem::replace(&mut self.effects, effects);
        self.effects.extend(rest);
        self
    }
}
