//! Per-session conversation history
//!
//! Holds the ordered turn history and the caller's name for exactly one
//! session. The session runtime owns the only instance; transition handlers
//! never touch it directly.

use crate::llm::LlmContext;
use crate::state_machine::node::Node;
use crate::system_prompt::{build_system_prompt, OPENING_QUESTION};
use serde::{Deserialize, Serialize};

/// Speaker of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    Assistant,
    User,
}

/// One utterance in the conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
}

/// Turn history and extracted caller details for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationState {
    turns: Vec<Turn>,
    user_name: Option<String>,
}

impl ConversationState {
    /// Create a freshly seeded conversation
    pub fn new() -> Self {
        let mut state = Self {
            turns: Vec::new(),
            user_name: None,
        };
        state.reset();
        state
    }

    /// Drop all history and reseed the system prompt and opening question.
    ///
    /// Total and idempotent: any prior history is discarded.
    pub fn reset(&mut self) {
        self.turns.clear();
        self.user_name = None;
        self.turns.push(Turn::system(build_system_prompt()));
        self.turns.push(Turn::assistant(OPENING_QUESTION));
        tracing::debug!(turns = self.turns.len(), "Conversation reset");
    }

    pub fn record_user_name(&mut self, name: impl Into<String>) {
        self.user_name = Some(name.into());
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    #[cfg(test)]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn user_name(&self) -> Option<&str> {
        self.user_name.as_deref()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[allow(dead_code)] // Pairs with len()
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Snapshot handed to the model layer: history in insertion order, then
    /// those of the active node's opening messages not already in history,
    /// with the node's functions.
    pub fn llm_context(&self, node: &Node) -> LlmContext {
        let messages = self
            .turns
            .iter()
            .chain(
                node.opening_messages
                    .iter()
                    .filter(|t| !self.turns.contains(t)),
            )
            .cloned()
            .collect();
        LlmContext {
            messages,
            tools: node.definitions(),
        }
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}
