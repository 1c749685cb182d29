//! Session state types

use super::handlers::HandlerRegistry;
use super::node::Node;
use std::sync::Arc;

/// Lifecycle of one call
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    /// Connected transport, conversation not yet seeded
    #[default]
    Pending,

    /// A node is active; its functions are the only ones callable
    Active { node: Node },

    /// `end_session` completed; waiting for the transport to close
    Ended,

    /// Conversation state dropped; nothing further is processed
    Released,
}

impl SessionState {
    /// The active node, if any
    pub fn active_node(&self) -> Option<&Node> {
        match self {
            SessionState::Active { node } => Some(node),
            _ => None,
        }
    }

    /// Short label for logs and the session listing
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Pending => "pending",
            SessionState::Active { node } => node.kind.as_str(),
            SessionState::Ended => "ended",
            SessionState::Released => "released",
        }
    }
}

/// Context for a session (immutable configuration)
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    pub registry: Arc<HandlerRegistry>,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>, registry: Arc<HandlerRegistry>) -> Self {
        Self {
            session_id: session_id.into(),
            registry,
        }
    }
}
