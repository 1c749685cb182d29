//! Conversation flow state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions: the
//! node graph and handlers decide what happens, the runtime performs it.

mod effect;
pub mod event;
pub mod handlers;
pub mod node;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use handlers::HandlerRegistry;
pub use node::{Node, NodeKind};
pub use state::{SessionContext, SessionState};
pub use transition::{transition, TransitionError};
