//! Effects produced by state transitions

use crate::conversation::Turn;
use crate::llm::ToolDefinition;
use serde_json::Value;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Clear history and reseed the fixed prompts
    ResetConversation,

    RecordUserName { name: String },

    AppendTurn { turn: Turn },

    /// Send an utterance to the speech output
    Speak { text: String },

    /// Replace the functions registered with the model layer
    RegisterFunctions { definitions: Vec<ToolDefinition> },

    /// Publish the current conversation snapshot to the model layer
    PublishContext,

    /// Report a function's return value to the model layer
    FunctionResult { name: String, result: Value },

    /// Tell subscribers the conversation is over
    NotifyEnded { status: String },

    SetAudioFormat { sample_rate: u32, channels: u16 },

    BufferAudio { pcm: Vec<u8> },

    /// Hand the buffered audio to the recording sink
    PersistRecording,

    /// Drop the conversation state
    ReleaseConversation,
}

impl Effect {
    pub fn speak(text: impl Into<String>) -> Self {
        Effect::Speak { text: text.into() }
    }

    pub fn append_assistant(content: impl Into<String>) -> Self {
        Effect::AppendTurn {
            turn: Turn::assistant(content),
        }
    }

    pub fn register_functions(definitions: Vec<ToolDefinition>) -> Self {
        Effect::RegisterFunctions { definitions }
    }
}
