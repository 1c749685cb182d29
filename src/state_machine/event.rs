//! Events that can occur in a session

use serde_json::Value;

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    // Lifecycle
    SessionStart,
    SessionEnd,

    /// Caller utterance, already transcribed upstream
    UserTranscript { text: String },

    /// Completed function call from the model layer
    FunctionCall { name: String, arguments: Value },

    // Recording
    AudioFormat { sample_rate: u32, channels: u16 },
    Audio { pcm: Vec<u8> },
}
