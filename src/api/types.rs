//! API request and response types, including the websocket frame codec

use crate::conversation::Turn;
use crate::llm::ToolDefinition;
use crate::runtime::{SessionEvent, SessionSummary};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frames received from the telephony/model side of the websocket
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InboundFrame {
    /// Carries the audio format; the session itself starts on connect
    Start {
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default)]
        sample_rate: Option<u32>,
        #[serde(default)]
        channels: Option<u16>,
    },
    Media {
        /// Base64 16-bit little-endian PCM
        payload: String,
    },
    Transcript {
        text: String,
    },
    FunctionCall {
        #[serde(default)]
        session_id: Option<String>,
        function_name: String,
        #[serde(default)]
        arguments: Value,
    },
    Stop,
}

/// Frames sent back over the websocket
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OutboundFrame {
    BotSpeaking {
        text: String,
    },
    Functions {
        functions: Vec<ToolDefinition>,
    },
    Context {
        messages: Vec<Turn>,
        functions: Vec<ToolDefinition>,
    },
    FunctionResult {
        function_name: String,
        result: Value,
    },
    SessionEnded {
        status: String,
    },
    Error {
        message: String,
    },
}

impl OutboundFrame {
    pub fn error(message: impl Into<String>) -> Self {
        OutboundFrame::Error {
            message: message.into(),
        }
    }
}

impl From<SessionEvent> for OutboundFrame {
    fn from(event: SessionEvent) -> Self {
        match event {
            SessionEvent::BotSpeaking { text } => OutboundFrame::BotSpeaking { text },
            SessionEvent::Functions { definitions } => OutboundFrame::Functions {
                functions: definitions,
            },
            SessionEvent::Context { context } => OutboundFrame::Context {
                messages: context.messages,
                functions: context.tools,
            },
            SessionEvent::FunctionResult { name, result } => OutboundFrame::FunctionResult {
                function_name: name,
                result,
            },
            SessionEvent::Ended { status } => OutboundFrame::SessionEnded { status },
            SessionEvent::Error { message } => OutboundFrame::Error { message },
        }
    }
}

pub fn decode_media(payload: &str) -> Result<Vec<u8>, base64::DecodeError> {
    base64::engine::general_purpose::STANDARD.decode(payload)
}

/// Query string accepted by the websocket endpoint
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub active_sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionSummary>,
}

/// Generic error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
