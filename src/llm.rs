//! Types exchanged with the external model-integration layer
//!
//! The model client itself lives outside this service; these are the shapes
//! it receives: the function definitions currently callable, and the
//! conversation snapshot to complete against.

use crate::conversation::Turn;
use serde::{Deserialize, Serialize};

/// Function definition as registered with the model layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Conversation snapshot handed to the model layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmContext {
    pub messages: Vec<Turn>,
    pub tools: Vec<ToolDefinition>,
}
