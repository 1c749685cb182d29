//! Conversation stages and the functions callable in each
//!
//! Nodes only declare argument schemas; validating arguments against them is
//! the model layer's job.

use super::handlers::HandlerId;
use crate::conversation::Turn;
use crate::llm::ToolDefinition;
use crate::system_prompt::{NODE_ROLE_PROMPT, OPENING_QUESTION};
use serde::Serialize;
use serde_json::{json, Value};

/// Which stage a node represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Initial,
    Preferences,
    Advice,
    UpdateOrEnd,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Initial => "initial",
            NodeKind::Preferences => "preferences",
            NodeKind::Advice => "advice",
            NodeKind::UpdateOrEnd => "update_or_end",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, schema-typed action the model may invoke
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDeclaration {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
    pub handler: HandlerId,
}

impl FunctionDeclaration {
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.to_string(),
            description: self.description.to_string(),
            input_schema: self.parameters.clone(),
        }
    }
}

/// One stage of the conversation
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub opening_messages: Vec<Turn>,
    pub functions: Vec<FunctionDeclaration>,
}

impl Node {
    /// Collect the caller's name and age
    pub fn initial() -> Self {
        Self {
            kind: NodeKind::Initial,
            opening_messages: vec![Turn::system(NODE_ROLE_PROMPT), Turn::assistant(OPENING_QUESTION)],
            functions: vec![FunctionDeclaration {
                name: "collect_user_info",
                description: "Record user's name and age.",
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "age": {"type": "integer"}
                    },
                    "required": ["name", "age"]
                }),
                handler: HandlerId::UserInfo,
            }],
        }
    }

    /// Gather what the caller is looking for in a partner
    pub fn preferences(user_name: &str) -> Self {
        Self {
            kind: NodeKind::Preferences,
            opening_messages: vec![Turn::assistant(format!(
                "Nice to meet you, {user_name}! Let's talk about what you're looking for in a partner."
            ))],
            functions: vec![FunctionDeclaration {
                name: "collect_relationship_preferences",
                description: "Gather user's relationship preferences.",
                parameters: preferences_schema(),
                handler: HandlerId::RelationshipPreferences,
            }],
        }
    }

    /// Offer advice based on age and relationship status
    pub fn advice(user_name: &str, age: u32) -> Self {
        tracing::debug!(user_name, age, "Building advice node");
        Self {
            kind: NodeKind::Advice,
            opening_messages: vec![Turn::assistant(format!(
                "Thanks, {user_name}. Based on your preferences, I have some relationship advice for you."
            ))],
            functions: vec![FunctionDeclaration {
                name: "provide_advice",
                description: "Offer relationship advice.",
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "age": {"type": "integer"},
                        "relationship_status": {"type": "string", "enum": ["single", "divorced"]}
                    },
                    "required": ["age", "relationship_status"]
                }),
                handler: HandlerId::Advice,
            }],
        }
    }

    /// Let the caller adjust preferences or finish
    pub fn update_or_end() -> Self {
        Self {
            kind: NodeKind::UpdateOrEnd,
            opening_messages: vec![Turn::assistant(
                "Would you like to adjust any of your preferences, or are you satisfied with our session?",
            )],
            functions: vec![
                FunctionDeclaration {
                    name: "update_preferences",
                    description: "Allow users to update their relationship preferences.",
                    parameters: preferences_schema(),
                    handler: HandlerId::UpdatePreferences,
                },
                FunctionDeclaration {
                    name: "end_session",
                    description: "End the relationship counseling session.",
                    parameters: json!({
                        "type": "object",
                        "properties": {
                            "status": {"type": "string", "enum": ["completed"]}
                        },
                        "required": ["status"]
                    }),
                    handler: HandlerId::EndSession,
                },
            ],
        }
    }

    /// Find a function declared on this node
    pub fn function(&self, name: &str) -> Option<&FunctionDeclaration> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn function_names(&self) -> Vec<&'static str> {
        self.functions.iter().map(|f| f.name).collect()
    }

    /// Definitions to register with the model layer while this node is active
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.functions.iter().map(FunctionDeclaration::to_definition).collect()
    }

    /// Last assistant opening message, spoken when the node is activated
    pub fn opening_utterance(&self) -> Option<&str> {
        self.opening_messages
            .iter()
            .rev()
            .find(|t| t.role == crate::conversation::Role::Assistant)
            .map(|t| t.content.as_str())
    }
}

fn preferences_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "interests": {"type": "string"},
            "partner_criteria": {
                "type": "object",
                "properties": {
                    "age_range": {"type": "string"},
                    "height": {"type": "string"},
                    "financial_goals": {"type": "string"},
                    "values": {"type": "string"}
                },
                "required": ["age_range", "height", "financial_goals", "values"]
            }
        },
        "required": ["interests", "partner_criteria"]
    })
}
