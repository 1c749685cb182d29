//! Transition handlers and the registry that resolves them
//!
//! A handler turns a completed function's arguments into the assistant's
//! reply and the next node. Handlers are total: each missing or mistyped
//! argument falls back to its own default (name "there", age 0, empty
//! strings) while the well-formed ones are kept.

use super::node::Node;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

const DEFAULT_NAME: &str = "there";

/// Identifier carried by a function declaration in place of a function value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerId {
    UserInfo,
    RelationshipPreferences,
    Advice,
    UpdatePreferences,
    EndSession,
}

/// What a handler hands back to the session driver
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerOutcome {
    /// Assistant reply spoken after the function completes
    pub response: String,
    /// Node to activate next; `None` ends the session
    pub next_node: Option<Node>,
    /// Function return value reported back to the model layer
    pub result: Value,
    /// Caller name for the driver to record
    pub captured_name: Option<String>,
}

pub type TransitionHandler = fn(&Value) -> HandlerOutcome;

// ============================================================================
// Argument types
// ============================================================================

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

/// Parse arguments, falling back to the all-default value when they are not an object
fn parse_or_default<T>(arguments: &Value) -> T
where
    T: for<'de> Deserialize<'de> + Default,
{
    serde_json::from_value(arguments.clone()).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Malformed function arguments, using defaults");
        T::default()
    })
}

/// Read one field, falling back to `fallback` when its value has the wrong shape
fn field_or<T>(expected: &'static str, value: Value, fallback: impl FnOnce() -> T) -> T
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_value(value).unwrap_or_else(|e| {
        tracing::warn!(expected, error = %e, "Malformed function argument, using default");
        fallback()
    })
}

fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: for<'a> Deserialize<'a> + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(field_or(std::any::type_name::<T>(), value, T::default))
}

fn lenient_name<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(field_or("string", value, default_name))
}

/// Ages also arrive as numeric strings ("30")
fn lenient_age<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if let Some(age) = value.as_str().and_then(|s| s.trim().parse().ok()) {
        return Ok(age);
    }
    Ok(field_or("integer", value, u32::default))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserInfoArgs {
    #[serde(default = "default_name", deserialize_with = "lenient_name")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_age")]
    pub age: u32,
}

impl Default for UserInfoArgs {
    fn default() -> Self {
        Self {
            name: default_name(),
            age: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerCriteria {
    #[serde(default, deserialize_with = "lenient")]
    pub age_range: String,
    #[serde(default, deserialize_with = "lenient")]
    pub height: String,
    #[serde(default, deserialize_with = "lenient")]
    pub financial_goals: String,
    #[serde(default, deserialize_with = "lenient")]
    pub values: String,
}

/// Arguments of `collect_relationship_preferences` and `update_preferences`.
///
/// `name` and `age` are read here but neither schema declares them, so in
/// practice they arrive missing and take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PreferencesArgs {
    #[serde(default, deserialize_with = "lenient")]
    pub interests: String,
    #[serde(default, deserialize_with = "lenient")]
    pub partner_criteria: PartnerCriteria,
    #[serde(default = "default_name", deserialize_with = "lenient_name")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_age")]
    pub age: u32,
}

impl Default for PreferencesArgs {
    fn default() -> Self {
        Self {
            interests: String::new(),
            partner_criteria: PartnerCriteria::default(),
            name: default_name(),
            age: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipStatus {
    Single,
    Divorced,
}

impl std::fmt::Display for RelationshipStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelationshipStatus::Single => f.write_str("single"),
            RelationshipStatus::Divorced => f.write_str("divorced"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AdviceArgs {
    #[serde(default, deserialize_with = "lenient_age")]
    pub age: u32,
    #[serde(default, deserialize_with = "lenient")]
    pub relationship_status: Option<RelationshipStatus>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Completed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Completed => f.write_str("completed"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EndSessionArgs {
    #[serde(default, deserialize_with = "lenient")]
    pub status: SessionStatus,
}

// ============================================================================
// Handlers
// ============================================================================

/// `collect_user_info` → Preferences
pub fn handle_user_info(arguments: &Value) -> HandlerOutcome {
    let args: UserInfoArgs = parse_or_default(arguments);
    tracing::info!(name = %args.name, age = args.age, "User info collected");

    HandlerOutcome {
        response: format!(
            "Nice to meet you, {}! Now, let's talk about what you're looking for in a partner.",
            args.name
        ),
        next_node: Some(Node::preferences(&args.name)),
        result: json!({ "name": args.name, "age": args.age }),
        captured_name: Some(args.name),
    }
}

/// `collect_relationship_preferences` → Advice
pub fn handle_relationship_preferences(arguments: &Value) -> HandlerOutcome {
    let args: PreferencesArgs = parse_or_default(arguments);
    tracing::info!(
        interests = %args.interests,
        criteria = ?args.partner_criteria,
        "Relationship preferences collected"
    );

    HandlerOutcome {
        response: format!(
            "Thanks for sharing your preferences, {}. Now, let's talk about some relationship advice.",
            args.name
        ),
        next_node: Some(Node::advice(&args.name, args.age)),
        result: json!({
            "interests": args.interests,
            "partner_criteria": args.partner_criteria,
        }),
        captured_name: None,
    }
}

/// `provide_advice` → UpdateOrEnd
pub fn handle_advice(arguments: &Value) -> HandlerOutcome {
    let args: AdviceArgs = parse_or_default(arguments);
    let status = args
        .relationship_status
        .map_or_else(|| "unknown".to_string(), |s| s.to_string());
    tracing::info!(age = args.age, status = %status, "Advice provided");

    HandlerOutcome {
        response: "I hope that advice was helpful! Would you like to adjust any preferences or end the session?"
            .to_string(),
        next_node: Some(Node::update_or_end()),
        result: json!({
            "advice": format!(
                "Based on your age {} and status {status}, here is some advice...",
                args.age
            )
        }),
        captured_name: None,
    }
}

/// `update_preferences` → Advice
pub fn handle_update_preferences(arguments: &Value) -> HandlerOutcome {
    let args: PreferencesArgs = parse_or_default(arguments);
    tracing::info!(
        interests = %args.interests,
        criteria = ?args.partner_criteria,
        "Preferences updated"
    );

    HandlerOutcome {
        response: "Your preferences have been updated. Let me know if you need anything else!".to_string(),
        next_node: Some(Node::advice(&args.name, args.age)),
        result: json!({
            "updated_interests": args.interests,
            "updated_criteria": args.partner_criteria,
        }),
        captured_name: None,
    }
}

/// `end_session` → terminal
pub fn handle_end_session(arguments: &Value) -> HandlerOutcome {
    let args: EndSessionArgs = parse_or_default(arguments);
    tracing::info!(status = %args.status, "Session ended");

    HandlerOutcome {
        response: format!(
            "Our session is {}. Thank you for talking with me today, take care!",
            args.status
        ),
        next_node: None,
        result: json!({ "status": args.status }),
        captured_name: None,
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Maps handler identifiers to their implementations
#[derive(Debug, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<HandlerId, TransitionHandler>,
}

impl HandlerRegistry {
    /// Registry with no handlers
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registry with every handler the counseling flow declares
    pub fn standard() -> Self {
        Self::empty()
            .with(HandlerId::UserInfo, handle_user_info)
            .with(HandlerId::RelationshipPreferences, handle_relationship_preferences)
            .with(HandlerId::Advice, handle_advice)
            .with(HandlerId::UpdatePreferences, handle_update_preferences)
            .with(HandlerId::EndSession, handle_end_session)
    }

    pub fn with(mut self, id: HandlerId, handler: TransitionHandler) -> Self {
        self.handlers.insert(id, handler);
        self
    }

    pub fn get(&self, id: HandlerId) -> Option<TransitionHandler> {
        self.handlers.get(&id).copied()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
