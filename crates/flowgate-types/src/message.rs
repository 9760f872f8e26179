//! Message types for FlowGate
//!
//! Defines the inbound Message struct and the Emission values a gate sends
//! downstream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

/// Unique identifier for a message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct MessageId(pub Uuid);

impl MessageId {
    /// Create a new random MessageId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message flowing through a gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Message {
    /// Unique message identifier
    #[serde(default)]
    pub id: MessageId,

    /// Routing topic, compared case-insensitively against the control topic
    #[serde(default)]
    pub topic: Option<String>,

    /// Arbitrary payload
    #[serde(default)]
    pub payload: Option<Value>,

    /// When the message was created
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a message from an optional topic and an optional payload
    pub fn with_parts(topic: Option<String>, payload: Option<Value>) -> Self {
        Self {
            id: MessageId::new(),
            topic,
            payload,
            created_at: Utc::now(),
        }
    }

    /// Create a message with the given topic and payload
    pub fn new(topic: impl Into<String>, payload: impl Into<Value>) -> Self {
        Self::with_parts(Some(topic.into()), Some(payload.into()))
    }

    /// Create a message carrying only a payload
    pub fn payload(payload: impl Into<Value>) -> Self {
        Self::with_parts(None, Some(payload.into()))
    }

    /// Check whether the topic equals `topic`, ignoring case
    pub fn topic_matches(&self, topic: &str) -> bool {
        self.topic
            .as_deref()
            .is_some_and(|t| t.to_lowercase() == topic.to_lowercase())
    }

    /// Lowercased string form of the payload, used for command lookup.
    ///
    /// A missing or null payload yields the empty string.
    pub fn command_token(&self) -> String {
        self.payload
            .as_ref()
            .map(stringify)
            .unwrap_or_default()
            .to_lowercase()
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_token(n),
        Value::Array(items) => items.iter().map(stringify).collect::<Vec<_>>().join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Integral floats print without a fraction, so `1.0` and `1` give the same token
fn number_token(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.is_finite() && f.fract() == 0.0 && f.abs() < 1e21 => {
            if f == 0.0 {
                "0".to_string()
            } else {
                format!("{:.0}", f)
            }
        }
        _ => n.to_string(),
    }
}

/// Output of a gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Emission {
    /// A single message
    Single(Message),
    /// The whole queue, oldest first
    Batch(Vec<Message>),
    /// Explicit no-op, suppresses downstream propagation
    Null,
}
