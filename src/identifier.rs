//! Chat and topic identifiers.
//!
//! Telegram accepts both numeric ids and `@channel` style names, so an
//! identifier is either an integer or a string. Both forms render to the
//! same text when placed in a form body.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

/// A chat id or topic (message thread) id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(untagged)]
pub enum Identifier {
    Int(i64),
    Text(String),
}

/// Destination chat.
pub type ChatId = Identifier;
/// Sub-thread inside a chat.
pub type TopicId = Identifier;

impl Identifier {
    /// Extract an identifier from a JSON value.
    ///
    /// Strings and integers are accepted; `null`, empty strings and any other
    /// value type yield `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match Self::deserialize(value) {
            Ok(Self::Text(text)) if text.is_empty() => None,
            Ok(id) => Some(id),
            Err(_) => None,
        }
    }

    /// Parse configuration text, preferring the integer form when it fits.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(
            text.parse::<i64>()
                .map(Self::Int)
                .unwrap_or_else(|_| Self::Text(text.to_string())),
        )
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Int(id) => write!(f, "{id}"),
            Identifier::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for Identifier {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}
