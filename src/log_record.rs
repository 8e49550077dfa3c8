//! Log record representation consumed by the handler.
//!
//! A [`LogRecord`] is built once by the producer (the host logger or the
//! [`log` bridge](crate::log_compat)), handed to a handler and then dropped.
//! Its context may carry an exception plus explicit `token`, `chat_id` and
//! `topic_id` overrides for the destination.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::exception::ExceptionPayload;
use crate::identifier::{ChatId, Identifier, TopicId};
use crate::level::Level;

/// Context key holding a JSON-encoded exception.
pub const EXCEPTION_KEY: &str = "exception";
/// Context key overriding the bot token.
pub const TOKEN_KEY: &str = "token";
/// Context key overriding the destination chat.
pub const CHAT_ID_KEY: &str = "chat_id";
/// Context key overriding the destination topic.
pub const TOPIC_ID_KEY: &str = "topic_id";

/// Structured context attached to a record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordContext {
    /// Exception reported by the log call, if any.
    pub exception: Option<ExceptionPayload>,
    /// Arbitrary key/value pairs.
    pub values: BTreeMap<String, Value>,
}

impl RecordContext {
    /// `true` when there is neither an exception nor any value.
    pub fn is_empty(&self) -> bool {
        self.exception.is_none() && self.values.is_empty()
    }

    /// Explicit bot token override.
    pub fn token(&self) -> Option<&str> {
        match self.values.get(TOKEN_KEY) {
            Some(Value::String(token)) if !token.is_empty() => Some(token),
            _ => None,
        }
    }

    /// Explicit chat override.
    pub fn chat_id(&self) -> Option<ChatId> {
        self.values.get(CHAT_ID_KEY).and_then(Identifier::from_json)
    }

    /// Explicit topic override.
    pub fn topic_id(&self) -> Option<TopicId> {
        self.values.get(TOPIC_ID_KEY).and_then(Identifier::from_json)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LogRecord {
    /// Channel (logger name) that emitted the record.
    pub channel: String,
    pub level: Level,
    pub message: String,
    pub context: RecordContext,
    /// Values added by processors (source location, request ids, ...).
    pub extra: BTreeMap<String, Value>,
    /// Time the record was created.
    pub datetime: DateTime<Utc>,
}

impl LogRecord {
    /// Construct a record stamped with the current time.
    pub fn new(channel: &str, level: Level, message: &str) -> Self {
        Self {
            channel: channel.to_owned(),
            level,
            message: message.to_owned(),
            context: RecordContext::default(),
            extra: BTreeMap::new(),
            datetime: Utc::now(),
        }
    }

    /// Add a context value.
    ///
    /// A value under [`EXCEPTION_KEY`] that decodes as an
    /// [`ExceptionPayload`] becomes the record's exception.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let value = value.into();
        if key == EXCEPTION_KEY {
            match ExceptionPayload::from_json(&value) {
                Ok(exception) => return self.with_exception(exception),
                Err(err) => log::debug!("context exception is not a valid payload: {err}"),
            }
        }
        self.context.values.insert(key, value);
        self
    }

    /// Attach an exception to the context.
    #[must_use]
    pub fn with_exception(mut self, exception: ExceptionPayload) -> Self {
        self.context.exception = Some(exception);
        self
    }

    /// Add an extra value.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Override the creation time.
    #[must_use]
    pub fn at(mut self, datetime: DateTime<Utc>) -> Self {
        self.datetime = datetime;
        self
    }

    pub fn exception(&self) -> Option<&ExceptionPayload> {
        self.context.exception.as_ref()
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.level, self.message)
    }
}
