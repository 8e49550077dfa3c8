//! The unit of work handed to senders and queues.

use std::time::Duration;

use super::{RetryPolicy, TransportOptions, form_urlencode};
use crate::identifier::{ChatId, TopicId};

/// One message bound for one chat (and optionally one topic).
///
/// `message` is already rendered and truncated. `attempts_remaining`
/// includes the attempt about to be made.
#[derive(Clone, Debug, PartialEq)]
pub struct DeliveryTask {
    pub url: String,
    pub message: String,
    pub chat_id: ChatId,
    pub topic_id: Option<TopicId>,
    pub options: TransportOptions,
    pub attempts_remaining: u32,
    pub retry_delay: Duration,
}

impl DeliveryTask {
    /// A single-attempt task.
    pub fn new(
        url: impl Into<String>,
        message: impl Into<String>,
        chat_id: ChatId,
        topic_id: Option<TopicId>,
        options: TransportOptions,
    ) -> Self {
        let once = RetryPolicy::once();
        Self {
            url: url.into(),
            message: message.into(),
            chat_id,
            topic_id,
            options,
            attempts_remaining: once.max_attempts,
            retry_delay: once.delay,
        }
    }

    #[must_use]
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.attempts_remaining = policy.max_attempts.max(1);
        self.retry_delay = policy.delay;
        self
    }

    /// Mark one attempt as used; returns whether another may follow.
    pub fn consume_attempt(&mut self) -> bool {
        self.attempts_remaining = self.attempts_remaining.saturating_sub(1);
        self.attempts_remaining > 0
    }

    /// `sendMessage` form fields, in wire order.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("text", self.message.clone()),
            ("chat_id", self.chat_id.to_string()),
            ("parse_mode", "html".to_string()),
            ("disable_web_page_preview", "true".to_string()),
        ];
        if let Some(topic) = &self.topic_id {
            fields.push(("message_thread_id", topic.to_string()));
        }
        fields
    }

    pub fn form_body(&self) -> String {
        let fields = self.form_fields();
        form_urlencode(fields.iter().map(|(key, value)| (*key, value.as_str())))
    }
}
