//! Handler abstraction and the Telegram handler.
//!
//! A [`Handler`] receives records from the logging pipeline. The
//! [`TelegramHandler`] resolves the destination for each record, renders it
//! and either delivers it inline or submits it to a named queue. Nothing
//! that goes wrong on the way is reported to the caller: `handle` only
//! answers whether the record may bubble to the next handler.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use parking_lot::RwLock;

use crate::context::{ContextProvider, ExecutionContext};
use crate::delivery::{DeliverySender, DeliveryTask, RetryPolicy, TaskQueue, TransportOptions};
use crate::formatter::{Formatter, TELEGRAM_MESSAGE_SIZE, html::truncate_chars};
use crate::identifier::{ChatId, TopicId};
use crate::level::Level;
use crate::log_record::{LogRecord, RecordContext};
use crate::rate_limited_warner::RateLimitedWarner;
use crate::topic::TopicResolver;

/// Default Bot API base URL; the token and method are appended to it.
pub const DEFAULT_BOT_API: &str = "https://api.telegram.org/bot";
/// Host that marks a base URL as the Bot API rather than a custom endpoint.
pub const TELEGRAM_API_HOST: &str = "https://api.telegram.org";
/// How long [`Handler::flush`] waits for queued deliveries.
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Receiver of log records.
pub trait Handler: Send + Sync {
    /// Whether records at `level` are processed.
    fn is_handling(&self, level: Level) -> bool;

    /// Process `record`. Returns `true` when the record must not bubble to
    /// handlers after this one.
    fn handle(&self, record: &LogRecord) -> bool;

    /// Process several records together.
    fn handle_batch(&self, records: &[LogRecord]) {
        for record in records {
            self.handle(record);
        }
    }

    /// Wait for pending work; returns `false` if it did not settle in time.
    fn flush(&self) -> bool {
        true
    }
}

/// Where a message goes.
#[derive(Clone, Debug, PartialEq)]
pub struct DestinationTarget {
    pub token: String,
    pub chat_id: ChatId,
    pub topic_id: Option<TopicId>,
}

impl DestinationTarget {
    pub fn new(token: impl Into<String>, chat_id: impl Into<ChatId>) -> Self {
        Self {
            token: token.into(),
            chat_id: chat_id.into(),
            topic_id: None,
        }
    }

    #[must_use]
    pub fn with_topic(mut self, topic_id: Option<TopicId>) -> Self {
        self.topic_id = topic_id;
        self
    }

    /// Pick each field from the first source that has it.
    ///
    /// The record context overrides everything; for the topic, the declared
    /// topic comes next; `self` supplies the defaults.
    pub fn merge(&self, context: &RecordContext, declared: Option<TopicId>) -> Self {
        Self {
            token: context.token().unwrap_or(&self.token).to_string(),
            chat_id: context.chat_id().unwrap_or_else(|| self.chat_id.clone()),
            topic_id: context
                .topic_id()
                .or(declared)
                .or_else(|| self.topic_id.clone()),
        }
    }
}

/// `sendMessage` URL for `token`.
///
/// Base URLs on the Bot API host get `<token>/SendMessage` appended; any
/// other base URL is used verbatim.
pub fn endpoint_url(bot_api: &str, token: &str) -> String {
    if bot_api.contains(TELEGRAM_API_HOST) {
        format!("{bot_api}{token}/SendMessage")
    } else {
        bot_api.to_string()
    }
}

/// Static settings of a [`TelegramHandler`].
#[derive(Clone, Debug)]
pub struct TelegramHandlerConfig {
    /// Default destination.
    pub destination: DestinationTarget,
    pub bot_api: String,
    /// Minimum level handled.
    pub level: Level,
    /// Let handled records reach later handlers.
    pub bubble: bool,
    /// Message size limit in code points.
    pub max_length: usize,
    pub transport: TransportOptions,
    /// Retry policy attached to queued tasks.
    pub retry: RetryPolicy,
    /// Queue for deferred delivery; `None` delivers inline.
    pub queue_name: Option<String>,
}

impl TelegramHandlerConfig {
    pub fn new(token: impl Into<String>, chat_id: impl Into<ChatId>) -> Self {
        Self {
            destination: DestinationTarget::new(token, chat_id),
            bot_api: DEFAULT_BOT_API.to_string(),
            level: Level::Debug,
            bubble: true,
            max_length: TELEGRAM_MESSAGE_SIZE,
            transport: TransportOptions::default(),
            retry: RetryPolicy::default(),
            queue_name: None,
        }
    }
}

/// Collaborators of a [`TelegramHandler`].
pub struct HandlerComponents {
    pub formatter: Arc<dyn Formatter>,
    pub resolver: TopicResolver,
    pub sender: DeliverySender,
    pub queue: Option<Arc<dyn TaskQueue>>,
    pub context: Arc<dyn ContextProvider>,
}

struct QueueBinding {
    name: String,
    queue: Arc<dyn TaskQueue>,
}

/// Delivers records to a Telegram chat, routed to per-method topics.
pub struct TelegramHandler {
    destination: RwLock<DestinationTarget>,
    config: TelegramHandlerConfig,
    formatter: Arc<dyn Formatter>,
    resolver: TopicResolver,
    sender: DeliverySender,
    queue: Option<QueueBinding>,
    context: Arc<dyn ContextProvider>,
    warner: RateLimitedWarner,
}

impl TelegramHandler {
    /// Assemble a handler. Queued delivery needs both a queue name in
    /// `config` and a queue in `components`; otherwise delivery is inline.
    pub fn new(config: TelegramHandlerConfig, components: HandlerComponents) -> Self {
        let queue = match (&config.queue_name, components.queue) {
            (Some(name), Some(queue)) => Some(QueueBinding {
                name: name.clone(),
                queue,
            }),
            _ => None,
        };
        Self {
            destination: RwLock::new(config.destination.clone()),
            config,
            formatter: components.formatter,
            resolver: components.resolver,
            sender: components.sender,
            queue,
            context: components.context,
            warner: RateLimitedWarner::default(),
        }
    }

    pub fn config(&self) -> &TelegramHandlerConfig {
        &self.config
    }

    pub fn resolver(&self) -> &TopicResolver {
        &self.resolver
    }

    pub fn is_queued(&self) -> bool {
        self.queue.is_some()
    }

    /// Current default destination.
    pub fn destination(&self) -> DestinationTarget {
        self.destination.read().clone()
    }

    pub fn set_token(&self, token: impl Into<String>) {
        self.destination.write().token = token.into();
    }

    pub fn set_chat_id(&self, chat_id: impl Into<ChatId>) {
        self.destination.write().chat_id = chat_id.into();
    }

    pub fn set_topic_id(&self, topic_id: Option<TopicId>) {
        self.destination.write().topic_id = topic_id;
    }

    /// Destination for `record` under `ctx`.
    pub fn target_for(&self, record: &LogRecord, ctx: &ExecutionContext) -> DestinationTarget {
        let declared = self.resolver.resolve(record, ctx);
        self.destination.read().merge(&record.context, declared)
    }

    /// Task that would carry `message` for `record`.
    pub fn task_for(
        &self,
        record: &LogRecord,
        ctx: &ExecutionContext,
        message: &str,
    ) -> DeliveryTask {
        let target = self.target_for(record, ctx);
        let message = truncate_chars(message, self.config.max_length);
        DeliveryTask::new(
            endpoint_url(&self.config.bot_api, &target.token),
            message,
            target.chat_id,
            target.topic_id,
            self.config.transport.clone(),
        )
    }

    fn dispatch(&self, task: DeliveryTask) {
        match &self.queue {
            Some(binding) => {
                let task = task.with_retry(self.config.retry);
                if let Err(err) = binding.queue.submit(task, &binding.name) {
                    self.warner.record_drop();
                    self.warner.warn_if_due(|count| {
                        warn!("TelegramHandler dropped {count} messages: {err}");
                    });
                }
            }
            None => {
                if let Err(err) = self.sender.send(&task) {
                    debug!(
                        "TelegramHandler: delivery to chat {} failed: {err}",
                        task.chat_id
                    );
                }
            }
        }
    }
}

impl Handler for TelegramHandler {
    fn is_handling(&self, level: Level) -> bool {
        level >= self.config.level
    }

    fn handle(&self, record: &LogRecord) -> bool {
        if !self.is_handling(record.level) {
            return false;
        }
        let ctx = self.context.snapshot();
        let message = self.formatter.format(record, &ctx);
        self.dispatch(self.task_for(record, &ctx, &message));
        !self.config.bubble
    }

    /// Render the handled records as one message routed like the first.
    fn handle_batch(&self, records: &[LogRecord]) {
        let records: Vec<LogRecord> = records
            .iter()
            .filter(|record| self.is_handling(record.level))
            .cloned()
            .collect();
        let Some(first) = records.first() else {
            return;
        };
        let ctx = self.context.snapshot();
        let message = self.formatter.format_batch(&records, &ctx);
        self.dispatch(self.task_for(first, &ctx, &message));
    }

    fn flush(&self) -> bool {
        self.warner.flush(|count| {
            warn!("TelegramHandler dropped {count} messages in the last interval");
        });
        match &self.queue {
            Some(binding) => binding.queue.flush(DEFAULT_FLUSH_TIMEOUT),
            None => true,
        }
    }
}

impl fmt::Debug for TelegramHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramHandler")
            .field("bot_api", &self.config.bot_api)
            .field("level", &self.config.level)
            .field("bubble", &self.config.bubble)
            .field("queue", &self.queue.as_ref().map(|binding| &binding.name))
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}
