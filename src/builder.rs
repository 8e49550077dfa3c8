//! Builder for [`TelegramHandler`].
//!
//! Collects the handler options, validates them and wires the formatter,
//! topic resolver, sender and optional queue together. When a queue name is
//! configured without a custom queue, a [`WorkerPool`] with that name is
//! spawned for the handler.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::context::{ContextProvider, ScopedContext};
use crate::delivery::{
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_WORKERS, DeliverySender, FailureCallback, RetryPolicy,
    TaskQueue, Transport, TransportOptions, UreqTransport, WorkerPool, WorkerPoolConfig,
};
use crate::formatter::{Formatter, FormatterConfig, TelegramFormatter, is_valid_date_format};
use crate::handler::{
    DEFAULT_BOT_API, DestinationTarget, HandlerComponents, TelegramHandler, TelegramHandlerConfig,
};
use crate::identifier::{ChatId, TopicId};
use crate::level::Level;
use crate::topic::{
    AttributeProvider, AttributeRegistry, NamespaceLayout, SourceProvider, SourceTree,
    TopicResolver, TopicsLevel,
};

/// Errors that may occur while building a handler.
#[derive(Debug, Error)]
pub enum HandlerBuildError {
    /// Invalid user supplied configuration.
    #[error("invalid handler configuration: {0}")]
    InvalidConfig(String),
    /// Spawning workers or reading configuration failed.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Malformed configuration file.
    #[error("invalid configuration file: {0}")]
    Ini(String),
}

macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $value == 0 {
            Err(HandlerBuildError::InvalidConfig(format!(
                "{} must be greater than zero",
                $field
            )))
        } else {
            Ok($value)
        }
    }};
}

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        #[must_use]
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

/// Builder for constructing [`TelegramHandler`] instances.
#[derive(Clone, Default)]
pub struct TelegramHandlerBuilder {
    token: Option<String>,
    chat_id: Option<ChatId>,
    topic_id: Option<TopicId>,
    topics: TopicsLevel,
    level: Option<Level>,
    bubble: Option<bool>,
    bot_api: Option<String>,
    proxy: Option<String>,
    timeout_secs: Option<u64>,
    accept_invalid_certs: bool,
    queue_name: Option<String>,
    html: Option<bool>,
    format: Option<String>,
    date_format: Option<String>,
    separator: Option<String>,
    tags: Vec<String>,
    max_length: Option<usize>,
    retry: Option<RetryPolicy>,
    workers: Option<usize>,
    capacity: Option<usize>,
    layout: Option<NamespaceLayout>,
    component_namespace: Option<String>,
    source_root: Option<(PathBuf, String)>,
    attributes: Option<Arc<dyn AttributeProvider>>,
    sources: Option<Arc<dyn SourceProvider>>,
    context: Option<Arc<dyn ContextProvider>>,
    transport: Option<Arc<dyn Transport>>,
    queue: Option<Arc<dyn TaskQueue>>,
    formatter: Option<Arc<dyn Formatter>>,
    on_failure: Option<FailureCallback>,
}

impl TelegramHandlerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bot token (required).
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the default chat (required).
    #[must_use]
    pub fn with_chat_id(mut self, chat_id: impl Into<ChatId>) -> Self {
        self.chat_id = Some(chat_id.into());
        self
    }

    /// Set the default topic.
    #[must_use]
    pub fn with_topic_id(mut self, topic_id: impl Into<TopicId>) -> Self {
        self.topic_id = Some(topic_id.into());
        self
    }

    /// Table mapping declaration keys to topics.
    #[must_use]
    pub fn with_topics(mut self, topics: TopicsLevel) -> Self {
        self.topics = topics;
        self
    }

    option_setter!(
        #[doc = "Minimum level handled. Defaults to `Debug`."]
        with_level,
        level,
        Level
    );
    option_setter!(
        #[doc = "Whether handled records bubble to later handlers. Defaults to `true`."]
        with_bubble,
        bubble,
        bool
    );

    /// Bot API base URL, or a full custom endpoint.
    #[must_use]
    pub fn with_bot_api(mut self, bot_api: impl Into<String>) -> Self {
        self.bot_api = Some(bot_api.into());
        self
    }

    #[must_use]
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    option_setter!(
        #[doc = "Per-attempt timeout in seconds. Defaults to 5."]
        with_timeout_secs,
        timeout_secs,
        u64
    );

    /// Skip TLS certificate verification. Off by default.
    #[must_use]
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Deliver through the named queue instead of inline.
    #[must_use]
    pub fn with_queue_name(mut self, name: impl Into<String>) -> Self {
        self.queue_name = Some(name.into());
        self
    }

    option_setter!(
        #[doc = "Emit HTML markup. Defaults to `true`."]
        with_html,
        html,
        bool
    );

    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    #[must_use]
    pub fn with_date_format(mut self, date_format: impl Into<String>) -> Self {
        self.date_format = Some(date_format.into());
        self
    }

    #[must_use]
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = Some(separator.into());
        self
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    option_setter!(
        #[doc = "Message size limit in code points. Defaults to 4096."]
        with_max_length,
        max_length,
        usize
    );
    option_setter!(
        #[doc = "Retry policy for queued deliveries."]
        with_retry,
        retry,
        RetryPolicy
    );
    option_setter!(
        #[doc = "Worker threads of the default queue."]
        with_workers,
        workers,
        usize
    );
    option_setter!(
        #[doc = "Channel capacity of the default queue."]
        with_capacity,
        capacity,
        usize
    );
    option_setter!(
        #[doc = "Class layout used by console and job resolution."]
        with_layout,
        layout,
        NamespaceLayout
    );

    /// Root namespace of reactive components.
    #[must_use]
    pub fn with_component_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.component_namespace = Some(namespace.into());
        self
    }

    /// Scan sources under `root` (files `<Class>.<extension>`) when the
    /// attribute provider has nothing for a method.
    #[must_use]
    pub fn with_source_root(mut self, root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        self.source_root = Some((root.into(), extension.into()));
        self
    }

    #[must_use]
    pub fn with_attributes(mut self, attributes: Arc<dyn AttributeProvider>) -> Self {
        self.attributes = Some(attributes);
        self
    }

    #[must_use]
    pub fn with_registry(self, registry: AttributeRegistry) -> Self {
        self.with_attributes(Arc::new(registry))
    }

    /// Custom source provider; takes precedence over a source root.
    #[must_use]
    pub fn with_sources(mut self, sources: Arc<dyn SourceProvider>) -> Self {
        self.sources = Some(sources);
        self
    }

    /// Context provider. Defaults to [`ScopedContext`].
    #[must_use]
    pub fn with_context_provider(mut self, context: Arc<dyn ContextProvider>) -> Self {
        self.context = Some(context);
        self
    }

    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Custom queue; requires a queue name.
    #[must_use]
    pub fn with_queue(mut self, queue: Arc<dyn TaskQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Replace the message formatter entirely.
    #[must_use]
    pub fn with_formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Called for each queued delivery that exhausts its attempts.
    #[must_use]
    pub fn with_failure_callback(mut self, callback: FailureCallback) -> Self {
        self.on_failure = Some(callback);
        self
    }

    fn validate(&self) -> Result<(), HandlerBuildError> {
        self.validate_destination()?;
        self.validate_endpoint()?;
        self.validate_limits()?;
        self.validate_formatting()?;
        self.validate_queue()?;
        Ok(())
    }

    fn validate_destination(&self) -> Result<(), HandlerBuildError> {
        match &self.token {
            Some(token) if !token.trim().is_empty() => {}
            _ => {
                return Err(HandlerBuildError::InvalidConfig(
                    "Telegram handler requires a bot token".into(),
                ));
            }
        }
        match &self.chat_id {
            Some(ChatId::Text(chat)) if chat.trim().is_empty() => Err(
                HandlerBuildError::InvalidConfig("chat id must not be empty".into()),
            ),
            Some(_) => Ok(()),
            None => Err(HandlerBuildError::InvalidConfig(
                "Telegram handler requires a chat id".into(),
            )),
        }
    }

    fn validate_endpoint(&self) -> Result<(), HandlerBuildError> {
        if let Some(bot_api) = &self.bot_api {
            if bot_api.trim().is_empty() {
                return Err(HandlerBuildError::InvalidConfig(
                    "bot API URL must not be empty".into(),
                ));
            }
        }
        if let Some(proxy) = &self.proxy {
            ureq::Proxy::new(proxy).map_err(|err| {
                HandlerBuildError::InvalidConfig(format!("invalid proxy `{proxy}`: {err}"))
            })?;
        }
        if let Some(timeout) = self.timeout_secs {
            ensure_positive!(timeout, "timeout")?;
        }
        Ok(())
    }

    fn validate_limits(&self) -> Result<(), HandlerBuildError> {
        if let Some(max_length) = self.max_length {
            ensure_positive!(max_length, "max_length")?;
        }
        if let Some(retry) = self.retry {
            ensure_positive!(retry.max_attempts, "retry attempts")?;
        }
        if let Some(workers) = self.workers {
            ensure_positive!(workers, "workers")?;
        }
        if let Some(capacity) = self.capacity {
            ensure_positive!(capacity, "capacity")?;
        }
        Ok(())
    }

    fn validate_formatting(&self) -> Result<(), HandlerBuildError> {
        if let Some(date_format) = &self.date_format {
            if !is_valid_date_format(date_format) {
                return Err(HandlerBuildError::InvalidConfig(format!(
                    "invalid date format: {date_format}"
                )));
            }
        }
        match &self.separator {
            Some(separator) if separator.is_empty() => Err(HandlerBuildError::InvalidConfig(
                "separator must not be empty".into(),
            )),
            _ => Ok(()),
        }
    }

    fn validate_queue(&self) -> Result<(), HandlerBuildError> {
        match (&self.queue_name, &self.queue) {
            (Some(name), _) if name.trim().is_empty() => Err(HandlerBuildError::InvalidConfig(
                "queue name must not be empty".into(),
            )),
            (None, Some(_)) => Err(HandlerBuildError::InvalidConfig(
                "a custom queue requires a queue name".into(),
            )),
            _ => Ok(()),
        }
    }

    fn build_config(&self) -> TelegramHandlerConfig {
        let token = self.token.clone().unwrap_or_default();
        let chat_id = self.chat_id.clone().unwrap_or(ChatId::Int(0));
        let defaults = TelegramHandlerConfig::new(token.clone(), chat_id.clone());
        TelegramHandlerConfig {
            destination: DestinationTarget::new(token, chat_id).with_topic(self.topic_id.clone()),
            bot_api: self.bot_api.clone().unwrap_or_else(|| DEFAULT_BOT_API.to_string()),
            level: self.level.unwrap_or(defaults.level),
            bubble: self.bubble.unwrap_or(defaults.bubble),
            max_length: self.max_length.unwrap_or(defaults.max_length),
            transport: TransportOptions {
                proxy: self.proxy.clone(),
                timeout: self
                    .timeout_secs
                    .map_or(defaults.transport.timeout, Duration::from_secs),
                accept_invalid_certs: self.accept_invalid_certs,
            },
            retry: self.retry.unwrap_or(defaults.retry),
            queue_name: self.queue_name.clone(),
        }
    }

    fn build_formatter(&self, max_length: usize) -> Arc<dyn Formatter> {
        if let Some(formatter) = &self.formatter {
            return Arc::clone(formatter);
        }
        let defaults = FormatterConfig::default();
        Arc::new(TelegramFormatter::new(FormatterConfig {
            html: self.html.unwrap_or(defaults.html),
            format: self.format.clone().unwrap_or(defaults.format),
            date_format: self.date_format.clone().unwrap_or(defaults.date_format),
            separator: self.separator.clone().unwrap_or(defaults.separator),
            tags: self.tags.clone(),
            max_length,
        }))
    }

    fn build_resolver(&self) -> TopicResolver {
        let layout = self.layout.clone().unwrap_or_default();
        let attributes = self
            .attributes
            .clone()
            .unwrap_or_else(|| Arc::new(AttributeRegistry::new()));
        let mut resolver =
            TopicResolver::new(self.topics.clone(), attributes).with_layout(layout.clone());
        let sources = self.sources.clone().or_else(|| {
            self.source_root.as_ref().map(|(root, extension)| {
                Arc::new(SourceTree::new(root.clone(), extension.clone()).with_layout(layout))
                    as Arc<dyn SourceProvider>
            })
        });
        if let Some(sources) = sources {
            resolver = resolver.with_sources(sources);
        }
        if let Some(namespace) = &self.component_namespace {
            resolver = resolver.with_component_namespace(namespace.clone());
        }
        resolver
    }

    fn build_queue(
        &self,
        sender: &DeliverySender,
    ) -> Result<Option<Arc<dyn TaskQueue>>, HandlerBuildError> {
        let Some(name) = &self.queue_name else {
            return Ok(None);
        };
        if let Some(queue) = &self.queue {
            return Ok(Some(Arc::clone(queue)));
        }
        let mut config = WorkerPoolConfig::new(name.clone());
        config.workers = self.workers.unwrap_or(DEFAULT_WORKERS);
        config.capacity = self.capacity.unwrap_or(DEFAULT_CHANNEL_CAPACITY);
        config.on_failure = self.on_failure.clone();
        let pool = WorkerPool::spawn(config, sender.clone())?;
        Ok(Some(Arc::new(pool)))
    }

    /// Validate the options and assemble the handler.
    pub fn build(&self) -> Result<TelegramHandler, HandlerBuildError> {
        self.validate()?;
        let config = self.build_config();
        let sender = DeliverySender::new(
            self.transport
                .clone()
                .unwrap_or_else(|| Arc::new(UreqTransport)),
        );
        let components = HandlerComponents {
            formatter: self.build_formatter(config.max_length),
            resolver: self.build_resolver(),
            queue: self.build_queue(&sender)?,
            sender,
            context: self
                .context
                .clone()
                .unwrap_or_else(|| Arc::new(ScopedContext)),
        };
        Ok(TelegramHandler::new(config, components))
    }
}

impl fmt::Debug for TelegramHandlerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramHandlerBuilder")
            .field("chat_id", &self.chat_id)
            .field("topic_id", &self.topic_id)
            .field("topics", &self.topics.len())
            .field("level", &self.level)
            .field("bot_api", &self.bot_api)
            .field("queue_name", &self.queue_name)
            .finish_non_exhaustive()
    }
}
