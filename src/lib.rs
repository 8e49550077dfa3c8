//! Log handler that delivers records to Telegram chats.
//!
//! Each record is routed to a chat topic declared for the code that emitted
//! it (a controller action, component method, console command or queued
//! job), rendered into bounded HTML and posted to the Bot API, either inline
//! or through a named queue with fixed-delay retries.
//!
//! ```rust,no_run
//! use tglog::{Handler, Level, LogRecord, TelegramHandlerBuilder, TopicsLevel};
//!
//! let handler = TelegramHandlerBuilder::new()
//!     .with_token("123:abc")
//!     .with_chat_id(-1001234_i64)
//!     .with_topics(TopicsLevel::new().with("App\\Attributes\\CriticalTopic", 12_i64))
//!     .with_level(Level::Error)
//!     .build()?;
//! handler.handle(&LogRecord::new("app", Level::Error, "payment gateway down"));
//! # Ok::<(), tglog::HandlerBuildError>(())
//! ```

pub mod builder;
pub mod context;
pub mod delivery;
pub mod exception;
mod file_config;
pub mod formatter;
pub mod handler;
pub mod identifier;
pub mod level;
#[cfg(feature = "log-compat")]
pub mod log_compat;
pub mod log_record;
pub mod rate_limited_warner;
pub mod topic;

pub use builder::{HandlerBuildError, TelegramHandlerBuilder};
pub use context::{ContextProvider, ExecutionContext, RequestSnapshot, RouteInfo, ScopedContext};
pub use delivery::{
    DeliveryError, DeliverySender, DeliveryTask, RetryPolicy, SubmitError, TaskQueue, Transport,
    TransportOptions, UreqTransport, WorkerPool,
};
pub use exception::{ExceptionPayload, StackFrame};
pub use formatter::{Formatter, FormatterConfig, TelegramFormatter};
pub use handler::{DestinationTarget, Handler, TelegramHandler, endpoint_url};
pub use identifier::{ChatId, Identifier, TopicId};
pub use level::Level;
#[cfg(feature = "log-compat")]
pub use log_compat::{TelegramLogger, install_global_logger};
pub use log_record::{LogRecord, RecordContext};
pub use topic::{AttributeRegistry, TopicResolver, TopicsLevel};
