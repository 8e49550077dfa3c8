//! Bridge from the `log` crate facade.
//!
//! [`TelegramLogger`] implements `log::Log`. It converts each `log::Record`
//! into a [`LogRecord`] and walks its handler stack in order, stopping at the
//! first handler that does not let the record bubble. Install it with
//! [`install_global_logger`].
//!
//! Records emitted by this crate or by the HTTP stack are ignored so that a
//! failing delivery can never log its way back into the pipeline.

use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, OnceLock};

use log::{Metadata, Record};

use crate::handler::Handler;
use crate::level::Level;
use crate::log_record::LogRecord;

/// Target prefixes never forwarded to handlers.
const INTERNAL_TARGETS: [&str; 4] = [env!("CARGO_CRATE_NAME"), "ureq", "rustls", "native_tls"];

fn is_internal_target(target: &str) -> bool {
    INTERNAL_TARGETS.iter().any(|prefix| {
        target
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
    })
}

fn normalise_target(target: &str) -> Cow<'_, str> {
    if target.contains("::") {
        Cow::Owned(target.replace("::", "."))
    } else {
        Cow::Borrowed(target)
    }
}

/// Ordered handler stack behind the `log` facade.
#[derive(Clone, Default)]
pub struct TelegramLogger {
    handlers: Vec<Arc<dyn Handler>>,
}

impl TelegramLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handler` to the bottom of the stack.
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn handlers(&self) -> &[Arc<dyn Handler>] {
        &self.handlers
    }

    /// Offer `record` to each handler until one stops bubbling.
    pub fn dispatch(&self, record: &LogRecord) {
        for handler in &self.handlers {
            if handler.handle(record) {
                break;
            }
        }
    }

    /// Convert a facade record. The channel is the target with `::`
    /// replaced by `.`; source location goes to `extra`.
    pub fn convert(record: &Record<'_>) -> LogRecord {
        let mut converted = LogRecord::new(
            &normalise_target(record.target()),
            Level::from(record.level()),
            &record.args().to_string(),
        );
        if let Some(module_path) = record.module_path() {
            converted = converted.with_extra("module_path", module_path);
        }
        if let Some(file) = record.file() {
            converted = converted.with_extra("file", file);
        }
        if let Some(line) = record.line() {
            converted = converted.with_extra("line", line);
        }
        converted
    }
}

impl log::Log for TelegramLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        if is_internal_target(metadata.target()) {
            return false;
        }
        let level = Level::from(metadata.level());
        self.handlers.iter().any(|handler| handler.is_handling(level))
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.dispatch(&Self::convert(record));
    }

    fn flush(&self) {
        for handler in &self.handlers {
            handler.flush();
        }
    }
}

impl fmt::Debug for TelegramLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramLogger")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

static GLOBAL_LOGGER: OnceLock<TelegramLogger> = OnceLock::new();

/// Install `logger` as the process-wide `log` backend.
///
/// Returns `false` when a logger was already installed, by this function
/// or otherwise.
pub fn install_global_logger(logger: TelegramLogger) -> bool {
    if GLOBAL_LOGGER.set(logger).is_err() {
        return false;
    }
    let Some(logger) = GLOBAL_LOGGER.get() else {
        return false;
    };
    if log::set_logger(logger).is_err() {
        return false;
    }
    log::set_max_level(log::LevelFilter::Trace);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Log;
    use parking_lot::Mutex;
    use rstest::rstest;

    #[derive(Default)]
    struct CollectingHandler {
        threshold: Level,
        swallow: bool,
        records: Mutex<Vec<LogRecord>>,
    }

    impl CollectingHandler {
        fn new(threshold: Level, swallow: bool) -> Arc<Self> {
            Arc::new(Self {
                threshold,
                swallow,
                records: Mutex::new(Vec::new()),
            })
        }

        fn collected(&self) -> Vec<LogRecord> {
            self.records.lock().clone()
        }
    }

    impl Handler for CollectingHandler {
        fn is_handling(&self, level: Level) -> bool {
            level >= self.threshold
        }

        fn handle(&self, record: &LogRecord) -> bool {
            if !self.is_handling(record.level) {
                return false;
            }
            self.records.lock().push(record.clone());
            self.swallow
        }
    }

    #[rstest]
    #[case("tglog", true)]
    #[case("tglog::handler", true)]
    #[case("ureq::unit", true)]
    #[case("native_tls", true)]
    #[case("tglogger", false)]
    #[case("app::orders", false)]
    fn filters_internal_targets(#[case] target: &str, #[case] internal: bool) {
        assert_eq!(is_internal_target(target), internal);
    }

    #[test]
    fn converts_facade_records() {
        let handler = CollectingHandler::new(Level::Debug, false);
        let logger = TelegramLogger::new().with_handler(handler.clone());
        logger.log(
            &Record::builder()
                .args(format_args!("order {} failed", 7))
                .level(log::Level::Warn)
                .target("shop::orders")
                .module_path(Some("shop::orders"))
                .file(Some("orders.rs"))
                .line(Some(42))
                .build(),
        );
        let records = handler.collected();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.channel, "shop.orders");
        assert_eq!(record.level, Level::Warning);
        assert_eq!(record.message, "order 7 failed");
        assert_eq!(record.extra["file"], "orders.rs");
        assert_eq!(record.extra["line"], 42);
    }

    #[test]
    fn non_bubbling_handler_stops_the_stack() {
        let first = CollectingHandler::new(Level::Error, true);
        let second = CollectingHandler::new(Level::Debug, false);
        let logger = TelegramLogger::new()
            .with_handler(first.clone())
            .with_handler(second.clone());

        logger.dispatch(&LogRecord::new("app", Level::Info, "below first threshold"));
        logger.dispatch(&LogRecord::new("app", Level::Error, "swallowed"));

        assert_eq!(first.collected().len(), 1);
        let seen: Vec<_> = second.collected().into_iter().map(|r| r.message).collect();
        assert_eq!(seen, ["below first threshold"]);
    }

    #[test]
    fn internal_records_are_not_dispatched() {
        let handler = CollectingHandler::new(Level::Debug, false);
        let logger = TelegramLogger::new().with_handler(handler.clone());
        logger.log(
            &Record::builder()
                .args(format_args!("delivery failed"))
                .level(log::Level::Error)
                .target("tglog::handler")
                .build(),
        );
        assert!(handler.collected().is_empty());
    }

    #[test]
    fn enabled_follows_handler_thresholds() {
        let logger = TelegramLogger::new().with_handler(CollectingHandler::new(Level::Warning, false));
        let info = Metadata::builder().level(log::Level::Info).target("app").build();
        let error = Metadata::builder().level(log::Level::Error).target("app").build();
        assert!(!logger.enabled(&info));
        assert!(logger.enabled(&error));
    }
}
