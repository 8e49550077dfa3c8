//! Message formatting for Telegram delivery.
//!
//! Provides the [`Formatter`] trait and the [`TelegramFormatter`]
//! implementation. Records that carry an exception are rendered as an
//! exception report; all others are rendered through a placeholder template.
//! Output is always cut to the configured number of code points.

use std::{fmt, sync::Arc};

use crate::context::ExecutionContext;
use crate::log_record::LogRecord;

mod exception;
pub mod html;
mod line;

pub use exception::{REDACTED_INPUTS, TRACE_EXCERPT_LIMIT};
pub(crate) use line::is_valid_date_format;

/// Default message template.
pub const DEFAULT_MESSAGE_FORMAT: &str =
    "<b>%level_name%</b> (%channel%) [%date%]\n\n%message%\n\n%context%%extra%";
/// Default `chrono` pattern for `%date%`.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S %Z";
/// Default batch separator character.
pub const DEFAULT_SEPARATOR: &str = "-";
/// Number of times the separator is repeated between batch entries.
pub const SEPARATOR_REPEAT: usize = 15;
/// Telegram's `sendMessage` text limit.
pub const TELEGRAM_MESSAGE_SIZE: usize = 4096;

/// Trait for formatting log records into message text.
///
/// Implementors must be thread-safe (`Send + Sync`) so formatters can be
/// shared between the handler and the threads that log through it.
pub trait Formatter: Send + Sync {
    /// Format a single record. Must not panic or fail.
    fn format(&self, record: &LogRecord, ctx: &ExecutionContext) -> String;

    /// Format several records into one message.
    fn format_batch(&self, records: &[LogRecord], ctx: &ExecutionContext) -> String {
        records
            .iter()
            .map(|record| self.format(record, ctx))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Formatter for Arc<dyn Formatter> {
    fn format(&self, record: &LogRecord, ctx: &ExecutionContext) -> String {
        (**self).format(record, ctx)
    }

    fn format_batch(&self, records: &[LogRecord], ctx: &ExecutionContext) -> String {
        (**self).format_batch(records, ctx)
    }
}

/// Options for [`TelegramFormatter`].
#[derive(Clone, Debug)]
pub struct FormatterConfig {
    /// Emit HTML markup; when `false` all tags are stripped.
    pub html: bool,
    /// Template with `%level_name%`, `%channel%`, `%date%`, `%message%`,
    /// `%context%` and `%extra%` placeholders.
    pub format: String,
    pub date_format: String,
    pub separator: String,
    /// Tags listed in exception reports.
    pub tags: Vec<String>,
    /// Maximum message length in code points.
    pub max_length: usize,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            html: true,
            format: DEFAULT_MESSAGE_FORMAT.to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            separator: DEFAULT_SEPARATOR.to_string(),
            tags: Vec::new(),
            max_length: TELEGRAM_MESSAGE_SIZE,
        }
    }
}

impl FormatterConfig {
    /// Parse a comma separated tag list.
    pub fn parse_tags(tags: &str) -> Vec<String> {
        tags.split(',').map(|tag| tag.trim().to_string()).collect()
    }
}

#[derive(Clone, Debug, Default)]
pub struct TelegramFormatter {
    config: FormatterConfig,
}

impl TelegramFormatter {
    pub fn new(config: FormatterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FormatterConfig {
        &self.config
    }

    /// Render without truncation.
    fn render(&self, record: &LogRecord, ctx: &ExecutionContext) -> String {
        match record.exception() {
            Some(payload) => exception::render_report(
                record,
                payload,
                ctx,
                &exception::ReportOptions {
                    html: self.config.html,
                    tags: &self.config.tags,
                },
            ),
            None => line::render_line(
                record,
                &self.config.format,
                &self.config.date_format,
                self.config.html,
            ),
        }
    }

    fn batch_separator(&self) -> String {
        let mut separator = self.config.separator.repeat(SEPARATOR_REPEAT);
        separator.push('\n');
        separator
    }
}

impl Formatter for TelegramFormatter {
    fn format(&self, record: &LogRecord, ctx: &ExecutionContext) -> String {
        let rendered = self.render(record, ctx);
        html::truncate_chars(&rendered, self.config.max_length).to_string()
    }

    /// Join individual renders with the separator line.
    ///
    /// The joined text is not truncated again; callers delivering a batch
    /// apply the size limit to the result.
    fn format_batch(&self, records: &[LogRecord], ctx: &ExecutionContext) -> String {
        records
            .iter()
            .map(|record| self.format(record, ctx))
            .collect::<Vec<_>>()
            .join(&self.batch_separator())
    }
}

impl fmt::Display for TelegramFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TelegramFormatter(html={}, max_length={})",
            self.config.html, self.config.max_length
        )
    }
}

#[cfg(test)]
mod tests {
    //! Tests for formatter implementations.

    use super::*;
    use crate::context::RequestSnapshot;
    use crate::exception::ExceptionPayload;
    use crate::level::Level;
    use static_assertions::assert_impl_all;

    #[test]
    fn formatter_is_send_sync() {
        assert_impl_all!(TelegramFormatter: Send, Sync);
        assert_impl_all!(Arc<dyn Formatter>: Send, Sync);
    }

    #[test]
    fn exception_records_use_report() {
        let formatter = TelegramFormatter::default();
        let record = LogRecord::new("app", Level::Error, "ignored")
            .with_exception(ExceptionPayload::new("QueryException", "deadlock"));
        let out = formatter.format(&record, &ExecutionContext::default());
        assert!(out.contains("<b>Exception:</b> QueryException"));
        assert!(!out.contains("ignored"));
    }

    #[test]
    fn output_is_truncated_to_limit() {
        let formatter = TelegramFormatter::new(FormatterConfig {
            max_length: 10,
            format: "%message%".into(),
            ..FormatterConfig::default()
        });
        let record = LogRecord::new("app", Level::Info, "ééééééééééééééé");
        let out = formatter.format(&record, &ExecutionContext::default());
        assert_eq!(out.chars().count(), 10);
    }

    #[test]
    fn batch_joins_with_separator_line() {
        let formatter = TelegramFormatter::new(FormatterConfig {
            format: "%message%".into(),
            separator: "=".into(),
            ..FormatterConfig::default()
        });
        let ctx = ExecutionContext::default();
        let records = [
            LogRecord::new("app", Level::Info, "one"),
            LogRecord::new("app", Level::Info, "two"),
        ];
        assert_eq!(
            formatter.format_batch(&records, &ctx),
            format!("one{}\ntwo", "=".repeat(15))
        );
        assert_eq!(formatter.format_batch(&records[..1], &ctx), "one");
        assert_eq!(formatter.format_batch(&[], &ctx), "");
    }

    #[test]
    fn request_details_appear_in_report() {
        let formatter = TelegramFormatter::new(FormatterConfig {
            tags: FormatterConfig::parse_tags("shop, api"),
            ..FormatterConfig::default()
        });
        let ctx = ExecutionContext::default().with_request(
            RequestSnapshot::new("POST", "https://shop.test/orders%20new")
                .with_client_ip("10.0.0.1")
                .with_user("7", "Ada")
                .with_header("Referer", "https://shop.test/cart")
                .with_input("sku", "A-1")
                .with_input("password", "secret")
                .ajax(true),
        );
        let record = LogRecord::new("app", Level::Error, "x")
            .with_exception(ExceptionPayload::new("E", "m").with_status_code(500));
        let out = formatter.format(&record, &ctx);
        assert!(out.contains("<b>Tags:</b> #shop #api \n"));
        assert!(out.contains("<b>Code:</b> 500\n"));
        assert!(out.contains("<b>Url:</b> https://shop.test/orders new"));
        assert!(out.contains("<b>Ip:</b> 10.0.0.1"));
        assert!(out.contains("<b>User:</b> 7 / <b>Name:</b> Ada"));
        assert!(out.contains("<b>Referer:</b> https://shop.test/cart"));
        assert!(out.contains("<b>Request Method:</b> POST <b>(Ajax)</b> "));
        assert!(out.contains("<pre>{\"sku\":\"A-1\"}</pre>"));
        assert!(!out.contains("secret"));
    }
}
