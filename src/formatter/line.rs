//! Rendering of ordinary (non-exception) records.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::format::{Item, StrftimeItems};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

use super::{DEFAULT_DATE_FORMAT, html};
use crate::log_record::LogRecord;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%(\w+)%").expect("valid placeholder pattern"));

/// Render a key/value map as compact JSON.
///
/// Returns `None` for an empty map so the caller can drop the section.
pub(super) fn stringify(values: &BTreeMap<String, Value>) -> Option<String> {
    if values.is_empty() {
        return None;
    }
    match serde_json::to_string(values) {
        Ok(text) => Some(text),
        Err(err) => {
            log::debug!("failed to stringify record values: {err}");
            None
        }
    }
}

/// Whether chrono understands every specifier in `pattern`.
pub(crate) fn is_valid_date_format(pattern: &str) -> bool {
    StrftimeItems::new(pattern).all(|item| !matches!(item, Item::Error))
}

/// Render the record timestamp, falling back to the default pattern when
/// `date_format` cannot be rendered.
fn render_date(record: &LogRecord, date_format: &str) -> String {
    let mut date = String::new();
    if write!(date, "{}", record.datetime.format(date_format)).is_ok() {
        return date;
    }
    log::debug!("unrenderable date format {date_format:?}; using the default");
    date.clear();
    if write!(date, "{}", record.datetime.format(DEFAULT_DATE_FORMAT)).is_err() {
        date.clear();
    }
    date
}

fn section(label: &str, values: &BTreeMap<String, Value>) -> String {
    stringify(values)
        .map(|text| format!("<b>{label}:</b> {text}\n"))
        .unwrap_or_default()
}

/// Substitute the template placeholders for `record`.
///
/// Placeholders are expanded in a single pass, so placeholder-like text
/// inside the message itself is left untouched. Unknown placeholders are
/// kept verbatim.
pub(super) fn render_line(
    record: &LogRecord,
    template: &str,
    date_format: &str,
    html_enabled: bool,
) -> String {
    let message = html::highlight_stack_trace(&record.message);
    let context = section("Context", &record.context.values);
    let extra = section("Extra", &record.extra);
    let date = render_date(record, date_format);

    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
        match &caps[1] {
            "level_name" => record.level.as_str().to_string(),
            "channel" => record.channel.clone(),
            "date" => date.clone(),
            "message" => message.clone(),
            "context" => context.clone(),
            "extra" => extra.clone(),
            _ => caps[0].to_string(),
        }
    });

    if html_enabled {
        rendered.into_owned()
    } else {
        html::strip_tags(&rendered)
    }
}
