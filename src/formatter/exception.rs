//! Exception report rendering.
//!
//! Reports combine the exception itself with whatever the current request
//! reveals about how it was triggered. Composition is best effort: if any
//! section fails, the text built so far is returned.

use std::fmt::{self, Write as _};

use percent_encoding::percent_decode_str;
use serde_json::{Map, Value};

use super::html;
use crate::context::{ExecutionContext, RequestSnapshot};
use crate::exception::{ExceptionPayload, severity_name};
use crate::log_record::LogRecord;

/// Input keys never included in the request dump.
pub const REDACTED_INPUTS: [&str; 2] = ["password", "password_confirmation"];
/// Maximum number of trace characters included in a report.
pub const TRACE_EXCERPT_LIMIT: usize = 1000;
/// Marker in exception messages raised by a failed delivery.
const DELIVERY_FAILURE_MARKER: &str = "Telegram";

pub(super) struct ReportOptions<'a> {
    pub html: bool,
    pub tags: &'a [String],
}

/// Render the exception report; never fails.
pub(super) fn render_report(
    record: &LogRecord,
    exception: &ExceptionPayload,
    ctx: &ExecutionContext,
    options: &ReportOptions<'_>,
) -> String {
    let mut out = String::new();
    if let Err(err) = write_report(&mut out, record, exception, ctx, options) {
        log::debug!("exception report truncated after formatting error: {err}");
    }
    if options.html {
        out
    } else {
        html::strip_tags(&out)
    }
}

fn write_report(
    out: &mut String,
    record: &LogRecord,
    exception: &ExceptionPayload,
    ctx: &ExecutionContext,
    options: &ReportOptions<'_>,
) -> fmt::Result {
    let text = |value: &str| -> String {
        if options.html {
            html::escape(value)
        } else {
            value.to_string()
        }
    };

    let severity = exception.severity.map(severity_name).unwrap_or_default();
    if !severity.is_empty() {
        write!(out, "{severity} ")?;
    }
    writeln!(
        out,
        "<b>Time: </b> {}",
        record.datetime.format("%Y-%m-%d %H:%M:%S")
    )?;
    writeln!(out, "<b>On: </b> {}", text(&ctx.environment))?;
    writeln!(out, "<b>Message:</b> {}", text(&exception.message))?;
    writeln!(out, "<b>Exception:</b> {}", text(&exception.type_name))?;
    writeln!(out, "<b>Code:</b> {}", exception.display_code())?;
    writeln!(out, "<b>Tags:</b> {}", render_tags(options.tags))?;
    writeln!(out, "<b>File:</b> {}", text(&exception.file))?;
    write!(out, "<b>Line:</b> {}", exception.line)?;

    if let Some(request) = &ctx.request {
        write_request_origin(out, request, &text)?;
    }

    if let Some(chat_id) = failed_delivery_chat_id(exception) {
        write!(out, "\n<b>Chat Id: </b> {chat_id}")?;
    }

    if let Some(request) = &ctx.request {
        write_request_details(out, request, &text)?;
    }

    let trace = exception.trace_as_string();
    let excerpt = html::truncate_chars(&trace, TRACE_EXCERPT_LIMIT);
    write!(
        out,
        "\n\n<b>Trace: </b> \n<b> => </b> => {} ...",
        text(excerpt)
    )
}

fn write_request_origin(
    out: &mut String,
    request: &RequestSnapshot,
    text: &impl Fn(&str) -> String,
) -> fmt::Result {
    let url = decode_url(&request.url);
    write!(out, "\n<b>Url:</b> {}", text(&url))?;
    write!(
        out,
        "\n<b>Ip:</b> {}",
        request.client_ip.as_deref().unwrap_or_default()
    )
}

/// Decode a query-string style URL, where `+` stands for a space.
fn decode_url(url: &str) -> String {
    percent_decode_str(&url.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}

fn write_request_details(
    out: &mut String,
    request: &RequestSnapshot,
    text: &impl Fn(&str) -> String,
) -> fmt::Result {
    if let Some(user) = &request.user {
        write!(
            out,
            "\n<b>User:</b> {} / <b>Name:</b> {}",
            text(&user.id),
            text(&user.name)
        )?;
    }

    if let Some(referer) = request.header("referer").filter(|r| !r.is_empty()) {
        write!(out, "\n<b>Referer:</b> {}", text(referer))?;
    }

    if !request.method.is_empty() {
        write!(out, "\n<b>Request Method:</b> {}", request.method)?;
        if request.ajax {
            out.push_str(" <b>(Ajax)</b> ");
        }
    }

    let inputs = redacted_inputs(&request.inputs)?;
    write!(out, "\n<b>Request Inputs:</b> <pre>{}</pre>", text(&inputs))
}

/// Compact JSON of the request inputs without credential fields.
///
/// Newlines and spaces are removed from the dump.
pub(super) fn redacted_inputs(inputs: &Map<String, Value>) -> Result<String, fmt::Error> {
    let visible: Map<String, Value> = inputs
        .iter()
        .filter(|(key, _)| !REDACTED_INPUTS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    let json = serde_json::to_string(&visible).map_err(|_| fmt::Error)?;
    Ok(json.replace(['\n', ' '], ""))
}

fn render_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|tag| tag.trim())
        .filter(|tag| !tag.is_empty())
        .fold(String::new(), |mut acc, tag| {
            acc.push('#');
            acc.push_str(tag);
            acc.push(' ');
            acc
        })
}

/// Chat id of a previous failed delivery found in the exception's trace.
///
/// Only consulted when the message mentions the delivery endpoint; the
/// request options of the failing call are the second argument of the
/// second frame.
fn failed_delivery_chat_id(exception: &ExceptionPayload) -> Option<String> {
    if !exception.message.contains(DELIVERY_FAILURE_MARKER) {
        return None;
    }
    let options = exception.frames.get(1)?.args.get(1)?;
    match options.get("chat_id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}
