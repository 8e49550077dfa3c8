//! Text helpers for Telegram's HTML parse mode.

use once_cell::sync::Lazy;
use regex::Regex;

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag pattern"));
static ANGLED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([^<]+)>").expect("valid angle bracket pattern"));
static STACK_TRACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^Stack trace:\n((?:^#\d.*\n?)*)$").expect("valid stack trace pattern")
});

/// Marker that identifies a message carrying a stack trace.
pub const STACK_TRACE_MARKER: &str = "Stack trace";

/// Escape the three characters Telegram's HTML mode requires.
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Remove every markup tag.
pub fn strip_tags(text: &str) -> String {
    TAG.replace_all(text, "").into_owned()
}

/// Escape bracketed segments and wrap the trace block in `<code>`.
///
/// Messages without [`STACK_TRACE_MARKER`] are returned unchanged.
pub fn highlight_stack_trace(message: &str) -> String {
    if !message.contains(STACK_TRACE_MARKER) {
        return message.to_string();
    }
    let escaped = ANGLED.replace_all(message, "&lt;${1}&gt;");
    STACK_TRACE
        .replace_all(&escaped, "\n<b>Stack trace:</b>\n<code>${1}</code>")
        .into_owned()
}

/// Truncate to at most `limit` Unicode code points.
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
