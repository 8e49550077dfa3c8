//! Loading handler options from INI files.
//!
//! A section holds the handler options; an optional `<section>.topics`
//! section holds the topics-level table in file order:
//!
//! ```ini
//! [telegram]
//! token = 123:abc
//! chat_id = -1001234
//! level = error
//! queue = telegram
//! tags = shop, api
//!
//! [telegram.topics]
//! App\Attributes\CriticalTopic = 12
//! App\Attributes\BillingTopic = 34
//! ```
//!
//! Backslash escapes are disabled so namespaced keys survive as written.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use encoding_rs::{Encoding, UTF_8};
use ini::{Ini, ParseOption, Properties};

use crate::builder::{HandlerBuildError, TelegramHandlerBuilder};
use crate::delivery::RetryPolicy;
use crate::formatter::FormatterConfig;
use crate::identifier::Identifier;
use crate::level::Level;
use crate::topic::TopicsLevel;

impl TelegramHandlerBuilder {
    /// Read options for `section` from the INI file at `path`.
    ///
    /// `encoding` is a WHATWG label such as `windows-1251`; UTF-8 is
    /// assumed when it is `None`.
    pub fn from_ini_file(
        path: impl AsRef<Path>,
        section: &str,
        encoding: Option<&str>,
    ) -> Result<Self, HandlerBuildError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => HandlerBuildError::Ini(format!(
                "{} doesn't exist",
                path.display()
            )),
            _ => HandlerBuildError::Io(err),
        })?;
        if bytes.is_empty() {
            return Err(HandlerBuildError::Ini(format!(
                "{} is an empty file",
                path.display()
            )));
        }
        let text = decode_contents(&bytes, encoding)?;
        Self::from_ini_str(&text, section)
    }

    /// Read options for `section` from INI text.
    pub fn from_ini_str(text: &str, section: &str) -> Result<Self, HandlerBuildError> {
        let ini = Ini::load_from_str_opt(
            text,
            ParseOption {
                enabled_escape: false,
                ..ParseOption::default()
            },
        )
        .map_err(|err| HandlerBuildError::Ini(err.to_string()))?;
        let props = ini
            .section(Some(section))
            .ok_or_else(|| HandlerBuildError::Ini(format!("missing section [{section}]")))?;
        let mut builder = apply_options(Self::new(), props)?;
        if let Some(topics) = ini.section(Some(format!("{section}.topics"))) {
            builder = builder.with_topics(parse_topics(topics)?);
        }
        Ok(builder)
    }
}

fn decode_contents(bytes: &[u8], encoding: Option<&str>) -> Result<String, HandlerBuildError> {
    let encoding = match encoding {
        Some(label) => Encoding::for_label(label.trim().to_ascii_lowercase().as_bytes())
            .ok_or_else(|| HandlerBuildError::Ini(format!("unknown encoding {label}")))?,
        None => UTF_8,
    };
    let (decoded, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(HandlerBuildError::Ini(format!(
            "file is not valid {}",
            encoding.name()
        )));
    }
    Ok(decoded.into_owned())
}

fn invalid(key: &str, value: &str) -> HandlerBuildError {
    HandlerBuildError::Ini(format!("invalid value for `{key}`: {value:?}"))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, HandlerBuildError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, HandlerBuildError> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

fn parse_identifier(key: &str, value: &str) -> Result<Identifier, HandlerBuildError> {
    Identifier::parse(value).ok_or_else(|| invalid(key, value))
}

fn apply_options(
    mut builder: TelegramHandlerBuilder,
    props: &Properties,
) -> Result<TelegramHandlerBuilder, HandlerBuildError> {
    let mut retry = RetryPolicy::default();
    let mut retry_set = false;
    let mut source_root = None;
    let mut source_extension = "php".to_string();
    for (key, value) in props.iter() {
        builder = match key {
            "token" => builder.with_token(value.trim()),
            "chat_id" => builder.with_chat_id(parse_identifier(key, value)?),
            "topic_id" => builder.with_topic_id(parse_identifier(key, value)?),
            "level" => builder.with_level(
                value
                    .parse::<Level>()
                    .map_err(|_| invalid(key, value))?,
            ),
            "bubble" => builder.with_bubble(parse_bool(key, value)?),
            "bot_api" => builder.with_bot_api(value.trim()),
            "proxy" => builder.with_proxy(value.trim()),
            "timeout" => builder.with_timeout_secs(parse_number(key, value)?),
            "accept_invalid_certs" => builder.accept_invalid_certs(parse_bool(key, value)?),
            "queue" => builder.with_queue_name(value.trim()),
            "html" | "parse_mode" => builder.with_html(html_flag(key, value)?),
            "format" => builder.with_format(value.replace("\\n", "\n")),
            "date_format" => builder.with_date_format(value),
            "separator" => builder.with_separator(value),
            "tags" => builder.with_tags(FormatterConfig::parse_tags(value)),
            "max_length" => builder.with_max_length(parse_number(key, value)?),
            "workers" => builder.with_workers(parse_number(key, value)?),
            "capacity" => builder.with_capacity(parse_number(key, value)?),
            "component_namespace" => builder.with_component_namespace(value.trim()),
            "retry_attempts" => {
                retry.max_attempts = parse_number(key, value)?;
                retry_set = true;
                builder
            }
            "retry_delay" => {
                retry.delay = Duration::from_secs(parse_number(key, value)?);
                retry_set = true;
                builder
            }
            "source_root" => {
                source_root = Some(value.trim().to_string());
                builder
            }
            "source_extension" => {
                source_extension = value.trim().to_string();
                builder
            }
            _ => {
                return Err(HandlerBuildError::Ini(format!("unknown option `{key}`")));
            }
        };
    }
    if retry_set {
        builder = builder.with_retry(retry);
    }
    if let Some(root) = source_root {
        builder = builder.with_source_root(root, source_extension);
    }
    Ok(builder)
}

/// `html = true|false`, or `parse_mode = html|none`.
fn html_flag(key: &str, value: &str) -> Result<bool, HandlerBuildError> {
    if key == "parse_mode" {
        return match value.trim().to_ascii_lowercase().as_str() {
            "html" => Ok(true),
            "" | "none" | "text" => Ok(false),
            _ => Err(invalid(key, value)),
        };
    }
    parse_bool(key, value)
}

fn parse_topics(props: &Properties) -> Result<TopicsLevel, HandlerBuildError> {
    props
        .iter()
        .map(|(key, value)| -> Result<(String, Identifier), HandlerBuildError> {
            Ok((key.trim().to_string(), parse_identifier(key, value)?))
        })
        .collect()
}
