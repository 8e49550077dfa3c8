//! Building handlers from INI configuration files.

mod test_utils;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use rstest::rstest;
use tempfile::NamedTempFile;
use tglog::{
    ExecutionContext, Handler, HandlerBuildError, Identifier, Level, LogRecord,
    TelegramHandlerBuilder,
};

use test_utils::RecordingTransport;

fn ini_file(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(bytes).expect("write config");
    file
}

const FULL_CONFIG: &str = r"
[telegram]
token = 123:abc
chat_id = -1001234
topic_id = 5
level = warning
bubble = false
bot_api = https://api.telegram.org/bot
timeout = 9
queue = alerts
retry_attempts = 3
retry_delay = 30
max_length = 2000
tags = shop, api

[telegram.topics]
App\Attributes\CriticalTopic = 12
App\Attributes\BillingTopic = billing
";

#[test]
fn full_section_configures_the_handler() {
    let file = ini_file(FULL_CONFIG.as_bytes());
    let handler = TelegramHandlerBuilder::from_ini_file(file.path(), "telegram", None)
        .expect("parse")
        .build()
        .expect("build");

    let config = handler.config();
    assert_eq!(config.level, Level::Warning);
    assert!(!config.bubble);
    assert_eq!(config.max_length, 2000);
    assert_eq!(config.transport.timeout, Duration::from_secs(9));
    assert_eq!(config.retry.max_attempts, 3);
    assert_eq!(config.retry.delay, Duration::from_secs(30));
    assert_eq!(config.queue_name.as_deref(), Some("alerts"));
    assert!(handler.is_queued());

    let destination = handler.destination();
    assert_eq!(destination.token, "123:abc");
    assert_eq!(destination.chat_id, Identifier::Int(-1001234));
    assert_eq!(destination.topic_id, Some(Identifier::Int(5)));

    let topics = handler.resolver().topics();
    assert_eq!(topics.len(), 2);
    assert_eq!(
        topics.get("App\\Attributes\\BillingTopic"),
        Some(&Identifier::Text("billing".into()))
    );
}

#[test]
fn legacy_encoded_file_is_decoded() {
    // "@канал" encoded as windows-1251.
    let mut bytes = b"[tg]\ntoken = t\nchat_id = @".to_vec();
    bytes.extend_from_slice(&[0xEA, 0xE0, 0xED, 0xE0, 0xEB]);
    bytes.push(b'\n');
    let file = ini_file(&bytes);

    let handler = TelegramHandlerBuilder::from_ini_file(file.path(), "tg", Some("windows-1251"))
        .expect("parse")
        .build()
        .expect("build");
    assert_eq!(
        handler.destination().chat_id,
        Identifier::Text("@канал".into())
    );
}

#[rstest]
#[case::empty_file(b"".as_slice(), "tg", "empty file")]
#[case::missing_section(b"[other]\ntoken = t\n".as_slice(), "tg", "missing section")]
#[case::bad_level(b"[tg]\nlevel = loud\n".as_slice(), "tg", "level")]
#[case::bad_number(b"[tg]\ntimeout = soon\n".as_slice(), "tg", "timeout")]
fn malformed_files_are_rejected(
    #[case] contents: &[u8],
    #[case] section: &str,
    #[case] expected: &str,
) {
    let file = ini_file(contents);
    let err = TelegramHandlerBuilder::from_ini_file(file.path(), section, None)
        .expect_err("rejected");
    assert!(matches!(err, HandlerBuildError::Ini(_)));
    assert!(err.to_string().contains(expected), "{err}");
}

#[test]
fn missing_file_is_reported() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = TelegramHandlerBuilder::from_ini_file(dir.path().join("absent.ini"), "tg", None)
        .expect_err("missing");
    assert!(err.to_string().contains("doesn't exist"));
}

#[test]
fn parsed_options_are_still_validated() {
    let err = TelegramHandlerBuilder::from_ini_str("[tg]\ntoken = t\nchat_id = 1\nworkers = 0\n", "tg")
        .expect("parse")
        .build()
        .expect_err("zero workers");
    assert!(matches!(err, HandlerBuildError::InvalidConfig(_)));
}

#[test]
fn unknown_date_specifier_is_rejected_at_build() {
    let err = TelegramHandlerBuilder::from_ini_str(
        "[tg]\ntoken = t\nchat_id = 1\ndate_format = %d %Q\n",
        "tg",
    )
    .expect("parse")
    .build()
    .expect_err("bad date format");
    assert!(err.to_string().contains("invalid date format"), "{err}");
}

#[test]
fn format_options_reach_the_formatter() {
    let transport = RecordingTransport::ok();
    let handler = TelegramHandlerBuilder::from_ini_str(
        "[tg]\ntoken = t\nchat_id = 1\nparse_mode = none\nformat = <b>%level_name%</b>\\n%message%\n",
        "tg",
    )
    .expect("parse")
    .with_transport(transport.clone())
    .with_context_provider(Arc::new(ExecutionContext::default()))
    .build()
    .expect("build");
    assert!(!handler.is_queued());

    handler.handle(&LogRecord::new("app", Level::Error, "boom"));
    assert_eq!(transport.single().field("text"), Some("ERROR\nboom"));
}
