#![allow(dead_code)]

pub mod doubles;
pub mod mock_server;

pub use doubles::{CollectingQueue, RecordingTransport, SentRequest};
pub use mock_server::{CapturedRequest, spawn_mock_server, spawn_retry_server};
