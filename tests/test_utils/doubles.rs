//! In-process stand-ins for the transport and the task queue.
//!
//! [`RecordingTransport`] captures every form POST and answers from a script
//! of responses; [`CollectingQueue`] keeps submitted tasks so tests can
//! inspect what the handler would have delivered later.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use percent_encoding::percent_decode_str;
use tglog::{DeliveryError, DeliveryTask, SubmitError, TaskQueue, Transport, TransportOptions};

/// A captured `post_form` call with its body decoded.
#[derive(Clone, Debug)]
pub struct SentRequest {
    pub url: String,
    pub body: String,
    pub fields: BTreeMap<String, String>,
    pub options: TransportOptions,
}

impl SentRequest {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Decode an `application/x-www-form-urlencoded` body.
pub fn decode_form(body: &str) -> BTreeMap<String, String> {
    body.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(text: &str) -> String {
    percent_decode_str(&text.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}

/// Transport that records requests instead of sending them.
///
/// Responses are taken from the script in order; once it runs out every
/// request answers `200`.
#[derive(Default)]
pub struct RecordingTransport {
    responses: Mutex<VecDeque<Result<u16, DeliveryError>>>,
    requests: Mutex<Vec<SentRequest>>,
}

impl RecordingTransport {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn scripted(responses: impl IntoIterator<Item = Result<u16, DeliveryError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<SentRequest> {
        self.requests.lock().clone()
    }

    pub fn single(&self) -> SentRequest {
        let requests = self.requests();
        assert_eq!(requests.len(), 1, "expected exactly one request");
        requests.into_iter().next().expect("one request")
    }
}

impl Transport for RecordingTransport {
    fn post_form(
        &self,
        url: &str,
        body: &str,
        options: &TransportOptions,
    ) -> Result<u16, DeliveryError> {
        self.requests.lock().push(SentRequest {
            url: url.to_string(),
            body: body.to_string(),
            fields: decode_form(body),
            options: options.clone(),
        });
        self.responses.lock().pop_front().unwrap_or(Ok(200))
    }
}

/// Queue that keeps submitted tasks in memory.
#[derive(Default)]
pub struct CollectingQueue {
    tasks: Mutex<Vec<(String, DeliveryTask)>>,
    reject: Option<SubmitError>,
}

impl CollectingQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A queue that refuses every submission with `err`.
    pub fn rejecting(err: SubmitError) -> Arc<Self> {
        Arc::new(Self {
            tasks: Mutex::new(Vec::new()),
            reject: Some(err),
        })
    }

    pub fn submitted(&self) -> Vec<(String, DeliveryTask)> {
        self.tasks.lock().clone()
    }
}

impl TaskQueue for CollectingQueue {
    fn submit(&self, task: DeliveryTask, queue: &str) -> Result<(), SubmitError> {
        if let Some(err) = &self.reject {
            return Err(err.clone());
        }
        self.tasks.lock().push((queue.to_string(), task));
        Ok(())
    }
}
