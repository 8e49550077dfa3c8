//! Delivery of rendered messages to the Bot API.
//!
//! A [`DeliveryTask`] carries everything needed for one `sendMessage` call.
//! [`DeliverySender`] performs a single form-encoded POST through a
//! [`Transport`]; [`UreqTransport`] is the production transport and builds
//! a fresh agent per attempt.
//!
//! Deferred delivery goes through a [`TaskQueue`]. The in-process
//! [`WorkerPool`] consumes tasks on background threads and applies the
//! task's retry policy:
//!
//! - **2xx**: delivered.
//! - **Anything else** (non-2xx status, network or TLS failure): wait the
//!   fixed retry delay and try again until the attempts are used up.
//! - **Exhausted**: logged and passed to the failure callback, then dropped.
//!
//! Shutting the pool down interrupts pending retry waits.

mod config;
mod error;
mod sender;
mod task;
mod transport;
mod url_encoding;
mod worker;

pub use config::{
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY, DEFAULT_TIMEOUT,
    DEFAULT_WORKERS, RetryPolicy, TransportOptions,
};
pub use error::{DeliveryError, SubmitError};
pub use sender::DeliverySender;
pub use task::DeliveryTask;
pub use transport::{FORM_CONTENT_TYPE, Transport, UreqTransport};
pub use url_encoding::form_urlencode;
pub use worker::{FailureCallback, TaskQueue, WorkerPool, WorkerPoolConfig};
