use thiserror::Error;

/// Failure of a single delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Connection, timeout or I/O failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// The endpoint answered with a non-2xx status.
    #[error("endpoint returned status {0}")]
    Status(u16),
    /// The configured proxy URL was rejected.
    #[error("invalid proxy: {0}")]
    Proxy(String),
    /// The TLS connector could not be built.
    #[error("TLS setup failed: {0}")]
    Tls(String),
}

/// Reasons a task could not be handed to a queue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("delivery queue is full")]
    QueueFull,
    #[error("delivery queue is closed")]
    Closed,
    #[error("unknown delivery queue `{0}`")]
    UnknownQueue(String),
}
