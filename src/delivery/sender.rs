use std::fmt;
use std::sync::Arc;

use super::{DeliveryError, DeliveryTask, Transport, UreqTransport};

/// Performs single delivery attempts.
///
/// The sender holds no per-task state; retrying is up to the caller.
#[derive(Clone)]
pub struct DeliverySender {
    transport: Arc<dyn Transport>,
}

impl DeliverySender {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// POST `task` once. Any non-2xx status is an error.
    pub fn send(&self, task: &DeliveryTask) -> Result<(), DeliveryError> {
        let status = self
            .transport
            .post_form(&task.url, &task.form_body(), &task.options)?;
        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(DeliveryError::Status(status))
        }
    }
}

impl Default for DeliverySender {
    fn default() -> Self {
        Self::new(Arc::new(UreqTransport))
    }
}

impl fmt::Debug for DeliverySender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliverySender").finish_non_exhaustive()
    }
}
