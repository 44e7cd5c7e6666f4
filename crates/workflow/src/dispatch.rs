//! Fire-and-forget notice delivery.

use std::sync::Arc;

use casework::{Notice, NotificationGateway};
use tokio::task::JoinHandle;

/// Hands notices to the gateway on a background task.
///
/// The transition that produced the notices has already committed; delivery
/// failures are logged with their retry policy for the external retry
/// mechanism and go no further.
#[derive(Clone)]
pub struct NoticeDispatcher {
    gateway: Arc<dyn NotificationGateway>,
}

impl NoticeDispatcher {
    pub fn new(gateway: Arc<dyn NotificationGateway>) -> Self {
        Self { gateway }
    }

    /// Spawns delivery of `notices` and returns immediately.
    ///
    /// Returns `None` when there is nothing to send.
    pub fn dispatch(&self, notices: Vec<Notice>) -> Option<JoinHandle<()>> {
        if notices.is_empty() {
            return None;
        }

        let gateway = Arc::clone(&self.gateway);
        Some(tokio::spawn(async move {
            for notice in notices {
                if let Err(err) = gateway.send(&notice).await {
                    tracing::warn!(
                        notice_id = %notice.id,
                        kind = ?notice.kind,
                        recipient = %notice.recipient,
                        case_id = %notice.case_id,
                        retry = ?err.retry_policy(),
                        error = %err,
                        "Notice delivery failed"
                    );
                }
            }
        }))
    }
}
