//! Case, shift, and on-call services.
//!
//! This crate sequences calls between the rules in [`casework`] and the
//! storage, directory, and notification ports. It owns three runtime concerns
//! the pure domain cannot: per-operation storage timeouts, the optimistic
//! retry loop around case transitions, and fire-and-forget notice dispatch.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Services contain no domain rules of their own;
//! every handle they use is injected at construction.

pub mod cases;
pub mod dispatch;
pub mod on_call;
pub mod shifts;

#[cfg(test)]
mod testing;

use std::future::Future;
use std::time::Duration;

use casework::CaseworkError;
use serde::Deserialize;

pub use cases::CaseService;
pub use dispatch::NoticeDispatcher;
pub use on_call::{OnCallService, OnCallSweep};
pub use shifts::ShiftService;

/// Runtime knobs shared by every service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorkflowSettings {
    /// Upper bound on any single storage call, in milliseconds.
    pub timeout_ms: u64,
    /// How many times a case transition is re-read and re-applied after a
    /// version conflict before the conflict is surfaced.
    pub max_transition_retries: u32,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 2_000,
            max_transition_retries: 3,
        }
    }
}

impl WorkflowSettings {
    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Runs one storage call under `timeout`.
///
/// An expired call surfaces as [`CaseworkError::Timeout`]; the storage adapters
/// only mutate after all their awaits, so an abandoned call has changed nothing.
pub(crate) async fn bounded<T, F>(
    timeout: Duration,
    operation: &'static str,
    call: F,
) -> Result<T, CaseworkError>
where
    F: Future<Output = Result<T, CaseworkError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                operation,
                timeout_ms = timeout.as_millis() as u64,
                "Storage call timed out"
            );
            Err(CaseworkError::Timeout {
                operation: operation.to_string(),
            })
        }
    }
}
