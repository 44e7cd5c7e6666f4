//! Error and retry-policy types for the case coordination domain.
//!
//! [`CaseworkError`] is the taxonomy every core operation reports. The one
//! deliberately separate kind is [`NotificationError`]: notification delivery is
//! best-effort, so its failures are logged by the dispatcher and never become a
//! transition failure.
//!
//! [`RetryPolicy`] is a cross-cutting concern: the workflow layer consults it to
//! decide whether an optimistic transition may be re-run against a fresh read.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ActionKind, CaseStatus, CaseTag, PermissionName};

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// ## Rules
///
/// - `Retryable` errors: version conflicts on a case write, storage timeouts,
///   transient notification delivery failures.
/// - `NonRetryable` errors: missing records, invalid transitions, denied
///   permissions, malformed input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt. `None` means retry
        /// immediately or apply the caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

impl RetryPolicy {
    /// Returns `true` for [`RetryPolicy::Retryable`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }
}

// ---------------------------------------------------------------------------
// Domain errors
// ---------------------------------------------------------------------------

/// The kind of record a [`CaseworkError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Case,
    Shift,
    Physician,
    Region,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Case => "case",
            Self::Shift => "shift",
            Self::Physician => "physician",
            Self::Region => "region",
        };
        f.write_str(name)
    }
}

/// Errors raised by the core.
///
/// Any error returned from a transition or a shift batch operation guarantees
/// that durable state is exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum CaseworkError {
    /// Input was malformed. Normally caught at the service boundary before the
    /// core is reached.
    #[error("Validation failed: {message}")]
    Validation {
        /// Description of the offending input.
        message: String,
    },

    /// The caller presented no credential or one the auth gateway rejected.
    #[error("Caller could not be authenticated")]
    Unauthenticated,

    /// A referenced case, shift, physician, or region does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// What kind of record was looked up.
        entity: EntityKind,
        /// The identifier that failed to resolve, rendered as text.
        id: String,
    },

    /// The action's precondition does not hold for the case's current state.
    ///
    /// The case is left unmodified.
    #[error("Cannot {action} a case in ({tag}, {status})")]
    InvalidTransition {
        /// The rejected action.
        action: ActionKind,
        /// The case's tag when the action was evaluated.
        tag: CaseTag,
        /// The case's status when the action was evaluated.
        status: CaseStatus,
    },

    /// A concurrent writer changed the record first, or a uniqueness
    /// constraint (confirmation number) would be violated.
    #[error("Conflict: {reason}")]
    Conflict {
        /// Description of the conflicting condition.
        reason: String,
    },

    /// The caller lacks the named permission. Produced from the auth gateway's
    /// answer, never decided by the core itself.
    #[error("Permission denied: {permission}")]
    PermissionDenied {
        /// The permission that was required.
        permission: PermissionName,
    },

    /// A storage operation exceeded its allotted time.
    #[error("Storage operation '{operation}' timed out")]
    Timeout {
        /// Name of the storage operation that expired.
        operation: String,
    },
}

impl CaseworkError {
    /// Shorthand for a [`CaseworkError::NotFound`].
    pub fn not_found(entity: EntityKind, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for a [`CaseworkError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Whether the failed operation may be re-run.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Conflict { .. } | Self::Timeout { .. } => RetryPolicy::Retryable { after: None },
            _ => RetryPolicy::NonRetryable,
        }
    }

    /// Stable, machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::Unauthenticated => "unauthenticated",
            Self::NotFound { .. } => "not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Conflict { .. } => "conflict",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::Timeout { .. } => "timeout",
        }
    }
}

// ---------------------------------------------------------------------------
// Notification errors
// ---------------------------------------------------------------------------

/// Failure to deliver a notice through the notification gateway.
///
/// Non-fatal: the dispatcher logs it together with its [`RetryPolicy`] and the
/// triggering transition stands.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NotificationError {
    /// The downstream endpoint answered with a non-success status.
    #[error("Notification rejected with status {status}: {message}")]
    Rejected {
        /// HTTP (or equivalent) status code returned by the endpoint.
        status: u16,
        /// Body or reason returned by the endpoint.
        message: String,
    },

    /// The request could not be sent at all.
    #[error("Notification transport failed: {message}")]
    Transport {
        /// Underlying transport error text.
        message: String,
    },

    /// The recipient has no deliverable address.
    #[error("No address for notice recipient: {recipient}")]
    Unaddressable {
        /// Rendered recipient.
        recipient: String,
    },
}

impl NotificationError {
    /// Whether a later redelivery could succeed.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Rejected { status, .. } if *status == 429 || *status >= 500 => {
                RetryPolicy::Retryable { after: None }
            }
            Self::Transport { .. } => RetryPolicy::Retryable { after: None },
            _ => RetryPolicy::NonRetryable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_and_timeout_are_retryable() {
        let conflict = CaseworkError::Conflict {
            reason: "version moved".into(),
        };
        let timeout = CaseworkError::Timeout {
            operation: "update_case".into(),
        };
        assert!(conflict.retry_policy().is_retryable());
        assert!(timeout.retry_policy().is_retryable());
    }

    #[test]
    fn test_invalid_transition_is_not_retryable() {
        let err = CaseworkError::InvalidTransition {
            action: ActionKind::Assign,
            tag: CaseTag::Active,
            status: CaseStatus::MdOnRoute,
        };
        assert_eq!(err.retry_policy(), RetryPolicy::NonRetryable);
        assert_eq!(err.to_string(), "Cannot assign a case in (Active, MDOnRoute)");
    }

    #[test]
    fn test_notification_server_errors_are_retryable() {
        let err = NotificationError::Rejected {
            status: 503,
            message: "unavailable".into(),
        };
        assert!(err.retry_policy().is_retryable());

        let err = NotificationError::Rejected {
            status: 400,
            message: "bad payload".into(),
        };
        assert!(!err.retry_policy().is_retryable());
    }
}
