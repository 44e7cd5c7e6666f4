//! Live on-call resolution.
//!
//! [`resolve`] is pure: it decides a physician's state at an instant from that
//! physician's occurrences. Persisting the answer is a separate, explicit step
//! ([`crate::PhysicianDirectory::record_on_call`]) that keeps the newest
//! resolution when two race.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{LocalInstant, PhysicianId, ShiftOccurrence};

/// A physician's availability at an instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OnCallStatus {
    OnCall,
    UnScheduled,
}

impl std::fmt::Display for OnCallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::OnCall => "OnCall",
            Self::UnScheduled => "UnScheduled",
        })
    }
}

/// A resolved status together with the instant it was resolved for.
///
/// `resolved_at` orders competing writes: a record only replaces one with an
/// earlier or equal `resolved_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnCallRecord {
    pub status: OnCallStatus,
    pub resolved_at: LocalInstant,
}

impl OnCallRecord {
    /// Whether this record may replace `other`: it was resolved no earlier.
    pub fn supersedes(&self, other: &OnCallRecord) -> bool {
        self.resolved_at >= other.resolved_at
    }
}

/// Resolves `physician_id`'s status at `now`.
///
/// Only non-deleted occurrences dated on `now`'s local calendar day count;
/// both ends of the window are inclusive.
pub fn resolve(
    physician_id: PhysicianId,
    now: LocalInstant,
    occurrences: &[ShiftOccurrence],
) -> OnCallStatus {
    let today = now.date();
    let wall_clock: NaiveDateTime = now.naive();

    let on_call = occurrences
        .iter()
        .filter(|o| o.physician_id == physician_id && !o.is_deleted && o.shift_date == today)
        .any(|o| {
            let (start, end) = o.window.on(o.shift_date);
            start <= wall_clock && wall_clock <= end
        });

    if on_call {
        OnCallStatus::OnCall
    } else {
        OnCallStatus::UnScheduled
    }
}
