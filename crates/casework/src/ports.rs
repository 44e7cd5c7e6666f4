//! Port traits implemented by infrastructure crates.
//!
//! Storage handles are passed explicitly into every workflow service; there is
//! no process-wide connection. Each storage method is one atomic unit: it
//! either applies completely or leaves state untouched.

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{
    Case, CaseId, CaseIntake, CaseTag, CaseworkError, ConfirmationPrefix, LocalInstant,
    NotificationError, Notice, OccurrenceDraft, OnCallRecord, PermissionName, PersonName,
    PhysicianId, RegionName, RoleId, ShiftId, ShiftOccurrence, Timestamp, UserId,
};

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Durable store of case records.
#[async_trait]
pub trait CaseRepository: Send + Sync {
    /// Inserts a new case in its initial state.
    ///
    /// The daily sequence is allocated here: the number of cases already
    /// created on `created_on`, plus one. Counting and inserting form one
    /// atomic unit across all concurrent creations, so no two cases created on
    /// the same day share a sequence. Fails with
    /// [`CaseworkError::Conflict`] if the completed confirmation number already
    /// exists.
    async fn insert_case(
        &self,
        intake: CaseIntake,
        prefix: ConfirmationPrefix,
        created_on: NaiveDate,
        created_at: Timestamp,
    ) -> Result<Case, CaseworkError>;

    /// Loads one case, archived or not.
    async fn find_case(&self, id: CaseId) -> Result<Option<Case>, CaseworkError>;

    /// Replaces the stored case if its version still equals `expected_version`.
    ///
    /// Returns the stored record with its version bumped. Fails with
    /// [`CaseworkError::Conflict`] when another writer got there first and with
    /// [`CaseworkError::NotFound`] when the case does not exist.
    async fn update_case(&self, case: Case, expected_version: u64) -> Result<Case, CaseworkError>;

    /// Number of non-archived cases per tag. Tags with no cases are included
    /// with a count of zero.
    async fn count_by_tag(&self) -> Result<Vec<(CaseTag, u64)>, CaseworkError>;
}

/// Durable store of shift occurrences.
#[async_trait]
pub trait ShiftRepository: Send + Sync {
    /// Inserts every draft or none.
    async fn insert_occurrences(
        &self,
        drafts: Vec<OccurrenceDraft>,
        created_at: Timestamp,
    ) -> Result<Vec<ShiftOccurrence>, CaseworkError>;

    /// Marks every listed occurrence approved, or none of them if any id is
    /// unknown.
    async fn approve_many(&self, ids: &[ShiftId]) -> Result<Vec<ShiftOccurrence>, CaseworkError>;

    /// Marks every listed occurrence deleted, or none of them if any id is
    /// unknown.
    async fn delete_many(&self, ids: &[ShiftId]) -> Result<Vec<ShiftOccurrence>, CaseworkError>;

    /// Non-deleted occurrences for one physician dated within `[from, to]`,
    /// ordered by date then start time.
    async fn occurrences_between(
        &self,
        physician_id: PhysicianId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ShiftOccurrence>, CaseworkError>;
}

// ---------------------------------------------------------------------------
// Directories
// ---------------------------------------------------------------------------

/// A physician as known to the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Physician {
    pub id: PhysicianId,
    #[serde(flatten)]
    pub name: PersonName,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub regions: Vec<RegionName>,
    /// Last persisted on-call resolution. May be stale; see
    /// [`PhysicianDirectory::record_on_call`].
    pub on_call: Option<OnCallRecord>,
}

#[async_trait]
pub trait PhysicianDirectory: Send + Sync {
    /// Loads one physician with the last cached on-call record.
    async fn find_physician(&self, id: PhysicianId) -> Result<Option<Physician>, CaseworkError>;

    /// Physicians serving `region`, or every physician when `region` is `None`.
    async fn physicians_in_region(
        &self,
        region: Option<&RegionName>,
    ) -> Result<Vec<Physician>, CaseworkError>;

    /// Stores `record` as the physician's cached on-call state unless a record
    /// resolved for a later instant is already stored. Touches no other field.
    ///
    /// Returns the record that is stored afterwards.
    async fn record_on_call(
        &self,
        id: PhysicianId,
        record: OnCallRecord,
    ) -> Result<OnCallRecord, CaseworkError>;
}

#[async_trait]
pub trait RegionDirectory: Send + Sync {
    /// The short code used in confirmation numbers, e.g. `"MD"` for Maryland.
    async fn abbreviation(&self, region: &RegionName) -> Result<Option<String>, CaseworkError>;
}

// ---------------------------------------------------------------------------
// External gateways
// ---------------------------------------------------------------------------

/// Email/SMS dispatch. Best-effort: failures are logged, never propagated.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send(&self, notice: &Notice) -> Result<(), NotificationError>;
}

/// An authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caller {
    pub user_id: UserId,
    pub role_id: RoleId,
}

#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Resolves a bearer token. Fails with [`CaseworkError::Unauthenticated`].
    async fn verify(&self, token: &str) -> Result<Caller, CaseworkError>;

    /// Whether `role_id` is granted `permission`.
    async fn has_permission(
        &self,
        role_id: RoleId,
        permission: &PermissionName,
    ) -> Result<bool, CaseworkError>;
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Source of "now" in the practice's local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> LocalInstant;
}

/// The host's clock and time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> LocalInstant {
        LocalInstant::new(Local::now().fixed_offset())
    }
}

/// A clock stopped at one instant, settable from tests.
#[derive(Debug)]
pub struct FixedClock(std::sync::Mutex<LocalInstant>);

impl FixedClock {
    /// A clock reading `at` until [`FixedClock::set`] moves it.
    pub fn new(at: LocalInstant) -> Self {
        Self(std::sync::Mutex::new(at))
    }

    pub fn set(&self, at: LocalInstant) {
        let mut guard = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = at;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> LocalInstant {
        *self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
