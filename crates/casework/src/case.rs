//! The case record and its lifecycle coordinates.
//!
//! A case occupies exactly one `(tag, status)` pair at any instant. Which pairs
//! are reachable, and how a case moves between them, is defined once in
//! [`crate::transitions`]; this module only describes the data.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{CaseId, ConfirmationNumber, PersonName, PhysicianId, RegionName, Timestamp};

// ---------------------------------------------------------------------------
// Lifecycle coordinates
// ---------------------------------------------------------------------------

/// Coarse lifecycle bucket; drives which dashboard list a case appears in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CaseTag {
    /// Waiting for an admin to assign a physician.
    New,
    /// Assigned; the physician and patient have not both agreed yet.
    Pending,
    /// Agreement accepted; the physician is on the way or on site.
    Active,
    /// Visit done; physician notes recorded.
    Conclude,
    /// Cancelled or declined, awaiting closure.
    ToClose,
    /// Closed out.
    UnPaid,
}

impl CaseTag {
    /// Every tag, in lifecycle order.
    pub const ALL: [CaseTag; 6] = [
        Self::New,
        Self::Pending,
        Self::Active,
        Self::Conclude,
        Self::ToClose,
        Self::UnPaid,
    ];

    /// Wire name of the tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Pending => "Pending",
            Self::Active => "Active",
            Self::Conclude => "Conclude",
            Self::ToClose => "ToClose",
            Self::UnPaid => "UnPaid",
        }
    }
}

impl std::fmt::Display for CaseTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------

/// Fine-grained sub-state within a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CaseStatus {
    /// No physician holds the case.
    Unassigned,
    /// Assigned, not yet accepted by the physician.
    Processing,
    /// Accepted by the physician; the agreement is pending.
    Accepted,
    /// The physician is travelling to the patient.
    #[serde(rename = "MDOnRoute")]
    MdOnRoute,
    /// The visit took place.
    Consult,
    /// The patient declined the agreement.
    Declined,
    /// The patient withdrew the request.
    Cancelled,
    /// An admin cancelled the case.
    CancelledByAdmin,
    /// The physician handed the case back.
    CancelledByProvider,
    /// Blocked by an admin; archived.
    Blocked,
    /// Cleared by an admin; archived.
    Cleared,
    /// Closed after cancellation.
    Closed,
    /// Enumerated for completeness; no action produces it.
    Unpaid,
}

impl CaseStatus {
    /// Every status.
    pub const ALL: [CaseStatus; 13] = [
        Self::Unassigned,
        Self::Processing,
        Self::Accepted,
        Self::MdOnRoute,
        Self::Consult,
        Self::Declined,
        Self::Cancelled,
        Self::CancelledByAdmin,
        Self::CancelledByProvider,
        Self::Blocked,
        Self::Cleared,
        Self::Closed,
        Self::Unpaid,
    ];

    /// Wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unassigned => "Unassigned",
            Self::Processing => "Processing",
            Self::Accepted => "Accepted",
            Self::MdOnRoute => "MDOnRoute",
            Self::Consult => "Consult",
            Self::Declined => "Declined",
            Self::Cancelled => "Cancelled",
            Self::CancelledByAdmin => "CancelledByAdmin",
            Self::CancelledByProvider => "CancelledByProvider",
            Self::Blocked => "Blocked",
            Self::Cleared => "Cleared",
            Self::Closed => "Closed",
            Self::Unpaid => "Unpaid",
        }
    }
}

impl std::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------

/// A `(tag, status)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CaseState {
    pub tag: CaseTag,
    pub status: CaseStatus,
}

impl CaseState {
    /// The state every case is created in.
    pub const INITIAL: CaseState = CaseState::new(CaseTag::New, CaseStatus::Unassigned);

    pub const fn new(tag: CaseTag, status: CaseStatus) -> Self {
        Self { tag, status }
    }
}

impl std::fmt::Display for CaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.tag, self.status)
    }
}

// ---------------------------------------------------------------------------
// Archival
// ---------------------------------------------------------------------------

/// Soft-archival marker, orthogonal to the lifecycle coordinates.
///
/// A case can be closed yet not archived, or archived while still tagged
/// `Active` (block, clear). Cases are never physically deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum Archival {
    Active,
    Archived { at: Timestamp },
}

impl Archival {
    pub fn is_archived(self) -> bool {
        matches!(self, Self::Archived { .. })
    }
}

// ---------------------------------------------------------------------------
// Intake
// ---------------------------------------------------------------------------

/// Who entered the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeChannel {
    /// Patient self-service form.
    Patient,
    /// Entered by administrative staff on the patient's behalf.
    Admin,
}

/// Patient demographics captured at intake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientDetails {
    #[serde(flatten)]
    pub name: PersonName,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
}

/// Everything needed to open a case, before storage assigns its identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseIntake {
    pub patient: PatientDetails,
    pub region: RegionName,
    pub symptoms: Option<String>,
    pub channel: IntakeChannel,
}

// ---------------------------------------------------------------------------
// Case
// ---------------------------------------------------------------------------

/// A house-call service request.
///
/// Mutated only through [`crate::transitions::apply`]; `version` is bumped by
/// storage on every successful write and is the optimistic-concurrency token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Case {
    pub id: CaseId,
    pub confirmation_number: ConfirmationNumber,
    pub patient: PatientDetails,
    pub region: RegionName,
    pub symptoms: Option<String>,
    pub channel: IntakeChannel,
    #[serde(flatten)]
    pub state: CaseState,
    /// Set by assignment or transfer; kept after a provider declines so the
    /// history stays visible.
    pub physician_id: Option<PhysicianId>,
    pub is_agreement_accepted: bool,
    pub reason_for_cancellation: Option<String>,
    pub admin_notes: Option<String>,
    pub physician_notes: Option<String>,
    pub transfer_note: Option<String>,
    pub archival: Archival,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub version: u64,
}

impl Case {
    /// Builds the initial record for a freshly created case.
    pub fn open(
        id: CaseId,
        confirmation_number: ConfirmationNumber,
        intake: CaseIntake,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            confirmation_number,
            patient: intake.patient,
            region: intake.region,
            symptoms: intake.symptoms,
            channel: intake.channel,
            state: CaseState::INITIAL,
            physician_id: None,
            is_agreement_accepted: false,
            reason_for_cancellation: None,
            admin_notes: None,
            physician_notes: None,
            transfer_note: None,
            archival: Archival::Active,
            created_at,
            updated_at: created_at,
            version: 0,
        }
    }

    pub fn is_archived(&self) -> bool {
        self.archival.is_archived()
    }
}
