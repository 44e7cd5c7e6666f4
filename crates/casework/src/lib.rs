//! Core domain for house-call case coordination.
//!
//! This crate contains every domain concept, newtype identifier, shared value
//! type, and error type used throughout the workspace, plus the two pieces of
//! real logic: the case lifecycle state machine and the recurring shift
//! scheduler. Infrastructure crates implement the traits defined here; they
//! never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype domain identifiers (`CaseId`, `PhysicianId`, etc.) |
//! | [`types`] | Shared value types (`Timestamp`, `LocalInstant`, `PersonName`) |
//! | [`errors`] | Error taxonomy and retry policy |
//! | [`case`] | The case record and its `(tag, status)` coordinates |
//! | [`transitions`] | The lifecycle transition table and its application |
//! | [`confirmation`] | Confirmation number derivation |
//! | [`notices`] | Notices produced by transitions |
//! | [`shift`] | Shift definitions and recurring expansion |
//! | [`on_call`] | Live on-call resolution |
//! | [`ports`] | Storage, directory, gateway, and clock traits |

pub mod case;
pub mod confirmation;
pub mod errors;
pub mod identifiers;
pub mod notices;
pub mod on_call;
pub mod ports;
pub mod shift;
pub mod transitions;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use case::{
    Archival, Case, CaseIntake, CaseState, CaseStatus, CaseTag, IntakeChannel, PatientDetails,
};
pub use confirmation::{ConfirmationNumber, ConfirmationPrefix};
pub use errors::{CaseworkError, EntityKind, NotificationError, RetryPolicy};
pub use identifiers::{
    CaseId, NoticeId, PermissionName, PhysicianId, RegionName, RoleId, ShiftId, UserId,
};
pub use notices::{Notice, NoticeKind, Recipient};
pub use on_call::{OnCallRecord, OnCallStatus};
pub use ports::{
    AuthGateway, Caller, CaseRepository, Clock, FixedClock, NotificationGateway, Physician,
    PhysicianDirectory, RegionDirectory, ShiftRepository, SystemClock,
};
pub use shift::{
    OccurrenceDraft, Recurrence, ShiftDefinition, ShiftOccurrence, ShiftWindow, WeekdayFlags,
    MAX_REPEAT_WEEKS,
};
pub use transitions::{ActionKind, CaseAction, Transition};
pub use types::{LocalInstant, PersonName, Timestamp};
