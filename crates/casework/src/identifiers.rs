//! Newtype domain identifiers.
//!
//! Each identity gets its own newtype so a [`CaseId`] can never be passed where
//! a [`PhysicianId`] is expected, even though both are `u64` underneath.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is blank.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.trim().is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Macro for u64-wrapped newtypes (storage-assigned integers).
// Generates: struct (Copy), new(), as_u64(), Display.
// ---------------------------------------------------------------------------
macro_rules! u64_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Creates a new identifier from a raw integer.
            pub fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the underlying integer value.
            pub fn as_u64(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Storage-assigned integers
// ---------------------------------------------------------------------------

u64_id! {
    /// Identifies a house-call service request. Immutable once assigned.
    CaseId
}

u64_id! {
    /// Identifies a physician (provider) who can be assigned cases and hold shifts.
    PhysicianId
}

u64_id! {
    /// Identifies one concrete shift occurrence, anchor or generated repeat.
    ShiftId
}

u64_id! {
    /// Identifies an authenticated user as reported by the auth gateway.
    UserId
}

u64_id! {
    /// Identifies a role whose permissions are checked by name.
    RoleId
}

// ---------------------------------------------------------------------------
// Generated UUIDs
// ---------------------------------------------------------------------------

/// Identifies one outbound notification.
///
/// Generated when a transition produces a notice; carried in the delivered
/// payload so a downstream retry mechanism can de-duplicate redeliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoticeId(Uuid);

impl NoticeId {
    /// Generates a new random notice identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for NoticeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Configured names
// ---------------------------------------------------------------------------

string_id! {
    /// Names a service region (a state or county) as configured in the region
    /// directory, e.g. `"Maryland"`.
    RegionName
}

string_id! {
    /// Names a permission checked against a caller's role, e.g. `"cases.assign"`.
    PermissionName
}
