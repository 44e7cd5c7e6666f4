//! Shared value types for the case coordination domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants (e.g. names are non-blank, shift windows
//! start before they end) and participate in domain computations.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly for audit fields; the underlying representation can change without
/// affecting the domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

// ---------------------------------------------------------------------------

/// An instant as observed in the practice's local time zone.
///
/// Calendar questions ("which day was this case created on", "is a shift
/// running right now") are answered in local time; audit fields are stored as
/// [`Timestamp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalInstant(DateTime<FixedOffset>);

impl LocalInstant {
    /// Wraps a zoned date-time.
    pub fn new(dt: DateTime<FixedOffset>) -> Self {
        Self(dt)
    }

    /// Local calendar date.
    pub fn date(self) -> NaiveDate {
        self.0.date_naive()
    }

    /// Local wall-clock date and time.
    pub fn naive(self) -> NaiveDateTime {
        self.0.naive_local()
    }

    /// Local time of day.
    pub fn time(self) -> NaiveTime {
        self.0.time()
    }

    /// The same instant as a UTC [`Timestamp`].
    pub fn timestamp(self) -> Timestamp {
        Timestamp::from_utc(self.0.with_timezone(&Utc))
    }
}

impl std::fmt::Display for LocalInstant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

// ---------------------------------------------------------------------------
// People
// ---------------------------------------------------------------------------

/// A person's given and family name, both non-blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonName {
    first_name: String,
    last_name: String,
}

impl PersonName {
    /// Creates a [`PersonName`], returning `None` if either part is blank.
    ///
    /// Surrounding whitespace is trimmed.
    #[must_use]
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Option<Self> {
        let first_name = first_name.into().trim().to_string();
        let last_name = last_name.into().trim().to_string();
        if first_name.is_empty() || last_name.is_empty() {
            None
        } else {
            Some(Self {
                first_name,
                last_name,
            })
        }
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }
}

impl std::fmt::Display for PersonName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.first_name, self.last_name)
    }
}
