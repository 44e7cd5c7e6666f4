//! Human-readable case codes.
//!
//! A confirmation number has the shape
//! `<RegionAbbrev><DD><MM><LastName2><FirstName2><DailySeq4>`, e.g.
//! `MD0306SMJO0007`. Everything except the sequence is derived from the intake
//! and the creation date, so it is computed here as a [`ConfirmationPrefix`].
//! The sequence is allocated by storage in the same atomic unit as the insert;
//! see [`crate::CaseRepository::insert_case`].

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::PersonName;

const SEQUENCE_WIDTH: usize = 4;

/// A complete confirmation number. Immutable once assigned to a case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfirmationNumber(String);

impl ConfirmationNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The trailing daily sequence, if the number ends in one.
    pub fn daily_sequence(&self) -> Option<u32> {
        let len = self.0.len();
        if len < SEQUENCE_WIDTH {
            return None;
        }
        self.0.get(len - SEQUENCE_WIDTH..)?.parse().ok()
    }
}

impl std::fmt::Display for ConfirmationNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything in a confirmation number except the daily sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfirmationPrefix(String);

impl ConfirmationPrefix {
    /// Derives the prefix for a case created on `created_on`.
    ///
    /// A missing region abbreviation yields an empty region segment rather than
    /// an error; the gap is logged so it can be corrected in the region
    /// directory.
    pub fn build(
        region_abbreviation: Option<&str>,
        created_on: NaiveDate,
        patient: &PersonName,
    ) -> Self {
        let region = match region_abbreviation {
            Some(abbrev) => abbrev.trim().to_uppercase(),
            None => {
                tracing::warn!(
                    created_on = %created_on,
                    "Region abbreviation unavailable; issuing confirmation number without it"
                );
                String::new()
            }
        };

        Self(format!(
            "{region}{:02}{:02}{}{}",
            created_on.day(),
            created_on.month(),
            leading_pair(patient.last_name()),
            leading_pair(patient.first_name()),
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Completes the number with the 1-based daily sequence, zero-padded to
    /// four digits.
    pub fn with_sequence(&self, sequence: u32) -> ConfirmationNumber {
        ConfirmationNumber(format!("{}{:0width$}", self.0, sequence, width = SEQUENCE_WIDTH))
    }
}

/// First two characters, upper-cased. Shorter names contribute what they have.
fn leading_pair(name: &str) -> String {
    name.chars().take(2).collect::<String>().to_uppercase()
}
