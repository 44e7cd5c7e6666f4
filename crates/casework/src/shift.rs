//! Shift definitions and their expansion into dated occurrences.
//!
//! A shift is declared once, optionally recurring; expansion runs once at
//! creation and produces the anchor occurrence plus any repeats. After that
//! every occurrence lives independently: approved or deleted one at a time.

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::{CaseworkError, PhysicianId, RegionName, ShiftId, Timestamp};

/// Longest recurrence a single definition may expand over, in weeks.
pub const MAX_REPEAT_WEEKS: u32 = 104;

// ---------------------------------------------------------------------------
// Value types
// ---------------------------------------------------------------------------

/// Time-of-day window of a shift. `start` is strictly before `end`; shifts do
/// not cross midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawShiftWindow", rename_all = "camelCase")]
pub struct ShiftWindow {
    start_time: NaiveTime,
    end_time: NaiveTime,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawShiftWindow {
    start_time: NaiveTime,
    end_time: NaiveTime,
}

impl TryFrom<RawShiftWindow> for ShiftWindow {
    type Error = String;

    fn try_from(raw: RawShiftWindow) -> Result<Self, Self::Error> {
        ShiftWindow::new(raw.start_time, raw.end_time).ok_or_else(|| {
            format!("startTime {} must be before endTime {}", raw.start_time, raw.end_time)
        })
    }
}

impl ShiftWindow {
    /// Creates a [`ShiftWindow`], returning `None` unless `start < end`.
    #[must_use]
    pub fn new(start_time: NaiveTime, end_time: NaiveTime) -> Option<Self> {
        (start_time < end_time).then_some(Self {
            start_time,
            end_time,
        })
    }

    /// Local time the shift begins.
    pub fn start_time(self) -> NaiveTime {
        self.start_time
    }

    /// Local time the shift ends.
    pub fn end_time(self) -> NaiveTime {
        self.end_time
    }

    /// Absolute start and end on `date`.
    pub fn on(self, date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
        (date.and_time(self.start_time), date.and_time(self.end_time))
    }
}

// ---------------------------------------------------------------------------

/// Which weekdays a recurring shift repeats on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WeekdayFlags {
    pub sunday: bool,
    pub monday: bool,
    pub tuesday: bool,
    pub wednesday: bool,
    pub thursday: bool,
    pub friday: bool,
    pub saturday: bool,
}

impl WeekdayFlags {
    /// Whether the flag for `day` is set.
    pub fn is_set(&self, day: Weekday) -> bool {
        match day {
            Weekday::Sun => self.sunday,
            Weekday::Mon => self.monday,
            Weekday::Tue => self.tuesday,
            Weekday::Wed => self.wednesday,
            Weekday::Thu => self.thursday,
            Weekday::Fri => self.friday,
            Weekday::Sat => self.saturday,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.sunday
            || self.monday
            || self.tuesday
            || self.wednesday
            || self.thursday
            || self.friday
            || self.saturday)
    }
}

/// Repetition settings. Only present on repeating shifts, so weekday flags
/// cannot be set on a one-off shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recurrence {
    pub weekdays: WeekdayFlags,
    /// Number of weeks to expand over.
    pub repeat_upto: u32,
}

// ---------------------------------------------------------------------------
// Definitions and occurrences
// ---------------------------------------------------------------------------

/// A declared availability window for one physician.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftDefinition {
    pub physician_id: PhysicianId,
    pub shift_date: NaiveDate,
    pub region: RegionName,
    #[serde(flatten)]
    pub window: ShiftWindow,
    pub recurrence: Option<Recurrence>,
}

impl ShiftDefinition {
    /// Every date this definition materialises on, anchor first.
    ///
    /// For each of `repeat_upto` weeks, the seven days following the week's
    /// rolling current date are checked against the weekday flags; the current
    /// date then advances by seven days. Day offsets restart at one each week
    /// instead of aligning to calendar weeks.
    ///
    /// Fails with [`CaseworkError::Validation`] when `repeat_upto` exceeds
    /// [`MAX_REPEAT_WEEKS`] or a repeat would fall past the last representable
    /// date.
    pub fn occurrence_dates(&self) -> Result<Vec<NaiveDate>, CaseworkError> {
        let mut dates = vec![self.shift_date];
        let Some(recurrence) = self.recurrence else {
            return Ok(dates);
        };
        if recurrence.repeat_upto > MAX_REPEAT_WEEKS {
            return Err(CaseworkError::validation(format!(
                "repeatUpto {} exceeds the maximum of {MAX_REPEAT_WEEKS} weeks",
                recurrence.repeat_upto
            )));
        }

        let mut current = self.shift_date;
        for _week in 0..recurrence.repeat_upto {
            for offset in 1..=7 {
                let candidate = shifted(current, offset)?;
                if recurrence.weekdays.is_set(candidate.weekday()) && candidate >= current {
                    dates.push(candidate);
                }
            }
            current = shifted(current, 7)?;
        }
        Ok(dates)
    }

    /// Expands into occurrences ready for storage.
    pub fn expand(&self) -> Result<Vec<OccurrenceDraft>, CaseworkError> {
        let drafts = self
            .occurrence_dates()?
            .into_iter()
            .map(|shift_date| OccurrenceDraft {
                physician_id: self.physician_id,
                shift_date,
                region: self.region.clone(),
                window: self.window,
            })
            .collect();
        Ok(drafts)
    }
}

fn shifted(date: NaiveDate, days: u64) -> Result<NaiveDate, CaseworkError> {
    date.checked_add_days(Days::new(days)).ok_or_else(|| {
        CaseworkError::validation(format!("shift repeats past the last supported date from {date}"))
    })
}

/// An occurrence before storage assigns its identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccurrenceDraft {
    pub physician_id: PhysicianId,
    pub shift_date: NaiveDate,
    pub region: RegionName,
    pub window: ShiftWindow,
}

/// One concrete dated instance of a shift.
///
/// Only `is_approved` and `is_deleted` change after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftOccurrence {
    pub id: ShiftId,
    pub physician_id: PhysicianId,
    pub shift_date: NaiveDate,
    pub region: RegionName,
    #[serde(flatten)]
    pub window: ShiftWindow,
    pub is_approved: bool,
    pub is_deleted: bool,
    pub created_at: Timestamp,
}

impl ShiftOccurrence {
    pub fn from_draft(id: ShiftId, draft: OccurrenceDraft, created_at: Timestamp) -> Self {
        Self {
            id,
            physician_id: draft.physician_id,
            shift_date: draft.shift_date,
            region: draft.region,
            window: draft.window,
            is_approved: false,
            is_deleted: false,
            created_at,
        }
    }
}
